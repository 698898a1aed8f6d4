use std::time::Duration;

use axum::extract::FromRef;
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation,
};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::debug;
use uuid::Uuid;

use super::claims::Claims;
use crate::{
    config::JwtConfig,
    error::{AuthError, AuthResult},
    state::AppState,
};

/// A freshly signed bearer token and its lifetime in seconds.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_in: i64,
}

#[derive(Clone)]
pub struct JwtKeys {
    pub encoding: EncodingKey,
    pub decoding: DecodingKey,
    pub issuer: String,
    pub audience: String,
    pub ttl: Duration,
    /// How long after `iat` a token may still be exchanged for a new one.
    pub refresh_ttl: Duration,
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        Self::from_config(&state.config.jwt)
    }
}

impl JwtKeys {
    pub fn from_config(cfg: &JwtConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(cfg.secret.as_bytes()),
            decoding: DecodingKey::from_secret(cfg.secret.as_bytes()),
            issuer: cfg.issuer.clone(),
            audience: cfg.audience.clone(),
            ttl: Duration::from_secs((cfg.ttl_minutes.max(0) as u64) * 60),
            refresh_ttl: Duration::from_secs((cfg.refresh_ttl_minutes.max(0) as u64) * 60),
        }
    }

    fn sign_at(&self, user_id: Uuid, iat: OffsetDateTime, exp: OffsetDateTime) -> AuthResult<String> {
        let claims = Claims {
            sub: user_id,
            iat: iat.unix_timestamp().max(0) as usize,
            exp: exp.unix_timestamp().max(0) as usize,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
        };
        let token = encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| anyhow::anyhow!("jwt encode: {}", e))?;
        debug!(user_id = %user_id, "jwt signed");
        Ok(token)
    }

    #[cfg(test)]
    pub(crate) fn sign_with_times(&self, user_id: Uuid, iat: OffsetDateTime, exp: OffsetDateTime) -> String {
        self.sign_at(user_id, iat, exp).expect("sign token")
    }

    pub fn issue(&self, user_id: Uuid) -> AuthResult<IssuedToken> {
        let now = OffsetDateTime::now_utc();
        let ttl = TimeDuration::seconds(self.ttl.as_secs() as i64);
        let token = self.sign_at(user_id, now, now + ttl)?;
        Ok(IssuedToken {
            token,
            expires_in: ttl.whole_seconds(),
        })
    }

    fn validation(&self, check_exp: bool) -> Validation {
        let mut validation = Validation::default();
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        validation.leeway = 0;
        validation.validate_exp = check_exp;
        validation
    }

    fn decode(&self, token: &str, check_exp: bool) -> AuthResult<Claims> {
        decode::<Claims>(token, &self.decoding, &self.validation(check_exp))
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::ExpiredToken,
                _ => AuthError::InvalidToken,
            })
    }

    /// Returns the user id a still valid token was issued to.
    pub fn validate(&self, token: &str) -> AuthResult<Uuid> {
        let claims = self.decode(token, true)?;
        debug!(user_id = %claims.sub, "jwt verified");
        Ok(claims.sub)
    }

    /// Exchange a correctly signed token for a new one. The token itself may be
    /// expired, but not past `iat + refresh_ttl`. The old token stays valid until
    /// its own expiry.
    pub fn refresh(&self, token: &str) -> AuthResult<(Uuid, IssuedToken)> {
        let claims = self.decode(token, false)?;
        let now = OffsetDateTime::now_utc().unix_timestamp();
        let refresh_deadline = claims.iat as i64 + self.refresh_ttl.as_secs() as i64;
        if now > refresh_deadline {
            debug!(user_id = %claims.sub, "jwt past refresh window");
            return Err(AuthError::ExpiredToken);
        }
        let issued = self.issue(claims.sub)?;
        Ok((claims.sub, issued))
    }
}
