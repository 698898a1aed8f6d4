use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
    pub refresh_ttl_minutes: i64,
}

/// Where links in outgoing emails point and where verification redirects land.
#[derive(Debug, Clone, Deserialize)]
pub struct LinkConfig {
    pub app_url: String,
    pub frontend_url: String,
    pub verify_success_url: String,
    pub verify_invalid_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub from_address: String,
    pub user: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    /// Base64 encoded 32 byte key for the email cipher.
    pub email_cipher_key: String,
    pub links: LinkConfig,
    /// Unset means reset records never expire.
    pub reset_ttl_minutes: Option<i64>,
    pub notify_queue_capacity: usize,
    pub smtp: Option<SmtpConfig>,
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.into())
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse::<T>().ok())
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")?,
            issuer: env_or("JWT_ISSUER", "authgate"),
            audience: env_or("JWT_AUDIENCE", "authgate-users"),
            ttl_minutes: env_parse("JWT_TTL_MINUTES").unwrap_or(60),
            refresh_ttl_minutes: env_parse("JWT_REFRESH_TTL_MINUTES").unwrap_or(60 * 24 * 14),
        };

        let app_url = env_or("APP_URL", "http://localhost:8080");
        let frontend_url = env_or("FRONTEND_URL", "http://localhost:8000");
        let links = LinkConfig {
            verify_success_url: std::env::var("VERIFY_SUCCESS_URL")
                .unwrap_or_else(|_| format!("{}/verify/success", frontend_url)),
            verify_invalid_url: std::env::var("VERIFY_INVALID_URL")
                .unwrap_or_else(|_| format!("{}/verify/invalid_token", frontend_url)),
            app_url,
            frontend_url,
        };

        let smtp = std::env::var("SMTP_HOST").ok().map(|host| SmtpConfig {
            host,
            port: env_parse("SMTP_PORT").unwrap_or(587),
            from_address: env_or("SMTP_FROM", "noreply@authgate.local"),
            user: std::env::var("SMTP_USER").ok(),
            password: std::env::var("SMTP_PASSWORD").ok(),
        });

        Ok(Self {
            database_url,
            jwt,
            email_cipher_key: std::env::var("EMAIL_CIPHER_KEY")?,
            links,
            reset_ttl_minutes: env_parse("RESET_TOKEN_TTL_MINUTES"),
            notify_queue_capacity: env_parse("NOTIFY_QUEUE_CAPACITY").unwrap_or(256),
            smtp,
        })
    }
}
