use sqlx::FromRow;
use time::OffsetDateTime;

/// Row in the `password_resets` table. Refers to the user by email only.
#[derive(Debug, Clone, FromRow)]
pub struct PasswordReset {
    pub email: String,
    pub token: String,
    pub created_at: OffsetDateTime,
}

/// Outcome of redeeming a reset token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Redemption {
    /// Record consumed and password stored.
    Redeemed,
    /// Record was too old. It is consumed, the password is unchanged.
    Expired,
    NoMatch,
}
