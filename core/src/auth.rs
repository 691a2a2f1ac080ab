use mockall::automock;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum AuthTokenError {
    #[error("No credential available: {0}")]
    Missing(String),
}

/// Supplies a valid bearer credential on demand. Acquisition (OAuth flow,
/// keyring, environment) happens outside the engine; the remote client
/// only asks for the current token before each request.
#[automock]
pub trait Authorizer: Send + Sync {
    fn bearer_token(&self) -> Result<String, AuthTokenError>;
}

/// Token resolved once at startup. Expiry shows up as an authorization
/// rejection from the remote, which the poll loop treats as fatal.
pub struct StaticAuthorizer {
    token: String,
}

impl StaticAuthorizer {
    pub fn new(token: String) -> Self {
        Self { token }
    }
}

impl Authorizer for StaticAuthorizer {
    fn bearer_token(&self) -> Result<String, AuthTokenError> {
        if self.token.is_empty() {
            return Err(AuthTokenError::Missing("empty token".to_string()));
        }

        Ok(self.token.clone())
    }
}
