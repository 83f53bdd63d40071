//! Authenticator: a request-scope credential check, selected by
//! configuration at startup and shared between the gRPC service and
//! the HTTP gateway's own middleware so both entry protocols enforce
//! the same policy.

use async_trait::async_trait;

use open_ve_core::AppError;

/// Extracted once per call site: RPC metadata and HTTP headers both
/// reduce to "is there a bearer token, and if so what is it".
pub struct AuthContext {
    pub bearer_token: Option<String>,
}

impl AuthContext {
    pub fn from_bearer(token: Option<String>) -> Self {
        Self { bearer_token: token }
    }
}

#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(&self, ctx: &AuthContext) -> Result<(), AppError>;
}

/// Accepts unconditionally.
pub struct NoopAuthenticator;

#[async_trait]
impl Authenticator for NoopAuthenticator {
    async fn authenticate(&self, _ctx: &AuthContext) -> Result<(), AppError> {
        Ok(())
    }
}

/// Accepts iff the bearer token equals the configured key.
pub struct PresharedKeyAuthenticator {
    key: String,
}

impl PresharedKeyAuthenticator {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }
}

#[async_trait]
impl Authenticator for PresharedKeyAuthenticator {
    async fn authenticate(&self, ctx: &AuthContext) -> Result<(), AppError> {
        match &ctx.bearer_token {
            Some(token) if token == &self.key => Ok(()),
            _ => Err(AppError::AuthenticationFailed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn noop_always_accepts() {
        let a = NoopAuthenticator;
        assert!(a.authenticate(&AuthContext::from_bearer(None)).await.is_ok());
    }

    #[tokio::test]
    async fn preshared_key_rejects_missing_header() {
        let a = PresharedKeyAuthenticator::new("k");
        let err = a
            .authenticate(&AuthContext::from_bearer(None))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::AuthenticationFailed));
    }

    #[tokio::test]
    async fn preshared_key_accepts_matching_token() {
        let a = PresharedKeyAuthenticator::new("k");
        assert!(a
            .authenticate(&AuthContext::from_bearer(Some("k".to_string())))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn preshared_key_rejects_mismatched_token() {
        let a = PresharedKeyAuthenticator::new("k");
        let err = a
            .authenticate(&AuthContext::from_bearer(Some("x".to_string())))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::AuthenticationFailed));
    }
}
