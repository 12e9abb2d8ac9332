use async_trait::async_trait;

use super::{AuthError, AuthRequest, Authenticator};

/// Accepts every request. Only allowed on a loopback listener.
#[derive(Debug, Default)]
pub struct NoneAuthenticator;

#[async_trait]
impl Authenticator for NoneAuthenticator {
    async fn authenticate(&self, _request: &AuthRequest) -> Result<(), AuthError> {
        Ok(())
    }

    fn method_name(&self) -> &'static str {
        "none"
    }
}
