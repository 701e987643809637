use reqwest::header::{HeaderName, HeaderValue, AUTHORIZATION};

use crate::error::{LLMError, Result};

/// Produces the credential header attached to every completion request
pub trait Authenticator: Send + Sync {
    /// `None` when the endpoint needs no credentials
    fn auth_header(&self) -> Result<Option<(HeaderName, HeaderValue)>>;
}

/// `Authorization: Bearer <key>` (OpenRouter / OpenAI API keys)
#[derive(Clone)]
pub struct BearerAuth {
    token: String,
}

impl BearerAuth {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl std::fmt::Debug for BearerAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BearerAuth").field("token", &"***").finish()
    }
}

impl Authenticator for BearerAuth {
    fn auth_header(&self) -> Result<Option<(HeaderName, HeaderValue)>> {
        let mut value = HeaderValue::from_str(&format!("Bearer {}", self.token.trim()))
            .map_err(|_| LLMError::Config("API key contains invalid characters".to_string()))?;
        value.set_sensitive(true);
        Ok(Some((AUTHORIZATION, value)))
    }
}

/// Local or proxy endpoints without credentials
#[derive(Debug, Clone)]
pub struct NoAuth;

impl Authenticator for NoAuth {
    fn auth_header(&self) -> Result<Option<(HeaderName, HeaderValue)>> {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bearer_header() {
        let (name, value) = BearerAuth::new(" sk-or-123\n").auth_header().unwrap().unwrap();
        assert_eq!(name, AUTHORIZATION);
        assert_eq!(value.to_str().unwrap(), "Bearer sk-or-123");
        assert!(value.is_sensitive());
    }

    #[test]
    fn test_bearer_rejects_control_characters() {
        let result = BearerAuth::new("sk-or\u{7f}bad").auth_header();
        assert!(matches!(result, Err(LLMError::Config(_))));
    }

    #[test]
    fn test_bearer_debug_hides_token() {
        let auth = BearerAuth::new("sk-or-secret");
        assert!(!format!("{:?}", auth).contains("secret"));
    }

    #[test]
    fn test_no_auth() {
        assert!(NoAuth.auth_header().unwrap().is_none());
    }
}
