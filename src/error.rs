/// Error types for the login helper and the controller channel
use thiserror::Error;

/// Reasons a login redirect is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoginError {
    #[error("Invalid redirect URL: {0}")]
    InvalidRedirectUrl(String),
    /// The identity provider answered with an `error` parameter.
    #[error("{}", provider_message(.code, .description.as_deref()))]
    Provider {
        code: String,
        description: Option<String>,
    },
    #[error("State validation failed.")]
    StateMismatch,
    #[error("No access token returned from IMS.")]
    MissingAccessToken,
}

fn provider_message(code: &str, description: Option<&str>) -> String {
    match description {
        Some(description) => format!("{}: {}", code, description),
        None => code.to_string(),
    }
}

/// Failures talking to the extension runtime.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelError {
    #[error("{0}")]
    Send(String),
    #[error("Unreadable controller response: {0}")]
    Decode(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_message() {
        let with_description = LoginError::Provider {
            code: "access_denied".to_string(),
            description: Some("User cancelled".to_string()),
        };
        assert_eq!(with_description.to_string(), "access_denied: User cancelled");

        let bare = LoginError::Provider {
            code: "server_error".to_string(),
            description: None,
        };
        assert_eq!(bare.to_string(), "server_error");
    }

    #[test]
    fn test_validation_messages() {
        assert_eq!(LoginError::StateMismatch.to_string(), "State validation failed.");
        assert_eq!(
            LoginError::MissingAccessToken.to_string(),
            "No access token returned from IMS."
        );
    }
}
