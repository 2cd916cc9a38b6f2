use http::StatusCode;

/// Failure of a single backend call.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Server returned status: {0}")]
    Status(StatusCode),

    /// The backend answered with `success: false`.
    #[error("{0}")]
    Rejected(String),

    #[error("Login failed for user {0}")]
    LoginFailed(String),
}

impl ApiError {
    /// Text shown inline next to the control that triggered the call.
    ///
    /// Rejections carry the server's own wording; everything else falls back
    /// to the caller's generic message.
    pub fn user_message(&self, fallback: &str) -> String {
        match self {
            ApiError::Rejected(msg) if !msg.is_empty() => msg.clone(),
            ApiError::Rejected(_) => fallback.to_string(),
            other => {
                let text = other.to_string();
                if text.is_empty() {
                    fallback.to_string()
                } else {
                    text
                }
            }
        }
    }
}

/// Form fields that can be flagged invalid by client-side validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldName {
    Email,
    Password,
    Folder,
    RcloneConfig,
    RemoteName,
    BackupTime,
    NewFolderName,
}

impl std::fmt::Display for FieldName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FieldName::Email => "email",
            FieldName::Password => "password",
            FieldName::Folder => "folder",
            FieldName::RcloneConfig => "rclone config",
            FieldName::RemoteName => "remote name",
            FieldName::BackupTime => "backup time",
            FieldName::NewFolderName => "new folder name",
        };
        f.write_str(name)
    }
}

/// Outcome of a form action that did not complete.
#[derive(Debug, thiserror::Error)]
pub enum FormError {
    /// Client-side validation failed; no request was sent.
    #[error("Invalid {}", join_fields(.0))]
    Invalid(Vec<FieldName>),

    /// The backend refused or could not be reached.
    #[error("{0}")]
    Remote(String),

    /// The action is not available in the component's current state.
    #[error("Action not available: {0}")]
    NotAllowed(&'static str),
}

fn join_fields(fields: &[FieldName]) -> String {
    fields
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejection_uses_server_text() {
        let err = ApiError::Rejected("No MEGA credentials stored.".into());
        assert_eq!(err.user_message("fallback"), "No MEGA credentials stored.");
    }

    #[test]
    fn test_empty_rejection_uses_fallback() {
        let err = ApiError::Rejected(String::new());
        assert_eq!(err.user_message("Could not load folders."), "Could not load folders.");
    }

    #[test]
    fn test_invalid_lists_fields() {
        let err = FormError::Invalid(vec![FieldName::Email, FieldName::Folder]);
        assert_eq!(err.to_string(), "Invalid email, folder");
    }
}
