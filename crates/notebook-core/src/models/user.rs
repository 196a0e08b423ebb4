//! User profile model

use serde::{Deserialize, Serialize};

/// A profile row in the remote `users` table.
///
/// Keyed by the auth provider's user id and upserted on every sign-in, so
/// repeated sign-ins refresh provider metadata instead of re-creating the
/// row. Never deleted by this system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Identifier assigned by the auth provider.
    pub id: String,
    /// Account email, when the provider exposes one.
    pub email: Option<String>,
    /// Display name from provider metadata.
    pub display_name: Option<String>,
    /// Avatar URL from provider metadata.
    pub photo_url: Option<String>,
    /// Premium flag, defaults to false.
    #[serde(default)]
    pub is_premium: bool,
    /// Server-assigned creation timestamp.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    /// Server-assigned last-update timestamp.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl User {
    /// Build a profile row from provider-supplied identity and metadata.
    #[must_use]
    pub fn from_provider(
        id: impl Into<String>,
        email: Option<String>,
        display_name: Option<String>,
        photo_url: Option<String>,
    ) -> Self {
        Self {
            id: id.into(),
            email,
            display_name,
            photo_url,
            is_premium: false,
            created_at: None,
            updated_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_provider_defaults() {
        let user = User::from_provider("uid-1", Some("a@b.c".to_string()), None, None);
        assert_eq!(user.id, "uid-1");
        assert!(!user.is_premium);
        assert!(user.created_at.is_none());
    }

    #[test]
    fn test_is_premium_defaults_on_deserialize() {
        let json = r#"{"id":"uid-1","email":null,"display_name":null,"photo_url":null}"#;
        let user: User = serde_json::from_str(json).unwrap();
        assert!(!user.is_premium);
    }
}
