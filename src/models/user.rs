use serde::{Deserialize, Serialize};

/// One credentialed principal in the registry.
///
/// The token is both the bearer credential and the record key. Names are
/// display names and may be shared by several records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub token: String,
    pub name: String,
    pub is_admin: bool,
}

impl UserRecord {
    /// A freshly issued, non-admin record.
    pub fn new(token: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            name: name.into(),
            is_admin: false,
        }
    }

    pub fn admin(token: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            is_admin: true,
            ..Self::new(token, name)
        }
    }
}
