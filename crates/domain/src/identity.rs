use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ActorIdentity {
    pub user_id: String,
    pub username: String,
}

impl ActorIdentity {
    pub fn with_user_id(user_id: impl Into<String>) -> Self {
        let user_id = user_id.into();
        Self {
            user_id: user_id.clone(),
            username: user_id,
        }
    }
}

/// Roommate-matching preferences. The source data is schema-less, so
/// every field is an explicit optional rather than an open mapping.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoommatePreferences {
    pub smoking: Option<String>,
    pub pets: Option<String>,
    pub cleanliness: Option<String>,
}

/// Read model for a user owned by the identity provider. The chat core
/// never mutates these; it only resolves display names for rendering.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserProfile {
    pub user_id: String,
    pub name: String,
    pub email: Option<String>,
    pub age: Option<u32>,
    pub gender: Option<String>,
    pub phone: Option<String>,
    #[serde(default)]
    pub preferences: RoommatePreferences,
}

impl UserProfile {
    pub fn named(user_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            name: name.into(),
            email: None,
            age: None,
            gender: None,
            phone: None,
            preferences: RoommatePreferences::default(),
        }
    }
}
