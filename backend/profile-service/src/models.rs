//! Request and response messages of `example.v1.ProfileService`

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub city: String,
    /// Sensitive
    pub street: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub subject: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Sensitive
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<Address>,
}

impl Profile {
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            name: None,
            email: None,
            address: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GetProfileRequest {}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateProfileRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub address: Option<Address>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeleteProfileRequest {
    pub subject: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeleteProfileResponse {
    pub subject: String,
    pub deleted: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListProfilesRequest {
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PingRequest {}

#[derive(Debug, Clone, Serialize)]
pub struct PingResponse {
    pub status: &'static str,
}
