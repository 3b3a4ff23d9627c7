use thiserror::Error;
use tonic::{Code, Status};

pub type Result<T> = std::result::Result<T, ProfileError>;

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("Profile not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

impl ProfileError {
    /// Convert to gRPC Status for wire protocol
    pub fn to_status(&self) -> Status {
        match self {
            ProfileError::NotFound(_) => Status::new(Code::NotFound, "Profile not found"),
            ProfileError::Validation(msg) => {
                Status::new(Code::InvalidArgument, format!("Validation error: {}", msg))
            }
        }
    }
}

impl From<ProfileError> for Status {
    fn from(err: ProfileError) -> Self {
        err.to_status()
    }
}
