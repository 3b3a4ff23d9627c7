//! In-memory profile storage

use crate::error::{ProfileError, Result};
use crate::models::{Profile, UpdateProfileRequest};
use dashmap::DashMap;

#[derive(Debug, Default)]
pub struct ProfileStore {
    profiles: DashMap<String, Profile>,
}

impl ProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, subject: &str) -> Option<Profile> {
        self.profiles.get(subject).map(|entry| entry.value().clone())
    }

    pub fn insert(&self, profile: Profile) {
        self.profiles.insert(profile.subject.clone(), profile);
    }

    /// Apply the set fields of `update`, creating the profile if needed
    pub fn update(&self, subject: &str, update: UpdateProfileRequest) -> Result<Profile> {
        if let Some(email) = &update.email {
            if !email.contains('@') {
                return Err(ProfileError::Validation(format!("invalid email address {email:?}")));
            }
        }
        if matches!(&update.name, Some(name) if name.trim().is_empty()) {
            return Err(ProfileError::Validation("name must not be empty".to_string()));
        }

        let mut entry = self
            .profiles
            .entry(subject.to_string())
            .or_insert_with(|| Profile::new(subject));

        let profile = entry.value_mut();
        if let Some(name) = update.name {
            profile.name = Some(name);
        }
        if let Some(email) = update.email {
            profile.email = Some(email);
        }
        if let Some(address) = update.address {
            profile.address = Some(address);
        }

        Ok(profile.clone())
    }

    pub fn remove(&self, subject: &str) -> bool {
        self.profiles.remove(subject).is_some()
    }

    /// Profiles ordered by subject
    pub fn list(&self, limit: Option<usize>) -> Vec<Profile> {
        let mut profiles: Vec<Profile> = self
            .profiles
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        profiles.sort_by(|a, b| a.subject.cmp(&b.subject));
        profiles.truncate(limit.unwrap_or(usize::MAX));
        profiles
    }
}
