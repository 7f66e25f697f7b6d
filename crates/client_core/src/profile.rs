//! The user's name, asked for once on first launch.

use std::sync::Arc;

use shared::error::ValidationError;
use storage::ProfileRepository;
use tracing::{info, warn};

use crate::error::ProfileError;

pub struct UserProfile {
    repository: Arc<dyn ProfileRepository>,
    name: Option<String>,
}

impl UserProfile {
    /// A missing, blank or unreadable name counts as first launch.
    pub async fn load(repository: Arc<dyn ProfileRepository>) -> Self {
        let name = match repository.load_user_name().await {
            Ok(name) => name.filter(|name| !name.trim().is_empty()),
            Err(err) => {
                warn!("profile: load failed, treating as first launch: {err:#}");
                None
            }
        };
        if name.is_none() {
            info!("profile: first launch");
        }
        Self { repository, name }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn is_first_launch(&self) -> bool {
        self.name.is_none()
    }

    pub async fn save_name(&mut self, name: &str) -> Result<(), ProfileError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ValidationError::empty_user_name().into());
        }
        self.repository
            .save_user_name(name)
            .await
            .map_err(|source| ProfileError::Persistence { source })?;
        self.name = Some(name.to_string());
        info!("profile: saved user name");
        Ok(())
    }

    /// Forgets the name; the next launch asks again.
    pub async fn reset(&mut self) -> Result<(), ProfileError> {
        self.repository
            .clear_user_name()
            .await
            .map_err(|source| ProfileError::Persistence { source })?;
        self.name = None;
        info!("profile: reset");
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/profile_tests.rs"]
mod tests;
