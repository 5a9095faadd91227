//! Site-wide system settings shared by every request.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SystemSettings {
    /// When set, new account sign-ups are refused.
    #[serde(default)]
    pub signup_disabled: bool,
}

#[derive(Debug, Clone, Default)]
pub struct SharedSettings(Arc<RwLock<SystemSettings>>);

impl SharedSettings {
    #[must_use]
    pub fn new(settings: SystemSettings) -> Self {
        Self(Arc::new(RwLock::new(settings)))
    }

    pub async fn get(&self) -> SystemSettings {
        *self.0.read().await
    }

    pub async fn replace(&self, settings: SystemSettings) -> SystemSettings {
        let mut current = self.0.write().await;
        *current = settings;
        *current
    }
}
