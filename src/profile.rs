//! Species profile lookup
//!
//! The plant/species tables live outside this crate. The alert actor only
//! needs "the profile of whatever is planted right now", which is what
//! [`SpeciesProfileLookup`] provides.

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::info;

use crate::SpeciesProfile;

#[async_trait]
pub trait SpeciesProfileLookup: Send + Sync {
    async fn current(&self) -> SpeciesProfile;
}

/// Profile held in memory, replaceable at runtime
#[derive(Debug, Default)]
pub struct SharedProfile {
    inner: RwLock<SpeciesProfile>,
}

impl SharedProfile {
    pub fn new(profile: SpeciesProfile) -> Self {
        Self {
            inner: RwLock::new(profile),
        }
    }

    /// Swap the active profile, returning the previous one
    pub async fn replace(&self, profile: SpeciesProfile) -> SpeciesProfile {
        let mut guard = self.inner.write().await;
        info!("active species changed: {} -> {}", guard.name, profile.name);
        std::mem::replace(&mut *guard, profile)
    }
}

#[async_trait]
impl SpeciesProfileLookup for SharedProfile {
    async fn current(&self) -> SpeciesProfile {
        self.inner.read().await.clone()
    }
}
