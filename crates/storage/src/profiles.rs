use tally_import::SourceProfile;

use crate::kv::KeyValueStore;
use crate::StorageError;

/// Key under which the profile list is stored.
pub const PROFILES_KEY: &str = "source_profiles";

/// Source profiles persisted as one JSON array in a key-value store.
#[derive(Debug)]
pub struct ProfileRepository<S> {
    store: S,
}

impl<S: KeyValueStore> ProfileRepository<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Every saved profile; empty when nothing has been saved yet.
    pub async fn load(&self) -> Result<Vec<SourceProfile>, StorageError> {
        match self.store.get(PROFILES_KEY).await? {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Ok(Vec::new()),
        }
    }

    pub async fn save(&self, profiles: &[SourceProfile]) -> Result<(), StorageError> {
        let json = serde_json::to_string(profiles)?;
        self.store.set(PROFILES_KEY, &json).await?;
        tracing::info!(profiles = profiles.len(), "saved source profiles");
        Ok(())
    }

    pub async fn get(&self, name: &str) -> Result<Option<SourceProfile>, StorageError> {
        Ok(self.load().await?.into_iter().find(|p| p.name == name))
    }

    /// Replaces the profile with the same name in place, or appends it.
    pub async fn upsert(&self, profile: SourceProfile) -> Result<(), StorageError> {
        let mut profiles = self.load().await?;
        match profiles.iter_mut().find(|p| p.name == profile.name) {
            Some(existing) => *existing = profile,
            None => profiles.push(profile),
        }
        self.save(&profiles).await
    }

    pub async fn remove(&self, name: &str) -> Result<bool, StorageError> {
        let mut profiles = self.load().await?;
        let before = profiles.len();
        profiles.retain(|p| p.name != name);
        if profiles.len() == before {
            return Ok(false);
        }
        self.save(&profiles).await?;
        Ok(true)
    }
}
