//! Device profile registry: model identifier -> profile

use crate::devices;
use crate::error::ProfileError;
use crate::profile::{DeviceProfile, OtaCapability};
use std::collections::HashMap;
use std::sync::Arc;

/// Read-only table of profiles, shared across all decode / encode calls
#[derive(Debug, Clone)]
pub struct ProfileRegistry {
    profiles: Vec<Arc<DeviceProfile>>,
    by_model: HashMap<String, usize>,
}

impl ProfileRegistry {
    /// Build a registry, rejecting model identifiers claimed twice
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError::DuplicateModel`] on a clash.
    pub fn new(profiles: Vec<DeviceProfile>) -> Result<Self, ProfileError> {
        let mut by_model = HashMap::new();
        for (index, profile) in profiles.iter().enumerate() {
            for model_id in profile.zigbee_models() {
                if by_model.insert(model_id.clone(), index).is_some() {
                    return Err(ProfileError::DuplicateModel(model_id.clone()));
                }
            }
        }

        Ok(Self {
            profiles: profiles.into_iter().map(Arc::new).collect(),
            by_model,
        })
    }

    /// The three water meter profiles
    ///
    /// `ota` is attached to the leak sensor variant, the only one that
    /// supports firmware updates.
    #[allow(clippy::missing_errors_doc)]
    pub fn builtin(ota: Option<OtaCapability>) -> Result<Self, ProfileError> {
        let registry = Self::new(vec![
            devices::basic_profile()?,
            devices::preset_profile()?,
            devices::leak_profile(ota)?,
        ])?;
        tracing::debug!("Loaded {} device profiles", registry.profiles.len());
        Ok(registry)
    }

    /// Profile for a model identifier
    ///
    /// `None` tells the caller to fall back to generic handling.
    #[must_use]
    pub fn lookup(&self, model_id: &str) -> Option<Arc<DeviceProfile>> {
        self.by_model
            .get(model_id)
            .map(|&index| Arc::clone(&self.profiles[index]))
    }

    #[must_use]
    pub fn profiles(&self) -> &[Arc<DeviceProfile>] {
        &self.profiles
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}
