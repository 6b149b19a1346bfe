use crate::catalog::{AgentProvisioner, SettingsStore};
use crate::setting::{
    DEFAULT_INSTRUCTIONS, NewSetting, Setting, SettingUpdate, SettingsError, validate_name,
};
use anyhow::Context;

/// Keeps settings and their remote agents in step.
pub struct SettingsManager<S, P> {
    store: S,
    provisioner: P,
}

impl<S: SettingsStore, P: AgentProvisioner> SettingsManager<S, P> {
    pub fn new(store: S, provisioner: P) -> Self {
        Self { store, provisioner }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Creates a setting with default values and a freshly provisioned agent.
    pub async fn create(&self, name: &str, voice_id: &str) -> Result<Setting, SettingsError> {
        validate_name(name)?;
        let name = name.trim();
        if self.store.get_by_name(name).await?.is_some() {
            return Err(SettingsError::DuplicateName);
        }

        let agent_id = self
            .provisioner
            .create_agent(&format!("Bloom - {name}"), DEFAULT_INSTRUCTIONS, voice_id)
            .await
            .context("Failed to create agent")?;
        tracing::info!(%name, %agent_id, "provisioned agent for new setting");

        let setting = self
            .store
            .create(NewSetting::with_defaults(name, &agent_id, voice_id))
            .await?;
        Ok(setting)
    }

    /// Validates and applies an update, pushing instruction or voice changes
    /// to the remote agent.
    pub async fn update(&self, id: &str, update: SettingUpdate) -> Result<Setting, SettingsError> {
        update.validate()?;
        if let Some(name) = &update.name {
            if let Some(existing) = self.store.get_by_name(name.trim()).await? {
                if existing.id != id {
                    return Err(SettingsError::DuplicateName);
                }
            }
        }

        let instructions = update.instructions.clone();
        let voice_id = update.voice_id.clone();
        let touches_agent = update.touches_agent();

        let updated = self.store.update(id, update).await?;
        tracing::info!(id, "setting updated");

        if touches_agent && !updated.agent_id.is_empty() {
            self.provisioner
                .update_agent(&updated.agent_id, instructions, voice_id)
                .await
                .context("Failed to update agent")?;
            tracing::info!(agent_id = %updated.agent_id, "agent updated");
        }
        Ok(updated)
    }

    pub async fn delete(&self, id: &str) -> Result<(), SettingsError> {
        self.store.delete(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{MockAgentProvisioner, MockSettingsStore};
    use chrono::Utc;

    fn stored(id: &str, name: &str) -> Setting {
        NewSetting::with_defaults(name, "agent_1", "voice_1").into_setting(id.to_string(), Utc::now())
    }

    #[tokio::test]
    async fn create_provisions_an_agent_and_stores_defaults() {
        let mut store = MockSettingsStore::new();
        store
            .expect_get_by_name()
            .withf(|name: &str| name == "Mower")
            .times(1)
            .returning(|_| Ok(None));
        store
            .expect_create()
            .withf(|new| {
                new.name == "Mower"
                    && new.agent_id == "agent_42"
                    && new.voice_id == "voice_9"
                    && new.session_length == 30
            })
            .times(1)
            .returning(|new| Ok(new.into_setting("id-1".to_string(), Utc::now())));

        let mut provisioner = MockAgentProvisioner::new();
        provisioner
            .expect_create_agent()
            .withf(|name, instructions, voice| {
                name == "Bloom - Mower" && instructions == DEFAULT_INSTRUCTIONS && voice == "voice_9"
            })
            .times(1)
            .returning(|_, _, _| Ok("agent_42".to_string()));

        let manager = SettingsManager::new(store, provisioner);
        let setting = manager.create("  Mower ", "voice_9").await.unwrap();
        assert_eq!(setting.agent_id, "agent_42");
    }

    #[tokio::test]
    async fn create_rejects_duplicate_names_before_provisioning() {
        let mut store = MockSettingsStore::new();
        store
            .expect_get_by_name()
            .returning(|name| Ok(Some(stored("other", name))));
        store.expect_create().never();
        let mut provisioner = MockAgentProvisioner::new();
        provisioner.expect_create_agent().never();

        let manager = SettingsManager::new(store, provisioner);
        let err = manager.create("Mower", "voice_9").await.unwrap_err();
        assert!(matches!(err, SettingsError::DuplicateName));
    }

    #[tokio::test]
    async fn create_requires_a_name() {
        let manager = SettingsManager::new(MockSettingsStore::new(), MockAgentProvisioner::new());
        let err = manager.create("   ", "voice_9").await.unwrap_err();
        assert!(matches!(err, SettingsError::EmptyName));
    }

    #[tokio::test]
    async fn update_pushes_instruction_changes_to_the_agent() {
        let mut store = MockSettingsStore::new();
        store.expect_update().times(1).returning(|id, update| {
            let mut setting = stored(id, "Mower");
            update.apply_to(&mut setting, Utc::now());
            Ok(setting)
        });
        let mut provisioner = MockAgentProvisioner::new();
        provisioner
            .expect_update_agent()
            .withf(|agent_id: &str, instructions: &Option<String>, voice_id: &Option<String>| {
                agent_id == "agent_1"
                    && instructions.as_deref() == Some("Be grumpy")
                    && voice_id.is_none()
            })
            .times(1)
            .returning(|_, _, _| Ok(()));

        let manager = SettingsManager::new(store, provisioner);
        let update = SettingUpdate {
            instructions: Some("Be grumpy".to_string()),
            ..Default::default()
        };
        let setting = manager.update("id-1", update).await.unwrap();
        assert_eq!(setting.instructions, "Be grumpy");
    }

    #[tokio::test]
    async fn update_leaves_the_agent_alone_for_local_fields() {
        let mut store = MockSettingsStore::new();
        store
            .expect_update()
            .times(1)
            .returning(|id, _| Ok(stored(id, "Mower")));
        let mut provisioner = MockAgentProvisioner::new();
        provisioner.expect_update_agent().never();

        let manager = SettingsManager::new(store, provisioner);
        let update = SettingUpdate {
            accelerometer_sensitivity: Some(2.0),
            ..Default::default()
        };
        manager.update("id-1", update).await.unwrap();
    }

    #[tokio::test]
    async fn update_rejects_out_of_range_values_without_touching_storage() {
        let mut store = MockSettingsStore::new();
        store.expect_update().never();
        let manager = SettingsManager::new(store, MockAgentProvisioner::new());

        let update = SettingUpdate {
            accelerometer_sensitivity: Some(7.5),
            ..Default::default()
        };
        let err = manager.update("id-1", update).await.unwrap_err();
        assert!(matches!(err, SettingsError::SensitivityOutOfRange));
    }

    #[tokio::test]
    async fn renaming_onto_another_setting_is_refused() {
        let mut store = MockSettingsStore::new();
        store
            .expect_get_by_name()
            .returning(|name| Ok(Some(stored("id-2", name))));
        store.expect_update().never();
        let manager = SettingsManager::new(store, MockAgentProvisioner::new());

        let update = SettingUpdate {
            name: Some("Taken".to_string()),
            ..Default::default()
        };
        let err = manager.update("id-1", update).await.unwrap_err();
        assert!(matches!(err, SettingsError::DuplicateName));
    }
}
