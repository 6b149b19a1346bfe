//! Collaborators behind the settings screens: persistence, the voice catalog,
//! and provisioning of the remote agent a setting drives.

use crate::setting::{NewSetting, Setting, SettingUpdate, SettingsError};
use anyhow::Result;
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voice {
    pub voice_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

pub fn find_voice_by_id<'a>(voices: &'a [Voice], voice_id: &str) -> Option<&'a Voice> {
    voices.iter().find(|voice| voice.voice_id == voice_id)
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn get(&self, id: &str) -> Result<Option<Setting>, SettingsError>;
    async fn get_by_name(&self, name: &str) -> Result<Option<Setting>, SettingsError>;
    /// Newest first.
    async fn list(&self) -> Result<Vec<Setting>, SettingsError>;
    async fn create(&self, new: NewSetting) -> Result<Setting, SettingsError>;
    async fn update(&self, id: &str, update: SettingUpdate) -> Result<Setting, SettingsError>;
    async fn delete(&self, id: &str) -> Result<(), SettingsError>;
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait VoiceCatalog: Send + Sync {
    async fn voices(&self) -> Result<Vec<Voice>>;
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait AgentProvisioner: Send + Sync {
    /// Creates a remote agent and returns its id.
    async fn create_agent(&self, name: &str, instructions: &str, voice_id: &str) -> Result<String>;

    async fn update_agent(
        &self,
        agent_id: &str,
        instructions: Option<String>,
        voice_id: Option<String>,
    ) -> Result<()>;
}
