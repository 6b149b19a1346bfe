use anyhow::Context;
use async_trait::async_trait;
use bloom_core::catalog::SettingsStore;
use bloom_core::{NewSetting, Setting, SettingUpdate, SettingsError};
use chrono::Utc;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

/// Settings persisted as a JSON array in a single file.
///
/// A missing file is an empty store. Writes go to a sibling temp file that is
/// renamed over the original, so a crash never leaves half a document.
pub struct JsonSettingsStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonSettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<Vec<Setting>, SettingsError> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(anyhow::Error::new(e)
                    .context(format!("Failed to read {}", self.path.display()))
                    .into());
            }
        };
        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }
        let settings = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse {}", self.path.display()))?;
        Ok(settings)
    }

    async fn save(&self, settings: &[Setting]) -> Result<(), SettingsError> {
        let json = serde_json::to_string_pretty(settings).context("Failed to serialize settings")?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json)
            .await
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;
        Ok(())
    }
}

fn same_name(a: &str, b: &str) -> bool {
    a.trim() == b.trim()
}

#[async_trait]
impl SettingsStore for JsonSettingsStore {
    async fn get(&self, id: &str) -> Result<Option<Setting>, SettingsError> {
        let _guard = self.lock.lock().await;
        Ok(self.load().await?.into_iter().find(|s| s.id == id))
    }

    async fn get_by_name(&self, name: &str) -> Result<Option<Setting>, SettingsError> {
        let _guard = self.lock.lock().await;
        Ok(self
            .load()
            .await?
            .into_iter()
            .find(|s| same_name(&s.name, name)))
    }

    async fn list(&self) -> Result<Vec<Setting>, SettingsError> {
        let _guard = self.lock.lock().await;
        let mut settings = self.load().await?;
        settings.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(settings)
    }

    async fn create(&self, new: NewSetting) -> Result<Setting, SettingsError> {
        new.validate()?;
        let _guard = self.lock.lock().await;
        let mut settings = self.load().await?;
        if settings.iter().any(|s| same_name(&s.name, &new.name)) {
            return Err(SettingsError::DuplicateName);
        }
        let setting = new.into_setting(uuid::Uuid::new_v4().to_string(), Utc::now());
        settings.push(setting.clone());
        self.save(&settings).await?;
        tracing::debug!(id = %setting.id, "setting stored");
        Ok(setting)
    }

    async fn update(&self, id: &str, update: SettingUpdate) -> Result<Setting, SettingsError> {
        update.validate()?;
        let _guard = self.lock.lock().await;
        let mut settings = self.load().await?;
        if let Some(name) = &update.name {
            if settings.iter().any(|s| s.id != id && same_name(&s.name, name)) {
                return Err(SettingsError::DuplicateName);
            }
        }
        let setting = settings
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| SettingsError::NotFound(id.to_string()))?;
        update.apply_to(setting, Utc::now());
        let updated = setting.clone();
        self.save(&settings).await?;
        Ok(updated)
    }

    async fn delete(&self, id: &str) -> Result<(), SettingsError> {
        let _guard = self.lock.lock().await;
        let mut settings = self.load().await?;
        let before = settings.len();
        settings.retain(|s| s.id != id);
        if settings.len() == before {
            return Err(SettingsError::NotFound(id.to_string()));
        }
        self.save(&settings).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(dir: &tempfile::TempDir) -> JsonSettingsStore {
        JsonSettingsStore::new(dir.path().join("settings.json"))
    }

    #[tokio::test]
    async fn missing_file_is_an_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        assert!(store.list().await.unwrap().is_empty());
        assert!(store.get("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn settings_survive_a_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let created = store(&dir)
            .create(NewSetting::with_defaults("Lawn", "agent_1", "voice_1"))
            .await
            .unwrap();
        assert!(!created.id.is_empty());

        let reopened = store(&dir);
        assert_eq!(reopened.get(&created.id).await.unwrap(), Some(created.clone()));
        assert_eq!(reopened.get_by_name(" Lawn ").await.unwrap(), Some(created));
        assert!(!dir.path().join("settings.json.tmp").exists());
    }

    #[tokio::test]
    async fn list_is_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        let first = store
            .create(NewSetting::with_defaults("First", "a1", "v1"))
            .await
            .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let second = store
            .create(NewSetting::with_defaults("Second", "a2", "v2"))
            .await
            .unwrap();

        let ids: Vec<String> = store.list().await.unwrap().into_iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![second.id, first.id]);
    }

    #[tokio::test]
    async fn names_stay_unique() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        store
            .create(NewSetting::with_defaults("Lawn", "a1", "v1"))
            .await
            .unwrap();
        let other = store
            .create(NewSetting::with_defaults("Garden", "a2", "v2"))
            .await
            .unwrap();

        let err = store
            .create(NewSetting::with_defaults("Lawn", "a3", "v3"))
            .await
            .unwrap_err();
        assert!(matches!(err, SettingsError::DuplicateName));

        let rename = SettingUpdate {
            name: Some("Lawn".to_string()),
            ..Default::default()
        };
        let err = store.update(&other.id, rename).await.unwrap_err();
        assert!(matches!(err, SettingsError::DuplicateName));

        // Keeping your own name is fine.
        let same = SettingUpdate {
            name: Some("Garden".to_string()),
            ..Default::default()
        };
        store.update(&other.id, same).await.unwrap();
    }

    #[tokio::test]
    async fn update_applies_and_validates() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        let created = store
            .create(NewSetting::with_defaults("Lawn", "a1", "v1"))
            .await
            .unwrap();

        let update = SettingUpdate {
            bump_instruction: Some("Someone shook you!".to_string()),
            session_length: Some(90),
            ..Default::default()
        };
        let updated = store.update(&created.id, update).await.unwrap();
        assert_eq!(updated.bump_instruction, "Someone shook you!");
        assert_eq!(updated.session_length, 90);
        assert_eq!(updated.created_at, created.created_at);
        assert!(updated.updated_at >= created.updated_at);

        let invalid = SettingUpdate {
            accelerometer_sensitivity: Some(7.5),
            ..Default::default()
        };
        let err = store.update(&created.id, invalid).await.unwrap_err();
        assert!(matches!(err, SettingsError::SensitivityOutOfRange));
        assert_eq!(store.get(&created.id).await.unwrap(), Some(updated));
    }

    #[tokio::test]
    async fn unknown_ids_are_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        let err = store
            .update("missing", SettingUpdate::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SettingsError::NotFound(id) if id == "missing"));
        assert!(matches!(
            store.delete("missing").await.unwrap_err(),
            SettingsError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn delete_removes_the_setting() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        let created = store
            .create(NewSetting::with_defaults("Lawn", "a1", "v1"))
            .await
            .unwrap();
        store.delete(&created.id).await.unwrap();
        assert!(store.get(&created.id).await.unwrap().is_none());
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn corrupt_files_are_storage_errors() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("settings.json"), "{not json").unwrap();
        let err = store(&dir).list().await.unwrap_err();
        assert!(matches!(err, SettingsError::Storage(_)));
        assert!(err.to_string().contains("Failed to parse"));
    }
}
