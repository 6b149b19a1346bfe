use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const MIN_SENSITIVITY: f64 = 0.0;
pub const MAX_SENSITIVITY: f64 = 5.0;

pub const DEFAULT_INSTRUCTIONS: &str = "# Intro\nYou are an old lawn mower";
pub const DEFAULT_SENSITIVITY: f64 = 0.5;
pub const DEFAULT_SESSION_LENGTH: i64 = 30;

/// A named configuration bundle driving one agent persona.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Setting {
    pub id: String,
    pub name: String,
    pub agent_id: String,
    pub voice_id: String,
    pub instructions: String,
    pub bump_instruction: String,
    pub accelerometer_sensitivity: f64,
    /// Session budget in seconds.
    pub session_length: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields supplied when creating a setting; the store assigns id and timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewSetting {
    pub name: String,
    pub agent_id: String,
    pub voice_id: String,
    pub instructions: String,
    pub bump_instruction: String,
    pub accelerometer_sensitivity: f64,
    pub session_length: i64,
}

impl NewSetting {
    /// A new setting with the stock persona, no bump instruction, 0.5
    /// sensitivity and a thirty second budget.
    pub fn with_defaults(name: &str, agent_id: &str, voice_id: &str) -> Self {
        Self {
            name: name.trim().to_string(),
            agent_id: agent_id.to_string(),
            voice_id: voice_id.to_string(),
            instructions: DEFAULT_INSTRUCTIONS.to_string(),
            bump_instruction: String::new(),
            accelerometer_sensitivity: DEFAULT_SENSITIVITY,
            session_length: DEFAULT_SESSION_LENGTH,
        }
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        validate_name(&self.name)?;
        validate_sensitivity(self.accelerometer_sensitivity)?;
        validate_session_length(self.session_length)
    }

    pub fn into_setting(self, id: String, now: DateTime<Utc>) -> Setting {
        Setting {
            id,
            name: self.name,
            agent_id: self.agent_id,
            voice_id: self.voice_id,
            instructions: self.instructions,
            bump_instruction: self.bump_instruction,
            accelerometer_sensitivity: self.accelerometer_sensitivity,
            session_length: self.session_length,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A partial update. `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SettingUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bump_instruction: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accelerometer_sensitivity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_length: Option<i64>,
}

impl SettingUpdate {
    pub fn is_empty(&self) -> bool {
        *self == SettingUpdate::default()
    }

    /// Whether the remote agent has to be told about this update.
    pub fn touches_agent(&self) -> bool {
        self.instructions.is_some() || self.voice_id.is_some()
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if let Some(name) = &self.name {
            validate_name(name)?;
        }
        if let Some(sensitivity) = self.accelerometer_sensitivity {
            validate_sensitivity(sensitivity)?;
        }
        if let Some(length) = self.session_length {
            validate_session_length(length)?;
        }
        Ok(())
    }

    pub fn apply_to(self, setting: &mut Setting, now: DateTime<Utc>) {
        if let Some(name) = self.name {
            setting.name = name.trim().to_string();
        }
        if let Some(agent_id) = self.agent_id {
            setting.agent_id = agent_id;
        }
        if let Some(voice_id) = self.voice_id {
            setting.voice_id = voice_id;
        }
        if let Some(instructions) = self.instructions {
            setting.instructions = instructions;
        }
        if let Some(bump_instruction) = self.bump_instruction {
            setting.bump_instruction = bump_instruction;
        }
        if let Some(sensitivity) = self.accelerometer_sensitivity {
            setting.accelerometer_sensitivity = sensitivity;
        }
        if let Some(length) = self.session_length {
            setting.session_length = length;
        }
        setting.updated_at = now;
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Name is required")]
    EmptyName,
    #[error("A setting with this name already exists")]
    DuplicateName,
    #[error("Accelerometer sensitivity must be between 0 and 5")]
    SensitivityOutOfRange,
    #[error("Session length must be at least 1 second")]
    SessionLengthTooShort,
    #[error("Settings with id {0} not found")]
    NotFound(String),
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

pub fn validate_name(name: &str) -> Result<(), SettingsError> {
    if name.trim().is_empty() {
        return Err(SettingsError::EmptyName);
    }
    Ok(())
}

pub fn validate_sensitivity(sensitivity: f64) -> Result<(), SettingsError> {
    if !(MIN_SENSITIVITY..=MAX_SENSITIVITY).contains(&sensitivity) {
        return Err(SettingsError::SensitivityOutOfRange);
    }
    Ok(())
}

pub fn validate_session_length(seconds: i64) -> Result<(), SettingsError> {
    if seconds < 1 {
        return Err(SettingsError::SessionLengthTooShort);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_setting() -> Setting {
        NewSetting::with_defaults("Lawn", "agent_1", "voice_1")
            .into_setting("id-1".to_string(), Utc::now())
    }

    #[test]
    fn defaults_match_the_stock_persona() {
        let new = NewSetting::with_defaults("  Lawn  ", "agent_1", "voice_1");
        assert_eq!(new.name, "Lawn");
        assert_eq!(new.instructions, DEFAULT_INSTRUCTIONS);
        assert_eq!(new.bump_instruction, "");
        assert_eq!(new.accelerometer_sensitivity, 0.5);
        assert_eq!(new.session_length, 30);
        assert!(new.validate().is_ok());
    }

    #[test]
    fn sensitivity_is_bounded_by_the_slider_range() {
        assert!(validate_sensitivity(0.0).is_ok());
        assert!(validate_sensitivity(5.0).is_ok());
        assert!(matches!(
            validate_sensitivity(5.01),
            Err(SettingsError::SensitivityOutOfRange)
        ));
        assert!(validate_sensitivity(-0.1).is_err());
        assert!(validate_sensitivity(f64::NAN).is_err());
        assert_eq!(
            SettingsError::SensitivityOutOfRange.to_string(),
            "Accelerometer sensitivity must be between 0 and 5"
        );
    }

    #[test]
    fn update_validation_only_checks_present_fields() {
        let update = SettingUpdate {
            session_length: Some(0),
            ..Default::default()
        };
        assert!(matches!(
            update.validate(),
            Err(SettingsError::SessionLengthTooShort)
        ));

        let update = SettingUpdate {
            name: Some("   ".to_string()),
            ..Default::default()
        };
        assert!(matches!(update.validate(), Err(SettingsError::EmptyName)));

        assert!(SettingUpdate::default().validate().is_ok());
        assert!(SettingUpdate::default().is_empty());
    }

    #[test]
    fn apply_overwrites_only_supplied_fields() {
        let mut setting = sample_setting();
        let before = setting.clone();
        let later = before.updated_at + chrono::Duration::seconds(5);

        let update = SettingUpdate {
            bump_instruction: Some("Tell a joke".to_string()),
            session_length: Some(95),
            ..Default::default()
        };
        assert!(!update.touches_agent());
        update.apply_to(&mut setting, later);

        assert_eq!(setting.bump_instruction, "Tell a joke");
        assert_eq!(setting.session_length, 95);
        assert_eq!(setting.instructions, before.instructions);
        assert_eq!(setting.created_at, before.created_at);
        assert_eq!(setting.updated_at, later);
    }

    #[test]
    fn partial_update_deserializes_from_sparse_json() {
        let update: SettingUpdate =
            serde_json::from_str(r#"{"voice_id":"v2","accelerometer_sensitivity":1.5}"#).unwrap();
        assert_eq!(update.voice_id.as_deref(), Some("v2"));
        assert_eq!(update.accelerometer_sensitivity, Some(1.5));
        assert!(update.name.is_none());
        assert!(update.touches_agent());
    }
}
