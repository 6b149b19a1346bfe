pub mod catalog;
pub mod controller;
pub mod error;
pub mod events;
pub mod manager;
pub mod motion;
pub mod session_state;
pub mod setting;
pub mod timer;
pub mod transport;

pub use controller::SessionController;
pub use error::{CapabilityError, CredentialError, SessionError};
pub use events::{AgentMode, MotionSample, TransportEvent, UserAction};
pub use session_state::{ConnectionStatus, EndReason, SessionOutcome, SessionPhase, SessionState};
pub use setting::{NewSetting, Setting, SettingUpdate, SettingsError};
