//now people using the types library can use these types
pub mod audio;
pub mod events;
pub mod rest;
pub mod tools;

//re-export types for easier access
pub use audio::{AudioFormat, Base64EncodedAudioBytes};
pub use events::{ClientEvent, ServerEvent};
pub use tools::{ClientToolCall, ClientToolResult};
