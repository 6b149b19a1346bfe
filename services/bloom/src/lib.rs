pub mod audio;
pub mod config;
pub mod convai_adapter;
pub mod platform;
pub mod settings_store;
