mod client;
mod rest;

pub use client::config::{Config, ConfigBuilder};
pub use client::stats::Stats;
pub use client::{Client, ClientTx, ServerRx, connect, connect_with_capacity};
pub use convai_realtime_types as types;
pub use rest::RestClient;
