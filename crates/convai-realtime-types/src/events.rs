pub mod client;
pub mod server;

pub use client::ClientEvent;
pub use server::ServerEvent;
