pub mod client;
pub mod manifest;

pub use client::ApiClient;
