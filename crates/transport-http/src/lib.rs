// HTTP transport for remote audio sources

pub mod client;
pub mod fetch;

pub use client::{is_http_url, HttpClient, HttpSettings};
pub use fetch::fetch_to_memory;
