//! HTTP API client for the unitver server

pub mod client;
pub mod endpoints;
pub mod types;

pub use client::ApiClient;
