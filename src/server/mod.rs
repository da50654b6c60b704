//! HTTP server for interactions, platform events and status

pub mod http;

pub use http::{run, AppState};
