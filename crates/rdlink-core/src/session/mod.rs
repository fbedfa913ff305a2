//! Session state, configuration, and reconnect policy.

mod config;
mod reconnect;
mod state;

pub use config::SessionConfig;
pub use reconnect::BackoffPolicy;
pub use state::ConnectionState;
