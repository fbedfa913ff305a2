//! rdlink-client: the in-process workspace session object.
//!
//! A [`WorkspaceSession`] is one tokio task owning all mutable session state:
//! connection lifecycle with reconnect backoff, control arbitration between
//! human and agent, input forwarding, quality control, and metrics sampling.
//! Callers hold a cloneable [`SessionHandle`] that posts commands over a
//! bounded queue and reads observables from `watch` channels, so every state
//! transition is totally ordered by the actor's single event loop.

mod session;

pub use session::{SessionHandle, WorkspaceSession};
