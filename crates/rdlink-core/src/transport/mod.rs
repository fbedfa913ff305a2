//! Transport abstractions.
//!
//! The session never talks to a socket directly; it drives a [`Channel`]
//! obtained from a [`Connector`]. The embedding application supplies the real
//! gateway transport, and tests supply an in-memory pair, so every lifecycle
//! path (connect, drop, reconnect) is exercisable without a network.
//!
//! [`FramedChannel`] wraps any async byte stream with the wire codec, so a
//! connector over a plain socket only has to open the stream.

mod framed;

pub use framed::FramedChannel;

use std::future::Future;

use crate::error::Result;
use crate::protocol::Message;

/// A persistent bidirectional message channel to the workspace gateway.
///
/// Framing and codec concerns live behind this trait; the session only sees
/// whole messages. `recv` resolving to an error (or `ConnectionClosed`) is
/// how the session learns the link dropped.
pub trait Channel: Send + 'static {
    /// Send one message to the gateway.
    fn send(&mut self, msg: &Message) -> impl Future<Output = Result<()>> + Send;

    /// Receive the next message from the gateway.
    fn recv(&mut self) -> impl Future<Output = Result<Message>> + Send;

    /// Close the channel. Idempotent; further sends fail.
    fn close(&mut self);
}

/// Factory for channels, one call per connection attempt.
///
/// Injected into the session at creation time. Reconnects call `connect`
/// again on the same connector.
pub trait Connector: Send + Sync + 'static {
    type Channel: Channel;

    /// Open a new channel to the gateway at `addr`.
    fn connect(&self, addr: &str) -> impl Future<Output = Result<Self::Channel>> + Send;
}
