//! In-memory mock gateway transport.
//!
//! A `MockConnector` hands the session an in-memory channel per connection
//! attempt; the matching gateway halves arrive at the `MockGateway` so a test
//! can script the other side of the conversation. Dropping a `GatewayLink`
//! closes the link, which is how tests simulate a connection loss.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use rdlink_core::constants::PROTOCOL_VERSION;
use rdlink_core::error::{Error, Result};
use rdlink_core::protocol::{HelloAckPayload, HelloPayload, Message, SessionId};
use rdlink_core::transport::{Channel, Connector};

/// One half of an in-memory message channel.
#[derive(Debug)]
pub struct MockChannel {
    tx: mpsc::Sender<Message>,
    rx: mpsc::Receiver<Message>,
    closed: bool,
}

impl MockChannel {
    /// Create a connected pair of channel halves.
    pub fn pair() -> (MockChannel, MockChannel) {
        let (tx_a, rx_a) = mpsc::channel(64);
        let (tx_b, rx_b) = mpsc::channel(64);
        (
            MockChannel {
                tx: tx_a,
                rx: rx_b,
                closed: false,
            },
            MockChannel {
                tx: tx_b,
                rx: rx_a,
                closed: false,
            },
        )
    }
}

impl Channel for MockChannel {
    async fn send(&mut self, msg: &Message) -> Result<()> {
        if self.closed {
            return Err(Error::ConnectionClosed);
        }
        self.tx
            .send(msg.clone())
            .await
            .map_err(|_| Error::ConnectionClosed)
    }

    async fn recv(&mut self) -> Result<Message> {
        if self.closed {
            return Err(Error::ConnectionClosed);
        }
        self.rx.recv().await.ok_or(Error::ConnectionClosed)
    }

    fn close(&mut self) {
        self.closed = true;
    }
}

/// Connector producing in-memory channels; the gateway halves arrive at the
/// paired [`MockGateway`].
#[derive(Debug, Clone)]
pub struct MockConnector {
    incoming_tx: mpsc::Sender<MockChannel>,
    fail_next: Arc<AtomicU32>,
    connect_count: Arc<AtomicU32>,
}

impl MockConnector {
    /// Make the next `n` connection attempts fail with a transport error.
    pub fn fail_next_connects(&self, n: u32) {
        self.fail_next.store(n, Ordering::SeqCst);
    }

    /// Total `connect` calls observed, including failed ones.
    pub fn connect_count(&self) -> u32 {
        self.connect_count.load(Ordering::SeqCst)
    }
}

impl Connector for MockConnector {
    type Channel = MockChannel;

    async fn connect(&self, addr: &str) -> Result<MockChannel> {
        self.connect_count.fetch_add(1, Ordering::SeqCst);

        let remaining = self.fail_next.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_next.store(remaining - 1, Ordering::SeqCst);
            return Err(Error::Transport {
                message: format!("simulated connect failure to {addr}"),
            });
        }

        let (client, gateway) = MockChannel::pair();
        self.incoming_tx
            .send(gateway)
            .await
            .map_err(|_| Error::ConnectionClosed)?;
        Ok(client)
    }
}

/// The gateway side of the mock transport.
#[derive(Debug)]
pub struct MockGateway {
    incoming_rx: mpsc::Receiver<MockChannel>,
}

impl MockGateway {
    /// Wait for the next connection attempt from the client.
    pub async fn accept(&mut self) -> GatewayLink {
        let channel = self
            .incoming_rx
            .recv()
            .await
            .unwrap_or_else(|| panic!("connector dropped before a connection arrived"));
        GatewayLink { channel }
    }
}

/// Create a connected connector/gateway pair.
pub fn mock_gateway() -> (MockConnector, MockGateway) {
    let (incoming_tx, incoming_rx) = mpsc::channel(16);
    (
        MockConnector {
            incoming_tx,
            fail_next: Arc::new(AtomicU32::new(0)),
            connect_count: Arc::new(AtomicU32::new(0)),
        },
        MockGateway { incoming_rx },
    )
}

/// One accepted connection, seen from the gateway side.
///
/// Dropping the link closes it; the client observes `ConnectionClosed`.
#[derive(Debug)]
pub struct GatewayLink {
    channel: MockChannel,
}

impl GatewayLink {
    /// Receive the next message from the client.
    pub async fn recv(&mut self) -> Result<Message> {
        self.channel.recv().await
    }

    /// Send a message to the client.
    pub async fn send(&mut self, msg: &Message) -> Result<()> {
        self.channel.send(msg).await
    }

    /// Read the client's Hello, panicking on anything else.
    pub async fn expect_hello(&mut self) -> HelloPayload {
        match self.channel.recv().await {
            Ok(Message::Hello(hello)) => hello,
            other => panic!("expected Hello, got {other:?}"),
        }
    }

    /// Complete the handshake by accepting the client's Hello.
    ///
    /// Returns the hello so tests can assert on token and resume id.
    pub async fn accept_hello(&mut self, session_id: SessionId) -> HelloPayload {
        let hello = self.expect_hello().await;
        let ack = HelloAckPayload {
            protocol_version: PROTOCOL_VERSION.min(hello.protocol_version),
            accepted: true,
            reject_reason: None,
            session_id: Some(session_id),
            width: 1280,
            height: 800,
            name: "mock workspace".to_string(),
        };
        self.channel
            .send(&Message::HelloAck(ack))
            .await
            .unwrap_or_else(|e| panic!("mock gateway failed to send ack: {e}"));
        hello
    }

    /// Reject the client's Hello with a reason.
    pub async fn reject_hello(&mut self, reason: &str) {
        let _ = self.expect_hello().await;
        let ack = HelloAckPayload {
            protocol_version: PROTOCOL_VERSION,
            accepted: false,
            reject_reason: Some(reason.to_string()),
            session_id: None,
            width: 0,
            height: 0,
            name: String::new(),
        };
        let _ = self.channel.send(&Message::HelloAck(ack)).await;
    }

    /// Receive the next message that is not a Ping, answering pings with
    /// pongs along the way.
    pub async fn recv_non_ping(&mut self) -> Result<Message> {
        loop {
            match self.channel.recv().await? {
                Message::Ping { timestamp_ms } => {
                    self.channel.send(&Message::Pong { timestamp_ms }).await?;
                }
                other => return Ok(other),
            }
        }
    }
}

/// A spawned gateway that accepts every connection with a stable session id,
/// answers pings, and records everything else the client sends.
#[derive(Debug)]
pub struct AutoGateway {
    session_id: SessionId,
    received: Arc<Mutex<Vec<Message>>>,
    handle: tokio::task::JoinHandle<()>,
}

impl AutoGateway {
    /// Spawn the auto-responder over a gateway.
    pub fn spawn(mut gateway: MockGateway) -> Self {
        let session_id = SessionId::new();
        let received: Arc<Mutex<Vec<Message>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&received);

        let handle = tokio::spawn(async move {
            loop {
                let mut link = gateway.accept().await;
                link.accept_hello(session_id).await;
                loop {
                    match link.recv().await {
                        Ok(Message::Ping { timestamp_ms }) => {
                            if link.send(&Message::Pong { timestamp_ms }).await.is_err() {
                                break;
                            }
                        }
                        Ok(msg) => {
                            if let Ok(mut recorded) = sink.lock() {
                                recorded.push(msg);
                            }
                        }
                        Err(_) => break,
                    }
                }
            }
        });

        Self {
            session_id,
            received,
            handle,
        }
    }

    /// The session id every handshake is answered with.
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// Messages the client has sent, excluding pings.
    pub fn received(&self) -> Vec<Message> {
        self.received
            .lock()
            .map(|recorded| recorded.clone())
            .unwrap_or_default()
    }
}

impl Drop for AutoGateway {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rdlink_core::constants::AUTH_TOKEN_LEN;
    use rdlink_core::protocol::Capabilities;

    #[tokio::test]
    async fn channel_pair_carries_messages_both_ways() {
        let (mut a, mut b) = MockChannel::pair();

        a.send(&Message::Ping { timestamp_ms: 5 }).await.unwrap();
        assert_eq!(b.recv().await.unwrap(), Message::Ping { timestamp_ms: 5 });

        b.send(&Message::Pong { timestamp_ms: 5 }).await.unwrap();
        assert_eq!(a.recv().await.unwrap(), Message::Pong { timestamp_ms: 5 });
    }

    #[tokio::test]
    async fn dropped_peer_surfaces_connection_closed() {
        let (mut a, b) = MockChannel::pair();
        drop(b);

        let err = a.recv().await.unwrap_err();
        assert!(matches!(err, Error::ConnectionClosed));
    }

    #[tokio::test]
    async fn closed_channel_refuses_io() {
        let (mut a, _b) = MockChannel::pair();
        a.close();
        assert!(a.send(&Message::Ping { timestamp_ms: 0 }).await.is_err());
        assert!(a.recv().await.is_err());
    }

    #[tokio::test]
    async fn connector_delivers_gateway_half() {
        let (connector, mut gateway) = mock_gateway();

        let mut client = connector.connect("gw:1").await.unwrap();
        let mut link = gateway.accept().await;

        client.send(&Message::Ping { timestamp_ms: 1 }).await.unwrap();
        assert_eq!(link.recv().await.unwrap(), Message::Ping { timestamp_ms: 1 });
        assert_eq!(connector.connect_count(), 1);
    }

    #[tokio::test]
    async fn scripted_connect_failures() {
        let (connector, _gateway) = mock_gateway();
        connector.fail_next_connects(2);

        assert!(connector.connect("gw:1").await.is_err());
        assert!(connector.connect("gw:1").await.is_err());
        assert!(connector.connect("gw:1").await.is_ok());
        assert_eq!(connector.connect_count(), 3);
    }

    #[tokio::test]
    async fn accept_hello_completes_handshake() {
        let (connector, mut gateway) = mock_gateway();
        let session_id = SessionId::new();

        let mut client = connector.connect("gw:1").await.unwrap();
        let client_task = async {
            client
                .send(&Message::Hello(HelloPayload {
                    protocol_version: PROTOCOL_VERSION,
                    auth_token: [1u8; AUTH_TOKEN_LEN],
                    capabilities: Capabilities::default(),
                    resume_session: None,
                }))
                .await
                .unwrap();
            client.recv().await.unwrap()
        };

        let gateway_task = async {
            let mut link = gateway.accept().await;
            link.accept_hello(session_id).await
        };

        let (reply, hello) = tokio::join!(client_task, gateway_task);
        assert_eq!(hello.auth_token, [1u8; AUTH_TOKEN_LEN]);
        match reply {
            Message::HelloAck(ack) => {
                assert!(ack.accepted);
                assert_eq!(ack.session_id, Some(session_id));
            }
            other => panic!("expected HelloAck, got {other:?}"),
        }
    }
}
