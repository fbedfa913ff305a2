//! [`Channel`] over an arbitrary async byte stream.

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{Error, Result};
use crate::protocol::{Codec, Message};
use crate::transport::Channel;

const READ_CHUNK: usize = 8 * 1024;

/// Frames messages with [`Codec`] over any `AsyncRead + AsyncWrite` stream
/// (a TCP socket, a TLS stream, a tunneled byte pipe).
///
/// This is the production counterpart to the in-memory test channels: the
/// embedder opens a byte stream to the gateway, wraps it, and hands the
/// result to the session through a [`Connector`](crate::transport::Connector).
pub struct FramedChannel<S> {
    stream: S,
    inbound: BytesMut,
    closed: bool,
}

impl<S> FramedChannel<S> {
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            inbound: BytesMut::with_capacity(READ_CHUNK),
            closed: false,
        }
    }
}

impl<S> Channel for FramedChannel<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    async fn send(&mut self, msg: &Message) -> Result<()> {
        if self.closed {
            return Err(Error::ConnectionClosed);
        }
        let frame = Codec::encode(msg)?;
        self.stream.write_all(&frame).await?;
        self.stream.flush().await?;
        Ok(())
    }

    async fn recv(&mut self) -> Result<Message> {
        loop {
            if self.closed {
                return Err(Error::ConnectionClosed);
            }
            if let Some(msg) = Codec::decode(&mut self.inbound)? {
                return Ok(msg);
            }
            // EOF with a partial frame buffered means the peer died mid-message.
            let n = self.stream.read_buf(&mut self.inbound).await?;
            if n == 0 {
                return Err(Error::ConnectionClosed);
            }
        }
    }

    fn close(&mut self) {
        self.closed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{KeyEventPayload, PointerEventPayload};

    fn pair() -> (FramedChannel<tokio::io::DuplexStream>, FramedChannel<tokio::io::DuplexStream>) {
        let (a, b) = tokio::io::duplex(64 * 1024);
        (FramedChannel::new(a), FramedChannel::new(b))
    }

    #[tokio::test]
    async fn messages_cross_the_stream_framed() {
        let (mut client, mut server) = pair();

        let msg = Message::PointerEvent(PointerEventPayload {
            x: 10,
            y: 20,
            button_mask: 0x01,
        });
        client.send(&msg).await.unwrap();
        assert_eq!(server.recv().await.unwrap(), msg);
    }

    #[tokio::test]
    async fn back_to_back_messages_stay_distinct() {
        let (mut client, mut server) = pair();

        let press = Message::KeyEvent(KeyEventPayload {
            keysym: 0x61,
            down: true,
        });
        let release = Message::KeyEvent(KeyEventPayload {
            keysym: 0x61,
            down: false,
        });
        client.send(&press).await.unwrap();
        client.send(&release).await.unwrap();

        assert_eq!(server.recv().await.unwrap(), press);
        assert_eq!(server.recv().await.unwrap(), release);
    }

    #[tokio::test]
    async fn peer_hangup_surfaces_connection_closed() {
        let (mut client, server) = pair();
        drop(server);

        let err = client.recv().await.unwrap_err();
        assert!(matches!(err, Error::ConnectionClosed));
    }

    #[tokio::test]
    async fn send_after_close_fails() {
        let (mut client, _server) = pair();
        client.close();

        let err = client
            .send(&Message::Ping { timestamp_ms: 1 })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ConnectionClosed));
    }
}
