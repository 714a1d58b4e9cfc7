//! Page-owned gesture channel.
//!
//! Each open spawns a reader task that exclusively owns the connection. The
//! reader decodes payloads in arrival order and forwards them to the page's
//! event queue. Closing signals the reader, which closes the connection
//! exactly once before exiting. A pending shutdown always wins over a ready
//! message, so nothing is forwarded once `close` has returned.

use std::sync::Arc;

use client_core::{ClientId, GestureConnection, GestureEvent, GestureTransport, TransportError};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

struct Reader {
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

pub struct GestureChannel {
    transport: Arc<dyn GestureTransport>,
    events: mpsc::Sender<GestureEvent>,
    reader: Option<Reader>,
}

impl GestureChannel {
    pub fn new(transport: Arc<dyn GestureTransport>, events: mpsc::Sender<GestureEvent>) -> Self {
        Self {
            transport,
            events,
            reader: None,
        }
    }

    /// Connect for `client_id`. A no-op while a connection is already live.
    pub async fn open(&mut self, client_id: &ClientId) -> Result<(), TransportError> {
        if self.is_open() {
            debug!("Gesture channel already open");
            return Ok(());
        }
        // A reader that ended on its own has already closed its connection.
        self.reader = None;

        let conn = self.transport.connect(client_id).await?;
        let (shutdown, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(read_loop(conn, self.events.clone(), shutdown_rx));
        self.reader = Some(Reader { shutdown, task });
        info!(client_id = %client_id, "Gesture channel opened");
        Ok(())
    }

    /// Close the live connection. Returns `false` when none was held.
    pub fn close(&mut self) -> bool {
        let Some(reader) = self.reader.take() else {
            return false;
        };
        let live = !reader.task.is_finished();
        // The reader may already be gone if the peer hung up.
        let _ = reader.shutdown.send(());
        if live {
            info!("Gesture channel closed");
        }
        live
    }

    pub fn is_open(&self) -> bool {
        self.reader.as_ref().is_some_and(|r| !r.task.is_finished())
    }
}

impl Drop for GestureChannel {
    fn drop(&mut self) {
        self.close();
    }
}

async fn read_loop(
    mut conn: Box<dyn GestureConnection>,
    events: mpsc::Sender<GestureEvent>,
    mut shutdown: oneshot::Receiver<()>,
) {
    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown => break,
            message = conn.next_message() => match message {
                None => {
                    info!("Gesture channel ended by peer");
                    break;
                }
                Some(Err(e)) => {
                    warn!("Gesture channel error: {}", e);
                    break;
                }
                Some(Ok(raw)) => match client_core::parse_message(&raw) {
                    Ok(event) => {
                        tokio::select! {
                            biased;
                            _ = &mut shutdown => break,
                            sent = events.send(event) => if sent.is_err() {
                                break;
                            }
                        }
                    }
                    Err(e) => warn!("Dropping gesture payload {:?}: {}", raw, e),
                },
            },
        }
    }
    conn.close().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use client_core::mock::MockGestureTransport;

    fn client() -> ClientId {
        ClientId::parse("client-1").unwrap()
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    fn channel(transport: &MockGestureTransport) -> (GestureChannel, mpsc::Receiver<GestureEvent>) {
        let (tx, rx) = mpsc::channel(8);
        (GestureChannel::new(Arc::new(transport.clone()), tx), rx)
    }

    #[tokio::test]
    async fn forwards_classified_events_in_order() {
        let transport = MockGestureTransport::new();
        let (mut channel, mut rx) = channel(&transport);
        channel.open(&client()).await.unwrap();
        assert_eq!(transport.client_ids(), vec!["client-1".to_string()]);

        transport.push(r#"{"gesture":"Swipe Right"}"#);
        transport.push("not json");
        transport.push(r#"{"other":"field"}"#);
        transport.push(r#"{"gesture":"120.5,340.2"}"#);

        assert_eq!(
            rx.recv().await,
            Some(GestureEvent::Named("Swipe Right".into()))
        );
        assert_eq!(
            rx.recv().await,
            Some(GestureEvent::Coordinate { x: 120.5, y: 340.2 })
        );
    }

    #[tokio::test]
    async fn close_is_idempotent_and_closes_once() {
        let transport = MockGestureTransport::new();
        let (mut channel, _rx) = channel(&transport);
        channel.open(&client()).await.unwrap();
        assert!(channel.is_open());

        assert!(channel.close());
        assert!(!channel.close());
        settle().await;

        assert!(!channel.is_open());
        assert_eq!(transport.close_count(), 1);
    }

    #[tokio::test]
    async fn nothing_is_forwarded_after_close() {
        let transport = MockGestureTransport::new();
        let (mut channel, mut rx) = channel(&transport);
        channel.open(&client()).await.unwrap();

        transport.push(r#"{"gesture":"Swipe Right"}"#);
        transport.push(r#"{"gesture":"Swipe Left"}"#);
        assert!(channel.close());
        settle().await;

        assert!(rx.try_recv().is_err());
        assert_eq!(transport.close_count(), 1);
    }

    #[tokio::test]
    async fn open_twice_keeps_single_connection() {
        let transport = MockGestureTransport::new();
        let (mut channel, _rx) = channel(&transport);
        channel.open(&client()).await.unwrap();
        channel.open(&client()).await.unwrap();
        assert_eq!(transport.connect_count(), 1);
    }

    #[tokio::test]
    async fn peer_hangup_closes_without_reconnect() {
        let transport = MockGestureTransport::new();
        let (mut channel, _rx) = channel(&transport);
        channel.open(&client()).await.unwrap();

        transport.disconnect();
        settle().await;

        assert!(!channel.is_open());
        assert_eq!(transport.connect_count(), 1);
        assert_eq!(transport.close_count(), 1);
        assert!(!channel.close());
    }

    #[tokio::test]
    async fn connect_failure_leaves_channel_closed() {
        let transport = MockGestureTransport::failing();
        let (mut channel, _rx) = channel(&transport);
        assert!(channel.open(&client()).await.is_err());
        assert!(!channel.is_open());
        assert!(!channel.close());
    }
}
