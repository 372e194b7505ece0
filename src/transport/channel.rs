//! Tokio mpsc channel transport.

use tokio::sync::mpsc;

use crate::transport::Transport;
use crate::{Frame, TransportError};

/// A transport that sends frames to a tokio mpsc channel.
///
/// This is the way to consume encoded frames in-process, for example to
/// hand them to an async network client.
///
/// Writes block the worker thread while the channel is full, so a slow
/// consumer slows the pipeline down instead of losing frames. Capture keeps
/// running meanwhile and is absorbed by the ring buffer. Stopping the
/// stream waits for a blocked write, so keep receiving until `stop`
/// returns, or drop the receiver.
///
/// # Example
///
/// ```
/// use stream_channel::{ChannelTransport, Frame};
/// use tokio::sync::mpsc;
///
/// let (tx, mut rx) = mpsc::channel::<Frame>(100);
/// let transport = ChannelTransport::new(tx);
///
/// // Use transport with Stream builder...
/// // Then receive frames:
/// // while let Some(frame) = rx.recv().await { ... }
/// ```
pub struct ChannelTransport {
    name: String,
    sender: mpsc::Sender<Frame>,
}

impl ChannelTransport {
    /// Creates a new channel transport with the given sender.
    ///
    /// A capacity of 100 frames holds two seconds of 20ms chunks.
    pub fn new(sender: mpsc::Sender<Frame>) -> Self {
        Self {
            name: "channel".to_string(),
            sender,
        }
    }

    /// Creates a new channel transport with a custom name.
    pub fn with_name(name: impl Into<String>, sender: mpsc::Sender<Frame>) -> Self {
        Self {
            name: name.into(),
            sender,
        }
    }
}

impl Transport for ChannelTransport {
    fn name(&self) -> &str {
        &self.name
    }

    fn start(&mut self) -> Result<(), TransportError> {
        if self.sender.is_closed() {
            return Err(TransportError::ChannelClosed);
        }
        Ok(())
    }

    fn write(&mut self, frame: &Frame) -> Result<(), TransportError> {
        // Worker threads are plain OS threads, never inside the runtime
        self.sender
            .blocking_send(frame.clone())
            .map_err(|_| TransportError::ChannelClosed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TrackKind;

    #[tokio::test]
    async fn test_channel_transport_sends_frames() {
        let (tx, mut rx) = mpsc::channel::<Frame>(10);
        let mut transport = ChannelTransport::new(tx);

        let frame = Frame::new(vec![1u8, 2, 3], 20_000, TrackKind::Audio);
        let sent = frame.clone();
        tokio::task::spawn_blocking(move || transport.write(&sent))
            .await
            .unwrap()
            .unwrap();

        let received = rx.recv().await.unwrap();
        assert_eq!(received, frame);
    }

    #[tokio::test]
    async fn test_channel_transport_closed() {
        let (tx, rx) = mpsc::channel::<Frame>(10);
        let mut transport = ChannelTransport::new(tx);
        drop(rx);

        assert!(matches!(transport.start(), Err(TransportError::ChannelClosed)));

        let frame = Frame::new(vec![1u8], 0, TrackKind::Audio);
        let result = tokio::task::spawn_blocking(move || transport.write(&frame))
            .await
            .unwrap();
        assert!(matches!(result, Err(TransportError::ChannelClosed)));
    }

    #[test]
    fn test_channel_transport_custom_name() {
        let (tx, _rx) = mpsc::channel::<Frame>(10);
        let transport = ChannelTransport::with_name("rtmp-relay", tx);
        assert_eq!(transport.name(), "rtmp-relay");
    }
}
