//! Channel-backed message bus

use scenario_core::{MessageBus, TaskId, WireMessage};
use tokio::sync::mpsc;
use tracing::info;

/// A message handed to the bus by a send step
#[derive(Debug, Clone, PartialEq)]
pub struct Outbound {
    pub destination: TaskId,
    pub message: WireMessage,
}

/// Bus writing every sent message to an unbounded channel
///
/// The receiving half belongs to whatever forwards messages to the system
/// under test.
#[derive(Debug, Clone)]
pub struct ChannelBus {
    tx: mpsc::UnboundedSender<Outbound>,
}

impl ChannelBus {
    /// Create a bus and the receiver of its messages
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Outbound>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl MessageBus for ChannelBus {
    fn send(&mut self, destination: &TaskId, message: WireMessage) -> scenario_core::Result<()> {
        info!("Sending {} to {}", message.kind, destination);
        self.tx
            .send(Outbound {
                destination: destination.clone(),
                message,
            })
            .map_err(|_| scenario_core::Error::Bus("outbound channel closed".into()))
    }
}
