//! Message bus seam

use crate::codec::WireMessage;
use crate::error::Result;
use crate::identity::TaskId;

/// Outbound side of the inter-task messaging substrate
///
/// Arrivals travel the other way: the embedding application hands them to the
/// player, which routes them to the scenario that expects them.
pub trait MessageBus: Send {
    /// Deliver a message to a task
    fn send(&mut self, destination: &TaskId, message: WireMessage) -> Result<()>;
}
