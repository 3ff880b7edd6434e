//! Offline sync: the durable pending-action queue.

pub mod queue;

pub use queue::{EnqueueResult, PendingActionQueue, QueueError, QueueStatus};
