//! Listener handle for accepting child connections (§3 "Listener").

use tokio::sync::mpsc;

use crate::connection::Connection;

/// A stream of incoming connections a `Node` can be handed via
/// [`crate::node::Node::listen`]. Producing one is outside this crate's
/// scope (§4.2 Non-goals: no network transport) — callers bridge whatever
/// accept loop they have (a TCP listener, a test harness, ...) into a
/// `Sender<Connection>` and keep the paired `Listener` for themselves.
pub type Listener = mpsc::Receiver<Connection>;

/// Convenience constructor matching [`crate::connection::Connection::channel`]'s
/// style: a bounded queue of not-yet-accepted connections.
pub fn channel(capacity: usize) -> (mpsc::Sender<Connection>, Listener) {
    mpsc::channel(capacity.max(1))
}
