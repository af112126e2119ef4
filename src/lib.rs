//! *cast*: a gossip-style message bus for trees of peers.
//!
//! A [`node::Node`] owns a single parent [`connection::Connection`], an
//! arbitrary set of children, and two user-facing edges (Send, Receive).
//! Any message injected anywhere in the tree is flooded to every other
//! reachable node exactly once, and never back out the edge it arrived on.
//!
//! Start with [`node::Node::new`]; attach a parent with
//! [`node::Node::join`] and a source of children with
//! [`node::Node::listen`].

pub mod connection;
pub mod error;
pub mod listener;
pub mod message;
pub mod node;
pub mod options;

pub use connection::Connection;
pub use error::{AlreadyListening, Closed, NodeError};
pub use listener::Listener;
pub use message::Message;
pub use node::{ErrorHandle, Node, ReceiveHandle, SendHandle};
pub use options::Options;
