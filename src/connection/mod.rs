//! Connection abstraction (§3, §4.2).
//!
//! A [`Connection`] is a pair of message streams: an [`Outbound`] the owner
//! writes into, and an inbound [`mpsc::Receiver`] the owner reads from, plus
//! an optional error stream. Closing is modelled the same way tokio models
//! it everywhere else: dropping the outbound sender signals end-of-stream to
//! whatever is reading the paired receiver.
//!
//! [`Connection::channel`] is the degenerate base case (§4.2
//! "ChannelConnection"): a single bounded queue whose producer and consumer
//! handles happen to be handed out as one object. [`buffered`] and
//! [`timeout`] wrap an existing `Connection` with a forwarder task; `inproc`
//! builds a symmetric pair from two such queues.

pub mod buffered;
pub mod inproc;
pub mod timeout;

use tokio::sync::mpsc;

use crate::error::{Closed, NodeError};
use crate::message::Message;

/// The write end of a connection. Two concrete shapes exist because the
/// edges that must never block on enqueue (the accept side of a
/// [`timeout::wrap`]) need an unbounded channel, while every other edge
/// needs a bounded one so that backpressure is observable (§5 Backpressure).
#[derive(Debug)]
pub enum Outbound {
    Bounded(mpsc::Sender<Message>),
    Unbounded(mpsc::UnboundedSender<Message>),
}

impl Outbound {
    /// Enqueue `message`. Awaits if the edge is bounded and full; returns
    /// immediately if the edge is unbounded or bounded-with-room.
    pub async fn send(&self, message: Message) -> Result<(), Closed> {
        match self {
            Outbound::Bounded(tx) => tx.send(message).await.map_err(|_| Closed),
            Outbound::Unbounded(tx) => tx.send(message).map_err(|_| Closed),
        }
    }
}

/// A bidirectional message endpoint (§3).
///
/// `errors` is `None` when nothing upstream can produce asynchronous
/// failures — the common case for an unwrapped edge — which is equivalent
/// to the spec's "eternally empty stream".
#[derive(Debug)]
pub struct Connection {
    pub(crate) outbound: Outbound,
    pub(crate) inbound: mpsc::Receiver<Message>,
    pub(crate) errors: Option<mpsc::UnboundedReceiver<NodeError>>,
}

impl Connection {
    /// The base case: a single bounded queue, `Outbound` and inbound both
    /// pointing at the same underlying channel (§4.2 "ChannelConnection").
    /// `capacity` is clamped to at least one since tokio's mpsc forbids a
    /// zero-capacity channel; true rendezvous is not representable, so this
    /// is the closest approximation (documented in DESIGN.md).
    pub fn channel(capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        Self {
            outbound: Outbound::Bounded(tx),
            inbound: rx,
            errors: None,
        }
    }

    /// Build a `Connection` from already-split halves, used by wrappers and
    /// by `Node` when it assembles its user-facing edges.
    pub(crate) fn from_parts(
        outbound: Outbound,
        inbound: mpsc::Receiver<Message>,
        errors: Option<mpsc::UnboundedReceiver<NodeError>>,
    ) -> Self {
        Self {
            outbound,
            inbound,
            errors,
        }
    }

    pub async fn send(&self, message: Message) -> Result<(), Closed> {
        self.outbound.send(message).await
    }

    pub async fn recv(&mut self) -> Option<Message> {
        self.inbound.recv().await
    }

    pub async fn recv_error(&mut self) -> Option<NodeError> {
        match &mut self.errors {
            Some(errors) => errors.recv().await,
            None => std::future::pending().await,
        }
    }

    pub(crate) fn into_parts(
        self,
    ) -> (
        Outbound,
        mpsc::Receiver<Message>,
        Option<mpsc::UnboundedReceiver<NodeError>>,
    ) {
        (self.outbound, self.inbound, self.errors)
    }
}
