//! The tree relay (§4.3 "Node").
//!
//! [`Node::new`] spawns exactly one dispatcher task, which is the sole owner
//! of `parent`, `children`, and `listener` (§4.3 Concurrency-safety). Every
//! other task — one reader per child, one forwarder per wrapped edge's error
//! stream — only ever pushes events into the dispatcher's channels; nothing
//! outside the dispatcher task mutates node state directly.
//!
//! The dispatcher's multi-way wait (§4.3 "Dispatcher algorithm") is built
//! the way a language without a variadic select would have to build it
//! (§9 "Coroutine abstraction"): a fixed set of `tokio::select!` branches
//! for the at-most-one-at-a-time edges (control, user-send, parent,
//! listener), plus a single unbounded channel that dynamically-many
//! children funnel their events into, since `select!` branches can't be
//! generated at runtime.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, trace, warn};

use crate::connection::{buffered, timeout as timeout_wrap, Connection, Outbound};
use crate::error::{AlreadyListening, Closed, NodeError};
use crate::listener::Listener;
use crate::message::Message;
use crate::options::Options;

/// Handle to the write end of a node's user-facing Send queue (§6).
///
/// Dropping this handle closes the edge, which is the graceful-shutdown
/// signal (§3 Lifecycles, §4.3 "Graceful shutdown").
#[derive(Debug)]
pub struct SendHandle(Outbound);

impl SendHandle {
    pub async fn send(&self, message: Message) -> Result<(), Closed> {
        self.0.send(message).await
    }
}

/// Handle to the read end of a node's user-facing Receive queue (§6).
#[derive(Debug)]
pub struct ReceiveHandle(mpsc::Receiver<Message>);

impl ReceiveHandle {
    pub async fn recv(&mut self) -> Option<Message> {
        self.0.recv().await
    }
}

/// Handle to the read end of a node's Error stream (§6, §7).
#[derive(Debug)]
pub struct ErrorHandle(mpsc::Receiver<NodeError>);

impl ErrorHandle {
    pub async fn recv(&mut self) -> Option<NodeError> {
        self.0.recv().await
    }
}

#[derive(Clone)]
struct ErrorPublisher(mpsc::Sender<NodeError>);

impl ErrorPublisher {
    fn publish(&self, error: NodeError) {
        if let Err(mpsc::error::TrySendError::Full(error)) = self.0.try_send(error) {
            warn!(?error, "error stream full, dropping error");
        }
        // A `Closed` try-send result means nobody is reading `Node`'s error
        // stream at all; per §7 that is the consumer's own risk, not the
        // node's problem, so there is nothing further to do here.
    }
}

fn spawn_error_forwarder(
    mut errors: mpsc::UnboundedReceiver<NodeError>,
    publisher: ErrorPublisher,
) {
    tokio::spawn(async move {
        while let Some(error) = errors.recv().await {
            publisher.publish(error);
        }
    });
}

/// Wrap `connection` per an edge's buffer/timeout configuration. Buffer is
/// applied innermost, timeout outermost (§4.1): `Node` never builds a
/// `BufferedConnection` around a `TimeoutConnection`.
fn wrap_edge(connection: Connection, buffer: usize, timeout: Duration) -> Connection {
    let connection = if buffer > 0 {
        buffered::wrap(connection, buffer)
    } else {
        connection
    };
    if timeout > Duration::ZERO {
        timeout_wrap::wrap(connection, timeout)
    } else {
        connection
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct ChildId(u64);

/// The parent edge as the dispatcher sees it: a write half for fan-out and a
/// read half polled directly in the main `select!` (§4.3 treats "at most
/// one parent" the same way it treats "at most one listener" — a fixed
/// slot, not a dynamic collection).
struct ParentEdge {
    outbound: Outbound,
    inbound: mpsc::Receiver<Message>,
}

enum Control {
    Join(Connection, oneshot::Sender<()>),
    Listen(Listener, oneshot::Sender<Result<(), AlreadyListening>>),
}

enum ChildEvent {
    Message(ChildId, Message),
    Closed(ChildId),
}

/// Where a message being fanned out came from, so it is never sent back out
/// the edge it arrived on (§3 "Source suppression", §5 "strict").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Source {
    User,
    Parent,
    Child(ChildId),
}

/// A participant in the cast tree (§3, §4.3).
///
/// `Node` itself is only a handle onto the control channel; the actual
/// relay state lives in the dispatcher task spawned by [`Node::new`] and
/// never crosses a task boundary.
pub struct Node {
    control: mpsc::UnboundedSender<Control>,
}

impl Node {
    /// Allocate a node's user-facing edges and error stream, and start its
    /// dispatcher. No network-shaped operation happens until [`Node::join`]
    /// or [`Node::listen`] is called.
    pub fn new(opt: Options) -> (Node, SendHandle, ReceiveHandle, ErrorHandle) {
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        let (child_events_tx, child_events_rx) = mpsc::unbounded_channel();

        let user_send_base = Connection::channel(1);
        let user_send_edge = wrap_edge(user_send_base, opt.send_buffer, opt.send_timeout);
        let (user_send_outbound, user_send_inbound, user_send_errors) =
            user_send_edge.into_parts();

        let user_receive_base = Connection::channel(1);
        let user_receive_edge =
            wrap_edge(user_receive_base, opt.receive_buffer, opt.receive_timeout);
        let (user_receive_outbound, user_receive_inbound, user_receive_errors) =
            user_receive_edge.into_parts();

        let (error_tx, error_rx) = mpsc::channel(opt.error_buffer.max(1));
        let publisher = ErrorPublisher(error_tx);

        if let Some(errors) = user_send_errors {
            spawn_error_forwarder(errors, publisher.clone());
        }
        if let Some(errors) = user_receive_errors {
            spawn_error_forwarder(errors, publisher.clone());
        }

        let dispatcher = Dispatcher {
            opt,
            parent: None,
            children: HashMap::new(),
            next_child_id: 0,
            listener: None,
            control: control_rx,
            user_send: user_send_inbound,
            user_receive: user_receive_outbound,
            child_events_tx,
            child_events: child_events_rx,
            publisher,
        };
        tokio::spawn(dispatcher.run());

        (
            Node { control: control_tx },
            SendHandle(user_send_outbound),
            ReceiveHandle(user_receive_inbound),
            ErrorHandle(error_rx),
        )
    }

    /// Install `connection` as the parent edge. A previously-installed
    /// parent's Outbound is closed first (§3 Lifecycles, §9 Open Questions:
    /// this is a synchronous replace, no `Disconnected` is emitted for it).
    /// Resolves once the dispatcher has accepted the change; if the node
    /// has already shut down, resolves immediately.
    pub async fn join(&self, connection: Connection) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.control.send(Control::Join(connection, ack_tx)).is_err() {
            return;
        }
        let _ = ack_rx.await;
    }

    /// Install `listener` as the source of child connections. Calling this
    /// while a listener is already installed is the one recoverable
    /// programmer error the contract names (§4.3, §7) — turned into a
    /// typed `Err` rather than aborting the process (see DESIGN.md).
    pub async fn listen(&self, listener: Listener) -> Result<(), AlreadyListening> {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self
            .control
            .send(Control::Listen(listener, ack_tx))
            .is_err()
        {
            return Ok(());
        }
        ack_rx.await.unwrap_or(Ok(()))
    }
}

struct Dispatcher {
    opt: Options,
    parent: Option<ParentEdge>,
    children: HashMap<ChildId, Outbound>,
    next_child_id: u64,
    listener: Option<Listener>,
    control: mpsc::UnboundedReceiver<Control>,
    user_send: mpsc::Receiver<Message>,
    user_receive: Outbound,
    child_events_tx: mpsc::UnboundedSender<ChildEvent>,
    child_events: mpsc::UnboundedReceiver<ChildEvent>,
    publisher: ErrorPublisher,
}

/// Mirrors Go's "a nil channel blocks forever in a select" idiom (§9) for
/// the at-most-one parent edge: when there is no parent, this branch simply
/// never becomes ready instead of needing special-cased control flow.
async fn recv_message(edge: &mut Option<ParentEdge>) -> Option<Message> {
    match edge {
        Some(edge) => edge.inbound.recv().await,
        None => std::future::pending().await,
    }
}

async fn recv_connection(listener: &mut Option<Listener>) -> Option<Connection> {
    match listener {
        Some(listener) => listener.recv().await,
        None => std::future::pending().await,
    }
}

/// Dropping every [`Node`] handle only means no more `Join`/`Listen` calls
/// can ever arrive — it is not the shutdown signal (only closing `Send` is,
/// §3 Lifecycles). Once the control channel closes, this future is simply
/// never ready again, the same "closed stays closed, harmlessly" treatment
/// `recv_message`/`recv_connection` give an absent parent or listener.
async fn recv_control(control: &mut mpsc::UnboundedReceiver<Control>) -> Control {
    match control.recv().await {
        Some(control) => control,
        None => std::future::pending().await,
    }
}

impl Dispatcher {
    async fn run(mut self) {
        loop {
            tokio::select! {
                control = recv_control(&mut self.control) => {
                    self.handle_control(control).await;
                }
                message = self.user_send.recv() => {
                    match message {
                        Some(message) => self.fan_out(Source::User, message).await,
                        None => {
                            debug!("user closed send stream, shutting down");
                            break;
                        }
                    }
                }
                message = recv_message(&mut self.parent) => {
                    match message {
                        Some(message) => self.fan_out(Source::Parent, message).await,
                        None => {
                            self.parent = None;
                            self.publisher.publish(NodeError::Disconnected);
                        }
                    }
                }
                connection = recv_connection(&mut self.listener) => {
                    match connection {
                        Some(connection) => self.add_child(connection),
                        None => {
                            self.listener = None;
                            self.children.clear();
                            self.publisher.publish(NodeError::ListenerDisconnected);
                        }
                    }
                }
                event = self.child_events.recv() => {
                    match event {
                        Some(ChildEvent::Message(id, message)) => {
                            if self.children.contains_key(&id) {
                                self.fan_out(Source::Child(id), message).await;
                            }
                        }
                        Some(ChildEvent::Closed(id)) => {
                            self.children.remove(&id);
                        }
                        None => unreachable!("dispatcher holds a child_events_tx clone"),
                    }
                }
            }
        }
        self.shutdown();
    }

    async fn handle_control(&mut self, control: Control) {
        match control {
            Control::Join(connection, ack) => {
                self.install_parent(connection);
                let _ = ack.send(());
            }
            Control::Listen(listener, ack) => {
                let result = if self.listener.is_some() {
                    Err(AlreadyListening)
                } else {
                    self.listener = Some(listener);
                    Ok(())
                };
                let _ = ack.send(result);
            }
        }
    }

    fn install_parent(&mut self, connection: Connection) {
        let wrapped = wrap_edge(connection, self.opt.parent_buffer, self.opt.parent_timeout);
        let (outbound, inbound, errors) = wrapped.into_parts();
        if let Some(errors) = errors {
            spawn_error_forwarder(errors, self.publisher.clone());
        }
        // Assigning over `self.parent` drops the previous `ParentEdge`
        // (if any), which drops its `Outbound` and closes it synchronously.
        self.parent = Some(ParentEdge { outbound, inbound });
    }

    fn add_child(&mut self, connection: Connection) {
        let wrapped = wrap_edge(connection, self.opt.child_buffer, self.opt.child_timeout);
        let (outbound, mut inbound, errors) = wrapped.into_parts();

        if let Some(errors) = errors {
            spawn_error_forwarder(errors, self.publisher.clone());
        }

        let id = ChildId(self.next_child_id);
        self.next_child_id += 1;
        self.children.insert(id, outbound);

        let events = self.child_events_tx.clone();
        tokio::spawn(async move {
            while let Some(message) = inbound.recv().await {
                if events.send(ChildEvent::Message(id, message)).is_err() {
                    return;
                }
            }
            let _ = events.send(ChildEvent::Closed(id));
        });
    }

    /// Write `message` to every edge in `{parent} ∪ children ∪ {userReceive}`
    /// except the one it came from (§3, §4.3 step 1-4). Sends are
    /// serialized, which the contract explicitly allows (§4.3 step 3):
    /// non-stalling is a property of how each edge is wrapped, not of the
    /// dispatcher's own scheduling.
    async fn fan_out(&mut self, source: Source, message: Message) {
        if source != Source::User {
            if self.user_receive.send(message.clone()).await.is_err() {
                trace!("user receive edge closed, dropping delivery to user");
            }
        }

        if source != Source::Parent {
            if let Some(parent) = &self.parent {
                if parent.outbound.send(message.clone()).await.is_err() {
                    trace!("parent edge closed mid fan-out");
                }
            }
        }

        for (&id, outbound) in &self.children {
            if Source::Child(id) == source {
                continue;
            }
            if outbound.send(message.clone()).await.is_err() {
                trace!(?id, "child edge closed mid fan-out");
            }
        }
    }

    /// §4.3 "Graceful shutdown": close parent, then user-receive, then every
    /// child, in that order, then stop.
    fn shutdown(mut self) {
        self.parent.take();
        drop(self.user_receive);
        self.children.clear();
    }
}
