//! Timeout connection wrapper (§4.2 "TimeoutConnection").

use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio::time::sleep_until;

use super::{Connection, Outbound};
use crate::error::NodeError;
use crate::message::Message;

struct Pending {
    message: Message,
    deadline: Instant,
}

/// Wrap `inner` so that every message enqueued onto the wrapper's outbound
/// is tagged with a deadline of `now + duration` at the moment it is
/// *accepted*, not at the moment it is processed.
///
/// The wrapper's own outbound is unbounded by design: the whole point of a
/// timeout edge is to convert backpressure into bounded-latency loss rather
/// than into blocking (§5 Backpressure), so accepting a send must never
/// itself block. A single forwarder task then processes the queue strictly
/// FIFO, racing the head message's delivery against its deadline (§4.2
/// steps 1-4). Because the deadline started at acceptance, a message stuck
/// behind slow predecessors can already be expired by the time it becomes
/// the head — the head-of-line drop the spec's rationale accepts as the
/// price of preserving delivery order.
pub fn wrap(inner: Connection, duration: Duration) -> Connection {
    let (inner_outbound, inner_inbound, inner_errors) = inner.into_parts();
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
    let (error_tx, error_rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        let inner_outbound = inner_outbound;
        let mut pending: Option<Pending> = None;
        loop {
            let head = match pending.take() {
                Some(head) => head,
                None => match rx.recv().await {
                    Some(message) => Pending {
                        message,
                        deadline: Instant::now() + duration,
                    },
                    None => break,
                },
            };

            if Instant::now() >= head.deadline {
                let _ = error_tx.send(NodeError::Timeout(head.message));
            } else {
                tokio::select! {
                    result = inner_outbound.send(head.message.clone()) => {
                        if result.is_err() {
                            break;
                        }
                    }
                    _ = sleep_until(head.deadline.into()) => {
                        let _ = error_tx.send(NodeError::Timeout(head.message));
                    }
                }
            }

            // drain anything that arrived while we were racing the head,
            // preserving FIFO order among delivered messages.
            while pending.is_none() {
                match rx.try_recv() {
                    Ok(message) => {
                        pending = Some(Pending {
                            message,
                            deadline: Instant::now() + duration,
                        });
                        break;
                    }
                    Err(mpsc::error::TryRecvError::Empty) => break,
                    Err(mpsc::error::TryRecvError::Disconnected) => {
                        rx.close();
                        break;
                    }
                }
            }
        }
    });

    let errors = match inner_errors {
        // no inner error stream: the wrapper's own timeouts are the only
        // errors this edge can produce.
        None => error_rx,
        Some(mut inner_errors) => {
            let (merged_tx, merged_rx) = mpsc::unbounded_channel();
            let merged_tx2 = merged_tx.clone();
            tokio::spawn(async move {
                while let Some(e) = inner_errors.recv().await {
                    if merged_tx2.send(e).is_err() {
                        break;
                    }
                }
            });
            tokio::spawn(async move {
                let mut error_rx = error_rx;
                while let Some(e) = error_rx.recv().await {
                    if merged_tx.send(e).is_err() {
                        break;
                    }
                }
            });
            merged_rx
        }
    };

    Connection::from_parts(Outbound::Unbounded(tx), inner_inbound, Some(errors))
}
