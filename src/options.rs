use std::time::Duration;

/// Per-edge configuration for a `Node` (§4.1).
///
/// Every field defaults to zero, which means "use the edge unwrapped": no
/// buffering and no timeout. Setting both a buffer and a timeout for the
/// same edge is legal; the buffer is applied innermost and the timeout
/// outermost (`Node` wraps `BufferedConnection` in a `TimeoutConnection`,
/// never the reverse).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Options {
    pub parent_buffer: usize,
    pub parent_timeout: Duration,

    pub child_buffer: usize,
    pub child_timeout: Duration,

    pub send_buffer: usize,
    pub send_timeout: Duration,

    pub receive_buffer: usize,
    pub receive_timeout: Duration,

    /// Capacity of the node's error stream. `0` is treated as a rendezvous
    /// channel of capacity one (§9 Open Questions): a node that never
    /// drains `Node::recv_error` will cause further errors to be dropped
    /// (and logged) rather than stalling message relay.
    pub error_buffer: usize,
}

impl Options {
    pub fn parent_wrapped(&self) -> bool {
        self.parent_buffer > 0 || self.parent_timeout > Duration::ZERO
    }

    pub fn child_wrapped(&self) -> bool {
        self.child_buffer > 0 || self.child_timeout > Duration::ZERO
    }
}
