//! Policy values handed to every builder and engine call.

/// DagConfig carries the build-time policy flags for one logical write.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DagConfig {
    /// Emit build summaries and per-node firing events through `tracing`.
    pub trace_enabled: bool,
    /// Bracket small-write reads and writes with disk queue lock / unlock.
    pub atomic_rmw: bool,
    /// Let the large-write parity computation reuse a full stripe unit read buffer.
    pub allow_buffer_recycle: bool,
    /// Upper bound on buffer bytes the per-DAG arena may hand out.
    pub arena_limit: Option<usize>,
}

impl Default for DagConfig {
    fn default() -> Self {
        Self {
            trace_enabled: false,
            atomic_rmw: false,
            allow_buffer_recycle: true,
            arena_limit: None,
        }
    }
}

/// RetryPolicy bounds how often a node may be re-fired after the commit point.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per node, including the first one.
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 3 }
    }
}
