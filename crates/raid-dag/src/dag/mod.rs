//! Node, edge and header primitives shared by every write graph.

mod arena;
#[cfg(test)]
mod arena_tests;
mod builder;
mod inspect;
#[cfg(test)]
mod inspect_tests;
mod node;

use std::fmt;

pub use arena::{Arena, BufferId};
pub use builder::DagBuilder;
pub use node::{Action, DagNode, IoParam, NORMAL_PRIORITY, NodeStatus, Source, Undo};

/// NodeId indexes a node inside its owning DAG.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// AntType tags the contract of an edge, as seen from the downstream node.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum AntType {
    /// Pure ordering; no buffer flows along the edge.
    Control,
    /// The downstream node consumes a buffer the upstream node produced.
    TrueData,
    /// The downstream node overwrites a buffer or extent the upstream node reads.
    AntiData,
}

impl AntType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Control => "control",
            Self::TrueData => "trueData",
            Self::AntiData => "antiData",
        }
    }
}

/// Dag is the header of one write graph. It owns every node and buffer; dropping
/// it releases them all at once.
#[derive(Debug)]
pub struct Dag {
    creator: &'static str,
    nfaults: usize,
    num_commit_nodes: usize,
    num_commits: usize,
    roots: Vec<NodeId>,
    nodes: Vec<DagNode>,
    arena: Arena,
    trace: bool,
}

impl Dag {
    #[must_use]
    /// `creator` names the builder that produced the graph.
    pub const fn creator(&self) -> &'static str {
        self.creator
    }

    #[must_use]
    pub const fn nfaults(&self) -> usize {
        self.nfaults
    }

    #[must_use]
    pub const fn num_commit_nodes(&self) -> usize {
        self.num_commit_nodes
    }

    #[must_use]
    /// `num_commits` counts commit nodes that have completed during execution.
    pub const fn num_commits(&self) -> usize {
        self.num_commits
    }

    #[must_use]
    /// `roots` returns the header's succedents, the entry points of the graph.
    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    #[must_use]
    pub const fn trace_enabled(&self) -> bool {
        self.trace
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    #[must_use]
    /// # Panics
    /// Panics if `id` was not issued for this graph.
    pub fn node(&self, id: NodeId) -> &DagNode {
        &self.nodes[id.0]
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &DagNode)> {
        self.nodes.iter().enumerate().map(|(i, n)| (NodeId(i), n))
    }

    /// `named` yields the nodes carrying a given name, in creation order.
    pub fn named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = (NodeId, &'a DagNode)> + 'a {
        self.nodes().filter(move |(_, n)| n.name == name)
    }

    #[must_use]
    pub fn count(&self, name: &str) -> usize {
        self.named(name).count()
    }

    #[must_use]
    /// `commit_node` returns the node marked as the commit point, if any.
    pub fn commit_node(&self) -> Option<NodeId> {
        self.nodes().find(|(_, n)| n.commit).map(|(id, _)| id)
    }

    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.nodes.iter().map(|n| n.succedents().len()).sum()
    }

    #[must_use]
    pub const fn arena(&self) -> &Arena {
        &self.arena
    }

    #[must_use]
    /// `buffer` returns the contents of an arena buffer.
    pub fn buffer(&self, id: BufferId) -> &[u8] {
        self.arena.get(id)
    }

    pub(crate) fn set_status(&mut self, id: NodeId, status: NodeStatus) {
        self.nodes[id.0].status = status;
    }

    pub(crate) fn record_commit(&mut self) {
        self.num_commits += 1;
    }

    /// Splits the header so an engine can read node actions while writing buffers.
    pub(crate) fn split_mut(&mut self) -> (&[DagNode], &mut Arena) {
        (&self.nodes, &mut self.arena)
    }
}
