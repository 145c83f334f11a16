use tracing::debug;

use crate::config::DagConfig;
use crate::dag::{Action, AntType, Arena, Dag, DagNode, NodeId};
use crate::error::{DagError, Result};

/// DagBuilder allocates nodes for one graph and links them.
///
/// Every node declares its fan-in and fan-out up front; `finish` refuses to
/// hand out a graph whose link calls do not match those declarations, so a
/// partially wired graph never reaches an engine.
#[derive(Debug)]
pub struct DagBuilder {
    creator: &'static str,
    nfaults: usize,
    nodes: Vec<DagNode>,
    roots: Vec<NodeId>,
    arena: Arena,
    trace: bool,
}

impl DagBuilder {
    #[must_use]
    pub fn new(creator: &'static str, nfaults: usize, cfg: &DagConfig) -> Self {
        Self {
            creator,
            nfaults,
            nodes: Vec::new(),
            roots: Vec::new(),
            arena: Arena::new(cfg.arena_limit),
            trace: cfg.trace_enabled,
        }
    }

    pub fn arena(&mut self) -> &mut Arena {
        &mut self.arena
    }

    /// `init_node` allocates a node with exactly the edge capacity it declares.
    ///
    /// # Arguments
    /// * `name` - Diagnostic name (`Rod`, `Wnp`, ...).
    /// * `action` - Forward work of the node; the undo action is derived from it.
    /// * `commit` - Whether this node is the commit point of the graph.
    /// * `succ_count` - Number of succedents that will be linked.
    /// * `ante_count` - Number of antecedents that will be linked.
    ///
    /// # Errors
    /// Returns `DagError::OutOfMemory` if the node table cannot grow.
    pub fn init_node(
        &mut self,
        name: &'static str,
        action: Action,
        commit: bool,
        succ_count: usize,
        ante_count: usize,
    ) -> Result<NodeId> {
        self.nodes
            .try_reserve(1)
            .map_err(|_| DagError::OutOfMemory {
                requested: std::mem::size_of::<DagNode>(),
                allocated: self.arena.allocated_bytes(),
            })?;
        self.nodes
            .push(DagNode::new(name, action, commit, succ_count, ante_count));
        Ok(NodeId(self.nodes.len() - 1))
    }

    /// `root` adds a node to the header's succedents.
    pub fn root(&mut self, id: NodeId) {
        self.roots.push(id);
    }

    /// `link` records `from -> to` on both endpoints.
    ///
    /// # Panics
    /// Panics if either id was not returned by this builder's `init_node`.
    pub fn link(&mut self, from: NodeId, to: NodeId, ant: AntType) {
        self.nodes[from.0].succedents.push(to);
        self.nodes[to.0].antecedents.push((from, ant));
    }

    #[must_use]
    /// # Panics
    /// Panics if `id` was not returned by this builder's `init_node`.
    pub fn node(&self, id: NodeId) -> &DagNode {
        &self.nodes[id.0]
    }

    /// `finish` checks every declared edge count and returns the graph.
    ///
    /// # Errors
    /// Returns `DagError::EdgeCount` on the first node whose links disagree with
    /// its declaration, or `DagError::Invalid` if more than one node is marked
    /// as commit point or the header has no entry point.
    pub fn finish(self) -> Result<Dag> {
        for (i, node) in self.nodes.iter().enumerate() {
            let checks = [
                (
                    "antecedent",
                    node.declared_antecedents,
                    node.antecedents.len(),
                ),
                ("succedent", node.declared_succedents, node.succedents.len()),
            ];
            for (direction, declared, linked) in checks {
                if declared != linked {
                    return Err(DagError::EdgeCount {
                        node: NodeId(i),
                        name: node.name,
                        direction,
                        declared,
                        linked,
                    });
                }
            }
        }

        let num_commit_nodes = self.nodes.iter().filter(|n| n.commit).count();
        if num_commit_nodes > 1 {
            return Err(DagError::Invalid(format!(
                "{num_commit_nodes} commit nodes in one graph"
            )));
        }
        if self.roots.is_empty() && !self.nodes.is_empty() {
            return Err(DagError::Invalid("header has no succedents".to_string()));
        }

        if self.trace {
            debug!(
                creator = self.creator,
                nodes = self.nodes.len(),
                buffers = self.arena.len(),
                bytes = self.arena.allocated_bytes(),
                commit_nodes = num_commit_nodes,
                "dag built"
            );
        }

        Ok(Dag {
            creator: self.creator,
            nfaults: self.nfaults,
            num_commit_nodes,
            num_commits: 0,
            roots: self.roots,
            nodes: self.nodes,
            arena: self.arena,
            trace: self.trace,
        })
    }
}
