//! Structural checks and renderings of a built graph.

use std::collections::{BTreeMap, VecDeque};
use std::fmt::Write;

use sha2::{Digest, Sha256};

use crate::dag::{Action, AntType, BufferId, Dag, NodeId};
use crate::error::{DagError, Result};

impl Dag {
    /// `validate` checks the invariants every write graph must hold.
    ///
    /// * at most one commit node, and `num_commit_nodes` agrees with the flags;
    /// * every edge is recorded on both endpoints;
    /// * the graph is acyclic and every node is reachable from the header;
    /// * no write or unlock lies upstream of the commit node, and every write
    ///   and unlock lies downstream of it;
    /// * `antiData` edges appear only in graphs without a commit node.
    ///
    /// # Errors
    /// Returns `DagError::Invalid` describing the first violation found.
    pub fn validate(&self) -> Result<()> {
        let flagged = self.nodes.iter().filter(|n| n.commit).count();
        if flagged > 1 || flagged != self.num_commit_nodes {
            return Err(DagError::Invalid(format!(
                "{flagged} nodes flagged commit, header records {}",
                self.num_commit_nodes
            )));
        }

        for (id, node) in self.nodes() {
            for &succ in node.succedents() {
                if self.node(succ).antecedent_type(id).is_none() {
                    return Err(DagError::Invalid(format!(
                        "{} {id} -> {succ} missing on the antecedent side",
                        node.name
                    )));
                }
            }
            for &(ante, ant) in node.antecedents() {
                if !self.node(ante).succedents().contains(&id) {
                    return Err(DagError::Invalid(format!(
                        "{} {id} <- {ante} missing on the succedent side",
                        node.name
                    )));
                }
                if ant == AntType::AntiData && self.num_commit_nodes > 0 {
                    return Err(DagError::Invalid(format!(
                        "antiData edge {ante} -> {id} in a graph with a commit node"
                    )));
                }
            }
        }

        for &root in &self.roots {
            if !self.node(root).antecedents().is_empty() {
                return Err(DagError::Invalid(format!("root {root} has antecedents")));
            }
        }

        self.topological_order()?;

        if let Some(commit) = self.commit_node() {
            let upstream = self.reach(commit, Direction::Up);
            let downstream = self.reach(commit, Direction::Down);
            for (id, node) in self.nodes() {
                if !node.action.is_persistent() {
                    continue;
                }
                if upstream[id.0] {
                    return Err(DagError::Invalid(format!(
                        "{} {id} is upstream of the commit node",
                        node.name
                    )));
                }
                if !downstream[id.0] {
                    return Err(DagError::Invalid(format!(
                        "{} {id} is not downstream of the commit node",
                        node.name
                    )));
                }
            }
        }
        Ok(())
    }

    /// `topological_order` returns every node in an order the engine could fire them.
    ///
    /// # Errors
    /// Returns `DagError::Invalid` if some node is part of a cycle or cannot be
    /// reached from the header.
    pub fn topological_order(&self) -> Result<Vec<NodeId>> {
        let mut pending: Vec<usize> = self.nodes.iter().map(|n| n.antecedents.len()).collect();
        let mut ready: VecDeque<NodeId> = self.roots.iter().copied().collect();
        let mut order = Vec::with_capacity(self.nodes.len());
        while let Some(id) = ready.pop_front() {
            order.push(id);
            for &succ in self.node(id).succedents() {
                pending[succ.0] -= 1;
                if pending[succ.0] == 0 {
                    ready.push_back(succ);
                }
            }
        }
        if order.len() != self.nodes.len() {
            return Err(DagError::Invalid(format!(
                "only {} of {} nodes can fire: cycle or node unreachable from the header",
                order.len(),
                self.nodes.len()
            )));
        }
        Ok(order)
    }

    /// Marks every node strictly upstream or downstream of `from`.
    fn reach(&self, from: NodeId, dir: Direction) -> Vec<bool> {
        let mut seen = vec![false; self.nodes.len()];
        let mut stack = vec![from];
        while let Some(id) = stack.pop() {
            let node = self.node(id);
            let next: Vec<NodeId> = match dir {
                Direction::Up => node.antecedents().iter().map(|(a, _)| *a).collect(),
                Direction::Down => node.succedents().to_vec(),
            };
            for n in next {
                if !seen[n.0] {
                    seen[n.0] = true;
                    stack.push(n);
                }
            }
        }
        seen
    }

    #[must_use]
    /// `is_upstream` reports whether a path leads from `a` to `b`.
    pub fn is_upstream(&self, a: NodeId, b: NodeId) -> bool {
        self.reach(a, Direction::Down)[b.0]
    }

    #[must_use]
    /// `fingerprint` hashes the graph's structure: node names, actions, commit
    /// flags, typed edges and buffer sizes. Two graphs built from the same
    /// inputs have the same fingerprint.
    pub fn fingerprint(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(self.creator.as_bytes());
        hasher.update((self.nfaults as u64).to_le_bytes());
        hasher.update((self.num_commit_nodes as u64).to_le_bytes());
        for &root in &self.roots {
            hasher.update((root.0 as u64).to_le_bytes());
        }
        for (_, node) in self.nodes() {
            hasher.update(node.name.as_bytes());
            hasher.update(format!("{:?}|{}", node.action, node.commit).as_bytes());
            for &(ante, ant) in node.antecedents() {
                hasher.update((ante.0 as u64).to_le_bytes());
                hasher.update(ant.as_str().as_bytes());
            }
            for &succ in node.succedents() {
                hasher.update((succ.0 as u64).to_le_bytes());
            }
        }
        for i in 0..self.arena.len() {
            let len = self.arena.get(BufferId(i)).len();
            hasher.update((len as u64).to_le_bytes());
        }
        hasher.finalize().into()
    }

    #[must_use]
    /// `summary` counts nodes per name, in order of first appearance.
    pub fn summary(&self) -> Vec<(&'static str, usize)> {
        let mut order: Vec<&'static str> = Vec::new();
        let mut counts: BTreeMap<&'static str, usize> = BTreeMap::new();
        for (_, node) in self.nodes() {
            let c = counts.entry(node.name).or_insert(0);
            if *c == 0 {
                order.push(node.name);
            }
            *c += 1;
        }
        order.into_iter().map(|name| (name, counts[name])).collect()
    }

    #[must_use]
    /// `to_dot` renders the graph in Graphviz syntax. Commit nodes are boxed,
    /// `trueData` edges are bold and `antiData` edges dashed.
    pub fn to_dot(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "digraph \"{}\" {{", self.creator);
        let _ = writeln!(out, "  hdr [label=\"Hdr\", shape=point];");
        for (id, node) in self.nodes() {
            let label = match &node.action {
                Action::Read { pda, .. } | Action::Write { pda, .. } | Action::Unlock { pda, .. } => {
                    format!("{}\\n{pda}", node.name)
                }
                _ => node.name.to_string(),
            };
            let shape = if node.commit { "box" } else { "ellipse" };
            let _ = writeln!(out, "  n{} [label=\"{label}\", shape={shape}];", id.0);
        }
        for &root in &self.roots {
            let _ = writeln!(out, "  hdr -> n{};", root.0);
        }
        for (id, node) in self.nodes() {
            for &(ante, ant) in node.antecedents() {
                let style = match ant {
                    AntType::Control => "solid",
                    AntType::TrueData => "bold",
                    AntType::AntiData => "dashed",
                };
                let _ = writeln!(out, "  n{} -> n{} [style={style}];", ante.0, id.0);
            }
        }
        out.push_str("}\n");
        out
    }
}

#[derive(Copy, Clone)]
enum Direction {
    Up,
    Down,
}
