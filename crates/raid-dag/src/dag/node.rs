use crate::dag::{AntType, BufferId, NodeId};
use crate::kernels::XorKernel;
use crate::layout::{PhysDiskAddr, UnitGeometry};

/// Priority used for every disk operation issued by the write graphs.
pub const NORMAL_PRIORITY: u8 = 1;

/// IoParam is the priority / lock word attached to every disk operation.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct IoParam {
    pub priority: u8,
    /// Acquire the disk queue lock with this operation.
    pub lock: bool,
    /// Release the disk queue lock with this operation.
    pub unlock: bool,
    /// Reconstruction unit the operation belongs to.
    pub which_ru: u16,
}

impl IoParam {
    #[must_use]
    pub const fn new(priority: u8, lock: bool, unlock: bool, which_ru: u16) -> Self {
        Self {
            priority,
            lock,
            unlock,
            which_ru,
        }
    }

    #[must_use]
    /// `pack` folds the parameter into a single word: priority in bits 24..32,
    /// lock in bit 17, unlock in bit 16, reconstruction unit in bits 0..16.
    pub const fn pack(self) -> u32 {
        ((self.priority as u32) << 24)
            | ((self.lock as u32) << 17)
            | ((self.unlock as u32) << 16)
            | self.which_ru as u32
    }

    #[must_use]
    pub const fn unpack(word: u32) -> Self {
        Self {
            priority: (word >> 24) as u8,
            lock: (word >> 17) & 1 == 1,
            unlock: (word >> 16) & 1 == 1,
            which_ru: (word & 0xffff) as u16,
        }
    }
}

/// Source is one (extent, buffer) operand of a redundancy computation.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Source {
    pub pda: PhysDiskAddr,
    pub buf: BufferId,
}

/// Action is the forward work a node performs when it fires.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Action {
    Read {
        pda: PhysDiskAddr,
        buf: BufferId,
        stripe: u64,
        param: IoParam,
    },
    Write {
        pda: PhysDiskAddr,
        buf: BufferId,
        stripe: u64,
        param: IoParam,
    },
    Unlock {
        pda: PhysDiskAddr,
        param: IoParam,
    },
    /// Parity over `sources` into `result`, laid out over the `dest` extent.
    /// When `q_result` is set the same node also produces Q.
    Xor {
        kernel: XorKernel,
        geometry: UnitGeometry,
        sources: Vec<Source>,
        dest: PhysDiskAddr,
        result: BufferId,
        q_result: Option<BufferId>,
    },
    QCompute {
        kernel: XorKernel,
        geometry: UnitGeometry,
        sources: Vec<Source>,
        dest: PhysDiskAddr,
        result: BufferId,
    },
    Sync,
    Terminate,
}

impl Action {
    #[must_use]
    pub const fn tag(&self) -> &'static str {
        match self {
            Self::Read { .. } => "read",
            Self::Write { .. } => "write",
            Self::Unlock { .. } => "unlock",
            Self::Xor { .. } => "xor",
            Self::QCompute { .. } => "q",
            Self::Sync => "sync",
            Self::Terminate => "term",
        }
    }

    #[must_use]
    /// `is_persistent` reports whether the action changes on-disk state.
    pub const fn is_persistent(&self) -> bool {
        matches!(self, Self::Write { .. } | Self::Unlock { .. })
    }

    #[must_use]
    /// `results` lists the buffers this action produces.
    pub fn results(&self) -> Vec<BufferId> {
        match self {
            Self::Read { buf, .. } => vec![*buf],
            Self::Xor {
                result, q_result, ..
            } => std::iter::once(*result).chain(*q_result).collect(),
            Self::QCompute { result, .. } => vec![*result],
            Self::Write { .. } | Self::Unlock { .. } | Self::Sync | Self::Terminate => Vec::new(),
        }
    }

    fn undo(&self) -> Undo {
        match self {
            Self::Read { pda, param, .. } if param.lock => Undo::Unlock {
                pda: pda.clone(),
                param: IoParam::new(param.priority, false, true, param.which_ru),
            },
            _ => Undo::Nothing,
        }
    }
}

/// Undo is what rolling a completed node back requires.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Undo {
    Nothing,
    /// Release the queue lock a locking read acquired.
    Unlock { pda: PhysDiskAddr, param: IoParam },
}

/// NodeStatus tracks a node through execution.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum NodeStatus {
    #[default]
    NotFired,
    Fired,
    Done,
    Failed,
    Undone,
}

/// DagNode is one unit of work in a write graph.
#[derive(Clone, Debug)]
pub struct DagNode {
    pub name: &'static str,
    pub action: Action,
    pub undo: Undo,
    pub commit: bool,
    pub status: NodeStatus,
    pub(crate) antecedents: Vec<(NodeId, AntType)>,
    pub(crate) succedents: Vec<NodeId>,
    pub(crate) declared_antecedents: usize,
    pub(crate) declared_succedents: usize,
}

impl DagNode {
    pub(crate) fn new(
        name: &'static str,
        action: Action,
        commit: bool,
        succ_count: usize,
        ante_count: usize,
    ) -> Self {
        let undo = action.undo();
        Self {
            name,
            action,
            undo,
            commit,
            status: NodeStatus::NotFired,
            antecedents: Vec::with_capacity(ante_count),
            succedents: Vec::with_capacity(succ_count),
            declared_antecedents: ante_count,
            declared_succedents: succ_count,
        }
    }

    #[must_use]
    /// `antecedents` lists upstream nodes and the contract of each edge.
    pub fn antecedents(&self) -> &[(NodeId, AntType)] {
        &self.antecedents
    }

    #[must_use]
    pub fn succedents(&self) -> &[NodeId] {
        &self.succedents
    }

    #[must_use]
    pub fn antecedent_type(&self, upstream: NodeId) -> Option<AntType> {
        self.antecedents
            .iter()
            .find(|(id, _)| *id == upstream)
            .map(|(_, t)| *t)
    }

    #[must_use]
    /// `io` returns the extent, stripe and parameter word of a disk operation.
    pub fn io(&self) -> Option<(&PhysDiskAddr, u64, IoParam)> {
        match &self.action {
            Action::Read {
                pda, stripe, param, ..
            }
            | Action::Write {
                pda, stripe, param, ..
            } => Some((pda, *stripe, *param)),
            _ => None,
        }
    }
}
