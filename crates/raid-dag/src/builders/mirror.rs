use crate::builders::{Recovery, WriteRequest, io_param};
use crate::config::DagConfig;
use crate::dag::{Action, AntType, Dag, DagBuilder, NodeId};
use crate::error::{DagError, Result};
use crate::layout::{AccessStripeMap, PhysDiskAddr};

/// `create_mirror_write_dag` builds the RAID1 write graph:
///
/// ```text
/// Block -> Commit -> Wpd* | Wsd* -> Unblock -> Term
/// ```
///
/// A failed primary (`num_data_failed == 1`) drops one Wpd node and a failed
/// mirror (`num_parity_failed == 1`) drops one Wsd node; the dropped extent is
/// the one on the failed disk. The forward-only variant replaces Commit with a
/// plain `Sync` node.
///
/// # Errors
/// Returns `DagError::InvalidAccess` if the data and mirror extents do not
/// pair up, `DagError::TooManyFailures` if no write would remain, and
/// `DagError::OutOfMemory` if the arena is exhausted.
pub fn create_mirror_write_dag(
    req: &WriteRequest<'_>,
    cfg: &DagConfig,
    recovery: Recovery,
) -> Result<Dag> {
    let asmap = req.asmap;
    if asmap.data.is_empty() || asmap.data.len() != asmap.parity.len() {
        return Err(DagError::InvalidAccess(format!(
            "{} data extents cannot pair with {} mirror extents",
            asmap.data.len(),
            asmap.parity.len()
        )));
    }

    let creator = match recovery {
        Recovery::Rollback => "RaidOneWriteDAG",
        Recovery::ForwardOnly => "RaidOneWriteFwdDAG",
    };
    let mut b = DagBuilder::new(creator, 1, cfg);
    let bufs = req.data_buffers(&mut b)?;
    let stripe = asmap.stripe_id;

    let primary = surviving(&asmap.data, asmap, asmap.num_data_failed);
    let secondary = surviving(&asmap.parity, asmap, asmap.num_parity_failed);
    let n_writes = primary.len() + secondary.len();
    if n_writes == 0 {
        return Err(DagError::TooManyFailures {
            failed: asmap.num_failed(),
            tolerated: 1,
        });
    }

    let block = b.init_node("Block", Action::Sync, false, 1, 0)?;
    b.root(block);
    let gate = b.init_node(
        recovery.gate_name(),
        Action::Sync,
        recovery.has_commit(),
        n_writes,
        1,
    )?;

    let mut writes: Vec<NodeId> = Vec::with_capacity(n_writes);
    let sides = [("Wpd", &asmap.data, &primary), ("Wsd", &asmap.parity, &secondary)];
    for (name, pdas, keep) in sides {
        for &i in keep {
            let write = Action::Write {
                pda: pdas[i].clone(),
                buf: bufs[i],
                stripe,
                param: io_param(false, false, 0),
            };
            writes.push(b.init_node(name, write, false, 1, 1)?);
        }
    }

    let unblock = b.init_node("Unblock", Action::Sync, false, 1, n_writes)?;
    let term = b.init_node("Term", Action::Terminate, false, 0, 1)?;

    b.link(block, gate, AntType::Control);
    for &w in &writes {
        b.link(gate, w, AntType::Control);
        b.link(w, unblock, AntType::Control);
    }
    b.link(unblock, term, AntType::Control);

    b.finish()
}

/// Indices of the extents that still get a write. One failure drops the extent
/// on a failed disk, or the last one if the map does not say which.
fn surviving(pdas: &[PhysDiskAddr], asmap: &AccessStripeMap, failed: usize) -> Vec<usize> {
    if failed != 1 {
        return (0..pdas.len()).collect();
    }
    let dropped = pdas
        .iter()
        .position(|pda| asmap.is_failed(pda.col))
        .unwrap_or(pdas.len() - 1);
    (0..pdas.len()).filter(|&i| i != dropped).collect()
}
