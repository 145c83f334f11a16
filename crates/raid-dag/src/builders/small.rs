use crate::builders::{FaultTolerance, Recovery, WriteRequest, io_param, redundancy_extents};
use crate::config::DagConfig;
use crate::dag::{Action, AntType, BufferId, Dag, DagBuilder, NodeId, Source};
use crate::error::Result;
use crate::kernels::XorKernel;
use crate::layout::PhysDiskAddr;

/// `create_small_write_dag` builds the read-modify-write graph:
///
/// ```text
/// Block -> Rod* | Rop* | Roq* -> Xor* | Q* -> Commit -> Wnd* | Wnp* | Wnq* -> [Unlock*] -> Term
/// ```
///
/// One Xor (and Q) node exists per parity extent. Each folds the old and new
/// data of every data unit into its own old-parity buffer, which then becomes
/// the new parity written by the matching Wnp node.
///
/// With `cfg.atomic_rmw` every read acquires its disk queue lock and every write
/// is followed by an Unlock node releasing it. The forward-only variant
/// replaces Commit with `Sync` and adds an `antiData` edge from each Rod to the
/// Wnd that overwrites the same extent.
///
/// # Errors
/// Returns `DagError::InvalidAccess` if the parity / Q extents do not match the
/// fault count, and `DagError::OutOfMemory` if the arena is exhausted.
pub fn create_small_write_dag(
    req: &WriteRequest<'_>,
    cfg: &DagConfig,
    nfaults: FaultTolerance,
    recovery: Recovery,
) -> Result<Dag> {
    let asmap = req.asmap;
    let layout = req.layout;
    let geom = layout.unit_geometry();
    let n_par = redundancy_extents(asmap, nfaults)?;
    let n_data = asmap.data.len();
    let n_q = match nfaults {
        FaultTolerance::Single => 0,
        FaultTolerance::Double => n_par,
    };
    let nf = nfaults.count();
    let stripe = asmap.stripe_id;
    let lock = cfg.atomic_rmw;
    let forward_only = recovery == Recovery::ForwardOnly;
    let kernel = XorKernel::for_small_write(
        n_par,
        n_data,
        asmap.total_sectors_accessed,
        layout.sectors_per_su(),
    );

    let creator = if forward_only {
        "SmallWriteFwdDAG"
    } else {
        "SmallWriteDAG"
    };
    let mut b = DagBuilder::new(creator, nf, cfg);

    let q_pdas = &asmap.q[..n_q];
    let wnd_bufs = req.data_buffers(&mut b)?;
    let mut old_bufs = |pdas: &[PhysDiskAddr]| -> Result<Vec<BufferId>> {
        pdas.iter()
            .map(|pda| b.arena().alloc_zeroed(pda.byte_len(geom)))
            .collect()
    };
    let rod_bufs = old_bufs(&asmap.data)?;
    let rop_bufs = old_bufs(&asmap.parity)?;
    let roq_bufs = old_bufs(q_pdas)?;

    let block = b.init_node("Block", Action::Sync, false, n_data + n_par + n_q, 0)?;
    b.root(block);

    let read = |pda: &PhysDiskAddr, buf: BufferId, which_ru: usize| Action::Read {
        pda: pda.clone(),
        buf,
        stripe,
        param: io_param(lock, false, which_ru),
    };
    let mut rods = Vec::with_capacity(n_data);
    for (pda, &buf) in asmap.data.iter().zip(&rod_bufs) {
        let succ = n_par + n_q + usize::from(forward_only);
        rods.push(b.init_node("Rod", read(pda, buf, 0), false, succ, 1)?);
    }
    let mut rops = Vec::with_capacity(n_par);
    for (j, (pda, &buf)) in asmap.parity.iter().zip(&rop_bufs).enumerate() {
        rops.push(b.init_node("Rop", read(pda, buf, j), false, n_par, 1)?);
    }
    let mut roqs = Vec::with_capacity(n_q);
    for (j, (pda, &buf)) in q_pdas.iter().zip(&roq_bufs).enumerate() {
        roqs.push(b.init_node("Roq", read(pda, buf, j), false, n_par, 1)?);
    }

    // Every redundancy node sees all old and new data plus its own old
    // parity / Q, which is also its result buffer.
    let data_sources: Vec<Source> = asmap
        .data
        .iter()
        .zip(&rod_bufs)
        .chain(asmap.data.iter().zip(&wnd_bufs))
        .map(|(pda, &buf)| Source {
            pda: pda.clone(),
            buf,
        })
        .collect();
    let with_own = |pda: &PhysDiskAddr, buf: BufferId| -> Vec<Source> {
        let mut sources = data_sources.clone();
        sources.push(Source {
            pda: pda.clone(),
            buf,
        });
        sources
    };

    let mut xors = Vec::with_capacity(n_par);
    for (pda, &buf) in asmap.parity.iter().zip(&rop_bufs) {
        let xor = Action::Xor {
            kernel,
            geometry: geom,
            sources: with_own(pda, buf),
            dest: pda.clone(),
            result: buf,
            q_result: None,
        };
        xors.push(b.init_node("Xor", xor, false, 1, n_data + n_par)?);
    }
    let mut qs = Vec::with_capacity(n_q);
    for (pda, &buf) in q_pdas.iter().zip(&roq_bufs) {
        let q = Action::QCompute {
            kernel,
            geometry: geom,
            sources: with_own(pda, buf),
            dest: pda.clone(),
            result: buf,
        };
        qs.push(b.init_node("Q", q, false, 1, n_data + n_par)?);
    }

    let gate = b.init_node(
        recovery.gate_name(),
        Action::Sync,
        recovery.has_commit(),
        n_data + n_par + n_q,
        n_par + n_q,
    )?;

    let write = |pda: &PhysDiskAddr, buf: BufferId, which_ru: usize| Action::Write {
        pda: pda.clone(),
        buf,
        stripe,
        param: io_param(false, false, which_ru),
    };
    let mut writes: Vec<NodeId> = Vec::with_capacity(n_data + n_par + n_q);
    for (pda, &buf) in asmap.data.iter().zip(&wnd_bufs) {
        let ante = 1 + usize::from(forward_only);
        writes.push(b.init_node("Wnd", write(pda, buf, 0), false, 1, ante)?);
    }
    for (j, (pda, &buf)) in asmap.parity.iter().zip(&rop_bufs).enumerate() {
        writes.push(b.init_node("Wnp", write(pda, buf, j), false, 1, 1)?);
    }
    for (j, (pda, &buf)) in q_pdas.iter().zip(&roq_bufs).enumerate() {
        writes.push(b.init_node("Wnq", write(pda, buf, j), false, 1, 1)?);
    }

    let mut unlocks = Vec::new();
    if lock {
        let targets: Vec<(PhysDiskAddr, usize)> = asmap
            .data
            .iter()
            .map(|pda| (pda.clone(), 0))
            .chain(asmap.parity.iter().cloned().enumerate().map(|(j, p)| (p, j)))
            .chain(q_pdas.iter().cloned().enumerate().map(|(j, p)| (p, j)))
            .collect();
        for (pda, which_ru) in targets {
            let unlock = Action::Unlock {
                pda,
                param: io_param(false, true, which_ru),
            };
            unlocks.push(b.init_node("Unlock", unlock, false, 1, 1)?);
        }
    }

    let term = b.init_node("Term", Action::Terminate, false, 0, writes.len())?;

    for &r in rods.iter().chain(&rops).chain(&roqs) {
        b.link(block, r, AntType::Control);
    }
    for (j, &xor) in xors.iter().enumerate() {
        for &rod in &rods {
            b.link(rod, xor, AntType::TrueData);
        }
        for (k, &rop) in rops.iter().enumerate() {
            b.link(rop, xor, own_or_order(j, k));
        }
    }
    for (j, &q) in qs.iter().enumerate() {
        for &rod in &rods {
            b.link(rod, q, AntType::TrueData);
        }
        for (k, &roq) in roqs.iter().enumerate() {
            b.link(roq, q, own_or_order(j, k));
        }
    }
    for &red in xors.iter().chain(&qs) {
        b.link(red, gate, AntType::Control);
    }
    for (i, &w) in writes.iter().enumerate() {
        b.link(gate, w, AntType::Control);
        match unlocks.get(i) {
            Some(&unlock) => {
                b.link(w, unlock, AntType::Control);
                b.link(unlock, term, AntType::Control);
            }
            None => b.link(w, term, AntType::Control),
        }
    }
    if forward_only {
        for (&rod, &wnd) in rods.iter().zip(&writes) {
            b.link(rod, wnd, AntType::AntiData);
        }
    }

    b.finish()
}

/// A redundancy node consumes its own old parity / Q read; the other extent's
/// read only orders it.
const fn own_or_order(node: usize, read: usize) -> AntType {
    if node == read {
        AntType::TrueData
    } else {
        AntType::Control
    }
}
