use crate::builders::{FaultTolerance, Recovery, WriteRequest, io_param, redundancy_extents};
use crate::config::DagConfig;
use crate::dag::{Action, AntType, BufferId, Dag, DagBuilder, NodeId, Source};
use crate::error::{DagError, Result};
use crate::kernels::XorKernel;
use crate::layout::unaccessed_portion;

/// `create_large_write_dag` builds the full / partial stripe write graph:
///
/// ```text
/// Block -> Rod* -> Xor(+Q) -> Commit -> Wnd* | Wnp | Wnq -> Term
/// ```
///
/// Rod nodes read every part of the stripe the access does not overwrite, so
/// parity (and Q) can be recomputed from scratch. With no Rod nodes the Xor
/// node hangs directly below Block. The forward-only variant replaces Commit
/// with a plain `Sync` node and adds an `antiData` edge from every Rod to each
/// Wnd on the same disk.
///
/// # Arguments
/// * `req` - Stripe map, geometry and new data.
/// * `cfg` - Build policy; `allow_buffer_recycle` lets parity reuse a full
///   stripe unit Rod buffer.
/// * `nfaults` - Parity only, or parity and Q.
/// * `recovery` - Whether the graph carries a commit point.
///
/// # Errors
/// Returns `DagError::InvalidAccess` if the parity region is split or Q is
/// missing, and `DagError::OutOfMemory` if the arena is exhausted.
pub fn create_large_write_dag(
    req: &WriteRequest<'_>,
    cfg: &DagConfig,
    nfaults: FaultTolerance,
    recovery: Recovery,
) -> Result<Dag> {
    let asmap = req.asmap;
    let layout = req.layout;
    let geom = layout.unit_geometry();
    if redundancy_extents(asmap, nfaults)? != 1 {
        return Err(DagError::InvalidAccess(
            "large write needs a single parity extent".to_string(),
        ));
    }
    let nf = nfaults.count();
    let stripe = asmap.stripe_id;
    let parity = &asmap.parity[0];
    let forward_only = recovery == Recovery::ForwardOnly;

    let creator = if forward_only {
        "LargeWriteFwdDAG"
    } else {
        "LargeWriteDAG"
    };
    let mut b = DagBuilder::new(creator, nf, cfg);

    let rod_pdas = unaccessed_portion(asmap, layout);
    let n_rod = rod_pdas.len();
    let n_wnd = asmap.data.len();

    let wnd_bufs = req.data_buffers(&mut b)?;
    let rod_bufs = rod_pdas
        .iter()
        .map(|pda| b.arena().alloc_zeroed(pda.byte_len(geom)))
        .collect::<Result<Vec<BufferId>>>()?;

    // Q must never share a buffer: P is computed in place over its result.
    let recycled = if cfg.allow_buffer_recycle && parity.is_full_unit(geom) {
        rod_pdas
            .iter()
            .position(|pda| pda.is_full_unit(geom))
            .map(|i| rod_bufs[i])
    } else {
        None
    };
    let p_buf = match recycled {
        Some(buf) => buf,
        None => b.arena().alloc_zeroed(parity.byte_len(geom))?,
    };
    let q_buf = match nfaults {
        FaultTolerance::Double => Some(b.arena().alloc_zeroed(asmap.q[0].byte_len(geom))?),
        FaultTolerance::Single => None,
    };

    // Wnd indices each Rod must precede in the forward-only variant.
    let anti: Vec<Vec<usize>> = rod_pdas
        .iter()
        .map(|rod| {
            if !forward_only {
                return Vec::new();
            }
            asmap
                .data
                .iter()
                .enumerate()
                .filter(|(_, wnd)| wnd.col == rod.col)
                .map(|(i, _)| i)
                .collect()
        })
        .collect();
    let anti_in = |wnd: usize| anti.iter().filter(|targets| targets.contains(&wnd)).count();

    let block = b.init_node("Block", Action::Sync, false, n_rod.max(1), 0)?;
    b.root(block);

    let mut rods = Vec::with_capacity(n_rod);
    for ((pda, &buf), targets) in rod_pdas.iter().zip(&rod_bufs).zip(&anti) {
        let read = Action::Read {
            pda: pda.clone(),
            buf,
            stripe,
            param: io_param(false, false, 0),
        };
        rods.push(b.init_node("Rod", read, false, 1 + targets.len(), 1)?);
    }

    let sources = rod_pdas
        .iter()
        .zip(&rod_bufs)
        .chain(asmap.data.iter().zip(&wnd_bufs))
        .map(|(pda, &buf)| Source {
            pda: pda.clone(),
            buf,
        })
        .collect();
    let xor = b.init_node(
        "Xor",
        Action::Xor {
            kernel: XorKernel::Regular,
            geometry: geom,
            sources,
            dest: parity.clone(),
            result: p_buf,
            q_result: q_buf,
        },
        false,
        1,
        n_rod.max(1),
    )?;

    let gate = b.init_node(
        recovery.gate_name(),
        Action::Sync,
        recovery.has_commit(),
        n_wnd + nf,
        1,
    )?;

    let mut writes: Vec<NodeId> = Vec::with_capacity(n_wnd + nf);
    for (i, (pda, &buf)) in asmap.data.iter().zip(&wnd_bufs).enumerate() {
        let write = Action::Write {
            pda: pda.clone(),
            buf,
            stripe,
            param: io_param(false, false, 0),
        };
        writes.push(b.init_node("Wnd", write, false, 1, 1 + anti_in(i))?);
    }
    let wnp = Action::Write {
        pda: parity.clone(),
        buf: p_buf,
        stripe,
        param: io_param(false, false, 0),
    };
    writes.push(b.init_node("Wnp", wnp, false, 1, 1)?);
    if let Some(q_buf) = q_buf {
        let wnq = Action::Write {
            pda: asmap.q[0].clone(),
            buf: q_buf,
            stripe,
            param: io_param(false, false, 0),
        };
        writes.push(b.init_node("Wnq", wnq, false, 1, 1)?);
    }

    let term = b.init_node("Term", Action::Terminate, false, 0, n_wnd + nf)?;

    if rods.is_empty() {
        b.link(block, xor, AntType::Control);
    }
    for &rod in &rods {
        b.link(block, rod, AntType::Control);
        b.link(rod, xor, AntType::TrueData);
    }
    b.link(xor, gate, AntType::Control);
    for &write in &writes {
        b.link(gate, write, AntType::Control);
        b.link(write, term, AntType::Control);
    }
    for (&rod, targets) in rods.iter().zip(&anti) {
        for &wnd in targets {
            b.link(rod, writes[wnd], AntType::AntiData);
        }
    }

    b.finish()
}
