use rand::Rng;

use crate::builders::{FaultTolerance, Recovery, WriteRequest, create_large_write_dag};
use crate::config::DagConfig;
use crate::dag::{Action, AntType, BufferId, Dag, NodeId};
use crate::error::DagError;
use crate::layout::{AccessStripeMap, RaidLayout, RaidLevel, map_access};

fn raid5() -> RaidLayout {
    RaidLayout::new(RaidLevel::Raid5, 5, 8, 16).unwrap()
}

fn raid6() -> RaidLayout {
    RaidLayout::new(RaidLevel::Raid6, 6, 8, 16).unwrap()
}

fn asmap(layout: &RaidLayout, addr: u64, n: u64) -> AccessStripeMap {
    map_access(layout, addr, n, &[]).unwrap().remove(0)
}

fn build(
    layout: &RaidLayout,
    asmap: &AccessStripeMap,
    cfg: &DagConfig,
    nfaults: FaultTolerance,
    recovery: Recovery,
) -> Dag {
    create_large_write_dag(&WriteRequest::new(asmap, layout), cfg, nfaults, recovery).unwrap()
}

fn ids(dag: &Dag, name: &str) -> Vec<NodeId> {
    dag.named(name).map(|(id, _)| id).collect()
}

fn only(dag: &Dag, name: &str) -> NodeId {
    let found = ids(dag, name);
    assert_eq!(found.len(), 1, "expected exactly one {name}");
    found[0]
}

fn io_buf(dag: &Dag, id: NodeId) -> BufferId {
    match &dag.node(id).action {
        Action::Read { buf, .. } | Action::Write { buf, .. } => *buf,
        other => panic!("not an I/O node: {other:?}"),
    }
}

#[test]
fn full_stripe_single_parity_matches_reference_shape() {
    let layout = raid5();
    let asmap = asmap(&layout, 0, 32);
    let dag = build(
        &layout,
        &asmap,
        &DagConfig::default(),
        FaultTolerance::Single,
        Recovery::Rollback,
    );
    dag.validate().unwrap();

    assert_eq!(dag.count("Rod"), 0);
    assert_eq!(dag.count("Wnd"), 4);
    assert_eq!(dag.count("Wnp"), 1);
    assert_eq!(dag.count("Wnq"), 0);
    assert_eq!(dag.num_commit_nodes(), 1);

    let block = only(&dag, "Block");
    let xor = only(&dag, "Xor");
    assert_eq!(dag.node(xor).antecedents(), &[(block, AntType::Control)]);

    let wnd_bufs: Vec<BufferId> = ids(&dag, "Wnd").into_iter().map(|id| io_buf(&dag, id)).collect();
    let Action::Xor { sources, .. } = &dag.node(xor).action else {
        panic!("Xor node carries a non-xor action");
    };
    let source_bufs: Vec<BufferId> = sources.iter().map(|s| s.buf).collect();
    assert_eq!(source_bufs, wnd_bufs);

    let commit = only(&dag, "Commit");
    assert!(dag.node(commit).commit);
    assert_eq!(dag.node(commit).antecedents(), &[(xor, AntType::Control)]);
    assert_eq!(dag.node(commit).succedents().len(), 5);

    let term = only(&dag, "Term");
    assert_eq!(dag.node(term).antecedents().len(), 5);
    assert_eq!(dag.roots(), &[block]);
}

#[test]
fn partial_stripe_reads_unaccessed_portion() {
    let layout = raid5();
    let asmap = asmap(&layout, 3, 26);
    let dag = build(
        &layout,
        &asmap,
        &DagConfig::default(),
        FaultTolerance::Single,
        Recovery::Rollback,
    );
    dag.validate().unwrap();

    let rods = ids(&dag, "Rod");
    assert_eq!(rods.len(), 2);
    let xor = only(&dag, "Xor");
    for &rod in &rods {
        assert_eq!(dag.node(xor).antecedent_type(rod), Some(AntType::TrueData));
        assert_eq!(dag.node(rod).succedents(), &[xor]);
    }
    let Action::Xor { sources, result, .. } = &dag.node(xor).action else {
        panic!("Xor node carries a non-xor action");
    };
    assert_eq!(sources.len(), 2 + 4);
    assert!(
        rods.iter().all(|&rod| io_buf(&dag, rod) != *result),
        "partial Rod buffers cannot hold a full parity unit"
    );
}

#[test]
fn parity_recycles_full_unit_rod_buffer_when_allowed() {
    let layout = raid5();
    let asmap = asmap(&layout, 8, 16);

    let dag = build(
        &layout,
        &asmap,
        &DagConfig::default(),
        FaultTolerance::Single,
        Recovery::Rollback,
    );
    let rods = ids(&dag, "Rod");
    let xor = only(&dag, "Xor");
    let Action::Xor { result, .. } = &dag.node(xor).action else {
        panic!("Xor node carries a non-xor action");
    };
    assert_eq!(*result, io_buf(&dag, rods[0]));
    assert_eq!(io_buf(&dag, only(&dag, "Wnp")), *result);

    let cfg = DagConfig {
        allow_buffer_recycle: false,
        ..DagConfig::default()
    };
    let dag = build(&layout, &asmap, &cfg, FaultTolerance::Single, Recovery::Rollback);
    let xor = only(&dag, "Xor");
    let Action::Xor { result, .. } = &dag.node(xor).action else {
        panic!("Xor node carries a non-xor action");
    };
    for rod in ids(&dag, "Rod") {
        assert_ne!(io_buf(&dag, rod), *result);
    }
}

#[test]
fn double_fault_pairs_wnp_with_wnq_under_commit() {
    let layout = raid6();
    for (addr, n) in [(0, 32), (8, 24), (3, 26)] {
        let asmap = asmap(&layout, addr, n);
        let dag = build(
            &layout,
            &asmap,
            &DagConfig::default(),
            FaultTolerance::Double,
            Recovery::Rollback,
        );
        dag.validate().unwrap();
        assert_eq!(dag.nfaults(), 2);

        let commit = only(&dag, "Commit");
        let wnp = only(&dag, "Wnp");
        let wnq = only(&dag, "Wnq");
        let succ = dag.node(commit).succedents();
        assert!(succ.contains(&wnp) && succ.contains(&wnq));
        assert_eq!(succ.len(), asmap.data.len() + 2);

        let (_, p_stripe, p_param) = dag.node(wnp).io().unwrap();
        let (q_pda, q_stripe, q_param) = dag.node(wnq).io().unwrap();
        assert_eq!(p_stripe, q_stripe);
        assert_eq!(p_param.which_ru, q_param.which_ru);
        assert_eq!(q_pda.col, layout.q_col(asmap.stripe_id).unwrap());

        let q_buf = io_buf(&dag, wnq);
        for rod in ids(&dag, "Rod") {
            assert_ne!(io_buf(&dag, rod), q_buf, "Q result must not be recycled");
        }
        assert_ne!(io_buf(&dag, wnp), q_buf);
    }
}

#[test]
fn forward_only_replaces_commit_and_guards_same_disk_rods() {
    let layout = raid5();
    let asmap = asmap(&layout, 3, 26);
    let dag = build(
        &layout,
        &asmap,
        &DagConfig::default(),
        FaultTolerance::Single,
        Recovery::ForwardOnly,
    );
    dag.validate().unwrap();
    assert_eq!(dag.num_commit_nodes(), 0);
    assert_eq!(dag.count("Commit"), 0);
    assert_eq!(dag.count("Sync"), 1);
    assert!(dag.commit_node().is_none());

    let wnds = ids(&dag, "Wnd");
    let mut anti_edges = 0;
    for rod in ids(&dag, "Rod") {
        let (rod_pda, _, _) = dag.node(rod).io().unwrap();
        for &wnd in &wnds {
            let (wnd_pda, _, _) = dag.node(wnd).io().unwrap();
            let edge = dag.node(wnd).antecedent_type(rod);
            if rod_pda.col == wnd_pda.col {
                assert_eq!(edge, Some(AntType::AntiData));
                anti_edges += 1;
            } else {
                assert_eq!(edge, None);
            }
        }
    }
    assert_eq!(anti_edges, 2);
}

#[test]
fn forward_only_keeps_rollback_node_set() {
    let layout = raid6();
    let asmap = asmap(&layout, 3, 26);
    let cfg = DagConfig::default();
    let rollback = build(&layout, &asmap, &cfg, FaultTolerance::Double, Recovery::Rollback);
    let forward = build(&layout, &asmap, &cfg, FaultTolerance::Double, Recovery::ForwardOnly);
    assert_eq!(rollback.len(), forward.len());
    for name in ["Block", "Rod", "Xor", "Wnd", "Wnp", "Wnq", "Term"] {
        assert_eq!(rollback.count(name), forward.count(name), "{name}");
    }
}

#[test]
fn split_parity_is_rejected() {
    let layout = raid5();
    let asmap = asmap(&layout, 6, 4);
    let err = create_large_write_dag(
        &WriteRequest::new(&asmap, &layout),
        &DagConfig::default(),
        FaultTolerance::Single,
        Recovery::Rollback,
    )
    .unwrap_err();
    assert!(matches!(err, DagError::InvalidAccess(_)));
}

#[test]
fn missing_q_is_rejected() {
    let layout = raid5();
    let asmap = asmap(&layout, 0, 32);
    let err = create_large_write_dag(
        &WriteRequest::new(&asmap, &layout),
        &DagConfig::default(),
        FaultTolerance::Double,
        Recovery::Rollback,
    )
    .unwrap_err();
    assert!(matches!(err, DagError::InvalidAccess(_)));
}

#[test]
fn arena_exhaustion_aborts_the_build() {
    let layout = raid5();
    let asmap = asmap(&layout, 0, 32);
    let cfg = DagConfig {
        arena_limit: Some(layout.su_bytes() * 4),
        ..DagConfig::default()
    };
    let err = create_large_write_dag(
        &WriteRequest::new(&asmap, &layout),
        &cfg,
        FaultTolerance::Single,
        Recovery::Rollback,
    )
    .unwrap_err();
    assert!(matches!(err, DagError::OutOfMemory { .. }));
}

#[test]
fn payload_length_must_match_access() {
    let layout = raid5();
    let asmap = asmap(&layout, 0, 32);
    let short = vec![0u8; 10];
    let err = create_large_write_dag(
        &WriteRequest::new(&asmap, &layout).with_payload(&short),
        &DagConfig::default(),
        FaultTolerance::Single,
        Recovery::Rollback,
    )
    .unwrap_err();
    assert!(matches!(err, DagError::InvalidAccess(_)));
}

#[test]
fn construction_is_deterministic() {
    let layout = raid6();
    let mut rng = rand::rng();
    for _ in 0..32 {
        let start = rng.random_range(0..32u64);
        let len = rng.random_range(1..=32 - start);
        let asmap = asmap(&layout, start, len);
        if asmap.parity_spans_two_extents() {
            continue;
        }
        let recovery = if rng.random_bool(0.5) {
            Recovery::Rollback
        } else {
            Recovery::ForwardOnly
        };
        let cfg = DagConfig::default();
        let a = build(&layout, &asmap, &cfg, FaultTolerance::Double, recovery);
        let b = build(&layout, &asmap, &cfg, FaultTolerance::Double, recovery);
        assert_eq!(a.len(), b.len());
        assert_eq!(a.edge_count(), b.edge_count());
        assert_eq!(a.fingerprint(), b.fingerprint());
        a.validate().unwrap();
    }
}
