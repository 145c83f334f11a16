use crate::config::DagConfig;
use crate::dag::{Action, AntType, Dag, DagBuilder, IoParam, NORMAL_PRIORITY, NodeId};
use crate::error::DagError;
use crate::layout::PhysDiskAddr;

fn write_action(b: &mut DagBuilder) -> Action {
    let buf = b.arena().alloc_zeroed(16).unwrap();
    Action::Write {
        pda: PhysDiskAddr::new(0, 0, 0, 1),
        buf,
        stripe: 0,
        param: IoParam::new(NORMAL_PRIORITY, false, false, 0),
    }
}

/// Block -> first -> second -> Term, with the commit flag on `commit_at`.
fn chain(first_is_write: bool, commit_at: usize) -> Dag {
    let mut b = DagBuilder::new("chain", 1, &DagConfig::default());
    let block = b.init_node("Block", Action::Sync, commit_at == 0, 1, 0).unwrap();
    let first_action = if first_is_write {
        write_action(&mut b)
    } else {
        Action::Sync
    };
    let first = b.init_node("A", first_action, commit_at == 1, 1, 1).unwrap();
    let second_action = if first_is_write {
        Action::Sync
    } else {
        write_action(&mut b)
    };
    let second = b.init_node("B", second_action, commit_at == 2, 1, 1).unwrap();
    let term = b.init_node("Term", Action::Terminate, false, 0, 1).unwrap();
    b.root(block);
    b.link(block, first, AntType::Control);
    b.link(first, second, AntType::Control);
    b.link(second, term, AntType::Control);
    b.finish().unwrap()
}

#[test]
fn write_downstream_of_commit_validates() {
    let dag = chain(false, 1);
    dag.validate().unwrap();
    assert_eq!(dag.commit_node(), Some(NodeId(1)));
    assert!(dag.is_upstream(NodeId(1), NodeId(2)));
    assert!(!dag.is_upstream(NodeId(2), NodeId(1)));
}

#[test]
fn write_upstream_of_commit_is_rejected() {
    let dag = chain(true, 2);
    let err = dag.validate().unwrap_err();
    assert!(matches!(err, DagError::Invalid(msg) if msg.contains("upstream of the commit")));
}

#[test]
fn anti_data_edge_requires_commit_free_graph() {
    let mut b = DagBuilder::new("anti", 1, &DagConfig::default());
    let c = b.init_node("Commit", Action::Sync, true, 1, 0).unwrap();
    let t = b.init_node("Term", Action::Terminate, false, 0, 1).unwrap();
    b.root(c);
    b.link(c, t, AntType::AntiData);
    let dag = b.finish().unwrap();
    assert!(dag.validate().is_err());
}

#[test]
fn cycle_is_rejected() {
    let mut b = DagBuilder::new("cycle", 1, &DagConfig::default());
    let r = b.init_node("Block", Action::Sync, false, 1, 0).unwrap();
    let a = b.init_node("A", Action::Sync, false, 1, 2).unwrap();
    let c = b.init_node("B", Action::Sync, false, 1, 1).unwrap();
    b.root(r);
    b.link(r, a, AntType::Control);
    b.link(a, c, AntType::Control);
    b.link(c, a, AntType::Control);
    let dag = b.finish().unwrap();
    assert!(dag.topological_order().is_err());
    assert!(dag.validate().is_err());
}

#[test]
fn unreachable_node_is_rejected() {
    let mut b = DagBuilder::new("island", 1, &DagConfig::default());
    let r = b.init_node("Block", Action::Sync, false, 0, 0).unwrap();
    b.init_node("Stray", Action::Sync, false, 0, 0).unwrap();
    b.root(r);
    let dag = b.finish().unwrap();
    assert!(dag.validate().is_err());
}

#[test]
fn fingerprint_tracks_structure() {
    assert_eq!(chain(false, 1).fingerprint(), chain(false, 1).fingerprint());
    assert_ne!(chain(false, 1).fingerprint(), chain(false, 0).fingerprint());
}

#[test]
fn summary_and_dot_describe_nodes() {
    let dag = chain(false, 1);
    assert_eq!(
        dag.summary(),
        vec![("Block", 1), ("A", 1), ("B", 1), ("Term", 1)]
    );
    let dot = dag.to_dot();
    assert!(dot.starts_with("digraph \"chain\""));
    assert!(dot.contains("n1 [label=\"A\", shape=box];"));
    assert!(dot.contains("hdr -> n0;"));
    assert!(dot.contains("B\\nc0[0..1)"));
}

#[test]
fn io_param_packs_and_unpacks() {
    let param = IoParam::new(NORMAL_PRIORITY, true, false, 3);
    let word = param.pack();
    assert_eq!(word, (1 << 24) | (1 << 17) | 3);
    assert_eq!(IoParam::unpack(word), param);
}
