use std::fmt::Write;

use raid_dag::{Dag, Recovery, WriteRequest, map_access, select_write_dag};

use crate::cli::{PlanArgs, PlanFormat};

pub fn run(args: &PlanArgs) -> anyhow::Result<()> {
    let layout = args.array.layout()?;
    let cfg = args.policy.config();
    let recovery: Recovery = args.policy.recovery.into();

    for asmap in map_access(&layout, args.addr, args.sectors, &args.failed)? {
        let dag = select_write_dag(&WriteRequest::new(&asmap, &layout), &cfg, recovery)?;
        dag.validate()?;
        match args.format {
            PlanFormat::Summary => print!("{}", summary(asmap.stripe_id, &dag)),
            PlanFormat::Dot => print!("{}", dag.to_dot()),
        }
    }
    Ok(())
}

fn summary(stripe: u64, dag: &Dag) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "stripe {stripe}: {} nfaults={} nodes={} edges={} commit_nodes={} buffers={}B",
        dag.creator(),
        dag.nfaults(),
        dag.len(),
        dag.edge_count(),
        dag.num_commit_nodes(),
        dag.arena().allocated_bytes(),
    );
    for (name, count) in dag.summary() {
        let _ = writeln!(out, "  {name} x{count}");
    }
    let _ = writeln!(out, "  fingerprint {}", hex(&dag.fingerprint()));
    out
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().fold(String::new(), |mut s, b| {
        let _ = write!(s, "{b:02x}");
        s
    })
}
