use std::sync::Arc;

use anyhow::{Context, bail};
use rand::{Rng, RngCore};
use raid_dag::{
    DagError, Engine, ExecError, FileArray, OpCounter, RaidLayout, Recovery, WriteRequest,
    map_access, select_write_dag, verify_stripe,
};
use tracing::{info, warn};

use crate::cli::{ScrubArgs, SimulateArgs};

#[derive(Debug, Default)]
struct Tally {
    graphs: usize,
    committed: usize,
    retries: usize,
    rolled_back: usize,
    unsupported: usize,
}

pub fn run(args: &SimulateArgs) -> anyhow::Result<()> {
    let layout = args.array.layout()?;
    let cfg = args.policy.config();
    let recovery: Recovery = args.policy.recovery.into();
    let capacity = args.stripes * layout.sectors_per_stripe();
    if capacity == 0 || args.max_sectors == 0 {
        bail!("nothing to write: {} stripes, max {} sectors", args.stripes, args.max_sectors);
    }

    let mut array = FileArray::open(&args.disk_dir, &layout, args.stripes)?;
    if let Some(col) = args.fail_disk {
        array.fail_disk(col)?;
        warn!(col, "disk failed before simulation");
    }

    let counter = Arc::new(OpCounter::new());
    let mut rng = rand::rng();
    let mut tally = Tally::default();

    for _ in 0..args.writes {
        let addr = rng.random_range(0..capacity);
        let n = rng.random_range(1..=args.max_sectors.min(capacity - addr));
        let mut payload = vec![0u8; layout.bytes(n)];
        rng.fill_bytes(&mut payload);

        let failed = array.failed_cols();
        for asmap in map_access(&layout, addr, n, &failed)? {
            let off = layout.bytes(asmap.raid_address - addr);
            let chunk = &payload[off..off + layout.bytes(asmap.total_sectors_accessed)];
            let req = WriteRequest::new(&asmap, &layout).with_payload(chunk);
            let mut dag = match select_write_dag(&req, &cfg, recovery) {
                Ok(dag) => dag,
                Err(DagError::Unsupported(reason)) => {
                    tally.unsupported += 1;
                    warn!(stripe = asmap.stripe_id, reason, "write skipped");
                    continue;
                }
                Err(err) => return Err(err.into()),
            };

            tally.graphs += 1;
            let mut engine = Engine::new(&mut array, args.retry()).with_metrics(counter.clone());
            match engine.execute(&mut dag) {
                Ok(outcome) => {
                    tally.retries += outcome.retries;
                    tally.committed += usize::from(outcome.committed);
                }
                Err(ExecError::RolledBack { .. }) => tally.rolled_back += 1,
                Err(err) => {
                    return Err(err).with_context(|| format!("stripe {}", asmap.stripe_id));
                }
            }
        }
    }
    array.flush()?;
    info!(?tally, "simulation finished");

    println!(
        "writes={} graphs={} committed={} retries={} rolled_back={} unsupported={}",
        args.writes, tally.graphs, tally.committed, tally.retries, tally.rolled_back, tally.unsupported
    );
    for ((col, op), totals) in counter.disk_totals() {
        println!(
            "  disk {col} {:<6} ops={} bytes={} errors={}",
            op.as_str(),
            totals.ops,
            totals.bytes,
            totals.errors
        );
    }
    print!("{}", array.status_string());

    if array.failed_cols().is_empty() {
        scrub_all(&mut array, &layout, args.stripes)?;
    } else {
        println!("scrub skipped: array is degraded");
    }
    Ok(())
}

pub fn scrub(args: &ScrubArgs) -> anyhow::Result<()> {
    let layout = args.array.layout()?;
    let mut array = FileArray::open(&args.disk_dir, &layout, args.stripes)?;
    scrub_all(&mut array, &layout, args.stripes)
}

fn scrub_all(array: &mut FileArray, layout: &RaidLayout, stripes: u64) -> anyhow::Result<()> {
    for stripe in 0..stripes {
        let bad = verify_stripe(array, layout, stripe)
            .with_context(|| format!("scrubbing stripe {stripe}"))?;
        if !bad.is_empty() {
            bail!("stripe {stripe}: redundancy mismatch on columns {bad:?}");
        }
    }
    println!("scrub: {stripes} stripes clean");
    Ok(())
}
