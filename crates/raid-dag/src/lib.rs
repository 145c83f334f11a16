//! RAID write DAG construction and a reference execution engine.
//!
//! A logical write that has been mapped onto one stripe (`layout`) is turned
//! into a dependency graph of disk reads, redundancy computations and disk
//! writes (`builders`). Every rollback-capable graph routes its pre-write work
//! through a single commit node, which `engine` uses to decide between undoing
//! completed work and retrying forward.
#![allow(clippy::cargo_common_metadata)]

pub mod builders;
pub mod config;
pub mod dag;
pub mod engine;
pub mod error;
pub mod kernels;
pub mod layout;
pub mod metrics;
pub mod retention;

pub use builders::{
    FaultTolerance, Recovery, WriteRequest, create_large_write_dag, create_mirror_write_dag,
    create_small_write_dag, select_write_dag,
};
pub use config::{DagConfig, RetryPolicy};
pub use dag::{AntType, Dag, NodeId};
pub use engine::{DiskIo, Engine, Outcome};
pub use error::{DagError, ExecError, IoError};
pub use layout::{AccessStripeMap, PhysDiskAddr, RaidLayout, RaidLevel, map_access};
pub use metrics::{MetricsSink, OpCounter};
pub use retention::{FileArray, MemArray, verify_stripe};
