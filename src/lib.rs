//! Cortical - Hierarchical Temporal Memory Engine
//!
//! Cortical is a Rust implementation of the cortical learning algorithm:
//! spatial pooling over competitive columns and temporal (sequence) memory
//! over their cells, with online learning, anomaly detection and a
//! prediction-quality signal.
//!
//! # Key Characteristics
//!
//! - Sparse distributed representations (SDRs) as the sole data interchange
//! - Online learning with periodic forgetting of stale structure
//! - Deterministic results independent of the worker-thread count
//! - Lock-free data parallelism over disjoint column ranges
//!
//! # Architecture
//!
//! The engine is built around a few core components:
//!
//! - **Sdr**: fixed-length sparse bit vectors and the integer encoder
//! - **Region**: columns, cells, dendrite segments and lateral connections
//! - **Spatial pooling**: column overlap, winner selection, reinforcement
//!   and boosting
//! - **Temporal memory**: cell activation, prediction, two-phase learning
//!   updates and forgetting
//! - **WorkerPool**: fixed thread pool running the parallel phases of a
//!   cycle as strict fork-joins
//!
//! # Examples
//!
//! ```
//! use cortical::{Params, Region, Sdr, WorkerPool};
//!
//! let mut params = Params::default();
//! params.column_count = 64;
//! params.sdr_base = 100;
//! params.sdr_set = 10;
//!
//! let mut region = Region::new(&params, 42).unwrap();
//! let pool = WorkerPool::new(4).unwrap();
//!
//! for (i, value) in [3usize, 7, 11, 3, 7, 11].iter().enumerate() {
//!     let input = Sdr::encode(*value, params.sdr_base, params.sdr_set).unwrap();
//!     let stats = region.step(input, &pool, &params);
//!     assert_eq!(stats.cycle, i as u64);
//! }
//! ```
//!
//! Regions stack into hierarchies by feeding one region's
//! [`Region::predictive_bitmap`] (or several, via [`Sdr::concat`]) to the
//! next as its input SDR.

pub mod error;
pub mod params;
pub mod pool;
pub mod region;
pub mod sdr;
pub mod utils;

pub(crate) mod spatial;
pub(crate) mod temporal;

pub use error::{CorticalError, Result};
pub use params::Params;
pub use pool::{Phase, WorkerPool};
pub use region::{Cell, Column, Connection, CycleStats, Region, Segment, Update};
pub use sdr::Sdr;

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Engine name
pub const NAME: &str = "Cortical";

/// Get version string
pub fn version() -> String {
    format!("{} v{}", NAME, VERSION)
}
