//! # mva-train
//!
//! Training core for per-variable calibration processors: each processor
//! consumes a stream of labeled, weighted events, produces a serializable
//! calibration artifact, and can skip retraining when a persisted cache
//! file is found on disk.
//!
//! The orchestration framework that owns the processor DAG, the XML
//! configuration documents, and the downstream evaluation engine all live
//! outside this crate; the boundary types ([`TrainerContext`],
//! [`Calibration`], [`mva_core::FitToolkit`]) are what crosses it.
//!
//! ## Example
//!
//! ```no_run
//! use mva_core::{Class, TrainingEvent};
//! use mva_train::{ProcLinear, Processor, SourceVariable, TrainerContext};
//!
//! # fn run() -> mva_core::Result<()> {
//! let mut ctx = TrainerContext::new("run", "train");
//! let mut proc = Processor::new("calib", Box::new(ProcLinear::new()));
//! proc.configure(vec![SourceVariable::new("reco", "pt")], None)?;
//!
//! if !proc.try_load_cached(&ctx)? {
//!     proc.begin_training(&ctx)?;
//!     for (x, class) in [(42.0, Class::Signal), (17.0, Class::Background)] {
//!         let values = vec![vec![x]];
//!         proc.observe(&TrainingEvent {
//!             class,
//!             weight: 1.0,
//!             values: &values,
//!             train: true,
//!             test: true,
//!         })?;
//!     }
//!     proc.end_training(&mut ctx)?;
//!     proc.persist(&ctx)?;
//! }
//! let calibration = proc.export_calibration(&ctx)?;
//! # let _ = calibration;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod binding;
pub mod calibration;
pub mod codec;
pub mod config;
pub mod context;
pub mod dataset;
pub mod least_squares;
pub mod monitor;
pub mod proc_external;
pub mod proc_linear;
pub mod processor;
pub mod toolkit;

pub use binding::{SourceVariable, VariableBinding};
pub use calibration::Calibration;
pub use config::MethodConfig;
pub use context::TrainerContext;
pub use least_squares::LeastSquares;
pub use monitor::{BinSet, FinalizedMonitor, MonitorStore};
pub use proc_external::ProcExternal;
pub use proc_linear::ProcLinear;
pub use processor::{MonitorKind, Phase, ProcScope, Processor, Registry, Variant};
pub use toolkit::ScopedWorkdir;
