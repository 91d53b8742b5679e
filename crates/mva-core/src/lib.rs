//! # mva-core
//!
//! Foundation crate for the mvatrain workspace: the error taxonomy shared
//! by every training component, event-level types, and the trait boundary
//! to the external fitting toolkit.
//!
//! This crate deliberately contains no training logic. High-level processor
//! code (`mva-train`) depends on these abstractions, never the other way
//! around.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
pub use traits::{FitRequest, FitToolkit};
pub use types::{Class, TrainingEvent};
