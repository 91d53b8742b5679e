//! Calibration artifact schema consumed by the downstream scoring engine.

use serde::{Deserialize, Serialize};

/// Serialized result of one trained processor.
///
/// Ownership passes to the orchestrator on export; the artifact then lives
/// for the lifetime of the trained model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Calibration {
    /// Linear combination `output = coefficients . x + offset`.
    Linear {
        /// One coefficient per input variable, in binding order.
        coefficients: Vec<f64>,
        /// Constant offset.
        offset: f64,
    },
    /// Externally fitted model embedded as a compressed blob.
    External {
        /// Toolkit method identifier.
        method: String,
        /// Ordered, de-duplicated input variable names.
        variables: Vec<String>,
        /// zlib-compressed toolkit weights description, stored verbatim.
        payload: Vec<u8>,
    },
}
