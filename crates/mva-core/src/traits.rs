//! External fitting-toolkit boundary.
//!
//! This module defines the trait through which the artifact-embedding
//! processor variant invokes an external numerical-modeling toolkit. The
//! dependency points inward: the training core never links against a
//! concrete toolkit, it only hands a [`FitRequest`] to whatever
//! implementation the orchestrator registered.

use std::path::PathBuf;

use crate::Result;

/// One fit invocation handed to an external toolkit.
#[derive(Debug, Clone)]
pub struct FitRequest {
    /// Path of the exported columnar training dataset.
    pub dataset: PathBuf,
    /// Toolkit method type identifier (e.g. `"BDT"`).
    pub method_type: String,
    /// Method instance name; keys the weights file on disk.
    pub method_name: String,
    /// Free-text method description, forwarded verbatim.
    pub description: String,
    /// Ordered, de-duplicated input variable names (dataset columns).
    pub variables: Vec<String>,
    /// Name of the boolean class-label column (the discriminant).
    pub target_column: String,
    /// Name of the per-row weight column.
    pub weight_column: String,
    /// Path where the toolkit must leave its textual weights description.
    pub weights_output: PathBuf,
}

/// External multivariate fitting toolkit.
///
/// Implementations consume the exported dataset named in the request and
/// leave a textual weights description at `weights_output`. Toolkits keep
/// ambient "current working file" state and are not reentrant-safe across
/// processors; callers must scope that state around every invocation (see
/// `ScopedWorkdir` in `mva-train`).
pub trait FitToolkit: Send + Sync {
    /// Toolkit name, for diagnostics.
    fn name(&self) -> &str;

    /// Run the fit described by `req`.
    ///
    /// A rejected dataset (e.g. a class with zero events was already
    /// screened out by the caller, but a toolkit may have further
    /// requirements) is an error; there is no partial success.
    fn fit(&self, req: &FitRequest) -> Result<()>;
}
