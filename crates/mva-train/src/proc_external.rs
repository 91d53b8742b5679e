//! Artifact-embedding variant backed by an external fitting toolkit.
//!
//! The fill phase exports every train-routed event into a columnar
//! dataset; training end hands that dataset to the registered toolkit,
//! which leaves a textual weights description on disk. The calibration
//! artifact embeds that description recompressed. Presence of the weights
//! file doubles as the cache: a later run that finds it skips the fit.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use mva_core::{Class, Error, FitRequest, FitToolkit, Result};

use crate::binding::VariableBinding;
use crate::calibration::Calibration;
use crate::codec;
use crate::config::{parse_method, MethodConfig};
use crate::context::{remove_file_quiet, remove_weights_dir_quiet};
use crate::dataset::{DatasetBuilder, TARGET_COLUMN, WEIGHT_COLUMN};
use crate::processor::{Phase, ProcScope, Variant};
use crate::toolkit::ScopedWorkdir;

/// Registry name of this variant.
pub const KIND: &str = "ProcExternal";

/// Exported-dataset file extension.
const DATASET_EXT: &str = "arrow";

/// Externally fitted processor variant.
pub struct ProcExternal {
    phase: Phase,
    toolkit: Arc<dyn FitToolkit>,
    method: Option<MethodConfig>,
    names: Vec<String>,
    dataset: Option<DatasetBuilder>,
    n_signal: u64,
    n_background: u64,
    need_cleanup: bool,
}

impl ProcExternal {
    /// Variant bound to a concrete toolkit implementation.
    pub fn new(toolkit: Arc<dyn FitToolkit>) -> Self {
        Self {
            phase: Phase::Fill,
            toolkit,
            method: None,
            names: Vec::new(),
            dataset: None,
            n_signal: 0,
            n_background: 0,
            need_cleanup: false,
        }
    }

    fn method(&self) -> Result<&MethodConfig> {
        self.method
            .as_ref()
            .ok_or_else(|| Error::Config("external processor used before configure".into()))
    }

    fn dataset_file(&self, proc: &ProcScope<'_>) -> PathBuf {
        proc.ctx.train_file(proc.name, DATASET_EXT, Some("input"))
    }

    fn weights_file(&self, proc: &ProcScope<'_>) -> Result<PathBuf> {
        Ok(proc.ctx.weights_file(proc.name, &self.method()?.name, "txt"))
    }
}

impl Variant for ProcExternal {
    fn kind(&self) -> &'static str {
        KIND
    }

    fn configure(
        &mut self,
        binding: &VariableBinding,
        config: Option<roxmltree::Node<'_, '_>>,
    ) -> Result<()> {
        self.names = binding.names().to_vec();
        let elem = config
            .ok_or_else(|| Error::Config("missing config section for external method".into()))?;
        self.method = Some(parse_method(elem)?);
        Ok(())
    }

    fn train_begin(&mut self, proc: &ProcScope<'_>) -> Result<()> {
        if self.phase == Phase::Fill {
            self.dataset =
                Some(DatasetBuilder::new(proc.ctx.dataset_name(proc.name), &self.names));
            self.n_signal = 0;
            self.n_background = 0;
        }
        Ok(())
    }

    fn train_data(&mut self, values: &[Vec<f64>], class: Class, weight: f64) -> Result<()> {
        if self.phase != Phase::Fill {
            return Ok(());
        }
        let Some(dataset) = self.dataset.as_mut() else {
            debug_assert!(false, "train_data before train_begin");
            return Ok(());
        };

        // Only the first scalar of each value-group participates.
        let row: Vec<f64> =
            values.iter().map(|group| group.first().copied().unwrap_or(0.0)).collect();
        dataset.push(class, weight, &row);

        match class {
            Class::Signal => self.n_signal += 1,
            Class::Background => self.n_background += 1,
        }
        Ok(())
    }

    fn train_end(&mut self, proc: &ProcScope<'_>) -> Result<()> {
        if self.phase != Phase::Fill {
            return Ok(());
        }
        let dataset = self
            .dataset
            .take()
            .ok_or_else(|| Error::Config("train_end without train_begin".into()))?;

        let dataset_path = self.dataset_file(proc);
        dataset.write(&dataset_path)?;
        self.need_cleanup = true;

        if self.n_signal < 1 {
            return Err(Error::ExternalTool("not running the external fit: no signal events".into()));
        }
        if self.n_background < 1 {
            return Err(Error::ExternalTool(
                "not running the external fit: no background events".into(),
            ));
        }

        let method = self.method()?.clone();
        let weights_path = self.weights_file(proc)?;
        if let Some(dir) = weights_path.parent() {
            std::fs::create_dir_all(dir).map_err(|e| {
                io::Error::new(e.kind(), format!("creating {}: {e}", dir.display()))
            })?;
        }

        let request = FitRequest {
            dataset: dataset_path,
            method_type: method.method_type,
            method_name: method.name,
            description: method.description,
            variables: self.names.clone(),
            target_column: TARGET_COLUMN.to_string(),
            weight_column: WEIGHT_COLUMN.to_string(),
            weights_output: weights_path.clone(),
        };

        log::info!(
            "processor '{}': invoking toolkit '{}' on {} signal / {} background events",
            proc.name,
            self.toolkit.name(),
            self.n_signal,
            self.n_background
        );
        {
            // The toolkit mutates ambient working-directory state.
            let _workdir = ScopedWorkdir::enter()?;
            self.toolkit.fit(&request)?;
        }

        if !weights_path.is_file() {
            return Err(Error::ExternalTool(format!(
                "toolkit '{}' left no weights file at {}",
                self.toolkit.name(),
                weights_path.display()
            )));
        }

        self.phase.advance();
        Ok(())
    }

    fn is_trained(&self) -> bool {
        self.phase.is_done()
    }

    fn load(&mut self, proc: &ProcScope<'_>) -> Result<bool> {
        // Presence plus readability of the weights file; a stale or
        // manually edited file is accepted as-is.
        let path = self.weights_file(proc)?;
        let hit = std::fs::metadata(&path).map(|m| m.is_file()).unwrap_or(false);
        if !hit {
            return Ok(false);
        }
        self.phase = Phase::Done;
        Ok(true)
    }

    fn save(&self, _proc: &ProcScope<'_>) -> Result<()> {
        // The weights file written by the toolkit is the cache file.
        Ok(())
    }

    fn calibration(&self, proc: &ProcScope<'_>) -> Result<Calibration> {
        let method = self.method()?;
        let payload = codec::embed_file(&self.weights_file(proc)?)?;
        Ok(Calibration::External {
            method: method.name.clone(),
            variables: self.names.clone(),
            payload,
        })
    }

    fn cleanup(&mut self, proc: &ProcScope<'_>) -> Result<()> {
        if !self.need_cleanup {
            return Ok(());
        }
        remove_file_quiet(&self.dataset_file(proc));
        if let Ok(weights) = self.weights_file(proc) {
            remove_file_quiet(&weights);
        }
        remove_weights_dir_quiet(proc.ctx);
        self.need_cleanup = false;
        Ok(())
    }
}
