//! Solver-backed linear calibration variant.
//!
//! Accumulates every train-routed event into a weighted least-squares
//! system and solves it in closed form at the end of the single fill
//! phase. The cache file is a self-describing JSON document holding the
//! full accumulator state.

use std::io;

use mva_core::{Class, Error, Result};
use serde::{Deserialize, Serialize};

use crate::binding::VariableBinding;
use crate::calibration::Calibration;
use crate::least_squares::LeastSquares;
use crate::processor::{Phase, ProcScope, Variant};

/// Registry and cache-file tag of this variant.
pub const KIND: &str = "ProcLinear";

/// Cache-file extension.
const CACHE_EXT: &str = "json";

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct CacheFile {
    kind: String,
    least_squares: LeastSquares,
}

/// Linear least-squares processor variant.
#[derive(Debug)]
pub struct ProcLinear {
    phase: Phase,
    ls: LeastSquares,
    vars: Vec<f64>,
}

impl ProcLinear {
    /// Fresh, unconfigured variant.
    pub fn new() -> Self {
        Self { phase: Phase::Fill, ls: LeastSquares::new(0), vars: Vec::new() }
    }
}

impl Default for ProcLinear {
    fn default() -> Self {
        Self::new()
    }
}

impl Variant for ProcLinear {
    fn kind(&self) -> &'static str {
        KIND
    }

    fn configure(
        &mut self,
        binding: &VariableBinding,
        _config: Option<roxmltree::Node<'_, '_>>,
    ) -> Result<()> {
        self.ls = LeastSquares::new(binding.len());
        Ok(())
    }

    fn train_begin(&mut self, _proc: &ProcScope<'_>) -> Result<()> {
        if self.phase == Phase::Fill {
            self.vars.resize(self.ls.size(), 0.0);
        }
        Ok(())
    }

    fn train_data(&mut self, values: &[Vec<f64>], class: Class, weight: f64) -> Result<()> {
        if self.phase != Phase::Fill {
            return Ok(());
        }
        // Only the first scalar of each value-group participates.
        for (slot, group) in self.vars.iter_mut().zip(values) {
            *slot = group.first().copied().unwrap_or(0.0);
        }
        self.ls.add(&self.vars, class.is_signal(), weight);
        Ok(())
    }

    fn train_end(&mut self, proc: &ProcScope<'_>) -> Result<()> {
        if self.phase == Phase::Fill {
            self.vars.clear();
            self.ls.calculate()?;
            self.phase.advance();
            log::debug!("processor '{}': least-squares fit solved", proc.name);
        }
        Ok(())
    }

    fn is_trained(&self) -> bool {
        self.phase.is_done()
    }

    fn load(&mut self, proc: &ProcScope<'_>) -> Result<bool> {
        let path = proc.ctx.train_file(proc.name, CACHE_EXT, None);

        // An absent or unparseable file is a clean miss; a file that
        // parses but does not belong here is fatal.
        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(_) => return Ok(false),
        };
        let value: serde_json::Value = match serde_json::from_str(&text) {
            Ok(value) => value,
            Err(_) => return Ok(false),
        };

        match value.get("kind").and_then(serde_json::Value::as_str) {
            Some(KIND) => {}
            _ => {
                return Err(Error::Config(format!(
                    "cache file {} does not belong to a {KIND} processor",
                    path.display()
                )))
            }
        }

        let cache: CacheFile = serde_json::from_value(value)
            .map_err(|e| Error::Config(format!("cache file {}: {e}", path.display())))?;
        if cache.least_squares.size() != self.ls.size() {
            return Err(Error::Config(format!(
                "cache file {} was trained with {} inputs, {} are bound",
                path.display(),
                cache.least_squares.size(),
                self.ls.size()
            )));
        }

        self.ls = cache.least_squares;
        self.phase = Phase::Done;
        Ok(true)
    }

    fn save(&self, proc: &ProcScope<'_>) -> Result<()> {
        let path = proc.ctx.train_file(proc.name, CACHE_EXT, None);
        let cache = CacheFile { kind: KIND.to_string(), least_squares: self.ls.clone() };
        let text = serde_json::to_string_pretty(&cache)?;
        std::fs::write(&path, text)
            .map_err(|e| io::Error::new(e.kind(), format!("writing {}: {e}", path.display())))?;
        Ok(())
    }

    fn calibration(&self, _proc: &ProcScope<'_>) -> Result<Calibration> {
        Ok(Calibration::Linear {
            coefficients: self.ls.weights().to_vec(),
            offset: self.ls.constant(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::TrainerContext;

    fn scope<'a>(ctx: &'a TrainerContext, name: &'a str) -> ProcScope<'a> {
        ProcScope { name, ctx }
    }

    fn binding(n: usize) -> VariableBinding {
        VariableBinding::new(
            (0..n).map(|i| crate::binding::SourceVariable::new("s", format!("v{i}"))).collect(),
        )
    }

    #[test]
    fn events_after_the_fill_phase_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = TrainerContext::new("run", dir.path());
        let mut lin = ProcLinear::new();
        lin.configure(&binding(1), None).unwrap();
        lin.train_begin(&scope(&ctx, "p")).unwrap();
        lin.train_data(&[vec![1.0]], Class::Signal, 1.0).unwrap();
        lin.train_data(&[vec![2.0]], Class::Background, 1.0).unwrap();
        lin.train_end(&scope(&ctx, "p")).unwrap();
        let frozen = lin.ls.clone();

        lin.train_data(&[vec![99.0]], Class::Signal, 5.0).unwrap();
        lin.train_end(&scope(&ctx, "p")).unwrap();
        assert_eq!(lin.ls, frozen);
    }

    #[test]
    fn cache_round_trip_preserves_the_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = TrainerContext::new("run", dir.path());

        let mut lin = ProcLinear::new();
        lin.configure(&binding(1), None).unwrap();
        lin.train_begin(&scope(&ctx, "p")).unwrap();
        lin.train_data(&[vec![1.0]], Class::Signal, 1.0).unwrap();
        lin.train_data(&[vec![2.0]], Class::Background, 1.0).unwrap();
        lin.train_data(&[vec![3.0]], Class::Signal, 1.0).unwrap();
        lin.train_end(&scope(&ctx, "p")).unwrap();
        lin.save(&scope(&ctx, "p")).unwrap();
        let trained = lin.calibration(&scope(&ctx, "p")).unwrap();

        let mut restored = ProcLinear::new();
        restored.configure(&binding(1), None).unwrap();
        assert!(restored.load(&scope(&ctx, "p")).unwrap());
        assert!(restored.is_trained());
        assert_eq!(restored.calibration(&scope(&ctx, "p")).unwrap(), trained);
    }

    #[test]
    fn missing_cache_is_a_clean_miss() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = TrainerContext::new("run", dir.path());
        let mut lin = ProcLinear::new();
        lin.configure(&binding(1), None).unwrap();
        assert!(!lin.load(&scope(&ctx, "p")).unwrap());
    }

    #[test]
    fn foreign_cache_file_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = TrainerContext::new("run", dir.path());
        std::fs::write(ctx.train_file("p", CACHE_EXT, None), r#"{"kind":"SomethingElse"}"#)
            .unwrap();

        let mut lin = ProcLinear::new();
        lin.configure(&binding(1), None).unwrap();
        assert!(matches!(lin.load(&scope(&ctx, "p")), Err(Error::Config(_))));
    }

    #[test]
    fn garbage_cache_file_is_a_miss_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = TrainerContext::new("run", dir.path());
        std::fs::write(ctx.train_file("p", CACHE_EXT, None), "not json at all").unwrap();

        let mut lin = ProcLinear::new();
        lin.configure(&binding(1), None).unwrap();
        assert!(!lin.load(&scope(&ctx, "p")).unwrap());
    }

    #[test]
    fn cache_with_superfluous_fields_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = TrainerContext::new("run", dir.path());

        let mut lin = ProcLinear::new();
        lin.configure(&binding(1), None).unwrap();
        lin.train_begin(&scope(&ctx, "p")).unwrap();
        lin.train_data(&[vec![1.0]], Class::Signal, 1.0).unwrap();
        lin.train_data(&[vec![2.0]], Class::Background, 1.0).unwrap();
        lin.train_end(&scope(&ctx, "p")).unwrap();
        lin.save(&scope(&ctx, "p")).unwrap();

        // Graft an extra field onto the valid cache document.
        let path = ctx.train_file("p", CACHE_EXT, None);
        let mut value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        value["trailing"] = serde_json::json!(1);
        std::fs::write(&path, serde_json::to_string(&value).unwrap()).unwrap();

        let mut fresh = ProcLinear::new();
        fresh.configure(&binding(1), None).unwrap();
        assert!(matches!(fresh.load(&scope(&ctx, "p")), Err(Error::Config(_))));
    }

    #[test]
    fn input_count_mismatch_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = TrainerContext::new("run", dir.path());

        let mut lin = ProcLinear::new();
        lin.configure(&binding(1), None).unwrap();
        lin.train_begin(&scope(&ctx, "p")).unwrap();
        lin.train_data(&[vec![1.0]], Class::Signal, 1.0).unwrap();
        lin.train_data(&[vec![2.0]], Class::Background, 1.0).unwrap();
        lin.train_end(&scope(&ctx, "p")).unwrap();
        lin.save(&scope(&ctx, "p")).unwrap();

        let mut wider = ProcLinear::new();
        wider.configure(&binding(2), None).unwrap();
        assert!(matches!(wider.load(&scope(&ctx, "p")), Err(Error::Config(_))));
    }
}
