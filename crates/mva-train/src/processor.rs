//! Processor lifecycle: the state machine every variant obeys.
//!
//! A processor moves `UNCONFIGURED -> CONFIGURED -> TRAINING -> FINALIZED`.
//! The [`Processor`] host owns the input binding and the monitoring bin
//! sets and drives a boxed [`Variant`] through the shared contract; the
//! variant only implements the per-method hooks (fill, solve/fit, cache,
//! artifact).

use std::collections::BTreeMap;
use std::sync::Arc;

use mva_core::{Error, FitToolkit, Result, TrainingEvent};

use crate::binding::{SourceVariable, VariableBinding};
use crate::calibration::Calibration;
use crate::context::TrainerContext;
use crate::monitor::{BinSet, INPUT_BINS, OUTPUT_BINS};

/// Training-phase marker owned by each variant; advances forward only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    /// Consuming events.
    Fill,
    /// Training finished; further events are ignored.
    Done,
}

impl Phase {
    /// Advance to the next phase. `Done` is terminal.
    pub fn advance(&mut self) {
        *self = Phase::Done;
    }

    /// True once the fill phase is over.
    pub fn is_done(self) -> bool {
        self == Phase::Done
    }
}

/// Host lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum State {
    Unconfigured,
    Configured,
    Training,
    Finalized,
}

/// Name + context view handed into variant hooks.
pub struct ProcScope<'a> {
    /// Processor name.
    pub name: &'a str,
    /// Run-wide context (paths, naming).
    pub ctx: &'a TrainerContext,
}

/// Per-variant training hooks behind the shared lifecycle.
pub trait Variant {
    /// Registry name of this variant.
    fn kind(&self) -> &'static str;

    /// Parse the variant configuration section and size internal state to
    /// the binding.
    fn configure(
        &mut self,
        binding: &VariableBinding,
        config: Option<roxmltree::Node<'_, '_>>,
    ) -> Result<()>;

    /// Allocate per-iteration scratch state. A no-op once the fill phase
    /// is over.
    fn train_begin(&mut self, proc: &ProcScope<'_>) -> Result<()>;

    /// Consume one training-routed event.
    fn train_data(&mut self, values: &[Vec<f64>], class: mva_core::Class, weight: f64)
        -> Result<()>;

    /// Finalize the fill phase: run the solve or the external fit.
    fn train_end(&mut self, proc: &ProcScope<'_>) -> Result<()>;

    /// Whether training finished (or a cache was loaded).
    fn is_trained(&self) -> bool;

    /// Reconstruct state from this variant's cache file. `Ok(false)` is a
    /// clean miss; a file that parses but does not belong to this variant
    /// is fatal.
    fn load(&mut self, proc: &ProcScope<'_>) -> Result<bool>;

    /// Persist the cache file from current state.
    fn save(&self, proc: &ProcScope<'_>) -> Result<()>;

    /// Produce the calibration artifact. Only called once trained.
    fn calibration(&self, proc: &ProcScope<'_>) -> Result<Calibration>;

    /// Remove working files this variant created. Idempotent; safe to call
    /// when nothing was produced.
    fn cleanup(&mut self, proc: &ProcScope<'_>) -> Result<()> {
        let _ = proc;
        Ok(())
    }
}

/// Monitoring flavor of a processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorKind {
    /// A named processor monitoring its upstream inputs on their own
    /// terms: wide-open flow cutoffs, per-class axes.
    Input,
    /// The synthetic collector monitoring all processors' outputs:
    /// normalized range, shared axes, finer binning.
    Output,
}

/// One trainable unit: input binding, monitoring bin sets, and a boxed
/// variant, driven through the lifecycle contract by the orchestrator.
pub struct Processor {
    name: String,
    binding: VariableBinding,
    variant: Box<dyn Variant>,
    state: State,
    monitor_kind: MonitorKind,
    mon_sets: Vec<BinSet>,
    mon_module: Option<String>,
}

impl Processor {
    /// A named processor with input monitoring.
    pub fn new(name: impl Into<String>, variant: Box<dyn Variant>) -> Self {
        Self::with_monitor_kind(name, variant, MonitorKind::Input)
    }

    /// A processor with an explicit monitoring flavor.
    pub fn with_monitor_kind(
        name: impl Into<String>,
        variant: Box<dyn Variant>,
        monitor_kind: MonitorKind,
    ) -> Self {
        Self {
            name: name.into(),
            binding: VariableBinding::default(),
            variant,
            state: State::Unconfigured,
            monitor_kind,
            mon_sets: Vec::new(),
            mon_module: None,
        }
    }

    /// Processor name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The resolved input binding.
    pub fn binding(&self) -> &VariableBinding {
        &self.binding
    }

    /// True once training finished or a cache was loaded.
    pub fn is_finalized(&self) -> bool {
        self.state == State::Finalized
    }

    /// Bind inputs and hand the variant its configuration section.
    ///
    /// # Panics
    ///
    /// Panics when called more than once; that is a driver bug.
    pub fn configure(
        &mut self,
        inputs: Vec<SourceVariable>,
        config: Option<roxmltree::Node<'_, '_>>,
    ) -> Result<()> {
        assert_eq!(self.state, State::Unconfigured, "processor configured twice");
        self.binding = VariableBinding::new(inputs);
        self.variant.configure(&self.binding, config)?;
        self.state = State::Configured;
        Ok(())
    }

    /// Attempt to restore the calibration from a persisted cache file.
    ///
    /// On a hit the processor transitions directly to FINALIZED and
    /// training is skipped for this run. Validity is presence plus a
    /// structural parse, not a content check: a stale cache file that
    /// still parses is accepted as-is.
    pub fn try_load_cached(&mut self, ctx: &TrainerContext) -> Result<bool> {
        assert_eq!(self.state, State::Configured, "try_load_cached outside CONFIGURED");
        let scope = ProcScope { name: &self.name, ctx };
        if self.variant.load(&scope)? {
            self.state = State::Finalized;
            log::info!("processor '{}': calibration restored from cache, skipping training", self.name);
            return Ok(true);
        }
        Ok(false)
    }

    /// Start a training iteration: book monitoring on first entry and let
    /// the variant allocate scratch state. A no-op once finalized.
    pub fn begin_training(&mut self, ctx: &TrainerContext) -> Result<()> {
        assert!(self.state >= State::Configured, "begin_training before configure");
        if self.state == State::Finalized {
            return Ok(());
        }

        if ctx.monitoring() && self.mon_module.is_none() {
            let (module, bins) = match self.monitor_kind {
                MonitorKind::Input => (format!("input_{}", self.name), INPUT_BINS),
                MonitorKind::Output => ("output".to_string(), OUTPUT_BINS),
            };
            self.mon_sets = self
                .binding
                .monitor_keys()
                .iter()
                .map(|key| match self.monitor_kind {
                    MonitorKind::Input => BinSet::input(key, bins),
                    MonitorKind::Output => BinSet::output(key, bins),
                })
                .collect();
            self.mon_module = Some(module);
        }

        self.variant.train_begin(&ProcScope { name: &self.name, ctx })?;
        self.state = State::Training;
        Ok(())
    }

    /// Route one event through monitoring and, when train-flagged, into
    /// the variant. Ignored entirely once the processor is finalized, so a
    /// pipeline can send every event to every processor without per-event
    /// phase checks.
    pub fn observe(&mut self, event: &TrainingEvent<'_>) -> Result<()> {
        if self.state == State::Finalized {
            return Ok(());
        }
        assert_eq!(self.state, State::Training, "observe outside a training iteration");
        debug_assert_eq!(event.values.len(), self.binding.len());

        if event.test && self.mon_module.is_some() {
            for (set, group) in self.mon_sets.iter_mut().zip(event.values) {
                for &value in group {
                    set.fill(event.class, value, event.weight);
                }
            }
        }

        if event.train {
            self.variant.train_data(event.values, event.class, event.weight)?;
        }
        Ok(())
    }

    /// Finish the iteration: run the variant's finalize step, then fold
    /// and publish the monitoring histograms. A no-op once finalized.
    pub fn end_training(&mut self, ctx: &mut TrainerContext) -> Result<()> {
        if self.state == State::Finalized {
            return Ok(());
        }
        assert_eq!(self.state, State::Training, "end_training outside a training iteration");

        self.variant.train_end(&ProcScope { name: &self.name, ctx })?;
        self.state = if self.variant.is_trained() { State::Finalized } else { State::Configured };

        if let Some(module) = self.mon_module.take() {
            let monitors =
                self.mon_sets.drain(..).flat_map(BinSet::finalize).collect::<Vec<_>>();
            ctx.store_mut().publish(&module, monitors);
        }
        Ok(())
    }

    /// Produce the calibration artifact.
    ///
    /// # Panics
    ///
    /// Panics when the processor has not reached FINALIZED; exporting an
    /// untrained calibration is a driver bug, not a runtime condition.
    pub fn export_calibration(&self, ctx: &TrainerContext) -> Result<Calibration> {
        assert_eq!(self.state, State::Finalized, "export_calibration before FINALIZED");
        self.variant.calibration(&ProcScope { name: &self.name, ctx })
    }

    /// Write the cache file from current state.
    ///
    /// # Panics
    ///
    /// Panics when the processor has not reached FINALIZED.
    pub fn persist(&self, ctx: &TrainerContext) -> Result<()> {
        assert_eq!(self.state, State::Finalized, "persist before FINALIZED");
        self.variant.save(&ProcScope { name: &self.name, ctx })
    }

    /// Remove transient working files. Idempotent; never fails on absent
    /// targets.
    pub fn cleanup(&mut self, ctx: &TrainerContext) -> Result<()> {
        self.variant.cleanup(&ProcScope { name: &self.name, ctx })
    }
}

/// Factory map from variant registry names to constructors.
///
/// New variants register a closure; nothing here relies on reflection or
/// link-time magic.
#[derive(Default)]
pub struct Registry {
    factories: BTreeMap<String, Box<dyn Fn() -> Box<dyn Variant>>>,
}

impl Registry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in variants registered. The
    /// artifact-embedding variant captures the given toolkit.
    pub fn with_builtins(toolkit: Arc<dyn FitToolkit>) -> Self {
        let mut registry = Self::new();
        registry.register(crate::proc_linear::KIND, || {
            Box::new(crate::proc_linear::ProcLinear::new())
        });
        registry.register(crate::proc_external::KIND, move || {
            Box::new(crate::proc_external::ProcExternal::new(toolkit.clone()))
        });
        registry
    }

    /// Register a variant factory under `name`, replacing any previous
    /// registration.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        factory: impl Fn() -> Box<dyn Variant> + 'static,
    ) {
        self.factories.insert(name.into(), Box::new(factory));
    }

    /// Instantiate the variant registered under `name`.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] for an unknown variant name.
    pub fn create(&self, name: &str) -> Result<Box<dyn Variant>> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| Error::Config(format!("unknown processor variant '{name}'")))?;
        Ok(factory())
    }

    /// Registered variant names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }
}
