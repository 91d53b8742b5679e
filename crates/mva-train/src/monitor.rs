//! Per-variable monitoring histograms with explicit flow accounting.
//!
//! Every bound variable of a processor gets a signal/background histogram
//! pair that is filled from test-routed events while training runs. The
//! aggregation is purely additive bookkeeping: it has no error states and
//! must never alter training results.
//!
//! Histogram axes are deferred: fills inside the flow cutoffs are buffered
//! and uniform bin edges are resolved at finalize from the observed value
//! range, so monitors need no a-priori knowledge of a variable's scale.

use std::collections::BTreeMap;

use mva_core::Class;
use serde::{Deserialize, Serialize};

/// Bin count for per-processor input monitors.
pub const INPUT_BINS: usize = 50;
/// Bin count for the synthetic output-collector monitor.
pub const OUTPUT_BINS: usize = 400;
/// Flow cutoffs for normalized processor outputs.
pub const OUTPUT_RANGE: (f64, f64) = (-99999.0, 99999.0);

/// A single deferred-range histogram. Fills are buffered until
/// [`BinSet::finalize`] resolves the axis.
#[derive(Debug, Clone)]
struct MonitorHistogram {
    name: String,
    title: String,
    n_bins: usize,
    fills: Vec<(f64, f64)>,
}

impl MonitorHistogram {
    fn new(name: String, title: String, n_bins: usize) -> Self {
        Self { name, title, n_bins, fills: Vec::new() }
    }

    fn fill(&mut self, value: f64, weight: f64) {
        self.fills.push((value, weight));
    }

    /// Resolve uniform edges from the buffered value range and bin the
    /// fills. Zero-weight fills participate in range resolution, which is
    /// what lets a sibling histogram force shared edges.
    fn resolve(&self) -> (Vec<f64>, Vec<f64>) {
        let mut lo = f64::INFINITY;
        let mut hi = f64::NEG_INFINITY;
        for &(v, _) in &self.fills {
            lo = lo.min(v);
            hi = hi.max(v);
        }
        if self.fills.is_empty() {
            lo = 0.0;
            hi = 1.0;
        } else if lo == hi {
            lo -= 0.5;
            hi += 0.5;
        }

        let n = self.n_bins;
        let width = (hi - lo) / n as f64;
        let edges: Vec<f64> = (0..=n).map(|i| lo + width * i as f64).collect();

        let mut content = vec![0.0; n];
        for &(v, w) in &self.fills {
            let bin = (((v - lo) / width) as usize).min(n - 1);
            content[bin] += w;
        }
        (edges, content)
    }
}

/// Finalized monitoring histogram for one class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalizedMonitor {
    /// Histogram name (`<key>_sig` or `<key>_bkg`).
    pub name: String,
    /// Human-readable title.
    pub title: String,
    /// Uniform bin edges, `n_bins + 1` entries.
    pub bin_edges: Vec<f64>,
    /// Sum of weights per bin.
    pub bin_content: Vec<f64>,
    /// Accumulated weight at or below the flow cutoff minimum.
    pub underflow: f64,
    /// Accumulated weight at or above the flow cutoff maximum.
    pub overflow: f64,
    /// Total number of monitored values, flows included.
    pub entries: u64,
}

/// Signal/background histogram pair for one bound variable.
///
/// Values at or below the cutoff minimum are counted as underflow, at or
/// above the maximum as overflow, and are binned otherwise. With shared
/// binning enabled, every fill of one class contributes a zero-weight fill
/// to the sibling histogram so both resolve identical edges.
#[derive(Debug, Clone)]
pub struct BinSet {
    histos: [MonitorHistogram; 2],
    entries: [u64; 2],
    underflow: [f64; 2],
    overflow: [f64; 2],
    min: f64,
    max: f64,
    same_binning: bool,
}

impl BinSet {
    fn new(key: &str, n_bins: usize, min: f64, max: f64, same_binning: bool) -> Self {
        Self {
            histos: [
                MonitorHistogram::new(format!("{key}_bkg"), format!("{key} background"), n_bins),
                MonitorHistogram::new(format!("{key}_sig"), format!("{key} signal"), n_bins),
            ],
            entries: [0, 0],
            underflow: [0.0, 0.0],
            overflow: [0.0, 0.0],
            min,
            max,
            same_binning,
        }
    }

    /// Wide-open monitor for an upstream input variable observed on its
    /// own terms: the flow cutoffs are unbounded and each class resolves
    /// its own axis.
    pub fn input(key: &str, n_bins: usize) -> Self {
        Self::new(key, n_bins, f64::NEG_INFINITY, f64::INFINITY, false)
    }

    /// Fixed-cutoff monitor for a processor's own numeric output, assumed
    /// normalized; both classes share one axis.
    pub fn output(key: &str, n_bins: usize) -> Self {
        Self::new(key, n_bins, OUTPUT_RANGE.0, OUTPUT_RANGE.1, true)
    }

    /// Record one monitored value for `class`.
    ///
    /// The per-class entry counter advances for every value, flows
    /// included.
    pub fn fill(&mut self, class: Class, value: f64, weight: f64) {
        let i = class.idx();
        self.entries[i] += 1;

        if value <= self.min {
            self.underflow[i] += weight;
            return;
        }
        if value >= self.max {
            self.overflow[i] += weight;
            return;
        }

        self.histos[i].fill(value, weight);
        if self.same_binning {
            self.histos[class.other().idx()].fill(value, 0.0);
        }
    }

    /// Resolve both axes, fold the accumulated flow weights into the flow
    /// slots, and write back the entry counts.
    pub fn finalize(self) -> [FinalizedMonitor; 2] {
        let finalize_one = |i: usize| {
            let (bin_edges, bin_content) = self.histos[i].resolve();
            FinalizedMonitor {
                name: self.histos[i].name.clone(),
                title: self.histos[i].title.clone(),
                bin_edges,
                bin_content,
                underflow: self.underflow[i],
                overflow: self.overflow[i],
                entries: self.entries[i],
            }
        };
        [finalize_one(0), finalize_one(1)]
    }
}

/// Finalized monitors grouped by module name, serializable for whoever
/// renders or archives them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MonitorStore {
    modules: BTreeMap<String, Vec<FinalizedMonitor>>,
}

impl MonitorStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append finalized monitors under `module`.
    pub fn publish(&mut self, module: &str, monitors: Vec<FinalizedMonitor>) {
        self.modules.entry(module.to_string()).or_default().extend(monitors);
    }

    /// Monitors of one module, if booked.
    pub fn module(&self, name: &str) -> Option<&[FinalizedMonitor]> {
        self.modules.get(name).map(Vec::as_slice)
    }

    /// Iterate modules in name order.
    pub fn modules(&self) -> impl Iterator<Item = (&str, &[FinalizedMonitor])> {
        self.modules.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// True when nothing has been published.
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundary_values_count_as_flow() {
        let mut set = BinSet::output("proc_out", 10);
        set.fill(Class::Signal, OUTPUT_RANGE.0, 2.0);
        set.fill(Class::Signal, OUTPUT_RANGE.1, 3.0);
        set.fill(Class::Signal, 0.5, 1.0);

        let [_, sig] = set.finalize();
        assert_eq!(sig.underflow, 2.0);
        assert_eq!(sig.overflow, 3.0);
        assert_eq!(sig.entries, 3);
        assert_eq!(sig.bin_content.iter().sum::<f64>(), 1.0);
    }

    #[test]
    fn shared_binning_forces_identical_edges() {
        let mut set = BinSet::output("proc_out", 4);
        set.fill(Class::Signal, -2.0, 1.0);
        set.fill(Class::Signal, 2.0, 1.0);
        set.fill(Class::Background, 0.0, 5.0);

        let [bkg, sig] = set.finalize();
        assert_eq!(bkg.bin_edges, sig.bin_edges);
        // The zero-weight sibling fills widen the axis without moving content.
        assert_eq!(sig.bin_content.iter().sum::<f64>(), 2.0);
        assert_eq!(bkg.bin_content.iter().sum::<f64>(), 5.0);
    }

    #[test]
    fn independent_binning_resolves_per_class() {
        let mut set = BinSet::input("src_x", 10);
        set.fill(Class::Signal, 0.0, 1.0);
        set.fill(Class::Signal, 1.0, 1.0);
        set.fill(Class::Background, 100.0, 1.0);
        set.fill(Class::Background, 200.0, 1.0);

        let [bkg, sig] = set.finalize();
        assert_eq!(sig.bin_edges.first().copied(), Some(0.0));
        assert_eq!(sig.bin_edges.last().copied(), Some(1.0));
        assert_eq!(bkg.bin_edges.first().copied(), Some(100.0));
        assert_eq!(bkg.bin_edges.last().copied(), Some(200.0));
    }

    #[test]
    fn maximum_buffered_value_lands_in_last_bin() {
        let mut set = BinSet::input("src_x", 5);
        set.fill(Class::Signal, 0.0, 1.0);
        set.fill(Class::Signal, 10.0, 1.0);
        let [_, sig] = set.finalize();
        assert_eq!(sig.bin_content[4], 1.0);
        assert_eq!(sig.bin_content[0], 1.0);
    }

    #[test]
    fn empty_and_degenerate_axes() {
        let empty = BinSet::input("src_x", 4);
        let [bkg, _] = empty.finalize();
        assert_eq!(bkg.bin_edges.len(), 5);
        assert_eq!(bkg.entries, 0);

        let mut single = BinSet::input("src_y", 4);
        single.fill(Class::Signal, 3.0, 1.0);
        let [_, sig] = single.finalize();
        assert_eq!(sig.bin_edges.first().copied(), Some(2.5));
        assert_eq!(sig.bin_edges.last().copied(), Some(3.5));
        assert_eq!(sig.bin_content.iter().sum::<f64>(), 1.0);
    }

    #[test]
    fn store_groups_by_module() {
        let mut store = MonitorStore::new();
        let mut set = BinSet::input("src_x", 4);
        set.fill(Class::Signal, 1.0, 1.0);
        store.publish("input_proc", set.finalize().to_vec());

        assert_eq!(store.module("input_proc").map(<[FinalizedMonitor]>::len), Some(2));
        assert!(store.module("other").is_none());

        let text = serde_json::to_string(&store).unwrap();
        assert!(text.contains("src_x_sig"));
    }
}
