//! Input-variable binding and display-name assignment.
//!
//! A processor references an ordered list of upstream-produced variables.
//! The binding resolves them to stable display names: the recorded variable
//! order of exported artifacts, the column names of dataset exports, and the
//! key space of the monitoring aggregator.

/// Reference to one scalar (or vector-valued) input produced upstream.
///
/// Owned by the orchestrator; processors only ever hold clones of the
/// reference, never the produced values themselves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceVariable {
    /// Name of the producing module.
    pub source: String,
    /// Variable name within the producer.
    pub name: String,
}

impl SourceVariable {
    /// Create a variable reference.
    pub fn new(source: impl Into<String>, name: impl Into<String>) -> Self {
        Self { source: source.into(), name: name.into() }
    }

    /// Key under which this variable's monitoring histograms are booked.
    pub fn monitor_key(&self) -> String {
        format!("{}_{}", self.source, self.name)
    }
}

/// Ordered display names for a processor's bound inputs.
///
/// A name already present in the list being built gets `_1`, `_2`, ...
/// appended until unique; the first free suffix wins and a freed suffix is
/// never reused.
#[derive(Debug, Clone, Default)]
pub struct VariableBinding {
    variables: Vec<SourceVariable>,
    names: Vec<String>,
}

impl VariableBinding {
    /// Bind an ordered list of upstream variables.
    pub fn new(variables: Vec<SourceVariable>) -> Self {
        let mut names: Vec<String> = Vec::with_capacity(variables.len());
        for var in &variables {
            let name = unique_name(&names, &var.name);
            names.push(name);
        }
        Self { variables, names }
    }

    /// Number of bound variables.
    pub fn len(&self) -> usize {
        self.variables.len()
    }

    /// True when no variables are bound.
    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    /// De-duplicated display names, in binding order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// The bound variable references, in binding order.
    pub fn variables(&self) -> &[SourceVariable] {
        &self.variables
    }

    /// Monitoring keys (`<source>_<name>`), in binding order.
    pub fn monitor_keys(&self) -> Vec<String> {
        self.variables.iter().map(SourceVariable::monitor_key).collect()
    }
}

fn unique_name(taken: &[String], name: &str) -> String {
    if !taken.iter().any(|n| n == name) {
        return name.to_string();
    }
    for i in 1u32.. {
        let candidate = format!("{name}_{i}");
        if !taken.iter().any(|n| n == &candidate) {
            return candidate;
        }
    }
    unreachable!("suffix space exhausted");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bind(names: &[&str]) -> Vec<String> {
        let vars = names.iter().map(|n| SourceVariable::new("src", *n)).collect();
        VariableBinding::new(vars).names().to_vec()
    }

    #[test]
    fn unique_names_pass_through() {
        assert_eq!(bind(&["x", "y", "z"]), vec!["x", "y", "z"]);
    }

    #[test]
    fn collisions_get_incrementing_suffixes() {
        assert_eq!(bind(&["x", "y", "x", "x"]), vec!["x", "y", "x_1", "x_2"]);
    }

    #[test]
    fn suffix_skips_taken_candidates() {
        // "x_1" is already bound as a real name, so the second "x" takes "_2".
        assert_eq!(bind(&["x", "x_1", "x"]), vec!["x", "x_1", "x_2"]);
    }

    #[test]
    fn monitor_keys_join_source_and_name() {
        let binding = VariableBinding::new(vec![
            SourceVariable::new("calc", "pt"),
            SourceVariable::new("calc", "eta"),
        ]);
        assert_eq!(binding.monitor_keys(), vec!["calc_pt", "calc_eta"]);
    }
}
