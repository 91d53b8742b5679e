//! Columnar training-dataset export for external fitting toolkits.
//!
//! One row per training event: a boolean class-label column, a float weight
//! column, and one float column per bound variable. Rows are appended
//! through typed builders during the fill phase and written as a single
//! Arrow IPC batch at training end.

use std::collections::HashMap;
use std::fs::File;
use std::io;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{ArrayRef, BooleanBuilder, Float64Builder};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::ipc::writer::FileWriter;
use arrow::record_batch::RecordBatch;
use mva_core::{Class, Error, Result};

/// Class-label column name (the discriminant).
pub const TARGET_COLUMN: &str = "__TARGET__";
/// Event-weight column name.
pub const WEIGHT_COLUMN: &str = "__WEIGHT__";

/// Row-wise builder for one processor's exported dataset.
#[derive(Debug)]
pub struct DatasetBuilder {
    name: String,
    columns: Vec<String>,
    target: BooleanBuilder,
    weight: Float64Builder,
    values: Vec<Float64Builder>,
    rows: usize,
}

impl DatasetBuilder {
    /// Builder for a dataset named `name` with one value column per entry
    /// of `columns`.
    pub fn new(name: impl Into<String>, columns: &[String]) -> Self {
        Self {
            name: name.into(),
            columns: columns.to_vec(),
            target: BooleanBuilder::new(),
            weight: Float64Builder::new(),
            values: columns.iter().map(|_| Float64Builder::new()).collect(),
            rows: 0,
        }
    }

    /// Number of rows appended so far.
    pub fn len(&self) -> usize {
        self.rows
    }

    /// True before the first row.
    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    /// Append one event row; `values` holds the per-variable scalars in
    /// column order.
    pub fn push(&mut self, class: Class, weight: f64, values: &[f64]) {
        debug_assert_eq!(values.len(), self.values.len());
        self.target.append_value(class.is_signal());
        self.weight.append_value(weight);
        for (builder, &v) in self.values.iter_mut().zip(values) {
            builder.append_value(v);
        }
        self.rows += 1;
    }

    /// Finish the builders and write a single-batch Arrow IPC file.
    ///
    /// # Errors
    ///
    /// [`Error::Io`] when the file cannot be created, [`Error::Export`] for
    /// Arrow-level failures.
    pub fn write(mut self, path: &Path) -> Result<()> {
        let mut fields = vec![
            Field::new(TARGET_COLUMN, DataType::Boolean, false),
            Field::new(WEIGHT_COLUMN, DataType::Float64, false),
        ];
        fields.extend(self.columns.iter().map(|c| Field::new(c.as_str(), DataType::Float64, false)));

        let metadata = HashMap::from([("name".to_string(), self.name.clone())]);
        let schema = Arc::new(Schema::new_with_metadata(fields, metadata));

        let mut arrays: Vec<ArrayRef> =
            vec![Arc::new(self.target.finish()), Arc::new(self.weight.finish())];
        arrays.extend(self.values.iter_mut().map(|b| Arc::new(b.finish()) as ArrayRef));

        let batch = RecordBatch::try_new(schema.clone(), arrays).map_err(arrow_err)?;

        let file = File::create(path)
            .map_err(|e| io::Error::new(e.kind(), format!("creating {}: {e}", path.display())))?;
        let mut writer = FileWriter::try_new(file, schema.as_ref()).map_err(arrow_err)?;
        writer.write(&batch).map_err(arrow_err)?;
        writer.finish().map_err(arrow_err)?;
        Ok(())
    }
}

fn arrow_err(e: arrow::error::ArrowError) -> Error {
    Error::Export(e.to_string())
}
