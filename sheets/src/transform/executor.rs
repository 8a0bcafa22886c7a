//! Transform engine.
//!
//! Applies every transform schema to every merged row (row-major, schema
//! order). Each inner transformation that passes its condition builds one
//! output record from its field rules.

use crate::error::TransformResult;
use crate::logs::log_info;
use crate::models::{Cell, Row};
use crate::schema::{FieldRule, TransformSchema, Transformation};

use super::post;

/// Result of executing the transform schemas
#[derive(Debug, Default)]
pub struct TransformOutcome {
    /// Transformed records, in production order
    pub records: Vec<Row>,
    /// (row, schema) pairs that produced nothing
    pub skipped: Vec<SkippedRow>,
}

/// A (row, schema) pair that produced no records
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedRow {
    pub row: usize,
    pub schema_index: usize,
    pub reason: String,
}

impl TransformOutcome {
    pub fn summary(&self) -> String {
        format!(
            "Transformed: {} records, {} skipped",
            self.records.len(),
            self.skipped.len()
        )
    }
}

/// Execute `schemas` over `rows`.
///
/// `max_records` bounds the output of spreading post-transformations.
pub fn execute(
    rows: &[Row],
    schemas: &[TransformSchema],
    max_records: usize,
) -> TransformResult<TransformOutcome> {
    // Resolve post steps once; unknown kinds drop out here.
    let mut post_steps = Vec::with_capacity(schemas.len());
    for schema in schemas {
        let mut steps = Vec::new();
        for rule in &schema.post_transformations {
            if let Some(step) = post::resolve(rule)? {
                steps.push(step);
            }
        }
        post_steps.push(steps);
    }

    let mut outcome = TransformOutcome::default();

    for (row_idx, row) in rows.iter().enumerate() {
        for (schema_idx, schema) in schemas.iter().enumerate() {
            if let Some(condition) = &schema.condition {
                if !condition.is_met(row) {
                    outcome.skipped.push(SkippedRow {
                        row: row_idx,
                        schema_index: schema_idx,
                        reason: "schema condition not met".into(),
                    });
                    continue;
                }
            }

            let mut records: Vec<Row> = schema
                .transformations
                .iter()
                .filter_map(|t| build_record(row, t, row_idx, schema_idx))
                .collect();

            for step in &post_steps[schema_idx] {
                records = step.apply(records, max_records)?;
            }

            if records.is_empty() {
                outcome.skipped.push(SkippedRow {
                    row: row_idx,
                    schema_index: schema_idx,
                    reason: "no fields produced".into(),
                });
            }
            outcome.records.extend(records);
        }
    }

    log_info(outcome.summary());
    Ok(outcome)
}

/// Build one record, or `None` when the condition fails or no field has a value.
pub fn build_record(
    row: &Row,
    transformation: &Transformation,
    row_idx: usize,
    schema_idx: usize,
) -> Option<Row> {
    if let Some(condition) = &transformation.condition {
        if !condition.is_met(row) {
            return None;
        }
    }

    let record: Row = transformation
        .fields
        .iter()
        .filter_map(|(target, rule)| {
            field_value(row, rule, row_idx, schema_idx).map(|value| (target.clone(), value))
        })
        .collect();

    (!record.is_empty()).then_some(record)
}

/// Evaluate a single field rule against a merged row. Blank results are `None`.
pub fn field_value(row: &Row, rule: &FieldRule, row_idx: usize, schema_idx: usize) -> Option<Cell> {
    if let Some(condition) = &rule.condition {
        if !condition.is_met(row) {
            return None;
        }
    }

    let base = match (&rule.value, &rule.columns) {
        (Some(value), _) => value.clone(),
        (None, Some(columns)) => join_columns(row, columns, rule.separator()),
        (None, None) => Cell::Empty,
    };
    if base.is_blank() {
        return None;
    }

    match &rule.unique {
        Some(tag) => Some(Cell::Text(format!(
            "{}:{}-{}-{}",
            base.as_text().unwrap_or_default(),
            tag,
            row_idx,
            schema_idx
        ))),
        None => Some(base),
    }
}

/// Join non-blank column values. A single present value keeps its type.
fn join_columns(row: &Row, columns: &[String], separator: &str) -> Cell {
    let present: Vec<&Cell> = columns
        .iter()
        .filter_map(|column| row.get(column))
        .filter(|cell| !cell.is_blank())
        .collect();

    match present.as_slice() {
        [] => Cell::Empty,
        [single] => (*single).clone(),
        many => Cell::text(
            many.iter()
                .filter_map(|cell| cell.as_text())
                .collect::<Vec<_>>()
                .join(separator),
        ),
    }
}
