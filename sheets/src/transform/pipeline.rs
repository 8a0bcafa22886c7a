//! High-level transformation pipeline.
//!
//! Combines all steps for one workbook:
//! flatten → merge → transform → partition.
//!
//! # Example
//!
//! ```rust,ignore
//! use biohub_sheets::{transform, MediaFile, TransformOptions, TransformationSchemaParser, Workbook};
//!
//! let parser = TransformationSchemaParser::from_json_str(&schema_json)?;
//! let workbook = Workbook::from_media(&MediaFile::new("moose.xlsx", mime, bytes))?;
//! let output = transform(&parser, &workbook, &TransformOptions::default())?;
//!
//! for (entity, csv) in output.to_csv_buffers()? {
//!     std::fs::write(format!("{entity}.csv"), csv)?;
//! }
//! ```

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{OutputResult, PipelineResult};
use crate::logs::{log_info, log_success, log_warning};
use crate::models::{MediaFile, Row};
use crate::schema::TransformationSchemaParser;
use crate::workbook::Workbook;

use super::executor::{execute, SkippedRow};
use super::flatten::{flatten, FlattenOptions, UnmatchedRow, DEFAULT_MAX_ROW_GROUPS};
use super::partition::{partition, Partitions};

/// Options for the transformation pipeline
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformOptions {
    /// Upper bound on row groups produced by flattening, and on records
    /// produced by a single spread. Defaults to 500 000.
    pub max_row_groups: Option<usize>,
}

impl TransformOptions {
    pub fn with_max_row_groups(mut self, max: usize) -> Self {
        self.max_row_groups = Some(max);
        self
    }

    fn limit(&self) -> usize {
        self.max_row_groups.unwrap_or(DEFAULT_MAX_ROW_GROUPS)
    }
}

/// Counts collected along the pipeline
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformStats {
    pub row_groups: usize,
    pub unmatched_rows: usize,
    pub transformed_records: usize,
    pub skipped: usize,
    pub output_records: usize,
}

/// Result of a complete transformation
#[derive(Debug, Clone)]
pub struct TransformOutput {
    pub partitions: Partitions,
    pub stats: TransformStats,
    /// Child rows dropped because no parent matched
    pub unmatched: Vec<UnmatchedRow>,
    /// (row, schema) pairs that produced no records
    pub skipped: Vec<SkippedRow>,
    /// Columns the schema references that no worksheet has
    pub missing_columns: Vec<String>,
}

impl TransformOutput {
    /// Output rows per entity, in `parse` declaration order.
    pub fn entities(&self) -> &IndexMap<String, Vec<Row>> {
        &self.partitions.entities
    }

    pub fn to_csv_buffers(&self) -> OutputResult<IndexMap<String, Vec<u8>>> {
        self.partitions.to_csv_buffers()
    }

    pub fn to_xlsx_buffer(&self) -> OutputResult<Vec<u8>> {
        self.partitions.to_xlsx_buffer()
    }

    pub fn to_json(&self) -> serde_json::Value {
        self.partitions.to_json()
    }
}

/// Transform a parsed workbook.
///
/// Fails on malformed schemas and on exceeding the fan-out bound. Rows that
/// cannot be placed are reported in the output, not as errors.
pub fn transform(
    parser: &TransformationSchemaParser,
    workbook: &Workbook,
    options: &TransformOptions,
) -> PipelineResult<TransformOutput> {
    // Fail fast on missing sections before touching the data
    let transform_schemas = parser.get_transform_schemas()?;
    let parse_schemas = parser.get_parse_schemas()?;

    log_info(format!(
        "📖 Workbook '{}': {} worksheet(s)",
        workbook.file_name(),
        workbook.worksheet_names().len()
    ));

    let missing_columns = missing_source_columns(parser, workbook);
    if !missing_columns.is_empty() {
        log_warning(format!(
            "Referenced column(s) not found in any worksheet: {}",
            missing_columns.join(", ")
        ));
    }

    log_info("🔗 Flattening worksheets...");
    let flattened = flatten(
        parser,
        workbook,
        &FlattenOptions {
            max_row_groups: options.limit(),
        },
    )?;
    let merged = flattened.merged_rows();

    log_info("⚙️  Executing transformations...");
    let outcome = execute(&merged, transform_schemas, options.limit())?;

    log_info("📦 Partitioning output...");
    let partitions = partition(&outcome.records, parse_schemas);

    let stats = TransformStats {
        row_groups: flattened.len(),
        unmatched_rows: flattened.unmatched.len(),
        transformed_records: outcome.records.len(),
        skipped: outcome.skipped.len(),
        output_records: partitions.total_records(),
    };

    if stats.unmatched_rows > 0 {
        log_warning(format!(
            "{} child row(s) had no parent and were left out",
            stats.unmatched_rows
        ));
    }
    log_success(format!(
        "{} record(s) across {} entit(ies)",
        stats.output_records,
        partitions.entities.len()
    ));

    Ok(TransformOutput {
        partitions,
        stats,
        unmatched: flattened.unmatched,
        skipped: outcome.skipped,
        missing_columns,
    })
}

/// Source columns referenced by `parser` that appear in no worksheet header.
pub fn missing_source_columns(parser: &TransformationSchemaParser, workbook: &Workbook) -> Vec<String> {
    parser
        .source_columns()
        .into_iter()
        .filter(|column| !workbook.worksheets().any(|ws| ws.headers().contains(column)))
        .collect()
}

/// Parse raw media bytes, then [`transform`] them.
pub fn transform_media(
    parser: &TransformationSchemaParser,
    media: &MediaFile,
    options: &TransformOptions,
) -> PipelineResult<TransformOutput> {
    let workbook = Workbook::from_media(media)?;
    transform(parser, &workbook, options)
}
