//! # BioHub Sheets - Field-data spreadsheet validation and transformation
//!
//! Reads survey workbooks (CSV or XLSX), validates them against a
//! schema-driven rule set, and turns their parent/child worksheets into flat
//! Darwin Core style entity tables.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │  Workbook   │────▶│   Flatten   │────▶│  Transform  │────▶│  Partition  │
//! │ (CSV/XLSX)  │     │ (row groups)│     │ (field map) │     │ (entities)  │
//! └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘
//!        │
//!        └───────────▶ Validate (media → file → column → workbook rules)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use biohub_sheets::{transform, TransformOptions, TransformationSchemaParser, Workbook};
//!
//! let parser = TransformationSchemaParser::from_json_str(&schema_json)?;
//! let output = transform(&parser, &workbook, &TransformOptions::default())?;
//! for (entity, rows) in output.entities() {
//!     println!("{}: {} rows", entity, rows.len());
//! }
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`models`] - Cells, rows and uploaded media
//! - [`workbook`] - CSV/XLSX decoding into worksheets
//! - [`schema`] - Validation and transformation schema parsers
//! - [`transform`] - Flatten, transform and partition pipeline
//! - [`validation`] - Rule-based workbook validation
//! - [`cache`] - Template registry
//! - [`logs`] - Progress log broadcasting

// Core modules
pub mod error;
pub mod logs;
pub mod models;

// Input
pub mod workbook;

// Schemas
pub mod schema;

// Transformation
pub mod transform;

// Validation
pub mod validation;

// Templates
pub mod cache;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    OutputError,
    PipelineError,
    PipelineResult,
    RegistryError,
    SchemaError,
    TransformError,
    WorkbookError,
};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{Cell, MediaFile, Row};

pub use workbook::{Workbook, Worksheet};

// =============================================================================
// Re-exports - Schemas
// =============================================================================

pub use schema::{SchemaSource, TransformationSchemaParser, ValidationSchemaParser};

// =============================================================================
// Re-exports - Pipeline
// =============================================================================

pub use transform::{
    flatten,
    transform,
    transform_media,
    FlattenResult,
    Partitions,
    TransformOptions,
    TransformOutput,
    TransformStats,
};

// =============================================================================
// Re-exports - Validation
// =============================================================================

pub use validation::{validate, CsvState, ErrorCode, MediaState, ValidationReport};

// =============================================================================
// Re-exports - Registry (Cache)
// =============================================================================

pub use cache::{StoredTemplate, TemplateBundle, TemplateRegistry};
