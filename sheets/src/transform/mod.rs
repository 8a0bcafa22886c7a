//! Transformation module.
//!
//! Turns a multi-sheet workbook into normalized entity tables:
//! - Flatten: parent-child worksheets into row groups
//! - Executor: field rules over merged rows
//! - Post: post-transformation registry (relationship spread)
//! - Partition: projection onto output entities and deduplication
//! - Pipeline: the steps above, end to end

pub mod executor;
pub mod flatten;
pub mod partition;
pub mod pipeline;
pub mod post;

pub use executor::{execute, SkippedRow, TransformOutcome};
pub use flatten::{flatten, FlattenOptions, FlattenResult, FlattenedRecord, RowGroup, UnmatchedRow};
pub use partition::{partition, Partitions};
pub use pipeline::*;
pub use post::{lookup_post_transformation, PostTransformation, RelationshipSpread};
