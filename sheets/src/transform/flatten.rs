//! Flatten related worksheets into row groups.
//!
//! Each group holds one record per worksheet along a parent-child chain.
//! Worksheets are visited in `flatten` schema order, so parents must be
//! declared before their children.
//!
//! ```text
//! Effort      [A:1:X]                 group 0: [Effort A:1:X, Observations W1]
//! Observations  W1 -> A:1:X    ──▶    group 1: [Effort A:1:X, Observations W2]
//!               W2 -> A:1:X
//! ```
//!
//! A child attaches to the first group (in creation order) holding its parent.
//! When that group already holds a record from the child's worksheet, the
//! group is copied with that member replaced and the copy is appended.
//! Records are shared between copies through `Arc`.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{TransformError, TransformResult};
use crate::logs::{log_info, log_info_indent, log_warning_indent};
use crate::models::{composite_key, Row};
use crate::schema::TransformationSchemaParser;
use crate::workbook::Workbook;

/// Default upper bound on the number of row groups.
pub const DEFAULT_MAX_ROW_GROUPS: usize = 500_000;

/// One worksheet row tagged with its origin and composite key.
#[derive(Debug, Clone, PartialEq)]
pub struct FlattenedRecord {
    pub source_file: String,
    pub unique_id: String,
    pub row: Row,
}

/// Records along one parent-child chain, in attachment order.
pub type RowGroup = Vec<Arc<FlattenedRecord>>;

#[derive(Debug, Clone)]
pub struct FlattenOptions {
    /// Fail once more than this many groups exist.
    pub max_row_groups: usize,
}

impl Default for FlattenOptions {
    fn default() -> Self {
        Self {
            max_row_groups: DEFAULT_MAX_ROW_GROUPS,
        }
    }
}

/// A child row whose parent key matched no group.
#[derive(Debug, Clone, PartialEq)]
pub struct UnmatchedRow {
    pub source_file: String,
    /// Zero-based data row index in its worksheet.
    pub row_index: usize,
    pub unique_id: String,
    pub parent_unique_id: String,
}

#[derive(Debug, Clone, Default)]
pub struct FlattenResult {
    pub groups: Vec<RowGroup>,
    pub unmatched: Vec<UnmatchedRow>,
}

impl FlattenResult {
    /// Fold every group into a single row. Members are merged in order, so a
    /// column present in several members takes the last member's value.
    pub fn merged_rows(&self) -> Vec<Row> {
        self.groups.iter().map(|group| merge_group(group)).collect()
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

pub fn merge_group(group: &[Arc<FlattenedRecord>]) -> Row {
    let mut merged = Row::new();
    for record in group {
        for (column, cell) in &record.row {
            merged.insert(column.clone(), cell.clone());
        }
    }
    merged
}

/// Append-only group arena with a first-occurrence index over
/// `(source_file, unique_id)`.
struct GroupArena {
    groups: Vec<RowGroup>,
    first_group: HashMap<(String, String), usize>,
    limit: usize,
}

impl GroupArena {
    fn new(limit: usize) -> Self {
        Self {
            groups: Vec::new(),
            first_group: HashMap::new(),
            limit,
        }
    }

    fn index(&mut self, record: &FlattenedRecord, group_idx: usize) {
        self.first_group
            .entry((record.source_file.clone(), record.unique_id.clone()))
            .and_modify(|idx| *idx = (*idx).min(group_idx))
            .or_insert(group_idx);
    }

    fn push_group(&mut self, group: RowGroup) -> TransformResult<()> {
        if self.groups.len() >= self.limit {
            return Err(TransformError::FanOutLimitExceeded { limit: self.limit });
        }
        let idx = self.groups.len();
        for record in &group {
            self.index(record, idx);
        }
        self.groups.push(group);
        Ok(())
    }

    fn find(&self, source_file: &str, unique_id: &str) -> Option<usize> {
        self.first_group
            .get(&(source_file.to_string(), unique_id.to_string()))
            .copied()
    }

    /// Attach `record` to group `idx`, forking when the group already holds
    /// a record from the same worksheet.
    fn attach(&mut self, idx: usize, record: Arc<FlattenedRecord>) -> TransformResult<()> {
        let existing = self.groups[idx]
            .iter()
            .position(|member| member.source_file == record.source_file);

        match existing {
            Some(pos) => {
                let mut fork = self.groups[idx].clone();
                fork[pos] = record;
                self.push_group(fork)
            }
            None => {
                self.index(&record, idx);
                self.groups[idx].push(record);
                Ok(())
            }
        }
    }
}

/// Flatten every worksheet named in the `flatten` section.
///
/// Worksheets missing from the workbook are skipped. Child rows without a
/// matching parent are dropped and reported in [`FlattenResult::unmatched`].
pub fn flatten(
    parser: &TransformationSchemaParser,
    workbook: &Workbook,
    options: &FlattenOptions,
) -> TransformResult<FlattenResult> {
    let schemas = parser.get_flatten_schemas()?;
    let mut arena = GroupArena::new(options.max_row_groups);
    let mut unmatched = Vec::new();

    for schema in schemas {
        let Some(worksheet) = workbook.get_worksheet(&schema.file_name) else {
            log_info_indent(format!("{}: not in workbook, skipped", schema.file_name), 1);
            continue;
        };

        let rows = worksheet.get_row_objects();
        let skipped_before = unmatched.len();

        for (row_index, row) in rows.into_iter().enumerate() {
            let record = FlattenedRecord {
                source_file: schema.file_name.clone(),
                unique_id: composite_key(&row, &schema.unique_id),
                row,
            };

            let Some(parent) = &schema.parent else {
                arena.push_group(vec![Arc::new(record)])?;
                continue;
            };

            let parent_unique_id = composite_key(&record.row, &parent.unique_id);
            match arena.find(&parent.file_name, &parent_unique_id) {
                Some(idx) => arena.attach(idx, Arc::new(record))?,
                None => unmatched.push(UnmatchedRow {
                    source_file: record.source_file,
                    row_index,
                    unique_id: record.unique_id,
                    parent_unique_id,
                }),
            }
        }

        let orphans = unmatched.len() - skipped_before;
        if orphans > 0 {
            log_warning_indent(
                format!(
                    "{}: {} row(s) have no matching {} parent, skipped",
                    schema.file_name,
                    orphans,
                    schema.parent.as_ref().map(|p| p.file_name.as_str()).unwrap_or_default()
                ),
                1,
            );
        }
    }

    log_info(format!("Flattened into {} row group(s)", arena.groups.len()));

    Ok(FlattenResult {
        groups: arena.groups,
        unmatched,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Cell;
    use crate::workbook::Worksheet;
    use serde_json::json;

    fn sheet(name: &str, headers: &[&str], rows: &[&[&str]]) -> Worksheet {
        Worksheet::new(
            name,
            headers.iter().map(|h| h.to_string()).collect(),
            rows.iter()
                .map(|r| r.iter().map(|v| Cell::text(*v)).collect())
                .collect(),
        )
    }

    fn parser() -> TransformationSchemaParser {
        TransformationSchemaParser::from_value(json!({
            "flatten": [
                { "fileName": "Effort", "uniqueId": ["Survey Area", "Sampling Unit ID", "Stratum"] },
                {
                    "fileName": "Observations",
                    "uniqueId": ["Waypoint"],
                    "parent": { "fileName": "Effort", "uniqueId": ["Survey Area", "Sampling Unit ID", "Stratum"] }
                },
                {
                    "fileName": "Marked Animals",
                    "uniqueId": ["Collar ID"],
                    "parent": { "fileName": "Observations", "uniqueId": ["Waypoint"] }
                }
            ]
        }))
        .unwrap()
    }

    fn effort() -> Worksheet {
        sheet(
            "Effort",
            &["Survey Area", "Sampling Unit ID", "Stratum", "Comment"],
            &[&["A", "1", "X", "effort"]],
        )
    }

    fn observations(waypoints: &[&str]) -> Worksheet {
        let rows: Vec<Vec<&str>> = waypoints.iter().map(|w| vec!["A", "1", "X", *w]).collect();
        let rows: Vec<&[&str]> = rows.iter().map(Vec::as_slice).collect();
        sheet("Observations", &["Survey Area", "Sampling Unit ID", "Stratum", "Waypoint"], &rows)
    }

    #[test]
    fn test_two_children_fork_one_parent() {
        let wb = Workbook::from_worksheets("survey.xlsx", vec![effort(), observations(&["W1", "W2"])]);
        let result = flatten(&parser(), &wb, &FlattenOptions::default()).unwrap();

        assert_eq!(result.len(), 2);
        for group in &result.groups {
            assert_eq!(group.len(), 2);
            assert_eq!(group[0].source_file, "Effort");
            assert_eq!(group[0].unique_id, "A:1:X");
            assert_eq!(group[1].source_file, "Observations");
        }
        assert_eq!(result.groups[0][1].unique_id, "W1");
        assert_eq!(result.groups[1][1].unique_id, "W2");
        // the parent record is shared, not copied
        assert!(Arc::ptr_eq(&result.groups[0][0], &result.groups[1][0]));
    }

    #[test]
    fn test_fan_out_cardinality() {
        let waypoints: Vec<String> = (0..7).map(|i| format!("W{i}")).collect();
        let refs: Vec<&str> = waypoints.iter().map(String::as_str).collect();
        let wb = Workbook::from_worksheets("survey.xlsx", vec![effort(), observations(&refs)]);

        let result = flatten(&parser(), &wb, &FlattenOptions::default()).unwrap();
        assert_eq!(result.len(), 7);
    }

    #[test]
    fn test_duplicate_parent_key_first_group_wins() {
        let effort = sheet(
            "Effort",
            &["Survey Area", "Sampling Unit ID", "Stratum", "Comment"],
            &[&["A", "1", "X", "first"], &["A", "1", "X", "second"]],
        );
        let wb = Workbook::from_worksheets("survey.xlsx", vec![effort, observations(&["W1", "W2"])]);

        let result = flatten(&parser(), &wb, &FlattenOptions::default()).unwrap();
        let shape: Vec<Vec<(&str, String)>> = result
            .groups
            .iter()
            .map(|group| {
                group
                    .iter()
                    .map(|r| {
                        let tag = match r.source_file.as_str() {
                            "Effort" => r.row["Comment"].as_text().unwrap_or_default(),
                            _ => r.unique_id.clone(),
                        };
                        (r.source_file.as_str(), tag)
                    })
                    .collect()
            })
            .collect();

        assert_eq!(
            shape,
            vec![
                vec![("Effort", "first".to_string()), ("Observations", "W1".to_string())],
                vec![("Effort", "second".to_string())],
                vec![("Effort", "first".to_string()), ("Observations", "W2".to_string())],
            ]
        );
        assert!(result.unmatched.is_empty());
    }

    #[test]
    fn test_grandchild_attaches_to_forked_group() {
        let marked = sheet("Marked Animals", &["Waypoint", "Collar ID"], &[&["W2", "C9"]]);
        let wb = Workbook::from_worksheets(
            "survey.xlsx",
            vec![effort(), observations(&["W1", "W2"]), marked],
        );

        let result = flatten(&parser(), &wb, &FlattenOptions::default()).unwrap();
        assert_eq!(result.len(), 2);
        assert_eq!(result.groups[0].len(), 2);
        let ids: Vec<&str> = result.groups[1].iter().map(|r| r.unique_id.as_str()).collect();
        assert_eq!(ids, vec!["A:1:X", "W2", "C9"]);
    }

    #[test]
    fn test_orphan_child_is_skipped() {
        let obs = sheet(
            "Observations",
            &["Survey Area", "Sampling Unit ID", "Stratum", "Waypoint"],
            &[&["A", "1", "X", "W1"], &["B", "2", "Y", "W9"]],
        );
        let wb = Workbook::from_worksheets("survey.xlsx", vec![effort(), obs]);

        let result = flatten(&parser(), &wb, &FlattenOptions::default()).unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(
            result.unmatched,
            vec![UnmatchedRow {
                source_file: "Observations".into(),
                row_index: 1,
                unique_id: "W9".into(),
                parent_unique_id: "B:2:Y".into(),
            }]
        );
    }

    #[test]
    fn test_missing_worksheets_are_skipped() {
        let wb = Workbook::from_worksheets("survey.xlsx", vec![effort()]);
        let result = flatten(&parser(), &wb, &FlattenOptions::default()).unwrap();
        assert_eq!(result.len(), 1);
        assert!(result.unmatched.is_empty());
    }

    #[test]
    fn test_merged_rows_later_member_wins() {
        let obs = sheet("Observations", &["Survey Area", "Sampling Unit ID", "Stratum", "Waypoint", "Comment"], &[
            &["A", "1", "X", "W1", "observation"],
        ]);
        let wb = Workbook::from_worksheets("survey.xlsx", vec![effort(), obs]);

        let merged = flatten(&parser(), &wb, &FlattenOptions::default())
            .unwrap()
            .merged_rows();
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0]["Comment"], Cell::text("observation"));
        assert_eq!(merged[0]["Waypoint"], Cell::text("W1"));
    }

    #[test]
    fn test_fan_out_limit() {
        let wb = Workbook::from_worksheets(
            "survey.xlsx",
            vec![effort(), observations(&["W1", "W2", "W3"])],
        );
        let err = flatten(&parser(), &wb, &FlattenOptions { max_row_groups: 2 }).unwrap_err();
        assert!(matches!(err, TransformError::FanOutLimitExceeded { limit: 2 }));
    }

    #[test]
    fn test_missing_flatten_section() {
        let parser = TransformationSchemaParser::from_value(json!({ "parse": [] })).unwrap();
        let wb = Workbook::from_worksheets("survey.xlsx", vec![effort()]);
        assert!(matches!(
            flatten(&parser, &wb, &FlattenOptions::default()),
            Err(TransformError::Schema(_))
        ));
    }
}
