//! Post-transformations.
//!
//! Applied to the records one transform schema produced for one merged row.
//! Kinds are resolved through a static table; unknown kinds are skipped so
//! older engines tolerate newer schemas.

use serde::Deserialize;
use serde_json::Value;

use crate::error::{SchemaError, SchemaResult, TransformError, TransformResult};
use crate::logs::log_warning_indent;
use crate::models::{Cell, Row};
use crate::schema::rule_kind;

/// Field receiving a record's own id after a spread.
pub const RESOURCE_ID: &str = "resourceID";
/// Field receiving the partner record's id after a spread.
pub const RELATED_RESOURCE_ID: &str = "relatedResourceID";

/// Spread one (parent, child) pair into N cross-referenced pairs.
///
/// N is read from `spread_column` of the first record.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationshipSpread {
    pub spread_column: String,
    pub unique_id_column: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PostTransformation {
    Relationship(RelationshipSpread),
}

type PostParser = fn(&Value) -> SchemaResult<PostTransformation>;

static POST_TRANSFORMATIONS: &[(&str, PostParser)] = &[("relationship", parse_relationship)];

fn parse_relationship(params: &Value) -> SchemaResult<PostTransformation> {
    serde_json::from_value(params.clone())
        .map(PostTransformation::Relationship)
        .map_err(|e| SchemaError::InvalidRule {
            rule: "relationship".into(),
            message: e.to_string(),
        })
}

/// Parser for a post-transformation kind; `None` when the kind is unknown.
pub fn lookup_post_transformation(kind: &str) -> Option<PostParser> {
    POST_TRANSFORMATIONS
        .iter()
        .find(|(name, _)| *name == kind)
        .map(|(_, parser)| *parser)
}

/// Resolve a `{ "<kind>": params }` object. Unknown kinds yield `Ok(None)`
/// and a warning; a known kind with bad parameters is an error.
pub fn resolve(rule: &Value) -> SchemaResult<Option<PostTransformation>> {
    let Some((kind, params)) = rule_kind(rule) else {
        log_warning_indent(format!("Unrecognized post-transformation {rule}, skipped"), 2);
        return Ok(None);
    };
    match lookup_post_transformation(kind) {
        Some(parse) => parse(params).map(Some),
        None => {
            log_warning_indent(format!("Unknown post-transformation '{kind}', skipped"), 2);
            Ok(None)
        }
    }
}

impl PostTransformation {
    /// Apply to `records`. `max_records` bounds the output size.
    pub fn apply(&self, records: Vec<Row>, max_records: usize) -> TransformResult<Vec<Row>> {
        match self {
            PostTransformation::Relationship(spread) => spread.apply(records, max_records),
        }
    }
}

impl RelationshipSpread {
    fn spread_count(&self, record: &Row) -> usize {
        let n = match record.get(&self.spread_column) {
            Some(Cell::Number(n)) => *n,
            Some(cell @ Cell::Text(_)) => match cell.as_f64() {
                Some(n) => n,
                None => return 0,
            },
            _ => return 0,
        };
        if n >= 1.0 {
            n.trunc() as usize
        } else {
            0
        }
    }

    fn apply(&self, records: Vec<Row>, max_records: usize) -> TransformResult<Vec<Row>> {
        if records.len() < 2 {
            return Ok(Vec::new());
        }
        let count = self.spread_count(&records[0]);
        if count.saturating_mul(2) > max_records {
            return Err(TransformError::FanOutLimitExceeded { limit: max_records });
        }

        let id_of = |record: &Row| {
            record
                .get(&self.unique_id_column)
                .and_then(Cell::as_text)
                .unwrap_or_default()
        };
        let parent_base = id_of(&records[0]);
        let child_base = id_of(&records[1]);

        let mut spread = Vec::with_capacity(count * 2);
        for i in 0..count {
            let parent_id = format!("{parent_base}:{i}");
            let child_id = format!("{child_base}:{i}");
            spread.push(self.stamp(&records[0], &parent_id, &child_id));
            spread.push(self.stamp(&records[1], &child_id, &parent_id));
        }
        Ok(spread)
    }

    fn stamp(&self, record: &Row, own_id: &str, related_id: &str) -> Row {
        let mut out = record.clone();
        out.insert(self.unique_id_column.clone(), Cell::text(own_id));
        out.insert(RESOURCE_ID.to_string(), Cell::text(own_id));
        out.insert(RELATED_RESOURCE_ID.to_string(), Cell::text(related_id));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(id: &str, count: Cell) -> Row {
        let mut row = Row::new();
        row.insert("occurrenceID".into(), Cell::text(id));
        row.insert("individualCount".into(), count);
        row
    }

    fn spread() -> PostTransformation {
        resolve(&json!({
            "relationship": { "spreadColumn": "individualCount", "uniqueIdColumn": "occurrenceID" }
        }))
        .unwrap()
        .unwrap()
    }

    #[test]
    fn test_spread_cross_wires_ids() {
        let records = vec![record("P", Cell::Number(3.0)), record("C", Cell::Empty)];
        let out = spread().apply(records, 1000).unwrap();

        assert_eq!(out.len(), 6);
        for i in 0..3 {
            let parent = &out[i * 2];
            let child = &out[i * 2 + 1];
            assert_eq!(parent["occurrenceID"], Cell::text(format!("P:{i}")));
            assert_eq!(child["occurrenceID"], Cell::text(format!("C:{i}")));
            assert_eq!(parent[RESOURCE_ID], parent["occurrenceID"]);
            assert_eq!(parent[RELATED_RESOURCE_ID], child[RESOURCE_ID]);
            assert_eq!(child[RELATED_RESOURCE_ID], parent[RESOURCE_ID]);
        }
    }

    #[test]
    fn test_spread_count_from_text() {
        let records = vec![record("P", Cell::text("2.9")), record("C", Cell::Empty)];
        assert_eq!(spread().apply(records, 1000).unwrap().len(), 4);
    }

    #[test]
    fn test_spread_without_count_is_empty() {
        for count in [Cell::Number(0.0), Cell::Number(-2.0), Cell::text("many"), Cell::Empty] {
            let records = vec![record("P", count), record("C", Cell::Empty)];
            assert!(spread().apply(records, 1000).unwrap().is_empty());
        }
    }

    #[test]
    fn test_spread_needs_a_pair() {
        let records = vec![record("P", Cell::Number(3.0))];
        assert!(spread().apply(records, 1000).unwrap().is_empty());
    }

    #[test]
    fn test_spread_bounded() {
        let records = vec![record("P", Cell::Number(1e9)), record("C", Cell::Empty)];
        assert!(matches!(
            spread().apply(records, 1000),
            Err(TransformError::FanOutLimitExceeded { limit: 1000 })
        ));
    }

    #[test]
    fn test_unknown_kind_is_skipped() {
        assert_eq!(resolve(&json!({ "explode": {} })).unwrap(), None);
        assert!(lookup_post_transformation("explode").is_none());
    }

    #[test]
    fn test_bad_params_are_an_error() {
        let err = resolve(&json!({ "relationship": { "spreadColumn": 3 } })).unwrap_err();
        assert!(matches!(err, SchemaError::InvalidRule { rule, .. } if rule == "relationship"));
    }
}
