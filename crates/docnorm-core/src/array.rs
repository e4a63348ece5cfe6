//! Array storage decisions
//!
//! Each array value is routed to one of three storage strategies. The
//! decision is made from at most `element_sample_cap` leading elements and is
//! a pure function of the array contents, the field name and the config.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::config::{matches_keyword, ArrayConfig};
use crate::document::{Node, NodeKind};
use crate::types::{string_bucket, SqlType};

/// Where an array's contents end up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RecommendedStorage {
    /// Opaque JSON blob in one column
    Json,
    /// Values joined into one delimited string column
    DelimitedString,
    /// Normalized child table, one row per element
    RelationalTable,
}

/// Storage decision for one array value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArrayAnalysis {
    pub item_count: usize,
    pub should_create_table: bool,
    pub recommended_storage: RecommendedStorage,
    pub recommended_sql_type: SqlType,
    pub transformation_logic: String,
}

impl ArrayAnalysis {
    fn new(
        item_count: usize,
        storage: RecommendedStorage,
        sql_type: SqlType,
        logic: impl Into<String>,
    ) -> Self {
        Self {
            item_count,
            should_create_table: storage == RecommendedStorage::RelationalTable,
            recommended_storage: storage,
            recommended_sql_type: sql_type,
            transformation_logic: logic.into(),
        }
    }
}

/// Decide how to store one array.
pub fn analyze_array(
    items: &[Node],
    field_name: &str,
    config: &ArrayConfig,
    string_buckets: &[u32],
) -> ArrayAnalysis {
    let item_count = items.len();
    if item_count == 0 {
        return ArrayAnalysis::new(
            0,
            RecommendedStorage::Json,
            SqlType::NVarCharMax,
            "Empty array; store as JSON, no further action",
        );
    }

    let mut kinds = BTreeSet::new();
    let mut max_len = 0usize;
    let mut max_text_len = 0usize;
    let mut has_complex_structure = false;

    for item in items.iter().take(config.element_sample_cap) {
        match item {
            Node::Null => continue,
            Node::Object(_) | Node::Array(_) => has_complex_structure = true,
            Node::String(s) => max_len = max_len.max(s.chars().count()),
            Node::Number(_) | Node::Bool(_) => {}
        }
        if let Some(text) = item.value_text() {
            max_text_len = max_text_len.max(text.chars().count());
        }
        kinds.insert(item.kind());
    }

    if has_complex_structure {
        return ArrayAnalysis::new(
            item_count,
            RecommendedStorage::RelationalTable,
            SqlType::NVarCharMax,
            format!("Normalize '{field_name}' into a child table, one row per element"),
        );
    }

    let delimited_type = string_bucket(item_count * (max_text_len + 1), string_buckets);

    let mut kinds = kinds.into_iter();
    match (kinds.next(), kinds.next()) {
        (None, _) => ArrayAnalysis::new(
            item_count,
            RecommendedStorage::Json,
            SqlType::NVarCharMax,
            "No classifiable elements; store as JSON",
        ),
        (Some(NodeKind::String), None) => {
            if matches_keyword(field_name, &config.tag_keywords) && max_len <= config.tag_max_length {
                ArrayAnalysis::new(
                    item_count,
                    RecommendedStorage::DelimitedString,
                    delimited_type,
                    "Tag-like values; join with a delimiter",
                )
            } else if item_count > config.large_item_count || max_len > config.long_string_length {
                ArrayAnalysis::new(
                    item_count,
                    RecommendedStorage::RelationalTable,
                    SqlType::NVarCharMax,
                    format!(
                        "Large string array ({item_count} items, max length {max_len}); normalize into a child table"
                    ),
                )
            } else {
                ArrayAnalysis::new(
                    item_count,
                    RecommendedStorage::Json,
                    SqlType::NVarCharMax,
                    "Small string array; store as JSON",
                )
            }
        }
        (Some(kind), None) => {
            if item_count <= config.small_item_count {
                ArrayAnalysis::new(
                    item_count,
                    RecommendedStorage::DelimitedString,
                    delimited_type,
                    format!("Few {kind:?} values; join with a delimiter"),
                )
            } else {
                ArrayAnalysis::new(
                    item_count,
                    RecommendedStorage::RelationalTable,
                    SqlType::NVarCharMax,
                    format!("{item_count} {kind:?} values; normalize into a child table"),
                )
            }
        }
        (Some(_), Some(_)) => ArrayAnalysis::new(
            item_count,
            RecommendedStorage::Json,
            SqlType::NVarCharMax,
            "Mixed-type array; stored opaquely as JSON",
        ),
    }
}
