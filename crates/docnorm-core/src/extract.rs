//! Field extraction
//!
//! Walks one document and splits it into main-table columns and raw row
//! samples for child tables. Only objects directly under the root become
//! child tables; deeper objects are flattened with `_`-joined names, and
//! arrays inside child-table rows are kept as opaque text.

use std::collections::BTreeMap;

use tracing::trace;

use crate::array::{analyze_array, RecommendedStorage};
use crate::config::{InferenceConfig, NestedObjectStrategy};
use crate::document::Node;
use crate::relationship::ValueFrequencyTable;
use crate::schema::{FieldInfo, FieldMap, TableType, VALUE_FIELD};
use crate::types::{classify, SqlType};

/// Raw rows destined for one child table
#[derive(Debug, Clone, PartialEq)]
pub struct ChildSamples {
    pub table_type: TableType,
    /// Routing note for the table's transformation notes
    pub note: String,
    pub rows: Vec<FieldMap>,
}

/// Everything one document contributes
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extraction {
    pub main_fields: FieldMap,
    /// Keyed by source field path
    pub child_samples: BTreeMap<String, ChildSamples>,
}

/// Splits documents into main-table fields and child-table samples
pub struct FieldExtractor<'a> {
    config: &'a InferenceConfig,
}

impl<'a> FieldExtractor<'a> {
    pub fn new(config: &'a InferenceConfig) -> Self {
        Self { config }
    }

    /// Extract one document's fields.
    ///
    /// Array element values are counted into `frequencies` as they are met.
    pub fn extract(&self, document: &[(String, Node)], frequencies: &mut ValueFrequencyTable) -> Extraction {
        let mut out = Extraction::default();
        self.walk_object(document, "", &mut out, frequencies);
        out
    }

    fn walk_object(
        &self,
        props: &[(String, Node)],
        prefix: &str,
        out: &mut Extraction,
        frequencies: &mut ValueFrequencyTable,
    ) {
        let nested = !prefix.is_empty();

        for (key, value) in props {
            let name = join(prefix, key);
            match value {
                Node::Object(inner)
                    if !nested && self.config.nested_objects == NestedObjectStrategy::ChildTable =>
                {
                    let mut row = FieldMap::new();
                    self.flatten_into(&mut row, inner, "", &name, frequencies);
                    out.child_samples
                        .entry(name)
                        .or_insert_with_key(|path| ChildSamples {
                            table_type: TableType::NestedObject,
                            note: format!("Nested object '{path}' normalized into a child table"),
                            rows: Vec::new(),
                        })
                        .rows
                        .push(row);
                }
                Node::Object(inner) => self.walk_object(inner, &name, out, frequencies),
                Node::Array(items) => self.walk_array(items, name, nested, out, frequencies),
                scalar => record_scalar(&mut out.main_fields, &name, scalar, nested, &self.config.string_buckets),
            }
        }
    }

    fn walk_array(
        &self,
        items: &[Node],
        name: String,
        nested: bool,
        out: &mut Extraction,
        frequencies: &mut ValueFrequencyTable,
    ) {
        frequencies.observe_all(&name, items);

        let analysis = analyze_array(items, &name, &self.config.arrays, &self.config.string_buckets);
        trace!(
            field = %name,
            items = analysis.item_count,
            storage = ?analysis.recommended_storage,
            "array storage decision"
        );

        if analysis.recommended_storage == RecommendedStorage::RelationalTable {
            let rows: Vec<FieldMap> = items
                .iter()
                .take(self.config.arrays.element_sample_cap)
                .map(|item| self.element_row(item, &name, frequencies))
                .collect();
            out.child_samples
                .entry(name)
                .or_insert_with(|| ChildSamples {
                    table_type: TableType::Array,
                    note: analysis.transformation_logic.clone(),
                    rows: Vec::new(),
                })
                .rows
                .extend(rows);
            return;
        }

        let stored_len = match analysis.recommended_storage {
            RecommendedStorage::DelimitedString => items
                .iter()
                .filter_map(Node::value_text)
                .map(|t| t.chars().count() + 1)
                .sum::<usize>()
                .saturating_sub(1),
            _ => Node::Array(items.to_vec()).to_json().to_string().chars().count(),
        };

        let field = out
            .main_fields
            .entry(name.clone())
            .or_insert_with(|| FieldInfo::new(name, nested));
        field.observe(analysis.recommended_sql_type);
        field.observe_length(stored_len);
    }

    /// One child-table row for an array element
    fn element_row(&self, item: &Node, table: &str, frequencies: &mut ValueFrequencyTable) -> FieldMap {
        let mut row = FieldMap::new();
        match item {
            Node::Object(props) => self.flatten_into(&mut row, props, "", table, frequencies),
            Node::Array(_) => record_opaque(&mut row, VALUE_FIELD, item, false),
            scalar => record_scalar(&mut row, VALUE_FIELD, scalar, false, &self.config.string_buckets),
        }
        row
    }

    /// Flatten an object into `row` without spawning further tables.
    ///
    /// Arrays stay opaque in the row but their values are still counted,
    /// under `<table>_<column>`.
    fn flatten_into(
        &self,
        row: &mut FieldMap,
        props: &[(String, Node)],
        prefix: &str,
        table: &str,
        frequencies: &mut ValueFrequencyTable,
    ) {
        let nested = !prefix.is_empty();
        for (key, value) in props {
            let name = join(prefix, key);
            match value {
                Node::Object(inner) => self.flatten_into(row, inner, &name, table, frequencies),
                Node::Array(items) => {
                    frequencies.observe_all(&join(table, &name), items);
                    record_opaque(row, &name, value, nested);
                }
                scalar => record_scalar(row, &name, scalar, nested, &self.config.string_buckets),
            }
        }
    }
}

fn join(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}_{key}")
    }
}

fn field_entry<'m>(fields: &'m mut FieldMap, name: &str, nested: bool) -> &'m mut FieldInfo {
    fields
        .entry(name.to_string())
        .or_insert_with(|| FieldInfo::new(name, nested))
}

fn record_scalar(fields: &mut FieldMap, name: &str, value: &Node, nested: bool, string_buckets: &[u32]) {
    let field = field_entry(fields, name, nested);
    field.observe(classify(value, string_buckets));
    if let Node::String(s) = value {
        field.observe_length(s.chars().count());
    }
}

/// Store a container value as serialized text
fn record_opaque(fields: &mut FieldMap, name: &str, value: &Node, nested: bool) {
    let field = field_entry(fields, name, nested);
    field.observe(SqlType::NVarCharMax);
    if let Some(text) = value.value_text() {
        field.observe_length(text.chars().count());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn props(v: serde_json::Value) -> Vec<(String, Node)> {
        match Node::from_json(&v) {
            Node::Object(props) => props,
            _ => panic!("Expected Object"),
        }
    }

    fn extract_with(config: &InferenceConfig, v: serde_json::Value) -> (Extraction, ValueFrequencyTable) {
        let mut frequencies = ValueFrequencyTable::new();
        let out = FieldExtractor::new(config).extract(&props(v), &mut frequencies);
        (out, frequencies)
    }

    fn extract(v: serde_json::Value) -> Extraction {
        extract_with(&InferenceConfig::default(), v).0
    }

    #[test]
    fn test_scalars_go_to_main_table() {
        let out = extract(serde_json::json!({"id": 7, "name": "Ann", "active": true}));

        assert_eq!(out.main_fields.len(), 3);
        assert_eq!(out.main_fields["id"].recommended_type(), SqlType::TinyInt);
        assert_eq!(out.main_fields["name"].max_length, 3);
        assert_eq!(out.main_fields["active"].recommended_type(), SqlType::Bit);
        assert!(!out.main_fields["name"].is_nested);
        assert!(out.child_samples.is_empty());
    }

    #[test]
    fn test_top_level_object_becomes_child_table() {
        let out = extract(serde_json::json!({
            "address": {"street": "Main St", "geo": {"lat": 1.5}, "lines": ["a", "b"]}
        }));

        assert!(out.main_fields.is_empty());
        let address = &out.child_samples["address"];
        assert_eq!(address.table_type, TableType::NestedObject);
        assert_eq!(address.rows.len(), 1);

        let row = &address.rows[0];
        assert!(row.contains_key("street"));
        assert!(row["geo_lat"].is_nested);
        // Arrays inside a child row stay opaque
        assert_eq!(row["lines"].recommended_type(), SqlType::NVarCharMax);
        assert_eq!(row["lines"].max_length, r#"["a","b"]"#.len());
    }

    #[test]
    fn test_flatten_strategy() {
        let config = InferenceConfig {
            nested_objects: NestedObjectStrategy::Flatten,
            ..Default::default()
        };
        let (out, _) = extract_with(
            &config,
            serde_json::json!({"address": {"city": "Seattle", "zip": {"code": "98101"}}}),
        );

        assert!(out.child_samples.is_empty());
        assert!(out.main_fields["address_city"].is_nested);
        assert!(out.main_fields.contains_key("address_zip_code"));
    }

    #[test]
    fn test_object_array_rows() {
        let out = extract(serde_json::json!({
            "lines": [{"sku": "A", "qty": 1}, {"sku": "B", "qty": 2, "gift": true}]
        }));

        let lines = &out.child_samples["lines"];
        assert_eq!(lines.table_type, TableType::Array);
        assert_eq!(lines.rows.len(), 2);
        assert!(lines.rows[1].contains_key("gift"));
        assert!(!out.main_fields.contains_key("lines"));
    }

    #[test]
    fn test_scalar_array_rows_use_value_column() {
        let scores: Vec<i32> = (0..15).collect();
        let out = extract(serde_json::json!({ "scores": scores }));

        let rows = &out.child_samples["scores"].rows;
        // Rows are sampled up to the element cap
        assert_eq!(rows.len(), 10);
        assert!(rows.iter().all(|r| r.contains_key(VALUE_FIELD)));
    }

    #[test]
    fn test_inline_array_is_main_field() {
        let out = extract(serde_json::json!({"tags": ["red", "blue"], "misc": [1, "x"]}));

        let tags = &out.main_fields["tags"];
        assert_eq!(tags.recommended_type(), SqlType::NVarChar(50));
        assert_eq!(tags.max_length, "red,blue".len());

        let misc = &out.main_fields["misc"];
        assert_eq!(misc.recommended_type(), SqlType::NVarCharMax);
        assert!(out.child_samples.is_empty());
    }

    #[test]
    fn test_arrays_feed_value_frequencies() {
        let items: Vec<String> = (0..30).map(|i| format!("v{}", i % 3)).collect();
        let (_, frequencies) = extract_with(
            &InferenceConfig::default(),
            serde_json::json!({"names": items, "flags": [true, null, false]}),
        );

        // Counting is not capped by the element sample cap
        let names = frequencies.stats("names").unwrap();
        assert_eq!(names.total_occurrences, 30);
        assert_eq!(names.unique_values, 3);

        let flags = frequencies.stats("flags").unwrap();
        assert_eq!(flags.total_occurrences, 2);
    }

    #[test]
    fn test_arrays_inside_child_rows_are_counted() {
        let (out, frequencies) = extract_with(
            &InferenceConfig::default(),
            serde_json::json!({
                "employee": {"name": "Ann", "roles": ["admin", "dev"], "meta": {"badges": [1, 1]}},
                "lines": [{"sku": "A", "codes": ["x", "y"]}, {"sku": "B", "codes": ["x"]}],
            }),
        );

        // Rows keep the arrays opaque
        assert_eq!(out.child_samples["employee"].rows[0]["roles"].recommended_type(), SqlType::NVarCharMax);

        let roles = frequencies.stats("employee_roles").unwrap();
        assert_eq!(roles.total_occurrences, 2);
        let badges = frequencies.stats("employee_meta_badges").unwrap();
        assert_eq!((badges.unique_values, badges.total_occurrences), (1, 2));
        let codes = frequencies.stats("lines_codes").unwrap();
        assert_eq!((codes.unique_values, codes.total_occurrences), (2, 3));
    }

    #[test]
    fn test_null_scalar_is_recorded() {
        let out = extract(serde_json::json!({"note": null}));
        let note = &out.main_fields["note"];
        assert!(note.detected_types().contains(&SqlType::Null));
        assert_eq!(note.recommended_type(), SqlType::NVarCharMax);
    }
}
