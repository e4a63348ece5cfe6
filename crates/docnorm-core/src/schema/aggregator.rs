//! Schema aggregation across a document sample

use std::collections::BTreeMap;

use tracing::debug;

use super::{ChildTableSchema, DocumentSchema, SchemaVariants};
use crate::document::Node;
use crate::extract::{Extraction, FieldExtractor};
use crate::relationship::ValueFrequencyTable;

/// Folds per-document extractions into variants and child tables
#[derive(Debug, Default)]
pub struct SchemaAggregator {
    variants: SchemaVariants,
    child_tables: BTreeMap<String, ChildTableSchema>,
}

impl SchemaAggregator {
    /// Create a new empty aggregator
    pub fn new() -> Self {
        Self::default()
    }

    /// Extract one document and fold it in
    pub fn add_document(
        &mut self,
        document: &[(String, Node)],
        extractor: &FieldExtractor<'_>,
        frequencies: &mut ValueFrequencyTable,
    ) {
        let extraction = extractor.extract(document, frequencies);
        self.add_extraction(extraction);
    }

    /// Fold one document's extraction
    pub fn add_extraction(&mut self, extraction: Extraction) {
        let (id, is_new) = self.variants.record(&extraction.main_fields);
        if is_new {
            debug!(
                schema_id = id,
                fields = extraction.main_fields.len(),
                "new schema variant"
            );
        }

        for (path, samples) in extraction.child_samples {
            let table = self.child_tables.entry(path).or_insert_with_key(|path| {
                debug!(table = %path, table_type = ?samples.table_type, "new child table");
                ChildTableSchema::new(path, samples.table_type)
            });
            table.add_note(samples.note);
            table.add_rows(&samples.rows);
        }
    }

    pub fn variants(&self) -> &SchemaVariants {
        &self.variants
    }

    pub fn child_tables(&self) -> &BTreeMap<String, ChildTableSchema> {
        &self.child_tables
    }

    /// Compute prevalence and release the accumulated schemas
    pub fn finish(self) -> (Vec<DocumentSchema>, BTreeMap<String, ChildTableSchema>) {
        (self.variants.into_schemas(), self.child_tables)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InferenceConfig;
    use crate::schema::TableType;

    fn add(aggregator: &mut SchemaAggregator, config: &InferenceConfig, v: serde_json::Value) {
        let props = match Node::from_json(&v) {
            Node::Object(props) => props,
            _ => panic!("Expected Object"),
        };
        let mut frequencies = ValueFrequencyTable::new();
        aggregator.add_document(&props, &FieldExtractor::new(config), &mut frequencies);
    }

    #[test]
    fn test_variants_by_signature() {
        let config = InferenceConfig::default();
        let mut aggregator = SchemaAggregator::new();

        add(&mut aggregator, &config, serde_json::json!({"id": 1, "name": "alice"}));
        add(&mut aggregator, &config, serde_json::json!({"id": 2, "name": "bob"}));
        add(&mut aggregator, &config, serde_json::json!({"id": 3, "name": "cy", "email": "c@x.io"}));

        assert_eq!(aggregator.variants().len(), 2);

        let (schemas, child_tables) = aggregator.finish();
        assert!(child_tables.is_empty());
        assert_eq!(schemas[0].sample_count, 2);
        assert_eq!(schemas[0].fields["name"].max_length, 5);
        assert!((schemas[0].prevalence - 2.0 / 3.0).abs() < 1e-9);
        assert!((schemas[1].prevalence - 1.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_child_table_consolidation() {
        let config = InferenceConfig::default();
        let mut aggregator = SchemaAggregator::new();

        add(&mut aggregator, &config, serde_json::json!({"profile": {"bio": "hi", "age": 30}}));
        add(&mut aggregator, &config, serde_json::json!({"profile": {"bio": "yo"}}));
        add(&mut aggregator, &config, serde_json::json!({"profile": {"bio": "hey", "site": "x.io"}}));

        let (schemas, child_tables) = aggregator.finish();

        // Child-table fields never reach the main-table signature
        assert_eq!(schemas.len(), 1);
        assert_eq!(schemas[0].signature, "");

        let profile = &child_tables["profile"];
        assert_eq!(profile.table_type, TableType::NestedObject);
        assert_eq!(profile.sample_count, 3);
        assert!(profile.fields["bio"].is_required);
        assert!(!profile.fields["age"].is_required);
        assert!(!profile.fields["site"].is_required);
        assert_eq!(profile.transformation_notes.len(), 1);
    }

    #[test]
    fn test_child_rows_from_one_document() {
        let config = InferenceConfig::default();
        let mut aggregator = SchemaAggregator::new();

        add(
            &mut aggregator,
            &config,
            serde_json::json!({"lines": [{"sku": "A", "qty": 1}, {"sku": "B"}]}),
        );

        let lines = &aggregator.child_tables()["lines"];
        assert_eq!(lines.table_type, TableType::Array);
        assert_eq!(lines.sample_count, 2);
        assert!(lines.fields["sku"].is_required);
        assert!(!lines.fields["qty"].is_required);
    }
}
