//! Signature-keyed registry of main-table schema variants

use std::collections::{BTreeMap, HashMap};

use super::{signature, DocumentSchema, FieldMap};

/// Schema variants with id and signature lookup
#[derive(Debug, Default)]
pub struct SchemaVariants {
    schemas: Vec<DocumentSchema>,
    signature_index: HashMap<String, usize>,
}

impl SchemaVariants {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Get variant by ID
    pub fn get(&self, id: u32) -> Option<&DocumentSchema> {
        (id as usize)
            .checked_sub(1)
            .and_then(|idx| self.schemas.get(idx))
    }

    /// Get variant by signature
    pub fn get_by_signature(&self, signature: &str) -> Option<&DocumentSchema> {
        self.signature_index
            .get(signature)
            .and_then(|&idx| self.schemas.get(idx))
    }

    /// Attribute one document's main-table fields to its variant.
    ///
    /// Returns the variant ID and whether the variant is new.
    pub fn record(&mut self, fields: &FieldMap) -> (u32, bool) {
        let sig = signature(fields);

        if let Some(&idx) = self.signature_index.get(&sig) {
            let schema = &mut self.schemas[idx];
            for (name, field) in fields {
                if let Some(existing) = schema.fields.get_mut(name) {
                    existing.merge(field);
                }
            }
            schema.sample_count += 1;
            return (schema.id, false);
        }

        let idx = self.schemas.len();
        let id = idx as u32 + 1;
        self.signature_index.insert(sig.clone(), idx);
        self.schemas.push(DocumentSchema {
            id,
            signature: sig,
            fields: fields.clone(),
            sample_count: 1,
            prevalence: 0.0,
            relationship_hints: BTreeMap::new(),
        });

        (id, true)
    }

    /// Number of variants
    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    /// Check if no variant has been recorded
    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    /// Documents attributed across all variants
    pub fn total_samples(&self) -> usize {
        self.schemas.iter().map(|s| s.sample_count).sum()
    }

    /// Compute prevalence and hand out the variants in first-seen order
    pub fn into_schemas(mut self) -> Vec<DocumentSchema> {
        let total = self.total_samples();
        if total > 0 {
            for schema in &mut self.schemas {
                schema.prevalence = schema.sample_count as f64 / total as f64;
            }
        }
        self.schemas
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldInfo;
    use crate::types::SqlType;

    fn fields(entries: &[(&str, SqlType, usize)]) -> FieldMap {
        entries
            .iter()
            .map(|(name, t, len)| {
                let mut f = FieldInfo::new(*name, false);
                f.observe(*t);
                f.observe_length(*len);
                (name.to_string(), f)
            })
            .collect()
    }

    #[test]
    fn test_record_and_lookup() {
        let mut variants = SchemaVariants::new();

        let doc = fields(&[("id", SqlType::TinyInt, 0)]);
        let (id, is_new) = variants.record(&doc);

        assert_eq!(id, 1);
        assert!(is_new);
        assert!(variants.get(id).is_some());
        assert!(variants.get(0).is_none());
        assert!(variants.get_by_signature("id:TINYINT").is_some());
    }

    #[test]
    fn test_same_signature_dedup() {
        let mut variants = SchemaVariants::new();

        let (id1, _) = variants.record(&fields(&[("name", SqlType::NVarChar(50), 3)]));
        let (id2, is_new) = variants.record(&fields(&[("name", SqlType::NVarChar(50), 12)]));

        assert_eq!(id1, id2);
        assert!(!is_new);
        assert_eq!(variants.len(), 1);

        let schema = variants.get(id1).unwrap();
        assert_eq!(schema.sample_count, 2);
        assert_eq!(schema.fields["name"].max_length, 12);
    }

    #[test]
    fn test_separator_in_name_is_its_own_variant() {
        let mut variants = SchemaVariants::new();

        variants.record(&fields(&[("a", SqlType::Bit, 0), ("b", SqlType::Bit, 0)]));
        let (id, is_new) = variants.record(&fields(&[("a:BIT|b", SqlType::Bit, 0)]));

        assert!(is_new);
        assert_eq!(variants.len(), 2);
        assert!(variants.get(id).unwrap().fields.contains_key("a:BIT|b"));
        assert_eq!(variants.get(1).unwrap().sample_count, 1);
    }

    #[test]
    fn test_prevalence() {
        let mut variants = SchemaVariants::new();
        variants.record(&fields(&[("a", SqlType::Bit, 0)]));
        variants.record(&fields(&[("a", SqlType::Bit, 0)]));
        variants.record(&fields(&[("a", SqlType::Bit, 0)]));
        variants.record(&fields(&[("b", SqlType::Bit, 0)]));

        let schemas = variants.into_schemas();
        assert_eq!(schemas[0].prevalence, 0.75);
        assert_eq!(schemas[1].prevalence, 0.25);
        assert_eq!(schemas[1].id, 2);
    }
}
