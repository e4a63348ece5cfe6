//! Inferred schema model
//!
//! The types here are what a pass hands to DDL and report emitters:
//! main-table variants grouped by signature, normalized child tables, and
//! the relationship findings.

pub mod aggregator;
mod variants;

pub use aggregator::SchemaAggregator;
pub use variants::SchemaVariants;

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::relationship::RelationshipFinding;
use crate::types::{types_csv, unify, SqlType};

/// Parent-key column every child table carries
pub const PARENT_KEY_FIELD: &str = "ParentId";

/// Column holding scalar array elements in a child table
pub const VALUE_FIELD: &str = "Value";

/// Field map keyed by (flattened) field name
pub type FieldMap = BTreeMap<String, FieldInfo>;

/// Statistics for one column
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldInfo {
    pub name: String,
    detected_types: BTreeSet<SqlType>,
    recommended_type: SqlType,
    pub is_required: bool,
    /// Name came from flattening a nested object
    pub is_nested: bool,
    /// Longest string observed, in characters
    pub max_length: usize,
}

impl FieldInfo {
    pub fn new(name: impl Into<String>, is_nested: bool) -> Self {
        Self {
            name: name.into(),
            detected_types: BTreeSet::new(),
            recommended_type: unify(std::iter::empty()),
            is_required: true,
            is_nested,
            max_length: 0,
        }
    }

    pub fn detected_types(&self) -> &BTreeSet<SqlType> {
        &self.detected_types
    }

    /// Unified column type.
    ///
    /// For strings this is the narrowest observed bucket; size the column
    /// from `max_length` before emitting DDL.
    pub fn recommended_type(&self) -> SqlType {
        self.recommended_type
    }

    /// Record one observed type label
    pub fn observe(&mut self, sql_type: SqlType) {
        if self.detected_types.insert(sql_type) {
            self.recommended_type = unify(&self.detected_types);
        }
    }

    /// Raise the string-length high-water mark
    pub fn observe_length(&mut self, len: usize) {
        self.max_length = self.max_length.max(len);
    }

    /// Fold another observation of the same column into this one
    pub fn merge(&mut self, other: &FieldInfo) {
        let before = self.detected_types.len();
        self.detected_types.extend(other.detected_types.iter().copied());
        if self.detected_types.len() != before {
            self.recommended_type = unify(&self.detected_types);
        }
        self.is_required &= other.is_required;
        self.is_nested |= other.is_nested;
        self.max_length = self.max_length.max(other.max_length);
    }
}

/// Fold the fields of one sample into an accumulated field map.
///
/// `seen_before` says whether `into` already reflects earlier samples: a
/// field first appearing after that cannot be required, and a field missing
/// from `sample` stops being required.
pub(crate) fn union_fields(into: &mut FieldMap, sample: &FieldMap, seen_before: bool) {
    for field in into.values_mut() {
        if !sample.contains_key(&field.name) {
            field.is_required = false;
        }
    }
    for (name, field) in sample {
        match into.get_mut(name) {
            Some(existing) => existing.merge(field),
            None => {
                let mut field = field.clone();
                field.is_required &= !seen_before;
                into.insert(name.clone(), field);
            }
        }
    }
}

/// Signature of a main-table field set: sorted `name:types` pairs.
///
/// `\`, `:` and `|` inside names are backslash-escaped, so distinct field
/// sets never share a signature.
pub fn signature(fields: &FieldMap) -> String {
    fields
        .values()
        .map(|f| format!("{}:{}", escape_name(&f.name), types_csv(&f.detected_types)))
        .collect::<Vec<_>>()
        .join("|")
}

fn escape_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        if matches!(c, '\\' | ':' | '|') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// One main-table schema variant
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentSchema {
    /// 1-based, in first-seen order
    pub id: u32,
    pub signature: String,
    pub fields: FieldMap,
    pub sample_count: usize,
    pub prevalence: f64,
    /// Many-to-many notes for array fields stored inline, keyed by field
    pub relationship_hints: BTreeMap<String, String>,
}

/// How a child table came to exist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TableType {
    Array,
    NestedObject,
    ManyToMany,
}

/// A table normalized out of the main table
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChildTableSchema {
    pub table_name: String,
    pub source_field_path: String,
    pub table_type: TableType,
    pub fields: FieldMap,
    /// Rows sampled into this table
    pub sample_count: usize,
    pub parent_key_field: String,
    pub recommended_indexes: Vec<String>,
    pub transformation_notes: Vec<String>,
}

impl ChildTableSchema {
    pub fn new(source_field_path: &str, table_type: TableType) -> Self {
        let table_name = source_field_path.to_string();
        Self {
            recommended_indexes: vec![format!("IX_{table_name}_{PARENT_KEY_FIELD}")],
            table_name,
            source_field_path: source_field_path.to_string(),
            table_type,
            fields: FieldMap::new(),
            sample_count: 0,
            parent_key_field: PARENT_KEY_FIELD.to_string(),
            transformation_notes: Vec::new(),
        }
    }

    /// Consolidate sampled rows into the table's fields
    pub fn add_rows(&mut self, rows: &[FieldMap]) {
        for row in rows {
            union_fields(&mut self.fields, row, self.sample_count > 0);
            self.sample_count += 1;
        }
    }

    /// Append a note unless an identical one is already present
    pub fn add_note(&mut self, note: impl Into<String>) {
        let note = note.into();
        if !self.transformation_notes.contains(&note) {
            self.transformation_notes.push(note);
        }
    }

    /// Columns that get a lookup index, one index each.
    ///
    /// Scalar-element tables index their value column; object-element
    /// tables index every column they carry.
    pub(crate) fn lookup_columns(&self) -> Vec<String> {
        if self.fields.contains_key(VALUE_FIELD) || self.fields.is_empty() {
            vec![VALUE_FIELD.to_string()]
        } else {
            self.fields.keys().cloned().collect()
        }
    }
}

/// Result of one collection's analysis pass
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaModel {
    /// Variants in first-seen order
    pub schemas: Vec<DocumentSchema>,
    pub child_tables: BTreeMap<String, ChildTableSchema>,
    pub relationships: Vec<RelationshipFinding>,
    pub documents_processed: usize,
    pub documents_skipped: usize,
    pub cancelled: bool,
}

impl SchemaModel {
    /// No document produced a schema
    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty() && self.child_tables.is_empty()
    }

    pub fn schema(&self, signature: &str) -> Option<&DocumentSchema> {
        self.schemas.iter().find(|s| s.signature == signature)
    }

    /// Total documents attributed to a variant
    pub fn total_samples(&self) -> usize {
        self.schemas.iter().map(|s| s.sample_count).sum()
    }

    /// Every main-table column across all variants.
    ///
    /// A column is required only when every variant has it as required.
    pub fn unified_fields(&self) -> FieldMap {
        let mut unified = FieldMap::new();
        for (i, schema) in self.schemas.iter().enumerate() {
            union_fields(&mut unified, &schema.fields, i > 0);
        }
        unified
    }
}
