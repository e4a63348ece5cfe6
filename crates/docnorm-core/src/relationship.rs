//! Many-to-many detection
//!
//! A pass counts every array element value per array field path. Once the
//! pass ends, fields whose values are reused across documents are flagged as
//! reference data that belongs in a lookup table joined through a junction
//! table.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use tracing::debug;

use crate::config::{matches_keyword, RelationshipConfig};
use crate::document::Node;
use crate::schema::{ChildTableSchema, DocumentSchema, TableType};

/// Per-path counts of stringified array element values
#[derive(Debug, Default)]
pub struct ValueFrequencyTable {
    fields: BTreeMap<String, HashMap<String, usize>>,
}

/// Summary of one tracked field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrequencyStats {
    pub unique_values: usize,
    pub total_occurrences: usize,
    pub max_occurrences: usize,
}

impl ValueFrequencyTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one element value; nulls are not counted
    pub fn observe(&mut self, path: &str, value: &Node) {
        if let Some(text) = value.value_text() {
            *self
                .fields
                .entry(path.to_string())
                .or_default()
                .entry(text)
                .or_insert(0) += 1;
        }
    }

    /// Count every element of an array
    pub fn observe_all(&mut self, path: &str, items: &[Node]) {
        for item in items {
            self.observe(path, item);
        }
    }

    pub fn stats(&self, path: &str) -> Option<FrequencyStats> {
        self.fields.get(path).map(|counts| FrequencyStats {
            unique_values: counts.len(),
            total_occurrences: counts.values().sum(),
            max_occurrences: counts.values().copied().max().unwrap_or(0),
        })
    }

    /// Tracked paths in lexical order
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Which rule flagged a field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ManyToManyReason {
    /// One value recurs across a large share of documents
    SharedValues,
    /// Few unique values relative to total occurrences
    LowReuseRatio,
    /// Field name reads like reference data
    ReferenceName,
}

/// Where a finding was recorded
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "target", rename_all = "camelCase")]
pub enum RelationshipTarget {
    ChildTable(String),
    /// Opaque array column inside a child table
    ChildTableField { table: String, field: String },
    /// No child table exists; noted on the main-table field of each variant
    MainTableField,
}

/// A field classified as many-to-many reference data
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationshipFinding {
    pub field_path: String,
    pub unique_values: usize,
    pub total_occurrences: usize,
    pub documents: usize,
    pub max_share_percentage: f64,
    pub reuse_ratio: f64,
    pub reasons: Vec<ManyToManyReason>,
    pub target: RelationshipTarget,
}

impl RelationshipFinding {
    /// Human-readable note citing the statistics
    pub fn note(&self) -> String {
        format!(
            "Many-to-many candidate: {} unique values across {} occurrences in {} documents \
             (max share {:.0}%, reuse ratio {:.2}); move values to a lookup table joined through a junction table",
            self.unique_values,
            self.total_occurrences,
            self.documents,
            self.max_share_percentage * 100.0,
            self.reuse_ratio,
        )
    }
}

/// Classifies tracked array fields once a pass has ended
pub struct RelationshipDetector<'a> {
    config: &'a RelationshipConfig,
}

impl<'a> RelationshipDetector<'a> {
    pub fn new(config: &'a RelationshipConfig) -> Self {
        Self { config }
    }

    /// Classify one field; `None` when it does not look like reference data
    pub fn classify(&self, path: &str, stats: FrequencyStats, documents: usize) -> Option<RelationshipFinding> {
        let cfg = self.config;
        let FrequencyStats {
            unique_values: u,
            total_occurrences: t,
            max_occurrences,
        } = stats;
        if t == 0 || documents == 0 {
            return None;
        }

        let max_share_percentage = max_occurrences as f64 / documents as f64;
        let reuse_ratio = u as f64 / t as f64;

        let mut reasons = Vec::new();
        if documents >= cfg.min_documents
            && u >= cfg.min_unique_for_share
            && max_share_percentage >= cfg.min_share_percentage
        {
            reasons.push(ManyToManyReason::SharedValues);
        }
        if reuse_ratio <= cfg.max_reuse_ratio && u >= cfg.min_unique_for_reuse {
            reasons.push(ManyToManyReason::LowReuseRatio);
        }
        if matches_keyword(path, &cfg.reference_keywords) && u >= cfg.min_unique_for_keyword {
            reasons.push(ManyToManyReason::ReferenceName);
        }

        if reasons.is_empty() {
            return None;
        }

        Some(RelationshipFinding {
            field_path: path.to_string(),
            unique_values: u,
            total_occurrences: t,
            documents,
            max_share_percentage,
            reuse_ratio,
            reasons,
            target: RelationshipTarget::MainTableField,
        })
    }

    /// Classify every tracked field, consuming the table
    pub fn detect(&self, table: ValueFrequencyTable, documents: usize) -> Vec<RelationshipFinding> {
        let findings: Vec<_> = table
            .paths()
            .filter_map(|path| {
                let stats = table.stats(path)?;
                self.classify(path, stats, documents)
            })
            .collect();

        for f in &findings {
            debug!(
                field = %f.field_path,
                unique = f.unique_values,
                total = f.total_occurrences,
                max_share = f.max_share_percentage,
                reuse_ratio = f.reuse_ratio,
                reasons = ?f.reasons,
                "many-to-many candidate"
            );
        }
        findings
    }
}

/// Attach findings to the child tables and variants they describe.
///
/// A field with a child table gets its table retyped to `ManyToMany` with
/// lookup indexes. An array column of a child table gets the note on that
/// table. Otherwise the note lands on the main-table field of every variant
/// that has it.
pub fn apply_findings(
    findings: &mut [RelationshipFinding],
    child_tables: &mut BTreeMap<String, ChildTableSchema>,
    schemas: &mut [DocumentSchema],
) {
    for finding in findings.iter_mut() {
        let note = finding.note();
        match child_tables.get_mut(&finding.field_path) {
            Some(table) => {
                table.table_type = TableType::ManyToMany;
                for column in table.lookup_columns() {
                    let index = format!("IX_{}_{}", table.table_name, column);
                    if !table.recommended_indexes.contains(&index) {
                        table.recommended_indexes.push(index);
                    }
                }
                table.add_note(note);
                table.add_note(format!("Detected by: {:?}", finding.reasons));
                finding.target = RelationshipTarget::ChildTable(table.table_name.clone());
            }
            None => match child_table_field(child_tables, &finding.field_path) {
                Some((table, field)) => {
                    table.add_note(format!("Column '{field}': {note}"));
                    finding.target = RelationshipTarget::ChildTableField {
                        table: table.table_name.clone(),
                        field,
                    };
                }
                None => {
                    for schema in schemas.iter_mut() {
                        if schema.fields.contains_key(&finding.field_path) {
                            schema
                                .relationship_hints
                                .insert(finding.field_path.clone(), note.clone());
                        }
                    }
                    finding.target = RelationshipTarget::MainTableField;
                }
            },
        }
    }
}

/// Child table owning the `<table>_<column>` path, with the column name
fn child_table_field<'t>(
    child_tables: &'t mut BTreeMap<String, ChildTableSchema>,
    path: &str,
) -> Option<(&'t mut ChildTableSchema, String)> {
    for table in child_tables.values_mut() {
        let Some(field) = path
            .strip_prefix(table.table_name.as_str())
            .and_then(|rest| rest.strip_prefix('_'))
        else {
            continue;
        };
        if table.fields.contains_key(field) {
            return Some((table, field.to_string()));
        }
    }
    None
}
