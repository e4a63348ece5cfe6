//! Schema clustering
//!
//! Exact signatures split documents that differ by a single optional field.
//! This post-pass groups variants whose field-name sets are similar enough,
//! leaving the exact variants untouched.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::schema::{union_fields, DocumentSchema, FieldMap};

/// A group of similar schema variants
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaCluster {
    /// Signature of the variant the cluster formed around
    pub representative: String,
    /// Member signatures, representative first
    pub members: Vec<String>,
    pub sample_count: usize,
    pub prevalence: f64,
    /// Union of member fields; required only if every member requires it
    pub fields: FieldMap,
}

/// Jaccard similarity of two name sets; two empty sets are identical
pub fn jaccard(a: &BTreeSet<&str>, b: &BTreeSet<&str>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 1.0;
    }
    a.intersection(b).count() as f64 / union as f64
}

fn field_names(fields: &FieldMap) -> BTreeSet<&str> {
    fields.keys().map(String::as_str).collect()
}

/// Group variants whose field names are at least `threshold` similar.
///
/// Variants are visited most-common first (ties by id) and join the first
/// cluster whose representative is similar enough, so the result does not
/// depend on input order.
pub fn cluster_schemas(schemas: &[DocumentSchema], threshold: f64) -> Vec<SchemaCluster> {
    let mut ordered: Vec<&DocumentSchema> = schemas.iter().collect();
    ordered.sort_by(|a, b| b.sample_count.cmp(&a.sample_count).then(a.id.cmp(&b.id)));

    // Representative field names per cluster, kept beside the clusters
    let mut representatives: Vec<BTreeSet<&str>> = Vec::new();
    let mut clusters: Vec<SchemaCluster> = Vec::new();

    for schema in ordered {
        let names = field_names(&schema.fields);
        let joined = representatives
            .iter()
            .position(|rep| jaccard(rep, &names) >= threshold);

        match joined {
            Some(idx) => {
                let cluster = &mut clusters[idx];
                union_fields(&mut cluster.fields, &schema.fields, true);
                cluster.members.push(schema.signature.clone());
                cluster.sample_count += schema.sample_count;
                cluster.prevalence += schema.prevalence;
            }
            None => {
                representatives.push(names);
                clusters.push(SchemaCluster {
                    representative: schema.signature.clone(),
                    members: vec![schema.signature.clone()],
                    sample_count: schema.sample_count,
                    prevalence: schema.prevalence,
                    fields: schema.fields.clone(),
                });
            }
        }
    }

    clusters
}
