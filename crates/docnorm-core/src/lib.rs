//! docnorm - relational schema inference for document collections
//!
//! Given a bounded sample of schema-less JSON documents from one collection,
//! docnorm infers a normalized relational shape for it.
//!
//! # Key Features
//!
//! - **Type Inference**: classify every value into a SQL column type and
//!   unify the types seen per field
//! - **Normalization**: decide per array or nested object whether to inline,
//!   serialize, or move it into a child table
//! - **Relationship Detection**: flag array fields whose values are reused
//!   across documents as many-to-many reference data
//! - **Variant Grouping**: group documents by structural signature and report
//!   each variant's prevalence
//!
//! # Example
//!
//! ```rust
//! use docnorm_core::CollectionAnalyzer;
//!
//! let mut analyzer = CollectionAnalyzer::new();
//! analyzer.add_json(br#"{"id": "1", "name": "Ann"}"#);
//! analyzer.add_json(br#"{"id": "2", "name": "Bo", "age": 30}"#);
//!
//! let model = analyzer.finish();
//! assert_eq!(model.schemas.len(), 2);
//! ```

pub mod array;
pub mod clustering;
pub mod config;
pub mod document;
pub mod error;
pub mod extract;
pub mod relationship;
pub mod schema;
pub mod types;

// Re-exports
pub use array::{analyze_array, ArrayAnalysis, RecommendedStorage};
pub use clustering::{cluster_schemas, SchemaCluster};
pub use config::{InferenceConfig, NestedObjectStrategy};
pub use document::Node;
pub use error::{Error, Result};
pub use relationship::{RelationshipFinding, RelationshipTarget};
pub use schema::{ChildTableSchema, DocumentSchema, FieldInfo, SchemaModel, TableType};
pub use types::SqlType;

use std::collections::BTreeMap;
use std::fmt::Display;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, info, warn};

use extract::FieldExtractor;
use relationship::{apply_findings, RelationshipDetector, ValueFrequencyTable};
use schema::SchemaAggregator;

/// Analysis pass over one collection's document sample
///
/// Owns every accumulator of the pass; nothing is shared between analyzers,
/// so separate collections can be analyzed concurrently.
pub struct CollectionAnalyzer {
    config: InferenceConfig,
    aggregator: SchemaAggregator,
    frequencies: ValueFrequencyTable,
    stats: AnalyzerStats,
}

/// Pass statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzerStats {
    pub documents_processed: usize,
    /// Malformed documents, not counted as processed
    pub documents_skipped: usize,
    /// Documents offered after the sample cap was reached
    pub documents_ignored: usize,
    pub schema_variants: usize,
    pub child_tables: usize,
}

impl CollectionAnalyzer {
    /// Create an analyzer with default configuration
    pub fn new() -> Self {
        Self::from_valid_config(InferenceConfig::default())
    }

    /// Create an analyzer with custom configuration
    pub fn with_config(config: InferenceConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::from_valid_config(config))
    }

    fn from_valid_config(config: InferenceConfig) -> Self {
        Self {
            config,
            aggregator: SchemaAggregator::new(),
            frequencies: ValueFrequencyTable::new(),
            stats: AnalyzerStats::default(),
        }
    }

    pub fn config(&self) -> &InferenceConfig {
        &self.config
    }

    /// The sample cap has been reached
    pub fn is_full(&self) -> bool {
        self.stats.documents_processed >= self.config.max_documents
    }

    /// Add one parsed document.
    ///
    /// Returns `false` when the document was skipped (root is not an object)
    /// or ignored (sample cap reached).
    pub fn add_document(&mut self, document: &Node) -> bool {
        if self.is_full() {
            self.stats.documents_ignored += 1;
            return false;
        }

        let Node::Object(props) = document else {
            self.skip(&format!("document root is {:?}, expected an object", document.kind()));
            return false;
        };

        let extractor = FieldExtractor::new(&self.config);
        self.aggregator.add_document(props, &extractor, &mut self.frequencies);
        self.stats.documents_processed += 1;
        self.stats.schema_variants = self.aggregator.variants().len();
        self.stats.child_tables = self.aggregator.child_tables().len();
        true
    }

    /// Parse and add one JSON document; malformed input is skipped
    pub fn add_json(&mut self, input: &[u8]) -> bool {
        if self.is_full() {
            self.stats.documents_ignored += 1;
            return false;
        }
        match Node::parse(input) {
            Ok(document) => self.add_document(&document),
            Err(e) => {
                self.skip(&e);
                false
            }
        }
    }

    fn skip(&mut self, reason: &dyn Display) {
        self.stats.documents_skipped += 1;
        warn!(%reason, skipped = self.stats.documents_skipped, "skipping malformed document");
    }

    /// Drain a document supply into the pass.
    ///
    /// Supplier errors count as skipped documents. Stops pulling once the
    /// sample cap is reached or `cancel` is set; the flag is checked once per
    /// document boundary.
    pub fn consume<I, E>(&mut self, documents: I, cancel: Option<&AtomicBool>) -> bool
    where
        I: IntoIterator<Item = std::result::Result<Node, E>>,
        E: Display,
    {
        for document in documents {
            if cancel.is_some_and(|c| c.load(Ordering::Relaxed)) {
                debug!(processed = self.stats.documents_processed, "analysis cancelled");
                return false;
            }
            match document {
                Ok(document) => {
                    self.add_document(&document);
                }
                Err(e) => self.skip(&e),
            }
            if self.is_full() {
                break;
            }
        }
        true
    }

    /// Get pass statistics
    pub fn stats(&self) -> &AnalyzerStats {
        &self.stats
    }

    /// End the pass and build the schema model
    pub fn finish(self) -> SchemaModel {
        self.finish_with(false)
    }

    fn finish_with(self, cancelled: bool) -> SchemaModel {
        let documents = self.stats.documents_processed;
        let (mut schemas, mut child_tables) = self.aggregator.finish();

        let detector = RelationshipDetector::new(&self.config.relationships);
        let mut relationships = detector.detect(self.frequencies, documents);
        apply_findings(&mut relationships, &mut child_tables, &mut schemas);

        info!(
            documents,
            skipped = self.stats.documents_skipped,
            variants = schemas.len(),
            child_tables = child_tables.len(),
            relationships = relationships.len(),
            cancelled,
            "schema inference finished"
        );

        SchemaModel {
            schemas,
            child_tables,
            relationships,
            documents_processed: documents,
            documents_skipped: self.stats.documents_skipped,
            cancelled,
        }
    }
}

impl Default for CollectionAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

/// Analyze one collection's document supply
pub fn analyze<I, E>(documents: I, config: &InferenceConfig, cancel: Option<&AtomicBool>) -> Result<SchemaModel>
where
    I: IntoIterator<Item = std::result::Result<Node, E>>,
    E: Display,
{
    let mut analyzer = CollectionAnalyzer::with_config(config.clone())?;
    let completed = analyzer.consume(documents, cancel);
    Ok(analyzer.finish_with(!completed))
}

/// Analyze newline-delimited JSON; blank lines are ignored
pub fn analyze_json_lines(input: &str, config: &InferenceConfig) -> Result<SchemaModel> {
    let documents = input
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| Node::parse(line.as_bytes()));
    analyze(documents, config, None)
}

/// Analyze several collections in independent passes, one per name.
///
/// With the `parallel` feature the passes run on the rayon pool.
pub fn analyze_collections<K>(
    collections: BTreeMap<K, Vec<Node>>,
    config: &InferenceConfig,
) -> Result<BTreeMap<K, SchemaModel>>
where
    K: Ord + Send,
{
    config.validate()?;

    let run = |(name, documents): (K, Vec<Node>)| {
        let mut analyzer = CollectionAnalyzer::from_valid_config(config.clone());
        for document in &documents {
            if !analyzer.add_document(document) && analyzer.is_full() {
                break;
            }
        }
        (name, analyzer.finish())
    };

    #[cfg(feature = "parallel")]
    let models = {
        use rayon::prelude::*;
        collections.into_par_iter().map(run).collect()
    };

    #[cfg(not(feature = "parallel"))]
    let models = collections.into_iter().map(run).collect();

    Ok(models)
}
