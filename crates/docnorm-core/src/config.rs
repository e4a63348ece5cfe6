//! Inference configuration
//!
//! Every threshold the inference core consults lives here so deployments can
//! tune them without code changes. All fields are defaulted, so a config file
//! only needs to name the values it overrides:
//!
//! ```toml
//! max_documents = 500
//! string_buckets = [64, 256, 4000]
//!
//! [relationships]
//! min_share_percentage = 0.25
//! ```

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// How objects found directly under the document root are stored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NestedObjectStrategy {
    /// Normalize into a `NestedObject` child table named after the property
    #[default]
    ChildTable,
    /// Flatten into underscore-joined main-table columns
    Flatten,
}

/// Inference configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    /// Documents beyond this count are ignored by a pass
    pub max_documents: usize,
    /// Ascending `NVARCHAR(n)` length thresholds; longer strings are `NVARCHAR(MAX)`
    pub string_buckets: Vec<u32>,
    pub nested_objects: NestedObjectStrategy,
    pub arrays: ArrayConfig,
    pub relationships: RelationshipConfig,
    /// Jaccard similarity at or above which two schema variants cluster together
    pub cluster_similarity: f64,
}

/// Array Structure Analyzer thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArrayConfig {
    /// Elements inspected for structure, and rows sampled into child tables
    pub element_sample_cap: usize,
    /// Max element length for a tag-like string array to be stored delimited
    pub tag_max_length: usize,
    /// String arrays with more items than this are normalized
    pub large_item_count: usize,
    /// String arrays with an element longer than this are normalized
    pub long_string_length: usize,
    /// Primitive arrays up to this many items are stored delimited
    pub small_item_count: usize,
    /// Field-name substrings that mark an array as tag-like
    pub tag_keywords: Vec<String>,
}

/// Relationship Detector thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelationshipConfig {
    pub min_documents: usize,
    pub min_unique_for_share: usize,
    pub min_share_percentage: f64,
    pub max_reuse_ratio: f64,
    pub min_unique_for_reuse: usize,
    pub min_unique_for_keyword: usize,
    /// Field-name substrings that mark an array as reference data
    pub reference_keywords: Vec<String>,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            max_documents: 100,
            string_buckets: vec![50, 100, 255, 1000],
            nested_objects: NestedObjectStrategy::default(),
            arrays: ArrayConfig::default(),
            relationships: RelationshipConfig::default(),
            cluster_similarity: 0.8,
        }
    }
}

impl Default for ArrayConfig {
    fn default() -> Self {
        Self {
            element_sample_cap: 10,
            tag_max_length: 100,
            large_item_count: 20,
            long_string_length: 500,
            small_item_count: 10,
            tag_keywords: keywords(&["tag", "category", "label", "keyword", "genre", "topic"]),
        }
    }
}

impl Default for RelationshipConfig {
    fn default() -> Self {
        Self {
            min_documents: 5,
            min_unique_for_share: 3,
            min_share_percentage: 0.30,
            max_reuse_ratio: 0.70,
            min_unique_for_reuse: 10,
            min_unique_for_keyword: 5,
            reference_keywords: keywords(&[
                "id",
                "code",
                "type",
                "status",
                "category",
                "classification",
                "department",
                "team",
                "role",
            ]),
        }
    }
}

fn keywords(words: &[&str]) -> Vec<String> {
    words.iter().map(|w| w.to_string()).collect()
}

/// Case-insensitive substring match of `name` against a keyword list
pub(crate) fn matches_keyword(name: &str, keywords: &[String]) -> bool {
    let name = name.to_lowercase();
    keywords
        .iter()
        .any(|k| !k.is_empty() && name.contains(&k.to_lowercase()))
}

impl InferenceConfig {
    /// Parse a (possibly partial) TOML config
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Self = toml::from_str(s).map_err(|e| Error::Toml(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a (possibly partial) JSON config
    pub fn from_json_str(s: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(s).map_err(|e| Error::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check thresholds for consistency
    pub fn validate(&self) -> Result<()> {
        if self.max_documents == 0 {
            return Err(Error::InvalidConfig("max_documents must be > 0".into()));
        }
        if self.string_buckets.is_empty() {
            return Err(Error::InvalidConfig("string_buckets must not be empty".into()));
        }
        if self.string_buckets.windows(2).any(|w| w[0] >= w[1]) || self.string_buckets[0] == 0 {
            return Err(Error::InvalidConfig(
                "string_buckets must be non-zero and strictly ascending".into(),
            ));
        }
        if self.arrays.element_sample_cap == 0 {
            return Err(Error::InvalidConfig("arrays.element_sample_cap must be > 0".into()));
        }
        for (name, value) in [
            ("relationships.min_share_percentage", self.relationships.min_share_percentage),
            ("relationships.max_reuse_ratio", self.relationships.max_reuse_ratio),
            ("cluster_similarity", self.cluster_similarity),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(Error::InvalidConfig(format!("{name} must be within 0..=1, got {value}")));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(InferenceConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_toml() {
        let config = InferenceConfig::from_toml_str(
            r#"
            max_documents = 500
            nested_objects = "flatten"

            [relationships]
            min_share_percentage = 0.25
            "#,
        )
        .unwrap();

        assert_eq!(config.max_documents, 500);
        assert_eq!(config.nested_objects, NestedObjectStrategy::Flatten);
        assert_eq!(config.relationships.min_share_percentage, 0.25);
        // Untouched sections keep their defaults
        assert_eq!(config.relationships.min_unique_for_reuse, 10);
        assert_eq!(config.arrays.element_sample_cap, 10);
    }

    #[test]
    fn test_partial_json() {
        let config = InferenceConfig::from_json_str(r#"{"string_buckets": [10, 20]}"#).unwrap();
        assert_eq!(config.string_buckets, vec![10, 20]);
        assert_eq!(config.max_documents, 100);
    }

    #[test]
    fn test_rejects_unsorted_buckets() {
        let config = InferenceConfig {
            string_buckets: vec![100, 50],
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_rejects_ratio_out_of_range() {
        let mut config = InferenceConfig::default();
        config.relationships.max_reuse_ratio = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_keyword_match_is_case_insensitive() {
        let words = keywords(&["tag"]);
        assert!(matches_keyword("ProductTags", &words));
        assert!(!matches_keyword("colors", &words));
    }
}
