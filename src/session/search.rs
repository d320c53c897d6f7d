//! Categorized substring search over a session's entity catalog.
//!
//! Recomputed from scratch on every query; catalogs are small enough that
//! no index is kept.

use serde::{Deserialize, Serialize};

use super::catalog::EntityCatalog;

/// One match. `source_key` is the label or relationship type the entity was
/// listed under (`None` for property keys), `index` its position in that
/// list and `value` the text that matched.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SearchHit<T> {
    pub source_key: Option<String>,
    pub index: usize,
    pub value: String,
    pub entity: T,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResults {
    #[serde(default)]
    pub node_matches: Vec<SearchHit<String>>,
    #[serde(default)]
    pub relationship_matches: Vec<SearchHit<(String, String)>>,
    #[serde(default)]
    pub property_key_matches: Vec<SearchHit<String>>,
}

impl SearchResults {
    pub fn is_empty(&self) -> bool {
        self.node_matches.is_empty()
            && self.relationship_matches.is_empty()
            && self.property_key_matches.is_empty()
    }

    pub fn total(&self) -> usize {
        self.node_matches.len() + self.relationship_matches.len() + self.property_key_matches.len()
    }
}

fn matches(haystack: &str, needle_lower: &str) -> bool {
    haystack.to_lowercase().contains(needle_lower)
}

/// Search node summaries, relationship endpoint pairs and property keys.
///
/// A blank query resets: all three lists come back empty. Otherwise the
/// query is matched as typed, surrounding whitespace included.
pub fn search(query: &str, catalog: &EntityCatalog) -> SearchResults {
    if query.trim().is_empty() {
        return SearchResults::default();
    }
    let lowered = query.to_lowercase();
    let needle = lowered.as_str();

    let node_matches = catalog
        .node_entities
        .iter()
        .flat_map(|(label, summaries)| {
            summaries.iter().enumerate().filter_map(move |(index, summary)| {
                matches(summary, needle).then(|| SearchHit {
                    source_key: Some(label.clone()),
                    index,
                    value: summary.clone(),
                    entity: summary.clone(),
                })
            })
        })
        .collect();

    let relationship_matches = catalog
        .relationship_entities
        .iter()
        .flat_map(|(rel_type, pairs)| {
            pairs.iter().enumerate().filter_map(move |(index, pair)| {
                let joined = format!("{} {}", pair.0, pair.1);
                matches(&joined, needle).then(|| SearchHit {
                    source_key: Some(rel_type.clone()),
                    index,
                    value: joined,
                    entity: pair.clone(),
                })
            })
        })
        .collect();

    let property_key_matches = catalog
        .property_keys
        .iter()
        .enumerate()
        .filter(|(_, key)| matches(key, needle))
        .map(|(index, key)| SearchHit {
            source_key: None,
            index,
            value: key.clone(),
            entity: key.clone(),
        })
        .collect();

    SearchResults { node_matches, relationship_matches, property_key_matches }
}
