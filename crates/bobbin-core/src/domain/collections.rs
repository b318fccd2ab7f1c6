//! Auxiliary collections: scored sets and string hashes, one document per key.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::adapter::Document;
use crate::ports::Collection;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetMember {
    pub value: String,
    #[serde(default)]
    pub score: f64,
}

impl SetMember {
    pub fn new(value: impl Into<String>, score: f64) -> Self {
        Self {
            value: value.into(),
            score,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetRecord {
    pub id: String,
    #[serde(default)]
    pub members: Vec<SetMember>,
}

impl SetRecord {
    pub fn new(id: impl Into<String>, members: Vec<SetMember>) -> Self {
        Self {
            id: id.into(),
            members,
        }
    }

    pub fn values(&self) -> HashSet<String> {
        self.members.iter().map(|m| m.value.clone()).collect()
    }

    /// Value with the lowest score inside `[from, to]`; ties keep stored order.
    pub fn first_by_lowest_score(&self, from: f64, to: f64) -> Option<&str> {
        self.members
            .iter()
            .filter(|m| m.score >= from && m.score <= to)
            .min_by(|a, b| a.score.total_cmp(&b.score))
            .map(|m| m.value.as_str())
    }
}

impl Document for SetRecord {
    const COLLECTION: Collection = Collection::Sets;

    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashRecord {
    pub id: String,
    #[serde(default)]
    pub fields: HashMap<String, String>,
}

impl HashRecord {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            fields: HashMap::new(),
        }
    }

    /// Overwrite the given fields, keep the rest.
    pub fn merge<I>(&mut self, pairs: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        self.fields.extend(pairs);
    }
}

impl Document for HashRecord {
    const COLLECTION: Collection = Collection::Hashes;

    fn id(&self) -> &str {
        &self.id
    }
}
