//! Email categories and the per-category likelihood scores returned by classification.

use std::fmt;

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

/// The closed set of categories that have a dedicated extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// A prospective, promotional email.
    Commercial,
    /// An invoice or a bill for a sold service or product.
    Bill,
    /// A regular conversation between humans.
    Conversation,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Commercial, Category::Bill, Category::Conversation];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Commercial => "commercial",
            Category::Bill => "bill",
            Category::Conversation => "conversation",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == label)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A score key as emitted by the backend.
///
/// Backends sometimes add labels of their own next to the three required
/// ones; those are kept so that the argmax stays faithful to the answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Label {
    Known(Category),
    Unrecognized(String),
}

impl Label {
    pub fn parse(label: &str) -> Self {
        match Category::from_label(label) {
            Some(category) => Label::Known(category),
            None => Label::Unrecognized(label.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Label::Known(category) => category.as_str(),
            Label::Unrecognized(label) => label,
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Likelihood per label, in the order the backend listed them.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CategoryScore {
    entries: Vec<(Label, f64)>,
}

impl CategoryScore {
    /// Build from a classification answer that already passed schema validation.
    ///
    /// Returns `None` unless the value is a mapping holding a number for every
    /// known category. Non-numeric extra labels are dropped.
    pub fn from_value(value: &Value) -> Option<Self> {
        let map = value.as_object()?;
        let entries: Vec<(Label, f64)> = map
            .iter()
            .filter_map(|(label, score)| Some((Label::parse(label), score.as_f64()?)))
            .collect();

        let score = Self { entries };
        Category::ALL
            .iter()
            .all(|&c| score.get(c).is_some())
            .then_some(score)
    }

    pub fn get(&self, category: Category) -> Option<f64> {
        self.entries
            .iter()
            .find(|(label, _)| *label == Label::Known(category))
            .map(|(_, score)| *score)
    }

    pub fn entries(&self) -> &[(Label, f64)] {
        &self.entries
    }

    /// The highest-scoring label. On a tie, the label listed first wins.
    pub fn best(&self) -> Option<&Label> {
        let mut best: Option<&(Label, f64)> = None;
        for entry in &self.entries {
            if best.is_none_or(|b| entry.1 > b.1) {
                best = Some(entry);
            }
        }
        best.map(|(label, _)| label)
    }
}

impl Serialize for CategoryScore {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (label, score) in &self.entries {
            map.serialize_entry(label.as_str(), score)?;
        }
        map.end()
    }
}
