pub mod catalog;
pub mod explain;
pub mod text_cleanup;

pub use catalog::{Catalog, CatalogError};

use enumap::EnuMap;

/// The four content pools every learner can practice.
#[derive(
    Clone,
    Copy,
    Debug,
    serde::Serialize,
    serde::Deserialize,
    Hash,
    Eq,
    PartialEq,
    Ord,
    PartialOrd,
    tsify::Tsify,
    schemars::JsonSchema,
    EnuMap,
)]
#[tsify(into_wasm_abi, from_wasm_abi)]
#[serde(rename_all = "camelCase")]
pub enum Topic {
    Vocabulary,
    Analogies,
    Quantitative,
    English,
}

impl Topic {
    /// File stem used when loading a catalog directory.
    pub fn file_stem(&self) -> &'static str {
        match self {
            Topic::Vocabulary => "vocabulary",
            Topic::Analogies => "analogies",
            Topic::Quantitative => "quantitative",
            Topic::English => "english",
        }
    }
}

impl std::fmt::Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.file_stem())
    }
}

#[derive(
    Clone,
    Copy,
    Debug,
    serde::Serialize,
    serde::Deserialize,
    Hash,
    Eq,
    PartialEq,
    Ord,
    PartialOrd,
    tsify::Tsify,
    schemars::JsonSchema,
)]
#[tsify(into_wasm_abi, from_wasm_abi)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

/// One piece of content: a word, an analogy, a question.
///
/// Items are loaded once and never mutated. `id` is unique within its topic pool.
#[derive(
    Clone,
    Debug,
    serde::Serialize,
    serde::Deserialize,
    Eq,
    PartialEq,
    Ord,
    PartialOrd,
    Hash,
    tsify::Tsify,
    schemars::JsonSchema,
)]
#[tsify(into_wasm_abi, from_wasm_abi)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: String,
    #[serde(alias = "word")]
    pub display_term: String,
    #[serde(default)]
    pub definition: String,
    #[serde(default)]
    pub example: String,
    /// Sub-category used both for error tracking and for distractor pools.
    pub category: String,
    pub topic: Topic,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<Difficulty>,
    /// Question stem, for items that are not a plain term/definition pair.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correct_answer: Option<String>,
}

impl Item {
    /// The text of the right answer when the item is asked as a question.
    pub fn answer(&self) -> &str {
        self.correct_answer.as_deref().unwrap_or(&self.definition)
    }

    /// What the learner is shown.
    pub fn prompt(&self) -> &str {
        self.question.as_deref().unwrap_or(&self.display_term)
    }
}
