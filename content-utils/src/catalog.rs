use std::collections::BTreeMap;
use std::path::Path;

use rustc_hash::FxHashMap;

use crate::{Difficulty, Item, Topic, TopicMap};

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },
    #[error("item id {id:?} appears more than once in the {topic} pool")]
    DuplicateId { topic: Topic, id: String },
}

/// An entry as it appears in a topic file. The topic comes from the file it was read from.
#[derive(serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct CatalogEntry {
    id: String,
    #[serde(alias = "word")]
    display_term: String,
    #[serde(default)]
    definition: String,
    #[serde(default)]
    example: String,
    category: String,
    #[serde(default)]
    difficulty: Option<Difficulty>,
    #[serde(default)]
    question: Option<String>,
    #[serde(default)]
    correct_answer: Option<String>,
}

impl CatalogEntry {
    fn into_item(self, topic: Topic) -> Item {
        Item {
            id: self.id,
            display_term: self.display_term,
            definition: self.definition,
            example: self.example,
            category: self.category,
            topic,
            difficulty: self.difficulty,
            question: self.question,
            correct_answer: self.correct_answer,
        }
    }
}

/// Read-only pools of items, one per topic.
#[derive(Clone, Debug, Default)]
pub struct Catalog {
    pools: TopicMap<Vec<Item>>,
    by_id: FxHashMap<(Topic, String), usize>,
}

impl Catalog {
    pub fn from_pools(pools: TopicMap<Vec<Item>>) -> Result<Self, CatalogError> {
        let mut by_id = FxHashMap::default();
        for (topic, pool) in pools.iter() {
            for (index, item) in pool.iter().enumerate() {
                if by_id.insert((topic, item.id.clone()), index).is_some() {
                    return Err(CatalogError::DuplicateId {
                        topic,
                        id: item.id.clone(),
                    });
                }
            }
        }
        // items always carry the topic of the pool they live in
        let pools = pools.map(|topic, pool| {
            pool.into_iter()
                .map(|item| Item { topic, ..item })
                .collect()
        });
        Ok(Self { pools, by_id })
    }

    /// Loads `<topic>.json` for every topic from `dir`. A missing file is an empty pool.
    pub fn load_dir(dir: &Path) -> Result<Self, CatalogError> {
        let mut pools: TopicMap<Vec<Item>> = TopicMap::default();
        for topic in Topic::ALL {
            let path = dir.join(format!("{}.json", topic.file_stem()));
            if !path.exists() {
                log::warn!("No catalog file for {topic} at {}", path.display());
                continue;
            }
            let text = std::fs::read_to_string(&path).map_err(|source| CatalogError::Io {
                path: path.display().to_string(),
                source,
            })?;
            let entries: Vec<CatalogEntry> =
                serde_json::from_str(&text).map_err(|source| CatalogError::Parse {
                    path: path.display().to_string(),
                    source,
                })?;
            log::info!("Loaded {} {topic} items", entries.len());
            *pools.get_mut(&topic) = entries
                .into_iter()
                .map(|entry| entry.into_item(topic))
                .collect();
        }
        Self::from_pools(pools)
    }

    /// Parses one JSON object keyed by topic, e.g. `{"vocabulary": [...], "english": [...]}`.
    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let entries: BTreeMap<Topic, Vec<CatalogEntry>> =
            serde_json::from_str(json).map_err(|source| CatalogError::Parse {
                path: "<inline>".to_string(),
                source,
            })?;
        let mut pools: TopicMap<Vec<Item>> = TopicMap::default();
        for (topic, entries) in entries {
            *pools.get_mut(&topic) = entries
                .into_iter()
                .map(|entry| entry.into_item(topic))
                .collect();
        }
        Self::from_pools(pools)
    }

    pub fn pool(&self, topic: Topic) -> &[Item] {
        self.pools.get(&topic)
    }

    pub fn pools(&self) -> &TopicMap<Vec<Item>> {
        &self.pools
    }

    /// Every item of every topic, topic by topic in declaration order.
    pub fn all_items(&self) -> impl Iterator<Item = &Item> {
        self.pools.values().flatten()
    }

    pub fn len(&self) -> usize {
        self.pools.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, topic: Topic, id: &str) -> Option<&Item> {
        let index = self.by_id.get(&(topic, id.to_string()))?;
        self.pools.get(&topic).get(*index)
    }

    /// First item with this id in any pool, searching topics in declaration order.
    pub fn find(&self, id: &str) -> Option<&Item> {
        Topic::ALL.iter().find_map(|topic| self.get(*topic, id))
    }

    /// The topic owning a category: the first pool that contains an item of that category.
    pub fn topic_of_category(&self, category: &str) -> Option<Topic> {
        self.pools
            .iter()
            .find(|(_, pool)| pool.iter().any(|item| item.category == category))
            .map(|(topic, _)| topic)
    }

    /// Items of this category across all topics.
    pub fn items_in_category<'a>(&'a self, category: &'a str) -> impl Iterator<Item = &'a Item> {
        self.all_items().filter(move |item| item.category == category)
    }
}
