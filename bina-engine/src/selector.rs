use std::cmp::Reverse;
use std::collections::HashSet;

use content_utils::{Catalog, Item, Topic};
use rand::Rng;
use rand::seq::{IndexedRandom, SliceRandom};
use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::distractors::Question;
use crate::mastery::MasteryState;

/// What a learner can ask to practice: one of the content pools, or a virtual topic built from their
/// own state.
#[derive(
    Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, Ord, PartialOrd, tsify::Tsify,
)]
#[tsify(into_wasm_abi, from_wasm_abi)]
#[serde(rename_all = "camelCase")]
pub enum SessionTopic {
    Vocabulary,
    Analogies,
    Quantitative,
    English,
    Custom,
    Favorites,
    WeakPoints,
    /// Biased towards the learner's weakest category.
    Smart,
    /// A timed multiple-choice exam drawn across topics.
    Marathon,
}

impl SessionTopic {
    pub fn fixed_topic(&self) -> Option<Topic> {
        match self {
            SessionTopic::Vocabulary => Some(Topic::Vocabulary),
            SessionTopic::Analogies => Some(Topic::Analogies),
            SessionTopic::Quantitative => Some(Topic::Quantitative),
            SessionTopic::English => Some(Topic::English),
            _ => None,
        }
    }

    /// Swipe sessions show flashcards; the rest are exams.
    pub fn is_swipe(&self) -> bool {
        !matches!(self, SessionTopic::Marathon)
    }

    pub fn label(&self) -> &'static str {
        match self {
            SessionTopic::Vocabulary => "אוצר מילים",
            SessionTopic::Analogies => "אנלוגיות",
            SessionTopic::Quantitative => "חשיבה כמותית",
            SessionTopic::English => "אנגלית",
            SessionTopic::Custom => "הרשימה שלי",
            SessionTopic::Favorites => "מועדפים",
            SessionTopic::WeakPoints => "חיזוק חולשות",
            SessionTopic::Smart => "תרגול חכם",
            SessionTopic::Marathon => "מרתון",
        }
    }
}

impl From<Topic> for SessionTopic {
    fn from(topic: Topic) -> Self {
        match topic {
            Topic::Vocabulary => SessionTopic::Vocabulary,
            Topic::Analogies => SessionTopic::Analogies,
            Topic::Quantitative => SessionTopic::Quantitative,
            Topic::English => SessionTopic::English,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, tsify::Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
#[serde(tag = "mode", content = "items", rename_all = "camelCase")]
pub enum ItemSet {
    Cards(Vec<Item>),
    Exam(Vec<Question>),
}

impl ItemSet {
    pub fn len(&self) -> usize {
        match self {
            ItemSet::Cards(items) => items.len(),
            ItemSet::Exam(questions) => questions.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn item(&self, index: usize) -> Option<&Item> {
        match self {
            ItemSet::Cards(items) => items.get(index),
            ItemSet::Exam(questions) => questions.get(index).map(|question| &question.item),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, tsify::Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
#[serde(rename_all = "camelCase")]
pub struct Selection {
    pub requested: SessionTopic,
    /// Differs from `requested` only for smart sessions.
    pub resolved: SessionTopic,
    pub items: ItemSet,
}

/// Picks the items for one session. An empty pool gives an empty item set, never an error.
pub fn select_session(
    topic: SessionTopic,
    state: &MasteryState,
    catalog: &Catalog,
    config: &EngineConfig,
    rng: &mut impl Rng,
) -> Selection {
    let resolved = match topic {
        SessionTopic::Smart => resolve_smart(state, catalog, config, rng),
        other => other,
    };

    let items = match resolved {
        SessionTopic::Marathon => ItemSet::Exam(marathon(catalog, config, rng)),
        swipe => {
            let mut cards = cards_for(swipe, state, catalog);
            cards.shuffle(rng);
            ItemSet::Cards(cards)
        }
    };

    log::info!(
        "Selected {} items for {topic:?} (resolved to {resolved:?})",
        items.len()
    );
    Selection {
        requested: topic,
        resolved,
        items,
    }
}

fn cards_for(topic: SessionTopic, state: &MasteryState, catalog: &Catalog) -> Vec<Item> {
    if let Some(topic) = topic.fixed_topic() {
        return catalog.pool(topic).to_vec();
    }
    match topic {
        SessionTopic::Custom => unique_by_id(state.custom_list.iter()),
        SessionTopic::Favorites => {
            unique_by_id(catalog.all_items().filter(|item| state.is_favorite(&item.id)))
        }
        SessionTopic::WeakPoints => state.weak_points.iter().cloned().collect(),
        _ => Vec::new(),
    }
}

/// Keeps the first item for each id. Ids are only unique within one pool, and a session matches
/// answers by id.
fn unique_by_id<'a>(items: impl IntoIterator<Item = &'a Item>) -> Vec<Item> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|&item| seen.insert(item.id.as_str()))
        .cloned()
        .collect()
}

/// Resolves a smart session to a concrete topic.
///
/// Categories with errors come first, most errors first, ties by name. The first one some catalog
/// item belongs to wins. With no usable category, weak points are reviewed with a fixed
/// probability; otherwise one of the four content topics is drawn uniformly.
///
/// The tier is not consulted here: a paid topic is still the answer, and the gate turns it down.
pub fn resolve_smart(
    state: &MasteryState,
    catalog: &Catalog,
    config: &EngineConfig,
    rng: &mut impl Rng,
) -> SessionTopic {
    // OrdMap iterates by name, and the sort is stable
    let mut weakest: Vec<(&String, u32)> = state
        .category_errors
        .iter()
        .filter(|(_, errors)| **errors > 0)
        .map(|(category, errors)| (category, *errors))
        .collect();
    weakest.sort_by_key(|(_, errors)| Reverse(*errors));

    for (category, errors) in weakest {
        match catalog.topic_of_category(category) {
            Some(topic) => {
                log::debug!("Smart session targets {category} ({errors} errors) in {topic}");
                return topic.into();
            }
            None => log::debug!("Skipping {category}: no catalog item has it"),
        }
    }

    let probability = config.smart_weak_points_probability;
    let probability = if (0.0..=1.0).contains(&probability) {
        probability
    } else {
        log::warn!("Ignoring weak points probability {probability}");
        0.0
    };
    if !state.weak_points.is_empty() && rng.random_bool(probability) {
        return SessionTopic::WeakPoints;
    }

    Topic::ALL
        .choose(rng)
        .copied()
        .map(SessionTopic::from)
        .unwrap_or(SessionTopic::Vocabulary)
}

/// A fixed-size exam drawn across all four topics, each item turned into a question.
fn marathon(catalog: &Catalog, config: &EngineConfig, rng: &mut impl Rng) -> Vec<Question> {
    let candidates = unique_by_id(Topic::ALL.into_iter().flat_map(|topic| catalog.pool(topic)));
    let mut picked: Vec<Item> = candidates
        .choose_multiple(rng, config.marathon_size)
        .cloned()
        .collect();
    picked.shuffle(rng);
    picked
        .into_iter()
        .map(|item| {
            let topic = item.topic;
            Question::new(
                item,
                catalog.pool(topic),
                config.max_options,
                rng,
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mastery::Tier;
    use content_utils::TopicMap;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn item(id: &str, category: &str, topic: Topic) -> Item {
        Item {
            id: id.to_string(),
            display_term: format!("term {id}"),
            definition: format!("answer {id}"),
            example: String::new(),
            category: category.to_string(),
            topic,
            difficulty: None,
            question: None,
            correct_answer: None,
        }
    }

    fn catalog() -> Catalog {
        let pool = |prefix: &str, category: &str, topic: Topic| {
            (0..12)
                .map(|n| item(&format!("{prefix}{n}"), category, topic))
                .collect::<Vec<_>>()
        };
        Catalog::from_pools(TopicMap {
            vocabulary: pool("v", "Vocabulary", Topic::Vocabulary),
            analogies: pool("a", "Analogies", Topic::Analogies),
            quantitative: pool("q", "Algebra", Topic::Quantitative),
            english: pool("e", "English", Topic::English),
        })
        .unwrap()
    }

    fn with_errors(errors: &[(&str, u32)]) -> MasteryState {
        let mut state = MasteryState {
            tier: Tier::Plus,
            ..MasteryState::default()
        };
        for (category, count) in errors {
            state.category_totals.insert(category.to_string(), count + 3);
            state.category_errors.insert(category.to_string(), *count);
        }
        state
    }

    #[test]
    fn test_smart_favors_the_weakest_category() {
        let state = with_errors(&[("Vocabulary", 5), ("English", 1)]);
        let catalog = catalog();
        for seed in 0..10 {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let selection = select_session(
                SessionTopic::Smart,
                &state,
                &catalog,
                &EngineConfig::default(),
                &mut rng,
            );
            assert_eq!(selection.resolved, SessionTopic::Vocabulary);
            assert_eq!(selection.requested, SessionTopic::Smart);
            assert_eq!(selection.items.len(), 12);
        }
    }

    #[test]
    fn test_smart_ties_break_by_name() {
        let state = with_errors(&[("English", 4), ("Analogies", 4)]);
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let topic = resolve_smart(&state, &catalog(), &EngineConfig::default(), &mut rng);
        assert_eq!(topic, SessionTopic::Analogies);
    }

    #[test]
    fn test_smart_ignores_the_tier() {
        let mut state = with_errors(&[("Algebra", 9), ("Analogies", 2)]);
        state.tier = Tier::Free;
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let topic = resolve_smart(&state, &catalog(), &EngineConfig::default(), &mut rng);
        assert_eq!(topic, SessionTopic::Quantitative);
    }

    #[test]
    fn test_smart_skips_categories_no_item_has() {
        let state = with_errors(&[("Retired", 9), ("English", 2)]);
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let topic = resolve_smart(&state, &catalog(), &EngineConfig::default(), &mut rng);
        assert_eq!(topic, SessionTopic::English);
    }

    #[test]
    fn test_smart_without_signals_uses_weak_points_or_a_random_topic() {
        let catalog = catalog();
        let mut state = MasteryState::default();
        state
            .weak_points
            .push_back(item("v1", "Vocabulary", Topic::Vocabulary));

        let always = EngineConfig {
            smart_weak_points_probability: 1.0,
            ..EngineConfig::default()
        };
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        assert_eq!(
            resolve_smart(&state, &catalog, &always, &mut rng),
            SessionTopic::WeakPoints
        );

        let never = EngineConfig {
            smart_weak_points_probability: 0.0,
            ..EngineConfig::default()
        };
        let drawn: HashSet<SessionTopic> = (0..40)
            .map(|seed| {
                let mut rng = ChaCha8Rng::seed_from_u64(seed);
                resolve_smart(&state, &catalog, &never, &mut rng)
            })
            .collect();
        assert!(drawn.iter().all(|topic| topic.fixed_topic().is_some()));
        assert!(drawn.contains(&SessionTopic::Quantitative) || drawn.contains(&SessionTopic::English));
    }

    #[test]
    fn test_virtual_topics_resolve_to_learner_state() {
        let catalog = catalog();
        let mut state = MasteryState::default();
        state.favorites.insert("a3".to_string());
        state.favorites.insert("e7".to_string());
        state.favorites.insert("missing".to_string());
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let config = EngineConfig::default();

        let favorites = select_session(SessionTopic::Favorites, &state, &catalog, &config, &mut rng);
        let mut ids: Vec<_> = match favorites.items {
            ItemSet::Cards(items) => items.into_iter().map(|item| item.id).collect(),
            ItemSet::Exam(_) => panic!("favorites are cards"),
        };
        ids.sort();
        assert_eq!(ids, vec!["a3", "e7"]);

        let custom = select_session(SessionTopic::Custom, &state, &catalog, &config, &mut rng);
        assert!(custom.items.is_empty());

        state.custom_list.push_back(item("w", "Words", Topic::Vocabulary));
        state.custom_list.push_back(item("w", "Words", Topic::Vocabulary));
        state.custom_list.push_back(item("x", "Words", Topic::Vocabulary));
        let custom = select_session(SessionTopic::Custom, &state, &catalog, &config, &mut rng);
        assert_eq!(custom.items.len(), 2);
        let weak = select_session(SessionTopic::WeakPoints, &state, &catalog, &config, &mut rng);
        assert!(weak.items.is_empty());
    }

    #[test]
    fn test_swipe_sets_are_shuffled_deterministically() {
        let catalog = catalog();
        let state = MasteryState::default();
        let config = EngineConfig::default();
        let run = |seed| {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            select_session(SessionTopic::Vocabulary, &state, &catalog, &config, &mut rng).items
        };
        assert_eq!(run(11), run(11));
        assert_ne!(run(11), ItemSet::Cards(catalog.pool(Topic::Vocabulary).to_vec()));
    }

    #[test]
    fn test_favorites_keep_one_item_per_id() {
        let shared = |topic: Topic| vec![item("shared", &format!("{topic}"), topic)];
        let catalog = Catalog::from_pools(TopicMap::from_fn(shared)).unwrap();
        let mut state = MasteryState::default();
        state.favorites.insert("shared".to_string());
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let config = EngineConfig::default();

        let favorites = select_session(SessionTopic::Favorites, &state, &catalog, &config, &mut rng);
        assert_eq!(favorites.items.len(), 1);
        let marathon = select_session(SessionTopic::Marathon, &state, &catalog, &config, &mut rng);
        assert_eq!(marathon.items.len(), 1);
    }

    #[test]
    fn test_marathon_draws_from_every_topic() {
        let catalog = catalog();
        let state = MasteryState::default();
        let topics: HashSet<Topic> = (0..10)
            .flat_map(|seed| {
                let mut rng = ChaCha8Rng::seed_from_u64(seed);
                let selection = select_session(
                    SessionTopic::Marathon,
                    &state,
                    &catalog,
                    &EngineConfig::default(),
                    &mut rng,
                );
                let ItemSet::Exam(questions) = selection.items else {
                    panic!("marathon is an exam");
                };
                questions.into_iter().map(|question| question.item.topic)
            })
            .collect();
        assert_eq!(topics.len(), 4);
    }

    #[test]
    fn test_marathon_is_a_fixed_size_exam() {
        let catalog = catalog();
        let state = MasteryState::default();
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let selection = select_session(
            SessionTopic::Marathon,
            &state,
            &catalog,
            &EngineConfig::default(),
            &mut rng,
        );
        let ItemSet::Exam(questions) = selection.items else {
            panic!("marathon is an exam");
        };
        assert_eq!(questions.len(), 20);
        for question in &questions {
            assert_eq!(question.options.len(), 4);
            assert!(question.correct_index().is_some());
            for option in &question.options {
                let source = catalog
                    .pool(question.item.topic)
                    .iter()
                    .find(|item| item.answer() == option)
                    .unwrap();
                assert_eq!(source.category, question.item.category);
            }
        }
    }
}
