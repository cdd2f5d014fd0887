use bina_engine::config::EngineConfig;
use bina_engine::distractors::generate_options;
use bina_engine::mastery::{MasteryState, Tier};
use bina_engine::selector::{SessionTopic, resolve_smart};
use content_utils::text_cleanup::normalize_answer;
use content_utils::{Catalog, Item, Topic, TopicMap};
use proptest::prelude::*;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

const CATEGORIES: [&str; 3] = ["Synonyms", "Antonyms", "Idioms"];

fn item(id: usize, category: usize, answer: &str) -> Item {
    Item {
        id: format!("i{id}"),
        display_term: format!("term {id}"),
        definition: answer.to_string(),
        example: String::new(),
        category: CATEGORIES[category].to_string(),
        topic: Topic::Vocabulary,
        difficulty: None,
        question: None,
        correct_answer: None,
    }
}

fn pool_strategy() -> impl Strategy<Value = Vec<Item>> {
    prop::collection::vec((0usize..3, "[a-e]{1,3}"), 1..30).prop_map(|entries| {
        entries
            .into_iter()
            .enumerate()
            .map(|(id, (category, answer))| item(id, category, &answer))
            .collect()
    })
}

fn catalog() -> Catalog {
    let pools = TopicMap::from_fn(|topic: Topic| {
        (0..5)
            .map(|n| Item {
                id: format!("{topic}-{n}"),
                display_term: format!("term {n}"),
                definition: format!("meaning {n}"),
                example: String::new(),
                category: format!("{topic}-category"),
                topic,
                difficulty: None,
                question: None,
                correct_answer: None,
            })
            .collect::<Vec<Item>>()
    });
    Catalog::from_pools(pools).unwrap()
}

proptest! {
    #[test]
    fn options_come_from_the_same_category(
        pool in pool_strategy(),
        pick in any::<prop::sample::Index>(),
        max_options in 1usize..6,
        seed in any::<u64>(),
    ) {
        let correct = pick.get(pool.as_slice()).clone();
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let options = generate_options(&correct, &pool, max_options, &mut rng);

        prop_assert!(!options.is_empty());
        prop_assert!(options.len() <= max_options);
        prop_assert!(options.contains(&correct.definition));
        for option in &options {
            let from_category = pool
                .iter()
                .any(|item| item.category == correct.category && &item.definition == option);
            prop_assert!(from_category, "{option} is not from {}", correct.category);
        }

        let mut normalized: Vec<String> = options.iter().map(|option| normalize_answer(option)).collect();
        normalized.sort();
        let len = normalized.len();
        normalized.dedup();
        prop_assert_eq!(normalized.len(), len);
    }

    #[test]
    fn smart_picks_the_category_with_most_errors(
        errors in prop::collection::vec(0u32..20, 4),
        seed in any::<u64>(),
    ) {
        let catalog = catalog();
        let mut state = MasteryState {
            tier: Tier::Pro,
            ..MasteryState::default()
        };
        for (topic, count) in Topic::ALL.iter().zip(&errors) {
            let category = format!("{topic}-category");
            state.category_totals.insert(category.clone(), count + 1);
            state.category_errors.insert(category, *count);
        }

        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let resolved = resolve_smart(&state, &catalog, &EngineConfig::default(), &mut rng);

        let most = errors.iter().copied().max().unwrap_or(0);
        if most == 0 {
            prop_assert!(resolved.fixed_topic().is_some());
        } else {
            let topic = resolved.fixed_topic().unwrap();
            let index = Topic::ALL.iter().position(|t| *t == topic).unwrap();
            prop_assert_eq!(errors[index], most);
            prop_assert_ne!(resolved, SessionTopic::WeakPoints);
        }
    }
}
