use bina_engine::mastery::{MasteryState, WEAK_POINTS_CAPACITY};
use bina_engine::recorder::{Activity, ActivityKind, record_answer};
use bina_engine::weak_points::record_miss;
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use content_utils::{Item, Topic};
use proptest::prelude::*;

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap()
}

fn swipe(date: NaiveDate, category: &str, correct: bool) -> Activity {
    Activity::new(ActivityKind::Swipe, date)
        .with_xp(10)
        .in_category(category)
        .answered(correct)
}

fn item(n: u8) -> Item {
    Item {
        id: format!("w{n}"),
        display_term: format!("word {n}"),
        definition: format!("meaning {n}"),
        example: String::new(),
        category: "Vocabulary".to_string(),
        topic: Topic::Vocabulary,
        difficulty: None,
        question: None,
        correct_answer: None,
    }
}

proptest! {
    #[test]
    fn streak_counts_consecutive_days(gaps in prop::collection::vec(0i64..4, 1..30)) {
        let mut state = MasteryState::default();
        let mut now = start();
        let mut expected = 0u32;
        for (n, gap) in gaps.iter().enumerate() {
            now += Duration::days(*gap);
            expected = match (n, *gap) {
                (0, _) => 1,
                (_, 0) => expected,
                (_, 1) => expected + 1,
                _ => 1,
            };
            state = record_answer(state, swipe(now.date_naive(), "Vocabulary", true), now).state;
            prop_assert_eq!(state.streak_count(), expected);
        }
    }

    #[test]
    fn same_day_activity_keeps_the_streak(count in 1usize..40) {
        let now = start();
        let mut state = record_answer(MasteryState::default(), swipe(now.date_naive(), "Vocabulary", true), now).state;
        let streak = state.streak.clone();
        for n in 0..count {
            let at = now + Duration::minutes(n as i64);
            state = record_answer(state, swipe(at.date_naive(), "Analogies", n % 2 == 0), at).state;
        }
        prop_assert_eq!(state.streak, streak);
    }

    #[test]
    fn errors_never_exceed_totals(answers in prop::collection::vec((0usize..3, any::<bool>()), 0..60)) {
        let categories = ["Vocabulary", "Analogies", "Algebra"];
        let now = start();
        let mut state = MasteryState::default();
        for (category, correct) in answers {
            state = record_answer(state, swipe(now.date_naive(), categories[category], correct), now).state;
        }
        for (category, errors) in state.category_errors.iter() {
            let totals = state.category_totals.get(category).copied().unwrap_or(0);
            prop_assert!(*errors <= totals, "{category}: {errors} > {totals}");
        }
        prop_assert!(state.check_invariants().is_ok());
    }

    #[test]
    fn weak_points_stay_bounded_and_unique(misses in prop::collection::vec(0u8..40, 0..100)) {
        let now = start();
        let mut state = MasteryState::default();
        for n in &misses {
            state = record_miss(state, &item(*n), now);
        }
        prop_assert!(state.weak_points.len() <= WEAK_POINTS_CAPACITY);
        let mut ids: Vec<&str> = state.weak_points.iter().map(|item| item.id.as_str()).collect();
        ids.sort();
        let len = ids.len();
        ids.dedup();
        prop_assert_eq!(ids.len(), len);
        if let Some(last) = misses.last() {
            let expected = format!("w{last}");
            prop_assert!(state.has_weak_point(&expected));
        }
    }

    #[test]
    fn daily_swipes_never_exceed_questions(kinds in prop::collection::vec(0u8..3, 0..50)) {
        let now = start();
        let today = now.date_naive();
        let mut state = MasteryState::default();
        for kind in kinds {
            let kind = match kind {
                0 => ActivityKind::Swipe,
                1 => ActivityKind::Question,
                _ => ActivityKind::Bookkeeping,
            };
            state = record_answer(state, Activity::new(kind, today).with_xp(1), now).state;
        }
        prop_assert!(state.swipes_on(today) <= state.questions_on(today));
    }
}
