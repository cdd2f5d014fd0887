use crate::mastery::MasteryState;

#[derive(
    Copy,
    Clone,
    Debug,
    serde::Serialize,
    serde::Deserialize,
    PartialEq,
    Eq,
    Ord,
    PartialOrd,
    Hash,
    tsify::Tsify,
)]
#[tsify(into_wasm_abi, from_wasm_abi)]
#[serde(rename_all = "snake_case")]
pub enum Achievement {
    FirstSteps,
    Centurion,
    Scholar,
    LevelFive,
    OnFire,
    WeekWarrior,
    Diligent,
    Collector,
}

impl Achievement {
    pub fn id(&self) -> &'static str {
        match self {
            Achievement::FirstSteps => "first_steps",
            Achievement::Centurion => "centurion",
            Achievement::Scholar => "scholar",
            Achievement::LevelFive => "level_five",
            Achievement::OnFire => "on_fire",
            Achievement::WeekWarrior => "week_warrior",
            Achievement::Diligent => "diligent",
            Achievement::Collector => "collector",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Achievement::FirstSteps => "צעד ראשון",
            Achievement::Centurion => "100 XP",
            Achievement::Scholar => "1,000 XP",
            Achievement::LevelFive => "רמה 5",
            Achievement::OnFire => "3 ימים ברצף",
            Achievement::WeekWarrior => "שבוע ברצף",
            Achievement::Diligent => "50 שאלות ביום",
            Achievement::Collector => "10 מועדפים",
        }
    }
}

type Rule = (Achievement, fn(&MasteryState) -> bool);

/// Threshold predicates, checked after every recorded event.
const RULES: &[Rule] = &[
    (Achievement::FirstSteps, |s: &MasteryState| s.total_answers() >= 1),
    (Achievement::Centurion, |s: &MasteryState| s.xp >= 100),
    (Achievement::Scholar, |s: &MasteryState| s.xp >= 1_000),
    (Achievement::LevelFive, |s: &MasteryState| s.level() >= 5),
    (Achievement::OnFire, |s: &MasteryState| s.streak_count() >= 3),
    (Achievement::WeekWarrior, |s: &MasteryState| s.streak_count() >= 7),
    (Achievement::Diligent, |s: &MasteryState| s.daily_question_count >= 50),
    (Achievement::Collector, |s: &MasteryState| s.favorites.len() >= 10),
];

/// Achievements whose rule now holds and that were not unlocked before.
pub fn newly_unlocked(state: &MasteryState) -> Vec<Achievement> {
    RULES
        .iter()
        .filter(|(achievement, _)| !state.achievements.contains(achievement))
        .filter(|(_, rule)| rule(state))
        .map(|(achievement, _)| *achievement)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thresholds() {
        let state = MasteryState {
            xp: 100,
            ..MasteryState::default()
        };
        assert_eq!(newly_unlocked(&state), vec![Achievement::Centurion]);

        let state = MasteryState {
            xp: 2_000,
            ..MasteryState::default()
        };
        assert_eq!(
            newly_unlocked(&state),
            vec![
                Achievement::Centurion,
                Achievement::Scholar,
                Achievement::LevelFive
            ]
        );
    }

    #[test]
    fn test_unlocked_achievements_do_not_fire_again() {
        let mut state = MasteryState {
            xp: 150,
            ..MasteryState::default()
        };
        state.achievements.insert(Achievement::Centurion);
        assert!(newly_unlocked(&state).is_empty());
    }

    #[test]
    fn test_ids_match_serde_names() {
        for (achievement, _) in RULES {
            let json = serde_json::to_value(achievement).unwrap();
            assert_eq!(json, achievement.id());
        }
    }
}
