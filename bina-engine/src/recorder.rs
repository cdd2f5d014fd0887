use chrono::{DateTime, NaiveDate, Utc};
use im::OrdMap;
use serde::{Deserialize, Serialize};

use crate::achievements::Achievement;
use crate::mastery::{MasteryEvent, MasteryState, Streak};

/// Which daily counters an activity counts toward.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum ActivityKind {
    /// A flashcard swipe. Counts as a question and against the free daily swipe cap.
    Swipe,
    /// A multiple-choice answer.
    Question,
    /// XP or error bookkeeping that is not a fresh interaction, e.g. the small award for a miss.
    Bookkeeping,
}

/// One practice event as seen by the recorder.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub xp: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub was_correct: Option<bool>,
    pub kind: ActivityKind,
    /// The learner's calendar day the activity belongs to.
    pub date: NaiveDate,
}

impl Activity {
    pub fn new(kind: ActivityKind, date: NaiveDate) -> Self {
        Self {
            xp: 0,
            category: None,
            was_correct: None,
            kind,
            date,
        }
    }

    pub fn with_xp(self, xp: u32) -> Self {
        Self { xp, ..self }
    }

    pub fn in_category(self, category: impl Into<String>) -> Self {
        Self {
            category: Some(category.into()),
            ..self
        }
    }

    pub fn answered(self, was_correct: bool) -> Self {
        Self {
            was_correct: Some(was_correct),
            ..self
        }
    }
}

/// The outcome of recording an activity: the new state, and the achievements it unlocked.
///
/// `unlocked` is a one-time notification for the presentation layer. Nothing in the engine reads it.
#[derive(Clone, Debug, PartialEq)]
pub struct Recorded {
    pub state: MasteryState,
    pub unlocked: Vec<Achievement>,
}

/// Records one practice event. The only way XP, streaks, category counters and daily counters change.
pub fn record_answer(state: MasteryState, activity: Activity, now: DateTime<Utc>) -> Recorded {
    let before = state.achievements.clone();
    let state = state.apply_at(now, MasteryEvent::Activity(activity));
    let unlocked = unlocked_since(&before, &state);
    Recorded { state, unlocked }
}

pub(crate) fn unlocked_since(
    before: &im::OrdSet<Achievement>,
    state: &MasteryState,
) -> Vec<Achievement> {
    state
        .achievements
        .iter()
        .filter(|achievement| !before.contains(achievement))
        .copied()
        .collect()
}

impl MasteryState {
    pub(crate) fn with_activity(mut self, activity: &Activity) -> Self {
        self.xp = self.xp.saturating_add(u64::from(activity.xp));

        if let Some(category) = &activity.category {
            increment(&mut self.category_totals, category);
            if activity.was_correct == Some(false) {
                increment(&mut self.category_errors, category);
            }
        }

        self.streak = Some(continue_streak(self.streak.take(), activity.date));

        match self.daily_reset_date {
            Some(reset) if reset > activity.date => {
                // Late event from an earlier day; today's counters belong to a newer day.
                log::debug!("Activity dated {} predates daily counters of {reset}", activity.date);
                return self;
            }
            Some(reset) if reset == activity.date => {}
            _ => {
                self.daily_reset_date = Some(activity.date);
                self.daily_question_count = 0;
                self.daily_swipe_count = 0;
            }
        }
        match activity.kind {
            ActivityKind::Swipe => {
                self.daily_swipe_count = self.daily_swipe_count.saturating_add(1);
                self.daily_question_count = self.daily_question_count.saturating_add(1);
            }
            ActivityKind::Question => {
                self.daily_question_count = self.daily_question_count.saturating_add(1);
            }
            ActivityKind::Bookkeeping => {}
        }
        self
    }
}

fn increment(counts: &mut OrdMap<String, u32>, key: &str) {
    let count = counts.get(key).copied().unwrap_or(0);
    counts.insert(key.to_string(), count.saturating_add(1));
}

/// Same day: unchanged. Next day: one longer. Any later day: back to 1.
fn continue_streak(streak: Option<Streak>, today: NaiveDate) -> Streak {
    let fresh = Streak {
        count: 1,
        last_active_date: today,
    };
    let Some(streak) = streak else {
        return fresh;
    };
    match (today - streak.last_active_date).num_days() {
        days if days <= 0 => streak,
        1 => Streak {
            count: streak.count.saturating_add(1),
            last_active_date: today,
        },
        _ => fresh,
    }
}
