use chrono::{DateTime, NaiveDate, Utc};
use content_utils::Item;
use im::{OrdMap, OrdSet, Vector};
use journal::data_model::{Event, Timestamped};
use journal::{AppState as _, PartialAppState};
use serde::{Deserialize, Serialize};

use crate::achievements::{self, Achievement};
use crate::recorder::Activity;

pub const XP_PER_LEVEL: u64 = 500;
/// Most recent misses kept for targeted review.
pub const WEAK_POINTS_CAPACITY: usize = 20;

#[derive(
    Copy, Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq, Ord, PartialOrd, Hash, tsify::Tsify,
)]
#[tsify(into_wasm_abi, from_wasm_abi)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    #[default]
    Free,
    Plus,
    Pro,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Streak {
    /// Consecutive calendar days with at least one recorded activity. Always at least 1.
    pub count: u32,
    pub last_active_date: NaiveDate,
}

/// Everything the engine remembers about one learner.
///
/// Serializes to one flat JSON object. Collections are persistent (`im`) so that every update can
/// return a new state cheaply.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct MasteryState {
    pub xp: u64,
    pub streak: Option<Streak>,
    pub category_totals: OrdMap<String, u32>,
    pub category_errors: OrdMap<String, u32>,
    pub daily_question_count: u32,
    pub daily_swipe_count: u32,
    /// Calendar day the daily counters belong to.
    pub daily_reset_date: Option<NaiveDate>,
    pub favorites: OrdSet<String>,
    /// Oldest first.
    pub weak_points: Vector<Item>,
    pub achievements: OrdSet<Achievement>,
    pub tier: Tier,
    pub tier_expiry: Option<DateTime<Utc>>,
    /// Explain every missed question automatically. Paid tiers only.
    pub auto_explain: bool,
    pub credits: u32,
    pub custom_list: Vector<Item>,
}

/// How well the learner does in one category, for the stats screen.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, tsify::Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
#[serde(rename_all = "camelCase")]
pub struct CategoryAccuracy {
    pub category: String,
    pub correct: u32,
    pub total: u32,
    /// Share of answers that were right, from 0 to 1.
    pub accuracy: f64,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InvariantViolation {
    #[error("category {category:?} has {errors} errors but only {totals} answers")]
    ErrorsExceedTotals {
        category: String,
        errors: u32,
        totals: u32,
    },
    #[error("{len} weak points stored, capacity is {}", WEAK_POINTS_CAPACITY)]
    TooManyWeakPoints { len: usize },
    #[error("weak point {id:?} stored twice")]
    DuplicateWeakPoint { id: String },
    #[error("streak count is zero")]
    EmptyStreak,
}

impl MasteryState {
    pub fn level(&self) -> u64 {
        self.xp / XP_PER_LEVEL + 1
    }

    pub fn is_favorite(&self, item_id: &str) -> bool {
        self.favorites.contains(item_id)
    }

    pub fn streak_count(&self) -> u32 {
        self.streak.as_ref().map_or(0, |streak| streak.count)
    }

    pub fn total_answers(&self) -> u32 {
        self.category_totals.values().sum()
    }

    /// Categories with at least one answer, by name.
    pub fn category_accuracy(&self) -> Vec<CategoryAccuracy> {
        self.category_totals
            .iter()
            .filter(|(_, total)| **total > 0)
            .map(|(category, total)| {
                let errors = self.category_errors.get(category).copied().unwrap_or(0);
                let correct = total.saturating_sub(errors);
                CategoryAccuracy {
                    category: category.clone(),
                    correct,
                    total: *total,
                    accuracy: f64::from(correct) / f64::from(*total),
                }
            })
            .collect()
    }

    /// Swipes counted against today's cap. Counters from an earlier day no longer count.
    pub fn swipes_on(&self, today: NaiveDate) -> u32 {
        if self.daily_reset_date == Some(today) {
            self.daily_swipe_count
        } else {
            0
        }
    }

    pub fn questions_on(&self, today: NaiveDate) -> u32 {
        if self.daily_reset_date == Some(today) {
            self.daily_question_count
        } else {
            0
        }
    }

    /// A paid tier whose expiry has passed has lapsed.
    pub fn tier_lapsed(&self, now: DateTime<Utc>) -> bool {
        self.tier_expiry.is_some_and(|expiry| expiry <= now)
    }

    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        for (category, errors) in self.category_errors.iter() {
            let totals = self.category_totals.get(category).copied().unwrap_or(0);
            if *errors > totals {
                return Err(InvariantViolation::ErrorsExceedTotals {
                    category: category.clone(),
                    errors: *errors,
                    totals,
                });
            }
        }
        if self.weak_points.len() > WEAK_POINTS_CAPACITY {
            return Err(InvariantViolation::TooManyWeakPoints {
                len: self.weak_points.len(),
            });
        }
        let mut seen = std::collections::BTreeSet::new();
        for item in self.weak_points.iter() {
            if !seen.insert(item.id.as_str()) {
                return Err(InvariantViolation::DuplicateWeakPoint {
                    id: item.id.clone(),
                });
            }
        }
        if self.streak.as_ref().is_some_and(|streak| streak.count == 0) {
            return Err(InvariantViolation::EmptyStreak);
        }
        Ok(())
    }

    /// Returns the closest state that satisfies every invariant.
    pub fn clamped(mut self) -> Self {
        let clamped_errors = self
            .category_errors
            .iter()
            .map(|(category, errors)| {
                let totals = self.category_totals.get(category).copied().unwrap_or(0);
                (category.clone(), (*errors).min(totals))
            })
            .collect();
        self.category_errors = clamped_errors;

        let mut seen = std::collections::BTreeSet::new();
        let mut weak_points: Vector<Item> = self
            .weak_points
            .iter()
            .rev()
            .filter(|item| seen.insert(item.id.clone()))
            .cloned()
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        while weak_points.len() > WEAK_POINTS_CAPACITY {
            weak_points.pop_front();
        }
        self.weak_points = weak_points;

        if let Some(streak) = self.streak.as_mut() {
            streak.count = streak.count.max(1);
        }
        self
    }

    /// Fails fast in debug builds; clamps and logs in release builds.
    pub(crate) fn enforce_invariants(self) -> Self {
        match self.check_invariants() {
            Ok(()) => self,
            Err(violation) => {
                debug_assert!(false, "mastery invariant violated: {violation}");
                log::error!("Mastery invariant violated, clamping: {violation}");
                self.clamped()
            }
        }
    }

    /// Applies one event as if it happened at `now`.
    pub fn apply_at(self, now: DateTime<Utc>, event: MasteryEvent) -> Self {
        self.apply_event(&Timestamped {
            timestamp: now,
            sequence: 0,
            event,
        })
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Loads a persisted state. Stored data that breaks an invariant is repaired, not rejected.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let state: Self = serde_json::from_str(json)?;
        if let Err(violation) = state.check_invariants() {
            log::error!("Persisted mastery state is inconsistent, repairing: {violation}");
            return Ok(state.clamped());
        }
        Ok(state)
    }
}

/// Something that happened to a learner's mastery state.
///
/// Events record outcomes (the credits actually spent, the expiry actually granted), so replaying a
/// journal does not depend on the configuration that was active when it was written.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum MasteryEvent {
    Activity(Activity),
    Missed {
        item: Item,
    },
    FavoriteToggled {
        item_id: String,
    },
    CreditsRedeemed {
        cost: u32,
        expiry: DateTime<Utc>,
    },
    CreditsAdded {
        amount: u32,
    },
    /// Drops a lapsed paid tier, evaluated at the event's timestamp.
    TierNormalized,
    TierGranted {
        tier: Tier,
        expiry: Option<DateTime<Utc>>,
    },
    AutoExplainSet {
        enabled: bool,
    },
    CustomListSet {
        items: Vec<Item>,
    },
    Reset,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "version")]
pub enum VersionedMasteryEvent {
    V1(MasteryEvent),
}

impl Event for MasteryEvent {
    fn to_json(&self) -> Result<serde_json::Value, serde_json::Error> {
        let versioned = VersionedMasteryEvent::from(self.clone());
        serde_json::to_value(versioned)
    }

    fn from_json(json: &serde_json::Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value::<VersionedMasteryEvent>(json.clone()).map(|versioned| versioned.into())
    }
}

impl From<MasteryEvent> for VersionedMasteryEvent {
    fn from(event: MasteryEvent) -> Self {
        VersionedMasteryEvent::V1(event)
    }
}

impl From<VersionedMasteryEvent> for MasteryEvent {
    fn from(event: VersionedMasteryEvent) -> Self {
        match event {
            VersionedMasteryEvent::V1(event) => event,
        }
    }
}

impl PartialAppState for MasteryState {
    type Event = MasteryEvent;
    type Partial = Self;

    fn process_event(state: Self, event: &Timestamped<MasteryEvent>) -> Self {
        let Timestamped {
            event,
            timestamp,
            sequence: _,
        } = event;

        let mut state = match event {
            MasteryEvent::Activity(activity) => state.with_activity(activity),
            MasteryEvent::Missed { item } => state.with_miss(item),
            MasteryEvent::FavoriteToggled { item_id } => {
                let mut state = state;
                if state.favorites.remove(item_id).is_none() {
                    state.favorites.insert(item_id.clone());
                }
                state
            }
            MasteryEvent::CreditsRedeemed { cost, expiry } => Self {
                credits: state.credits.saturating_sub(*cost),
                tier: Tier::Plus,
                tier_expiry: Some(*expiry),
                ..state
            },
            MasteryEvent::CreditsAdded { amount } => Self {
                credits: state.credits.saturating_add(*amount),
                ..state
            },
            MasteryEvent::TierNormalized => state.normalized_at(*timestamp),
            MasteryEvent::TierGranted { tier, expiry } => {
                let state = Self {
                    tier: *tier,
                    tier_expiry: *expiry,
                    ..state
                };
                if *tier == Tier::Free {
                    Self {
                        auto_explain: false,
                        tier_expiry: None,
                        ..state
                    }
                } else {
                    state
                }
            }
            MasteryEvent::AutoExplainSet { enabled } => Self {
                auto_explain: *enabled && state.tier != Tier::Free,
                ..state
            },
            MasteryEvent::CustomListSet { items } => {
                let mut seen = std::collections::BTreeSet::new();
                Self {
                    custom_list: items
                        .iter()
                        .filter(|&item| seen.insert(item.id.as_str()))
                        .cloned()
                        .collect(),
                    ..state
                }
            }
            MasteryEvent::Reset => Self::default(),
        };

        state.achievements = state
            .achievements
            .clone()
            .union(achievements::newly_unlocked(&state).into_iter().collect());
        state.enforce_invariants()
    }

    fn finalize(partial: Self) -> Self {
        partial
    }
}

impl MasteryState {
    pub(crate) fn normalized_at(self, now: DateTime<Utc>) -> Self {
        if self.tier_lapsed(now) {
            Self {
                tier: Tier::Free,
                tier_expiry: None,
                auto_explain: false,
                ..self
            }
        } else {
            self
        }
    }
}
