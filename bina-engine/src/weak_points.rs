use chrono::{DateTime, Utc};
use content_utils::Item;

use crate::mastery::{MasteryEvent, MasteryState, WEAK_POINTS_CAPACITY};

/// Remembers a missed item for targeted review.
///
/// Only touches the weak-points buffer. Callers record the miss itself (category error, XP) with
/// [`crate::recorder::record_answer`] as a separate step.
pub fn record_miss(state: MasteryState, item: &Item, now: DateTime<Utc>) -> MasteryState {
    state.apply_at(now, MasteryEvent::Missed { item: item.clone() })
}

impl MasteryState {
    pub fn has_weak_point(&self, item_id: &str) -> bool {
        self.weak_points.iter().any(|item| item.id == item_id)
    }

    pub(crate) fn with_miss(mut self, item: &Item) -> Self {
        if self.has_weak_point(&item.id) {
            return self;
        }
        self.weak_points.push_back(item.clone());
        while self.weak_points.len() > WEAK_POINTS_CAPACITY {
            if let Some(evicted) = self.weak_points.pop_front() {
                log::debug!("Weak point {} evicted", evicted.id);
            }
        }
        self
    }
}
