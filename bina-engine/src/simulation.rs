use chrono::{DateTime, Duration, NaiveDate, Utc};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Serialize;

use crate::selector::SessionTopic;
use crate::{Bina, EngineError};

/// Time a simulated learner spends on one card.
const SECONDS_PER_CARD: i64 = 30;

#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DaySummary {
    pub date: NaiveDate,
    pub topic: Option<SessionTopic>,
    pub answered: usize,
    pub correct: usize,
    pub xp: u64,
    pub level: u64,
    pub streak: u32,
    pub weak_points: usize,
    pub achievements: usize,
    /// The daily swipe cap ended the day's session.
    pub capped: bool,
}

/// Simulates a learner who opens one smart session a day and knows each card with a fixed chance.
pub struct DailySimulation {
    engine: Bina,
    current_time: DateTime<Utc>,
    recall: f64,
    rng: ChaCha8Rng,
}

impl DailySimulation {
    pub fn new(engine: Bina, current_time: DateTime<Utc>, recall: f64, seed: u64) -> Self {
        Self {
            engine,
            current_time,
            recall: if recall.is_nan() {
                0.0
            } else {
                recall.clamp(0.0, 1.0)
            },
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    pub fn engine(&self) -> &Bina {
        &self.engine
    }

    pub fn into_engine(self) -> Bina {
        self.engine
    }

    pub fn next(mut self) -> (Self, DaySummary) {
        let day_start = self.current_time;
        let mut now = day_start;
        let mut answered = 0;
        let mut correct = 0;
        let mut capped = false;

        let started = self
            .engine
            .start_session(SessionTopic::Smart, now)
            .map(|selection| selection.resolved);
        let started = match started {
            Err(EngineError::Denied(denial)) => {
                log::debug!("Smart pick {denial}, practicing vocabulary instead");
                self.engine
                    .start_session(SessionTopic::Vocabulary, now)
                    .map(|selection| selection.resolved)
            }
            other => other,
        };
        let topic = match started {
            Ok(topic) => Some(topic),
            Err(e) => {
                log::warn!("Simulated day {} has no session: {e}", day_start.date_naive());
                None
            }
        };

        while let Some(item) = self.engine.current_item().cloned() {
            let knew_it = self.rng.random_bool(self.recall);
            let outcome = match self.engine.current_question().cloned() {
                Some(question) => {
                    let answer = if knew_it {
                        question.correct_answer.clone()
                    } else {
                        question
                            .options
                            .iter()
                            .find(|option| !question.is_correct(option))
                            .cloned()
                            .unwrap_or_default()
                    };
                    self.engine.answer_question(&item.id, &answer, now)
                }
                None => self.engine.answer(&item.id, knew_it, now),
            };
            match outcome {
                Ok(outcome) => {
                    answered += 1;
                    if outcome.correct {
                        correct += 1;
                    }
                }
                Err(EngineError::Denied(denial)) => {
                    log::debug!("Simulated learner stopped: {denial}");
                    capped = true;
                    break;
                }
                Err(e) => {
                    log::warn!("Simulated answer failed: {e}");
                    break;
                }
            }
            now += Duration::seconds(SECONDS_PER_CARD);
        }
        self.engine.finish_session(now);

        let state = self.engine.state();
        let summary = DaySummary {
            date: self.engine.today(day_start),
            topic,
            answered,
            correct,
            xp: state.xp,
            level: state.level(),
            streak: state.streak_count(),
            weak_points: state.weak_points.len(),
            achievements: state.achievements.len(),
            capped,
        };

        self.current_time += Duration::days(1);
        (self, summary)
    }
}

impl Bina {
    /// Hands the engine to a simulated learner, starting at `start_time`.
    ///
    /// Runs with the same engine seed, `seed` and `start_time` give the same days.
    pub fn simulate_usage(self, start_time: DateTime<Utc>, recall: f64, seed: u64) -> DailySimulation {
        DailySimulation::new(self, start_time, recall, seed)
    }
}
