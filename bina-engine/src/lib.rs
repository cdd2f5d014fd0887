//! The practice engine behind Bina: what a learner sees next, and what that says about them.
//!
//! The pure building blocks live in their own modules ([`selector`], [`recorder`],
//! [`entitlement`], [`session`] and friends). [`Bina`] ties them together for one learner: it owns the
//! mastery state, appends every change to a [`Journal`], runs the active session and tells listeners
//! about unlocked achievements and finished sessions.

pub mod achievements;
pub mod bindings;
pub mod config;
pub mod distractors;
pub mod entitlement;
pub mod history;
pub mod mastery;
pub mod mock_exam;
pub mod notifications;
pub mod recorder;
pub mod selector;
pub mod session;
pub mod simulation;
#[cfg(target_arch = "wasm32")]
mod utils;
pub mod weak_points;

use std::sync::Arc;
#[cfg(target_arch = "wasm32")]
use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, Utc};
use content_utils::explain::ExplainRequest;
use content_utils::{Catalog, Item};
use journal::{AppState as _, Journal, JournalError};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use slotmap::SlotMap;

pub use achievements::Achievement;
pub use config::EngineConfig;
pub use distractors::Question;
pub use entitlement::{Access, Action, Denial, EntitlementError};
pub use mastery::{CategoryAccuracy, InvariantViolation, MasteryEvent, MasteryState, Tier};
pub use mock_exam::{MockExam, MockExamResult};
pub use recorder::{Activity, ActivityKind};
pub use selector::{ItemSet, Selection, SessionTopic};
pub use session::{AnsweredQuestion, Session, SessionError, SessionResult};
pub use simulation::DailySimulation;

use crate::history::{History, HistoryEntry, HistoryRecord};
use crate::mock_exam::ChapterPlan;
use crate::notifications::{ReminderSettings, ScheduledNotification};
use crate::session::Resolution;

// putting this inside LOGGER prevents us from accidentally initializing the logger more than once
#[cfg(target_arch = "wasm32")]
#[allow(clippy::declare_interior_mutable_const)]
const LOGGER: LazyLock<()> = LazyLock::new(|| {
    utils::set_panic_hook();

    wasm_logger::init(wasm_logger::Config::default());
    log::info!("Logging initialized");
});

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("denied: {0}")]
    Denied(Denial),
    #[error(transparent)]
    Entitlement(#[from] EntitlementError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("could not read or write state: {0}")]
    Persistence(#[from] serde_json::Error),
    #[error("could not read the journal: {0}")]
    Journal(#[from] JournalError),
}

/// Told to listeners as it happens. The engine does not care whether anyone shows it.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, tsify::Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum EngineEvent {
    AchievementUnlocked { achievement: Achievement },
    SessionFinished { result: SessionResult },
    MockExamFinished { result: MockExamResult },
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, tsify::Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
#[serde(rename_all = "camelCase")]
pub struct AnswerOutcome {
    pub correct: bool,
    pub finished: bool,
    pub unlocked: Vec<Achievement>,
    /// Filled in for misses when auto-explain is on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explain: Option<ExplainRequest>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, tsify::Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
#[serde(tag = "kind", content = "result", rename_all = "camelCase")]
pub enum FinishedSession {
    Practice(SessionResult),
    MockExam(MockExamResult),
}

#[derive(Clone, Debug)]
enum ActiveSession {
    Practice(Session),
    MockExam(MockExam),
}

slotmap::new_key_type! {
    pub struct ListenerKey;
}

type Listener = Box<dyn FnMut(&EngineEvent)>;

/// One learner's engine.
pub struct Bina {
    config: EngineConfig,
    catalog: Arc<Catalog>,
    /// What the journal folds from.
    initial: MasteryState,
    state: MasteryState,
    journal: Journal<MasteryEvent>,
    rng: ChaCha8Rng,
    active: Option<ActiveSession>,
    /// Answers of the last finished exam.
    review: Vec<AnsweredQuestion>,
    history: History,
    listeners: SlotMap<ListenerKey, Listener>,
}

impl Bina {
    pub fn new(catalog: Arc<Catalog>, config: EngineConfig, seed: u64) -> Self {
        Self::with_state(catalog, config, MasteryState::default(), seed)
    }

    /// Continues from a previously persisted state.
    pub fn with_state(
        catalog: Arc<Catalog>,
        config: EngineConfig,
        state: MasteryState,
        seed: u64,
    ) -> Self {
        Self {
            config,
            catalog,
            initial: state.clone(),
            state,
            journal: Journal::default(),
            rng: ChaCha8Rng::seed_from_u64(seed),
            active: None,
            review: Vec::new(),
            history: History::default(),
            listeners: SlotMap::with_key(),
        }
    }

    pub fn from_state_json(
        catalog: Arc<Catalog>,
        config: EngineConfig,
        json: &str,
        seed: u64,
    ) -> Result<Self, EngineError> {
        let state = MasteryState::from_json(json)?;
        Ok(Self::with_state(catalog, config, state, seed))
    }

    /// Rebuilds the state by folding a stored journal from the default state.
    pub fn from_journal(
        catalog: Arc<Catalog>,
        config: EngineConfig,
        json_lines: &str,
        seed: u64,
    ) -> Result<Self, EngineError> {
        let journal = Journal::from_json_lines(json_lines)?;
        let state = journal.state::<MasteryState>(MasteryState::default());
        log::info!("Replayed {} journal events", journal.len());
        let mut engine = Self::new(catalog, config, seed);
        engine.state = state;
        engine.journal = journal;
        Ok(engine)
    }

    pub fn state(&self) -> &MasteryState {
        &self.state
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn journal(&self) -> &Journal<MasteryEvent> {
        &self.journal
    }

    pub fn state_json(&self) -> Result<String, EngineError> {
        Ok(self.state.to_json()?)
    }

    pub fn journal_json_lines(&self) -> Result<String, EngineError> {
        Ok(self.journal.to_json_lines()?)
    }

    /// Folds the journal again from the starting state. Always equals [`Bina::state`].
    pub fn replay(&self) -> MasteryState {
        self.journal.state::<MasteryState>(self.initial.clone())
    }

    pub fn register_listener(&mut self, listener: impl FnMut(&EngineEvent) + 'static) -> ListenerKey {
        self.listeners.insert(Box::new(listener))
    }

    pub fn unregister_listener(&mut self, key: ListenerKey) {
        self.listeners.remove(key);
    }

    pub fn today(&self, now: DateTime<Utc>) -> NaiveDate {
        self.config.calendar_date(now)
    }

    /// Drops a lapsed tier. Runs before every session start and every gated action.
    pub fn maintain(&mut self, now: DateTime<Utc>) {
        if let Some(event) = entitlement::normalization_event(&self.state, now) {
            log::info!("{:?} tier expired, back to free", self.state.tier);
            self.commit(now, event);
        }
    }

    pub fn check_access(&mut self, topic: SessionTopic, action: Action, now: DateTime<Utc>) -> Access {
        self.maintain(now);
        entitlement::check_access(self.state.clone(), topic, action, now, &self.config).access
    }

    /// Selects and starts a session.
    ///
    /// The gate checks the requested topic and, for a smart session, the topic it resolved to. A
    /// session still running is abandoned only once the new one is allowed.
    pub fn start_session(
        &mut self,
        topic: SessionTopic,
        now: DateTime<Utc>,
    ) -> Result<&Selection, EngineError> {
        if let Access::Deny(denial) = self.check_access(topic, Action::Open, now) {
            return Err(EngineError::Denied(denial));
        }
        let selection = selector::select_session(
            topic,
            &self.state,
            &self.catalog,
            &self.config,
            &mut self.rng,
        );
        if selection.resolved != topic
            && let Access::Deny(denial) = self.check_access(selection.resolved, Action::Open, now)
        {
            return Err(EngineError::Denied(denial));
        }

        self.finish_session(now);
        let mut session = Session::new(selection, self.config.exam_duration());
        session.start(now)?;
        let finished = session.is_finished();
        self.active = Some(ActiveSession::Practice(session));
        if finished {
            self.finish_active();
        }
        match &self.active {
            Some(ActiveSession::Practice(session)) => Ok(session.selection()),
            _ => Err(SessionError::NoActiveSession.into()),
        }
    }

    pub fn start_mock_exam(&mut self, now: DateTime<Utc>) -> Result<Vec<ChapterPlan>, EngineError> {
        self.finish_session(now);
        self.maintain(now);
        let mut exam = MockExam::build(self.state.tier, &self.catalog, &self.config, &mut self.rng);
        exam.start(now)?;
        let plan = exam.plan().to_vec();
        let finished = exam.is_finished();
        self.active = Some(ActiveSession::MockExam(exam));
        if finished {
            self.finish_active();
        }
        Ok(plan)
    }

    /// The card or question waiting for an answer.
    pub fn current_item(&self) -> Option<&Item> {
        match self.active.as_ref()? {
            ActiveSession::Practice(session) => session.current(),
            ActiveSession::MockExam(exam) => exam.current_question().map(|question| &question.item),
        }
    }

    pub fn current_question(&self) -> Option<&Question> {
        match self.active.as_ref()? {
            ActiveSession::Practice(session) => session.current_question(),
            ActiveSession::MockExam(exam) => exam.current_question(),
        }
    }

    pub fn active_selection(&self) -> Option<&Selection> {
        match self.active.as_ref()? {
            ActiveSession::Practice(session) => Some(session.selection()),
            ActiveSession::MockExam(_) => None,
        }
    }

    /// Resolves the current flashcard. On the free tier this is where the daily cap bites.
    pub fn answer(
        &mut self,
        item_id: &str,
        knew_it: bool,
        now: DateTime<Utc>,
    ) -> Result<AnswerOutcome, EngineError> {
        let topic = match &self.active {
            Some(ActiveSession::Practice(session)) => session.selection().resolved,
            Some(ActiveSession::MockExam(_)) => return Err(SessionError::WrongMode("exam").into()),
            None => return Err(SessionError::NoActiveSession.into()),
        };
        if let Access::Deny(denial) = self.check_access(topic, Action::Advance, now) {
            return Err(EngineError::Denied(denial));
        }

        let Some(ActiveSession::Practice(session)) = self.active.as_mut() else {
            return Err(SessionError::NoActiveSession.into());
        };
        let resolution = session.resolve_swipe(item_id, knew_it, now)?;
        let xp = if knew_it {
            self.config.xp_known
        } else {
            self.config.xp_missed
        };
        Ok(self.record(resolution, ActivityKind::Swipe, xp, None, now))
    }

    /// Answers the current exam question, in a marathon or a mock exam.
    pub fn answer_question(
        &mut self,
        item_id: &str,
        answer: &str,
        now: DateTime<Utc>,
    ) -> Result<AnswerOutcome, EngineError> {
        self.tick(now);
        let resolution = match self.active.as_mut() {
            Some(ActiveSession::Practice(session)) => session.resolve_answer(item_id, answer, now)?,
            Some(ActiveSession::MockExam(exam)) => exam.answer(item_id, answer, now)?,
            None => return Err(SessionError::NoActiveSession.into()),
        };
        let xp = if resolution.correct {
            self.config.xp_exam_correct
        } else {
            self.config.xp_exam_wrong
        };
        Ok(self.record(resolution, ActivityKind::Question, xp, Some(answer), now))
    }

    /// Checks the exam clocks. Returns what finished, if anything did.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Option<FinishedSession> {
        let finished = match self.active.as_mut()? {
            ActiveSession::Practice(session) => session.tick(now),
            ActiveSession::MockExam(exam) => {
                exam.tick(now);
                exam.is_finished()
            }
        };
        if finished { self.finish_active() } else { None }
    }

    pub fn skip_break(&mut self, now: DateTime<Utc>) -> Result<(), EngineError> {
        match self.active.as_mut() {
            Some(ActiveSession::MockExam(exam)) => Ok(exam.skip_break(now)?),
            _ => Err(SessionError::NoActiveSession.into()),
        }
    }

    /// Leaves the active session. Its partial result is archived; unanswered items are not recorded.
    pub fn finish_session(&mut self, now: DateTime<Utc>) -> Option<FinishedSession> {
        match self.active.as_mut()? {
            ActiveSession::Practice(session) => session.abandon(now),
            ActiveSession::MockExam(exam) => exam.abandon(now),
        }
        self.finish_active()
    }

    /// Replays the same cards from the first one.
    pub fn restart_session(&mut self) -> Result<(), EngineError> {
        match self.active.as_mut() {
            Some(ActiveSession::Practice(session)) => Ok(session.restart()?),
            Some(ActiveSession::MockExam(_)) => Err(SessionError::RestartUnsupported.into()),
            None => Err(SessionError::NoActiveSession.into()),
        }
    }

    pub fn toggle_favorite(&mut self, item_id: &str, now: DateTime<Utc>) -> bool {
        self.commit(
            now,
            MasteryEvent::FavoriteToggled {
                item_id: item_id.to_string(),
            },
        );
        self.state.is_favorite(item_id)
    }

    pub fn redeem_credits(&mut self, now: DateTime<Utc>) -> Result<(), EngineError> {
        self.maintain(now);
        let event = entitlement::plan_redeem(&self.state, now, &self.config)?;
        self.commit(now, event);
        log::info!("Credits redeemed, plus until {:?}", self.state.tier_expiry);
        Ok(())
    }

    pub fn add_credits(&mut self, amount: u32, now: DateTime<Utc>) {
        self.commit(now, MasteryEvent::CreditsAdded { amount });
    }

    pub fn grant_tier(&mut self, tier: Tier, expiry: Option<DateTime<Utc>>, now: DateTime<Utc>) {
        self.commit(now, MasteryEvent::TierGranted { tier, expiry });
    }

    pub fn set_auto_explain(&mut self, enabled: bool, now: DateTime<Utc>) -> Result<(), EngineError> {
        self.maintain(now);
        let event = entitlement::plan_auto_explain(&self.state, enabled)?;
        self.commit(now, event);
        Ok(())
    }

    pub fn set_custom_list(&mut self, items: Vec<Item>, now: DateTime<Utc>) {
        self.commit(now, MasteryEvent::CustomListSet { items });
    }

    /// Forgets everything about the learner. Archived history stays with the host.
    pub fn reset(&mut self, now: DateTime<Utc>) {
        self.active = None;
        self.review.clear();
        self.commit(now, MasteryEvent::Reset);
    }

    /// The request for the explanation collaborator: for the waiting question, an answered exam
    /// question (with the learner's choice), or any item the learner can see.
    pub fn explain_request(&self, item_id: &str) -> Option<ExplainRequest> {
        if let Some(question) = self.current_question().filter(|question| question.item.id == item_id) {
            return Some(question.explain_request(None));
        }
        let answered = match &self.active {
            Some(ActiveSession::Practice(session)) => {
                session.answers().iter().rev().find(|answered| answered.item_id() == item_id)
            }
            Some(ActiveSession::MockExam(exam)) => exam.find_answer(item_id),
            None => None,
        }
        .or_else(|| self.review.iter().find(|answered| answered.item_id() == item_id));
        if let Some(answered) = answered {
            return Some(answered.explain_request());
        }
        let item = self
            .catalog
            .find(item_id)
            .or_else(|| self.state.weak_points.iter().find(|item| item.id == item_id))
            .or_else(|| self.state.custom_list.iter().find(|item| item.id == item_id))?;
        Some(Question::from(item).explain_request(None))
    }

    /// What the learner answered in the last finished exam, for the review screen.
    pub fn review(&self) -> &[AnsweredQuestion] {
        &self.review
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    /// Archived records as the learner's tier lets them see them.
    pub fn history_entries(&self) -> Vec<HistoryEntry> {
        self.history.entries(self.state.tier)
    }

    pub fn load_history(&mut self, history: History) {
        self.history = history;
    }

    pub fn reminder(
        &self,
        settings: &ReminderSettings,
        exam_date: Option<NaiveDate>,
        now: DateTime<Utc>,
    ) -> Option<ScheduledNotification> {
        notifications::schedule_reminder(
            settings,
            self.state.weak_points.len(),
            exam_date,
            now,
            &self.config,
        )
    }

    /// Records an answer and, for a miss, the weak point.
    fn record(
        &mut self,
        resolution: Resolution,
        kind: ActivityKind,
        xp: u32,
        student_answer: Option<&str>,
        now: DateTime<Utc>,
    ) -> AnswerOutcome {
        let activity = Activity::new(kind, self.today(now))
            .with_xp(xp)
            .in_category(resolution.item.category.clone())
            .answered(resolution.correct);
        let mut unlocked = self.commit(now, MasteryEvent::Activity(activity));

        let mut explain = None;
        if !resolution.correct {
            unlocked.extend(self.commit(
                now,
                MasteryEvent::Missed {
                    item: resolution.item.clone(),
                },
            ));
            if self.state.auto_explain {
                let question = resolution
                    .question
                    .unwrap_or_else(|| Question::from(&resolution.item));
                explain = Some(question.explain_request(student_answer));
            }
        }

        // a finished mock exam chapter is not a finished exam
        let finished = resolution.finished && self.finish_active().is_some();
        AnswerOutcome {
            correct: resolution.correct,
            finished,
            unlocked,
            explain,
        }
    }

    /// Appends an event and folds it into the live state.
    fn commit(&mut self, now: DateTime<Utc>, event: MasteryEvent) -> Vec<Achievement> {
        let before = self.state.achievements.clone();
        let entry = self.journal.append(now, event);
        self.state = std::mem::take(&mut self.state).apply_event(entry);

        let unlocked = recorder::unlocked_since(&before, &self.state);
        for achievement in &unlocked {
            log::info!("Achievement unlocked: {}", achievement.id());
            self.emit(&EngineEvent::AchievementUnlocked {
                achievement: *achievement,
            });
        }
        unlocked
    }

    /// Hands out the result of a finished session once: archived, then told to listeners.
    fn finish_active(&mut self) -> Option<FinishedSession> {
        let finished = match self.active.as_mut()? {
            ActiveSession::Practice(session) => FinishedSession::Practice(session.take_result()?),
            ActiveSession::MockExam(exam) => FinishedSession::MockExam(exam.take_result()?),
        };
        match &finished {
            FinishedSession::Practice(result) => {
                log::info!(
                    "Session finished: {}/{} on {}",
                    result.correct_count,
                    result.total,
                    result.category
                );
                if result.topic == SessionTopic::Marathon {
                    self.review = result.answers.clone();
                }
                if result.total > 0 {
                    self.history.push(HistoryRecord::from(result));
                }
                self.emit(&EngineEvent::SessionFinished {
                    result: result.clone(),
                });
            }
            FinishedSession::MockExam(result) => {
                log::info!("Mock exam finished with a score of {}", result.scaled_score);
                self.review = result.answers.clone();
                self.history.push(HistoryRecord::from(result));
                self.emit(&EngineEvent::MockExamFinished {
                    result: result.clone(),
                });
            }
        }
        Some(finished)
    }

    fn emit(&mut self, event: &EngineEvent) {
        for (_, listener) in self.listeners.iter_mut() {
            listener(event);
        }
    }
}
