//! One pass over a selected item set: a flashcard swipe sequence or a timed exam.
//!
//! The runner only decides what happened. It never touches the mastery state; each [`Resolution`] it
//! returns is recorded by the caller exactly once, and an index that has been resolved cannot be
//! resolved again.

use chrono::{DateTime, Duration, Utc};
use content_utils::Item;
use content_utils::explain::ExplainRequest;
use serde::{Deserialize, Serialize};

use crate::config::saturating_add;
use crate::distractors::Question;
use crate::selector::{ItemSet, Selection, SessionTopic};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("no session is running")]
    NoActiveSession,
    #[error("the session is not in progress")]
    NotInProgress,
    #[error("expected item {expected:?}, got {got:?}")]
    UnexpectedItem { expected: String, got: String },
    #[error("this action does not fit a {0} session")]
    WrongMode(&'static str),
    #[error("exams cannot be restarted")]
    RestartUnsupported,
}

/// A deadline. Dropping it cancels it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Countdown {
    pub deadline: DateTime<Utc>,
}

impl Countdown {
    pub fn starting_at(now: DateTime<Utc>, duration: Duration) -> Self {
        Self {
            deadline: saturating_add(now, duration),
        }
    }

    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        (self.deadline - now).max(Duration::zero())
    }

    pub fn expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.deadline
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, tsify::Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
#[serde(rename_all = "camelCase")]
pub enum FinishReason {
    Completed,
    TimedOut,
    Abandoned,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    NotStarted,
    InProgress,
    Finished {
        reason: FinishReason,
        at: DateTime<Utc>,
    },
}

/// An answered exam question with the learner's choice, kept for review.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, tsify::Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
#[serde(rename_all = "camelCase")]
pub struct AnsweredQuestion {
    pub question: Question,
    pub chosen: String,
    pub correct: bool,
}

impl AnsweredQuestion {
    pub fn item_id(&self) -> &str {
        &self.question.item.id
    }

    pub fn explain_request(&self) -> ExplainRequest {
        self.question.explain_request(Some(&self.chosen))
    }
}

/// Summary of a finished session, handed out once.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, tsify::Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
#[serde(rename_all = "camelCase")]
pub struct SessionResult {
    pub topic: SessionTopic,
    /// Display label of the session, used by the history log.
    pub category: String,
    /// Items the learner resolved.
    pub items_seen: usize,
    pub correct_count: usize,
    /// Resolved wrong, plus unanswered when an exam timed out.
    pub incorrect_count: usize,
    pub total: usize,
    pub reason: FinishReason,
    pub timestamp: DateTime<Utc>,
    /// Exam answers in the order given. Empty for flashcards.
    #[serde(default)]
    pub answers: Vec<AnsweredQuestion>,
}

/// The outcome of one resolved card or question.
#[derive(Clone, Debug, PartialEq)]
pub struct Resolution {
    pub index: usize,
    pub item: Item,
    pub correct: bool,
    /// Set for exam answers, so a miss can be explained with its options.
    pub question: Option<Question>,
    pub finished: bool,
}

#[derive(Clone, Debug)]
pub struct Session {
    selection: Selection,
    phase: Phase,
    index: usize,
    correct_count: usize,
    exam_duration: Duration,
    countdown: Option<Countdown>,
    answers: Vec<AnsweredQuestion>,
    result_taken: bool,
}

impl Session {
    pub fn new(selection: Selection, exam_duration: Duration) -> Self {
        Self {
            selection,
            phase: Phase::NotStarted,
            index: 0,
            correct_count: 0,
            exam_duration,
            countdown: None,
            answers: Vec::new(),
            result_taken: false,
        }
    }

    /// Starts the pass. An empty item set finishes on the spot.
    pub fn start(&mut self, now: DateTime<Utc>) -> Result<(), SessionError> {
        if self.phase != Phase::NotStarted {
            return Err(SessionError::NotInProgress);
        }
        self.phase = Phase::InProgress;
        if self.is_exam() {
            self.countdown = Some(Countdown::starting_at(now, self.exam_duration));
        }
        log::info!(
            "Session {:?} started with {} items",
            self.selection.resolved,
            self.selection.items.len()
        );
        if self.selection.items.is_empty() {
            self.finish(FinishReason::Completed, now);
        }
        Ok(())
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn correct_count(&self) -> usize {
        self.correct_count
    }

    pub fn is_exam(&self) -> bool {
        matches!(self.selection.items, ItemSet::Exam(_))
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.phase, Phase::Finished { .. })
    }

    pub fn countdown(&self) -> Option<Countdown> {
        self.countdown
    }

    pub fn answers(&self) -> &[AnsweredQuestion] {
        &self.answers
    }

    /// The card or question waiting to be resolved.
    pub fn current(&self) -> Option<&Item> {
        if self.phase != Phase::InProgress {
            return None;
        }
        self.selection.items.item(self.index)
    }

    pub fn current_question(&self) -> Option<&Question> {
        match (&self.selection.items, self.phase) {
            (ItemSet::Exam(questions), Phase::InProgress) => questions.get(self.index),
            _ => None,
        }
    }

    /// Resolves the current card as known or not known.
    pub fn resolve_swipe(
        &mut self,
        item_id: &str,
        knew_it: bool,
        now: DateTime<Utc>,
    ) -> Result<Resolution, SessionError> {
        if self.is_exam() {
            return Err(SessionError::WrongMode("exam"));
        }
        let item = self.expect_current(item_id)?.clone();
        Ok(self.advance(item, knew_it, None, now))
    }

    /// Resolves the current exam question with the learner's chosen option.
    pub fn resolve_answer(
        &mut self,
        item_id: &str,
        answer: &str,
        now: DateTime<Utc>,
    ) -> Result<Resolution, SessionError> {
        if !self.is_exam() {
            return Err(SessionError::WrongMode("swipe"));
        }
        if self.tick(now) {
            return Err(SessionError::NotInProgress);
        }
        self.expect_current(item_id)?;
        let question = self
            .current_question()
            .cloned()
            .ok_or(SessionError::NotInProgress)?;
        let correct = question.is_correct(answer);
        self.answers.push(AnsweredQuestion {
            question: question.clone(),
            chosen: answer.to_string(),
            correct,
        });
        Ok(self.advance(question.item.clone(), correct, Some(question), now))
    }

    /// Checks the exam clock. Returns true if this call ended the session.
    pub fn tick(&mut self, now: DateTime<Utc>) -> bool {
        let expired = self
            .countdown
            .is_some_and(|countdown| countdown.expired(now));
        if self.phase == Phase::InProgress && expired {
            log::info!(
                "Exam timed out with {} of {} answered",
                self.index,
                self.selection.items.len()
            );
            self.finish(FinishReason::TimedOut, now);
            return true;
        }
        false
    }

    /// Replays the same cards from the start. Swipe sessions only.
    pub fn restart(&mut self) -> Result<(), SessionError> {
        if self.is_exam() {
            return Err(SessionError::RestartUnsupported);
        }
        if self.phase == Phase::NotStarted {
            return Err(SessionError::NotInProgress);
        }
        self.index = 0;
        self.correct_count = 0;
        self.result_taken = false;
        self.phase = Phase::InProgress;
        Ok(())
    }

    /// Leaves the session early. Progress so far is kept for the result; nothing else is resolved.
    pub fn abandon(&mut self, now: DateTime<Utc>) {
        if self.phase == Phase::InProgress {
            log::info!(
                "Session abandoned after {} of {} items",
                self.index,
                self.selection.items.len()
            );
            self.finish(FinishReason::Abandoned, now);
        }
    }

    /// The result of a finished session. Only the first call after finishing returns it.
    pub fn take_result(&mut self) -> Option<SessionResult> {
        let Phase::Finished { reason, at } = self.phase else {
            return None;
        };
        if self.result_taken {
            return None;
        }
        self.result_taken = true;

        let total = self.selection.items.len();
        let wrong = self.index - self.correct_count;
        let unanswered = if reason == FinishReason::TimedOut {
            total - self.index
        } else {
            0
        };
        Some(SessionResult {
            topic: self.selection.resolved,
            category: self.selection.resolved.label().to_string(),
            items_seen: self.index,
            correct_count: self.correct_count,
            incorrect_count: wrong + unanswered,
            total,
            reason,
            timestamp: at,
            answers: self.answers.clone(),
        })
    }

    fn expect_current(&self, item_id: &str) -> Result<&Item, SessionError> {
        let current = self.current().ok_or(SessionError::NotInProgress)?;
        if current.id != item_id {
            return Err(SessionError::UnexpectedItem {
                expected: current.id.clone(),
                got: item_id.to_string(),
            });
        }
        Ok(current)
    }

    fn advance(
        &mut self,
        item: Item,
        correct: bool,
        question: Option<Question>,
        now: DateTime<Utc>,
    ) -> Resolution {
        let index = self.index;
        self.index += 1;
        if correct {
            self.correct_count += 1;
        }
        let finished = self.index >= self.selection.items.len();
        if finished {
            self.finish(FinishReason::Completed, now);
        }
        Resolution {
            index,
            item,
            correct,
            question,
            finished,
        }
    }

    fn finish(&mut self, reason: FinishReason, at: DateTime<Utc>) {
        self.phase = Phase::Finished { reason, at };
        self.countdown = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use content_utils::Topic;

    fn item(id: &str) -> Item {
        Item {
            id: id.to_string(),
            display_term: format!("term {id}"),
            definition: format!("answer {id}"),
            example: String::new(),
            category: "Vocabulary".to_string(),
            topic: Topic::Vocabulary,
            difficulty: None,
            question: None,
            correct_answer: None,
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 20, 18, 0, 0).unwrap()
    }

    fn cards(ids: &[&str]) -> Session {
        Session::new(
            Selection {
                requested: SessionTopic::Vocabulary,
                resolved: SessionTopic::Vocabulary,
                items: ItemSet::Cards(ids.iter().map(|id| item(id)).collect()),
            },
            Duration::minutes(20),
        )
    }

    fn exam(ids: &[&str]) -> Session {
        Session::new(
            Selection {
                requested: SessionTopic::Marathon,
                resolved: SessionTopic::Marathon,
                items: ItemSet::Exam(ids.iter().map(|id| Question::from(&item(id))).collect()),
            },
            Duration::minutes(20),
        )
    }

    #[test]
    fn test_swipe_session_runs_to_completion() {
        let mut session = cards(&["a", "b"]);
        assert_eq!(session.current(), None);
        session.start(now()).unwrap();
        assert_eq!(session.current().map(|i| i.id.as_str()), Some("a"));

        let first = session.resolve_swipe("a", true, now()).unwrap();
        assert!(!first.finished);
        let second = session.resolve_swipe("b", false, now()).unwrap();
        assert!(second.finished);
        assert!(session.is_finished());

        let result = session.take_result().unwrap();
        assert_eq!(result.items_seen, 2);
        assert_eq!(result.correct_count, 1);
        assert_eq!(result.incorrect_count, 1);
        assert_eq!(result.reason, FinishReason::Completed);
        assert_eq!(session.take_result(), None);
    }

    #[test]
    fn test_an_index_is_resolved_once() {
        let mut session = cards(&["a", "b"]);
        session.start(now()).unwrap();
        session.resolve_swipe("a", true, now()).unwrap();
        assert_eq!(
            session.resolve_swipe("a", true, now()),
            Err(SessionError::UnexpectedItem {
                expected: "b".to_string(),
                got: "a".to_string()
            })
        );
        assert_eq!(session.correct_count(), 1);
    }

    #[test]
    fn test_empty_set_finishes_immediately() {
        let mut session = cards(&[]);
        session.start(now()).unwrap();
        assert!(session.is_finished());
        let result = session.take_result().unwrap();
        assert_eq!(result.total, 0);
        assert_eq!(result.items_seen, 0);
    }

    #[test]
    fn test_restart_replays_the_same_order() {
        let mut session = cards(&["c", "a", "b"]);
        session.start(now()).unwrap();
        for id in ["c", "a", "b"] {
            session.resolve_swipe(id, true, now()).unwrap();
        }
        assert!(session.take_result().is_some());

        session.restart().unwrap();
        assert_eq!(session.index(), 0);
        assert_eq!(session.correct_count(), 0);
        assert_eq!(session.current().map(|i| i.id.as_str()), Some("c"));
    }

    #[test]
    fn test_exam_timeout_counts_unanswered_as_incorrect() {
        let mut session = exam(&["a", "b", "c"]);
        session.start(now()).unwrap();
        assert!(!session.tick(now() + Duration::minutes(19)));
        assert!(session.tick(now() + Duration::minutes(20)));

        let result = session.take_result().unwrap();
        assert_eq!(result.reason, FinishReason::TimedOut);
        assert_eq!(result.items_seen, 0);
        assert_eq!(result.correct_count, 0);
        assert_eq!(result.incorrect_count, 3);
        assert_eq!(result.total, 3);
    }

    #[test]
    fn test_exam_answers_are_graded() {
        let mut session = exam(&["a", "b"]);
        session.start(now()).unwrap();
        let right = session.resolve_answer("a", "answer a", now()).unwrap();
        assert!(right.correct);
        assert!(right.question.is_some());
        let wrong = session.resolve_answer("b", "answer a", now()).unwrap();
        assert!(!wrong.correct);
        assert!(wrong.finished);
        assert_eq!(session.restart(), Err(SessionError::RestartUnsupported));

        let answers = session.take_result().unwrap().answers;
        assert_eq!(answers.len(), 2);
        assert_eq!(answers[1].item_id(), "b");
        assert_eq!(answers[1].chosen, "answer a");
        assert!(!answers[1].correct);
        let explain = answers[1].explain_request();
        assert_eq!(explain.correct_answer, "answer b");
        assert_eq!(explain.student_answer.as_deref(), Some("answer a"));
    }

    #[test]
    fn test_answer_after_the_deadline_is_refused() {
        let mut session = exam(&["a", "b"]);
        session.start(now()).unwrap();
        session.resolve_answer("a", "answer a", now()).unwrap();
        let late = now() + Duration::minutes(25);
        assert_eq!(
            session.resolve_answer("b", "answer b", late),
            Err(SessionError::NotInProgress)
        );
        let result = session.take_result().unwrap();
        assert_eq!(result.correct_count, 1);
        assert_eq!(result.incorrect_count, 1);
    }

    #[test]
    fn test_abandon_keeps_partial_progress() {
        let mut session = exam(&["a", "b", "c"]);
        session.start(now()).unwrap();
        session.resolve_answer("a", "wrong", now()).unwrap();
        session.abandon(now());
        assert_eq!(session.countdown(), None);
        let result = session.take_result().unwrap();
        assert_eq!(result.reason, FinishReason::Abandoned);
        assert_eq!(result.items_seen, 1);
        assert_eq!(result.incorrect_count, 1);
        assert_eq!(result.total, 3);
    }

    #[test]
    fn test_swipe_on_exam_is_rejected() {
        let mut session = exam(&["a"]);
        session.start(now()).unwrap();
        assert_eq!(
            session.resolve_swipe("a", true, now()),
            Err(SessionError::WrongMode("exam"))
        );
    }
}
