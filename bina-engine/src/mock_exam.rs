//! A full mock exam: timed chapters of multiple-choice questions with short breaks in between.
//!
//! Each chapter runs as its own exam [`Session`]. Transitions happen at the exact instant a deadline
//! passes, so a clock that jumps forward several chapters at once still ends every chapter and break
//! in order.

use chrono::{DateTime, Duration, Utc};
use content_utils::{Catalog, Item, Topic};
use rand::Rng;
use rand::seq::{IndexedRandom, SliceRandom};
use serde::{Deserialize, Serialize};

use crate::config::{EngineConfig, saturating_add};
use crate::distractors::Question;
use crate::mastery::Tier;
use crate::selector::{ItemSet, Selection, SessionTopic};
use crate::session::{AnsweredQuestion, Resolution, Session, SessionError};

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, tsify::Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
#[serde(rename_all = "camelCase")]
pub enum ChapterKind {
    Verbal,
    Quantitative,
    English,
}

impl ChapterKind {
    pub fn topics(&self) -> &'static [Topic] {
        match self {
            ChapterKind::Verbal => &[Topic::Vocabulary, Topic::Analogies],
            ChapterKind::Quantitative => &[Topic::Quantitative],
            ChapterKind::English => &[Topic::English],
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, tsify::Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
#[serde(rename_all = "camelCase")]
pub struct ChapterPlan {
    pub title: String,
    pub kind: ChapterKind,
    pub duration_secs: i64,
    pub question_count: usize,
}

const QUESTIONS_PER_CHAPTER: usize = 20;
const CHAPTER_SECS: i64 = 20 * 60;
const MINI_CHAPTERS: usize = 3;

/// The eight chapters of the real exam, pilot chapters included.
pub fn full_plan() -> Vec<ChapterPlan> {
    [
        ("חשיבה מילולית - פרק 1", ChapterKind::Verbal),
        ("חשיבה כמותית - פרק 1", ChapterKind::Quantitative),
        ("אנגלית - פרק 1", ChapterKind::English),
        ("חשיבה מילולית - פרק 2", ChapterKind::Verbal),
        ("חשיבה כמותית - פרק 2", ChapterKind::Quantitative),
        ("אנגלית - פרק 2", ChapterKind::English),
        ("חשיבה מילולית - פרק 3 (פיילוט)", ChapterKind::Verbal),
        ("חשיבה כמותית - פרק 3 (פיילוט)", ChapterKind::Quantitative),
    ]
    .into_iter()
    .map(|(title, kind)| ChapterPlan {
        title: title.to_string(),
        kind,
        duration_secs: CHAPTER_SECS,
        question_count: QUESTIONS_PER_CHAPTER,
    })
    .collect()
}

pub fn mini_plan() -> Vec<ChapterPlan> {
    full_plan().into_iter().take(MINI_CHAPTERS).collect()
}

/// Pro learners sit the full exam, everyone else a taste of it.
pub fn plan_for(tier: Tier) -> Vec<ChapterPlan> {
    match tier {
        Tier::Pro => full_plan(),
        Tier::Free | Tier::Plus => mini_plan(),
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, tsify::Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
#[serde(tag = "phase", rename_all = "camelCase")]
pub enum MockPhase {
    NotStarted,
    Chapter { index: usize },
    Break { next: usize, until: DateTime<Utc> },
    Finished { at: DateTime<Utc> },
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, tsify::Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
#[serde(rename_all = "camelCase")]
pub struct ChapterScore {
    pub title: String,
    pub correct: usize,
    pub total: usize,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, tsify::Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
#[serde(rename_all = "camelCase")]
pub struct MockExamResult {
    pub correct: usize,
    pub total: usize,
    /// Rough 200 to 800 estimate. Not calibrated against the real exam.
    pub scaled_score: u32,
    pub chapters: Vec<ChapterScore>,
    pub details: String,
    pub abandoned: bool,
    pub timestamp: DateTime<Utc>,
    /// Every answered question, chapter by chapter.
    #[serde(default)]
    pub answers: Vec<AnsweredQuestion>,
}

pub fn scaled_score(correct: usize, total: usize) -> u32 {
    if total == 0 {
        return 200;
    }
    200 + (600.0 * correct as f64 / total as f64).round() as u32
}

#[derive(Clone, Debug)]
pub struct MockExam {
    plan: Vec<ChapterPlan>,
    chapters: Vec<Session>,
    scores: Vec<ChapterScore>,
    answers: Vec<AnsweredQuestion>,
    phase: MockPhase,
    break_duration: Duration,
    full: bool,
    abandoned: bool,
    result_taken: bool,
}

impl MockExam {
    /// Draws every chapter's questions up front.
    pub fn build(
        tier: Tier,
        catalog: &Catalog,
        config: &EngineConfig,
        rng: &mut impl Rng,
    ) -> Self {
        let plan = plan_for(tier);
        let chapters = plan
            .iter()
            .map(|chapter| {
                let questions = draw_chapter(chapter, catalog, config, rng);
                // chapters run as exam sessions
                Session::new(
                    Selection {
                        requested: SessionTopic::Marathon,
                        resolved: SessionTopic::Marathon,
                        items: ItemSet::Exam(questions),
                    },
                    Duration::seconds(chapter.duration_secs),
                )
            })
            .collect();
        Self {
            full: tier == Tier::Pro,
            plan,
            chapters,
            scores: Vec::new(),
            answers: Vec::new(),
            phase: MockPhase::NotStarted,
            break_duration: config.break_duration(),
            abandoned: false,
            result_taken: false,
        }
    }

    pub fn plan(&self) -> &[ChapterPlan] {
        &self.plan
    }

    pub fn phase(&self) -> MockPhase {
        self.phase
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.phase, MockPhase::Finished { .. })
    }

    pub fn start(&mut self, now: DateTime<Utc>) -> Result<(), SessionError> {
        if self.phase != MockPhase::NotStarted {
            return Err(SessionError::NotInProgress);
        }
        log::info!("Mock exam started with {} chapters", self.plan.len());
        self.start_chapter(0, now);
        Ok(())
    }

    pub fn current_question(&self) -> Option<&Question> {
        match self.phase {
            MockPhase::Chapter { index } => self.chapters.get(index)?.current_question(),
            _ => None,
        }
    }

    /// The latest answer given to `item_id` so far, in any chapter.
    pub fn find_answer(&self, item_id: &str) -> Option<&AnsweredQuestion> {
        let current = match self.phase {
            MockPhase::Chapter { index } => self.chapters.get(index).map(Session::answers),
            _ => None,
        };
        current
            .unwrap_or_default()
            .iter()
            .rev()
            .chain(self.answers.iter().rev())
            .find(|answered| answered.item_id() == item_id)
    }

    /// Time left in the current chapter or break.
    pub fn remaining(&self, now: DateTime<Utc>) -> Option<Duration> {
        match self.phase {
            MockPhase::Chapter { index } => self
                .chapters
                .get(index)?
                .countdown()
                .map(|countdown| countdown.remaining(now)),
            MockPhase::Break { until, .. } => Some((until - now).max(Duration::zero())),
            MockPhase::NotStarted | MockPhase::Finished { .. } => None,
        }
    }

    /// Advances through every deadline that has passed by `now`.
    pub fn tick(&mut self, now: DateTime<Utc>) {
        loop {
            match self.phase {
                MockPhase::Chapter { index } => {
                    let Some(chapter) = self.chapters.get_mut(index) else {
                        return;
                    };
                    let deadline = chapter.countdown().map(|countdown| countdown.deadline);
                    if !chapter.tick(now) {
                        return;
                    }
                    self.end_chapter(index, deadline.unwrap_or(now));
                }
                MockPhase::Break { next, until } if until <= now => self.start_chapter(next, until),
                _ => return,
            }
        }
    }

    pub fn answer(
        &mut self,
        item_id: &str,
        answer: &str,
        now: DateTime<Utc>,
    ) -> Result<Resolution, SessionError> {
        self.tick(now);
        let MockPhase::Chapter { index } = self.phase else {
            return Err(SessionError::NotInProgress);
        };
        let chapter = self
            .chapters
            .get_mut(index)
            .ok_or(SessionError::NotInProgress)?;
        let resolution = chapter.resolve_answer(item_id, answer, now)?;
        if resolution.finished {
            self.end_chapter(index, now);
        }
        Ok(resolution)
    }

    pub fn skip_break(&mut self, now: DateTime<Utc>) -> Result<(), SessionError> {
        match self.phase {
            MockPhase::Break { next, .. } => {
                self.start_chapter(next, now);
                Ok(())
            }
            _ => Err(SessionError::NotInProgress),
        }
    }

    pub fn abandon(&mut self, now: DateTime<Utc>) {
        match self.phase {
            MockPhase::Chapter { index } => {
                if let Some(chapter) = self.chapters.get_mut(index) {
                    chapter.abandon(now);
                }
                self.record_score(index);
            }
            MockPhase::NotStarted | MockPhase::Break { .. } => {}
            MockPhase::Finished { .. } => return,
        }
        log::info!("Mock exam abandoned");
        self.abandoned = true;
        self.phase = MockPhase::Finished { at: now };
    }

    pub fn take_result(&mut self) -> Option<MockExamResult> {
        let MockPhase::Finished { at } = self.phase else {
            return None;
        };
        if self.result_taken {
            return None;
        }
        self.result_taken = true;

        let correct = self.scores.iter().map(|score| score.correct).sum();
        let total = self.scores.iter().map(|score| score.total).sum();
        Some(MockExamResult {
            correct,
            total,
            scaled_score: scaled_score(correct, total),
            chapters: self.scores.clone(),
            details: if self.full {
                "סימולציה מלאה"
            } else {
                "מיני-סימולציה"
            }
            .to_string(),
            abandoned: self.abandoned,
            timestamp: at,
            answers: self.answers.clone(),
        })
    }

    fn start_chapter(&mut self, index: usize, at: DateTime<Utc>) {
        let Some(chapter) = self.chapters.get_mut(index) else {
            self.phase = MockPhase::Finished { at };
            return;
        };
        if let Err(e) = chapter.start(at) {
            log::error!("Chapter {index} could not start: {e}");
        }
        self.phase = MockPhase::Chapter { index };
        // a chapter with no questions ends as soon as it starts
        if chapter.is_finished() {
            self.end_chapter(index, at);
        }
    }

    fn end_chapter(&mut self, index: usize, at: DateTime<Utc>) {
        let empty = self
            .chapters
            .get(index)
            .is_none_or(|chapter| chapter.selection().items.is_empty());
        self.record_score(index);
        let next = index + 1;
        if next >= self.chapters.len() {
            log::info!("Mock exam finished");
            self.phase = MockPhase::Finished { at };
        } else if empty {
            // no break after a chapter with no questions
            self.start_chapter(next, at);
        } else {
            self.phase = MockPhase::Break {
                next,
                until: saturating_add(at, self.break_duration),
            };
        }
    }

    fn record_score(&mut self, index: usize) {
        let (Some(chapter), Some(plan)) = (self.chapters.get_mut(index), self.plan.get(index)) else {
            return;
        };
        if let Some(result) = chapter.take_result() {
            self.scores.push(ChapterScore {
                title: plan.title.clone(),
                correct: result.correct_count,
                total: result.total,
            });
            self.answers.extend(result.answers);
        }
    }
}

fn draw_chapter(
    chapter: &ChapterPlan,
    catalog: &Catalog,
    config: &EngineConfig,
    rng: &mut impl Rng,
) -> Vec<Question> {
    let candidates: Vec<&Item> = chapter
        .kind
        .topics()
        .iter()
        .flat_map(|topic| catalog.pool(*topic))
        .collect();
    let mut picked: Vec<&Item> = candidates
        .choose_multiple(rng, chapter.question_count)
        .copied()
        .collect();
    picked.shuffle(rng);
    picked
        .into_iter()
        .map(|item| {
            Question::new(
                item.clone(),
                catalog.pool(item.topic),
                config.max_options,
                rng,
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use content_utils::TopicMap;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn catalog(per_topic: usize) -> Catalog {
        let pool = |prefix: &str, category: &str, topic: Topic| {
            (0..per_topic)
                .map(|n| Item {
                    id: format!("{prefix}{n}"),
                    display_term: format!("{prefix} term {n}"),
                    definition: format!("{prefix} answer {n}"),
                    example: String::new(),
                    category: category.to_string(),
                    topic,
                    difficulty: None,
                    question: None,
                    correct_answer: None,
                })
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

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 7, 1, 9, 0, 0).unwrap()
    }

    #[test]
    fn test_plans() {
        assert_eq!(full_plan().len(), 8);
        assert_eq!(plan_for(Tier::Free).len(), 3);
        assert_eq!(plan_for(Tier::Plus), mini_plan());
        assert_eq!(plan_for(Tier::Pro)[6].kind, ChapterKind::Verbal);
    }

    #[test]
    fn test_scaled_score() {
        assert_eq!(scaled_score(0, 0), 200);
        assert_eq!(scaled_score(0, 60), 200);
        assert_eq!(scaled_score(60, 60), 800);
        assert_eq!(scaled_score(30, 60), 500);
    }

    #[test]
    fn test_chapters_draw_from_their_topics() {
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        let exam = MockExam::build(Tier::Free, &catalog(30), &EngineConfig::default(), &mut rng);
        for (session, plan) in exam.chapters.iter().zip(exam.plan()) {
            let ItemSet::Exam(questions) = &session.selection().items else {
                panic!("chapters are exams");
            };
            assert_eq!(questions.len(), 20);
            for question in questions {
                assert!(plan.kind.topics().contains(&question.item.topic));
            }
        }
    }

    #[test]
    fn test_timeouts_and_breaks_run_in_order() {
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        let mut exam = MockExam::build(Tier::Free, &catalog(30), &EngineConfig::default(), &mut rng);
        exam.start(now()).unwrap();
        assert_eq!(exam.phase(), MockPhase::Chapter { index: 0 });

        let chapter_end = now() + Duration::seconds(1200);
        exam.tick(chapter_end);
        assert_eq!(
            exam.phase(),
            MockPhase::Break {
                next: 1,
                until: chapter_end + Duration::seconds(60)
            }
        );

        exam.skip_break(chapter_end).unwrap();
        assert_eq!(exam.phase(), MockPhase::Chapter { index: 1 });

        // far past both remaining chapters and the break between them
        exam.tick(now() + Duration::hours(3));
        assert!(exam.is_finished());

        let result = exam.take_result().unwrap();
        assert_eq!(result.chapters.len(), 3);
        assert_eq!(result.total, 60);
        assert_eq!(result.correct, 0);
        assert_eq!(result.scaled_score, 200);
        assert_eq!(result.details, "מיני-סימולציה");
        assert!(exam.take_result().is_none());
    }

    #[test]
    fn test_answering_a_whole_chapter_starts_the_break() {
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let mut exam = MockExam::build(Tier::Free, &catalog(30), &EngineConfig::default(), &mut rng);
        exam.start(now()).unwrap();
        for _ in 0..20 {
            let question = exam.current_question().unwrap().clone();
            exam.answer(&question.item.id, &question.correct_answer, now())
                .unwrap();
        }
        assert_eq!(
            exam.phase(),
            MockPhase::Break {
                next: 1,
                until: now() + Duration::seconds(60)
            }
        );
        assert_eq!(exam.remaining(now()), Some(Duration::seconds(60)));

        exam.abandon(now());
        let result = exam.take_result().unwrap();
        assert!(result.abandoned);
        assert_eq!(result.correct, 20);
        assert_eq!(result.total, 20);
        assert_eq!(result.answers.len(), 20);
        assert!(result.answers.iter().all(|answered| answered.correct));
    }

    #[test]
    fn test_answers_are_found_across_chapters() {
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let mut exam = MockExam::build(Tier::Free, &catalog(30), &EngineConfig::default(), &mut rng);
        exam.start(now()).unwrap();
        let first = exam.current_question().unwrap().clone();
        exam.answer(&first.item.id, "a guess", now()).unwrap();
        assert_eq!(
            exam.find_answer(&first.item.id).map(|answered| answered.chosen.as_str()),
            Some("a guess")
        );

        exam.tick(now() + Duration::seconds(1200));
        exam.skip_break(now() + Duration::seconds(1200)).unwrap();
        let found = exam.find_answer(&first.item.id).unwrap();
        assert!(!found.correct);
        assert_eq!(found.question, first);
        assert_eq!(exam.find_answer("nothing"), None);
    }

    #[test]
    fn test_empty_catalog_finishes_at_once() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut exam = MockExam::build(Tier::Pro, &catalog(0), &EngineConfig::default(), &mut rng);
        exam.start(now()).unwrap();
        assert_eq!(exam.phase(), MockPhase::Finished { at: now() });
        let result = exam.take_result().unwrap();
        assert_eq!(result.total, 0);
        assert_eq!(result.chapters.len(), 8);
        assert_eq!(result.details, "סימולציה מלאה");
    }
}
