use content_utils::Item;
use content_utils::explain::ExplainRequest;
use content_utils::text_cleanup::{normalize_answer, same_answer};
use rand::Rng;
use rand::seq::{IndexedRandom, SliceRandom};
use serde::{Deserialize, Serialize};

/// A multiple-choice question built from a flashcard-style item.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, tsify::Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub item: Item,
    /// Shuffled. Always contains `correct_answer` exactly once.
    pub options: Vec<String>,
    pub correct_answer: String,
}

impl Question {
    pub fn new(item: Item, pool: &[Item], max_options: usize, rng: &mut impl Rng) -> Self {
        let options = generate_options(&item, pool, max_options, rng);
        Self {
            correct_answer: item.answer().to_string(),
            item,
            options,
        }
    }

    pub fn correct_index(&self) -> Option<usize> {
        self.options
            .iter()
            .position(|option| option == &self.correct_answer)
    }

    pub fn is_correct(&self, answer: &str) -> bool {
        same_answer(answer, &self.correct_answer)
    }

    /// What the explanation collaborator needs to explain this question.
    pub fn explain_request(&self, student_answer: Option<&str>) -> ExplainRequest {
        ExplainRequest {
            question: self.item.prompt().to_string(),
            options: self.options.clone(),
            correct_answer: self.correct_answer.clone(),
            student_answer: student_answer.map(str::to_string),
            category: self.item.category.clone(),
        }
    }
}

impl From<&Item> for Question {
    /// A card seen as a one-option question, for explaining flashcards.
    fn from(item: &Item) -> Self {
        Self {
            item: item.clone(),
            options: vec![item.answer().to_string()],
            correct_answer: item.answer().to_string(),
        }
    }
}

/// Builds the options for `correct`: its own answer plus up to `max_options - 1` wrong answers taken
/// from items of the same category in `pool`, in random order.
///
/// A thin category yields fewer options, down to the correct answer alone. Options from other
/// categories are never used to pad the set.
pub fn generate_options(
    correct: &Item,
    pool: &[Item],
    max_options: usize,
    rng: &mut impl Rng,
) -> Vec<String> {
    let answer = correct.answer().to_string();
    let mut seen = vec![normalize_answer(&answer)];
    let candidates: Vec<&str> = pool
        .iter()
        .filter(|item| item.category == correct.category && item.id != correct.id)
        .map(Item::answer)
        .filter(|candidate| {
            let normalized = normalize_answer(candidate);
            if normalized.is_empty() || seen.contains(&normalized) {
                return false;
            }
            seen.push(normalized);
            true
        })
        .collect();

    let wanted = max_options.saturating_sub(1);
    let mut options: Vec<String> = std::iter::once(answer)
        .chain(
            candidates
                .choose_multiple(rng, wanted)
                .map(|candidate| candidate.to_string()),
        )
        .collect();
    options.shuffle(rng);
    options
}
