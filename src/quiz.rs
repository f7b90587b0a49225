use std::collections::BTreeMap;

use anyhow::Context as _;
use serde::Serialize;
use serde_json::Value;

use crate::gemini::GenerationService;
use crate::model::{QuizItem, StoryResult};
use crate::prompt;

pub const QUIZ_LENGTH: usize = 3;
pub const OPTIONS_PER_QUESTION: usize = 4;

/// Context handed to the quiz author: the displayed story plus its takeaways.
pub fn context(result: &StoryResult) -> String {
    format!(
        "Story: {}\n\nKey Takeaways: {}",
        result.story,
        result.key_takeaways.join(", ")
    )
}

pub async fn generate(
    service: &dyn GenerationService,
    model: &str,
    context: &str,
) -> anyhow::Result<Vec<QuizItem>> {
    tracing::info!(model, chars = context.chars().count(), "generate quiz");
    let request = prompt::quiz_request(model, context);
    let raw = service
        .generate(&request)
        .await
        .context("Failed to generate quiz")?;
    let value: Value = serde_json::from_str(raw.trim())
        .context("Failed to generate quiz: response is not valid JSON")?;
    validate(&value).context("Failed to generate quiz")
}

/// Accepts exactly three items, each with a question, four options and an
/// answer index pointing at one of them. Anything else fails as a whole.
pub fn validate(value: &Value) -> anyhow::Result<Vec<QuizItem>> {
    let Some(items) = value.as_array() else {
        anyhow::bail!("Generated quiz has an invalid format: expected an array");
    };
    if items.len() != QUIZ_LENGTH {
        anyhow::bail!(
            "Generated quiz has an invalid format: expected {QUIZ_LENGTH} questions, got {}",
            items.len()
        );
    }

    items
        .iter()
        .enumerate()
        .map(|(idx, item)| {
            validate_item(item).with_context(|| {
                format!("Generated quiz has an invalid format: question {}", idx + 1)
            })
        })
        .collect()
}

fn validate_item(item: &Value) -> anyhow::Result<QuizItem> {
    let question = item
        .get("question")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .ok_or_else(|| anyhow::anyhow!("missing question text"))?;

    let options = item
        .get("options")
        .and_then(Value::as_array)
        .ok_or_else(|| anyhow::anyhow!("missing options"))?;
    if options.len() != OPTIONS_PER_QUESTION {
        anyhow::bail!(
            "expected {OPTIONS_PER_QUESTION} options, got {}",
            options.len()
        );
    }
    let options = options
        .iter()
        .map(|option| {
            option
                .as_str()
                .map(str::to_owned)
                .ok_or_else(|| anyhow::anyhow!("option is not a string"))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    let index = item
        .get("correctAnswerIndex")
        .and_then(Value::as_f64)
        .ok_or_else(|| anyhow::anyhow!("missing numeric correctAnswerIndex"))?;
    if index.fract() != 0.0 || index < 0.0 || index >= OPTIONS_PER_QUESTION as f64 {
        anyhow::bail!("correctAnswerIndex out of range: {index}");
    }

    Ok(QuizItem {
        question: question.to_owned(),
        options,
        correct_answer_index: index as usize,
    })
}

/// A learner's pass over one quiz.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuizAttempt {
    items: Vec<QuizItem>,
    selections: BTreeMap<usize, usize>,
    score: Option<usize>,
}

impl QuizAttempt {
    pub fn new(items: Vec<QuizItem>) -> Self {
        Self {
            items,
            selections: BTreeMap::new(),
            score: None,
        }
    }

    pub fn items(&self) -> &[QuizItem] {
        &self.items
    }

    pub fn selection(&self, question: usize) -> Option<usize> {
        self.selections.get(&question).copied()
    }

    pub fn is_submitted(&self) -> bool {
        self.score.is_some()
    }

    pub fn score(&self) -> Option<usize> {
        self.score
    }

    /// Records a choice. Ignored after submission or for indices off the quiz.
    pub fn select(&mut self, question: usize, option: usize) -> bool {
        if self.is_submitted() {
            return false;
        }
        let Some(item) = self.items.get(question) else {
            return false;
        };
        if option >= item.options.len() {
            return false;
        }
        self.selections.insert(question, option);
        true
    }

    pub fn can_submit(&self) -> bool {
        !self.is_submitted() && (0..self.items.len()).all(|q| self.selections.contains_key(&q))
    }

    pub fn submit(&mut self) -> Option<usize> {
        if !self.can_submit() {
            return None;
        }
        let score = score(&self.items, &self.selections);
        self.score = Some(score);
        Some(score)
    }

    pub fn reset(&mut self) {
        self.selections.clear();
        self.score = None;
    }

    pub fn verdict(&self) -> Option<&'static str> {
        let score = self.score?;
        let total = self.items.len();
        Some(if score == total {
            "Perfect score!"
        } else if score * 2 > total {
            "Nice work!"
        } else {
            "Keep practicing!"
        })
    }
}

/// Number of selections matching the answer key.
pub fn score(items: &[QuizItem], selections: &BTreeMap<usize, usize>) -> usize {
    items
        .iter()
        .enumerate()
        .filter(|(idx, item)| selections.get(idx) == Some(&item.correct_answer_index))
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn item(question: &str, correct: usize) -> Value {
        json!({
            "question": question,
            "options": ["a", "b", "c", "d"],
            "correctAnswerIndex": correct,
        })
    }

    fn valid_quiz() -> Vec<QuizItem> {
        validate(&json!([item("q1", 0), item("q2", 1), item("q3", 3)])).unwrap()
    }

    #[test]
    fn accepts_three_complete_items() {
        let quiz = valid_quiz();
        assert_eq!(quiz.len(), 3);
        assert_eq!(quiz[2].correct_answer_index, 3);
        assert_eq!(quiz[0].options, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn rejects_wrong_item_count() {
        let err = validate(&json!([item("q1", 0), item("q2", 1)]))
            .unwrap_err()
            .to_string();
        assert!(err.contains("invalid format"));
        assert!(validate(&json!([])).is_err());
        assert!(validate(&json!({"question": "q"})).is_err());
    }

    #[test]
    fn rejects_item_with_three_options() {
        let bad = json!({"question": "q3", "options": ["a", "b", "c"], "correctAnswerIndex": 0});
        let err = validate(&json!([item("q1", 0), item("q2", 1), bad])).unwrap_err();
        assert!(format!("{err:#}").contains("expected 4 options, got 3"));
    }

    #[test]
    fn rejects_missing_question_or_bad_index() {
        let blank = json!({"question": " ", "options": ["a", "b", "c", "d"], "correctAnswerIndex": 0});
        assert!(validate(&json!([item("q1", 0), item("q2", 1), blank])).is_err());

        let text_index = json!({"question": "q", "options": ["a", "b", "c", "d"], "correctAnswerIndex": "1"});
        assert!(validate(&json!([item("q1", 0), item("q2", 1), text_index])).is_err());

        assert!(validate(&json!([item("q1", 0), item("q2", 1), item("q3", 4)])).is_err());
        let fractional = json!({"question": "q", "options": ["a", "b", "c", "d"], "correctAnswerIndex": 1.5});
        assert!(validate(&json!([item("q1", 0), item("q2", 1), fractional])).is_err());
    }

    #[test]
    fn submission_requires_every_answer() {
        let mut attempt = QuizAttempt::new(valid_quiz());
        assert!(attempt.select(0, 0));
        assert!(attempt.select(1, 1));
        assert!(!attempt.can_submit());
        assert_eq!(attempt.submit(), None);

        assert!(attempt.select(2, 0));
        assert_eq!(attempt.submit(), Some(2));
        assert_eq!(attempt.verdict(), Some("Nice work!"));
    }

    #[test]
    fn selections_are_frozen_after_submission() {
        let mut attempt = QuizAttempt::new(valid_quiz());
        attempt.select(0, 1);
        attempt.select(1, 0);
        attempt.select(2, 0);
        assert_eq!(attempt.submit(), Some(0));
        assert_eq!(attempt.verdict(), Some("Keep practicing!"));
        assert!(!attempt.select(0, 0));
        assert_eq!(attempt.selection(0), Some(1));
    }

    #[test]
    fn out_of_range_selection_is_ignored() {
        let mut attempt = QuizAttempt::new(valid_quiz());
        assert!(!attempt.select(5, 0));
        assert!(!attempt.select(0, 4));
        assert_eq!(attempt.selection(0), None);
    }

    #[test]
    fn reset_restores_pristine_state() {
        let pristine = QuizAttempt::new(valid_quiz());
        let mut attempt = pristine.clone();
        attempt.select(0, 0);
        attempt.select(1, 1);
        attempt.select(2, 3);
        assert_eq!(attempt.submit(), Some(3));
        assert_eq!(attempt.verdict(), Some("Perfect score!"));

        attempt.reset();
        assert_eq!(attempt, pristine);
        assert!(attempt.select(0, 2));
    }

    #[test]
    fn context_joins_story_and_takeaways() {
        let result = StoryResult {
            story: "Hoot: hi".to_owned(),
            mind_map: String::new(),
            mind_map_data: Default::default(),
            image_url: String::new(),
            key_takeaways: vec!["one".to_owned(), "two".to_owned()],
        };
        assert_eq!(context(&result), "Story: Hoot: hi\n\nKey Takeaways: one, two");
    }
}
