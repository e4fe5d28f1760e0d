use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::dao::models::{Difficulty, QuestionEntity};

/// Question as served to a player; the correct index stays on the server.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct QuestionView {
    pub question_id: Uuid,
    pub question: String,
    pub options: Vec<String>,
    pub difficulty: Difficulty,
    pub topic: String,
    /// 1-based position of this question in the caller's run.
    pub number: u32,
    pub max_questions: u32,
}

impl QuestionView {
    pub(crate) fn new(question: &QuestionEntity, number: u32, max_questions: u32) -> Self {
        Self {
            question_id: question.id,
            question: question.question.clone(),
            options: question.options.clone(),
            difficulty: question.difficulty,
            topic: question.topic.clone(),
            number,
            max_questions,
        }
    }
}

/// Next question, or `null` when the game's pool has nothing left to serve.
#[derive(Debug, Serialize, ToSchema)]
pub struct NextQuestionResponse {
    pub question: Option<QuestionView>,
}

/// Answer to a served question.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct AnswerRequest {
    pub question_id: Uuid,
    /// Index of the chosen option.
    #[validate(range(max = 3))]
    pub answer_index: u8,
}

/// Result of an accepted answer.
#[derive(Debug, Serialize, ToSchema)]
pub struct AnswerOutcome {
    pub correct: bool,
    pub correct_answer: u8,
    pub explanation: String,
    /// Points won or lost by this answer.
    pub score_delta: i64,
    /// Caller's score in this game after the answer.
    pub game_score: i64,
    /// Caller's lifetime score after the answer.
    pub overall_score: i64,
    /// True when this answer ended the game.
    pub game_finished: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn answer_index_must_name_one_of_four_options() {
        let request = AnswerRequest {
            question_id: Uuid::new_v4(),
            answer_index: 4,
        };
        assert!(request.validate().is_err());

        let request = AnswerRequest {
            question_id: Uuid::new_v4(),
            answer_index: 3,
        };
        assert!(request.validate().is_ok());
    }

    #[test]
    fn served_view_hides_the_correct_answer() {
        let question = QuestionEntity {
            id: Uuid::new_v4(),
            question: "What is 2 + 2?".into(),
            options: vec!["3".into(), "4".into(), "5".into(), "6".into()],
            correct_answer: 1,
            difficulty: Difficulty::Easy,
            topic: "addition".into(),
            explanation: "2 + 2 = 4".into(),
        };

        let value = serde_json::to_value(QuestionView::new(&question, 1, 5)).unwrap();
        assert!(value.get("correct_answer").is_none());
        assert!(value.get("explanation").is_none());
        assert_eq!(value["options"].as_array().map(Vec::len), Some(4));
    }
}
