use indexmap::IndexMap;
use serde::Serialize;
use serde_with::skip_serializing_none;
use utoipa::ToSchema;
use uuid::Uuid;

/// Token and the number of times it occurred.
#[derive(Debug, Clone, Serialize, PartialEq, Eq, ToSchema)]
pub struct WordCount {
    pub word: String,
    pub count: u64,
}

/// One graded response in a quiz or memory game breakdown.
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, PartialEq, ToSchema)]
pub struct GradedResponse {
    pub student_id: Uuid,
    pub student_name: Option<String>,
    pub answer: String,
    pub is_correct: bool,
    pub score: u8,
    pub submitted_at: String,
}

/// Aggregate view of an activity's responses.
#[derive(Debug, Clone, Serialize, PartialEq, ToSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActivityResults {
    Poll {
        /// Count per declared option, in declaration order.
        #[schema(value_type = Object)]
        options: IndexMap<String, u64>,
        total_responses: u64,
    },
    Quiz {
        correct_count: u64,
        total_responses: u64,
        /// Mean score in `[0, 1]`.
        average_score: f64,
        responses: Vec<GradedResponse>,
    },
    MemoryGame {
        correct_count: u64,
        total_responses: u64,
        /// Share of correct responses, as a percentage.
        accuracy: f64,
        responses: Vec<GradedResponse>,
    },
    WordCloud {
        words: Vec<WordCount>,
        total_responses: u64,
    },
    ShortAnswer {
        words: Vec<WordCount>,
        total_responses: u64,
        unique_words: u64,
    },
}
