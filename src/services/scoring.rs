use crate::dao::models::{ActivityEntity, ActivityKind, QuizKind};

/// Outcome of grading one answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Grade {
    pub is_correct: bool,
    /// 1 when correct, 0 otherwise.
    pub score: u8,
}

impl Grade {
    fn from_correct(is_correct: bool) -> Self {
        Self {
            is_correct,
            score: u8::from(is_correct),
        }
    }
}

/// Grade `answer` for grade-able kinds; `None` for polls, short answers and word clouds.
///
/// `correct_sequence` is only consulted for memory games stored without an answer key.
pub fn grade(
    activity: &ActivityEntity,
    answer: &str,
    correct_sequence: Option<&str>,
) -> Option<Grade> {
    match activity.kind {
        ActivityKind::Quiz => {
            let expected = activity.correct_answer.as_deref().unwrap_or_default();
            let is_correct = match activity.quiz_kind.unwrap_or(QuizKind::MultipleChoice) {
                QuizKind::MultipleChoice | QuizKind::FillBlank => {
                    !expected.trim().is_empty() && loosely_equal(answer, expected)
                }
                QuizKind::TrueFalse => match (as_boolean(answer), as_boolean(expected)) {
                    (Some(given), Some(key)) => given == key,
                    _ => false,
                },
            };
            Some(Grade::from_correct(is_correct))
        }
        ActivityKind::MemoryGame => {
            let expected = activity.correct_answer.as_deref().or(correct_sequence);
            let is_correct = expected.is_some_and(|expected| {
                let expected = sequence(expected);
                !expected.is_empty() && sequence(answer) == expected
            });
            Some(Grade::from_correct(is_correct))
        }
        ActivityKind::Poll | ActivityKind::ShortAnswer | ActivityKind::WordCloud => None,
    }
}

fn loosely_equal(answer: &str, expected: &str) -> bool {
    answer.trim().to_lowercase() == expected.trim().to_lowercase()
}

fn as_boolean(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

/// Comma-separated items, trimmed and lowercased, in order.
fn sequence(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|item| item.trim().to_lowercase())
        .filter(|item| !item.is_empty())
        .collect()
}
