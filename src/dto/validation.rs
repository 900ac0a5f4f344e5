//! Validation helpers for DTOs.

use std::collections::HashSet;

use validator::{ValidationError, ValidationErrors};

use crate::{
    dao::models::{ActivityKind, QuizKind},
    dto::activity::CreateActivityRequest,
};

const MAX_PROMPT_CHARS: usize = 2_000;
const MAX_DURATION_SECONDS: u32 = 24 * 60 * 60;

fn error(code: &'static str, message: &'static str) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(message.into());
    err
}

/// Checks that an activity definition is consistent with its kind.
///
/// Polls and multiple-choice quizzes need at least two distinct options, quizzes
/// need an answer key (which must be one of the options for multiple choice), and
/// true/false keys must read `true` or `false`.
pub fn validate_activity_shape(request: &CreateActivityRequest) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();

    let prompt = request.prompt.trim();
    if prompt.is_empty() {
        errors.add("prompt", error("prompt_empty", "Prompt cannot be empty"));
    } else if prompt.chars().count() > MAX_PROMPT_CHARS {
        errors.add("prompt", error("prompt_length", "Prompt is too long"));
    }

    if request.duration_seconds == 0 || request.duration_seconds > MAX_DURATION_SECONDS {
        errors.add(
            "duration_seconds",
            error(
                "duration_range",
                "Duration must be between 1 second and 24 hours",
            ),
        );
    }

    if request.quiz_kind.is_some() && request.kind != ActivityKind::Quiz {
        errors.add(
            "quiz_kind",
            error("quiz_kind_unexpected", "Only quizzes take a quiz kind"),
        );
    }

    let needs_options = match request.kind {
        ActivityKind::Poll => true,
        ActivityKind::Quiz => {
            matches!(request.quiz_kind, None | Some(QuizKind::MultipleChoice))
        }
        _ => false,
    };
    if needs_options {
        if let Err(err) = validate_options(&request.options) {
            errors.add("options", err);
        }
    }

    if request.kind == ActivityKind::Quiz {
        match request.correct_answer.as_deref().map(str::trim) {
            None | Some("") => errors.add(
                "correct_answer",
                error("correct_answer_missing", "Quizzes need a correct answer"),
            ),
            Some(answer) => match request.quiz_kind {
                Some(QuizKind::TrueFalse) => {
                    let normalized = answer.to_lowercase();
                    if normalized != "true" && normalized != "false" {
                        errors.add(
                            "correct_answer",
                            error(
                                "correct_answer_boolean",
                                "True/false answers must be `true` or `false`",
                            ),
                        );
                    }
                }
                None | Some(QuizKind::MultipleChoice) => {
                    let listed = request
                        .options
                        .iter()
                        .any(|option| option.trim().eq_ignore_ascii_case(answer));
                    if !listed {
                        errors.add(
                            "correct_answer",
                            error(
                                "correct_answer_not_option",
                                "Correct answer must be one of the options",
                            ),
                        );
                    }
                }
                Some(QuizKind::FillBlank) => {}
            },
        }
    }

    if request.kind == ActivityKind::MemoryGame {
        if let Some(sequence) = request.correct_answer.as_deref() {
            if sequence.split(',').all(|token| token.trim().is_empty()) {
                errors.add(
                    "correct_answer",
                    error(
                        "sequence_empty",
                        "Memory game sequence needs at least one item",
                    ),
                );
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_options(options: &[String]) -> Result<(), ValidationError> {
    if options.len() < 2 {
        return Err(error("options_count", "At least two options are required"));
    }
    if options.iter().any(|option| option.trim().is_empty()) {
        return Err(error("options_blank", "Options cannot be blank"));
    }
    let mut seen = HashSet::new();
    if !options.iter().all(|option| seen.insert(option.trim())) {
        return Err(error("options_duplicate", "Options must be distinct"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(kind: ActivityKind) -> CreateActivityRequest {
        CreateActivityRequest {
            kind,
            quiz_kind: None,
            prompt: "Which one?".into(),
            options: vec![],
            correct_answer: None,
            duration_seconds: 60,
        }
    }

    fn failing_fields(request: &CreateActivityRequest) -> Vec<String> {
        let mut fields: Vec<String> = validate_activity_shape(request)
            .err()
            .map(|errors| {
                errors
                    .field_errors()
                    .keys()
                    .map(|field| field.to_string())
                    .collect()
            })
            .unwrap_or_default();
        fields.sort();
        fields
    }

    #[test]
    fn poll_needs_distinct_options() {
        let mut poll = request(ActivityKind::Poll);
        assert_eq!(failing_fields(&poll), vec!["options"]);

        poll.options = vec!["A".into(), "A ".into()];
        assert_eq!(failing_fields(&poll), vec!["options"]);

        poll.options = vec!["A".into(), "B".into(), "C".into()];
        assert!(validate_activity_shape(&poll).is_ok());
    }

    #[test]
    fn quiz_answer_key_rules() {
        let mut quiz = request(ActivityKind::Quiz);
        quiz.options = vec!["Paris".into(), "London".into()];
        assert_eq!(failing_fields(&quiz), vec!["correct_answer"]);

        quiz.correct_answer = Some("paris".into());
        assert!(validate_activity_shape(&quiz).is_ok());

        quiz.correct_answer = Some("Berlin".into());
        assert_eq!(failing_fields(&quiz), vec!["correct_answer"]);

        let mut tf = request(ActivityKind::Quiz);
        tf.quiz_kind = Some(QuizKind::TrueFalse);
        tf.correct_answer = Some("TRUE".into());
        assert!(validate_activity_shape(&tf).is_ok());
        tf.correct_answer = Some("yes".into());
        assert_eq!(failing_fields(&tf), vec!["correct_answer"]);
    }

    #[test]
    fn generic_fields() {
        let mut cloud = request(ActivityKind::WordCloud);
        cloud.prompt = "   ".into();
        cloud.duration_seconds = 0;
        cloud.quiz_kind = Some(QuizKind::FillBlank);
        assert_eq!(
            failing_fields(&cloud),
            vec!["duration_seconds", "prompt", "quiz_kind"]
        );
    }

    #[test]
    fn memory_sequence_cannot_be_blank() {
        let mut memory = request(ActivityKind::MemoryGame);
        assert!(validate_activity_shape(&memory).is_ok());
        memory.correct_answer = Some(" , ,".into());
        assert_eq!(failing_fields(&memory), vec!["correct_answer"]);
    }
}
