use std::{
    collections::{HashMap, HashSet},
    sync::LazyLock,
};

use indexmap::IndexMap;
use regex::Regex;
use time::UtcOffset;
use uuid::Uuid;

use crate::{
    dao::{
        directory::UserEntity,
        models::{ActivityEntity, ActivityKind, ResponseEntity},
    },
    dto::{
        format_system_time,
        results::{ActivityResults, GradedResponse, WordCount},
    },
    error::ServiceError,
    services::access::{ensure_controller, load_activity},
    state::SharedState,
};

const WORD_CLOUD_LIMIT: usize = 50;
const SHORT_ANSWER_LIMIT: usize = 200;
const MIN_WORD_LEN: usize = 3;

static WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("[A-Za-z]+").expect("word pattern compiles"));

static STOP_WORDS: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by",
        "from", "as", "is", "was", "are", "were", "be", "been", "being", "have", "has", "had",
        "do", "does", "did", "will", "would", "should", "could", "may", "might", "must", "can",
        "this", "that", "these", "those", "i", "you", "he", "she", "it", "we", "they", "them",
        "their", "what", "which", "who", "when", "where", "why", "how", "all", "each", "every",
        "both", "few", "more", "most", "other", "some", "such", "no", "nor", "not", "only", "own",
        "same", "so", "than", "too", "very", "s", "t", "just", "don", "now", "my", "me", "about",
        "up", "out", "if", "into", "through", "over", "before", "after", "above", "below",
        "between", "during", "without", "under", "again", "further", "then", "once", "here",
        "there", "also", "any", "because", "until", "while",
    ]
    .into_iter()
    .collect()
});

/// Aggregated results of an activity, for its instructor or an admin.
pub async fn activity_results(
    state: &SharedState,
    user: &UserEntity,
    activity_id: Uuid,
) -> Result<ActivityResults, ServiceError> {
    let store = state.require_activity_store().await?;
    let activity = load_activity(&store, activity_id).await?;
    ensure_controller(user, &activity)?;

    let responses = store.list_responses(activity_id).await?;
    let names = if activity.kind.is_gradeable() {
        display_names(state, &responses).await?
    } else {
        HashMap::new()
    };

    Ok(aggregate(
        &activity,
        &responses,
        &names,
        state.config().wire_offset(),
    ))
}

/// Resolve the display name of every student that responded.
pub async fn display_names(
    state: &SharedState,
    responses: &[ResponseEntity],
) -> Result<HashMap<Uuid, String>, ServiceError> {
    Ok(resolve_users(state, responses)
        .await?
        .into_iter()
        .map(|(id, user)| (id, user.display_name))
        .collect())
}

/// Look up the directory record of every student that responded.
pub async fn resolve_users(
    state: &SharedState,
    responses: &[ResponseEntity],
) -> Result<HashMap<Uuid, UserEntity>, ServiceError> {
    let directory = state.directory();
    let mut users = HashMap::new();
    for response in responses {
        if users.contains_key(&response.student_id) {
            continue;
        }
        if let Some(user) = directory.find_user(response.student_id).await? {
            users.insert(response.student_id, user);
        }
    }
    Ok(users)
}

/// Compute the kind-specific aggregate of `responses`.
pub fn aggregate(
    activity: &ActivityEntity,
    responses: &[ResponseEntity],
    names: &HashMap<Uuid, String>,
    offset: UtcOffset,
) -> ActivityResults {
    let total_responses = responses.len() as u64;

    match activity.kind {
        ActivityKind::Poll => {
            let mut options: IndexMap<String, u64> = activity
                .options
                .iter()
                .map(|option| (option.clone(), 0))
                .collect();
            for response in responses {
                if let Some(count) = options.get_mut(&response.answer) {
                    *count += 1;
                }
            }
            ActivityResults::Poll {
                options,
                total_responses,
            }
        }
        ActivityKind::Quiz => {
            let graded = graded_responses(responses, names, offset);
            let correct_count = graded.iter().filter(|r| r.is_correct).count() as u64;
            let score_sum: u64 = graded.iter().map(|r| u64::from(r.score)).sum();
            ActivityResults::Quiz {
                correct_count,
                total_responses,
                average_score: ratio(score_sum, total_responses),
                responses: graded,
            }
        }
        ActivityKind::MemoryGame => {
            let graded = graded_responses(responses, names, offset);
            let correct_count = graded.iter().filter(|r| r.is_correct).count() as u64;
            let accuracy = (ratio(correct_count, total_responses) * 1_000.0).round() / 10.0;
            ActivityResults::MemoryGame {
                correct_count,
                total_responses,
                accuracy,
                responses: graded,
            }
        }
        ActivityKind::WordCloud => {
            let tokens = responses.iter().flat_map(|response| {
                response
                    .answer
                    .split(',')
                    .map(|token| token.trim().to_lowercase())
                    .filter(|token| !token.is_empty())
            });
            let counts = count_tokens(tokens);
            ActivityResults::WordCloud {
                words: top(counts, WORD_CLOUD_LIMIT),
                total_responses,
            }
        }
        ActivityKind::ShortAnswer => {
            let tokens = responses.iter().flat_map(|response| {
                WORD.find_iter(&response.answer)
                    .map(|found| found.as_str().to_lowercase())
                    .filter(|word| {
                        word.len() >= MIN_WORD_LEN && !STOP_WORDS.contains(word.as_str())
                    })
                    .collect::<Vec<_>>()
            });
            let counts = count_tokens(tokens);
            let unique_words = counts.len() as u64;
            ActivityResults::ShortAnswer {
                words: top(counts, SHORT_ANSWER_LIMIT),
                total_responses,
                unique_words,
            }
        }
    }
}

fn graded_responses(
    responses: &[ResponseEntity],
    names: &HashMap<Uuid, String>,
    offset: UtcOffset,
) -> Vec<GradedResponse> {
    responses
        .iter()
        .map(|response| GradedResponse {
            student_id: response.student_id,
            student_name: names.get(&response.student_id).cloned(),
            answer: response.answer.clone(),
            is_correct: response.is_correct.unwrap_or(false),
            score: response.score.unwrap_or(0),
            submitted_at: format_system_time(response.submitted_at, offset),
        })
        .collect()
}

fn ratio(part: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64
    }
}

/// Count tokens, remembering the order each was first seen.
fn count_tokens(tokens: impl IntoIterator<Item = String>) -> IndexMap<String, u64> {
    let mut counts = IndexMap::new();
    for token in tokens {
        *counts.entry(token).or_insert(0) += 1;
    }
    counts
}

/// Highest counts first; ties keep first-seen order.
fn top(counts: IndexMap<String, u64>, limit: usize) -> Vec<WordCount> {
    let mut ranked: Vec<WordCount> = counts
        .into_iter()
        .map(|(word, count)| WordCount { word, count })
        .collect();
    ranked.sort_by(|a, b| b.count.cmp(&a.count));
    ranked.truncate(limit);
    ranked
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use super::*;
    use crate::dao::models::{LifecycleEntity, QuizKind};

    fn activity(kind: ActivityKind, options: &[&str]) -> ActivityEntity {
        ActivityEntity {
            id: Uuid::new_v4(),
            course_id: Uuid::new_v4(),
            instructor_id: Uuid::new_v4(),
            kind,
            quiz_kind: (kind == ActivityKind::Quiz).then_some(QuizKind::MultipleChoice),
            prompt: "?".into(),
            options: options.iter().map(|o| o.to_string()).collect(),
            correct_answer: None,
            duration_seconds: 60,
            lifecycle: LifecycleEntity::draft(),
            join_token: None,
            created_at: SystemTime::now(),
        }
    }

    fn response(activity: &ActivityEntity, answer: &str, grade: Option<bool>) -> ResponseEntity {
        ResponseEntity {
            id: Uuid::new_v4(),
            activity_id: activity.id,
            student_id: Uuid::new_v4(),
            answer: answer.into(),
            is_correct: grade,
            score: grade.map(u8::from),
            points_earned: grade.map(u8::from),
            submitted_at: SystemTime::now(),
        }
    }

    fn run(activity: &ActivityEntity, responses: &[ResponseEntity]) -> ActivityResults {
        aggregate(activity, responses, &HashMap::new(), UtcOffset::UTC)
    }

    fn words(pairs: &[(&str, u64)]) -> Vec<WordCount> {
        pairs
            .iter()
            .map(|(word, count)| WordCount {
                word: word.to_string(),
                count: *count,
            })
            .collect()
    }

    #[test]
    fn poll_counts_declared_options_only() {
        let poll = activity(ActivityKind::Poll, &["A", "B", "C"]);
        let responses = ["A", "B", "A", "D", "a"].map(|answer| response(&poll, answer, None));

        let ActivityResults::Poll {
            options,
            total_responses,
        } = run(&poll, &responses)
        else {
            panic!("expected poll results");
        };
        assert_eq!(total_responses, 5);
        assert_eq!(
            options.into_iter().collect::<Vec<_>>(),
            vec![("A".to_string(), 2), ("B".to_string(), 1), ("C".to_string(), 0)]
        );
    }

    #[test]
    fn quiz_reports_correct_count_and_mean() {
        let quiz = activity(ActivityKind::Quiz, &["Paris", "London"]);
        let responses = [
            response(&quiz, "paris", Some(true)),
            response(&quiz, " Paris ", Some(true)),
            response(&quiz, "London", Some(false)),
        ];
        let names = HashMap::from([(responses[0].student_id, "Ada".to_string())]);

        let ActivityResults::Quiz {
            correct_count,
            total_responses,
            average_score,
            responses: breakdown,
        } = aggregate(&quiz, &responses, &names, UtcOffset::UTC)
        else {
            panic!("expected quiz results");
        };
        assert_eq!(correct_count, 2);
        assert_eq!(total_responses, 3);
        assert!((average_score - 0.667).abs() < 0.001);
        assert_eq!(breakdown[0].student_name.as_deref(), Some("Ada"));
        assert_eq!(breakdown[2].score, 0);
    }

    #[test]
    fn memory_game_accuracy_percentage() {
        let game = activity(ActivityKind::MemoryGame, &[]);
        let responses = [
            response(&game, "a,b", Some(true)),
            response(&game, "b,a", Some(false)),
            response(&game, "b,a", Some(false)),
        ];
        let ActivityResults::MemoryGame { accuracy, .. } = run(&game, &responses) else {
            panic!("expected memory game results");
        };
        assert_eq!(accuracy, 33.3);

        let ActivityResults::MemoryGame { accuracy, .. } = run(&game, &[]) else {
            panic!("expected memory game results");
        };
        assert_eq!(accuracy, 0.0);
    }

    #[test]
    fn word_cloud_splits_and_ranks() {
        let cloud = activity(ActivityKind::WordCloud, &[]);
        let responses = [
            "focus, resilience, growth",
            "focus, curiosity",
            "GROWTH",
        ]
        .map(|answer| response(&cloud, answer, None));

        assert_eq!(
            run(&cloud, &responses),
            ActivityResults::WordCloud {
                words: words(&[
                    ("focus", 2),
                    ("growth", 2),
                    ("resilience", 1),
                    ("curiosity", 1)
                ]),
                total_responses: 3,
            }
        );
    }

    #[test]
    fn short_answer_filters_stop_words_and_short_tokens() {
        let short = activity(ActivityKind::ShortAnswer, &[]);
        let responses = [
            "The loop is an iterator over the data",
            "Iterator-based loops, no data races!",
            "ok 42 go",
        ]
        .map(|answer| response(&short, answer, None));

        assert_eq!(
            run(&short, &responses),
            ActivityResults::ShortAnswer {
                words: words(&[
                    ("iterator", 2),
                    ("data", 2),
                    ("loop", 1),
                    ("based", 1),
                    ("loops", 1),
                    ("races", 1),
                ]),
                total_responses: 3,
                unique_words: 6,
            }
        );
    }

    #[test]
    fn word_cloud_is_capped() {
        let cloud = activity(ActivityKind::WordCloud, &[]);
        let answer = (0..80).map(|i| format!("w{i}")).collect::<Vec<_>>().join(",");
        let ActivityResults::WordCloud { words, .. } = run(&cloud, &[response(&cloud, &answer, None)])
        else {
            panic!("expected word cloud results");
        };
        assert_eq!(words.len(), WORD_CLOUD_LIMIT);
        assert_eq!(words[0].word, "w0");
    }
}
