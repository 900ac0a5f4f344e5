use std::collections::HashMap;

use time::UtcOffset;
use uuid::Uuid;

use crate::{
    dao::{
        directory::UserEntity,
        models::{ActivityEntity, ActivityKind, ResponseEntity},
    },
    dto::format_export_time,
    error::ServiceError,
    services::{
        access::{ensure_controller, load_activity},
        results::resolve_users,
    },
    state::SharedState,
};

const QUIZ_HEADER: [&str; 6] = [
    "Student Name",
    "Student Email",
    "Answer",
    "Correct",
    "Score",
    "Submitted At",
];
const PLAIN_HEADER: [&str; 4] = ["Student Name", "Student Email", "Answer", "Submitted At"];

/// Rendered CSV document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvExport {
    pub filename: String,
    pub body: String,
}

/// Export every response of an activity as CSV.
pub async fn export_responses(
    state: &SharedState,
    user: &UserEntity,
    activity_id: Uuid,
) -> Result<CsvExport, ServiceError> {
    let store = state.require_activity_store().await?;
    let activity = load_activity(&store, activity_id).await?;
    ensure_controller(user, &activity)?;

    let responses = store.list_responses(activity_id).await?;
    let students = resolve_users(state, &responses).await?;

    Ok(CsvExport {
        filename: format!("activity_{activity_id}_responses.csv"),
        body: render_csv(
            &activity,
            &responses,
            &students,
            state.config().wire_offset(),
        ),
    })
}

/// One header line plus one line per response.
pub fn render_csv(
    activity: &ActivityEntity,
    responses: &[ResponseEntity],
    students: &HashMap<Uuid, UserEntity>,
    offset: UtcOffset,
) -> String {
    let graded = activity.kind == ActivityKind::Quiz;
    let mut out = String::new();
    let header: &[&str] = if graded { &QUIZ_HEADER } else { &PLAIN_HEADER };
    push_row(&mut out, header.iter().map(|cell| cell.to_string()));

    for response in responses {
        let student = students.get(&response.student_id);
        let mut row = vec![
            student
                .map(|s| s.display_name.clone())
                .unwrap_or_else(|| response.student_id.to_string()),
            student.map(|s| s.email.clone()).unwrap_or_default(),
            response.answer.clone(),
        ];
        if graded {
            row.push(
                match response.is_correct {
                    Some(true) => "Yes",
                    _ => "No",
                }
                .to_string(),
            );
            row.push(response.score.unwrap_or(0).to_string());
        }
        row.push(format_export_time(response.submitted_at, offset));
        push_row(&mut out, row);
    }

    out
}

fn push_row(out: &mut String, cells: impl IntoIterator<Item = String>) {
    let line = cells
        .into_iter()
        .map(|cell| escape(&cell))
        .collect::<Vec<_>>()
        .join(",");
    out.push_str(&line);
    out.push_str("\r\n");
}

/// Quote a field when it contains a separator, a quote or a line break.
fn escape(cell: &str) -> String {
    if cell.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", cell.replace('"', "\"\""))
    } else {
        cell.to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, SystemTime};

    use super::*;
    use crate::dao::{
        directory::Role,
        models::{LifecycleEntity, QuizKind},
    };

    fn activity(kind: ActivityKind) -> ActivityEntity {
        ActivityEntity {
            id: Uuid::new_v4(),
            course_id: Uuid::new_v4(),
            instructor_id: Uuid::new_v4(),
            kind,
            quiz_kind: (kind == ActivityKind::Quiz).then_some(QuizKind::FillBlank),
            prompt: "?".into(),
            options: vec![],
            correct_answer: Some("Paris".into()),
            duration_seconds: 60,
            lifecycle: LifecycleEntity::draft(),
            join_token: None,
            created_at: SystemTime::now(),
        }
    }

    fn student(name: &str) -> UserEntity {
        UserEntity {
            id: Uuid::new_v4(),
            role: Role::Student,
            display_name: name.into(),
            email: format!("{}@example.edu", name.to_lowercase()),
        }
    }

    fn response(activity_id: Uuid, student_id: Uuid, answer: &str, correct: Option<bool>) -> ResponseEntity {
        ResponseEntity {
            id: Uuid::new_v4(),
            activity_id,
            student_id,
            answer: answer.into(),
            is_correct: correct,
            score: correct.map(u8::from),
            points_earned: correct.map(u8::from),
            // 2024-03-01T02:30:05Z
            submitted_at: SystemTime::UNIX_EPOCH + Duration::from_secs(1_709_260_205),
        }
    }

    #[test]
    fn quiz_export_includes_grading_columns() {
        let quiz = activity(ActivityKind::Quiz);
        let ada = student("Ada");
        let rows = [response(quiz.id, ada.id, "paris", Some(true))];
        let students = HashMap::from([(ada.id, ada)]);

        let csv = render_csv(&quiz, &rows, &students, time::macros::offset!(+8));
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(
            lines[0],
            "Student Name,Student Email,Answer,Correct,Score,Submitted At"
        );
        assert_eq!(lines[1], "Ada,ada@example.edu,paris,Yes,1,2024-03-01 10:30:05");
    }

    #[test]
    fn other_kinds_omit_grading_and_quote_fields() {
        let cloud = activity(ActivityKind::WordCloud);
        let bo = student("Bo");
        let unknown = Uuid::new_v4();
        let rows = [
            response(cloud.id, bo.id, "focus, \"growth\"", None),
            response(cloud.id, unknown, "calm", None),
        ];
        let students = HashMap::from([(bo.id, bo)]);

        let csv = render_csv(&cloud, &rows, &students, UtcOffset::UTC);
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "Student Name,Student Email,Answer,Submitted At");
        assert_eq!(
            lines[1],
            "Bo,bo@example.edu,\"focus, \"\"growth\"\"\",2024-03-01 02:30:05"
        );
        assert_eq!(lines[2], format!("{unknown},,calm,2024-03-01 02:30:05"));
    }
}
