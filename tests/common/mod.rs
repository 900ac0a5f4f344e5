#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{Body, to_bytes},
    http::{Method, Request, header},
    response::Response,
};

use classpulse_back::{
    config::AppConfig,
    dao::{
        activity_store::memory::MemoryActivityStore,
        directory::{Role, StaticDirectory, UserEntity},
        models::{ActivityKind, QuizKind},
    },
    dto::activity::CreateActivityRequest,
    services::activity_service,
    state::{AppState, SharedState},
};
use uuid::Uuid;

pub const INSTRUCTOR_TOKEN: &str = "instructor-token";
pub const OTHER_INSTRUCTOR_TOKEN: &str = "other-instructor-token";
pub const OUTSIDER_TOKEN: &str = "outsider-token";

pub fn student_token(index: usize) -> String {
    format!("student-token-{index}")
}

/// Classroom with one instructor, four enrolled students and one outsider.
pub struct Classroom {
    pub state: SharedState,
    pub course_id: Uuid,
    pub instructor: UserEntity,
    pub other_instructor: UserEntity,
    pub students: Vec<UserEntity>,
    pub outsider: UserEntity,
}

fn user(role: Role, name: &str) -> UserEntity {
    UserEntity {
        id: Uuid::new_v4(),
        role,
        display_name: name.to_string(),
        email: format!("{}@example.edu", name.to_lowercase().replace(' ', ".")),
    }
}

impl Classroom {
    pub async fn new() -> Self {
        let course_id = Uuid::new_v4();
        let instructor = user(Role::Instructor, "Dr Chen");
        let other_instructor = user(Role::Instructor, "Dr Wang");
        let outsider = user(Role::Student, "Zhao Lei");
        let students: Vec<UserEntity> = ["Li Wei", "Wang Fang", "Zhang Min", "Liu Yang"]
            .into_iter()
            .map(|name| user(Role::Student, name))
            .collect();

        let mut directory = StaticDirectory::default()
            .with_user(INSTRUCTOR_TOKEN, instructor.clone())
            .with_user(OTHER_INSTRUCTOR_TOKEN, other_instructor.clone())
            .with_user(OUTSIDER_TOKEN, outsider.clone());
        for (index, student) in students.iter().enumerate() {
            directory = directory
                .with_user(student_token(index), student.clone())
                .with_enrollment(student.id, course_id);
        }

        let state = AppState::new(AppConfig::default(), Arc::new(directory));
        state
            .set_activity_store(Arc::new(MemoryActivityStore::new()))
            .await;

        Self {
            state,
            course_id,
            instructor,
            other_instructor,
            students,
            outsider,
        }
    }

    pub async fn create(&self, request: CreateActivityRequest) -> Uuid {
        activity_service::create_activity(&self.state, &self.instructor, self.course_id, request)
            .await
            .expect("activity created")
            .id
    }
}

pub fn poll(options: &[&str], duration_seconds: u32) -> CreateActivityRequest {
    CreateActivityRequest {
        kind: ActivityKind::Poll,
        quiz_kind: None,
        prompt: "Which option?".into(),
        options: options.iter().map(|option| option.to_string()).collect(),
        correct_answer: None,
        duration_seconds,
    }
}

pub fn capital_quiz(duration_seconds: u32) -> CreateActivityRequest {
    CreateActivityRequest {
        kind: ActivityKind::Quiz,
        quiz_kind: Some(QuizKind::MultipleChoice),
        prompt: "Capital of France?".into(),
        options: vec!["Paris".into(), "London".into(), "Berlin".into()],
        correct_answer: Some("Paris".into()),
        duration_seconds,
    }
}

pub fn json_request(
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<serde_json::Value>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);

    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }

    if let Some(body) = body {
        let bytes = serde_json::to_vec(&body).expect("serialize body");
        builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(bytes))
            .expect("request body")
    } else {
        builder.body(Body::empty()).expect("request body")
    }
}

pub async fn read_body(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body");
    String::from_utf8(bytes.to_vec()).expect("utf-8 body")
}

pub async fn read_json(response: Response) -> serde_json::Value {
    let body = read_body(response).await;
    serde_json::from_str(&body).unwrap_or_else(|err| panic!("invalid JSON `{body}`: {err}"))
}
