use std::collections::{HashMap, HashSet};

use futures::future::{BoxFuture, ready};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::dao::storage::StorageResult;

/// Role granted to a user by the identity directory.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Instructor,
    Student,
}

/// Identity record resolved from an API token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserEntity {
    pub id: Uuid,
    pub role: Role,
    pub display_name: String,
    pub email: String,
}

/// Read-only source of identities and course enrollments.
pub trait Directory: Send + Sync {
    fn authenticate(&self, token: String) -> BoxFuture<'static, StorageResult<Option<UserEntity>>>;
    fn find_user(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<UserEntity>>>;
    fn is_enrolled(
        &self,
        student_id: Uuid,
        course_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<bool>>;
}

/// Directory seeded once at startup, typically from the configuration file.
#[derive(Debug, Clone, Default)]
pub struct StaticDirectory {
    tokens: HashMap<String, Uuid>,
    users: HashMap<Uuid, UserEntity>,
    enrollments: HashSet<(Uuid, Uuid)>,
}

impl StaticDirectory {
    /// Register a user reachable through `token`.
    pub fn with_user(mut self, token: impl Into<String>, user: UserEntity) -> Self {
        self.tokens.insert(token.into(), user.id);
        self.users.insert(user.id, user);
        self
    }

    /// Enroll a student into a course.
    pub fn with_enrollment(mut self, student_id: Uuid, course_id: Uuid) -> Self {
        self.enrollments.insert((student_id, course_id));
        self
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }
}

impl Directory for StaticDirectory {
    fn authenticate(&self, token: String) -> BoxFuture<'static, StorageResult<Option<UserEntity>>> {
        let user = self
            .tokens
            .get(&token)
            .and_then(|id| self.users.get(id))
            .cloned();
        Box::pin(ready(Ok(user)))
    }

    fn find_user(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<UserEntity>>> {
        Box::pin(ready(Ok(self.users.get(&id).cloned())))
    }

    fn is_enrolled(
        &self,
        student_id: Uuid,
        course_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let enrolled = self.enrollments.contains(&(student_id, course_id));
        Box::pin(ready(Ok(enrolled)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn student(id: Uuid) -> UserEntity {
        UserEntity {
            id,
            role: Role::Student,
            display_name: "Lin".into(),
            email: "lin@example.edu".into(),
        }
    }

    #[tokio::test]
    async fn resolves_tokens_and_enrollments() {
        let student_id = Uuid::new_v4();
        let course_id = Uuid::new_v4();
        let directory = StaticDirectory::default()
            .with_user("s-token", student(student_id))
            .with_enrollment(student_id, course_id);

        let user = directory.authenticate("s-token".into()).await.unwrap();
        assert_eq!(user.map(|u| u.id), Some(student_id));
        assert!(directory.authenticate("nope".into()).await.unwrap().is_none());
        assert!(directory.is_enrolled(student_id, course_id).await.unwrap());
        assert!(!directory.is_enrolled(student_id, Uuid::new_v4()).await.unwrap());
    }
}
