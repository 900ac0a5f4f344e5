//! Application-level configuration loading, including the seeded identity directory.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use time::UtcOffset;
use tracing::{info, warn};
use uuid::Uuid;

use crate::dao::directory::{Role, StaticDirectory, UserEntity};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "CLASSPULSE_CONFIG_PATH";
/// Beijing time, used for every timestamp leaving the service.
const DEFAULT_WIRE_OFFSET_MINUTES: i32 = 480;
const DEFAULT_ROOM_CAPACITY: usize = 64;
const DEFAULT_TRANSITION_TIMEOUT_MS: u64 = 5_000;

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    wire_offset: UtcOffset,
    room_capacity: usize,
    transition_timeout: Option<Duration>,
    users: Vec<SeedUser>,
    enrollments: Vec<(Uuid, Uuid)>,
}

#[derive(Debug, Clone)]
struct SeedUser {
    token: String,
    user: UserEntity,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match Self::from_json_str(&contents) {
                Ok(app_config) => {
                    info!(
                        path = %path.display(),
                        users = app_config.users.len(),
                        enrollments = app_config.enrollments.len(),
                        "loaded configuration"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Parse a configuration document.
    pub fn from_json_str(contents: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str::<RawConfig>(contents).map(Into::into)
    }

    /// Offset applied to timestamps rendered on the HTTP and WebSocket surface.
    pub fn wire_offset(&self) -> UtcOffset {
        self.wire_offset
    }

    /// Buffer size of each activity room.
    pub fn room_capacity(&self) -> usize {
        self.room_capacity
    }

    /// Upper bound for a single gated lifecycle operation.
    pub fn transition_timeout(&self) -> Option<Duration> {
        self.transition_timeout
    }

    /// Build the identity directory described by the configuration.
    pub fn directory(&self) -> StaticDirectory {
        let directory = self
            .users
            .iter()
            .fold(StaticDirectory::default(), |directory, seed| {
                directory.with_user(seed.token.clone(), seed.user.clone())
            });
        self.enrollments
            .iter()
            .fold(directory, |directory, (student_id, course_id)| {
                directory.with_enrollment(*student_id, *course_id)
            })
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        RawConfig::default().into()
    }
}

/// Storage backend selected through `STORAGE_BACKEND`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Memory,
    MongoDb,
}

impl StorageBackend {
    /// Read the backend choice from the environment, defaulting to the in-memory store.
    pub fn from_env() -> Self {
        match env::var("STORAGE_BACKEND") {
            Ok(value) => Self::parse(&value).unwrap_or_else(|| {
                warn!(value = %value, "unknown STORAGE_BACKEND; using memory");
                StorageBackend::Memory
            }),
            Err(_) => StorageBackend::Memory,
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "memory" | "" => Some(StorageBackend::Memory),
            "mongodb" | "mongo" => Some(StorageBackend::MongoDb),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    wire_offset_minutes: i32,
    room_capacity: usize,
    /// Zero disables the timeout.
    transition_timeout_ms: u64,
    users: Vec<RawUser>,
    enrollments: Vec<RawEnrollment>,
}

impl Default for RawConfig {
    fn default() -> Self {
        Self {
            wire_offset_minutes: DEFAULT_WIRE_OFFSET_MINUTES,
            room_capacity: DEFAULT_ROOM_CAPACITY,
            transition_timeout_ms: DEFAULT_TRANSITION_TIMEOUT_MS,
            users: Vec::new(),
            enrollments: Vec::new(),
        }
    }
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let wire_offset = UtcOffset::from_whole_seconds(value.wire_offset_minutes * 60)
            .unwrap_or_else(|err| {
                warn!(
                    minutes = value.wire_offset_minutes,
                    error = %err,
                    "invalid wire offset; using UTC+8"
                );
                beijing_offset()
            });

        let users = value
            .users
            .into_iter()
            .map(|raw| SeedUser {
                token: raw.token,
                user: UserEntity {
                    id: raw.id,
                    role: raw.role,
                    display_name: raw.display_name,
                    email: raw.email,
                },
            })
            .collect();

        Self {
            wire_offset,
            room_capacity: value.room_capacity.max(1),
            transition_timeout: (value.transition_timeout_ms > 0)
                .then(|| Duration::from_millis(value.transition_timeout_ms)),
            users,
            enrollments: value
                .enrollments
                .into_iter()
                .map(|raw| (raw.student_id, raw.course_id))
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
/// JSON representation of a seeded user.
struct RawUser {
    id: Uuid,
    role: Role,
    display_name: String,
    #[serde(default)]
    email: String,
    token: String,
}

#[derive(Debug, Deserialize)]
struct RawEnrollment {
    student_id: Uuid,
    course_id: Uuid,
}

fn beijing_offset() -> UtcOffset {
    time::macros::offset!(+8)
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_use_beijing_offset() {
        let config = AppConfig::default();
        assert_eq!(config.wire_offset().whole_minutes(), 480);
        assert_eq!(config.room_capacity(), DEFAULT_ROOM_CAPACITY);
        assert_eq!(config.transition_timeout(), Some(Duration::from_secs(5)));
        assert_eq!(config.directory().user_count(), 0);
    }

    #[test]
    fn parses_users_and_enrollments() {
        let config = AppConfig::from_json_str(
            r#"{
                "wire_offset_minutes": 0,
                "transition_timeout_ms": 0,
                "users": [{
                    "id": "6f1c1c38-2a55-4c5e-9a47-0c3f1b4c9a01",
                    "role": "instructor",
                    "display_name": "Dr. Chen",
                    "token": "instructor-token"
                }],
                "enrollments": [{
                    "student_id": "6f1c1c38-2a55-4c5e-9a47-0c3f1b4c9a02",
                    "course_id": "6f1c1c38-2a55-4c5e-9a47-0c3f1b4c9a03"
                }]
            }"#,
        )
        .unwrap();

        assert_eq!(config.wire_offset(), UtcOffset::UTC);
        assert_eq!(config.transition_timeout(), None);
        assert_eq!(config.directory().user_count(), 1);
    }

    #[test]
    fn out_of_range_offset_falls_back() {
        let config = AppConfig::from_json_str(r#"{"wire_offset_minutes": 100000}"#).unwrap();
        assert_eq!(config.wire_offset().whole_minutes(), 480);
    }

    #[test]
    fn backend_names() {
        assert_eq!(StorageBackend::parse("MongoDB"), Some(StorageBackend::MongoDb));
        assert_eq!(StorageBackend::parse("memory"), Some(StorageBackend::Memory));
        assert_eq!(StorageBackend::parse("couch"), None);
    }
}
