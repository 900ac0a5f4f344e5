use mongodb::error::Error as MongoError;
use thiserror::Error;
use uuid::Uuid;

pub type MongoResult<T> = std::result::Result<T, MongoDaoError>;

#[derive(Debug, Error)]
pub enum MongoDaoError {
    #[error("failed to parse MongoDB connection URI `{uri}`")]
    InvalidUri {
        uri: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to build MongoDB client from options")]
    ClientConstruction {
        #[source]
        source: MongoError,
    },
    #[error("MongoDB ping failed during initial connection after {attempts} attempt(s)")]
    InitialPing {
        attempts: u32,
        #[source]
        source: MongoError,
    },
    #[error("MongoDB ping health check failed")]
    HealthPing {
        #[source]
        source: MongoError,
    },
    #[error("failed to ensure index `{index}` on collection `{collection}`")]
    EnsureIndex {
        collection: &'static str,
        index: &'static str,
        #[source]
        source: MongoError,
    },
    #[error("failed to save activity `{id}`")]
    SaveActivity {
        id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("failed to load activity `{id}`")]
    LoadActivity {
        id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("failed to list activities")]
    ListActivities {
        #[source]
        source: MongoError,
    },
    #[error("failed to delete activity `{id}`")]
    DeleteActivity {
        id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("failed to update lifecycle of activity `{id}`")]
    UpdateLifecycle {
        id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("failed to write response to activity `{activity_id}`")]
    SaveResponse {
        activity_id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("failed to purge responses of activity `{activity_id}`")]
    PurgeResponses {
        activity_id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("failed to load responses of activity `{activity_id}`")]
    LoadResponses {
        activity_id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("corrupt {collection} document: {reason}")]
    CorruptDocument {
        collection: &'static str,
        reason: String,
    },
}
