use std::time::Duration;

use mongodb::{Client, Database, bson::doc, options::ClientOptions};
use tokio::time::sleep;
use tracing::{debug, warn};

use super::error::{MongoDaoError, MongoResult};

const DEFAULT_DB: &str = "classpulse";
/// Pings attempted before a connection is reported as failed.
const CONNECT_ATTEMPTS: u32 = 5;
const FIRST_RETRY: Duration = Duration::from_millis(200);
const RETRY_CAP: Duration = Duration::from_secs(3);

/// Parsed connection settings for the activity database.
#[derive(Clone)]
pub struct MongoConfig {
    options: ClientOptions,
    database_name: String,
}

impl MongoConfig {
    pub async fn from_uri(uri: &str, db_name: Option<&str>) -> MongoResult<Self> {
        let options = ClientOptions::parse(uri)
            .await
            .map_err(|source| MongoDaoError::InvalidUri {
                uri: uri.to_owned(),
                source,
            })?;

        Ok(Self {
            options,
            database_name: db_name.unwrap_or(DEFAULT_DB).to_owned(),
        })
    }

    pub fn database_name(&self) -> &str {
        &self.database_name
    }

    /// Build a client and wait until the server answers a ping.
    pub(super) async fn open(&self) -> MongoResult<(Client, Database)> {
        let client = Client::with_options(self.options.clone())
            .map_err(|source| MongoDaoError::ClientConstruction { source })?;
        let database = client.database(&self.database_name);

        let mut wait = FIRST_RETRY;
        let mut attempt = 1;
        loop {
            let err = match database.run_command(doc! { "ping": 1 }).await {
                Ok(_) => {
                    debug!(attempt, database = %self.database_name, "MongoDB answered ping");
                    return Ok((client, database));
                }
                Err(err) => err,
            };

            if attempt == CONNECT_ATTEMPTS {
                return Err(MongoDaoError::InitialPing {
                    attempts: attempt,
                    source: err,
                });
            }
            warn!(attempt, wait_ms = wait.as_millis() as u64, error = %err, "MongoDB not reachable yet");
            sleep(wait).await;
            wait = (wait * 2).min(RETRY_CAP);
            attempt += 1;
        }
    }
}
