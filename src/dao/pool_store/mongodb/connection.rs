use std::time::Duration;

use mongodb::{Client, Database, bson::doc, options::ClientOptions};
use tokio::time::sleep;
use tracing::{debug, warn};

use super::error::{MongoDaoError, MongoResult};

/// Pings allowed before a connection attempt is reported as failed. The storage
/// supervisor retries whole attempts on its own schedule.
const PING_ATTEMPTS: u32 = 5;
const FIRST_PING_BACKOFF: Duration = Duration::from_millis(200);
const MAX_PING_BACKOFF: Duration = Duration::from_secs(2);

/// Open a client on `database_name` once the server answers a ping.
pub async fn establish_connection(
    options: &ClientOptions,
    database_name: &str,
) -> MongoResult<(Client, Database)> {
    let client = Client::with_options(options.clone())
        .map_err(|source| MongoDaoError::ClientConstruction { source })?;
    let database = client.database(database_name);
    wait_for_ping(&database).await?;
    debug!(database = database_name, "MongoDB answered ping");
    Ok((client, database))
}

async fn wait_for_ping(database: &Database) -> MongoResult<()> {
    let mut backoff = FIRST_PING_BACKOFF;
    let mut attempt = 1;
    loop {
        let err = match database.run_command(doc! { "ping": 1 }).await {
            Ok(_) => return Ok(()),
            Err(err) => err,
        };
        if attempt == PING_ATTEMPTS {
            return Err(MongoDaoError::InitialPing {
                attempts: attempt,
                source: err,
            });
        }
        warn!(attempt, error = %err, "MongoDB not answering yet");
        sleep(backoff).await;
        backoff = (backoff * 2).min(MAX_PING_BACKOFF);
        attempt += 1;
    }
}
