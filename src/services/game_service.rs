use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use crate::{
    dao::{
        models::{GameEntity, Teams},
        pool_store::PoolStore,
    },
    dto::game::{AckResponse, CreateGameRequest, GamePatchRequest, RetireResponse, ScoreInput},
    error::ServiceError,
    services::{season_service, sse_events},
    state::{
        SharedState,
        fields,
        lifecycle::{
            self, GameAction, GameCommand, GameLifecycle, GameTransition, InvalidTransition,
        },
    },
};

/// Result of a committed lifecycle command.
enum Committed {
    Updated(GameEntity),
    Deleted(GameEntity),
}

/// Schedule a new game in the `opened` status.
pub async fn create_game(
    state: &SharedState,
    request: CreateGameRequest,
) -> Result<AckResponse, ServiceError> {
    let store = state.require_store().await?;
    let now = Utc::now();
    let teams: Teams = request.teams.into();
    let reference = request
        .reference
        .filter(|reference| !reference.trim().is_empty())
        .unwrap_or_else(|| season_service::current_reference(now));

    let game = lifecycle::create_game(
        lifecycle::new_game_id(&teams),
        teams,
        request.date,
        reference,
        now,
    )?;

    let outcome = store.insert_game(game.clone()).await?;
    if !outcome.acknowledged {
        return Err(ServiceError::NotAcknowledged(format!(
            "insert of game `{}`",
            game.id
        )));
    }

    info!(game_id = %game.id, reference = %game.reference, "game scheduled");
    sse_events::broadcast_game_inserted(state, &game);
    Ok(AckResponse {
        acknowledged: true,
        game,
    })
}

pub async fn get_game(state: &SharedState, id: &str) -> Result<GameEntity, ServiceError> {
    let store = state.require_store().await?;
    fetch_game(store.as_ref(), id).await
}

/// Overwrite the live score of a running game.
pub async fn record_score(
    state: &SharedState,
    id: &str,
    score: ScoreInput,
) -> Result<AckResponse, ServiceError> {
    let score = lifecycle::validate_score(score.visited, score.visitor)?;
    let game = expect_updated(run_command(state, id, GameCommand::RecordScore(score)).await?)?;
    Ok(AckResponse {
        acknowledged: true,
        game,
    })
}

/// Record the final score and close a running game.
pub async fn close_game(
    state: &SharedState,
    id: &str,
    score: ScoreInput,
) -> Result<AckResponse, ServiceError> {
    let score = lifecycle::validate_score(score.visited, score.visitor)?;
    let game = expect_updated(run_command(state, id, GameCommand::Close(score)).await?)?;
    Ok(AckResponse {
        acknowledged: true,
        game,
    })
}

/// Delete a game that has not kicked off, cancel one that has.
pub async fn retire_game(state: &SharedState, id: &str) -> Result<RetireResponse, ServiceError> {
    Ok(match run_command(state, id, GameCommand::Retire).await? {
        Committed::Deleted(_) => RetireResponse::Deleted { deleted: true },
        Committed::Updated(game) => RetireResponse::Canceled {
            acknowledged: true,
            game,
        },
    })
}

/// Patch allow-listed fields of a non-terminal game.
pub async fn patch_game(
    state: &SharedState,
    id: &str,
    request: GamePatchRequest,
) -> Result<AckResponse, ServiceError> {
    let update = fields::game_update(&state.config().fields.game, &request.0)?;
    let game = expect_updated(run_command(state, id, GameCommand::Patch(update)).await?)?;
    Ok(AckResponse {
        acknowledged: true,
        game,
    })
}

/// Fetch the game, decide on its current state, write conditionally, then broadcast.
async fn run_command(
    state: &SharedState,
    id: &str,
    command: GameCommand,
) -> Result<Committed, ServiceError> {
    let store = state.require_store().await?;
    let game = fetch_game(store.as_ref(), id).await?;
    let action = command.action();
    let transition = GameLifecycle::at(&game, Utc::now()).plan(command)?;

    match transition {
        GameTransition::Update {
            expected,
            update,
            next,
        } => {
            let outcome = store.update_game(id.to_string(), expected, update).await?;
            if !outcome.acknowledged {
                return Err(ServiceError::NotAcknowledged(format!("update of game `{id}`")));
            }
            if outcome.matched_count == 0 {
                return Err(concurrent_miss(&store, id, action).await);
            }

            info!(game_id = id, status = next.status.as_str(), ?action, "game updated");
            sse_events::broadcast_game_updated(state, &next);
            Ok(Committed::Updated(next))
        }
        GameTransition::Delete { expected, snapshot } => {
            let outcome = store.delete_game(id.to_string(), expected).await?;
            if !outcome.acknowledged {
                return Err(ServiceError::NotAcknowledged(format!("deletion of game `{id}`")));
            }
            if outcome.deleted_count == 0 {
                return Err(concurrent_miss(&store, id, action).await);
            }

            info!(game_id = id, "game deleted before kickoff");
            sse_events::broadcast_game_deleted(state, &snapshot);
            Ok(Committed::Deleted(snapshot))
        }
    }
}

fn expect_updated(committed: Committed) -> Result<GameEntity, ServiceError> {
    match committed {
        Committed::Updated(game) => Ok(game),
        // Only retire plans deletions.
        Committed::Deleted(game) => Err(ServiceError::NotFound(format!("game `{}`", game.id))),
    }
}

async fn fetch_game(store: &dyn PoolStore, id: &str) -> Result<GameEntity, ServiceError> {
    store
        .find_game(id.to_string())
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("game `{id}`")))
}

/// Explain why a conditional write matched nothing: the game vanished or its status moved.
async fn concurrent_miss(store: &Arc<dyn PoolStore>, id: &str, action: GameAction) -> ServiceError {
    warn!(game_id = id, ?action, "game changed between decision and write");
    match store.find_game(id.to_string()).await {
        Ok(None) => ServiceError::NotFound(format!("game `{id}`")),
        Ok(Some(current)) => ServiceError::InvalidTransition(InvalidTransition {
            from: lifecycle::effective_status(&current, Utc::now()),
            action,
        }),
        Err(err) => err.into(),
    }
}
