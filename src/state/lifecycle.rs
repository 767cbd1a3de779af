//! Game status machine: `opened -> running -> {closed, canceled}`.
//!
//! Decisions are pure. [`GameLifecycle::plan`] turns a command into the conditional
//! write the service layer performs, guarded by the stored status it was decided on.

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::{
    dao::models::{GameEntity, GameStatus, GameUpdate, Score, Teams},
    state::expiry::{self, RecordKind},
};

/// Mutations an administrator can request on a game.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameAction {
    /// Overwrite the live score.
    RecordScore,
    /// Record the final score and close the game.
    Close,
    /// Delete a game that never started, cancel one that did.
    CancelOrDelete,
    /// Patch allow-listed fields other than `status` and `score`.
    GenericPatch,
}

/// A concrete request carrying the data of its [`GameAction`].
#[derive(Debug, Clone, PartialEq)]
pub enum GameCommand {
    /// New live score of a running game.
    RecordScore(Score),
    /// Final score; closes the game.
    Close(Score),
    /// Delete before kickoff, cancel afterwards.
    Retire,
    /// Allow-listed field changes.
    Patch(GameUpdate),
}

impl GameCommand {
    /// Action the command is checked against.
    pub fn action(&self) -> GameAction {
        match self {
            GameCommand::RecordScore(_) => GameAction::RecordScore,
            GameCommand::Close(_) => GameAction::Close,
            GameCommand::Retire => GameAction::CancelOrDelete,
            GameCommand::Patch(_) => GameAction::GenericPatch,
        }
    }
}

/// Error returned when an action is not legal for the game's current status.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition: {action:?} cannot be applied while the game is {}", from.as_str())]
pub struct InvalidTransition {
    /// Effective status of the game when the action was requested.
    pub from: GameStatus,
    /// The rejected action.
    pub action: GameAction,
}

/// Errors produced while validating a lifecycle request. Both are raised before any write.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LifecycleError {
    /// Malformed score, missing team or date, or an unusable patch.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Action illegal for the effective status.
    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),
}

/// The single write a legal command resolves to.
#[derive(Debug, Clone, PartialEq)]
pub enum GameTransition {
    /// Update the game, guarded on the stored status, yielding the complete post-state.
    Update {
        /// Stored status the write must still match.
        expected: GameStatus,
        /// Fields to write.
        update: GameUpdate,
        /// Game as it reads once the write lands.
        next: GameEntity,
    },
    /// Remove the game, guarded on the stored status; `snapshot` is the pre-deletion state.
    Delete {
        /// Stored status the deletion must still match.
        expected: GameStatus,
        /// Game as it read before the deletion.
        snapshot: GameEntity,
    },
}

/// Whether `action` may be applied to a game whose effective status is `current`.
pub fn can_transition(current: GameStatus, action: GameAction) -> bool {
    match action {
        GameAction::RecordScore | GameAction::Close => current == GameStatus::Running,
        GameAction::CancelOrDelete => {
            matches!(current, GameStatus::Opened | GameStatus::Running)
        }
        GameAction::GenericPatch => !current.is_terminal(),
    }
}

/// Status a game is in at `now`: an opened game whose kickoff has passed is running.
pub fn effective_status(game: &GameEntity, now: DateTime<Utc>) -> GameStatus {
    match game.status {
        GameStatus::Opened if game.date <= now => GameStatus::Running,
        status => status,
    }
}

/// Validate a caller-supplied score; both sides must be non-negative integers.
pub fn validate_score(visited: i64, visitor: i64) -> Result<Score, LifecycleError> {
    let side = |value: i64, name: &str| {
        u32::try_from(value).map_err(|_| {
            LifecycleError::InvalidInput(format!(
                "score.{name} must be a non-negative integer (got {value})"
            ))
        })
    };
    Ok(Score {
        visited: side(visited, "visited")?,
        visitor: side(visitor, "visitor")?,
    })
}

/// Identifier for a new game, derived from the two team identifiers.
pub fn new_game_id(teams: &Teams) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}x{}-{}", teams.visited.id, teams.visitor.id, &suffix[..8])
}

/// Build a freshly scheduled game.
pub fn create_game(
    id: String,
    teams: Teams,
    date: Option<DateTime<Utc>>,
    reference: String,
    now: DateTime<Utc>,
) -> Result<GameEntity, LifecycleError> {
    if teams.visited.id.trim().is_empty() || teams.visitor.id.trim().is_empty() {
        return Err(LifecycleError::InvalidInput(
            "both teams.visited.id and teams.visitor.id are required".into(),
        ));
    }
    let date = date.ok_or_else(|| LifecycleError::InvalidInput("date is required".into()))?;

    Ok(GameEntity {
        id,
        status: GameStatus::Opened,
        teams,
        score: Score::default(),
        date,
        reference,
        expire_at: expiry::expire_at(RecordKind::Game, now),
        entries: Vec::new(),
        props: serde_json::Map::new(),
    })
}

/// State machine view over one persisted game at a given instant.
#[derive(Debug)]
pub struct GameLifecycle<'a> {
    game: &'a GameEntity,
    status: GameStatus,
}

impl<'a> GameLifecycle<'a> {
    /// Evaluate `game` as of `now`.
    pub fn at(game: &'a GameEntity, now: DateTime<Utc>) -> Self {
        Self {
            game,
            status: effective_status(game, now),
        }
    }

    /// Effective status the decisions are based on.
    pub fn status(&self) -> GameStatus {
        self.status
    }

    /// Overwrite the score of a running game, persisting an implicit kickoff.
    pub fn record_score(&self, score: Score) -> Result<GameTransition, LifecycleError> {
        self.plan(GameCommand::RecordScore(score))
    }

    /// Close a running game with its final score.
    pub fn close(&self, score: Score) -> Result<GameTransition, LifecycleError> {
        self.plan(GameCommand::Close(score))
    }

    /// Delete an opened game or cancel a running one.
    pub fn retire(&self) -> Result<GameTransition, LifecycleError> {
        self.plan(GameCommand::Retire)
    }

    /// Apply a generic patch to a non-terminal game.
    pub fn patch(&self, update: GameUpdate) -> Result<GameTransition, LifecycleError> {
        self.plan(GameCommand::Patch(update))
    }

    /// Resolve a command into the write it requires, or reject it.
    pub fn plan(&self, command: GameCommand) -> Result<GameTransition, LifecycleError> {
        if let GameCommand::Patch(update) = &command {
            if update.status.is_some() || update.score.is_some() {
                return Err(LifecycleError::InvalidInput(
                    "status and score can only change through their dedicated actions".into(),
                ));
            }
            if update.is_empty() {
                return Err(LifecycleError::InvalidInput(
                    "no patchable field supplied".into(),
                ));
            }
        }

        let action = command.action();
        if !can_transition(self.status, action) {
            return Err(InvalidTransition {
                from: self.status,
                action,
            }
            .into());
        }

        let update = match command {
            GameCommand::RecordScore(score) => GameUpdate {
                // Persist an implicit kickoff along with the first score.
                status: (self.game.status != GameStatus::Running).then_some(GameStatus::Running),
                score: Some(score),
                ..GameUpdate::default()
            },
            GameCommand::Close(score) => GameUpdate {
                status: Some(GameStatus::Closed),
                score: Some(score),
                ..GameUpdate::default()
            },
            GameCommand::Retire if self.status == GameStatus::Opened => {
                return Ok(GameTransition::Delete {
                    expected: self.game.status,
                    snapshot: self.game.clone(),
                });
            }
            GameCommand::Retire => GameUpdate {
                status: Some(GameStatus::Canceled),
                ..GameUpdate::default()
            },
            GameCommand::Patch(update) => update,
        };

        let mut next = self.game.clone();
        update.apply_to(&mut next);
        Ok(GameTransition::Update {
            expected: self.game.status,
            update,
            next,
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;
    use crate::dao::models::TeamRef;

    const ALL_STATUSES: [GameStatus; 4] = [
        GameStatus::Opened,
        GameStatus::Running,
        GameStatus::Closed,
        GameStatus::Canceled,
    ];

    fn teams() -> Teams {
        Teams {
            visited: TeamRef {
                id: "A".into(),
                name: None,
            },
            visitor: TeamRef {
                id: "B".into(),
                name: None,
            },
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 18, 0, 0).unwrap()
    }

    fn game(status: GameStatus) -> GameEntity {
        GameEntity {
            status,
            ..create_game(
                "AxB-1".into(),
                teams(),
                Some(now() + Duration::hours(2)),
                "5/2024".into(),
                now(),
            )
            .unwrap()
        }
    }

    fn score(visited: u32, visitor: u32) -> Score {
        Score { visited, visitor }
    }

    #[test]
    fn create_starts_opened_with_zero_score() {
        let game = create_game(
            "id".into(),
            teams(),
            Some(now()),
            "5/2024".into(),
            now(),
        )
        .unwrap();
        assert_eq!(game.status, GameStatus::Opened);
        assert_eq!(game.score, Score::default());
        assert!(game.entries.is_empty());
        assert_eq!(
            game.expire_at,
            Utc.with_ymd_and_hms(2024, 6, 1, 18, 0, 0).unwrap()
        );
    }

    #[test]
    fn create_requires_both_teams_and_a_date() {
        let mut missing_visitor = teams();
        missing_visitor.visitor.id = String::new();
        assert!(matches!(
            create_game("id".into(), missing_visitor, Some(now()), "r".into(), now()),
            Err(LifecycleError::InvalidInput(_))
        ));
        assert!(matches!(
            create_game("id".into(), teams(), None, "r".into(), now()),
            Err(LifecycleError::InvalidInput(_))
        ));
    }

    #[test]
    fn score_actions_are_legal_only_while_running() {
        for status in ALL_STATUSES {
            let game = game(status);
            let lifecycle = GameLifecycle::at(&game, now());
            let expected = status == GameStatus::Running;
            assert_eq!(lifecycle.close(score(1, 0)).is_ok(), expected, "{status:?}");
            assert_eq!(
                lifecycle.record_score(score(1, 0)).is_ok(),
                expected,
                "{status:?}"
            );
            if !expected {
                assert!(matches!(
                    lifecycle.close(score(1, 0)),
                    Err(LifecycleError::InvalidTransition(InvalidTransition {
                        action: GameAction::Close,
                        ..
                    }))
                ));
            }
        }
    }

    #[test]
    fn close_sets_status_and_final_score() {
        let game = game(GameStatus::Running);
        let transition = GameLifecycle::at(&game, now()).close(score(2, 1)).unwrap();
        let GameTransition::Update {
            expected,
            update,
            next,
        } = transition
        else {
            panic!("close must update");
        };
        assert_eq!(expected, GameStatus::Running);
        assert_eq!(update.status, Some(GameStatus::Closed));
        assert_eq!(next.status, GameStatus::Closed);
        assert_eq!(next.score, score(2, 1));
        assert_eq!(next.teams, game.teams);
    }

    #[test]
    fn record_score_keeps_status() {
        let game = game(GameStatus::Running);
        let GameTransition::Update { update, next, .. } = GameLifecycle::at(&game, now())
            .record_score(score(2, 1))
            .unwrap()
        else {
            panic!("record_score must update");
        };
        assert_eq!(update.status, None);
        assert_eq!(next.status, GameStatus::Running);
        assert_eq!(next.score, score(2, 1));
    }

    #[test]
    fn kickoff_makes_an_opened_game_running() {
        let game = game(GameStatus::Opened);
        let after_kickoff = game.date + Duration::minutes(1);
        let lifecycle = GameLifecycle::at(&game, after_kickoff);
        assert_eq!(lifecycle.status(), GameStatus::Running);

        let GameTransition::Update {
            expected, update, ..
        } = lifecycle.record_score(score(0, 1)).unwrap()
        else {
            panic!("record_score must update");
        };
        assert_eq!(expected, GameStatus::Opened);
        assert_eq!(update.status, Some(GameStatus::Running));
    }

    #[test]
    fn retire_deletes_opened_cancels_running_rejects_terminal() {
        let opened = game(GameStatus::Opened);
        assert!(matches!(
            GameLifecycle::at(&opened, now()).retire(),
            Ok(GameTransition::Delete {
                expected: GameStatus::Opened,
                ..
            })
        ));

        let running = game(GameStatus::Running);
        match GameLifecycle::at(&running, now()).retire().unwrap() {
            GameTransition::Update { next, .. } => assert_eq!(next.status, GameStatus::Canceled),
            other => panic!("expected cancel, got {other:?}"),
        }

        for status in [GameStatus::Closed, GameStatus::Canceled] {
            let game = game(status);
            assert!(matches!(
                GameLifecycle::at(&game, now()).retire(),
                Err(LifecycleError::InvalidTransition(_))
            ));
        }
    }

    #[test]
    fn generic_patch_cannot_touch_status_or_score() {
        let game = game(GameStatus::Opened);
        let lifecycle = GameLifecycle::at(&game, now());
        let sneaky = GameUpdate {
            status: Some(GameStatus::Closed),
            ..GameUpdate::default()
        };
        assert!(matches!(
            lifecycle.patch(sneaky),
            Err(LifecycleError::InvalidInput(_))
        ));
        assert!(matches!(
            lifecycle.patch(GameUpdate::default()),
            Err(LifecycleError::InvalidInput(_))
        ));

        let reschedule = GameUpdate {
            date: Some(now() + Duration::days(1)),
            ..GameUpdate::default()
        };
        let GameTransition::Update { next, .. } = lifecycle.patch(reschedule).unwrap() else {
            panic!("patch must update");
        };
        assert_eq!(next.date, now() + Duration::days(1));
    }

    #[test]
    fn generic_patch_rejected_on_terminal_games() {
        let game = game(GameStatus::Closed);
        let reschedule = GameUpdate {
            date: Some(now()),
            ..GameUpdate::default()
        };
        assert!(matches!(
            GameLifecycle::at(&game, now()).patch(reschedule),
            Err(LifecycleError::InvalidTransition(_))
        ));
    }

    #[test]
    fn transition_table() {
        use GameAction::*;
        for status in ALL_STATUSES {
            assert_eq!(
                can_transition(status, GenericPatch),
                !status.is_terminal()
            );
            assert_eq!(
                can_transition(status, CancelOrDelete),
                !status.is_terminal()
            );
        }
        assert!(can_transition(GameStatus::Running, RecordScore));
        assert!(!can_transition(GameStatus::Opened, Close));
    }

    #[test]
    fn negative_scores_are_rejected() {
        assert_eq!(validate_score(2, 1).unwrap(), score(2, 1));
        assert!(matches!(
            validate_score(-1, 0),
            Err(LifecycleError::InvalidInput(_))
        ));
        assert!(matches!(
            validate_score(0, i64::from(u32::MAX) + 1),
            Err(LifecycleError::InvalidInput(_))
        ));
    }

    #[test]
    fn game_ids_derive_from_team_ids() {
        let id = new_game_id(&teams());
        assert!(id.starts_with("AxB-"));
        assert_ne!(id, new_game_id(&teams()));
    }
}
