pub mod memory;
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use crate::dao::models::{
    GameEntity, GameStatus, GameUpdate, PaymentEntity, PaymentGuard, PaymentUpdate, SeasonEntity,
};
use crate::dao::storage::{DeleteOutcome, InsertOutcome, StorageResult, UpdateOutcome};
use futures::future::BoxFuture;

/// Abstraction over the document store holding games, payments and seasons.
///
/// Lookups of records whose `expireAt` has passed may or may not return them
/// depending on when the backend sweeps; callers treat a miss as normal.
pub trait PoolStore: Send + Sync {
    fn find_game(&self, id: String) -> BoxFuture<'static, StorageResult<Option<GameEntity>>>;
    fn insert_game(&self, game: GameEntity) -> BoxFuture<'static, StorageResult<InsertOutcome>>;
    /// Update a game only while its stored status equals `expected`.
    fn update_game(
        &self,
        id: String,
        expected: GameStatus,
        update: GameUpdate,
    ) -> BoxFuture<'static, StorageResult<UpdateOutcome>>;
    /// Delete a game only while its stored status equals `expected`.
    fn delete_game(
        &self,
        id: String,
        expected: GameStatus,
    ) -> BoxFuture<'static, StorageResult<DeleteOutcome>>;

    fn find_payment(&self, id: String) -> BoxFuture<'static, StorageResult<Option<PaymentEntity>>>;
    fn list_payments(&self) -> BoxFuture<'static, StorageResult<Vec<PaymentEntity>>>;
    fn list_payments_by_reference(
        &self,
        reference: String,
    ) -> BoxFuture<'static, StorageResult<Vec<PaymentEntity>>>;
    fn insert_payments(
        &self,
        payments: Vec<PaymentEntity>,
    ) -> BoxFuture<'static, StorageResult<InsertOutcome>>;
    fn update_payment(
        &self,
        id: String,
        guard: PaymentGuard,
        update: PaymentUpdate,
    ) -> BoxFuture<'static, StorageResult<UpdateOutcome>>;
    fn delete_payment(&self, id: String) -> BoxFuture<'static, StorageResult<DeleteOutcome>>;

    fn find_season(&self, id: String) -> BoxFuture<'static, StorageResult<Option<SeasonEntity>>>;
    fn insert_season(&self, season: SeasonEntity)
    -> BoxFuture<'static, StorageResult<InsertOutcome>>;
    /// Add `delta` to the season `amount` with a single atomic arithmetic update.
    fn increment_season_amount(
        &self,
        id: String,
        delta: f64,
    ) -> BoxFuture<'static, StorageResult<UpdateOutcome>>;

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
