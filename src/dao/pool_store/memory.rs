//! In-process [`PoolStore`] backed by concurrent maps. Used by the test-suite and by
//! `STORAGE_BACKEND=memory` deployments.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use chrono::Utc;
use dashmap::DashMap;
use futures::future::{self, BoxFuture};
use thiserror::Error;

use crate::dao::{
    models::{
        GameEntity, GameStatus, GameUpdate, PaymentEntity, PaymentGuard, PaymentUpdate,
        SeasonEntity,
    },
    pool_store::PoolStore,
    storage::{DeleteOutcome, InsertOutcome, StorageError, StorageResult, UpdateOutcome},
};

#[derive(Debug, Error)]
pub enum MemoryStoreError {
    #[error("in-memory store is offline")]
    Offline,
    #[error("duplicate {collection} id `{id}`")]
    Duplicate { collection: &'static str, id: String },
}

impl From<MemoryStoreError> for StorageError {
    fn from(err: MemoryStoreError) -> Self {
        match err {
            MemoryStoreError::Duplicate { .. } => StorageError::Duplicate {
                message: err.to_string(),
            },
            MemoryStoreError::Offline => StorageError::unavailable(err.to_string(), err),
        }
    }
}

/// Concurrent in-memory store. Records past their `expireAt` are invisible, as if
/// the TTL sweep had already removed them.
#[derive(Clone, Default)]
pub struct MemoryPoolStore {
    inner: Arc<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    games: DashMap<String, GameEntity>,
    payments: DashMap<String, PaymentEntity>,
    seasons: DashMap<String, SeasonEntity>,
    offline: AtomicBool,
    unacknowledged: AtomicBool,
}

fn ready<T: Send + 'static>(value: StorageResult<T>) -> BoxFuture<'static, StorageResult<T>> {
    Box::pin(future::ready(value))
}

fn alive(expire_at: chrono::DateTime<Utc>) -> bool {
    expire_at > Utc::now()
}

impl MemoryPoolStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate the backend becoming unreachable (or reachable again).
    pub fn set_offline(&self, offline: bool) {
        self.inner.offline.store(offline, Ordering::SeqCst);
    }

    /// Make subsequent writes report `acknowledged = false` without applying them.
    pub fn set_unacknowledged(&self, unacknowledged: bool) {
        self.inner.unacknowledged.store(unacknowledged, Ordering::SeqCst);
    }

    fn check_online(&self) -> Result<(), MemoryStoreError> {
        if self.inner.offline.load(Ordering::SeqCst) {
            Err(MemoryStoreError::Offline)
        } else {
            Ok(())
        }
    }

    fn acknowledges(&self) -> bool {
        !self.inner.unacknowledged.load(Ordering::SeqCst)
    }

    fn unacknowledged_update() -> UpdateOutcome {
        UpdateOutcome {
            acknowledged: false,
            matched_count: 0,
            modified_count: 0,
        }
    }

    fn find_game_sync(&self, id: &str) -> Result<Option<GameEntity>, MemoryStoreError> {
        self.check_online()?;
        Ok(self
            .inner
            .games
            .get(id)
            .filter(|game| alive(game.expire_at))
            .map(|game| game.value().clone()))
    }

    fn insert_game_sync(&self, game: GameEntity) -> Result<InsertOutcome, MemoryStoreError> {
        self.check_online()?;
        if !self.acknowledges() {
            return Ok(InsertOutcome {
                acknowledged: false,
                inserted_count: 0,
            });
        }
        if self.inner.games.contains_key(&game.id) {
            return Err(MemoryStoreError::Duplicate {
                collection: "games",
                id: game.id,
            });
        }
        self.inner.games.insert(game.id.clone(), game);
        Ok(InsertOutcome {
            acknowledged: true,
            inserted_count: 1,
        })
    }

    fn update_game_sync(
        &self,
        id: &str,
        expected: GameStatus,
        update: &GameUpdate,
    ) -> Result<UpdateOutcome, MemoryStoreError> {
        self.check_online()?;
        if !self.acknowledges() {
            return Ok(Self::unacknowledged_update());
        }
        let Some(mut game) = self.inner.games.get_mut(id) else {
            return Ok(UpdateOutcome::unmatched());
        };
        if game.status != expected || !alive(game.expire_at) {
            return Ok(UpdateOutcome::unmatched());
        }
        let before = game.value().clone();
        update.apply_to(&mut game);
        Ok(UpdateOutcome {
            acknowledged: true,
            matched_count: 1,
            modified_count: u64::from(*game != before),
        })
    }

    fn delete_game_sync(
        &self,
        id: &str,
        expected: GameStatus,
    ) -> Result<DeleteOutcome, MemoryStoreError> {
        self.check_online()?;
        if !self.acknowledges() {
            return Ok(DeleteOutcome {
                acknowledged: false,
                deleted_count: 0,
            });
        }
        let removed = self
            .inner
            .games
            .remove_if(id, |_, game| game.status == expected && alive(game.expire_at));
        Ok(DeleteOutcome {
            acknowledged: true,
            deleted_count: u64::from(removed.is_some()),
        })
    }

    fn payments_where(
        &self,
        predicate: impl Fn(&PaymentEntity) -> bool,
    ) -> Result<Vec<PaymentEntity>, MemoryStoreError> {
        self.check_online()?;
        Ok(self
            .inner
            .payments
            .iter()
            .filter(|entry| alive(entry.expire_at) && predicate(entry.value()))
            .map(|entry| entry.value().clone())
            .collect())
    }

    fn insert_payments_sync(
        &self,
        payments: Vec<PaymentEntity>,
    ) -> Result<InsertOutcome, MemoryStoreError> {
        self.check_online()?;
        if !self.acknowledges() {
            return Ok(InsertOutcome {
                acknowledged: false,
                inserted_count: 0,
            });
        }
        if let Some(duplicate) = payments
            .iter()
            .find(|payment| self.inner.payments.contains_key(&payment.id))
        {
            return Err(MemoryStoreError::Duplicate {
                collection: "payments",
                id: duplicate.id.clone(),
            });
        }
        let inserted_count = payments.len() as u64;
        for payment in payments {
            self.inner.payments.insert(payment.id.clone(), payment);
        }
        Ok(InsertOutcome {
            acknowledged: true,
            inserted_count,
        })
    }

    fn update_payment_sync(
        &self,
        id: &str,
        guard: PaymentGuard,
        update: &PaymentUpdate,
    ) -> Result<UpdateOutcome, MemoryStoreError> {
        self.check_online()?;
        if !self.acknowledges() {
            return Ok(Self::unacknowledged_update());
        }
        let Some(mut payment) = self.inner.payments.get_mut(id) else {
            return Ok(UpdateOutcome::unmatched());
        };
        if !guard.admits(&payment) || !alive(payment.expire_at) {
            return Ok(UpdateOutcome::unmatched());
        }
        let before = payment.value().clone();
        update.apply_to(&mut payment);
        Ok(UpdateOutcome {
            acknowledged: true,
            matched_count: 1,
            modified_count: u64::from(*payment != before),
        })
    }

    fn delete_payment_sync(&self, id: &str) -> Result<DeleteOutcome, MemoryStoreError> {
        self.check_online()?;
        if !self.acknowledges() {
            return Ok(DeleteOutcome {
                acknowledged: false,
                deleted_count: 0,
            });
        }
        let removed = self.inner.payments.remove(id);
        Ok(DeleteOutcome {
            acknowledged: true,
            deleted_count: u64::from(removed.is_some()),
        })
    }

    fn find_season_sync(&self, id: &str) -> Result<Option<SeasonEntity>, MemoryStoreError> {
        self.check_online()?;
        Ok(self
            .inner
            .seasons
            .get(id)
            .filter(|season| alive(season.expire_at))
            .map(|season| season.value().clone()))
    }

    fn insert_season_sync(&self, season: SeasonEntity) -> Result<InsertOutcome, MemoryStoreError> {
        self.check_online()?;
        if !self.acknowledges() {
            return Ok(InsertOutcome {
                acknowledged: false,
                inserted_count: 0,
            });
        }
        if self.inner.seasons.contains_key(&season.id) {
            return Err(MemoryStoreError::Duplicate {
                collection: "seasons",
                id: season.id,
            });
        }
        self.inner.seasons.insert(season.id.clone(), season);
        Ok(InsertOutcome {
            acknowledged: true,
            inserted_count: 1,
        })
    }

    fn increment_season_sync(&self, id: &str, delta: f64) -> Result<UpdateOutcome, MemoryStoreError> {
        self.check_online()?;
        if !self.acknowledges() {
            return Ok(Self::unacknowledged_update());
        }
        // The shard write lock is held for the whole read-add-write.
        let Some(mut season) = self.inner.seasons.get_mut(id) else {
            return Ok(UpdateOutcome::unmatched());
        };
        season.amount += delta;
        Ok(UpdateOutcome {
            acknowledged: true,
            matched_count: 1,
            modified_count: u64::from(delta != 0.0),
        })
    }
}

impl PoolStore for MemoryPoolStore {
    fn find_game(&self, id: String) -> BoxFuture<'static, StorageResult<Option<GameEntity>>> {
        ready(self.find_game_sync(&id).map_err(Into::into))
    }

    fn insert_game(&self, game: GameEntity) -> BoxFuture<'static, StorageResult<InsertOutcome>> {
        ready(self.insert_game_sync(game).map_err(Into::into))
    }

    fn update_game(
        &self,
        id: String,
        expected: GameStatus,
        update: GameUpdate,
    ) -> BoxFuture<'static, StorageResult<UpdateOutcome>> {
        ready(
            self.update_game_sync(&id, expected, &update)
                .map_err(Into::into),
        )
    }

    fn delete_game(
        &self,
        id: String,
        expected: GameStatus,
    ) -> BoxFuture<'static, StorageResult<DeleteOutcome>> {
        ready(self.delete_game_sync(&id, expected).map_err(Into::into))
    }

    fn find_payment(&self, id: String) -> BoxFuture<'static, StorageResult<Option<PaymentEntity>>> {
        let found = self
            .payments_where(|payment| payment.id == id)
            .map(|mut payments| payments.pop());
        ready(found.map_err(Into::into))
    }

    fn list_payments(&self) -> BoxFuture<'static, StorageResult<Vec<PaymentEntity>>> {
        ready(self.payments_where(|_| true).map_err(Into::into))
    }

    fn list_payments_by_reference(
        &self,
        reference: String,
    ) -> BoxFuture<'static, StorageResult<Vec<PaymentEntity>>> {
        ready(
            self.payments_where(|payment| payment.reference == reference)
                .map_err(Into::into),
        )
    }

    fn insert_payments(
        &self,
        payments: Vec<PaymentEntity>,
    ) -> BoxFuture<'static, StorageResult<InsertOutcome>> {
        ready(self.insert_payments_sync(payments).map_err(Into::into))
    }

    fn update_payment(
        &self,
        id: String,
        guard: PaymentGuard,
        update: PaymentUpdate,
    ) -> BoxFuture<'static, StorageResult<UpdateOutcome>> {
        ready(
            self.update_payment_sync(&id, guard, &update)
                .map_err(Into::into),
        )
    }

    fn delete_payment(&self, id: String) -> BoxFuture<'static, StorageResult<DeleteOutcome>> {
        ready(self.delete_payment_sync(&id).map_err(Into::into))
    }

    fn find_season(&self, id: String) -> BoxFuture<'static, StorageResult<Option<SeasonEntity>>> {
        ready(self.find_season_sync(&id).map_err(Into::into))
    }

    fn insert_season(
        &self,
        season: SeasonEntity,
    ) -> BoxFuture<'static, StorageResult<InsertOutcome>> {
        ready(self.insert_season_sync(season).map_err(Into::into))
    }

    fn increment_season_amount(
        &self,
        id: String,
        delta: f64,
    ) -> BoxFuture<'static, StorageResult<UpdateOutcome>> {
        ready(self.increment_season_sync(&id, delta).map_err(Into::into))
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        ready(self.check_online().map_err(Into::into))
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        ready(self.check_online().map_err(Into::into))
    }
}
