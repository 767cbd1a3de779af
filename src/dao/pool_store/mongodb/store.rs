use std::{sync::Arc, time::Duration};

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{
    Client, Collection, Database, IndexModel,
    bson::{DateTime, Document, doc},
    options::IndexOptions,
};
use tokio::sync::RwLock;

use super::{
    config::MongoConfig,
    connection::establish_connection,
    error::{MongoDaoError, MongoResult},
    models::{
        MongoGameDocument, MongoPaymentDocument, MongoSeasonDocument, by_id, game_guard,
        game_set, payment_guard, payment_set,
    },
};
use crate::dao::{
    models::{
        GameEntity, GameStatus, GameUpdate, PaymentEntity, PaymentGuard, PaymentUpdate,
        SeasonEntity,
    },
    pool_store::PoolStore,
    storage::{DeleteOutcome, InsertOutcome, StorageResult, UpdateOutcome},
};

const GAME_COLLECTION_NAME: &str = "games";
const PAYMENT_COLLECTION_NAME: &str = "payments";
const SEASON_COLLECTION_NAME: &str = "seasons";

/// MongoDB-backed [`PoolStore`]. Writes use the default (acknowledged) write
/// concern; a driver failure surfaces as an error rather than an unacknowledged result.
#[derive(Clone)]
pub struct MongoPoolStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
}

struct MongoState {
    client: Client,
    database: Database,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = {
            let guard = self.state.read().await;
            guard.database.clone()
        };

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let (client, database) =
            establish_connection(&self.config.options, &self.config.database_name).await?;
        let mut guard = self.state.write().await;
        guard.client = client;
        guard.database = database;
        Ok(())
    }
}

fn updated(result: mongodb::results::UpdateResult) -> UpdateOutcome {
    UpdateOutcome {
        acknowledged: true,
        matched_count: result.matched_count,
        modified_count: result.modified_count,
    }
}

impl MongoPoolStore {
    /// Establish a connection to MongoDB and ensure indexes are present.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (client, database) =
            establish_connection(&config.options, &config.database_name).await?;

        let inner = Arc::new(MongoInner {
            state: RwLock::new(MongoState { client, database }),
            config,
        });

        let store = Self { inner };
        store.ensure_indexes().await?;
        Ok(store)
    }

    /// Unique `id`, TTL on `expireAt` for every collection, plus the payment chain lookup.
    async fn ensure_indexes(&self) -> MongoResult<()> {
        let database = self.database().await;

        for collection_name in [
            GAME_COLLECTION_NAME,
            PAYMENT_COLLECTION_NAME,
            SEASON_COLLECTION_NAME,
        ] {
            let collection = database.collection::<Document>(collection_name);

            let id_index = IndexModel::builder()
                .keys(doc! { "id": 1 })
                .options(
                    IndexOptions::builder()
                        .name(Some(format!("{collection_name}_id_idx")))
                        .unique(Some(true))
                        .build(),
                )
                .build();
            collection
                .create_index(id_index)
                .await
                .map_err(|source| MongoDaoError::EnsureIndex {
                    collection: collection_name,
                    index: "id",
                    source,
                })?;

            let ttl_index = IndexModel::builder()
                .keys(doc! { "expireAt": 1 })
                .options(
                    IndexOptions::builder()
                        .name(Some(format!("{collection_name}_ttl_idx")))
                        .expire_after(Some(Duration::ZERO))
                        .build(),
                )
                .build();
            collection
                .create_index(ttl_index)
                .await
                .map_err(|source| MongoDaoError::EnsureIndex {
                    collection: collection_name,
                    index: "expireAt",
                    source,
                })?;
        }

        let reference_index = IndexModel::builder()
            .keys(doc! { "reference": 1, "expireAt": 1 })
            .options(
                IndexOptions::builder()
                    .name(Some("payments_reference_idx".to_owned()))
                    .build(),
            )
            .build();
        database
            .collection::<Document>(PAYMENT_COLLECTION_NAME)
            .create_index(reference_index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: PAYMENT_COLLECTION_NAME,
                index: "reference",
                source,
            })?;

        Ok(())
    }

    async fn database(&self) -> Database {
        let guard = self.inner.state.read().await;
        guard.database.clone()
    }

    async fn games(&self) -> Collection<MongoGameDocument> {
        self.database().await.collection(GAME_COLLECTION_NAME)
    }

    async fn payments(&self) -> Collection<MongoPaymentDocument> {
        self.database().await.collection(PAYMENT_COLLECTION_NAME)
    }

    async fn seasons(&self) -> Collection<MongoSeasonDocument> {
        self.database().await.collection(SEASON_COLLECTION_NAME)
    }

    async fn find_game(&self, id: String) -> MongoResult<Option<GameEntity>> {
        let document = self
            .games()
            .await
            .find_one(by_id(&id))
            .await
            .map_err(|source| MongoDaoError::Find {
                collection: GAME_COLLECTION_NAME,
                id,
                source,
            })?;
        Ok(document.map(Into::into))
    }

    async fn insert_game(&self, game: GameEntity) -> MongoResult<InsertOutcome> {
        let document: MongoGameDocument = game.into();
        self.games()
            .await
            .insert_one(&document)
            .await
            .map_err(|source| MongoDaoError::Insert {
                collection: GAME_COLLECTION_NAME,
                source,
            })?;
        Ok(InsertOutcome {
            acknowledged: true,
            inserted_count: 1,
        })
    }

    async fn update_game(
        &self,
        id: String,
        expected: GameStatus,
        update: GameUpdate,
    ) -> MongoResult<UpdateOutcome> {
        let result = self
            .games()
            .await
            .update_one(game_guard(&id, expected), game_set(&update))
            .await
            .map_err(|source| MongoDaoError::Update {
                collection: GAME_COLLECTION_NAME,
                id,
                source,
            })?;
        Ok(updated(result))
    }

    async fn delete_game(&self, id: String, expected: GameStatus) -> MongoResult<DeleteOutcome> {
        let result = self
            .games()
            .await
            .delete_one(game_guard(&id, expected))
            .await
            .map_err(|source| MongoDaoError::Delete {
                collection: GAME_COLLECTION_NAME,
                id,
                source,
            })?;
        Ok(DeleteOutcome {
            acknowledged: true,
            deleted_count: result.deleted_count,
        })
    }

    async fn find_payment(&self, id: String) -> MongoResult<Option<PaymentEntity>> {
        let document = self
            .payments()
            .await
            .find_one(by_id(&id))
            .await
            .map_err(|source| MongoDaoError::Find {
                collection: PAYMENT_COLLECTION_NAME,
                id,
                source,
            })?;
        Ok(document.map(Into::into))
    }

    async fn list_payments_matching(&self, mut filter: Document) -> MongoResult<Vec<PaymentEntity>> {
        filter.insert("expireAt", doc! { "$gt": DateTime::now() });
        let documents: Vec<MongoPaymentDocument> = self
            .payments()
            .await
            .find(filter)
            .await
            .map_err(|source| MongoDaoError::List {
                collection: PAYMENT_COLLECTION_NAME,
                source,
            })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::List {
                collection: PAYMENT_COLLECTION_NAME,
                source,
            })?;
        Ok(documents.into_iter().map(Into::into).collect())
    }

    async fn insert_payments(&self, payments: Vec<PaymentEntity>) -> MongoResult<InsertOutcome> {
        if payments.is_empty() {
            return Ok(InsertOutcome {
                acknowledged: true,
                inserted_count: 0,
            });
        }
        let documents: Vec<MongoPaymentDocument> = payments.into_iter().map(Into::into).collect();
        let result = self
            .payments()
            .await
            .insert_many(&documents)
            .await
            .map_err(|source| MongoDaoError::Insert {
                collection: PAYMENT_COLLECTION_NAME,
                source,
            })?;
        Ok(InsertOutcome {
            acknowledged: true,
            inserted_count: result.inserted_ids.len() as u64,
        })
    }

    async fn update_payment(
        &self,
        id: String,
        guard: PaymentGuard,
        update: PaymentUpdate,
    ) -> MongoResult<UpdateOutcome> {
        let result = self
            .payments()
            .await
            .update_one(payment_guard(&id, guard), payment_set(&update))
            .await
            .map_err(|source| MongoDaoError::Update {
                collection: PAYMENT_COLLECTION_NAME,
                id,
                source,
            })?;
        Ok(updated(result))
    }

    async fn delete_payment(&self, id: String) -> MongoResult<DeleteOutcome> {
        let result = self
            .payments()
            .await
            .delete_one(doc! { "id": &id })
            .await
            .map_err(|source| MongoDaoError::Delete {
                collection: PAYMENT_COLLECTION_NAME,
                id,
                source,
            })?;
        Ok(DeleteOutcome {
            acknowledged: true,
            deleted_count: result.deleted_count,
        })
    }

    async fn find_season(&self, id: String) -> MongoResult<Option<SeasonEntity>> {
        let document = self
            .seasons()
            .await
            .find_one(by_id(&id))
            .await
            .map_err(|source| MongoDaoError::Find {
                collection: SEASON_COLLECTION_NAME,
                id,
                source,
            })?;
        Ok(document.map(Into::into))
    }

    async fn insert_season(&self, season: SeasonEntity) -> MongoResult<InsertOutcome> {
        let document: MongoSeasonDocument = season.into();
        self.seasons()
            .await
            .insert_one(&document)
            .await
            .map_err(|source| MongoDaoError::Insert {
                collection: SEASON_COLLECTION_NAME,
                source,
            })?;
        Ok(InsertOutcome {
            acknowledged: true,
            inserted_count: 1,
        })
    }

    async fn increment_season_amount(&self, id: String, delta: f64) -> MongoResult<UpdateOutcome> {
        let result = self
            .seasons()
            .await
            .update_one(by_id(&id), doc! { "$inc": { "amount": delta } })
            .await
            .map_err(|source| MongoDaoError::Update {
                collection: SEASON_COLLECTION_NAME,
                id,
                source,
            })?;
        Ok(updated(result))
    }
}

impl PoolStore for MongoPoolStore {
    fn find_game(&self, id: String) -> BoxFuture<'static, StorageResult<Option<GameEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_game(id).await.map_err(Into::into) })
    }

    fn insert_game(&self, game: GameEntity) -> BoxFuture<'static, StorageResult<InsertOutcome>> {
        let store = self.clone();
        Box::pin(async move { store.insert_game(game).await.map_err(Into::into) })
    }

    fn update_game(
        &self,
        id: String,
        expected: GameStatus,
        update: GameUpdate,
    ) -> BoxFuture<'static, StorageResult<UpdateOutcome>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .update_game(id, expected, update)
                .await
                .map_err(Into::into)
        })
    }

    fn delete_game(
        &self,
        id: String,
        expected: GameStatus,
    ) -> BoxFuture<'static, StorageResult<DeleteOutcome>> {
        let store = self.clone();
        Box::pin(async move { store.delete_game(id, expected).await.map_err(Into::into) })
    }

    fn find_payment(&self, id: String) -> BoxFuture<'static, StorageResult<Option<PaymentEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_payment(id).await.map_err(Into::into) })
    }

    fn list_payments(&self) -> BoxFuture<'static, StorageResult<Vec<PaymentEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .list_payments_matching(Document::new())
                .await
                .map_err(Into::into)
        })
    }

    fn list_payments_by_reference(
        &self,
        reference: String,
    ) -> BoxFuture<'static, StorageResult<Vec<PaymentEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .list_payments_matching(doc! { "reference": reference })
                .await
                .map_err(Into::into)
        })
    }

    fn insert_payments(
        &self,
        payments: Vec<PaymentEntity>,
    ) -> BoxFuture<'static, StorageResult<InsertOutcome>> {
        let store = self.clone();
        Box::pin(async move { store.insert_payments(payments).await.map_err(Into::into) })
    }

    fn update_payment(
        &self,
        id: String,
        guard: PaymentGuard,
        update: PaymentUpdate,
    ) -> BoxFuture<'static, StorageResult<UpdateOutcome>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .update_payment(id, guard, update)
                .await
                .map_err(Into::into)
        })
    }

    fn delete_payment(&self, id: String) -> BoxFuture<'static, StorageResult<DeleteOutcome>> {
        let store = self.clone();
        Box::pin(async move { store.delete_payment(id).await.map_err(Into::into) })
    }

    fn find_season(&self, id: String) -> BoxFuture<'static, StorageResult<Option<SeasonEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_season(id).await.map_err(Into::into) })
    }

    fn insert_season(
        &self,
        season: SeasonEntity,
    ) -> BoxFuture<'static, StorageResult<InsertOutcome>> {
        let store = self.clone();
        Box::pin(async move { store.insert_season(season).await.map_err(Into::into) })
    }

    fn increment_season_amount(
        &self,
        id: String,
        delta: f64,
    ) -> BoxFuture<'static, StorageResult<UpdateOutcome>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .increment_season_amount(id, delta)
                .await
                .map_err(Into::into)
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reconnect().await.map_err(Into::into) })
    }
}
