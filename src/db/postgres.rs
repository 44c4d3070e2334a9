use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::db::record_store::{DeleteScope, RecordQuery, RecordStore, SortOrder, StoreError, UpsertOutcome};
use crate::models::health_record::{HealthRecord, IdentityKey, MetricType, NewHealthRecord, RecordMetadata, RecordSource};
use crate::models::provider_settings::ProviderPreferences;
use crate::models::sync::SyncCursor;

const RECORD_COLUMNS: &str =
    "id, owner_id, source, metric_type, value, timestamp, metadata, created_at, updated_at";

#[derive(Debug, FromRow)]
struct HealthRecordRow {
    id: Uuid,
    owner_id: Uuid,
    source: String,
    metric_type: String,
    value: f64,
    timestamp: DateTime<Utc>,
    metadata: Json<RecordMetadata>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<HealthRecordRow> for HealthRecord {
    type Error = StoreError;

    fn try_from(row: HealthRecordRow) -> Result<Self, Self::Error> {
        Ok(HealthRecord {
            id: row.id,
            owner_id: row.owner_id,
            source: row.source.parse().map_err(StoreError::CorruptRow)?,
            metric_type: row.metric_type.parse().map_err(StoreError::CorruptRow)?,
            value: row.value,
            timestamp: row.timestamp,
            metadata: row.metadata.0,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug)]
struct SyncCursorRow {
    owner_id: Uuid,
    source: String,
    last_sync: DateTime<Utc>,
}

impl TryFrom<SyncCursorRow> for SyncCursor {
    type Error = StoreError;

    fn try_from(row: SyncCursorRow) -> Result<Self, Self::Error> {
        Ok(SyncCursor {
            owner_id: row.owner_id,
            source: row.source.parse().map_err(StoreError::CorruptRow)?,
            last_sync: row.last_sync,
        })
    }
}

#[derive(Debug)]
struct ProviderSettingsRow {
    owner_id: Uuid,
    credential: Option<String>,
    auto_sync: bool,
    sync_frequency: String,
    metric_types: Vec<String>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ProviderSettingsRow> for ProviderPreferences {
    type Error = StoreError;

    fn try_from(row: ProviderSettingsRow) -> Result<Self, Self::Error> {
        let metric_types = row
            .metric_types
            .iter()
            .map(|name| name.parse::<MetricType>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(StoreError::CorruptRow)?;
        Ok(ProviderPreferences {
            owner_id: row.owner_id,
            credential: row.credential.map(|credential| SecretString::new(credential.into_boxed_str())),
            auto_sync: row.auto_sync,
            sync_frequency: row.sync_frequency.parse().map_err(StoreError::CorruptRow)?,
            metric_types,
            updated_at: row.updated_at,
        })
    }
}

fn push_filters(builder: &mut QueryBuilder<'_, Postgres>, query: &RecordQuery) {
    builder.push(" WHERE owner_id = ").push_bind(query.owner_id);
    if let Some(metric_type) = query.metric_type {
        builder.push(" AND metric_type = ").push_bind(metric_type.as_str());
    }
    if let Some(source) = query.source {
        builder.push(" AND source = ").push_bind(source.as_str());
    }
    if let Some(start) = query.start {
        builder.push(" AND timestamp >= ").push_bind(start);
    }
    if let Some(end) = query.end {
        builder.push(" AND timestamp <= ").push_bind(end);
    }
}

/// Postgres-backed store. The identity key is enforced by the
/// `health_records_identity_key` unique index.
#[derive(Clone, Debug)]
pub struct PgRecordStore {
    pool: PgPool,
}

impl PgRecordStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl RecordStore for PgRecordStore {
    #[tracing::instrument(
        name = "Upsert health record",
        skip(self, record),
        fields(
            owner_id = %record.owner_id,
            metric_type = %record.metric_type,
            source = %record.source
        )
    )]
    async fn upsert(&self, record: NewHealthRecord) -> Result<UpsertOutcome, StoreError> {
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query_as!(
            HealthRecordRow,
            r#"
            INSERT INTO health_records (id, owner_id, source, metric_type, value, timestamp, metadata)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (owner_id, metric_type, timestamp, source) DO NOTHING
            RETURNING id, owner_id, source, metric_type, value, timestamp, metadata as "metadata: Json<RecordMetadata>", created_at, updated_at
        "#,
            Uuid::new_v4(),
            record.owner_id,
            record.source.as_str(),
            record.metric_type.as_str(),
            record.value,
            record.timestamp,
            Json(&record.metadata) as _
        )
        .fetch_optional(&mut *tx)
        .await?;

        if let Some(row) = inserted {
            tx.commit().await?;
            tracing::debug!("Inserted health record {}", row.id);
            return Ok(UpsertOutcome::Inserted(row.try_into()?));
        }

        // The key exists: lock the row so the metadata merge sees no interleaving writer.
        let existing = sqlx::query_as!(
            HealthRecordRow,
            r#"
            SELECT id, owner_id, source, metric_type, value, timestamp, metadata as "metadata: Json<RecordMetadata>", created_at, updated_at
            FROM health_records
            WHERE owner_id = $1 AND metric_type = $2 AND timestamp = $3 AND source = $4
            FOR UPDATE
        "#,
            record.owner_id,
            record.metric_type.as_str(),
            record.timestamp,
            record.source.as_str()
        )
        .fetch_one(&mut *tx)
        .await?;

        let merged = existing.metadata.0.clone().merge(record.metadata);
        let updated = sqlx::query_as!(
            HealthRecordRow,
            r#"
            UPDATE health_records
            SET value = $1, metadata = $2, updated_at = NOW()
            WHERE id = $3
            RETURNING id, owner_id, source, metric_type, value, timestamp, metadata as "metadata: Json<RecordMetadata>", created_at, updated_at
        "#,
            record.value,
            Json(&merged) as _,
            existing.id
        )
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        tracing::debug!("Updated health record {}", updated.id);
        Ok(UpsertOutcome::Updated(updated.try_into()?))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<HealthRecord>, StoreError> {
        let row = sqlx::query_as!(
            HealthRecordRow,
            r#"
            SELECT id, owner_id, source, metric_type, value, timestamp, metadata as "metadata: Json<RecordMetadata>", created_at, updated_at
            FROM health_records
            WHERE id = $1
        "#,
            id
        )
        .fetch_optional(&self.pool)
        .await?;

        row.map(HealthRecord::try_from).transpose()
    }

    async fn find_by_key(&self, key: &IdentityKey) -> Result<Option<HealthRecord>, StoreError> {
        let row = sqlx::query_as!(
            HealthRecordRow,
            r#"
            SELECT id, owner_id, source, metric_type, value, timestamp, metadata as "metadata: Json<RecordMetadata>", created_at, updated_at
            FROM health_records
            WHERE owner_id = $1 AND metric_type = $2 AND timestamp = $3 AND source = $4
        "#,
            key.owner_id,
            key.metric_type.as_str(),
            key.timestamp,
            key.source.as_str()
        )
        .fetch_optional(&self.pool)
        .await?;

        row.map(HealthRecord::try_from).transpose()
    }

    #[tracing::instrument(
        name = "Query health records",
        skip(self, query),
        fields(
            owner_id = %query.owner_id,
            metric_type = ?query.metric_type
        )
    )]
    async fn query(&self, query: &RecordQuery) -> Result<Vec<HealthRecord>, StoreError> {
        let mut builder = QueryBuilder::<Postgres>::new(format!("SELECT {} FROM health_records", RECORD_COLUMNS));
        push_filters(&mut builder, query);
        builder.push(match query.order {
            SortOrder::Ascending => " ORDER BY timestamp ASC",
            SortOrder::Descending => " ORDER BY timestamp DESC",
        });
        if let Some(limit) = query.limit {
            builder.push(" LIMIT ").push_bind(limit);
        }

        let rows = builder
            .build_query_as::<HealthRecordRow>()
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(HealthRecord::try_from).collect()
    }

    async fn latest(&self, owner_id: Uuid, metric_type: MetricType) -> Result<Option<HealthRecord>, StoreError> {
        let row = sqlx::query_as!(
            HealthRecordRow,
            r#"
            SELECT id, owner_id, source, metric_type, value, timestamp, metadata as "metadata: Json<RecordMetadata>", created_at, updated_at
            FROM health_records
            WHERE owner_id = $1 AND metric_type = $2
            ORDER BY timestamp DESC
            LIMIT 1
        "#,
            owner_id,
            metric_type.as_str()
        )
        .fetch_optional(&self.pool)
        .await?;

        row.map(HealthRecord::try_from).transpose()
    }

    async fn delete_by_id(&self, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query!("DELETE FROM health_records WHERE id = $1", id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    #[tracing::instrument(name = "Delete health records", skip(self), fields(owner_id = %owner_id))]
    async fn delete_matching(&self, owner_id: Uuid, scope: &DeleteScope) -> Result<u64, StoreError> {
        let query = scope.as_query(owner_id);
        let mut builder = QueryBuilder::<Postgres>::new("DELETE FROM health_records");
        push_filters(&mut builder, &query);

        let result = builder.build().execute(&self.pool).await?;
        tracing::info!("Deleted {} health records", result.rows_affected());
        Ok(result.rows_affected())
    }

    async fn sync_cursor(&self, owner_id: Uuid, source: RecordSource) -> Result<Option<SyncCursor>, StoreError> {
        let row = sqlx::query_as!(
            SyncCursorRow,
            r#"
            SELECT owner_id, source, last_sync
            FROM sync_cursors
            WHERE owner_id = $1 AND source = $2
        "#,
            owner_id,
            source.as_str()
        )
        .fetch_optional(&self.pool)
        .await?;

        row.map(SyncCursor::try_from).transpose()
    }

    async fn touch_sync_cursor(
        &self,
        owner_id: Uuid,
        source: RecordSource,
        at: DateTime<Utc>,
    ) -> Result<SyncCursor, StoreError> {
        let row = sqlx::query_as!(
            SyncCursorRow,
            r#"
            INSERT INTO sync_cursors (owner_id, source, last_sync)
            VALUES ($1, $2, $3)
            ON CONFLICT (owner_id, source) DO UPDATE SET last_sync = EXCLUDED.last_sync
            RETURNING owner_id, source, last_sync
        "#,
            owner_id,
            source.as_str(),
            at
        )
        .fetch_one(&self.pool)
        .await?;

        row.try_into()
    }

    async fn provider_preferences(&self, owner_id: Uuid) -> Result<Option<ProviderPreferences>, StoreError> {
        let row = sqlx::query_as!(
            ProviderSettingsRow,
            r#"
            SELECT owner_id, credential, auto_sync, sync_frequency, metric_types, updated_at
            FROM provider_settings
            WHERE owner_id = $1
        "#,
            owner_id
        )
        .fetch_optional(&self.pool)
        .await?;

        row.map(ProviderPreferences::try_from).transpose()
    }

    #[tracing::instrument(
        name = "Save provider settings",
        skip(self, preferences),
        fields(owner_id = %preferences.owner_id)
    )]
    async fn save_provider_preferences(
        &self,
        preferences: ProviderPreferences,
    ) -> Result<ProviderPreferences, StoreError> {
        let metric_types: Vec<String> = preferences
            .metric_types
            .iter()
            .map(|metric_type| metric_type.as_str().to_string())
            .collect();

        let row = sqlx::query_as!(
            ProviderSettingsRow,
            r#"
            INSERT INTO provider_settings (owner_id, credential, auto_sync, sync_frequency, metric_types, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (owner_id) DO UPDATE SET
                credential = EXCLUDED.credential,
                auto_sync = EXCLUDED.auto_sync,
                sync_frequency = EXCLUDED.sync_frequency,
                metric_types = EXCLUDED.metric_types,
                updated_at = EXCLUDED.updated_at
            RETURNING owner_id, credential, auto_sync, sync_frequency, metric_types, updated_at
        "#,
            preferences.owner_id,
            preferences.credential.as_ref().map(|credential| credential.expose_secret()),
            preferences.auto_sync,
            preferences.sync_frequency.as_str(),
            &metric_types,
            preferences.updated_at
        )
        .fetch_one(&self.pool)
        .await?;

        row.try_into()
    }
}
