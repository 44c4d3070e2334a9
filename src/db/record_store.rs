use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::health_record::{HealthRecord, IdentityKey, MetricType, NewHealthRecord, RecordSource};
use crate::models::provider_settings::ProviderPreferences;
use crate::models::sync::SyncCursor;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Stored row is corrupt: {0}")]
    CorruptRow(String),

    #[error("Backend error: {0}")]
    Backend(String),
}

/// Result of reconciling one record against the store.
#[derive(Debug, Clone, PartialEq)]
pub enum UpsertOutcome {
    Inserted(HealthRecord),
    Updated(HealthRecord),
}

impl UpsertOutcome {
    pub fn record(&self) -> &HealthRecord {
        match self {
            UpsertOutcome::Inserted(record) | UpsertOutcome::Updated(record) => record,
        }
    }

    pub fn into_record(self) -> HealthRecord {
        match self {
            UpsertOutcome::Inserted(record) | UpsertOutcome::Updated(record) => record,
        }
    }

    pub fn is_inserted(&self) -> bool {
        matches!(self, UpsertOutcome::Inserted(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Ascending,
    #[default]
    Descending,
}

/// Range query by owner, optional type/source and time bounds (inclusive).
#[derive(Debug, Clone, PartialEq)]
pub struct RecordQuery {
    pub owner_id: Uuid,
    pub metric_type: Option<MetricType>,
    pub source: Option<RecordSource>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub order: SortOrder,
    pub limit: Option<i64>,
}

impl RecordQuery {
    pub fn for_owner(owner_id: Uuid) -> Self {
        Self {
            owner_id,
            metric_type: None,
            source: None,
            start: None,
            end: None,
            order: SortOrder::Descending,
            limit: None,
        }
    }

    pub fn metric(mut self, metric_type: Option<MetricType>) -> Self {
        self.metric_type = metric_type;
        self
    }

    pub fn source(mut self, source: Option<RecordSource>) -> Self {
        self.source = source;
        self
    }

    pub fn between(mut self, start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Self {
        self.start = start;
        self.end = end;
        self
    }

    pub fn order(mut self, order: SortOrder) -> Self {
        self.order = order;
        self
    }

    pub fn limit(mut self, limit: Option<i64>) -> Self {
        self.limit = limit;
        self
    }

    pub fn matches(&self, record: &HealthRecord) -> bool {
        record.owner_id == self.owner_id
            && self.metric_type.map_or(true, |metric| record.metric_type == metric)
            && self.source.map_or(true, |source| record.source == source)
            && self.start.map_or(true, |start| record.timestamp >= start)
            && self.end.map_or(true, |end| record.timestamp <= end)
    }
}

/// Which of an owner's records a bulk delete removes.
#[derive(Debug, Clone, PartialEq)]
pub enum DeleteScope {
    All { source: Option<RecordSource> },
    Matching {
        metric_type: Option<MetricType>,
        source: Option<RecordSource>,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    },
}

impl DeleteScope {
    pub fn as_query(&self, owner_id: Uuid) -> RecordQuery {
        match self {
            DeleteScope::All { source } => RecordQuery::for_owner(owner_id).source(*source),
            DeleteScope::Matching { metric_type, source, start, end } => RecordQuery::for_owner(owner_id)
                .metric(*metric_type)
                .source(*source)
                .between(*start, *end),
        }
    }
}

/// Storage seam for health records, sync cursors and provider preferences.
///
/// `upsert` must be atomic per identity key: two concurrent calls carrying
/// the same key produce one insert and one update, never two inserts.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn upsert(&self, record: NewHealthRecord) -> Result<UpsertOutcome, StoreError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<HealthRecord>, StoreError>;

    async fn find_by_key(&self, key: &IdentityKey) -> Result<Option<HealthRecord>, StoreError>;

    async fn query(&self, query: &RecordQuery) -> Result<Vec<HealthRecord>, StoreError>;

    async fn latest(&self, owner_id: Uuid, metric_type: MetricType) -> Result<Option<HealthRecord>, StoreError> {
        let query = RecordQuery::for_owner(owner_id)
            .metric(Some(metric_type))
            .order(SortOrder::Descending)
            .limit(Some(1));
        Ok(self.query(&query).await?.into_iter().next())
    }

    async fn delete_by_id(&self, id: Uuid) -> Result<bool, StoreError>;

    async fn delete_matching(&self, owner_id: Uuid, scope: &DeleteScope) -> Result<u64, StoreError>;

    async fn sync_cursor(&self, owner_id: Uuid, source: RecordSource) -> Result<Option<SyncCursor>, StoreError>;

    async fn touch_sync_cursor(
        &self,
        owner_id: Uuid,
        source: RecordSource,
        at: DateTime<Utc>,
    ) -> Result<SyncCursor, StoreError>;

    async fn provider_preferences(&self, owner_id: Uuid) -> Result<Option<ProviderPreferences>, StoreError>;

    /// Insert or replace the owner's preferences.
    async fn save_provider_preferences(
        &self,
        preferences: ProviderPreferences,
    ) -> Result<ProviderPreferences, StoreError>;
}
