use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::db::record_store::{DeleteScope, RecordQuery, RecordStore, SortOrder, StoreError, UpsertOutcome};
use crate::models::health_record::{HealthRecord, IdentityKey, NewHealthRecord, RecordSource};
use crate::models::provider_settings::ProviderPreferences;
use crate::models::sync::SyncCursor;

#[derive(Default)]
struct Tables {
    records: HashMap<Uuid, HealthRecord>,
    by_key: HashMap<IdentityKey, Uuid>,
    cursors: HashMap<(Uuid, RecordSource), SyncCursor>,
    preferences: HashMap<Uuid, ProviderPreferences>,
}

/// Process-local store. Every operation runs under one lock, which makes the
/// check-then-write of `upsert` a single step.
#[derive(Default)]
pub struct InMemoryRecordStore {
    tables: Mutex<Tables>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.tables.lock().await.records.len()
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn upsert(&self, record: NewHealthRecord) -> Result<UpsertOutcome, StoreError> {
        let mut tables = self.tables.lock().await;
        let key = record.identity_key();
        let now = Utc::now();

        if let Some(id) = tables.by_key.get(&key).copied() {
            let existing = tables
                .records
                .get_mut(&id)
                .ok_or_else(|| StoreError::Backend(format!("dangling identity key for record {}", id)))?;
            existing.value = record.value;
            existing.metadata = existing.metadata.clone().merge(record.metadata);
            existing.updated_at = now;
            return Ok(UpsertOutcome::Updated(existing.clone()));
        }

        let stored = HealthRecord {
            id: Uuid::new_v4(),
            owner_id: record.owner_id,
            source: record.source,
            metric_type: record.metric_type,
            value: record.value,
            timestamp: record.timestamp,
            metadata: record.metadata,
            created_at: now,
            updated_at: now,
        };
        tables.by_key.insert(key, stored.id);
        tables.records.insert(stored.id, stored.clone());
        Ok(UpsertOutcome::Inserted(stored))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<HealthRecord>, StoreError> {
        Ok(self.tables.lock().await.records.get(&id).cloned())
    }

    async fn find_by_key(&self, key: &IdentityKey) -> Result<Option<HealthRecord>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables.by_key.get(key).and_then(|id| tables.records.get(id)).cloned())
    }

    async fn query(&self, query: &RecordQuery) -> Result<Vec<HealthRecord>, StoreError> {
        let tables = self.tables.lock().await;
        let mut records: Vec<HealthRecord> = tables
            .records
            .values()
            .filter(|record| query.matches(record))
            .cloned()
            .collect();

        records.sort_by_key(|record| record.timestamp);
        if query.order == SortOrder::Descending {
            records.reverse();
        }
        if let Some(limit) = query.limit {
            records.truncate(limit.max(0) as usize);
        }
        Ok(records)
    }

    async fn delete_by_id(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut tables = self.tables.lock().await;
        match tables.records.remove(&id) {
            Some(record) => {
                tables.by_key.remove(&record.identity_key());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_matching(&self, owner_id: Uuid, scope: &DeleteScope) -> Result<u64, StoreError> {
        let query = scope.as_query(owner_id);
        let mut tables = self.tables.lock().await;
        let doomed: Vec<HealthRecord> = tables
            .records
            .values()
            .filter(|record| query.matches(record))
            .cloned()
            .collect();

        for record in &doomed {
            tables.records.remove(&record.id);
            tables.by_key.remove(&record.identity_key());
        }
        Ok(doomed.len() as u64)
    }

    async fn sync_cursor(&self, owner_id: Uuid, source: RecordSource) -> Result<Option<SyncCursor>, StoreError> {
        Ok(self.tables.lock().await.cursors.get(&(owner_id, source)).cloned())
    }

    async fn touch_sync_cursor(
        &self,
        owner_id: Uuid,
        source: RecordSource,
        at: DateTime<Utc>,
    ) -> Result<SyncCursor, StoreError> {
        let mut tables = self.tables.lock().await;
        let cursor = SyncCursor { owner_id, source, last_sync: at };
        tables.cursors.insert((owner_id, source), cursor.clone());
        Ok(cursor)
    }

    async fn provider_preferences(&self, owner_id: Uuid) -> Result<Option<ProviderPreferences>, StoreError> {
        Ok(self.tables.lock().await.preferences.get(&owner_id).cloned())
    }

    async fn save_provider_preferences(
        &self,
        preferences: ProviderPreferences,
    ) -> Result<ProviderPreferences, StoreError> {
        let mut tables = self.tables.lock().await;
        tables.preferences.insert(preferences.owner_id, preferences.clone());
        Ok(preferences)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::TimeZone;

    use super::*;
    use crate::models::health_record::{MetricType, RecordMetadata};

    fn weight(owner_id: Uuid, value: f64) -> NewHealthRecord {
        NewHealthRecord {
            owner_id,
            source: RecordSource::Manual,
            metric_type: MetricType::Weight,
            value,
            timestamp: Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap(),
            metadata: RecordMetadata::UserNote { note: Some("morning".into()) },
        }
    }

    #[tokio::test]
    async fn matching_key_updates_instead_of_inserting() {
        let store = InMemoryRecordStore::new();
        let owner = Uuid::new_v4();

        let first = store.upsert(weight(owner, 80.0)).await.unwrap();
        let second = store.upsert(weight(owner, 79.5)).await.unwrap();

        assert!(first.is_inserted());
        assert!(!second.is_inserted());
        assert_eq!(second.record().id, first.record().id);
        assert_eq!(second.record().value, 79.5);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn concurrent_upserts_of_one_key_insert_once() {
        let store = Arc::new(InMemoryRecordStore::new());
        let owner = Uuid::new_v4();

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move { store.upsert(weight(owner, 80.0 + i as f64)).await.unwrap() })
            })
            .collect();

        let mut inserted = 0;
        for handle in handles {
            if handle.await.unwrap().is_inserted() {
                inserted += 1;
            }
        }
        assert_eq!(inserted, 1);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn delete_matching_respects_owner_and_type() {
        let store = InMemoryRecordStore::new();
        let owner = Uuid::new_v4();
        let other = Uuid::new_v4();
        store.upsert(weight(owner, 80.0)).await.unwrap();
        store.upsert(weight(other, 70.0)).await.unwrap();
        let mut bodyfat = weight(owner, 22.0);
        bodyfat.metric_type = MetricType::Bodyfat;
        store.upsert(bodyfat).await.unwrap();

        let scope = DeleteScope::Matching {
            metric_type: Some(MetricType::Weight),
            source: None,
            start: None,
            end: None,
        };
        assert_eq!(store.delete_matching(owner, &scope).await.unwrap(), 1);
        assert_eq!(store.len().await, 2);

        // The key is free again after deletion.
        assert!(store.upsert(weight(owner, 81.0)).await.unwrap().is_inserted());
    }
}
