use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use secrecy::{ExposeSecret, SecretString};
use uuid::Uuid;

use crate::config::provider::{IngestionMode, ProviderSettings};
use crate::db::record_store::RecordStore;
use crate::errors::AppError;
use crate::ingestion::failover::FailoverPolicy;
use crate::ingestion::provider_client::{ProviderClient, ProviderError};
use crate::ingestion::synthetic::{SyntheticGenerator, SyntheticSample, SYNTHETIC_DEVICE};
use crate::models::health_record::{check_value, MetricType, NewHealthRecord, RecordMetadata, RecordSource};
use crate::models::provider_settings::{ProviderPreferences, DEFAULT_SYNC_TYPES};
use crate::models::sync::{
    ConnectionTestResult, FailedMetric, GroupedSample, ProviderProfile, RawSample, SyncRequest, SyncResponse,
    SyncStats, SyncWindow,
};

/// Map one provider sample onto a canonical record. Samples without an
/// instant, or with values that cannot be stored, are dropped.
pub fn normalize_sample(owner_id: Uuid, metric_type: MetricType, sample: RawSample) -> Option<NewHealthRecord> {
    let Some(timestamp) = sample.measured_at() else {
        tracing::warn!("Dropping {} sample without measureTime or timestamp", metric_type);
        return None;
    };
    if let Err(reason) = check_value(sample.value) {
        tracing::warn!("Dropping {} sample at {}: {}", metric_type, timestamp, reason);
        return None;
    }
    Some(NewHealthRecord {
        owner_id,
        source: RecordSource::ExternalProvider,
        metric_type,
        value: sample.value,
        timestamp,
        metadata: RecordMetadata::ProviderPayload { payload: sample.extra },
    })
}

fn normalize_synthetic(owner_id: Uuid, sample: SyntheticSample) -> NewHealthRecord {
    NewHealthRecord {
        owner_id,
        source: RecordSource::ExternalProvider,
        metric_type: sample.metric_type,
        value: sample.value,
        timestamp: sample.timestamp,
        metadata: RecordMetadata::DeviceInfo {
            device: SYNTHETIC_DEVICE.to_string(),
            synthetic: true,
        },
    }
}

/// Split requested type names into supported types (deduplicated, in request
/// order) and per-type rejections.
pub fn parse_metric_types(requested: &[String]) -> (Vec<MetricType>, Vec<FailedMetric>) {
    let mut accepted = Vec::new();
    let mut rejected = Vec::new();
    for name in requested {
        match name.parse::<MetricType>() {
            Ok(metric_type) if !accepted.contains(&metric_type) => accepted.push(metric_type),
            Ok(_) => {}
            Err(reason) => rejected.push(FailedMetric {
                metric_type: name.clone(),
                reason,
            }),
        }
    }
    (accepted, rejected)
}

/// A credential sent with the request wins over the saved one. Blank values
/// count as absent.
fn pick_credential(
    supplied: Option<SecretString>,
    saved: Option<&ProviderPreferences>,
) -> Result<SecretString, AppError> {
    supplied
        .filter(|credential| !credential.expose_secret().trim().is_empty())
        .or_else(|| {
            saved
                .filter(|preferences| preferences.has_credential())
                .and_then(|preferences| preferences.credential.clone())
        })
        .ok_or_else(|| AppError::validation("credential is required: send one or save it in the provider settings"))
}

/// Requested type names, else the saved ones, else the defaults. An explicit
/// empty list is rejected.
fn pick_metric_types(
    supplied: Option<Vec<String>>,
    saved: Option<&ProviderPreferences>,
) -> Result<Vec<String>, AppError> {
    match supplied {
        Some(names) if names.is_empty() => Err(AppError::validation("metricTypes must not be empty")),
        Some(names) => Ok(names),
        None => {
            let types = saved
                .map(|preferences| preferences.metric_types.as_slice())
                .filter(|types| !types.is_empty())
                .unwrap_or(DEFAULT_SYNC_TYPES.as_slice());
            Ok(types.iter().map(|metric_type| metric_type.to_string()).collect())
        }
    }
}

/// Where the samples of one sync came from.
enum Harvest {
    Live {
        endpoint: String,
        records: Vec<NewHealthRecord>,
        failed: Vec<FailedMetric>,
    },
    Synthetic(Vec<NewHealthRecord>),
}

/// Fetches provider samples and reconciles them into the record store.
pub struct IngestionService {
    store: Arc<dyn RecordStore>,
    client: Arc<dyn ProviderClient>,
    policy: FailoverPolicy,
    mode: IngestionMode,
    fetch_timeout: Duration,
    default_sync_days: i64,
    max_sync_days: i64,
    synthetic_seed: Option<u64>,
}

impl IngestionService {
    pub fn new(store: Arc<dyn RecordStore>, client: Arc<dyn ProviderClient>, settings: &ProviderSettings) -> Self {
        Self {
            store,
            client,
            policy: FailoverPolicy::from_settings(settings),
            mode: settings.ingestion_mode,
            fetch_timeout: settings.fetch_timeout(),
            default_sync_days: settings.default_sync_days,
            max_sync_days: settings.max_sync_days,
            synthetic_seed: None,
        }
    }

    /// Make synthetic output reproducible.
    pub fn with_synthetic_seed(mut self, seed: u64) -> Self {
        self.synthetic_seed = Some(seed);
        self
    }

    pub fn mode(&self) -> IngestionMode {
        self.mode
    }

    /// Resolve the calendar window of a sync request.
    pub fn resolve_window(&self, request: &SyncRequest, today: NaiveDate) -> Result<SyncWindow, AppError> {
        let window = if request.historical {
            match (request.start_date, request.end_date) {
                (Some(start), Some(end)) => SyncWindow { start, end },
                _ => {
                    return Err(AppError::validation(
                        "historical sync requires both startDate and endDate",
                    ))
                }
            }
        } else {
            let days = self.default_sync_days.max(1);
            SyncWindow {
                start: today - chrono::Duration::days(days - 1),
                end: today,
            }
        };

        if window.end < window.start {
            return Err(AppError::validation("endDate must not be before startDate"));
        }
        if window.days() > self.max_sync_days {
            return Err(AppError::validation(format!(
                "a sync window may span at most {} days",
                self.max_sync_days
            )));
        }
        Ok(window)
    }

    fn synthetic_samples(&self, owner_id: Uuid, metric_types: &[MetricType], window: SyncWindow) -> Vec<NewHealthRecord> {
        let rng = match self.synthetic_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        SyntheticGenerator::new(rng)
            .generate(metric_types, window)
            .into_iter()
            .map(|sample| normalize_synthetic(owner_id, sample))
            .collect()
    }

    async fn fetch_type(
        &self,
        endpoint: &str,
        credential: &SecretString,
        metric_type: MetricType,
        window: SyncWindow,
    ) -> Result<Vec<RawSample>, ProviderError> {
        match tokio::time::timeout(
            self.fetch_timeout,
            self.client.fetch_samples(endpoint, credential, metric_type, window),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout(self.fetch_timeout)),
        }
    }

    async fn harvest(
        &self,
        owner_id: Uuid,
        credential: &SecretString,
        metric_types: &[MetricType],
        window: SyncWindow,
    ) -> Result<Harvest, AppError> {
        if self.mode == IngestionMode::Synthetic {
            tracing::info!("Synthetic ingestion mode, generating samples");
            return Ok(Harvest::Synthetic(self.synthetic_samples(owner_id, metric_types, window)));
        }

        let client = self.client.clone();
        let endpoint = match self
            .policy
            .first_responsive(|endpoint| {
                let client = client.clone();
                async move { client.fetch_profile(&endpoint, credential).await }
            })
            .await
        {
            Ok((endpoint, _profile)) => endpoint,
            Err(unreachable) if self.mode.allows_synthetic() => {
                tracing::warn!(
                    "⚠️ Provider unreachable after {} attempts, falling back to synthetic samples",
                    unreachable.attempts.len()
                );
                return Ok(Harvest::Synthetic(self.synthetic_samples(owner_id, metric_types, window)));
            }
            Err(unreachable) => {
                tracing::error!("❌ Provider unreachable: {}", unreachable);
                return Err(AppError::ProviderUnreachable {
                    attempts: unreachable.endpoints(),
                });
            }
        };

        let mut records = Vec::new();
        let mut failed = Vec::new();
        for metric_type in metric_types {
            match self.fetch_type(&endpoint, credential, *metric_type, window).await {
                Ok(samples) => {
                    records.extend(
                        samples
                            .into_iter()
                            .filter_map(|sample| normalize_sample(owner_id, *metric_type, sample)),
                    );
                }
                Err(e) => {
                    tracing::warn!("Fetching {} failed, continuing with the remaining types: {}", metric_type, e);
                    failed.push(FailedMetric {
                        metric_type: metric_type.to_string(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        Ok(Harvest::Live {
            endpoint,
            records,
            failed,
        })
    }

    /// Fetch the requested window and reconcile it into the store.
    ///
    /// The sync cursor is advanced to `now` whenever the sync completes,
    /// whether or not anything new was written.
    #[tracing::instrument(
        name = "Sync provider data",
        skip(self, request),
        fields(owner_id = %owner_id, historical = request.historical)
    )]
    pub async fn sync(
        &self,
        owner_id: Uuid,
        request: SyncRequest,
        today: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<SyncResponse, AppError> {
        if matches!(&request.metric_types, Some(names) if names.is_empty()) {
            return Err(AppError::validation("metricTypes must not be empty"));
        }
        let window = self.resolve_window(&request, today)?;

        let saved = self.store.provider_preferences(owner_id).await?;
        let requested = pick_metric_types(request.metric_types, saved.as_ref())?;
        let credential = pick_credential(request.credential, saved.as_ref())?;

        let (metric_types, mut failed_types) = parse_metric_types(&requested);
        if metric_types.is_empty() {
            return Err(AppError::validation(format!(
                "none of the requested metric types are supported: {}",
                requested.join(", ")
            )));
        }

        let (records, synthetic) = match self.harvest(owner_id, &credential, &metric_types, window).await? {
            Harvest::Live {
                endpoint,
                records,
                failed,
            } => {
                tracing::info!("Fetched {} samples from {}", records.len(), endpoint);
                failed_types.extend(failed);
                (records, false)
            }
            Harvest::Synthetic(records) => (records, true),
        };

        let mut stats = SyncStats::default();
        let mut touched = BTreeSet::new();
        let mut grouped: BTreeMap<DateTime<Utc>, BTreeMap<MetricType, f64>> = BTreeMap::new();

        for record in records {
            let outcome = self.store.upsert(record).await?;
            let stored = outcome.record();
            stats.total_records += 1;
            touched.insert(stored.metric_type);
            if outcome.is_inserted() {
                stats.new_records += 1;
                grouped
                    .entry(stored.timestamp)
                    .or_default()
                    .insert(stored.metric_type, stored.value);
            }
        }
        stats.synced_types = touched.into_iter().collect();

        self.store
            .touch_sync_cursor(owner_id, RecordSource::ExternalProvider, now)
            .await?;

        tracing::info!(
            "✅ Sync finished: {} records, {} new, {} failed types",
            stats.total_records,
            stats.new_records,
            failed_types.len()
        );

        Ok(SyncResponse {
            success: true,
            synthetic,
            stats,
            failed_types,
            data: grouped
                .into_iter()
                .rev()
                .map(|(measure_time, data)| GroupedSample { measure_time, data })
                .collect(),
        })
    }

    /// Check a credential, or the saved one, against the same endpoint list a
    /// sync would use.
    #[tracing::instrument(name = "Test provider connection", skip(self, credential), fields(owner_id = %owner_id))]
    pub async fn test_connection(
        &self,
        owner_id: Uuid,
        credential: Option<SecretString>,
    ) -> Result<ConnectionTestResult, AppError> {
        let saved = self.store.provider_preferences(owner_id).await?;
        let credential = pick_credential(credential, saved.as_ref())?;
        Ok(self.check_endpoints(&credential).await)
    }

    async fn check_endpoints(&self, credential: &SecretString) -> ConnectionTestResult {
        let synthetic_result = |message: &str| ConnectionTestResult {
            success: true,
            message: message.to_string(),
            endpoint: None,
            user_data: ProviderProfile {
                user_id: "synthetic".to_string(),
                nickname: "synthetic".to_string(),
            },
            available_data_types: MetricType::PROVIDER_SUPPLIED.to_vec(),
        };

        if self.mode == IngestionMode::Synthetic {
            return synthetic_result("Synthetic ingestion mode, no provider contacted");
        }

        let client = self.client.clone();
        let outcome = self
            .policy
            .first_responsive(|endpoint| {
                let client = client.clone();
                async move { client.fetch_profile(&endpoint, credential).await }
            })
            .await;

        match outcome {
            Ok((endpoint, profile)) => ConnectionTestResult {
                success: true,
                message: "Connection successful".to_string(),
                endpoint: Some(endpoint),
                user_data: profile,
                available_data_types: MetricType::PROVIDER_SUPPLIED.to_vec(),
            },
            Err(unreachable) if self.mode.allows_synthetic() => {
                tracing::warn!("Provider unreachable, reporting synthetic fallback: {}", unreachable);
                synthetic_result("Provider unreachable, synthetic fallback is enabled")
            }
            Err(unreachable) => ConnectionTestResult {
                success: false,
                message: format!(
                    "Could not reach the provider (tried {})",
                    unreachable.endpoints().join(", ")
                ),
                endpoint: None,
                user_data: ProviderProfile {
                    user_id: "unknown".to_string(),
                    nickname: "unknown".to_string(),
                },
                available_data_types: Vec::new(),
            },
        }
    }
}
