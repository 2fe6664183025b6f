//! Resume-from-history: where to start playback, and keeping the
//! watch-history collaborator current while the viewer watches.
//!
//! Store failures are never fatal to playback; the worst outcome is
//! starting from the beginning and missing a progress write.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use jamghat_model::{
    ProgressKey, RESUME_CEILING_PERCENT, WatchHistoryEntry, WatchTarget,
};
use tracing::{debug, warn};
use url::Url;

#[derive(Debug, thiserror::Error)]
pub enum ProgressStoreError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("store rejected the request ({status})")]
    Rejected { status: u16 },
}

/// Watch-history collaborator.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProgressStore: Send + Sync {
    async fn fetch(
        &self,
        key: &ProgressKey,
    ) -> Result<Option<WatchHistoryEntry>, ProgressStoreError>;

    async fn save(
        &self,
        key: &ProgressKey,
        entry: WatchHistoryEntry,
    ) -> Result<(), ProgressStoreError>;
}

/// Where a returning viewer starts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StartPosition {
    /// Start at zero. `create_record` is set when no history existed and
    /// a zero-progress record should be written.
    FromBeginning { create_record: bool },
    /// Pick up where the viewer left off.
    Resume { seconds: f64 },
}

impl StartPosition {
    pub fn seconds(&self) -> f64 {
        match self {
            StartPosition::FromBeginning { .. } => 0.0,
            StartPosition::Resume { seconds } => *seconds,
        }
    }
}

/// The resume decision table.
///
/// Resume only with a meaningful prior position: a positive
/// `current_time`, progress strictly between zero and the ceiling, and a
/// known duration. At or past the ceiling the content counts as watched
/// and restarts; everything else starts clean.
pub fn resolve_start_position(
    entry: Option<&WatchHistoryEntry>,
) -> StartPosition {
    let Some(entry) = entry else {
        return StartPosition::FromBeginning {
            create_record: true,
        };
    };

    if entry.current_time > 0.0
        && entry.progress > 0.0
        && entry.progress < RESUME_CEILING_PERCENT
        && entry.duration > 0.0
    {
        return StartPosition::Resume {
            seconds: entry.current_time,
        };
    }

    StartPosition::FromBeginning {
        create_record: false,
    }
}

/// Tracks one viewing session against the watch-history store.
#[derive(Debug)]
pub struct ResumeTracker<S: ProgressStore> {
    store: S,
    key: ProgressKey,
    persist_every: Duration,
    last_persisted: Option<Instant>,
}

/// Position reports under this are noise from player startup; persisting
/// them would overwrite real progress with "0% watched".
const MIN_REPORTABLE_SECONDS: f64 = 1.0;

const DEFAULT_PERSIST_EVERY: Duration = Duration::from_secs(10);

impl<S: ProgressStore> ResumeTracker<S> {
    pub fn new(store: S, key: ProgressKey) -> Self {
        Self::with_cadence(store, key, DEFAULT_PERSIST_EVERY)
    }

    pub fn with_cadence(
        store: S,
        key: ProgressKey,
        persist_every: Duration,
    ) -> Self {
        Self {
            store,
            key,
            persist_every,
            last_persisted: None,
        }
    }

    /// Decide the start position before first frame. Creates the initial
    /// zero-progress record for never-watched content; degrades to zero
    /// when the store is unreachable.
    pub async fn begin(&mut self) -> f64 {
        let entry = match self.store.fetch(&self.key).await {
            Ok(entry) => entry,
            Err(err) => {
                warn!("watch history unavailable, starting at 0: {err}");
                return 0.0;
            }
        };

        let decision = resolve_start_position(entry.as_ref());
        if let StartPosition::FromBeginning {
            create_record: true,
        } = decision
            && let Err(err) = self
                .store
                .save(&self.key, WatchHistoryEntry::started())
                .await
        {
            warn!("failed to create watch history record: {err}");
        }
        decision.seconds()
    }

    /// Throttled progress persistence on the engine's time stream.
    pub async fn record_time_update(&mut self, time: f64, duration: f64) {
        if time <= MIN_REPORTABLE_SECONDS || duration <= 0.0 {
            return;
        }
        let now = Instant::now();
        if let Some(last) = self.last_persisted
            && now.duration_since(last) < self.persist_every
        {
            return;
        }
        self.last_persisted = Some(now);

        let entry = WatchHistoryEntry::at_position(time, duration);
        debug!(progress = entry.progress, "persisting watch progress");
        if let Err(err) = self.store.save(&self.key, entry).await {
            warn!("failed to persist watch progress: {err}");
        }
    }

    /// Explicit end-of-media: force 100% and mark completed, bypassing
    /// the persistence throttle.
    pub async fn record_ended(&mut self, duration: f64) {
        self.last_persisted = Some(Instant::now());
        if let Err(err) = self
            .store
            .save(&self.key, WatchHistoryEntry::finished(duration))
            .await
        {
            warn!("failed to mark content completed: {err}");
        }
    }
}

/// HTTP watch-history store against the platform API.
#[derive(Debug, Clone)]
pub struct HttpProgressStore {
    http_client: reqwest::Client,
    base_url: Url,
}

impl HttpProgressStore {
    pub fn new(base_url: Url) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            base_url,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}api/watch/history", self.base_url)
    }

    fn key_query(key: &ProgressKey) -> Vec<(&'static str, String)> {
        let mut query = Vec::new();
        match key.target {
            WatchTarget::Movie { content_id } => {
                query.push(("contentId", content_id.to_string()));
            }
            WatchTarget::Episode {
                series_id,
                episode_id,
            } => {
                query.push(("seriesId", series_id.to_string()));
                query.push(("episodeId", episode_id.to_string()));
            }
        }
        if let Some(profile_id) = key.profile_id {
            query.push(("profileId", profile_id.to_string()));
        }
        query
    }
}

#[async_trait]
impl ProgressStore for HttpProgressStore {
    async fn fetch(
        &self,
        key: &ProgressKey,
    ) -> Result<Option<WatchHistoryEntry>, ProgressStoreError> {
        let response = self
            .http_client
            .get(self.endpoint())
            .header("x-user-id", key.user_id.to_string())
            .query(&Self::key_query(key))
            .timeout(Duration::from_secs(10))
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(ProgressStoreError::Rejected {
                status: response.status().as_u16(),
            });
        }
        Ok(Some(response.json::<WatchHistoryEntry>().await?))
    }

    async fn save(
        &self,
        key: &ProgressKey,
        entry: WatchHistoryEntry,
    ) -> Result<(), ProgressStoreError> {
        let mut body = serde_json::to_value(entry)
            .expect("history entry serializes");
        if let Some(object) = body.as_object_mut() {
            let key_fields = serde_json::to_value(key)
                .expect("progress key serializes");
            if let Some(key_object) = key_fields.as_object() {
                for (name, value) in key_object {
                    object.insert(name.clone(), value.clone());
                }
            }
        }

        let response = self
            .http_client
            .post(self.endpoint())
            .header("x-user-id", key.user_id.to_string())
            .json(&body)
            .timeout(Duration::from_secs(10))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ProgressStoreError::Rejected {
                status: response.status().as_u16(),
            });
        }
        Ok(())
    }
}

/// In-memory store, for demos and tests of consumers.
#[derive(Debug, Default)]
pub struct MemoryProgressStore {
    entries: Mutex<HashMap<ProgressKey, WatchHistoryEntry>>,
}

impl MemoryProgressStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProgressStore for MemoryProgressStore {
    async fn fetch(
        &self,
        key: &ProgressKey,
    ) -> Result<Option<WatchHistoryEntry>, ProgressStoreError> {
        Ok(self.entries.lock().expect("store lock").get(key).copied())
    }

    async fn save(
        &self,
        key: &ProgressKey,
        entry: WatchHistoryEntry,
    ) -> Result<(), ProgressStoreError> {
        self.entries.lock().expect("store lock").insert(*key, entry);
        Ok(())
    }
}
