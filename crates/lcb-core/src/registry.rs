//! Seen-link registry.
//!
//! `LinkRegistry` is the storage port; the only load-bearing invariant is that a
//! URL maps to at most one record. Timestamps are stamped by the registry on
//! every write, never by callers.

use std::{
    collections::{hash_map::Entry, HashMap},
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::{
    domain::{ChannelId, ServerId},
    errors::Error,
    Result,
};

/// Everything the registry remembers about one URL.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkRecord {
    pub url: String,
    pub title: Option<String>,
    pub first_nick: String,
    pub channel: String,
    pub server: String,
    pub count: u64,
    pub updated_at: DateTime<Utc>,
}

/// A first sighting, as handed to [`LinkRegistry::insert`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewLink {
    pub url: String,
    pub nick: String,
    pub channel: ChannelId,
    pub server: ServerId,
}

impl NewLink {
    fn into_record(self, now: DateTime<Utc>) -> LinkRecord {
        LinkRecord {
            url: self.url,
            title: None,
            first_nick: self.nick,
            channel: self.channel.0,
            server: self.server.0,
            count: 1,
            updated_at: now,
        }
    }
}

/// Result of [`LinkRegistry::record_sighting`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Sighting {
    New(LinkRecord),
    Seen(LinkRecord),
}

impl Sighting {
    pub fn record(&self) -> &LinkRecord {
        match self {
            Sighting::New(r) | Sighting::Seen(r) => r,
        }
    }

    pub fn into_record(self) -> LinkRecord {
        match self {
            Sighting::New(r) | Sighting::Seen(r) => r,
        }
    }
}

/// Storage port for link records.
#[async_trait]
pub trait LinkRegistry: Send + Sync {
    async fn lookup(&self, url: &str) -> Result<Option<LinkRecord>>;

    /// Create a record with `count = 1`.
    ///
    /// Fails with [`Error::DuplicateKey`] when the URL already has a record.
    async fn insert(&self, link: NewLink) -> Result<LinkRecord>;

    /// Atomically add one sighting to the stored record for `record.url`.
    async fn increment(&self, record: &LinkRecord) -> Result<LinkRecord>;

    /// Store the page title. Last writer wins.
    async fn set_title(&self, record: &LinkRecord, title: &str) -> Result<()>;

    /// Upsert-or-increment.
    ///
    /// The default composes the primitives above and resolves a lost insert
    /// race exactly once by falling back to lookup + increment. Backends that
    /// can do this in one critical section should override it.
    async fn record_sighting(&self, link: NewLink) -> Result<Sighting> {
        if let Some(existing) = self.lookup(&link.url).await? {
            return Ok(Sighting::Seen(self.increment(&existing).await?));
        }

        let url = link.url.clone();
        match self.insert(link).await {
            Ok(record) => Ok(Sighting::New(record)),
            Err(Error::DuplicateKey(_)) => {
                tracing::debug!(url = %url, "insert raced; counting as a sighting");
                let existing = self
                    .lookup(&url)
                    .await?
                    .ok_or_else(|| Error::NotFound(url.clone()))?;
                Ok(Sighting::Seen(self.increment(&existing).await?))
            }
            Err(e) => Err(e),
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    links: Vec<LinkRecord>,
}

/// Registry held in memory, optionally mirrored to a JSON snapshot file.
///
/// All writes go through one mutex, so increments never lose updates and
/// `record_sighting` is atomic per URL.
#[derive(Debug, Default)]
pub struct InMemoryRegistry {
    links: Mutex<HashMap<String, LinkRecord>>,
    snapshot: Option<PathBuf>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a registry mirrored to `path`, loading it when the file exists.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let links = match tokio::fs::read_to_string(&path).await {
            Ok(txt) if txt.trim().is_empty() => HashMap::new(),
            Ok(txt) => {
                let snap: Snapshot =
                    serde_json::from_str(&txt).map_err(|e| Error::Snapshot {
                        path: path.clone(),
                        reason: e.to_string(),
                    })?;
                snap.links
                    .into_iter()
                    .map(|r| (r.url.clone(), r))
                    .collect()
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(Error::Io(e)),
        };

        tracing::info!(path = %path.display(), links = links.len(), "registry loaded");
        Ok(Self {
            links: Mutex::new(links),
            snapshot: Some(path),
        })
    }

    pub async fn len(&self) -> usize {
        self.links.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.links.lock().await.is_empty()
    }

    /// All records, most recently updated first.
    pub async fn all(&self) -> Vec<LinkRecord> {
        let mut out: Vec<LinkRecord> = self.links.lock().await.values().cloned().collect();
        out.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then(a.url.cmp(&b.url)));
        out
    }

    /// Rewrite the snapshot. Called with the map lock held so files never interleave.
    async fn persist(&self, links: &HashMap<String, LinkRecord>) -> Result<()> {
        let Some(path) = &self.snapshot else {
            return Ok(());
        };

        let mut records: Vec<LinkRecord> = links.values().cloned().collect();
        records.sort_by(|a, b| a.url.cmp(&b.url));
        let body = serde_json::to_string_pretty(&Snapshot { links: records })?;
        write_atomic(path, body.as_bytes()).await
    }

    /// Persist a change to `url`, restoring `previous` when the snapshot write
    /// fails so memory never runs ahead of what the caller was told.
    async fn commit(
        &self,
        links: &mut HashMap<String, LinkRecord>,
        url: &str,
        previous: Option<LinkRecord>,
    ) -> Result<()> {
        let Err(e) = self.persist(links).await else {
            return Ok(());
        };
        match previous {
            Some(record) => {
                links.insert(url.to_string(), record);
            }
            None => {
                links.remove(url);
            }
        }
        tracing::warn!(url, error = %e, "snapshot write failed; change rolled back");
        Err(e)
    }
}

async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(dir).await?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    tokio::fs::write(&tmp, bytes).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

#[async_trait]
impl LinkRegistry for InMemoryRegistry {
    async fn lookup(&self, url: &str) -> Result<Option<LinkRecord>> {
        Ok(self.links.lock().await.get(url).cloned())
    }

    async fn insert(&self, link: NewLink) -> Result<LinkRecord> {
        let mut links = self.links.lock().await;
        let record = match links.entry(link.url.clone()) {
            Entry::Occupied(_) => return Err(Error::DuplicateKey(link.url)),
            Entry::Vacant(slot) => slot.insert(link.into_record(Utc::now())).clone(),
        };
        self.commit(&mut links, &record.url, None).await?;
        Ok(record)
    }

    async fn increment(&self, record: &LinkRecord) -> Result<LinkRecord> {
        let mut links = self.links.lock().await;
        let stored = links
            .get_mut(&record.url)
            .ok_or_else(|| Error::NotFound(record.url.clone()))?;
        let previous = stored.clone();
        stored.count += 1;
        stored.updated_at = Utc::now();
        let updated = stored.clone();
        self.commit(&mut links, &record.url, Some(previous)).await?;
        Ok(updated)
    }

    async fn set_title(&self, record: &LinkRecord, title: &str) -> Result<()> {
        let mut links = self.links.lock().await;
        let stored = links
            .get_mut(&record.url)
            .ok_or_else(|| Error::NotFound(record.url.clone()))?;
        let previous = stored.clone();
        stored.title = Some(title.to_string());
        stored.updated_at = Utc::now();
        self.commit(&mut links, &record.url, Some(previous)).await
    }

    async fn record_sighting(&self, link: NewLink) -> Result<Sighting> {
        let mut links = self.links.lock().await;
        let now = Utc::now();
        let (sighting, previous) = match links.entry(link.url.clone()) {
            Entry::Occupied(mut slot) => {
                let stored = slot.get_mut();
                let previous = stored.clone();
                stored.count += 1;
                stored.updated_at = now;
                (Sighting::Seen(stored.clone()), Some(previous))
            }
            Entry::Vacant(slot) => (
                Sighting::New(slot.insert(link.into_record(now)).clone()),
                None,
            ),
        };
        self.commit(&mut links, &sighting.record().url, previous)
            .await?;
        Ok(sighting)
    }
}
