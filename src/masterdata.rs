//! Process-wide cache of the reference ("master data") collections shared
//! across the CRUD views.
//!
//! Consistency model: every write goes to the backend and is followed by a
//! full reload of all eight collections. The cache never patches itself
//! locally, so it can never drift from the source of truth.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::http::{RequestClient, RequestError, ResponseBody};

#[derive(Debug, Error)]
pub enum MasterDataError {
    #[error(transparent)]
    Request(#[from] RequestError),
    #[error("Unknown master data module: {0}")]
    UnknownModule(String),
}

/// The closed set of reference modules.
///
/// Each maps to a dash-case key (used by string-keyed view code) and a
/// plural REST resource under `/sys/`. An unknown module cannot exist for
/// typed callers; string callers fail in [`FromStr`] before any network call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModuleKind {
    Factory,
    Workshop,
    Line,
    Machine,
    AbnormalCategory,
    AbnormalType,
    Team,
    Person,
}

impl ModuleKind {
    pub const ALL: [ModuleKind; 8] = [
        ModuleKind::Factory,
        ModuleKind::Workshop,
        ModuleKind::Line,
        ModuleKind::Machine,
        ModuleKind::AbnormalCategory,
        ModuleKind::AbnormalType,
        ModuleKind::Team,
        ModuleKind::Person,
    ];

    pub fn key(self) -> &'static str {
        match self {
            ModuleKind::Factory => "factory",
            ModuleKind::Workshop => "workshop",
            ModuleKind::Line => "line",
            ModuleKind::Machine => "machine",
            ModuleKind::AbnormalCategory => "abnormal-category",
            ModuleKind::AbnormalType => "abnormal-type",
            ModuleKind::Team => "team",
            ModuleKind::Person => "people",
        }
    }

    fn resource(self) -> &'static str {
        match self {
            ModuleKind::Factory => "factories",
            ModuleKind::Workshop => "workshops",
            ModuleKind::Line => "lines",
            ModuleKind::Machine => "machines",
            ModuleKind::AbnormalCategory => "abnormal-categories",
            ModuleKind::AbnormalType => "abnormal-types",
            ModuleKind::Team => "teams",
            ModuleKind::Person => "people",
        }
    }

    fn endpoint(self) -> String {
        format!("/sys/{}", self.resource())
    }
}

impl FromStr for ModuleKind {
    type Err = MasterDataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ModuleKind::ALL
            .into_iter()
            .find(|module| module.key() == s)
            .ok_or_else(|| MasterDataError::UnknownModule(s.to_string()))
    }
}

/// One reference entry. The schema is owned by the backend; everything past
/// the id and display name rides along untyped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefRecord {
    pub id: i64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

#[derive(Debug, Default)]
struct CacheInner {
    abnormal_categories: Vec<RefRecord>,
    abnormal_types: Vec<RefRecord>,
    factories: Vec<RefRecord>,
    lines: Vec<RefRecord>,
    loaded: bool,
    machines: Vec<RefRecord>,
    people: Vec<RefRecord>,
    teams: Vec<RefRecord>,
    workshops: Vec<RefRecord>,
}

/// The shared master data cache.
#[derive(Debug)]
pub struct MasterDataCache {
    http: Arc<RequestClient>,
    inner: RwLock<CacheInner>,
}

impl MasterDataCache {
    pub fn new(http: Arc<RequestClient>) -> Self {
        Self {
            http,
            inner: RwLock::new(CacheInner::default()),
        }
    }

    /// Whether the most recent full reload completed without error.
    pub async fn loaded(&self) -> bool {
        self.inner.read().await.loaded
    }

    /// Clone of one collection.
    pub async fn collection(&self, module: ModuleKind) -> Vec<RefRecord> {
        let inner = self.inner.read().await;
        match module {
            ModuleKind::Factory => inner.factories.clone(),
            ModuleKind::Workshop => inner.workshops.clone(),
            ModuleKind::Line => inner.lines.clone(),
            ModuleKind::Machine => inner.machines.clone(),
            ModuleKind::AbnormalCategory => inner.abnormal_categories.clone(),
            ModuleKind::AbnormalType => inner.abnormal_types.clone(),
            ModuleKind::Team => inner.teams.clone(),
            ModuleKind::Person => inner.people.clone(),
        }
    }

    /// Person id to display name, recomputed from the person collection.
    pub async fn people_map(&self) -> HashMap<i64, String> {
        build_people_map(&self.inner.read().await.people)
    }

    /// Reload all eight collections concurrently.
    ///
    /// All-or-nothing: if any fetch fails, the error propagates and neither
    /// the collections nor `loaded` change. On full success all eight are
    /// swapped in a single write-lock section, so no intermediate mix of old
    /// and new collections is ever observable.
    pub async fn load_all(&self) -> Result<(), MasterDataError> {
        tracing::debug!("Loading master data");
        let (
            factories,
            workshops,
            lines,
            machines,
            abnormal_categories,
            abnormal_types,
            teams,
            people,
        ) = futures_util::try_join!(
            self.fetch(ModuleKind::Factory),
            self.fetch(ModuleKind::Workshop),
            self.fetch(ModuleKind::Line),
            self.fetch(ModuleKind::Machine),
            self.fetch(ModuleKind::AbnormalCategory),
            self.fetch(ModuleKind::AbnormalType),
            self.fetch(ModuleKind::Team),
            self.fetch(ModuleKind::Person),
        )?;

        let mut inner = self.inner.write().await;
        inner.factories = factories;
        inner.workshops = workshops;
        inner.lines = lines;
        inner.machines = machines;
        inner.abnormal_categories = abnormal_categories;
        inner.abnormal_types = abnormal_types;
        inner.teams = teams;
        inner.people = people;
        inner.loaded = true;
        Ok(())
    }

    async fn fetch(&self, module: ModuleKind) -> Result<Vec<RefRecord>, MasterDataError> {
        let body = self.http.get(&module.endpoint()).await?;
        match body {
            Some(ResponseBody::Json(value)) => {
                Ok(serde_json::from_value(value).map_err(RequestError::from)?)
            }
            _ => Ok(Vec::new()),
        }
    }

    /// Create an entry, then re-derive the whole cache from the backend.
    pub async fn create(&self, module: ModuleKind, data: Value) -> Result<(), MasterDataError> {
        self.http.post(&module.endpoint(), data).await?;
        self.load_all().await
    }

    /// Update an entry, then re-derive the whole cache from the backend.
    pub async fn update(
        &self,
        module: ModuleKind,
        id: i64,
        data: Value,
    ) -> Result<(), MasterDataError> {
        self.http
            .put(&format!("{}/{}", module.endpoint(), id), data)
            .await?;
        self.load_all().await
    }

    /// Delete an entry, then re-derive the whole cache from the backend.
    pub async fn delete(&self, module: ModuleKind, id: i64) -> Result<(), MasterDataError> {
        self.http
            .delete(&format!("{}/{}", module.endpoint(), id))
            .await?;
        self.load_all().await
    }

    /// String-keyed [`create`](Self::create) for view code that dispatches on
    /// module keys. Fails with [`MasterDataError::UnknownModule`] before any
    /// network call.
    pub async fn create_item(&self, module: &str, data: Value) -> Result<(), MasterDataError> {
        self.create(module.parse()?, data).await
    }

    /// String-keyed [`update`](Self::update).
    pub async fn update_item(
        &self,
        module: &str,
        id: i64,
        data: Value,
    ) -> Result<(), MasterDataError> {
        self.update(module.parse()?, id, data).await
    }

    /// String-keyed [`delete`](Self::delete).
    pub async fn delete_item(&self, module: &str, id: i64) -> Result<(), MasterDataError> {
        self.delete(module.parse()?, id).await
    }

    /// Drop all collections and the `loaded` flag. No network call.
    pub async fn reset(&self) {
        let mut inner = self.inner.write().await;
        *inner = CacheInner::default();
    }
}

fn build_people_map(people: &[RefRecord]) -> HashMap<i64, String> {
    people
        .iter()
        .filter_map(|person| Some((person.id, person.name.clone()?)))
        .collect()
}
