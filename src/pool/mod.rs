//! Content pools
//!
//! A [`ProgramPool`] is the deduplicated catalog a caller hands to the
//! engine: programs plus the groupings slots refer to (custom shows, filler
//! lists, smart collections). It resolves a [`PoolSource`] into the list of
//! programs a slot iterates over, and implements [`ContentPoolProvider`] so
//! the infinite-schedule service can consume it through the async port.

pub mod filter;

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::models::{ContentProgram, ProgramKind};
use crate::scheduler::error::{SchedulerError, SchedulerResult};

pub use filter::SmartFilter;

/// Where a slot's programs come from
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum PoolSource {
    Movies,
    Show { show_id: String },
    CustomShow { custom_show_id: String },
    FillerList { list_id: String },
    SmartCollection { collection_id: String },
}

impl PoolSource {
    /// Stable key for sharing iterators between slots on the same source
    pub fn key(&self) -> String {
        match self {
            Self::Movies => "movies".to_string(),
            Self::Show { show_id } => format!("show:{show_id}"),
            Self::CustomShow { custom_show_id } => format!("custom-show:{custom_show_id}"),
            Self::FillerList { list_id } => format!("filler:{list_id}"),
            Self::SmartCollection { collection_id } => format!("smart-collection:{collection_id}"),
        }
    }
}

/// Content pool provider port
#[async_trait]
pub trait ContentPoolProvider: Send + Sync {
    /// Resolve a source into its ordered-but-not-yet-iterated programs
    async fn resolve(&self, source: &PoolSource) -> SchedulerResult<Vec<ContentProgram>>;
}

/// Serialized form of a pool (JSON catalog files)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PoolDocument {
    #[serde(default)]
    pub programs: Vec<ContentProgram>,
    /// Custom show id -> program ids, in show order
    #[serde(default)]
    pub custom_shows: HashMap<String, Vec<String>>,
    /// Filler list id -> program ids
    #[serde(default)]
    pub filler_lists: HashMap<String, Vec<String>>,
    /// Smart collection id -> filter expression
    #[serde(default)]
    pub smart_collections: HashMap<String, String>,
}

/// In-memory, deduplicated program catalog
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "PoolDocument", into = "PoolDocument")]
pub struct ProgramPool {
    programs: Vec<ContentProgram>,
    index: HashMap<String, usize>,
    custom_shows: HashMap<String, Vec<String>>,
    filler_lists: HashMap<String, Vec<String>>,
    smart_collections: HashMap<String, String>,
}

impl ProgramPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a program; a later program with the same id replaces the earlier one
    pub fn add_program(&mut self, program: ContentProgram) -> &mut Self {
        match self.index.get(&program.id) {
            Some(&idx) => self.programs[idx] = program,
            None => {
                self.index.insert(program.id.clone(), self.programs.len());
                self.programs.push(program);
            }
        }
        self
    }

    pub fn add_programs(&mut self, programs: impl IntoIterator<Item = ContentProgram>) -> &mut Self {
        for program in programs {
            self.add_program(program);
        }
        self
    }

    pub fn add_custom_show(&mut self, id: impl Into<String>, program_ids: Vec<String>) -> &mut Self {
        self.custom_shows.insert(id.into(), program_ids);
        self
    }

    pub fn add_filler_list(&mut self, id: impl Into<String>, program_ids: Vec<String>) -> &mut Self {
        self.filler_lists.insert(id.into(), program_ids);
        self
    }

    pub fn add_smart_collection(&mut self, id: impl Into<String>, filter: impl Into<String>) -> &mut Self {
        self.smart_collections.insert(id.into(), filter.into());
        self
    }

    pub fn get(&self, id: &str) -> Option<&ContentProgram> {
        self.index.get(id).map(|&idx| &self.programs[idx])
    }

    pub fn programs(&self) -> &[ContentProgram] {
        &self.programs
    }

    pub fn len(&self) -> usize {
        self.programs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.programs.is_empty()
    }

    /// Resolve a source strictly.
    ///
    /// Unknown groupings are `NotFound`; a smart collection whose filter does
    /// not parse is `UnparseableFilter`.
    pub fn try_resolve(&self, source: &PoolSource) -> SchedulerResult<Vec<ContentProgram>> {
        match source {
            PoolSource::Movies => Ok(self
                .programs
                .iter()
                .filter(|p| p.kind == ProgramKind::Movie)
                .cloned()
                .collect()),
            PoolSource::Show { show_id } => Ok(self
                .programs
                .iter()
                .filter(|p| p.show_id.as_deref() == Some(show_id.as_str()))
                .cloned()
                .collect()),
            PoolSource::CustomShow { custom_show_id } => self
                .custom_shows
                .get(custom_show_id)
                .map(|ids| self.lookup_all(ids))
                .ok_or_else(|| SchedulerError::not_found("custom show", custom_show_id)),
            PoolSource::FillerList { list_id } => self
                .filler_lists
                .get(list_id)
                .map(|ids| self.lookup_all(ids))
                .ok_or_else(|| SchedulerError::not_found("filler list", list_id)),
            PoolSource::SmartCollection { collection_id } => {
                let expression = self
                    .smart_collections
                    .get(collection_id)
                    .ok_or_else(|| SchedulerError::not_found("smart collection", collection_id))?;
                let filter = SmartFilter::parse(expression)?;
                Ok(filter.apply(&self.programs))
            }
        }
    }

    /// Resolve a source, degrading an unparseable smart-collection filter to
    /// an empty pool
    pub fn resolve_source(&self, source: &PoolSource) -> SchedulerResult<Vec<ContentProgram>> {
        match self.try_resolve(source) {
            Err(err @ SchedulerError::UnparseableFilter { .. }) => {
                tracing::warn!(source = %source.key(), error = %err, "Smart collection filter degraded to empty pool");
                crate::metrics::record_degradation("unparseable_filter");
                Ok(Vec::new())
            }
            other => other,
        }
    }

    /// Programs by id in the given order; ids missing from the catalog are skipped
    fn lookup_all(&self, ids: &[String]) -> Vec<ContentProgram> {
        ids.iter().filter_map(|id| self.get(id)).cloned().collect()
    }
}

impl From<PoolDocument> for ProgramPool {
    fn from(doc: PoolDocument) -> Self {
        let mut pool = ProgramPool::new();
        pool.add_programs(doc.programs);
        pool.custom_shows = doc.custom_shows;
        pool.filler_lists = doc.filler_lists;
        pool.smart_collections = doc.smart_collections;
        pool
    }
}

impl From<ProgramPool> for PoolDocument {
    fn from(pool: ProgramPool) -> Self {
        Self {
            programs: pool.programs,
            custom_shows: pool.custom_shows,
            filler_lists: pool.filler_lists,
            smart_collections: pool.smart_collections,
        }
    }
}

#[async_trait]
impl ContentPoolProvider for ProgramPool {
    async fn resolve(&self, source: &PoolSource) -> SchedulerResult<Vec<ContentProgram>> {
        self.resolve_source(source)
    }
}
