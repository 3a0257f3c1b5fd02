//! Creature catalog module
//!
//! The catalog is the read-only table of creature templates. It is loaded
//! through a [`CatalogLoader`] and then shared as `Arc<CreatureCatalog>`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{debug, info};

use crate::error::{CatalogError, Result};
use crate::game::creature::{CreatureInstance, CreatureTemplate};

/// Source of creature templates
pub trait CatalogLoader: Send + Sync {
    /// Load every template
    fn load(&self) -> Result<Vec<CreatureTemplate>>;
}

/// Loads the catalog from a JSON array on disk
#[derive(Debug, Clone)]
pub struct JsonCatalogLoader {
    path: PathBuf,
}

impl JsonCatalogLoader {
    /// Create a loader for the given file
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the catalog file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CatalogLoader for JsonCatalogLoader {
    fn load(&self) -> Result<Vec<CreatureTemplate>> {
        let content = std::fs::read_to_string(&self.path)
            .map_err(|_| CatalogError::NotFound(self.path.display().to_string()))?;

        let templates: Vec<CreatureTemplate> = serde_json::from_str(&content)
            .map_err(|e| CatalogError::InvalidFormat(e.to_string()))?;

        debug!(
            path = %self.path.display(),
            count = templates.len(),
            "Read creature catalog"
        );

        Ok(templates)
    }
}

/// Loader backed by a fixed list of templates
#[derive(Debug, Clone, Default)]
pub struct StaticCatalogLoader {
    templates: Vec<CreatureTemplate>,
}

impl StaticCatalogLoader {
    pub fn new(templates: Vec<CreatureTemplate>) -> Self {
        Self { templates }
    }
}

impl CatalogLoader for StaticCatalogLoader {
    fn load(&self) -> Result<Vec<CreatureTemplate>> {
        Ok(self.templates.clone())
    }
}

/// Read-only table of creature templates
#[derive(Debug, Clone)]
pub struct CreatureCatalog {
    /// Templates in catalog order
    templates: Vec<CreatureTemplate>,
    /// Template id to position in `templates`
    by_id: HashMap<String, usize>,
}

impl CreatureCatalog {
    /// Build a catalog, rejecting empty tables, duplicate ids and
    /// creatures that would enter battle already fainted
    pub fn new(templates: Vec<CreatureTemplate>) -> Result<Self> {
        if templates.is_empty() {
            return Err(CatalogError::Empty.into());
        }

        let mut by_id = HashMap::with_capacity(templates.len());
        for (index, template) in templates.iter().enumerate() {
            if template.stats.hp == 0 {
                return Err(CatalogError::NoHitPoints(template.id.clone()).into());
            }
            if by_id.insert(template.id.clone(), index).is_some() {
                return Err(CatalogError::DuplicateId(template.id.clone()).into());
            }
        }

        Ok(Self { templates, by_id })
    }

    /// Load a catalog through a loader
    pub fn load(loader: &dyn CatalogLoader) -> Result<Self> {
        let catalog = Self::new(loader.load()?)?;
        info!(creatures = catalog.len(), "Creature catalog loaded");
        Ok(catalog)
    }

    /// All templates, in catalog order
    pub fn all(&self) -> &[CreatureTemplate] {
        &self.templates
    }

    /// Get a template by id
    pub fn get(&self, id: &str) -> Option<&CreatureTemplate> {
        self.by_id.get(id).map(|&index| &self.templates[index])
    }

    /// Find a template by display name (case-insensitive)
    pub fn find_by_name(&self, name: &str) -> Option<&CreatureTemplate> {
        self.templates
            .iter()
            .find(|t| t.name.eq_ignore_ascii_case(name))
    }

    /// Look up by id, then by name
    pub fn lookup(&self, query: &str) -> Option<&CreatureTemplate> {
        self.get(query).or_else(|| self.find_by_name(query))
    }

    /// Number of templates
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    /// Check if the catalog is empty
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// The starter template, or the first catalog entry if `id` is unknown
    pub fn starter(&self, id: &str) -> &CreatureTemplate {
        self.get(id).unwrap_or(&self.templates[0])
    }

    /// Draw `count` level-1 creatures uniformly, with replacement
    pub fn roll<R: Rng + ?Sized>(&self, rng: &mut R, count: usize) -> Vec<CreatureInstance> {
        (0..count)
            .filter_map(|_| self.templates.choose(rng))
            .map(|template| template.instantiate(1))
            .collect()
    }
}
