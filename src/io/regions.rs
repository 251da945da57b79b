use crate::types::{BoundingBox, SatResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// One persisted region: a name mapped to its bounding box
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionCatalogEntry {
    pub coordinates: BoundingBox,
}

/// Registry of named regions, loaded once per session from a JSON mapping
/// `name -> { "coordinates": { "W": .., "S": .., "E": .., "N": .. } }`.
///
/// Read-only from this crate's perspective; whoever writes the file owns its
/// lifecycle.
#[derive(Debug, Clone, Default)]
pub struct RegionRegistry {
    regions: HashMap<String, RegionCatalogEntry>,
}

impl RegionRegistry {
    /// Load the registry from a JSON file
    pub fn load<P: AsRef<Path>>(path: P) -> SatResult<Self> {
        log::info!("Loading region registry from {}", path.as_ref().display());
        let file = File::open(path.as_ref())?;
        Self::from_reader(BufReader::new(file))
    }

    pub fn from_reader<R: std::io::Read>(reader: R) -> SatResult<Self> {
        let regions: HashMap<String, RegionCatalogEntry> = serde_json::from_reader(reader)?;
        log::debug!("Registry holds {} region(s)", regions.len());
        Ok(Self { regions })
    }

    pub fn get(&self, name: &str) -> Option<&RegionCatalogEntry> {
        self.regions.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.regions.contains_key(name)
    }

    /// Region names in sorted order
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.regions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }
}
