//! rack-state: Persisted chain order
//!
//! Only the chain order survives between sessions; parameter values always
//! start from catalog defaults. The file is a small JSON document stamped
//! with the catalog version it was written against. Ids the current catalog
//! does not know are dropped on load.

use std::fs;
use std::path::{Path, PathBuf};

use rack_core::{CATALOG, CATALOG_VERSION, ChainOrder, EffectDescriptor, RackError, RackResult};
use serde::{Deserialize, Serialize};

/// File name of the persisted order
pub const CHAIN_FILE_NAME: &str = "chain.json";

/// On-disk layout
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum ChainFile {
    Versioned { catalog_version: u32, order: Vec<String> },
    /// Bare id list, as older files store it
    Bare(Vec<String>),
}

impl ChainFile {
    fn into_ids(self) -> (Option<u32>, Vec<String>) {
        match self {
            ChainFile::Versioned { catalog_version, order } => (Some(catalog_version), order),
            ChainFile::Bare(order) => (None, order),
        }
    }
}

/// Loads and saves the chain order at one path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainStore {
    path: PathBuf,
}

impl ChainStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at the platform config location
    pub fn at_default_path() -> Self {
        Self::new(Self::default_path())
    }

    /// `<config dir>/fxrack/chain.json`
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .map(|d| d.join("fxrack"))
            .unwrap_or_else(|| PathBuf::from("."))
            .join(CHAIN_FILE_NAME)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Persisted order against the built-in catalog
    pub fn load(&self) -> ChainOrder {
        self.load_in(&CATALOG)
    }

    /// Persisted order, keeping only ids present in `catalog`. A missing or
    /// unreadable file gives the default order.
    pub fn load_in(&self, catalog: &[EffectDescriptor]) -> ChainOrder {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    log::warn!("cannot read {}: {e}", self.path.display());
                }
                return ChainOrder::default();
            }
        };

        let (version, ids) = match serde_json::from_str::<ChainFile>(&content) {
            Ok(file) => file.into_ids(),
            Err(e) => {
                log::warn!("ignoring corrupt chain file {}: {e}", self.path.display());
                return ChainOrder::default();
            }
        };
        if let Some(v) = version.filter(|&v| v != CATALOG_VERSION) {
            log::info!("chain file written against catalog v{v}, now v{CATALOG_VERSION}");
        }

        ChainOrder::from_ids_in(ids, catalog)
    }

    /// Write `order`, creating the parent directory if needed
    pub fn save(&self, order: &ChainOrder) -> RackResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = ChainFile::Versioned {
            catalog_version: CATALOG_VERSION,
            order: order.ids().into_iter().map(String::from).collect(),
        };
        let json = serde_json::to_string_pretty(&file).map_err(|e| RackError::Serialization(e.to_string()))?;
        fs::write(&self.path, json)?;
        log::debug!("saved chain order {order} to {}", self.path.display());
        Ok(())
    }

    /// Forget the persisted order; the next load gives the default
    pub fn reset(&self) -> RackResult<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
