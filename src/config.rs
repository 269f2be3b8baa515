use crate::canonical::{HierarchyFormatter, DEFAULT_TECHNICAL_PREFIXES};
use crate::error::ConfigError;
use crate::references::{AliasEntry, AliasTable};
use crate::taxonomy::{TagTaxonomy, CONTAINER_TAGS, INLINE_TAGS, METADATA_TAGS, STRUCTURAL_TAGS};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_STREAMING_THRESHOLD_BYTES: u64 = 50_000_000;

fn owned(tags: &[&str]) -> Vec<String> {
    tags.iter().map(|t| (*t).to_string()).collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaxonomyConfig {
    pub structural: Vec<String>,
    pub container: Vec<String>,
    pub inline: Vec<String>,
    pub metadata: Vec<String>,
}

impl Default for TaxonomyConfig {
    fn default() -> Self {
        Self {
            structural: owned(STRUCTURAL_TAGS),
            container: owned(CONTAINER_TAGS),
            inline: owned(INLINE_TAGS),
            metadata: owned(METADATA_TAGS),
        }
    }
}

impl TaxonomyConfig {
    pub fn build(&self) -> Result<TagTaxonomy, ConfigError> {
        TagTaxonomy::from_sets(&self.structural, &self.container, &self.inline, &self.metadata)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HierarchyConfig {
    pub technical_prefixes: Vec<String>,
}

impl Default for HierarchyConfig {
    fn default() -> Self {
        Self {
            technical_prefixes: owned(DEFAULT_TECHNICAL_PREFIXES),
        }
    }
}

impl HierarchyConfig {
    pub fn formatter(&self) -> HierarchyFormatter {
        HierarchyFormatter::new(&self.technical_prefixes)
    }
}

/// Which checks escalate an overlapping pair to `critical`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeverityPolicy {
    /// Both nodes carry `is_current_law`.
    pub current_law_flag: bool,
    /// Both nodes have no `valid_to`.
    pub null_valid_to: bool,
}

impl Default for SeverityPolicy {
    fn default() -> Self {
        Self {
            current_law_flag: true,
            null_valid_to: true,
        }
    }
}

fn default_aliases() -> Vec<AliasEntry> {
    vec![
        AliasEntry::new("TUIR", "dpr:917:1986"),
        AliasEntry::new("Statuto del contribuente", "l:212:2000"),
    ]
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KbConfig {
    pub taxonomy: TaxonomyConfig,
    /// Checked in order; the first alias found in a text wins during resolution.
    pub aliases: Vec<AliasEntry>,
    pub hierarchy: HierarchyConfig,
    pub severity: SeverityPolicy,
    pub streaming_threshold_bytes: u64,
}

impl Default for KbConfig {
    fn default() -> Self {
        Self {
            taxonomy: TaxonomyConfig::default(),
            aliases: default_aliases(),
            hierarchy: HierarchyConfig::default(),
            severity: SeverityPolicy::default(),
            streaming_threshold_bytes: DEFAULT_STREAMING_THRESHOLD_BYTES,
        }
    }
}

impl KbConfig {
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let config: KbConfig = serde_json::from_str(&raw)?;
        config.taxonomy.build()?;
        tracing::debug!(
            "[Config] Loaded {} with {} aliases",
            path.display(),
            config.aliases.len()
        );
        Ok(config)
    }

    pub fn alias_table(&self) -> AliasTable {
        AliasTable::new(&self.aliases)
    }
}
