use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::engine::{CoachingEngine, TipKind};

/// Marker carried by exported content packs.
pub const PACK_TYPE: &str = "callcoach-content-pack";

/// A keyword-to-coaching-response mapping configured by the user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentMapping {
    pub id: String,

    #[serde(rename = "type")]
    pub kind: TipKind,

    /// Keywords matched case-insensitively against processed text
    pub keywords: Vec<String>,

    /// Coaching response shown when a keyword matches
    pub content: String,
}

/// Portable export of the mapping configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MappingPack {
    #[serde(rename = "type")]
    pub pack_type: String,
    pub version: String,
    pub exported_at: DateTime<Utc>,
    pub mappings: Vec<ContentMapping>,
}

impl MappingPack {
    pub fn new(mappings: Vec<ContentMapping>) -> Self {
        Self {
            pack_type: PACK_TYPE.to_string(),
            version: "1.0".to_string(),
            exported_at: Utc::now(),
            mappings,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.pack_type.contains("content-pack") {
            bail!("not a valid content pack: {}", self.pack_type);
        }
        Ok(())
    }
}

/// How imported mappings combine with existing configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportMode {
    /// Drop existing mappings and take the pack's.
    Replace,
    /// Add only mappings whose keywords are all new.
    Merge,
}

impl CoachingEngine {
    pub fn export_pack(&self) -> MappingPack {
        MappingPack::new(self.mappings().to_vec())
    }

    /// Import a content pack; returns the number of mappings taken.
    ///
    /// Merge skips mappings that share any keyword (case-insensitive) with
    /// the existing configuration, and re-ids collisions.
    pub fn import_pack(&mut self, pack: MappingPack, mode: ImportMode) -> Result<usize> {
        pack.validate()?;
        match mode {
            ImportMode::Replace => {
                let count = pack.mappings.len();
                self.set_mappings(pack.mappings);
                Ok(count)
            }
            ImportMode::Merge => {
                let existing_keywords: HashSet<String> = self
                    .mappings()
                    .iter()
                    .flat_map(|m| m.keywords.iter().map(|k| k.to_lowercase()))
                    .collect();
                let existing_ids: HashSet<String> =
                    self.mappings().iter().map(|m| m.id.clone()).collect();

                let mut added = 0;
                for mut mapping in pack.mappings {
                    let overlaps = mapping
                        .keywords
                        .iter()
                        .any(|k| existing_keywords.contains(&k.to_lowercase()));
                    if overlaps {
                        continue;
                    }
                    if existing_ids.contains(&mapping.id) {
                        mapping.id = uuid::Uuid::new_v4().to_string();
                    }
                    self.add_mapping(mapping);
                    added += 1;
                }
                Ok(added)
            }
        }
    }
}
