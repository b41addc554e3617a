//! Department standardization: maps free-text department names onto
//! canonical department keys via a configurable alias table.
//!
//! Department strings are rarely identical across sources ("Environment and
//! Climate Change Canada", "Environment Canada", "ECCC"), so the default
//! strategy is case-insensitive substring containment in both directions:
//! a known variant contained in the input, or the input contained in a
//! variant. Pure lookup, no network calls; resolutions are memoized
//! process-wide since the alias table is read-only per run.

use dashmap::DashMap;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

/// Errors loading an alias table from configuration.
#[derive(Debug, Error)]
pub enum DepartmentError {
    #[error("IO error reading alias table: {0}")]
    Io(#[from] std::io::Error),

    #[error("alias table parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("alias table is empty")]
    Empty,
}

/// Substring containment below this length produces spurious hits ("EC" is
/// inside half the table), so shorter strings only match by exact equality.
const MIN_MATCH_LEN: usize = 4;

/// Canonical department key -> known textual variants.
///
/// BTreeMap so iteration order (and therefore first-match resolution) is
/// stable across runs.
#[derive(Debug, Clone, Deserialize)]
#[serde(transparent)]
pub struct AliasTable {
    entries: BTreeMap<String, Vec<String>>,
}

impl AliasTable {
    /// The built-in table covering the departments that appear in Gazette,
    /// Orders in Council, bill, and news-release sources.
    pub fn builtin() -> Self {
        let mut entries = BTreeMap::new();
        let mut add = |canonical: &str, variants: &[&str]| {
            entries.insert(
                canonical.to_string(),
                variants.iter().map(|v| v.to_string()).collect(),
            );
        };

        add(
            "agriculture_agri_food",
            &["agriculture and agri-food", "agriculture canada", "aafc"],
        );
        add(
            "canadian_heritage",
            &["canadian heritage", "heritage canada", "pch"],
        );
        add(
            "crown_indigenous_relations",
            &[
                "crown-indigenous relations",
                "crown indigenous relations and northern affairs",
                "cirnac",
            ],
        );
        add(
            "employment_social_development",
            &[
                "employment and social development",
                "employment and workforce development",
                "esdc",
                "service canada",
            ],
        );
        add(
            "environment_climate_change",
            &[
                "environment and climate change",
                "environment canada",
                "eccc",
            ],
        );
        add("finance", &["department of finance", "finance canada"]);
        add(
            "fisheries_oceans",
            &["fisheries and oceans", "fisheries, oceans and the canadian coast guard", "dfo"],
        );
        add(
            "global_affairs",
            &["global affairs", "foreign affairs", "gac"],
        );
        add("health", &["health canada", "department of health", "phac", "public health agency"]);
        add(
            "housing_infrastructure",
            &[
                "housing, infrastructure and communities",
                "infrastructure canada",
                "housing and diversity and inclusion",
                "cmhc",
            ],
        );
        add(
            "immigration_refugees_citizenship",
            &["immigration, refugees and citizenship", "immigration canada", "ircc"],
        );
        add(
            "indigenous_services",
            &["indigenous services", "isc"],
        );
        add(
            "innovation_science_industry",
            &[
                "innovation, science and economic development",
                "innovation, science and industry",
                "industry canada",
                "ised",
            ],
        );
        add(
            "justice",
            &["department of justice", "justice canada", "attorney general"],
        );
        add(
            "national_defence",
            &["national defence", "defence canada", "dnd"],
        );
        add(
            "natural_resources",
            &["natural resources", "energy and natural resources", "nrcan"],
        );
        add(
            "public_safety",
            &["public safety", "public safety and emergency preparedness", "emergency preparedness"],
        );
        add(
            "transport",
            &["transport canada", "department of transport"],
        );
        add(
            "treasury_board",
            &["treasury board", "treasury board secretariat", "tbs"],
        );
        add(
            "veterans_affairs",
            &["veterans affairs", "vac"],
        );

        Self { entries }
    }

    /// Load a table from a YAML file: a map of canonical key to variant list.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, DepartmentError> {
        let raw = std::fs::read_to_string(path)?;
        let table: AliasTable = serde_yaml::from_str(&raw)?;
        if table.entries.is_empty() {
            return Err(DepartmentError::Empty);
        }
        Ok(table)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_slice()))
    }
}

/// Resolves free-text department names to canonical keys.
pub struct DepartmentStandardizer {
    table: AliasTable,
    /// Memo of lowercase input -> resolution. The table is read-only per
    /// run, so entries are never invalidated.
    cache: DashMap<String, Option<String>>,
}

impl DepartmentStandardizer {
    pub fn new(table: AliasTable) -> Self {
        Self {
            table,
            cache: DashMap::new(),
        }
    }

    /// Standardizer backed by the built-in alias table.
    pub fn builtin() -> Self {
        Self::new(AliasTable::builtin())
    }

    /// Resolve a free-text department name to its canonical key, or `None`
    /// when no alias matches.
    pub fn standardize(&self, raw: &str) -> Option<String> {
        let needle = raw.trim().to_lowercase();
        if needle.is_empty() {
            return None;
        }
        if let Some(hit) = self.cache.get(&needle) {
            return hit.clone();
        }
        let resolved = self.resolve(&needle);
        self.cache.insert(needle, resolved.clone());
        resolved
    }

    fn resolve(&self, needle: &str) -> Option<String> {
        for (canonical, variants) in self.table.iter() {
            for variant in variants {
                let variant = variant.to_lowercase();
                let matched = if needle == variant {
                    true
                } else if needle.len() >= MIN_MATCH_LEN && variant.len() >= MIN_MATCH_LEN {
                    needle.contains(&variant) || variant.contains(needle)
                } else {
                    // Short strings on either side only match exactly.
                    false
                };
                if matched {
                    return Some(canonical.to_string());
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn standardizer() -> DepartmentStandardizer {
        DepartmentStandardizer::builtin()
    }

    // === Scenario: variant contained in a longer input ===

    #[test]
    fn matches_variant_inside_input() {
        let s = standardizer();
        assert_eq!(
            s.standardize("Environment and Climate Change Canada (ECCC)"),
            Some("environment_climate_change".to_string())
        );
    }

    // === Scenario: input contained in a longer variant ===

    #[test]
    fn matches_input_inside_variant() {
        let s = standardizer();
        assert_eq!(
            s.standardize("Treasury Board"),
            Some("treasury_board".to_string())
        );
        assert_eq!(
            s.standardize("public safety"),
            Some("public_safety".to_string())
        );
    }

    #[test]
    fn matching_is_case_insensitive() {
        let s = standardizer();
        assert_eq!(
            s.standardize("HEALTH CANADA"),
            Some("health".to_string())
        );
    }

    // === Scenario: no alias matches ===

    #[test]
    fn unknown_department_resolves_to_none() {
        let s = standardizer();
        assert_eq!(s.standardize("Ministry of Silly Walks"), None);
    }

    #[test]
    fn short_inputs_only_match_exactly() {
        let s = standardizer();
        // "ec" is a substring of several variants; too short to trust.
        assert_eq!(s.standardize("ec"), None);
        // But a three-letter acronym in the table matches by equality.
        assert_eq!(s.standardize("DFO"), Some("fisheries_oceans".to_string()));
        assert_eq!(s.standardize("tbs"), Some("treasury_board".to_string()));
        assert_eq!(s.standardize("pch"), Some("canadian_heritage".to_string()));
    }

    #[test]
    fn acronym_variants_match_exactly() {
        let s = standardizer();
        assert_eq!(s.standardize("ECCC"), Some("environment_climate_change".to_string()));
        assert_eq!(s.standardize("IRCC"), Some("immigration_refugees_citizenship".to_string()));
    }

    // === Scenario: resolutions are memoized ===

    #[test]
    fn repeated_lookups_hit_the_cache() {
        let s = standardizer();
        let first = s.standardize("Finance Canada");
        let second = s.standardize("finance canada");
        assert_eq!(first, second);
        assert_eq!(s.cache.len(), 1, "case-folded input shares one memo entry");
    }

    // === Scenario: alias table loads from YAML ===

    #[test]
    fn loads_alias_table_from_yaml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "environment_climate_change:\n  - environment canada\nfinance:\n  - finance canada"
        )
        .unwrap();

        let table = AliasTable::from_yaml_file(file.path()).unwrap();
        assert_eq!(table.len(), 2);

        let s = DepartmentStandardizer::new(table);
        assert_eq!(
            s.standardize("Department of Finance Canada"),
            Some("finance".to_string())
        );
        // Not in the custom table.
        assert_eq!(s.standardize("Health Canada"), None);
    }

    #[test]
    fn empty_alias_table_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "{{}}").unwrap();
        assert!(matches!(
            AliasTable::from_yaml_file(file.path()),
            Err(DepartmentError::Empty)
        ));
    }
}
