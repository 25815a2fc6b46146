//! Identity Resolver - scientific name clustering
//!
//! Groups spelling variants of the same scientific name and gives each group a
//! stable `P0001`-style identifier.
//!
//! # Algorithm
//! 1. Normalize every name (trim, collapse whitespace, lower-case); empty names
//!    are excluded and counted.
//! 2. Sort the distinct names. Sort order alone decides which member becomes the
//!    canonical label and the order identifiers are handed out.
//! 3. Walk the sorted names. Each name not yet assigned seeds a new cluster and
//!    pulls in every later unassigned name whose token-sort similarity to the
//!    seed is at least the threshold.
//!
//! Similarity is only checked seed→candidate, never transitively: with A~B and
//! B~C but not A~C, C ends up alone whenever A seeds the cluster. This is the
//! established clustering output and is kept as-is.
//!
//! Every name is compared against every later unassigned name, so a run is
//! O(n²) in distinct names. Fine for a few hundred names; a larger corpus would
//! need blocking, checked for equivalence against this implementation.

use casita_common::model::{cell_text, columns, PlantRecord, SourceTable};
use casita_common::Result;
use rapidfuzz::distance::indel;
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, info};

/// Default similarity threshold (0-100 scale, inclusive)
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 90.0;

/// Normalize a scientific name for clustering and lookup
///
/// Returns `None` for names that are empty after trimming.
pub fn normalize_scientific_name(raw: &str) -> Option<String> {
    let normalized = raw
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    if normalized.is_empty() {
        None
    } else {
        Some(normalized)
    }
}

/// Token-sort similarity on a 0-100 scale
///
/// Both strings are split on whitespace, their tokens sorted and re-joined,
/// then compared by Indel distance (insertions and deletions only) normalized
/// by the combined length in chars. Word order therefore doesn't matter:
/// "officinalis salvia" vs "salvia officinalis" scores 100, and a swapped
/// letter pair costs as much as one substitution.
pub fn token_sort_ratio(a: &str, b: &str) -> f64 {
    let a = sorted_tokens(a);
    let b = sorted_tokens(b);

    let total_len = a.chars().count() + b.chars().count();
    if total_len == 0 {
        return 100.0;
    }

    let distance = indel::distance(a.chars(), b.chars());
    // Integer numerator keeps exact scores (e.g. 90.0) free of rounding noise
    (100 * (total_len - distance)) as f64 / total_len as f64
}

fn sorted_tokens(s: &str) -> String {
    let mut tokens: Vec<&str> = s.split_whitespace().collect();
    tokens.sort_unstable();
    tokens.join(" ")
}

/// Identifier and canonical label assigned to one scientific name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub plant_id: String,
    pub canonical_label: String,
}

/// Output of one resolution run
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    /// Normalized scientific name → assignment
    assignments: HashMap<String, Assignment>,
    /// Canonical rows in cluster creation order, seed first within each cluster
    records: Vec<PlantRecord>,
    cluster_count: usize,
    excluded_names: usize,
}

impl Resolution {
    /// Assignment for a raw scientific name (normalized before lookup)
    pub fn assignment(&self, raw_name: &str) -> Option<&Assignment> {
        let name = normalize_scientific_name(raw_name)?;
        self.assignments.get(&name)
    }

    pub fn plant_id(&self, raw_name: &str) -> Option<&str> {
        self.assignment(raw_name).map(|a| a.plant_id.as_str())
    }

    /// One canonical row per cluster member
    pub fn records(&self) -> &[PlantRecord] {
        &self.records
    }

    pub fn cluster_count(&self) -> usize {
        self.cluster_count
    }

    /// Number of distinct names that were clustered
    pub fn name_count(&self) -> usize {
        self.assignments.len()
    }

    /// Inputs dropped because they were empty
    pub fn excluded_names(&self) -> usize {
        self.excluded_names
    }

    /// Canonical table (`plant_id`, `scientific_name`, `canonical_label`)
    pub fn canonical_table(&self) -> Result<SourceTable> {
        SourceTable::with_rows(
            columns::CANONICAL_TABLE,
            PlantRecord::column_names(),
            self.records.iter().map(PlantRecord::to_row).collect(),
        )
    }
}

/// Clusters scientific names into canonical plant identities
#[derive(Debug, Clone, Copy)]
pub struct IdentityResolver {
    threshold: f64,
}

impl Default for IdentityResolver {
    fn default() -> Self {
        Self::new(DEFAULT_SIMILARITY_THRESHOLD)
    }
}

impl IdentityResolver {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Partition `names` into clusters and assign identifiers
    pub fn resolve<I, S>(&self, names: I) -> Resolution
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut excluded_names = 0;
        let mut distinct = BTreeSet::new();
        for raw in names {
            match normalize_scientific_name(raw.as_ref()) {
                Some(name) => {
                    distinct.insert(name);
                }
                None => excluded_names += 1,
            }
        }
        if excluded_names > 0 {
            debug!("Excluded {} empty scientific names from clustering", excluded_names);
        }

        let sorted: Vec<String> = distinct.into_iter().collect();
        let mut assigned = vec![false; sorted.len()];
        let mut resolution = Resolution {
            excluded_names,
            ..Default::default()
        };

        for i in 0..sorted.len() {
            if assigned[i] {
                continue;
            }
            assigned[i] = true;
            let seed = &sorted[i];
            let mut members = vec![i];

            // Every index before i is already assigned, so only later names can join
            for j in (i + 1)..sorted.len() {
                if !assigned[j] && token_sort_ratio(seed, &sorted[j]) >= self.threshold {
                    assigned[j] = true;
                    members.push(j);
                }
            }

            resolution.cluster_count += 1;
            let plant_id = format!("P{:04}", resolution.cluster_count);
            if members.len() > 1 {
                debug!("{} groups {} name variants under '{}'", plant_id, members.len(), seed);
            }

            for idx in members {
                let name = sorted[idx].clone();
                resolution.records.push(PlantRecord {
                    plant_id: plant_id.clone(),
                    scientific_name: name.clone(),
                    canonical_label: seed.clone(),
                });
                resolution.assignments.insert(
                    name,
                    Assignment {
                        plant_id: plant_id.clone(),
                        canonical_label: seed.clone(),
                    },
                );
            }
        }

        info!(
            "Resolved {} distinct scientific names into {} plants",
            resolution.name_count(),
            resolution.cluster_count
        );
        resolution
    }
}

/// Set the `plant_id` column of every table that has `scientific_name`
///
/// Rows whose name has no assignment get a null identifier. An existing
/// `plant_id` column is overwritten, so re-running is idempotent. Returns the
/// number of rows left without an identifier.
pub fn annotate_tables(tables: &mut [SourceTable], resolution: &Resolution) -> Result<usize> {
    let mut unresolved = 0;

    for table in tables.iter_mut() {
        let Some(idx) = table.column_index(columns::SCIENTIFIC_NAME) else {
            continue;
        };

        let ids: Vec<Value> = table
            .rows
            .iter()
            .map(|row| {
                cell_text(&row[idx])
                    .and_then(|name| resolution.plant_id(&name).map(str::to_string))
                    .map(Value::String)
                    .unwrap_or(Value::Null)
            })
            .collect();

        let missing = ids.iter().filter(|v| v.is_null()).count();
        if missing > 0 {
            debug!("{}: {} rows without plant_id", table.name, missing);
        }
        unresolved += missing;

        table.set_column(columns::PLANT_ID, ids)?;
    }

    Ok(unresolved)
}

/// Every scientific name cell across `tables`
pub fn collect_scientific_names(tables: &[SourceTable]) -> Vec<String> {
    tables
        .iter()
        .filter_map(|t| t.column_index(columns::SCIENTIFIC_NAME).map(|idx| (t, idx)))
        .flat_map(|(t, idx)| t.rows.iter().filter_map(move |row| cell_text(&row[idx])))
        .collect()
}
