//! Run configuration: route selection, severity overrides and coverage
//! settings, loadable from a JSON file and validated before use.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::diagnostics::{Diagnostic, Severity, Subject};
use crate::error::{Error, Result};
use crate::model::{RelationId, Tags};
use crate::rules::RouteCategory;

/// Settings for one audit run. Every field has a default so a partial JSON
/// document (or none at all) is valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuditConfig {
    /// Route categories to check.
    pub categories: Vec<RouteCategory>,
    /// Relations that are never checked.
    pub ignore_routes: BTreeSet<RelationId>,
    /// Relations whose errors are downgraded to warnings.
    pub warn_routes: BTreeSet<RelationId>,
    /// Reference feature ids, refs or names whose errors are downgraded.
    pub warn_features: BTreeSet<String>,
    /// Expected chunk count per relation; routes not listed expect one.
    pub expected_chunks: BTreeMap<RelationId, usize>,
    pub coverage: CoverageConfig,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            categories: RouteCategory::all(),
            ignore_routes: BTreeSet::new(),
            warn_routes: BTreeSet::new(),
            warn_features: BTreeSet::new(),
            expected_chunks: BTreeMap::new(),
            coverage: CoverageConfig::default(),
        }
    }
}

/// Coverage evaluation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CoverageConfig {
    /// Maximum directed distance in metres for a route to count as covered.
    pub tolerance: f64,
    /// Maximum vertex spacing in metres after densification.
    pub resample_spacing: f64,
    /// Suffix of the source-specific `ref:`/`name:` tags on internal routes.
    pub alias_key: String,
    /// Internal routes whose ref starts with one of these are not compared.
    pub skip_ref_prefixes: Vec<String>,
    pub reference_ref_key: String,
    pub reference_name_key: String,
    pub reference_id_key: String,
    /// Projection origin `[lon, lat]`; defaults to the mean node coordinate.
    pub projection_origin: Option<[f64; 2]>,
}

impl Default for CoverageConfig {
    fn default() -> Self {
        Self {
            tolerance: 100.0,
            resample_spacing: 100.0,
            alias_key: "geokatalog".to_string(),
            skip_ref_prefixes: ["AV", "E", "SI", "VA"].map(String::from).to_vec(),
            reference_ref_key: "ref".to_string(),
            reference_name_key: "name".to_string(),
            reference_id_key: "id".to_string(),
            projection_origin: None,
        }
    }
}

impl CoverageConfig {
    /// Whether an internal route with `tags` takes part in coverage evaluation.
    pub fn compares_route(&self, tags: &Tags) -> bool {
        if tags.contains("via_ferrata_scale") || tags.is("hiking", "via_ferrata") {
            return false;
        }
        let reference = tags.get_or("ref", "");
        !self
            .skip_ref_prefixes
            .iter()
            .any(|prefix| !prefix.is_empty() && reference.starts_with(prefix.as_str()))
    }
}

impl AuditConfig {
    /// Load and validate a JSON configuration file.
    pub fn from_path(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let config: AuditConfig =
            serde_json::from_str(&text).map_err(|source| Error::ConfigParse {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;
        debug!(path = %path.display(), "loaded audit configuration");
        Ok(config)
    }

    /// Reject values the passes cannot work with.
    pub fn validate(&self) -> Result<()> {
        let coverage = &self.coverage;
        if !(coverage.tolerance.is_finite() && coverage.tolerance > 0.0) {
            return Err(Error::InvalidConfig {
                message: format!("coverage.tolerance must be positive, got {}", coverage.tolerance),
            });
        }
        if !(coverage.resample_spacing.is_finite() && coverage.resample_spacing > 0.0) {
            return Err(Error::InvalidConfig {
                message: format!(
                    "coverage.resample_spacing must be positive, got {}",
                    coverage.resample_spacing
                ),
            });
        }
        if let Some((id, _)) = self.expected_chunks.iter().find(|(_, count)| **count == 0) {
            return Err(Error::InvalidConfig {
                message: format!("expected_chunks for relation {id} must be at least 1"),
            });
        }
        if let Some([lon, lat]) = coverage.projection_origin {
            if !(-180.0..=180.0).contains(&lon) || !(-90.0..=90.0).contains(&lat) {
                return Err(Error::InvalidConfig {
                    message: format!("projection_origin [{lon}, {lat}] is out of range"),
                });
            }
        }
        Ok(())
    }

    pub fn expected_chunks_for(&self, id: RelationId) -> usize {
        self.expected_chunks.get(&id).copied().unwrap_or(1)
    }

    pub fn checks_category(&self, category: &RouteCategory) -> bool {
        self.categories.contains(category)
    }

    /// Whether errors about `subject` are downgraded to warnings.
    pub fn downgrades(&self, subject: &Subject) -> bool {
        match subject {
            Subject::Route { id, .. } => self.warn_routes.contains(id),
            Subject::Feature { id, .. } => {
                self.warn_features.contains(id)
                    || subject
                        .reference()
                        .is_some_and(|r| self.warn_features.contains(r))
                    || subject.name().is_some_and(|n| self.warn_features.contains(n))
            }
        }
    }

    /// Lower `Error` to `Warning` for downgraded subjects.
    pub fn apply_severity(&self, mut diagnostic: Diagnostic) -> Diagnostic {
        if diagnostic.severity == Severity::Error && self.downgrades(&diagnostic.subject) {
            diagnostic.severity = Severity::Warning;
        }
        diagnostic
    }
}
