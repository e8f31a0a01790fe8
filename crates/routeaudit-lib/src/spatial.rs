//! Coverage evaluation between two route collections.
//!
//! One collection is indexed in an R-tree of bounding boxes expanded by the
//! tolerance; every feature of the other collection queries it for candidates,
//! filters them by metadata, and is then measured against the matched
//! candidates with a directed distance.
//!
//! # Matching
//!
//! Metadata only ever narrows the candidate set. When no candidate is
//! confirmed by ref or name, the nearest candidate by directed distance is
//! used instead (preferring candidates whose metadata was inconclusive over
//! those whose refs contradict), and the result is flagged as a fallback.
//!
//! # Direction
//!
//! `match_coverage(a, b)` answers "is every part of each `a` feature near a
//! matched `b` feature". Running it with the collections swapped answers a
//! different question; a long internal route can be partially covered by a
//! short reference feature while that same feature is fully covered by it.

use geo::{BoundingRect, MultiLineString};
use once_cell::sync::Lazy;
use rayon::prelude::*;
use regex::Regex;
use rstar::primitives::{GeomWithData, Rectangle};
use rstar::{RTree, AABB};
use tracing::debug;

use crate::diagnostics::Subject;
use crate::geometry::directed_distance;
use crate::model::Tags;

/// European long-distance refs, `E` followed by the three-digit number the
/// reference dataset uses.
static EUROPEAN_REF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^E(\d{3})$").expect("static regex"));

/// Normalised reference code and names used for candidate filtering.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchKeys {
    pub reference: Option<String>,
    pub names: Vec<String>,
}

impl MatchKeys {
    /// Keys of an internal route. `alias_key` names the source-specific tag
    /// suffix, e.g. `ref:<alias_key>` and `name:<alias_key>`.
    pub fn from_route_tags(tags: &Tags, alias_key: &str) -> Self {
        let alias_ref = format!("ref:{alias_key}");
        let alias_name = format!("name:{alias_key}");
        let reference = tags
            .first_of(&[alias_ref.as_str(), "ref"])
            .and_then(normalize);
        let names = tags
            .first_of(&[alias_name.as_str(), "name:de", "name"])
            .map(|raw| raw.split(';').filter_map(normalize).collect())
            .unwrap_or_default();
        Self { reference, names }
    }

    pub fn from_reference(reference: Option<&str>, name: Option<&str>) -> Self {
        Self {
            reference: reference.and_then(normalize),
            names: name.and_then(normalize).into_iter().collect(),
        }
    }
}

fn normalize(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Outcome of comparing an internal route's keys with a reference feature's.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataMatch {
    Confirmed,
    Rejected,
    Unknown,
}

/// Compare internal route keys with reference feature keys.
///
/// Refs decide first: equal refs, or an internal `E###` against an external
/// `###`, confirm; differing refs reject. Otherwise a shared name confirms.
pub fn metadata_match(internal: &MatchKeys, external: &MatchKeys) -> MetadataMatch {
    if let (Some(own), Some(other)) = (&internal.reference, &external.reference) {
        let european = EUROPEAN_REF
            .captures(own)
            .and_then(|caps| caps.get(1))
            .is_some_and(|digits| digits.as_str() == other.as_str());
        if own == other || european {
            return MetadataMatch::Confirmed;
        }
        return MetadataMatch::Rejected;
    }
    let shared_name = external
        .names
        .iter()
        .any(|name| internal.names.iter().any(|own| own == name));
    if shared_name {
        MetadataMatch::Confirmed
    } else {
        MetadataMatch::Unknown
    }
}

/// Route or reference feature prepared for coverage evaluation.
#[derive(Debug, Clone)]
pub struct CoverageFeature {
    pub subject: Subject,
    pub keys: MatchKeys,
    /// Projected, densified geometry.
    pub geometry: MultiLineString<f64>,
}

impl CoverageFeature {
    fn is_internal(&self) -> bool {
        matches!(self.subject, Subject::Route { .. })
    }
}

fn classify(a: &CoverageFeature, b: &CoverageFeature) -> MetadataMatch {
    if a.is_internal() {
        metadata_match(&a.keys, &b.keys)
    } else {
        metadata_match(&b.keys, &a.keys)
    }
}

/// Coverage verdict for one feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Covered,
    Partial,
    NoMatch,
}

/// Result of evaluating one feature of the queried collection.
#[derive(Debug, Clone, PartialEq)]
pub struct CoverageResult {
    /// Index of the evaluated feature in the queried collection.
    pub feature: usize,
    /// Indices of the matched features in the indexed collection.
    pub matched: Vec<usize>,
    pub distance: Option<f64>,
    /// Match chosen by distance because no candidate was confirmed.
    pub fallback: bool,
    pub verdict: Verdict,
}

/// Bounding-box index over a feature collection.
pub struct CoverageIndex {
    tree: RTree<GeomWithData<Rectangle<[f64; 2]>, usize>>,
}

impl CoverageIndex {
    /// Index `features` with envelopes expanded by `tolerance`.
    pub fn build(features: &[CoverageFeature], tolerance: f64) -> Self {
        let items: Vec<_> = features
            .iter()
            .enumerate()
            .filter_map(|(i, feature)| {
                let rect = feature.geometry.bounding_rect()?;
                let envelope = Rectangle::from_corners(
                    [rect.min().x - tolerance, rect.min().y - tolerance],
                    [rect.max().x + tolerance, rect.max().y + tolerance],
                );
                Some(GeomWithData::new(envelope, i))
            })
            .collect();
        debug!(features = items.len(), tolerance, "built coverage index");
        Self {
            tree: RTree::bulk_load(items),
        }
    }

    /// Indices of features whose expanded envelope intersects `geometry`'s
    /// bounding box, ascending.
    pub fn query(&self, geometry: &MultiLineString<f64>) -> Vec<usize> {
        let Some(rect) = geometry.bounding_rect() else {
            return Vec::new();
        };
        let envelope = AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]);
        let mut hits: Vec<usize> = self
            .tree
            .locate_in_envelope_intersecting(&envelope)
            .map(|item| item.data)
            .collect();
        hits.sort_unstable();
        hits
    }
}

/// Evaluate how well each feature of `a` is covered by features of `b`.
pub fn match_coverage(
    a: &[CoverageFeature],
    b: &[CoverageFeature],
    tolerance: f64,
) -> Vec<CoverageResult> {
    let index = CoverageIndex::build(b, tolerance);
    a.par_iter()
        .enumerate()
        .map(|(i, feature)| evaluate(i, feature, b, &index, tolerance))
        .collect()
}

fn evaluate(
    position: usize,
    feature: &CoverageFeature,
    b: &[CoverageFeature],
    index: &CoverageIndex,
    tolerance: f64,
) -> CoverageResult {
    let candidates = index.query(&feature.geometry);
    if candidates.is_empty() {
        return CoverageResult {
            feature: position,
            matched: Vec::new(),
            distance: None,
            fallback: false,
            verdict: Verdict::NoMatch,
        };
    }

    let mut confirmed = Vec::new();
    let mut unknown = Vec::new();
    for &candidate in &candidates {
        match classify(feature, &b[candidate]) {
            MetadataMatch::Confirmed => confirmed.push(candidate),
            MetadataMatch::Unknown => unknown.push(candidate),
            MetadataMatch::Rejected => {}
        }
    }

    let (matched, fallback) = if !confirmed.is_empty() {
        (confirmed, false)
    } else {
        let pool = if unknown.is_empty() { &candidates } else { &unknown };
        let nearest = pool
            .iter()
            .copied()
            .map(|c| (c, directed_distance(&feature.geometry, &b[c].geometry)))
            .min_by(|x, y| x.1.total_cmp(&y.1))
            .map(|(c, _)| c);
        (nearest.into_iter().collect(), true)
    };

    let union = MultiLineString::new(
        matched
            .iter()
            .flat_map(|&m| b[m].geometry.0.iter().cloned())
            .collect(),
    );
    let distance = directed_distance(&feature.geometry, &union);
    let verdict = if distance <= tolerance {
        Verdict::Covered
    } else {
        Verdict::Partial
    };

    CoverageResult {
        feature: position,
        matched,
        distance: Some(distance),
        fallback,
        verdict,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::RouteCategory;
    use geo::{line_string, LineString};

    fn route(id: i64, reference: Option<&str>, line: LineString<f64>) -> CoverageFeature {
        CoverageFeature {
            subject: Subject::Route {
                id,
                category: RouteCategory::Hiking,
                reference: reference.map(str::to_string),
                name: None,
            },
            keys: MatchKeys::from_reference(reference, None),
            geometry: MultiLineString::new(vec![line]),
        }
    }

    fn reference(id: &str, code: Option<&str>, line: LineString<f64>) -> CoverageFeature {
        CoverageFeature {
            subject: Subject::Feature {
                id: id.to_string(),
                reference: code.map(str::to_string),
                name: None,
            },
            keys: MatchKeys::from_reference(code, None),
            geometry: MultiLineString::new(vec![line]),
        }
    }

    #[test]
    fn route_keys_prefer_alias_tags() {
        let tags: Tags = [
            ("ref", "E4"),
            ("ref:geokatalog", "04"),
            ("name", "Ostweg"),
            ("name:de", "Ostalpenweg;Voralpenweg"),
        ]
        .into_iter()
        .collect();
        let keys = MatchKeys::from_route_tags(&tags, "geokatalog");
        assert_eq!(keys.reference.as_deref(), Some("04"));
        assert_eq!(keys.names, vec!["Ostalpenweg", "Voralpenweg"]);
    }

    #[test]
    fn metadata_rule_is_tri_state() {
        let internal = MatchKeys::from_reference(Some("E401"), None);
        let external = MatchKeys::from_reference(Some("401"), None);
        assert_eq!(metadata_match(&internal, &external), MetadataMatch::Confirmed);

        let other = MatchKeys::from_reference(Some("402"), None);
        assert_eq!(metadata_match(&internal, &other), MetadataMatch::Rejected);

        let named = MatchKeys {
            reference: None,
            names: vec!["Nordalpenweg".into(), "01".into()],
        };
        let by_name = MatchKeys::from_reference(Some("01"), Some("Nordalpenweg"));
        assert_eq!(metadata_match(&named, &by_name), MetadataMatch::Confirmed);
        assert_eq!(
            metadata_match(&named, &MatchKeys::default()),
            MetadataMatch::Unknown
        );
    }

    #[test]
    fn only_three_digit_european_refs_are_transliterated() {
        let external = MatchKeys::from_reference(Some("5"), None);
        for own in ["E5", "E05", "E0005", "E5A"] {
            let internal = MatchKeys::from_reference(Some(own), None);
            assert_eq!(
                metadata_match(&internal, &external),
                MetadataMatch::Rejected,
                "{own}"
            );
        }

        let internal = MatchKeys::from_reference(Some("E005"), None);
        let external = MatchKeys::from_reference(Some("005"), None);
        assert_eq!(metadata_match(&internal, &external), MetadataMatch::Confirmed);
        assert_eq!(
            metadata_match(&external, &internal),
            MetadataMatch::Rejected,
            "the transliteration only applies to internal refs"
        );
    }

    #[test]
    fn identical_geometry_is_fully_covered() {
        let line = line_string![(x: 0.0, y: 0.0), (x: 1000.0, y: 0.0)];
        let a = vec![route(1, Some("2"), line.clone())];
        let b = vec![reference("gk-1", Some("2"), line)];

        let results = match_coverage(&a, &b, 100.0);
        assert_eq!(results[0].verdict, Verdict::Covered);
        assert_eq!(results[0].distance, Some(0.0));
        assert_eq!(results[0].matched, vec![0]);
        assert!(!results[0].fallback);
    }

    #[test]
    fn offset_geometry_without_metadata_falls_back_to_nearest() {
        let a = vec![route(1, None, line_string![(x: 0.0, y: 0.0), (x: 1000.0, y: 0.0)])];
        let b = vec![reference(
            "gk-1",
            None,
            line_string![(x: 0.0, y: 0.0), (x: 500.0, y: 0.0)],
        )];

        let results = match_coverage(&a, &b, 100.0);
        assert_eq!(results[0].verdict, Verdict::Partial);
        assert!(results[0].fallback);
        let distance = results[0].distance.expect("distance");
        assert!((distance - 500.0).abs() < 1e-6, "{distance}");
    }

    #[test]
    fn confirmed_candidate_beats_nearer_unconfirmed_one() {
        let a = vec![route(1, Some("5"), line_string![(x: 0.0, y: 0.0), (x: 1000.0, y: 0.0)])];
        let b = vec![
            reference("near", None, line_string![(x: 0.0, y: 0.0), (x: 1000.0, y: 0.0)]),
            reference("far", Some("5"), line_string![(x: 0.0, y: 50.0), (x: 1000.0, y: 50.0)]),
        ];
        let results = match_coverage(&a, &b, 100.0);
        assert_eq!(results[0].matched, vec![1]);
        assert_eq!(results[0].verdict, Verdict::Covered);
        assert!(!results[0].fallback);
    }

    #[test]
    fn far_away_features_have_no_candidates() {
        let a = vec![route(1, Some("2"), line_string![(x: 0.0, y: 0.0), (x: 100.0, y: 0.0)])];
        let b = vec![reference(
            "gk-1",
            Some("2"),
            line_string![(x: 10_000.0, y: 0.0), (x: 10_100.0, y: 0.0)],
        )];
        assert_eq!(match_coverage(&a, &b, 100.0)[0].verdict, Verdict::NoMatch);
    }
}
