//! Common test utilities and fixture helpers.
//!
//! Integration tests cannot reach the crate's private builders, so this module
//! provides small constructors for ways, stops and coverage features plus the
//! location of the checked-in fixtures.

use std::path::PathBuf;

use geo::{LineString, MultiLineString};
use routeaudit_lib::{CoverageFeature, MatchKeys, Node, NodeId, RouteCategory, Subject, Tags, Way, WayId};

/// Path to fixtures directory shared by the library and CLI tests.
#[allow(dead_code)]
pub fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../docs/fixtures")
}

/// Routable way with extra `tags`.
#[allow(dead_code)]
pub fn way(id: WayId, nodes: &[NodeId], tags: &[(&str, &str)]) -> Way {
    let mut all: Tags = tags.iter().copied().collect();
    all.insert("highway", "residential");
    Way {
        id,
        nodes: nodes.to_vec(),
        tags: all,
    }
}

/// Stop node with an optional `direction` tag.
#[allow(dead_code)]
pub fn stop(id: NodeId, direction: Option<&str>) -> Node {
    let mut tags: Tags = [("name", format!("Stop {id}")), ("public_transport", "stop_position".to_string())]
        .into_iter()
        .collect();
    if let Some(direction) = direction {
        tags.insert("direction", direction);
    }
    Node {
        id,
        lat: 0.0,
        lon: 0.0,
        tags,
    }
}

/// Internal hiking route feature with a single polyline.
#[allow(dead_code)]
pub fn internal(id: i64, reference: Option<&str>, coords: &[(f64, f64)]) -> CoverageFeature {
    CoverageFeature {
        subject: Subject::Route {
            id,
            category: RouteCategory::Hiking,
            reference: reference.map(str::to_string),
            name: None,
        },
        keys: MatchKeys::from_reference(reference, None),
        geometry: MultiLineString::new(vec![LineString::from(coords.to_vec())]),
    }
}

/// Reference feature with a single polyline.
#[allow(dead_code)]
pub fn external(id: &str, reference: Option<&str>, coords: &[(f64, f64)]) -> CoverageFeature {
    CoverageFeature {
        subject: Subject::Feature {
            id: id.to_string(),
            reference: reference.map(str::to_string),
            name: None,
        },
        keys: MatchKeys::from_reference(reference, None),
        geometry: MultiLineString::new(vec![LineString::from(coords.to_vec())]),
    }
}
