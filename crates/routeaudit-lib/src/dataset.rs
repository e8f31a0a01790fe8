//! File loaders for the two audit inputs: an Overpass JSON route graph and
//! GeoJSON reference features.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use geo::{Coord, LineString};
use geojson::{Feature, GeoJson, Value};
use serde::Deserialize;
use serde_json::Value as JsonValue;
use tracing::{debug, info, warn};

use crate::config::CoverageConfig;
use crate::error::{Error, Result};
use crate::model::{
    Member, MemberKind, Node, NodeId, ReferenceFeature, Relation, RelationId, Role, RouteGraph,
    Tags, Way, WayId,
};

/// Value used in reference datasets for an unset ref or name.
const PLACEHOLDER: &str = ".";

#[derive(Debug, Deserialize)]
struct OverpassDocument {
    elements: Vec<Element>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum Element {
    Node {
        id: NodeId,
        lat: f64,
        lon: f64,
        #[serde(default)]
        tags: Tags,
    },
    Way {
        id: WayId,
        #[serde(default)]
        nodes: Vec<NodeId>,
        #[serde(default)]
        tags: Tags,
    },
    Relation {
        id: RelationId,
        #[serde(default)]
        members: Vec<RawMember>,
        #[serde(default)]
        tags: Tags,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct RawMember {
    #[serde(rename = "type")]
    kind: MemberKind,
    #[serde(rename = "ref")]
    id: i64,
    #[serde(default)]
    role: String,
}

/// Load a route graph from an Overpass JSON document (`out body` with
/// recursed ways and nodes).
pub fn load_route_graph(path: &Path) -> Result<RouteGraph> {
    let file = File::open(path)?;
    let graph = read_route_graph(BufReader::new(file)).map_err(|err| match err {
        Error::Json(source) => Error::UnsupportedGraph {
            path: path.to_path_buf(),
            message: source.to_string(),
        },
        other => other,
    })?;
    info!(
        path = %path.display(),
        relations = graph.relation_count(),
        ways = graph.way_count(),
        nodes = graph.node_count(),
        "loaded route graph"
    );
    Ok(graph)
}

/// Parse an Overpass JSON document from `reader`.
pub fn read_route_graph<R: Read>(reader: R) -> Result<RouteGraph> {
    let document: OverpassDocument = serde_json::from_reader(reader)?;
    let mut graph = RouteGraph::new();
    let mut skipped = 0usize;

    for element in document.elements {
        match element {
            Element::Node { id, lat, lon, tags } => graph.insert_node(Node { id, lat, lon, tags }),
            Element::Way { id, nodes, tags } => graph.insert_way(Way { id, nodes, tags }),
            Element::Relation { id, members, tags } => graph.insert_relation(Relation {
                id,
                tags,
                members: members
                    .into_iter()
                    .map(|m| Member {
                        kind: m.kind,
                        id: m.id,
                        role: Role::from(m.role.as_str()),
                    })
                    .collect(),
            }),
            Element::Other => skipped += 1,
        }
    }
    if skipped > 0 {
        debug!(skipped, "ignored elements of unsupported type");
    }
    Ok(graph)
}

/// Load reference features from GeoJSON files.
///
/// Lines are grouped by feature id across all files and exact duplicates are
/// dropped. Features whose ref and name are both missing or placeholders are
/// skipped, as are non-line geometries.
pub fn load_reference_features(
    paths: &[PathBuf],
    config: &CoverageConfig,
) -> Result<Vec<ReferenceFeature>> {
    let mut features: Vec<ReferenceFeature> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut skipped = 0usize;

    for path in paths {
        let text = fs::read_to_string(path)?;
        let items = match text.parse::<GeoJson>()? {
            GeoJson::FeatureCollection(collection) => collection.features,
            GeoJson::Feature(feature) => vec![feature],
            GeoJson::Geometry(_) => {
                return Err(Error::InvalidReferenceFeature {
                    message: format!("{} holds a bare geometry, not features", path.display()),
                })
            }
        };

        for (index, feature) in items.iter().enumerate() {
            let reference = property_text(feature, &config.reference_ref_key);
            let name = property_text(feature, &config.reference_name_key);
            if reference.is_none() && name.is_none() {
                skipped += 1;
                continue;
            }
            let id = property_text(feature, &config.reference_id_key)
                .or_else(|| feature.id.as_ref().map(feature_id_text))
                .unwrap_or_else(|| format!("{}#{}", path.display(), index));

            let lines = feature_lines(feature, &id)?;
            if lines.is_empty() {
                debug!(feature = %id, "reference feature without line geometry");
                skipped += 1;
                continue;
            }

            let position = *positions.entry(id.clone()).or_insert_with(|| {
                features.push(ReferenceFeature {
                    id: id.clone(),
                    reference: reference.clone(),
                    name: name.clone(),
                    lines: Vec::new(),
                });
                features.len() - 1
            });
            let target = &mut features[position];
            for line in lines {
                if !target.lines.contains(&line) {
                    target.lines.push(line);
                }
            }
        }
    }

    if features.is_empty() && !paths.is_empty() {
        warn!(files = paths.len(), "no usable reference features loaded");
    }
    info!(features = features.len(), skipped, "loaded reference features");
    Ok(features)
}

fn property_text(feature: &Feature, key: &str) -> Option<String> {
    let text = match feature.property(key)? {
        JsonValue::String(s) => s.trim().to_string(),
        JsonValue::Number(n) => n.to_string(),
        _ => return None,
    };
    (!text.is_empty() && text != PLACEHOLDER).then_some(text)
}

fn feature_id_text(id: &geojson::feature::Id) -> String {
    match id {
        geojson::feature::Id::String(s) => s.clone(),
        geojson::feature::Id::Number(n) => n.to_string(),
    }
}

fn feature_lines(feature: &Feature, id: &str) -> Result<Vec<LineString<f64>>> {
    let Some(geometry) = &feature.geometry else {
        return Ok(Vec::new());
    };
    match &geometry.value {
        Value::LineString(positions) => Ok(vec![to_line(positions, id)?]),
        Value::MultiLineString(lines) => lines.iter().map(|p| to_line(p, id)).collect(),
        _ => Ok(Vec::new()),
    }
}

fn to_line(positions: &[Vec<f64>], id: &str) -> Result<LineString<f64>> {
    positions
        .iter()
        .map(|position| match position.as_slice() {
            [x, y, ..] => Ok(Coord { x: *x, y: *y }),
            _ => Err(Error::InvalidReferenceFeature {
                message: format!("feature {id} has a position with fewer than two coordinates"),
            }),
        })
        .collect::<Result<Vec<_>>>()
        .map(LineString::new)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RouteSource;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn overpass_elements_are_loaded() {
        let json = r#"{"elements": [
            {"type": "node", "id": 1, "lat": 47.0, "lon": 15.0},
            {"type": "node", "id": 2, "lat": 47.001, "lon": 15.0, "tags": {"name": "Hut"}},
            {"type": "way", "id": 10, "nodes": [1, 2], "tags": {"highway": "path"}},
            {"type": "relation", "id": 100, "members": [
                {"type": "way", "ref": 10, "role": ""},
                {"type": "node", "ref": 2, "role": "stop"}
            ], "tags": {"route": "bus"}},
            {"type": "area", "id": 5}
        ]}"#;
        let graph = read_route_graph(json.as_bytes()).expect("parses");
        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.way_count(), 1);
        let route = graph.expand(100).expect("expands");
        assert_eq!(route.relation.members[1].role, Role::Stop);
    }

    #[test]
    fn reference_lines_are_grouped_and_deduplicated() {
        let mut file = NamedTempFile::new().expect("temp file");
        write!(
            file,
            r#"{{"type": "FeatureCollection", "features": [
                {{"type": "Feature", "properties": {{"id": "gk-1", "ref": "2", "name": "Nordalpenweg"}},
                  "geometry": {{"type": "LineString", "coordinates": [[15.0, 47.0], [15.1, 47.0]]}}}},
                {{"type": "Feature", "properties": {{"id": "gk-1", "ref": "2", "name": "Nordalpenweg"}},
                  "geometry": {{"type": "MultiLineString", "coordinates": [
                    [[15.0, 47.0], [15.1, 47.0]], [[15.1, 47.0], [15.2, 47.1]]]}}}},
                {{"type": "Feature", "properties": {{"id": "gk-2", "ref": ".", "name": "."}},
                  "geometry": {{"type": "LineString", "coordinates": [[16.0, 47.0], [16.1, 47.0]]}}}},
                {{"type": "Feature", "properties": {{"id": 3, "ref": 7}},
                  "geometry": {{"type": "LineString", "coordinates": [[16.0, 48.0], [16.1, 48.0]]}}}}
            ]}}"#
        )
        .expect("write");

        let features = load_reference_features(&[file.path().to_path_buf()], &CoverageConfig::default())
            .expect("loads");
        assert_eq!(features.len(), 2);
        assert_eq!(features[0].id, "gk-1");
        assert_eq!(features[0].lines.len(), 2);
        assert_eq!(features[1].id, "3");
        assert_eq!(features[1].reference.as_deref(), Some("7"));
        assert_eq!(features[1].name, None);
    }
}
