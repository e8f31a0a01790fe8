//! In-memory route graph: nodes, ways, and route relations with their tags.
//!
//! The graph is built once per run by a loader (see [`crate::dataset`]) and is
//! consumed read-only by the topology and coverage passes. Consumers access
//! routes through the [`RouteSource`] trait so an alternative collaborator
//! (for example one backed by a remote API) can supply relation expansions.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::fmt;

use geo::LineString;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::rules::{Pass, RouteCategory};

/// Identifier of a node in the route graph.
pub type NodeId = i64;
/// Identifier of a way in the route graph.
pub type WayId = i64;
/// Identifier of a route relation.
pub type RelationId = i64;

/// String-keyed tag map with typed accessors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tags(BTreeMap<String, String>);

impl Tags {
    pub fn new() -> Self {
        Self::default()
    }

    /// Value stored under `key`, if any.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Value stored under `key`, or `default` when the tag is absent.
    pub fn get_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.get(key).unwrap_or(default)
    }

    /// Value of the first key in `keys` that is present.
    pub fn first_of(&self, keys: &[&str]) -> Option<&str> {
        keys.iter().find_map(|key| self.get(key))
    }

    /// Whether `key` is present with exactly `value`.
    pub fn is(&self, key: &str, value: &str) -> bool {
        self.get(key) == Some(value)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Tags {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Point in geographic coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub lat: f64,
    pub lon: f64,
    #[serde(default)]
    pub tags: Tags,
}

impl Node {
    /// Name used in messages; `<noname>` when the node is unnamed.
    pub fn display_name(&self) -> &str {
        self.tags.get_or("name", "<noname>")
    }
}

/// Tag keys that make a way part of a traversable network.
const ROUTABLE_KEYS: &[&str] = &["highway", "railway", "aerialway", "piste:type"];

/// Ordered line of nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Way {
    pub id: WayId,
    pub nodes: Vec<NodeId>,
    #[serde(default)]
    pub tags: Tags,
}

impl Way {
    pub fn first_node(&self) -> Option<NodeId> {
        self.nodes.first().copied()
    }

    pub fn last_node(&self) -> Option<NodeId> {
        self.nodes.last().copied()
    }

    pub fn is_closed(&self) -> bool {
        self.nodes.len() > 2 && self.first_node() == self.last_node()
    }

    /// Carries one of the highway/railway/aerialway/piste tags.
    pub fn is_routable(&self) -> bool {
        ROUTABLE_KEYS.iter().any(|key| self.tags.contains(key))
    }

    pub fn is_roundabout(&self) -> bool {
        matches!(
            self.tags.get("junction"),
            Some("roundabout") | Some("circular")
        )
    }

    /// Closed ring that can be entered and left at any node.
    pub fn is_area(&self) -> bool {
        self.is_closed() && (self.tags.is("area", "yes") || self.is_roundabout())
    }

    /// Name used in messages; `unnamed` when the way carries no name.
    pub fn display_name(&self) -> &str {
        self.tags.get_or("name", "unnamed")
    }
}

/// Kind of object a relation member references.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberKind {
    Node,
    Way,
    Relation,
}

/// Member role inside a route relation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Role {
    Empty,
    Forward,
    Backward,
    Start,
    Stop,
    StopEntryOnly,
    StopExitOnly,
    Other(String),
}

impl Role {
    pub fn as_str(&self) -> &str {
        match self {
            Role::Empty => "",
            Role::Forward => "forward",
            Role::Backward => "backward",
            Role::Start => "start",
            Role::Stop => "stop",
            Role::StopEntryOnly => "stop_entry_only",
            Role::StopExitOnly => "stop_exit_only",
            Role::Other(other) => other,
        }
    }

    /// Roles marking a transit stop position.
    pub fn is_stop(&self) -> bool {
        matches!(self, Role::Stop | Role::StopEntryOnly | Role::StopExitOnly)
    }

    pub fn is_directional(&self) -> bool {
        matches!(self, Role::Forward | Role::Backward)
    }
}

impl From<&str> for Role {
    fn from(value: &str) -> Self {
        match value {
            "" => Role::Empty,
            "forward" => Role::Forward,
            "backward" => Role::Backward,
            "start" => Role::Start,
            "stop" => Role::Stop,
            "stop_entry_only" => Role::StopEntryOnly,
            "stop_exit_only" => Role::StopExitOnly,
            other => Role::Other(other.to_string()),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Role {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Role {
    fn deserialize<D: serde::Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Role::from(raw.as_str()))
    }
}

/// Reference from a relation to one of its members.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub kind: MemberKind,
    pub id: i64,
    pub role: Role,
}

impl Member {
    pub fn way(id: WayId, role: &str) -> Self {
        Self {
            kind: MemberKind::Way,
            id,
            role: Role::from(role),
        }
    }

    pub fn node(id: NodeId, role: &str) -> Self {
        Self {
            kind: MemberKind::Node,
            id,
            role: Role::from(role),
        }
    }

    pub fn relation(id: RelationId, role: &str) -> Self {
        Self {
            kind: MemberKind::Relation,
            id,
            role: Role::from(role),
        }
    }
}

/// Route relation: tags plus an ordered member list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relation {
    pub id: RelationId,
    #[serde(default)]
    pub tags: Tags,
    pub members: Vec<Member>,
}

impl Relation {
    /// Category parsed from the `route` tag.
    pub fn category(&self) -> RouteCategory {
        RouteCategory::from_tag(self.tags.get_or("route", ""))
    }

    pub fn reference(&self) -> Option<&str> {
        self.tags.get("ref")
    }

    pub fn name(&self) -> Option<&str> {
        self.tags.get("name")
    }

    /// Any way member carries a `forward` or `backward` role.
    pub fn has_directional_roles(&self) -> bool {
        self.members
            .iter()
            .any(|m| m.kind == MemberKind::Way && m.role.is_directional())
    }

    pub fn has_way_members(&self) -> bool {
        self.members.iter().any(|m| m.kind == MemberKind::Way)
    }

    /// Relation that groups other relations, e.g. a trail made of stages.
    pub fn is_super_route(&self) -> bool {
        self.members.iter().any(|m| m.kind == MemberKind::Relation)
    }

    /// Relation-kind members in member order.
    pub fn child_relations(&self) -> impl Iterator<Item = RelationId> + '_ {
        self.members
            .iter()
            .filter(|m| m.kind == MemberKind::Relation)
            .map(|m| m.id)
    }
}

/// Independently surveyed route geometry from a reference dataset.
///
/// Lines are in geographic `(lon, lat)` coordinates; duplicates have already
/// been removed by the loader.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceFeature {
    pub id: String,
    pub reference: Option<String>,
    pub name: Option<String>,
    pub lines: Vec<LineString<f64>>,
}

/// Full expansion of one relation: the relation plus every member way and
/// node it references, with the node coordinates of those ways.
#[derive(Debug, Clone)]
pub struct ExpandedRoute {
    pub relation: Relation,
    pub ways: HashMap<WayId, Way>,
    pub nodes: HashMap<NodeId, Node>,
}

impl ExpandedRoute {
    pub fn id(&self) -> RelationId {
        self.relation.id
    }

    pub fn way(&self, id: WayId) -> Result<&Way> {
        self.ways.get(&id).ok_or_else(|| Error::MalformedRelation {
            relation: self.id(),
            missing: format!("way {id}"),
        })
    }

    pub fn node(&self, id: NodeId) -> Result<&Node> {
        self.nodes.get(&id).ok_or_else(|| Error::MalformedRelation {
            relation: self.id(),
            missing: format!("node {id}"),
        })
    }

    /// Way members selected for `pass`, in member order.
    pub fn ways_for(&self, pass: Pass) -> Result<Vec<&Way>> {
        self.relation
            .members
            .iter()
            .filter(|m| m.kind == MemberKind::Way && pass.accepts(&m.role))
            .map(|m| self.way(m.id))
            .collect()
    }

    /// All way members regardless of role, in member order.
    pub fn member_ways(&self) -> Result<Vec<&Way>> {
        self.relation
            .members
            .iter()
            .filter(|m| m.kind == MemberKind::Way)
            .map(|m| self.way(m.id))
            .collect()
    }

    /// Node members with a stop role, in member order.
    pub fn stops(&self) -> Result<Vec<&Node>> {
        self.relation
            .members
            .iter()
            .filter(|m| m.kind == MemberKind::Node && m.role.is_stop())
            .map(|m| self.node(m.id))
            .collect()
    }
}

/// Seam between the audit core and whatever supplies route data.
pub trait RouteSource: Sync {
    /// Identifiers of every relation known to the source, in ascending order.
    fn route_ids(&self) -> Vec<RelationId>;

    /// Relation header (tags and members) without expansion.
    fn relation(&self, id: RelationId) -> Option<&Relation>;

    /// Resolve the relation's members into a self-contained expansion.
    fn expand(&self, id: RelationId) -> Result<ExpandedRoute>;

    /// Mean coordinate `(lon, lat)` of the source's nodes, if known.
    fn centroid(&self) -> Option<(f64, f64)> {
        None
    }
}

/// Route graph held entirely in memory.
#[derive(Debug, Clone, Default)]
pub struct RouteGraph {
    nodes: HashMap<NodeId, Node>,
    ways: HashMap<WayId, Way>,
    relations: BTreeMap<RelationId, Relation>,
}

impl RouteGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_node(&mut self, node: Node) {
        self.nodes.insert(node.id, node);
    }

    pub fn insert_way(&mut self, way: Way) {
        self.ways.insert(way.id, way);
    }

    pub fn insert_relation(&mut self, relation: Relation) {
        self.relations.insert(relation.id, relation);
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn way(&self, id: WayId) -> Option<&Way> {
        self.ways.get(&id)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn way_count(&self) -> usize {
        self.ways.len()
    }

    pub fn relation_count(&self) -> usize {
        self.relations.len()
    }

    pub fn relations(&self) -> impl Iterator<Item = &Relation> {
        self.relations.values()
    }
}

impl RouteSource for RouteGraph {
    fn route_ids(&self) -> Vec<RelationId> {
        self.relations.keys().copied().collect()
    }

    fn relation(&self, id: RelationId) -> Option<&Relation> {
        self.relations.get(&id)
    }

    fn expand(&self, id: RelationId) -> Result<ExpandedRoute> {
        let relation = self
            .relations
            .get(&id)
            .ok_or(Error::UnknownRoute { id })?;

        let mut ways = HashMap::new();
        let mut nodes = HashMap::new();
        for member in &relation.members {
            match member.kind {
                MemberKind::Way => {
                    let way = self.ways.get(&member.id).ok_or_else(|| Error::MalformedRelation {
                        relation: id,
                        missing: format!("way {}", member.id),
                    })?;
                    for node_id in &way.nodes {
                        let node =
                            self.nodes
                                .get(node_id)
                                .ok_or_else(|| Error::MalformedRelation {
                                    relation: id,
                                    missing: format!("node {} of way {}", node_id, way.id),
                                })?;
                        nodes.entry(*node_id).or_insert_with(|| node.clone());
                    }
                    ways.entry(way.id).or_insert_with(|| way.clone());
                }
                MemberKind::Node => {
                    let node = self.nodes.get(&member.id).ok_or_else(|| Error::MalformedRelation {
                        relation: id,
                        missing: format!("node {}", member.id),
                    })?;
                    nodes.entry(node.id).or_insert_with(|| node.clone());
                }
                MemberKind::Relation => {}
            }
        }

        debug!(
            relation = id,
            ways = ways.len(),
            nodes = nodes.len(),
            "expanded relation"
        );
        Ok(ExpandedRoute {
            relation: relation.clone(),
            ways,
            nodes,
        })
    }

    fn centroid(&self) -> Option<(f64, f64)> {
        if self.nodes.is_empty() {
            return None;
        }
        // Sum in id order.
        let mut ids: Vec<NodeId> = self.nodes.keys().copied().collect();
        ids.sort_unstable();
        let count = ids.len() as f64;
        let (lon, lat) = ids
            .iter()
            .filter_map(|id| self.nodes.get(id))
            .fold((0.0, 0.0), |(lon, lat), n| (lon + n.lon, lat + n.lat));
        Some((lon / count, lat / count))
    }
}

/// Expand `root` into the route relations it is made of.
///
/// Walks relation members breadth-first with a visited set, so membership
/// cycles terminate. Every reachable relation that has way members is
/// returned (including `root` itself), in discovery order. Children missing
/// from the source are skipped.
pub fn expand_super_route(source: &dyn RouteSource, root: RelationId) -> Vec<RelationId> {
    let mut visited = HashSet::from([root]);
    let mut queue = VecDeque::from([root]);
    let mut routes = Vec::new();

    while let Some(id) = queue.pop_front() {
        let Some(relation) = source.relation(id) else {
            debug!(relation = id, root, "super-route child not in source");
            continue;
        };
        if relation.has_way_members() {
            routes.push(id);
        }
        for child in relation.child_relations() {
            if visited.insert(child) {
                queue.push_back(child);
            }
        }
    }

    routes
}
