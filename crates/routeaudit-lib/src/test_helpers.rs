// Test-only builders for `routeaudit-lib` unit tests
#![allow(dead_code)]
use crate::model::{Member, Node, NodeId, Relation, RelationId, Tags, Way, WayId};

/// Node at `(lat, lon)` without tags.
pub fn node(id: NodeId, lat: f64, lon: f64) -> Node {
    Node {
        id,
        lat,
        lon,
        tags: Tags::new(),
    }
}

/// Builder for a named stop node; coordinates are irrelevant to topology.
pub fn stop(id: NodeId, name: &str) -> NodeBuilder {
    NodeBuilder::new(id).tag("name", name)
}

pub struct NodeBuilder {
    node: Node,
}

impl NodeBuilder {
    #[must_use]
    pub fn new(id: NodeId) -> Self {
        Self {
            node: node(id, 0.0, 0.0),
        }
    }

    pub fn at(mut self, lat: f64, lon: f64) -> Self {
        self.node.lat = lat;
        self.node.lon = lon;
        self
    }

    pub fn tag(mut self, key: &str, value: &str) -> Self {
        self.node.tags.insert(key, value);
        self
    }

    pub fn build(self) -> Node {
        self.node
    }
}

/// Builder for ways; every way starts out as a routable `highway=path`.
pub struct WayBuilder {
    way: Way,
}

impl WayBuilder {
    #[must_use]
    pub fn new(id: WayId) -> Self {
        let mut tags = Tags::new();
        tags.insert("highway", "path");
        Self {
            way: Way {
                id,
                nodes: Vec::new(),
                tags,
            },
        }
    }

    pub fn nodes(mut self, nodes: &[NodeId]) -> Self {
        self.way.nodes = nodes.to_vec();
        self
    }

    pub fn name(self, name: &str) -> Self {
        self.tag("name", name)
    }

    pub fn tag(mut self, key: &str, value: &str) -> Self {
        self.way.tags.insert(key, value);
        self
    }

    pub fn build(self) -> Way {
        self.way
    }
}

pub struct RelationBuilder {
    relation: Relation,
}

impl RelationBuilder {
    #[must_use]
    pub fn new(id: RelationId) -> Self {
        Self {
            relation: Relation {
                id,
                tags: Tags::new(),
                members: Vec::new(),
            },
        }
    }

    pub fn tag(mut self, key: &str, value: &str) -> Self {
        self.relation.tags.insert(key, value);
        self
    }

    pub fn way(mut self, id: WayId, role: &str) -> Self {
        self.relation.members.push(Member::way(id, role));
        self
    }

    pub fn node(mut self, id: NodeId, role: &str) -> Self {
        self.relation.members.push(Member::node(id, role));
        self
    }

    pub fn relation(mut self, id: RelationId) -> Self {
        self.relation.members.push(Member::relation(id, ""));
        self
    }

    pub fn build(self) -> Relation {
        self.relation
    }
}
