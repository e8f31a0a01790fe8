//! Per-category traversal rules.
//!
//! Every tag fallback chain the checkers rely on (one-way flags, stop
//! direction hints) is defined here once; call sites ask the resolved
//! [`TraversalRule`] instead of probing tags themselves.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{Node, Relation, Role, Way};

/// Route category taken from a relation's `route` tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum RouteCategory {
    Foot,
    Hiking,
    Worship,
    Bicycle,
    Mtb,
    Piste,
    Ski,
    Bus,
    Road,
    Other(String),
}

static NAMED_CATEGORIES: [RouteCategory; 9] = [
    RouteCategory::Foot,
    RouteCategory::Hiking,
    RouteCategory::Worship,
    RouteCategory::Bicycle,
    RouteCategory::Mtb,
    RouteCategory::Piste,
    RouteCategory::Ski,
    RouteCategory::Bus,
    RouteCategory::Road,
];

impl RouteCategory {
    /// Parse a `route` tag value; unrecognised values become [`RouteCategory::Other`].
    pub fn from_tag(value: &str) -> Self {
        NAMED_CATEGORIES
            .iter()
            .find(|category| category.as_str() == value)
            .cloned()
            .unwrap_or_else(|| RouteCategory::Other(value.to_string()))
    }

    /// Every named category; the default set of categories to check.
    pub fn all() -> Vec<RouteCategory> {
        NAMED_CATEGORIES.to_vec()
    }

    pub fn as_str(&self) -> &str {
        match self {
            RouteCategory::Foot => "foot",
            RouteCategory::Hiking => "hiking",
            RouteCategory::Worship => "worship",
            RouteCategory::Bicycle => "bicycle",
            RouteCategory::Mtb => "mtb",
            RouteCategory::Piste => "piste",
            RouteCategory::Ski => "ski",
            RouteCategory::Bus => "bus",
            RouteCategory::Road => "road",
            RouteCategory::Other(other) => other,
        }
    }

    /// Walking categories: bidirectional regardless of one-way tags.
    pub fn is_hiking(&self) -> bool {
        matches!(
            self,
            RouteCategory::Foot | RouteCategory::Hiking | RouteCategory::Worship
        )
    }
}

impl fmt::Display for RouteCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RouteCategory {
    type Err = Error;

    /// Strict parse for user input: only named categories are accepted.
    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_ascii_lowercase();
        match RouteCategory::from_tag(&normalized) {
            RouteCategory::Other(_) => Err(Error::UnknownCategory {
                name: s.to_string(),
                suggestions: category_suggestions(&normalized),
            }),
            category => Ok(category),
        }
    }
}

impl TryFrom<String> for RouteCategory {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<RouteCategory> for String {
    fn from(value: RouteCategory) -> Self {
        value.as_str().to_string()
    }
}

fn category_suggestions(input: &str) -> Vec<String> {
    let mut scored: Vec<(f64, &str)> = NAMED_CATEGORIES
        .iter()
        .map(|c| (strsim::jaro_winkler(input, c.as_str()), c.as_str()))
        .filter(|(score, _)| *score >= 0.75)
        .collect();
    scored.sort_by(|a, b| b.0.total_cmp(&a.0));
    scored
        .into_iter()
        .take(3)
        .map(|(_, name)| name.to_string())
        .collect()
}

/// When a route's way members must be checked as separate forward and
/// backward passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectionalSplit {
    Never,
    Always,
    /// Only when some way member carries a `forward`/`backward` role.
    WhenRolesPresent,
}

/// Member selection for one topology pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pass {
    /// Unsplit route: ways with role `""` or `start`.
    Whole,
    Forward,
    Backward,
}

impl Pass {
    /// Whether a way member with `role` takes part in this pass.
    pub fn accepts(self, role: &Role) -> bool {
        match self {
            Pass::Whole => matches!(role, Role::Empty | Role::Start),
            Pass::Forward => matches!(role, Role::Empty | Role::Forward),
            Pass::Backward => matches!(role, Role::Empty | Role::Backward),
        }
    }

    /// Label used in diagnostics; empty for an unsplit route.
    pub fn label(self) -> &'static str {
        match self {
            Pass::Whole => "",
            Pass::Forward => "forward",
            Pass::Backward => "backward",
        }
    }
}

/// Direction a stop is served in, from its `direction` tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopDirection {
    Forward,
    Backward,
    Both,
}

impl fmt::Display for StopDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StopDirection::Forward => "forward",
            StopDirection::Backward => "backward",
            StopDirection::Both => "both",
        })
    }
}

const DIRECTION_KEYS: &[&str] = &["direction"];

/// Direction hint of a stop node; anything unrecognised counts as `both`.
pub fn stop_direction(node: &Node) -> StopDirection {
    match node.tags.first_of(DIRECTION_KEYS) {
        Some("forward") => StopDirection::Forward,
        Some("backward") => StopDirection::Backward,
        _ => StopDirection::Both,
    }
}

/// Traversal semantics for one route category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraversalRule {
    /// One-way tag keys probed in order; the first present key decides.
    pub oneway_keys: &'static [&'static str],
    pub bidirectional_by_default: bool,
    pub split: DirectionalSplit,
}

/// Resolve the traversal rule for `category`.
pub fn resolve(category: &RouteCategory) -> TraversalRule {
    let (oneway_keys, split): (&'static [&'static str], DirectionalSplit) = match category {
        RouteCategory::Bus => (&["oneway:psv", "oneway:bus", "oneway"], DirectionalSplit::Never),
        RouteCategory::Bicycle => (&["oneway:bicycle", "oneway"], DirectionalSplit::Always),
        RouteCategory::Mtb => (
            &["oneway:bicycle", "oneway"],
            DirectionalSplit::WhenRolesPresent,
        ),
        RouteCategory::Piste | RouteCategory::Ski => {
            (&["piste:oneway", "oneway"], DirectionalSplit::Never)
        }
        RouteCategory::Road => (&["oneway"], DirectionalSplit::Always),
        _ => (&["oneway"], DirectionalSplit::Never),
    };

    TraversalRule {
        oneway_keys,
        bidirectional_by_default: category.is_hiking(),
        split,
    }
}

impl TraversalRule {
    /// Whether `way` may only be travelled in its stored direction.
    pub fn way_is_oneway(&self, way: &Way) -> bool {
        let mut oneway = way.tags.first_of(self.oneway_keys) == Some("yes");
        if way.is_roundabout() && !self.bidirectional_by_default {
            oneway = true;
        }
        if way.tags.contains("aerialway") {
            return true;
        }
        if self.bidirectional_by_default {
            oneway = false;
        }
        oneway
    }

    /// Whether `relation` must be checked as separate forward/backward passes.
    pub fn requires_split(&self, relation: &Relation) -> bool {
        match self.split {
            DirectionalSplit::Never => false,
            DirectionalSplit::Always => true,
            DirectionalSplit::WhenRolesPresent => relation.has_directional_roles(),
        }
    }
}
