//! Route audit library entry points.
//!
//! This crate checks route relations for connectivity, orientation, stop order
//! and tagging, and compares route geometries against an independently
//! surveyed reference dataset. Higher-level consumers (the CLI) should only
//! depend on the items exported here instead of reimplementing behavior.
//!

#![deny(warnings)]

pub mod audit;
pub mod config;
pub mod dataset;
pub mod diagnostics;
pub mod error;
pub mod geometry;
pub mod metadata;
pub mod model;
pub mod rules;
pub mod spatial;
pub mod topology;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use audit::{AuditContext, AuditReport, CoverageReport};
pub use config::{AuditConfig, CoverageConfig};
pub use dataset::{load_reference_features, load_route_graph, read_route_graph};
pub use diagnostics::{Diagnostic, DiagnosticKind, Finding, Severity, Subject};
pub use error::{Error, Result};
pub use geometry::{build_geometry, directed_distance, LocalProjection};
pub use model::{
    expand_super_route, ExpandedRoute, Member, MemberKind, Node, NodeId, ReferenceFeature,
    Relation, RelationId, Role, RouteGraph, RouteSource, Tags, Way, WayId,
};
pub use rules::{resolve, Pass, RouteCategory, TraversalRule};
pub use spatial::{match_coverage, CoverageFeature, CoverageResult, MatchKeys, Verdict};
pub use topology::{check_topology, Chunk, TopologyReport};
