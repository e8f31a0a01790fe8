//! Orchestration of the topology and coverage passes over a route source.
//!
//! An [`AuditContext`] is built once per run and threaded through both
//! passes. It owns the projection and caches projected route geometries so
//! that the two coverage directions share them. Failures while expanding a
//! single relation are recorded as diagnostics and never abort the run.

use std::collections::{BTreeSet, HashSet};
use std::sync::OnceLock;

use geo::MultiLineString;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::AuditConfig;
use crate::diagnostics::{sort_diagnostics, Diagnostic, DiagnosticKind, Finding, Severity, Subject};
use crate::error::Error;
use crate::geometry::{build_geometry, densify_all, merge_sequences, LocalProjection};
use crate::metadata::{check_stop_tags, validate_relation};
use crate::model::{expand_super_route, ExpandedRoute, ReferenceFeature, Relation, RelationId, RouteSource};
use crate::rules::{resolve, Pass, RouteCategory};
use crate::spatial::{match_coverage, CoverageFeature, CoverageResult, MatchKeys, Verdict};
use crate::topology::check_topology;

/// Outcome of an audit run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AuditReport {
    pub diagnostics: Vec<Diagnostic>,
    pub checked_routes: usize,
    /// Relations with at least one warning or error.
    pub faulty_routes: BTreeSet<RelationId>,
}

impl AuditReport {
    fn from_diagnostics(mut diagnostics: Vec<Diagnostic>, checked_routes: usize) -> Self {
        sort_diagnostics(&mut diagnostics);
        let faulty_routes = diagnostics
            .iter()
            .filter(|d| d.severity >= Severity::Warning)
            .filter_map(|d| d.subject.route_id())
            .collect();
        Self {
            diagnostics,
            checked_routes,
            faulty_routes,
        }
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }

    pub fn has_errors(&self) -> bool {
        self.count(Severity::Error) > 0
    }

    pub fn has_warnings(&self) -> bool {
        self.count(Severity::Warning) > 0
    }
}

/// Coverage pass output. `confirmations` are `FullyCovered` records for
/// internal routes; [`AuditContext::run_audit`] keeps those whose route has
/// other diagnostics.
#[derive(Debug, Clone, Default)]
pub struct CoverageReport {
    pub diagnostics: Vec<Diagnostic>,
    pub confirmations: Vec<Diagnostic>,
    pub compared_routes: usize,
}

impl CoverageReport {
    /// Report of the coverage findings alone, without confirmations.
    pub fn into_report(self) -> AuditReport {
        AuditReport::from_diagnostics(self.diagnostics, self.compared_routes)
    }
}

/// Projected route geometry cached for both coverage directions.
struct RouteGeometry {
    subject: Subject,
    relation: Relation,
    geometry: MultiLineString<f64>,
    /// Measured against the reference set. Every selected route still
    /// serves as a candidate when reference features are measured.
    compared: bool,
}

/// Per-run state shared by both passes.
pub struct AuditContext<'a> {
    source: &'a dyn RouteSource,
    config: &'a AuditConfig,
    projection: LocalProjection,
    geometries: OnceLock<(Vec<RouteGeometry>, Vec<Diagnostic>)>,
}

impl<'a> AuditContext<'a> {
    pub fn new(source: &'a dyn RouteSource, config: &'a AuditConfig) -> Self {
        let (lon, lat) = match config.coverage.projection_origin {
            Some([lon, lat]) => (lon, lat),
            None => source.centroid().unwrap_or_else(|| {
                debug!("no coordinates to derive a projection origin from");
                (0.0, 0.0)
            }),
        };
        Self {
            source,
            config,
            projection: LocalProjection::new(lon, lat),
            geometries: OnceLock::new(),
        }
    }

    /// Routes to check: configured categories, minus ignored relations, with
    /// super-routes replaced by the routes they are made of.
    pub fn selected_routes(&self) -> Vec<RelationId> {
        let mut selected = Vec::new();
        let mut seen = HashSet::new();

        for id in self.source.route_ids() {
            let Some(relation) = self.source.relation(id) else {
                continue;
            };
            let candidates = if relation.is_super_route() {
                expand_super_route(self.source, id)
            } else {
                vec![id]
            };
            for candidate in candidates {
                if self.config.ignore_routes.contains(&candidate) || !seen.insert(candidate) {
                    continue;
                }
                let wanted = self
                    .source
                    .relation(candidate)
                    .is_some_and(|r| self.config.checks_category(&r.category()));
                if wanted {
                    selected.push(candidate);
                }
            }
        }
        selected.sort_unstable();
        selected
    }

    /// Topology and metadata checks for every selected route.
    pub fn run_topology_pass(&self) -> AuditReport {
        let routes = self.selected_routes();
        let diagnostics: Vec<Diagnostic> = routes
            .par_iter()
            .flat_map_iter(|&id| self.check_route(id))
            .map(|d| self.config.apply_severity(d))
            .collect();
        info!(
            routes = routes.len(),
            diagnostics = diagnostics.len(),
            "topology pass finished"
        );
        AuditReport::from_diagnostics(diagnostics, routes.len())
    }

    fn check_route(&self, id: RelationId) -> Vec<Diagnostic> {
        match self.source.expand(id) {
            Ok(route) => {
                let subject = route_subject(&route.relation);
                match self.check_expanded(&route) {
                    Ok(findings) => findings.into_iter().map(|f| f.attribute(&subject)).collect(),
                    Err(err) => vec![self.failure(id, &err)],
                }
            }
            Err(err) => vec![self.failure(id, &err)],
        }
    }

    fn check_expanded(&self, route: &ExpandedRoute) -> crate::Result<Vec<Finding>> {
        let relation = &route.relation;
        let category = relation.category();
        let rule = resolve(&category);
        let expected = self.config.expected_chunks_for(relation.id);
        let mut findings = validate_relation(relation, &category);

        if rule.requires_split(relation) {
            let forward = route.ways_for(Pass::Forward)?;
            let mut backward = route.ways_for(Pass::Backward)?;
            backward.reverse();
            findings.extend(check_topology(&forward, &rule, expected, &[], Pass::Forward).findings);
            findings.extend(check_topology(&backward, &rule, expected, &[], Pass::Backward).findings);
        } else {
            let ways = route.ways_for(Pass::Whole)?;
            let stops = if category == RouteCategory::Bus {
                route.stops()?
            } else {
                Vec::new()
            };
            findings.extend(check_topology(&ways, &rule, expected, &stops, Pass::Whole).findings);
            findings.extend(check_stop_tags(&stops));
        }
        debug!(relation = relation.id, findings = findings.len(), "checked route");
        Ok(findings)
    }

    fn failure(&self, id: RelationId, err: &Error) -> Diagnostic {
        let id = err.relation().unwrap_or(id);
        warn!(relation = id, error = %err, "relation could not be checked");
        let kind = match err {
            Error::DataFetch { .. } => DiagnosticKind::DataFetchFailure,
            _ => DiagnosticKind::MalformedRelation,
        };
        let subject = self
            .source
            .relation(id)
            .map(route_subject)
            .unwrap_or(Subject::Route {
                id,
                category: RouteCategory::Other(String::new()),
                reference: None,
                name: None,
            });
        Finding::new(kind, err.to_string()).attribute(&subject)
    }

    /// Projected, densified geometry of every selected route, with expansion
    /// failures of the compared ones.
    fn route_geometries(&self) -> &(Vec<RouteGeometry>, Vec<Diagnostic>) {
        self.geometries.get_or_init(|| {
            let coverage = &self.config.coverage;
            let ids = self.selected_routes();

            let built: Vec<Result<RouteGeometry, Option<Diagnostic>>> = ids
                .par_iter()
                .map(|&id| {
                    let compared = self.source.relation(id).is_some_and(|r| {
                        r.category().is_hiking() && coverage.compares_route(&r.tags)
                    });
                    let fail = |e: Error| compared.then(|| self.failure(id, &e));
                    let route = self.source.expand(id).map_err(fail)?;
                    let geometry = build_geometry(&route, &self.projection).map_err(fail)?;
                    Ok(RouteGeometry {
                        subject: route_subject(&route.relation),
                        geometry: densify_all(&geometry, coverage.resample_spacing),
                        relation: route.relation,
                        compared,
                    })
                })
                .collect();

            let mut geometries = Vec::new();
            let mut failures = Vec::new();
            for item in built {
                match item {
                    Ok(route) if route.geometry.0.is_empty() => {
                        debug!(relation = route.relation.id, "route has no routable geometry");
                    }
                    Ok(route) => geometries.push(route),
                    Err(Some(failure)) => failures.push(failure),
                    Err(None) => {}
                }
            }
            info!(routes = geometries.len(), "built route geometries");
            (geometries, failures)
        })
    }

    fn reference_feature(&self, feature: &ReferenceFeature) -> CoverageFeature {
        let pieces = feature
            .lines
            .iter()
            .map(|line| line.coords().map(|c| self.projection.project(c.x, c.y)).collect::<Vec<_>>());
        let geometry = MultiLineString::new(
            merge_sequences(pieces)
                .into_iter()
                .map(geo::LineString::new)
                .collect(),
        );
        CoverageFeature {
            subject: Subject::Feature {
                id: feature.id.clone(),
                reference: feature.reference.clone(),
                name: feature.name.clone(),
            },
            keys: MatchKeys::from_reference(feature.reference.as_deref(), feature.name.as_deref()),
            geometry: densify_all(&geometry, self.config.coverage.resample_spacing),
        }
    }

    /// Compare route geometries with `references` in both directions.
    pub fn run_coverage_pass(&self, references: &[ReferenceFeature]) -> CoverageReport {
        let coverage = &self.config.coverage;
        let (routes, failures) = self.route_geometries();
        let candidates: Vec<CoverageFeature> = routes
            .iter()
            .map(|route| CoverageFeature {
                subject: route.subject.clone(),
                keys: MatchKeys::from_route_tags(&route.relation.tags, &coverage.alias_key),
                geometry: route.geometry.clone(),
            })
            .collect();
        let internal: Vec<CoverageFeature> = routes
            .iter()
            .zip(&candidates)
            .filter(|(route, _)| route.compared)
            .map(|(_, feature)| feature.clone())
            .collect();
        let external: Vec<CoverageFeature> = references
            .par_iter()
            .map(|f| self.reference_feature(f))
            .collect();

        let (too_long, too_short) = rayon::join(
            || match_coverage(&internal, &external, coverage.tolerance),
            || match_coverage(&external, &candidates, coverage.tolerance),
        );

        let mut report = CoverageReport {
            diagnostics: failures.clone(),
            confirmations: Vec::new(),
            compared_routes: internal.len(),
        };
        for result in &too_long {
            let subject = &internal[result.feature].subject;
            match describe(result, &external, true) {
                Some(finding) => report.diagnostics.push(finding.attribute(subject)),
                None => report.confirmations.push(
                    Finding::new(
                        DiagnosticKind::FullyCovered,
                        format!("Fully covered by {}", matched_list(result, &external)),
                    )
                    .attribute(subject),
                ),
            }
        }
        for result in &too_short {
            if let Some(finding) = describe(result, &candidates, false) {
                report
                    .diagnostics
                    .push(finding.attribute(&external[result.feature].subject));
            }
        }
        report.diagnostics = report
            .diagnostics
            .into_iter()
            .map(|d| self.config.apply_severity(d))
            .collect();
        sort_diagnostics(&mut report.diagnostics);

        info!(
            routes = internal.len(),
            references = external.len(),
            diagnostics = report.diagnostics.len(),
            "coverage pass finished"
        );
        report
    }

    /// Run both passes concurrently and merge their output.
    pub fn run_audit(&self, references: &[ReferenceFeature]) -> AuditReport {
        let (topology, coverage) = rayon::join(
            || self.run_topology_pass(),
            || self.run_coverage_pass(references),
        );

        let failed: HashSet<RelationId> = topology
            .diagnostics
            .iter()
            .filter(|d| is_failure(d.kind))
            .filter_map(|d| d.subject.route_id())
            .collect();
        let mut diagnostics = topology.diagnostics;
        diagnostics.extend(coverage.diagnostics.into_iter().filter(|d| {
            !(is_failure(d.kind) && d.subject.route_id().is_some_and(|id| failed.contains(&id)))
        }));

        let flagged: HashSet<RelationId> = diagnostics
            .iter()
            .filter_map(|d| d.subject.route_id())
            .collect();
        diagnostics.extend(
            coverage
                .confirmations
                .into_iter()
                .filter(|d| d.subject.route_id().is_some_and(|id| flagged.contains(&id))),
        );

        AuditReport::from_diagnostics(diagnostics, topology.checked_routes)
    }
}

fn is_failure(kind: DiagnosticKind) -> bool {
    matches!(
        kind,
        DiagnosticKind::MalformedRelation | DiagnosticKind::DataFetchFailure
    )
}

fn route_subject(relation: &Relation) -> Subject {
    Subject::Route {
        id: relation.id,
        category: relation.category(),
        reference: relation.reference().map(str::to_string),
        name: relation.name().map(str::to_string),
    }
}

fn matched_list(result: &CoverageResult, others: &[CoverageFeature]) -> String {
    result
        .matched
        .iter()
        .map(|&i| others[i].subject.context())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Finding for an uncovered result; `None` when the feature is covered.
fn describe(result: &CoverageResult, others: &[CoverageFeature], internal: bool) -> Option<Finding> {
    match result.verdict {
        Verdict::Covered => None,
        Verdict::NoMatch => Some(Finding::new(
            DiagnosticKind::NoMatchFound,
            if internal {
                "No intersecting reference route found".to_string()
            } else {
                "No intersecting OSM route matches".to_string()
            },
        )),
        Verdict::Partial => {
            let distance = result.distance.unwrap_or(f64::INFINITY);
            let label = if result.fallback { "best match" } else { "matched" };
            Some(
                Finding::new(
                    DiagnosticKind::PartialCoverage,
                    format!(
                        "Not fully covered: {label} {} with error = {distance:.0}m",
                        matched_list(result, others)
                    ),
                )
                .with_detail(distance),
            )
        }
    }
}
