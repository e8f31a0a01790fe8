mod common;

use common::fixtures_dir;
use routeaudit_lib::{
    load_reference_features, load_route_graph, AuditConfig, AuditContext, DiagnosticKind,
    Severity,
};

fn kinds_for(report: &routeaudit_lib::AuditReport, route: i64) -> Vec<DiagnosticKind> {
    report
        .diagnostics
        .iter()
        .filter(|d| d.subject.route_id() == Some(route))
        .map(|d| d.kind)
        .collect()
}

#[test]
fn topology_pass_over_fixture() {
    let graph = load_route_graph(&fixtures_dir().join("sample_routes.json")).expect("fixture loads");
    let config = AuditConfig::default();
    let report = AuditContext::new(&graph, &config).run_topology_pass();

    assert_eq!(report.checked_routes, 4);
    assert!(kinds_for(&report, 1001).is_empty());
    assert_eq!(
        kinds_for(&report, 1002),
        vec![DiagnosticKind::Disconnected, DiagnosticKind::ChunkCountMismatch]
    );
    assert_eq!(
        kinds_for(&report, 1003),
        vec![
            DiagnosticKind::OnewayViolation,
            DiagnosticKind::ChunkCountMismatch,
            DiagnosticKind::StopTagMissing
        ]
    );
    assert_eq!(kinds_for(&report, 1004), vec![DiagnosticKind::MalformedRelation]);

    let order: Vec<i64> = report
        .diagnostics
        .iter()
        .filter_map(|d| d.subject.route_id())
        .collect();
    let mut deduped = order.clone();
    deduped.dedup();
    assert_eq!(deduped, vec![1003, 1002, 1004]);
}

#[test]
fn configuration_overrides_chunks_and_severity() {
    let graph = load_route_graph(&fixtures_dir().join("sample_routes.json")).expect("fixture loads");
    let config = AuditConfig::from_path(&fixtures_dir().join("audit_config.json")).expect("config");
    let report = AuditContext::new(&graph, &config).run_topology_pass();

    assert!(kinds_for(&report, 1002).is_empty());
    let malformed = report
        .diagnostics
        .iter()
        .find(|d| d.subject.route_id() == Some(1004))
        .expect("1004 reported");
    assert_eq!(malformed.severity, Severity::Warning);
    assert!(report.faulty_routes.contains(&1003));
}

#[test]
fn full_audit_merges_both_passes() {
    let graph = load_route_graph(&fixtures_dir().join("sample_routes.json")).expect("fixture loads");
    let config = AuditConfig::default();
    let references = load_reference_features(
        &[fixtures_dir().join("reference_routes.geojson")],
        &config.coverage,
    )
    .expect("references load");
    assert_eq!(references.len(), 3);

    let report = AuditContext::new(&graph, &config).run_audit(&references);

    assert!(kinds_for(&report, 1001).is_empty());
    assert_eq!(
        kinds_for(&report, 1002),
        vec![
            DiagnosticKind::Disconnected,
            DiagnosticKind::ChunkCountMismatch,
            DiagnosticKind::FullyCovered
        ]
    );
    assert_eq!(kinds_for(&report, 1004), vec![DiagnosticKind::MalformedRelation]);

    let unmatched: Vec<_> = report
        .diagnostics
        .iter()
        .filter(|d| d.kind == DiagnosticKind::NoMatchFound)
        .collect();
    assert_eq!(unmatched.len(), 1);
    assert!(unmatched[0].subject.context().contains("gk-40"));
}
