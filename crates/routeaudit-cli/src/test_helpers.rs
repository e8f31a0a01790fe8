// Test utilities used across `routeaudit-cli` unit tests.
// Kept under `#[cfg(test)]` so it is not part of the public crate API.
use routeaudit_lib::{AuditReport, Diagnostic, DiagnosticKind, RouteCategory, Severity, Subject};

/// Diagnostic about hiking route `id`, whose ref is the id itself.
pub fn diagnostic(id: i64, severity: Severity, kind: DiagnosticKind, message: &str) -> Diagnostic {
    Diagnostic {
        severity,
        subject: Subject::Route {
            id,
            category: RouteCategory::Hiking,
            reference: Some(id.to_string()),
            name: None,
        },
        kind,
        message: message.to_string(),
        detail: None,
    }
}

/// Report over `diagnostics` with the faulty set derived from them.
pub fn report(diagnostics: Vec<Diagnostic>, checked_routes: usize) -> AuditReport {
    let faulty_routes = diagnostics
        .iter()
        .filter(|d| d.severity >= Severity::Warning)
        .filter_map(|d| d.subject.route_id())
        .collect();
    AuditReport {
        diagnostics,
        checked_routes,
        faulty_routes,
    }
}
