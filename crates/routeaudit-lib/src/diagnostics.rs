//! Diagnostic records produced by the audit passes.

use std::cmp::Ordering;
use std::fmt;

use serde::Serialize;

use crate::model::RelationId;
use crate::rules::RouteCategory;

/// How serious a diagnostic is. Ordered `Info < Warning < Error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl Severity {
    pub fn label(self) -> &'static str {
        match self {
            Severity::Info => "INFO",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// What a diagnostic reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    OnewayViolation,
    Disconnected,
    ChunkCountMismatch,
    StopNotReached,
    StopDirectionMismatch,
    StopTagMissing,
    SymbolMismatch,
    SymbolBogus,
    NetworkMissing,
    NetworkBogus,
    Fixme,
    NoMatchFound,
    PartialCoverage,
    FullyCovered,
    DataFetchFailure,
    MalformedRelation,
}

impl DiagnosticKind {
    /// Severity before any configured downgrade.
    pub fn default_severity(self) -> Severity {
        match self {
            DiagnosticKind::FullyCovered => Severity::Info,
            _ => Severity::Error,
        }
    }
}

/// Diagnostic payload produced by a checker before it is attributed to a subject.
#[derive(Debug, Clone, PartialEq)]
pub struct Finding {
    pub kind: DiagnosticKind,
    pub message: String,
    pub detail: Option<f64>,
}

impl Finding {
    pub fn new(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: f64) -> Self {
        self.detail = Some(detail);
        self
    }

    /// Attach the finding to `subject` at its kind's default severity.
    pub fn attribute(self, subject: &Subject) -> Diagnostic {
        Diagnostic {
            severity: self.kind.default_severity(),
            subject: subject.clone(),
            kind: self.kind,
            message: self.message,
            detail: self.detail,
        }
    }
}

/// Route or reference feature a diagnostic is about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Subject {
    Route {
        id: RelationId,
        category: RouteCategory,
        #[serde(rename = "ref")]
        reference: Option<String>,
        name: Option<String>,
    },
    Feature {
        id: String,
        #[serde(rename = "ref")]
        reference: Option<String>,
        name: Option<String>,
    },
}

impl Subject {
    pub fn reference(&self) -> Option<&str> {
        match self {
            Subject::Route { reference, .. } | Subject::Feature { reference, .. } => {
                reference.as_deref()
            }
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            Subject::Route { name, .. } | Subject::Feature { name, .. } => name.as_deref(),
        }
    }

    pub fn route_id(&self) -> Option<RelationId> {
        match self {
            Subject::Route { id, .. } => Some(*id),
            Subject::Feature { .. } => None,
        }
    }

    fn identifier(&self) -> String {
        match self {
            Subject::Route { id, .. } => id.to_string(),
            Subject::Feature { id, .. } => id.clone(),
        }
    }

    /// Ordering key: routes before features, then the natural-sort key of
    /// ref (falling back to name), then id.
    pub fn sort_key(&self) -> (u8, Vec<NaturalPart>, Vec<NaturalPart>) {
        let group = match self {
            Subject::Route { .. } => 0,
            Subject::Feature { .. } => 1,
        };
        let label = self.reference().or(self.name()).unwrap_or("");
        (group, natural_key(label), natural_key(&self.identifier()))
    }

    /// Human-readable description, e.g. `OSM hiking route 2 (id: 123) "Name"`.
    pub fn context(&self) -> String {
        let mut context = match self {
            Subject::Route { id, category, .. } => {
                let mut text = format!("OSM {category} route");
                if let Some(reference) = self.reference() {
                    text.push(' ');
                    text.push_str(reference);
                }
                text.push_str(&format!(" (id: {id})"));
                text
            }
            Subject::Feature { id, .. } => {
                let mut text = String::from("reference route");
                if let Some(reference) = self.reference() {
                    text.push(' ');
                    text.push_str(reference);
                }
                text.push_str(&format!(" (id: {id})"));
                text
            }
        };
        if let Some(name) = self.name() {
            context.push_str(&format!(" \"{name}\""));
        }
        context
    }
}

/// One reported problem (or confirmation) about a route or feature.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub subject: Subject,
    pub kind: DiagnosticKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<f64>,
}

impl Diagnostic {
    /// Plain text line `SEVERITY - <context> - <message>`.
    pub fn render_plain(&self) -> String {
        format!(
            "{} - {} - {}",
            self.severity.label(),
            self.subject.context(),
            self.message
        )
    }
}

/// Chunk of a natural-sort key: digit runs compare numerically.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum NaturalPart {
    Number(u64),
    Text(String),
}

/// Split `value` into alternating numeric and textual parts.
pub fn natural_key(value: &str) -> Vec<NaturalPart> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut in_digits = false;

    for ch in value.chars() {
        let is_digit = ch.is_ascii_digit();
        if !current.is_empty() && is_digit != in_digits {
            parts.push(finish_part(&current, in_digits));
            current.clear();
        }
        in_digits = is_digit;
        current.push(ch);
    }
    if !current.is_empty() {
        parts.push(finish_part(&current, in_digits));
    }
    parts
}

fn finish_part(raw: &str, digits: bool) -> NaturalPart {
    if digits {
        NaturalPart::Number(raw.parse().unwrap_or(u64::MAX))
    } else {
        NaturalPart::Text(raw.to_lowercase())
    }
}

/// Stable sort by subject; diagnostics of one subject keep their emission order.
pub fn sort_diagnostics(diagnostics: &mut [Diagnostic]) {
    diagnostics.sort_by(|a, b| compare_subjects(&a.subject, &b.subject));
}

fn compare_subjects(a: &Subject, b: &Subject) -> Ordering {
    a.sort_key().cmp(&b.sort_key())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn route(id: RelationId, reference: &str) -> Subject {
        Subject::Route {
            id,
            category: RouteCategory::Hiking,
            reference: Some(reference.to_string()),
            name: None,
        }
    }

    #[test]
    fn natural_sort_orders_numbers_numerically() {
        assert!(natural_key("9") < natural_key("10"));
        assert!(natural_key("2") < natural_key("2A"));
        assert!(natural_key("2A") < natural_key("3"));
        assert!(natural_key("E4") < natural_key("E10"));
    }

    #[test]
    fn sorting_groups_routes_before_features() {
        let feature = Subject::Feature {
            id: "gk-1".into(),
            reference: Some("1".into()),
            name: None,
        };
        let mut diagnostics: Vec<Diagnostic> = [feature, route(3, "10"), route(2, "9")]
            .iter()
            .map(|s| Finding::new(DiagnosticKind::Fixme, "x").attribute(s))
            .collect();

        sort_diagnostics(&mut diagnostics);
        let ids: Vec<String> = diagnostics.iter().map(|d| d.subject.identifier()).collect();
        assert_eq!(ids, vec!["2", "3", "gk-1"]);
    }

    #[test]
    fn context_includes_ref_id_and_name() {
        let subject = Subject::Route {
            id: 123,
            category: RouteCategory::Hiking,
            reference: Some("2".into()),
            name: Some("Nordalpenweg".into()),
        };
        assert_eq!(
            subject.context(),
            "OSM hiking route 2 (id: 123) \"Nordalpenweg\""
        );
    }

    #[test]
    fn fully_covered_is_informational() {
        assert_eq!(DiagnosticKind::FullyCovered.default_severity(), Severity::Info);
        assert_eq!(DiagnosticKind::Disconnected.default_severity(), Severity::Error);
        assert!(Severity::Info < Severity::Warning && Severity::Warning < Severity::Error);
    }
}
