//! Tag checks that do not depend on route topology: way-marking symbol,
//! network level, stop tagging, and open `fixme` notes.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::diagnostics::{DiagnosticKind, Finding};
use crate::model::{Node, Relation, Tags};
use crate::rules::RouteCategory;

static SYMBOL_BACKGROUND: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(.*?):red:white_").expect("static regex"));

static HIKING_NETWORK: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[lrni]wn$").expect("static regex"));

static CYCLING_NETWORK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[lrni]cn$").expect("static regex"));

/// Expected symbol pattern per ref shape. `{}` is replaced with the escaped
/// first capture of the ref pattern.
static SYMBOL_RULES: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    [
        (r"^([0-9]{1,2}[ABC]?)$", "^red:red:white_bar:{}:black$"),
        (r"^E([0-9]{3}[ABC]?)$", "^red:red:white_stripe:{}:black$"),
        (r"^AV([0-9])$", "^red::blue_triangle_line:{}:blue$"),
        (r"^VA-([A-Z][0-9]+)$", "^red::gray_triangle:V:blue$"),
    ]
    .into_iter()
    .map(|(shape, template)| (Regex::new(shape).expect("static regex"), template))
    .collect()
});

/// All relation-level checks for a route of `category`.
pub fn validate_relation(relation: &Relation, category: &RouteCategory) -> Vec<Finding> {
    let mut findings = check_symbol(&relation.tags);
    findings.extend(check_network(&relation.tags, category));
    findings.extend(check_fixme(&relation.tags));
    findings
}

/// `osmc:symbol` background colour and consistency with `ref`.
pub fn check_symbol(tags: &Tags) -> Vec<Finding> {
    let Some(symbol) = tags.get("osmc:symbol") else {
        return Vec::new();
    };
    let mut findings = Vec::new();

    if let Some(captures) = SYMBOL_BACKGROUND.captures(symbol) {
        let way_color = captures.get(1).map_or("", |m| m.as_str());
        if way_color != "red" {
            findings.push(Finding::new(
                DiagnosticKind::SymbolBogus,
                format!("Bogus osmc:symbol \"{symbol}\": way color must be red"),
            ));
        }
    }

    if let Some(reference) = tags.get("ref") {
        if !symbol_matches_ref(symbol, reference) {
            findings.push(Finding::new(
                DiagnosticKind::SymbolMismatch,
                format!("osmc:symbol \"{symbol}\" does not match ref \"{reference}\""),
            ));
        }
    }

    findings
}

fn symbol_matches_ref(symbol: &str, reference: &str) -> bool {
    for (shape, template) in SYMBOL_RULES.iter() {
        if let Some(captures) = shape.captures(reference) {
            let inner = captures.get(1).map_or("", |m| m.as_str());
            let pattern = template.replace("{}", &regex::escape(inner));
            return match Regex::new(&pattern) {
                Ok(expected) => expected.is_match(symbol),
                Err(_) => false,
            };
        }
    }
    symbol.contains(&format!(":{reference}:"))
}

/// `network` tag presence and level for hiking and bicycle routes.
pub fn check_network(tags: &Tags, category: &RouteCategory) -> Vec<Finding> {
    let pattern = match category {
        c if c.is_hiking() => &*HIKING_NETWORK,
        RouteCategory::Bicycle => &*CYCLING_NETWORK,
        _ => return Vec::new(),
    };
    match tags.get("network") {
        None => vec![Finding::new(DiagnosticKind::NetworkMissing, "No network")],
        Some(network) if !pattern.is_match(network) => vec![Finding::new(
            DiagnosticKind::NetworkBogus,
            format!("Bogus network \"{network}\""),
        )],
        Some(_) => Vec::new(),
    }
}

/// Every stop must be tagged `public_transport=stop_position`.
pub fn check_stop_tags(stops: &[&Node]) -> Vec<Finding> {
    stops
        .iter()
        .filter(|stop| !stop.tags.is("public_transport", "stop_position"))
        .map(|stop| {
            Finding::new(
                DiagnosticKind::StopTagMissing,
                format!(
                    "Stop \"{}\" ({}) is not tagged public_transport=stop_position",
                    stop.display_name(),
                    stop.id
                ),
            )
        })
        .collect()
}

pub fn check_fixme(tags: &Tags) -> Vec<Finding> {
    tags.first_of(&["fixme", "FIXME"])
        .map(|note| vec![Finding::new(DiagnosticKind::Fixme, format!("Fixme: {note}"))])
        .unwrap_or_default()
}
