//! Connectivity and stop-order check over an ordered list of ways.
//!
//! The checker walks the ways left to right while tracking a *frontier*: the
//! set of nodes where the next way is expected to connect. A way whose entry
//! candidates miss the frontier closes the current chunk. For transit routes a
//! cursor over the required stops advances as stop nodes are visited in
//! traversal order.

use std::collections::HashSet;

use tracing::trace;

use crate::diagnostics::{DiagnosticKind, Finding};
use crate::model::{Node, NodeId, Way, WayId};
use crate::rules::{stop_direction, Pass, StopDirection, TraversalRule};

/// Orientation in which a way was used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Traversal {
    Forward,
    Reversed,
    /// No frontier to decide against, or both endpoints connected.
    Undetermined,
}

/// Maximal connected run of ways.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Chunk {
    pub ways: Vec<WayId>,
    /// Nodes in traversal order; connecting nodes appear once.
    pub nodes: Vec<NodeId>,
}

impl Chunk {
    fn push(&mut self, way: &Way, traversal: Traversal) {
        self.ways.push(way.id);
        let mut ordered = way.nodes.clone();
        if traversal == Traversal::Reversed {
            ordered.reverse();
        }
        let skip = usize::from(self.nodes.last().is_some() && self.nodes.last() == ordered.first());
        self.nodes.extend(ordered.into_iter().skip(skip));
    }
}

/// Outcome of one topology pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TopologyReport {
    pub findings: Vec<Finding>,
    pub chunks: Vec<Chunk>,
}

/// Check that `ways` form `expected_chunks` connected, correctly oriented runs
/// and that `stops` are visited in order and in their declared direction.
///
/// Non-routable ways are skipped. For a backward pass the caller supplies the
/// way list already reversed.
pub fn check_topology(
    ways: &[&Way],
    rule: &TraversalRule,
    expected_chunks: usize,
    stops: &[&Node],
    pass: Pass,
) -> TopologyReport {
    let ways: Vec<&Way> = ways.iter().copied().filter(|w| w.is_routable()).collect();
    let mut findings = Vec::new();
    let mut chunks = Vec::new();
    let mut chunk = Chunk::default();
    let mut frontier = seed_frontier(&ways);
    let mut cursor = StopCursor::new(stops);

    for way in &ways {
        let oneway = rule.way_is_oneway(way);
        let area = way.is_area();
        let entry = entry_candidates(way, area, oneway);

        if !frontier.is_empty() && frontier.is_disjoint(&entry) {
            trace!(way = way.id, "frontier break");
            frontier.clear();
            chunks.push(std::mem::take(&mut chunk));
            if oneway {
                findings.push(Finding::new(
                    DiagnosticKind::OnewayViolation,
                    format!(
                        "Oneway violation in way \"{}\" ({})",
                        way.display_name(),
                        way.id
                    ),
                ));
            } else if expected_chunks == 1 {
                findings.push(Finding::new(
                    DiagnosticKind::Disconnected,
                    format!(
                        "Route{} disconnected at way \"{}\" ({})",
                        pass_suffix(pass),
                        way.display_name(),
                        way.id
                    ),
                ));
            }
        }

        let (exit, traversal) = exit_set(way, area, oneway, &frontier);
        frontier = exit;
        chunk.push(way, traversal);
        cursor.visit(way, traversal, &mut findings);
    }
    chunks.push(chunk);

    if let Some(stop) = cursor.pending() {
        findings.push(Finding::new(
            DiagnosticKind::StopNotReached,
            format!(
                "Stop \"{}\" ({}) not reached{}",
                stop.display_name(),
                stop.id,
                pass_suffix(pass)
            ),
        ));
    }

    if chunks.len() != expected_chunks {
        findings.push(
            Finding::new(
                DiagnosticKind::ChunkCountMismatch,
                format!(
                    "Route{} in DISORDER ({}/{})",
                    pass_suffix(pass),
                    chunks.len(),
                    expected_chunks
                ),
            )
            .with_detail(chunks.len() as f64),
        );
    }

    TopologyReport { findings, chunks }
}

fn pass_suffix(pass: Pass) -> String {
    match pass {
        Pass::Whole => String::new(),
        other => format!(" {}", other.label()),
    }
}

/// Initial frontier, resolved by peeking at the second way.
fn seed_frontier(ways: &[&Way]) -> HashSet<NodeId> {
    let Some(first) = ways.first() else {
        return HashSet::new();
    };
    if first.is_area() {
        return first.nodes.iter().copied().collect();
    }
    let Some(second) = ways.get(1) else {
        return HashSet::new();
    };
    let joints: HashSet<NodeId> = if second.is_area() {
        second.nodes.iter().copied().collect()
    } else {
        second.first_node().into_iter().chain(second.last_node()).collect()
    };

    match (first.first_node(), first.last_node()) {
        (Some(start), Some(end)) if joints.contains(&end) => HashSet::from([start]),
        (Some(start), Some(end)) if joints.contains(&start) => HashSet::from([end]),
        _ => HashSet::new(),
    }
}

fn entry_candidates(way: &Way, area: bool, oneway: bool) -> HashSet<NodeId> {
    if area {
        way.nodes.iter().copied().collect()
    } else if oneway {
        way.first_node().into_iter().collect()
    } else {
        way.first_node().into_iter().chain(way.last_node()).collect()
    }
}

fn exit_set(
    way: &Way,
    area: bool,
    oneway: bool,
    frontier: &HashSet<NodeId>,
) -> (HashSet<NodeId>, Traversal) {
    let (Some(start), Some(end)) = (way.first_node(), way.last_node()) else {
        return (HashSet::new(), Traversal::Undetermined);
    };
    if area {
        return (way.nodes.iter().copied().collect(), Traversal::Forward);
    }
    if oneway {
        return (HashSet::from([end]), Traversal::Forward);
    }
    match (frontier.contains(&start), frontier.contains(&end)) {
        (true, false) => (HashSet::from([end]), Traversal::Forward),
        (false, true) => (HashSet::from([start]), Traversal::Reversed),
        _ => (HashSet::from([start, end]), Traversal::Undetermined),
    }
}

/// Cursor over the required stop sequence.
struct StopCursor<'a> {
    stops: &'a [&'a Node],
    next: usize,
    mismatch_reported: bool,
}

impl<'a> StopCursor<'a> {
    fn new(stops: &'a [&'a Node]) -> Self {
        Self {
            stops,
            next: 0,
            mismatch_reported: false,
        }
    }

    fn visit(&mut self, way: &Way, traversal: Traversal, findings: &mut Vec<Finding>) {
        if self.pending().is_none() {
            return;
        }
        let mut ordered = way.nodes.clone();
        if traversal == Traversal::Reversed {
            ordered.reverse();
        }

        for node_id in ordered {
            let Some(stop) = self.pending() else {
                return;
            };
            if node_id != stop.id {
                continue;
            }
            let direction = stop_direction(stop);
            let accepted = match (direction, traversal) {
                (StopDirection::Both, _) | (_, Traversal::Undetermined) => true,
                (StopDirection::Forward, t) => t == Traversal::Forward,
                (StopDirection::Backward, t) => t == Traversal::Reversed,
            };
            if accepted {
                self.next += 1;
                self.mismatch_reported = false;
            } else if !self.mismatch_reported {
                self.mismatch_reported = true;
                findings.push(Finding::new(
                    DiagnosticKind::StopDirectionMismatch,
                    format!(
                        "Stop \"{}\" ({}) reached against its direction ({}) on way \"{}\" ({})",
                        stop.display_name(),
                        stop.id,
                        direction,
                        way.display_name(),
                        way.id
                    ),
                ));
            }
        }
    }

    fn pending(&self) -> Option<&'a Node> {
        self.stops.get(self.next).copied()
    }
}
