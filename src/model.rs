//! Typed indices over the entities of one document.
//!
//! The index is deliberately shallow: it keeps the ids and references that
//! cross-file checks need and nothing else.

use indexmap::IndexMap;
use tracing::debug;

use crate::xml::{Document, Node};

/// Source position of an indexed entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

impl Position {
    fn of(node: Node<'_>) -> Self {
        Self {
            line: node.line(),
            column: node.column(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceLink {
    pub from_point: String,
    pub to_point: String,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct JourneyPattern {
    /// Scheduled stop points in sequence order
    pub stop_points: Vec<String>,
    /// Service links in sequence order
    pub service_links: Vec<String>,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Line {
    pub name: Option<String>,
    pub flexible: bool,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ServiceJourney {
    pub journey_pattern: Option<String>,
    pub line: Option<String>,
    pub position: Position,
}

#[derive(Debug, Clone, Default)]
pub struct NetexEntitiesIndex {
    /// scheduled stop point -> quay
    pub passenger_stop_assignments: IndexMap<String, String>,
    /// scheduled stop point -> flexible stop place
    pub flexible_stop_assignments: IndexMap<String, String>,
    pub service_links: IndexMap<String, ServiceLink>,
    pub journey_patterns: IndexMap<String, JourneyPattern>,
    pub lines: IndexMap<String, Line>,
    pub service_journeys: IndexMap<String, ServiceJourney>,
}

impl NetexEntitiesIndex {
    pub fn from_document(document: &Document) -> Self {
        let mut index = Self::default();

        for node in document.elements() {
            match node.local_name() {
                "PassengerStopAssignment" => {
                    if let (Some(stop_point), Some(quay)) = (
                        child_ref(node, "ScheduledStopPointRef"),
                        child_ref(node, "QuayRef"),
                    ) {
                        index.passenger_stop_assignments.insert(stop_point, quay);
                    }
                }
                "FlexibleStopAssignment" => {
                    if let (Some(stop_point), Some(stop_place)) = (
                        child_ref(node, "ScheduledStopPointRef"),
                        child_ref(node, "FlexibleStopPlaceRef"),
                    ) {
                        index.flexible_stop_assignments.insert(stop_point, stop_place);
                    }
                }
                "ServiceLink" => {
                    if let (Some(id), Some(from_point), Some(to_point)) = (
                        node.id(),
                        child_ref(node, "FromPointRef"),
                        child_ref(node, "ToPointRef"),
                    ) {
                        index.service_links.insert(
                            id.to_string(),
                            ServiceLink {
                                from_point,
                                to_point,
                                position: Position::of(node),
                            },
                        );
                    }
                }
                "JourneyPattern" | "ServiceJourneyPattern" => {
                    if let Some(id) = node.id() {
                        index
                            .journey_patterns
                            .insert(id.to_string(), journey_pattern(node));
                    }
                }
                name @ ("Line" | "FlexibleLine") => {
                    if let Some(id) = node.id() {
                        index.lines.insert(
                            id.to_string(),
                            Line {
                                name: node.child("Name").map(|name| name.text().to_string()),
                                flexible: name == "FlexibleLine",
                                position: Position::of(node),
                            },
                        );
                    }
                }
                "ServiceJourney" => {
                    if let Some(id) = node.id() {
                        index.service_journeys.insert(
                            id.to_string(),
                            ServiceJourney {
                                journey_pattern: child_ref(node, "JourneyPatternRef")
                                    .or_else(|| child_ref(node, "ServiceJourneyPatternRef")),
                                line: child_ref(node, "LineRef")
                                    .or_else(|| child_ref(node, "FlexibleLineRef")),
                                position: Position::of(node),
                            },
                        );
                    }
                }
                _ => {}
            }
        }

        debug!(
            lines = index.lines.len(),
            service_journeys = index.service_journeys.len(),
            journey_patterns = index.journey_patterns.len(),
            service_links = index.service_links.len(),
            stop_assignments = index.passenger_stop_assignments.len(),
            "indexed entities"
        );
        index
    }

    /// Quay or flexible stop place assigned to a stop point in this document
    pub fn is_stop_point_assigned(&self, stop_point: &str) -> bool {
        self.passenger_stop_assignments.contains_key(stop_point)
            || self.flexible_stop_assignments.contains_key(stop_point)
    }

    /// Journey pattern of a service journey
    pub fn journey_pattern_of(&self, service_journey: &str) -> Option<&JourneyPattern> {
        let pattern = self
            .service_journeys
            .get(service_journey)?
            .journey_pattern
            .as_deref()?;
        self.journey_patterns.get(pattern)
    }
}

fn child_ref(node: Node<'_>, name: &str) -> Option<String> {
    node.child(name)
        .and_then(|child| child.attribute("ref"))
        .map(str::to_string)
}

fn journey_pattern(node: Node<'_>) -> JourneyPattern {
    let mut pattern = JourneyPattern {
        position: Position::of(node),
        ..JourneyPattern::default()
    };

    if let Some(points) = node.child("pointsInSequence") {
        let mut ordered: Vec<(u32, String)> = points
            .children()
            .filter(|point| point.local_name() == "StopPointInJourneyPattern")
            .filter_map(|point| {
                let stop_point = child_ref(point, "ScheduledStopPointRef")?;
                Some((order_of(point), stop_point))
            })
            .collect();
        ordered.sort_by_key(|(order, _)| *order);
        pattern.stop_points = ordered.into_iter().map(|(_, id)| id).collect();
    }

    if let Some(links) = node.child("linksInSequence") {
        let mut ordered: Vec<(u32, String)> = links
            .children()
            .filter(|link| link.local_name() == "ServiceLinkInJourneyPattern")
            .filter_map(|link| {
                let service_link = child_ref(link, "ServiceLinkRef")?;
                Some((order_of(link), service_link))
            })
            .collect();
        ordered.sort_by_key(|(order, _)| *order);
        pattern.service_links = ordered.into_iter().map(|(_, id)| id).collect();
    }

    pattern
}

/// `order` attribute; elements without one keep document order (stable sort)
fn order_of(node: Node<'_>) -> u32 {
    node.attribute("order")
        .and_then(|order| order.parse().ok())
        .unwrap_or(u32::MAX)
}
