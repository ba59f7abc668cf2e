//! Graph-view edge state: the visual edge list derived from the prerequisite
//! list, plus routing waypoints that exist only on the presentation side.

use std::collections::HashMap;

use tracing::debug;

use crate::error::AppError;
use crate::models::{CurriculumData, Prerequisite, RelationKind};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Waypoint {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeColor {
    Satisfied,
    CorequisitePending,
    Unsatisfied,
}

#[derive(Debug, Clone)]
pub struct VisualEdge {
    pub from: String,
    pub to: String,
    pub kind: RelationKind,
    pub color: EdgeColor,
    /// Ordered intermediate routing points; empty means straight/step routing.
    pub waypoints: Vec<Waypoint>,
}

fn edge_color(kind: RelationKind, source_completed: bool) -> EdgeColor {
    if source_completed {
        EdgeColor::Satisfied
    } else if kind == RelationKind::Corequisite {
        EdgeColor::CorequisitePending
    } else {
        EdgeColor::Unsatisfied
    }
}

#[derive(Debug, Default)]
pub struct GraphState {
    edges: Vec<VisualEdge>,
    /// Waypoints keyed by (from, to) so they survive reconciliation.
    waypoints: HashMap<(String, String), Vec<Waypoint>>,
}

impl GraphState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn edges(&self) -> &[VisualEdge] {
        &self.edges
    }

    /// Rebuilds the visual edge list from the current aggregate. Colors are
    /// recomputed from the completed set; waypoints previously attached to a
    /// (from, to) pair are carried over.
    pub fn reconcile(&mut self, data: &CurriculumData) {
        self.edges = data
            .prerequisites
            .iter()
            .map(|p| {
                let key = (p.from.clone(), p.to.clone());
                let waypoints = self.waypoints.get(&key).cloned().unwrap_or_default();
                VisualEdge {
                    from: p.from.clone(),
                    to: p.to.clone(),
                    kind: p.kind,
                    color: edge_color(p.kind, data.completed.contains(&p.from)),
                    waypoints,
                }
            })
            .collect();
        self.waypoints
            .retain(|(from, to), _| {
                data.prerequisites
                    .iter()
                    .any(|p| &p.from == from && &p.to == to)
            });
    }

    /// Replaces the routing waypoints of one edge. No-op for unknown edges.
    pub fn set_waypoints(&mut self, from: &str, to: &str, waypoints: Vec<Waypoint>) {
        let Some(edge) = self
            .edges
            .iter_mut()
            .find(|e| e.from == from && e.to == to)
        else {
            return;
        };
        edge.waypoints = waypoints.clone();
        self.waypoints
            .insert((from.to_string(), to.to_string()), waypoints);
    }

    /// Validates a direct-manipulation edge creation before it reaches the
    /// backend. Unauthenticated subjects are rejected without side effects; a
    /// duplicate (from, to) pair is reported as already present so the caller
    /// can skip the write.
    pub fn try_add_edge(
        &mut self,
        authenticated: bool,
        edge: Prerequisite,
        completed: &[String],
    ) -> Result<EdgeAddition, AppError> {
        if !authenticated {
            debug!("edge creation rejected: not authenticated");
            return Err(AppError::LoginRequired);
        }
        edge.validate()?;
        if self
            .edges
            .iter()
            .any(|e| e.from == edge.from && e.to == edge.to)
        {
            return Ok(EdgeAddition::AlreadyPresent);
        }
        let color = edge_color(edge.kind, completed.iter().any(|c| c == &edge.from));
        // New edges start with straight/step routing and no waypoints.
        self.edges.push(VisualEdge {
            from: edge.from,
            to: edge.to,
            kind: edge.kind,
            color,
            waypoints: Vec::new(),
        });
        Ok(EdgeAddition::Added)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeAddition {
    Added,
    AlreadyPresent,
}
