//! # Reason Module
//!
//! Concept reasoning: contracts for the external rule-evaluation service and
//! the graph-state view it reads, plus the reasoning stage built on them.
//!
//! Per record the stage moves `Start -> Inductive -> Causal -> Normalize -> Done`.

mod causal;
mod inductive;
mod overlay;
mod processor;

pub use causal::CausalConceptReasoner;
pub use inductive::InductiveConceptReasoner;
pub use processor::ReasonProcessor;

use crate::error::Result;
use crate::schema::Catalog;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;

/// Vertex as exchanged with the rule evaluator and the graph-state view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vertex {
    pub biz_id: String,
    pub vertex_type: String,
    #[serde(default)]
    pub props: Map<String, Value>,
}

impl Vertex {
    pub fn new(vertex_type: &str, biz_id: &str) -> Self {
        Self {
            biz_id: biz_id.to_string(),
            vertex_type: vertex_type.to_string(),
            props: Map::new(),
        }
    }

    pub fn with_prop(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.props.insert(name.to_string(), value.into());
        self
    }
}

/// Edge as exchanged with the rule evaluator. `edge_type` is a relation
/// identifier (`Subject_predicate_Object`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub src_id: String,
    pub src_type: String,
    pub dst_id: String,
    pub dst_type: String,
    pub edge_type: String,
    #[serde(default)]
    pub props: Map<String, Value>,
}

impl Edge {
    pub fn new(edge_type: &str, src: (&str, &str), dst: (&str, &str)) -> Self {
        Self {
            src_type: src.0.to_string(),
            src_id: src.1.to_string(),
            dst_type: dst.0.to_string(),
            dst_id: dst.1.to_string(),
            edge_type: edge_type.to_string(),
            props: Map::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReasonerResult {
    #[serde(default)]
    pub vertices: Vec<Vertex>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

impl ReasonerResult {
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty() && self.edges.is_empty()
    }
}

/// Read-only handle over the current graph.
pub trait GraphState: Send + Sync {
    fn get_vertex(&self, vertex_type: &str, biz_id: &str) -> Option<Vertex>;

    fn get_out_edges(&self, vertex_type: &str, biz_id: &str) -> Vec<Edge>;
}

/// One submission to the rule evaluator.
#[derive(Clone)]
pub struct ReasonerTask {
    pub dsl: String,
    /// `(biz_id, type_name)` pairs the rule starts from.
    pub start_ids: Vec<(String, String)>,
    pub graph_state: Arc<dyn GraphState>,
    pub catalog: Arc<dyn Catalog>,
}

impl std::fmt::Debug for ReasonerTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReasonerTask")
            .field("dsl", &self.dsl)
            .field("start_ids", &self.start_ids)
            .finish_non_exhaustive()
    }
}

/// External rule-evaluation service. Synchronous and stateless per call.
pub trait RuleEvaluator: Send + Sync {
    fn run(&self, task: &ReasonerTask) -> Result<ReasonerResult>;
}
