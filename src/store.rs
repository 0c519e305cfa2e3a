//! # Store Module
//!
//! In-memory graph store behind `memory://` URLs. Advanced records become
//! vertices, relation records and linked semantic properties become edges.
//! The store doubles as the [`GraphState`] view handed to the rule evaluator.

use crate::driver::{Driver, GraphStoreClient, GraphStoreDriver};
use crate::error::Result;
use crate::model::{
    AdvancedRecord, PropertyRecord, RecordAlterOperation, RelationRecord, SpgRecord,
    SpgRecordManipulateCmd,
};
use crate::reason::{Edge, GraphState, Vertex};
use crate::schema::RelationIdentifier;
use dashmap::DashMap;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::debug;

type VertexKey = (String, String);

/// Vertices keyed by `(type, biz_id)`, out-edges keyed by their source vertex.
#[derive(Debug, Default)]
pub struct MemoryGraphStore {
    vertices: DashMap<VertexKey, Vertex>,
    edges: DashMap<VertexKey, Vec<Edge>>,
}

impl MemoryGraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.iter().map(|entry| entry.value().len()).sum()
    }

    /// Insert or replace a vertex directly, bypassing record conversion.
    pub fn put_vertex(&self, vertex: Vertex) {
        let key = (vertex.vertex_type.clone(), vertex.biz_id.clone());
        self.vertices.insert(key, vertex);
    }

    /// Insert an edge, replacing any edge with the same type and endpoints.
    pub fn put_edge(&self, edge: Edge) {
        let key = (edge.src_type.clone(), edge.src_id.clone());
        let mut out = self.edges.entry(key).or_default();
        out.retain(|e| !(e.edge_type == edge.edge_type && e.dst_id == edge.dst_id));
        out.push(edge);
    }

    fn upsert(&self, record: &SpgRecord) {
        match record {
            SpgRecord::Advanced(advanced) => {
                self.put_vertex(record_vertex(advanced));
                for edge in property_edges(advanced) {
                    self.put_edge(edge);
                }
            }
            SpgRecord::Relation(relation) => self.put_edge(relation_edge(relation)),
        }
    }

    fn delete(&self, record: &SpgRecord) {
        match record {
            SpgRecord::Advanced(advanced) => {
                let key = (advanced.type_name().to_string(), advanced.id.clone());
                self.vertices.remove(&key);
                self.edges.remove(&key);
            }
            SpgRecord::Relation(relation) => {
                let edge = relation_edge(relation);
                if let Some(mut out) = self.edges.get_mut(&(edge.src_type.clone(), edge.src_id.clone()))
                {
                    out.retain(|e| !(e.edge_type == edge.edge_type && e.dst_id == edge.dst_id));
                }
            }
        }
    }
}

impl GraphStoreClient for MemoryGraphStore {
    fn manipulate_record(&self, cmd: &SpgRecordManipulateCmd) -> Result<()> {
        for item in &cmd.items {
            match item.operation {
                RecordAlterOperation::Upsert => self.upsert(&item.record),
                RecordAlterOperation::Delete => self.delete(&item.record),
            }
        }
        debug!(items = cmd.items.len(), "graph store applied command");
        Ok(())
    }
}

impl GraphState for MemoryGraphStore {
    fn get_vertex(&self, vertex_type: &str, biz_id: &str) -> Option<Vertex> {
        self.vertices
            .get(&(vertex_type.to_string(), biz_id.to_string()))
            .map(|v| v.value().clone())
    }

    fn get_out_edges(&self, vertex_type: &str, biz_id: &str) -> Vec<Edge> {
        self.edges
            .get(&(vertex_type.to_string(), biz_id.to_string()))
            .map(|out| out.value().clone())
            .unwrap_or_default()
    }
}

fn flatten_props(properties: &[PropertyRecord]) -> Map<String, Value> {
    properties
        .iter()
        .filter(|p| p.name() != "id")
        .map(|p| {
            let value = p.value.std_value().unwrap_or_else(|| p.value.raw.clone());
            (p.name().to_string(), Value::String(value))
        })
        .collect()
}

pub(crate) fn record_vertex(record: &AdvancedRecord) -> Vertex {
    Vertex {
        biz_id: record.id.clone(),
        vertex_type: record.type_name().to_string(),
        props: flatten_props(&record.properties),
    }
}

pub(crate) fn relation_edge(record: &RelationRecord) -> Edge {
    let relation = &record.relation;
    Edge {
        src_id: record.src_id.clone(),
        src_type: relation.subject.to_string(),
        dst_id: record.dst_id.clone(),
        dst_type: relation.object.to_string(),
        edge_type: relation.identifier().to_string(),
        props: flatten_props(&record.properties),
    }
}

/// Edges implied by linked semantic properties of a vertex.
pub(crate) fn property_edges(record: &AdvancedRecord) -> Vec<Edge> {
    let mut edges = Vec::new();
    for property in record.properties.iter().filter(|p| p.is_semantic()) {
        let object = &property.object_type_ref().identifier;
        let edge_type =
            RelationIdentifier::new(record.spg_type.identifier.clone(), property.name(), object.clone())
                .to_string();
        for dst_id in property.value.resolved_ids() {
            edges.push(Edge::new(
                &edge_type,
                (record.type_name(), record.id.as_str()),
                (object.as_str(), dst_id.as_str()),
            ));
        }
    }
    edges
}

/// `memory://` driver. Every distinct URL maps to one shared store instance.
#[derive(Debug, Default)]
pub struct MemoryGraphStoreDriver {
    instances: DashMap<String, Arc<MemoryGraphStore>>,
}

impl MemoryGraphStoreDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn instance(&self, url: &str) -> Arc<MemoryGraphStore> {
        Arc::clone(
            self.instances
                .entry(url.to_string())
                .or_insert_with(|| Arc::new(MemoryGraphStore::new()))
                .value(),
        )
    }
}

impl Driver for MemoryGraphStoreDriver {
    fn driver_name(&self) -> &str {
        "memory-graph-store"
    }

    fn accepts_scheme(&self, scheme: &str) -> bool {
        scheme == "memory"
    }
}

impl GraphStoreDriver for MemoryGraphStoreDriver {
    fn connect(&self, url: &str) -> Result<Arc<dyn GraphStoreClient>> {
        Ok(self.instance(url))
    }

    fn graph_state(&self, url: &str) -> Result<Arc<dyn GraphState>> {
        Ok(self.instance(url))
    }
}
