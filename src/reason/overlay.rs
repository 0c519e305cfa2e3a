//! Graph-state view that layers in-flight records over the backend view, so a
//! rule observes what earlier rules derived for the same record.

use super::{Edge, GraphState, Vertex};
use crate::model::SpgRecord;
use crate::store::{property_edges, record_vertex, relation_edge};
use hashbrown::HashMap;
use std::sync::Arc;

type VertexKey = (String, String);

pub(crate) struct OverlayGraphState {
    base: Arc<dyn GraphState>,
    vertices: HashMap<VertexKey, Vertex>,
    edges: HashMap<VertexKey, Vec<Edge>>,
}

impl OverlayGraphState {
    pub(crate) fn new(base: Arc<dyn GraphState>, records: &[SpgRecord]) -> Self {
        let mut overlay = Self {
            base,
            vertices: HashMap::new(),
            edges: HashMap::new(),
        };
        for record in records {
            match record {
                SpgRecord::Advanced(advanced) => {
                    let vertex = record_vertex(advanced);
                    overlay
                        .vertices
                        .insert((vertex.vertex_type.clone(), vertex.biz_id.clone()), vertex);
                    for edge in property_edges(advanced) {
                        overlay.push_edge(edge);
                    }
                }
                SpgRecord::Relation(relation) => overlay.push_edge(relation_edge(relation)),
            }
        }
        overlay
    }

    fn push_edge(&mut self, edge: Edge) {
        self.edges
            .entry((edge.src_type.clone(), edge.src_id.clone()))
            .or_default()
            .push(edge);
    }
}

impl GraphState for OverlayGraphState {
    fn get_vertex(&self, vertex_type: &str, biz_id: &str) -> Option<Vertex> {
        self.vertices
            .get(&(vertex_type.to_string(), biz_id.to_string()))
            .cloned()
            .or_else(|| self.base.get_vertex(vertex_type, biz_id))
    }

    /// In-flight edges first, then backend edges they do not shadow.
    fn get_out_edges(&self, vertex_type: &str, biz_id: &str) -> Vec<Edge> {
        let mut edges = self
            .edges
            .get(&(vertex_type.to_string(), biz_id.to_string()))
            .cloned()
            .unwrap_or_default();
        for edge in self.base.get_out_edges(vertex_type, biz_id) {
            let shadowed = edges
                .iter()
                .any(|e| e.edge_type == edge.edge_type && e.dst_id == edge.dst_id);
            if !shadowed {
                edges.push(edge);
            }
        }
        edges
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryGraphStore;
    use crate::test_support::person_record;
    use serde_json::Value;

    #[test]
    fn test_overlay_shadows_base() {
        let base = Arc::new(MemoryGraphStore::new());
        base.put_vertex(Vertex::new("Demo.Person", "p1").with_prop("name", "Old"));
        base.put_vertex(Vertex::new("Demo.Person", "p2").with_prop("name", "Bob"));
        base.put_edge(Edge::new(
            "Demo.Person_knows_Demo.Person",
            ("Demo.Person", "p1"),
            ("Demo.Person", "p2"),
        ));

        let record = SpgRecord::Advanced(person_record("p1", &[("name", "New")]));
        let overlay = OverlayGraphState::new(base, &[record]);

        let p1 = overlay.get_vertex("Demo.Person", "p1").unwrap();
        assert_eq!(p1.props["name"], Value::String("New".into()));
        assert!(overlay.get_vertex("Demo.Person", "p2").is_some());
        assert_eq!(overlay.get_out_edges("Demo.Person", "p1").len(), 1);
    }
}
