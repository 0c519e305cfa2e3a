//! # Convert Module
//!
//! Typed conversion from mapped column values to SPG records, and
//! materialization of rule-evaluation results back into SPG records.

use crate::error::{BuilderError, Result};
use crate::model::{AdvancedRecord, PropertyRecord, RelationRecord, SpgRecord};
use crate::reason::ReasonerResult;
use crate::schema::{Catalog, Relation, RelationIdentifier, SpgType, SpgTypeIdentifier};
use indexmap::IndexMap;
use serde_json::{Map, Value};
use std::sync::Arc;

pub const ID: &str = "id";
pub const SRC_ID: &str = "srcId";
pub const DST_ID: &str = "dstId";

fn required<'a>(props: &'a IndexMap<String, String>, key: &str, owner: &str) -> Result<&'a str> {
    props
        .get(key)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| BuilderError::record(format!("{owner}: {key} must not be blank")))
}

/// Convert mapped values to a vertex-like record. Columns the type does not
/// declare are dropped.
pub fn to_advanced_record(
    spg_type: Arc<SpgType>,
    props: &IndexMap<String, String>,
) -> Result<AdvancedRecord> {
    let id = required(props, ID, spg_type.identifier.as_str())?.to_string();
    let properties = props
        .iter()
        .filter_map(|(name, value)| {
            spg_type
                .property(name)
                .map(|property| PropertyRecord::new(property.clone(), value.as_str()))
        })
        .collect();
    Ok(AdvancedRecord::new(spg_type, id, properties))
}

/// Convert mapped values to an edge record; `srcId` and `dstId` are required.
pub fn to_relation_record(
    relation: Arc<Relation>,
    props: &IndexMap<String, String>,
) -> Result<RelationRecord> {
    let owner = relation.identifier().to_string();
    let src_id = required(props, SRC_ID, &owner)?.to_string();
    let dst_id = required(props, DST_ID, &owner)?.to_string();
    let properties = props
        .iter()
        .filter_map(|(name, value)| {
            relation
                .property(name)
                .map(|property| PropertyRecord::new(property.clone(), value.as_str()))
        })
        .collect();
    Ok(RelationRecord::new(relation, src_id, dst_id, properties))
}

/// Flatten an opaque property bag to raw string values. Strings are taken
/// verbatim, nulls are dropped, anything else keeps its JSON text.
pub fn flatten_props(props: &Map<String, Value>) -> IndexMap<String, String> {
    props
        .iter()
        .filter_map(|(name, value)| {
            let text = match value {
                Value::Null => return None,
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            Some((name.clone(), text))
        })
        .collect()
}

/// Materialize a reasoning result: vertices first, then edges, each in result
/// order. An unresolvable type or relation is a schema error.
pub fn to_spg_records(result: &ReasonerResult, catalog: &dyn Catalog) -> Result<Vec<SpgRecord>> {
    let mut records = Vec::with_capacity(result.vertices.len() + result.edges.len());
    for vertex in &result.vertices {
        let spg_type = catalog.get_spg_type(&SpgTypeIdentifier::parse(&vertex.vertex_type)?)?;
        let mut props = flatten_props(&vertex.props);
        props.insert(ID.to_string(), vertex.biz_id.clone());
        records.push(SpgRecord::Advanced(to_advanced_record(spg_type, &props)?));
    }
    for edge in &result.edges {
        let relation = catalog.get_relation(&RelationIdentifier::parse(&edge.edge_type)?)?;
        let mut props = flatten_props(&edge.props);
        props.insert(SRC_ID.to_string(), edge.src_id.clone());
        props.insert(DST_ID.to_string(), edge.dst_id.clone());
        records.push(SpgRecord::Relation(to_relation_record(relation, &props)?));
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reason::{Edge, Vertex};
    use crate::test_support::demo_catalog;
    use serde_json::json;

    fn props(pairs: &[(&str, &str)]) -> IndexMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_advanced_record_drops_undeclared() {
        let catalog = demo_catalog();
        let person = catalog.get_spg_type(&"Demo.Person".into()).unwrap();
        let record = to_advanced_record(
            person,
            &props(&[("id", "p1"), ("name", "Alice"), ("shoeSize", "42")]),
        )
        .unwrap();
        assert_eq!(record.id, "p1");
        let names: Vec<&str> = record.properties.iter().map(|p| p.name()).collect();
        assert_eq!(names, vec!["id", "name"]);
    }

    #[test]
    fn test_blank_id_is_record_error() {
        let catalog = demo_catalog();
        let person = catalog.get_spg_type(&"Demo.Person".into()).unwrap();
        let err = to_advanced_record(person, &props(&[("id", "  "), ("name", "Alice")])).unwrap_err();
        assert!(err.is_record_level());
    }

    #[test]
    fn test_relation_requires_both_ends() {
        let relation = Arc::new(Relation::new("Demo.Person", "knows", "Demo.Person"));
        assert!(to_relation_record(Arc::clone(&relation), &props(&[("srcId", "p1"), ("dstId", "")]))
            .unwrap_err()
            .is_record_level());
        let record =
            to_relation_record(relation, &props(&[("srcId", "p1"), ("dstId", "p2")])).unwrap();
        assert_eq!((record.src_id.as_str(), record.dst_id.as_str()), ("p1", "p2"));
    }

    #[test]
    fn test_flatten_props() {
        let bag = json!({"name": "Alice", "age": 30, "nick": null, "vip": true});
        let flat = flatten_props(bag.as_object().unwrap());
        assert_eq!(flat.get("name").map(String::as_str), Some("Alice"));
        assert_eq!(flat.get("age").map(String::as_str), Some("30"));
        assert_eq!(flat.get("vip").map(String::as_str), Some("true"));
        assert!(!flat.contains_key("nick"));
    }

    #[test]
    fn test_materialize_result() {
        let catalog = demo_catalog();
        let result = ReasonerResult {
            vertices: vec![Vertex::new("Demo.Person", "p9").with_prop("name", "Zed")],
            edges: vec![Edge::new(
                "Demo.Person_knows_Demo.Person",
                ("Demo.Person", "p9"),
                ("Demo.Person", "p1"),
            )],
        };
        let records = to_spg_records(&result, catalog.as_ref()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].as_advanced().unwrap().name(), "Zed");
        assert_eq!(records[1].id(), "p9->p1");
    }

    #[test]
    fn test_unknown_vertex_type_is_fatal() {
        let catalog = demo_catalog();
        let result = ReasonerResult {
            vertices: vec![Vertex::new("Demo.Ghost", "g1")],
            edges: vec![],
        };
        let err = to_spg_records(&result, catalog.as_ref()).unwrap_err();
        assert!(err.is_fatal());
    }
}
