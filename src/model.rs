//! # Data Model
//!
//! Raw builder records, typed SPG records and their property values.

use crate::schema::{Property, Relation, SpgType, SpgTypeKind, SpgTypeRef};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Raw column-to-value row with an optional declared type used for routing.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BuilderRecord {
    #[serde(default)]
    identifier: Option<String>,
    props: IndexMap<String, String>,
}

impl BuilderRecord {
    pub fn new(identifier: Option<&str>, props: IndexMap<String, String>) -> Self {
        Self {
            identifier: identifier.map(str::to_string),
            props,
        }
    }

    /// Build an untyped record from `(column, value)` pairs, keeping their order.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            identifier: None,
            props: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn with_identifier(mut self, identifier: &str) -> Self {
        self.identifier = Some(identifier.to_string());
        self
    }

    pub fn identifier(&self) -> Option<&str> {
        self.identifier.as_deref()
    }

    pub fn props(&self) -> &IndexMap<String, String> {
        &self.props
    }

    pub fn prop_value(&self, name: &str) -> Option<&str> {
        self.props.get(name).map(String::as_str)
    }

    /// Returns a new record with the same identifier and the given properties.
    pub fn with_new_props(&self, props: IndexMap<String, String>) -> Self {
        Self {
            identifier: self.identifier.clone(),
            props,
        }
    }
}

/// Raw, standardized and resolved forms of one property value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyValue {
    pub raw: String,
    pub single_std: Option<String>,
    pub single_id: Option<String>,
    pub std_values: Vec<String>,
    pub ids: Vec<String>,
}

impl PropertyValue {
    pub fn new(raw: impl Into<String>) -> Self {
        Self {
            raw: raw.into(),
            ..Default::default()
        }
    }

    /// Comma separated parts of the raw value, trimmed, empties dropped.
    pub fn raw_values(&self) -> Vec<String> {
        self.raw
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn is_standardized(&self) -> bool {
        self.single_std.is_some() || !self.std_values.is_empty()
    }

    pub fn std_value(&self) -> Option<String> {
        match &self.single_std {
            Some(value) => Some(value.clone()),
            None if !self.std_values.is_empty() => Some(self.std_values.join(",")),
            None => None,
        }
    }

    pub fn resolved_ids(&self) -> Vec<String> {
        if !self.ids.is_empty() {
            return self.ids.clone();
        }
        self.single_id.iter().cloned().collect()
    }
}

/// One typed property on an SPG record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyRecord {
    pub property: Property,
    pub value: PropertyValue,
}

impl PropertyRecord {
    pub fn new(property: Property, raw: impl Into<String>) -> Self {
        Self {
            property,
            value: PropertyValue::new(raw),
        }
    }

    pub fn name(&self) -> &str {
        &self.property.name
    }

    pub fn is_semantic(&self) -> bool {
        self.property.is_semantic()
    }

    pub fn is_multi_value(&self) -> bool {
        self.property.multi_value
    }

    pub fn object_type_ref(&self) -> &SpgTypeRef {
        &self.property.object_type
    }

    pub fn raw_values(&self) -> Vec<String> {
        if self.is_multi_value() {
            self.value.raw_values()
        } else {
            let raw = self.value.raw.trim();
            if raw.is_empty() {
                Vec::new()
            } else {
                vec![raw.to_string()]
            }
        }
    }

    pub fn is_standardized(&self) -> bool {
        self.value.is_standardized()
    }

    /// Write standardized labels and resolved ids into the single or list slots.
    pub fn set_linked(&mut self, stds: Vec<String>, ids: Vec<String>) {
        if self.is_multi_value() {
            self.value.std_values = stds;
            self.value.ids = ids;
        } else {
            self.value.single_std = stds.into_iter().next();
            self.value.single_id = ids.into_iter().next();
        }
    }

    /// Point the property at the given record ids: the first id for single-valued
    /// properties, the de-duplicated list in first-occurrence order otherwise.
    pub fn set_ids(&mut self, ids: &[String]) {
        if ids.is_empty() {
            return;
        }
        let mut unique: Vec<String> = Vec::with_capacity(ids.len());
        for id in ids {
            if !unique.contains(id) {
                unique.push(id.clone());
            }
        }
        self.set_linked(unique.clone(), unique);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SpgRecordType {
    Entity,
    Concept,
    Event,
    Standard,
    Relation,
}

impl fmt::Display for SpgRecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Entity => "ENTITY",
            Self::Concept => "CONCEPT",
            Self::Event => "EVENT",
            Self::Standard => "STANDARD",
            Self::Relation => "RELATION",
        };
        f.write_str(name)
    }
}

/// Vertex-like record: entity, concept, event or standard instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvancedRecord {
    pub spg_type: Arc<SpgType>,
    pub id: String,
    pub properties: Vec<PropertyRecord>,
}

impl AdvancedRecord {
    pub fn new(spg_type: Arc<SpgType>, id: impl Into<String>, properties: Vec<PropertyRecord>) -> Self {
        Self {
            spg_type,
            id: id.into(),
            properties,
        }
    }

    pub fn record_type(&self) -> SpgRecordType {
        match self.spg_type.kind {
            SpgTypeKind::Concept => SpgRecordType::Concept,
            SpgTypeKind::Event => SpgRecordType::Event,
            SpgTypeKind::Standard => SpgRecordType::Standard,
            SpgTypeKind::Entity | SpgTypeKind::Basic => SpgRecordType::Entity,
        }
    }

    pub fn type_name(&self) -> &str {
        self.spg_type.identifier.as_str()
    }

    pub fn name(&self) -> String {
        self.property("name")
            .and_then(|p| p.value.std_value().or_else(|| non_blank(&p.value.raw)))
            .unwrap_or_else(|| self.id.clone())
    }

    pub fn property(&self, name: &str) -> Option<&PropertyRecord> {
        self.properties.iter().find(|p| p.name() == name)
    }

    pub fn property_mut(&mut self, name: &str) -> Option<&mut PropertyRecord> {
        self.properties.iter_mut().find(|p| p.name() == name)
    }

    /// Replace the value of an existing property, or append the property.
    pub fn merge_property_value(&mut self, record: PropertyRecord) {
        match self.property_mut(record.name()) {
            Some(existing) => existing.value = record.value,
            None => self.properties.push(record),
        }
    }
}

/// Edge-like record between two business ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationRecord {
    pub relation: Arc<Relation>,
    pub src_id: String,
    pub dst_id: String,
    pub properties: Vec<PropertyRecord>,
}

impl RelationRecord {
    pub fn new(
        relation: Arc<Relation>,
        src_id: impl Into<String>,
        dst_id: impl Into<String>,
        properties: Vec<PropertyRecord>,
    ) -> Self {
        Self {
            relation,
            src_id: src_id.into(),
            dst_id: dst_id.into(),
            properties,
        }
    }

    pub fn property(&self, name: &str) -> Option<&PropertyRecord> {
        self.properties.iter().find(|p| p.name() == name)
    }
}

/// Typed record produced by mapping and reasoning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpgRecord {
    Advanced(AdvancedRecord),
    Relation(RelationRecord),
}

impl SpgRecord {
    pub fn record_type(&self) -> SpgRecordType {
        match self {
            Self::Advanced(record) => record.record_type(),
            Self::Relation(_) => SpgRecordType::Relation,
        }
    }

    /// Business id; `src_id->dst_id` for relations.
    pub fn id(&self) -> String {
        match self {
            Self::Advanced(record) => record.id.clone(),
            Self::Relation(record) => format!("{}->{}", record.src_id, record.dst_id),
        }
    }

    pub fn type_name(&self) -> String {
        match self {
            Self::Advanced(record) => record.type_name().to_string(),
            Self::Relation(record) => record.relation.identifier().to_string(),
        }
    }

    pub fn properties(&self) -> &[PropertyRecord] {
        match self {
            Self::Advanced(record) => &record.properties,
            Self::Relation(record) => &record.properties,
        }
    }

    pub fn properties_mut(&mut self) -> &mut Vec<PropertyRecord> {
        match self {
            Self::Advanced(record) => &mut record.properties,
            Self::Relation(record) => &mut record.properties,
        }
    }

    pub fn as_advanced(&self) -> Option<&AdvancedRecord> {
        match self {
            Self::Advanced(record) => Some(record),
            Self::Relation(_) => None,
        }
    }

    pub fn as_advanced_mut(&mut self) -> Option<&mut AdvancedRecord> {
        match self {
            Self::Advanced(record) => Some(record),
            Self::Relation(_) => None,
        }
    }

    pub fn raw_property_value_map(&self) -> IndexMap<String, String> {
        self.properties()
            .iter()
            .map(|p| (p.name().to_string(), p.value.raw.clone()))
            .collect()
    }

    /// Standardized values, skipping properties that were never standardized.
    pub fn std_property_value_map(&self) -> IndexMap<String, String> {
        self.properties()
            .iter()
            .filter_map(|p| p.value.std_value().map(|v| (p.name().to_string(), v)))
            .collect()
    }
}

impl From<AdvancedRecord> for SpgRecord {
    fn from(record: AdvancedRecord) -> Self {
        Self::Advanced(record)
    }
}

impl From<RelationRecord> for SpgRecord {
    fn from(record: RelationRecord) -> Self {
        Self::Relation(record)
    }
}

/// Anything flowing between pipeline stages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BaseRecord {
    Builder(BuilderRecord),
    Spg(SpgRecord),
}

impl From<BuilderRecord> for BaseRecord {
    fn from(record: BuilderRecord) -> Self {
        Self::Builder(record)
    }
}

impl From<SpgRecord> for BaseRecord {
    fn from(record: SpgRecord) -> Self {
        Self::Spg(record)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordAlterOperation {
    #[default]
    Upsert,
    Delete,
}

/// One operation-tagged record of a backend write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpgRecordAlterItem {
    pub operation: RecordAlterOperation,
    pub record: SpgRecord,
}

/// Batch command sent to a graph-store or search-engine client.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SpgRecordManipulateCmd {
    pub items: Vec<SpgRecordAlterItem>,
}

impl SpgRecordManipulateCmd {
    pub fn new(operation: RecordAlterOperation, records: &[SpgRecord]) -> Self {
        Self {
            items: records
                .iter()
                .map(|record| SpgRecordAlterItem {
                    operation,
                    record: record.clone(),
                })
                .collect(),
        }
    }
}

pub(crate) fn non_blank(value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SpgTypeKind;

    fn tag_property() -> Property {
        Property::new("tags", SpgTypeRef::new("Demo.Tag".into(), SpgTypeKind::Concept)).multi()
    }

    #[test]
    fn test_with_new_props_keeps_original() {
        let record = BuilderRecord::from_pairs([("id", "p1"), ("city", "Beijing")])
            .with_identifier("Demo.Person");
        let mut props = IndexMap::new();
        props.insert("livesIn".to_string(), "Beijing".to_string());

        let mapped = record.with_new_props(props);
        assert_eq!(mapped.identifier(), Some("Demo.Person"));
        assert_eq!(mapped.prop_value("livesIn"), Some("Beijing"));
        assert_eq!(record.prop_value("city"), Some("Beijing"));
        assert_eq!(record.prop_value("livesIn"), None);
    }

    #[test]
    fn test_raw_values_split() {
        let value = PropertyValue::new(" a, b ,,c ");
        assert_eq!(value.raw_values(), vec!["a", "b", "c"]);

        let single = PropertyRecord::new(Property::text("name"), "Alice, Bob");
        assert_eq!(single.raw_values(), vec!["Alice, Bob"]);
    }

    #[test]
    fn test_set_ids_single_takes_first() {
        let mut record = PropertyRecord::new(
            Property::new("livesIn", SpgTypeRef::new("Demo.City".into(), SpgTypeKind::Entity)),
            "Beijing",
        );
        record.set_ids(&["c2".to_string(), "c1".to_string()]);
        assert_eq!(record.value.single_id.as_deref(), Some("c2"));
        assert_eq!(record.value.single_std.as_deref(), Some("c2"));
    }

    #[test]
    fn test_set_ids_multi_dedupes_in_order() {
        let mut record = PropertyRecord::new(tag_property(), "x,y");
        let ids: Vec<String> = ["b", "a", "b", "c", "a"].iter().map(|s| s.to_string()).collect();
        record.set_ids(&ids);
        assert_eq!(record.value.ids, vec!["b", "a", "c"]);
        assert_eq!(record.value.std_values, vec!["b", "a", "c"]);
        assert_eq!(record.value.std_value().as_deref(), Some("b,a,c"));
    }

    #[test]
    fn test_set_ids_empty_is_noop() {
        let mut record = PropertyRecord::new(tag_property(), "x");
        record.set_ids(&[]);
        assert!(!record.is_standardized());
    }

    #[test]
    fn test_merge_property_value() {
        let spg_type = Arc::new(SpgType::new("Demo.Person", SpgTypeKind::Entity));
        let mut record = AdvancedRecord::new(
            spg_type,
            "p1",
            vec![PropertyRecord::new(Property::text("name"), "Alice")],
        );
        record.merge_property_value(PropertyRecord::new(Property::text("name"), "Alicia"));
        record.merge_property_value(PropertyRecord::new(tag_property(), "vip"));
        assert_eq!(record.properties.len(), 2);
        assert_eq!(record.name(), "Alicia");
        assert_eq!(record.record_type(), SpgRecordType::Entity);
    }

    #[test]
    fn test_value_maps() {
        let spg_type = Arc::new(SpgType::new("Demo.Person", SpgTypeKind::Entity));
        let mut name = PropertyRecord::new(Property::text("name"), " Alice ");
        name.set_linked(vec!["Alice".into()], vec![]);
        let record = SpgRecord::from(AdvancedRecord::new(
            spg_type,
            "p1",
            vec![name, PropertyRecord::new(Property::text("age"), "30")],
        ));
        let raw = record.raw_property_value_map();
        assert_eq!(raw.get("name").map(String::as_str), Some(" Alice "));
        let std = record.std_property_value_map();
        assert_eq!(std.get("name").map(String::as_str), Some("Alice"));
        assert!(!std.contains_key("age"));
    }
}
