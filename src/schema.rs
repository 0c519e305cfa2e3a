//! # Schema Module
//!
//! SPG schema model: types, properties, relations and concept lists, plus the
//! read-only [`Catalog`] lookup contract every stage consumes.

use crate::error::{BuilderError, Result};
use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// System predicate linking an instance to its taxonomy concept.
pub const BELONG_TO: &str = "belongTo";
/// Generic text type used when a standard type cannot be spread.
pub const TEXT_TYPE: &str = "Text";

const BASIC_TYPES: [&str; 3] = [TEXT_TYPE, "Integer", "Float"];

/// Identifier of an SPG type, e.g. `Demo.Person` or the basic `Text`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SpgTypeIdentifier(String);

impl SpgTypeIdentifier {
    pub fn parse(value: &str) -> Result<Self> {
        let value = value.trim();
        if value.is_empty() || value.chars().any(char::is_whitespace) {
            return Err(BuilderError::schema(format!(
                "illegal spg type identifier '{value}'"
            )));
        }
        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_basic(&self) -> bool {
        BASIC_TYPES.contains(&self.0.as_str())
    }

    pub fn text() -> Self {
        Self(TEXT_TYPE.to_string())
    }
}

impl fmt::Display for SpgTypeIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SpgTypeIdentifier {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Identifier of a relation type: `Subject_predicate_Object`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RelationIdentifier {
    pub subject: SpgTypeIdentifier,
    pub predicate: String,
    pub object: SpgTypeIdentifier,
}

impl RelationIdentifier {
    pub fn new(subject: SpgTypeIdentifier, predicate: &str, object: SpgTypeIdentifier) -> Self {
        Self {
            subject,
            predicate: predicate.to_string(),
            object,
        }
    }

    /// Type names may themselves contain `_`. The object starts at the last
    /// namespaced segment (`Ns.Type`) past the predicate, or is the final
    /// segment when the object is not namespaced.
    pub fn parse(value: &str) -> Result<Self> {
        let illegal = || BuilderError::schema(format!("illegal relation identifier '{value}'"));
        let parts: Vec<&str> = value.trim().split('_').collect();
        if parts.len() < 3 {
            return Err(illegal());
        }
        let object_start = (2..parts.len())
            .rev()
            .find(|&i| parts[i].contains('.'))
            .unwrap_or(parts.len() - 1);
        let predicate = parts[object_start - 1];
        if predicate.is_empty() || predicate.contains('.') {
            return Err(illegal());
        }
        Ok(Self {
            subject: SpgTypeIdentifier::parse(&parts[..object_start - 1].join("_"))?,
            predicate: predicate.to_string(),
            object: SpgTypeIdentifier::parse(&parts[object_start..].join("_"))?,
        })
    }
}

impl fmt::Display for RelationIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}_{}", self.subject, self.predicate, self.object)
    }
}

/// Either kind of schema identifier a pipeline node can be bound to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpgIdentifier {
    SpgType(SpgTypeIdentifier),
    Relation(RelationIdentifier),
}

impl SpgIdentifier {
    pub fn parse(value: &str) -> Result<Self> {
        if value.contains('_') {
            // `Ns.Some_Type` is a type name, not a malformed relation
            RelationIdentifier::parse(value)
                .map(Self::Relation)
                .or_else(|e| match SpgTypeIdentifier::parse(value) {
                    Ok(identifier) if value.split('_').count() < 3 => Ok(Self::SpgType(identifier)),
                    _ => Err(e),
                })
        } else {
            SpgTypeIdentifier::parse(value).map(Self::SpgType)
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::SpgType(_) => "SPG_TYPE",
            Self::Relation(_) => "RELATION",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpgTypeKind {
    Basic,
    Entity,
    Concept,
    Event,
    Standard,
}

/// Reference from a property to its object type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SpgTypeRef {
    pub identifier: SpgTypeIdentifier,
    pub kind: SpgTypeKind,
}

impl SpgTypeRef {
    pub fn new(identifier: SpgTypeIdentifier, kind: SpgTypeKind) -> Self {
        Self { identifier, kind }
    }

    pub fn text() -> Self {
        Self::new(SpgTypeIdentifier::text(), SpgTypeKind::Basic)
    }

    pub fn is_basic(&self) -> bool {
        self.kind == SpgTypeKind::Basic
    }

    pub fn is_concept(&self) -> bool {
        self.kind == SpgTypeKind::Concept
    }

    pub fn is_standard(&self) -> bool {
        self.kind == SpgTypeKind::Standard
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Property {
    pub name: String,
    pub object_type: SpgTypeRef,
    #[serde(default)]
    pub multi_value: bool,
}

impl Property {
    pub fn new(name: &str, object_type: SpgTypeRef) -> Self {
        Self {
            name: name.to_string(),
            object_type,
            multi_value: false,
        }
    }

    pub fn text(name: &str) -> Self {
        Self::new(name, SpgTypeRef::text())
    }

    pub fn multi(mut self) -> Self {
        self.multi_value = true;
        self
    }

    /// A property is semantic when its object is another graph type.
    pub fn is_semantic(&self) -> bool {
        !self.object_type.is_basic()
    }
}

/// An SPG type with its declared properties.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpgType {
    pub identifier: SpgTypeIdentifier,
    pub kind: SpgTypeKind,
    #[serde(default)]
    pub properties: Vec<Property>,
    /// Only meaningful for standard types.
    #[serde(default)]
    pub spreadable: bool,
}

impl SpgType {
    pub fn new(identifier: &str, kind: SpgTypeKind) -> Self {
        Self {
            identifier: SpgTypeIdentifier::from(identifier),
            kind,
            properties: Vec::new(),
            spreadable: false,
        }
    }

    pub fn with_property(mut self, property: Property) -> Self {
        self.properties.push(property);
        self
    }

    pub fn with_spreadable(mut self, spreadable: bool) -> Self {
        self.spreadable = spreadable;
        self
    }

    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.name == name)
    }

    pub fn belong_to_property(&self) -> Option<&Property> {
        self.property(BELONG_TO)
    }

    pub fn type_ref(&self) -> SpgTypeRef {
        SpgTypeRef::new(self.identifier.clone(), self.kind)
    }

    pub fn is_advanced(&self) -> bool {
        self.kind != SpgTypeKind::Basic
    }

    /// Declares `id` and `name` when the schema left them implicit.
    fn with_implicit_properties(mut self) -> Self {
        if self.is_advanced() {
            for name in ["name", "id"] {
                if self.property(name).is_none() {
                    self.properties.insert(0, Property::text(name));
                }
            }
        }
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relation {
    pub subject: SpgTypeIdentifier,
    pub predicate: String,
    pub object: SpgTypeIdentifier,
    #[serde(default)]
    pub properties: Vec<Property>,
}

impl Relation {
    pub fn new(subject: &str, predicate: &str, object: &str) -> Self {
        Self {
            subject: subject.into(),
            predicate: predicate.to_string(),
            object: object.into(),
            properties: Vec::new(),
        }
    }

    pub fn with_property(mut self, property: Property) -> Self {
        self.properties.push(property);
        self
    }

    pub fn identifier(&self) -> RelationIdentifier {
        RelationIdentifier::new(self.subject.clone(), &self.predicate, self.object.clone())
    }

    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.name == name)
    }
}

/// Opaque rule text handed to the rule-evaluation service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LogicalRule {
    #[serde(default)]
    pub code: String,
    pub content: String,
}

impl LogicalRule {
    pub fn new(code: &str, content: &str) -> Self {
        Self {
            code: code.to_string(),
            content: content.to_string(),
        }
    }
}

/// Rule deriving a `belongTo` concept edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DynamicTaxonomyRule {
    pub concept: String,
    pub rule: LogicalRule,
}

/// Rule deriving downstream records from a concept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogicalCausationRule {
    /// Concept a record must belong to before this rule starts from it.
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub object: Option<String>,
    pub rule: LogicalRule,
}

/// Ordered rule lists for one concept type. Order is significant: rule `i`
/// consumes the output of rule `i - 1`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConceptList {
    pub concept_type: SpgTypeIdentifier,
    #[serde(default)]
    pub dynamic_taxonomy: Vec<DynamicTaxonomyRule>,
    #[serde(default)]
    pub logical_causation: Vec<LogicalCausationRule>,
}

impl ConceptList {
    pub fn new(concept_type: &str) -> Self {
        Self {
            concept_type: concept_type.into(),
            dynamic_taxonomy: Vec::new(),
            logical_causation: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.dynamic_taxonomy.is_empty() && self.logical_causation.is_empty()
    }
}

/// Read-only schema lookup shared by every stage.
pub trait Catalog: Send + Sync {
    fn get_spg_type(&self, identifier: &SpgTypeIdentifier) -> Result<Arc<SpgType>>;

    fn get_relation(&self, identifier: &RelationIdentifier) -> Result<Arc<Relation>>;

    fn get_concept_list(&self, identifier: &SpgTypeIdentifier) -> Option<Arc<ConceptList>>;

    fn is_spreadable(&self, identifier: &SpgTypeIdentifier) -> bool;
}

/// Serialized project schema, the input of [`InMemoryCatalog`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectSchema {
    pub types: Vec<SpgType>,
    pub relations: Vec<Relation>,
    pub concept_lists: Vec<ConceptList>,
}

impl ProjectSchema {
    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    types: HashMap<SpgTypeIdentifier, Arc<SpgType>>,
    relations: HashMap<RelationIdentifier, Arc<Relation>>,
    concept_lists: HashMap<SpgTypeIdentifier, Arc<ConceptList>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a catalog and check every property points at a known type.
    pub fn from_schema(schema: ProjectSchema) -> Result<Self> {
        let mut catalog = Self::new();
        for spg_type in schema.types {
            catalog.add_type(spg_type);
        }
        for relation in schema.relations {
            catalog.add_relation(relation);
        }
        for concept_list in schema.concept_lists {
            catalog.add_concept_list(concept_list);
        }
        catalog.validate()?;
        Ok(catalog)
    }

    pub fn add_type(&mut self, spg_type: SpgType) {
        let spg_type = spg_type.with_implicit_properties();
        self.types
            .insert(spg_type.identifier.clone(), Arc::new(spg_type));
    }

    pub fn add_relation(&mut self, relation: Relation) {
        self.relations
            .insert(relation.identifier(), Arc::new(relation));
    }

    pub fn add_concept_list(&mut self, concept_list: ConceptList) {
        self.concept_lists
            .insert(concept_list.concept_type.clone(), Arc::new(concept_list));
    }

    pub fn validate(&self) -> Result<()> {
        for spg_type in self.types.values() {
            for property in &spg_type.properties {
                let object = &property.object_type.identifier;
                if property.is_semantic() && !self.types.contains_key(object) {
                    return Err(BuilderError::schema(format!(
                        "property {}.{} references unknown type {}",
                        spg_type.identifier, property.name, object
                    )));
                }
            }
        }
        for identifier in self.relations.keys() {
            for end in [&identifier.subject, &identifier.object] {
                if !self.types.contains_key(end) {
                    return Err(BuilderError::schema(format!(
                        "relation {identifier} references unknown type {end}"
                    )));
                }
            }
        }
        Ok(())
    }
}

impl Catalog for InMemoryCatalog {
    fn get_spg_type(&self, identifier: &SpgTypeIdentifier) -> Result<Arc<SpgType>> {
        if let Some(spg_type) = self.types.get(identifier) {
            return Ok(Arc::clone(spg_type));
        }
        if identifier.is_basic() {
            return Ok(Arc::new(SpgType::new(identifier.as_str(), SpgTypeKind::Basic)));
        }
        Err(BuilderError::schema(format!(
            "spg type {identifier} not found in catalog"
        )))
    }

    fn get_relation(&self, identifier: &RelationIdentifier) -> Result<Arc<Relation>> {
        self.relations
            .get(identifier)
            .cloned()
            .ok_or_else(|| {
                BuilderError::schema(format!("relation {identifier} not found in catalog"))
            })
    }

    fn get_concept_list(&self, identifier: &SpgTypeIdentifier) -> Option<Arc<ConceptList>> {
        self.concept_lists.get(identifier).cloned()
    }

    fn is_spreadable(&self, identifier: &SpgTypeIdentifier) -> bool {
        self.types
            .get(identifier)
            .map(|spg_type| spg_type.kind == SpgTypeKind::Standard && spg_type.spreadable)
            .unwrap_or(false)
    }
}
