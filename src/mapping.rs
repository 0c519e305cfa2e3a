//! # Mapping Module
//!
//! Processors that turn raw builder records into typed SPG records: filter,
//! column mapping, typed conversion, then linking, predicting and fusing in
//! that order.

use crate::context::BuilderContext;
use crate::convert::{to_advanced_record, to_relation_record, DST_ID, SRC_ID};
use crate::error::{BuilderError, Result};
use crate::model::{BaseRecord, BuilderRecord, SpgRecord};
use crate::schema::{
    Catalog, Relation, RelationIdentifier, SpgIdentifier, SpgType, SpgTypeIdentifier,
};
use crate::strategy::{
    build_fusing, build_linking, build_predicting, FusingConfig, RecordLinking, RecordPredicting,
    StrategyConfig, SubGraphFusing, SubjectFusing,
};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MappingType {
    #[default]
    Property,
    Relation,
    SubProperty,
    SubRelation,
}

/// One column mapping entry.
///
/// * `Property`: `source` column to property `predicate`.
/// * `Relation`: `source` values become edges `Subject_predicate_object`.
/// * `SubProperty`: `source` column to property `object` of the sub-records
///   built for semantic property `predicate`.
/// * `SubRelation`: `source` column to edge property `object` of the
///   `Relation` mapping with the same `predicate`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingConfig {
    pub source: String,
    pub predicate: String,
    #[serde(default)]
    pub object: Option<String>,
    #[serde(default)]
    pub mapping_type: MappingType,
    #[serde(default)]
    pub strategy: Option<StrategyConfig>,
}

impl MappingConfig {
    pub fn property(source: &str, predicate: &str) -> Self {
        Self {
            source: source.to_string(),
            predicate: predicate.to_string(),
            object: None,
            mapping_type: MappingType::Property,
            strategy: None,
        }
    }

    pub fn relation(source: &str, predicate: &str, object: &str) -> Self {
        Self {
            object: Some(object.to_string()),
            mapping_type: MappingType::Relation,
            ..Self::property(source, predicate)
        }
    }

    pub fn sub_property(source: &str, predicate: &str, object: &str) -> Self {
        Self {
            object: Some(object.to_string()),
            mapping_type: MappingType::SubProperty,
            ..Self::property(source, predicate)
        }
    }

    pub fn sub_relation(source: &str, predicate: &str, object: &str) -> Self {
        Self {
            object: Some(object.to_string()),
            mapping_type: MappingType::SubRelation,
            ..Self::property(source, predicate)
        }
    }

    pub fn with_strategy(mut self, strategy: StrategyConfig) -> Self {
        self.strategy = Some(strategy);
        self
    }

    fn object(&self) -> Result<&str> {
        self.object.as_deref().ok_or_else(|| {
            BuilderError::config(format!(
                "{:?} mapping of '{}' requires an object",
                self.mapping_type, self.source
            ))
        })
    }
}

/// `column_name == column_value`; a node's filters are OR-combined.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingFilter {
    pub column_name: String,
    pub column_value: String,
}

impl MappingFilter {
    pub fn new(column_name: &str, column_value: &str) -> Self {
        Self {
            column_name: column_name.to_string(),
            column_value: column_value.to_string(),
        }
    }

    fn matches(&self, record: &BuilderRecord) -> bool {
        record.prop_value(&self.column_name) == Some(self.column_value.as_str())
    }
}

/// One mapping node of a job, bound to an SPG type or a relation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingNodeConfig {
    pub identifier: String,
    #[serde(default)]
    pub filters: Vec<MappingFilter>,
    #[serde(default)]
    pub mappings: Vec<MappingConfig>,
    #[serde(default)]
    pub subject_fusing: Option<FusingConfig>,
}

impl MappingNodeConfig {
    pub fn new(identifier: &str) -> Self {
        Self {
            identifier: identifier.to_string(),
            filters: Vec::new(),
            mappings: Vec::new(),
            subject_fusing: None,
        }
    }

    pub fn with_filter(mut self, filter: MappingFilter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn with_mapping(mut self, mapping: MappingConfig) -> Self {
        self.mappings.push(mapping);
        self
    }

    pub fn with_subject_fusing(mut self, fusing: FusingConfig) -> Self {
        self.subject_fusing = Some(fusing);
        self
    }

    fn property_mappings(&self) -> Vec<(String, String)> {
        self.mappings
            .iter()
            .filter(|m| m.mapping_type == MappingType::Property)
            .map(|m| (m.source.clone(), m.predicate.clone()))
            .collect()
    }
}

/// A record that failed a stage, kept for the job report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordFailure {
    pub stage: String,
    pub record: String,
    pub message: String,
    pub fatal: bool,
}

impl RecordFailure {
    pub fn new(stage: &str, record: &BaseRecord, error: &BuilderError) -> Self {
        Self::labelled(stage, describe(record), error)
    }

    pub fn labelled(stage: &str, record: String, error: &BuilderError) -> Self {
        Self {
            stage: stage.to_string(),
            record,
            message: error.to_string(),
            fatal: error.is_fatal(),
        }
    }
}

fn describe(record: &BaseRecord) -> String {
    match record {
        BaseRecord::Builder(builder) => format!(
            "{}:{}",
            builder.identifier().unwrap_or("-"),
            builder
                .prop_value("id")
                .or_else(|| builder.prop_value(SRC_ID))
                .unwrap_or("-")
        ),
        BaseRecord::Spg(spg) => format!("{}:{}", spg.type_name(), spg.id()),
    }
}

/// Records flowing between stages plus the failures collected so far.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordBatch {
    pub records: Vec<BaseRecord>,
    pub failures: Vec<RecordFailure>,
}

impl RecordBatch {
    pub fn new(records: Vec<BaseRecord>) -> Self {
        Self {
            records,
            failures: Vec::new(),
        }
    }

    pub fn spg_records(&self) -> impl Iterator<Item = &SpgRecord> {
        self.records.iter().filter_map(|record| match record {
            BaseRecord::Spg(spg) => Some(spg),
            BaseRecord::Builder(_) => None,
        })
    }
}

/// A pipeline stage. `init` runs once before any record is processed;
/// `process_record` must only read the state built by `init`.
pub trait Processor: Send + Sync {
    fn name(&self) -> &str;

    fn init(&mut self, context: &BuilderContext) -> Result<()>;

    fn process_record(&self, record: BaseRecord) -> Result<Vec<BaseRecord>>;

    /// Process records in order. A failing record is reported and skipped;
    /// its siblings carry on.
    fn process(&self, batch: RecordBatch) -> RecordBatch {
        let mut out = RecordBatch {
            records: Vec::with_capacity(batch.records.len()),
            failures: batch.failures,
        };
        for record in batch.records {
            let label = describe(&record);
            match self.process_record(record) {
                Ok(records) => out.records.extend(records),
                Err(e) => {
                    warn!(processor = self.name(), record = %label, error = %e, "record failed");
                    out.failures.push(RecordFailure::labelled(self.name(), label, &e));
                }
            }
        }
        out
    }

    fn close(&self) -> Result<()> {
        Ok(())
    }
}

fn passes_filter(record: &BuilderRecord, bound: &str, filters: &[MappingFilter]) -> bool {
    if record.identifier().is_some_and(|identifier| identifier != bound) {
        return false;
    }
    filters.is_empty() || filters.iter().any(|filter| filter.matches(record))
}

/// Same-name mapping when no rules are given; otherwise only mapped columns survive.
fn map_columns(record: &BuilderRecord, rules: &[(String, String)]) -> BuilderRecord {
    if rules.is_empty() {
        return record.clone();
    }
    let mut props = IndexMap::with_capacity(rules.len());
    for (source, target) in rules {
        if let Some(value) = record.prop_value(source) {
            props.insert(target.clone(), value.to_string());
        }
    }
    record.with_new_props(props)
}

pub(crate) fn not_initialized(name: &str) -> BuilderError {
    BuilderError::config(format!("processor {name} used before init"))
}

struct RelationMapping {
    source: String,
    relation: Arc<Relation>,
    /// (source column, edge property)
    edge_properties: Vec<(String, String)>,
}

struct SpgTypeMappingState {
    spg_type: Arc<SpgType>,
    property_mappings: Vec<(String, String)>,
    relation_mappings: Vec<RelationMapping>,
    linking: RecordLinking,
    predicting: RecordPredicting,
    sub_graph: SubGraphFusing,
    subject: SubjectFusing,
}

/// Maps raw records onto one SPG type.
pub struct SpgTypeMappingProcessor {
    name: String,
    config: MappingNodeConfig,
    state: Option<SpgTypeMappingState>,
}

impl SpgTypeMappingProcessor {
    pub fn new(config: MappingNodeConfig) -> Self {
        Self {
            name: format!("spg-type-mapping[{}]", config.identifier),
            config,
            state: None,
        }
    }

    fn build_state(&self, context: &BuilderContext) -> Result<SpgTypeMappingState> {
        let identifier = match SpgIdentifier::parse(&self.config.identifier)? {
            SpgIdentifier::SpgType(identifier) => identifier,
            other => {
                return Err(BuilderError::schema(format!(
                    "illegal identifier type {} for spg type mapping '{}'",
                    other.kind_name(),
                    self.config.identifier
                )))
            }
        };
        let catalog = context.catalog();
        let spg_type = catalog.get_spg_type(&identifier)?;

        let mut linking = RecordLinking::search_based(context)?;
        let mut predicting = RecordPredicting::new();
        let mut sub_graph_strategies = Vec::new();
        let mut sub_properties = Vec::new();
        let mut relation_mappings: Vec<RelationMapping> = Vec::new();

        for mapping in &self.config.mappings {
            match mapping.mapping_type {
                MappingType::Property => {
                    let property = spg_type.property(&mapping.predicate).ok_or_else(|| {
                        BuilderError::schema(format!(
                            "property {}.{} is not declared",
                            identifier, mapping.predicate
                        ))
                    })?;
                    match &mapping.strategy {
                        None => {}
                        Some(StrategyConfig::Linking(config)) => {
                            linking = linking.with_property_strategy(
                                &mapping.predicate,
                                build_linking(config, context)?,
                            );
                        }
                        Some(StrategyConfig::Predicting(config)) => {
                            predicting = predicting.with_property_strategy(
                                &mapping.predicate,
                                build_predicting(config, context)?,
                            );
                        }
                        Some(StrategyConfig::Fusing(config)) => {
                            if !property.is_semantic() {
                                return Err(BuilderError::schema(format!(
                                    "fusing configured on basic property {}.{}",
                                    identifier, mapping.predicate
                                )));
                            }
                            sub_graph_strategies
                                .push((mapping.predicate.clone(), build_fusing(config, context)?));
                        }
                    }
                }
                MappingType::Relation => {
                    let object = SpgTypeIdentifier::parse(mapping.object()?)?;
                    let relation = catalog.get_relation(&RelationIdentifier::new(
                        identifier.clone(),
                        &mapping.predicate,
                        object,
                    ))?;
                    relation_mappings.push(RelationMapping {
                        source: mapping.source.clone(),
                        relation,
                        edge_properties: Vec::new(),
                    });
                }
                MappingType::SubProperty => {
                    let semantic = spg_type
                        .property(&mapping.predicate)
                        .filter(|p| p.is_semantic())
                        .ok_or_else(|| {
                            BuilderError::schema(format!(
                                "sub property mapping needs semantic property {}.{}",
                                identifier, mapping.predicate
                            ))
                        })?;
                    let object_type = catalog.get_spg_type(&semantic.object_type.identifier)?;
                    let target = mapping.object()?;
                    if object_type.property(target).is_none() {
                        return Err(BuilderError::schema(format!(
                            "property {}.{} is not declared",
                            object_type.identifier, target
                        )));
                    }
                    sub_properties.push((&mapping.predicate, &mapping.source, target));
                }
                // resolved below, once every relation mapping is known
                MappingType::SubRelation => {}
            }
        }

        for mapping in self
            .config
            .mappings
            .iter()
            .filter(|m| m.mapping_type == MappingType::SubRelation)
        {
            let target = mapping.object()?;
            let relation_mapping = relation_mappings
                .iter_mut()
                .find(|r| r.relation.predicate == mapping.predicate)
                .ok_or_else(|| {
                    BuilderError::config(format!(
                        "sub relation mapping '{}' has no relation mapping for '{}'",
                        mapping.source, mapping.predicate
                    ))
                })?;
            if relation_mapping.relation.property(target).is_none() {
                return Err(BuilderError::schema(format!(
                    "edge property {}.{} is not declared",
                    relation_mapping.relation.identifier(),
                    target
                )));
            }
            relation_mapping
                .edge_properties
                .push((mapping.source.clone(), target.to_string()));
        }

        predicting.validate(&spg_type)?;
        // sub-records are linked the same way as the subject's own properties
        let mut sub_graph = SubGraphFusing::new(Arc::clone(catalog), linking.clone());
        for (property, strategy) in sub_graph_strategies {
            sub_graph = sub_graph.with_property_strategy(&property, strategy);
        }
        for (property, source, target) in sub_properties {
            sub_graph = sub_graph.with_sub_property(property, source, target);
        }
        let subject = match &self.config.subject_fusing {
            Some(config) => SubjectFusing::new(build_fusing(config, context)?),
            None => SubjectFusing::default(),
        };

        Ok(SpgTypeMappingState {
            spg_type,
            property_mappings: self.config.property_mappings(),
            relation_mappings,
            linking,
            predicting,
            sub_graph,
            subject,
        })
    }

    fn map_record(&self, state: &SpgTypeMappingState, record: &BuilderRecord) -> Result<Vec<SpgRecord>> {
        let mapped = map_columns(record, &state.property_mappings);
        let mut advanced = to_advanced_record(Arc::clone(&state.spg_type), mapped.props())?;

        state.linking.link_properties(&mut advanced.properties)?;
        state.predicting.predicting(&mut advanced)?;
        let sub_records = state.sub_graph.sub_graph_fusing(&mut advanced, record.props())?;

        let subjects = state.subject.subject_fusing(advanced)?;
        // a subject that is not imported has no edges either
        let subject_id = subjects.first().map(|s| s.id.clone());

        let mut out: Vec<SpgRecord> = sub_records
            .into_iter()
            .chain(subjects)
            .map(SpgRecord::Advanced)
            .collect();
        if let Some(subject_id) = subject_id {
            for relation_mapping in &state.relation_mappings {
                out.extend(self.relation_records(state, relation_mapping, record, &subject_id)?);
            }
        }
        Ok(out)
    }

    fn relation_records(
        &self,
        state: &SpgTypeMappingState,
        mapping: &RelationMapping,
        record: &BuilderRecord,
        subject_id: &str,
    ) -> Result<Vec<SpgRecord>> {
        let Some(raw) = record.prop_value(&mapping.source) else {
            return Ok(Vec::new());
        };
        let mut records = Vec::new();
        for dst_id in raw.split(',').map(str::trim).filter(|v| !v.is_empty()) {
            let mut props = IndexMap::new();
            props.insert(SRC_ID.to_string(), subject_id.to_string());
            props.insert(DST_ID.to_string(), dst_id.to_string());
            for (column, target) in &mapping.edge_properties {
                if let Some(value) = record.prop_value(column) {
                    props.insert(target.clone(), value.to_string());
                }
            }
            let mut relation = to_relation_record(Arc::clone(&mapping.relation), &props)?;
            state.linking.link_properties(&mut relation.properties)?;
            records.push(SpgRecord::Relation(relation));
        }
        Ok(records)
    }
}

impl Processor for SpgTypeMappingProcessor {
    fn name(&self) -> &str {
        &self.name
    }

    fn init(&mut self, context: &BuilderContext) -> Result<()> {
        let state = self.build_state(context)?;
        debug!(
            processor = %self.name,
            properties = state.property_mappings.len(),
            relations = state.relation_mappings.len(),
            "initialized"
        );
        self.state = Some(state);
        Ok(())
    }

    fn process_record(&self, record: BaseRecord) -> Result<Vec<BaseRecord>> {
        let state = self.state.as_ref().ok_or_else(|| not_initialized(&self.name))?;
        let builder = match record {
            BaseRecord::Builder(builder) => builder,
            spg @ BaseRecord::Spg(_) => return Ok(vec![spg]),
        };
        if !passes_filter(&builder, state.spg_type.identifier.as_str(), &self.config.filters) {
            return Ok(Vec::new());
        }
        Ok(self
            .map_record(state, &builder)?
            .into_iter()
            .map(BaseRecord::Spg)
            .collect())
    }
}

struct RelationMappingState {
    relation: Arc<Relation>,
    bound: String,
    property_mappings: Vec<(String, String)>,
    linking: RecordLinking,
}

/// Maps raw records onto one relation type; `srcId` and `dstId` are required.
pub struct RelationMappingProcessor {
    name: String,
    config: MappingNodeConfig,
    state: Option<RelationMappingState>,
}

impl RelationMappingProcessor {
    pub fn new(config: MappingNodeConfig) -> Self {
        Self {
            name: format!("relation-mapping[{}]", config.identifier),
            config,
            state: None,
        }
    }
}

impl Processor for RelationMappingProcessor {
    fn name(&self) -> &str {
        &self.name
    }

    fn init(&mut self, context: &BuilderContext) -> Result<()> {
        let identifier = match SpgIdentifier::parse(&self.config.identifier)? {
            SpgIdentifier::Relation(identifier) => identifier,
            other => {
                return Err(BuilderError::schema(format!(
                    "illegal identifier type {} for relation mapping '{}'",
                    other.kind_name(),
                    self.config.identifier
                )))
            }
        };
        let relation = context.catalog().get_relation(&identifier)?;
        let mut linking = RecordLinking::search_based(context)?;
        for mapping in &self.config.mappings {
            if let Some(StrategyConfig::Linking(config)) = &mapping.strategy {
                linking =
                    linking.with_property_strategy(&mapping.predicate, build_linking(config, context)?);
            }
        }
        debug!(processor = %self.name, "initialized");
        self.state = Some(RelationMappingState {
            bound: identifier.to_string(),
            relation,
            property_mappings: self.config.property_mappings(),
            linking,
        });
        Ok(())
    }

    fn process_record(&self, record: BaseRecord) -> Result<Vec<BaseRecord>> {
        let state = self.state.as_ref().ok_or_else(|| not_initialized(&self.name))?;
        let builder = match record {
            BaseRecord::Builder(builder) => builder,
            spg @ BaseRecord::Spg(_) => return Ok(vec![spg]),
        };
        if !passes_filter(&builder, &state.bound, &self.config.filters) {
            return Ok(Vec::new());
        }
        let mapped = map_columns(&builder, &state.property_mappings);
        let mut relation = to_relation_record(Arc::clone(&state.relation), mapped.props())?;
        state.linking.link_properties(&mut relation.properties)?;
        Ok(vec![BaseRecord::Spg(SpgRecord::Relation(relation))])
    }
}

/// Processor for a mapping node, chosen by the kind of its identifier.
pub fn build_mapping_processor(config: MappingNodeConfig) -> Result<Box<dyn Processor>> {
    Ok(match SpgIdentifier::parse(&config.identifier)? {
        SpgIdentifier::SpgType(_) => Box::new(SpgTypeMappingProcessor::new(config)),
        SpgIdentifier::Relation(_) => Box::new(RelationMappingProcessor::new(config)),
    })
}
