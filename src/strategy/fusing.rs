//! Entity fusing: decide whether candidate records become new instances, merge
//! into existing entities, or are not imported at all.

use super::{FusingConfig, RecordLinking};
use crate::context::BuilderContext;
use crate::convert::{to_advanced_record, ID};
use crate::driver::SearchEngineClient;
use crate::error::{FusingError, Result};
use crate::model::AdvancedRecord;
use crate::schema::Catalog;
use hashbrown::HashMap;
use indexmap::map::Entry;
use indexmap::IndexMap;
use std::sync::Arc;
use tracing::debug;

pub trait EntityFusing: Send + Sync {
    fn fusing(
        &self,
        records: Vec<AdvancedRecord>,
    ) -> std::result::Result<Vec<AdvancedRecord>, FusingError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NewInstanceFusing;

impl EntityFusing for NewInstanceFusing {
    fn fusing(
        &self,
        records: Vec<AdvancedRecord>,
    ) -> std::result::Result<Vec<AdvancedRecord>, FusingError> {
        Ok(records)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NotImportFusing;

impl EntityFusing for NotImportFusing {
    fn fusing(
        &self,
        _records: Vec<AdvancedRecord>,
    ) -> std::result::Result<Vec<AdvancedRecord>, FusingError> {
        Ok(Vec::new())
    }
}

fn rename(record: &mut AdvancedRecord, id: &str) {
    record.id = id.to_string();
    if let Some(property) = record.property_mut(ID) {
        property.value.raw = id.to_string();
        property.value.single_std = Some(id.to_string());
    }
}

/// Collapse records sharing an id. The first occurrence wins; properties it
/// lacks or left blank are filled from later duplicates.
fn merge_by_id(records: Vec<AdvancedRecord>) -> Vec<AdvancedRecord> {
    let mut merged: IndexMap<String, AdvancedRecord> = IndexMap::with_capacity(records.len());
    for record in records {
        match merged.entry(record.id.clone()) {
            Entry::Vacant(slot) => {
                slot.insert(record);
            }
            Entry::Occupied(mut slot) => {
                let existing = slot.get_mut();
                for property in record.properties {
                    let missing = existing
                        .property(property.name())
                        .map_or(true, |p| p.value.raw.trim().is_empty());
                    if missing {
                        existing.merge_property_value(property);
                    }
                }
            }
        }
    }
    merged.into_values().collect()
}

/// Adopts the id of an indexed entity whose name matches exactly, then merges
/// candidates that now share an id.
pub struct SearchBasedFusing {
    client: Arc<dyn SearchEngineClient>,
    top_k: usize,
}

impl SearchBasedFusing {
    pub fn new(client: Arc<dyn SearchEngineClient>, top_k: usize) -> Self {
        Self { client, top_k }
    }
}

impl EntityFusing for SearchBasedFusing {
    fn fusing(
        &self,
        mut records: Vec<AdvancedRecord>,
    ) -> std::result::Result<Vec<AdvancedRecord>, FusingError> {
        for record in records.iter_mut() {
            let name = record.name();
            let hits = self
                .client
                .search(&record.spg_type.identifier, &name, self.top_k)
                .map_err(|e| FusingError::new(record.type_name(), e.to_string()))?;
            let existing = hits
                .iter()
                .find(|hit| hit.name.trim().eq_ignore_ascii_case(name.trim()));
            if let Some(hit) = existing {
                debug!(name = %name, from = %record.id, to = %hit.id, "fused into existing entity");
                rename(record, &hit.id);
            }
        }
        Ok(merge_by_id(records))
    }
}

/// User fusing operator: find the existing entities a record corresponds to,
/// then merge the record with them.
pub trait FuseOperator: Send + Sync {
    fn link(&self, record: &AdvancedRecord) -> Result<Vec<AdvancedRecord>>;

    fn merge(
        &self,
        record: AdvancedRecord,
        linked: Vec<AdvancedRecord>,
    ) -> Result<Vec<AdvancedRecord>>;
}

pub struct OperatorFusing {
    operator: Arc<dyn FuseOperator>,
}

impl OperatorFusing {
    pub fn new(operator: Arc<dyn FuseOperator>) -> Self {
        Self { operator }
    }
}

impl EntityFusing for OperatorFusing {
    fn fusing(
        &self,
        records: Vec<AdvancedRecord>,
    ) -> std::result::Result<Vec<AdvancedRecord>, FusingError> {
        let mut fused = Vec::with_capacity(records.len());
        for record in records {
            let spg_type = record.type_name().to_string();
            let linked = self
                .operator
                .link(&record)
                .map_err(|e| FusingError::new(&spg_type, e.to_string()))?;
            let merged = self
                .operator
                .merge(record, linked)
                .map_err(|e| FusingError::new(&spg_type, e.to_string()))?;
            fused.extend(merged);
        }
        Ok(fused)
    }
}

pub(crate) fn build_fusing(
    config: &FusingConfig,
    context: &BuilderContext,
) -> Result<Arc<dyn EntityFusing>> {
    Ok(match config {
        FusingConfig::NewInstance => Arc::new(NewInstanceFusing),
        FusingConfig::NotImport => Arc::new(NotImportFusing),
        FusingConfig::SearchBased => Arc::new(SearchBasedFusing::new(
            context.search_engine_client()?,
            context.config().search_top_k,
        )),
        FusingConfig::Operator { name } => {
            Arc::new(OperatorFusing::new(context.operators().fusing(name)?))
        }
    })
}

/// Fusing of the record being mapped. Defaults to creating a new instance.
#[derive(Clone)]
pub struct SubjectFusing {
    strategy: Arc<dyn EntityFusing>,
}

impl Default for SubjectFusing {
    fn default() -> Self {
        Self::new(Arc::new(NewInstanceFusing))
    }
}

impl SubjectFusing {
    pub fn new(strategy: Arc<dyn EntityFusing>) -> Self {
        Self { strategy }
    }

    /// An empty result means the subject must not be written.
    pub fn subject_fusing(
        &self,
        record: AdvancedRecord,
    ) -> std::result::Result<Vec<AdvancedRecord>, FusingError> {
        self.strategy.fusing(vec![record])
    }
}

/// Fusing of the entities referenced by semantic properties. Only properties
/// with a configured strategy take part.
#[derive(Clone)]
pub struct SubGraphFusing {
    catalog: Arc<dyn Catalog>,
    linking: RecordLinking,
    strategies: IndexMap<String, Arc<dyn EntityFusing>>,
    /// semantic property -> (source column, sub-record property)
    sub_properties: HashMap<String, Vec<(String, String)>>,
}

impl SubGraphFusing {
    pub fn new(catalog: Arc<dyn Catalog>, linking: RecordLinking) -> Self {
        Self {
            catalog,
            linking,
            strategies: IndexMap::new(),
            sub_properties: HashMap::new(),
        }
    }

    pub fn with_property_strategy(mut self, property: &str, strategy: Arc<dyn EntityFusing>) -> Self {
        self.strategies.insert(property.to_string(), strategy);
        self
    }

    /// Copy `source` column values onto the sub-records built for `property`.
    pub fn with_sub_property(mut self, property: &str, source: &str, target: &str) -> Self {
        self.sub_properties
            .entry(property.to_string())
            .or_default()
            .push((source.to_string(), target.to_string()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    /// Fuse the sub-entities of `record` and point its properties at the fused
    /// ids. `source` is the mapped row the record came from. Returns the fused
    /// sub-records in property order.
    pub fn sub_graph_fusing(
        &self,
        record: &mut AdvancedRecord,
        source: &IndexMap<String, String>,
    ) -> Result<Vec<AdvancedRecord>> {
        let mut results = Vec::new();
        for property in record.properties.iter_mut() {
            if !property.is_semantic() {
                continue;
            }
            let Some(strategy) = self.strategies.get(property.name()) else {
                continue;
            };
            let object_type = self
                .catalog
                .get_spg_type(&property.object_type_ref().identifier)?;
            let extra = self.sub_properties.get(property.name());

            let mut provisional = Vec::new();
            for raw in property.raw_values() {
                let mut props = IndexMap::new();
                props.insert(ID.to_string(), raw.clone());
                props.insert("name".to_string(), raw);
                for (column, target) in extra.into_iter().flatten() {
                    if let Some(value) = source.get(column) {
                        props.insert(target.clone(), value.clone());
                    }
                }
                let mut sub_record = to_advanced_record(Arc::clone(&object_type), &props)?;
                self.linking.link_properties(&mut sub_record.properties)?;
                provisional.push(sub_record);
            }

            let fused = strategy.fusing(provisional)?;
            if fused.is_empty() {
                continue;
            }
            let ids: Vec<String> = fused.iter().map(|r| r.id.clone()).collect();
            property.set_ids(&ids);
            results.extend(fused);
        }
        Ok(results)
    }
}
