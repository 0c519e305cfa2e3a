//! Property predicting: fill properties left empty after linking.

use super::PredictingConfig;
use crate::context::BuilderContext;
use crate::error::{BuilderError, Result};
use crate::model::{AdvancedRecord, PropertyRecord};
use crate::schema::SpgType;
use indexmap::IndexMap;
use std::sync::Arc;
use tracing::debug;

/// Infers candidate target records for one property from the rest of the record.
pub trait PropertyPredicting: Send + Sync {
    fn predicting(&self, record: &AdvancedRecord) -> Result<Vec<AdvancedRecord>>;
}

pub(crate) fn build_predicting(
    config: &PredictingConfig,
    context: &BuilderContext,
) -> Result<Arc<dyn PropertyPredicting>> {
    match config {
        PredictingConfig::Operator { name } => context.operators().predicting(name),
    }
}

/// Per-property predicting strategies, applied in configuration order.
/// Predicted values only fill gaps; standardized values are never replaced.
#[derive(Clone, Default)]
pub struct RecordPredicting {
    strategies: IndexMap<String, Arc<dyn PropertyPredicting>>,
}

impl RecordPredicting {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_property_strategy(
        mut self,
        property: &str,
        strategy: Arc<dyn PropertyPredicting>,
    ) -> Self {
        self.strategies.insert(property.to_string(), strategy);
        self
    }

    /// Every configured property must be declared by `spg_type`.
    pub fn validate(&self, spg_type: &SpgType) -> Result<()> {
        for name in self.strategies.keys() {
            if spg_type.property(name).is_none() {
                return Err(BuilderError::schema(format!(
                    "predicting configured for undeclared property {}.{name}",
                    spg_type.identifier
                )));
            }
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    pub fn predicting(&self, record: &mut AdvancedRecord) -> Result<()> {
        for (name, strategy) in &self.strategies {
            if record
                .property(name)
                .map_or(false, PropertyRecord::is_standardized)
            {
                continue;
            }
            let Some(property) = record.spg_type.property(name).cloned() else {
                continue;
            };
            let predicted = strategy.predicting(record)?;
            let ids: Vec<String> = predicted.into_iter().map(|r| r.id).collect();
            if ids.is_empty() {
                continue;
            }
            debug!(property = %name, record = %record.id, predicted = ids.len(), "predicted property");
            let mut filled = record
                .property(name)
                .cloned()
                .unwrap_or_else(|| PropertyRecord::new(property, ids.join(",")));
            filled.set_ids(&ids);
            record.merge_property_value(filled);
        }
        Ok(())
    }
}
