//! # Context Module
//!
//! The job-wide [`BuilderContext`]: configuration, schema catalog, backend
//! drivers, user-registered strategy operators and the optional rule
//! evaluator. Built once per job and only read afterwards.

use crate::config::BuilderConfig;
use crate::driver::{Drivers, GraphStoreClient, SearchEngineClient};
use crate::error::{BuilderError, Result};
use crate::model::RecordAlterOperation;
use crate::reason::{GraphState, RuleEvaluator};
use crate::schema::Catalog;
use crate::strategy::{FuseOperator, PropertyLinking, PropertyPredicting};
use hashbrown::HashMap;
use std::sync::Arc;

/// Named user strategies referenced by `Operator { name }` configs.
#[derive(Default, Clone)]
pub struct OperatorRegistry {
    linking: HashMap<String, Arc<dyn PropertyLinking>>,
    predicting: HashMap<String, Arc<dyn PropertyPredicting>>,
    fusing: HashMap<String, Arc<dyn FuseOperator>>,
}

fn lookup<T: ?Sized>(map: &HashMap<String, Arc<T>>, kind: &str, name: &str) -> Result<Arc<T>> {
    map.get(name)
        .cloned()
        .ok_or_else(|| BuilderError::config(format!("unknown {kind} operator '{name}'")))
}

impl OperatorRegistry {
    pub fn linking(&self, name: &str) -> Result<Arc<dyn PropertyLinking>> {
        lookup(&self.linking, "linking", name)
    }

    pub fn predicting(&self, name: &str) -> Result<Arc<dyn PropertyPredicting>> {
        lookup(&self.predicting, "predicting", name)
    }

    pub fn fusing(&self, name: &str) -> Result<Arc<dyn FuseOperator>> {
        lookup(&self.fusing, "fusing", name)
    }
}

pub struct BuilderContext {
    config: BuilderConfig,
    catalog: Arc<dyn Catalog>,
    drivers: Arc<Drivers>,
    operators: OperatorRegistry,
    rule_evaluator: Option<Arc<dyn RuleEvaluator>>,
}

impl BuilderContext {
    /// Context with the built-in `memory://` drivers registered.
    pub fn new(config: BuilderConfig, catalog: Arc<dyn Catalog>) -> Self {
        Self {
            config,
            catalog,
            drivers: Arc::new(Drivers::with_memory_drivers()),
            operators: OperatorRegistry::default(),
            rule_evaluator: None,
        }
    }

    pub fn with_drivers(mut self, drivers: Arc<Drivers>) -> Self {
        self.drivers = drivers;
        self
    }

    pub fn with_rule_evaluator(mut self, evaluator: Arc<dyn RuleEvaluator>) -> Self {
        self.rule_evaluator = Some(evaluator);
        self
    }

    pub fn with_linking_operator(mut self, name: &str, op: Arc<dyn PropertyLinking>) -> Self {
        self.operators.linking.insert(name.to_string(), op);
        self
    }

    pub fn with_predicting_operator(mut self, name: &str, op: Arc<dyn PropertyPredicting>) -> Self {
        self.operators.predicting.insert(name.to_string(), op);
        self
    }

    pub fn with_fusing_operator(mut self, name: &str, op: Arc<dyn FuseOperator>) -> Self {
        self.operators.fusing.insert(name.to_string(), op);
        self
    }

    pub fn config(&self) -> &BuilderConfig {
        &self.config
    }

    pub fn operation(&self) -> RecordAlterOperation {
        self.config.operation
    }

    pub fn catalog(&self) -> &Arc<dyn Catalog> {
        &self.catalog
    }

    pub fn drivers(&self) -> &Arc<Drivers> {
        &self.drivers
    }

    pub fn operators(&self) -> &OperatorRegistry {
        &self.operators
    }

    pub fn rule_evaluator(&self) -> Option<&Arc<dyn RuleEvaluator>> {
        self.rule_evaluator.as_ref()
    }

    pub fn graph_store_client(&self) -> Result<Arc<dyn GraphStoreClient>> {
        self.drivers.graph_store_client(&self.config.graph_store_url)
    }

    pub fn search_engine_client(&self) -> Result<Arc<dyn SearchEngineClient>> {
        self.drivers.search_engine_client(&self.config.search_engine_url)
    }

    pub fn graph_state(&self) -> Result<Arc<dyn GraphState>> {
        self.drivers.graph_state(&self.config.graph_store_url)
    }
}
