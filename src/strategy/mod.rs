//! # Strategy Module
//!
//! Linking, predicting and fusing strategies. Each family is a narrow trait
//! with a closed set of built-in implementations selected from a serde-tagged
//! config, plus an `Operator` variant that resolves a user implementation
//! registered on the context by name.

mod fusing;
mod linking;
mod predicting;

pub use fusing::{
    EntityFusing, FuseOperator, NewInstanceFusing, NotImportFusing, OperatorFusing,
    SearchBasedFusing, SubGraphFusing, SubjectFusing,
};
pub use linking::{IdEqualsLinking, PropertyLinking, RecordLinking, SearchBasedLinking};
pub use predicting::{PropertyPredicting, RecordPredicting};

pub(crate) use fusing::build_fusing;
pub(crate) use linking::build_linking;
pub(crate) use predicting::build_predicting;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LinkingConfig {
    IdEquals,
    SearchBased,
    Operator { name: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PredictingConfig {
    Operator { name: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FusingConfig {
    NewInstance,
    NotImport,
    SearchBased,
    Operator { name: String },
}

/// Strategy attached to one mapping entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "strategy", rename_all = "snake_case")]
pub enum StrategyConfig {
    Linking(LinkingConfig),
    Predicting(PredictingConfig),
    Fusing(FusingConfig),
}
