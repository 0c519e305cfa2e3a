use spgbuild::config::BuilderConfig;
use spgbuild::reason::{Edge, ReasonerResult, ReasonerTask};
use spgbuild::{BaseRecord, BuilderContext, BuilderRecord, SpgRecord};

#[allow(unused_imports)]
pub use spgbuild::test_support::{demo_catalog, seed_search, ScriptedEvaluator};

#[allow(dead_code)]
pub fn context_with(config: BuilderConfig) -> BuilderContext {
    BuilderContext::new(config, demo_catalog())
}

#[allow(dead_code)]
pub fn raw(pairs: &[(&str, &str)]) -> BaseRecord {
    BaseRecord::Builder(BuilderRecord::from_pairs(pairs.iter().copied()))
}

#[allow(dead_code)]
pub fn typed(spg_type: &str, id: &str, props: &[(&str, &str)]) -> SpgRecord {
    SpgRecord::Advanced(spgbuild::test_support::typed_record(spg_type, id, props))
}

#[allow(dead_code)]
pub fn spg_records(report_records: Vec<BaseRecord>) -> Vec<SpgRecord> {
    report_records
        .into_iter()
        .filter_map(|record| match record {
            BaseRecord::Spg(spg) => Some(spg),
            BaseRecord::Builder(_) => None,
        })
        .collect()
}

/// `belongTo` edge from the task's first start record to `concept`.
#[allow(dead_code)]
pub fn concept_edge(task: &ReasonerTask, edge_type: &str, concept_type: &str, concept: &str) -> ReasonerResult {
    let (id, spg_type) = &task.start_ids[0];
    ReasonerResult {
        vertices: Vec::new(),
        edges: vec![Edge::new(
            edge_type,
            (spg_type.as_str(), id.as_str()),
            (concept_type, concept),
        )],
    }
}
