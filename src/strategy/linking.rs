//! Property linking: resolve raw values of semantic properties to backend ids
//! and standardized labels.

use super::LinkingConfig;
use crate::context::BuilderContext;
use crate::driver::{SearchEngineClient, SearchHit};
use crate::error::Result;
use crate::model::{PropertyRecord, SpgRecord};
use hashbrown::HashMap;
use std::sync::Arc;
use tracing::trace;

/// Links one semantic property in place.
pub trait PropertyLinking: Send + Sync {
    fn linking(&self, property: &mut PropertyRecord) -> Result<()>;
}

/// Takes every raw value verbatim as both id and label.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdEqualsLinking;

impl PropertyLinking for IdEqualsLinking {
    fn linking(&self, property: &mut PropertyRecord) -> Result<()> {
        let values = property.raw_values();
        if !values.is_empty() {
            property.set_linked(values.clone(), values);
        }
        Ok(())
    }
}

/// Best textual match in the search engine for the property's object type.
/// Values without any hit fall back to id-equals.
pub struct SearchBasedLinking {
    client: Arc<dyn SearchEngineClient>,
    top_k: usize,
}

impl SearchBasedLinking {
    pub fn new(client: Arc<dyn SearchEngineClient>, top_k: usize) -> Self {
        Self { client, top_k }
    }
}

fn best_hit(hits: &[SearchHit]) -> Option<&SearchHit> {
    let mut best: Option<&SearchHit> = None;
    for hit in hits {
        if best.map_or(true, |b| hit.score > b.score) {
            best = Some(hit);
        }
    }
    best
}

impl PropertyLinking for SearchBasedLinking {
    fn linking(&self, property: &mut PropertyRecord) -> Result<()> {
        let values = property.raw_values();
        if values.is_empty() {
            return Ok(());
        }
        let object_type = property.object_type_ref().identifier.clone();
        let mut stds = Vec::with_capacity(values.len());
        let mut ids = Vec::with_capacity(values.len());
        for value in values {
            let hits = self.client.search(&object_type, &value, self.top_k)?;
            match best_hit(&hits) {
                Some(hit) => {
                    trace!(value = %value, id = %hit.id, score = hit.score, "linked by search");
                    stds.push(hit.name.clone());
                    ids.push(hit.id.clone());
                }
                None => {
                    stds.push(value.clone());
                    ids.push(value);
                }
            }
        }
        property.set_linked(stds, ids);
        Ok(())
    }
}

pub(crate) fn build_linking(
    config: &LinkingConfig,
    context: &BuilderContext,
) -> Result<Arc<dyn PropertyLinking>> {
    Ok(match config {
        LinkingConfig::IdEquals => Arc::new(IdEqualsLinking),
        LinkingConfig::SearchBased => Arc::new(SearchBasedLinking::new(
            context.search_engine_client()?,
            context.config().search_top_k,
        )),
        LinkingConfig::Operator { name } => context.operators().linking(name)?,
    })
}

/// Links every property of a record. Basic properties are standardized to
/// their trimmed raw value; semantic ones go through the per-property strategy
/// or the default. Properties already standardized are left alone, which
/// makes linking idempotent.
#[derive(Clone)]
pub struct RecordLinking {
    default: Arc<dyn PropertyLinking>,
    overrides: HashMap<String, Arc<dyn PropertyLinking>>,
}

impl Default for RecordLinking {
    fn default() -> Self {
        Self::new(Arc::new(IdEqualsLinking))
    }
}

impl RecordLinking {
    pub fn new(default: Arc<dyn PropertyLinking>) -> Self {
        Self {
            default,
            overrides: HashMap::new(),
        }
    }

    /// Search-based default against the context's search engine.
    pub fn search_based(context: &BuilderContext) -> Result<Self> {
        Ok(Self::new(build_linking(&LinkingConfig::SearchBased, context)?))
    }

    pub fn with_property_strategy(
        mut self,
        property: &str,
        strategy: Arc<dyn PropertyLinking>,
    ) -> Self {
        self.overrides.insert(property.to_string(), strategy);
        self
    }

    pub fn linking(&self, record: &mut SpgRecord) -> Result<()> {
        self.link_properties(record.properties_mut())
    }

    pub fn link_properties(&self, properties: &mut [PropertyRecord]) -> Result<()> {
        for property in properties.iter_mut() {
            if property.is_standardized() {
                continue;
            }
            if !property.is_semantic() {
                let values = property.raw_values();
                if !values.is_empty() {
                    property.set_linked(values, Vec::new());
                }
                continue;
            }
            let strategy = self
                .overrides
                .get(property.name())
                .unwrap_or(&self.default);
            strategy.linking(property)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BuilderConfig;
    use crate::index::MemorySearchEngine;
    use crate::model::AdvancedRecord;
    use crate::schema::{Catalog, SpgTypeIdentifier};
    use crate::test_support::{demo_catalog, person_record};

    fn engine() -> Arc<MemorySearchEngine> {
        let engine = Arc::new(MemorySearchEngine::new());
        engine.put("Demo.City", "c1", "Beijing");
        engine.put("Demo.City", "c2", "Shanghai");
        engine
    }

    fn person() -> SpgRecord {
        SpgRecord::Advanced(person_record("p1", &[("name", " Alice "), ("livesIn", "Beijing")]))
    }

    fn lives_in(record: &SpgRecord) -> &PropertyRecord {
        record
            .properties()
            .iter()
            .find(|p| p.name() == "livesIn")
            .unwrap()
    }

    #[test]
    fn test_search_based_linking_resolves_best_match() {
        let linking = RecordLinking::new(Arc::new(SearchBasedLinking::new(engine(), 5)));
        let mut record = person();
        linking.linking(&mut record).unwrap();

        let value = &lives_in(&record).value;
        assert_eq!(value.single_id.as_deref(), Some("c1"));
        assert_eq!(value.single_std.as_deref(), Some("Beijing"));
        let name = record.as_advanced().unwrap().property("name").unwrap();
        assert_eq!(name.value.single_std.as_deref(), Some("Alice"));
    }

    #[test]
    fn test_no_hit_falls_back_to_raw() {
        let linking = RecordLinking::new(Arc::new(SearchBasedLinking::new(
            Arc::new(MemorySearchEngine::new()),
            5,
        )));
        let mut record = person();
        linking.linking(&mut record).unwrap();
        assert_eq!(lives_in(&record).value.single_id.as_deref(), Some("Beijing"));
    }

    #[test]
    fn test_linking_is_idempotent() {
        let linking = RecordLinking::new(Arc::new(SearchBasedLinking::new(engine(), 5)));
        let mut once = person();
        linking.linking(&mut once).unwrap();
        let mut twice = once.clone();
        linking.linking(&mut twice).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_property_override_wins() {
        let linking = RecordLinking::new(Arc::new(SearchBasedLinking::new(engine(), 5)))
            .with_property_strategy("livesIn", Arc::new(IdEqualsLinking));
        let mut record = person();
        linking.linking(&mut record).unwrap();
        assert_eq!(lives_in(&record).value.single_id.as_deref(), Some("Beijing"));
    }

    #[test]
    fn test_multi_value_linking() {
        let catalog = demo_catalog();
        let person_type = catalog
            .get_spg_type(&SpgTypeIdentifier::from("Demo.Person"))
            .unwrap();
        let hobbies = person_type.property("hobbies").unwrap().clone();
        let mut record = SpgRecord::Advanced(AdvancedRecord::new(
            person_type,
            "p1",
            vec![PropertyRecord::new(hobbies, "chess, go")],
        ));
        RecordLinking::default().linking(&mut record).unwrap();
        let value = &record.properties()[0].value;
        assert_eq!(value.ids, vec!["chess", "go"]);
        assert_eq!(value.single_id, None);
    }

    #[test]
    fn test_build_from_config() {
        let context = BuilderContext::new(BuilderConfig::default(), demo_catalog());
        assert!(build_linking(&LinkingConfig::SearchBased, &context).is_ok());
        let err = build_linking(
            &LinkingConfig::Operator {
                name: "missing".into(),
            },
            &context,
        )
        .err()
        .unwrap();
        assert!(err.is_fatal());
    }
}
