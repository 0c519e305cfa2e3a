mod support;

use std::sync::Arc;

use spgbuild::config::BuilderConfig;
use spgbuild::mapping::{build_mapping_processor, MappingFilter, RecordBatch};
use spgbuild::model::BuilderRecord;
use spgbuild::strategy::{FusingConfig, PredictingConfig, PropertyPredicting, StrategyConfig};
use spgbuild::{AdvancedRecord, BaseRecord, Catalog, MappingConfig, MappingNodeConfig, SpgRecord};
use support::{context_with, demo_catalog, raw, seed_search, spg_records};

fn person_node() -> MappingNodeConfig {
    MappingNodeConfig::new("Demo.Person")
        .with_mapping(MappingConfig::property("id", "id"))
        .with_mapping(MappingConfig::property("name", "name"))
        .with_mapping(MappingConfig::property("city", "livesIn"))
}

#[test]
fn person_city_is_linked_to_best_match() -> anyhow::Result<()> {
    let context = context_with(BuilderConfig::default());
    seed_search(
        &context,
        "Demo.City",
        &[("c-sh", "Shanghai"), ("c-bj", "Beijing"), ("c-bjw", "Beijing West")],
    );
    let mut processor = build_mapping_processor(person_node())?;
    processor.init(&context)?;

    let out = spg_records(processor.process_record(raw(&[
        ("id", "p1"),
        ("name", "Alice"),
        ("city", "Beijing"),
    ]))?);

    assert_eq!(out.len(), 1);
    let person = out[0].as_advanced().expect("advanced record");
    assert_eq!(person.id, "p1");
    assert_eq!(person.name(), "Alice");
    let lives_in = person.property("livesIn").expect("livesIn mapped");
    assert_eq!(lives_in.value.raw, "Beijing");
    assert_eq!(lives_in.value.single_id.as_deref(), Some("c-bj"));
    Ok(())
}

#[test]
fn empty_mapping_list_keeps_property_names() -> anyhow::Result<()> {
    let context = context_with(BuilderConfig::default());
    let mut processor = build_mapping_processor(MappingNodeConfig::new("Demo.Person"))?;
    processor.init(&context)?;

    let out = spg_records(processor.process_record(raw(&[
        ("id", "p1"),
        ("name", "Alice"),
        ("age", "31"),
    ]))?);
    let names: Vec<&str> = out[0].properties().iter().map(|p| p.name()).collect();
    assert_eq!(names, vec!["id", "name", "age"]);
    assert_eq!(out[0].raw_property_value_map()["age"], "31");
    Ok(())
}

#[test]
fn records_of_another_type_are_dropped() -> anyhow::Result<()> {
    let context = context_with(BuilderConfig::default());
    let node = person_node().with_filter(MappingFilter::new("name", "Alice"));
    let mut processor = build_mapping_processor(node)?;
    processor.init(&context)?;

    let city_row = BaseRecord::Builder(
        BuilderRecord::from_pairs([("id", "p1"), ("name", "Alice")]).with_identifier("Demo.City"),
    );
    assert!(processor.process_record(city_row)?.is_empty());

    let typed_row = BaseRecord::Builder(
        BuilderRecord::from_pairs([("id", "p1"), ("name", "Alice")]).with_identifier("Demo.Person"),
    );
    assert_eq!(processor.process_record(typed_row)?.len(), 1);
    assert!(processor
        .process_record(raw(&[("id", "p2"), ("name", "Bob")]))?
        .is_empty());
    Ok(())
}

#[test]
fn blank_dst_id_fails_only_that_record() -> anyhow::Result<()> {
    let context = context_with(BuilderConfig::default());
    let node = MappingNodeConfig::new("Demo.Person_knows_Demo.Person")
        .with_mapping(MappingConfig::property("from", "srcId"))
        .with_mapping(MappingConfig::property("to", "dstId"))
        .with_mapping(MappingConfig::property("since", "since"));
    let mut processor = build_mapping_processor(node)?;
    processor.init(&context)?;

    let err = processor
        .process_record(raw(&[("from", "p1"), ("to", "  "), ("since", "2020")]))
        .unwrap_err();
    assert!(err.is_record_level());

    let batch = processor.process(RecordBatch::new(vec![
        raw(&[("from", "p1"), ("to", ""), ("since", "2020")]),
        raw(&[("from", "p1"), ("to", "p2"), ("since", "2021")]),
    ]));
    assert_eq!(batch.failures.len(), 1);
    assert!(!batch.failures[0].fatal);
    let records: Vec<&SpgRecord> = batch.spg_records().collect();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].id(), "p1->p2");
    assert_eq!(records[0].std_property_value_map()["since"], "2021");
    Ok(())
}

#[test]
fn sub_graph_records_precede_subject_and_relations() -> anyhow::Result<()> {
    let context = context_with(BuilderConfig::default());
    let node = MappingNodeConfig::new("Demo.Person")
        .with_mapping(MappingConfig::property("id", "id"))
        .with_mapping(MappingConfig::property("name", "name"))
        .with_mapping(
            MappingConfig::property("hobbies", "hobbies")
                .with_strategy(StrategyConfig::Fusing(FusingConfig::NewInstance)),
        )
        .with_mapping(MappingConfig::relation("friends", "knows", "Demo.Person"))
        .with_mapping(MappingConfig::sub_relation("met", "knows", "since"));
    let mut processor = build_mapping_processor(node)?;
    processor.init(&context)?;

    let out = spg_records(processor.process_record(raw(&[
        ("id", "p1"),
        ("name", "Alice"),
        ("hobbies", "chess, go, chess"),
        ("friends", "p2,p3"),
        ("met", "2019"),
    ]))?);

    let kinds: Vec<String> = out.iter().map(|r| format!("{}:{}", r.type_name(), r.id())).collect();
    assert_eq!(
        kinds,
        vec![
            "Demo.Hobby:chess",
            "Demo.Hobby:go",
            "Demo.Hobby:chess",
            "Demo.Person:p1",
            "Demo.Person_knows_Demo.Person:p1->p2",
            "Demo.Person_knows_Demo.Person:p1->p3",
        ]
    );
    let hobbies = out[3].as_advanced().unwrap().property("hobbies").unwrap();
    assert_eq!(hobbies.value.ids, vec!["chess", "go"]);
    assert_eq!(out[5].std_property_value_map()["since"], "2019");
    Ok(())
}

#[test]
fn not_imported_subject_writes_no_edges() -> anyhow::Result<()> {
    let context = context_with(BuilderConfig::default());
    let node = MappingNodeConfig::new("Demo.Person")
        .with_mapping(MappingConfig::property("id", "id"))
        .with_mapping(
            MappingConfig::property("hobbies", "hobbies")
                .with_strategy(StrategyConfig::Fusing(FusingConfig::NewInstance)),
        )
        .with_mapping(MappingConfig::relation("friends", "knows", "Demo.Person"))
        .with_subject_fusing(FusingConfig::NotImport);
    let mut processor = build_mapping_processor(node)?;
    processor.init(&context)?;

    let out = spg_records(processor.process_record(raw(&[
        ("id", "p1"),
        ("hobbies", "chess"),
        ("friends", "p2,p3"),
    ]))?);

    let kinds: Vec<String> = out.iter().map(|r| format!("{}:{}", r.type_name(), r.id())).collect();
    assert_eq!(kinds, vec!["Demo.Hobby:chess"]);
    Ok(())
}

/// Guesses a person's home city from the name.
struct HometownGuess;

impl PropertyPredicting for HometownGuess {
    fn predicting(&self, record: &AdvancedRecord) -> spgbuild::Result<Vec<AdvancedRecord>> {
        let city = demo_catalog().get_spg_type(&"Demo.City".into())?;
        Ok(match record.name().as_str() {
            "Alice" => vec![AdvancedRecord::new(city, "Beijing", Vec::new())],
            _ => Vec::new(),
        })
    }
}

#[test]
fn predicted_reference_is_fused_into_existing_entity() -> anyhow::Result<()> {
    let context = context_with(BuilderConfig::default())
        .with_predicting_operator("hometown", Arc::new(HometownGuess));
    seed_search(&context, "Demo.City", &[("c-bj", "Beijing"), ("c-sh", "Shanghai")]);
    let node = MappingNodeConfig::new("Demo.Person")
        .with_mapping(MappingConfig::property("id", "id"))
        .with_mapping(MappingConfig::property("name", "name"))
        .with_mapping(
            MappingConfig::property("city", "livesIn").with_strategy(StrategyConfig::Predicting(
                PredictingConfig::Operator {
                    name: "hometown".to_string(),
                },
            )),
        )
        .with_mapping(
            MappingConfig::property("city", "livesIn")
                .with_strategy(StrategyConfig::Fusing(FusingConfig::SearchBased)),
        );
    let mut processor = build_mapping_processor(node)?;
    processor.init(&context)?;

    // no city column: predicting fills the gap, fusing then resolves it
    let out = spg_records(processor.process_record(raw(&[("id", "p1"), ("name", "Alice")]))?);
    assert_eq!(out.len(), 2);
    assert_eq!(format!("{}:{}", out[0].type_name(), out[0].id()), "Demo.City:c-bj");
    let person = out[1].as_advanced().expect("advanced record");
    let lives_in = person.property("livesIn").expect("livesIn predicted");
    assert_eq!(lives_in.value.single_id.as_deref(), Some("c-bj"));

    // a linked value is never predicted over
    let out = spg_records(processor.process_record(raw(&[
        ("id", "p2"),
        ("name", "Alice"),
        ("city", "Shanghai"),
    ]))?);
    assert_eq!(format!("{}:{}", out[0].type_name(), out[0].id()), "Demo.City:c-sh");
    let person = out[1].as_advanced().expect("advanced record");
    assert_eq!(person.property("livesIn").unwrap().value.single_id.as_deref(), Some("c-sh"));

    // nothing predicted, nothing fused
    let out = spg_records(processor.process_record(raw(&[("id", "p3"), ("name", "Bob")]))?);
    assert_eq!(out.len(), 1);
    assert!(out[0].as_advanced().unwrap().property("livesIn").is_none());
    Ok(())
}
