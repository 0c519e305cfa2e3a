mod support;

use std::sync::Arc;

use spgbuild::config::BuilderConfig;
use spgbuild::strategy::{EntityFusing, RecordLinking, SearchBasedFusing, SubGraphFusing};
use spgbuild::{Catalog, SpgRecord};
use support::{context_with, demo_catalog, seed_search, typed};

#[test]
fn linking_twice_changes_nothing() -> anyhow::Result<()> {
    let context = context_with(BuilderConfig::default());
    seed_search(&context, "Demo.City", &[("c-bj", "Beijing")]);
    seed_search(&context, "Demo.Hobby", &[("h-1", "chess")]);
    let linking = RecordLinking::search_based(&context)?;

    let mut record = typed(
        "Demo.Person",
        "p1",
        &[
            ("name", " Alice "),
            ("livesIn", "Beijing"),
            ("hobbies", "chess,unknown"),
            ("age", "31"),
        ],
    );
    linking.linking(&mut record)?;
    let once = record.clone();
    linking.linking(&mut record)?;
    assert_eq!(record, once);

    let SpgRecord::Advanced(person) = &record else {
        panic!("expected an advanced record");
    };
    assert_eq!(person.property("name").unwrap().value.std_value().as_deref(), Some("Alice"));
    assert_eq!(person.property("hobbies").unwrap().value.ids, vec!["h-1", "unknown"]);
    Ok(())
}

#[test]
fn fused_ids_follow_first_occurrence() -> anyhow::Result<()> {
    let context = context_with(BuilderConfig::default());
    seed_search(&context, "Demo.Hobby", &[("h-chess", "chess")]);
    let fusing = Arc::new(SearchBasedFusing::new(context.search_engine_client()?, 10));

    let catalog: Arc<dyn Catalog> = demo_catalog();
    let sub_graph = SubGraphFusing::new(catalog, RecordLinking::default())
        .with_property_strategy("hobbies", fusing.clone())
        .with_property_strategy("livesIn", fusing);

    for _ in 0..3 {
        let SpgRecord::Advanced(mut person) = typed(
            "Demo.Person",
            "p1",
            &[("hobbies", "go, Chess, go, chess"), ("livesIn", "Paris, Rome")],
        ) else {
            unreachable!()
        };
        let fused = sub_graph.sub_graph_fusing(&mut person, &Default::default())?;

        let hobbies = person.property("hobbies").unwrap();
        assert_eq!(hobbies.value.ids, vec!["go", "h-chess"]);
        // single-valued: the first fused id
        let lives_in = person.property("livesIn").unwrap();
        assert_eq!(lives_in.value.single_id.as_deref(), Some("Paris, Rome"));
        assert_eq!(fused.len(), 3);
    }
    Ok(())
}

#[test]
fn search_fusing_merges_duplicates_first_wins() -> anyhow::Result<()> {
    let context = context_with(BuilderConfig::default());
    seed_search(&context, "Demo.City", &[("c-bj", "Beijing")]);
    let fusing = SearchBasedFusing::new(context.search_engine_client()?, 10);

    let first = typed("Demo.City", "tmp-1", &[("name", "Beijing"), ("code", "")]);
    let second = typed("Demo.City", "tmp-2", &[("name", "beijing"), ("code", "BJ")]);
    let fused = fusing.fusing(vec![
        first.as_advanced().unwrap().clone(),
        second.as_advanced().unwrap().clone(),
    ])?;

    assert_eq!(fused.len(), 1);
    assert_eq!(fused[0].id, "c-bj");
    assert_eq!(fused[0].name(), "Beijing");
    assert_eq!(fused[0].property("code").unwrap().value.raw, "BJ");
    Ok(())
}
