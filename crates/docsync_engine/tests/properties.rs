//! Property tests: convergence of the reconciler and termination of the
//! resolver.

use docsync_engine::{Change, MemoryNodeStore, MirrorConfig, MockRemote, SyncEngine};
use docsync_protocol::Document;
use docsync_testkit::prelude::*;
use proptest::prelude::*;
use serde_json::Value;
use std::collections::BTreeMap;

const ENTITIES: usize = 4;

fn engine(overlay: bool, max_depth: usize) -> SyncEngine<MockRemote, MemoryNodeStore> {
    SyncEngine::new(
        MirrorConfig::new("p", "production")
            .with_overlay_drafts(overlay)
            .with_max_resolve_depth(max_depth),
        MockRemote::new(),
        MemoryNodeStore::new(),
        sample_type_map(),
    )
}

fn change_for(mutation: &Mutation) -> Change {
    match mutation.document() {
        Some(doc) => Change::Upsert(doc),
        None => Change::Remove(mutation.raw_id()),
    }
}

/// Title each entity's node should carry, computed from the final documents.
fn expected_titles(
    documents: &BTreeMap<String, Document>,
    overlay: bool,
) -> BTreeMap<String, Value> {
    (0..ENTITIES)
        .map(entity_id)
        .filter_map(|id| {
            let draft = documents.get(&format!("drafts.{id}")).filter(|_| overlay);
            let chosen = draft.or_else(|| documents.get(&id))?;
            Some((id, chosen.fields["title"].clone()))
        })
        .collect()
}

fn json_depth(value: &Value) -> usize {
    match value {
        Value::Array(items) => 1 + items.iter().map(json_depth).max().unwrap_or(0),
        Value::Object(map) => 1 + map.values().map(json_depth).max().unwrap_or(0),
        _ => 0,
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn incremental_changes_converge(
        mutations in mutation_sequence_strategy(ENTITIES, 24),
        overlay in any::<bool>(),
        batch in 1usize..5,
    ) {
        let engine = engine(overlay, 5);
        let mut documents = BTreeMap::new();

        for chunk in mutations.chunks(batch) {
            for mutation in chunk {
                match mutation.document() {
                    Some(doc) => { documents.insert(doc.id.clone(), doc); }
                    None => { documents.remove(&mutation.raw_id()); }
                }
            }
            engine.apply(chunk.iter().map(change_for)).unwrap();
        }

        let actual: BTreeMap<String, Value> = engine
            .store()
            .nodes()
            .into_iter()
            .map(|node| (node.provenance.clone(), node.content["title"].clone()))
            .collect();
        prop_assert_eq!(actual, expected_titles(&documents, overlay));

        // a converged mirror writes nothing when reconciled again
        let writes = engine.store().write_count();
        let ids: Vec<String> = (0..ENTITIES).map(entity_id).collect();
        let report = engine.reconcile_ids(&ids).unwrap();
        prop_assert_eq!(report.writes(), 0);
        prop_assert_eq!(engine.store().write_count(), writes);
    }

    #[test]
    fn order_of_independent_batches_does_not_matter(
        mutations in mutation_sequence_strategy(ENTITIES, 16),
        overlay in any::<bool>(),
    ) {
        let one_by_one = engine(overlay, 5);
        for mutation in &mutations {
            one_by_one.apply([change_for(mutation)]).unwrap();
        }

        let all_at_once = engine(overlay, 5);
        all_at_once.apply(mutations.iter().map(change_for)).unwrap();

        let contents = |e: &SyncEngine<MockRemote, MemoryNodeStore>| {
            e.store()
                .nodes()
                .into_iter()
                .map(|node| (node.id, node.content_digest))
                .collect::<Vec<_>>()
        };
        prop_assert_eq!(contents(&one_by_one), contents(&all_at_once));
    }

    #[test]
    fn resolution_terminates_on_any_graph(
        edges in reference_graph_strategy(ENTITIES),
        max_depth in 0usize..6,
    ) {
        let engine = engine(false, max_depth);
        engine
            .apply(graph_documents(ENTITIES, &edges).into_iter().map(Change::Upsert))
            .unwrap();

        for node in engine.store().nodes() {
            let resolution = engine.resolve_with_depth(&Value::Object(node.content), max_depth);
            prop_assert!(resolution.missing.is_empty());
            prop_assert!(json_depth(&resolution.value) <= max_depth + 6);
        }
    }
}
