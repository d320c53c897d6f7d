use std::collections::HashSet;

use graph_playground::graph_utils::dedupe::{dedupe_nodes, dedupe_relationships, reconcile};
use graph_playground::graph_utils::graph::{GraphSelection, Node, Relationship};
use graph_playground::session::catalog::{EntityCatalog, LabelEntities, SchemaListing};
use graph_playground::session::search::search;
use graph_playground::session::SessionManager;
use proptest::prelude::*;

const MAX_NODE_ID: i64 = 12;
const TYPES: [&str; 3] = ["KNOWS", "LIKES", "OWNS"];

fn nodes_strategy() -> impl Strategy<Value = Vec<Node>> {
    prop::collection::vec((0i64..=MAX_NODE_ID, 0u8..4), 0..40).prop_map(|raw| {
        raw.into_iter()
            .enumerate()
            // position tag makes first-occurrence checks observable
            .map(|(pos, (id, label))| Node::new(id, format!("L{}", label)).with_property("pos", pos as i64))
            .collect()
    })
}

fn relationships_strategy() -> impl Strategy<Value = Vec<Relationship>> {
    prop::collection::vec((0i64..=MAX_NODE_ID, 0i64..=MAX_NODE_ID, 0usize..TYPES.len()), 0..40).prop_map(|raw| {
        raw.into_iter()
            .enumerate()
            .map(|(pos, (a, b, t))| Relationship::new(a, b, TYPES[t]).with_property("pos", pos as i64))
            .collect()
    })
}

fn catalog_with(summaries: Vec<String>, keys: Vec<String>) -> EntityCatalog {
    let mut c = EntityCatalog::new();
    c.apply_schema(SchemaListing { labels: vec!["Thing".into()], relationship_types: vec![], property_keys: keys });
    c.merge_label_entities("Thing", LabelEntities { details: vec![], summaries });
    c
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        failure_persistence: None,
        ..ProptestConfig::default()
    })]

    #[test]
    fn dedupe_nodes_is_idempotent_and_keeps_first_occurrence(nodes in nodes_strategy()) {
        let once = dedupe_nodes(&nodes);
        prop_assert_eq!(&dedupe_nodes(&once), &once);

        let ids: HashSet<i64> = nodes.iter().map(|n| n.id).collect();
        prop_assert_eq!(once.len(), ids.len());
        for n in &once {
            let first = nodes.iter().find(|m| m.id == n.id);
            prop_assert_eq!(Some(n), first);
        }
        // survivors appear in input order
        let positions: Vec<i64> = once.iter().map(|n| nodes.iter().position(|m| m == n).unwrap_or(0) as i64).collect();
        prop_assert!(positions.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn dedupe_relationships_is_idempotent_and_unique_by_key(rels in relationships_strategy()) {
        let once = dedupe_relationships(&rels);
        prop_assert_eq!(&dedupe_relationships(&once), &once);

        let keys: HashSet<_> = once.iter().map(Relationship::key).collect();
        prop_assert_eq!(keys.len(), once.len());
        let all_keys: HashSet<_> = rels.iter().map(Relationship::key).collect();
        prop_assert_eq!(keys, all_keys);
    }

    #[test]
    fn reconcile_always_ends_duplicate_free(nodes in nodes_strategy(), rels in relationships_strategy()) {
        let mut sel = GraphSelection::new();
        sel.nodes = nodes.clone();
        sel.relationships = rels.clone();

        let outcome = reconcile(&mut sel);
        prop_assert!(outcome.passes == 1 || outcome.passes == 2);
        prop_assert_eq!(outcome.removed_nodes, nodes.len() - sel.nodes.len());
        prop_assert_eq!(outcome.removed_relationships, rels.len() - sel.relationships.len());
        prop_assert_eq!(&sel.nodes, &dedupe_nodes(&nodes));
        prop_assert_eq!(&sel.relationships, &dedupe_relationships(&rels));
    }

    #[test]
    fn search_ignores_case(
        summaries in prop::collection::vec("[a-zA-Z ]{0,12}", 0..10),
        keys in prop::collection::vec("[a-zA-Z]{1,8}", 0..6),
        query in "[a-zA-Z]{1,4}",
    ) {
        let catalog = catalog_with(summaries.clone(), keys);
        let lower = search(&query.to_lowercase(), &catalog);
        let upper = search(&query.to_uppercase(), &catalog);
        prop_assert_eq!(&lower, &upper);

        let expected = summaries.iter().filter(|s| s.to_lowercase().contains(&query.to_lowercase())).count();
        prop_assert_eq!(lower.node_matches.len(), expected);
        for hit in &lower.node_matches {
            prop_assert_eq!(&summaries[hit.index], &hit.value);
        }
    }

    #[test]
    fn switching_never_leaks_selection_between_tabs(
        first in nodes_strategy(),
        second in nodes_strategy(),
        hops in prop::collection::vec(prop::bool::ANY, 1..8),
    ) {
        let mut m = SessionManager::new();
        m.working_mut().add_nodes(first.clone());
        let b = m.create_session();
        m.working_mut().add_nodes(second.clone());

        for to_first in hops {
            let (id, expected) = if to_first { (1, &first) } else { (b, &second) };
            m.switch_to(id).unwrap();
            prop_assert_eq!(&m.working().graph().nodes, &dedupe_nodes(expected));
        }
    }
}
