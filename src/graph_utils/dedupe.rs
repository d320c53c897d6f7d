use std::collections::HashSet;

use super::graph::{GraphSelection, Node, NodeId, Relationship, RelationshipKey};

/// Whether a selection may be handed to the renderer.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Readiness {
    Ready,
    NotReady,
}

impl Readiness {
    pub fn is_ready(self) -> bool { self == Readiness::Ready }
}

/// Result of settling a selection after one external mutation.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub passes: u8,
    pub removed_nodes: usize,
    pub removed_relationships: usize,
}

// First occurrence of each id wins; survivors keep their relative order.
pub fn dedupe_nodes(nodes: &[Node]) -> Vec<Node> {
    let mut seen: HashSet<NodeId> = HashSet::with_capacity(nodes.len());
    nodes
        .iter()
        .filter(|n| seen.insert(n.id))
        .cloned()
        .collect()
}

// Same policy keyed on (start, end, type).
pub fn dedupe_relationships(relationships: &[Relationship]) -> Vec<Relationship> {
    let mut seen: HashSet<RelationshipKey> = HashSet::with_capacity(relationships.len());
    relationships
        .iter()
        .filter(|r| seen.insert(r.key()))
        .cloned()
        .collect()
}

/// One reconciliation pass over the committed part of a selection.
///
/// Replaces nodes/relationships with their deduplicated form when either
/// shrank and reports `NotReady`; a pass that changes nothing reports
/// `Ready`. Buffers are left alone: they are merged (and then reconciled)
/// only when committed.
pub fn reconcile_pass(selection: &mut GraphSelection) -> (Readiness, usize, usize) {
    let unique_nodes = dedupe_nodes(&selection.nodes);
    let unique_rels = dedupe_relationships(&selection.relationships);

    let removed_nodes = selection.nodes.len() - unique_nodes.len();
    let removed_rels = selection.relationships.len() - unique_rels.len();

    if removed_nodes > 0 {
        selection.nodes = unique_nodes;
    }
    if removed_rels > 0 {
        selection.relationships = unique_rels;
    }

    if removed_nodes == 0 && removed_rels == 0 {
        (Readiness::Ready, 0, 0)
    } else {
        (Readiness::NotReady, removed_nodes, removed_rels)
    }
}

/// Run passes until the selection is ready.
///
/// Dedupe is idempotent, so the second pass always converges; the bound
/// is asserted in debug builds.
pub fn reconcile(selection: &mut GraphSelection) -> ReconcileOutcome {
    let mut outcome = ReconcileOutcome::default();
    loop {
        outcome.passes += 1;
        let (readiness, n, r) = reconcile_pass(selection);
        outcome.removed_nodes += n;
        outcome.removed_relationships += r;
        if readiness.is_ready() {
            break;
        }
        debug_assert!(outcome.passes < 2, "dedupe failed to converge in two passes");
        if outcome.passes >= 2 {
            break;
        }
    }
    if outcome.removed_nodes > 0 || outcome.removed_relationships > 0 {
        log::debug!(
            "reconcile: dropped {} duplicate node(s), {} duplicate relationship(s) in {} pass(es)",
            outcome.removed_nodes,
            outcome.removed_relationships,
            outcome.passes
        );
    }
    outcome
}
