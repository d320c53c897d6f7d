pub mod dedupe;
pub mod graph;
