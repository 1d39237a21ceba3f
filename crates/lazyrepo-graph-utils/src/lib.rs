//! Additional utilities to be used with `petgraph`.
//!
//! Provides dependency-order graph walking and cycle detection for the task
//! and package graphs. Edges point from a node to the nodes it depends on, so
//! "ready" always means "all outgoing neighbors finished".

mod walker;

use std::{fmt::Display, hash::Hash};

use itertools::Itertools;
use petgraph::prelude::*;
use thiserror::Error;

pub use walker::{WalkMessage, Walker};

#[derive(Debug, Error)]
pub enum Error {
    #[error("Cyclic dependency detected:\n{cycle_lines}")]
    CyclicDependencies { cycle_lines: String },
    #[error("{0} depends on itself")]
    SelfDependency(String),
}

/// Checks the graph for dependency cycles and self-dependencies.
/// Each cycle is reported with its member nodes so a user can see the
/// offending chain.
pub fn validate_graph<N: Display + Hash + Eq>(graph: &Graph<N, ()>) -> Result<(), Error> {
    for edge in graph.edge_references() {
        if edge.source() == edge.target() {
            let node = graph
                .node_weight(edge.source())
                .expect("edge pointed to missing node");
            return Err(Error::SelfDependency(node.to_string()));
        }
    }

    let cycle_lines = petgraph::algo::tarjan_scc(graph)
        .into_iter()
        .filter(|component| component.len() > 1)
        .map(|component| {
            let members = component
                .into_iter()
                .map(|index| {
                    graph
                        .node_weight(index)
                        .expect("scc members come from the graph")
                        .to_string()
                })
                .sorted()
                .format(", ");
            format!("\t{members}")
        })
        .join("\n");

    if !cycle_lines.is_empty() {
        return Err(Error::CyclicDependencies { cycle_lines });
    }

    Ok(())
}
