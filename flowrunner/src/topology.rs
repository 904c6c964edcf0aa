//! Topology validation, composite expansion, and sample-rate propagation
//! for a flow graph.

use std::collections::HashMap;

use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};

use crate::block::NodeId;
use crate::error::{FlowError, Result};
use crate::graph::{EdgeSpec, Graph, Registered};

/// The validated, expanded, rate-resolved view of a graph that the
/// engine allocates rings and spawns workers from.
pub(crate) struct CompiledGraph {
    pub order: Vec<NodeId>,
    pub edges: Vec<EdgeSpec>,
}

pub(crate) fn compile(graph: &mut Graph) -> Result<CompiledGraph> {
    expand_composites(graph)?;
    remap_aliased_edges(graph);
    validate_ports(graph)?;
    let order = toposort_blocks(graph)?;
    propagate_rates(graph, &order)?;

    Ok(CompiledGraph {
        order,
        edges: graph.edges.clone(),
    })
}

/// Repeatedly expands any registered composite until none remain,
/// letting a composite's `connect` callback itself register further
/// composites (nested composition).
fn expand_composites(graph: &mut Graph) -> Result<()> {
    loop {
        let pending: Vec<NodeId> = graph
            .nodes
            .iter()
            .filter(|(_, reg)| matches!(reg, Registered::Composite(_)))
            .map(|(id, _)| *id)
            .collect();
        if pending.is_empty() {
            break;
        }
        for composite_id in pending {
            let registered = graph
                .nodes
                .remove(&composite_id)
                .expect("composite id came from graph.nodes");
            let composite = match registered {
                Registered::Composite(c) => c,
                Registered::Block(b) => {
                    // Raced with itself: put it back, nothing to expand.
                    graph.nodes.insert(composite_id, Registered::Block(b));
                    continue;
                }
            };
            graph.order.retain(|id| *id != composite_id);
            let mut builder = crate::block::CompositeBuilder {
                graph,
                composite_id,
            };
            composite
                .expand(&mut builder)
                .map_err(|e| FlowError::Topology(format!("composite connect() failed: {e}")))?;
        }
    }
    Ok(())
}

/// Rewrites edges that still reference a composite's boundary port to
/// reference the aliased child port instead. Iterates to a fixed point
/// to support nested composites aliasing through one another.
fn remap_aliased_edges(graph: &mut Graph) {
    for edge in &mut graph.edges {
        for _ in 0..graph.aliases.len() + 1 {
            if let Some(&(child, child_port)) = graph.aliases.get(&(edge.src, edge.src_port)) {
                edge.src = child;
                edge.src_port = child_port;
            } else {
                break;
            }
        }
        for _ in 0..graph.aliases.len() + 1 {
            if let Some(&(child, child_port)) = graph.aliases.get(&(edge.dst, edge.dst_port)) {
                edge.dst = child;
                edge.dst_port = child_port;
            } else {
                break;
            }
        }
    }
}

fn validate_ports(graph: &Graph) -> Result<()> {
    for id in &graph.order {
        let block = match graph.nodes.get(id) {
            Some(Registered::Block(b)) => b,
            _ => continue,
        };
        let shape = block.shape();

        for input in shape.inputs {
            let matching: Vec<&EdgeSpec> = graph
                .edges
                .iter()
                .filter(|e| e.dst == *id && e.dst_port == input.name)
                .collect();
            match matching.len() {
                0 => {
                    return Err(FlowError::Topology(format!(
                        "block '{}' input port '{}' is not connected",
                        shape.type_name, input.name
                    )))
                }
                1 => {}
                _ => {
                    return Err(FlowError::Topology(format!(
                        "block '{}' input port '{}' is connected by {} edges, expected exactly one",
                        shape.type_name,
                        input.name,
                        matching.len()
                    )))
                }
            }
        }

        for edge in graph.edges.iter().filter(|e| e.src == *id) {
            if !shape.outputs.iter().any(|o| o.name == edge.src_port) {
                return Err(FlowError::Topology(format!(
                    "block '{}' has no output port named '{}'",
                    shape.type_name, edge.src_port
                )));
            }
        }
        for edge in graph.edges.iter().filter(|e| e.dst == *id) {
            if !shape.inputs.iter().any(|i| i.name == edge.dst_port) {
                return Err(FlowError::Topology(format!(
                    "block '{}' has no input port named '{}'",
                    shape.type_name, edge.dst_port
                )));
            }
        }
    }

    for edge in &graph.edges {
        let src_shape = match graph.nodes.get(&edge.src) {
            Some(Registered::Block(b)) => b.shape(),
            _ => {
                return Err(FlowError::Topology(
                    "edge references an unknown or unexpanded source block".into(),
                ))
            }
        };
        let dst_shape = match graph.nodes.get(&edge.dst) {
            Some(Registered::Block(b)) => b.shape(),
            _ => {
                return Err(FlowError::Topology(
                    "edge references an unknown or unexpanded destination block".into(),
                ))
            }
        };
        let src_port = src_shape
            .outputs
            .iter()
            .find(|p| p.name == edge.src_port)
            .expect("checked above");
        let dst_port = dst_shape
            .inputs
            .iter()
            .find(|p| p.name == edge.dst_port)
            .expect("checked above");
        if !src_port.element.matches(&dst_port.element) {
            return Err(FlowError::Topology(format!(
                "type mismatch on edge {}.{} -> {}.{}: {} vs {}",
                src_shape.type_name,
                edge.src_port,
                dst_shape.type_name,
                edge.dst_port,
                src_port.element.type_name,
                dst_port.element.type_name
            )));
        }
    }

    Ok(())
}

fn toposort_blocks(graph: &Graph) -> Result<Vec<NodeId>> {
    let mut petgraph_index: HashMap<NodeId, NodeIndex> = HashMap::new();
    let mut dag: DiGraph<NodeId, ()> = DiGraph::new();
    for id in &graph.order {
        if matches!(graph.nodes.get(id), Some(Registered::Block(_))) {
            petgraph_index.insert(*id, dag.add_node(*id));
        }
    }
    for edge in &graph.edges {
        if let (Some(&src), Some(&dst)) = (petgraph_index.get(&edge.src), petgraph_index.get(&edge.dst)) {
            dag.add_edge(src, dst, ());
        }
    }
    toposort(&dag, None)
        .map(|indices| indices.into_iter().map(|idx| dag[idx]).collect())
        .map_err(|_| FlowError::Topology("graph contains a cycle".into()))
}

fn propagate_rates(graph: &mut Graph, order: &[NodeId]) -> Result<()> {
    let mut resolved: HashMap<NodeId, f64> = HashMap::new();

    for id in order {
        // Edges touching this block are read before the mutable borrow
        // of the block itself below.
        let shape = match graph.nodes.get(id) {
            Some(Registered::Block(b)) => b.shape(),
            _ => continue,
        };

        let incoming = if shape.inputs.is_empty() {
            None
        } else {
            let first_port = shape.inputs[0].name;
            let first_edge = graph
                .edges
                .iter()
                .find(|e| e.dst == *id && e.dst_port == first_port)
                .expect("validate_ports already required exactly one edge per input");
            let rate = *resolved
                .get(&first_edge.src)
                .expect("topological order guarantees upstream rate is resolved");

            for input in &shape.inputs[1..] {
                let edge = graph
                    .edges
                    .iter()
                    .find(|e| e.dst == *id && e.dst_port == input.name)
                    .expect("validate_ports already required exactly one edge per input");
                let other = *resolved
                    .get(&edge.src)
                    .expect("topological order guarantees upstream rate is resolved");
                if (other - rate).abs() > f64::EPSILON {
                    return Err(FlowError::Topology(format!(
                        "block '{}' merges inputs at mismatched rates: {} on '{}' vs {} on '{}'",
                        shape.type_name, rate, first_port, other, input.name
                    )));
                }
            }
            Some(rate)
        };

        let block = match graph.nodes.get_mut(id) {
            Some(Registered::Block(b)) => b,
            _ => continue,
        };
        let rate = match (block.shape().set_rate, incoming) {
            (Some(set_rate), Some(r)) => set_rate(block.self_ptr(), r),
            (Some(set_rate), None) => set_rate(block.self_ptr(), 0.0),
            (None, Some(r)) => r,
            (None, None) => 0.0,
        };

        block.set_rate(rate);
        resolved.insert(*id, rate);
    }

    Ok(())
}
