// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.

//! Graph rewrites applied after tracing.
//!
//! Both passes treat stateful host calls as opaque effects: they are never
//! merged with an identical call and never removed for lack of consumers.
//! Stateless host calls are ordinary pure nodes here, which is what lets
//! repeated identical calls collapse into one execution.

use std::collections::{HashMap, HashSet};

use super::ir::{Graph, Node, Op, Symbol};

/// Counts reported by [`optimize`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct OptimizeReport {
    pub merged: usize,
    pub removed: usize,
}

/// Runs common-subexpression elimination followed by dead-node elimination.
pub fn optimize(graph: &mut Graph) -> OptimizeReport {
    let merged = eliminate_common_subexpressions(graph);
    let removed = eliminate_dead_nodes(graph);
    OptimizeReport { merged, removed }
}

/// Folds every node into the first earlier node with the same op and inputs.
/// Returns how many nodes were folded away.
pub fn eliminate_common_subexpressions(graph: &mut Graph) -> usize {
    let mut replacements: HashMap<Symbol, Symbol> = HashMap::new();
    let mut kept: Vec<Node> = Vec::with_capacity(graph.nodes.len());
    let mut merged = 0;

    for mut node in std::mem::take(&mut graph.nodes) {
        for input in node.inputs.iter_mut() {
            if let Some(&canonical) = replacements.get(input) {
                *input = canonical;
            }
        }
        if is_mergeable(&node.op) {
            if let Some(existing) = kept
                .iter()
                .find(|k| k.op == node.op && k.inputs == node.inputs)
            {
                for (&dup, &canonical) in node.outputs.iter().zip(&existing.outputs) {
                    replacements.insert(dup, canonical);
                }
                merged += 1;
                continue;
            }
        }
        kept.push(node);
    }

    for output in graph.outputs.iter_mut() {
        if let Some(&canonical) = replacements.get(output) {
            *output = canonical;
        }
    }
    graph.nodes = kept;
    merged
}

/// Drops nodes that feed no graph output. Inputs and side-effecting nodes
/// always stay. Returns how many nodes were dropped.
pub fn eliminate_dead_nodes(graph: &mut Graph) -> usize {
    let mut needed: HashSet<Symbol> = graph.outputs.iter().copied().collect();
    let mut keep = vec![false; graph.nodes.len()];

    for (i, node) in graph.nodes.iter().enumerate().rev() {
        let live = matches!(node.op, Op::Input { .. })
            || node.op.has_side_effects()
            || node.outputs.iter().any(|out| needed.contains(out));
        if live {
            keep[i] = true;
            needed.extend(node.inputs.iter().copied());
        }
    }

    let before = graph.nodes.len();
    let mut flags = keep.into_iter();
    graph.nodes.retain(|_| flags.next().unwrap_or(true));
    before - graph.nodes.len()
}

fn is_mergeable(op: &Op) -> bool {
    !matches!(op, Op::Input { .. }) && !op.has_side_effects()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::{HostCall, HostReturn};
    use crate::graph::GraphBuilder;
    use crate::host::HostValue;
    use crate::registry::FunctionRegistry;
    use st_tensor::DType;
    use std::sync::Arc;

    fn plus(stateful: bool) -> HostCall {
        HostCall::host(
            |args: &[HostValue]| Ok(HostReturn::Single(args[0].add(&args[1])?)),
            DType::I32,
        )
        .stateful(stateful)
    }

    fn repeated(call: &HostCall, n: usize) -> Graph {
        let mut g = GraphBuilder::with_registry("repeat", Arc::new(FunctionRegistry::new()));
        let a = g.input(DType::I32, &[]);
        let b = g.input(DType::I32, &[]);
        let mut acc = g.constant(0i32);
        for _ in 0..n {
            let out = g.host_call(call, &[a, b]).unwrap();
            acc = g.add(acc, out[0]).unwrap();
        }
        g.finish(vec![acc]).unwrap()
    }

    #[test]
    fn stateless_calls_collapse() {
        let mut graph = repeated(&plus(false), 4);
        assert_eq!(graph.stats().host_call_count, 4);
        let merged = eliminate_common_subexpressions(&mut graph);
        assert_eq!(merged, 3);
        assert_eq!(graph.stats().host_call_count, 1);
    }

    #[test]
    fn stateful_calls_survive_both_passes() {
        let mut graph = repeated(&plus(true), 4);
        let report = optimize(&mut graph);
        assert_eq!(report, OptimizeReport::default());
        assert_eq!(graph.stats().stateful_host_call_count, 4);
    }

    #[test]
    fn unused_stateless_nodes_are_dropped() {
        let call = plus(false);
        let mut g = GraphBuilder::with_registry("dead", Arc::new(FunctionRegistry::new()));
        let a = g.input(DType::I32, &[]);
        let b = g.input(DType::I32, &[]);
        g.host_call(&call, &[a, b]).unwrap();
        let unused = g.constant(5i32);
        g.mul(unused, unused).unwrap();
        let mut graph = g.finish(vec![a]).unwrap();

        let removed = eliminate_dead_nodes(&mut graph);
        assert_eq!(removed, 3);
        assert_eq!(graph.nodes().len(), 2);
        assert!(graph
            .nodes()
            .iter()
            .all(|node| matches!(node.op, Op::Input { .. })));
    }

    #[test]
    fn unused_stateful_call_is_kept() {
        let call = HostCall::host(|_: &[HostValue]| Ok(HostReturn::Unit), Vec::<DType>::new());
        let mut g = GraphBuilder::with_registry("effect", Arc::new(FunctionRegistry::new()));
        g.host_call(&call, &[]).unwrap();
        let mut graph = g.finish(Vec::new()).unwrap();
        assert_eq!(eliminate_dead_nodes(&mut graph), 0);
        assert_eq!(graph.stats().stateful_host_call_count, 1);
    }

    #[test]
    fn merged_outputs_are_rewired() {
        let mut g = GraphBuilder::with_registry("cse", Arc::new(FunctionRegistry::new()));
        let a = g.input(DType::F64, &[]);
        let x = g.mul(a, a).unwrap();
        let y = g.mul(a, a).unwrap();
        let z = g.sub(x, y).unwrap();
        let mut graph = g.finish(vec![y, z]).unwrap();
        assert_eq!(eliminate_common_subexpressions(&mut graph), 1);
        assert_eq!(graph.outputs()[0], x);
        let sub = graph.nodes().last().unwrap();
        assert_eq!(sub.inputs, vec![x, x]);
    }
}
