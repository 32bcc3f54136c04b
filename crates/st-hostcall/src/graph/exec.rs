// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.

use std::collections::HashMap;

use st_tensor::Tensor;
use tracing::debug_span;

use super::ir::{Graph, Node, Op, Symbol};
use crate::bridge::{execute, CallSite};
use crate::error::{BridgeError, BridgeResult};

/// Runs a graph's nodes in recording order.
pub struct Executor<'g> {
    graph: &'g Graph,
    catch_panics: bool,
}

impl<'g> Executor<'g> {
    pub fn new(graph: &'g Graph) -> Self {
        Self {
            graph,
            catch_panics: spiral_config::config().catch_panics,
        }
    }

    pub fn catch_panics(mut self, catch_panics: bool) -> Self {
        self.catch_panics = catch_panics;
        self
    }

    pub fn run(&self, args: &[Tensor]) -> BridgeResult<Vec<Tensor>> {
        let graph = self.graph;
        if args.len() != graph.inputs.len() {
            return Err(BridgeError::Signature {
                name: graph.name.clone(),
                expected: graph.inputs.len(),
                got: args.len(),
            });
        }

        for (index, (symbol, arg)) in graph.inputs.iter().zip(args).enumerate() {
            let info = graph.value_info(*symbol)?;
            if !info.admits(arg) {
                return Err(BridgeError::ArgumentMismatch {
                    name: graph.name.clone(),
                    index,
                    expected: info.to_string(),
                    got: format!("{}{:?}", arg.dtype(), arg.shape()),
                });
            }
        }

        let span = debug_span!("graph_run", graph = %graph.name, nodes = graph.nodes.len());
        let _enter = span.enter();

        let mut env: HashMap<Symbol, Tensor> = HashMap::with_capacity(graph.values.len());
        for node in &graph.nodes {
            let inputs = node
                .inputs
                .iter()
                .map(|symbol| self.lookup(&env, *symbol))
                .collect::<BridgeResult<Vec<_>>>()?;
            let outputs = self.eval(node, &inputs, args)?;
            env.extend(node.outputs.iter().copied().zip(outputs));
        }

        graph
            .outputs
            .iter()
            .map(|symbol| self.lookup(&env, *symbol))
            .collect()
    }

    fn eval(&self, node: &Node, inputs: &[Tensor], args: &[Tensor]) -> BridgeResult<Vec<Tensor>> {
        let out = match &node.op {
            Op::Input { index } => {
                let arg = args.get(*index).ok_or_else(|| BridgeError::Signature {
                    name: self.graph.name.clone(),
                    expected: index + 1,
                    got: args.len(),
                })?;
                vec![arg.clone()]
            }
            Op::Constant(tensor) => vec![tensor.clone()],
            Op::Add => {
                let [a, b] = binary(&node.op, inputs)?;
                vec![a.add(b)?]
            }
            Op::Sub => {
                let [a, b] = binary(&node.op, inputs)?;
                vec![a.sub(b)?]
            }
            Op::Mul => {
                let [a, b] = binary(&node.op, inputs)?;
                vec![a.mul(b)?]
            }
            Op::Cast(dtype) => match inputs {
                [value] => vec![value.cast(*dtype)],
                _ => {
                    return Err(BridgeError::MalformedNode {
                        op: node.op.name(),
                        expected: 1,
                        got: inputs.len(),
                    })
                }
            },
            Op::HostCall {
                token,
                output_types,
                stateful,
                name,
            } => {
                let function = self
                    .graph
                    .registry
                    .get(*token)
                    .ok_or(BridgeError::UnknownFunction { token: *token })?;
                let site = CallSite {
                    name: name.as_str(),
                    token: Some(*token),
                    stateful: *stateful,
                };
                execute(&function, output_types, &site, inputs, self.catch_panics)?
            }
        };
        Ok(out)
    }

    fn lookup(&self, env: &HashMap<Symbol, Tensor>, symbol: Symbol) -> BridgeResult<Tensor> {
        env.get(&symbol)
            .cloned()
            .ok_or_else(|| BridgeError::UnknownSymbol {
                graph: self.graph.name.clone(),
                symbol,
            })
    }
}

fn binary<'a>(op: &Op, inputs: &'a [Tensor]) -> BridgeResult<[&'a Tensor; 2]> {
    match inputs {
        [a, b] => Ok([a, b]),
        _ => Err(BridgeError::MalformedNode {
            op: op.name(),
            expected: 2,
            got: inputs.len(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::{HostCall, HostReturn};
    use crate::graph::GraphBuilder;
    use crate::host::HostValue;
    use crate::registry::FunctionRegistry;
    use st_tensor::DType;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn runs_arithmetic_and_host_calls() {
        let mut g = GraphBuilder::with_registry("arith", Arc::new(FunctionRegistry::new()));
        let a = g.input(DType::I32, &[]);
        let b = g.input(DType::I32, &[]);
        let double = HostCall::host(
            |args: &[HostValue]| Ok(HostReturn::Single(args[0].mul(&HostValue::from(2i64))?)),
            DType::I32,
        );
        let doubled = g.host_call(&double, &[a]).unwrap();
        let sum = g.add(doubled[0], b).unwrap();
        let as_float = g.cast(sum, DType::F64).unwrap();
        let graph = g.finish(vec![sum, as_float]).unwrap();

        let out = Executor::new(&graph)
            .run(&[Tensor::scalar(5i32), Tensor::scalar(1i32)])
            .unwrap();
        assert_eq!(out, vec![Tensor::scalar(11i32), Tensor::scalar(11.0f64)]);
    }

    #[test]
    fn argument_count_is_checked() {
        let mut g = GraphBuilder::with_registry("args", Arc::new(FunctionRegistry::new()));
        let a = g.input(DType::I32, &[]);
        let graph = g.finish(vec![a]).unwrap();
        let err = Executor::new(&graph).run(&[]).unwrap_err();
        assert!(matches!(err, BridgeError::Signature { expected: 1, got: 0, .. }));
    }

    #[test]
    fn argument_dtype_and_shape_are_checked() {
        let mut g = GraphBuilder::with_registry("typed", Arc::new(FunctionRegistry::new()));
        let a = g.input(DType::I32, &[2]);
        let graph = g.finish(vec![a]).unwrap();
        let exec = Executor::new(&graph);

        let err = exec.run(&[Tensor::from_vec(&[2], vec![1.0f32, 2.0]).unwrap()]).unwrap_err();
        match err {
            BridgeError::ArgumentMismatch {
                index,
                expected,
                got,
                ..
            } => {
                assert_eq!(index, 0);
                assert_eq!(expected, "i32[2]");
                assert_eq!(got, "f32[2]");
            }
            other => panic!("unexpected error: {other}"),
        }

        let err = exec.run(&[Tensor::scalar(1i32)]).unwrap_err();
        assert!(matches!(err, BridgeError::ArgumentMismatch { .. }));

        let ok = exec.run(&[Tensor::from_vec(&[2], vec![4i32, 5]).unwrap()]).unwrap();
        assert_eq!(ok, vec![Tensor::from_vec(&[2], vec![4i32, 5]).unwrap()]);
    }

    #[test]
    fn unregistered_token_fails() {
        let registry = Arc::new(FunctionRegistry::new());
        let mut g = GraphBuilder::with_registry("gone", Arc::clone(&registry));
        let call = HostCall::host(|_: &[HostValue]| Ok(HostReturn::Unit), Vec::<DType>::new());
        g.host_call(&call, &[]).unwrap();
        let graph = g.finish(Vec::new()).unwrap();
        for token in registry.tokens() {
            registry.unregister(token);
        }
        let err = Executor::new(&graph).run(&[]).unwrap_err();
        assert!(matches!(err, BridgeError::UnknownFunction { .. }));
    }

    #[test]
    fn host_calls_run_in_recording_order() {
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let counter = Arc::new(AtomicUsize::new(0));
        let mut g = GraphBuilder::with_registry("order", Arc::new(FunctionRegistry::new()));
        for label in 0..3i64 {
            let seen = Arc::clone(&seen);
            let counter = Arc::clone(&counter);
            let call = HostCall::host(
                move |_: &[HostValue]| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    seen.lock().unwrap().push(label);
                    Ok(HostReturn::Unit)
                },
                Vec::<DType>::new(),
            );
            g.host_call(&call, &[]).unwrap();
        }
        let graph = g.finish(Vec::new()).unwrap();
        Executor::new(&graph).run(&[]).unwrap();
        Executor::new(&graph).run(&[]).unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 6);
        assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2, 0, 1, 2]);
    }
}
