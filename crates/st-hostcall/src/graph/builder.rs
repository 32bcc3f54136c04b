// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.

use std::collections::HashMap;
use std::sync::Arc;

use st_tensor::broadcast::broadcast_shape;
use st_tensor::{DType, Tensor, TensorError};
use tracing::trace;

use super::ir::{Graph, Node, Op, Symbol, ValueInfo};
use crate::bridge::HostCall;
use crate::error::{BridgeError, BridgeResult};
use crate::registry::{global_function_registry, FunctionRegistry, FunctionToken, Registration};

/// Records operations on [`Symbol`]s into a [`Graph`].
pub struct GraphBuilder {
    name: String,
    nodes: Vec<Node>,
    values: Vec<ValueInfo>,
    inputs: Vec<Symbol>,
    registry: Arc<FunctionRegistry>,
    registrations: Vec<Registration>,
    tokens: HashMap<usize, FunctionToken>,
}

impl GraphBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_registry(name, global_function_registry())
    }

    pub fn with_registry(name: impl Into<String>, registry: Arc<FunctionRegistry>) -> Self {
        Self {
            name: name.into(),
            nodes: Vec::new(),
            values: Vec::new(),
            inputs: Vec::new(),
            registry,
            registrations: Vec::new(),
            tokens: HashMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn info(&self, symbol: Symbol) -> BridgeResult<&ValueInfo> {
        self.values
            .get(symbol.0)
            .ok_or_else(|| BridgeError::UnknownSymbol {
                graph: self.name.clone(),
                symbol,
            })
    }

    pub fn dtype(&self, symbol: Symbol) -> BridgeResult<DType> {
        Ok(self.info(symbol)?.dtype)
    }

    /// Declares the next positional argument of the graph.
    pub fn input(&mut self, dtype: DType, shape: &[usize]) -> Symbol {
        let index = self.inputs.len();
        let symbol = self.push(
            Op::Input { index },
            Vec::new(),
            vec![ValueInfo {
                dtype,
                shape: Some(shape.to_vec()),
            }],
        )[0];
        self.inputs.push(symbol);
        symbol
    }

    pub fn constant(&mut self, value: impl Into<Tensor>) -> Symbol {
        let tensor = value.into();
        let info = ValueInfo {
            dtype: tensor.dtype(),
            shape: Some(tensor.shape().to_vec()),
        };
        self.push(Op::Constant(tensor), Vec::new(), vec![info])[0]
    }

    pub fn add(&mut self, left: Symbol, right: Symbol) -> BridgeResult<Symbol> {
        self.binary(Op::Add, left, right)
    }

    pub fn sub(&mut self, left: Symbol, right: Symbol) -> BridgeResult<Symbol> {
        self.binary(Op::Sub, left, right)
    }

    pub fn mul(&mut self, left: Symbol, right: Symbol) -> BridgeResult<Symbol> {
        self.binary(Op::Mul, left, right)
    }

    pub fn cast(&mut self, value: Symbol, dtype: DType) -> BridgeResult<Symbol> {
        let shape = self.info(value)?.shape.clone();
        Ok(self.push(Op::Cast(dtype), vec![value], vec![ValueInfo { dtype, shape }])[0])
    }

    /// Embeds `call` as a node consuming `args`. Returns one symbol per
    /// declared output dtype, each with a run-time-only shape.
    ///
    /// Tracing the same function twice reuses one registry token, so two
    /// stateless calls with the same arguments are candidates for merging.
    pub fn host_call(&mut self, call: &HostCall, args: &[Symbol]) -> BridgeResult<Vec<Symbol>> {
        for &arg in args {
            self.info(arg)?;
        }
        let function = call.function();
        let token = match self.tokens.get(&function.key()) {
            Some(&token) => token,
            None => {
                let registration = self.registry.register_scoped(function.clone());
                let token = registration.token();
                self.registrations.push(registration);
                self.tokens.insert(function.key(), token);
                token
            }
        };
        trace!(graph = %self.name, %token, stateful = call.is_stateful(), "tracing host call");
        let infos = call
            .output_types()
            .dtypes()
            .iter()
            .map(|&dtype| ValueInfo { dtype, shape: None })
            .collect();
        let op = Op::HostCall {
            token,
            output_types: call.output_types().clone(),
            stateful: call.is_stateful(),
            name: call.name().to_string(),
        };
        Ok(self.push(op, args.to_vec(), infos))
    }

    /// Seals the graph with `outputs` as its results.
    pub fn finish(self, outputs: Vec<Symbol>) -> BridgeResult<Graph> {
        for &symbol in &outputs {
            self.info(symbol)?;
        }
        Ok(Graph {
            name: self.name,
            nodes: self.nodes,
            values: self.values,
            inputs: self.inputs,
            outputs,
            registry: self.registry,
            registrations: self.registrations,
        })
    }

    fn binary(&mut self, op: Op, left: Symbol, right: Symbol) -> BridgeResult<Symbol> {
        let l = self.info(left)?;
        let r = self.info(right)?;
        if l.dtype != r.dtype {
            return Err(TensorError::DTypeMismatch {
                expected: l.dtype,
                got: r.dtype,
            }
            .into());
        }
        if l.dtype == DType::Bool {
            return Err(TensorError::UnsupportedOperation {
                op: op.name(),
                dtype: DType::Bool,
            }
            .into());
        }
        let shape = match (&l.shape, &r.shape) {
            (Some(ls), Some(rs)) => Some(broadcast_shape(ls, rs).ok_or_else(|| {
                TensorError::IncompatibleShapes {
                    left: ls.clone(),
                    right: rs.clone(),
                }
            })?),
            _ => None,
        };
        let info = ValueInfo {
            dtype: l.dtype,
            shape,
        };
        Ok(self.push(op, vec![left, right], vec![info])[0])
    }

    fn push(&mut self, op: Op, inputs: Vec<Symbol>, infos: Vec<ValueInfo>) -> Vec<Symbol> {
        let outputs: Vec<Symbol> = infos
            .into_iter()
            .map(|info| {
                self.values.push(info);
                Symbol(self.values.len() - 1)
            })
            .collect();
        self.nodes.push(Node {
            op,
            inputs,
            outputs: outputs.clone(),
        });
        outputs
    }
}
