// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.

use std::fmt;
use std::sync::Arc;

use st_tensor::{DType, Tensor};

use crate::bridge::OutputTypes;
use crate::error::{BridgeError, BridgeResult};
use crate::registry::{FunctionRegistry, FunctionToken, Registration};

/// Symbolic tensor produced while tracing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Symbol(pub(crate) usize);

impl Symbol {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.0)
    }
}

/// Static facts known about a symbol at trace time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValueInfo {
    pub dtype: DType,
    /// `None` when the shape is only known at run time (host-call results).
    pub shape: Option<Vec<usize>>,
}

impl ValueInfo {
    /// Whether `tensor` fits this description.
    pub fn admits(&self, tensor: &Tensor) -> bool {
        tensor.dtype() == self.dtype
            && self
                .shape
                .as_deref()
                .map_or(true, |shape| shape == tensor.shape())
    }
}

impl fmt::Display for ValueInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.shape {
            Some(shape) => write!(f, "{}{shape:?}", self.dtype),
            None => write!(f, "{}[?]", self.dtype),
        }
    }
}

/// Graph operation.
#[derive(Clone, Debug, PartialEq)]
pub enum Op {
    Input {
        index: usize,
    },
    Constant(Tensor),
    Add,
    Sub,
    Mul,
    Cast(DType),
    HostCall {
        token: FunctionToken,
        output_types: OutputTypes,
        stateful: bool,
        name: String,
    },
}

impl Op {
    pub fn name(&self) -> &'static str {
        match self {
            Op::Input { .. } => "input",
            Op::Constant(_) => "constant",
            Op::Add => "add",
            Op::Sub => "sub",
            Op::Mul => "mul",
            Op::Cast(_) => "cast",
            Op::HostCall { .. } => "host_call",
        }
    }

    /// Nodes whose execution must be preserved even when their outputs are
    /// unused or identical to another node's.
    pub fn has_side_effects(&self) -> bool {
        matches!(self, Op::HostCall { stateful: true, .. })
    }

    pub fn is_host_call(&self) -> bool {
        matches!(self, Op::HostCall { .. })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    pub op: Op,
    pub inputs: Vec<Symbol>,
    pub outputs: Vec<Symbol>,
}

/// Summary numbers for a traced graph.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GraphStats {
    pub node_count: usize,
    pub host_call_count: usize,
    pub stateful_host_call_count: usize,
}

/// Straight-line program recorded by a [`GraphBuilder`](super::GraphBuilder).
/// Nodes are stored in recording order, which is also a valid execution order.
pub struct Graph {
    pub(crate) name: String,
    pub(crate) nodes: Vec<Node>,
    pub(crate) values: Vec<ValueInfo>,
    pub(crate) inputs: Vec<Symbol>,
    pub(crate) outputs: Vec<Symbol>,
    pub(crate) registry: Arc<FunctionRegistry>,
    pub(crate) registrations: Vec<Registration>,
}

impl Graph {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn inputs(&self) -> &[Symbol] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[Symbol] {
        &self.outputs
    }

    pub fn value_info(&self, symbol: Symbol) -> BridgeResult<&ValueInfo> {
        self.values
            .get(symbol.0)
            .ok_or_else(|| BridgeError::UnknownSymbol {
                graph: self.name.clone(),
                symbol,
            })
    }

    pub fn registry(&self) -> &Arc<FunctionRegistry> {
        &self.registry
    }

    pub fn stats(&self) -> GraphStats {
        let mut stats = GraphStats {
            node_count: self.nodes.len(),
            ..GraphStats::default()
        };
        for node in &self.nodes {
            if node.op.is_host_call() {
                stats.host_call_count += 1;
            }
            if node.op.has_side_effects() {
                stats.stateful_host_call_count += 1;
            }
        }
        stats
    }
}

impl fmt::Debug for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Graph")
            .field("name", &self.name)
            .field("nodes", &self.nodes)
            .field("inputs", &self.inputs)
            .field("outputs", &self.outputs)
            .field("registrations", &self.registrations.len())
            .finish()
    }
}

impl fmt::Display for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "graph {}:", self.name)?;
        for node in &self.nodes {
            let outs: Vec<String> = node.outputs.iter().map(Symbol::to_string).collect();
            let ins: Vec<String> = node.inputs.iter().map(Symbol::to_string).collect();
            match &node.op {
                Op::Input { index } => writeln!(f, "  {} = input[{index}]", outs.join(", "))?,
                Op::Cast(dtype) => writeln!(f, "  {} = cast<{dtype}>({})", outs.join(", "), ins.join(", "))?,
                Op::HostCall {
                    token,
                    stateful,
                    name,
                    ..
                } => writeln!(
                    f,
                    "  {} = host_call[{name}, {token}, stateful={stateful}]({})",
                    outs.join(", "),
                    ins.join(", ")
                )?,
                op => writeln!(f, "  {} = {}({})", outs.join(", "), op.name(), ins.join(", "))?,
            }
        }
        let outs: Vec<String> = self.outputs.iter().map(Symbol::to_string).collect();
        write!(f, "  return {}", outs.join(", "))
    }
}
