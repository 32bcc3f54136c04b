// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.

//! Compiled functions: trace once per input signature, then replay.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use spiral_config::HostCallConfig;
use st_tensor::{DType, Tensor};
use tracing::{debug, info, warn};

use super::builder::GraphBuilder;
use super::exec::Executor;
use super::ir::{Graph, Symbol};
use super::optimize::optimize;
use crate::error::{BridgeError, BridgeResult};
use crate::registry::{global_function_registry, FunctionRegistry};

/// Tracing closure: receives a builder and one symbol per argument.
pub type TraceFn = Arc<dyn Fn(&mut GraphBuilder, &[Symbol]) -> BridgeResult<Vec<Symbol>> + Send + Sync>;

/// Dtype and shape of every argument; one traced graph exists per signature.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Signature(Vec<(DType, Vec<usize>)>);

impl Signature {
    pub fn of(args: &[Tensor]) -> Self {
        Signature(
            args.iter()
                .map(|t| (t.dtype(), t.shape().to_vec()))
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|(dtype, shape)| format!("{dtype}{shape:?}"))
            .collect();
        write!(f, "({})", parts.join(", "))
    }
}

/// A host-language function compiled into graphs on demand.
///
/// The first call with a given [`Signature`] runs the tracing closure,
/// optimises the recorded graph (unless disabled in [`HostCallConfig`]) and
/// caches it. Later calls with the same signature only execute the cached
/// graph, so host calls embedded in it run according to their `stateful`
/// flag rather than once per closure evaluation.
pub struct Function {
    name: String,
    arity: usize,
    trace_fn: TraceFn,
    config: HostCallConfig,
    registry: Arc<FunctionRegistry>,
    cache: Mutex<HashMap<Signature, Arc<Graph>>>,
    traces: AtomicUsize,
}

impl Function {
    pub fn new<F>(name: impl Into<String>, arity: usize, f: F) -> Self
    where
        F: Fn(&mut GraphBuilder, &[Symbol]) -> BridgeResult<Vec<Symbol>> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            arity,
            trace_fn: Arc::new(f),
            config: spiral_config::config().clone(),
            registry: global_function_registry(),
            cache: Mutex::new(HashMap::new()),
            traces: AtomicUsize::new(0),
        }
    }

    /// Replaces the process configuration for this function only. Graphs
    /// traced earlier are discarded.
    pub fn with_config(mut self, config: HostCallConfig) -> Self {
        self.config = config;
        self.cache
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self
    }

    /// Registers traced host functions in `registry` instead of the global one.
    pub fn with_registry(mut self, registry: Arc<FunctionRegistry>) -> Self {
        self.registry = registry;
        self.cache
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arity(&self) -> usize {
        self.arity
    }

    pub fn config(&self) -> &HostCallConfig {
        &self.config
    }

    /// Number of times the tracing closure has run.
    pub fn trace_count(&self) -> usize {
        self.traces.load(Ordering::Relaxed)
    }

    /// Executes the graph for `args`, tracing it first if needed.
    pub fn call(&self, args: &[Tensor]) -> BridgeResult<Vec<Tensor>> {
        let graph = self.concrete(args)?;
        Executor::new(&graph)
            .catch_panics(self.config.catch_panics)
            .run(args)
    }

    /// Returns the graph that [`Function::call`] would execute for `args`.
    pub fn concrete(&self, args: &[Tensor]) -> BridgeResult<Arc<Graph>> {
        if args.len() != self.arity {
            return Err(BridgeError::Signature {
                name: self.name.clone(),
                expected: self.arity,
                got: args.len(),
            });
        }
        let signature = Signature::of(args);
        if let Some(graph) = self.lock_cache().get(&signature) {
            return Ok(Arc::clone(graph));
        }

        // Trace without holding the lock so the closure may call other
        // compiled functions, including this one.
        let graph = Arc::new(self.trace(&signature)?);
        let mut cache = self.lock_cache();
        Ok(Arc::clone(cache.entry(signature).or_insert(graph)))
    }

    fn trace(&self, signature: &Signature) -> BridgeResult<Graph> {
        let traces = self.traces.fetch_add(1, Ordering::Relaxed) + 1;
        if traces > self.config.retrace_warning_threshold {
            warn!(
                function = %self.name,
                traces,
                %signature,
                "compiled function retraced; vary argument dtypes or shapes less often"
            );
        }

        let mut builder = GraphBuilder::with_registry(self.name.clone(), Arc::clone(&self.registry));
        let inputs: Vec<Symbol> = signature
            .0
            .iter()
            .map(|(dtype, shape)| builder.input(*dtype, shape))
            .collect();
        let outputs = (self.trace_fn)(&mut builder, &inputs)?;
        let mut graph = builder.finish(outputs)?;
        let recorded = graph.nodes.len();

        if self.config.optimize {
            let report = optimize(&mut graph);
            debug!(
                function = %self.name,
                merged = report.merged,
                removed = report.removed,
                "optimised traced graph"
            );
        }

        let stats = graph.stats();
        info!(
            function = %self.name,
            %signature,
            recorded,
            nodes = stats.node_count,
            host_calls = stats.host_call_count,
            "traced compiled function"
        );
        Ok(graph)
    }

    fn lock_cache(&self) -> std::sync::MutexGuard<'_, HashMap<Signature, Arc<Graph>>> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .field("traces", &self.trace_count())
            .field("config", &self.config)
            .finish()
    }
}
