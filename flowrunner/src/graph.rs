//! The flow-graph: block registry, edges, and the public programmer
//! facing API.

use std::any::Any;
use std::collections::HashMap;

use crate::block::{Block, BlockObject, CompositeObject, Composite, NodeId};
use crate::engine::control::ControlMsg;
use crate::engine::worker::WorkerOutcome;
use crate::error::{FlowError, Result};

/// Options accepted by [`Graph::new`].
#[derive(Debug, Clone, Copy, Default)]
pub struct GraphOptions {
    pub debug: bool,
}

pub(crate) enum Registered {
    Block(Box<dyn BlockObject>),
    Composite(Box<dyn CompositeObject>),
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct EdgeSpec {
    pub src: NodeId,
    pub src_port: &'static str,
    pub dst: NodeId,
    pub dst_port: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GraphState {
    Idle,
    Running,
    Stopped,
}

pub struct Graph {
    pub(crate) options: GraphOptions,
    pub(crate) nodes: HashMap<NodeId, Registered>,
    pub(crate) order: Vec<NodeId>,
    pub(crate) edges: Vec<EdgeSpec>,
    pub(crate) aliases: HashMap<(NodeId, &'static str), (NodeId, &'static str)>,
    state: GraphState,
    control_handles: HashMap<NodeId, crossbeam_channel::Sender<ControlMsg>>,
    join_handles: Vec<std::thread::JoinHandle<WorkerOutcome>>,
    last_run_ok: bool,
}

impl Graph {
    pub fn new(options: GraphOptions) -> Self {
        crate::platform::Platform::get().note_debug(options.debug);
        Self {
            options,
            nodes: HashMap::new(),
            order: Vec::new(),
            edges: Vec::new(),
            aliases: HashMap::new(),
            state: GraphState::Idle,
            control_handles: HashMap::new(),
            join_handles: Vec::new(),
            last_run_ok: true,
        }
    }

    pub fn debug(&self) -> bool {
        self.options.debug
    }

    /// Register a block, returning the handle used by every other graph
    /// API. Ownership transfers to the graph (blocks must be `'static`
    /// for the engine to hand them to a worker thread — see DESIGN.md).
    pub fn add<T: Block>(&mut self, block: T) -> NodeId {
        let mut boxed: Box<dyn BlockObject> = Box::new(block);
        let id = boxed.node_id();
        self.nodes.insert(id, Registered::Block(boxed));
        self.order.push(id);
        id
    }

    /// Register a composite. Its `connect` callback runs once, during
    /// [`Graph::start`]'s validation pass.
    pub fn add_composite<C: Composite>(&mut self, composite: C) -> NodeId {
        let boxed = Box::new(composite);
        let id = NodeId(Box::as_ref(&boxed) as *const C as *const () as usize);
        self.nodes
            .insert(id, Registered::Composite(boxed as Box<dyn CompositeObject>));
        self.order.push(id);
        id
    }

    /// Shorthand connect: valid only when `src` has exactly one output
    /// port and `dst` has exactly one input port.
    pub fn connect(&mut self, src: NodeId, dst: NodeId) -> Result<()> {
        let src_port = self.sole_port(src, true)?;
        let dst_port = self.sole_port(dst, false)?;
        self.connect_port(src, src_port, dst, dst_port);
        Ok(())
    }

    fn sole_port(&self, node: NodeId, output: bool) -> Result<&'static str> {
        let ports = match self.nodes.get(&node) {
            Some(Registered::Block(b)) => {
                if output {
                    b.shape().outputs
                } else {
                    b.shape().inputs
                }
            }
            Some(Registered::Composite(c)) => {
                // Boundary ports stand in for shape ports before expansion.
                return if output {
                    c.boundary_outputs()
                        .first()
                        .copied()
                        .ok_or_else(|| FlowError::Topology("composite has no outputs".into()))
                } else {
                    c.boundary_inputs()
                        .first()
                        .copied()
                        .ok_or_else(|| FlowError::Topology("composite has no inputs".into()))
                };
            }
            None => return Err(FlowError::Topology("unknown block handle".into())),
        };
        if ports.len() != 1 {
            return Err(FlowError::Topology(format!(
                "Graph::connect shorthand requires exactly one {} port, found {}",
                if output { "output" } else { "input" },
                ports.len()
            )));
        }
        Ok(ports[0].name)
    }

    pub fn connect_port(
        &mut self,
        src: NodeId,
        src_port: &'static str,
        dst: NodeId,
        dst_port: &'static str,
    ) {
        self.edges.push(EdgeSpec {
            src,
            src_port,
            dst,
            dst_port,
        });
    }

    /// Alias a composite's boundary port onto a child port. Only
    /// meaningful when called from within that composite's `connect`
    /// callback; see [`crate::block::CompositeBuilder::alias`].
    pub fn alias(
        &mut self,
        composite: NodeId,
        boundary_port: &'static str,
        child: NodeId,
        child_port: &'static str,
    ) {
        self.register_alias(composite, boundary_port, child, child_port);
    }

    pub(crate) fn register_alias(
        &mut self,
        composite: NodeId,
        boundary_port: &'static str,
        child: NodeId,
        child_port: &'static str,
    ) {
        self.aliases
            .insert((composite, boundary_port), (child, child_port));
    }

    /// Validate, expand composites, resolve rates, allocate rings, and
    /// spawn one worker thread per block.
    pub fn start(&mut self) -> Result<()> {
        tracing::info!("validating flow graph");
        let compiled = crate::topology::compile(self)?;
        tracing::info!(
            blocks = compiled.order.len(),
            edges = compiled.edges.len(),
            "flow graph validated, starting workers"
        );
        let (handles, controls) = crate::engine::start(self, &compiled)?;
        self.join_handles = handles;
        self.control_handles = controls;
        self.state = GraphState::Running;
        Ok(())
    }

    /// Join every worker thread. Returns `true` iff no block reported a
    /// process or initialization error.
    pub fn wait(&mut self) -> bool {
        let mut ok = true;
        for handle in self.join_handles.drain(..) {
            match handle.join() {
                Ok(outcome) => {
                    if let Err(err) = outcome.result {
                        tracing::warn!(block = %outcome.node_id.0, error = %err, "block failed");
                        ok = false;
                    }
                    self.nodes.insert(outcome.node_id, Registered::Block(outcome.block));
                }
                Err(_) => {
                    tracing::error!("worker thread panicked");
                    ok = false;
                }
            }
        }
        self.control_handles.clear();
        self.state = GraphState::Stopped;
        self.last_run_ok = ok;
        ok
    }

    /// Ask every source to stop, then wait for natural collapse.
    pub fn stop(&mut self) -> bool {
        for id in self.order.clone() {
            if let Some(Registered::Block(block)) = self.nodes.get_mut(&id) {
                if let Some(stop_fn) = block.shape().stop {
                    stop_fn(block.self_ptr());
                }
            }
        }
        self.wait()
    }

    pub fn run(&mut self) -> bool {
        if let Err(err) = self.start() {
            tracing::error!(error = %err, "graph failed to start");
            return false;
        }
        self.wait()
    }

    /// Invoke an asynchronous control method on `target`'s worker,
    /// blocking until the worker drains it between `process` calls
    /// between `process` calls.
    pub fn call<A, R>(&self, target: NodeId, method: &'static str, args: A) -> Result<R>
    where
        A: Send + 'static,
        R: Send + 'static,
    {
        let sender = self
            .control_handles
            .get(&target)
            .ok_or_else(|| FlowError::Topology("block is not running".into()))?;
        let (reply_tx, reply_rx) = crossbeam_channel::bounded(1);
        let boxed_args: Box<dyn Any + Send> = Box::new(args);
        sender
            .send(ControlMsg {
                method,
                args: boxed_args,
                reply: reply_tx,
            })
            .map_err(|_| FlowError::Topology("block is not running".into()))?;
        let boxed_result = reply_rx
            .recv()
            .map_err(|_| FlowError::Topology("block exited before replying".into()))?;
        let boxed_result = boxed_result.map_err(|source| FlowError::Control {
            block: "unknown",
            method,
            source,
        })?;
        boxed_result
            .downcast::<R>()
            .map(|b| *b)
            .map_err(|_| FlowError::TypeMismatch(method))
    }
}
