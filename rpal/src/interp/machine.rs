//! The CSE (control, stack, environment) machine
//!
//! The machine walks the standardized tree without recursion. Control items
//! are kept on a `Vec` whose end is the front of the control list; values
//! live on a second `Vec`. Applying a closure saves the rest of the current
//! control list, the current stack and the current environment as a dump
//! frame; exhausting the callee's control list restores the frame and pushes
//! the callee's result.

use super::env::{EnvRef, Environment};
use super::error::{InterpResult, RuntimeError};
use super::primitive::Primitive;
use super::value::{Closure, Value};
use crate::standardize::validate;
use crate::tree::{NodeId, NodeKind, Payload, Tree};
use crate::util::find_similar_name;
use std::collections::HashMap;
use std::rc::Rc;
use tracing::{debug, trace};

/// Evaluation limits and diagnostics
#[derive(Debug, Clone, Default)]
pub struct MachineConfig {
    /// Maximum number of control items processed
    pub max_steps: Option<u64>,
    /// Maximum number of saved dump frames
    pub max_depth: Option<usize>,
    /// Record every node evaluated, see [`Machine::trace`]
    pub record_trace: bool,
}

impl MachineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_steps(mut self, steps: u64) -> Self {
        self.max_steps = Some(steps);
        self
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    pub fn with_trace(mut self, record: bool) -> Self {
        self.record_trace = record;
        self
    }
}

/// Counters collected while running
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MachineStats {
    pub steps: u64,
    pub applications: u64,
    pub tail_calls: u64,
    pub environments: usize,
    pub max_dump_depth: usize,
}

#[derive(Debug)]
enum Control {
    /// Evaluate a node of the standardized tree
    Eval(NodeId),
    /// Pop the operand, then the operator, and apply
    Apply,
    /// Pop this many values into a tuple
    Build(usize),
    /// Pop a truth value and continue with exactly one arm
    Branch { then: NodeId, otherwise: NodeId },
    /// Push an already computed value
    Push(Value),
}

impl Control {
    fn rule(&self) -> &'static str {
        match self {
            Control::Eval(_) => "eval",
            Control::Apply => "apply",
            Control::Build(_) => "tau",
            Control::Branch { .. } => "branch",
            Control::Push(_) => "push",
        }
    }
}

/// Saved caller state
#[derive(Debug)]
struct Frame {
    control: Vec<Control>,
    stack: Vec<Value>,
    env: EnvRef,
}

/// A single evaluation of a standardized tree
pub struct Machine<'t> {
    tree: &'t Tree,
    config: MachineConfig,
    control: Vec<Control>,
    stack: Vec<Value>,
    dump: Vec<Frame>,
    env: EnvRef,
    output: String,
    trace: Vec<NodeId>,
    stats: MachineStats,
    params: HashMap<NodeId, Rc<str>>,
    halted: bool,
}

impl<'t> Machine<'t> {
    /// Prepare a machine for `tree`, which must be standardized
    pub fn new(tree: &'t Tree, config: MachineConfig) -> InterpResult<Self> {
        validate(tree).map_err(|err| RuntimeError::fault(format!("tree is not standardized: {err}")))?;
        let root = tree
            .root()
            .ok_or_else(|| RuntimeError::fault("tree has no root"))?;

        let builtins = Primitive::NAMED
            .iter()
            .map(|p| (p.name().to_string(), Value::Primitive(*p)))
            .collect();

        Ok(Machine {
            tree,
            config,
            control: vec![Control::Eval(root)],
            stack: Vec::new(),
            dump: Vec::new(),
            env: Environment::root(builtins),
            output: String::new(),
            trace: Vec::new(),
            stats: MachineStats {
                environments: 1,
                ..MachineStats::default()
            },
            params: HashMap::new(),
            halted: false,
        })
    }

    /// Run to completion and return the final value
    pub fn run(&mut self) -> InterpResult<Value> {
        if self.halted {
            return Err(RuntimeError::fault("machine has already halted"));
        }
        loop {
            if let Some(item) = self.control.pop() {
                self.tick(&item)?;
                self.step(item)?;
                continue;
            }
            match self.dump.pop() {
                Some(frame) => self.return_to(frame)?,
                None => return self.halt(),
            }
        }
    }

    /// Text written by `Print` so far, leaving the buffer empty
    pub fn take_output(&mut self) -> String {
        std::mem::take(&mut self.output)
    }

    pub fn stats(&self) -> &MachineStats {
        &self.stats
    }

    /// Nodes in the order they were evaluated, empty unless
    /// `record_trace` is set
    pub fn trace(&self) -> &[NodeId] {
        &self.trace
    }

    fn tick(&mut self, item: &Control) -> InterpResult<()> {
        self.stats.steps += 1;
        if let Some(limit) = self.config.max_steps
            && self.stats.steps > limit
        {
            return Err(RuntimeError::step_limit(limit));
        }
        trace!(
            step = self.stats.steps,
            rule = item.rule(),
            stack = self.stack.len(),
            dump = self.dump.len(),
            env = %self.env
        );
        Ok(())
    }

    fn step(&mut self, item: Control) -> InterpResult<()> {
        match item {
            Control::Eval(id) => self.eval(id),
            Control::Apply => {
                let rand = self.pop()?;
                let rator = self.pop()?;
                self.apply(rator, rand)
            }
            Control::Build(n) => {
                let len = self.stack.len();
                if len < n {
                    return Err(RuntimeError::fault(format!("tuple of {n} built from {len} values")));
                }
                let items = self.stack.split_off(len - n);
                self.stack.push(Value::tuple(items));
                Ok(())
            }
            Control::Branch { then, otherwise } => match self.pop()? {
                Value::Bool(true) => {
                    self.control.push(Control::Eval(then));
                    Ok(())
                }
                Value::Bool(false) => {
                    self.control.push(Control::Eval(otherwise));
                    Ok(())
                }
                other => Err(RuntimeError::type_error("->", "a truth value", other.type_name())),
            },
            Control::Push(value) => {
                self.stack.push(value);
                Ok(())
            }
        }
    }

    fn pop(&mut self) -> InterpResult<Value> {
        self.stack
            .pop()
            .ok_or_else(|| RuntimeError::fault("value stack underflow"))
    }

    fn eval(&mut self, id: NodeId) -> InterpResult<()> {
        if self.config.record_trace {
            self.trace.push(id);
        }
        let tree = self.tree;
        let node = tree.node(id);
        let value = match (node.kind, &node.payload) {
            (NodeKind::Identifier, Some(Payload::Ident(name))) => return self.lookup(name),
            (NodeKind::Integer, Some(Payload::Int(n))) => Value::Int(*n),
            (NodeKind::Str, Some(Payload::Str(s))) => Value::string(s),
            (NodeKind::Operator, Some(Payload::Op(op))) => Value::Primitive(Primitive::from_operator(*op)),
            (NodeKind::True, _) => Value::Bool(true),
            (NodeKind::False, _) => Value::Bool(false),
            (NodeKind::Nil, _) => Value::nil(),
            (NodeKind::Dummy, _) => Value::Dummy,
            (NodeKind::YStar, _) => Value::YStar,
            (NodeKind::Lambda, _) => {
                let (binder, body) = self.two_children(id)?;
                Value::Closure(Rc::new(Closure {
                    binder,
                    body,
                    env: Rc::clone(&self.env),
                    param: self.param(binder),
                }))
            }
            (NodeKind::Gamma, _) => {
                let (rator, rand) = self.two_children(id)?;
                self.control.push(Control::Apply);
                self.control.push(Control::Eval(rand));
                self.control.push(Control::Eval(rator));
                return Ok(());
            }
            (NodeKind::Tau, _) => {
                let children: Vec<NodeId> = tree.children(id).collect();
                self.control.push(Control::Build(children.len()));
                self.control.extend(children.into_iter().rev().map(Control::Eval));
                return Ok(());
            }
            (NodeKind::Cond, _) => {
                let mut children = tree.children(id);
                let (Some(cond), Some(then), Some(otherwise)) = (children.next(), children.next(), children.next())
                else {
                    return Err(RuntimeError::fault(format!("malformed conditional {id}")));
                };
                self.control.push(Control::Branch { then, otherwise });
                self.control.push(Control::Eval(cond));
                return Ok(());
            }
            (kind, _) => return Err(RuntimeError::fault(format!("cannot evaluate '{kind}' node {id}"))),
        };
        self.stack.push(value);
        Ok(())
    }

    fn two_children(&self, id: NodeId) -> InterpResult<(NodeId, NodeId)> {
        let mut children = self.tree.children(id);
        match (children.next(), children.next()) {
            (Some(a), Some(b)) => Ok((a, b)),
            _ => Err(RuntimeError::fault(format!("'{}' node {id} needs two children", self.tree.kind(id)))),
        }
    }

    /// Rendered bound-variable pattern of a lambda, cached per node
    fn param(&mut self, binder: NodeId) -> Rc<str> {
        let tree = self.tree;
        Rc::clone(self.params.entry(binder).or_insert_with(|| {
            let names: Vec<&str> = tree.children(binder).filter_map(|c| tree.ident(c)).collect();
            match tree.kind(binder) {
                NodeKind::Comma => Rc::from(format!("({})", names.join(", "))),
                NodeKind::Empty => Rc::from("()"),
                _ => Rc::from(tree.ident(binder).unwrap_or("?")),
            }
        }))
    }

    fn lookup(&mut self, name: &str) -> InterpResult<()> {
        match self.env.lookup(name) {
            Some(Value::Projection(closure, index)) => {
                let (closure, index) = (Rc::clone(closure), *index);
                self.force_component(closure, index)
            }
            Some(value) => {
                self.stack.push(value.clone());
                Ok(())
            }
            None => {
                let names = self.env.names();
                let threshold = name.chars().count() / 3;
                let suggestion = find_similar_name(name, &names, threshold);
                Err(RuntimeError::unbound_name(name, suggestion))
            }
        }
    }

    /// Evaluate component `index` of the fixed point of `closure`
    fn force_component(&mut self, closure: Rc<Closure>, index: usize) -> InterpResult<()> {
        let index = i64::try_from(index).map_err(|_| RuntimeError::fault("tuple pattern too long"))?;
        self.control.push(Control::Apply);
        self.control.push(Control::Push(Value::Int(index)));
        let eta = Value::Eta(Rc::clone(&closure));
        self.enter(closure, eta)
    }

    fn apply(&mut self, rator: Value, rand: Value) -> InterpResult<()> {
        self.stats.applications += 1;
        match rator {
            Value::Closure(closure) => self.enter(closure, rand),

            // (Y* c) a  =>  (c (Y* c)) a
            Value::Eta(closure) => {
                self.control.push(Control::Apply);
                self.control.push(Control::Push(rand));
                let eta = Value::Eta(Rc::clone(&closure));
                self.enter(closure, eta)
            }

            Value::YStar => match rand {
                Value::Closure(closure) => {
                    self.stack.push(Value::Eta(closure));
                    Ok(())
                }
                other => Err(RuntimeError::type_error("Y*", "a function", other.type_name())),
            },

            Value::Tuple(items) => {
                let index = match rand {
                    Value::Int(index) => index,
                    other => {
                        return Err(RuntimeError::type_error("tuple selection", "an integer index", other.type_name()));
                    }
                };
                let selected = usize::try_from(index)
                    .ok()
                    .and_then(|i| i.checked_sub(1))
                    .and_then(|i| items.get(i))
                    .ok_or_else(|| RuntimeError::index_out_of_range(index, items.len()))?;
                self.stack.push(selected.clone());
                Ok(())
            }

            Value::Primitive(primitive) if primitive.arity() == 1 => {
                let result = primitive.apply_unary(rand, &mut self.output)?;
                self.stack.push(result);
                Ok(())
            }
            Value::Primitive(primitive) => {
                self.stack.push(Value::partial(primitive, rand));
                Ok(())
            }
            Value::Partial(primitive, left) => {
                let result = primitive.apply_binary(&left, rand)?;
                self.stack.push(result);
                Ok(())
            }

            other => Err(RuntimeError::not_applicable(other.type_name())),
        }
    }

    /// Apply a closure: bind its pattern and continue with its body
    fn enter(&mut self, closure: Rc<Closure>, arg: Value) -> InterpResult<()> {
        let bindings = self.bind(closure.binder, arg)?;
        self.stats.environments += 1;
        let env = Environment::extend(&closure.env, self.stats.environments, bindings);

        if self.control.is_empty() && self.stack.is_empty() {
            self.stats.tail_calls += 1;
        } else {
            if let Some(limit) = self.config.max_depth
                && self.dump.len() >= limit
            {
                return Err(RuntimeError::depth_limit(limit));
            }
            self.dump.push(Frame {
                control: std::mem::take(&mut self.control),
                stack: std::mem::take(&mut self.stack),
                env: Rc::clone(&self.env),
            });
            self.stats.max_dump_depth = self.stats.max_dump_depth.max(self.dump.len());
        }

        self.env = env;
        self.control.push(Control::Eval(closure.body));
        Ok(())
    }

    fn bind(&self, binder: NodeId, arg: Value) -> InterpResult<Vec<(String, Value)>> {
        let tree = self.tree;
        match tree.kind(binder) {
            NodeKind::Identifier => {
                let name = tree
                    .ident(binder)
                    .ok_or_else(|| RuntimeError::fault(format!("identifier {binder} has no name")))?;
                Ok(vec![(name.to_string(), arg)])
            }
            NodeKind::Empty => Ok(Vec::new()),
            NodeKind::Comma => {
                let names: Vec<&str> = tree.children(binder).filter_map(|c| tree.ident(c)).collect();
                match arg {
                    // Components of a fixed point are forced on lookup
                    Value::Eta(closure) => Ok(names
                        .into_iter()
                        .enumerate()
                        .map(|(i, name)| (name.to_string(), Value::Projection(Rc::clone(&closure), i + 1)))
                        .collect()),
                    Value::Tuple(items) if items.len() == names.len() => Ok(names
                        .into_iter()
                        .map(str::to_string)
                        .zip(items.iter().cloned())
                        .collect()),
                    Value::Tuple(items) => Err(RuntimeError::type_error(
                        "tuple pattern",
                        &format!("a tuple of {} values", names.len()),
                        &format!("a tuple of {} values", items.len()),
                    )),
                    other => Err(RuntimeError::type_error("tuple pattern", "a tuple", other.type_name())),
                }
            }
            kind => Err(RuntimeError::fault(format!("'{kind}' cannot bind a value"))),
        }
    }

    /// Resume the caller once a closure body has been evaluated
    fn return_to(&mut self, frame: Frame) -> InterpResult<()> {
        let result = self.pop()?;
        if !self.stack.is_empty() {
            return Err(RuntimeError::fault(format!(
                "closure body left {} extra values on the stack",
                self.stack.len()
            )));
        }
        self.control = frame.control;
        self.stack = frame.stack;
        self.env = frame.env;
        self.stack.push(result);
        Ok(())
    }

    fn halt(&mut self) -> InterpResult<Value> {
        if !self.control.is_empty() || !self.dump.is_empty() {
            return Err(RuntimeError::fault("halted with pending control or dump"));
        }
        let count = self.stack.len();
        if count != 1 {
            return Err(RuntimeError::fault(format!("halted with {count} values on the stack")));
        }
        let result = self.pop()?;
        self.halted = true;
        debug!(
            steps = self.stats.steps,
            applications = self.stats.applications,
            tail_calls = self.stats.tail_calls,
            environments = self.stats.environments,
            max_dump_depth = self.stats.max_dump_depth,
            "machine halted"
        );
        Ok(result)
    }
}
