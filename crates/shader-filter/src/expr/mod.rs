//! Small arithmetic/boolean expression language evaluated once per frame.
//!
//! Expressions are compiled against an [`Environment`] of named variable
//! cells, constants and functions. Variables are bound by cell, so a compiled
//! expression always reads the current value of whatever the cell's owner last
//! stored in it.

pub mod builtins;
mod parser;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::ExpressionError;

pub use parser::compile;

/// A shared numeric storage cell. Clones refer to the same value.
#[derive(Debug, Clone, Default)]
pub struct VarCell(Arc<AtomicU64>);

impl VarCell {
    pub fn new(value: f64) -> Self {
        Self(Arc::new(AtomicU64::new(value.to_bits())))
    }

    pub fn get(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Relaxed))
    }

    pub fn set(&self, value: f64) {
        self.0.store(value.to_bits(), Ordering::Relaxed);
    }

    pub fn ptr_eq(&self, other: &VarCell) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

pub type SharedRng = Arc<Mutex<StdRng>>;

/// Native function callable from expressions.
#[derive(Debug, Clone, Copy)]
pub enum Function {
    Unary(fn(f64) -> f64),
    Binary(fn(f64, f64) -> f64),
    Ternary(fn(f64, f64, f64) -> f64),
    /// `random(min, max)`, drawing from the environment's seeded generator.
    Random,
}

impl Function {
    pub fn arity(&self) -> usize {
        match self {
            Function::Unary(_) => 1,
            Function::Binary(_) | Function::Random => 2,
            Function::Ternary(_) => 3,
        }
    }
}

#[derive(Debug, Clone)]
pub enum Symbol {
    Variable(VarCell),
    Constant(f64),
    Function(Function),
}

/// Named symbols available to compiled expressions.
///
/// Append-only between [`Environment::clear`] calls: a name bound once keeps
/// its cell for the rest of the shader generation.
pub struct Environment {
    symbols: HashMap<String, Symbol>,
    rng: SharedRng,
    seed: Option<u64>,
}

impl Environment {
    pub fn new(seed: Option<u64>) -> Self {
        Self {
            symbols: HashMap::new(),
            rng: Arc::new(Mutex::new(make_rng(seed))),
            seed,
        }
    }

    /// Drop every symbol and reseed the random generator.
    pub fn clear(&mut self) {
        self.symbols.clear();
        self.rng = Arc::new(Mutex::new(make_rng(self.seed)));
    }

    /// Return the cell bound to `name`, creating it (initialised to 0) if the
    /// name is not yet a variable. A constant or function of the same name is
    /// shadowed by the new variable.
    pub fn bind(&mut self, name: &str) -> VarCell {
        if let Some(Symbol::Variable(cell)) = self.symbols.get(name) {
            return cell.clone();
        }
        let cell = VarCell::default();
        self.symbols
            .insert(name.to_string(), Symbol::Variable(cell.clone()));
        cell
    }

    pub fn define_constant(&mut self, name: &str, value: f64) {
        self.symbols
            .insert(name.to_string(), Symbol::Constant(value));
    }

    pub fn define_function(&mut self, name: &str, function: Function) {
        self.symbols
            .insert(name.to_string(), Symbol::Function(function));
    }

    pub fn lookup(&self, name: &str) -> Option<&Symbol> {
        self.symbols.get(name)
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub(crate) fn rng(&self) -> SharedRng {
        self.rng.clone()
    }
}

fn make_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Pow,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    And,
    Or,
}

#[derive(Debug, Clone)]
pub(crate) enum Node {
    Number(f64),
    Var(VarCell),
    Neg(Box<Node>),
    Not(Box<Node>),
    Binary(BinOp, Box<Node>, Box<Node>),
    Call1(fn(f64) -> f64, Box<Node>),
    Call2(fn(f64, f64) -> f64, Box<Node>, Box<Node>),
    Call3(fn(f64, f64, f64) -> f64, Box<Node>, Box<Node>, Box<Node>),
    Random(SharedRng, Box<Node>, Box<Node>),
}

impl BinOp {
    fn apply(self, x: f64, y: f64) -> f64 {
        match self {
            BinOp::Add => x + y,
            BinOp::Sub => x - y,
            BinOp::Mul => x * y,
            BinOp::Div => x / y,
            BinOp::Rem => x % y,
            BinOp::Pow => x.powf(y),
            BinOp::Lt => f64::from(u8::from(x < y)),
            BinOp::Le => f64::from(u8::from(x <= y)),
            BinOp::Gt => f64::from(u8::from(x > y)),
            BinOp::Ge => f64::from(u8::from(x >= y)),
            BinOp::Eq => f64::from(u8::from(x == y)),
            BinOp::Ne => f64::from(u8::from(x != y)),
            BinOp::And => truth(x) * truth(y),
            BinOp::Or => truth(truth(x) + truth(y)),
        }
    }
}

fn truth(v: f64) -> f64 {
    if v != 0.0 { 1.0 } else { 0.0 }
}

impl Node {
    fn eval(&self) -> f64 {
        match self {
            Node::Number(v) => *v,
            Node::Var(cell) => cell.get(),
            Node::Neg(a) => -a.eval(),
            Node::Not(a) => 1.0 - truth(a.eval()),
            // Short-circuit before evaluating the right side.
            Node::Binary(BinOp::And, a, b) => {
                if a.eval() != 0.0 { truth(b.eval()) } else { 0.0 }
            }
            Node::Binary(BinOp::Or, a, b) => {
                if a.eval() != 0.0 { 1.0 } else { truth(b.eval()) }
            }
            Node::Binary(op, a, b) => op.apply(a.eval(), b.eval()),
            Node::Call1(f, a) => f(a.eval()),
            Node::Call2(f, a, b) => f(a.eval(), b.eval()),
            Node::Call3(f, a, b, c) => f(a.eval(), b.eval(), c.eval()),
            Node::Random(rng, lo, hi) => {
                let (lo, hi) = (lo.eval(), hi.eval());
                if hi <= lo || !lo.is_finite() || !hi.is_finite() {
                    return lo;
                }
                let t: f64 = match rng.lock() {
                    Ok(mut rng) => rng.random(),
                    Err(poisoned) => poisoned.into_inner().random(),
                };
                lo + t * (hi - lo)
            }
        }
    }
}

/// An expression compiled against an environment.
#[derive(Debug, Clone)]
pub struct CompiledExpr {
    root: Node,
}

impl CompiledExpr {
    pub(crate) fn new(root: Node) -> Self {
        Self { root }
    }

    pub fn eval(&self) -> f64 {
        self.root.eval()
    }
}

/// Expression text plus its last successfully compiled form.
#[derive(Debug, Clone, Default)]
pub struct Expression {
    text: String,
    compiled: Option<CompiledExpr>,
}

impl Expression {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            compiled: None,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }

    pub fn is_compiled(&self) -> bool {
        self.compiled.is_some()
    }

    /// Compile the current text. On failure the previously compiled form, if
    /// any, is kept.
    pub fn compile(&mut self, env: &Environment) -> Result<(), ExpressionError> {
        let compiled = compile(&self.text, env)?;
        self.compiled = Some(compiled);
        Ok(())
    }

    /// Replace the text and compile it. The previous compiled form survives a
    /// failed compile.
    pub fn set_and_compile(
        &mut self,
        text: impl Into<String>,
        env: &Environment,
    ) -> Result<(), ExpressionError> {
        self.text = text.into();
        self.compile(env)
    }

    /// Evaluate the compiled form, or return `default` if nothing has ever
    /// compiled.
    pub fn evaluate(&self, default: f64) -> f64 {
        self.compiled.as_ref().map_or(default, CompiledExpr::eval)
    }
}
