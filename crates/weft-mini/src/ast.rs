use crate::span::Span;
use serde::{Deserialize, Serialize};

/// Syntax tree for the notation language.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Ast {
    Atom(AtomNode),
    Group(GroupNode),
    Element(ElementNode),
}

impl Ast {
    pub fn span(&self) -> Span {
        match self {
            Ast::Atom(node) => node.span,
            Ast::Group(node) => node.span,
            Ast::Element(node) => node.span,
        }
    }
}

/// A leaf value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AtomNode {
    pub value: AtomValue,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AtomValue {
    Number(f64),
    String(String),
    Silence,
}

impl AtomNode {
    pub fn number(n: f64, span: Span) -> Self {
        AtomNode {
            value: AtomValue::Number(n),
            span,
        }
    }

    pub fn string(s: impl Into<String>, span: Span) -> Self {
        AtomNode {
            value: AtomValue::String(s.into()),
            span,
        }
    }

    pub fn silence(span: Span) -> Self {
        AtomNode {
            value: AtomValue::Silence,
            span,
        }
    }
}

/// How a group's children share time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Alignment {
    /// Space-separated steps crammed into one cycle.
    Fastcat,
    /// Comma-separated layers.
    Stack,
    /// Pipe-separated random choice, one pick per cycle.
    Rand,
    /// Brace group: step counts aligned by least common multiple.
    Polymeter,
    /// Angle group: one child step per cycle.
    Slowcat,
    /// Dot-separated feet, each foot an equal share of the cycle.
    Feet,
}

/// A composite node: children arranged by an alignment.
///
/// For `Slowcat` and `Polymeter` the children are the comma-separated
/// sub-sequences; a comma inside `<>` or `{}` stacks them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupNode {
    pub children: Vec<Ast>,
    pub alignment: Alignment,
    /// Sampling site for `Rand` groups, so separate `|` groups do not
    /// correlate.
    pub site: Option<u64>,
    /// Explicit `%n` step count on a polymeter group.
    pub steps_per_cycle: Option<Box<Ast>>,
    pub span: Span,
}

impl GroupNode {
    pub fn new(children: Vec<Ast>, alignment: Alignment, span: Span) -> Self {
        GroupNode {
            children,
            alignment,
            site: None,
            steps_per_cycle: None,
            span,
        }
    }

    pub fn with_site(mut self, site: u64) -> Self {
        self.site = Some(site);
        self
    }
}

/// One step: a source with its modifiers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementNode {
    pub source: Box<Ast>,
    pub ops: Vec<StepOp>,
    /// Relative duration inside a sequence (`@n` and `_`).
    pub weight: f64,
    /// Sequential replication (`!n`).
    pub reps: usize,
    pub span: Span,
}

impl ElementNode {
    pub fn new(source: Ast, span: Span) -> Self {
        ElementNode {
            source: Box::new(source),
            ops: Vec::new(),
            weight: 1.0,
            reps: 1,
            span,
        }
    }
}

/// Step modifiers, applied left to right.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StepOp {
    /// `*n` — speed the step up.
    Fast(Box<Ast>),
    /// `/n` — slow the step down.
    Slow(Box<Ast>),
    /// `(pulse, step, rotation?)` — Euclidean rhythm.
    Euclid {
        pulse: Box<Ast>,
        step: Box<Ast>,
        rotation: Option<Box<Ast>>,
    },
    /// `?` or `?p` — random dropout with its own sampling site.
    Degrade { amount: Option<f64>, site: u64 },
    /// `:n` — sound-index suffix.
    Index(Box<Ast>),
}
