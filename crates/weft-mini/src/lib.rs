//! Notation parsing, script evaluation and string sugar for weft
//! patterns.
//!
//! The notation language compiles to `weft_core` patterns:
//!
//! ```
//! use weft_mini::pattern;
//!
//! let p = pattern("bd sd [cp cp] ~").unwrap();
//! assert_eq!(p.query_arc(0.0, 1.0).len(), 4);
//! ```
//!
//! # Notation
//!
//! - Space-separated steps: `a b c`
//! - Sub-groups: `[a b]`, alternation `<a b>`, polymeter `{a b, c d e}%4`
//! - Layering `a, b` and per-cycle random choice `a | b`
//! - Step modifiers: `*2` `/2` `!2` `?` `@3` `:3` `(3,8,1)`
//!
//! The `sugar` module converts strings, numbers and patterns uniformly
//! (`IntoPattern`) and provides the named control constructors
//! (`sound`, `note`, `lpf`, …). The `script` module evaluates a small
//! method-chain expression language over the same operator table.

pub mod ast;
pub mod error;
pub mod evaluator;
pub mod formatter;
pub mod lexer;
pub mod parser;
pub mod script;
pub mod span;
pub mod sugar;


pub use ast::{Alignment, Ast, AtomNode, AtomValue, ElementNode, GroupNode, StepOp};
pub use error::{ParseError, Result};
pub use evaluator::{evaluate, pattern};
pub use formatter::format;
pub use lexer::{Lexer, Token};
pub use parser::{parse, Parser};
pub use script::compile;
pub use span::Span;
pub use sugar::{
    accelerate, attack, bank, bools, bpf, chord, crush, decay, delay, delayfeedback, delaytime,
    distort, duck, duckattack, freq, gain, hpf, legato, lpf, n, note, notchf, num, orbit, pan,
    release, resonance, room, s, scale, shape, size, sound, sustain, value, velocity, vib, vibmod,
    voicing, vowel, IntoPattern,
};
