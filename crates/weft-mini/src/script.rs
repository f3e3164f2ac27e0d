//! The script entry point: evaluate a small expression language over the
//! operator table and hand back the resulting pattern.
//!
//! The surface is method-chain style: constructors (`sound`, `note`,
//! `stack`, `sine`, …) called as functions, operators as methods, arrow
//! lambdas for the combinators that take functions:
//!
//! ```text
//! sound("bd sd").fast(2).every(4, x => x.rev()).jux(x => x.iter(4))
//! ```
//!
//! `compile` returns `None` on any parse or evaluation failure; a script
//! never panics and never produces undefined output.

use crate::error::{ParseError, Result};
use crate::span::Span;
use crate::sugar::{self, IntoPattern};
use std::collections::HashMap;
use weft_core::{
    cat, fastcat, rand, saw, silence, sine, square, stack, steady, tri, Fraction, Pattern, Value,
    VoiceData,
};

/// Evaluate a script; `None` on any failure.
pub fn compile(source: &str) -> Option<Pattern<VoiceData>> {
    let tokens = tokenize(source).ok()?;
    let expr = ScriptParser::new(tokens).parse().ok()?;
    let value = eval(&expr, &HashMap::new()).ok()?;
    match value {
        ScriptValue::Voices(p) => Some(p),
        ScriptValue::Text(s) => Some(weft_core::value_of(s.as_str().into_pattern())),
        ScriptValue::Numbers(p) => Some(weft_core::ctrl_f64(p, |d, x| {
            d.value = Some(Value::Number(x))
        })),
        _ => None,
    }
}

// ----- tokens -----

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Ident(String),
    Number(f64),
    Str(String),
    Dot,
    Comma,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Arrow,
}

fn tokenize(source: &str) -> Result<Vec<(Tok, Span)>> {
    let bytes = source.as_bytes();
    let mut out = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i] as char;
        match c {
            ' ' | '\t' | '\r' | '\n' => i += 1,
            '/' if bytes.get(i + 1) == Some(&b'/') => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
            }
            '.' => {
                out.push((Tok::Dot, Span::new(i, i + 1)));
                i += 1;
            }
            ',' => {
                out.push((Tok::Comma, Span::new(i, i + 1)));
                i += 1;
            }
            '(' => {
                out.push((Tok::LParen, Span::new(i, i + 1)));
                i += 1;
            }
            ')' => {
                out.push((Tok::RParen, Span::new(i, i + 1)));
                i += 1;
            }
            '[' => {
                out.push((Tok::LBracket, Span::new(i, i + 1)));
                i += 1;
            }
            ']' => {
                out.push((Tok::RBracket, Span::new(i, i + 1)));
                i += 1;
            }
            '=' if bytes.get(i + 1) == Some(&b'>') => {
                out.push((Tok::Arrow, Span::new(i, i + 2)));
                i += 2;
            }
            '"' | '\'' => {
                let quote = bytes[i];
                let start = i;
                i += 1;
                let mut text = String::new();
                while i < bytes.len() && bytes[i] != quote {
                    if bytes[i] == b'\\' && i + 1 < bytes.len() {
                        i += 1;
                    }
                    text.push(bytes[i] as char);
                    i += 1;
                }
                if i >= bytes.len() {
                    return Err(ParseError::UnclosedDelimiter {
                        delimiter: quote as char,
                        open_span: Span::new(start, start + 1),
                    });
                }
                i += 1;
                out.push((Tok::Str(text), Span::new(start, i)));
            }
            '-' | '0'..='9' => {
                let start = i;
                if c == '-' {
                    i += 1;
                }
                while i < bytes.len() && (bytes[i].is_ascii_digit() || bytes[i] == b'.') {
                    // A dot starting a method chain ends the number.
                    if bytes[i] == b'.'
                        && bytes
                            .get(i + 1)
                            .map(|b| !b.is_ascii_digit())
                            .unwrap_or(true)
                    {
                        break;
                    }
                    i += 1;
                }
                let text = &source[start..i];
                let value: f64 = text.parse().map_err(|_| ParseError::InvalidNumber {
                    value: text.to_string(),
                    span: Span::new(start, i),
                })?;
                out.push((Tok::Number(value), Span::new(start, i)));
            }
            'a'..='z' | 'A'..='Z' | '_' => {
                let start = i;
                while i < bytes.len()
                    && ((bytes[i] as char).is_ascii_alphanumeric() || bytes[i] == b'_')
                {
                    i += 1;
                }
                out.push((
                    Tok::Ident(source[start..i].to_string()),
                    Span::new(start, i),
                ));
            }
            other => {
                return Err(ParseError::custom(
                    format!("unexpected character '{other}'"),
                    Some(Span::new(i, i + 1)),
                ));
            }
        }
    }
    Ok(out)
}

// ----- expressions -----

#[derive(Debug, Clone)]
enum Expr {
    Num(f64),
    Text(String),
    Ident(String),
    List(Vec<Expr>),
    Call { name: String, args: Vec<Expr> },
    Method {
        recv: Box<Expr>,
        name: String,
        args: Vec<Expr>,
    },
    Lambda { param: String, body: Box<Expr> },
}

struct ScriptParser {
    tokens: Vec<(Tok, Span)>,
    pos: usize,
}

impl ScriptParser {
    fn new(tokens: Vec<(Tok, Span)>) -> Self {
        ScriptParser { tokens, pos: 0 }
    }

    fn parse(&mut self) -> Result<Expr> {
        let expr = self.expr()?;
        match self.peek() {
            None => Ok(expr),
            Some((tok, span)) => Err(ParseError::unexpected_token(
                "end of script",
                format!("{tok:?}"),
                span,
            )),
        }
    }

    fn expr(&mut self) -> Result<Expr> {
        // Lambda: ident => expr
        if let (Some((Tok::Ident(param), _)), Some((Tok::Arrow, _))) =
            (self.peek_at(0), self.peek_at(1))
        {
            let param = param.clone();
            self.pos += 2;
            let body = self.expr()?;
            return Ok(Expr::Lambda {
                param,
                body: Box::new(body),
            });
        }
        self.postfix()
    }

    fn postfix(&mut self) -> Result<Expr> {
        let mut expr = self.primary()?;
        while let Some((Tok::Dot, _)) = self.peek() {
            self.pos += 1;
            let name = self.ident()?;
            self.expect(Tok::LParen, "(")?;
            let args = self.args()?;
            expr = Expr::Method {
                recv: Box::new(expr),
                name,
                args,
            };
        }
        Ok(expr)
    }

    fn primary(&mut self) -> Result<Expr> {
        match self.next() {
            Some((Tok::Number(n), _)) => Ok(Expr::Num(n)),
            Some((Tok::Str(s), _)) => Ok(Expr::Text(s)),
            Some((Tok::LBracket, open)) => {
                let mut items = Vec::new();
                loop {
                    match self.peek() {
                        Some((Tok::RBracket, _)) => {
                            self.pos += 1;
                            break;
                        }
                        Some(_) => {
                            items.push(self.expr()?);
                            if let Some((Tok::Comma, _)) = self.peek() {
                                self.pos += 1;
                            }
                        }
                        None => {
                            return Err(ParseError::UnclosedDelimiter {
                                delimiter: '[',
                                open_span: open,
                            });
                        }
                    }
                }
                Ok(Expr::List(items))
            }
            Some((Tok::LParen, _)) => {
                let inner = self.expr()?;
                match self.next() {
                    Some((Tok::RParen, _)) => Ok(inner),
                    _ => Err(ParseError::unexpected_eof(")")),
                }
            }
            Some((Tok::Ident(name), _)) => {
                if let Some((Tok::LParen, _)) = self.peek() {
                    self.pos += 1;
                    let args = self.args()?;
                    Ok(Expr::Call { name, args })
                } else {
                    Ok(Expr::Ident(name))
                }
            }
            Some((tok, span)) => Err(ParseError::unexpected_token(
                "expression",
                format!("{tok:?}"),
                span,
            )),
            None => Err(ParseError::unexpected_eof("expression")),
        }
    }

    /// Arguments up to and including the closing paren.
    fn args(&mut self) -> Result<Vec<Expr>> {
        let mut args = Vec::new();
        if let Some((Tok::RParen, _)) = self.peek() {
            self.pos += 1;
            return Ok(args);
        }
        loop {
            args.push(self.expr()?);
            match self.next() {
                Some((Tok::Comma, _)) => continue,
                Some((Tok::RParen, _)) => return Ok(args),
                Some((tok, span)) => {
                    return Err(ParseError::unexpected_token(
                        ", or )",
                        format!("{tok:?}"),
                        span,
                    ));
                }
                None => return Err(ParseError::unexpected_eof(")")),
            }
        }
    }

    fn ident(&mut self) -> Result<String> {
        match self.next() {
            Some((Tok::Ident(name), _)) => Ok(name),
            Some((tok, span)) => Err(ParseError::unexpected_token(
                "method name",
                format!("{tok:?}"),
                span,
            )),
            None => Err(ParseError::unexpected_eof("method name")),
        }
    }

    fn expect(&mut self, tok: Tok, label: &str) -> Result<()> {
        match self.next() {
            Some((t, _)) if t == tok => Ok(()),
            Some((t, span)) => Err(ParseError::unexpected_token(label, format!("{t:?}"), span)),
            None => Err(ParseError::unexpected_eof(label)),
        }
    }

    fn peek(&self) -> Option<(Tok, Span)> {
        self.tokens.get(self.pos).cloned()
    }

    fn peek_at(&self, offset: usize) -> Option<(Tok, Span)> {
        self.tokens.get(self.pos + offset).cloned()
    }

    fn next(&mut self) -> Option<(Tok, Span)> {
        let tok = self.tokens.get(self.pos).cloned();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }
}

// ----- evaluation -----

#[derive(Clone)]
enum ScriptValue {
    Voices(Pattern<VoiceData>),
    Numbers(Pattern<f64>),
    Num(f64),
    Text(String),
    List(Vec<ScriptValue>),
    Fun(String, Expr),
}

type Env = HashMap<String, ScriptValue>;

fn fail(msg: impl Into<String>) -> ParseError {
    ParseError::custom(msg, None)
}

fn eval(expr: &Expr, env: &Env) -> Result<ScriptValue> {
    match expr {
        Expr::Num(n) => Ok(ScriptValue::Num(*n)),
        Expr::Text(s) => Ok(ScriptValue::Text(s.clone())),
        Expr::List(items) => {
            let values: Result<Vec<_>> = items.iter().map(|e| eval(e, env)).collect();
            Ok(ScriptValue::List(values?))
        }
        Expr::Lambda { param, body } => Ok(ScriptValue::Fun(param.clone(), (**body).clone())),
        Expr::Ident(name) => {
            if let Some(bound) = env.get(name) {
                return Ok(bound.clone());
            }
            call(name, &[], env)
        }
        Expr::Call { name, args } => {
            let args: Result<Vec<_>> = args.iter().map(|a| eval(a, env)).collect();
            call(name, &args?, env)
        }
        Expr::Method { recv, name, args } => {
            let recv = eval(recv, env)?;
            let args: Result<Vec<_>> = args.iter().map(|a| eval(a, env)).collect();
            method(recv, name, &args?, env)
        }
    }
}

fn voices(value: &ScriptValue) -> Result<Pattern<VoiceData>> {
    match value {
        ScriptValue::Voices(p) => Ok(p.clone()),
        ScriptValue::Text(s) => Ok(weft_core::value_of(s.as_str().into_pattern())),
        ScriptValue::Num(n) => Ok(weft_core::value_of((*n).into_pattern())),
        ScriptValue::Numbers(p) => Ok(weft_core::ctrl_f64(p.clone(), |d, x| {
            d.value = Some(Value::Number(x))
        })),
        _ => Err(fail("expected a pattern")),
    }
}

fn number(value: &ScriptValue) -> Result<f64> {
    match value {
        ScriptValue::Num(n) => Ok(*n),
        _ => Err(fail("expected a number")),
    }
}

fn value_pattern(value: &ScriptValue) -> Result<Pattern<Value>> {
    match value {
        ScriptValue::Text(s) => Ok(s.as_str().into_pattern()),
        ScriptValue::Num(n) => Ok((*n).into_pattern()),
        ScriptValue::Numbers(p) => Ok(p.clone().fmap(Value::Number)),
        _ => Err(fail("expected a value pattern")),
    }
}

fn function(value: &ScriptValue) -> Result<(String, Expr)> {
    match value {
        ScriptValue::Fun(param, body) => Ok((param.clone(), body.clone())),
        _ => Err(fail("expected a lambda")),
    }
}

/// Apply a lambda to a voice pattern by binding its parameter.
fn apply_fn(
    param: &str,
    body: &Expr,
    pattern: Pattern<VoiceData>,
    env: &Env,
) -> Result<Pattern<VoiceData>> {
    let mut inner = env.clone();
    inner.insert(param.to_string(), ScriptValue::Voices(pattern));
    voices(&eval(body, &inner)?)
}

fn call(name: &str, args: &[ScriptValue], _env: &Env) -> Result<ScriptValue> {
    match name {
        "silence" => Ok(ScriptValue::Voices(silence())),
        "sine" => Ok(ScriptValue::Numbers(sine())),
        "saw" => Ok(ScriptValue::Numbers(saw())),
        "tri" => Ok(ScriptValue::Numbers(tri())),
        "square" => Ok(ScriptValue::Numbers(square())),
        "rand" => Ok(ScriptValue::Numbers(rand())),
        "steady" => {
            let v = number(args.first().ok_or_else(|| fail("steady needs a value"))?)?;
            Ok(ScriptValue::Numbers(steady(v)))
        }
        "stack" => {
            let pats: Result<Vec<_>> = args.iter().map(voices).collect();
            Ok(ScriptValue::Voices(stack(pats?)))
        }
        "cat" | "slowcat" => {
            let pats: Result<Vec<_>> = args.iter().map(voices).collect();
            Ok(ScriptValue::Voices(cat(pats?)))
        }
        "seq" | "fastcat" => {
            let pats: Result<Vec<_>> = args.iter().map(voices).collect();
            Ok(ScriptValue::Voices(fastcat(pats?)))
        }
        "pickmod" | "pickmodOut" => {
            let selector = value_pattern(
                args.first()
                    .ok_or_else(|| fail("pickmod needs a selector"))?,
            )?;
            let choices = match args.get(1) {
                Some(ScriptValue::List(items)) => {
                    let pats: Result<Vec<_>> = items.iter().map(voices).collect();
                    pats?
                }
                _ => return Err(fail("pickmod needs a list of patterns")),
            };
            let joined = if name == "pickmod" {
                weft_core::pickmod(selector, choices)
            } else {
                weft_core::pickmod_out(selector, choices)
            };
            Ok(ScriptValue::Voices(joined))
        }
        _ => {
            // Control constructors: note("c e"), lpf(1000), …
            let arg = args
                .first()
                .ok_or_else(|| fail(format!("{name} needs an argument")))?;
            let values = value_pattern(arg)?;
            sugar::control_by_name(name, values)
                .map(ScriptValue::Voices)
                .ok_or_else(|| fail(format!("unknown function {name}")))
        }
    }
}

fn method(recv: ScriptValue, name: &str, args: &[ScriptValue], env: &Env) -> Result<ScriptValue> {
    // Numeric-pattern helpers used as control arguments.
    if let ScriptValue::Numbers(p) = &recv {
        match name {
            "range" => {
                let lo = number(args.first().ok_or_else(|| fail("range needs bounds"))?)?;
                let hi = number(args.get(1).ok_or_else(|| fail("range needs bounds"))?)?;
                return Ok(ScriptValue::Numbers(p.clone().range(lo, hi)));
            }
            "segment" => {
                let n = number(args.first().ok_or_else(|| fail("segment needs a count"))?)?;
                let segmented = p.clone().segment(n as i64).map_err(|e| fail(e.to_string()))?;
                return Ok(ScriptValue::Numbers(segmented));
            }
            "slow" | "fast" => {
                let n = number(args.first().ok_or_else(|| fail("needs a factor"))?)?;
                let factor = Fraction::approximate(n);
                let scaled = if name == "fast" {
                    p.clone().fast(factor)
                } else {
                    p.clone().slow(factor)
                }
                .map_err(|e| fail(e.to_string()))?;
                return Ok(ScriptValue::Numbers(scaled));
            }
            _ => {}
        }
    }

    let pat = voices(&recv)?;
    let out = match name {
        "fast" => {
            let n = number(args.first().ok_or_else(|| fail("fast needs a factor"))?)?;
            pat.fast(Fraction::approximate(n))
                .map_err(|e| fail(e.to_string()))?
        }
        "slow" => {
            let n = number(args.first().ok_or_else(|| fail("slow needs a factor"))?)?;
            pat.slow(Fraction::approximate(n))
                .map_err(|e| fail(e.to_string()))?
        }
        "rev" => pat.rev(),
        "early" => {
            let n = number(args.first().ok_or_else(|| fail("early needs an amount"))?)?;
            pat.early(Fraction::approximate(n))
        }
        "late" => {
            let n = number(args.first().ok_or_else(|| fail("late needs an amount"))?)?;
            pat.late(Fraction::approximate(n))
        }
        "zoom" => {
            let a = number(args.first().ok_or_else(|| fail("zoom needs a window"))?)?;
            let b = number(args.get(1).ok_or_else(|| fail("zoom needs a window"))?)?;
            pat.zoom(Fraction::approximate(a), Fraction::approximate(b))
                .map_err(|e| fail(e.to_string()))?
        }
        "ribbon" => {
            let offset = number(args.first().ok_or_else(|| fail("ribbon needs an offset"))?)?;
            let cycles = number(args.get(1).ok_or_else(|| fail("ribbon needs a length"))?)?;
            pat.ribbon(Fraction::approximate(offset), cycles as i64)
                .map_err(|e| fail(e.to_string()))?
        }
        "iter" => {
            let n = number(args.first().ok_or_else(|| fail("iter needs a count"))?)?;
            pat.iter(n as i64).map_err(|e| fail(e.to_string()))?
        }
        "iterBack" => {
            let n = number(args.first().ok_or_else(|| fail("iterBack needs a count"))?)?;
            pat.iter_back(n as i64).map_err(|e| fail(e.to_string()))?
        }
        "segment" => {
            let n = number(args.first().ok_or_else(|| fail("segment needs a count"))?)?;
            pat.segment(n as i64).map_err(|e| fail(e.to_string()))?
        }
        "seed" => {
            let n = number(args.first().ok_or_else(|| fail("seed needs a number"))?)?;
            pat.seed(n as u64)
        }
        "degrade" => pat.degrade(),
        "degradeBy" => {
            let x = number(args.first().ok_or_else(|| fail("degradeBy needs an amount"))?)?;
            pat.degrade_by(x)
        }
        "euclid" => {
            let k = number(args.first().ok_or_else(|| fail("euclid needs pulses"))?)?;
            let n = number(args.get(1).ok_or_else(|| fail("euclid needs steps"))?)?;
            pat.euclid(k as i64, n as i64).map_err(|e| fail(e.to_string()))?
        }
        "euclidRot" => {
            let k = number(args.first().ok_or_else(|| fail("euclidRot needs pulses"))?)?;
            let n = number(args.get(1).ok_or_else(|| fail("euclidRot needs steps"))?)?;
            let r = number(args.get(2).ok_or_else(|| fail("euclidRot needs rotation"))?)?;
            pat.euclid_rot(k as i64, n as i64, r as i64)
                .map_err(|e| fail(e.to_string()))?
        }
        "euclidLegato" => {
            let k = number(args.first().ok_or_else(|| fail("euclidLegato needs pulses"))?)?;
            let n = number(args.get(1).ok_or_else(|| fail("euclidLegato needs steps"))?)?;
            pat.euclid_legato(k as i64, n as i64)
                .map_err(|e| fail(e.to_string()))?
        }
        "every" => {
            let n = number(args.first().ok_or_else(|| fail("every needs a period"))?)?;
            let (param, body) =
                function(args.get(1).ok_or_else(|| fail("every needs a lambda"))?)?;
            let env = env.clone();
            pat.every(n as i64, move |p| {
                apply_fn(&param, &body, p, &env).unwrap_or_else(|_| silence())
            })
            .map_err(|e| fail(e.to_string()))?
        }
        "chunk" => {
            let n = number(args.first().ok_or_else(|| fail("chunk needs a count"))?)?;
            let (param, body) =
                function(args.get(1).ok_or_else(|| fail("chunk needs a lambda"))?)?;
            let env = env.clone();
            pat.chunk(n as usize, move |p| {
                apply_fn(&param, &body, p, &env).unwrap_or_else(|_| silence())
            })
            .map_err(|e| fail(e.to_string()))?
        }
        "inside" => {
            let n = number(args.first().ok_or_else(|| fail("inside needs a scale"))?)?;
            let (param, body) =
                function(args.get(1).ok_or_else(|| fail("inside needs a lambda"))?)?;
            let env = env.clone();
            pat.inside(Fraction::approximate(n), move |p| {
                apply_fn(&param, &body, p, &env).unwrap_or_else(|_| silence())
            })
            .map_err(|e| fail(e.to_string()))?
        }
        "outside" => {
            let n = number(args.first().ok_or_else(|| fail("outside needs a scale"))?)?;
            let (param, body) =
                function(args.get(1).ok_or_else(|| fail("outside needs a lambda"))?)?;
            let env = env.clone();
            pat.outside(Fraction::approximate(n), move |p| {
                apply_fn(&param, &body, p, &env).unwrap_or_else(|_| silence())
            })
            .map_err(|e| fail(e.to_string()))?
        }
        "off" => {
            let dt = number(args.first().ok_or_else(|| fail("off needs an offset"))?)?;
            let (param, body) = function(args.get(1).ok_or_else(|| fail("off needs a lambda"))?)?;
            let env = env.clone();
            pat.off(Fraction::approximate(dt), move |p| {
                apply_fn(&param, &body, p, &env).unwrap_or_else(|_| silence())
            })
        }
        "superimpose" => {
            let (param, body) =
                function(args.first().ok_or_else(|| fail("superimpose needs a lambda"))?)?;
            let env = env.clone();
            pat.superimpose(move |p| apply_fn(&param, &body, p, &env).unwrap_or_else(|_| silence()))
        }
        "jux" => {
            let (param, body) = function(args.first().ok_or_else(|| fail("jux needs a lambda"))?)?;
            let env = env.clone();
            pat.jux(move |p| apply_fn(&param, &body, p, &env).unwrap_or_else(|_| silence()))
        }
        "juxBy" => {
            let w = number(args.first().ok_or_else(|| fail("juxBy needs a width"))?)?;
            let (param, body) = function(args.get(1).ok_or_else(|| fail("juxBy needs a lambda"))?)?;
            let env = env.clone();
            pat.jux_by(w, move |p| {
                apply_fn(&param, &body, p, &env).unwrap_or_else(|_| silence())
            })
        }
        "sometimes" | "often" | "rarely" | "almostAlways" | "almostNever" | "always" | "never" => {
            let (param, body) =
                function(args.first().ok_or_else(|| fail("needs a lambda"))?)?;
            let env = env.clone();
            let f = move |p| apply_fn(&param, &body, p, &env).unwrap_or_else(|_| silence());
            match name {
                "sometimes" => pat.sometimes(f),
                "often" => pat.often(f),
                "rarely" => pat.rarely(f),
                "almostAlways" => pat.almost_always(f),
                "almostNever" => pat.almost_never(f),
                "always" => pat.always(f),
                _ => pat.never(f),
            }
        }
        "sometimesBy" => {
            let x = number(args.first().ok_or_else(|| fail("sometimesBy needs an amount"))?)?;
            let (param, body) =
                function(args.get(1).ok_or_else(|| fail("sometimesBy needs a lambda"))?)?;
            let env = env.clone();
            pat.sometimes_by(x, move |p| {
                apply_fn(&param, &body, p, &env).unwrap_or_else(|_| silence())
            })
        }
        "someCyclesBy" => {
            let x = number(args.first().ok_or_else(|| fail("someCyclesBy needs an amount"))?)?;
            let (param, body) =
                function(args.get(1).ok_or_else(|| fail("someCyclesBy needs a lambda"))?)?;
            let env = env.clone();
            pat.some_cycles_by(x, move |p| {
                apply_fn(&param, &body, p, &env).unwrap_or_else(|_| silence())
            })
        }
        "add" => {
            let n = number(args.first().ok_or_else(|| fail("add needs an amount"))?)?;
            pat.fmap(move |mut d: VoiceData| {
                if let Some(v) = d.value.as_ref().and_then(|v| v.as_number()) {
                    d.value = Some(Value::Number(v + n));
                }
                if let Some(v) = d.note.as_ref().and_then(|v| v.as_number()) {
                    d.note = Some(Value::Number(v + n));
                }
                d
            })
        }
        "apply" => {
            let ctrl = voices(args.first().ok_or_else(|| fail("apply needs a control"))?)?;
            pat.apply(ctrl)
        }
        "mix" => {
            let ctrl = voices(args.first().ok_or_else(|| fail("mix needs a control"))?)?;
            pat.mix(ctrl)
        }
        other => {
            // Control setters as methods: .pan(0.5), .delay("0.2 0.5"), …
            let arg = args
                .first()
                .ok_or_else(|| fail(format!("{other} needs an argument")))?;
            let values = value_pattern(arg)?;
            let ctrl = sugar::control_by_name(other, values)
                .ok_or_else(|| fail(format!("unknown operator {other}")))?;
            pat.apply(ctrl)
        }
    };
    Ok(ScriptValue::Voices(out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use weft_core::TimeSpan;

    #[test]
    fn compiles_a_simple_chain() {
        let p = compile("sound(\"bd sd\").fast(2)").unwrap();
        assert_eq!(p.first_cycle().len(), 4);
    }

    #[test]
    fn bare_strings_become_value_patterns() {
        let p = compile("\"a b c\"").unwrap();
        assert_eq!(p.first_cycle().len(), 3);
    }

    #[test]
    fn parse_errors_yield_none() {
        assert!(compile("sound(").is_none());
        assert!(compile("sound(\"bd\").nosuchop(1)").is_none());
        assert!(compile("").is_none());
    }

    #[test]
    fn lambdas_drive_combinators() {
        let p = compile("sound(\"a b c d\").every(1, x => x.rev())").unwrap();
        let haps = p.first_cycle();
        let names: Vec<String> = haps
            .iter()
            .map(|h| h.value.sound.clone().unwrap())
            .collect();
        assert_eq!(names, vec!["d", "c", "b", "a"]);
    }

    #[test]
    fn controls_as_methods() {
        let p = compile("sound(\"bd\").pan(0.25).gain(\"0.5\")").unwrap();
        let haps = p.first_cycle();
        assert_eq!(haps[0].value.pan, Some(0.25));
        assert_eq!(haps[0].value.gain, Some(0.5));
    }

    #[test]
    fn signals_feed_controls() {
        let p = compile("sound(\"a b c d\").pan(saw())").unwrap();
        let pans: Vec<f64> = p
            .first_cycle()
            .iter()
            .map(|h| h.value.pan.unwrap())
            .collect();
        assert_eq!(pans, vec![0.0, 0.25, 0.5, 0.75]);
    }

    #[test]
    fn stack_and_cat_constructors() {
        let p = compile("stack(sound(\"bd\"), sound(\"hh hh\"))").unwrap();
        assert_eq!(p.first_cycle().len(), 3);

        let p = compile("cat(sound(\"bd\"), sound(\"sd\"))").unwrap();
        assert_eq!(p.first_cycle().len(), 1);
        assert_eq!(p.query_span(TimeSpan::from_ints(1, 2)).len(), 1);
    }

    #[test]
    fn jux_with_lambda() {
        let p = compile("sound(\"bd sd\").jux(x => x.rev())").unwrap();
        let haps = p.first_cycle();
        assert_eq!(haps.len(), 4);
        assert!(haps.iter().any(|h| h.value.pan == Some(0.0)));
        assert!(haps.iter().any(|h| h.value.pan == Some(1.0)));
    }

    #[test]
    fn numeric_chain_transforms() {
        let p = compile("note(\"0 1 2 3\").chunk(4, x => x.add(12))").unwrap();
        let vals: Vec<f64> = p
            .first_cycle()
            .iter()
            .map(|h| h.value.note.as_ref().unwrap().as_number().unwrap())
            .collect();
        assert_eq!(vals, vec![12.0, 1.0, 2.0, 3.0]);
    }

    #[test]
    fn mix_combines_control_fields() {
        let p = compile("sound(\"bd hh\").mix(orbit(\"0 2\"))").unwrap();
        let haps = p.first_cycle();
        assert_eq!(haps.len(), 2);
        assert_eq!(haps[0].value.sound, Some("bd".into()));
        assert_eq!(haps[0].value.orbit, Some(0));
        assert_eq!(haps[1].value.sound, Some("hh".into()));
        assert_eq!(haps[1].value.orbit, Some(2));
    }

    #[test]
    fn pickmod_out_from_script() {
        let p = compile("pickmodOut(\"0 1 2\", [sound(\"bd hh\"), sound(\"sd oh\")])").unwrap();
        let haps: Vec<_> = p
            .first_cycle()
            .into_iter()
            .filter(|h| h.has_onset())
            .collect();
        assert_eq!(haps.len(), 3);
        let names: Vec<String> = haps
            .iter()
            .map(|h| h.value.sound.clone().unwrap())
            .collect();
        assert_eq!(names, vec!["bd", "sd", "hh"]);
    }

    #[test]
    fn seed_is_reachable() {
        let p = compile("sound(\"bd*16\").degradeBy(0.5).seed(9)").unwrap();
        let a = p.first_cycle().len();
        let b = p.first_cycle().len();
        assert_eq!(a, b);
    }
}
