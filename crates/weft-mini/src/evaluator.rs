//! Turn a parsed notation tree into an executable pattern.

use crate::ast::*;
use crate::error::{ParseError, Result};
use crate::span::Span;
use weft_core::{
    choose_cycles_site, fastcat, polymeter, polymeter_steps, pure, silence, slowcat, stack,
    timecat, wchoose_cycles_site, Fraction, Pattern, PatternError, Value,
};

/// Evaluate an AST node into a pattern of raw values.
pub fn evaluate(ast: &Ast) -> Result<Pattern<Value>> {
    match ast {
        Ast::Atom(atom) => Ok(eval_atom(atom)),
        Ast::Group(group) => eval_group(group),
        Ast::Element(element) => eval_element(element),
    }
}

fn eval_atom(atom: &AtomNode) -> Pattern<Value> {
    match &atom.value {
        AtomValue::Number(n) => pure(Value::Number(*n)),
        AtomValue::String(s) => pure(Value::String(s.clone())),
        AtomValue::Silence => silence(),
    }
}

fn eval_group(group: &GroupNode) -> Result<Pattern<Value>> {
    if group.children.is_empty() {
        return Ok(silence());
    }

    match group.alignment {
        Alignment::Fastcat | Alignment::Feet => {
            let mut weighted = Vec::new();
            for child in &group.children {
                let pattern = evaluate(child)?;
                let weight = extract_weight(child);
                for _ in 0..extract_reps(child) {
                    weighted.push((weight, pattern.clone()));
                }
            }
            Ok(cat_weighted(weighted))
        }
        Alignment::Stack => {
            let children: Result<Vec<_>> = group.children.iter().map(evaluate).collect();
            Ok(stack(children?))
        }
        Alignment::Rand => {
            let site = group.site.unwrap_or(0);
            let mut pairs = Vec::new();
            for child in &group.children {
                pairs.push((evaluate(child)?, extract_weight(child)));
            }
            if pairs.iter().any(|(_, w)| *w != 1.0) {
                Ok(wchoose_cycles_site(pairs, site))
            } else {
                Ok(choose_cycles_site(
                    pairs.into_iter().map(|(p, _)| p).collect(),
                    site,
                ))
            }
        }
        Alignment::Slowcat => {
            // Children are the comma-separated sub-sequences; each becomes
            // a per-cycle alternation, commas stack them.
            let mut layers = Vec::new();
            for child in &group.children {
                let Ast::Group(sequence) = child else {
                    layers.push(slowcat(vec![evaluate(child)?]));
                    continue;
                };
                let mut steps = Vec::new();
                for element in &sequence.children {
                    let pattern = evaluate(element)?;
                    for _ in 0..slowcat_copies(element) {
                        steps.push(pattern.clone());
                    }
                }
                layers.push(slowcat(steps));
            }
            Ok(stack(layers))
        }
        Alignment::Polymeter => {
            let children: Result<Vec<_>> = group.children.iter().map(evaluate).collect();
            let children = children?;
            match &group.steps_per_cycle {
                Some(steps_ast) => {
                    let n = extract_number(steps_ast).ok_or_else(|| {
                        ParseError::custom(
                            "polymeter step count must be a number",
                            Some(steps_ast.span()),
                        )
                    })?;
                    let steps = Fraction::approximate(n);
                    let adjusted: Result<Vec<_>> = children
                        .into_iter()
                        .map(|p| {
                            polymeter_steps(steps, p)
                                .map_err(|e| core_error(e, group.span))
                        })
                        .collect();
                    Ok(stack(adjusted?))
                }
                None => Ok(polymeter(children)),
            }
        }
    }
}

/// Weighted concatenation, falling back to the plain split when every
/// weight is the default.
fn cat_weighted(weighted: Vec<(f64, Pattern<Value>)>) -> Pattern<Value> {
    if weighted.iter().all(|(w, _)| *w == 1.0) {
        fastcat(weighted.into_iter().map(|(_, p)| p).collect())
    } else {
        timecat(
            weighted
                .into_iter()
                .map(|(w, p)| (Fraction::approximate(w), p))
                .collect(),
        )
    }
}

fn eval_element(element: &ElementNode) -> Result<Pattern<Value>> {
    let mut pattern = evaluate(&element.source)?;
    for op in &element.ops {
        pattern = apply_op(pattern, op, element.span)?;
    }
    Ok(pattern)
}

fn apply_op(pattern: Pattern<Value>, op: &StepOp, span: Span) -> Result<Pattern<Value>> {
    match op {
        StepOp::Fast(amount) => match extract_number(amount) {
            Some(n) => pattern
                .fast(Fraction::approximate(n))
                .map_err(|e| core_error(e, span)),
            None => Ok(pattern.fast_with(evaluate(amount)?.numbers())),
        },
        StepOp::Slow(amount) => match extract_number(amount) {
            Some(n) => pattern
                .slow(Fraction::approximate(n))
                .map_err(|e| core_error(e, span)),
            None => Ok(pattern.slow_with(evaluate(amount)?.numbers())),
        },
        StepOp::Euclid {
            pulse,
            step,
            rotation,
        } => {
            let pulse = extract_number(pulse)
                .ok_or_else(|| ParseError::custom("pulse count must be a number", Some(span)))?;
            let step = extract_number(step)
                .ok_or_else(|| ParseError::custom("step count must be a number", Some(span)))?;
            let rotation = match rotation {
                Some(r) => extract_number(r).ok_or_else(|| {
                    ParseError::custom("rotation must be a number", Some(span))
                })?,
                None => 0.0,
            };
            pattern
                .euclid_rot(pulse as i64, step as i64, rotation as i64)
                .map_err(|e| core_error(e, span))
        }
        StepOp::Degrade { amount, site } => {
            Ok(pattern.degrade_site(amount.unwrap_or(0.5), *site))
        }
        StepOp::Index(index) => {
            let suffix = match index.as_ref() {
                Ast::Atom(AtomNode {
                    value: AtomValue::Number(n),
                    ..
                }) => format_number(*n),
                Ast::Atom(AtomNode {
                    value: AtomValue::String(s),
                    ..
                }) => s.clone(),
                other => {
                    return Err(ParseError::custom(
                        "index suffix must be an atom",
                        Some(other.span()),
                    ));
                }
            };
            Ok(pattern.fmap(move |v| Value::String(format!("{v}:{suffix}"))))
        }
    }
}

fn core_error(err: PatternError, span: Span) -> ParseError {
    ParseError::custom(err.to_string(), Some(span))
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

/// Read a literal number out of an AST fragment, looking through
/// single-element wrappers.
fn extract_number(ast: &Ast) -> Option<f64> {
    match ast {
        Ast::Atom(atom) => match atom.value {
            AtomValue::Number(n) => Some(n),
            _ => None,
        },
        Ast::Element(element) if element.ops.is_empty() => extract_number(&element.source),
        Ast::Group(group) if group.children.len() == 1 => extract_number(&group.children[0]),
        _ => None,
    }
}

fn extract_weight(ast: &Ast) -> f64 {
    match ast {
        Ast::Element(element) => element.weight,
        Ast::Group(group) if group.children.len() == 1 => extract_weight(&group.children[0]),
        _ => 1.0,
    }
}

fn extract_reps(ast: &Ast) -> usize {
    match ast {
        Ast::Element(element) => element.reps,
        _ => 1,
    }
}

/// Inside `<>`, both `!n` and `@n` read as repetition counts.
fn slowcat_copies(ast: &Ast) -> usize {
    match ast {
        Ast::Element(element) => {
            let weight = if element.weight > 1.0 {
                element.weight.round() as usize
            } else {
                1
            };
            element.reps.max(1) * weight
        }
        _ => 1,
    }
}

/// Parse and evaluate in one step.
pub fn pattern(source: &str) -> Result<Pattern<Value>> {
    evaluate(&crate::parser::parse(source)?)
}
