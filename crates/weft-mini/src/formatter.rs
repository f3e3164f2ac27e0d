//! Render an AST back to notation text.

use crate::ast::*;

/// Format an AST node as notation.
pub fn format(ast: &Ast) -> String {
    match ast {
        Ast::Atom(atom) => format_atom(atom),
        Ast::Group(group) => format_group(group),
        Ast::Element(element) => format_element(element),
    }
}

fn format_atom(atom: &AtomNode) -> String {
    match &atom.value {
        AtomValue::Number(n) => {
            if n.fract() == 0.0 {
                format!("{}", *n as i64)
            } else {
                format!("{}", n)
            }
        }
        AtomValue::String(s) => s.clone(),
        AtomValue::Silence => "~".to_string(),
    }
}

fn format_group(group: &GroupNode) -> String {
    let children: Vec<String> = group.children.iter().map(format).collect();

    match group.alignment {
        Alignment::Fastcat => children.join(" "),
        Alignment::Stack => children.join(", "),
        Alignment::Rand => children.join(" | "),
        Alignment::Feet => children.join(" . "),
        // Sequence children of <> and {} are groups already; their text
        // needs no extra brackets inside the delimiters.
        Alignment::Slowcat => format!("<{}>", children.join(", ")),
        Alignment::Polymeter => {
            let inner = children.join(", ");
            match &group.steps_per_cycle {
                Some(steps) => format!("{{{}}}%{}", inner, format(steps)),
                None => format!("{{{}}}", inner),
            }
        }
    }
}

fn format_element(element: &ElementNode) -> String {
    let mut out = String::new();

    match element.source.as_ref() {
        Ast::Group(group) => match group.alignment {
            Alignment::Polymeter | Alignment::Slowcat => out.push_str(&format_group(group)),
            _ => {
                out.push('[');
                out.push_str(&format_group(group));
                out.push(']');
            }
        },
        other => out.push_str(&format(other)),
    }

    for op in &element.ops {
        out.push_str(&format_op(op));
    }

    if element.reps > 1 {
        out.push_str(&format!("!{}", element.reps));
    }
    if element.weight != 1.0 {
        if element.weight.fract() == 0.0 {
            out.push_str(&format!("@{}", element.weight as i64));
        } else {
            out.push_str(&format!("@{}", element.weight));
        }
    }

    out
}

fn format_op(op: &StepOp) -> String {
    match op {
        StepOp::Fast(amount) => format!("*{}", format(amount)),
        StepOp::Slow(amount) => format!("/{}", format(amount)),
        StepOp::Euclid {
            pulse,
            step,
            rotation,
        } => match rotation {
            Some(rot) => format!("({},{},{})", format(pulse), format(step), format(rot)),
            None => format!("({},{})", format(pulse), format(step)),
        },
        StepOp::Degrade { amount, .. } => match amount {
            Some(a) => format!("?{}", a),
            None => "?".to_string(),
        },
        StepOp::Index(index) => format!(":{}", format(index)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    // Formatting then reparsing must not change the meaning; spans and
    // random sites may differ, so compare the shape.
    fn roundtrip(input: &str) {
        let ast = parse(input).unwrap();
        let formatted = format(&ast);
        let ast2 = parse(&formatted).unwrap();
        assert_eq!(
            shape(&ast),
            shape(&ast2),
            "roundtrip changed '{input}' -> '{formatted}'"
        );
    }

    fn shape(ast: &Ast) -> String {
        match ast {
            Ast::Atom(a) => format!("A({:?})", a.value),
            Ast::Group(g) => format!(
                "G({:?},{},[{}])",
                g.alignment,
                g.steps_per_cycle
                    .as_ref()
                    .map(|s| shape(s))
                    .unwrap_or_default(),
                g.children.iter().map(shape).collect::<Vec<_>>().join(",")
            ),
            Ast::Element(e) => format!(
                "E({},{},{},ops={})",
                shape(&e.source),
                e.weight,
                e.reps,
                e.ops.len()
            ),
        }
    }

    #[test]
    fn atoms() {
        roundtrip("bd");
        roundtrip("42");
        roundtrip("3.25");
        roundtrip("~");
    }

    #[test]
    fn sequences() {
        roundtrip("bd sd cp hh");
        roundtrip("bd [sd cp]");
    }

    #[test]
    fn modifiers() {
        roundtrip("bd*2");
        roundtrip("cp/3");
        roundtrip("bd(3,8)");
        roundtrip("sd(5,16,2)");
        roundtrip("bd?");
        roundtrip("bd:3");
        roundtrip("a@3 b");
        roundtrip("a!2 b");
    }

    #[test]
    fn groupings() {
        roundtrip("bd, sd, cp");
        roundtrip("{bd sd, cp hh oh}");
        roundtrip("{a b c}%4");
        roundtrip("<bd sd cp>");
        roundtrip("a b . c d");
    }

    #[test]
    fn random_choice() {
        roundtrip("bd | sd | cp");
    }
}
