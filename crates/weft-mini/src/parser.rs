use crate::ast::*;
use crate::error::{ParseError, Result};
use crate::lexer::{Lexer, Token};
use crate::span::Span;

/// Recursive-descent parser for the notation language.
pub struct Parser<'source> {
    lexer: Lexer<'source>,
    site_counter: u64,
}

impl<'source> Parser<'source> {
    pub fn new(source: &'source str) -> Self {
        Parser {
            lexer: Lexer::new(source),
            site_counter: 0,
        }
    }

    /// Parse a complete pattern, requiring the whole input to be consumed.
    pub fn parse_pattern(&mut self) -> Result<Ast> {
        let ast = self.parse_groups()?;
        if let Some((token, span)) = self.peek() {
            return Err(ParseError::unexpected_token(
                "end of input",
                token.to_string(),
                span,
            ));
        }
        Ok(ast)
    }

    /// Parse stack (`,`) or random choice (`|`) separated groups. Feet
    /// (`.`) bind tighter and are handled one level down.
    fn parse_groups(&mut self) -> Result<Ast> {
        let first = self.parse_feet()?;

        let alignment = match self.peek() {
            Some((Token::Comma, _)) => Some(Alignment::Stack),
            Some((Token::Pipe, _)) => Some(Alignment::Rand),
            _ => None,
        };

        let Some(alignment) = alignment else {
            return Ok(self.unwrap_single(first));
        };

        let mut children = vec![Ast::Group(first)];
        while let Some((token, _)) = self.peek() {
            let matches_sep = matches!(
                (alignment, &token),
                (Alignment::Stack, Token::Comma) | (Alignment::Rand, Token::Pipe)
            );
            if !matches_sep {
                break;
            }
            self.next();
            children.push(Ast::Group(self.parse_feet()?));
        }

        let span = children[0].span().merge(children.last().unwrap().span());
        let mut group = GroupNode::new(children, alignment, span);
        if alignment == Alignment::Rand {
            group = group.with_site(self.fresh_site());
        }
        Ok(Ast::Group(group))
    }

    /// Dot-separated feet: `a b . c d` plays like `[a b] [c d]`.
    fn parse_feet(&mut self) -> Result<GroupNode> {
        let first = self.parse_sequence()?;
        if !matches!(self.peek(), Some((Token::Dot, _))) {
            return Ok(first);
        }
        let mut children = vec![Ast::Group(first)];
        while let Some((Token::Dot, _)) = self.peek() {
            self.next();
            children.push(Ast::Group(self.parse_sequence()?));
        }
        let span = children[0].span().merge(children.last().unwrap().span());
        Ok(GroupNode::new(children, Alignment::Feet, span))
    }

    /// A plain one-child fastcat of one unmodified group collapses to the
    /// group itself.
    fn unwrap_single(&self, group: GroupNode) -> Ast {
        if group.children.len() == 1 {
            if let Ast::Element(element) = &group.children[0] {
                if element.ops.is_empty() && element.reps == 1 && element.weight == 1.0 {
                    if let Ast::Group(inner) = element.source.as_ref() {
                        if inner.alignment != Alignment::Fastcat {
                            return Ast::Group(inner.clone());
                        }
                    }
                }
            }
        }
        Ast::Group(group)
    }

    /// Space-separated elements.
    fn parse_sequence(&mut self) -> Result<GroupNode> {
        let mut elements = Vec::new();

        let start_span = self
            .peek()
            .map(|(_, span)| span)
            .unwrap_or(Span::new(0, 0));

        elements.push(Ast::Element(self.parse_element()?));

        while let Some((token, _)) = self.peek() {
            if matches!(
                token,
                Token::Comma
                    | Token::Pipe
                    | Token::Dot
                    | Token::RBracket
                    | Token::RBrace
                    | Token::RAngle
                    | Token::RParen
            ) {
                break;
            }
            elements.push(Ast::Element(self.parse_element()?));
        }

        let span = start_span.merge(elements.last().unwrap().span());
        Ok(GroupNode::new(elements, Alignment::Fastcat, span))
    }

    /// One step with its modifiers.
    fn parse_element(&mut self) -> Result<ElementNode> {
        let source = self.parse_slice()?;
        let start_span = source.span();
        let mut element = ElementNode::new(source, start_span);
        let mut end_span = start_span;

        loop {
            match self.peek() {
                Some((Token::Star, _)) => {
                    self.next();
                    let amount = self.parse_slice()?;
                    end_span = amount.span();
                    element.ops.push(StepOp::Fast(Box::new(amount)));
                }
                Some((Token::Slash, _)) => {
                    self.next();
                    let amount = self.parse_slice()?;
                    end_span = amount.span();
                    element.ops.push(StepOp::Slow(Box::new(amount)));
                }
                Some((Token::At, at_span)) => {
                    self.next();
                    match self.peek() {
                        Some((Token::Number(n), span)) => {
                            self.next();
                            element.weight = n;
                            end_span = span;
                        }
                        _ => {
                            return Err(ParseError::unexpected_token(
                                "number after @",
                                self.peek()
                                    .map(|(t, _)| t.to_string())
                                    .unwrap_or_else(|| "end of input".into()),
                                at_span,
                            ));
                        }
                    }
                }
                Some((Token::Underscore, span)) => {
                    self.next();
                    element.weight += 1.0;
                    end_span = span;
                }
                Some((Token::Bang, span)) => {
                    self.next();
                    if let Some((Token::Number(n), num_span)) = self.peek() {
                        self.next();
                        element.reps = n.max(0.0) as usize;
                        end_span = num_span;
                    } else {
                        element.reps += 1;
                        end_span = span;
                    }
                }
                Some((Token::Question, span)) => {
                    self.next();
                    let amount = if let Some((Token::Number(n), num_span)) = self.peek() {
                        self.next();
                        end_span = num_span;
                        Some(n)
                    } else {
                        end_span = span;
                        None
                    };
                    element.ops.push(StepOp::Degrade {
                        amount,
                        site: self.fresh_site(),
                    });
                }
                Some((Token::Colon, _)) => {
                    self.next();
                    let index = self.parse_slice()?;
                    end_span = index.span();
                    element.ops.push(StepOp::Index(Box::new(index)));
                }
                Some((Token::LParen, _)) => {
                    self.next();
                    let pulse = Box::new(Ast::Element(self.parse_element()?));
                    self.expect(Token::Comma)?;
                    let step = Box::new(Ast::Element(self.parse_element()?));
                    let rotation = if let Some((Token::Comma, _)) = self.peek() {
                        self.next();
                        Some(Box::new(Ast::Element(self.parse_element()?)))
                    } else {
                        None
                    };
                    end_span = self.expect(Token::RParen)?;
                    element.ops.push(StepOp::Euclid {
                        pulse,
                        step,
                        rotation,
                    });
                }
                _ => break,
            }
        }

        element.span = start_span.merge(end_span);
        Ok(element)
    }

    /// An atom, silence, or bracketed group.
    fn parse_slice(&mut self) -> Result<Ast> {
        match self.peek() {
            Some((Token::LBracket, open)) => {
                self.next();
                let inner = self.parse_groups()?;
                let close = self.expect_closing(Token::RBracket, '[', open)?;
                Ok(respan(inner, open.merge(close)))
            }
            Some((Token::LAngle, open)) => {
                self.next();
                let children = self.parse_comma_sequences(Token::RAngle)?;
                let close = self.expect_closing(Token::RAngle, '<', open)?;
                Ok(Ast::Group(GroupNode::new(
                    children,
                    Alignment::Slowcat,
                    open.merge(close),
                )))
            }
            Some((Token::LBrace, open)) => {
                self.next();
                let children = self.parse_comma_sequences(Token::RBrace)?;
                let close = self.expect_closing(Token::RBrace, '{', open)?;
                let mut group =
                    GroupNode::new(children, Alignment::Polymeter, open.merge(close));
                if let Some((Token::Percent, _)) = self.peek() {
                    self.next();
                    group.steps_per_cycle = Some(Box::new(self.parse_slice()?));
                }
                Ok(Ast::Group(group))
            }
            Some((Token::Tilde | Token::Dash, span)) => {
                self.next();
                Ok(Ast::Atom(AtomNode::silence(span)))
            }
            Some((Token::Number(n), span)) => {
                self.next();
                Ok(Ast::Atom(AtomNode::number(n, span)))
            }
            Some((Token::Atom, span)) => {
                let text = self.lexer.slice(span).to_string();
                self.next();
                Ok(Ast::Atom(AtomNode::string(text, span)))
            }
            Some((token, span)) => Err(ParseError::unexpected_token(
                "atom, number, or opening delimiter",
                token.to_string(),
                span,
            )),
            None => Err(ParseError::unexpected_eof("step")),
        }
    }

    /// Comma-separated sequences inside `<>` or `{}`.
    fn parse_comma_sequences(&mut self, closer: Token) -> Result<Vec<Ast>> {
        let mut children = vec![Ast::Group(self.parse_sequence()?)];
        loop {
            match self.peek() {
                Some((Token::Comma, _)) => {
                    self.next();
                    children.push(Ast::Group(self.parse_sequence()?));
                }
                Some((token, _)) if token == closer => break,
                _ => break,
            }
        }
        Ok(children)
    }

    fn fresh_site(&mut self) -> u64 {
        let site = self.site_counter;
        self.site_counter += 1;
        site
    }

    fn peek(&mut self) -> Option<(Token, Span)> {
        self.lexer.peek_token()
    }

    fn next(&mut self) -> Option<(Token, Span)> {
        self.lexer.next_token()
    }

    fn expect(&mut self, expected: Token) -> Result<Span> {
        match self.next() {
            Some((token, span)) if token == expected => Ok(span),
            Some((token, span)) => Err(ParseError::unexpected_token(
                expected.to_string(),
                token.to_string(),
                span,
            )),
            None => Err(ParseError::unexpected_eof(expected.to_string())),
        }
    }

    fn expect_closing(&mut self, expected: Token, delimiter: char, open_span: Span) -> Result<Span> {
        match self.next() {
            Some((token, span)) if token == expected => Ok(span),
            Some((token, span)) => Err(ParseError::unexpected_token(
                expected.to_string(),
                token.to_string(),
                span,
            )),
            None => Err(ParseError::UnclosedDelimiter {
                delimiter,
                open_span,
            }),
        }
    }
}

fn respan(ast: Ast, span: Span) -> Ast {
    match ast {
        Ast::Group(mut g) => {
            g.span = span;
            Ast::Group(g)
        }
        Ast::Atom(mut a) => {
            a.span = span;
            Ast::Atom(a)
        }
        Ast::Element(mut e) => {
            e.span = span;
            Ast::Element(e)
        }
    }
}

/// Parse a notation string into an AST.
pub fn parse(source: &str) -> Result<Ast> {
    Parser::new(source).parse_pattern()
}
