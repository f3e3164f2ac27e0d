use crate::span::Span;
use logos::Logos;

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n]+")]
pub enum Token {
    #[regex(r"-?[0-9]+\.?[0-9]*([eE][+-]?[0-9]+)?", parse_number, priority = 10)]
    Number(f64),

    // Word-like atoms: note names, sample names, `t`/`f` flags.
    #[regex(r"[a-zA-Z][a-zA-Z0-9_#'-]*", priority = 5)]
    Atom,

    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("<")]
    LAngle,
    #[token(">")]
    RAngle,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,

    #[token(",")]
    Comma,
    #[token("|")]
    Pipe,
    #[token(".")]
    Dot,

    #[token("@")]
    At,
    #[token("_")]
    Underscore,
    #[token("!")]
    Bang,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("?")]
    Question,
    #[token(":")]
    Colon,
    #[token("%")]
    Percent,

    #[token("~")]
    Tilde,
    #[token("-")]
    Dash,

    #[regex(r"//[^\n]*")]
    Comment,

    Error,
}

fn parse_number(lex: &mut logos::Lexer<Token>) -> Option<f64> {
    lex.slice().parse().ok()
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Number(n) => write!(f, "{}", n),
            Token::Atom => write!(f, "atom"),
            Token::LBracket => write!(f, "["),
            Token::RBracket => write!(f, "]"),
            Token::LBrace => write!(f, "{{"),
            Token::RBrace => write!(f, "}}"),
            Token::LAngle => write!(f, "<"),
            Token::RAngle => write!(f, ">"),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::Comma => write!(f, ","),
            Token::Pipe => write!(f, "|"),
            Token::Dot => write!(f, "."),
            Token::At => write!(f, "@"),
            Token::Underscore => write!(f, "_"),
            Token::Bang => write!(f, "!"),
            Token::Star => write!(f, "*"),
            Token::Slash => write!(f, "/"),
            Token::Question => write!(f, "?"),
            Token::Colon => write!(f, ":"),
            Token::Percent => write!(f, "%"),
            Token::Tilde => write!(f, "~"),
            Token::Dash => write!(f, "-"),
            Token::Comment => write!(f, "comment"),
            Token::Error => write!(f, "error"),
        }
    }
}

/// Lexer wrapper with one-token lookahead and slice access.
pub struct Lexer<'source> {
    inner: logos::Lexer<'source, Token>,
    peeked: Option<Option<(Token, Span)>>,
}

impl<'source> Lexer<'source> {
    pub fn new(source: &'source str) -> Self {
        Lexer {
            inner: Token::lexer(source),
            peeked: None,
        }
    }

    pub fn next_token(&mut self) -> Option<(Token, Span)> {
        if let Some(peeked) = self.peeked.take() {
            return peeked;
        }
        loop {
            let token = self.inner.next()?;
            let span = Span::from(self.inner.span());
            if matches!(token, Ok(Token::Comment)) {
                continue;
            }
            let token = token.unwrap_or(Token::Error);
            return Some((token, span));
        }
    }

    pub fn peek_token(&mut self) -> Option<(Token, Span)> {
        if self.peeked.is_none() {
            self.peeked = Some(self.next_token());
        }
        self.peeked.as_ref().and_then(|x| x.clone())
    }

    pub fn source(&self) -> &'source str {
        self.inner.source()
    }

    pub fn slice(&self, span: Span) -> &'source str {
        &self.source()[span.to_range()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(input: &str) -> Vec<Token> {
        let mut lexer = Lexer::new(input);
        let mut tokens = Vec::new();
        while let Some((token, _)) = lexer.next_token() {
            tokens.push(token);
        }
        tokens
    }

    #[test]
    fn atoms_and_numbers() {
        assert_eq!(
            lex("bd sd 1 2.5 -3"),
            vec![
                Token::Atom,
                Token::Atom,
                Token::Number(1.0),
                Token::Number(2.5),
                Token::Number(-3.0)
            ]
        );
    }

    #[test]
    fn silence_tokens() {
        assert_eq!(lex("~ -"), vec![Token::Tilde, Token::Dash]);
    }

    #[test]
    fn modifiers() {
        assert_eq!(
            lex("bd*2 sd@3 cp? hh!2"),
            vec![
                Token::Atom,
                Token::Star,
                Token::Number(2.0),
                Token::Atom,
                Token::At,
                Token::Number(3.0),
                Token::Atom,
                Token::Question,
                Token::Atom,
                Token::Bang,
                Token::Number(2.0),
            ]
        );
    }

    #[test]
    fn euclid_and_groups() {
        assert_eq!(
            lex("bd(3,8) [sd,cp]*2 {a b}%4 <x y>"),
            vec![
                Token::Atom,
                Token::LParen,
                Token::Number(3.0),
                Token::Comma,
                Token::Number(8.0),
                Token::RParen,
                Token::LBracket,
                Token::Atom,
                Token::Comma,
                Token::Atom,
                Token::RBracket,
                Token::Star,
                Token::Number(2.0),
                Token::LBrace,
                Token::Atom,
                Token::Atom,
                Token::RBrace,
                Token::Percent,
                Token::Number(4.0),
                Token::LAngle,
                Token::Atom,
                Token::Atom,
                Token::RAngle,
            ]
        );
    }

    #[test]
    fn colon_index() {
        assert_eq!(
            lex("bd:3"),
            vec![Token::Atom, Token::Colon, Token::Number(3.0)]
        );
    }

    #[test]
    fn comments_are_skipped() {
        assert_eq!(lex("bd // a comment\nsd"), vec![Token::Atom, Token::Atom]);
    }

    #[test]
    fn slices_recover_source_text() {
        let mut lexer = Lexer::new("bd sd");
        let (token, span) = lexer.next_token().unwrap();
        assert_eq!(token, Token::Atom);
        assert_eq!(lexer.slice(span), "bd");
    }

    #[test]
    fn peek_does_not_consume() {
        let mut lexer = Lexer::new("bd");
        assert_eq!(lexer.peek_token().unwrap().0, Token::Atom);
        assert_eq!(lexer.peek_token().unwrap().0, Token::Atom);
        assert_eq!(lexer.next_token().unwrap().0, Token::Atom);
        assert!(lexer.next_token().is_none());
    }
}
