//! Hand-written SPARQL 1.1 tokenizer, using the same recursive-descent
//! approach as `spargebra` (no external grammar crate).
//!
//! This is a pragmatic tokenizer, not a full EBNF-faithful one: it recognizes
//! the token shapes SPARQL 1.1 needs (IRIREFs, prefixed names, variables,
//! blank node labels, quoted literals with optional `@lang`/`^^datatype`,
//! numeric literals, and punctuation/operators) and lets the parser attach
//! keyword meaning to bare identifiers.

use crate::error::{ParseError, Position};

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Iri(String),
    PrefixedName(String, String),
    /// A bare `prefix:` with no local part (used by `PREFIX ex: <...>`).
    PrefixNs(String),
    Variable(String),
    BlankNode(String),
    String(String),
    LangTag(String),
    /// Raw lexical form of a numeric literal, e.g. `"42"`, `"3.14"`, `"1.0e10"`.
    Numeric(String),
    /// A bare identifier: keyword candidate, `true`/`false`, or the `a` shorthand.
    Ident(String),
    /// Single-character punctuation: `{ } ( ) [ ] . , ; | / ^ ? + * ! =  < >`
    Punct(char),
    /// Multi-character operators: `!= <= >= && || :=`
    Op(&'static str),
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpannedToken {
    pub token: Token,
    pub position: Position,
}

pub struct Lexer<'a> {
    input: &'a str,
    bytes: &'a [u8],
    pos: usize,
    line: u32,
    column: u32,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Lexer { input, bytes: input.as_bytes(), pos: 0, line: 1, column: 1 }
    }

    fn position(&self) -> Position {
        Position { line: self.line, column: self.column }
    }

    fn peek_char(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek_char()?;
        self.pos += c.len_utf8();
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn skip_trivia(&mut self) {
        loop {
            match self.peek_char() {
                Some(c) if c.is_whitespace() => {
                    self.advance();
                }
                Some('#') => {
                    while let Some(c) = self.peek_char() {
                        if c == '\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                _ => break,
            }
        }
    }

    pub fn next_token(&mut self) -> Result<SpannedToken, ParseError> {
        self.skip_trivia();
        let position = self.position();
        let Some(c) = self.peek_char() else {
            return Ok(SpannedToken { token: Token::Eof, position });
        };
        let token = match c {
            '<' => self.lex_iri(position)?,
            '?' | '$' => self.lex_variable()?,
            '_' => self.lex_blank_node(position)?,
            '"' | '\'' => self.lex_string(position)?,
            '@' => self.lex_lang_tag(position)?,
            c if c.is_ascii_digit() => self.lex_numeric(),
            '+' | '-' if self.following_is_digit() => self.lex_numeric(),
            c if is_pn_char_base(c) => self.lex_prefixed_name_or_ident(position)?,
            '!' | '<' | '>' | ':' | '&' | '|' => self.lex_operator(position)?,
            '{' | '}' | '(' | ')' | '[' | ']' | '.' | ',' | ';' | '/' | '^' | '?' | '+' | '*' | '=' => {
                self.advance();
                Token::Punct(c)
            }
            other => {
                return Err(ParseError::new(position, format!("unexpected character {other:?}")));
            }
        };
        Ok(SpannedToken { token, position })
    }

    fn following_is_digit(&self) -> bool {
        let mut chars = self.input[self.pos..].chars();
        chars.next();
        matches!(chars.next(), Some(c) if c.is_ascii_digit())
    }

    fn lex_iri(&mut self, position: Position) -> Result<Token, ParseError> {
        self.advance(); // consume '<'
        let mut out = String::new();
        loop {
            match self.advance() {
                Some('>') => break,
                Some(c) if c.is_whitespace() || c == '<' || c == '"' || c == '{' || c == '}' || c == '|' || c == '^' || c == '`' => {
                    return Err(ParseError::new(position, "invalid character inside IRIREF"));
                }
                Some(c) => out.push(c),
                None => return Err(ParseError::new(position, "unterminated IRIREF")),
            }
        }
        Ok(Token::Iri(out))
    }

    fn lex_variable(&mut self) -> Result<Token, ParseError> {
        let position = self.position();
        self.advance(); // '?' or '$'
        let mut out = String::new();
        while let Some(c) = self.peek_char() {
            if is_pn_char(c) {
                out.push(c);
                self.advance();
            } else {
                break;
            }
        }
        if out.is_empty() {
            return Err(ParseError::new(position, "empty variable name"));
        }
        Ok(Token::Variable(out))
    }

    fn lex_blank_node(&mut self, position: Position) -> Result<Token, ParseError> {
        self.advance(); // '_'
        if self.peek_char() != Some(':') {
            // A bare PN_CHAR_BASE starting with '_' is not valid SPARQL outside blank node
            // labels; treat as identifier start for forward compatibility with lenient input.
            let mut out = String::from("_");
            while let Some(c) = self.peek_char() {
                if is_pn_char(c) {
                    out.push(c);
                    self.advance();
                } else {
                    break;
                }
            }
            return Ok(Token::Ident(out));
        }
        self.advance(); // ':'
        let mut out = String::new();
        while let Some(c) = self.peek_char() {
            if is_pn_char(c) || c == '.' {
                out.push(c);
                self.advance();
            } else {
                break;
            }
        }
        if out.is_empty() {
            return Err(ParseError::new(position, "empty blank node label"));
        }
        Ok(Token::BlankNode(out))
    }

    fn lex_string(&mut self, position: Position) -> Result<Token, ParseError> {
        let quote = self.advance().unwrap();
        let long = self.peek_char() == Some(quote) && self.input[self.pos + 1..].starts_with(quote);
        if long {
            self.advance();
            self.advance();
        }
        let mut out = String::new();
        loop {
            if long {
                if self.peek_char() == Some(quote) {
                    let save = self.pos;
                    self.advance();
                    if self.peek_char() == Some(quote) {
                        self.advance();
                        if self.peek_char() == Some(quote) {
                            self.advance();
                            break;
                        }
                    }
                    self.pos = save;
                }
            } else if self.peek_char() == Some(quote) {
                self.advance();
                break;
            }
            match self.advance() {
                Some('\\') => out.push(self.lex_escape(position)?),
                Some(c) => out.push(c),
                None => return Err(ParseError::new(position, "unterminated string literal")),
            }
        }
        Ok(Token::String(out))
    }

    fn lex_escape(&mut self, position: Position) -> Result<char, ParseError> {
        match self.advance() {
            Some('n') => Ok('\n'),
            Some('t') => Ok('\t'),
            Some('r') => Ok('\r'),
            Some('b') => Ok('\u{8}'),
            Some('f') => Ok('\u{c}'),
            Some('"') => Ok('"'),
            Some('\'') => Ok('\''),
            Some('\\') => Ok('\\'),
            Some('u') => self.lex_unicode_escape(position, 4),
            Some('U') => self.lex_unicode_escape(position, 8),
            _ => Err(ParseError::new(position, "invalid escape sequence")),
        }
    }

    fn lex_unicode_escape(&mut self, position: Position, digits: u32) -> Result<char, ParseError> {
        let mut value = 0u32;
        for _ in 0..digits {
            let c = self.advance().ok_or_else(|| ParseError::new(position, "truncated unicode escape"))?;
            let d = c.to_digit(16).ok_or_else(|| ParseError::new(position, "invalid unicode escape digit"))?;
            value = value * 16 + d;
        }
        char::from_u32(value).ok_or_else(|| ParseError::new(position, "invalid unicode code point"))
    }

    fn lex_lang_tag(&mut self, position: Position) -> Result<Token, ParseError> {
        self.advance(); // '@'
        let mut out = String::new();
        while let Some(c) = self.peek_char() {
            if c.is_ascii_alphanumeric() || c == '-' {
                out.push(c);
                self.advance();
            } else {
                break;
            }
        }
        if out.is_empty() {
            return Err(ParseError::new(position, "empty language tag"));
        }
        Ok(Token::LangTag(out))
    }

    fn lex_numeric(&mut self) -> Token {
        let mut out = String::new();
        if matches!(self.peek_char(), Some('+') | Some('-')) {
            out.push(self.advance().unwrap());
        }
        while let Some(c) = self.peek_char() {
            if c.is_ascii_digit() {
                out.push(c);
                self.advance();
            } else {
                break;
            }
        }
        if self.peek_char() == Some('.') {
            out.push('.');
            self.advance();
            while let Some(c) = self.peek_char() {
                if c.is_ascii_digit() {
                    out.push(c);
                    self.advance();
                } else {
                    break;
                }
            }
        }
        if matches!(self.peek_char(), Some('e') | Some('E')) {
            let save = self.pos;
            let mut exp = String::new();
            exp.push(self.advance().unwrap());
            if matches!(self.peek_char(), Some('+') | Some('-')) {
                exp.push(self.advance().unwrap());
            }
            let mut had_digit = false;
            while let Some(c) = self.peek_char() {
                if c.is_ascii_digit() {
                    exp.push(c);
                    self.advance();
                    had_digit = true;
                } else {
                    break;
                }
            }
            if had_digit {
                out.push_str(&exp);
            } else {
                self.pos = save;
            }
        }
        Token::Numeric(out)
    }

    fn lex_prefixed_name_or_ident(&mut self, position: Position) -> Result<Token, ParseError> {
        let mut prefix = String::new();
        while let Some(c) = self.peek_char() {
            if is_pn_char(c) {
                prefix.push(c);
                self.advance();
            } else {
                break;
            }
        }
        if self.peek_char() == Some(':') {
            self.advance();
            let mut local = String::new();
            while let Some(c) = self.peek_char() {
                if is_pn_char(c) || c == '.' {
                    local.push(c);
                    self.advance();
                } else {
                    break;
                }
            }
            if local.is_empty() {
                return Ok(Token::PrefixNs(prefix));
            }
            return Ok(Token::PrefixedName(prefix, local));
        }
        let _ = position;
        Ok(Token::Ident(prefix))
    }

    fn lex_operator(&mut self, position: Position) -> Result<Token, ParseError> {
        let c = self.advance().unwrap();
        let two = self.peek_char();
        match (c, two) {
            ('!', Some('=')) => {
                self.advance();
                Ok(Token::Op("!="))
            }
            ('<', Some('=')) => {
                self.advance();
                Ok(Token::Op("<="))
            }
            ('>', Some('=')) => {
                self.advance();
                Ok(Token::Op(">="))
            }
            ('&', Some('&')) => {
                self.advance();
                Ok(Token::Op("&&"))
            }
            ('|', Some('|')) => {
                self.advance();
                Ok(Token::Op("||"))
            }
            (':', _) => Err(ParseError::new(position, "unexpected ':' (prefixed names need a non-empty prefix or PREFIX declaration)")),
            ('!', _) => Ok(Token::Punct('!')),
            ('<', _) => Ok(Token::Punct('<')),
            ('>', _) => Ok(Token::Punct('>')),
            ('&', _) | ('|', _) => Ok(Token::Punct(c)),
            _ => unreachable!(),
        }
    }
}

fn is_pn_char_base(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_pn_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '-'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(input: &str) -> Vec<Token> {
        let mut lexer = Lexer::new(input);
        let mut out = Vec::new();
        loop {
            let t = lexer.next_token().unwrap();
            if t.token == Token::Eof {
                break;
            }
            out.push(t.token);
        }
        out
    }

    #[test]
    fn lexes_iri_and_variable() {
        assert_eq!(tokens("<http://a> ?x"), vec![Token::Iri("http://a".into()), Token::Variable("x".into())]);
    }

    #[test]
    fn lexes_prefixed_name() {
        assert_eq!(tokens("ex:Foo"), vec![Token::PrefixedName("ex".into(), "Foo".into())]);
    }

    #[test]
    fn lexes_typed_literal() {
        assert_eq!(
            tokens(r#""42"^^xsd:integer"#),
            vec![
                Token::String("42".into()),
                Token::Punct('^'),
                Token::Punct('^'),
                Token::PrefixedName("xsd".into(), "integer".into()),
            ]
        );
    }

    #[test]
    fn lexes_numeric_literal() {
        assert_eq!(tokens("3.14"), vec![Token::Numeric("3.14".into())]);
    }
}
