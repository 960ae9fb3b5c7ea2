//! A hand-rolled lexer and recursive-descent parser for the BUILD-file
//! dialect: a declarative subset of a Python-like syntax (assignments, rule
//! invocations, list/dict literals, `def`-blocks, `subinclude`).
//!
//! There is no off-the-shelf crate for this invented grammar, so it is
//! written by hand: a single [`parse`] entry point that never returns
//! `Err`. A
//! syntactically broken document still yields a [`crate::ast::Module`] —
//! whatever statements came before the break, plus one or more
//! [`crate::ast::ParseError`]s — because diagnostics, symbols and
//! completion all need *some* tree to work with while the user is mid-edit.

use crate::ast::{
    Arg, Assign, Call, Expr, FunctionDef, Ident, Module, NumberLit, Param, ParseError, Stmt,
    StringLit,
};
use crate::position::{Position, Range};

/// Parses a full BUILD file. Always succeeds; check `module.errors` for
/// anything the parser had to skip over.
pub fn parse(source: &str) -> Module {
    let tokens = Lexer::new(source).tokenize();
    let mut parser = Parser::new(tokens);
    parser.parse_module()
}

// ---------------------------------------------------------------------
// Lexer
// ---------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum TokenKind {
    Ident(String),
    String(String),
    Number(i64),
    Def,
    True,
    False,
    None,
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Colon,
    Equals,
    Plus,
    Minus,
    Newline,
    Indent,
    Dedent,
    Eof,
}

#[derive(Debug, Clone)]
struct Token {
    kind: TokenKind,
    range: Range,
}

struct Lexer<'a> {
    source: &'a [u8],
    pos: usize,
    line: u32,
    col: u32,
    indent_stack: Vec<u32>,
    paren_depth: i32,
    at_line_start: bool,
}

impl<'a> Lexer<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source: source.as_bytes(),
            pos: 0,
            line: 1,
            col: 1,
            indent_stack: vec![0],
            paren_depth: 0,
            at_line_start: true,
        }
    }

    fn peek_byte(&self) -> Option<u8> {
        self.source.get(self.pos).copied()
    }

    fn advance(&mut self) -> Option<u8> {
        let b = self.peek_byte()?;
        self.pos += 1;
        if b == b'\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(b)
    }

    fn here(&self) -> Position {
        Position::new(self.line, self.col)
    }

    fn tokenize(mut self) -> Vec<Token> {
        let mut tokens = Vec::new();

        loop {
            if self.at_line_start && self.paren_depth == 0 {
                if let Some(indent_tokens) = self.consume_indentation() {
                    tokens.extend(indent_tokens);
                    if self.peek_byte().is_none() {
                        break;
                    }
                    continue;
                }
            }

            self.skip_intra_line_whitespace_and_comments();

            let start = self.here();
            let Some(b) = self.peek_byte() else { break };

            let kind = match b {
                b'\n' => {
                    self.advance();
                    if self.paren_depth > 0 {
                        continue;
                    }
                    self.at_line_start = true;
                    TokenKind::Newline
                }
                b'(' => {
                    self.advance();
                    self.paren_depth += 1;
                    TokenKind::LParen
                }
                b')' => {
                    self.advance();
                    self.paren_depth = (self.paren_depth - 1).max(0);
                    TokenKind::RParen
                }
                b'[' => {
                    self.advance();
                    self.paren_depth += 1;
                    TokenKind::LBracket
                }
                b']' => {
                    self.advance();
                    self.paren_depth = (self.paren_depth - 1).max(0);
                    TokenKind::RBracket
                }
                b'{' => {
                    self.advance();
                    self.paren_depth += 1;
                    TokenKind::LBrace
                }
                b'}' => {
                    self.advance();
                    self.paren_depth = (self.paren_depth - 1).max(0);
                    TokenKind::RBrace
                }
                b',' => {
                    self.advance();
                    TokenKind::Comma
                }
                b':' => {
                    self.advance();
                    TokenKind::Colon
                }
                b'=' => {
                    self.advance();
                    TokenKind::Equals
                }
                b'+' => {
                    self.advance();
                    TokenKind::Plus
                }
                b'-' => {
                    self.advance();
                    TokenKind::Minus
                }
                b'\'' | b'"' => self.lex_string(b),
                b'0'..=b'9' => self.lex_number(),
                c if c == b'_' || c.is_ascii_alphabetic() => self.lex_ident_or_keyword(),
                _ => {
                    // Unknown byte: skip it, the caller will see a gap in
                    // the token stream and report a parse error.
                    self.advance();
                    continue;
                }
            };

            tokens.push(Token { kind, range: Range::new(start, self.here()) });
        }

        let end = self.here();
        if !matches!(tokens.last().map(|t| &t.kind), Some(TokenKind::Newline) | None) {
            tokens.push(Token { kind: TokenKind::Newline, range: Range::point(end) });
        }
        while self.indent_stack.len() > 1 {
            self.indent_stack.pop();
            tokens.push(Token { kind: TokenKind::Dedent, range: Range::point(end) });
        }
        tokens.push(Token { kind: TokenKind::Eof, range: Range::point(end) });
        tokens
    }

    /// At the start of a logical line: measures indentation, skips blank
    /// and comment-only lines entirely, and emits Indent/Dedent tokens.
    /// Returns `None` if the line turned out not to need any (caller falls
    /// through to normal tokenization of the first real token).
    fn consume_indentation(&mut self) -> Option<Vec<Token>> {
        loop {
            let line_start = self.pos;
            let mut width = 0u32;
            while let Some(b) = self.peek_byte() {
                match b {
                    b' ' => {
                        width += 1;
                        self.advance();
                    }
                    b'\t' => {
                        width += 8;
                        self.advance();
                    }
                    _ => break,
                }
            }
            match self.peek_byte() {
                None => {
                    self.at_line_start = false;
                    return None;
                }
                Some(b'\n') | Some(b'#') => {
                    // Blank or comment-only line: consume it and loop to
                    // re-measure the next one, without emitting Newline.
                    self.skip_intra_line_whitespace_and_comments();
                    if self.peek_byte() == Some(b'\n') {
                        self.advance();
                        continue;
                    }
                    self.pos = line_start;
                    self.at_line_start = false;
                    return None;
                }
                _ => {}
            }

            self.at_line_start = false;
            let current = *self.indent_stack.last().unwrap();
            let pos = self.here();
            if width > current {
                self.indent_stack.push(width);
                return Some(vec![Token { kind: TokenKind::Indent, range: Range::point(pos) }]);
            } else if width < current {
                let mut out = Vec::new();
                while *self.indent_stack.last().unwrap() > width {
                    self.indent_stack.pop();
                    out.push(Token { kind: TokenKind::Dedent, range: Range::point(pos) });
                }
                return Some(out);
            }
            return None;
        }
    }

    fn skip_intra_line_whitespace_and_comments(&mut self) {
        loop {
            match self.peek_byte() {
                Some(b' ') | Some(b'\t') | Some(b'\r') => {
                    self.advance();
                }
                Some(b'#') => {
                    while let Some(b) = self.peek_byte() {
                        if b == b'\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                Some(b'\\') if self.source.get(self.pos + 1) == Some(&b'\n') => {
                    self.advance();
                    self.advance();
                }
                _ => break,
            }
        }
    }

    fn lex_string(&mut self, quote: u8) -> TokenKind {
        self.advance();
        let triple = self.peek_byte() == Some(quote)
            && self.source.get(self.pos + 1) == Some(&quote);
        if triple {
            self.advance();
            self.advance();
        }
        let mut value = String::new();
        loop {
            match self.peek_byte() {
                None => break,
                Some(b'\\') => {
                    self.advance();
                    match self.advance() {
                        Some(b'n') => value.push('\n'),
                        Some(b't') => value.push('\t'),
                        Some(b) => value.push(b as char),
                        None => break,
                    }
                }
                Some(b) if b == quote => {
                    if triple {
                        if self.source.get(self.pos + 1) == Some(&quote)
                            && self.source.get(self.pos + 2) == Some(&quote)
                        {
                            self.advance();
                            self.advance();
                            self.advance();
                            break;
                        }
                        value.push(b as char);
                        self.advance();
                    } else {
                        self.advance();
                        break;
                    }
                }
                Some(b'\n') if !triple => break,
                Some(_) => {
                    let b = self.advance().unwrap();
                    value.push(b as char);
                }
            }
        }
        TokenKind::String(value)
    }

    fn lex_number(&mut self) -> TokenKind {
        let mut digits = String::new();
        while let Some(b) = self.peek_byte() {
            if b.is_ascii_digit() {
                digits.push(b as char);
                self.advance();
            } else {
                break;
            }
        }
        TokenKind::Number(digits.parse().unwrap_or(0))
    }

    fn lex_ident_or_keyword(&mut self) -> TokenKind {
        let mut ident = String::new();
        while let Some(b) = self.peek_byte() {
            if b == b'_' || b.is_ascii_alphanumeric() {
                ident.push(b as char);
                self.advance();
            } else {
                break;
            }
        }
        match ident.as_str() {
            "def" => TokenKind::Def,
            "True" => TokenKind::True,
            "False" => TokenKind::False,
            "None" => TokenKind::None,
            _ => TokenKind::Ident(ident),
        }
    }
}

// ---------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    errors: Vec<ParseError>,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, pos: 0, errors: Vec::new() }
    }

    fn peek(&self) -> &TokenKind {
        &self.tokens[self.pos.min(self.tokens.len() - 1)].kind
    }

    fn peek_range(&self) -> Range {
        self.tokens[self.pos.min(self.tokens.len() - 1)].range
    }

    fn bump(&mut self) -> Token {
        let tok = self.tokens[self.pos.min(self.tokens.len() - 1)].clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        tok
    }

    fn at(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(self.peek()) == std::mem::discriminant(kind)
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.at(kind) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn error(&mut self, message: impl Into<String>) {
        self.errors.push(ParseError { range: self.peek_range(), message: message.into() });
    }

    /// Error recovery: discard tokens until we're at a statement boundary
    /// (a Newline or Dedent), so one malformed statement doesn't poison the
    /// rest of the file.
    fn synchronize(&mut self) {
        loop {
            match self.peek() {
                TokenKind::Newline => {
                    self.bump();
                    return;
                }
                TokenKind::Dedent | TokenKind::Eof => return,
                _ => {
                    self.bump();
                }
            }
        }
    }

    fn parse_module(&mut self) -> Module {
        let mut statements = Vec::new();
        self.skip_blank_newlines();
        while !matches!(self.peek(), TokenKind::Eof) {
            match self.parse_statement() {
                Some(stmt) => statements.push(stmt),
                None => self.synchronize(),
            }
            self.skip_blank_newlines();
        }
        Module { statements, errors: std::mem::take(&mut self.errors) }
    }

    fn skip_blank_newlines(&mut self) {
        while matches!(self.peek(), TokenKind::Newline) {
            self.bump();
        }
    }

    fn parse_block(&mut self) -> Vec<Stmt> {
        let mut statements = Vec::new();
        if !self.eat(&TokenKind::Newline) {
            self.error("expected newline before indented block");
            return statements;
        }
        self.skip_blank_newlines();
        if !self.eat(&TokenKind::Indent) {
            self.error("expected an indented block");
            return statements;
        }
        loop {
            self.skip_blank_newlines();
            if matches!(self.peek(), TokenKind::Dedent | TokenKind::Eof) {
                break;
            }
            match self.parse_statement() {
                Some(stmt) => statements.push(stmt),
                None => self.synchronize(),
            }
        }
        self.eat(&TokenKind::Dedent);
        statements
    }

    fn parse_statement(&mut self) -> Option<Stmt> {
        match self.peek() {
            TokenKind::Def => self.parse_function_def(),
            TokenKind::Ident(_) => self.parse_ident_led_statement(),
            _ => {
                self.error("expected a statement");
                None
            }
        }
    }

    fn parse_function_def(&mut self) -> Option<Stmt> {
        let start = self.peek_range().start;
        self.bump(); // `def`
        let name_range = self.peek_range();
        let name = self.expect_ident()?;
        if !self.eat(&TokenKind::LParen) {
            self.error("expected '(' after function name");
            return None;
        }
        let mut params = Vec::new();
        while !self.at(&TokenKind::RParen) {
            let range = self.peek_range();
            let pname = self.expect_ident()?;
            let has_default = self.eat(&TokenKind::Equals);
            if has_default {
                self.parse_expr()?;
            }
            params.push(Param { name: pname, range, has_default });
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        if !self.eat(&TokenKind::RParen) {
            self.error("expected ')' to close parameter list");
            return None;
        }
        if !self.eat(&TokenKind::Colon) {
            self.error("expected ':' after function signature");
            return None;
        }
        let body = self.parse_block();
        let docstring = body.iter().find_map(|s| match s {
            Stmt::Expr(Expr::String(s)) => Some(s.value.clone()),
            _ => None,
        });
        let end = self.tokens[self.pos.saturating_sub(1).min(self.tokens.len() - 1)].range.end;
        Some(Stmt::FunctionDef(FunctionDef {
            name: Ident { name, range: name_range },
            params,
            docstring,
            body,
            range: Range::new(start, end),
        }))
    }

    /// Any statement that starts with an identifier: an assignment
    /// (`name = ...`) or an expression statement (almost always a rule
    /// call), with `subinclude(...)` singled out into its own variant.
    fn parse_ident_led_statement(&mut self) -> Option<Stmt> {
        let start = self.peek_range().start;
        let checkpoint = self.pos;
        let ident_range = self.peek_range();
        let name = match self.peek().clone() {
            TokenKind::Ident(n) => n,
            _ => unreachable!(),
        };
        self.bump();

        if self.at(&TokenKind::Equals) {
            self.bump();
            let value = self.parse_expr()?;
            if !self.eat(&TokenKind::Newline) {
                self.error("expected newline after assignment");
            }
            let end = value.range().end;
            return Some(Stmt::Assign(Assign {
                name: Ident { name, range: ident_range },
                value,
                range: Range::new(start, end),
            }));
        }

        self.pos = checkpoint;
        let expr = self.parse_expr()?;
        if !self.eat(&TokenKind::Newline) {
            self.error("expected newline after statement");
        }
        if name == "subinclude" {
            if let Expr::Call(call) = expr {
                return Some(Stmt::Subinclude(call));
            }
        }
        Some(Stmt::Expr(expr))
    }

    fn expect_ident(&mut self) -> Option<String> {
        match self.peek().clone() {
            TokenKind::Ident(name) => {
                self.bump();
                Some(name)
            }
            _ => {
                self.error("expected an identifier");
                None
            }
        }
    }

    fn parse_expr(&mut self) -> Option<Expr> {
        self.parse_additive()
    }

    fn parse_additive(&mut self) -> Option<Expr> {
        let mut left = self.parse_primary()?;
        while matches!(self.peek(), TokenKind::Plus) {
            self.bump();
            let right = self.parse_primary()?;
            let range = Range::new(left.range().start, right.range().end);
            left = Expr::BinaryOp { left: Box::new(left), op: "+".to_string(), right: Box::new(right), range };
        }
        Some(left)
    }

    fn parse_primary(&mut self) -> Option<Expr> {
        let start_range = self.peek_range();
        match self.peek().clone() {
            TokenKind::Minus => {
                self.bump();
                match self.peek().clone() {
                    TokenKind::Number(n) => {
                        let range = Range::new(start_range.start, self.peek_range().end);
                        self.bump();
                        Some(Expr::Number(NumberLit(-n), range))
                    }
                    _ => {
                        self.error("expected a number after unary '-'");
                        None
                    }
                }
            }
            TokenKind::String(value) => {
                let range = self.peek_range();
                self.bump();
                Some(Expr::String(StringLit { value, range }))
            }
            TokenKind::Number(n) => {
                let range = self.peek_range();
                self.bump();
                Some(Expr::Number(NumberLit(n), range))
            }
            TokenKind::True => {
                let range = self.peek_range();
                self.bump();
                Some(Expr::Bool(true, range))
            }
            TokenKind::False => {
                let range = self.peek_range();
                self.bump();
                Some(Expr::Bool(false, range))
            }
            TokenKind::None => {
                let range = self.peek_range();
                self.bump();
                Some(Expr::None(range))
            }
            TokenKind::LBracket => self.parse_list(),
            TokenKind::LBrace => self.parse_dict(),
            TokenKind::LParen => {
                self.bump();
                let inner = self.parse_expr()?;
                if !self.eat(&TokenKind::RParen) {
                    self.error("expected ')' to close parenthesized expression");
                }
                Some(inner)
            }
            TokenKind::Ident(name) => {
                let ident_range = self.peek_range();
                self.bump();
                if self.at(&TokenKind::LParen) {
                    self.parse_call_args(Ident { name, range: ident_range })
                } else {
                    Some(Expr::Identifier(Ident { name, range: ident_range }))
                }
            }
            _ => {
                self.error("expected an expression");
                None
            }
        }
    }

    fn parse_list(&mut self) -> Option<Expr> {
        let start = self.peek_range().start;
        self.bump(); // '['
        let mut items = Vec::new();
        self.skip_blank_newlines();
        while !self.at(&TokenKind::RBracket) {
            items.push(self.parse_expr()?);
            self.skip_blank_newlines();
            if !self.eat(&TokenKind::Comma) {
                break;
            }
            self.skip_blank_newlines();
        }
        let end = self.peek_range().end;
        if !self.eat(&TokenKind::RBracket) {
            self.error("expected ']' to close list");
        }
        Some(Expr::List(items, Range::new(start, end)))
    }

    fn parse_dict(&mut self) -> Option<Expr> {
        let start = self.peek_range().start;
        self.bump(); // '{'
        let mut entries = Vec::new();
        self.skip_blank_newlines();
        while !self.at(&TokenKind::RBrace) {
            let key = self.parse_expr()?;
            if !self.eat(&TokenKind::Colon) {
                self.error("expected ':' in dict entry");
                return None;
            }
            let value = self.parse_expr()?;
            entries.push((key, value));
            self.skip_blank_newlines();
            if !self.eat(&TokenKind::Comma) {
                break;
            }
            self.skip_blank_newlines();
        }
        let end = self.peek_range().end;
        if !self.eat(&TokenKind::RBrace) {
            self.error("expected '}' to close dict");
        }
        Some(Expr::Dict(entries, Range::new(start, end)))
    }

    fn parse_call_args(&mut self, callee: Ident) -> Option<Expr> {
        let start = callee.range.start;
        self.bump(); // '('
        let mut args = Vec::new();
        self.skip_blank_newlines();
        while !self.at(&TokenKind::RParen) {
            args.push(self.parse_arg()?);
            self.skip_blank_newlines();
            if !self.eat(&TokenKind::Comma) {
                break;
            }
            self.skip_blank_newlines();
        }
        let end = self.peek_range().end;
        if !self.eat(&TokenKind::RParen) {
            self.error("expected ')' to close call arguments");
        }
        Some(Expr::Call(Call { callee, args, range: Range::new(start, end) }))
    }

    fn parse_arg(&mut self) -> Option<Arg> {
        if let TokenKind::Ident(name) = self.peek().clone() {
            let name_range = self.peek_range();
            let checkpoint = self.pos;
            self.bump();
            if self.eat(&TokenKind::Equals) {
                let value = self.parse_expr()?;
                return Some(Arg::Keyword { name, name_range, value });
            }
            self.pos = checkpoint;
        }
        Some(Arg::Positional(self.parse_expr()?))
    }
}
