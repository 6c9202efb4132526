//! Modal tokenizer for Cookfile source.
//!
//! The scanner runs in two modes:
//!
//! - **Expression mode**: operators, literals, identifiers and keywords.
//! - **Argument mode**: entered right after `@name` / `#name`; every word
//!   scans as a (possibly interpolated) string, and `<`, `>`, `>>`, `|`
//!   and `~` take their redirect/pipe/reader meanings. The mode ends at
//!   the statement's linefeed, or temporarily at `|` so the next
//!   invocation head scans normally.
//!
//! Linefeeds terminate statements, so the scanner tracks whether the next
//! newline is significant (`skip_line_feed`): after a token that can end a
//! statement the newline is emitted as [`Token::Linefeed`], otherwise it is
//! treated as whitespace, which also gives `\`-free continuation after
//! operators.

use std::sync::Arc;

use crate::ast::{Expr, ExprKind, Literal, Pos};
use crate::source::SourceFile;
use crate::token::Token;

/// One scanned token: offset, kind, literal text, and, for interpolated
/// strings, the expression assembled during scanning.
#[derive(Debug)]
pub struct Lexeme {
    pub offset: usize,
    pub token: Token,
    pub lit: String,
    pub expr: Option<Expr>,
}

impl Lexeme {
    fn plain(offset: usize, token: Token) -> Self {
        Self {
            offset,
            token,
            lit: String::new(),
            expr: None,
        }
    }
}

pub struct Scanner {
    file: Arc<SourceFile>,
    /// Current character, `None` at end of input.
    ch: Option<char>,
    /// Byte offset of `ch`.
    offset: usize,
    /// Byte offset of the character after `ch`.
    rd_offset: usize,
    /// Byte offset of the first character of the current line.
    line_offset: usize,
    skip_line_feed: bool,
    argument_mode: bool,
    /// The two most recent tokens; `@`/`#` followed by an identifier
    /// switches into argument mode.
    prev: [Token; 2],
    /// Count of scan errors reported so far.
    pub error_count: usize,
}

fn is_letter(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_decimal(c: char) -> bool {
    c.is_ascii_digit()
}

fn is_space(c: char) -> bool {
    c == ' ' || c == '\t'
}

impl Scanner {
    pub fn new(file: Arc<SourceFile>) -> Self {
        let mut s = Self {
            file,
            ch: None,
            offset: 0,
            rd_offset: 0,
            line_offset: 0,
            skip_line_feed: true,
            argument_mode: false,
            prev: [Token::Illegal; 2],
            error_count: 0,
        };
        s.next();
        s
    }

    pub fn file(&self) -> &Arc<SourceFile> {
        &self.file
    }

    /// Reposition the scanner to a byte offset, clearing mode state.
    pub fn reset(&mut self, offset: usize) {
        self.ch = None;
        self.offset = offset;
        self.rd_offset = offset;
        self.skip_line_feed = true;
        self.argument_mode = false;
        self.prev = [Token::Illegal; 2];
        self.next();
    }

    fn report(&mut self, offset: usize, msg: &str) {
        let pos = self.file.position(offset);
        eprintln!("{pos} {msg}");
        self.error_count += 1;
    }

    fn pos(&self, offset: usize) -> Pos {
        Pos::new(self.file.clone(), offset)
    }

    /// Advance to the next character, normalizing `\r` and `\r\n` to `\n`.
    fn next(&mut self) {
        if self.ch == Some('\n') {
            self.line_offset = self.rd_offset;
        }
        let src = self.file.src();
        if self.rd_offset < src.len() {
            self.offset = self.rd_offset;
            let mut c = src[self.rd_offset..].chars().next().unwrap();
            self.rd_offset += c.len_utf8();
            if c == '\r' {
                if src.as_bytes().get(self.rd_offset) == Some(&b'\n') {
                    self.rd_offset += 1;
                }
                c = '\n';
            }
            self.ch = Some(c);
        } else {
            self.offset = src.len();
            self.ch = None;
        }
    }

    pub fn scan(&mut self) -> Lexeme {
        if self.argument_mode {
            return self.scan_argument();
        }

        // `@ident` / `#ident` just scanned: decide whether the rest of the
        // line is an argument list. A `:` means this was an OS-qualified
        // target declaration, which stays in expression mode.
        if (self.prev[0] == Token::At || self.prev[0] == Token::HashSign)
            && self.prev[1] == Token::Ident
        {
            match self.ch {
                Some(':') => {}
                None | Some('\n') => {
                    let lx = Lexeme {
                        offset: self.offset,
                        token: Token::Linefeed,
                        lit: "\n".into(),
                        expr: None,
                    };
                    self.skip_line_feed = true;
                    self.prev = [Token::Illegal; 2];
                    self.next();
                    return lx;
                }
                _ => {
                    self.argument_mode = true;
                    self.prev = [Token::Illegal; 2];
                    return self.scan_argument();
                }
            }
        }

        let lx = self.scan_expression();
        self.prev = [self.prev[1], lx.token];
        lx
    }

    fn scan_expression(&mut self) -> Lexeme {
        loop {
            self.skip_whitespace();

            let offs = self.offset;
            let ch = match self.ch {
                None => {
                    if !self.skip_line_feed {
                        self.skip_line_feed = true;
                        return Lexeme {
                            offset: offs,
                            token: Token::Linefeed,
                            lit: "\n".into(),
                            expr: None,
                        };
                    }
                    return Lexeme::plain(offs, Token::Eof);
                }
                Some(c) => c,
            };

            if ch == '\n' {
                let begin_of_line = self.line_offset == self.offset;
                self.next();
                if begin_of_line {
                    // empty line; scan the next one
                    continue;
                }
                self.skip_line_feed = true;
                return Lexeme {
                    offset: offs,
                    token: Token::Linefeed,
                    lit: "\n".into(),
                    expr: None,
                };
            }

            if is_letter(ch) {
                let lit = self.scan_identifier();
                let token = match lit.as_str() {
                    "true" | "false" => Token::Boolean,
                    other => Token::lookup(other),
                };
                self.skip_line_feed = !matches!(
                    token,
                    Token::Ident | Token::Boolean | Token::Break | Token::Continue
                );
                return Lexeme {
                    offset: offs,
                    token,
                    lit,
                    expr: None,
                };
            }

            if is_decimal(ch) {
                let (token, lit) = self.scan_number();
                self.skip_line_feed = false;
                return Lexeme {
                    offset: offs,
                    token,
                    lit,
                    expr: None,
                };
            }

            self.next();
            let mut skip_lf = true;
            let mut lit = String::new();
            let mut expr = None;
            let token = match ch {
                '\'' | '"' => {
                    let (raw, itp) = self.scan_string(Some(ch), offs);
                    lit = raw;
                    expr = itp;
                    skip_lf = false;
                    Token::String
                }
                '@' => Token::At,
                '#' => Token::HashSign,
                '$' => Token::Dollar,
                '~' => Token::Tilde,
                '?' => self.ternary('?', Token::Fallback, Token::Question),
                '!' => self.ternary('=', Token::Neq, Token::Not),
                '^' => Token::Xor,
                '&' => self.ternary('&', Token::Land, Token::And),
                '%' => self.ternary('=', Token::RemAssign, Token::Rem),
                '|' => self.ternary('|', Token::Lor, Token::Or),
                '=' => self.ternary('=', Token::Eql, Token::Assign),
                '+' => {
                    let t = if self.ch == Some('+') {
                        self.next();
                        Token::Inc
                    } else {
                        self.ternary('=', Token::AddAssign, Token::Add)
                    };
                    skip_lf = t != Token::Inc;
                    t
                }
                '-' => {
                    let t = if self.ch == Some('-') {
                        self.next();
                        Token::Dec
                    } else {
                        self.ternary('=', Token::SubAssign, Token::Sub)
                    };
                    skip_lf = t != Token::Dec;
                    t
                }
                '/' => {
                    if self.ch == Some('/') {
                        // line comment; if a statement is pending, it acts
                        // as its terminator
                        let emit_lf = !self.skip_line_feed;
                        self.skip(|c| c != '\n');
                        self.skip_line_feed = true;
                        if emit_lf {
                            return Lexeme {
                                offset: offs,
                                token: Token::Linefeed,
                                lit: "\n".into(),
                                expr: None,
                            };
                        }
                        continue;
                    }
                    if self.ch == Some('*') {
                        self.scan_block_comment(offs);
                        continue;
                    }
                    self.ternary('=', Token::QuoAssign, Token::Quo)
                }
                '*' => self.ternary('=', Token::MulAssign, Token::Mul),
                ':' => Token::Colon,
                ';' => {
                    // statement separator, equivalent to a linefeed
                    self.skip_line_feed = true;
                    return Lexeme {
                        offset: offs,
                        token: Token::Linefeed,
                        lit: ";".into(),
                        expr: None,
                    };
                }
                ',' => Token::Comma,
                '.' => {
                    if self.ch == Some('.') {
                        self.next();
                        Token::Range
                    } else {
                        self.report(offs, "invalid symbol .");
                        Token::Illegal
                    }
                }
                '[' => Token::Lbrack,
                ']' => {
                    skip_lf = false;
                    Token::Rbrack
                }
                '{' => Token::Lbrace,
                '}' => {
                    skip_lf = false;
                    Token::Rbrace
                }
                '(' => Token::Lparen,
                ')' => {
                    skip_lf = false;
                    Token::Rparen
                }
                '≥' => Token::Geq,
                '≤' => Token::Leq,
                '>' => {
                    if self.ch == Some('=') {
                        self.next();
                        Token::Geq
                    } else {
                        self.ternary('>', Token::Shr, Token::Gtr)
                    }
                }
                '<' => {
                    if self.ch == Some('=') {
                        self.next();
                        Token::Leq
                    } else {
                        self.ternary('<', Token::Shl, Token::Lss)
                    }
                }
                '\\' => {
                    // explicit line continuation
                    self.skip(is_space);
                    if self.ch == Some('\n') {
                        self.next();
                        continue;
                    }
                    self.report(self.offset, "expected a newline after \\");
                    Token::Illegal
                }
                other => {
                    self.report(offs, &format!("unexpected character {other:?}"));
                    lit = other.to_string();
                    Token::Illegal
                }
            };
            self.skip_line_feed = skip_lf;
            return Lexeme {
                offset: offs,
                token,
                lit,
                expr,
            };
        }
    }

    /// Scan one token of an invocation's argument list.
    fn scan_argument(&mut self) -> Lexeme {
        let mut continued = false;
        loop {
            self.skip(is_space);
            let offs = self.offset;
            match self.ch {
                None | Some('\n') => {
                    if continued {
                        self.report(offs, "expect argument after \\");
                    }
                    self.argument_mode = false;
                    self.skip_line_feed = true;
                    if self.ch.is_some() {
                        self.next();
                    }
                    return Lexeme {
                        offset: offs,
                        token: Token::Linefeed,
                        lit: "\n".into(),
                        expr: None,
                    };
                }
                Some('>') => {
                    self.next();
                    let token = self.ternary('>', Token::AppendTo, Token::WriteTo);
                    return Lexeme::plain(offs, token);
                }
                Some('<') => {
                    self.next();
                    return Lexeme::plain(offs, Token::ReadFrom);
                }
                Some('|') => {
                    // next invocation head scans in expression mode
                    self.next();
                    self.argument_mode = false;
                    self.prev = [Token::Illegal; 2];
                    return Lexeme::plain(offs, Token::Pipe);
                }
                Some('~') => {
                    self.next();
                    return Lexeme::plain(offs, Token::Tilde);
                }
                Some(q @ ('\'' | '"')) => {
                    self.next();
                    let (lit, expr) = self.scan_string(Some(q), offs);
                    return Lexeme {
                        offset: offs,
                        token: Token::String,
                        lit,
                        expr,
                    };
                }
                Some('\\') => {
                    self.next();
                    self.skip(is_space);
                    if self.ch == Some('\n') {
                        self.next();
                        continued = true;
                        continue;
                    }
                    self.report(self.offset, "expected a newline after \\");
                    return Lexeme::plain(offs, Token::Illegal);
                }
                Some(_) => {
                    let (lit, expr) = self.scan_string(None, offs);
                    return Lexeme {
                        offset: offs,
                        token: Token::String,
                        lit,
                        expr,
                    };
                }
            }
        }
    }

    fn ternary(&mut self, want: char, yes: Token, no: Token) -> Token {
        if self.ch == Some(want) {
            self.next();
            yes
        } else {
            no
        }
    }

    fn skip(&mut self, test: impl Fn(char) -> bool) {
        while matches!(self.ch, Some(c) if test(c)) {
            self.next();
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.ch {
            if is_space(c) || (self.skip_line_feed && c == '\n') {
                self.next();
            } else {
                break;
            }
        }
    }

    fn scan_identifier(&mut self) -> String {
        let offs = self.offset;
        self.next();
        while matches!(self.ch, Some(c) if is_letter(c) || is_decimal(c)) {
            self.next();
        }
        self.file.src()[offs..self.offset].to_string()
    }

    fn scan_number(&mut self) -> (Token, String) {
        let offs = self.offset;
        self.next();
        self.skip(is_decimal);
        let mut token = Token::Integer;
        if self.ch == Some('.')
            && matches!(self.peek(), Some(c) if is_decimal(c))
        {
            self.next();
            self.skip(is_decimal);
            token = Token::Float;
        }
        (token, self.file.src()[offs..self.offset].to_string())
    }

    fn peek(&self) -> Option<char> {
        self.file.src()[self.rd_offset..].chars().next()
    }

    /// Scan a string literal. `quote` is `'`/`"` for quoted strings, `None`
    /// for a bare argument word (terminated by whitespace or end of line).
    /// Unless single-quoted, `$NAME` / `${EXPR}` inserts are collected.
    fn scan_string(&mut self, quote: Option<char>, start: usize) -> (String, Option<Expr>) {
        let interpolate = quote != Some('\'');
        let mut raw = String::new();
        let mut inserts: Vec<(usize, Expr)> = Vec::new();
        loop {
            match self.ch {
                None => {
                    if quote.is_some() {
                        self.report(start, "string not terminated");
                    }
                    break;
                }
                Some(c) if Some(c) == quote => {
                    self.next();
                    break;
                }
                Some(c) if quote.is_none() && (is_space(c) || c == '\n') => break,
                Some('\\') => {
                    let offs = self.offset;
                    self.next();
                    let decoded = match self.ch {
                        Some('a') => Some('\x07'),
                        Some('b') => Some('\x08'),
                        Some('f') => Some('\x0c'),
                        Some('n') => Some('\n'),
                        Some('r') => Some('\r'),
                        Some('t') => Some('\t'),
                        Some('v') => Some('\x0b'),
                        Some('\\') => Some('\\'),
                        Some(c) if Some(c) == quote => Some(c),
                        _ => None,
                    };
                    match decoded {
                        Some(c) => {
                            raw.push(c);
                            self.next();
                        }
                        None => {
                            let msg = if self.ch.is_none() {
                                "escape sequence not terminated"
                            } else {
                                "unknown escape sequence"
                            };
                            self.report(offs, msg);
                            return (raw, None);
                        }
                    }
                }
                Some('$') if interpolate => {
                    match self.scan_interp_expr() {
                        Some(expr) => inserts.push((raw.len(), expr)),
                        None => return (raw, None),
                    }
                }
                Some(c) => {
                    raw.push(c);
                    self.next();
                }
            }
        }

        // A lone `$VAR` with no surrounding text is the expression itself;
        // plain text needs no expression at all.
        let expr = match (inserts.len(), raw.is_empty()) {
            (0, _) => None,
            (1, true) => Some(inserts.pop().unwrap().1),
            _ => Some(Expr::new(
                self.pos(start),
                ExprKind::StringInterp { raw: raw.clone(), inserts },
            )),
        };
        (raw, expr)
    }

    /// Scan a `$NAME`, `${NAME}` or `${NAME[INDEX]}` insert inside a string.
    fn scan_interp_expr(&mut self) -> Option<Expr> {
        let offs = self.offset;
        self.next(); // consume '$'
        let braced = self.ch == Some('{');
        if braced {
            self.next();
        }
        if !matches!(self.ch, Some(c) if is_letter(c) || is_decimal(c)) {
            self.report(self.offset, "expect variable name");
            return None;
        }
        let name = self.scan_identifier();
        let ident = Expr::new(self.pos(offs), ExprKind::Ident(name));
        let mut expr = ident;
        if braced && self.ch == Some('[') {
            self.next();
            let index = match self.ch {
                Some(c) if is_decimal(c) => {
                    let num_offs = self.offset;
                    let (token, lit) = self.scan_number();
                    if token != Token::Integer {
                        self.report(num_offs, "indexing must be an integer value");
                        return None;
                    }
                    Expr::new(
                        self.pos(num_offs),
                        ExprKind::Literal(Literal::Int(lit.parse().unwrap_or(0))),
                    )
                }
                Some(c) if is_letter(c) => {
                    let idx_offs = self.offset;
                    let idx_name = self.scan_identifier();
                    Expr::new(self.pos(idx_offs), ExprKind::Ident(idx_name))
                }
                _ => {
                    self.report(self.offset, "expect ]");
                    return None;
                }
            };
            if self.ch != Some(']') {
                self.report(self.offset, "expect ]");
                return None;
            }
            self.next();
            expr = Expr::new(
                self.pos(offs),
                ExprKind::Index {
                    base: Box::new(expr),
                    index: Box::new(index),
                },
            );
        }
        if braced {
            if self.ch != Some('}') {
                self.report(self.offset, "expect }");
                return None;
            }
            self.next();
        }
        Some(expr)
    }

    fn scan_block_comment(&mut self, offs: usize) {
        self.next(); // consume '*'
        loop {
            match self.ch {
                None => {
                    self.report(offs, "comment not terminated");
                    return;
                }
                Some('*') => {
                    self.next();
                    if self.ch == Some('/') {
                        self.next();
                        return;
                    }
                }
                Some(_) => self.next(),
            }
        }
    }
}
