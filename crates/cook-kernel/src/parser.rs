//! Recursive-descent parser.
//!
//! Parsing happens in two passes. A pre-pass resolves `include` directives
//! transitively, de-duplicating by canonical path, so the full file set is
//! known before any statement parses. The main pass then parses each file
//! into one shared [`Program`]: top-level assignments and invocations, and
//! target declarations whose statements run until the next declaration.
//!
//! Syntax errors are printed as they are found (`file:line:column MESSAGE`),
//! the parser recovers at the next statement boundary, and the parse fails
//! once any error was seen.

use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use crate::ast::{
    Block, Call, CallKind, ElseArm, Expr, ExprKind, ForKind, ForStmt, IfStmt, Literal, Pos,
    Program, Stmt, StmtKind, Target, TargetKind,
};
use crate::error::ParseError;
use crate::scanner::{Lexeme, Scanner};
use crate::source::{SourceFile, SourceSet};
use crate::token::{Token, LOWEST_PREC};

const MAX_ERRORS: usize = 10;

/// Whether an OS qualifier (`target@linux:`) matches the host.
fn os_matches(name: &str) -> bool {
    match name {
        "darwin" | "macos" => std::env::consts::OS == "macos",
        other => other == std::env::consts::OS,
    }
}

pub struct Parser {
    scanner: Scanner,
    cur: Lexeme,
    ahead: Lexeme,
    error_count: usize,
}

/// Where parsed statements currently land.
enum Sink {
    /// Top-level statements, before any target declaration.
    TopLevel,
    Target(Target),
    /// An OS-qualified target for another OS: parsed, then dropped.
    Discard(Target),
}

impl Parser {
    /// Parse a Cookfile and everything it includes.
    pub fn parse(path: &Path) -> Result<Program, ParseError> {
        let mut set = SourceSet::new();
        let mut files = Vec::new();
        collect_includes(&mut set, &mut files, path)?;

        let mut program = Program::new();
        let mut total_errors = 0;
        for (file, resume) in files {
            let mut scanner = Scanner::new(file);
            scanner.reset(resume);
            let mut p = Parser::with_scanner(scanner);
            p.parse_program(&mut program);
            total_errors += p.error_count + p.scanner.error_count;
        }
        if total_errors > 0 {
            return Err(ParseError::Syntax(total_errors));
        }
        Ok(program)
    }

    /// Parse in-memory source; `include` directives are rejected.
    pub fn parse_source(name: &str, src: &str) -> Result<Program, ParseError> {
        let file = SourceFile::synthetic(name, src);
        let mut p = Parser::with_scanner(Scanner::new(file));
        let mut program = Program::new();
        p.parse_program(&mut program);
        let total = p.error_count + p.scanner.error_count;
        if total > 0 {
            return Err(ParseError::Syntax(total));
        }
        Ok(program)
    }

    fn with_scanner(mut scanner: Scanner) -> Self {
        let cur = scanner.scan();
        let ahead = if cur.token == Token::Eof {
            Lexeme {
                offset: cur.offset,
                token: Token::Eof,
                lit: String::new(),
                expr: None,
            }
        } else {
            scanner.scan()
        };
        Self {
            scanner,
            cur,
            ahead,
            error_count: 0,
        }
    }

    fn advance(&mut self) {
        let next = if self.ahead.token == Token::Eof {
            Lexeme {
                offset: self.ahead.offset,
                token: Token::Eof,
                lit: String::new(),
                expr: None,
            }
        } else {
            self.scanner.scan()
        };
        self.cur = std::mem::replace(&mut self.ahead, next);
    }

    fn pos(&self) -> Pos {
        Pos::new(self.scanner.file().clone(), self.cur.offset)
    }

    fn pos_at(&self, offset: usize) -> Pos {
        Pos::new(self.scanner.file().clone(), offset)
    }

    fn report(&mut self, offset: usize, msg: &str) {
        let pos = self.scanner.file().position(offset);
        eprintln!("{pos} {msg}");
        self.error_count += 1;
    }

    fn report_here(&mut self, msg: &str) {
        self.report(self.cur.offset, msg);
    }

    /// Skip to the start of the next statement after an error.
    fn recover(&mut self) {
        loop {
            match self.cur.token {
                Token::Eof => return,
                Token::Linefeed => {
                    self.advance();
                    return;
                }
                _ => self.advance(),
            }
        }
    }

    fn expect(&mut self, want: Token) -> Option<usize> {
        if self.cur.token != want {
            self.report_here(&format!("expect {} but got {}", want, self.cur.token));
            None
        } else {
            let offs = self.cur.offset;
            self.advance();
            Some(offs)
        }
    }

    /// A statement ends at a linefeed (consumed) or just before `}` / EOF.
    fn expect_terminator(&mut self) -> bool {
        match self.cur.token {
            Token::Linefeed => {
                self.advance();
                true
            }
            Token::Rbrace | Token::Eof => true,
            _ => {
                self.report_here(&format!("expect end of statement but got {}", self.cur.token));
                false
            }
        }
    }

    // ------------------------------------------------------------------
    // File scope
    // ------------------------------------------------------------------

    fn parse_program(&mut self, program: &mut Program) {
        let mut sink = Sink::TopLevel;
        while self.cur.token != Token::Eof {
            if self.error_count + self.scanner.error_count > MAX_ERRORS {
                break;
            }
            match self.cur.token {
                Token::Linefeed => self.advance(),
                Token::Include => {
                    self.report_here("include directive must be at the top of the file");
                    self.recover();
                }
                Token::Ident
                    if self.ahead.token == Token::Colon || self.ahead.token == Token::At =>
                {
                    self.commit(&mut sink, program);
                    sink = self.parse_target_decl(program);
                }
                _ => {
                    let ok = match &mut sink {
                        Sink::TopLevel => self.parse_statement(&mut program.statements),
                        Sink::Target(t) | Sink::Discard(t) => self.parse_statement(&mut t.body),
                    };
                    if !ok {
                        self.recover();
                    }
                }
            }
        }
        self.commit(&mut sink, program);
    }

    fn commit(&mut self, sink: &mut Sink, program: &mut Program) {
        match std::mem::replace(sink, Sink::TopLevel) {
            Sink::TopLevel | Sink::Discard(_) => {}
            Sink::Target(t) => {
                debug!(target = %t.name, statements = t.body.len(), "parsed target");
                if let Err(msg) = program.add_target(t) {
                    let offs = self.cur.offset;
                    self.report(offs, &msg);
                }
            }
        }
    }

    /// `name:` or `name@OS:`, optionally followed by `*` for the universal
    /// form of `all`.
    fn parse_target_decl(&mut self, _program: &mut Program) -> Sink {
        let offs = self.cur.offset;
        let name = self.cur.lit.clone();
        self.advance(); // identifier
        let mut active = true;
        if self.cur.token == Token::At {
            self.advance();
            let os = self.cur.lit.clone();
            if self.expect(Token::Ident).is_none() {
                return Sink::TopLevel;
            }
            active = os_matches(&os);
        }
        if self.expect(Token::Colon).is_none() {
            return Sink::TopLevel;
        }
        if self.cur.token == Token::Mul {
            // `all: *` — universal dispatcher, an explicitly empty body;
            // the scanner treats the newline after `*` as continuation,
            // so there is no terminator to consume here
            self.advance();
        }
        let target = Target {
            pos: self.pos_at(offs),
            name: name.clone(),
            kind: TargetKind::of(&name),
            body: Vec::new(),
        };
        if active {
            Sink::Target(target)
        } else {
            Sink::Discard(target)
        }
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    fn parse_statement(&mut self, block: &mut Block) -> bool {
        match self.cur.token {
            Token::Linefeed => {
                self.advance();
                true
            }
            Token::Ident => self.parse_ident_statement(block),
            Token::For => self.parse_for(block),
            Token::If => match self.parse_if() {
                Some(stmt) => {
                    block.push(stmt);
                    true
                }
                None => false,
            },
            Token::At | Token::HashSign => self.parse_invocation_statement(block),
            Token::Break | Token::Continue => self.parse_break_continue(block),
            Token::Return => self.parse_return(block),
            Token::Exit => self.parse_exit(block),
            Token::Delete => self.parse_delete(block),
            _ => {
                self.report_here(&format!("invalid token {}", self.cur.token));
                false
            }
        }
    }

    fn parse_ident_statement(&mut self, block: &mut Block) -> bool {
        let offs = self.cur.offset;
        let name = self.cur.lit.clone();
        self.advance();
        match self.cur.token {
            Token::Inc | Token::Dec => {
                let op = self.cur.token;
                let op_offs = self.cur.offset;
                self.advance();
                if !self.expect_terminator() {
                    return false;
                }
                block.push(Stmt::new(
                    self.pos_at(offs),
                    StmtKind::Expr(Expr::new(
                        self.pos_at(op_offs),
                        ExprKind::IncDec { op, name },
                    )),
                ));
                true
            }
            Token::Assign
            | Token::AddAssign
            | Token::SubAssign
            | Token::MulAssign
            | Token::QuoAssign
            | Token::RemAssign => {
                let op = self.cur.token;
                self.advance();
                let value = if op == Token::Assign
                    && (self.cur.token == Token::At || self.cur.token == Token::HashSign)
                {
                    match self.parse_invocation(false) {
                        Some(((pos, calls), files, _append)) => {
                            debug_assert!(files.is_empty());
                            Some(Expr::new(pos, ExprKind::Pipeline(calls)))
                        }
                        None => None,
                    }
                } else {
                    let v = self.parse_binary_expr(LOWEST_PREC + 1);
                    if v.is_some() && !self.expect_terminator() {
                        return false;
                    }
                    v
                };
                match value {
                    Some(value) => {
                        block.push(Stmt::new(
                            self.pos_at(offs),
                            StmtKind::Assign { name, op, value },
                        ));
                        true
                    }
                    None => false,
                }
            }
            _ => {
                self.report_here(&format!("invalid token {}", self.cur.token));
                false
            }
        }
    }

    fn parse_break_continue(&mut self, block: &mut Block) -> bool {
        let offs = self.cur.offset;
        let is_break = self.cur.token == Token::Break;
        self.advance();
        let mut label = None;
        if self.cur.token == Token::Colon {
            self.advance();
            let lit = self.cur.lit.clone();
            if self.expect(Token::Ident).is_none() {
                return false;
            }
            label = Some(lit);
        }
        if !self.expect_terminator() {
            return false;
        }
        let kind = if is_break {
            StmtKind::Break { label }
        } else {
            StmtKind::Continue { label }
        };
        block.push(Stmt::new(self.pos_at(offs), kind));
        true
    }

    fn parse_return(&mut self, block: &mut Block) -> bool {
        let offs = self.cur.offset;
        self.advance();
        let value = if matches!(self.cur.token, Token::Linefeed | Token::Rbrace | Token::Eof) {
            None
        } else {
            match self.parse_binary_expr(LOWEST_PREC + 1) {
                Some(v) => Some(v),
                None => return false,
            }
        };
        if !self.expect_terminator() {
            return false;
        }
        block.push(Stmt::new(self.pos_at(offs), StmtKind::Return(value)));
        true
    }

    fn parse_exit(&mut self, block: &mut Block) -> bool {
        let offs = self.cur.offset;
        self.advance();
        let code = match self.parse_binary_expr(LOWEST_PREC + 1) {
            Some(v) => v,
            None => return false,
        };
        if !self.expect_terminator() {
            return false;
        }
        block.push(Stmt::new(self.pos_at(offs), StmtKind::Exit(code)));
        true
    }

    /// `delete X[i, j, …]` or `delete X[a..b]`.
    fn parse_delete(&mut self, block: &mut Block) -> bool {
        let offs = self.cur.offset;
        self.advance();
        let name = self.cur.lit.clone();
        if self.expect(Token::Ident).is_none() || self.expect(Token::Lbrack).is_none() {
            return false;
        }
        let first = match self.parse_binary_expr(LOWEST_PREC + 1) {
            Some(v) => v,
            None => return false,
        };
        let mut indexes = vec![first];
        let mut end = None;
        if self.cur.token == Token::Range {
            self.advance();
            end = match self.parse_binary_expr(LOWEST_PREC + 1) {
                Some(v) => Some(v),
                None => return false,
            };
        } else {
            while self.cur.token == Token::Comma {
                self.advance();
                match self.parse_binary_expr(LOWEST_PREC + 1) {
                    Some(v) => indexes.push(v),
                    None => return false,
                }
            }
        }
        if self.expect(Token::Rbrack).is_none() || !self.expect_terminator() {
            return false;
        }
        block.push(Stmt::new(
            self.pos_at(offs),
            StmtKind::Delete { name, indexes, end },
        ));
        true
    }

    fn parse_invocation_statement(&mut self, block: &mut Block) -> bool {
        match self.parse_invocation(true) {
            Some(((pos, calls), files, append)) => {
                let stmt_pos = pos.clone();
                let call = Expr::new(pos, ExprKind::Pipeline(calls));
                let stmt = if files.is_empty() {
                    StmtKind::Expr(call)
                } else {
                    StmtKind::Redirect { call, files, append }
                };
                block.push(Stmt::new(stmt_pos, stmt));
                true
            }
            None => false,
        }
    }

    /// Parse an `@`/`#` invocation with its arguments, pipe continuations
    /// and (when allowed) redirections, up to the statement terminator.
    #[allow(clippy::type_complexity)]
    fn parse_invocation(
        &mut self,
        can_redirect: bool,
    ) -> Option<((Pos, Vec<Call>), Vec<Expr>, bool)> {
        let head_offs = self.cur.offset;
        let mut calls = Vec::new();
        let mut files = Vec::new();
        let mut append = false;

        let mut call = self.parse_call_head()?;
        let mut redirecting = false;
        loop {
            match self.cur.token {
                Token::Linefeed | Token::Eof => {
                    self.advance();
                    break;
                }
                Token::String => {
                    let arg = self.argument_expr();
                    if redirecting {
                        files.push(arg);
                    } else {
                        call.args.push(arg);
                    }
                    self.advance();
                }
                Token::ReadFrom => {
                    let offs = self.cur.offset;
                    self.advance();
                    if self.cur.token != Token::String {
                        self.report_here("expect a file path after <");
                        return None;
                    }
                    let path = self.argument_expr();
                    call.args.push(Expr::new(
                        self.pos_at(offs),
                        ExprKind::ReadFrom(Box::new(path)),
                    ));
                    self.advance();
                }
                Token::Tilde => {
                    let offs = self.cur.offset;
                    self.advance();
                    if self.cur.token != Token::String {
                        self.report_here("expect a file path after ~");
                        return None;
                    }
                    let path = self.argument_expr();
                    call.args.push(Expr::new(
                        self.pos_at(offs),
                        ExprKind::ReadFd(Box::new(path)),
                    ));
                    self.advance();
                }
                Token::WriteTo | Token::AppendTo => {
                    if !can_redirect {
                        self.report_here("redirect syntax is not allowed here");
                        return None;
                    }
                    append = self.cur.token == Token::AppendTo;
                    redirecting = true;
                    self.advance();
                }
                Token::Pipe => {
                    if redirecting {
                        self.report_here("redirect must come after the last pipe stage");
                        return None;
                    }
                    self.advance();
                    calls.push(call);
                    call = self.parse_call_head()?;
                }
                _ => {
                    self.report_here(&format!(
                        "calling a target or function requires string arguments, got {}",
                        self.cur.token
                    ));
                    return None;
                }
            }
        }
        calls.push(call);
        Some(((self.pos_at(head_offs), calls), files, append))
    }

    /// The `@name` / `#name` head of one pipeline stage.
    fn parse_call_head(&mut self) -> Option<Call> {
        let offs = self.cur.offset;
        let kind = match self.cur.token {
            Token::At => CallKind::At,
            Token::HashSign => CallKind::Hash,
            _ => {
                self.report_here("expect @ or # invocation");
                return None;
            }
        };
        self.advance();
        if self.cur.token != Token::Ident {
            self.report_here("expect identifier");
            return None;
        }
        let name = self.cur.lit.clone();
        self.advance();
        Some(Call {
            pos: self.pos_at(offs),
            kind,
            name,
            args: Vec::new(),
        })
    }

    /// Turn the current `String` lexeme into an argument expression.
    fn argument_expr(&mut self) -> Expr {
        match self.cur.expr.take() {
            Some(expr) => expr,
            None => Expr::new(
                self.pos(),
                ExprKind::Literal(Literal::Str {
                    value: self.cur.lit.clone(),
                    quote: None,
                }),
            ),
        }
    }

    fn parse_if(&mut self) -> Option<Stmt> {
        let offs = self.cur.offset;
        let stmt = self.parse_if_inner()?;
        Some(Stmt::new(self.pos_at(offs), StmtKind::If(stmt)))
    }

    fn parse_if_inner(&mut self) -> Option<IfStmt> {
        self.advance(); // `if`
        let cond = self.parse_binary_expr(LOWEST_PREC + 1)?;
        let body = self.parse_block()?;
        let mut otherwise = None;
        if self.cur.token == Token::Else {
            self.advance();
            if self.cur.token == Token::If {
                otherwise = Some(ElseArm::If(Box::new(self.parse_if_inner()?)));
            } else {
                let body = self.parse_block()?;
                self.expect_terminator();
                otherwise = Some(ElseArm::Block(body));
            }
        } else {
            self.expect_terminator();
        }
        Some(IfStmt {
            cond,
            body,
            otherwise,
        })
    }

    /// `{ statements }`.
    fn parse_block(&mut self) -> Option<Block> {
        self.expect(Token::Lbrace)?;
        let mut block = Block::new();
        while !matches!(self.cur.token, Token::Rbrace | Token::Eof) {
            if !self.parse_statement(&mut block) {
                self.recover();
                if self.error_count + self.scanner.error_count > MAX_ERRORS {
                    return None;
                }
            }
        }
        self.expect(Token::Rbrace)?;
        Some(block)
    }

    fn parse_for(&mut self, block: &mut Block) -> bool {
        let offs = self.cur.offset;
        self.advance(); // `for`
        let mut label = None;
        if self.cur.token == Token::Colon {
            self.advance();
            let lit = self.cur.lit.clone();
            if self.expect(Token::Ident).is_none() {
                return false;
            }
            label = Some(lit);
        }

        let kind = match self.cur.token {
            Token::Lbrace => ForKind::Loop,
            Token::Ident => {
                let key = self.cur.lit.clone();
                self.advance();
                match self.cur.token {
                    Token::Comma => {
                        self.advance();
                        let value = self.cur.lit.clone();
                        if self.expect(Token::Ident).is_none()
                            || self.expect(Token::In).is_none()
                        {
                            return false;
                        }
                        let expr = match self.parse_operand() {
                            Some(e) => e,
                            None => return false,
                        };
                        ForKind::Collection {
                            key,
                            value: Some(value),
                            expr,
                        }
                    }
                    Token::In => {
                        self.advance();
                        match self.parse_for_operand(key) {
                            Some(kind) => kind,
                            None => return false,
                        }
                    }
                    _ => {
                        self.report_here(&format!("unexpected token {}", self.cur.token));
                        return false;
                    }
                }
            }
            _ => {
                self.report_here(&format!("unexpected token {}", self.cur.token));
                return false;
            }
        };

        let body = match self.parse_block() {
            Some(b) => b,
            None => return false,
        };
        if !self.expect_terminator() {
            return false;
        }
        block.push(Stmt::new(
            self.pos_at(offs),
            StmtKind::For(ForStmt { label, kind, body }),
        ));
        true
    }

    /// After `for VAR in`: an interval (`[a..b]`, `(a..b)`, …), or a
    /// collection expression. `[` is ambiguous between an interval and a
    /// list literal until `..` or `,`/`]` is seen.
    fn parse_for_operand(&mut self, var: String) -> Option<ForKind> {
        let open = self.cur.token;
        if open == Token::Lbrack || open == Token::Lparen {
            let offs = self.cur.offset;
            self.advance();
            let first = self.parse_binary_expr(LOWEST_PREC + 1)?;
            if self.cur.token == Token::Range {
                self.advance();
                let second = self.parse_binary_expr(LOWEST_PREC + 1)?;
                let incl_b = match self.cur.token {
                    Token::Rbrack => true,
                    Token::Rparen => false,
                    _ => {
                        self.report_here("expect ] or ) to close the interval");
                        return None;
                    }
                };
                self.advance();
                let interval = Expr::new(
                    self.pos_at(offs),
                    ExprKind::Interval {
                        a: Box::new(first),
                        b: Box::new(second),
                        incl_a: open == Token::Lbrack,
                        incl_b,
                    },
                );
                return Some(ForKind::Range { var, interval });
            }
            if open == Token::Lbrack {
                // a list literal whose first element is already parsed
                let mut values = vec![first];
                while self.cur.token == Token::Comma {
                    self.advance();
                    if self.cur.token == Token::Rbrack {
                        break;
                    }
                    values.push(self.parse_operand()?);
                }
                self.expect(Token::Rbrack)?;
                let expr = Expr::new(self.pos_at(offs), ExprKind::List(values));
                return Some(ForKind::Collection {
                    key: var,
                    value: None,
                    expr,
                });
            }
            self.expect(Token::Rparen)?;
            let expr = Expr::new(self.pos_at(offs), ExprKind::Paren(Box::new(first)));
            return Some(ForKind::Collection {
                key: var,
                value: None,
                expr,
            });
        }
        let expr = self.parse_operand()?;
        Some(ForKind::Collection {
            key: var,
            value: None,
            expr,
        })
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    fn parse_binary_expr(&mut self, min_prec: u8) -> Option<Expr> {
        let mut x = self.parse_unary_expr()?;
        loop {
            let op = self.cur.token;
            let prec = op.precedence();
            if prec < min_prec {
                return Some(x);
            }
            match op {
                Token::Question => x = self.parse_ternary(x)?,
                Token::Fallback => {
                    let offs = self.cur.offset;
                    self.advance();
                    let secondary = self.parse_binary_expr(LOWEST_PREC + 1)?;
                    x = Expr::new(
                        self.pos_at(offs),
                        ExprKind::Fallback {
                            primary: Box::new(x),
                            secondary: Box::new(secondary),
                        },
                    );
                }
                Token::Is => x = self.parse_is(x)?,
                _ => {
                    let offs = self.cur.offset;
                    self.advance();
                    let y = self.parse_binary_expr(prec + 1)?;
                    x = Expr::new(
                        self.pos_at(offs),
                        ExprKind::Binary {
                            op,
                            l: Box::new(x),
                            r: Box::new(y),
                        },
                    );
                }
            }
        }
    }

    fn parse_ternary(&mut self, cond: Expr) -> Option<Expr> {
        let offs = self.cur.offset;
        self.advance(); // `?`
        let then = self.parse_binary_expr(LOWEST_PREC + 1)?;
        if self.expect(Token::Colon).is_none() {
            return None;
        }
        let otherwise = self.parse_binary_expr(LOWEST_PREC + 1)?;
        Some(Expr::new(
            self.pos_at(offs),
            ExprKind::Ternary {
                cond: Box::new(cond),
                then: Box::new(then),
                otherwise: Box::new(otherwise),
            },
        ))
    }

    /// `x is integer | float | …`.
    fn parse_is(&mut self, x: Expr) -> Option<Expr> {
        let offs = self.cur.offset;
        self.advance(); // `is`
        let mut types = Vec::new();
        let mut bits = 0u8;
        loop {
            let bit = self.cur.token.type_bit();
            if bit != 0 {
                bits |= bit;
                types.push(self.cur.token);
                self.advance();
            } else if self.cur.token == Token::Or {
                self.advance();
            } else {
                break;
            }
        }
        if types.is_empty() {
            self.report(offs, "invalid type check expression");
            return None;
        }
        Some(Expr::new(
            self.pos_at(offs),
            ExprKind::IsType {
                x: Box::new(x),
                bits,
                types,
            },
        ))
    }

    fn parse_unary_expr(&mut self) -> Option<Expr> {
        let offs = self.cur.offset;
        match self.cur.token {
            Token::Add | Token::Sub | Token::Not | Token::Xor => {
                let op = self.cur.token;
                self.advance();
                let x = self.parse_operand()?;
                Some(Expr::new(
                    self.pos_at(offs),
                    ExprKind::Unary { op, x: Box::new(x) },
                ))
            }
            Token::Sizeof => {
                self.advance();
                let x = self.parse_operand()?;
                Some(Expr::new(self.pos_at(offs), ExprKind::SizeOf(Box::new(x))))
            }
            Token::Tilde => {
                self.advance();
                let x = self.parse_operand()?;
                Some(Expr::new(self.pos_at(offs), ExprKind::ReadFd(Box::new(x))))
            }
            Token::Dollar => {
                // positional reference `$N`: an identifier named by digits
                self.advance();
                let lit = self.cur.lit.clone();
                self.expect(Token::Integer)?;
                Some(Expr::new(self.pos_at(offs), ExprKind::Ident(lit)))
            }
            Token::TInteger | Token::TFloat | Token::TBoolean | Token::TString => {
                let to = self.cur.token.type_kind();
                self.advance();
                self.expect(Token::Lparen)?;
                let x = self.parse_binary_expr(LOWEST_PREC + 1)?;
                self.expect(Token::Rparen)?;
                Some(Expr::new(
                    self.pos_at(offs),
                    ExprKind::Cast { to, x: Box::new(x) },
                ))
            }
            _ => self.parse_operand(),
        }
    }

    fn parse_operand(&mut self) -> Option<Expr> {
        let x = self.parse_primary()?;
        self.parse_index_suffix(x)
    }

    /// Postfix `[index]`, applicable to any operand.
    fn parse_index_suffix(&mut self, mut x: Expr) -> Option<Expr> {
        while self.cur.token == Token::Lbrack {
            let offs = self.cur.offset;
            self.advance();
            let index = self.parse_binary_expr(LOWEST_PREC + 1)?;
            self.expect(Token::Rbrack)?;
            x = Expr::new(
                self.pos_at(offs),
                ExprKind::Index {
                    base: Box::new(x),
                    index: Box::new(index),
                },
            );
        }
        Some(x)
    }

    fn parse_primary(&mut self) -> Option<Expr> {
        let offs = self.cur.offset;
        match self.cur.token {
            Token::Ident => {
                let name = self.cur.lit.clone();
                self.advance();
                Some(Expr::new(self.pos_at(offs), ExprKind::Ident(name)))
            }
            Token::Integer => {
                let lit = self.cur.lit.clone();
                self.advance();
                match lit.parse::<i64>() {
                    Ok(v) => Some(Expr::new(
                        self.pos_at(offs),
                        ExprKind::Literal(Literal::Int(v)),
                    )),
                    Err(_) => {
                        self.report(offs, &format!("integer literal {lit} out of range"));
                        None
                    }
                }
            }
            Token::Float => {
                let lit = self.cur.lit.clone();
                self.advance();
                match lit.parse::<f64>() {
                    Ok(v) => Some(Expr::new(
                        self.pos_at(offs),
                        ExprKind::Literal(Literal::Float(v)),
                    )),
                    Err(_) => {
                        self.report(offs, &format!("invalid float literal {lit}"));
                        None
                    }
                }
            }
            Token::Boolean => {
                let v = self.cur.lit == "true";
                self.advance();
                Some(Expr::new(
                    self.pos_at(offs),
                    ExprKind::Literal(Literal::Bool(v)),
                ))
            }
            Token::String => {
                let expr = match self.cur.expr.take() {
                    Some(e) => e,
                    None => Expr::new(
                        self.pos_at(offs),
                        ExprKind::Literal(Literal::Str {
                            value: self.cur.lit.clone(),
                            quote: Some('\''),
                        }),
                    ),
                };
                self.advance();
                Some(expr)
            }
            Token::Lparen => {
                self.advance();
                let inner = self.parse_binary_expr(LOWEST_PREC + 1)?;
                self.expect(Token::Rparen)?;
                Some(Expr::new(
                    self.pos_at(offs),
                    ExprKind::Paren(Box::new(inner)),
                ))
            }
            Token::Lbrack => self.parse_list_literal(),
            Token::Lbrace => self.parse_map_literal(),
            _ => {
                self.report_here(&format!("invalid token {}", self.cur.token));
                None
            }
        }
    }

    fn parse_list_literal(&mut self) -> Option<Expr> {
        let offs = self.cur.offset;
        self.advance(); // `[`
        let mut values = Vec::new();
        if self.cur.token != Token::Rbrack {
            values.push(self.parse_operand()?);
            while self.cur.token == Token::Comma {
                self.advance();
                if self.cur.token == Token::Rbrack {
                    break;
                }
                values.push(self.parse_operand()?);
            }
        }
        self.expect(Token::Rbrack)?;
        Some(Expr::new(self.pos_at(offs), ExprKind::List(values)))
    }

    fn parse_map_literal(&mut self) -> Option<Expr> {
        let offs = self.cur.offset;
        self.advance(); // `{`
        let mut entries = Vec::new();
        if self.cur.token != Token::Rbrace {
            loop {
                let key = self.parse_operand()?;
                self.expect(Token::Colon)?;
                let value = self.parse_operand()?;
                entries.push((key, value));
                if self.cur.token == Token::Comma {
                    self.advance();
                    if self.cur.token == Token::Rbrace {
                        break;
                    }
                } else {
                    break;
                }
            }
        }
        self.expect(Token::Rbrace)?;
        Some(Expr::new(self.pos_at(offs), ExprKind::MapLit(entries)))
    }
}

/// Depth-first include resolution: register the file, scan its leading
/// `include` directives, recurse into each new file, and remember where the
/// real program resumes.
fn collect_includes(
    set: &mut SourceSet,
    out: &mut Vec<(Arc<SourceFile>, usize)>,
    path: &Path,
) -> Result<(), ParseError> {
    let file = SourceFile::read(path)
        .map_err(|e| ParseError::Include(format!("cannot read {}: {e}", path.display())))?;
    if set.contains(file.abs()) {
        return Ok(());
    }
    set.add(file.clone());
    let slot = out.len();
    out.push((file.clone(), 0));

    let mut scanner = Scanner::new(file.clone());
    let resume;
    loop {
        let lx = scanner.scan();
        match lx.token {
            Token::Linefeed => continue,
            Token::Include => {
                let path_lx = scanner.scan();
                if path_lx.token != Token::String {
                    return Err(ParseError::Include(format!(
                        "{} include path must be a string",
                        file.position(path_lx.offset)
                    )));
                }
                let included = file.dir().join(&path_lx.lit);
                debug!(from = %file.name(), include = %included.display(), "resolving include");
                collect_includes(set, out, &included)?;
                let end = scanner.scan();
                if !matches!(end.token, Token::Linefeed | Token::Eof) {
                    return Err(ParseError::Include(format!(
                        "{} expect linefeed after include",
                        file.position(end.offset)
                    )));
                }
            }
            _ => {
                resume = lx.offset;
                break;
            }
        }
    }
    out[slot].1 = resume;
    Ok(())
}
