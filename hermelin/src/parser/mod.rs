//! Recursive-descent parser
//!
//! ```text
//! module    := item*
//! item      := IDENT '(' params? ')' block | stmt
//! stmt      := 'if' expr block ('else' (block | if))?
//!            | 'while' expr block
//!            | 'for' '('? IDENT ':' expr ')'? block
//!            | 'return' expr? ';' | 'break' ';' | 'continue' ';'
//!            | block
//!            | expr ';'
//! ```
//!
//! Binding strength, loosest first: `=` (right), `||`, `&&`, `== !=`,
//! `< > <= >=`, `+ -`, `* /`, unary `- !`, `^` (right), call and index.
//! The `;` after the last statement of a block or of the input may be left
//! out.

use crate::ast::{BinOp, FunctionDef, LineIndex, Node, Span, UnOp};
use crate::error::{CompileError, Result};
use crate::lexer::{Token, tokenize};
use std::rc::Rc;


const STACK_RED_ZONE: usize = 64 * 1024;
const STACK_GROW_SIZE: usize = 2 * 1024 * 1024;

/// Lex and parse a whole source text
pub fn parse_source(filename: &str, source: &str) -> Result<Node> {
    let tokens = tokenize(source)?;
    parse(filename, source, tokens)
}

/// Parse tokens into a [`Node::Module`]
pub fn parse(filename: &str, source: &str, tokens: Vec<(Token, Span)>) -> Result<Node> {
    let mut parser = Parser {
        tokens,
        pos: 0,
        lines: LineIndex::new(source),
        eof: Span::new(source.len(), source.len()),
    };
    let module = parser.module()?;
    tracing::trace!(filename, tokens = parser.tokens.len(), "parsed");
    Ok(module)
}

struct Parser {
    tokens: Vec<(Token, Span)>,
    pos: usize,
    lines: LineIndex,
    eof: Span,
}

impl Parser {
    // ---- token cursor ----

    fn peek(&self) -> Option<&Token> {
        self.peek_at(0)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset).map(|(t, _)| t)
    }

    fn span(&self) -> Span {
        self.tokens.get(self.pos).map_or(self.eof, |(_, s)| *s)
    }

    fn line(&self) -> usize {
        self.lines.line(self.span().start)
    }

    fn at(&self, token: &Token) -> bool {
        self.peek() == Some(token)
    }

    fn bump(&mut self) -> Option<(Token, Span)> {
        let next = self.tokens.get(self.pos).cloned();
        if next.is_some() {
            self.pos += 1;
        }
        next
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.at(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn found(&self) -> String {
        match self.peek() {
            Some(token) => format!("`{token}`"),
            None => "end of input".to_string(),
        }
    }

    fn error<T>(&self, expected: &str) -> Result<T> {
        Err(CompileError::parser(
            format!("expected {expected}, found {}", self.found()),
            self.span(),
        ))
    }

    fn expect(&mut self, token: &Token) -> Result<()> {
        if self.eat(token) {
            Ok(())
        } else {
            self.error(&format!("`{token}`"))
        }
    }

    fn ident(&mut self) -> Result<String> {
        match self.peek() {
            Some(Token::Ident(name)) => {
                let name = name.clone();
                self.pos += 1;
                Ok(name)
            }
            _ => self.error("identifier"),
        }
    }

    /// `;`, optional before `}` and at end of input
    fn terminator(&mut self) -> Result<()> {
        if self.eat(&Token::Semi) || self.at(&Token::RBrace) || self.peek().is_none() {
            Ok(())
        } else {
            self.error("`;`")
        }
    }

    // ---- items ----

    fn module(&mut self) -> Result<Node> {
        let mut items = Vec::new();
        while self.peek().is_some() {
            if self.at_function_definition() {
                items.push(self.function()?);
            } else {
                items.push(self.statement()?);
            }
        }
        Ok(Node::Module(items))
    }

    /// `IDENT ( ... ) {` with a balanced parameter list
    fn at_function_definition(&self) -> bool {
        if !matches!(self.peek(), Some(Token::Ident(_))) || self.peek_at(1) != Some(&Token::LParen)
        {
            return false;
        }
        let mut depth = 0usize;
        let mut offset = 1;
        while let Some(token) = self.peek_at(offset) {
            match token {
                Token::LParen => depth += 1,
                Token::RParen => {
                    depth -= 1;
                    if depth == 0 {
                        return self.peek_at(offset + 1) == Some(&Token::LBrace);
                    }
                }
                _ => {}
            }
            offset += 1;
        }
        false
    }

    fn function(&mut self) -> Result<Node> {
        let line = self.line();
        let name = self.ident()?;
        self.expect(&Token::LParen)?;
        let mut params: Vec<String> = Vec::new();
        if !self.at(&Token::RParen) {
            loop {
                let span = self.span();
                let param = self.ident()?;
                if params.contains(&param) {
                    return Err(CompileError::parser(
                        format!("duplicate parameter `{param}` in `{name}`"),
                        span,
                    ));
                }
                params.push(param);
                if !self.eat(&Token::Comma) {
                    break;
                }
            }
        }
        self.expect(&Token::RParen)?;
        let body = self.block()?;
        Ok(Node::Function(Rc::new(FunctionDef {
            name,
            params,
            body,
            line,
        })))
    }

    // ---- statements ----

    fn block(&mut self) -> Result<Node> {
        self.expect(&Token::LBrace)?;
        let mut stmts = Vec::new();
        while !self.at(&Token::RBrace) {
            if self.peek().is_none() {
                return self.error("`}`");
            }
            stmts.push(self.statement()?);
        }
        self.expect(&Token::RBrace)?;
        Ok(Node::Block(stmts))
    }

    fn statement(&mut self) -> Result<Node> {
        stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || self.statement_inner())
    }

    fn statement_inner(&mut self) -> Result<Node> {
        match self.peek() {
            Some(Token::If) => self.if_statement(),
            Some(Token::While) => {
                self.bump();
                let cond = self.expr()?;
                let body = self.block()?;
                Ok(Node::While {
                    cond: Box::new(cond),
                    body: Box::new(body),
                })
            }
            Some(Token::For) => self.for_statement(),
            Some(Token::Return) => {
                self.bump();
                let value = if self.at(&Token::Semi) || self.at(&Token::RBrace) || self.peek().is_none() {
                    None
                } else {
                    Some(Box::new(self.expr()?))
                };
                self.terminator()?;
                Ok(Node::Return(value))
            }
            Some(Token::Break) => {
                self.bump();
                self.terminator()?;
                Ok(Node::Break)
            }
            Some(Token::Continue) => {
                self.bump();
                self.terminator()?;
                Ok(Node::Continue)
            }
            Some(Token::LBrace) => self.block(),
            Some(Token::Semi) => self.error("statement"),
            _ => {
                let expr = self.expr()?;
                self.terminator()?;
                Ok(Node::stmt(expr))
            }
        }
    }

    fn if_statement(&mut self) -> Result<Node> {
        self.expect(&Token::If)?;
        let cond = self.expr()?;
        let then_branch = self.block()?;
        let else_branch = if self.eat(&Token::Else) {
            let branch = if self.at(&Token::If) {
                self.if_statement()?
            } else {
                self.block()?
            };
            Some(Box::new(branch))
        } else {
            None
        };
        Ok(Node::If {
            cond: Box::new(cond),
            then_branch: Box::new(then_branch),
            else_branch,
        })
    }

    fn for_statement(&mut self) -> Result<Node> {
        self.expect(&Token::For)?;
        // `(` here opens the loop header unless it starts the iterated expression
        let parenthesized =
            self.at(&Token::LParen) && self.peek_at(2) == Some(&Token::Colon);
        if parenthesized {
            self.bump();
        }
        let var = self.ident()?;
        self.expect(&Token::Colon)?;
        let iter = self.expr()?;
        if parenthesized {
            self.expect(&Token::RParen)?;
        }
        let body = self.block()?;
        Ok(Node::For {
            var,
            iter: Box::new(iter),
            body: Box::new(body),
        })
    }

    // ---- expressions ----

    fn expr(&mut self) -> Result<Node> {
        stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || self.assignment())
    }

    fn assignment(&mut self) -> Result<Node> {
        let start = self.span();
        let target = self.or()?;
        if !self.at(&Token::Eq) {
            return Ok(target);
        }
        if !matches!(target, Node::Ident(_) | Node::Index { .. }) {
            return Err(CompileError::parser(
                "invalid assignment target",
                start.merge(self.span()),
            ));
        }
        self.bump();
        let value = self.expr()?;
        Ok(Node::binary(BinOp::Assign, target, value))
    }

    /// One left-associative precedence level
    fn binary_level(
        &mut self,
        ops: &[(Token, BinOp)],
        next: fn(&mut Self) -> Result<Node>,
    ) -> Result<Node> {
        let mut left = next(self)?;
        'outer: loop {
            for (token, op) in ops {
                if self.eat(token) {
                    let right = next(self)?;
                    left = Node::binary(*op, left, right);
                    continue 'outer;
                }
            }
            return Ok(left);
        }
    }

    fn or(&mut self) -> Result<Node> {
        self.binary_level(&[(Token::OrOr, BinOp::Or)], Self::and)
    }

    fn and(&mut self) -> Result<Node> {
        self.binary_level(&[(Token::AndAnd, BinOp::And)], Self::equality)
    }

    fn equality(&mut self) -> Result<Node> {
        self.binary_level(
            &[(Token::EqEq, BinOp::Eq), (Token::NotEq, BinOp::Ne)],
            Self::comparison,
        )
    }

    fn comparison(&mut self) -> Result<Node> {
        self.binary_level(
            &[
                (Token::LtEq, BinOp::Le),
                (Token::GtEq, BinOp::Ge),
                (Token::Lt, BinOp::Lt),
                (Token::Gt, BinOp::Gt),
            ],
            Self::additive,
        )
    }

    fn additive(&mut self) -> Result<Node> {
        self.binary_level(
            &[(Token::Plus, BinOp::Add), (Token::Minus, BinOp::Sub)],
            Self::multiplicative,
        )
    }

    fn multiplicative(&mut self) -> Result<Node> {
        self.binary_level(
            &[(Token::Star, BinOp::Mul), (Token::Slash, BinOp::Div)],
            Self::unary,
        )
    }

    fn unary(&mut self) -> Result<Node> {
        let op = match self.peek() {
            Some(Token::Minus) => UnOp::Neg,
            Some(Token::Bang) => UnOp::Not,
            _ => return self.power(),
        };
        self.bump();
        let expr = stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || self.unary())?;
        Ok(Node::Unary {
            op,
            expr: Box::new(expr),
        })
    }

    fn power(&mut self) -> Result<Node> {
        let base = self.postfix()?;
        if self.eat(&Token::Caret) {
            // right associative, and `2 ^ -1` is allowed
            let exponent = self.unary()?;
            return Ok(Node::binary(BinOp::Pow, base, exponent));
        }
        Ok(base)
    }

    fn postfix(&mut self) -> Result<Node> {
        let Some(Token::Ident(name)) = self.peek() else {
            return self.primary();
        };
        let name = name.clone();
        let line = self.line();
        self.bump();

        if self.eat(&Token::LParen) {
            let args = self.arguments()?;
            return Ok(Node::Call { name, args, line });
        }
        if self.at(&Token::LBracket) {
            let mut indices = Vec::new();
            while self.eat(&Token::LBracket) {
                indices.push(self.expr()?);
                self.expect(&Token::RBracket)?;
            }
            return Ok(Node::Index { name, indices });
        }
        Ok(Node::Ident(name))
    }

    /// Comma separated expressions up to and including `)`
    fn arguments(&mut self) -> Result<Vec<Node>> {
        let mut args = Vec::new();
        if self.eat(&Token::RParen) {
            return Ok(args);
        }
        loop {
            args.push(self.expr()?);
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        self.expect(&Token::RParen)?;
        Ok(args)
    }

    fn primary(&mut self) -> Result<Node> {
        match self.peek() {
            Some(Token::IntLit(n)) => {
                let n = *n;
                self.bump();
                Ok(Node::Int(n))
            }
            Some(Token::RealLit(x)) => {
                let x = *x;
                self.bump();
                Ok(Node::Real(x))
            }
            Some(Token::StringLit(s)) => {
                let s = s.clone();
                self.bump();
                Ok(Node::Str(s))
            }
            Some(Token::LParen) => {
                self.bump();
                let expr = self.expr()?;
                self.expect(&Token::RParen)?;
                Ok(expr)
            }
            Some(Token::LBracket) => {
                self.bump();
                let mut elements = Vec::new();
                if !self.eat(&Token::RBracket) {
                    loop {
                        elements.push(self.expr()?);
                        if !self.eat(&Token::Comma) {
                            break;
                        }
                    }
                    self.expect(&Token::RBracket)?;
                }
                Ok(Node::Array(elements))
            }
            _ => self.error("expression"),
        }
    }
}
