// Recursive-descent parser building the statement/expression tree
// Operator precedence follows the Lua reference table; `..` and `^` are
// right-associative

use std::rc::Rc;

use smol_str::SmolStr;

use super::token::{Token, TokenKind};
use crate::ast::{
    BinOp, Block, Expr, FunctionBody, FunctionTarget, Span, Stat, TableField, UnOp,
};
use crate::lua_vm::{LuaError, LuaResult};

pub struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    chunk_name: &'a str,
}

impl<'a> Parser<'a> {
    pub fn new(tokens: Vec<Token>, chunk_name: &'a str) -> Self {
        Parser {
            tokens,
            pos: 0,
            chunk_name,
        }
    }

    /// Parse a whole chunk; the resulting block is the chunk body.
    pub fn parse_chunk(mut self) -> LuaResult<Block> {
        let block = self.parse_block()?;
        self.expect(TokenKind::Eof)?;
        Ok(block)
    }

    fn error(&self, message: impl Into<String>) -> LuaError {
        let line = self.current().line;
        LuaError::syntax(
            format!("{}:{}: {}", self.chunk_name, line, message.into()),
            line,
        )
    }

    fn current(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn kind(&self) -> &TokenKind {
        &self.current().kind
    }

    fn span(&self) -> Span {
        Span::new(self.current().line)
    }

    fn advance(&mut self) -> Token {
        let token = self.tokens[self.pos.min(self.tokens.len() - 1)].clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, kind: TokenKind) -> bool {
        if *self.kind() == kind {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind) -> LuaResult<Token> {
        if *self.kind() == kind {
            Ok(self.advance())
        } else {
            Err(self.error(format!(
                "{} expected near {}",
                kind.describe(),
                self.kind().describe()
            )))
        }
    }

    fn expect_name(&mut self) -> LuaResult<SmolStr> {
        match self.kind().clone() {
            TokenKind::Name(name) => {
                self.advance();
                Ok(name)
            }
            other => Err(self.error(format!("<name> expected near {}", other.describe()))),
        }
    }

    fn block_follows(&self) -> bool {
        matches!(
            self.kind(),
            TokenKind::End
                | TokenKind::Else
                | TokenKind::ElseIf
                | TokenKind::Until
                | TokenKind::Eof
        )
    }

    fn parse_block(&mut self) -> LuaResult<Block> {
        let mut stats = Vec::new();
        loop {
            if self.block_follows() {
                break;
            }
            if *self.kind() == TokenKind::Return {
                stats.push(self.parse_return()?);
                break;
            }
            if let Some(stat) = self.parse_statement()? {
                stats.push(stat);
            }
        }
        Ok(Block { stats })
    }

    fn parse_return(&mut self) -> LuaResult<Stat> {
        let span = self.span();
        self.expect(TokenKind::Return)?;
        let mut exprs = Vec::new();
        if !self.block_follows() && *self.kind() != TokenKind::Semicolon {
            exprs = self.parse_expr_list()?;
        }
        self.eat(TokenKind::Semicolon);
        if !self.block_follows() {
            return Err(self.error("'end' expected after return statement"));
        }
        Ok(Stat::Return { exprs, span })
    }

    fn parse_statement(&mut self) -> LuaResult<Option<Stat>> {
        let span = self.span();
        let stat = match self.kind() {
            TokenKind::Semicolon => {
                self.advance();
                return Ok(None);
            }
            TokenKind::If => self.parse_if()?,
            TokenKind::While => self.parse_while()?,
            TokenKind::Do => {
                self.advance();
                let body = self.parse_block()?;
                self.expect(TokenKind::End)?;
                Stat::Do { body, span }
            }
            TokenKind::For => self.parse_for()?,
            TokenKind::Repeat => self.parse_repeat()?,
            TokenKind::Function => self.parse_function_stat()?,
            TokenKind::Local => self.parse_local()?,
            TokenKind::Break => {
                self.advance();
                Stat::Break { span }
            }
            TokenKind::Goto => {
                self.advance();
                let label = self.expect_name()?;
                Stat::Goto { label, span }
            }
            TokenKind::DoubleColon => {
                self.advance();
                let name = self.expect_name()?;
                self.expect(TokenKind::DoubleColon)?;
                Stat::Label { name, span }
            }
            _ => self.parse_expr_statement()?,
        };
        Ok(Some(stat))
    }

    fn parse_if(&mut self) -> LuaResult<Stat> {
        let span = self.span();
        self.expect(TokenKind::If)?;
        let mut arms = Vec::new();
        let cond = self.parse_expr()?;
        self.expect(TokenKind::Then)?;
        arms.push((cond, self.parse_block()?));
        let mut orelse = None;
        loop {
            match self.kind() {
                TokenKind::ElseIf => {
                    self.advance();
                    let cond = self.parse_expr()?;
                    self.expect(TokenKind::Then)?;
                    arms.push((cond, self.parse_block()?));
                }
                TokenKind::Else => {
                    self.advance();
                    orelse = Some(self.parse_block()?);
                    self.expect(TokenKind::End)?;
                    break;
                }
                TokenKind::End => {
                    self.advance();
                    break;
                }
                other => {
                    return Err(self.error(format!(
                        "'end' expected near {}",
                        other.describe()
                    )));
                }
            }
        }
        Ok(Stat::If { arms, orelse, span })
    }

    fn parse_while(&mut self) -> LuaResult<Stat> {
        let span = self.span();
        self.expect(TokenKind::While)?;
        let cond = self.parse_expr()?;
        self.expect(TokenKind::Do)?;
        let body = self.parse_block()?;
        self.expect(TokenKind::End)?;
        Ok(Stat::While { cond, body, span })
    }

    fn parse_repeat(&mut self) -> LuaResult<Stat> {
        let span = self.span();
        self.expect(TokenKind::Repeat)?;
        let body = self.parse_block()?;
        self.expect(TokenKind::Until)?;
        let until = self.parse_expr()?;
        Ok(Stat::Repeat { body, until, span })
    }

    fn parse_for(&mut self) -> LuaResult<Stat> {
        let span = self.span();
        self.expect(TokenKind::For)?;
        let first = self.expect_name()?;
        if self.eat(TokenKind::Assign) {
            let start = self.parse_expr()?;
            self.expect(TokenKind::Comma)?;
            let limit = self.parse_expr()?;
            let step = if self.eat(TokenKind::Comma) {
                Some(self.parse_expr()?)
            } else {
                None
            };
            self.expect(TokenKind::Do)?;
            let body = self.parse_block()?;
            self.expect(TokenKind::End)?;
            return Ok(Stat::NumericFor {
                var: first,
                start,
                limit,
                step,
                body,
                span,
            });
        }

        let mut names = vec![first];
        while self.eat(TokenKind::Comma) {
            names.push(self.expect_name()?);
        }
        self.expect(TokenKind::In)?;
        let exprs = self.parse_expr_list()?;
        self.expect(TokenKind::Do)?;
        let body = self.parse_block()?;
        self.expect(TokenKind::End)?;
        Ok(Stat::GenericFor {
            names,
            exprs,
            body,
            span,
        })
    }

    fn parse_function_stat(&mut self) -> LuaResult<Stat> {
        let span = self.span();
        self.expect(TokenKind::Function)?;
        let base = self.expect_name()?;
        let mut fields = Vec::new();
        let mut is_method = false;
        while self.eat(TokenKind::Dot) {
            fields.push(self.expect_name()?);
        }
        if self.eat(TokenKind::Colon) {
            fields.push(self.expect_name()?);
            is_method = true;
        }
        let target = FunctionTarget {
            base,
            fields,
            is_method,
        };
        let mut body = self.parse_function_body()?;
        if is_method {
            body.params.insert(0, SmolStr::new("self"));
        }
        Ok(Stat::Function { target, body, span })
    }

    fn parse_local(&mut self) -> LuaResult<Stat> {
        let span = self.span();
        self.expect(TokenKind::Local)?;
        if self.eat(TokenKind::Function) {
            let name = self.expect_name()?;
            let body = self.parse_function_body()?;
            return Ok(Stat::LocalFunction { name, body, span });
        }
        let mut names = vec![self.expect_name()?];
        while self.eat(TokenKind::Comma) {
            names.push(self.expect_name()?);
        }
        let values = if self.eat(TokenKind::Assign) {
            self.parse_expr_list()?
        } else {
            Vec::new()
        };
        Ok(Stat::Local {
            names,
            values,
            span,
        })
    }

    fn parse_function_body(&mut self) -> LuaResult<FunctionBody> {
        let span = self.span();
        self.expect(TokenKind::LeftParen)?;
        let mut params = Vec::new();
        let mut is_vararg = false;
        if !self.eat(TokenKind::RightParen) {
            loop {
                match self.kind().clone() {
                    TokenKind::Name(name) => {
                        self.advance();
                        params.push(name);
                    }
                    TokenKind::Ellipsis => {
                        self.advance();
                        is_vararg = true;
                    }
                    other => {
                        return Err(self.error(format!(
                            "<name> or '...' expected near {}",
                            other.describe()
                        )));
                    }
                }
                if is_vararg || !self.eat(TokenKind::Comma) {
                    break;
                }
            }
            self.expect(TokenKind::RightParen)?;
        }
        let body = self.parse_block()?;
        self.expect(TokenKind::End)?;
        Ok(FunctionBody {
            params,
            is_vararg,
            body,
            span,
        })
    }

    /// Either an assignment or a call in statement position.
    fn parse_expr_statement(&mut self) -> LuaResult<Stat> {
        let span = self.span();
        let first = self.parse_suffixed_expr()?;
        if *self.kind() == TokenKind::Assign || *self.kind() == TokenKind::Comma {
            let mut targets = vec![first];
            while self.eat(TokenKind::Comma) {
                targets.push(self.parse_suffixed_expr()?);
            }
            for target in &targets {
                if !matches!(target, Expr::Name(..) | Expr::Index { .. }) {
                    return Err(self.error("cannot assign to this expression"));
                }
            }
            self.expect(TokenKind::Assign)?;
            let values = self.parse_expr_list()?;
            return Ok(Stat::Assign {
                targets,
                values,
                span,
            });
        }
        if !matches!(first, Expr::Call { .. } | Expr::MethodCall { .. }) {
            return Err(self.error("syntax error: unexpected expression statement"));
        }
        Ok(Stat::Call { expr: first, span })
    }

    fn parse_expr_list(&mut self) -> LuaResult<Vec<Expr>> {
        let mut exprs = vec![self.parse_expr()?];
        while self.eat(TokenKind::Comma) {
            exprs.push(self.parse_expr()?);
        }
        Ok(exprs)
    }

    fn parse_expr(&mut self) -> LuaResult<Expr> {
        self.parse_binary_expr(0)
    }

    /// Precedence-climbing over the Lua operator table.
    fn parse_binary_expr(&mut self, limit: u8) -> LuaResult<Expr> {
        let span = self.span();
        let mut lhs = if let Some(op) = unary_op(self.kind()) {
            self.advance();
            let operand = self.parse_binary_expr(UNARY_PRIORITY)?;
            Expr::Unary {
                op,
                operand: Box::new(operand),
                span,
            }
        } else {
            self.parse_simple_expr()?
        };

        while let Some((op, left_prio, right_prio)) = binary_op(self.kind()) {
            if left_prio <= limit {
                break;
            }
            let op_span = self.span();
            self.advance();
            let rhs = self.parse_binary_expr(right_prio)?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                span: op_span,
            };
        }
        Ok(lhs)
    }

    fn parse_simple_expr(&mut self) -> LuaResult<Expr> {
        let span = self.span();
        let expr = match self.kind().clone() {
            TokenKind::Nil => {
                self.advance();
                Expr::Nil(span)
            }
            TokenKind::True => {
                self.advance();
                Expr::True(span)
            }
            TokenKind::False => {
                self.advance();
                Expr::False(span)
            }
            TokenKind::Number(n) => {
                self.advance();
                Expr::Number(n, span)
            }
            TokenKind::Str(s) => {
                self.advance();
                Expr::Str(s, span)
            }
            TokenKind::Ellipsis => {
                self.advance();
                Expr::Vararg(span)
            }
            TokenKind::Function => {
                self.advance();
                let body = self.parse_function_body()?;
                Expr::Function(Rc::new(body), span)
            }
            TokenKind::LeftBrace => self.parse_table()?,
            _ => self.parse_suffixed_expr()?,
        };
        Ok(expr)
    }

    fn parse_primary_expr(&mut self) -> LuaResult<Expr> {
        let span = self.span();
        match self.kind().clone() {
            TokenKind::Name(name) => {
                self.advance();
                Ok(Expr::Name(name, span))
            }
            TokenKind::LeftParen => {
                self.advance();
                let inner = self.parse_expr()?;
                self.expect(TokenKind::RightParen)?;
                Ok(Expr::Paren(Box::new(inner)))
            }
            other => Err(self.error(format!("unexpected symbol near {}", other.describe()))),
        }
    }

    /// A primary expression followed by any chain of `.name`, `[expr]`,
    /// `:name(args)` and call suffixes.
    fn parse_suffixed_expr(&mut self) -> LuaResult<Expr> {
        let mut expr = self.parse_primary_expr()?;
        loop {
            let span = self.span();
            match self.kind().clone() {
                TokenKind::Dot => {
                    self.advance();
                    let name = self.expect_name()?;
                    expr = Expr::Index {
                        obj: Box::new(expr),
                        key: Box::new(Expr::Str(Rc::from(name.as_str()), span)),
                        span,
                    };
                }
                TokenKind::LeftBracket => {
                    self.advance();
                    let key = self.parse_expr()?;
                    self.expect(TokenKind::RightBracket)?;
                    expr = Expr::Index {
                        obj: Box::new(expr),
                        key: Box::new(key),
                        span,
                    };
                }
                TokenKind::Colon => {
                    self.advance();
                    let name = self.expect_name()?;
                    let args = self.parse_call_args()?;
                    expr = Expr::MethodCall {
                        obj: Box::new(expr),
                        name,
                        args,
                        span,
                    };
                }
                TokenKind::LeftParen | TokenKind::Str(_) | TokenKind::LeftBrace => {
                    let args = self.parse_call_args()?;
                    expr = Expr::Call {
                        func: Box::new(expr),
                        args,
                        span,
                    };
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn parse_call_args(&mut self) -> LuaResult<Vec<Expr>> {
        let span = self.span();
        match self.kind().clone() {
            TokenKind::LeftParen => {
                self.advance();
                let args = if *self.kind() == TokenKind::RightParen {
                    Vec::new()
                } else {
                    self.parse_expr_list()?
                };
                self.expect(TokenKind::RightParen)?;
                Ok(args)
            }
            // f"literal" and f{table} call sugar
            TokenKind::Str(s) => {
                self.advance();
                Ok(vec![Expr::Str(s, span)])
            }
            TokenKind::LeftBrace => Ok(vec![self.parse_table()?]),
            other => Err(self.error(format!(
                "function arguments expected near {}",
                other.describe()
            ))),
        }
    }

    fn parse_table(&mut self) -> LuaResult<Expr> {
        let span = self.span();
        self.expect(TokenKind::LeftBrace)?;
        let mut fields = Vec::new();
        while *self.kind() != TokenKind::RightBrace {
            match self.kind().clone() {
                TokenKind::LeftBracket => {
                    self.advance();
                    let key = self.parse_expr()?;
                    self.expect(TokenKind::RightBracket)?;
                    self.expect(TokenKind::Assign)?;
                    let value = self.parse_expr()?;
                    fields.push(TableField::Keyed(key, value));
                }
                TokenKind::Name(name)
                    if self.tokens.get(self.pos + 1).map(|t| &t.kind)
                        == Some(&TokenKind::Assign) =>
                {
                    self.advance();
                    self.advance();
                    let value = self.parse_expr()?;
                    fields.push(TableField::Named(name, value));
                }
                _ => {
                    fields.push(TableField::Item(self.parse_expr()?));
                }
            }
            if !self.eat(TokenKind::Comma) && !self.eat(TokenKind::Semicolon) {
                break;
            }
        }
        self.expect(TokenKind::RightBrace)?;
        Ok(Expr::Table { fields, span })
    }
}

const UNARY_PRIORITY: u8 = 12;

fn unary_op(kind: &TokenKind) -> Option<UnOp> {
    match kind {
        TokenKind::Minus => Some(UnOp::Neg),
        TokenKind::Not => Some(UnOp::Not),
        TokenKind::Hash => Some(UnOp::Len),
        _ => None,
    }
}

/// (operator, left priority, right priority); right < left means
/// right-associative.
fn binary_op(kind: &TokenKind) -> Option<(BinOp, u8, u8)> {
    let entry = match kind {
        TokenKind::Or => (BinOp::Or, 1, 1),
        TokenKind::And => (BinOp::And, 2, 2),
        TokenKind::Less => (BinOp::Lt, 3, 3),
        TokenKind::Greater => (BinOp::Gt, 3, 3),
        TokenKind::LessEq => (BinOp::Le, 3, 3),
        TokenKind::GreaterEq => (BinOp::Ge, 3, 3),
        TokenKind::NotEq => (BinOp::Ne, 3, 3),
        TokenKind::EqEq => (BinOp::Eq, 3, 3),
        TokenKind::DotDot => (BinOp::Concat, 9, 8),
        TokenKind::Plus => (BinOp::Add, 10, 10),
        TokenKind::Minus => (BinOp::Sub, 10, 10),
        TokenKind::Star => (BinOp::Mul, 11, 11),
        TokenKind::Slash => (BinOp::Div, 11, 11),
        TokenKind::Percent => (BinOp::Mod, 11, 11),
        TokenKind::Caret => (BinOp::Pow, 14, 13),
        _ => return None,
    };
    Some(entry)
}
