//! Expression parsing implementation
//!
//! This module handles parsing of Python expressions with one recursive
//! descent method per precedence level, from `lambda` down to atoms.
//!
//! # Precedence (lowest to highest)
//!
//! ```text
//! lambda
//! x if c else y
//! or
//! and
//! not
//! comparisons (chained): < <= > >= == != in, not in, is, is not
//! |
//! ^
//! &
//! << >>
//! + -
//! * / // %
//! unary - + ~
//! **
//! primary: atom with trailers (call, subscript, attribute)
//! ```
//!
//! Generator expressions are parsed as list comprehensions and evaluated eagerly.
//!
//! All parsing methods are implemented as `pub(crate)` methods on the [`Parser`] struct.

use crate::parser::ast::*;
use crate::parser::lexer::{unescape, TokenKind};
use crate::parser::parse::{ParseError, Parser};
use std::rc::Rc;

impl Parser {
    /// Parse expression (top-level entry point, no bare tuples)
    pub(crate) fn parse_expression(&mut self) -> Result<Expr, ParseError> {
        if self.check(&TokenKind::Lambda) {
            return self.parse_lambda();
        }
        self.parse_ternary()
    }

    /// Comma-separated expressions; more than one (or a trailing comma) builds a tuple
    pub(crate) fn parse_expression_list(&mut self) -> Result<Expr, ParseError> {
        let loc = self.current_location();
        let first = self.parse_star_or_expression()?;
        if !self.check(&TokenKind::Comma) {
            if matches!(first.kind, ExprKind::Starred(_)) {
                return self.error("can't use starred expression here");
            }
            return Ok(first);
        }

        let mut items = vec![first];
        while self.match_token(&TokenKind::Comma) {
            if self.at_expression_list_end() {
                break;
            }
            items.push(self.parse_star_or_expression()?);
        }
        Ok(Expr::new(ExprKind::Tuple(items), loc))
    }

    /// Targets of `for` loops and comprehensions; stops before `in`
    pub(crate) fn parse_target_list(&mut self) -> Result<Expr, ParseError> {
        let loc = self.current_location();
        let mut items = vec![self.parse_target_item()?];
        let mut is_tuple = false;
        while self.match_token(&TokenKind::Comma) {
            is_tuple = true;
            if self.check(&TokenKind::In) {
                break;
            }
            items.push(self.parse_target_item()?);
        }

        let target = if is_tuple {
            Expr::new(ExprKind::Tuple(items), loc)
        } else {
            items.remove(0)
        };
        self.validate_target(&target, "assign to")?;
        Ok(target)
    }

    fn parse_target_item(&mut self) -> Result<Expr, ParseError> {
        let loc = self.current_location();
        if self.match_token(&TokenKind::Star) {
            let inner = self.parse_bitwise_or()?;
            return Ok(Expr::new(ExprKind::Starred(Box::new(inner)), loc));
        }
        self.parse_bitwise_or()
    }

    fn parse_star_or_expression(&mut self) -> Result<Expr, ParseError> {
        let loc = self.current_location();
        if self.match_token(&TokenKind::Star) {
            let inner = self.parse_bitwise_or()?;
            return Ok(Expr::new(ExprKind::Starred(Box::new(inner)), loc));
        }
        self.parse_expression()
    }

    fn at_expression_list_end(&self) -> bool {
        self.at_statement_end()
            || matches!(
                self.peek().kind,
                TokenKind::Eq
                    | TokenKind::RParen
                    | TokenKind::RBracket
                    | TokenKind::RBrace
                    | TokenKind::Colon
                    | TokenKind::PlusEq
                    | TokenKind::MinusEq
            )
    }

    fn parse_lambda(&mut self) -> Result<Expr, ParseError> {
        let loc = self.current_location();
        self.advance();
        let params = self.parse_parameters(&TokenKind::Colon, false)?;
        self.expect_colon("after lambda parameters")?;
        let body = self.parse_expression()?;
        let body_loc = body.location;

        Ok(Expr::new(
            ExprKind::Lambda(Rc::new(FunctionDef {
                name: "<lambda>".to_string(),
                params,
                body: vec![Stmt::new(StmtKind::Return(Some(body)), body_loc)],
                decorators: Vec::new(),
                is_lambda: true,
                location: loc,
            })),
            loc,
        ))
    }

    /// Parse conditional expression: body if test else orelse
    fn parse_ternary(&mut self) -> Result<Expr, ParseError> {
        let body = self.parse_or_test()?;
        if !self.check(&TokenKind::If) {
            return Ok(body);
        }

        let loc = self.current_location();
        self.advance();
        let test = self.parse_or_test()?;
        self.expect_token(&TokenKind::Else, "expected 'else' in conditional expression")?;
        let orelse = self.parse_expression()?;
        Ok(Expr::new(
            ExprKind::IfExp {
                test: Box::new(test),
                body: Box::new(body),
                orelse: Box::new(orelse),
            },
            loc,
        ))
    }

    pub(crate) fn parse_or_test(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_and_test()?;
        while self.check(&TokenKind::Or) {
            let loc = self.current_location();
            self.advance();
            let right = self.parse_and_test()?;
            left = Expr::new(
                ExprKind::BoolOp {
                    op: BoolOp::Or,
                    left: Box::new(left),
                    right: Box::new(right),
                },
                loc,
            );
        }
        Ok(left)
    }

    fn parse_and_test(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_not_test()?;
        while self.check(&TokenKind::And) {
            let loc = self.current_location();
            self.advance();
            let right = self.parse_not_test()?;
            left = Expr::new(
                ExprKind::BoolOp {
                    op: BoolOp::And,
                    left: Box::new(left),
                    right: Box::new(right),
                },
                loc,
            );
        }
        Ok(left)
    }

    fn parse_not_test(&mut self) -> Result<Expr, ParseError> {
        if self.check(&TokenKind::Not) {
            let loc = self.current_location();
            self.advance();
            let operand = self.parse_not_test()?;
            return Ok(Expr::new(
                ExprKind::UnaryOp {
                    op: UnaryOp::Not,
                    operand: Box::new(operand),
                },
                loc,
            ));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expr, ParseError> {
        let left = self.parse_bitwise_or()?;
        let mut comparisons = Vec::new();

        loop {
            let op = match self.peek().kind {
                TokenKind::EqEq => CmpOp::Eq,
                TokenKind::NotEq => CmpOp::NotEq,
                TokenKind::Lt => CmpOp::Lt,
                TokenKind::Le => CmpOp::Le,
                TokenKind::Gt => CmpOp::Gt,
                TokenKind::Ge => CmpOp::Ge,
                TokenKind::In => CmpOp::In,
                TokenKind::Not if self.check_ahead(1, &TokenKind::In) => {
                    self.advance();
                    CmpOp::NotIn
                }
                TokenKind::Is => {
                    if self.check_ahead(1, &TokenKind::Not) {
                        self.advance();
                        CmpOp::IsNot
                    } else {
                        CmpOp::Is
                    }
                }
                _ => break,
            };
            self.advance();
            comparisons.push((op, self.parse_bitwise_or()?));
        }

        if comparisons.is_empty() {
            return Ok(left);
        }
        let loc = left.location;
        Ok(Expr::new(
            ExprKind::Compare {
                left: Box::new(left),
                comparisons,
            },
            loc,
        ))
    }

    pub(crate) fn parse_bitwise_or(&mut self) -> Result<Expr, ParseError> {
        self.parse_binary_level(0)
    }

    /// Left-associative binary levels from `|` down to `* / // %`
    fn parse_binary_level(&mut self, level: usize) -> Result<Expr, ParseError> {
        const LEVELS: usize = 6;
        if level == LEVELS {
            return self.parse_factor();
        }

        let mut left = self.parse_binary_level(level + 1)?;
        loop {
            let op = match (level, &self.peek().kind) {
                (0, TokenKind::Pipe) => BinOp::BitOr,
                (1, TokenKind::Caret) => BinOp::BitXor,
                (2, TokenKind::Amp) => BinOp::BitAnd,
                (3, TokenKind::LtLt) => BinOp::Shl,
                (3, TokenKind::GtGt) => BinOp::Shr,
                (4, TokenKind::Plus) => BinOp::Add,
                (4, TokenKind::Minus) => BinOp::Sub,
                (5, TokenKind::Star) => BinOp::Mul,
                (5, TokenKind::Slash) => BinOp::Div,
                (5, TokenKind::DoubleSlash) => BinOp::FloorDiv,
                (5, TokenKind::Percent) => BinOp::Mod,
                _ => break,
            };
            let loc = self.current_location();
            self.advance();
            let right = self.parse_binary_level(level + 1)?;
            left = Expr::new(
                ExprKind::BinaryOp {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                },
                loc,
            );
        }
        Ok(left)
    }

    /// Unary `-`, `+`, `~`
    fn parse_factor(&mut self) -> Result<Expr, ParseError> {
        let loc = self.current_location();
        let op = match self.peek().kind {
            TokenKind::Minus => UnaryOp::Neg,
            TokenKind::Plus => UnaryOp::Pos,
            TokenKind::Tilde => UnaryOp::Invert,
            _ => return self.parse_power(),
        };
        self.advance();
        let operand = self.parse_factor()?;
        Ok(Expr::new(
            ExprKind::UnaryOp {
                op,
                operand: Box::new(operand),
            },
            loc,
        ))
    }

    /// `**` binds tighter than unary minus on its left, and is right-associative
    fn parse_power(&mut self) -> Result<Expr, ParseError> {
        let base = self.parse_primary()?;
        if !self.check(&TokenKind::DoubleStar) {
            return Ok(base);
        }
        let loc = self.current_location();
        self.advance();
        let exponent = self.parse_factor()?;
        Ok(Expr::new(
            ExprKind::BinaryOp {
                op: BinOp::Pow,
                left: Box::new(base),
                right: Box::new(exponent),
            },
            loc,
        ))
    }

    /// Atom followed by any number of call, subscript and attribute trailers
    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_atom()?;

        loop {
            let loc = self.current_location();
            if self.match_token(&TokenKind::LParen) {
                let args = self.parse_call_arguments()?;
                self.expect_rparen("after call arguments")?;
                expr = Expr::new(
                    ExprKind::Call {
                        func: Box::new(expr),
                        args,
                    },
                    loc,
                );
            } else if self.match_token(&TokenKind::LBracket) {
                let index = self.parse_subscript()?;
                self.expect_token(&TokenKind::RBracket, "expected ']' after subscript")?;
                expr = Expr::new(
                    ExprKind::Subscript {
                        value: Box::new(expr),
                        index: Box::new(index),
                    },
                    loc,
                );
            } else if self.match_token(&TokenKind::Dot) {
                let attr = self.expect_identifier()?;
                expr = Expr::new(
                    ExprKind::Attribute {
                        value: Box::new(expr),
                        attr,
                    },
                    loc,
                );
            } else {
                break;
            }
        }

        Ok(expr)
    }

    fn parse_call_arguments(&mut self) -> Result<Vec<Argument>, ParseError> {
        let mut args = Vec::new();
        let mut seen_keyword = false;

        while !self.check(&TokenKind::RParen) {
            let arg = if self.match_token(&TokenKind::DoubleStar) {
                seen_keyword = true;
                Argument::DoubleStar(self.parse_expression()?)
            } else if self.match_token(&TokenKind::Star) {
                Argument::Star(self.parse_expression()?)
            } else if matches!(self.peek().kind, TokenKind::Name(_))
                && self.check_ahead(1, &TokenKind::Eq)
            {
                let name = self.expect_identifier()?;
                self.advance();
                seen_keyword = true;
                Argument::Keyword(name, self.parse_expression()?)
            } else {
                if seen_keyword {
                    return self.error("positional argument follows keyword argument");
                }
                let value = self.parse_expression()?;
                if self.check(&TokenKind::For) {
                    let loc = value.location;
                    let generators = self.parse_comprehension_clauses()?;
                    Argument::Positional(Expr::new(
                        ExprKind::ListComp {
                            element: Box::new(value),
                            generators,
                        },
                        loc,
                    ))
                } else {
                    Argument::Positional(value)
                }
            };
            args.push(arg);

            if !self.match_token(&TokenKind::Comma) {
                break;
            }
        }

        Ok(args)
    }

    /// Index inside `[...]`: an expression, a slice, or a tuple of those
    fn parse_subscript(&mut self) -> Result<Expr, ParseError> {
        let loc = self.current_location();
        let first = self.parse_slice_item()?;
        if !self.check(&TokenKind::Comma) {
            return Ok(first);
        }

        let mut items = vec![first];
        while self.match_token(&TokenKind::Comma) {
            if self.check(&TokenKind::RBracket) {
                break;
            }
            items.push(self.parse_slice_item()?);
        }
        Ok(Expr::new(ExprKind::Tuple(items), loc))
    }

    fn parse_slice_item(&mut self) -> Result<Expr, ParseError> {
        let loc = self.current_location();
        let lower = if self.check(&TokenKind::Colon) {
            None
        } else {
            let expr = self.parse_expression()?;
            if !self.check(&TokenKind::Colon) {
                return Ok(expr);
            }
            Some(Box::new(expr))
        };

        self.expect_colon("in slice")?;
        let upper = if self.slice_bound_follows() {
            Some(Box::new(self.parse_expression()?))
        } else {
            None
        };
        let step = if self.match_token(&TokenKind::Colon) && self.slice_bound_follows() {
            Some(Box::new(self.parse_expression()?))
        } else {
            None
        };

        Ok(Expr::new(ExprKind::Slice { lower, upper, step }, loc))
    }

    fn slice_bound_follows(&self) -> bool {
        !matches!(
            self.peek().kind,
            TokenKind::Colon | TokenKind::Comma | TokenKind::RBracket
        )
    }

    /// `for target in iter [if cond]...` clauses, one or more
    fn parse_comprehension_clauses(&mut self) -> Result<Vec<Comprehension>, ParseError> {
        let mut generators = Vec::new();
        while self.match_token(&TokenKind::For) {
            let target = self.parse_target_list()?;
            self.expect_token(&TokenKind::In, "expected 'in' in comprehension")?;
            let iter = self.parse_or_test()?;
            let mut conditions = Vec::new();
            while self.match_token(&TokenKind::If) {
                conditions.push(self.parse_or_test()?);
            }
            generators.push(Comprehension {
                target,
                iter,
                conditions,
            });
        }
        Ok(generators)
    }

    fn parse_atom(&mut self) -> Result<Expr, ParseError> {
        let loc = self.current_location();

        let kind = match self.peek_kind() {
            TokenKind::Int(n) => {
                self.advance();
                ExprKind::Int(n)
            }
            TokenKind::Float(x) => {
                self.advance();
                ExprKind::Float(x)
            }
            TokenKind::True => {
                self.advance();
                ExprKind::Bool(true)
            }
            TokenKind::False => {
                self.advance();
                ExprKind::Bool(false)
            }
            TokenKind::None => {
                self.advance();
                ExprKind::None
            }
            TokenKind::Name(name) => {
                self.advance();
                ExprKind::Name(name)
            }
            TokenKind::Str(_) | TokenKind::FString(_) | TokenKind::Bytes(_) => {
                return self.parse_string_sequence();
            }
            TokenKind::LParen => {
                self.advance();
                return self.parse_parenthesized(loc);
            }
            TokenKind::LBracket => {
                self.advance();
                return self.parse_list_display(loc);
            }
            TokenKind::LBrace => {
                self.advance();
                return self.parse_brace_display(loc);
            }
            TokenKind::Lambda => return self.parse_lambda(),
            TokenKind::Unsupported(word) => {
                return self.error(format!("'{}' expressions are not supported", word));
            }
            other => return self.error(format!("invalid syntax, unexpected {}", other)),
        };

        Ok(Expr::new(kind, loc))
    }

    /// Adjacent string literals concatenate; any f-string makes the whole an f-string
    fn parse_string_sequence(&mut self) -> Result<Expr, ParseError> {
        let loc = self.current_location();
        let mut parts: Vec<FStringPart> = Vec::new();
        let mut bytes: Option<Vec<u8>> = None;
        let mut is_format = false;
        let mut is_text = false;

        loop {
            match self.peek_kind() {
                TokenKind::Str(s) => {
                    is_text = true;
                    push_literal(&mut parts, &s);
                }
                TokenKind::FString(raw) => {
                    is_text = true;
                    is_format = true;
                    for part in parse_fstring(&raw, self.current_location())? {
                        match part {
                            FStringPart::Literal(s) => push_literal(&mut parts, &s),
                            field => parts.push(field),
                        }
                    }
                }
                TokenKind::Bytes(b) => bytes.get_or_insert_with(Vec::new).extend(b),
                _ => break,
            }
            self.advance();
        }

        if is_text && bytes.is_some() {
            return Err(ParseError {
                message: "cannot mix bytes and nonbytes literals".to_string(),
                location: loc,
            });
        }

        let kind = if let Some(bytes) = bytes {
            ExprKind::Bytes(bytes.into())
        } else if is_format {
            ExprKind::FString(parts)
        } else {
            match parts.pop() {
                Some(FStringPart::Literal(s)) => ExprKind::Str(s.into()),
                _ => ExprKind::Str("".into()),
            }
        };
        Ok(Expr::new(kind, loc))
    }

    fn parse_parenthesized(&mut self, loc: SourceLocation) -> Result<Expr, ParseError> {
        if self.match_token(&TokenKind::RParen) {
            return Ok(Expr::new(ExprKind::Tuple(Vec::new()), loc));
        }

        let first = self.parse_star_or_expression()?;

        if self.check(&TokenKind::For) {
            let generators = self.parse_comprehension_clauses()?;
            self.expect_rparen("after generator expression")?;
            return Ok(Expr::new(
                ExprKind::ListComp {
                    element: Box::new(first),
                    generators,
                },
                loc,
            ));
        }

        if self.match_token(&TokenKind::RParen) {
            if matches!(first.kind, ExprKind::Starred(_)) {
                return self.error("can't use starred expression here");
            }
            return Ok(first);
        }

        let mut items = vec![first];
        while self.match_token(&TokenKind::Comma) {
            if self.check(&TokenKind::RParen) {
                break;
            }
            items.push(self.parse_star_or_expression()?);
        }
        self.expect_rparen("to close tuple")?;
        Ok(Expr::new(ExprKind::Tuple(items), loc))
    }

    fn parse_list_display(&mut self, loc: SourceLocation) -> Result<Expr, ParseError> {
        if self.match_token(&TokenKind::RBracket) {
            return Ok(Expr::new(ExprKind::List(Vec::new()), loc));
        }

        let first = self.parse_star_or_expression()?;
        if self.check(&TokenKind::For) {
            let generators = self.parse_comprehension_clauses()?;
            self.expect_token(&TokenKind::RBracket, "expected ']' after list comprehension")?;
            return Ok(Expr::new(
                ExprKind::ListComp {
                    element: Box::new(first),
                    generators,
                },
                loc,
            ));
        }

        let mut items = vec![first];
        while self.match_token(&TokenKind::Comma) {
            if self.check(&TokenKind::RBracket) {
                break;
            }
            items.push(self.parse_star_or_expression()?);
        }
        self.expect_token(&TokenKind::RBracket, "expected ']' to close list")?;
        Ok(Expr::new(ExprKind::List(items), loc))
    }

    /// Dict or set display/comprehension. `**mapping` entries are stored with
    /// a starred key and a `None` placeholder value.
    fn parse_brace_display(&mut self, loc: SourceLocation) -> Result<Expr, ParseError> {
        if self.match_token(&TokenKind::RBrace) {
            return Ok(Expr::new(ExprKind::Dict(Vec::new()), loc));
        }

        let first_key = self.parse_dict_or_set_item()?;
        match first_key {
            DisplayItem::Pair(key, value) => {
                if self.check(&TokenKind::For) {
                    let generators = self.parse_comprehension_clauses()?;
                    self.expect_token(&TokenKind::RBrace, "expected '}' after dict comprehension")?;
                    return Ok(Expr::new(
                        ExprKind::DictComp {
                            key: Box::new(key),
                            value: Box::new(value),
                            generators,
                        },
                        loc,
                    ));
                }

                let mut entries = vec![(key, value)];
                while self.match_token(&TokenKind::Comma) {
                    if self.check(&TokenKind::RBrace) {
                        break;
                    }
                    match self.parse_dict_or_set_item()? {
                        DisplayItem::Pair(k, v) => entries.push((k, v)),
                        DisplayItem::Single(_) => {
                            return self.error("expected ':' in dict display");
                        }
                    }
                }
                self.expect_token(&TokenKind::RBrace, "expected '}' to close dict")?;
                Ok(Expr::new(ExprKind::Dict(entries), loc))
            }
            DisplayItem::Single(element) => {
                if self.check(&TokenKind::For) {
                    let generators = self.parse_comprehension_clauses()?;
                    self.expect_token(&TokenKind::RBrace, "expected '}' after set comprehension")?;
                    return Ok(Expr::new(
                        ExprKind::SetComp {
                            element: Box::new(element),
                            generators,
                        },
                        loc,
                    ));
                }

                let mut items = vec![element];
                while self.match_token(&TokenKind::Comma) {
                    if self.check(&TokenKind::RBrace) {
                        break;
                    }
                    match self.parse_dict_or_set_item()? {
                        DisplayItem::Single(e) => items.push(e),
                        DisplayItem::Pair(..) => {
                            return self.error("invalid syntax in set display");
                        }
                    }
                }
                self.expect_token(&TokenKind::RBrace, "expected '}' to close set")?;
                Ok(Expr::new(ExprKind::Set(items), loc))
            }
        }
    }

    fn parse_dict_or_set_item(&mut self) -> Result<DisplayItem, ParseError> {
        let loc = self.current_location();
        if self.match_token(&TokenKind::DoubleStar) {
            let mapping = self.parse_bitwise_or()?;
            return Ok(DisplayItem::Pair(
                Expr::new(ExprKind::Starred(Box::new(mapping)), loc),
                Expr::new(ExprKind::None, loc),
            ));
        }

        let key = self.parse_star_or_expression()?;
        if self.match_token(&TokenKind::Colon) {
            let value = self.parse_expression()?;
            Ok(DisplayItem::Pair(key, value))
        } else {
            Ok(DisplayItem::Single(key))
        }
    }
}

enum DisplayItem {
    Pair(Expr, Expr),
    Single(Expr),
}

fn push_literal(parts: &mut Vec<FStringPart>, text: &str) {
    if let Some(FStringPart::Literal(last)) = parts.last_mut() {
        last.push_str(text);
    } else {
        parts.push(FStringPart::Literal(text.to_string()));
    }
}

/// Split a raw f-string body into literal text and `{expr!c:spec}` fields
fn parse_fstring(raw: &str, loc: SourceLocation) -> Result<Vec<FStringPart>, ParseError> {
    let err = |message: &str| ParseError {
        message: format!("f-string: {}", message),
        location: loc,
    };

    let chars: Vec<char> = raw.chars().collect();
    let mut parts = Vec::new();
    let mut literal = String::new();
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            '{' if chars.get(i + 1) == Some(&'{') => {
                literal.push('{');
                i += 2;
            }
            '}' if chars.get(i + 1) == Some(&'}') => {
                literal.push('}');
                i += 2;
            }
            '}' => return Err(err("single '}' is not allowed")),
            '\\' => {
                let escaped = chars.get(i + 1).copied().unwrap_or('\\');
                let mut rest = chars[(i + 2).min(chars.len())..].iter().copied();
                let mut consumed = 0;
                let resolved = unescape(escaped, &mut || {
                    consumed += 1;
                    rest.next()
                });
                match resolved {
                    Some(Some(c)) => literal.push(c),
                    Some(None) => {}
                    None => {
                        literal.push('\\');
                        literal.push(escaped);
                    }
                }
                i += 2 + consumed;
            }
            '{' => {
                if !literal.is_empty() {
                    parts.push(FStringPart::Literal(std::mem::take(&mut literal)));
                }

                // Find the end of the expression, honoring nesting and quotes
                let start = i + 1;
                let mut depth = 0usize;
                let mut quote: Option<char> = None;
                let mut j = start;
                while j < chars.len() {
                    let c = chars[j];
                    if let Some(q) = quote {
                        if c == q {
                            quote = None;
                        }
                    } else {
                        match c {
                            '\'' | '"' => quote = Some(c),
                            '(' | '[' | '{' => depth += 1,
                            ')' | ']' => depth = depth.saturating_sub(1),
                            '}' if depth > 0 => depth -= 1,
                            '}' | ':' if depth == 0 => break,
                            '!' if depth == 0 && chars.get(j + 1) != Some(&'=') => break,
                            _ => {}
                        }
                    }
                    j += 1;
                }

                let mut expr_text: String = chars[start..j.min(chars.len())].iter().collect();
                let mut conversion = None;
                let mut spec = None;

                let self_documenting = expr_text.trim_end().ends_with('=')
                    && !expr_text.trim_end().ends_with("==")
                    && !expr_text.trim_end().ends_with("!=");
                if self_documenting {
                    push_literal(&mut parts, &expr_text);
                    let trimmed = expr_text.trim_end().trim_end_matches('=').to_string();
                    expr_text = trimmed;
                }

                if chars.get(j) == Some(&'!') {
                    conversion = chars.get(j + 1).copied();
                    if !matches!(conversion, Some('r') | Some('s') | Some('a')) {
                        return Err(err("invalid conversion character"));
                    }
                    j += 2;
                }
                if chars.get(j) == Some(&':') {
                    let spec_start = j + 1;
                    while j < chars.len() && chars[j] != '}' {
                        j += 1;
                    }
                    spec = Some(chars[spec_start..j.min(chars.len())].iter().collect());
                }
                if chars.get(j) != Some(&'}') {
                    return Err(err("expecting '}'"));
                }
                if expr_text.trim().is_empty() {
                    return Err(err("empty expression not allowed"));
                }
                if self_documenting && conversion.is_none() && spec.is_none() {
                    conversion = Some('r');
                }

                let mut sub = Parser::new(expr_text.trim()).map_err(|e| err(&e.message))?;
                let mut expr = sub.parse_expression_list().map_err(|e| err(&e.message))?;
                expr.location = loc;

                parts.push(FStringPart::Field {
                    expr: Box::new(expr),
                    conversion,
                    spec,
                });
                i = j + 1;
            }
            c => {
                literal.push(c);
                i += 1;
            }
        }
    }

    if !literal.is_empty() {
        parts.push(FStringPart::Literal(literal));
    }
    Ok(parts)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expr(source: &str) -> Expr {
        let mut parser = Parser::new(source).unwrap();
        parser.parse_expression_list().unwrap()
    }

    #[test]
    fn test_chained_comparison() {
        match expr("a < b <= c").kind {
            ExprKind::Compare { comparisons, .. } => {
                assert_eq!(comparisons.len(), 2);
                assert_eq!(comparisons[1].0, CmpOp::Le);
            }
            other => panic!("Expected comparison, got {:?}", other),
        }
        match expr("x not in y").kind {
            ExprKind::Compare { comparisons, .. } => assert_eq!(comparisons[0].0, CmpOp::NotIn),
            other => panic!("Expected comparison, got {:?}", other),
        }
    }

    #[test]
    fn test_power_binds_tighter_than_unary() {
        match expr("-2 ** 2").kind {
            ExprKind::UnaryOp { op, operand } => {
                assert_eq!(op, UnaryOp::Neg);
                assert!(matches!(operand.kind, ExprKind::BinaryOp { op: BinOp::Pow, .. }));
            }
            other => panic!("Expected unary op, got {:?}", other),
        }
    }

    #[test]
    fn test_bare_tuple() {
        assert!(matches!(expr("1, 2,").kind, ExprKind::Tuple(ref items) if items.len() == 2));
        assert!(matches!(expr("()").kind, ExprKind::Tuple(ref items) if items.is_empty()));
        assert!(matches!(expr("(1)").kind, ExprKind::Int(1)));
    }

    #[test]
    fn test_comprehensions() {
        assert!(matches!(expr("[x * 2 for x in xs if x]").kind, ExprKind::ListComp { .. }));
        assert!(matches!(expr("{k: v for k, v in pairs}").kind, ExprKind::DictComp { .. }));
        assert!(matches!(expr("{x for x in xs}").kind, ExprKind::SetComp { .. }));
        match expr("sum(x for x in xs)").kind {
            ExprKind::Call { args, .. } => {
                assert!(matches!(args[0], Argument::Positional(Expr { kind: ExprKind::ListComp { .. }, .. })))
            }
            other => panic!("Expected call, got {:?}", other),
        }
    }

    #[test]
    fn test_slices() {
        match expr("xs[1:-1:2]").kind {
            ExprKind::Subscript { index, .. } => {
                assert!(matches!(index.kind, ExprKind::Slice { lower: Some(_), upper: Some(_), step: Some(_) }))
            }
            other => panic!("Expected subscript, got {:?}", other),
        }
        match expr("xs[::]").kind {
            ExprKind::Subscript { index, .. } => {
                assert!(matches!(index.kind, ExprKind::Slice { lower: None, upper: None, step: None }))
            }
            other => panic!("Expected subscript, got {:?}", other),
        }
    }

    #[test]
    fn test_fstring_fields() {
        match expr(r#"f"a{x!r:>5}b{{c}}""#).kind {
            ExprKind::FString(parts) => {
                assert_eq!(parts.len(), 3);
                assert_eq!(parts[0], FStringPart::Literal("a".to_string()));
                match &parts[1] {
                    FStringPart::Field { conversion, spec, .. } => {
                        assert_eq!(*conversion, Some('r'));
                        assert_eq!(spec.as_deref(), Some(">5"));
                    }
                    other => panic!("Expected field, got {:?}", other),
                }
                assert_eq!(parts[2], FStringPart::Literal("b{c}".to_string()));
            }
            other => panic!("Expected f-string, got {:?}", other),
        }
    }

    #[test]
    fn test_fstring_self_documenting() {
        match expr(r#"f"{n=}""#).kind {
            ExprKind::FString(parts) => {
                assert_eq!(parts[0], FStringPart::Literal("n=".to_string()));
                assert!(matches!(parts[1], FStringPart::Field { conversion: Some('r'), .. }));
            }
            other => panic!("Expected f-string, got {:?}", other),
        }
    }

    #[test]
    fn test_lambda_and_keywords() {
        match expr("sorted(xs, key=lambda p: p[1], reverse=True)").kind {
            ExprKind::Call { args, .. } => {
                assert_eq!(args.len(), 3);
                assert!(matches!(&args[1], Argument::Keyword(name, e) if name == "key" && matches!(e.kind, ExprKind::Lambda(_))));
            }
            other => panic!("Expected call, got {:?}", other),
        }
    }

    #[test]
    fn test_string_concatenation() {
        assert_eq!(expr("'a' 'b'").kind, ExprKind::Str("ab".into()));
    }
}
