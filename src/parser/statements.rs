//! Statement parsing implementation
//!
//! This module handles parsing of all Python statement types:
//!
//! - Simple statements: assignment, augmented assignment, `pass`, `return`,
//!   `global`, `del`, `raise`, `assert`, `import`, expression statements
//! - Compound statements: `if`, `while`, `for`, `try`, `def`, `class`
//! - Blocks: an indented suite, or simple statements on the header line
//!
//! # Grammar
//!
//! ```text
//! statement  ::= compound_stmt | simple_stmt (';' simple_stmt)* NEWLINE
//! block      ::= ':' (NEWLINE INDENT statement+ DEDENT | simple_stmt_line)
//! ```
//!
//! All parsing methods are implemented as `pub(crate)` methods on the [`Parser`] struct.

use crate::parser::ast::*;
use crate::parser::lexer::TokenKind;
use crate::parser::parse::{ParseError, Parser};
use std::rc::Rc;

impl Parser {
    /// Parse one logical line. Simple statements separated by `;` produce
    /// several nodes, compound statements produce exactly one.
    pub(crate) fn parse_statement(&mut self) -> Result<Vec<Stmt>, ParseError> {
        match self.peek_kind() {
            TokenKind::If
            | TokenKind::While
            | TokenKind::For
            | TokenKind::Try
            | TokenKind::Def
            | TokenKind::Class
            | TokenKind::At => Ok(vec![self.parse_compound_statement()?]),
            TokenKind::Indent => self.error("unexpected indent"),
            TokenKind::Unsupported(word) => {
                self.error(format!("'{}' statements are not supported", word))
            }
            _ => self.parse_simple_line(),
        }
    }

    fn parse_simple_line(&mut self) -> Result<Vec<Stmt>, ParseError> {
        let mut statements = vec![self.parse_simple_statement()?];
        while self.match_token(&TokenKind::Semicolon) {
            if self.check(&TokenKind::Newline) || self.is_at_end() {
                break;
            }
            statements.push(self.parse_simple_statement()?);
        }
        if !self.match_token(&TokenKind::Newline) && !self.is_at_end() {
            return self.error(format!("invalid syntax, unexpected {}", self.peek().kind));
        }
        Ok(statements)
    }

    /// Parse `':' suite`
    pub(crate) fn parse_block(&mut self, ctx: &str) -> Result<Vec<Stmt>, ParseError> {
        self.expect_colon(ctx)?;

        if !self.match_token(&TokenKind::Newline) {
            return self.parse_simple_line();
        }

        if !self.match_token(&TokenKind::Indent) {
            return self.error(format!("expected an indented block {}", ctx));
        }

        let mut body = Vec::new();
        while !self.check(&TokenKind::Dedent) && !self.is_at_end() {
            if self.match_token(&TokenKind::Newline) {
                continue;
            }
            body.extend(self.parse_statement()?);
        }
        self.match_token(&TokenKind::Dedent);
        Ok(body)
    }

    fn parse_compound_statement(&mut self) -> Result<Stmt, ParseError> {
        let loc = self.current_location();
        match self.advance().kind.clone() {
            TokenKind::If => self.parse_if_statement(loc),
            TokenKind::While => self.parse_while_statement(loc),
            TokenKind::For => self.parse_for_statement(loc),
            TokenKind::Try => self.parse_try_statement(loc),
            TokenKind::Def => self.parse_function_definition(loc, Vec::new()),
            TokenKind::Class => self.parse_class_definition(loc, Vec::new()),
            _ => self.parse_decorated(),
        }
    }

    /// `@decorator` lines followed by a `def` or `class`
    fn parse_decorated(&mut self) -> Result<Stmt, ParseError> {
        let mut decorators = vec![self.parse_expression()?];
        self.expect_token(&TokenKind::Newline, "expected newline after decorator")?;
        while self.match_token(&TokenKind::At) {
            decorators.push(self.parse_expression()?);
            self.expect_token(&TokenKind::Newline, "expected newline after decorator")?;
        }

        let loc = self.current_location();
        if self.match_token(&TokenKind::Def) {
            self.parse_function_definition(loc, decorators)
        } else if self.match_token(&TokenKind::Class) {
            self.parse_class_definition(loc, decorators)
        } else {
            self.error("expected 'def' or 'class' after decorator")
        }
    }

    fn parse_if_statement(&mut self, loc: SourceLocation) -> Result<Stmt, ParseError> {
        let test = self.parse_expression()?;
        let body = self.parse_block("after 'if' condition")?;
        let mut branches = vec![(test, body)];

        let mut orelse = None;
        loop {
            if self.match_token(&TokenKind::Elif) {
                let test = self.parse_expression()?;
                let body = self.parse_block("after 'elif' condition")?;
                branches.push((test, body));
            } else if self.match_token(&TokenKind::Else) {
                orelse = Some(self.parse_block("after 'else'")?);
                break;
            } else {
                break;
            }
        }

        Ok(Stmt::new(StmtKind::If { branches, orelse }, loc))
    }

    fn parse_while_statement(&mut self, loc: SourceLocation) -> Result<Stmt, ParseError> {
        let test = self.parse_expression()?;
        let body = self.parse_block("after 'while' condition")?;
        let orelse = self.parse_loop_else()?;
        Ok(Stmt::new(StmtKind::While { test, body, orelse }, loc))
    }

    fn parse_for_statement(&mut self, loc: SourceLocation) -> Result<Stmt, ParseError> {
        let target = self.parse_target_list()?;
        self.expect_token(&TokenKind::In, "expected 'in' in for loop")?;
        let iter = self.parse_expression_list()?;
        let body = self.parse_block("after 'for' header")?;
        let orelse = self.parse_loop_else()?;
        Ok(Stmt::new(
            StmtKind::For {
                target,
                iter,
                body,
                orelse,
            },
            loc,
        ))
    }

    fn parse_loop_else(&mut self) -> Result<Option<Vec<Stmt>>, ParseError> {
        if self.match_token(&TokenKind::Else) {
            Ok(Some(self.parse_block("after 'else'")?))
        } else {
            Ok(None)
        }
    }

    fn parse_try_statement(&mut self, loc: SourceLocation) -> Result<Stmt, ParseError> {
        let body = self.parse_block("after 'try'")?;

        let mut handlers = Vec::new();
        while self.check(&TokenKind::Except) {
            let handler_loc = self.current_location();
            self.advance();
            let (kind, name) = if self.check(&TokenKind::Colon) {
                (None, None)
            } else {
                let kind = self.parse_expression()?;
                let name = if self.match_token(&TokenKind::As) {
                    Some(self.expect_identifier()?)
                } else {
                    None
                };
                (Some(kind), name)
            };
            let body = self.parse_block("after 'except' clause")?;
            handlers.push(ExceptHandler {
                kind,
                name,
                body,
                location: handler_loc,
            });
        }

        let orelse = if !handlers.is_empty() && self.match_token(&TokenKind::Else) {
            Some(self.parse_block("after 'else'")?)
        } else {
            None
        };

        let finalbody = if self.match_token(&TokenKind::Finally) {
            Some(self.parse_block("after 'finally'")?)
        } else {
            None
        };

        if handlers.is_empty() && finalbody.is_none() {
            return self.error("expected 'except' or 'finally' block");
        }

        Ok(Stmt::new(
            StmtKind::Try {
                body,
                handlers,
                orelse,
                finalbody,
            },
            loc,
        ))
    }

    fn parse_function_definition(
        &mut self,
        loc: SourceLocation,
        decorators: Vec<Expr>,
    ) -> Result<Stmt, ParseError> {
        let name = self.expect_identifier()?;
        self.expect_token(&TokenKind::LParen, "expected '(' after function name")?;
        let params = self.parse_parameters(&TokenKind::RParen, true)?;
        self.expect_rparen("after parameters")?;

        if self.match_token(&TokenKind::Arrow) {
            // Return annotations are parsed and discarded
            self.parse_expression()?;
        }

        let body = self.parse_block("after function signature")?;

        Ok(Stmt::new(
            StmtKind::FunctionDef(Rc::new(FunctionDef {
                name,
                params,
                body,
                decorators,
                is_lambda: false,
                location: loc,
            })),
            loc,
        ))
    }

    fn parse_class_definition(
        &mut self,
        loc: SourceLocation,
        decorators: Vec<Expr>,
    ) -> Result<Stmt, ParseError> {
        let name = self.expect_identifier()?;

        let mut bases = Vec::new();
        if self.match_token(&TokenKind::LParen) {
            while !self.check(&TokenKind::RParen) {
                if matches!(self.peek_kind(), TokenKind::Name(_))
                    && self.check_ahead(1, &TokenKind::Eq)
                {
                    return self.error("class keyword arguments are not supported");
                }
                bases.push(self.parse_expression()?);
                if !self.match_token(&TokenKind::Comma) {
                    break;
                }
            }
            self.expect_rparen("after base classes")?;
        }

        let body = self.parse_block("after class name")?;

        Ok(Stmt::new(
            StmtKind::ClassDef(Rc::new(ClassDef {
                name,
                bases,
                decorators,
                body,
                location: loc,
            })),
            loc,
        ))
    }

    /// Parse a parameter list up to (not including) `end`.
    /// `annotations` allows `name: type` as in `def` headers.
    pub(crate) fn parse_parameters(
        &mut self,
        end: &TokenKind,
        annotations: bool,
    ) -> Result<Parameters, ParseError> {
        let mut params = Parameters::default();
        let mut seen_star = false;
        let mut seen_default = false;

        while !self.check(end) {
            if self.match_token(&TokenKind::DoubleStar) {
                params.varkw = Some(self.expect_identifier()?);
                self.skip_annotation(annotations)?;
                self.match_token(&TokenKind::Comma);
                break;
            }

            if self.match_token(&TokenKind::Star) {
                if seen_star {
                    return self.error("* argument may appear only once");
                }
                seen_star = true;
                if let TokenKind::Name(_) = self.peek_kind() {
                    params.varargs = Some(self.expect_identifier()?);
                    self.skip_annotation(annotations)?;
                }
            } else if self.match_token(&TokenKind::Slash) {
                // Positional-only marker has no runtime effect here
            } else {
                let name = self.expect_identifier()?;
                if params.names().any(|n| n == name) {
                    return self.error(format!(
                        "duplicate argument '{}' in function definition",
                        name
                    ));
                }
                self.skip_annotation(annotations)?;
                let default = if self.match_token(&TokenKind::Eq) {
                    Some(self.parse_expression()?)
                } else {
                    None
                };

                if seen_star {
                    params.kwonly.push(Param { name, default });
                } else {
                    if default.is_some() {
                        seen_default = true;
                    } else if seen_default {
                        return self.error("non-default argument follows default argument");
                    }
                    params.positional.push(Param { name, default });
                }
            }

            if !self.match_token(&TokenKind::Comma) {
                break;
            }
        }

        Ok(params)
    }

    fn skip_annotation(&mut self, annotations: bool) -> Result<(), ParseError> {
        if annotations && self.match_token(&TokenKind::Colon) {
            self.parse_expression()?;
        }
        Ok(())
    }

    fn parse_simple_statement(&mut self) -> Result<Stmt, ParseError> {
        let loc = self.current_location();

        let kind = match self.peek_kind() {
            TokenKind::Pass => {
                self.advance();
                StmtKind::Pass
            }
            TokenKind::Break => {
                self.advance();
                StmtKind::Break
            }
            TokenKind::Continue => {
                self.advance();
                StmtKind::Continue
            }
            TokenKind::Return => {
                self.advance();
                if self.at_statement_end() {
                    StmtKind::Return(None)
                } else {
                    StmtKind::Return(Some(self.parse_expression_list()?))
                }
            }
            TokenKind::Global => {
                self.advance();
                StmtKind::Global(self.parse_name_list()?)
            }
            TokenKind::Nonlocal => {
                self.advance();
                StmtKind::Nonlocal(self.parse_name_list()?)
            }
            TokenKind::Del => {
                self.advance();
                let mut targets = vec![self.parse_bitwise_or()?];
                while self.match_token(&TokenKind::Comma) {
                    if self.at_statement_end() {
                        break;
                    }
                    targets.push(self.parse_bitwise_or()?);
                }
                for target in &targets {
                    self.validate_target(target, "delete")?;
                }
                StmtKind::Delete(targets)
            }
            TokenKind::Raise => {
                self.advance();
                if self.at_statement_end() {
                    StmtKind::Raise {
                        exc: None,
                        cause: None,
                    }
                } else {
                    let exc = self.parse_expression()?;
                    let cause = if self.match_token(&TokenKind::From) {
                        Some(self.parse_expression()?)
                    } else {
                        None
                    };
                    StmtKind::Raise {
                        exc: Some(exc),
                        cause,
                    }
                }
            }
            TokenKind::Assert => {
                self.advance();
                let test = self.parse_expression()?;
                let msg = if self.match_token(&TokenKind::Comma) {
                    Some(self.parse_expression()?)
                } else {
                    None
                };
                StmtKind::Assert { test, msg }
            }
            TokenKind::Import => {
                self.advance();
                let mut names = vec![self.parse_import_name(true)?];
                while self.match_token(&TokenKind::Comma) {
                    names.push(self.parse_import_name(true)?);
                }
                StmtKind::Import(names)
            }
            TokenKind::From => {
                self.advance();
                if self.check(&TokenKind::Dot) {
                    return self.error("relative imports are not supported");
                }
                let module = self.expect_dotted_name()?;
                self.expect_token(&TokenKind::Import, "expected 'import'")?;
                let names = if self.match_token(&TokenKind::Star) {
                    vec![ImportName {
                        name: "*".to_string(),
                        alias: None,
                    }]
                } else {
                    let parenthesized = self.match_token(&TokenKind::LParen);
                    let mut names = vec![self.parse_import_name(false)?];
                    while self.match_token(&TokenKind::Comma) {
                        if parenthesized && self.check(&TokenKind::RParen) {
                            break;
                        }
                        names.push(self.parse_import_name(false)?);
                    }
                    if parenthesized {
                        self.expect_rparen("after imported names")?;
                    }
                    names
                };
                StmtKind::ImportFrom { module, names }
            }
            TokenKind::Unsupported(word) => {
                return self.error(format!("'{}' is not supported", word));
            }
            _ => return self.parse_expression_statement(loc),
        };

        Ok(Stmt::new(kind, loc))
    }

    fn parse_name_list(&mut self) -> Result<Vec<String>, ParseError> {
        let mut names = vec![self.expect_identifier()?];
        while self.match_token(&TokenKind::Comma) {
            names.push(self.expect_identifier()?);
        }
        Ok(names)
    }

    fn parse_import_name(&mut self, dotted: bool) -> Result<ImportName, ParseError> {
        let name = if dotted {
            self.expect_dotted_name()?
        } else {
            self.expect_identifier()?
        };
        let alias = if self.match_token(&TokenKind::As) {
            Some(self.expect_identifier()?)
        } else {
            None
        };
        Ok(ImportName { name, alias })
    }

    /// Expression statement, assignment chain, augmented or annotated assignment
    fn parse_expression_statement(&mut self, loc: SourceLocation) -> Result<Stmt, ParseError> {
        let first = self.parse_expression_list()?;

        if let Some(op) = self.augmented_operator() {
            self.advance();
            if !matches!(
                first.kind,
                ExprKind::Name(_) | ExprKind::Attribute { .. } | ExprKind::Subscript { .. }
            ) {
                return self.error("illegal expression for augmented assignment");
            }
            let value = self.parse_expression_list()?;
            return Ok(Stmt::new(
                StmtKind::AugAssign {
                    target: first,
                    op,
                    value,
                },
                loc,
            ));
        }

        if self.match_token(&TokenKind::Colon) {
            self.validate_target(&first, "annotate")?;
            self.parse_expression()?;
            if self.match_token(&TokenKind::Eq) {
                let value = self.parse_expression_list()?;
                return Ok(Stmt::new(
                    StmtKind::Assign {
                        targets: vec![first],
                        value,
                    },
                    loc,
                ));
            }
            return Ok(Stmt::new(StmtKind::Annotation(first), loc));
        }

        if !self.check(&TokenKind::Eq) {
            return Ok(Stmt::new(StmtKind::Expr(first), loc));
        }

        let mut targets = vec![first];
        let mut value = None;
        while self.match_token(&TokenKind::Eq) {
            let next = self.parse_expression_list()?;
            if let Some(previous) = value.replace(next) {
                targets.push(previous);
            }
        }
        for target in &targets {
            self.validate_target(target, "assign to")?;
        }

        match value {
            Some(value) => Ok(Stmt::new(StmtKind::Assign { targets, value }, loc)),
            None => self.error("invalid syntax"),
        }
    }

    fn augmented_operator(&self) -> Option<BinOp> {
        let op = match self.peek().kind {
            TokenKind::PlusEq => BinOp::Add,
            TokenKind::MinusEq => BinOp::Sub,
            TokenKind::StarEq => BinOp::Mul,
            TokenKind::SlashEq => BinOp::Div,
            TokenKind::DoubleSlashEq => BinOp::FloorDiv,
            TokenKind::PercentEq => BinOp::Mod,
            TokenKind::DoubleStarEq => BinOp::Pow,
            TokenKind::AmpEq => BinOp::BitAnd,
            TokenKind::PipeEq => BinOp::BitOr,
            TokenKind::CaretEq => BinOp::BitXor,
            TokenKind::LtLtEq => BinOp::Shl,
            TokenKind::GtGtEq => BinOp::Shr,
            _ => return None,
        };
        Some(op)
    }

    /// Check that an expression can appear on the left of `=`, in `for` or in `del`
    pub(crate) fn validate_target(&self, target: &Expr, action: &str) -> Result<(), ParseError> {
        match &target.kind {
            ExprKind::Name(_) | ExprKind::Attribute { .. } | ExprKind::Subscript { .. } => Ok(()),
            ExprKind::Tuple(items) | ExprKind::List(items) if action != "annotate" => {
                let mut starred = 0;
                for item in items {
                    if let ExprKind::Starred(inner) = &item.kind {
                        starred += 1;
                        self.validate_target(inner, action)?;
                    } else {
                        self.validate_target(item, action)?;
                    }
                }
                if starred > 1 {
                    return Err(ParseError {
                        message: "multiple starred expressions in assignment".to_string(),
                        location: target.location,
                    });
                }
                Ok(())
            }
            other => Err(ParseError {
                message: format!("cannot {} {}", action, describe_expression(other)),
                location: target.location,
            }),
        }
    }
}

fn describe_expression(kind: &ExprKind) -> &'static str {
    match kind {
        ExprKind::Call { .. } => "function call",
        ExprKind::Int(_)
        | ExprKind::Float(_)
        | ExprKind::Str(_)
        | ExprKind::Bytes(_)
        | ExprKind::Bool(_)
        | ExprKind::None => "literal",
        ExprKind::FString(_) => "f-string expression",
        ExprKind::BinaryOp { .. } | ExprKind::UnaryOp { .. } => "expression",
        ExprKind::Compare { .. } => "comparison",
        ExprKind::Lambda(_) => "lambda",
        ExprKind::Dict(_) | ExprKind::DictComp { .. } => "dict literal",
        ExprKind::Set(_) | ExprKind::SetComp { .. } => "set display",
        ExprKind::ListComp { .. } => "list comprehension",
        ExprKind::IfExp { .. } => "conditional expression",
        _ => "expression",
    }
}
