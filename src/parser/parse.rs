//! Main parser coordinator
//!
//! This module provides the [`Parser`] struct and core parsing infrastructure,
//! including error types, helper methods, and the main parse entry point.
//!
//! # Parser Architecture
//!
//! The Parser uses a recursive descent approach with the following organization:
//! - This module: Parser struct, helper methods, and coordination
//! - `statements`: Parsing simple and compound statements (if, while, def, class, try...)
//! - `expressions`: Parsing expressions with one method per precedence level
//!
//! # Implementation
//!
//! Parser methods are split across multiple files using `impl Parser` blocks,
//! allowing each module to extend the Parser with related functionality while
//! maintaining access to the shared parser state.

use crate::parser::ast::*;
use crate::parser::lexer::{LexError, Lexer, Token, TokenKind};
use thiserror::Error;

/// Parser error type
#[derive(Debug, Clone, Error)]
#[error("Parse error at line {}, column {}: {message}", location.line, location.column)]
pub struct ParseError {
    pub message: String,
    pub location: SourceLocation,
}

impl From<LexError> for ParseError {
    fn from(err: LexError) -> Self {
        ParseError {
            message: err.message,
            location: err.location,
        }
    }
}

/// Recursive descent parser for the Python subset
pub struct Parser {
    pub(crate) tokens: Vec<Token>,
    pub(crate) position: usize,
}

impl Parser {
    pub fn new(source: &str) -> Result<Self, ParseError> {
        let mut lexer = Lexer::new(source);
        let tokens = lexer.tokenize()?;
        Ok(Self {
            tokens,
            position: 0,
        })
    }

    /// Parse the entire module body
    pub fn parse_program(&mut self) -> Result<Program, ParseError> {
        let mut program = Program::new();

        while !self.is_at_end() {
            if self.match_token(&TokenKind::Newline) {
                continue;
            }
            program.body.extend(self.parse_statement()?);
        }

        Ok(program)
    }

    // ===== Helper methods =====

    pub(crate) fn match_token(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    pub(crate) fn check(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(&self.peek().kind) == std::mem::discriminant(kind)
    }

    pub(crate) fn check_ahead(&self, n: usize, kind: &TokenKind) -> bool {
        self.peek_ahead(n)
            .is_some_and(|t| std::mem::discriminant(&t.kind) == std::mem::discriminant(kind))
    }

    pub(crate) fn advance(&mut self) -> &Token {
        if !self.is_at_end() {
            self.position += 1;
        }
        self.previous()
    }

    pub(crate) fn is_at_end(&self) -> bool {
        matches!(self.peek().kind, TokenKind::Eof)
    }

    pub(crate) fn peek(&self) -> &Token {
        // The lexer always terminates the stream with Eof, and advance never moves past it
        &self.tokens[self.position.min(self.tokens.len() - 1)]
    }

    pub(crate) fn peek_kind(&self) -> TokenKind {
        self.peek().kind.clone()
    }

    pub(crate) fn peek_ahead(&self, n: usize) -> Option<&Token> {
        self.tokens.get(self.position + n)
    }

    pub(crate) fn previous(&self) -> &Token {
        &self.tokens[self.position.saturating_sub(1)]
    }

    pub(crate) fn previous_location(&self) -> SourceLocation {
        self.previous().location
    }

    pub(crate) fn current_location(&self) -> SourceLocation {
        self.peek().location
    }

    pub(crate) fn error<T>(&self, message: impl Into<String>) -> Result<T, ParseError> {
        Err(ParseError {
            message: message.into(),
            location: self.current_location(),
        })
    }

    pub(crate) fn expect_token(&mut self, kind: &TokenKind, message: &str) -> Result<(), ParseError> {
        if self.check(kind) {
            self.advance();
            Ok(())
        } else {
            self.error(format!("{}, found {}", message, self.peek().kind))
        }
    }

    pub(crate) fn expect_colon(&mut self, ctx: &str) -> Result<(), ParseError> {
        self.expect_token(&TokenKind::Colon, &format!("expected ':' {ctx}"))
    }

    pub(crate) fn expect_rparen(&mut self, ctx: &str) -> Result<(), ParseError> {
        self.expect_token(&TokenKind::RParen, &format!("expected ')' {ctx}"))
    }

    pub(crate) fn expect_identifier(&mut self) -> Result<String, ParseError> {
        if let TokenKind::Name(name) = self.peek_kind() {
            self.advance();
            Ok(name)
        } else {
            self.error(format!("expected identifier, found {}", self.peek().kind))
        }
    }

    /// Dotted module path: `a.b.c`
    pub(crate) fn expect_dotted_name(&mut self) -> Result<String, ParseError> {
        let mut name = self.expect_identifier()?;
        while self.match_token(&TokenKind::Dot) {
            name.push('.');
            name.push_str(&self.expect_identifier()?);
        }
        Ok(name)
    }

    /// End of a simple statement: newline, `;`, or end of file
    pub(crate) fn at_statement_end(&self) -> bool {
        matches!(
            self.peek().kind,
            TokenKind::Newline | TokenKind::Semicolon | TokenKind::Eof | TokenKind::Dedent
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> Program {
        Parser::new(source).unwrap().parse_program().unwrap()
    }

    #[test]
    fn test_parse_simple_function() {
        let program = parse("def add(a, b=2):\n    return a + b\n");

        assert_eq!(program.body.len(), 1);
        match &program.body[0].kind {
            StmtKind::FunctionDef(def) => {
                assert_eq!(def.name, "add");
                assert_eq!(def.params.positional.len(), 2);
                assert!(def.params.positional[1].default.is_some());
                assert_eq!(def.body.len(), 1);
            }
            _ => panic!("Expected function definition"),
        }
    }

    #[test]
    fn test_parse_precedence() {
        let program = parse("x = 1 + 2 * 3\n");
        match &program.body[0].kind {
            StmtKind::Assign { value, .. } => match &value.kind {
                ExprKind::BinaryOp { op, right, .. } => {
                    assert_eq!(*op, BinOp::Add);
                    assert!(matches!(right.kind, ExprKind::BinaryOp { op: BinOp::Mul, .. }));
                }
                other => panic!("Expected binary op, got {:?}", other),
            },
            _ => panic!("Expected assignment"),
        }
    }

    #[test]
    fn test_parse_if_elif_else() {
        let program = parse("if x > 0:\n    y = 1\nelif x < 0:\n    y = -1\nelse:\n    y = 0\n");
        match &program.body[0].kind {
            StmtKind::If { branches, orelse } => {
                assert_eq!(branches.len(), 2);
                assert!(orelse.is_some());
            }
            _ => panic!("Expected if statement"),
        }
    }

    #[test]
    fn test_parse_class() {
        let program = parse("class Point:\n    def __init__(self, x):\n        self.x = x\n");
        match &program.body[0].kind {
            StmtKind::ClassDef(class) => {
                assert_eq!(class.name, "Point");
                assert_eq!(class.body.len(), 1);
            }
            _ => panic!("Expected class definition"),
        }
    }

    #[test]
    fn test_semicolon_separated() {
        let program = parse("a = 1; b = 2\n");
        assert_eq!(program.body.len(), 2);
    }

    #[test]
    fn test_syntax_error_location() {
        let err = Parser::new("x = (1 +\n").and_then(|mut p| p.parse_program()).unwrap_err();
        assert!(err.location.line >= 1);

        let err = Parser::new("def f(:\n    pass\n")
            .unwrap()
            .parse_program()
            .unwrap_err();
        assert_eq!(err.location.line, 1);
    }

    #[test]
    fn test_unsupported_keyword() {
        let err = Parser::new("with open('f') as f:\n    pass\n")
            .unwrap()
            .parse_program()
            .unwrap_err();
        assert!(err.message.contains("not supported"));
    }
}
