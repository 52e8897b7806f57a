//! Python source code parser
//!
//! This module transforms Python source text into an Abstract Syntax Tree (AST):
//! - [`lexer`]: Tokenization (source text → tokens, including INDENT/DEDENT)
//! - [`parse`]: Parser struct, errors and helpers
//! - [`statements`] / [`expressions`]: The grammar, split by node family
//! - [`ast`]: AST node definitions
//!
//! # Supported Python Subset
//!
//! - Statements: assignment (chained, unpacking, augmented), `if`/`elif`/`else`,
//!   `while`, `for`, `try`/`except`/`finally`, `def`, `class`, decorators,
//!   `global`, `nonlocal`, `del`, `raise`, `assert`, `import`, `from ... import`
//! - Expressions: literals, f-strings, containers, comprehensions, lambdas,
//!   conditional expressions, chained comparisons, slicing, `*`/`**` unpacking
//! - Not supported: `with`, `yield`, `async`/`await`, walrus, `match`
//!
//! # Parser Implementation
//!
//! Hand-written recursive descent parser. No external parser generator dependencies.

pub mod ast;
pub mod expressions;
pub mod lexer;
pub mod parse;
pub mod statements;
