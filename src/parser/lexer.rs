//! Lexer (tokenizer) for Python source code
//!
//! Converts raw source text into a flat [`Token`] stream consumed by the parser.
//! Indentation is tracked with a stack of column widths and surfaces as
//! [`TokenKind::Indent`] / [`TokenKind::Dedent`] pairs; newlines inside
//! brackets and after a trailing backslash are swallowed (implicit and explicit
//! line joining).

use super::ast::SourceLocation;
use std::fmt;
use thiserror::Error;

/// All token variants produced by the lexer.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Literals
    Int(i64),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
    /// Raw f-string body; fields are split and parsed by the parser
    FString(String),

    // Identifiers
    Name(String),

    // Keywords
    False,
    None,
    True,
    And,
    As,
    Assert,
    Break,
    Class,
    Continue,
    Def,
    Del,
    Elif,
    Else,
    Except,
    Finally,
    For,
    From,
    Global,
    If,
    Import,
    In,
    Is,
    Lambda,
    Nonlocal,
    Not,
    Or,
    Pass,
    Raise,
    Return,
    Try,
    While,
    /// Keywords the interpreter recognises but does not implement
    Unsupported(String),

    // Arithmetic
    Plus,        // +
    Minus,       // -
    Star,        // *
    DoubleStar,  // **
    Slash,       // /
    DoubleSlash, // //
    Percent,     // %

    // Bitwise
    Amp,   // &
    Pipe,  // |
    Caret, // ^
    Tilde, // ~
    LtLt,  // <<
    GtGt,  // >>

    // Comparison
    EqEq,  // ==
    NotEq, // !=
    Lt,    // <
    Le,    // <=
    Gt,    // >
    Ge,    // >=

    // Assignment
    Eq,
    PlusEq,
    MinusEq,
    StarEq,
    DoubleStarEq,
    SlashEq,
    DoubleSlashEq,
    PercentEq,
    AmpEq,
    PipeEq,
    CaretEq,
    LtLtEq,
    GtGtEq,

    // Punctuation
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Colon,
    Semicolon,
    Dot,
    Arrow, // ->
    At,    // @

    // Layout
    Newline,
    Indent,
    Dedent,
    Eof,
}

/// A token with the location of its first character
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub location: SourceLocation,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Int(n) => write!(f, "int literal {}", n),
            TokenKind::Float(x) => write!(f, "float literal {}", x),
            TokenKind::Str(s) => write!(f, "string literal {:?}", s),
            TokenKind::Bytes(_) => write!(f, "bytes literal"),
            TokenKind::FString(_) => write!(f, "f-string"),
            TokenKind::Name(s) => write!(f, "name '{}'", s),
            TokenKind::Unsupported(s) => write!(f, "'{}'", s),
            TokenKind::Newline => write!(f, "end of line"),
            TokenKind::Indent => write!(f, "indent"),
            TokenKind::Dedent => write!(f, "dedent"),
            TokenKind::Eof => write!(f, "end of file"),
            other => write!(f, "'{}'", other.text()),
        }
    }
}

impl TokenKind {
    /// Source text of keyword and operator tokens
    fn text(&self) -> &'static str {
        match self {
            TokenKind::False => "False",
            TokenKind::None => "None",
            TokenKind::True => "True",
            TokenKind::And => "and",
            TokenKind::As => "as",
            TokenKind::Assert => "assert",
            TokenKind::Break => "break",
            TokenKind::Class => "class",
            TokenKind::Continue => "continue",
            TokenKind::Def => "def",
            TokenKind::Del => "del",
            TokenKind::Elif => "elif",
            TokenKind::Else => "else",
            TokenKind::Except => "except",
            TokenKind::Finally => "finally",
            TokenKind::For => "for",
            TokenKind::From => "from",
            TokenKind::Global => "global",
            TokenKind::If => "if",
            TokenKind::Import => "import",
            TokenKind::In => "in",
            TokenKind::Is => "is",
            TokenKind::Lambda => "lambda",
            TokenKind::Nonlocal => "nonlocal",
            TokenKind::Not => "not",
            TokenKind::Or => "or",
            TokenKind::Pass => "pass",
            TokenKind::Raise => "raise",
            TokenKind::Return => "return",
            TokenKind::Try => "try",
            TokenKind::While => "while",
            TokenKind::Plus => "+",
            TokenKind::Minus => "-",
            TokenKind::Star => "*",
            TokenKind::DoubleStar => "**",
            TokenKind::Slash => "/",
            TokenKind::DoubleSlash => "//",
            TokenKind::Percent => "%",
            TokenKind::Amp => "&",
            TokenKind::Pipe => "|",
            TokenKind::Caret => "^",
            TokenKind::Tilde => "~",
            TokenKind::LtLt => "<<",
            TokenKind::GtGt => ">>",
            TokenKind::EqEq => "==",
            TokenKind::NotEq => "!=",
            TokenKind::Lt => "<",
            TokenKind::Le => "<=",
            TokenKind::Gt => ">",
            TokenKind::Ge => ">=",
            TokenKind::Eq => "=",
            TokenKind::PlusEq => "+=",
            TokenKind::MinusEq => "-=",
            TokenKind::StarEq => "*=",
            TokenKind::DoubleStarEq => "**=",
            TokenKind::SlashEq => "/=",
            TokenKind::DoubleSlashEq => "//=",
            TokenKind::PercentEq => "%=",
            TokenKind::AmpEq => "&=",
            TokenKind::PipeEq => "|=",
            TokenKind::CaretEq => "^=",
            TokenKind::LtLtEq => "<<=",
            TokenKind::GtGtEq => ">>=",
            TokenKind::LParen => "(",
            TokenKind::RParen => ")",
            TokenKind::LBracket => "[",
            TokenKind::RBracket => "]",
            TokenKind::LBrace => "{",
            TokenKind::RBrace => "}",
            TokenKind::Comma => ",",
            TokenKind::Colon => ":",
            TokenKind::Semicolon => ";",
            TokenKind::Dot => ".",
            TokenKind::Arrow => "->",
            TokenKind::At => "@",
            _ => "?",
        }
    }
}

/// Lexer error type
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct LexError {
    pub message: String,
    pub location: SourceLocation,
}

/// Lexer for Python source code
pub struct Lexer {
    input: Vec<char>,
    position: usize,
    line: usize,
    column: usize,
    indent_stack: Vec<usize>,
    bracket_depth: usize,
    at_line_start: bool,
}

impl Lexer {
    /// Create a new lexer for the given source string.
    pub fn new(input: &str) -> Self {
        Self {
            input: input.chars().collect(),
            position: 0,
            line: 1,
            column: 1,
            indent_stack: vec![0],
            bracket_depth: 0,
            at_line_start: true,
        }
    }

    /// Tokenize the entire input
    pub fn tokenize(&mut self) -> Result<Vec<Token>, LexError> {
        let mut tokens: Vec<Token> = Vec::new();

        loop {
            if self.at_line_start && self.bracket_depth == 0 {
                self.at_line_start = false;
                if self.handle_indentation(&mut tokens)? {
                    continue;
                }
            }

            self.skip_inline_whitespace()?;

            let loc = self.current_location();
            match self.peek() {
                None => {
                    if tokens
                        .last()
                        .is_some_and(|t| !matches!(t.kind, TokenKind::Newline | TokenKind::Dedent))
                    {
                        tokens.push(Token {
                            kind: TokenKind::Newline,
                            location: loc,
                        });
                    }
                    while self.indent_stack.len() > 1 {
                        self.indent_stack.pop();
                        tokens.push(Token {
                            kind: TokenKind::Dedent,
                            location: loc,
                        });
                    }
                    tokens.push(Token {
                        kind: TokenKind::Eof,
                        location: loc,
                    });
                    break;
                }
                Some('#') => self.skip_comment(),
                Some('\n') => {
                    self.advance();
                    if self.bracket_depth == 0 {
                        tokens.push(Token {
                            kind: TokenKind::Newline,
                            location: loc,
                        });
                        self.at_line_start = true;
                    }
                }
                Some(_) => {
                    let kind = self.next_token()?;
                    tokens.push(Token {
                        kind,
                        location: loc,
                    });
                }
            }
        }

        Ok(tokens)
    }

    /// Measure leading whitespace of a logical line and emit layout tokens.
    /// Returns true when the line was blank or comment-only and got skipped.
    fn handle_indentation(&mut self, tokens: &mut Vec<Token>) -> Result<bool, LexError> {
        let mut width = 0;
        while let Some(ch) = self.peek() {
            match ch {
                ' ' => width += 1,
                '\t' => width = (width / 8 + 1) * 8,
                '\x0c' => width = 0,
                _ => break,
            }
            self.advance();
        }

        match self.peek() {
            Some('#') => {
                self.skip_comment();
                if self.peek() == Some('\n') {
                    self.advance();
                }
                self.at_line_start = true;
                return Ok(true);
            }
            Some('\r') if self.peek_ahead(1) == Some('\n') => {
                self.advance();
                self.advance();
                self.at_line_start = true;
                return Ok(true);
            }
            Some('\n') => {
                self.advance();
                self.at_line_start = true;
                return Ok(true);
            }
            None => return Ok(false),
            _ => {}
        }

        let loc = self.current_location();
        let current = self.indent_stack.last().copied().unwrap_or(0);
        if width > current {
            self.indent_stack.push(width);
            tokens.push(Token {
                kind: TokenKind::Indent,
                location: loc,
            });
        } else if width < current {
            while self.indent_stack.last().is_some_and(|&w| w > width) {
                self.indent_stack.pop();
                tokens.push(Token {
                    kind: TokenKind::Dedent,
                    location: loc,
                });
            }
            if self.indent_stack.last().copied() != Some(width) {
                return Err(LexError {
                    message: "unindent does not match any outer indentation level".to_string(),
                    location: loc,
                });
            }
        }
        Ok(false)
    }

    /// Get next token
    fn next_token(&mut self) -> Result<TokenKind, LexError> {
        let loc = self.current_location();
        let ch = self.advance().ok_or_else(|| LexError {
            message: "Unexpected end of file".to_string(),
            location: loc,
        })?;

        let kind = match ch {
            '"' | '\'' => self.string_literal(ch, StringPrefix::default(), loc)?,
            '0'..='9' => self.number_literal(ch, loc)?,
            '.' if self.peek().is_some_and(|c| c.is_ascii_digit()) => {
                self.number_literal(ch, loc)?
            }
            c if c.is_alphabetic() || c == '_' => {
                if let Some(prefix) = self.string_prefix(c) {
                    let quote = self.advance().unwrap_or('"');
                    self.string_literal(quote, prefix, loc)?
                } else {
                    self.identifier_or_keyword(c)
                }
            }
            '+' => self.with_eq(TokenKind::Plus, TokenKind::PlusEq),
            '-' => {
                if self.peek() == Some('>') {
                    self.advance();
                    TokenKind::Arrow
                } else {
                    self.with_eq(TokenKind::Minus, TokenKind::MinusEq)
                }
            }
            '*' => {
                if self.peek() == Some('*') {
                    self.advance();
                    self.with_eq(TokenKind::DoubleStar, TokenKind::DoubleStarEq)
                } else {
                    self.with_eq(TokenKind::Star, TokenKind::StarEq)
                }
            }
            '/' => {
                if self.peek() == Some('/') {
                    self.advance();
                    self.with_eq(TokenKind::DoubleSlash, TokenKind::DoubleSlashEq)
                } else {
                    self.with_eq(TokenKind::Slash, TokenKind::SlashEq)
                }
            }
            '%' => self.with_eq(TokenKind::Percent, TokenKind::PercentEq),
            '&' => self.with_eq(TokenKind::Amp, TokenKind::AmpEq),
            '|' => self.with_eq(TokenKind::Pipe, TokenKind::PipeEq),
            '^' => self.with_eq(TokenKind::Caret, TokenKind::CaretEq),
            '~' => TokenKind::Tilde,
            '=' => self.with_eq(TokenKind::Eq, TokenKind::EqEq),
            '!' => {
                if self.peek() == Some('=') {
                    self.advance();
                    TokenKind::NotEq
                } else {
                    return Err(LexError {
                        message: "invalid syntax".to_string(),
                        location: loc,
                    });
                }
            }
            '<' => {
                if self.peek() == Some('<') {
                    self.advance();
                    self.with_eq(TokenKind::LtLt, TokenKind::LtLtEq)
                } else {
                    self.with_eq(TokenKind::Lt, TokenKind::Le)
                }
            }
            '>' => {
                if self.peek() == Some('>') {
                    self.advance();
                    self.with_eq(TokenKind::GtGt, TokenKind::GtGtEq)
                } else {
                    self.with_eq(TokenKind::Gt, TokenKind::Ge)
                }
            }
            '(' | '[' | '{' => {
                self.bracket_depth += 1;
                match ch {
                    '(' => TokenKind::LParen,
                    '[' => TokenKind::LBracket,
                    _ => TokenKind::LBrace,
                }
            }
            ')' | ']' | '}' => {
                self.bracket_depth = self.bracket_depth.saturating_sub(1);
                match ch {
                    ')' => TokenKind::RParen,
                    ']' => TokenKind::RBracket,
                    _ => TokenKind::RBrace,
                }
            }
            ',' => TokenKind::Comma,
            ':' => TokenKind::Colon,
            ';' => TokenKind::Semicolon,
            '.' => TokenKind::Dot,
            '@' => TokenKind::At,
            _ => {
                return Err(LexError {
                    message: format!("invalid character '{}'", ch),
                    location: loc,
                });
            }
        };
        Ok(kind)
    }

    fn with_eq(&mut self, plain: TokenKind, with_eq: TokenKind) -> TokenKind {
        if self.peek() == Some('=') {
            self.advance();
            with_eq
        } else {
            plain
        }
    }

    /// Detect a string prefix (`r`, `b`, `f` and combinations) directly before a quote
    fn string_prefix(&mut self, first: char) -> Option<StringPrefix> {
        let mut letters = vec![first];
        let mut offset = 0;
        while let Some(c) = self.peek_ahead(offset) {
            if c == '"' || c == '\'' {
                break;
            }
            if letters.len() >= 2 || !c.is_ascii_alphabetic() {
                return None;
            }
            letters.push(c);
            offset += 1;
        }
        self.peek_ahead(offset)?;

        let mut prefix = StringPrefix::default();
        for letter in &letters {
            match letter.to_ascii_lowercase() {
                'r' if !prefix.raw => prefix.raw = true,
                'b' if !prefix.bytes && !prefix.format => prefix.bytes = true,
                'f' if !prefix.format && !prefix.bytes => prefix.format = true,
                'u' if letters.len() == 1 => {}
                _ => return None,
            }
        }
        for _ in 0..offset {
            self.advance();
        }
        Some(prefix)
    }

    /// Parse a string literal whose opening quote has been consumed
    fn string_literal(
        &mut self,
        quote: char,
        prefix: StringPrefix,
        loc: SourceLocation,
    ) -> Result<TokenKind, LexError> {
        let triple = self.peek() == Some(quote) && self.peek_ahead(1) == Some(quote);
        if triple {
            self.advance();
            self.advance();
        } else if self.peek() == Some(quote) {
            // Empty string
            self.advance();
            return Ok(Self::finish_string(String::new(), prefix));
        }

        let mut text = String::new();
        loop {
            let ch = self.advance().ok_or_else(|| LexError {
                message: if triple {
                    "unterminated triple-quoted string literal".to_string()
                } else {
                    "unterminated string literal".to_string()
                },
                location: loc,
            })?;

            if ch == quote {
                if !triple {
                    break;
                }
                if self.peek() == Some(quote) && self.peek_ahead(1) == Some(quote) {
                    self.advance();
                    self.advance();
                    break;
                }
                text.push(ch);
                continue;
            }

            if ch == '\n' && !triple {
                return Err(LexError {
                    message: "unterminated string literal".to_string(),
                    location: loc,
                });
            }

            if ch == '\\' {
                let escaped = self.advance().ok_or_else(|| LexError {
                    message: "unterminated string literal".to_string(),
                    location: loc,
                })?;
                if prefix.raw || prefix.format {
                    // f-string escapes are resolved after field splitting
                    text.push('\\');
                    text.push(escaped);
                    continue;
                }
                match unescape(escaped, &mut || self.advance()) {
                    Some(Some(c)) => text.push(c),
                    Some(None) => {}
                    None => {
                        text.push('\\');
                        text.push(escaped);
                    }
                }
                continue;
            }

            text.push(ch);
        }

        Ok(Self::finish_string(text, prefix))
    }

    fn finish_string(text: String, prefix: StringPrefix) -> TokenKind {
        if prefix.format {
            TokenKind::FString(if prefix.raw {
                text.replace('\\', "\\\\")
            } else {
                text
            })
        } else if prefix.bytes {
            TokenKind::Bytes(text.chars().map(|c| c as u32 as u8).collect())
        } else {
            TokenKind::Str(text)
        }
    }

    /// Parse numeric literal (ints with radix prefixes, floats with exponents)
    fn number_literal(&mut self, first: char, loc: SourceLocation) -> Result<TokenKind, LexError> {
        let invalid = |text: &str| LexError {
            message: format!("invalid number literal '{}'", text),
            location: loc,
        };

        if first == '0' {
            if let Some(radix) = self.peek().and_then(|c| match c.to_ascii_lowercase() {
                'x' => Some(16),
                'o' => Some(8),
                'b' => Some(2),
                _ => None,
            }) {
                self.advance();
                let mut digits = String::new();
                while let Some(c) = self.peek() {
                    if c.is_ascii_alphanumeric() || c == '_' {
                        if c != '_' {
                            digits.push(c);
                        }
                        self.advance();
                    } else {
                        break;
                    }
                }
                return i64::from_str_radix(&digits, radix)
                    .map(TokenKind::Int)
                    .map_err(|_| invalid(&digits));
            }
        }

        let mut text = String::new();
        text.push(first);
        let mut is_float = first == '.';
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                text.push(c);
            } else if c == '_' {
                // digit separator
            } else if c == '.' && !is_float && !text.contains(['e', 'E']) {
                is_float = true;
                text.push(c);
            } else if (c == 'e' || c == 'E') && !text.contains(['e', 'E']) {
                let next = self.peek_ahead(1);
                let signed = matches!(next, Some('+') | Some('-'));
                let digit_after = if signed { self.peek_ahead(2) } else { next };
                if !digit_after.is_some_and(|d| d.is_ascii_digit()) {
                    break;
                }
                is_float = true;
                text.push(c);
                self.advance();
                if signed {
                    if let Some(sign) = self.advance() {
                        text.push(sign);
                    }
                }
                continue;
            } else {
                break;
            }
            self.advance();
        }

        if is_float {
            text.parse::<f64>()
                .map(TokenKind::Float)
                .map_err(|_| invalid(&text))
        } else {
            text.parse::<i64>().map(TokenKind::Int).map_err(|_| LexError {
                message: format!("integer literal too large: {}", text),
                location: loc,
            })
        }
    }

    /// Parse identifier or keyword
    fn identifier_or_keyword(&mut self, first_char: char) -> TokenKind {
        let mut ident = String::new();
        ident.push(first_char);

        while let Some(ch) = self.peek() {
            if ch.is_alphanumeric() || ch == '_' {
                ident.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        match ident.as_str() {
            "False" => TokenKind::False,
            "None" => TokenKind::None,
            "True" => TokenKind::True,
            "and" => TokenKind::And,
            "as" => TokenKind::As,
            "assert" => TokenKind::Assert,
            "break" => TokenKind::Break,
            "class" => TokenKind::Class,
            "continue" => TokenKind::Continue,
            "def" => TokenKind::Def,
            "del" => TokenKind::Del,
            "elif" => TokenKind::Elif,
            "else" => TokenKind::Else,
            "except" => TokenKind::Except,
            "finally" => TokenKind::Finally,
            "for" => TokenKind::For,
            "from" => TokenKind::From,
            "global" => TokenKind::Global,
            "if" => TokenKind::If,
            "import" => TokenKind::Import,
            "in" => TokenKind::In,
            "is" => TokenKind::Is,
            "lambda" => TokenKind::Lambda,
            "nonlocal" => TokenKind::Nonlocal,
            "not" => TokenKind::Not,
            "or" => TokenKind::Or,
            "pass" => TokenKind::Pass,
            "raise" => TokenKind::Raise,
            "return" => TokenKind::Return,
            "try" => TokenKind::Try,
            "while" => TokenKind::While,
            "with" | "yield" | "async" | "await" => TokenKind::Unsupported(ident),
            _ => TokenKind::Name(ident),
        }
    }

    /// Skip spaces, tabs and explicit line continuations
    fn skip_inline_whitespace(&mut self) -> Result<(), LexError> {
        loop {
            match self.peek() {
                Some(' ') | Some('\t') | Some('\r') | Some('\x0c') => {
                    self.advance();
                }
                Some('\n') if self.bracket_depth > 0 => {
                    self.advance();
                }
                Some('\\') => {
                    let loc = self.current_location();
                    self.advance();
                    if self.peek() == Some('\r') {
                        self.advance();
                    }
                    if self.advance() != Some('\n') {
                        return Err(LexError {
                            message: "unexpected character after line continuation character"
                                .to_string(),
                            location: loc,
                        });
                    }
                }
                Some('#') if self.bracket_depth > 0 => self.skip_comment(),
                _ => return Ok(()),
            }
        }
    }

    /// Skip a `#` comment up to (not including) the newline
    fn skip_comment(&mut self) {
        while let Some(ch) = self.peek() {
            if ch == '\n' {
                break;
            }
            self.advance();
        }
    }

    /// Peek at current character without consuming
    fn peek(&self) -> Option<char> {
        self.input.get(self.position).copied()
    }

    /// Peek ahead n characters
    fn peek_ahead(&self, n: usize) -> Option<char> {
        self.input.get(self.position + n).copied()
    }

    /// Advance to next character
    fn advance(&mut self) -> Option<char> {
        let ch = *self.input.get(self.position)?;
        self.position += 1;

        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }

        Some(ch)
    }

    /// Get current source location
    fn current_location(&self) -> SourceLocation {
        SourceLocation::new(self.line, self.column)
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct StringPrefix {
    raw: bool,
    bytes: bool,
    format: bool,
}

/// Resolve one backslash escape. `Some(None)` means the escape produced no
/// character (line continuation inside a string), `None` means the escape is
/// unknown and must be kept verbatim.
pub(crate) fn unescape(
    escaped: char,
    next: &mut dyn FnMut() -> Option<char>,
) -> Option<Option<char>> {
    let c = match escaped {
        'n' => '\n',
        't' => '\t',
        'r' => '\r',
        '0' => '\0',
        '\\' => '\\',
        '\'' => '\'',
        '"' => '"',
        'a' => '\x07',
        'b' => '\x08',
        'f' => '\x0c',
        'v' => '\x0b',
        '\n' => return Some(None),
        'x' => {
            let hex: String = [next(), next()].into_iter().flatten().collect();
            return u8::from_str_radix(&hex, 16)
                .ok()
                .map(|b| Some(b as char));
        }
        _ => return None,
    };
    Some(Some(c))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        Lexer::new(source)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_simple_tokens() {
        let tokens = kinds("x = 1 + 2\n");
        assert_eq!(
            tokens,
            vec![
                TokenKind::Name("x".to_string()),
                TokenKind::Eq,
                TokenKind::Int(1),
                TokenKind::Plus,
                TokenKind::Int(2),
                TokenKind::Newline,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_indentation() {
        let tokens = kinds("if x:\n    y = 1\n\n    # note\nz = 2");
        assert!(tokens.contains(&TokenKind::Indent));
        let dedent_pos = tokens.iter().position(|t| *t == TokenKind::Dedent).unwrap();
        assert_eq!(tokens[dedent_pos + 1], TokenKind::Name("z".to_string()));
    }

    #[test]
    fn test_bad_dedent() {
        let err = Lexer::new("if x:\n    y = 1\n  z = 2\n").tokenize().unwrap_err();
        assert!(err.message.contains("unindent"));
        assert_eq!(err.location.line, 3);
    }

    #[test]
    fn test_brackets_join_lines() {
        let tokens = kinds("xs = [1,\n      2]\n");
        let newlines = tokens.iter().filter(|t| **t == TokenKind::Newline).count();
        assert_eq!(newlines, 1);
    }

    #[test]
    fn test_operators() {
        let tokens = kinds("a //= b ** c != d\n");
        assert_eq!(tokens[1], TokenKind::DoubleSlashEq);
        assert_eq!(tokens[3], TokenKind::DoubleStar);
        assert_eq!(tokens[5], TokenKind::NotEq);
    }

    #[test]
    fn test_string_literals() {
        let tokens = kinds(r#"a = 'it\'s' + "x\ty" + b"ab" + f"{n}!" + r"\d""#);
        assert_eq!(tokens[2], TokenKind::Str("it's".to_string()));
        assert_eq!(tokens[4], TokenKind::Str("x\ty".to_string()));
        assert_eq!(tokens[6], TokenKind::Bytes(b"ab".to_vec()));
        assert_eq!(tokens[8], TokenKind::FString("{n}!".to_string()));
        assert_eq!(tokens[10], TokenKind::Str("\\d".to_string()));
    }

    #[test]
    fn test_triple_quoted() {
        let tokens = kinds("s = \"\"\"a\nb\"\"\"\n");
        assert_eq!(tokens[2], TokenKind::Str("a\nb".to_string()));
    }

    #[test]
    fn test_numbers() {
        let tokens = kinds("0x1f 1_000 2.5 1e3 .5\n");
        assert_eq!(tokens[0], TokenKind::Int(31));
        assert_eq!(tokens[1], TokenKind::Int(1000));
        assert_eq!(tokens[2], TokenKind::Float(2.5));
        assert_eq!(tokens[3], TokenKind::Float(1000.0));
        assert_eq!(tokens[4], TokenKind::Float(0.5));
    }

    #[test]
    fn test_unterminated_string() {
        let err = Lexer::new("x = 'abc\n").tokenize().unwrap_err();
        assert_eq!(err.message, "unterminated string literal");
    }
}
