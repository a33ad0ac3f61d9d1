//! Parsing of environment references inside string values
//!
//! Recognized forms:
//! - `${NAME}` - substitute the variable, failing if it is unset
//! - `${NAME:-default}` - substitute the variable, or `default` if unset
//!
//! `NAME` matches `[A-Z_][A-Z0-9_]*` and `default` is one or more characters
//! other than `}`. Anything else that starts with `${` (lowercase names,
//! `${NAME:-}`, an unterminated reference) is kept as literal text.

/// A parsed string value
#[derive(Debug, Clone, PartialEq)]
pub enum Interpolation {
    /// Literal text
    Literal(String),
    /// A reference to an environment variable
    EnvVar {
        /// Variable name
        name: String,
        /// Fallback used when the variable is unset
        default: Option<String>,
    },
    /// A concatenation of multiple parts
    Concat(Vec<Interpolation>),
}

/// Parser for strings that may contain `${...}` references
pub struct InterpolationParser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> InterpolationParser<'a> {
    /// Create a new parser for the given input
    pub fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    /// Parse the entire input string
    ///
    /// Never fails: text that is not a well-formed reference is literal.
    pub fn parse(&mut self) -> Interpolation {
        let mut parts = Vec::new();

        while !self.is_eof() {
            if self.check_reference_start() {
                match self.parse_reference() {
                    Some(reference) => parts.push(reference),
                    None => {
                        // Not a reference: keep the `$` and carry on after it
                        parts.push(Interpolation::Literal("$".to_string()));
                        self.advance();
                    }
                }
            } else {
                let literal = self.collect_literal();
                parts.push(Interpolation::Literal(literal));
            }
        }

        let mut merged = merge_adjacent_literals(parts);
        match merged.len() {
            0 => Interpolation::Literal(String::new()),
            1 => merged.remove(0),
            _ => Interpolation::Concat(merged),
        }
    }

    fn is_eof(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn current(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn peek(&self) -> Option<char> {
        let mut chars = self.input[self.pos..].chars();
        chars.next();
        chars.next()
    }

    fn advance(&mut self) {
        if let Some(c) = self.current() {
            self.pos += c.len_utf8();
        }
    }

    /// Check if we're at a reference start (${)
    fn check_reference_start(&self) -> bool {
        self.current() == Some('$') && self.peek() == Some('{')
    }

    /// Collect literal text until the next `${` or end of input
    fn collect_literal(&mut self) -> String {
        let start = self.pos;
        while !self.is_eof() && !self.check_reference_start() {
            self.advance();
        }
        self.input[start..self.pos].to_string()
    }

    /// Try to parse a reference starting at `${`
    ///
    /// On failure the cursor is restored and `None` is returned.
    fn parse_reference(&mut self) -> Option<Interpolation> {
        let start = self.pos;
        let parsed = self.parse_reference_inner();
        if parsed.is_none() {
            self.pos = start;
        }
        parsed
    }

    fn parse_reference_inner(&mut self) -> Option<Interpolation> {
        self.advance(); // $
        self.advance(); // {

        let name = self.collect_name()?;

        match self.current() {
            Some('}') => {
                self.advance();
                Some(Interpolation::EnvVar {
                    name,
                    default: None,
                })
            }
            Some(':') if self.peek() == Some('-') => {
                self.advance(); // :
                self.advance(); // -
                let default = self.collect_default();
                if default.is_empty() || self.current() != Some('}') {
                    return None;
                }
                self.advance(); // }
                Some(Interpolation::EnvVar {
                    name,
                    default: Some(default),
                })
            }
            _ => None,
        }
    }

    /// Collect a variable name (`[A-Z_][A-Z0-9_]*`)
    fn collect_name(&mut self) -> Option<String> {
        let start = self.pos;
        match self.current() {
            Some(c) if c.is_ascii_uppercase() || c == '_' => self.advance(),
            _ => return None,
        }
        while let Some(c) = self.current() {
            if c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_' {
                self.advance();
            } else {
                break;
            }
        }
        Some(self.input[start..self.pos].to_string())
    }

    /// Collect a default value (everything up to the next `}`)
    fn collect_default(&mut self) -> String {
        let start = self.pos;
        while let Some(c) = self.current() {
            if c == '}' {
                break;
            }
            self.advance();
        }
        self.input[start..self.pos].to_string()
    }
}

/// Merge adjacent literal parts
fn merge_adjacent_literals(parts: Vec<Interpolation>) -> Vec<Interpolation> {
    let mut result = Vec::new();
    let mut current_literal = String::new();

    for part in parts {
        match part {
            Interpolation::Literal(s) => {
                current_literal.push_str(&s);
            }
            other => {
                if !current_literal.is_empty() {
                    result.push(Interpolation::Literal(std::mem::take(&mut current_literal)));
                }
                result.push(other);
            }
        }
    }

    if !current_literal.is_empty() {
        result.push(Interpolation::Literal(current_literal));
    }

    result
}

/// Parse a string value
pub fn parse(input: &str) -> Interpolation {
    InterpolationParser::new(input).parse()
}

/// Cheap check for whether a string could contain a reference
pub fn contains_reference(input: &str) -> bool {
    input.contains("${")
}

/// Check whether `name` is a valid variable name (`[A-Z_][A-Z0-9_]*`)
pub fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_uppercase() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}
