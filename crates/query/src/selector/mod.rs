//! Selector language
//!
//! A selector is a boolean filter over log fields:
//!
//! ```text
//! source_type = wep AND (dest_port >= 8000 OR dest_namespace IN {"kube-*", default})
//! ```
//!
//! Keywords (`AND`, `OR`, `NOT`, `IN`) are case-insensitive. Keys and
//! values may be bare words or single/double quoted strings.
//!
//! Parsing produces an [`Expr`]; [`translate`] validates every atom against
//! a log type's [`FieldSet`](crate::fields::FieldSet) and lowers the tree to
//! a [`Query`](crate::dsl::Query).

pub mod lexer;
pub mod parser;
pub mod translate;

pub use lexer::Comparator;
pub use parser::parse;
pub use translate::{selector_query, translate, AtomError, MAX_SELECTOR_LEN};

use std::fmt;
use thiserror::Error;

/// Why a selector failed to parse
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("unexpected character '{0}' at position {1}")]
    UnexpectedChar(char, usize),

    #[error("unterminated string starting at position {0}")]
    UnterminatedString(usize),

    #[error("unexpected token '{0}' at position {1}")]
    UnexpectedToken(String, usize),

    #[error("unexpected end of selector")]
    UnexpectedEnd,

    #[error("selector nested deeper than {0} levels")]
    TooDeep(usize),
}

/// Operator of an atom
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Cmp(Comparator),
    In,
    NotIn,
}

/// A single `key op value` test
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Atom {
    pub key: String,
    pub op: Operator,
    /// One value for comparators, one or more for set membership
    pub values: Vec<String>,
}

/// Parsed selector
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    And(Vec<Expr>),
    Or(Vec<Expr>),
    Not(Box<Expr>),
    Atom(Atom),
}

fn write_quoted(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    f.write_str("\"")?;
    for c in s.chars() {
        if c == '"' || c == '\\' {
            f.write_str("\\")?;
        }
        write!(f, "{c}")?;
    }
    f.write_str("\"")
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_quoted(f, &self.key)?;
        match self.op {
            Operator::Cmp(c) => {
                write!(f, " {} ", c.as_str())?;
                if let Some(v) = self.values.first() {
                    write_quoted(f, v)?;
                }
                Ok(())
            }
            Operator::In | Operator::NotIn => {
                if self.op == Operator::NotIn {
                    f.write_str(" NOT")?;
                }
                f.write_str(" IN {")?;
                for (i, v) in self.values.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write_quoted(f, v)?;
                }
                f.write_str("}")
            }
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Atom(a) => a.fmt(f),
            Expr::Not(inner) => write!(f, "NOT {inner}"),
            Expr::And(parts) | Expr::Or(parts) => {
                let sep = if matches!(self, Expr::And(_)) { " AND " } else { " OR " };
                f.write_str("(")?;
                for (i, p) in parts.iter().enumerate() {
                    if i > 0 {
                        f.write_str(sep)?;
                    }
                    p.fmt(f)?;
                }
                f.write_str(")")
            }
        }
    }
}
