//! Recursive descent parser for selectors

use super::lexer::{tokenize, Spanned, Token};
use super::{Atom, Expr, Operator, ParseError};

/// Deepest nesting of parentheses and `NOT` accepted
pub const MAX_DEPTH: usize = 128;

/// Parse a selector. Returns `Ok(None)` for a blank selector.
pub fn parse(input: &str) -> Result<Option<Expr>, ParseError> {
    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        return Ok(None);
    }
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let expr = parser.or_expr()?;
    if let Some(extra) = parser.peek() {
        return Err(ParseError::UnexpectedToken(extra.token.describe(), extra.pos));
    }
    Ok(Some(expr))
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Spanned> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Result<Spanned, ParseError> {
        let tok = self.tokens.get(self.pos).cloned().ok_or(ParseError::UnexpectedEnd)?;
        self.pos += 1;
        Ok(tok)
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek().map(|s| &s.token) == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: Token) -> Result<(), ParseError> {
        let next = self.next()?;
        if next.token == token {
            Ok(())
        } else {
            Err(ParseError::UnexpectedToken(next.token.describe(), next.pos))
        }
    }

    fn descend(&mut self) -> Result<(), ParseError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(ParseError::TooDeep(MAX_DEPTH));
        }
        Ok(())
    }

    fn or_expr(&mut self) -> Result<Expr, ParseError> {
        let mut parts = vec![self.and_expr()?];
        while self.eat(&Token::Or) {
            parts.push(self.and_expr()?);
        }
        Ok(if parts.len() == 1 {
            parts.remove(0)
        } else {
            Expr::Or(parts)
        })
    }

    fn and_expr(&mut self) -> Result<Expr, ParseError> {
        let mut parts = vec![self.unary()?];
        while self.eat(&Token::And) {
            parts.push(self.unary()?);
        }
        Ok(if parts.len() == 1 {
            parts.remove(0)
        } else {
            Expr::And(parts)
        })
    }

    fn unary(&mut self) -> Result<Expr, ParseError> {
        if self.eat(&Token::Not) {
            self.descend()?;
            let inner = self.unary()?;
            self.depth -= 1;
            return Ok(Expr::Not(Box::new(inner)));
        }
        if self.eat(&Token::LParen) {
            self.descend()?;
            let inner = self.or_expr()?;
            self.expect(Token::RParen)?;
            self.depth -= 1;
            return Ok(inner);
        }
        self.atom()
    }

    fn literal(&mut self) -> Result<String, ParseError> {
        let tok = self.next()?;
        match tok.token {
            Token::Word(s) | Token::Quoted(s) => Ok(s),
            other => Err(ParseError::UnexpectedToken(other.describe(), tok.pos)),
        }
    }

    fn atom(&mut self) -> Result<Expr, ParseError> {
        let key = self.literal()?;
        let tok = self.next()?;
        let (op, values) = match tok.token {
            Token::Cmp(c) => (Operator::Cmp(c), vec![self.literal()?]),
            Token::In => (Operator::In, self.set()?),
            Token::Not => {
                self.expect(Token::In)?;
                (Operator::NotIn, self.set()?)
            }
            other => return Err(ParseError::UnexpectedToken(other.describe(), tok.pos)),
        };
        Ok(Expr::Atom(Atom { key, op, values }))
    }

    fn set(&mut self) -> Result<Vec<String>, ParseError> {
        self.expect(Token::LBrace)?;
        let mut values = vec![self.literal()?];
        while self.eat(&Token::Comma) {
            values.push(self.literal()?);
        }
        self.expect(Token::RBrace)?;
        Ok(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selector::Comparator;
    use proptest::prelude::*;

    fn atom(key: &str, op: Operator, values: &[&str]) -> Expr {
        Expr::Atom(Atom {
            key: key.to_string(),
            op,
            values: values.iter().map(|v| v.to_string()).collect(),
        })
    }

    #[test]
    fn test_blank_selector() {
        assert_eq!(parse("").unwrap(), None);
        assert_eq!(parse("   ").unwrap(), None);
    }

    #[test]
    fn test_precedence() {
        let expr = parse("a = 1 OR b = 2 AND c = 3").unwrap().unwrap();
        assert_eq!(
            expr,
            Expr::Or(vec![
                atom("a", Operator::Cmp(Comparator::Eq), &["1"]),
                Expr::And(vec![
                    atom("b", Operator::Cmp(Comparator::Eq), &["2"]),
                    atom("c", Operator::Cmp(Comparator::Eq), &["3"]),
                ]),
            ])
        );
    }

    #[test]
    fn test_parentheses_and_not() {
        let expr = parse("NOT (a = 1 OR b != 2)").unwrap().unwrap();
        assert_eq!(
            expr,
            Expr::Not(Box::new(Expr::Or(vec![
                atom("a", Operator::Cmp(Comparator::Eq), &["1"]),
                atom("b", Operator::Cmp(Comparator::Ne), &["2"]),
            ])))
        );
    }

    #[test]
    fn test_set_membership() {
        let expr = parse("name NOT IN {'a', \"b\"}").unwrap().unwrap();
        assert_eq!(expr, atom("name", Operator::NotIn, &["a", "b"]));
    }

    #[test]
    fn test_errors() {
        assert_eq!(parse("a ="), Err(ParseError::UnexpectedEnd));
        assert_eq!(
            parse("a = 1 b = 2"),
            Err(ParseError::UnexpectedToken("b".into(), 6))
        );
        assert!(matches!(parse("(a = 1"), Err(ParseError::UnexpectedEnd)));
        assert!(matches!(parse("a IN {}"), Err(ParseError::UnexpectedToken(_, _))));
        assert!(matches!(parse("AND"), Err(ParseError::UnexpectedToken(_, 0))));
    }

    #[test]
    fn test_depth_limit() {
        let deep = format!("{}a = 1{}", "(".repeat(MAX_DEPTH + 1), ")".repeat(MAX_DEPTH + 1));
        assert_eq!(parse(&deep), Err(ParseError::TooDeep(MAX_DEPTH)));
        let ok = format!("{}a = 1{}", "(".repeat(10), ")".repeat(10));
        assert!(parse(&ok).is_ok());
    }

    fn arb_atom() -> impl Strategy<Value = Expr> {
        let value = "[a-z0-9 _.*\"'-]{1,8}";
        (
            "[a-z_]{1,6}",
            prop_oneof![
                Just(Operator::Cmp(Comparator::Eq)),
                Just(Operator::Cmp(Comparator::Ne)),
                Just(Operator::Cmp(Comparator::Ge)),
                Just(Operator::In),
                Just(Operator::NotIn),
            ],
            prop::collection::vec(value, 1..3),
        )
            .prop_map(|(key, op, mut values)| {
                if matches!(op, Operator::Cmp(_)) {
                    values.truncate(1);
                }
                Expr::Atom(Atom { key, op, values })
            })
    }

    fn arb_expr() -> impl Strategy<Value = Expr> {
        arb_atom().prop_recursive(4, 24, 3, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 2..4).prop_map(Expr::And),
                prop::collection::vec(inner.clone(), 2..4).prop_map(Expr::Or),
                inner.prop_map(|e| Expr::Not(Box::new(e))),
            ]
        })
    }

    proptest! {
        #[test]
        fn prop_display_parses_back(expr in arb_expr()) {
            let text = expr.to_string();
            let parsed = parse(&text).unwrap().unwrap();
            prop_assert_eq!(parsed, expr);
        }
    }
}
