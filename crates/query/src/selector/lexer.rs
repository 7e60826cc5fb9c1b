//! Tokenizer for selector expressions

use super::ParseError;

/// Comparison operator of an atom
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparator {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

impl Comparator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Comparator::Eq => "=",
            Comparator::Ne => "!=",
            Comparator::Gt => ">",
            Comparator::Ge => ">=",
            Comparator::Lt => "<",
            Comparator::Le => "<=",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// Unquoted word
    Word(String),
    /// Single or double quoted string, quotes removed
    Quoted(String),
    Cmp(Comparator),
    And,
    Or,
    Not,
    In,
    LParen,
    RParen,
    LBrace,
    RBrace,
    Comma,
}

impl Token {
    pub fn describe(&self) -> String {
        match self {
            Token::Word(w) => w.clone(),
            Token::Quoted(s) => format!("\"{s}\""),
            Token::Cmp(c) => c.as_str().to_string(),
            Token::And => "AND".to_string(),
            Token::Or => "OR".to_string(),
            Token::Not => "NOT".to_string(),
            Token::In => "IN".to_string(),
            Token::LParen => "(".to_string(),
            Token::RParen => ")".to_string(),
            Token::LBrace => "{".to_string(),
            Token::RBrace => "}".to_string(),
            Token::Comma => ",".to_string(),
        }
    }
}

/// Token with the byte offset it starts at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Spanned {
    pub token: Token,
    pub pos: usize,
}

fn is_word_char(c: char) -> bool {
    !c.is_whitespace()
        && !matches!(c, '(' | ')' | '{' | '}' | ',' | '=' | '!' | '<' | '>' | '\'' | '"')
}

/// Split a selector into tokens
pub fn tokenize(input: &str) -> Result<Vec<Spanned>, ParseError> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some(&(pos, c)) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }
        let token = match c {
            '(' => single(&mut chars, Token::LParen),
            ')' => single(&mut chars, Token::RParen),
            '{' => single(&mut chars, Token::LBrace),
            '}' => single(&mut chars, Token::RBrace),
            ',' => single(&mut chars, Token::Comma),
            '=' => {
                chars.next();
                // Accept "==" as a synonym
                if matches!(chars.peek(), Some(&(_, '='))) {
                    chars.next();
                }
                Token::Cmp(Comparator::Eq)
            }
            '!' => {
                chars.next();
                match chars.next() {
                    Some((_, '=')) => Token::Cmp(Comparator::Ne),
                    _ => return Err(ParseError::UnexpectedChar('!', pos)),
                }
            }
            '<' | '>' => {
                chars.next();
                let or_equal = matches!(chars.peek(), Some(&(_, '=')));
                if or_equal {
                    chars.next();
                }
                Token::Cmp(match (c, or_equal) {
                    ('<', false) => Comparator::Lt,
                    ('<', true) => Comparator::Le,
                    ('>', false) => Comparator::Gt,
                    _ => Comparator::Ge,
                })
            }
            '\'' | '"' => {
                chars.next();
                let mut value = String::new();
                let mut closed = false;
                while let Some((_, ch)) = chars.next() {
                    if ch == c {
                        closed = true;
                        break;
                    }
                    if ch == '\\' {
                        if let Some(&(_, escaped)) = chars.peek() {
                            if escaped == c || escaped == '\\' {
                                value.push(escaped);
                                chars.next();
                                continue;
                            }
                        }
                    }
                    value.push(ch);
                }
                if !closed {
                    return Err(ParseError::UnterminatedString(pos));
                }
                Token::Quoted(value)
            }
            _ => {
                let mut word = String::new();
                while let Some(&(_, ch)) = chars.peek() {
                    if !is_word_char(ch) {
                        break;
                    }
                    word.push(ch);
                    chars.next();
                }
                keyword(word)
            }
        };
        tokens.push(Spanned { token, pos });
    }
    Ok(tokens)
}

fn single(chars: &mut std::iter::Peekable<std::str::CharIndices<'_>>, token: Token) -> Token {
    chars.next();
    token
}

fn keyword(word: String) -> Token {
    match word.to_ascii_lowercase().as_str() {
        "and" => Token::And,
        "or" => Token::Or,
        "not" => Token::Not,
        "in" => Token::In,
        _ => Token::Word(word),
    }
}
