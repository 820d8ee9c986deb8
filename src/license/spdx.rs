//! SPDX-style licence expressions.
//!
//! Grammar (AND binds tighter than OR, `/` is shorthand for OR):
//! ```text
//! expr     := or_expr
//! or_expr  := and_expr ( "OR" and_expr )*
//! and_expr := atom ( "AND" atom )*
//! atom     := "(" expr ")" | id ( "WITH" id )?
//! ```

use crate::models::LinkType;

/// Normalize common non-SPDX strings to their SPDX equivalents.
pub fn normalize(raw: &str) -> String {
    let trimmed = raw.trim();
    match trimmed {
        "Apache 2.0" | "Apache 2" | "Apache License 2.0" | "Apache License, Version 2.0"
        | "The Apache Software License, Version 2.0" => "Apache-2.0".to_string(),
        "MIT License" | "The MIT License" => "MIT".to_string(),
        "BSD" | "BSD License" => "BSD-3-Clause".to_string(),
        "BSD 2-Clause" | "Simplified BSD" => "BSD-2-Clause".to_string(),
        "BSD 3-Clause" | "New BSD" | "Modified BSD" => "BSD-3-Clause".to_string(),
        "GNU GPL v2" | "GNU General Public License v2" | "GPL v2" | "GPLv2" => {
            "GPL-2.0".to_string()
        }
        "GNU GPL v3" | "GNU General Public License v3" | "GPL v3" | "GPLv3" => {
            "GPL-3.0".to_string()
        }
        "GNU LGPL v2.1" | "LGPL v2.1" | "LGPLv2.1" => "LGPL-2.1".to_string(),
        "GNU LGPL v3" | "LGPL v3" | "LGPLv3" => "LGPL-3.0".to_string(),
        "Mozilla Public License 2.0" | "MPL 2.0" | "MPLv2" => "MPL-2.0".to_string(),
        "Eclipse Public License 2.0" | "EPL 2.0" => "EPL-2.0".to_string(),
        "ISC License" => "ISC".to_string(),
        "CC0" | "Public Domain" => "CC0-1.0".to_string(),
        "AGPL v3" | "AGPLv3" | "GNU AGPL v3" => "AGPL-3.0".to_string(),
        other => other.to_string(),
    }
}

/// Strip leading and trailing parentheses, e.g. `"(MIT OR ISC)"` → `"MIT OR ISC"`.
pub fn strip_parentheses(raw: &str) -> String {
    raw.trim()
        .trim_matches(|c| c == '(' || c == ')')
        .trim()
        .to_string()
}

#[derive(Debug, PartialEq, Clone)]
enum Token {
    Id(String),
    And,
    Or,
    With,
    LParen,
    RParen,
}

fn tokenize(expr: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut chars = expr.chars().peekable();
    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }
        if c == '(' {
            tokens.push(Token::LParen);
            chars.next();
        } else if c == ')' {
            tokens.push(Token::RParen);
            chars.next();
        } else if c == '/' {
            tokens.push(Token::Or);
            chars.next();
        } else {
            let mut s = String::new();
            while let Some(&c) = chars.peek() {
                if c.is_whitespace() || c == '(' || c == ')' || c == '/' {
                    break;
                }
                s.push(c);
                chars.next();
            }
            let token = match s.to_ascii_uppercase().as_str() {
                "AND" => Token::And,
                "OR" => Token::Or,
                "WITH" => Token::With,
                _ => Token::Id(s),
            };
            tokens.push(token);
        }
    }
    tokens
}

/// Parsed licence expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    License {
        id: String,
        exception: Option<String>,
    },
    And(Vec<Expr>),
    Or(Vec<Expr>),
}

impl Expr {
    /// Licence identifiers in reading order.
    pub fn identifiers(&self) -> Vec<&str> {
        match self {
            Expr::License { id, .. } => vec![id.as_str()],
            Expr::And(parts) | Expr::Or(parts) => {
                parts.iter().flat_map(|p| p.identifiers()).collect()
            }
        }
    }
}

struct ExprParser {
    tokens: Vec<Token>,
    pos: usize,
}

impl ExprParser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn consume(&mut self) -> Option<Token> {
        let t = self.tokens.get(self.pos).cloned();
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    fn parse_or(&mut self) -> Option<Expr> {
        let mut parts: Vec<Expr> = self.parse_and().into_iter().collect();
        while matches!(self.peek(), Some(Token::Or)) {
            self.consume();
            parts.extend(self.parse_and());
        }
        collapse(parts, Expr::Or)
    }

    fn parse_and(&mut self) -> Option<Expr> {
        let mut parts: Vec<Expr> = self.parse_atom().into_iter().collect();
        while matches!(self.peek(), Some(Token::And)) {
            self.consume();
            parts.extend(self.parse_atom());
        }
        collapse(parts, Expr::And)
    }

    fn parse_atom(&mut self) -> Option<Expr> {
        match self.consume()? {
            Token::LParen => {
                let inner = self.parse_or();
                if matches!(self.peek(), Some(Token::RParen)) {
                    self.consume();
                }
                inner
            }
            Token::Id(id) => {
                let mut exception = None;
                if matches!(self.peek(), Some(Token::With)) {
                    self.consume();
                    if let Some(Token::Id(e)) = self.peek().cloned() {
                        self.consume();
                        exception = Some(e);
                    }
                }
                Some(Expr::License {
                    id: normalize(&id),
                    exception,
                })
            }
            // Stray operator or closing parenthesis: skip it.
            _ => self.parse_atom(),
        }
    }
}

fn collapse(mut parts: Vec<Expr>, join: fn(Vec<Expr>) -> Expr) -> Option<Expr> {
    match parts.len() {
        0 => None,
        1 => parts.pop(),
        _ => Some(join(parts)),
    }
}

/// Parse `expr`; `None` when it contains no licence identifier.
///
/// A raw string that is a known non-SPDX name as a whole (e.g. `"Apache License 2.0"`)
/// is normalized before tokenizing.
pub fn parse(expr: &str) -> Option<Expr> {
    let normalized = normalize(expr);
    ExprParser {
        tokens: drop_unmatched_closers(tokenize(&normalized)),
        pos: 0,
    }
    .parse_or()
}

/// Remove `)` tokens that close no open parenthesis.
fn drop_unmatched_closers(tokens: Vec<Token>) -> Vec<Token> {
    let mut depth = 0usize;
    tokens
        .into_iter()
        .filter(|t| match t {
            Token::LParen => {
                depth += 1;
                true
            }
            Token::RParen if depth == 0 => false,
            Token::RParen => {
                depth -= 1;
                true
            }
            _ => true,
        })
        .collect()
}

/// Flat reading-order list of identifiers, each with the operator that joins
/// it to the next. Parentheses are dropped; the last entry has no link.
pub fn linked_identifiers(expr: &str) -> Vec<(String, Option<LinkType>)> {
    let normalized = normalize(expr);
    let tokens = tokenize(&normalized);
    let mut linked: Vec<(String, Option<LinkType>)> = Vec::new();
    let mut iter = tokens.into_iter().peekable();
    while let Some(token) = iter.next() {
        match token {
            Token::Id(id) => linked.push((normalize(&id), None)),
            Token::With => {
                // Exception names are not licences.
                iter.next_if(|t| matches!(t, Token::Id(_)));
            }
            Token::And | Token::Or => {
                let link = if token == Token::And {
                    LinkType::And
                } else {
                    LinkType::Or
                };
                if let Some(last) = linked.last_mut() {
                    last.1 = Some(link);
                }
            }
            Token::LParen | Token::RParen => {}
        }
    }
    if let Some(last) = linked.last_mut() {
        last.1 = None;
    }
    linked
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> Expr {
        Expr::License {
            id: s.to_string(),
            exception: None,
        }
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("MIT License"), "MIT");
        assert_eq!(normalize("Apache License 2.0"), "Apache-2.0");
        assert_eq!(normalize("  ISC  "), "ISC");
    }

    #[test]
    fn test_strip_parentheses() {
        assert_eq!(strip_parentheses("(MIT)"), "MIT");
        assert_eq!(strip_parentheses("(MIT OR Apache-2.0)"), "MIT OR Apache-2.0");
        assert_eq!(strip_parentheses("MIT"), "MIT");
    }

    #[test]
    fn test_and_binds_tighter_than_or() {
        assert_eq!(
            parse("MIT OR GPL-3.0 AND BSD-3-Clause"),
            Some(Expr::Or(vec![
                id("MIT"),
                Expr::And(vec![id("GPL-3.0"), id("BSD-3-Clause")]),
            ]))
        );
    }

    #[test]
    fn test_parentheses_override_precedence() {
        assert_eq!(
            parse("(MIT OR GPL-3.0) AND BSD-3-Clause"),
            Some(Expr::And(vec![
                Expr::Or(vec![id("MIT"), id("GPL-3.0")]),
                id("BSD-3-Clause"),
            ]))
        );
    }

    #[test]
    fn test_slash_is_or() {
        assert_eq!(
            parse("MIT/Apache-2.0"),
            Some(Expr::Or(vec![id("MIT"), id("Apache-2.0")]))
        );
    }

    #[test]
    fn test_with_exception() {
        assert_eq!(
            parse("GPL-2.0 WITH Classpath-exception-2.0"),
            Some(Expr::License {
                id: "GPL-2.0".to_string(),
                exception: Some("Classpath-exception-2.0".to_string()),
            })
        );
    }

    #[test]
    fn test_stray_closing_parenthesis_is_skipped() {
        assert_eq!(
            parse("MIT ) OR GPL-2.0"),
            Some(Expr::Or(vec![id("MIT"), id("GPL-2.0")]))
        );
        assert_eq!(
            parse("(MIT AND ISC)) AND BSD-3-Clause"),
            Some(Expr::And(vec![
                Expr::And(vec![id("MIT"), id("ISC")]),
                id("BSD-3-Clause"),
            ]))
        );
    }

    #[test]
    fn test_empty_expression() {
        assert_eq!(parse(""), None);
        assert_eq!(parse("( )"), None);
    }

    #[test]
    fn test_linked_identifiers() {
        assert_eq!(
            linked_identifiers("(MIT OR Apache-2.0) AND GPL-2.0 WITH Classpath-exception-2.0"),
            vec![
                ("MIT".to_string(), Some(LinkType::Or)),
                ("Apache-2.0".to_string(), Some(LinkType::And)),
                ("GPL-2.0".to_string(), None),
            ]
        );
        assert_eq!(linked_identifiers("MIT"), vec![("MIT".to_string(), None)]);
        assert!(linked_identifiers("").is_empty());
    }
}
