//! Rule-expression AST and the descriptive condition tree.
//!
//! Policy rules are written in a small security-function dialect:
//!
//! ```text
//! hasRole('POLICY_ADMIN') and (isAuthenticated() or hasIpAddress('10.0.0.0/8'))
//! ```
//!
//! [`parse_expression`] turns such a string into a [`ConditionExpr`] that
//! both the decision evaluator and the condition translator consume.
//! [`ExpressionNode`] is the translated, human-facing tree the UI renders.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Shape of a translated condition-tree node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpressionNodeKind {
    /// Every child condition must hold.
    AllOf,
    /// At least one child condition must hold.
    AnyOf,
    /// A terminal condition.
    Condition,
}

/// Human-readable description of one condition (sub)tree.
///
/// Terminal nodes carry the localized description of a single function;
/// branch nodes describe the junction and aggregate their children's
/// authority requirements.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpressionNode {
    pub kind: ExpressionNodeKind,
    /// Localized description shown to administrators.
    pub description: String,
    /// Authorities a subject must hold for this (sub)tree to pass.
    #[serde(default)]
    pub required_authorities: BTreeSet<String>,
    /// Whether the condition implies an authentication state:
    /// `Some(true)` requires an authenticated subject, `Some(false)`
    /// requires an anonymous one, `None` is neutral.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requires_authentication: Option<bool>,
    #[serde(default)]
    pub children: Vec<ExpressionNode>,
}

impl ExpressionNode {
    /// A terminal condition node with no authority or authentication
    /// requirements.
    #[must_use]
    pub fn condition(description: impl Into<String>) -> Self {
        Self {
            kind: ExpressionNodeKind::Condition,
            description: description.into(),
            required_authorities: BTreeSet::new(),
            requires_authentication: None,
            children: Vec::new(),
        }
    }
}

/// One function call inside a rule expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    /// Argument literals with quoting stripped.
    #[serde(default)]
    pub args: Vec<String>,
}

impl FunctionCall {
    /// Render the call back to its source form, for fallback descriptions.
    #[must_use]
    pub fn to_source(&self) -> String {
        if self.args.is_empty() {
            format!("{}()", self.name)
        } else {
            let args = self
                .args
                .iter()
                .map(|a| format!("'{a}'"))
                .collect::<Vec<_>>()
                .join(", ");
            format!("{}({args})", self.name)
        }
    }
}

/// Parsed rule expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionExpr {
    And(Vec<ConditionExpr>),
    Or(Vec<ConditionExpr>),
    Not(Box<ConditionExpr>),
    Call(FunctionCall),
}

/// Failure to parse a rule expression.
///
/// The decision evaluator treats this as the offending policy not matching;
/// the translator surfaces it to the rule author.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExpressionParseError {
    /// The expression was empty or all whitespace.
    #[error("empty expression")]
    Empty,

    /// An unexpected character at the given byte offset.
    #[error("unexpected character {found:?} at offset {offset}")]
    UnexpectedChar { found: char, offset: usize },

    /// The expression ended while a token was still expected.
    #[error("unexpected end of expression, expected {expected}")]
    UnexpectedEnd { expected: &'static str },

    /// A token other than the expected one.
    #[error("expected {expected} but found {found:?}")]
    UnexpectedToken { expected: &'static str, found: String },

    /// Trailing input after a complete expression.
    #[error("trailing input after expression: {rest:?}")]
    TrailingInput { rest: String },
}

/// Parse a rule expression into its [`ConditionExpr`] form.
///
/// # Errors
///
/// Returns [`ExpressionParseError`] when the input is not a well-formed
/// expression in the rule dialect.
pub fn parse_expression(input: &str) -> Result<ConditionExpr, ExpressionParseError> {
    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        return Err(ExpressionParseError::Empty);
    }
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.or_expr()?;
    if let Some(tok) = parser.peek() {
        return Err(ExpressionParseError::TrailingInput {
            rest: tok.to_source(),
        });
    }
    Ok(expr)
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Ident(String),
    Str(String),
    LParen,
    RParen,
    Comma,
    And,
    Or,
    Not,
}

impl Token {
    fn to_source(&self) -> String {
        match self {
            Self::Ident(s) => s.clone(),
            Self::Str(s) => format!("'{s}'"),
            Self::LParen => "(".to_owned(),
            Self::RParen => ")".to_owned(),
            Self::Comma => ",".to_owned(),
            Self::And => "and".to_owned(),
            Self::Or => "or".to_owned(),
            Self::Not => "not".to_owned(),
        }
    }
}

fn tokenize(input: &str) -> Result<Vec<Token>, ExpressionParseError> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some(&(offset, c)) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            ',' => {
                chars.next();
                tokens.push(Token::Comma);
            }
            '!' => {
                chars.next();
                tokens.push(Token::Not);
            }
            '&' => {
                chars.next();
                match chars.peek() {
                    Some(&(_, '&')) => {
                        chars.next();
                        tokens.push(Token::And);
                    }
                    _ => return Err(ExpressionParseError::UnexpectedChar { found: '&', offset }),
                }
            }
            '|' => {
                chars.next();
                match chars.peek() {
                    Some(&(_, '|')) => {
                        chars.next();
                        tokens.push(Token::Or);
                    }
                    _ => return Err(ExpressionParseError::UnexpectedChar { found: '|', offset }),
                }
            }
            '\'' | '"' => {
                let quote = c;
                chars.next();
                let mut value = String::new();
                let mut closed = false;
                for (_, sc) in chars.by_ref() {
                    if sc == quote {
                        closed = true;
                        break;
                    }
                    value.push(sc);
                }
                if !closed {
                    return Err(ExpressionParseError::UnexpectedEnd {
                        expected: "closing quote",
                    });
                }
                tokens.push(Token::Str(value));
            }
            c if c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '/' || c == ':' => {
                let mut ident = String::new();
                while let Some(&(_, ic)) = chars.peek() {
                    if ic.is_ascii_alphanumeric() || matches!(ic, '_' | '.' | '/' | ':' | '*') {
                        ident.push(ic);
                        chars.next();
                    } else {
                        break;
                    }
                }
                match ident.as_str() {
                    "and" | "AND" => tokens.push(Token::And),
                    "or" | "OR" => tokens.push(Token::Or),
                    "not" | "NOT" => tokens.push(Token::Not),
                    _ => tokens.push(Token::Ident(ident)),
                }
            }
            other => {
                return Err(ExpressionParseError::UnexpectedChar {
                    found: other,
                    offset,
                });
            }
        }
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn bump(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).cloned();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn or_expr(&mut self) -> Result<ConditionExpr, ExpressionParseError> {
        let first = self.and_expr()?;
        let mut operands = vec![first];
        while matches!(self.peek(), Some(Token::Or)) {
            self.bump();
            operands.push(self.and_expr()?);
        }
        if operands.len() == 1 {
            Ok(operands.remove(0))
        } else {
            Ok(ConditionExpr::Or(operands))
        }
    }

    fn and_expr(&mut self) -> Result<ConditionExpr, ExpressionParseError> {
        let first = self.unary_expr()?;
        let mut operands = vec![first];
        while matches!(self.peek(), Some(Token::And)) {
            self.bump();
            operands.push(self.unary_expr()?);
        }
        if operands.len() == 1 {
            Ok(operands.remove(0))
        } else {
            Ok(ConditionExpr::And(operands))
        }
    }

    fn unary_expr(&mut self) -> Result<ConditionExpr, ExpressionParseError> {
        if matches!(self.peek(), Some(Token::Not)) {
            self.bump();
            let inner = self.unary_expr()?;
            return Ok(ConditionExpr::Not(Box::new(inner)));
        }
        self.primary_expr()
    }

    fn primary_expr(&mut self) -> Result<ConditionExpr, ExpressionParseError> {
        match self.bump() {
            Some(Token::LParen) => {
                let inner = self.or_expr()?;
                match self.bump() {
                    Some(Token::RParen) => Ok(inner),
                    Some(other) => Err(ExpressionParseError::UnexpectedToken {
                        expected: "')'",
                        found: other.to_source(),
                    }),
                    None => Err(ExpressionParseError::UnexpectedEnd { expected: "')'" }),
                }
            }
            Some(Token::Ident(name)) => {
                // Parenthesised argument list is optional: `isAuthenticated`
                // and `isAuthenticated()` are the same call.
                let args = if matches!(self.peek(), Some(Token::LParen)) {
                    self.bump();
                    self.arg_list()?
                } else {
                    Vec::new()
                };
                Ok(ConditionExpr::Call(FunctionCall { name, args }))
            }
            Some(other) => Err(ExpressionParseError::UnexpectedToken {
                expected: "function call or '('",
                found: other.to_source(),
            }),
            None => Err(ExpressionParseError::UnexpectedEnd {
                expected: "function call or '('",
            }),
        }
    }

    fn arg_list(&mut self) -> Result<Vec<String>, ExpressionParseError> {
        let mut args = Vec::new();
        if matches!(self.peek(), Some(Token::RParen)) {
            self.bump();
            return Ok(args);
        }
        loop {
            match self.bump() {
                Some(Token::Str(s)) => args.push(s),
                Some(Token::Ident(s)) => args.push(s),
                Some(other) => {
                    return Err(ExpressionParseError::UnexpectedToken {
                        expected: "argument literal",
                        found: other.to_source(),
                    });
                }
                None => {
                    return Err(ExpressionParseError::UnexpectedEnd {
                        expected: "argument literal",
                    });
                }
            }
            match self.bump() {
                Some(Token::Comma) => {}
                Some(Token::RParen) => return Ok(args),
                Some(other) => {
                    return Err(ExpressionParseError::UnexpectedToken {
                        expected: "',' or ')'",
                        found: other.to_source(),
                    });
                }
                None => {
                    return Err(ExpressionParseError::UnexpectedEnd {
                        expected: "',' or ')'",
                    });
                }
            }
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    fn call(name: &str, args: &[&str]) -> ConditionExpr {
        ConditionExpr::Call(FunctionCall {
            name: name.to_owned(),
            args: args.iter().map(|a| (*a).to_owned()).collect(),
        })
    }

    #[test]
    fn parses_single_call() {
        let expr = parse_expression("hasRole('ADMIN')").unwrap();
        assert_eq!(expr, call("hasRole", &["ADMIN"]));
    }

    #[test]
    fn parses_call_without_parens() {
        let expr = parse_expression("isAuthenticated").unwrap();
        assert_eq!(expr, call("isAuthenticated", &[]));
    }

    #[test]
    fn parses_multi_arg_call() {
        let expr = parse_expression("hasAnyRole('ADMIN', 'AUDITOR')").unwrap();
        assert_eq!(expr, call("hasAnyRole", &["ADMIN", "AUDITOR"]));
    }

    #[test]
    fn and_binds_tighter_than_or() {
        let expr =
            parse_expression("permitAll() or hasRole('A') and isAuthenticated()").unwrap();
        assert_eq!(
            expr,
            ConditionExpr::Or(vec![
                call("permitAll", &[]),
                ConditionExpr::And(vec![call("hasRole", &["A"]), call("isAuthenticated", &[])]),
            ])
        );
    }

    #[test]
    fn parens_override_precedence() {
        let expr =
            parse_expression("(permitAll() or hasRole('A')) and isAuthenticated()").unwrap();
        assert_eq!(
            expr,
            ConditionExpr::And(vec![
                ConditionExpr::Or(vec![call("permitAll", &[]), call("hasRole", &["A"])]),
                call("isAuthenticated", &[]),
            ])
        );
    }

    #[test]
    fn symbolic_operators() {
        let expr = parse_expression("hasRole('A') && !isAnonymous() || denyAll()").unwrap();
        assert_eq!(
            expr,
            ConditionExpr::Or(vec![
                ConditionExpr::And(vec![
                    call("hasRole", &["A"]),
                    ConditionExpr::Not(Box::new(call("isAnonymous", &[]))),
                ]),
                call("denyAll", &[]),
            ])
        );
    }

    #[test]
    fn cidr_argument_survives_quoting() {
        let expr = parse_expression("hasIpAddress('10.0.0.0/8')").unwrap();
        assert_eq!(expr, call("hasIpAddress", &["10.0.0.0/8"]));
    }

    #[test]
    fn rejects_empty_input() {
        assert_eq!(parse_expression("   "), Err(ExpressionParseError::Empty));
    }

    #[test]
    fn rejects_unbalanced_parens() {
        let err = parse_expression("hasRole('A'").unwrap_err();
        assert!(matches!(err, ExpressionParseError::UnexpectedEnd { .. }));
    }

    #[test]
    fn rejects_trailing_garbage() {
        let err = parse_expression("hasRole('A') hasRole('B')").unwrap_err();
        assert!(matches!(err, ExpressionParseError::TrailingInput { .. }));
    }

    #[test]
    fn function_call_round_trips_to_source() {
        let call = FunctionCall {
            name: "hasAnyRole".to_owned(),
            args: vec!["A".to_owned(), "B".to_owned()],
        };
        assert_eq!(call.to_source(), "hasAnyRole('A', 'B')");
    }
}
