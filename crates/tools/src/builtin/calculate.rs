//! `calculate` tool (§4.5 tool mapping table): a small arithmetic
//! expression evaluator supporting `+ - * / ( )` and decimal literals.
//! Deliberately not a general scripting surface — that's `code_exec`, which
//! is blacklisted by default.

use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Clone, Deserialize)]
pub struct CalculateRequest {
    pub expression: String,
}

pub fn calculate(req: CalculateRequest) -> Result<Value, String> {
    let mut parser = Parser::new(&req.expression);
    let result = parser.parse_expr()?;
    parser.skip_whitespace();
    if parser.pos != parser.chars.len() {
        return Err(format!("unexpected trailing input at position {}", parser.pos));
    }
    Ok(serde_json::json!({ "expression": req.expression, "result": result }))
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
}

impl Parser {
    fn new(input: &str) -> Self {
        Self { chars: input.chars().collect(), pos: 0 }
    }

    fn skip_whitespace(&mut self) {
        while self.pos < self.chars.len() && self.chars[self.pos].is_whitespace() {
            self.pos += 1;
        }
    }

    fn peek(&mut self) -> Option<char> {
        self.skip_whitespace();
        self.chars.get(self.pos).copied()
    }

    fn parse_expr(&mut self) -> Result<f64, String> {
        let mut value = self.parse_term()?;
        loop {
            match self.peek() {
                Some('+') => {
                    self.pos += 1;
                    value += self.parse_term()?;
                }
                Some('-') => {
                    self.pos += 1;
                    value -= self.parse_term()?;
                }
                _ => break,
            }
        }
        Ok(value)
    }

    fn parse_term(&mut self) -> Result<f64, String> {
        let mut value = self.parse_factor()?;
        loop {
            match self.peek() {
                Some('*') => {
                    self.pos += 1;
                    value *= self.parse_factor()?;
                }
                Some('/') => {
                    self.pos += 1;
                    let divisor = self.parse_factor()?;
                    if divisor == 0.0 {
                        return Err("division by zero".to_string());
                    }
                    value /= divisor;
                }
                _ => break,
            }
        }
        Ok(value)
    }

    fn parse_factor(&mut self) -> Result<f64, String> {
        match self.peek() {
            Some('-') => {
                self.pos += 1;
                Ok(-self.parse_factor()?)
            }
            Some('(') => {
                self.pos += 1;
                let value = self.parse_expr()?;
                match self.peek() {
                    Some(')') => {
                        self.pos += 1;
                        Ok(value)
                    }
                    _ => Err("expected closing parenthesis".to_string()),
                }
            }
            Some(c) if c.is_ascii_digit() || c == '.' => self.parse_number(),
            Some(c) => Err(format!("unexpected character '{c}' at position {}", self.pos)),
            None => Err("unexpected end of expression".to_string()),
        }
    }

    fn parse_number(&mut self) -> Result<f64, String> {
        self.skip_whitespace();
        let start = self.pos;
        while self.pos < self.chars.len() && (self.chars[self.pos].is_ascii_digit() || self.chars[self.pos] == '.') {
            self.pos += 1;
        }
        let literal: String = self.chars[start..self.pos].iter().collect();
        literal.parse::<f64>().map_err(|_| format!("invalid number literal '{literal}'"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn calc(expr: &str) -> f64 {
        calculate(CalculateRequest { expression: expr.to_string() }).unwrap()["result"]
            .as_f64()
            .unwrap()
    }

    #[test]
    fn basic_arithmetic() {
        assert_eq!(calc("2 + 3"), 5.0);
        assert_eq!(calc("10 - 4"), 6.0);
        assert_eq!(calc("6 * 7"), 42.0);
        assert_eq!(calc("9 / 2"), 4.5);
    }

    #[test]
    fn operator_precedence_and_parens() {
        assert_eq!(calc("2 + 3 * 4"), 14.0);
        assert_eq!(calc("(2 + 3) * 4"), 20.0);
    }

    #[test]
    fn unary_minus() {
        assert_eq!(calc("-5 + 3"), -2.0);
    }

    #[test]
    fn division_by_zero_is_an_error() {
        let err = calculate(CalculateRequest { expression: "1 / 0".into() }).unwrap_err();
        assert!(err.contains("division by zero"));
    }

    #[test]
    fn trailing_garbage_is_rejected() {
        let err = calculate(CalculateRequest { expression: "2 + 2 foo".into() }).unwrap_err();
        assert!(err.contains("unexpected"));
    }
}
