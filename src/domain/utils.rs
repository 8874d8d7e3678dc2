//! Domain-specific shared validations and formatting utilities

use std::path::{Component, Path, PathBuf};

use crate::errors::HandlerError;

pub const MAX_BODY_PREVIEW_CHARS: usize = 1_000;
pub const MAX_EXPRESSION_LEN: usize = 256;

/// Joins `requested` onto `root`, refusing absolute paths and any `..` that would
/// climb above `root`.
pub fn resolve_sandboxed(root: &Path, requested: &str) -> Result<PathBuf, HandlerError> {
    let trimmed = requested.trim();
    if trimmed.is_empty() {
        return Err(HandlerError::InvalidInput("path must not be empty".to_string()));
    }

    let mut relative = PathBuf::new();
    for component in Path::new(trimmed).components() {
        match component {
            Component::Normal(part) => relative.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                if !relative.pop() {
                    return Err(HandlerError::InvalidInput(format!(
                        "path escapes the file root: {trimmed}"
                    )));
                }
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(HandlerError::InvalidInput(format!(
                    "absolute paths are not allowed: {trimmed}"
                )));
            }
        }
    }

    Ok(root.join(relative))
}

pub fn truncate_chars(text: &str, limit: usize) -> (String, bool) {
    let mut chars = text.chars();
    let preview = chars.by_ref().take(limit).collect::<String>();
    let truncated = chars.next().is_some();
    (preview, truncated)
}

/// Formats a calculation result without a trailing `.0` for whole numbers.
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

/// Reads `MemTotal` and `MemAvailable` (in bytes) from `/proc/meminfo` text.
pub fn parse_meminfo(text: &str) -> (Option<u64>, Option<u64>) {
    let field = |name: &str| {
        text.lines()
            .find_map(|line| line.strip_prefix(name))
            .and_then(|rest| rest.trim_start_matches(':').split_whitespace().next())
            .and_then(|kib| kib.parse::<u64>().ok())
            .map(|kib| kib * 1024)
    };
    (field("MemTotal"), field("MemAvailable"))
}

/// Reads the first field of `/proc/uptime` as whole seconds.
pub fn parse_uptime(text: &str) -> Option<u64> {
    text.split_whitespace()
        .next()
        .and_then(|seconds| seconds.parse::<f64>().ok())
        .map(|seconds| seconds as u64)
}

/// Evaluates an arithmetic expression over `+ - * /`, parentheses, unary minus and
/// decimal literals.
pub fn evaluate_expression(expression: &str) -> Result<f64, HandlerError> {
    if expression.len() > MAX_EXPRESSION_LEN {
        return Err(HandlerError::Calculation(format!(
            "expression must not exceed {MAX_EXPRESSION_LEN} characters"
        )));
    }
    if let Some(invalid) = expression
        .chars()
        .find(|character| !(character.is_ascii_digit() || "+-*/(). ".contains(*character)))
    {
        return Err(HandlerError::Calculation(format!(
            "character not allowed in expression: {invalid:?}"
        )));
    }

    let tokens = tokenize(expression)?;
    let mut parser = ExpressionParser { tokens, position: 0 };
    let value = parser.expression(0)?;
    if parser.position != parser.tokens.len() {
        return Err(HandlerError::Calculation("unexpected trailing input".to_string()));
    }
    if !value.is_finite() {
        return Err(HandlerError::Calculation("result is not a finite number".to_string()));
    }
    Ok(value)
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Token {
    Number(f64),
    Operator(char),
    Open,
    Close,
}

fn tokenize(expression: &str) -> Result<Vec<Token>, HandlerError> {
    let mut tokens = Vec::new();
    let mut chars = expression.char_indices().peekable();

    while let Some((start, character)) = chars.next() {
        match character {
            ' ' => {}
            '(' => tokens.push(Token::Open),
            ')' => tokens.push(Token::Close),
            '+' | '-' | '*' | '/' => tokens.push(Token::Operator(character)),
            _ => {
                let mut end = start + character.len_utf8();
                while let Some(&(index, next)) = chars.peek() {
                    if next.is_ascii_digit() || next == '.' {
                        end = index + next.len_utf8();
                        chars.next();
                    } else {
                        break;
                    }
                }
                let literal = &expression[start..end];
                let number = literal.parse::<f64>().map_err(|_| {
                    HandlerError::Calculation(format!("invalid number: {literal}"))
                })?;
                tokens.push(Token::Number(number));
            }
        }
    }

    Ok(tokens)
}

struct ExpressionParser {
    tokens: Vec<Token>,
    position: usize,
}

impl ExpressionParser {
    fn peek(&self) -> Option<Token> {
        self.tokens.get(self.position).copied()
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.peek();
        self.position += 1;
        token
    }

    // Precedence climbing: 1 for additive, 2 for multiplicative operators.
    fn expression(&mut self, min_precedence: u8) -> Result<f64, HandlerError> {
        let mut left = self.unary()?;

        while let Some(Token::Operator(operator)) = self.peek() {
            let precedence = if matches!(operator, '*' | '/') { 2 } else { 1 };
            if precedence <= min_precedence {
                break;
            }
            self.position += 1;
            let right = self.expression(precedence)?;
            left = match operator {
                '+' => left + right,
                '-' => left - right,
                '*' => left * right,
                _ => {
                    if right == 0.0 {
                        return Err(HandlerError::Calculation("division by zero".to_string()));
                    }
                    left / right
                }
            };
        }

        Ok(left)
    }

    fn unary(&mut self) -> Result<f64, HandlerError> {
        match self.next() {
            Some(Token::Operator('-')) => Ok(-self.unary()?),
            Some(Token::Operator('+')) => self.unary(),
            Some(Token::Number(value)) => Ok(value),
            Some(Token::Open) => {
                let value = self.expression(0)?;
                match self.next() {
                    Some(Token::Close) => Ok(value),
                    _ => Err(HandlerError::Calculation("unbalanced parentheses".to_string())),
                }
            }
            Some(_) => Err(HandlerError::Calculation("unexpected token".to_string())),
            None => Err(HandlerError::Calculation("unexpected end of expression".to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evaluates_with_precedence_and_parentheses() {
        assert_eq!(evaluate_expression("2 + 3 * 4").expect("valid"), 14.0);
        assert_eq!(evaluate_expression("(2 + 3) * 4").expect("valid"), 20.0);
        assert_eq!(evaluate_expression("10 - 4 - 3").expect("valid"), 3.0);
        assert_eq!(evaluate_expression("8 / 2 / 2").expect("valid"), 2.0);
        assert_eq!(evaluate_expression("-3 + 5").expect("valid"), 2.0);
        assert_eq!(evaluate_expression("1.5 * 2").expect("valid"), 3.0);
    }

    #[test]
    fn rejects_disallowed_characters() {
        let error = evaluate_expression("__import__('os')").expect_err("letters rejected");
        assert!(error.to_string().contains("not allowed"));
    }

    #[test]
    fn rejects_division_by_zero() {
        let error = evaluate_expression("1 / (2 - 2)").expect_err("division by zero");
        assert_eq!(error.to_string(), "Calculation error: division by zero");
    }

    #[test]
    fn rejects_malformed_expressions() {
        assert!(evaluate_expression("(1 + 2").is_err());
        assert!(evaluate_expression("1 +").is_err());
        assert!(evaluate_expression("1 2").is_err());
        assert!(evaluate_expression("1..2").is_err());
        assert!(evaluate_expression("").is_err());
    }

    #[test]
    fn formats_whole_numbers_without_fraction() {
        assert_eq!(format_number(14.0), "14");
        assert_eq!(format_number(-2.0), "-2");
        assert_eq!(format_number(0.25), "0.25");
    }

    #[test]
    fn sandbox_keeps_paths_under_root() {
        let root = Path::new("/srv/data");
        assert_eq!(
            resolve_sandboxed(root, "notes/../todo.txt").expect("inside root"),
            PathBuf::from("/srv/data/todo.txt")
        );
        assert_eq!(
            resolve_sandboxed(root, ".").expect("root itself"),
            PathBuf::from("/srv/data")
        );
    }

    #[test]
    fn sandbox_rejects_escapes_and_absolute_paths() {
        let root = Path::new("/srv/data");
        assert!(resolve_sandboxed(root, "../etc/passwd").is_err());
        assert!(resolve_sandboxed(root, "a/../../b").is_err());
        assert!(resolve_sandboxed(root, "/etc/passwd").is_err());
        assert!(resolve_sandboxed(root, "   ").is_err());
    }

    #[test]
    fn truncates_on_char_boundaries() {
        let (preview, truncated) = truncate_chars("héllo", 2);
        assert_eq!(preview, "hé");
        assert!(truncated);

        let (preview, truncated) = truncate_chars("hi", 2);
        assert_eq!(preview, "hi");
        assert!(!truncated);
    }

    #[test]
    fn parses_proc_files() {
        let meminfo = "MemTotal:       16303428 kB\nMemFree:  1000 kB\nMemAvailable:   8000000 kB\n";
        assert_eq!(
            parse_meminfo(meminfo),
            (Some(16_303_428 * 1024), Some(8_000_000 * 1024))
        );
        assert_eq!(parse_uptime("12345.67 54321.00\n"), Some(12_345));
        assert_eq!(parse_uptime(""), None);
    }
}
