//! Structural limits checked on the raw text before parsing.
//!
//! The parsed tree is walked, cloned, printed and dropped recursively, so its
//! depth must stay bounded. Depth comes from bracket nesting and from chains
//! of operators, and both are counted here without building anything.

use crate::domain::errors::QueryError;

/// Deepest allowed `(`/`[` nesting.
pub const MAX_NESTING: usize = 64;

/// Most operators allowed outside label matchers.
pub const MAX_OPERATORS: usize = 256;

const OPERATOR_CHARS: &[char] = &['+', '-', '*', '/', '%', '^', '=', '!', '<', '>'];
const OPERATOR_WORDS: &[&str] = &["and", "or", "unless", "atan2"];

#[derive(Default)]
struct Scan {
    depth: usize,
    operators: usize,
    in_braces: bool,
    in_comment: bool,
    quote: Option<char>,
    escaped: bool,
    word: String,
}

impl Scan {
    fn end_word(&mut self) {
        if !self.in_braces
            && OPERATOR_WORDS
                .iter()
                .any(|op| op.eq_ignore_ascii_case(&self.word))
        {
            self.operators += 1;
        }
        self.word.clear();
    }

    fn push(&mut self, c: char) -> Result<(), QueryError> {
        if let Some(quote) = self.quote {
            if self.escaped {
                self.escaped = false;
            } else if c == '\\' && quote != '`' {
                self.escaped = true;
            } else if c == quote {
                self.quote = None;
            }
            return Ok(());
        }
        if self.in_comment {
            self.in_comment = c != '\n';
            return Ok(());
        }
        if c.is_ascii_alphanumeric() || c == '_' || c == ':' || c == '.' {
            self.word.push(c);
            return Ok(());
        }

        self.end_word();
        match c {
            '"' | '\'' | '`' => self.quote = Some(c),
            '#' => self.in_comment = true,
            '{' => self.in_braces = true,
            '}' => self.in_braces = false,
            '(' | '[' => {
                self.depth += 1;
                if self.depth > MAX_NESTING {
                    return Err(QueryError::TooComplex {
                        what: "levels of nesting",
                        limit: MAX_NESTING,
                    });
                }
            }
            ')' | ']' => self.depth = self.depth.saturating_sub(1),
            c if !self.in_braces && OPERATOR_CHARS.contains(&c) => self.operators += 1,
            _ => {}
        }
        Ok(())
    }
}

/// Reject text whose parse tree would be deeper than the limits allow.
pub fn check(text: &str) -> Result<(), QueryError> {
    let mut scan = Scan::default();
    for c in text.chars() {
        scan.push(c)?;
    }
    scan.end_word();

    if scan.operators > MAX_OPERATORS {
        return Err(QueryError::TooComplex {
            what: "operators",
            limit: MAX_OPERATORS,
        });
    }
    Ok(())
}
