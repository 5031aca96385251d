//! Permissive literal-expression decoding
//!
//! Accepts the literal display syntax that export tools produce when they dump
//! an in-memory dictionary with `repr` instead of a JSON encoder:
//!
//! - dict, list and tuple displays, trailing commas allowed
//! - single, double and triple quoted strings with `r`/`u`/`b` prefixes,
//!   escape sequences and implicit concatenation of adjacent strings
//! - integers (with `_` separators and `0x`/`0o`/`0b` radixes), floats, signs
//! - `True`/`False`/`None` and the JSON spellings `true`/`false`/`null`
//! - unquoted identifier keys such as `{city: 'Reno'}`

use super::{DecodeError, DecodeStrategy, MAX_DEPTH};
use serde_json::{Map, Number, Value};

/// Second-priority strategy: literal mapping expressions
#[derive(Debug, Default, Clone, Copy)]
pub struct LiteralStrategy;

impl DecodeStrategy for LiteralStrategy {
    fn name(&self) -> &'static str {
        "literal"
    }

    fn decode(&self, text: &str) -> Result<Value, DecodeError> {
        LiteralParser::new(text).parse_document()
    }
}

struct LiteralParser<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> LiteralParser<'a> {
    fn new(src: &'a str) -> Self {
        LiteralParser { src, pos: 0 }
    }

    fn parse_document(mut self) -> Result<Value, DecodeError> {
        self.skip_ws();
        let value = self.parse_value(0)?;
        self.skip_ws();
        if self.pos < self.src.len() {
            return Err(self.error("unexpected trailing input"));
        }
        Ok(value)
    }

    fn error(&self, message: impl Into<String>) -> DecodeError {
        DecodeError::at(message, self.pos)
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn peek_nth(&self, n: usize) -> Option<char> {
        self.rest().chars().nth(n)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.pos += expected.len_utf8();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: char) -> Result<(), DecodeError> {
        if self.eat(expected) {
            Ok(())
        } else {
            match self.peek() {
                Some(c) => Err(self.error(format!("expected '{}', found '{}'", expected, c))),
                None => Err(self.error(format!("expected '{}', found end of input", expected))),
            }
        }
    }

    fn skip_ws(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.pos += c.len_utf8();
            } else {
                break;
            }
        }
    }

    fn parse_value(&mut self, depth: usize) -> Result<Value, DecodeError> {
        if depth > MAX_DEPTH {
            return Err(self.error("nesting too deep"));
        }

        match self.peek() {
            None => Err(self.error("unexpected end of input")),
            Some('{') => self.parse_dict(depth),
            Some('[') => self.parse_sequence(depth, '[', ']'),
            Some('(') => self.parse_sequence(depth, '(', ')'),
            Some(_) if self.at_string_start() => self.parse_strings().map(Value::String),
            Some(c) if c.is_ascii_digit() || matches!(c, '-' | '+' | '.') => self.parse_number(),
            Some(c) if is_ident_start(c) => {
                let start = self.pos;
                let word = self.parse_identifier();
                match word {
                    "True" | "true" => Ok(Value::Bool(true)),
                    "False" | "false" => Ok(Value::Bool(false)),
                    "None" | "null" => Ok(Value::Null),
                    _ => Err(DecodeError::at(format!("unexpected bare word '{}'", word), start)),
                }
            }
            Some(c) => Err(self.error(format!("unexpected character '{}'", c))),
        }
    }

    fn parse_dict(&mut self, depth: usize) -> Result<Value, DecodeError> {
        self.expect('{')?;
        let mut map = Map::new();

        loop {
            self.skip_ws();
            if self.eat('}') {
                break;
            }

            let key = self.parse_key()?;
            self.skip_ws();
            self.expect(':')?;
            self.skip_ws();
            let value = self.parse_value(depth + 1)?;
            // Later duplicates win, like evaluating the display would
            map.insert(key, value);

            self.skip_ws();
            if self.eat(',') {
                continue;
            }
            self.expect('}')?;
            break;
        }

        Ok(Value::Object(map))
    }

    fn parse_key(&mut self) -> Result<String, DecodeError> {
        match self.peek() {
            Some(_) if self.at_string_start() => self.parse_strings(),
            Some(c) if c.is_ascii_digit() || c == '-' || c == '+' || c == '.' => {
                match self.parse_number()? {
                    Value::Number(n) => Ok(n.to_string()),
                    _ => Err(self.error("invalid numeric key")),
                }
            }
            Some(c) if is_ident_start(c) => Ok(self.parse_identifier().to_string()),
            Some(c) => Err(self.error(format!("unexpected character '{}' in key", c))),
            None => Err(self.error("unexpected end of input in key")),
        }
    }

    /// Lists and tuples; a parenthesized single value without a comma is just that value
    fn parse_sequence(
        &mut self,
        depth: usize,
        open: char,
        close: char,
    ) -> Result<Value, DecodeError> {
        self.expect(open)?;
        let mut items = Vec::new();
        let mut saw_comma = false;

        loop {
            self.skip_ws();
            if self.eat(close) {
                break;
            }

            items.push(self.parse_value(depth + 1)?);

            self.skip_ws();
            if self.eat(',') {
                saw_comma = true;
                continue;
            }
            self.expect(close)?;
            break;
        }

        if open == '(' && items.len() == 1 && !saw_comma {
            return Ok(items.remove(0));
        }
        Ok(Value::Array(items))
    }

    fn at_string_start(&self) -> bool {
        let mut chars = self.rest().chars();
        for _ in 0..3 {
            match chars.next() {
                Some('\'') | Some('"') => return true,
                Some(c) if matches!(c.to_ascii_lowercase(), 'r' | 'u' | 'b') => continue,
                _ => return false,
            }
        }
        false
    }

    /// One or more adjacent string literals, concatenated
    fn parse_strings(&mut self) -> Result<String, DecodeError> {
        let mut out = self.parse_string()?;
        loop {
            let checkpoint = self.pos;
            self.skip_ws();
            if self.at_string_start() {
                out.push_str(&self.parse_string()?);
            } else {
                self.pos = checkpoint;
                return Ok(out);
            }
        }
    }

    fn parse_string(&mut self) -> Result<String, DecodeError> {
        let start = self.pos;
        let mut raw = false;
        while let Some(c) = self.peek() {
            match c.to_ascii_lowercase() {
                'r' => raw = true,
                'u' | 'b' => {}
                _ => break,
            }
            self.pos += 1;
        }

        let quote = match self.bump() {
            Some(q @ ('\'' | '"')) => q,
            _ => return Err(DecodeError::at("expected string quote", start)),
        };
        let triple = self.peek() == Some(quote) && self.peek_nth(1) == Some(quote);
        if triple {
            self.pos += 2;
        }

        let mut out = String::new();
        loop {
            let c = match self.bump() {
                Some(c) => c,
                None => return Err(DecodeError::at("unterminated string", start)),
            };

            if c == quote {
                if !triple {
                    return Ok(out);
                }
                if self.peek() == Some(quote) && self.peek_nth(1) == Some(quote) {
                    self.pos += 2;
                    return Ok(out);
                }
                out.push(c);
                continue;
            }

            if c == '\n' && !triple {
                return Err(DecodeError::at("newline in single-quoted string", start));
            }

            if c != '\\' {
                out.push(c);
                continue;
            }

            if raw {
                // Raw strings keep the backslash; an escaped quote does not terminate
                out.push('\\');
                if let Some(next) = self.bump() {
                    out.push(next);
                }
                continue;
            }

            self.parse_escape(&mut out)?;
        }
    }

    fn parse_escape(&mut self, out: &mut String) -> Result<(), DecodeError> {
        let escape_at = self.pos - 1;
        let c = match self.bump() {
            Some(c) => c,
            None => return Err(DecodeError::at("unterminated escape", escape_at)),
        };

        match c {
            '\n' => {}
            '\\' => out.push('\\'),
            '\'' => out.push('\''),
            '"' => out.push('"'),
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            '0' => out.push('\0'),
            'a' => out.push('\u{07}'),
            'b' => out.push('\u{08}'),
            'f' => out.push('\u{0c}'),
            'v' => out.push('\u{0b}'),
            'x' => out.push(self.parse_hex_escape(2, escape_at)?),
            'u' => out.push(self.parse_hex_escape(4, escape_at)?),
            'U' => out.push(self.parse_hex_escape(8, escape_at)?),
            other => {
                // Unknown escapes are kept verbatim
                out.push('\\');
                out.push(other);
            }
        }
        Ok(())
    }

    fn parse_hex_escape(&mut self, digits: usize, escape_at: usize) -> Result<char, DecodeError> {
        let rest = self.rest();
        let hex = rest
            .get(..digits)
            .filter(|h| h.chars().all(|c| c.is_ascii_hexdigit()))
            .ok_or_else(|| DecodeError::at("truncated hex escape", escape_at))?;
        let code = u32::from_str_radix(hex, 16)
            .map_err(|_| DecodeError::at("invalid hex escape", escape_at))?;
        self.pos += digits;
        char::from_u32(code)
            .ok_or_else(|| DecodeError::at("escape is not a valid code point", escape_at))
    }

    fn parse_number(&mut self) -> Result<Value, DecodeError> {
        let start = self.pos;
        let negative = if self.eat('-') {
            true
        } else {
            self.eat('+');
            false
        };

        let radix = match (self.peek(), self.peek_nth(1).map(|c| c.to_ascii_lowercase())) {
            (Some('0'), Some('x')) => Some(16),
            (Some('0'), Some('o')) => Some(8),
            (Some('0'), Some('b')) => Some(2),
            _ => None,
        };

        if let Some(radix) = radix {
            self.pos += 2;
            let digits_start = self.pos;
            while matches!(self.peek(), Some(c) if c.is_digit(radix) || c == '_') {
                self.pos += 1;
            }
            let digits: String =
                self.src[digits_start..self.pos].chars().filter(|c| *c != '_').collect();
            let magnitude = i64::from_str_radix(&digits, radix)
                .map_err(|e| DecodeError::at(format!("invalid integer: {}", e), start))?;
            return Ok(Value::Number(Number::from(if negative { -magnitude } else { magnitude })));
        }

        let body_start = self.pos;
        let mut is_float = false;
        while let Some(c) = self.peek() {
            match c {
                '0'..='9' | '_' => self.pos += 1,
                '.' => {
                    is_float = true;
                    self.pos += 1;
                }
                'e' | 'E' => {
                    is_float = true;
                    self.pos += 1;
                    if matches!(self.peek(), Some('+') | Some('-')) {
                        self.pos += 1;
                    }
                }
                _ => break,
            }
        }

        if matches!(self.peek(), Some(c) if c == 'j' || c == 'J' || is_ident_start(c)) {
            return Err(DecodeError::at("invalid numeric literal", start));
        }

        let body: String = self.src[body_start..self.pos].chars().filter(|c| *c != '_').collect();
        if body.is_empty() || body == "." {
            return Err(DecodeError::at("invalid numeric literal", start));
        }
        // `0` and `00` are fine, `01234` is not
        if !is_float && body.starts_with('0') && body.bytes().any(|b| b != b'0') {
            return Err(DecodeError::at(
                "leading zeros in decimal integer literals are not permitted",
                start,
            ));
        }
        let text = if negative { format!("-{}", body) } else { body };

        if !is_float {
            if let Ok(n) = text.parse::<i64>() {
                return Ok(Value::Number(Number::from(n)));
            }
            if let Ok(n) = text.parse::<u64>() {
                return Ok(Value::Number(Number::from(n)));
            }
        }

        let float: f64 = text
            .parse()
            .map_err(|_| DecodeError::at(format!("invalid numeric literal '{}'", text), start))?;
        Number::from_f64(float)
            .map(Value::Number)
            .ok_or_else(|| DecodeError::at("non-finite number", start))
    }

    fn parse_identifier(&mut self) -> &'a str {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c == '_' || c.is_alphanumeric() {
                self.pos += c.len_utf8();
            } else {
                break;
            }
        }
        &self.src[start..self.pos]
    }
}

fn is_ident_start(c: char) -> bool {
    c == '_' || c.is_alphabetic()
}
