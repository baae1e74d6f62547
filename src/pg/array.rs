//! PostgreSQL array literals (`{1,2,NULL}`, `{{"a b",c},{d,e}}`).
//!
//! `parse` turns the text output of an array column into a nested
//! `PgValue::Array`; `format` builds a literal for a text-format parameter.

use super::error::{PgError, PgResult};
use super::types::{Oid, PgValue};

/// An element of an array parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum Element {
    Null,
    Text(String),
    Nested(Vec<Element>),
}

/// Build an array literal from elements.
///
/// Every non-null scalar is double-quoted so commas, braces, whitespace and
/// the word NULL survive as data.
pub fn format(elements: &[Element]) -> String {
    let mut out = String::with_capacity(2 + elements.len() * 4);
    write_elements(&mut out, elements);
    out
}

fn write_elements(out: &mut String, elements: &[Element]) {
    out.push('{');
    for (i, element) in elements.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        match element {
            Element::Null => out.push_str("NULL"),
            Element::Text(s) => {
                out.push('"');
                for c in s.chars() {
                    if c == '"' || c == '\\' {
                        out.push('\\');
                    }
                    out.push(c);
                }
                out.push('"');
            }
            Element::Nested(inner) => write_elements(out, inner),
        }
    }
    out.push('}');
}

/// Parse the text output of an array column whose elements have type `elem`.
pub fn parse(text: &str, elem: Oid) -> PgResult<PgValue> {
    // Arrays with non-default bounds carry a "[1:3]=" decoration
    let body = if text.starts_with('[') {
        match text.find('=') {
            Some(eq) => &text[eq + 1..],
            None => return Err(malformed(text)),
        }
    } else {
        text
    };

    let mut parser = Parser {
        src: body.as_bytes(),
        pos: 0,
        elem,
    };
    let value = parser.array()?;
    parser.skip_ws();
    if parser.pos != parser.src.len() {
        return Err(malformed(text));
    }
    Ok(value)
}

fn malformed(text: &str) -> PgError {
    PgError::Type(format!("Malformed array literal: {}", text))
}

struct Parser<'a> {
    src: &'a [u8],
    pos: usize,
    elem: Oid,
}

impl Parser<'_> {
    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(b) if b.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    fn error(&self) -> PgError {
        malformed(&String::from_utf8_lossy(self.src))
    }

    fn array(&mut self) -> PgResult<PgValue> {
        self.skip_ws();
        if self.peek() != Some(b'{') {
            return Err(self.error());
        }
        self.pos += 1;

        let mut items = Vec::new();
        self.skip_ws();
        if self.peek() == Some(b'}') {
            self.pos += 1;
            return Ok(PgValue::Array(items));
        }

        loop {
            self.skip_ws();
            let item = match self.peek() {
                Some(b'{') => self.array()?,
                Some(b'"') => {
                    let raw = self.quoted()?;
                    PgValue::decode_text(self.elem, &raw)?
                }
                Some(_) => self.unquoted()?,
                None => return Err(self.error()),
            };
            items.push(item);

            self.skip_ws();
            match self.peek() {
                Some(b',') => self.pos += 1,
                Some(b'}') => {
                    self.pos += 1;
                    return Ok(PgValue::Array(items));
                }
                _ => return Err(self.error()),
            }
        }
    }

    fn quoted(&mut self) -> PgResult<Vec<u8>> {
        // Skip the opening quote
        self.pos += 1;
        let mut out = Vec::new();
        loop {
            match self.peek() {
                Some(b'"') => {
                    self.pos += 1;
                    return Ok(out);
                }
                Some(b'\\') => {
                    let escaped = self.src.get(self.pos + 1).copied().ok_or_else(|| self.error())?;
                    out.push(escaped);
                    self.pos += 2;
                }
                Some(b) => {
                    out.push(b);
                    self.pos += 1;
                }
                None => return Err(self.error()),
            }
        }
    }

    fn unquoted(&mut self) -> PgResult<PgValue> {
        let start = self.pos;
        while !matches!(self.peek(), Some(b',') | Some(b'}') | None) {
            self.pos += 1;
        }
        let raw = self.src[start..self.pos].trim_ascii();
        if raw.eq_ignore_ascii_case(b"NULL") {
            return Ok(PgValue::Null);
        }
        PgValue::decode_text(self.elem, raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_int_array_with_null() {
        let value = parse("{1,NULL,3}", Oid::INT4).unwrap();
        assert_eq!(
            value,
            PgValue::Array(vec![PgValue::Int4(1), PgValue::Null, PgValue::Int4(3)])
        );
    }

    #[test]
    fn test_parse_quoted_text() {
        let value = parse(r#"{"a,b","say \"hi\"",plain,"NULL"}"#, Oid::TEXT).unwrap();
        assert_eq!(
            value,
            PgValue::Array(vec![
                PgValue::Text("a,b".to_string()),
                PgValue::Text("say \"hi\"".to_string()),
                PgValue::Text("plain".to_string()),
                PgValue::Text("NULL".to_string()),
            ])
        );
    }

    #[test]
    fn test_parse_nested_and_bounds() {
        let value = parse("[0:1][1:2]={{1,2},{3,4}}", Oid::INT8).unwrap();
        assert_eq!(
            value,
            PgValue::Array(vec![
                PgValue::Array(vec![PgValue::Int8(1), PgValue::Int8(2)]),
                PgValue::Array(vec![PgValue::Int8(3), PgValue::Int8(4)]),
            ])
        );
        assert_eq!(parse("{}", Oid::INT4).unwrap(), PgValue::Array(vec![]));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse("{1,2", Oid::INT4).is_err());
        assert!(parse("1,2}", Oid::INT4).is_err());
        assert!(parse("{1}x", Oid::INT4).is_err());
    }

    #[test]
    fn test_format_quotes_everything() {
        let literal = format(&[
            Element::Text("1".to_string()),
            Element::Null,
            Element::Text("a \"b\"\\c".to_string()),
            Element::Nested(vec![Element::Text("x,y".to_string())]),
        ]);
        assert_eq!(literal, r#"{"1",NULL,"a \"b\"\\c",{"x,y"}}"#);
    }
}
