//! PostgreSQL type decoding.
//!
//! The bridge requests every result column in text format and decodes it by
//! the column's type OID into a `PgValue`, which serializes to the JSON shape
//! callers expect (numbers stay numbers, NULL stays null).
//! Reference: https://www.postgresql.org/docs/current/datatype.html

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat};
use serde::ser::{Serialize, SerializeSeq, Serializer};
use serde_json::value::RawValue;
use uuid::Uuid;

use super::array;
use super::error::{PgError, PgResult};

// ============================================================================
// Type OIDs
// ============================================================================

/// PostgreSQL type object identifiers (OIDs).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Oid(pub i32);

impl Oid {
    /// Lets the server infer a parameter's type.
    pub const UNSPECIFIED: Oid = Oid(0);

    pub const BOOL: Oid = Oid(16);
    pub const BYTEA: Oid = Oid(17);
    pub const CHAR: Oid = Oid(18);
    pub const NAME: Oid = Oid(19);
    pub const INT8: Oid = Oid(20);
    pub const INT2: Oid = Oid(21);
    pub const INT4: Oid = Oid(23);
    pub const TEXT: Oid = Oid(25);
    pub const OID_TYPE: Oid = Oid(26);
    pub const JSON: Oid = Oid(114);
    pub const FLOAT4: Oid = Oid(700);
    pub const FLOAT8: Oid = Oid(701);
    pub const BPCHAR: Oid = Oid(1042);
    pub const VARCHAR: Oid = Oid(1043);
    pub const DATE: Oid = Oid(1082);
    pub const TIME: Oid = Oid(1083);
    pub const TIMESTAMP: Oid = Oid(1114);
    pub const TIMESTAMPTZ: Oid = Oid(1184);
    pub const NUMERIC: Oid = Oid(1700);
    pub const UUID: Oid = Oid(2950);
    pub const JSONB: Oid = Oid(3802);

    // Array types
    pub const JSON_ARRAY: Oid = Oid(199);
    pub const BOOL_ARRAY: Oid = Oid(1000);
    pub const BYTEA_ARRAY: Oid = Oid(1001);
    pub const CHAR_ARRAY: Oid = Oid(1002);
    pub const NAME_ARRAY: Oid = Oid(1003);
    pub const INT2_ARRAY: Oid = Oid(1005);
    pub const INT4_ARRAY: Oid = Oid(1007);
    pub const TEXT_ARRAY: Oid = Oid(1009);
    pub const BPCHAR_ARRAY: Oid = Oid(1014);
    pub const VARCHAR_ARRAY: Oid = Oid(1015);
    pub const INT8_ARRAY: Oid = Oid(1016);
    pub const FLOAT4_ARRAY: Oid = Oid(1021);
    pub const FLOAT8_ARRAY: Oid = Oid(1022);
    pub const OID_ARRAY: Oid = Oid(1028);
    pub const TIMESTAMP_ARRAY: Oid = Oid(1115);
    pub const DATE_ARRAY: Oid = Oid(1182);
    pub const TIME_ARRAY: Oid = Oid(1183);
    pub const TIMESTAMPTZ_ARRAY: Oid = Oid(1185);
    pub const NUMERIC_ARRAY: Oid = Oid(1231);
    pub const UUID_ARRAY: Oid = Oid(2951);
    pub const JSONB_ARRAY: Oid = Oid(3807);

    /// Create from raw i32 value
    #[inline]
    pub fn from_i32(oid: i32) -> Self {
        Oid(oid)
    }

    /// Get the raw i32 value
    #[inline]
    pub fn as_i32(self) -> i32 {
        self.0
    }

    /// Element type of a known array type.
    pub fn array_element(self) -> Option<Oid> {
        let elem = match self {
            Oid::JSON_ARRAY => Oid::JSON,
            Oid::BOOL_ARRAY => Oid::BOOL,
            Oid::BYTEA_ARRAY => Oid::BYTEA,
            Oid::CHAR_ARRAY => Oid::CHAR,
            Oid::NAME_ARRAY => Oid::NAME,
            Oid::INT2_ARRAY => Oid::INT2,
            Oid::INT4_ARRAY => Oid::INT4,
            Oid::TEXT_ARRAY => Oid::TEXT,
            Oid::BPCHAR_ARRAY => Oid::BPCHAR,
            Oid::VARCHAR_ARRAY => Oid::VARCHAR,
            Oid::INT8_ARRAY => Oid::INT8,
            Oid::FLOAT4_ARRAY => Oid::FLOAT4,
            Oid::FLOAT8_ARRAY => Oid::FLOAT8,
            Oid::OID_ARRAY => Oid::OID_TYPE,
            Oid::TIMESTAMP_ARRAY => Oid::TIMESTAMP,
            Oid::DATE_ARRAY => Oid::DATE,
            Oid::TIME_ARRAY => Oid::TIME,
            Oid::TIMESTAMPTZ_ARRAY => Oid::TIMESTAMPTZ,
            Oid::NUMERIC_ARRAY => Oid::NUMERIC,
            Oid::UUID_ARRAY => Oid::UUID,
            Oid::JSONB_ARRAY => Oid::JSONB,
            _ => return None,
        };
        Some(elem)
    }
}

// ============================================================================
// PostgreSQL Values
// ============================================================================

/// A decoded column value.
#[derive(Debug, Clone, PartialEq)]
pub enum PgValue {
    Null,
    Bool(bool),
    Int2(i16),
    Int4(i32),
    Int8(i64),
    Float4(f32),
    Float8(f64),
    /// Exact decimal text as sent by the server.
    Numeric(String),
    Text(String),
    Bytea(Vec<u8>),
    Uuid(Uuid),
    Date(NaiveDate),
    Time(NaiveTime),
    Timestamp(NaiveDateTime),
    TimestampTz(DateTime<FixedOffset>),
    Json(serde_json::Value),
    Array(Vec<PgValue>),
}

impl PgValue {
    /// Check if this value is NULL
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, PgValue::Null)
    }

    /// Decode a column value from text format.
    ///
    /// Values whose text does not match the expected shape for their type
    /// (e.g. `infinity` timestamps) fall back to `Text` rather than failing.
    pub fn decode_text(oid: Oid, data: &[u8]) -> PgResult<Self> {
        let text = std::str::from_utf8(data)
            .map_err(|e| PgError::Type(format!("Invalid UTF-8 in column value: {}", e)))?;

        let value = match oid {
            Oid::BOOL => match text {
                "t" | "true" => PgValue::Bool(true),
                "f" | "false" => PgValue::Bool(false),
                _ => return Err(PgError::Type(format!("Invalid BOOL: {}", text))),
            },

            Oid::INT2 => text
                .parse::<i16>()
                .map(PgValue::Int2)
                .map_err(|e| PgError::Type(format!("Invalid INT2: {}", e)))?,

            Oid::INT4 => text
                .parse::<i32>()
                .map(PgValue::Int4)
                .map_err(|e| PgError::Type(format!("Invalid INT4: {}", e)))?,

            Oid::INT8 | Oid::OID_TYPE => text
                .parse::<i64>()
                .map(PgValue::Int8)
                .map_err(|e| PgError::Type(format!("Invalid INT8: {}", e)))?,

            Oid::FLOAT4 => text
                .parse::<f32>()
                .map(PgValue::Float4)
                .map_err(|e| PgError::Type(format!("Invalid FLOAT4: {}", e)))?,

            Oid::FLOAT8 => text
                .parse::<f64>()
                .map(PgValue::Float8)
                .map_err(|e| PgError::Type(format!("Invalid FLOAT8: {}", e)))?,

            Oid::NUMERIC => PgValue::Numeric(text.to_string()),

            Oid::BYTEA => PgValue::Bytea(decode_bytea(text)?),

            Oid::UUID => Uuid::parse_str(text)
                .map(PgValue::Uuid)
                .map_err(|e| PgError::Type(format!("Invalid UUID: {}", e)))?,

            Oid::DATE => NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .map(PgValue::Date)
                .unwrap_or_else(|_| PgValue::Text(text.to_string())),

            Oid::TIME => NaiveTime::parse_from_str(text, "%H:%M:%S%.f")
                .map(PgValue::Time)
                .unwrap_or_else(|_| PgValue::Text(text.to_string())),

            Oid::TIMESTAMP => NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f")
                .map(PgValue::Timestamp)
                .unwrap_or_else(|_| PgValue::Text(text.to_string())),

            Oid::TIMESTAMPTZ => DateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f%#z")
                .map(PgValue::TimestampTz)
                .unwrap_or_else(|_| PgValue::Text(text.to_string())),

            Oid::JSON | Oid::JSONB => serde_json::from_str(text)
                .map(PgValue::Json)
                .unwrap_or_else(|_| PgValue::Text(text.to_string())),

            _ => match oid.array_element() {
                Some(elem) => array::parse(text, elem)?,
                None => PgValue::Text(text.to_string()),
            },
        };

        Ok(value)
    }
}

/// Decode the `bytea` hex output format (`\x0a0b`), falling back to the
/// legacy escape format.
fn decode_bytea(text: &str) -> PgResult<Vec<u8>> {
    if let Some(hex) = text.strip_prefix("\\x") {
        if hex.len() % 2 != 0 || !hex.is_ascii() {
            return Err(PgError::Type("Malformed BYTEA hex".to_string()));
        }
        return (0..hex.len())
            .step_by(2)
            .map(|i| {
                u8::from_str_radix(&hex[i..i + 2], 16)
                    .map_err(|e| PgError::Type(format!("Invalid BYTEA hex: {}", e)))
            })
            .collect();
    }

    let bytes = text.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' {
            if bytes.get(i + 1) == Some(&b'\\') {
                out.push(b'\\');
                i += 2;
                continue;
            }
            let octal = text
                .get(i + 1..i + 4)
                .and_then(|s| u8::from_str_radix(s, 8).ok())
                .ok_or_else(|| PgError::Type("Invalid BYTEA escape".to_string()))?;
            out.push(octal);
            i += 4;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    Ok(out)
}

fn serialize_float<S: Serializer>(v: f64, serializer: S) -> Result<S::Ok, S::Error> {
    if v.is_nan() {
        serializer.serialize_str("NaN")
    } else if v.is_infinite() {
        serializer.serialize_str(if v > 0.0 { "Infinity" } else { "-Infinity" })
    } else {
        serializer.serialize_f64(v)
    }
}

impl Serialize for PgValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            PgValue::Null => serializer.serialize_unit(),
            PgValue::Bool(v) => serializer.serialize_bool(*v),
            PgValue::Int2(v) => serializer.serialize_i16(*v),
            PgValue::Int4(v) => serializer.serialize_i32(*v),
            PgValue::Int8(v) => serializer.serialize_i64(*v),
            PgValue::Float4(v) if v.is_finite() => serializer.serialize_f32(*v),
            PgValue::Float4(v) => serialize_float(*v as f64, serializer),
            PgValue::Float8(v) => serialize_float(*v, serializer),
            PgValue::Numeric(text) => match text.as_str() {
                "NaN" | "Infinity" | "-Infinity" => serializer.serialize_str(text),
                // Emit the server's exact digits as a JSON number
                _ => match RawValue::from_string(text.clone()) {
                    Ok(raw) => raw.serialize(serializer),
                    Err(_) => serializer.serialize_str(text),
                },
            },
            PgValue::Text(s) => serializer.serialize_str(s),
            PgValue::Bytea(b) => serializer.serialize_str(&BASE64.encode(b)),
            PgValue::Uuid(u) => serializer.collect_str(&u.hyphenated()),
            PgValue::Date(d) => serializer.collect_str(&d.format("%Y-%m-%d")),
            PgValue::Time(t) => serializer.collect_str(&t.format("%H:%M:%S%.f")),
            PgValue::Timestamp(ts) => serializer.collect_str(&ts.format("%Y-%m-%dT%H:%M:%S%.f")),
            PgValue::TimestampTz(ts) => {
                serializer.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::AutoSi, true))
            }
            PgValue::Json(v) => v.serialize(serializer),
            PgValue::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
        }
    }
}
