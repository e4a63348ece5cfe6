//! SQL type labels, value classification and type unification

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Serialize, Serializer};

use crate::document::Node;

/// Candidate column type for one observed value
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SqlType {
    UniqueIdentifier,
    DateTime2,
    Date,
    Decimal { precision: u8, scale: u8 },
    BigInt,
    Int,
    SmallInt,
    TinyInt,
    Bit,
    /// Bounded string bucket
    NVarChar(u32),
    /// Unbounded text, the catch-all
    NVarCharMax,
    Null,
}

/// Decimal used when a numeric literal cannot be read
pub const DEFAULT_DECIMAL: SqlType = SqlType::Decimal { precision: 18, scale: 2 };

/// Scale tiers; a literal's scale rounds up to the first tier that holds it
const DECIMAL_SCALE_TIERS: [u8; 4] = [2, 4, 6, 10];

/// Accepted date-time layouts beyond RFC 3339
const DATETIME_FORMATS: [&str; 5] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

impl SqlType {
    /// Position in the unification priority order; lower wins
    fn priority(&self) -> (u8, i64) {
        match self {
            SqlType::UniqueIdentifier => (0, 0),
            SqlType::DateTime2 => (1, 0),
            SqlType::Date => (2, 0),
            // Several decimals widen together, see `widen_decimals`
            SqlType::Decimal { .. } => (3, 0),
            SqlType::BigInt => (4, 0),
            SqlType::Int => (5, 0),
            SqlType::SmallInt => (6, 0),
            SqlType::TinyInt => (7, 0),
            SqlType::Bit => (8, 0),
            SqlType::NVarChar(n) => (9, i64::from(*n)),
            SqlType::NVarCharMax => (10, 0),
            SqlType::Null => (11, 0),
        }
    }

    pub fn is_string(&self) -> bool {
        matches!(self, SqlType::NVarChar(_) | SqlType::NVarCharMax)
    }
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlType::UniqueIdentifier => write!(f, "UNIQUEIDENTIFIER"),
            SqlType::DateTime2 => write!(f, "DATETIME2"),
            SqlType::Date => write!(f, "DATE"),
            SqlType::Decimal { precision, scale } => write!(f, "DECIMAL({precision},{scale})"),
            SqlType::BigInt => write!(f, "BIGINT"),
            SqlType::Int => write!(f, "INT"),
            SqlType::SmallInt => write!(f, "SMALLINT"),
            SqlType::TinyInt => write!(f, "TINYINT"),
            SqlType::Bit => write!(f, "BIT"),
            SqlType::NVarChar(n) => write!(f, "NVARCHAR({n})"),
            SqlType::NVarCharMax => write!(f, "NVARCHAR(MAX)"),
            SqlType::Null => write!(f, "NULL"),
        }
    }
}

impl Serialize for SqlType {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Classify one scalar value.
///
/// Containers have no scalar type and classify to the catch-all; the
/// extractor routes them before they get here.
pub fn classify(value: &Node, string_buckets: &[u32]) -> SqlType {
    match value {
        Node::Null => SqlType::Null,
        Node::Bool(_) => SqlType::Bit,
        Node::Number(literal) => classify_number(literal),
        Node::String(s) => classify_string(s, string_buckets),
        Node::Array(_) | Node::Object(_) => SqlType::NVarCharMax,
    }
}

/// Classify a string by content, then by length
pub fn classify_string(s: &str, string_buckets: &[u32]) -> SqlType {
    if s.is_empty() {
        return string_bucket(0, string_buckets);
    }
    if let Some(t) = date_type(s) {
        return t;
    }
    if looks_like_uuid(s) {
        return SqlType::UniqueIdentifier;
    }
    string_bucket(s.chars().count(), string_buckets)
}

/// Smallest configured bucket holding `len` characters
pub fn string_bucket(len: usize, string_buckets: &[u32]) -> SqlType {
    string_buckets
        .iter()
        .find(|&&b| len <= b as usize)
        .map(|&b| SqlType::NVarChar(b))
        .unwrap_or(SqlType::NVarCharMax)
}

fn date_type(s: &str) -> Option<SqlType> {
    // Nothing shorter than "1/1/2024" or much longer than an RFC 3339 stamp parses
    if s.len() < 8 || s.len() > 40 {
        return None;
    }
    if DateTime::parse_from_rfc3339(s).is_ok()
        || DATETIME_FORMATS
            .iter()
            .any(|fmt| NaiveDateTime::parse_from_str(s, fmt).is_ok())
    {
        return Some(SqlType::DateTime2);
    }
    if NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok() {
        return Some(SqlType::Date);
    }
    if NaiveDate::parse_from_str(s, "%m/%d/%Y").is_ok() {
        return Some(SqlType::DateTime2);
    }
    None
}

fn looks_like_uuid(s: &str) -> bool {
    // Hyphenated or braced forms only; bare 32-digit hex is too easily a hash
    (s.len() == 36 || s.len() == 38) && uuid::Uuid::parse_str(s).is_ok()
}

/// Classify a number from its literal text
pub fn classify_number(literal: &str) -> SqlType {
    if let Ok(v) = literal.parse::<i64>() {
        return if (0..=255).contains(&v) {
            SqlType::TinyInt
        } else if i16::try_from(v).is_ok() {
            SqlType::SmallInt
        } else if i32::try_from(v).is_ok() {
            SqlType::Int
        } else {
            SqlType::BigInt
        };
    }

    match decimal_shape(literal) {
        Some((int_digits, scale)) => {
            let tier = DECIMAL_SCALE_TIERS
                .iter()
                .copied()
                .find(|&t| scale <= u32::from(t))
                .unwrap_or(DECIMAL_SCALE_TIERS[DECIMAL_SCALE_TIERS.len() - 1]);
            SqlType::Decimal {
                precision: decimal_precision(int_digits, tier),
                scale: tier,
            }
        }
        None => DEFAULT_DECIMAL,
    }
}

/// Smallest supported precision holding `int_digits` plus `scale`
fn decimal_precision(int_digits: u32, scale: u8) -> u8 {
    if scale <= 6 && int_digits.saturating_add(u32::from(scale)) <= 18 {
        18
    } else {
        38
    }
}

/// Exponents beyond this add nothing a DECIMAL(38, _) column could hold
const MAX_DECIMAL_EXPONENT: i64 = 400;

/// Integer-digit count and scale represented by a decimal literal
fn decimal_shape(literal: &str) -> Option<(u32, u32)> {
    if literal.parse::<f64>().is_err() {
        return None;
    }
    let (mantissa, exponent) = match literal.find(|c| c == 'e' || c == 'E') {
        Some(pos) => (&literal[..pos], parse_exponent(&literal[pos + 1..])?),
        None => (literal, 0),
    };
    let mantissa = mantissa.trim_start_matches(&['-', '+'][..]);
    let (int_part, frac_part) = mantissa.split_once('.').unwrap_or((mantissa, ""));

    let int_digits = i64::try_from(int_part.trim_start_matches('0').len())
        .unwrap_or(i64::MAX)
        .saturating_add(exponent.max(0));
    let scale = i64::try_from(frac_part.len())
        .unwrap_or(i64::MAX)
        .saturating_sub(exponent);

    let to_u32 = |v: i64| u32::try_from(v.max(0)).unwrap_or(u32::MAX);
    Some((to_u32(int_digits), to_u32(scale)))
}

/// Exponent clamped to `MAX_DECIMAL_EXPONENT`; digit strings too long for
/// `i64` saturate instead of failing
fn parse_exponent(text: &str) -> Option<i64> {
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let magnitude = digits
        .parse::<i64>()
        .unwrap_or(i64::MAX)
        .min(MAX_DECIMAL_EXPONENT);
    Some(if negative { -magnitude } else { magnitude })
}

/// Resolve one recommended type from the labels observed for a field.
///
/// Returns the highest-priority label present; `NULL` is ignored and an
/// empty set yields the catch-all. When decimals win, every observed decimal
/// is widened into one that holds all of their integer digits and scales.
///
/// String buckets rank narrowest first, so a mixed-length column reports its
/// smallest bucket. Emitters sizing a string column should read the field's
/// `max_length` rather than trust the bucket alone.
pub fn unify<'a, I>(types: I) -> SqlType
where
    I: IntoIterator<Item = &'a SqlType>,
{
    let observed: Vec<SqlType> = types
        .into_iter()
        .copied()
        .filter(|t| *t != SqlType::Null)
        .collect();

    match observed.iter().min_by_key(|t| t.priority()) {
        Some(SqlType::Decimal { .. }) => widen_decimals(&observed),
        Some(t) => *t,
        None => SqlType::NVarCharMax,
    }
}

/// One decimal wide enough for every observed decimal
fn widen_decimals(types: &[SqlType]) -> SqlType {
    let (int_digits, scale) = types
        .iter()
        .filter_map(|t| match t {
            SqlType::Decimal { precision, scale } => {
                Some((u32::from(precision.saturating_sub(*scale)), *scale))
            }
            _ => None,
        })
        .fold((0u32, 0u8), |(d, s), (dt, st)| (d.max(dt), s.max(st)));

    SqlType::Decimal {
        precision: decimal_precision(int_digits, scale),
        scale,
    }
}

/// Comma-joined labels in lexical order
pub fn types_csv(types: &BTreeSet<SqlType>) -> String {
    let mut labels: Vec<String> = types.iter().map(|t| t.to_string()).collect();
    labels.sort();
    labels.join(",")
}
