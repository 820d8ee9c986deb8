use std::cmp::Ordering;

use chrono::{DateTime, NaiveDate, Utc};

use super::Error;

/// Type of a queryable field; decides how filter values are parsed and which
/// operators apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Id,
    Text,
    /// Text compared ignoring case, also for equality.
    Caseless,
    Bool,
    Date,
    Timestamp,
    Enum(&'static [&'static str]),
}

impl Kind {
    pub(crate) fn is_text(self) -> bool {
        matches!(self, Kind::Text | Kind::Caseless)
    }

    pub(crate) fn is_ordered(self) -> bool {
        matches!(self, Kind::Id | Kind::Date | Kind::Timestamp)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum Scalar {
    Int(u64),
    Text(String),
    Bool(bool),
    Date(NaiveDate),
    Timestamp(DateTime<Utc>),
}

impl Scalar {
    pub fn text(value: impl Into<String>) -> Self {
        Scalar::Text(value.into())
    }

    pub(crate) fn as_text(&self) -> Option<&str> {
        match self {
            Scalar::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Values of different scalar types never compare.
    pub(crate) fn compare(&self, other: &Scalar) -> Option<Ordering> {
        match (self, other) {
            (Scalar::Int(a), Scalar::Int(b)) => Some(a.cmp(b)),
            (Scalar::Text(a), Scalar::Text(b)) => Some(a.cmp(b)),
            (Scalar::Bool(a), Scalar::Bool(b)) => Some(a.cmp(b)),
            (Scalar::Date(a), Scalar::Date(b)) => Some(a.cmp(b)),
            (Scalar::Timestamp(a), Scalar::Timestamp(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

/// Parse a filter value for a field of `kind`.
pub fn parse(field: &str, kind: Kind, raw: &str) -> Result<Scalar, Error> {
    let raw = raw.trim();
    let invalid = |reason: &str| Error::InvalidValue {
        field: field.to_string(),
        value: raw.to_string(),
        reason: reason.to_string(),
    };
    match kind {
        Kind::Id => raw
            .parse::<u64>()
            .map(Scalar::Int)
            .map_err(|_| invalid("expected a numeric id")),
        Kind::Text => Ok(Scalar::text(raw)),
        Kind::Caseless => Ok(Scalar::text(raw.to_lowercase())),
        Kind::Bool => match raw.to_ascii_lowercase().as_str() {
            "true" => Ok(Scalar::Bool(true)),
            "false" => Ok(Scalar::Bool(false)),
            _ => Err(invalid("expected true or false")),
        },
        Kind::Date => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .map(Scalar::Date)
            .map_err(|_| invalid("expected a date as YYYY-MM-DD")),
        Kind::Timestamp => DateTime::parse_from_rfc3339(raw)
            .map(|t| Scalar::Timestamp(t.with_timezone(&Utc)))
            .or_else(|_| {
                NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                    .ok()
                    .and_then(|d| d.and_hms_opt(0, 0, 0))
                    .map(|t| Scalar::Timestamp(t.and_utc()))
                    .ok_or(())
            })
            .map_err(|_| invalid("expected an RFC 3339 timestamp or a date")),
        Kind::Enum(variants) => variants
            .iter()
            .find(|v| v.eq_ignore_ascii_case(raw))
            .map(|v| Scalar::text(*v))
            .ok_or_else(|| invalid(&format!("expected one of {}", variants.join(", ")))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Kind::Id, "42", Scalar::Int(42))]
    #[case(Kind::Caseless, "MIT", Scalar::text("mit"))]
    #[case(Kind::Bool, "TRUE", Scalar::Bool(true))]
    #[case(Kind::Enum(&["OPEN", "CLOSED"]), "open", Scalar::text("OPEN"))]
    fn test_parse(#[case] kind: Kind, #[case] raw: &str, #[case] expected: Scalar) {
        assert_eq!(parse("field", kind, raw).unwrap(), expected);
    }

    #[test]
    fn test_parse_dates() {
        assert_eq!(
            parse("addedDate", Kind::Date, "2024-03-01").unwrap(),
            Scalar::Date(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap())
        );
        assert!(matches!(
            parse("deliveredDate", Kind::Timestamp, "2024-03-01T10:00:00Z"),
            Ok(Scalar::Timestamp(_))
        ));
        assert!(matches!(
            parse("deliveredDate", Kind::Timestamp, "2024-03-01"),
            Ok(Scalar::Timestamp(_))
        ));
    }

    #[rstest]
    #[case(Kind::Id, "abc")]
    #[case(Kind::Bool, "yes")]
    #[case(Kind::Date, "01/03/2024")]
    #[case(Kind::Enum(&["OK"]), "BROKEN")]
    fn test_parse_rejects(#[case] kind: Kind, #[case] raw: &str) {
        assert!(matches!(
            parse("field", kind, raw),
            Err(Error::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_mixed_kinds_do_not_compare() {
        assert_eq!(Scalar::Int(1).compare(&Scalar::text("1")), None);
    }
}
