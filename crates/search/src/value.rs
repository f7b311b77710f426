//! Runtime values flowing through search expressions.
//!
//! Every term, whether a literal, a function, or an enrollee datum, extracts
//! to a [`SearchValue`]. Comparison semantics live here so the interpreter and the
//! SQL compiler agree on one definition of equality, ordering and containment.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single value produced by extracting a search term against an enrollee.
///
/// `Absent` stands in for any missing datum: a question that was never
/// answered, a profile field left blank, an enrollee with no kits. It is also
/// the runtime form of the `null` literal.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchValue {
    String(String),
    Number(f64),
    Boolean(bool),
    Instant(DateTime<Utc>),
    Date(NaiveDate),
    Absent,
}

impl SearchValue {
    /// The declared type corresponding to this value.
    pub fn value_type(&self) -> SearchValueType {
        match self {
            SearchValue::String(_) => SearchValueType::String,
            SearchValue::Number(_) => SearchValueType::Number,
            SearchValue::Boolean(_) => SearchValueType::Boolean,
            SearchValue::Instant(_) => SearchValueType::Instant,
            SearchValue::Date(_) => SearchValueType::Date,
            SearchValue::Absent => SearchValueType::Null,
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, SearchValue::Absent)
    }

    /// Equality across values of the same kind. `Absent` equals only
    /// `Absent`, which is what makes `{term} = null` an is-missing test.
    pub fn equals(&self, other: &SearchValue) -> bool {
        match (self, other) {
            (SearchValue::String(a), SearchValue::String(b)) => a == b,
            (SearchValue::Number(a), SearchValue::Number(b)) => a == b,
            (SearchValue::Boolean(a), SearchValue::Boolean(b)) => a == b,
            (SearchValue::Instant(a), SearchValue::Instant(b)) => a == b,
            (SearchValue::Date(a), SearchValue::Date(b)) => a == b,
            (SearchValue::Absent, SearchValue::Absent) => true,
            _ => false,
        }
    }

    /// Strict ordering for numbers, instants and dates. Any other pairing,
    /// including anything `Absent`, is not greater.
    pub fn greater_than(&self, other: &SearchValue) -> bool {
        match (self, other) {
            (SearchValue::Number(a), SearchValue::Number(b)) => a > b,
            (SearchValue::Instant(a), SearchValue::Instant(b)) => a > b,
            (SearchValue::Date(a), SearchValue::Date(b)) => a > b,
            _ => false,
        }
    }

    pub fn greater_than_or_equal(&self, other: &SearchValue) -> bool {
        self.greater_than(other) || self.equals(other)
    }

    /// Case-insensitive substring containment. Only defined for strings.
    pub fn contains(&self, other: &SearchValue) -> bool {
        match (self, other) {
            (SearchValue::String(a), SearchValue::String(b)) => {
                a.to_lowercase().contains(&b.to_lowercase())
            }
            _ => false,
        }
    }

    /// Coerce a string value into a temporal type so that rules can compare
    /// date and timestamp terms to quoted literals. A string that fails to
    /// parse coerces to `Absent`, which no comparison matches. Non-string
    /// values pass through unchanged.
    pub fn parse_to(&self, target: SearchValueType) -> SearchValue {
        match (self, target) {
            (SearchValue::String(raw), SearchValueType::Instant) => {
                DateTime::parse_from_rfc3339(raw)
                    .map(|parsed| SearchValue::Instant(parsed.with_timezone(&Utc)))
                    .unwrap_or(SearchValue::Absent)
            }
            (SearchValue::String(raw), SearchValueType::Date) => {
                NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                    .map(SearchValue::Date)
                    .unwrap_or(SearchValue::Absent)
            }
            _ => self.clone(),
        }
    }
}

/// The declared type of a search term, used for parse-time type checking and
/// advertised to rule-builder UIs through the facet catalog.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SearchValueType {
    #[default]
    String,
    Number,
    Boolean,
    Instant,
    Date,
    Null,
}

impl SearchValueType {
    pub fn is_temporal(&self) -> bool {
        matches!(self, SearchValueType::Instant | SearchValueType::Date)
    }
}

impl fmt::Display for SearchValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SearchValueType::String => "string",
            SearchValueType::Number => "number",
            SearchValueType::Boolean => "boolean",
            SearchValueType::Instant => "instant",
            SearchValueType::Date => "date",
            SearchValueType::Null => "null",
        };
        f.write_str(name)
    }
}

/// Full type description of a facet: the value type plus, for choice
/// questions, the selectable options.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchValueTypeDefinition {
    #[serde(rename = "type")]
    pub value_type: SearchValueType,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<QuestionChoice>,
    #[serde(default)]
    pub allow_multiple: bool,
    #[serde(default)]
    pub allow_other_description: bool,
}

impl SearchValueTypeDefinition {
    pub fn of(value_type: SearchValueType) -> Self {
        SearchValueTypeDefinition {
            value_type,
            ..Default::default()
        }
    }

    pub fn with_choices(value_type: SearchValueType, choices: Vec<QuestionChoice>) -> Self {
        SearchValueTypeDefinition {
            value_type,
            choices,
            ..Default::default()
        }
    }
}

/// One selectable option of a choice question.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionChoice {
    #[serde(default)]
    pub stable_id: String,
    #[serde(default)]
    pub text: String,
}

impl QuestionChoice {
    pub fn new(stable_id: impl Into<String>, text: impl Into<String>) -> Self {
        QuestionChoice {
            stable_id: stable_id.into(),
            text: text.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn equality_is_kind_strict() {
        assert!(SearchValue::String("a".into()).equals(&SearchValue::String("a".into())));
        assert!(!SearchValue::String("1".into()).equals(&SearchValue::Number(1.0)));
        assert!(!SearchValue::Boolean(true).equals(&SearchValue::Number(1.0)));
        assert!(SearchValue::Absent.equals(&SearchValue::Absent));
        assert!(!SearchValue::String("a".into()).equals(&SearchValue::Absent));
    }

    #[test]
    fn ordering_covers_numbers_and_temporals() {
        assert!(SearchValue::Number(2.0).greater_than(&SearchValue::Number(1.0)));
        assert!(!SearchValue::Number(1.0).greater_than(&SearchValue::Number(1.0)));
        assert!(SearchValue::Number(1.0).greater_than_or_equal(&SearchValue::Number(1.0)));

        let earlier = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let later = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        assert!(SearchValue::Instant(later).greater_than(&SearchValue::Instant(earlier)));
        assert!(!SearchValue::Absent.greater_than(&SearchValue::Number(1.0)));
        assert!(!SearchValue::Number(1.0).greater_than(&SearchValue::Absent));
    }

    #[test]
    fn contains_is_case_insensitive() {
        let haystack = SearchValue::String("JSALK".into());
        assert!(haystack.contains(&SearchValue::String("JSA".into())));
        assert!(haystack.contains(&SearchValue::String("salk".into())));
        assert!(
            !SearchValue::String("PSALK".into()).contains(&SearchValue::String("JSA".into()))
        );
        assert!(!SearchValue::Number(1.0).contains(&SearchValue::Number(1.0)));
    }

    #[test]
    fn string_coerces_to_instant_and_date() {
        let coerced = SearchValue::String("2024-03-15T10:30:00Z".into())
            .parse_to(SearchValueType::Instant);
        let expected = Utc.with_ymd_and_hms(2024, 3, 15, 10, 30, 0).unwrap();
        assert_eq!(coerced, SearchValue::Instant(expected));

        let date = SearchValue::String("2024-03-15".into()).parse_to(SearchValueType::Date);
        assert_eq!(
            date,
            SearchValue::Date(NaiveDate::from_ymd_opt(2024, 3, 15).unwrap())
        );
    }

    #[test]
    fn unparseable_string_coerces_to_absent() {
        assert!(
            SearchValue::String("not a date".into())
                .parse_to(SearchValueType::Instant)
                .is_absent()
        );
        assert!(
            SearchValue::String("03/15/2024".into())
                .parse_to(SearchValueType::Date)
                .is_absent()
        );
    }

    #[test]
    fn type_definition_serializes_camel_case() {
        let definition = SearchValueTypeDefinition::with_choices(
            SearchValueType::String,
            vec![QuestionChoice::new("yes", "Yes")],
        );
        let json = serde_json::to_value(&definition).unwrap();
        assert_eq!(json["type"], "STRING");
        assert_eq!(json["choices"][0]["stableId"], "yes");
        assert_eq!(json["allowMultiple"], false);
    }
}
