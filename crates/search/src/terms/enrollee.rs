//! `{enrollee.field}`: columns of the enrollee row itself.

use std::collections::BTreeMap;

use crate::error::ParseError;
use crate::store::EnrolleeSearchContext;
use crate::terms::to_snake_case;
use crate::value::{SearchValue, SearchValueType, SearchValueTypeDefinition};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrolleeTerm {
    field: String,
}

impl EnrolleeTerm {
    pub fn new(field: &str) -> Result<Self, ParseError> {
        if !fields().contains_key(field) {
            return Err(ParseError::UnknownField {
                term: "enrollee".to_string(),
                field: field.to_string(),
            });
        }
        Ok(EnrolleeTerm {
            field: field.to_string(),
        })
    }

    pub(crate) fn extract(&self, context: &EnrolleeSearchContext) -> SearchValue {
        let enrollee = &context.enrollee;
        match self.field.as_str() {
            "shortcode" => SearchValue::String(enrollee.shortcode.clone()),
            "subject" => SearchValue::Boolean(enrollee.subject),
            "consented" => SearchValue::Boolean(enrollee.consented),
            "createdAt" => SearchValue::Instant(enrollee.created_at),
            _ => SearchValue::Absent,
        }
    }

    pub(crate) fn term_clause(&self) -> String {
        format!("enrollee.{}", to_snake_case(&self.field))
    }

    pub(crate) fn value_type(&self) -> SearchValueTypeDefinition {
        fields().remove(self.field.as_str()).unwrap_or_default()
    }
}

pub(crate) fn fields() -> BTreeMap<&'static str, SearchValueTypeDefinition> {
    BTreeMap::from([
        (
            "shortcode",
            SearchValueTypeDefinition::of(SearchValueType::String),
        ),
        (
            "subject",
            SearchValueTypeDefinition::of(SearchValueType::Boolean),
        ),
        (
            "consented",
            SearchValueTypeDefinition::of(SearchValueType::Boolean),
        ),
        (
            "createdAt",
            SearchValueTypeDefinition::of(SearchValueType::Instant),
        ),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Enrollee;

    #[test]
    fn known_fields_only() {
        assert!(EnrolleeTerm::new("consented").is_ok());
        assert!(matches!(
            EnrolleeTerm::new("favoriteColor"),
            Err(ParseError::UnknownField { .. })
        ));
    }

    #[test]
    fn extracts_from_the_enrollee_row() {
        let enrollee = Enrollee {
            shortcode: "AABBCC".into(),
            consented: true,
            ..Default::default()
        };
        let context = EnrolleeSearchContext::new(enrollee);
        assert_eq!(
            EnrolleeTerm::new("shortcode").unwrap().extract(&context),
            SearchValue::String("AABBCC".into())
        );
        assert_eq!(
            EnrolleeTerm::new("consented").unwrap().extract(&context),
            SearchValue::Boolean(true)
        );
    }

    #[test]
    fn clause_uses_snake_case_columns() {
        assert_eq!(
            EnrolleeTerm::new("createdAt").unwrap().term_clause(),
            "enrollee.created_at"
        );
    }
}
