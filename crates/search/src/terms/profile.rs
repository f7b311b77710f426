//! `{profile.field}`: demographic fields, including the nested
//! `mailingAddress.*` path.

use std::collections::BTreeMap;

use crate::error::ParseError;
use crate::model::{MailingAddress, Profile};
use crate::sql::{JoinClause, SelectClause, SqlFragment};
use crate::store::EnrolleeSearchContext;
use crate::terms::to_snake_case;
use crate::value::{SearchValue, SearchValueType, SearchValueTypeDefinition};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileTerm {
    field: String,
}

impl ProfileTerm {
    pub fn new(field: &str) -> Result<Self, ParseError> {
        if !fields().contains_key(field) {
            return Err(ParseError::UnknownField {
                term: "profile".to_string(),
                field: field.to_string(),
            });
        }
        Ok(ProfileTerm {
            field: field.to_string(),
        })
    }

    fn is_address_field(&self) -> bool {
        self.field.starts_with("mailingAddress.")
    }

    pub(crate) fn extract(&self, context: &EnrolleeSearchContext) -> SearchValue {
        let profile = match context.profile.as_ref() {
            Some(profile) => profile,
            None => return SearchValue::Absent,
        };
        match self.field.split_once('.') {
            Some((_, address_field)) => profile
                .mailing_address
                .as_ref()
                .map(|address| extract_address(address, address_field))
                .unwrap_or(SearchValue::Absent),
            None => extract_profile(profile, &self.field),
        }
    }

    pub(crate) fn join_clauses(&self) -> Vec<JoinClause> {
        if self.is_address_field() {
            vec![JoinClause::left(
                "mailing_address",
                "mailing_address",
                SqlFragment::new("profile.mailing_address_id = mailing_address.id"),
            )]
        } else {
            Vec::new()
        }
    }

    pub(crate) fn select_clauses(&self) -> Vec<SelectClause> {
        if self.is_address_field() {
            vec![SelectClause::new("mailing_address", "mailing_address")]
        } else {
            Vec::new()
        }
    }

    pub(crate) fn term_clause(&self) -> String {
        match self.field.split_once('.') {
            Some((_, address_field)) => {
                format!("mailing_address.{}", to_snake_case(address_field))
            }
            None => format!("profile.{}", to_snake_case(&self.field)),
        }
    }

    pub(crate) fn value_type(&self) -> SearchValueTypeDefinition {
        fields().remove(self.field.as_str()).unwrap_or_default()
    }
}

fn extract_profile(profile: &Profile, field: &str) -> SearchValue {
    match field {
        "givenName" => opt_string(&profile.given_name),
        "familyName" => opt_string(&profile.family_name),
        "contactEmail" => opt_string(&profile.contact_email),
        "sexAtBirth" => opt_string(&profile.sex_at_birth),
        "birthDate" => profile
            .birth_date
            .map(SearchValue::Date)
            .unwrap_or(SearchValue::Absent),
        _ => SearchValue::Absent,
    }
}

fn extract_address(address: &MailingAddress, field: &str) -> SearchValue {
    match field {
        "street1" => opt_string(&address.street1),
        "street2" => opt_string(&address.street2),
        "city" => opt_string(&address.city),
        "state" => opt_string(&address.state),
        "postalCode" => opt_string(&address.postal_code),
        "country" => opt_string(&address.country),
        _ => SearchValue::Absent,
    }
}

fn opt_string(value: &Option<String>) -> SearchValue {
    value
        .clone()
        .map(SearchValue::String)
        .unwrap_or(SearchValue::Absent)
}

pub(crate) fn fields() -> BTreeMap<&'static str, SearchValueTypeDefinition> {
    let string = || SearchValueTypeDefinition::of(SearchValueType::String);
    BTreeMap::from([
        ("givenName", string()),
        ("familyName", string()),
        ("contactEmail", string()),
        ("sexAtBirth", string()),
        (
            "birthDate",
            SearchValueTypeDefinition::of(SearchValueType::Date),
        ),
        ("mailingAddress.street1", string()),
        ("mailingAddress.street2", string()),
        ("mailingAddress.city", string()),
        ("mailingAddress.state", string()),
        ("mailingAddress.postalCode", string()),
        ("mailingAddress.country", string()),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Enrollee;

    fn context_with(profile: Profile) -> EnrolleeSearchContext {
        EnrolleeSearchContext::with_profile(Enrollee::default(), profile)
    }

    #[test]
    fn plain_fields_read_profile_columns() {
        let term = ProfileTerm::new("givenName").unwrap();
        assert_eq!(term.term_clause(), "profile.given_name");
        assert!(term.join_clauses().is_empty());

        let profile = Profile {
            given_name: Some("Jonas".into()),
            ..Default::default()
        };
        assert_eq!(
            term.extract(&context_with(profile)),
            SearchValue::String("Jonas".into())
        );
    }

    #[test]
    fn address_fields_join_the_address_table() {
        let term = ProfileTerm::new("mailingAddress.postalCode").unwrap();
        assert_eq!(term.term_clause(), "mailing_address.postal_code");
        assert_eq!(term.join_clauses().len(), 1);
        assert_eq!(term.select_clauses().len(), 1);

        let profile = Profile {
            mailing_address: Some(MailingAddress {
                postal_code: Some("02138".into()),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert_eq!(
            term.extract(&context_with(profile)),
            SearchValue::String("02138".into())
        );
    }

    #[test]
    fn missing_profile_or_address_is_absent() {
        let term = ProfileTerm::new("mailingAddress.city").unwrap();
        let no_profile = EnrolleeSearchContext::new(Enrollee::default());
        assert!(term.extract(&no_profile).is_absent());
        assert!(term.extract(&context_with(Profile::default())).is_absent());
    }

    #[test]
    fn unknown_fields_are_rejected() {
        assert!(ProfileTerm::new("middleName").is_err());
        assert!(ProfileTerm::new("mailingAddress.planet").is_err());
    }
}
