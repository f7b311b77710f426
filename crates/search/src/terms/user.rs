//! `{user.field}`: the login account backing the enrollee.

use std::collections::BTreeMap;

use crate::error::ParseError;
use crate::sql::{JoinClause, SelectClause, SqlFragment};
use crate::store::{EnrolleeSearchContext, ParticipantStore};
use crate::terms::to_snake_case;
use crate::value::{SearchValue, SearchValueType, SearchValueTypeDefinition};

const ALIAS: &str = "participant_user";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserTerm {
    field: String,
}

impl UserTerm {
    pub fn new(field: &str) -> Result<Self, ParseError> {
        if !fields().contains_key(field) {
            return Err(ParseError::UnknownField {
                term: "user".to_string(),
                field: field.to_string(),
            });
        }
        Ok(UserTerm {
            field: field.to_string(),
        })
    }

    pub(crate) fn extract(
        &self,
        context: &EnrolleeSearchContext,
        store: &dyn ParticipantStore,
    ) -> SearchValue {
        let user = match store.find_user(context.enrollee.participant_user_id) {
            Some(found) => found,
            None => return SearchValue::Absent,
        };
        match self.field.as_str() {
            "username" => SearchValue::String(user.username),
            "createdAt" => SearchValue::Instant(user.created_at),
            "lastLogin" => user
                .last_login
                .map(SearchValue::Instant)
                .unwrap_or(SearchValue::Absent),
            _ => SearchValue::Absent,
        }
    }

    pub(crate) fn join_clauses(&self) -> Vec<JoinClause> {
        vec![JoinClause::left(
            "participant_user",
            ALIAS,
            SqlFragment::new(format!("{ALIAS}.id = enrollee.participant_user_id")),
        )]
    }

    pub(crate) fn select_clauses(&self) -> Vec<SelectClause> {
        vec![SelectClause::new("participant_user", ALIAS)]
    }

    pub(crate) fn term_clause(&self) -> String {
        format!("{}.{}", ALIAS, to_snake_case(&self.field))
    }

    pub(crate) fn value_type(&self) -> SearchValueTypeDefinition {
        fields().remove(self.field.as_str()).unwrap_or_default()
    }
}

pub(crate) fn fields() -> BTreeMap<&'static str, SearchValueTypeDefinition> {
    BTreeMap::from([
        (
            "username",
            SearchValueTypeDefinition::of(SearchValueType::String),
        ),
        (
            "createdAt",
            SearchValueTypeDefinition::of(SearchValueType::Instant),
        ),
        (
            "lastLogin",
            SearchValueTypeDefinition::of(SearchValueType::Instant),
        ),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clause_and_join() {
        let term = UserTerm::new("username").unwrap();
        assert_eq!(term.term_clause(), "participant_user.username");
        assert_eq!(
            term.join_clauses()[0].on.sql,
            "participant_user.id = enrollee.participant_user_id"
        );
    }

    #[test]
    fn unknown_field_is_rejected() {
        assert!(UserTerm::new("passwordHash").is_err());
    }
}
