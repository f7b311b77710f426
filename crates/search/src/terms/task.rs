//! `{task.target.field}`: the enrollee's task for one survey or consent
//! form. `status` reads the task row; `assigned` tests whether the task
//! exists at all.

use std::collections::BTreeMap;

use crate::error::ParseError;
use crate::model::TaskStatus;
use crate::sql::{JoinClause, SelectClause, SqlFragment, SqlParam};
use crate::store::{EnrolleeSearchContext, ParticipantStore};
use crate::terms::{to_snake_case, validate_identifier};
use crate::value::{QuestionChoice, SearchValue, SearchValueType, SearchValueTypeDefinition};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskTerm {
    target_stable_id: String,
    field: String,
}

impl TaskTerm {
    pub fn new(target_stable_id: &str, field: &str) -> Result<Self, ParseError> {
        validate_identifier(target_stable_id)?;
        if !fields().contains_key(field) {
            return Err(ParseError::UnknownField {
                term: "task".to_string(),
                field: field.to_string(),
            });
        }
        Ok(TaskTerm {
            target_stable_id: target_stable_id.to_string(),
            field: field.to_string(),
        })
    }

    fn alias(&self) -> String {
        format!("task_{}", self.target_stable_id)
    }

    pub(crate) fn extract(
        &self,
        context: &EnrolleeSearchContext,
        store: &dyn ParticipantStore,
    ) -> SearchValue {
        let task = store.find_task(context.enrollee.id, &self.target_stable_id);
        match self.field.as_str() {
            // `assigned` is about existence, so it never extracts to Absent
            "assigned" => SearchValue::Boolean(task.is_some()),
            "status" => task
                .map(|task| SearchValue::String(task.status.as_str().to_string()))
                .unwrap_or(SearchValue::Absent),
            _ => SearchValue::Absent,
        }
    }

    /// LEFT join with the target filter in the ON clause, so an unassigned
    /// task leaves a NULL row for `assigned = false` and `= null` to see.
    pub(crate) fn join_clauses(&self) -> Vec<JoinClause> {
        let alias = self.alias();
        vec![JoinClause::left(
            "participant_task",
            alias.clone(),
            SqlFragment::with_params(
                format!("enrollee.id = {alias}.enrollee_id AND {alias}.target_stable_id = ?"),
                vec![SqlParam::string(&self.target_stable_id)],
            ),
        )]
    }

    pub(crate) fn select_clauses(&self) -> Vec<SelectClause> {
        vec![SelectClause::new("participant_task", self.alias())]
    }

    pub(crate) fn term_clause(&self) -> String {
        match self.field.as_str() {
            "assigned" => format!("{}.id IS NOT NULL", self.alias()),
            _ => format!("{}.{}", self.alias(), to_snake_case(&self.field)),
        }
    }

    pub(crate) fn value_type(&self) -> SearchValueTypeDefinition {
        fields().remove(self.field.as_str()).unwrap_or_default()
    }
}

pub(crate) fn fields() -> BTreeMap<&'static str, SearchValueTypeDefinition> {
    let status_choices = TaskStatus::ALL
        .iter()
        .map(|status| QuestionChoice::new(status.as_str(), status.as_str()))
        .collect();
    BTreeMap::from([
        (
            "status",
            SearchValueTypeDefinition::with_choices(SearchValueType::String, status_choices),
        ),
        (
            "assigned",
            SearchValueTypeDefinition::of(SearchValueType::Boolean),
        ),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_is_validated_and_aliased() {
        let term = TaskTerm::new("consent_v2", "status").unwrap();
        assert_eq!(term.term_clause(), "task_consent_v2.status");
        assert!(TaskTerm::new("consent v2", "status").is_err());
        assert!(TaskTerm::new("consent_v2", "dueDate").is_err());
    }

    #[test]
    fn assigned_compiles_to_an_existence_test() {
        let term = TaskTerm::new("survey1", "assigned").unwrap();
        assert_eq!(term.term_clause(), "task_survey1.id IS NOT NULL");
        assert_eq!(
            term.value_type().value_type,
            SearchValueType::Boolean
        );
    }

    #[test]
    fn join_binds_the_target_stable_id() {
        let term = TaskTerm::new("survey1", "status").unwrap();
        let joins = term.join_clauses();
        assert_eq!(joins.len(), 1);
        assert!(joins[0].on.sql.ends_with("task_survey1.target_stable_id = ?"));
        assert_eq!(joins[0].on.params, vec![SqlParam::string("survey1")]);
    }

    #[test]
    fn status_facet_lists_all_statuses() {
        let definition = fields().remove("status").unwrap();
        assert_eq!(definition.choices.len(), TaskStatus::ALL.len());
        assert!(
            definition
                .choices
                .iter()
                .any(|choice| choice.stable_id == "IN_PROGRESS")
        );
    }
}
