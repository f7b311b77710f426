//! `{answer.survey.question}`: the enrollee's response to one survey
//! question, optionally from a sibling study via `answer["study"].…`.

use tracing::warn;

use crate::error::ParseError;
use crate::model::SurveyQuestionDefinition;
use crate::sql::{JoinClause, SelectClause, SqlFragment, SqlParam};
use crate::store::{EnrolleeSearchContext, ParticipantStore};
use crate::terms::{join_clauses_for_study, validate_identifier};
use crate::value::{QuestionChoice, SearchValue, SearchValueType, SearchValueTypeDefinition};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerTerm {
    study_name: Option<String>,
    survey_stable_id: String,
    question_stable_id: String,
}

impl AnswerTerm {
    /// All three identifiers end up in SQL aliases, so each is validated.
    pub fn new(
        study_name: Option<&str>,
        survey_stable_id: &str,
        question_stable_id: &str,
    ) -> Result<Self, ParseError> {
        if let Some(study) = study_name {
            validate_identifier(study)?;
        }
        validate_identifier(survey_stable_id)?;
        validate_identifier(question_stable_id)?;
        Ok(AnswerTerm {
            study_name: study_name.map(str::to_string),
            survey_stable_id: survey_stable_id.to_string(),
            question_stable_id: question_stable_id.to_string(),
        })
    }

    /// Alias carries the question (and study, if any) so distinct questions
    /// join the answer table under distinct names.
    fn alias(&self) -> String {
        match &self.study_name {
            Some(study) => format!("answer_{}_{}", study, self.question_stable_id),
            None => format!("answer_{}", self.question_stable_id),
        }
    }

    pub(crate) fn extract(
        &self,
        context: &EnrolleeSearchContext,
        store: &dyn ParticipantStore,
    ) -> SearchValue {
        let answer = match &self.study_name {
            Some(study) => store.find_answer_for_profile(
                context.enrollee.profile_id,
                study,
                &self.survey_stable_id,
                &self.question_stable_id,
            ),
            None => store.find_answer(
                context.enrollee.id,
                &self.survey_stable_id,
                &self.question_stable_id,
            ),
        };
        answer
            .map(|answer| answer.to_search_value())
            .unwrap_or(SearchValue::Absent)
    }

    /// The answer join is LEFT with the survey and question discriminators in
    /// the ON clause, so enrollees without a response still produce a row and
    /// `= null` tests behave like the interpreter's `Absent`.
    pub(crate) fn join_clauses(&self) -> Vec<JoinClause> {
        let alias = self.alias();
        let mut joins = Vec::new();
        let enrollee_ref = match &self.study_name {
            Some(study) => {
                joins.extend(join_clauses_for_study(study));
                format!("enrollee_{study}")
            }
            None => "enrollee".to_string(),
        };
        joins.push(JoinClause::left(
            "answer",
            alias.clone(),
            SqlFragment::with_params(
                format!(
                    "{enrollee_ref}.id = {alias}.enrollee_id AND {alias}.survey_stable_id = ? AND {alias}.question_stable_id = ?"
                ),
                vec![
                    SqlParam::string(&self.survey_stable_id),
                    SqlParam::string(&self.question_stable_id),
                ],
            ),
        ));
        joins
    }

    /// The matched answer row comes back with each hit.
    pub(crate) fn select_clauses(&self) -> Vec<SelectClause> {
        vec![SelectClause::new("answer", self.alias())]
    }

    pub(crate) fn term_clause(&self) -> String {
        format!("{}.string_value", self.alias())
    }

    pub(crate) fn is_cross_study(&self) -> bool {
        self.study_name.is_some()
    }

    pub(crate) fn value_type(&self) -> SearchValueTypeDefinition {
        SearchValueTypeDefinition::of(SearchValueType::String)
    }
}

/// Facet type for one survey question, with its choices decoded from the
/// stored JSON. A choice missing its stable id or label falls back to the
/// other; undecodable JSON is logged and yields a choiceless facet.
pub(crate) fn question_type_definition(
    question: &SurveyQuestionDefinition,
) -> SearchValueTypeDefinition {
    let choices = match question.choices_json.as_deref() {
        Some(raw) if !raw.trim().is_empty() => {
            match serde_json::from_str::<Vec<QuestionChoice>>(raw) {
                Ok(choices) => choices.into_iter().map(normalize_choice).collect(),
                Err(error) => {
                    warn!(
                        survey = %question.survey_stable_id,
                        question = %question.question_stable_id,
                        %error,
                        "failed to decode question choices"
                    );
                    Vec::new()
                }
            }
        }
        _ => Vec::new(),
    };
    SearchValueTypeDefinition {
        value_type: SearchValueType::String,
        choices,
        allow_multiple: question.allow_multiple,
        allow_other_description: question.allow_other_description,
    }
}

fn normalize_choice(choice: QuestionChoice) -> QuestionChoice {
    match (choice.stable_id.is_empty(), choice.text.is_empty()) {
        (true, false) => QuestionChoice::new(choice.text.clone(), choice.text),
        (false, true) => QuestionChoice::new(choice.stable_id.clone(), choice.stable_id),
        _ => choice,
    }
}
