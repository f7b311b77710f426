//! Participant domain rows the search engine reads.
//!
//! These mirror the relational schema the SQL compiler targets: `enrollee`
//! joined to `profile`, with answers, tasks, kits, users and families hanging
//! off it. Stores hand them to the interpreter; the compiler only needs their
//! column names.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::value::SearchValue;

/// A participant enrolled in one study environment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Enrollee {
    pub id: Uuid,
    pub shortcode: String,
    pub study_environment_id: Uuid,
    pub participant_user_id: Uuid,
    pub profile_id: Uuid,
    pub subject: bool,
    pub consented: bool,
    pub created_at: DateTime<Utc>,
}

/// Demographic profile attached to an enrollee.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: Uuid,
    pub given_name: Option<String>,
    pub family_name: Option<String>,
    pub contact_email: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub sex_at_birth: Option<String>,
    pub mailing_address: Option<MailingAddress>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MailingAddress {
    pub street1: Option<String>,
    pub street2: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
}

/// A survey response value for one question.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Answer {
    pub survey_stable_id: String,
    pub question_stable_id: String,
    pub answer_type: Option<AnswerValueType>,
    pub string_value: Option<String>,
    pub number_value: Option<f64>,
    pub boolean_value: Option<bool>,
}

impl Answer {
    /// The answer's payload as a search value, based on its declared type.
    /// Answers with no declared type fall back to the string column.
    pub fn to_search_value(&self) -> SearchValue {
        match self.answer_type {
            Some(AnswerValueType::Number) => self
                .number_value
                .map(SearchValue::Number)
                .unwrap_or(SearchValue::Absent),
            Some(AnswerValueType::Boolean) => self
                .boolean_value
                .map(SearchValue::Boolean)
                .unwrap_or(SearchValue::Absent),
            _ => self
                .string_value
                .clone()
                .map(SearchValue::String)
                .unwrap_or(SearchValue::Absent),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AnswerValueType {
    String,
    Number,
    Boolean,
}

/// An activity assigned to an enrollee, such as a survey or consent form.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantTask {
    pub id: Uuid,
    pub target_stable_id: String,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    New,
    Viewed,
    InProgress,
    Complete,
    Rejected,
    Removed,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 6] = [
        TaskStatus::New,
        TaskStatus::Viewed,
        TaskStatus::InProgress,
        TaskStatus::Complete,
        TaskStatus::Rejected,
        TaskStatus::Removed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::New => "NEW",
            TaskStatus::Viewed => "VIEWED",
            TaskStatus::InProgress => "IN_PROGRESS",
            TaskStatus::Complete => "COMPLETE",
            TaskStatus::Rejected => "REJECTED",
            TaskStatus::Removed => "REMOVED",
        }
    }
}

/// A sample kit sent to or returned by an enrollee.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KitRequest {
    pub id: Uuid,
    pub status: KitRequestStatus,
    pub created_at: DateTime<Utc>,
    pub last_updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum KitRequestStatus {
    Created,
    Queued,
    Sent,
    Received,
    Errored,
    Deactivated,
}

impl KitRequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            KitRequestStatus::Created => "CREATED",
            KitRequestStatus::Queued => "QUEUED",
            KitRequestStatus::Sent => "SENT",
            KitRequestStatus::Received => "RECEIVED",
            KitRequestStatus::Errored => "ERRORED",
            KitRequestStatus::Deactivated => "DEACTIVATED",
        }
    }
}

/// The portal-wide login account backing one or more enrollees.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantUser {
    pub id: Uuid,
    pub username: String,
    pub created_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

/// The per-portal registration of a participant user.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortalParticipantUser {
    pub id: Uuid,
    pub profile_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

/// A family grouping of enrollees.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Family {
    pub id: Uuid,
    pub shortcode: String,
}

/// A survey whose questions are searchable through `{answer...}` terms.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SurveyDefinition {
    pub stable_id: String,
    pub questions: Vec<SurveyQuestionDefinition>,
}

/// One question of a survey, as advertised to the facet catalog.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SurveyQuestionDefinition {
    pub survey_stable_id: String,
    pub question_stable_id: String,
    /// Raw JSON array of `{stableId, text}` options, straight from the survey
    /// definition. Empty or unparseable JSON yields a choiceless facet.
    pub choices_json: Option<String>,
    pub allow_multiple: bool,
    pub allow_other_description: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn answer_value_follows_declared_type() {
        let answer = Answer {
            answer_type: Some(AnswerValueType::Number),
            number_value: Some(42.0),
            string_value: Some("ignored".into()),
            ..Default::default()
        };
        assert_eq!(answer.to_search_value(), SearchValue::Number(42.0));

        let boolean = Answer {
            answer_type: Some(AnswerValueType::Boolean),
            boolean_value: Some(true),
            ..Default::default()
        };
        assert_eq!(boolean.to_search_value(), SearchValue::Boolean(true));
    }

    #[test]
    fn untyped_answer_falls_back_to_string() {
        let answer = Answer {
            string_value: Some("sure".into()),
            ..Default::default()
        };
        assert_eq!(
            answer.to_search_value(),
            SearchValue::String("sure".into())
        );
        assert!(Answer::default().to_search_value().is_absent());
    }

    #[test]
    fn status_names_match_stored_values() {
        assert_eq!(TaskStatus::InProgress.as_str(), "IN_PROGRESS");
        assert_eq!(KitRequestStatus::Errored.as_str(), "ERRORED");
        let json = serde_json::to_value(TaskStatus::InProgress).unwrap();
        assert_eq!(json, "IN_PROGRESS");
    }
}
