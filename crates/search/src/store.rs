//! Storage seams the interpreter evaluates against.
//!
//! The engine never talks to a database itself. Callers that want in-memory
//! evaluation implement [`ParticipantStore`]; callers that want the facet
//! catalog implement [`SurveyCatalog`]. The SQL compiler needs neither.

use uuid::Uuid;

use crate::model::{
    Answer, Enrollee, Family, KitRequest, ParticipantTask, ParticipantUser,
    PortalParticipantUser, Profile, SurveyDefinition,
};

/// The enrollee being evaluated, with their profile if it has been loaded.
#[derive(Debug, Clone)]
pub struct EnrolleeSearchContext {
    pub enrollee: Enrollee,
    pub profile: Option<Profile>,
}

impl EnrolleeSearchContext {
    pub fn new(enrollee: Enrollee) -> Self {
        EnrolleeSearchContext {
            enrollee,
            profile: None,
        }
    }

    pub fn with_profile(enrollee: Enrollee, profile: Profile) -> Self {
        EnrolleeSearchContext {
            enrollee,
            profile: Some(profile),
        }
    }
}

/// Read access to the participant data terms extract from.
///
/// Lookups return `None` (or an empty `Vec`) when the datum does not exist;
/// terms turn that into [`SearchValue::Absent`](crate::value::SearchValue).
pub trait ParticipantStore: Send + Sync {
    /// The enrollee's answer to one question of one survey.
    fn find_answer(
        &self,
        enrollee_id: Uuid,
        survey_stable_id: &str,
        question_stable_id: &str,
    ) -> Option<Answer>;

    /// An answer given by the same profile in a sibling study. Returns `None`
    /// when the study does not exist or the profile never answered there.
    fn find_answer_for_profile(
        &self,
        profile_id: Uuid,
        study_name: &str,
        survey_stable_id: &str,
        question_stable_id: &str,
    ) -> Option<Answer>;

    /// The enrollee's task for one target (survey or consent) stable id.
    fn find_task(&self, enrollee_id: Uuid, target_stable_id: &str) -> Option<ParticipantTask>;

    /// All kit requests for the enrollee, in any order.
    fn kits_for_enrollee(&self, enrollee_id: Uuid) -> Vec<KitRequest>;

    fn find_user(&self, participant_user_id: Uuid) -> Option<ParticipantUser>;

    fn find_portal_user(&self, profile_id: Uuid) -> Option<PortalParticipantUser>;

    fn families_for_enrollee(&self, enrollee_id: Uuid) -> Vec<Family>;
}

/// Read access to survey definitions, used to enumerate answer and task
/// facets for a study environment.
pub trait SurveyCatalog: Send + Sync {
    fn surveys(&self, study_environment_id: Uuid) -> Vec<SurveyDefinition>;
}
