#![allow(dead_code)]

//! In-memory participant data shared by the integration tests.

use chrono::{DateTime, TimeZone, Utc};
use uuid::Uuid;

use cohort_search::model::{
    Answer, Enrollee, Family, KitRequest, KitRequestStatus, ParticipantTask, ParticipantUser,
    PortalParticipantUser, TaskStatus,
};
use cohort_search::store::ParticipantStore;

#[derive(Default)]
pub struct InMemoryStore {
    pub answers: Vec<(Uuid, Answer)>,
    /// (profile_id, study_name, answer) rows for cross-study lookups.
    pub cross_study_answers: Vec<(Uuid, String, Answer)>,
    pub tasks: Vec<(Uuid, ParticipantTask)>,
    pub kits: Vec<(Uuid, KitRequest)>,
    pub users: Vec<ParticipantUser>,
    pub portal_users: Vec<PortalParticipantUser>,
    pub families: Vec<(Uuid, Family)>,
}

impl InMemoryStore {
    pub fn add_answer(&mut self, enrollee_id: Uuid, survey: &str, question: &str, value: &str) {
        self.answers.push((
            enrollee_id,
            Answer {
                survey_stable_id: survey.to_string(),
                question_stable_id: question.to_string(),
                string_value: Some(value.to_string()),
                ..Default::default()
            },
        ));
    }

    pub fn add_cross_study_answer(
        &mut self,
        profile_id: Uuid,
        study: &str,
        survey: &str,
        question: &str,
        value: &str,
    ) {
        self.cross_study_answers.push((
            profile_id,
            study.to_string(),
            Answer {
                survey_stable_id: survey.to_string(),
                question_stable_id: question.to_string(),
                string_value: Some(value.to_string()),
                ..Default::default()
            },
        ));
    }

    pub fn add_task(&mut self, enrollee_id: Uuid, target: &str, status: TaskStatus) {
        self.tasks.push((
            enrollee_id,
            ParticipantTask {
                id: Uuid::new_v4(),
                target_stable_id: target.to_string(),
                status,
                created_at: instant(2024, 1, 1),
                completed_at: None,
            },
        ));
    }

    pub fn add_kit(
        &mut self,
        enrollee_id: Uuid,
        status: KitRequestStatus,
        last_updated_at: DateTime<Utc>,
    ) {
        self.kits.push((
            enrollee_id,
            KitRequest {
                id: Uuid::new_v4(),
                status,
                created_at: last_updated_at,
                last_updated_at,
            },
        ));
    }

    pub fn add_family(&mut self, enrollee_id: Uuid, shortcode: &str) {
        self.families.push((
            enrollee_id,
            Family {
                id: Uuid::new_v4(),
                shortcode: shortcode.to_string(),
            },
        ));
    }
}

impl ParticipantStore for InMemoryStore {
    fn find_answer(&self, enrollee_id: Uuid, survey: &str, question: &str) -> Option<Answer> {
        self.answers
            .iter()
            .find(|(owner, answer)| {
                *owner == enrollee_id
                    && answer.survey_stable_id == survey
                    && answer.question_stable_id == question
            })
            .map(|(_, answer)| answer.clone())
    }

    fn find_answer_for_profile(
        &self,
        profile_id: Uuid,
        study_name: &str,
        survey: &str,
        question: &str,
    ) -> Option<Answer> {
        self.cross_study_answers
            .iter()
            .find(|(owner, study, answer)| {
                *owner == profile_id
                    && study == study_name
                    && answer.survey_stable_id == survey
                    && answer.question_stable_id == question
            })
            .map(|(_, _, answer)| answer.clone())
    }

    fn find_task(&self, enrollee_id: Uuid, target: &str) -> Option<ParticipantTask> {
        self.tasks
            .iter()
            .find(|(owner, task)| *owner == enrollee_id && task.target_stable_id == target)
            .map(|(_, task)| task.clone())
    }

    fn kits_for_enrollee(&self, enrollee_id: Uuid) -> Vec<KitRequest> {
        self.kits
            .iter()
            .filter(|(owner, _)| *owner == enrollee_id)
            .map(|(_, kit)| kit.clone())
            .collect()
    }

    fn find_user(&self, participant_user_id: Uuid) -> Option<ParticipantUser> {
        self.users
            .iter()
            .find(|user| user.id == participant_user_id)
            .cloned()
    }

    fn find_portal_user(&self, profile_id: Uuid) -> Option<PortalParticipantUser> {
        self.portal_users
            .iter()
            .find(|portal_user| portal_user.profile_id == profile_id)
            .cloned()
    }

    fn families_for_enrollee(&self, enrollee_id: Uuid) -> Vec<Family> {
        self.families
            .iter()
            .filter(|(owner, _)| *owner == enrollee_id)
            .map(|(_, family)| family.clone())
            .collect()
    }
}

pub fn enrollee() -> Enrollee {
    Enrollee {
        id: Uuid::new_v4(),
        shortcode: "AABBCC".to_string(),
        study_environment_id: Uuid::new_v4(),
        participant_user_id: Uuid::new_v4(),
        profile_id: Uuid::new_v4(),
        subject: true,
        consented: false,
        created_at: instant(2024, 3, 1),
    }
}

pub fn instant(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 0, 0, 0).unwrap()
}
