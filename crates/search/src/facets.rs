//! The facet catalog: every searchable variable for one study environment,
//! keyed by the text a rule would use inside `{}`. Rule-builder UIs consume
//! this to offer fields, operators and choice lists.

use std::collections::BTreeMap;

use uuid::Uuid;

use crate::store::SurveyCatalog;
use crate::terms::TERM_RESOLVERS;
use crate::value::SearchValueTypeDefinition;

/// Enumerate all facets a rule against this study environment may reference.
/// Static term fields are always present; answer and task facets follow the
/// environment's survey definitions.
pub fn facets_for(
    study_environment_id: Uuid,
    catalog: &dyn SurveyCatalog,
) -> BTreeMap<String, SearchValueTypeDefinition> {
    let mut facets = BTreeMap::new();
    for resolver in TERM_RESOLVERS {
        facets.extend(resolver.facets(study_environment_id, catalog));
    }
    facets
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{SurveyDefinition, SurveyQuestionDefinition};
    use crate::value::SearchValueType;

    struct StubCatalog {
        surveys: Vec<SurveyDefinition>,
    }

    impl SurveyCatalog for StubCatalog {
        fn surveys(&self, _study_environment_id: Uuid) -> Vec<SurveyDefinition> {
            self.surveys.clone()
        }
    }

    fn catalog_with_one_survey() -> StubCatalog {
        StubCatalog {
            surveys: vec![SurveyDefinition {
                stable_id: "basics".into(),
                questions: vec![SurveyQuestionDefinition {
                    survey_stable_id: "basics".into(),
                    question_stable_id: "diagnosis".into(),
                    choices_json: Some(r#"[{"stableId":"dx1","text":"Type 1"}]"#.into()),
                    allow_multiple: false,
                    allow_other_description: true,
                }],
            }],
        }
    }

    #[test]
    fn static_facets_are_always_present() {
        let facets = facets_for(Uuid::nil(), &StubCatalog { surveys: vec![] });
        assert_eq!(
            facets["age"],
            SearchValueTypeDefinition::of(SearchValueType::Number)
        );
        assert!(facets.contains_key("enrollee.consented"));
        assert!(facets.contains_key("profile.mailingAddress.postalCode"));
        assert!(facets.contains_key("latestKit.status"));
        assert!(facets.contains_key("user.lastLogin"));
        assert!(facets.contains_key("family.shortcode"));
        assert!(!facets.keys().any(|key| key.starts_with("answer.")));
    }

    #[test]
    fn surveys_contribute_answer_and_task_facets() {
        let facets = facets_for(Uuid::nil(), &catalog_with_one_survey());
        let answer = &facets["answer.basics.diagnosis"];
        assert_eq!(answer.value_type, SearchValueType::String);
        assert_eq!(answer.choices[0].stable_id, "dx1");
        assert!(answer.allow_other_description);

        assert_eq!(
            facets["task.basics.assigned"].value_type,
            SearchValueType::Boolean
        );
        assert!(!facets["task.basics.status"].choices.is_empty());
    }
}
