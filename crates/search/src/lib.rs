//! Enrollee search expression engine for research study platforms.
//!
//! Study staff write rules like
//! `{age} >= 18 and {answer.basics.diagnosis} = 'dx1'` to define cohorts.
//! This crate parses those rules into a typed expression tree and gives that
//! tree two interchangeable executions:
//!
//! - **Evaluate** one enrollee in memory against a [`ParticipantStore`],
//!   e.g. to re-check membership when a participant submits a survey.
//! - **Compile** to a single parameterized SQL query over the `enrollee`
//!   table, e.g. to list a cohort for the staff dashboard.
//!
//! The two executions are kept semantically aligned: a rule matches an
//! enrollee in memory exactly when the compiled query would return their row.
//!
//! Each `{variable}` prefix (`profile`, `answer`, `task`, `enrollee`, `age`,
//! `family`, `user`, `portalUser`, `latestKit`) is handled by a resolver that
//! validates the variable at parse time. All identifiers that end up in SQL
//! text are restricted to `[A-Za-z0-9_]`; everything else is bound as a `?`
//! parameter. [`facets_for`] enumerates the searchable fields of a study
//! environment so rule-builder UIs can stay in sync with the grammar.
//!
//! # Quick start
//!
//! ```
//! use cohort_search::model::{Answer, Enrollee, Family, KitRequest, ParticipantTask,
//!     ParticipantUser, PortalParticipantUser};
//! use cohort_search::{parse_rule, EnrolleeSearchContext, ParticipantStore};
//! use uuid::Uuid;
//!
//! struct OneAnswer(Answer);
//!
//! impl ParticipantStore for OneAnswer {
//!     fn find_answer(&self, _: Uuid, survey: &str, question: &str) -> Option<Answer> {
//!         (survey == self.0.survey_stable_id && question == self.0.question_stable_id)
//!             .then(|| self.0.clone())
//!     }
//!     fn find_answer_for_profile(&self, _: Uuid, _: &str, _: &str, _: &str) -> Option<Answer> {
//!         None
//!     }
//!     fn find_task(&self, _: Uuid, _: &str) -> Option<ParticipantTask> { None }
//!     fn kits_for_enrollee(&self, _: Uuid) -> Vec<KitRequest> { Vec::new() }
//!     fn find_user(&self, _: Uuid) -> Option<ParticipantUser> { None }
//!     fn find_portal_user(&self, _: Uuid) -> Option<PortalParticipantUser> { None }
//!     fn families_for_enrollee(&self, _: Uuid) -> Vec<Family> { Vec::new() }
//! }
//!
//! let rule = parse_rule("{answer.basics.diagnosis} = 'dx1' and {enrollee.consented} = true")?;
//!
//! // in-memory evaluation of one enrollee
//! let store = OneAnswer(Answer {
//!     survey_stable_id: "basics".into(),
//!     question_stable_id: "diagnosis".into(),
//!     string_value: Some("dx1".into()),
//!     ..Default::default()
//! });
//! let enrollee = Enrollee { consented: true, ..Default::default() };
//! assert!(rule.evaluate(&EnrolleeSearchContext::new(enrollee), &store));
//!
//! // the same rule as a parameterized query
//! let compiled = rule.compile(Uuid::new_v4());
//! assert!(compiled.sql.contains("LEFT JOIN answer answer_diagnosis"));
//! assert!(compiled.sql.contains("enrollee.consented = ?"));
//! # Ok::<(), cohort_search::SearchError>(())
//! ```

pub mod error;
pub mod expression;
pub mod facets;
pub mod model;
pub mod parser;
pub mod sql;
pub mod store;
pub mod terms;
pub mod value;

pub use error::{ParseError, SearchError, SearchResult};
pub use expression::{ComparisonOperator, SearchExpression};
pub use facets::facets_for;
pub use parser::parse_rule;
pub use sql::{CompiledSearch, SelectClause, SqlParam};
pub use store::{EnrolleeSearchContext, ParticipantStore, SurveyCatalog};
pub use terms::SearchTerm;
pub use value::{QuestionChoice, SearchValue, SearchValueType, SearchValueTypeDefinition};
