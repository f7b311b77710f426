//! Search terms: the leaves of a parsed expression.
//!
//! A term is anything that can sit on one side of a comparison: a literal,
//! a function application, or an enrollee datum addressed by a `{variable}`.
//! Each variable prefix maps to one resolver in [`TERM_RESOLVERS`]; resolvers
//! validate the variable's shape at parse time so evaluation and SQL
//! compilation cannot fail later.

use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;
use uuid::Uuid;

use crate::error::ParseError;
use crate::sql::{JoinClause, SelectClause, SqlFragment, SqlParam};
use crate::store::{EnrolleeSearchContext, ParticipantStore, SurveyCatalog};
use crate::value::{SearchValue, SearchValueTypeDefinition};

pub mod age;
pub mod answer;
pub mod enrollee;
pub mod family;
pub mod functions;
pub mod kit;
pub mod portal_user;
pub mod profile;
pub mod task;
pub mod user;

pub use age::AgeTerm;
pub use answer::AnswerTerm;
pub use enrollee::EnrolleeTerm;
pub use family::FamilyTerm;
pub use functions::SearchFunction;
pub use kit::LatestKitTerm;
pub use portal_user::PortalUserTerm;
pub use profile::ProfileTerm;
pub use task::TaskTerm;
pub use user::UserTerm;

/// One side of a comparison. The set of term kinds is closed: adding a new
/// prefix means adding a variant here and a resolver to [`TERM_RESOLVERS`].
#[derive(Debug, Clone, PartialEq)]
pub enum SearchTerm {
    /// A literal from the rule text (`'string'`, number, boolean, `null`).
    Value(SearchValue),
    Function(SearchFunction),
    Age(AgeTerm),
    Answer(AnswerTerm),
    Enrollee(EnrolleeTerm),
    Family(FamilyTerm),
    LatestKit(LatestKitTerm),
    PortalUser(PortalUserTerm),
    Profile(ProfileTerm),
    Task(TaskTerm),
    User(UserTerm),
}

impl SearchTerm {
    /// Pull this term's value for one enrollee. Missing data extracts to
    /// [`SearchValue::Absent`], never an error.
    pub fn extract(
        &self,
        context: &EnrolleeSearchContext,
        store: &dyn ParticipantStore,
    ) -> SearchValue {
        match self {
            SearchTerm::Value(value) => value.clone(),
            SearchTerm::Function(function) => function.extract(context, store),
            SearchTerm::Age(term) => term.extract(context),
            SearchTerm::Answer(term) => term.extract(context, store),
            SearchTerm::Enrollee(term) => term.extract(context),
            SearchTerm::Family(term) => term.extract(context, store),
            SearchTerm::LatestKit(term) => term.extract(context, store),
            SearchTerm::PortalUser(term) => term.extract(context, store),
            SearchTerm::Profile(term) => term.extract(context),
            SearchTerm::Task(term) => term.extract(context, store),
            SearchTerm::User(term) => term.extract(context, store),
        }
    }

    /// Joins the compiled query needs before this term's SQL is valid.
    pub fn join_clauses(&self) -> Vec<JoinClause> {
        match self {
            SearchTerm::Value(_) | SearchTerm::Age(_) | SearchTerm::Enrollee(_) => Vec::new(),
            SearchTerm::Function(function) => function.join_clauses(),
            SearchTerm::Answer(term) => term.join_clauses(),
            SearchTerm::Family(term) => term.join_clauses(),
            SearchTerm::LatestKit(term) => term.join_clauses(),
            SearchTerm::PortalUser(term) => term.join_clauses(),
            SearchTerm::Profile(term) => term.join_clauses(),
            SearchTerm::Task(term) => term.join_clauses(),
            SearchTerm::User(term) => term.join_clauses(),
        }
    }

    /// Auxiliary tables whose rows should be returned alongside each hit.
    pub fn select_clauses(&self) -> Vec<SelectClause> {
        match self {
            SearchTerm::Function(function) => function.select_clauses(),
            SearchTerm::Answer(term) => term.select_clauses(),
            SearchTerm::Family(term) => term.select_clauses(),
            SearchTerm::LatestKit(term) => term.select_clauses(),
            SearchTerm::PortalUser(term) => term.select_clauses(),
            SearchTerm::Profile(term) => term.select_clauses(),
            SearchTerm::Task(term) => term.select_clauses(),
            SearchTerm::User(term) => term.select_clauses(),
            _ => Vec::new(),
        }
    }

    /// Whether this term reaches into a sibling study through a
    /// `["study"]` discriminator, directly or through a function argument.
    pub fn is_cross_study(&self) -> bool {
        match self {
            SearchTerm::Answer(term) => term.is_cross_study(),
            SearchTerm::Function(function) => function.is_cross_study(),
            _ => false,
        }
    }

    /// An extra predicate that must hold whenever this term is used, ANDed
    /// into the WHERE clause next to the comparison.
    pub fn required_condition(&self) -> Option<SqlFragment> {
        match self {
            SearchTerm::Function(function) => function.required_condition(),
            SearchTerm::LatestKit(term) => Some(term.required_condition()),
            _ => None,
        }
    }

    /// The SQL expression this term compiles to: a `?` placeholder for
    /// literals, a column reference (or column expression) otherwise.
    pub fn term_clause(&self) -> String {
        match self {
            SearchTerm::Value(_) => "?".to_string(),
            SearchTerm::Function(function) => function.term_clause(),
            SearchTerm::Age(term) => term.term_clause(),
            SearchTerm::Answer(term) => term.term_clause(),
            SearchTerm::Enrollee(term) => term.term_clause(),
            SearchTerm::Family(term) => term.term_clause(),
            SearchTerm::LatestKit(term) => term.term_clause(),
            SearchTerm::PortalUser(term) => term.term_clause(),
            SearchTerm::Profile(term) => term.term_clause(),
            SearchTerm::Task(term) => term.term_clause(),
            SearchTerm::User(term) => term.term_clause(),
        }
    }

    /// Parameters bound by the placeholders inside [`term_clause`].
    ///
    /// [`term_clause`]: SearchTerm::term_clause
    pub fn bound_values(&self) -> Vec<SqlParam> {
        match self {
            SearchTerm::Value(value) => vec![SqlParam::from(value)],
            SearchTerm::Function(function) => function.bound_values(),
            _ => Vec::new(),
        }
    }

    /// The declared type of this term, used for parse-time comparison checks.
    pub fn value_type(&self) -> SearchValueTypeDefinition {
        match self {
            SearchTerm::Value(value) => SearchValueTypeDefinition::of(value.value_type()),
            SearchTerm::Function(function) => function.value_type(),
            SearchTerm::Age(term) => term.value_type(),
            SearchTerm::Answer(term) => term.value_type(),
            SearchTerm::Enrollee(term) => term.value_type(),
            SearchTerm::Family(term) => term.value_type(),
            SearchTerm::LatestKit(term) => term.value_type(),
            SearchTerm::PortalUser(term) => term.value_type(),
            SearchTerm::Profile(term) => term.value_type(),
            SearchTerm::Task(term) => term.value_type(),
            SearchTerm::User(term) => term.value_type(),
        }
    }
}

/// The variable prefixes the engine understands, in match order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TermResolver {
    Age,
    Answer,
    Enrollee,
    Family,
    LatestKit,
    PortalUser,
    Profile,
    Task,
    User,
}

pub const TERM_RESOLVERS: [TermResolver; 9] = [
    TermResolver::Age,
    TermResolver::Answer,
    TermResolver::Enrollee,
    TermResolver::Family,
    TermResolver::LatestKit,
    TermResolver::PortalUser,
    TermResolver::Profile,
    TermResolver::Task,
    TermResolver::User,
];

impl TermResolver {
    pub fn term_name(&self) -> &'static str {
        match self {
            TermResolver::Age => "age",
            TermResolver::Answer => "answer",
            TermResolver::Enrollee => "enrollee",
            TermResolver::Family => "family",
            TermResolver::LatestKit => "latestKit",
            TermResolver::PortalUser => "portalUser",
            TermResolver::Profile => "profile",
            TermResolver::Task => "task",
            TermResolver::User => "user",
        }
    }

    /// Whether a variable's text belongs to this resolver. Matching is on the
    /// whole prefix, so `user` does not claim `userFoo.bar`.
    fn claims(&self, variable: &str) -> bool {
        let name = self.term_name();
        variable == name
            || variable.starts_with(&format!("{name}."))
            || variable.starts_with(&format!("{name}["))
    }

    /// Build the term for a claimed variable. `study` is the bracketed
    /// cross-study discriminator if one was present; `args` is everything
    /// after the prefix (and discriminator), without the leading dot.
    fn parse(&self, variable: &str, study: Option<&str>, args: &str) -> Result<SearchTerm, ParseError> {
        if study.is_some() && !matches!(self, TermResolver::Answer) {
            return Err(ParseError::UnsupportedCrossStudy {
                prefix: self.term_name().to_string(),
            });
        }
        match self {
            TermResolver::Age => {
                if !args.is_empty() {
                    return Err(ParseError::UnknownField {
                        term: "age".to_string(),
                        field: args.to_string(),
                    });
                }
                Ok(SearchTerm::Age(AgeTerm))
            }
            TermResolver::Answer => {
                let parts: Vec<&str> = args.split('.').collect();
                if parts.len() != 2 || parts.iter().any(|part| part.is_empty()) {
                    return Err(ParseError::MalformedVariable {
                        variable: variable.to_string(),
                        expected: "{answer.surveyStableId.questionStableId}",
                    });
                }
                Ok(SearchTerm::Answer(AnswerTerm::new(study, parts[0], parts[1])?))
            }
            TermResolver::Enrollee => Ok(SearchTerm::Enrollee(EnrolleeTerm::new(args)?)),
            TermResolver::Family => Ok(SearchTerm::Family(FamilyTerm::new(args)?)),
            TermResolver::LatestKit => Ok(SearchTerm::LatestKit(LatestKitTerm::new(args)?)),
            TermResolver::PortalUser => Ok(SearchTerm::PortalUser(PortalUserTerm::new(args)?)),
            TermResolver::Profile => Ok(SearchTerm::Profile(ProfileTerm::new(args)?)),
            TermResolver::Task => {
                let parts: Vec<&str> = args.split('.').collect();
                if parts.len() != 2 || parts.iter().any(|part| part.is_empty()) {
                    return Err(ParseError::MalformedVariable {
                        variable: variable.to_string(),
                        expected: "{task.targetStableId.field}",
                    });
                }
                Ok(SearchTerm::Task(TaskTerm::new(parts[0], parts[1])?))
            }
            TermResolver::User => Ok(SearchTerm::User(UserTerm::new(args)?)),
        }
    }

    /// The facets this resolver advertises for one study environment, keyed
    /// by the variable text a rule would use (without braces).
    pub fn facets(
        &self,
        study_environment_id: Uuid,
        catalog: &dyn SurveyCatalog,
    ) -> BTreeMap<String, SearchValueTypeDefinition> {
        let mut facets = BTreeMap::new();
        match self {
            TermResolver::Age => {
                facets.insert("age".to_string(), age::type_definition());
            }
            TermResolver::Answer => {
                for survey in catalog.surveys(study_environment_id) {
                    for question in &survey.questions {
                        facets.insert(
                            format!(
                                "answer.{}.{}",
                                question.survey_stable_id, question.question_stable_id
                            ),
                            answer::question_type_definition(question),
                        );
                    }
                }
            }
            TermResolver::Task => {
                for survey in catalog.surveys(study_environment_id) {
                    for (field, definition) in task::fields() {
                        facets.insert(
                            format!("task.{}.{}", survey.stable_id, field),
                            definition,
                        );
                    }
                }
            }
            TermResolver::Enrollee => prefix_fields(&mut facets, "enrollee", enrollee::fields()),
            TermResolver::Family => prefix_fields(&mut facets, "family", family::fields()),
            TermResolver::LatestKit => prefix_fields(&mut facets, "latestKit", kit::fields()),
            TermResolver::PortalUser => {
                prefix_fields(&mut facets, "portalUser", portal_user::fields())
            }
            TermResolver::Profile => prefix_fields(&mut facets, "profile", profile::fields()),
            TermResolver::User => prefix_fields(&mut facets, "user", user::fields()),
        }
        facets
    }
}

fn prefix_fields(
    facets: &mut BTreeMap<String, SearchValueTypeDefinition>,
    prefix: &str,
    fields: BTreeMap<&'static str, SearchValueTypeDefinition>,
) {
    for (field, definition) in fields {
        facets.insert(format!("{prefix}.{field}"), definition);
    }
}

/// Resolve the inside of a `{...}` variable to a term.
///
/// Handles the optional `["study"]` discriminator, e.g.
/// `answer["heartstudy"].survey1.q1`, then hands the remaining dotted path to
/// the claiming resolver.
pub fn resolve_variable(variable: &str) -> Result<SearchTerm, ParseError> {
    let resolver = TERM_RESOLVERS
        .iter()
        .find(|resolver| resolver.claims(variable))
        .ok_or_else(|| ParseError::UnknownTerm {
            prefix: variable
                .split(['.', '['])
                .next()
                .unwrap_or(variable)
                .to_string(),
            valid: TERM_RESOLVERS
                .iter()
                .map(|resolver| resolver.term_name())
                .collect::<Vec<_>>()
                .join(", "),
        })?;

    let mut rest = &variable[resolver.term_name().len()..];
    let mut study = None;
    if let Some(bracketed) = rest.strip_prefix("[\"") {
        let end = bracketed
            .find("\"]")
            .ok_or_else(|| ParseError::MalformedVariable {
                variable: variable.to_string(),
                expected: "a [\"studyName\"] discriminator closed with \"]",
            })?;
        study = Some(&bracketed[..end]);
        rest = &bracketed[end + 2..];
    }
    let args = match rest.strip_prefix('.') {
        Some(stripped) => stripped,
        None if rest.is_empty() => "",
        None => {
            return Err(ParseError::MalformedVariable {
                variable: variable.to_string(),
                expected: "a dotted field path after the term prefix",
            });
        }
    };
    resolver.parse(variable, study, args)
}

static IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_]+$").expect("valid identifier regex"));

/// Reject anything but `[A-Za-z0-9_]+`. Every identifier that reaches SQL
/// text (aliases, study names) passes through here at construction, which is
/// the engine's injection defense.
pub(crate) fn validate_identifier(value: &str) -> Result<(), ParseError> {
    if IDENTIFIER.is_match(value) {
        Ok(())
    } else {
        Err(ParseError::InvalidIdentifier {
            value: value.to_string(),
        })
    }
}

/// camelCase field name to the snake_case column it maps to.
pub(crate) fn to_snake_case(field: &str) -> String {
    let mut column = String::with_capacity(field.len() + 4);
    for ch in field.chars() {
        if ch.is_ascii_uppercase() {
            column.push('_');
            column.push(ch.to_ascii_lowercase());
        } else {
            column.push(ch);
        }
    }
    column
}

/// The join chain that reaches a sibling study's enrollee through the shared
/// profile: `profile -> enrollee_<study> -> study_environment_<study> ->
/// study_<study>`, filtered to the named study. The study name is
/// identifier-validated before it is inlined.
pub(crate) fn join_clauses_for_study(study_name: &str) -> Vec<JoinClause> {
    let enrollee_alias = format!("enrollee_{study_name}");
    let env_alias = format!("study_environment_{study_name}");
    let study_alias = format!("study_{study_name}");
    vec![
        JoinClause::inner(
            "enrollee",
            enrollee_alias.clone(),
            SqlFragment::new(format!("profile.id = {enrollee_alias}.profile_id")),
        ),
        JoinClause::inner(
            "study_environment",
            env_alias.clone(),
            SqlFragment::new(format!(
                "{enrollee_alias}.study_environment_id = {env_alias}.id"
            )),
        ),
        JoinClause::inner(
            "study",
            study_alias.clone(),
            SqlFragment::with_params(
                format!("{env_alias}.study_id = {study_alias}.id AND {study_alias}.name = ?"),
                vec![SqlParam::string(study_name)],
            ),
        ),
    ]
}
