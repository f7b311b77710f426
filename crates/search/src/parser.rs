//! Recursive-descent parser for the enrollee search rule language.
//!
//! Grammar, loosest-binding first:
//!
//! ```text
//! rule       := or_expr
//! or_expr    := and_expr ( 'or' and_expr )*
//! and_expr   := unary ( 'and' unary )*
//! unary      := '!' unary | primary
//! primary    := '(' or_expr ')' | 'include' '(' term ')' | comparison
//! comparison := term operator term
//! operator   := '=' | '!=' | '>' | '<' | '>=' | '<=' | 'contains'
//! term       := 'string' | number | boolean | 'null'
//!             | '{' variable '}' | function '(' term (',' term)* ')'
//! ```
//!
//! A blank rule is valid and parses to [`SearchExpression::All`].

use crate::error::ParseError;
use crate::expression::{ComparisonOperator, SearchExpression};
use crate::terms::{SearchFunction, SearchTerm, resolve_variable};
use crate::value::SearchValue;

/// Parse a rule string into an expression ready to evaluate or compile.
pub fn parse_rule(rule: &str) -> Result<SearchExpression, ParseError> {
    if rule.trim().is_empty() {
        return Ok(SearchExpression::All);
    }
    let mut parser = RuleParser::new(rule);
    let expression = parser.parse_or_expr()?;
    parser.skip_whitespace();
    if parser.pos < parser.input.len() {
        return Err(ParseError::syntax(
            format!("unexpected input '{}'", parser.remaining()),
            parser.pos,
        ));
    }
    Ok(expression)
}

struct RuleParser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> RuleParser<'a> {
    fn new(input: &'a str) -> Self {
        RuleParser { input, pos: 0 }
    }

    fn parse_or_expr(&mut self) -> Result<SearchExpression, ParseError> {
        let mut expression = self.parse_and_expr()?;
        loop {
            self.skip_whitespace();
            if self.consume_keyword("or") {
                let right = self.parse_and_expr()?;
                expression = SearchExpression::or(expression, right);
            } else {
                return Ok(expression);
            }
        }
    }

    fn parse_and_expr(&mut self) -> Result<SearchExpression, ParseError> {
        let mut expression = self.parse_unary()?;
        loop {
            self.skip_whitespace();
            if self.consume_keyword("and") {
                let right = self.parse_unary()?;
                expression = SearchExpression::and(expression, right);
            } else {
                return Ok(expression);
            }
        }
    }

    fn parse_unary(&mut self) -> Result<SearchExpression, ParseError> {
        self.skip_whitespace();
        if self.consume_char('!') {
            let inner = self.parse_unary()?;
            return Ok(SearchExpression::not(inner));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<SearchExpression, ParseError> {
        self.skip_whitespace();
        if self.consume_keyword("include") {
            self.expect_char('(')?;
            let term = self.parse_term()?;
            self.expect_char(')')?;
            return Ok(SearchExpression::Include(term));
        }
        if self.consume_char('(') {
            let expression = self.parse_or_expr()?;
            self.expect_char(')')?;
            return Ok(expression);
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<SearchExpression, ParseError> {
        let left = self.parse_term()?;
        let operator = self.parse_operator()?;
        let right = self.parse_term()?;
        SearchExpression::comparison(left, operator, right)
    }

    fn parse_operator(&mut self) -> Result<ComparisonOperator, ParseError> {
        self.skip_whitespace();
        // two-character operators before their one-character prefixes
        for (text, operator) in [
            (">=", ComparisonOperator::GreaterThanEq),
            ("<=", ComparisonOperator::LessThanEq),
            ("!=", ComparisonOperator::NotEquals),
            ("=", ComparisonOperator::Equals),
            (">", ComparisonOperator::GreaterThan),
            ("<", ComparisonOperator::LessThan),
        ] {
            if self.consume_literal(text) {
                return Ok(operator);
            }
        }
        if self.consume_keyword("contains") {
            return Ok(ComparisonOperator::Contains);
        }
        Err(ParseError::syntax("expected a comparison operator", self.pos))
    }

    fn parse_term(&mut self) -> Result<SearchTerm, ParseError> {
        self.skip_whitespace();
        match self.peek() {
            Some('\'') => self.parse_string_literal(),
            Some('{') => self.parse_variable(),
            Some(ch) if ch.is_ascii_digit() || ch == '-' => self.parse_number_literal(),
            Some(ch) if ch.is_ascii_alphabetic() => self.parse_word_term(),
            _ => Err(ParseError::syntax("expected a term", self.pos)),
        }
    }

    fn parse_string_literal(&mut self) -> Result<SearchTerm, ParseError> {
        let start = self.pos;
        self.pos += 1;
        match self.input[self.pos..].find('\'') {
            Some(offset) => {
                let value = &self.input[self.pos..self.pos + offset];
                self.pos += offset + 1;
                Ok(SearchTerm::Value(SearchValue::String(value.to_string())))
            }
            None => Err(ParseError::syntax("unterminated string literal", start)),
        }
    }

    fn parse_number_literal(&mut self) -> Result<SearchTerm, ParseError> {
        let start = self.pos;
        if self.peek() == Some('-') {
            self.pos += 1;
        }
        while matches!(self.peek(), Some(ch) if ch.is_ascii_digit() || ch == '.') {
            self.pos += 1;
        }
        let text = &self.input[start..self.pos];
        let value: f64 = text
            .parse()
            .map_err(|_| ParseError::syntax(format!("invalid number '{text}'"), start))?;
        Ok(SearchTerm::Value(SearchValue::Number(value)))
    }

    fn parse_variable(&mut self) -> Result<SearchTerm, ParseError> {
        let start = self.pos;
        self.pos += 1;
        match self.input[self.pos..].find('}') {
            Some(offset) => {
                let inner = &self.input[self.pos..self.pos + offset];
                self.pos += offset + 1;
                resolve_variable(inner)
            }
            None => Err(ParseError::syntax("unterminated variable", start)),
        }
    }

    /// A bare word is a boolean, `null`, or a function call.
    fn parse_word_term(&mut self) -> Result<SearchTerm, ParseError> {
        let start = self.pos;
        while matches!(self.peek(), Some(ch) if ch.is_ascii_alphanumeric() || ch == '_') {
            self.pos += 1;
        }
        let word = &self.input[start..self.pos];
        match word {
            "true" => Ok(SearchTerm::Value(SearchValue::Boolean(true))),
            "false" => Ok(SearchTerm::Value(SearchValue::Boolean(false))),
            "null" => Ok(SearchTerm::Value(SearchValue::Absent)),
            _ => {
                self.skip_whitespace();
                if !self.consume_char('(') {
                    return Err(ParseError::syntax(
                        format!("unexpected word '{word}'"),
                        start,
                    ));
                }
                let mut args = vec![self.parse_term()?];
                loop {
                    self.skip_whitespace();
                    if self.consume_char(',') {
                        args.push(self.parse_term()?);
                    } else {
                        break;
                    }
                }
                self.expect_char(')')?;
                Ok(SearchTerm::Function(SearchFunction::new(word, args)?))
            }
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.peek() {
            if ch.is_whitespace() {
                self.pos += ch.len_utf8();
            } else {
                break;
            }
        }
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn remaining(&self) -> &str {
        &self.input[self.pos..]
    }

    fn consume_char(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.pos += expected.len_utf8();
            true
        } else {
            false
        }
    }

    fn expect_char(&mut self, expected: char) -> Result<(), ParseError> {
        self.skip_whitespace();
        if self.consume_char(expected) {
            Ok(())
        } else {
            Err(ParseError::syntax(format!("expected '{expected}'"), self.pos))
        }
    }

    fn consume_literal(&mut self, literal: &str) -> bool {
        if self.input[self.pos..].starts_with(literal) {
            self.pos += literal.len();
            true
        } else {
            false
        }
    }

    /// Consume a keyword only at a word boundary, so `orange` is not `or`.
    fn consume_keyword(&mut self, keyword: &str) -> bool {
        if !self.input[self.pos..].starts_with(keyword) {
            return false;
        }
        let next = self.input[self.pos + keyword.len()..].chars().next();
        if matches!(next, Some(ch) if ch.is_ascii_alphanumeric() || ch == '_') {
            return false;
        }
        self.pos += keyword.len();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_rule_matches_everyone() {
        assert_eq!(parse_rule("").unwrap(), SearchExpression::All);
        assert_eq!(parse_rule("   ").unwrap(), SearchExpression::All);
    }

    #[test]
    fn and_binds_tighter_than_or() {
        let expression = parse_rule("1 = 1 or 2 = 2 and 3 = 4").unwrap();
        match expression {
            SearchExpression::Or(left, right) => {
                assert!(matches!(*left, SearchExpression::Comparison { .. }));
                assert!(matches!(*right, SearchExpression::And(_, _)));
            }
            other => panic!("expected Or at the root, got {other:?}"),
        }
    }

    #[test]
    fn parens_override_precedence() {
        let expression = parse_rule("(1 = 1 or 2 = 2) and 3 = 4").unwrap();
        assert!(matches!(expression, SearchExpression::And(_, _)));
    }

    #[test]
    fn negation_covers_the_following_comparison() {
        let expression = parse_rule("!{enrollee.consented} = true").unwrap();
        match expression {
            SearchExpression::Not(inner) => {
                assert!(matches!(*inner, SearchExpression::Comparison { .. }))
            }
            other => panic!("expected Not, got {other:?}"),
        }
        assert!(parse_rule("!(1 = 1 or 2 = 2)").is_ok());
    }

    #[test]
    fn all_operators_parse() {
        for rule in [
            "1 = 1",
            "1 != 2",
            "2 > 1",
            "1 < 2",
            "1 >= 1",
            "1 <= 2",
            "'John' contains 'oh'",
        ] {
            assert!(parse_rule(rule).is_ok(), "failed to parse {rule}");
        }
    }

    #[test]
    fn literals_parse_to_values() {
        assert!(parse_rule("'it''s' = 'x'").is_err(), "no escape support");
        assert!(parse_rule("-1.5 < 0").is_ok());
        assert!(parse_rule("{profile.givenName} = null").is_ok());
        assert!(parse_rule("{enrollee.subject} = true").is_ok());
    }

    #[test]
    fn functions_parse_with_nesting() {
        assert!(parse_rule("trim(lower('  HEY  ')) = 'hey'").is_ok());
        assert!(parse_rule("min(2, 8, 1) = 1").is_ok());
        assert!(matches!(
            parse_rule("median(1, 2) = 1"),
            Err(ParseError::UnknownFunction { .. })
        ));
    }

    #[test]
    fn include_takes_a_single_term() {
        assert!(parse_rule("include({family.shortcode})").is_ok());
        assert!(parse_rule(
            "{enrollee.consented} = true and include({user.username})"
        )
        .is_ok());
    }

    #[test]
    fn keyword_matching_respects_word_boundaries() {
        // `orange` starts with `or`; the parser must not split it
        assert!(parse_rule("'orange' = 'orange'").is_ok());
        assert!(parse_rule("'x' contains 'x' and 'andy' = 'andy'").is_ok());
    }

    #[test]
    fn trailing_garbage_is_a_syntax_error() {
        let err = parse_rule("1 = 1 whatever").unwrap_err();
        assert!(matches!(err, ParseError::Syntax { .. }));
        assert!(parse_rule("1 = ").is_err());
        assert!(parse_rule("( 1 = 1").is_err());
        assert!(parse_rule("{enrollee.shortcode = 'X'").is_err());
    }

    #[test]
    fn type_mismatches_surface_at_parse_time() {
        assert!(matches!(
            parse_rule("'5' = 5"),
            Err(ParseError::TypeMismatch { .. })
        ));
        assert!(matches!(
            parse_rule("{age} contains 'x'"),
            Err(ParseError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn variable_errors_propagate() {
        assert!(matches!(
            parse_rule("{martian.color} = 'green'"),
            Err(ParseError::UnknownTerm { .. })
        ));
        assert!(matches!(
            parse_rule("{answer.bad survey.q1} = 'x'"),
            Err(ParseError::InvalidIdentifier { .. })
        ));
    }
}
