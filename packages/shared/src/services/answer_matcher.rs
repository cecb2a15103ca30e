//! Free-text guess matching. Pure functions, no persistence.

use serde::{Deserialize, Serialize};

use crate::models::case::AcceptRules;

/// Characters removed outright, so "T.B." and "COVID-19!" collapse to "tb"
/// and "covid19".
const STRIPPED_PUNCTUATION: &[char] = &[
    '.', ',', ';', ':', '!', '?', '\'', '"', '`', '(', ')', '[', ']', '{', '}', '-', '_', '/',
    '\\', '*', '+', '#', '&', '~', '^', '|', '<', '>', '=',
];

/// Alias hits at most this long, with no spaces, count as abbreviations.
const ABBREVIATION_MAX_LEN: usize = 5;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MatchMethod {
    Exact,
    Alias,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchResult {
    pub matched: bool,
    pub method: Option<MatchMethod>,
}

impl MatchResult {
    fn miss() -> Self {
        MatchResult {
            matched: false,
            method: None,
        }
    }

    fn hit(method: MatchMethod) -> Self {
        MatchResult {
            matched: true,
            method: Some(method),
        }
    }
}

/// Lowercases, drops punctuation and collapses whitespace runs.
pub fn normalize(text: &str) -> String {
    let stripped: String = text
        .to_lowercase()
        .chars()
        .filter(|c| !STRIPPED_PUNCTUATION.contains(c))
        .collect();
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn contains_phrase(haystack: &str, phrase: &str) -> bool {
    if phrase.is_empty() {
        return false;
    }
    format!(" {} ", haystack).contains(&format!(" {} ", phrase))
}

fn is_abbreviation(normalized: &str) -> bool {
    !normalized.contains(' ') && normalized.chars().count() <= ABBREVIATION_MAX_LEN
}

fn violates_rules(guess: &str, method: MatchMethod, rules: &AcceptRules) -> bool {
    let missing_required = rules
        .require_all
        .iter()
        .map(|token| normalize(token))
        .any(|token| !token.is_empty() && !contains_phrase(guess, &token));
    if missing_required {
        return true;
    }

    let has_forbidden = rules
        .forbid_any
        .iter()
        .map(|token| normalize(token))
        .any(|token| contains_phrase(guess, &token));
    if has_forbidden {
        return true;
    }

    if method == MatchMethod::Alias && !rules.allowed_abbreviations.is_empty() && is_abbreviation(guess) {
        let allowed = rules
            .allowed_abbreviations
            .iter()
            .any(|abbreviation| normalize(abbreviation) == guess);
        return !allowed;
    }

    false
}

/// Checks a raw guess against the canonical diagnosis first, then aliases.
/// Accept rules, when present, veto any hit that breaks them.
pub fn is_match(
    raw_guess: &str,
    diagnosis: &str,
    aliases: &[String],
    accept_rules: Option<&AcceptRules>,
) -> MatchResult {
    let guess = normalize(raw_guess);
    if guess.is_empty() {
        return MatchResult::miss();
    }

    let method = if guess == normalize(diagnosis) {
        MatchMethod::Exact
    } else if aliases.iter().any(|alias| normalize(alias) == guess) {
        MatchMethod::Alias
    } else {
        return MatchResult::miss();
    };

    match accept_rules {
        Some(rules) if violates_rules(&guess, method, rules) => MatchResult::miss(),
        _ => MatchResult::hit(method),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use test_case::test_case;

    fn mi_aliases() -> Vec<String> {
        ["MI", "heart attack", "stemi", "nstemi"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    #[test_case("T.B.", "tb")]
    #[test_case(" Myocardial Infarction ", "myocardial infarction")]
    #[test_case("COVID-19!", "covid19")]
    #[test_case("Heart\t\n  Attack", "heart attack")]
    #[test_case("", "")]
    fn test_normalize_scenarios(input: &str, expected: &str) {
        assert_eq!(normalize(input), expected);
    }

    #[test_case("heart attack", MatchMethod::Alias)]
    #[test_case(" STEMI ", MatchMethod::Alias)]
    #[test_case("m.i.", MatchMethod::Alias)]
    #[test_case("myocardial infarction!", MatchMethod::Exact)]
    fn test_mi_guesses_match(guess: &str, method: MatchMethod) {
        let result = is_match(guess, "Myocardial Infarction", &mi_aliases(), None);
        assert!(result.matched);
        assert_eq!(result.method, Some(method));
    }

    #[test]
    fn test_wrong_diagnosis_does_not_match() {
        let result = is_match("pulmonary embolism", "Myocardial Infarction", &mi_aliases(), None);
        assert_eq!(result, MatchResult::miss());
    }

    #[test]
    fn test_blank_guess_never_matches() {
        assert!(!is_match(" .. ", "Myocardial Infarction", &mi_aliases(), None).matched);
    }

    #[test]
    fn test_forbidden_token_vetoes_alias_hit() {
        let rules = AcceptRules {
            forbid_any: vec!["nstemi".to_string()],
            ..AcceptRules::default()
        };
        let result = is_match("NSTEMI", "Myocardial Infarction", &mi_aliases(), Some(&rules));
        assert!(!result.matched);
        assert!(is_match("stemi", "Myocardial Infarction", &mi_aliases(), Some(&rules)).matched);
    }

    #[test]
    fn test_required_token_must_be_present() {
        let rules = AcceptRules {
            require_all: vec!["Type 1".to_string()],
            ..AcceptRules::default()
        };
        let aliases = vec!["T1DM".to_string(), "diabetes".to_string()];
        assert!(is_match("type 1 diabetes", "Type 1 Diabetes", &aliases, Some(&rules)).matched);
        assert!(!is_match("diabetes", "Type 1 Diabetes", &aliases, Some(&rules)).matched);
    }

    #[test]
    fn test_abbreviation_whitelist() {
        let rules = AcceptRules {
            allowed_abbreviations: vec!["STEMI".to_string()],
            ..AcceptRules::default()
        };
        let diagnosis = "Myocardial Infarction";
        assert!(is_match("stemi", diagnosis, &mi_aliases(), Some(&rules)).matched);
        // "MI" is ambiguous and not whitelisted.
        assert!(!is_match("MI", diagnosis, &mi_aliases(), Some(&rules)).matched);
        // Long aliases are unaffected.
        assert!(is_match("heart attack", diagnosis, &mi_aliases(), Some(&rules)).matched);
    }

    proptest! {
        #[test]
        fn prop_normalize_is_idempotent(input in "[ -~\\t\\n]{0,48}") {
            let once = normalize(&input);
            prop_assert_eq!(normalize(&once), once);
        }

        #[test]
        fn prop_match_iff_normalized_equality(guess in "[ -~]{0,24}") {
            let diagnosis = "Myocardial Infarction";
            let aliases = mi_aliases();
            let normalized = normalize(&guess);
            let expected = !normalized.is_empty()
                && (normalized == normalize(diagnosis)
                    || aliases.iter().any(|alias| normalize(alias) == normalized));
            prop_assert_eq!(is_match(&guess, diagnosis, &aliases, None).matched, expected);
        }

        #[test]
        fn prop_alias_variants_match(
            alias_index in 0usize..4,
            upper in any::<bool>(),
            padding in "[ .]{0,3}",
        ) {
            let aliases = mi_aliases();
            let alias = &aliases[alias_index];
            let cased = if upper { alias.to_uppercase() } else { alias.to_lowercase() };
            let guess = format!("{}{}{}", padding, cased, padding);
            prop_assert!(is_match(&guess, "Myocardial Infarction", &aliases, None).matched);
        }
    }
}
