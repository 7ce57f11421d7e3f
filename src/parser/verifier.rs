use std::collections::HashMap;

use crate::grammar::record_arities;
use super::{FileResult, GrammarError, GrammarErrors, Location, Rule};

// Checks that every symbol keeps one arity across the file, reporting every
// rule that disagrees with the first use of its symbols
fn get_arity_mismatches(rules: &[(Rule, Location)]) -> GrammarErrors {
    let mut arities = HashMap::new();

    rules.iter()
        .filter_map(|(rule, location)| {
            record_arities(rule, &mut arities)
                .err()
                .map(|error| GrammarError {
                    location: location.to_owned(),
                    context: rule.to_string(),
                    error
                })
        })
        .collect()
}

pub fn verify_rules(rules: &[(Rule, Location)]) -> FileResult<()> {
    let mut errors = Vec::new();

    errors.extend(get_arity_mismatches(rules));

    if !errors.is_empty() {
        Err(errors)
    } else {
        Ok(())
    }
}
