//! Entity-name validation and fuzzy matching.
//!
//! Characters, roleplays, and dossiers are addressed by name in command
//! arguments, where they share a namespace with the bot's own commands and
//! with the `owner:name` lookup syntax.  A character literally named after
//! a command, or containing a `:`, would break argument resolution, so
//! candidate names are vetted here before anything is persisted.

use crate::error::EmissaryError;
use crate::registry::CommandRegistry;

/// Maximum length of an entity name, in characters.
pub const MAX_NAME_LEN: usize = 64;

/// Names that the argument parser treats specially.
pub const RESERVED_WORDS: &[&str] = &["current"];

/// Characters that the argument parser treats specially.  `:` separates
/// owner from entity in `owner:name` lookups.
pub const RESERVED_CHARS: &[char] = &[':'];

/// Validate a candidate entity name against the shared naming rules and the
/// reserved command names of `group`.
pub fn validate_entity_name(
    candidate: &str,
    commands: &CommandRegistry,
    group: &str,
) -> Result<(), EmissaryError> {
    let trimmed = candidate.trim();

    if trimmed.is_empty() {
        return Err(EmissaryError::Validation("Names cannot be empty.".into()));
    }

    if trimmed.chars().count() > MAX_NAME_LEN {
        return Err(EmissaryError::Validation(format!(
            "Names may be at most {MAX_NAME_LEN} characters long."
        )));
    }

    if let Some(bad) = trimmed.chars().find(|c| RESERVED_CHARS.contains(c)) {
        return Err(EmissaryError::Validation(format!(
            "Names may not contain \"{bad}\"."
        )));
    }

    if RESERVED_WORDS.iter().any(|w| w.eq_ignore_ascii_case(trimmed)) {
        return Err(EmissaryError::Validation(format!(
            "\"{trimmed}\" is a reserved word and can't be used as a name."
        )));
    }

    if commands.is_reserved(group, trimmed) {
        return Err(EmissaryError::Validation(
            "Names may not be the same as a command.".into(),
        ));
    }

    Ok(())
}

/// True if no existing name matches the candidate case-insensitively.
/// Vacuously true for an empty set.
pub fn is_name_unique<'a, I>(existing: I, candidate: &str) -> bool
where
    I: IntoIterator<Item = &'a str>,
{
    !existing
        .into_iter()
        .any(|name| name.eq_ignore_ascii_case(candidate))
}

/// Levenshtein edit distance, used to suggest the closest known name when a
/// command argument doesn't match anything.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    // Single-row formulation.
    let mut row: Vec<usize> = (0..=b.len()).collect();

    for (i, ca) in a.iter().enumerate() {
        let mut prev_diag = row[0];
        row[0] = i + 1;

        for (j, cb) in b.iter().enumerate() {
            let cost = if ca == cb { 0 } else { 1 };
            let next = (prev_diag + cost).min(row[j] + 1).min(row[j + 1] + 1);
            prev_diag = row[j + 1];
            row[j + 1] = next;
        }
    }

    row[b.len()]
}

/// Find the candidate's closest match among `options`, if any is close
/// enough to plausibly be a typo.
pub fn closest_match<'a, I>(candidate: &str, options: I) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    let lowered = candidate.to_lowercase();
    let max_distance = (candidate.chars().count() / 3).max(2);

    options
        .into_iter()
        .map(|opt| (levenshtein(&lowered, &opt.to_lowercase()), opt))
        .filter(|(dist, _)| *dist <= max_distance)
        .min_by_key(|(dist, _)| *dist)
        .map(|(_, opt)| opt)
}
