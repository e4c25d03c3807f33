//! Schema validation for parsed manifests.
//!
//! Pure: no I/O, no logging. Checks always run in the same order so the
//! violation list is deterministic:
//!
//! 1. `name` present, single line, at most [`MAX_NAME_LEN`] characters
//! 2. `description` present, single line, at most [`MAX_DESCRIPTION_LEN`] characters
//! 3. `identifier` non-empty and made of path-safe characters
//! 4. `name` and `description` free of invisible or look-alike whitespace characters

use skillreg_config::IdentifierRule;

use crate::{
    error::{Field, ValidationError, Violation},
    types::{ManifestCandidate, SkillManifest},
};

pub const MAX_NAME_LEN: usize = 100;
pub const MAX_DESCRIPTION_LEN: usize = 500;

/// Code point ranges that render as nothing (or as ordinary spacing) and so
/// hide what a field really contains. Format (Cf) characters, variation
/// selectors and the combining grapheme joiner.
const INVISIBLE_RANGES: &[(u32, u32)] = &[
    (0x00AD, 0x00AD),
    (0x034F, 0x034F),
    (0x0600, 0x0605),
    (0x061C, 0x061C),
    (0x06DD, 0x06DD),
    (0x070F, 0x070F),
    (0x180E, 0x180E),
    (0x200B, 0x200F),
    (0x202A, 0x202E),
    (0x2060, 0x2064),
    (0x2066, 0x206F),
    (0xFE00, 0xFE0F),
    (0xFEFF, 0xFEFF),
    (0xFFF9, 0xFFFB),
    (0x110BD, 0x110BD),
    (0x1BCA0, 0x1BCA3),
    (0x1D173, 0x1D17A),
    (0xE0001, 0xE0001),
    (0xE0020, 0xE007F),
    (0xE0100, 0xE01EF),
];

/// Check a candidate and return every violation, in check order.
///
/// An empty list means the candidate may be promoted with [`promote`].
pub fn validate(candidate: &ManifestCandidate, rule: IdentifierRule) -> Vec<Violation> {
    let header = &candidate.manifest.header;
    let name = header.get("name");
    let description = header.get("description");

    let mut violations = Vec::new();
    check_text(Field::Name, name, MAX_NAME_LEN, &mut violations);
    check_text(
        Field::Description,
        description,
        MAX_DESCRIPTION_LEN,
        &mut violations,
    );
    check_identifier(&candidate.identifier, rule, &mut violations);
    check_invisible(Field::Name, name, &mut violations);
    check_invisible(Field::Description, description, &mut violations);
    violations
}

/// Validate a candidate and turn it into a [`SkillManifest`].
pub fn promote(
    candidate: ManifestCandidate,
    rule: IdentifierRule,
) -> Result<SkillManifest, ValidationError> {
    let violations = validate(&candidate, rule);
    if !violations.is_empty() {
        return Err(ValidationError {
            path: candidate.source_path,
            violations,
        });
    }

    let header = &candidate.manifest.header;
    Ok(SkillManifest {
        name: header.get("name").unwrap_or_default().to_string(),
        description: header.get("description").unwrap_or_default().to_string(),
        identifier: candidate.identifier,
        source_path: candidate.source_path,
        body: candidate.manifest.body,
    })
}

fn check_text(field: Field, value: Option<&str>, max: usize, out: &mut Vec<Violation>) {
    let Some(value) = value else {
        out.push(violation(field, "is missing"));
        return;
    };
    if value.trim().is_empty() {
        out.push(violation(field, "must not be empty"));
        return;
    }
    if value.contains(['\n', '\r']) {
        out.push(violation(field, "must be a single line"));
    }
    let len = value.chars().count();
    if len > max {
        out.push(violation(
            field,
            format!("is {len} characters long, maximum is {max}"),
        ));
    }
}

fn check_identifier(identifier: &str, rule: IdentifierRule, out: &mut Vec<Violation>) {
    if identifier.is_empty() {
        out.push(violation(Field::Identifier, "must not be empty"));
        return;
    }

    if let Some(bad) = identifier
        .chars()
        .find(|&c| !is_path_safe(c, rule.allows_separator()))
    {
        out.push(violation(
            Field::Identifier,
            format!("'{identifier}' contains character {bad:?} that is not path-safe"),
        ));
        return;
    }

    let bad_segment = identifier
        .split('/')
        .any(|segment| segment.is_empty() || segment.starts_with('.'));
    if bad_segment {
        out.push(violation(
            Field::Identifier,
            format!("'{identifier}' has an empty or dot-prefixed path segment"),
        ));
    }
}

fn is_path_safe(c: char, allow_separator: bool) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') || (allow_separator && c == '/')
}

fn check_invisible(field: Field, value: Option<&str>, out: &mut Vec<Violation>) {
    let Some(value) = value else {
        return;
    };
    if let Some((pos, c)) = value
        .chars()
        .enumerate()
        .find(|&(_, c)| is_invisible(c))
    {
        out.push(violation(
            field,
            format!(
                "contains invisible character U+{:04X} at position {}",
                u32::from(c),
                pos + 1
            ),
        ));
    }
}

/// Line breaks are left to the single-line check.
fn is_invisible(c: char) -> bool {
    if matches!(c, ' ' | '\t' | '\n' | '\r') {
        return false;
    }
    if c.is_whitespace() || c.is_control() {
        return true;
    }
    let cp = u32::from(c);
    INVISIBLE_RANGES
        .iter()
        .any(|&(start, end)| (start..=end).contains(&cp))
}

fn violation(field: Field, message: impl Into<String>) -> Violation {
    Violation {
        field,
        message: message.into(),
    }
}
