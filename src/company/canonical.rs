//! Stateless string transforms for company names.
//!
//! Three different shapes of the same name are used throughout the crate:
//! the display form produced by [`proper_case`], the comparison key produced
//! by [`normalize_for_comparison`] and the on-disk folder name produced by
//! [`sanitize_for_filesystem`].

/// Name used for documents whose company could not be determined.
pub const UNKNOWN_COMPANY: &str = "Unknown";

/// Raw names that carry no information and map straight to [`UNKNOWN_COMPANY`].
const PLACEHOLDER_NAMES: [&str; 3] = ["unknown", "null", "none"];

const INVALID_FILESYSTEM_CHARS: [char; 9] = ['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

const LEADING_ARTICLES: [&str; 3] = ["the", "a", "an"];

// Multi-word and dotted entries never survive tokenization; they are kept so the
// set reads the same as the suffixes users see in raw names.
const LEGAL_SUFFIXES: [&str; 17] = [
    "inc",
    "inc.",
    "incorporated",
    "corp",
    "corp.",
    "corporation",
    "llc",
    "l.l.c.",
    "ltd",
    "ltd.",
    "limited",
    "co",
    "co.",
    "company",
    "bank",
    "credit union",
    "federal credit union",
];

const LOWERCASE_WORDS: [&str; 8] = ["of", "and", "the", "for", "in", "on", "at", "by"];

const ACRONYMS: [&str; 7] = ["LLC", "INC", "CORP", "LTD", "USA", "US", "UK"];

const SEGMENT_DELIMITERS: [char; 4] = ['-', '_', '&', '/'];

/// Whether a raw company name is empty or a placeholder such as "null".
pub fn is_unknown_company(name: &str) -> bool {
    let trimmed = name.trim();
    trimmed.is_empty()
        || PLACEHOLDER_NAMES
            .iter()
            .any(|placeholder| trimmed.eq_ignore_ascii_case(placeholder))
}

/// Make a name safe to use as a single directory component.
///
/// Invalid characters become `_`, whitespace runs collapse to a single `_`,
/// and leading/trailing underscores are trimmed. Never returns an empty string.
pub fn sanitize_for_filesystem(name: &str) -> String {
    let mut sanitized = String::with_capacity(name.len());
    let mut in_whitespace = false;

    for c in name.chars() {
        if c.is_whitespace() {
            if !in_whitespace {
                sanitized.push('_');
            }
            in_whitespace = true;
            continue;
        }
        in_whitespace = false;

        if INVALID_FILESYSTEM_CHARS.contains(&c) {
            sanitized.push('_');
        } else {
            sanitized.push(c);
        }
    }

    let trimmed = sanitized.trim_matches('_').trim();
    if trimmed.is_empty() {
        UNKNOWN_COMPANY.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Reduce a name to the key used for similarity scoring.
///
/// Lowercases, turns punctuation into spaces, drops leading articles and
/// trailing legal suffixes. `"The Chase Bank, Inc."` becomes `"chase"`.
pub fn normalize_for_comparison(name: &str) -> String {
    let lowered = name.trim().to_lowercase();
    if lowered.is_empty() {
        return String::new();
    }

    let cleaned: String = lowered
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '_' || c.is_whitespace() {
                c
            } else {
                ' '
            }
        })
        .collect();

    let mut words: Vec<&str> = cleaned.split_whitespace().collect();

    let leading = words
        .iter()
        .take_while(|word| LEADING_ARTICLES.contains(word))
        .count();
    words.drain(..leading);

    while let Some(last) = words.last() {
        if LEGAL_SUFFIXES.contains(last) {
            words.pop();
        } else {
            break;
        }
    }

    words.join(" ")
}

/// Title-case a company name while keeping delimiters exactly as written.
///
/// Connective words stay lowercase and well-known acronyms are uppercased:
/// `"bank of america usa"` becomes `"Bank of America USA"`.
pub fn proper_case(name: &str) -> String {
    let mut result = String::with_capacity(name.len());
    let mut segment = String::new();

    for c in name.chars() {
        if c.is_whitespace() || SEGMENT_DELIMITERS.contains(&c) {
            if !segment.is_empty() {
                result.push_str(&case_segment(&segment));
                segment.clear();
            }
            result.push(c);
        } else {
            segment.push(c);
        }
    }

    if !segment.is_empty() {
        result.push_str(&case_segment(&segment));
    }

    result
}

/// Rebuild a display name from a folder created by [`sanitize_for_filesystem`].
pub fn folder_name_to_company_name(folder_name: &str) -> String {
    proper_case(&folder_name.replace('_', " "))
}

fn case_segment(segment: &str) -> String {
    let lower = segment.to_lowercase();

    if LOWERCASE_WORDS.contains(&lower.as_str()) {
        return lower;
    }

    if ACRONYMS
        .iter()
        .any(|acronym| acronym.eq_ignore_ascii_case(segment))
    {
        return segment.to_uppercase();
    }

    let mut chars = lower.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => lower,
    }
}
