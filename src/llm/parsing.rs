//! Parsing of model replies and date extraction helpers.
//!
//! Replies are unpredictable: JSON may be wrapped in markdown fences, preceded
//! by prose or followed by commentary. Dates come back in whatever form the
//! model or the document used, so several formats are tried.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use regex::Regex;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::sync::LazyLock;

use super::DocumentInfo;
use crate::company::UNKNOWN_COMPANY;

pub const DEFAULT_DOCUMENT_TYPE: &str = "document";

const MONTH_NAMES: &str = r"jan(?:uary)?|feb(?:ruary)?|mar(?:ch)?|apr(?:il)?|may|june?|july?|aug(?:ust)?|sep(?:t(?:ember)?)?|oct(?:ober)?|nov(?:ember)?|dec(?:ember)?";

static NUMERIC_MONTH_FIRST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(\d{1,2})[/-](\d{1,2})[/-](\d{4})\b").expect("valid date regex")
});

static NUMERIC_YEAR_FIRST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(\d{4})[/-](\d{1,2})[/-](\d{1,2})\b").expect("valid date regex")
});

static MONTH_DAY_YEAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)\b({MONTH_NAMES})\.?\s+(\d{{1,2}}),?\s+(\d{{4}})\b"
    ))
    .expect("valid date regex")
});

static DAY_MONTH_YEAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?i)\b(\d{{1,2}})\s+({MONTH_NAMES})\.?\s+(\d{{4}})\b"))
        .expect("valid date regex")
});

static MONTH_YEAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(January|February|March|April|May|June|July|August|September|October|November|December)\s+(\d{4})\b")
        .expect("valid date regex")
});

static FILENAME_DATES: LazyLock<[Regex; 3]> = LazyLock::new(|| {
    [
        Regex::new(r"(\d{4})_(\d{2})_(\d{2})").expect("valid date regex"),
        Regex::new(r"(\d{4})(\d{2})(\d{2})").expect("valid date regex"),
        Regex::new(r"(\d{4})-(\d{2})-(\d{2})").expect("valid date regex"),
    ]
});

/// Formats tried after ISO when a model returns a non-ISO date.
const DATE_FORMATS: &[&str] = &[
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%m-%d-%Y",
    "%d/%m/%Y",
    "%B %d, %Y",
    "%B %d %Y",
    "%d %B %Y",
    "%Y%m%d",
];

#[derive(Debug, Deserialize)]
struct RawDocumentInfo {
    company_name: Option<String>,
    document_type: Option<String>,
    date: Option<Value>,
    confidence_score: Option<Value>,
    suggested_name: Option<String>,
    additional_metadata: Option<Value>,
}

/// Parse a model reply into a [`DocumentInfo`].
///
/// Missing or null fields fall back to `Unknown` / `document`; an unparsable
/// date becomes `None`.
pub fn parse_document_info(response: &str) -> Result<DocumentInfo> {
    let json = extract_json_object(response).context("No JSON object found in response")?;
    let raw: RawDocumentInfo =
        serde_json::from_str(json).context("Response JSON does not describe a document")?;

    let date = raw.date.as_ref().and_then(Value::as_str).and_then(parse_date);

    let confidence_score = raw
        .confidence_score
        .as_ref()
        .and_then(|v| {
            v.as_f64()
                .or_else(|| v.as_str().and_then(|s| s.trim().parse().ok()))
        })
        .unwrap_or(0.0);

    let additional_metadata = match raw.additional_metadata {
        Some(Value::Object(map)) => map,
        _ => Map::new(),
    };

    Ok(DocumentInfo::new(
        non_empty(raw.company_name).unwrap_or_else(|| UNKNOWN_COMPANY.to_string()),
        non_empty(raw.document_type).unwrap_or_else(|| DEFAULT_DOCUMENT_TYPE.to_string()),
        date,
        confidence_score,
        non_empty(raw.suggested_name).unwrap_or_default(),
        additional_metadata,
    ))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

/// Locate the first balanced `{…}` object, ignoring braces inside strings.
pub fn extract_json_object(response: &str) -> Option<&str> {
    let stripped = strip_code_fences(response);
    let start = stripped.find('{')?;
    let end = find_matching_brace(&stripped[start..])?;
    Some(&stripped[start..=start + end])
}

/// Strip markdown code fences (``` or ```json) from around content.
fn strip_code_fences(s: &str) -> &str {
    let s = s.trim();

    if s.starts_with("```")
        && let Some(first_newline) = s.find('\n')
    {
        let inner = &s[first_newline + 1..];
        if let Some(closing) = inner.rfind("```") {
            return inner[..closing].trim();
        }
    }

    s
}

/// Byte index of the `}` closing the first `{` in the string.
fn find_matching_brace(s: &str) -> Option<usize> {
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, c) in s.char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }
        if c == '\\' && in_string {
            escape_next = true;
            continue;
        }
        if c == '"' {
            in_string = !in_string;
            continue;
        }
        if in_string {
            continue;
        }
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Parse a date string from a model reply: ISO first, then common forms.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Some(prefix) = value.get(..10)
        && let Ok(date) = NaiveDate::parse_from_str(prefix, "%Y-%m-%d")
    {
        return Some(date);
    }

    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(value, format).ok())
        .or_else(|| month_year(value))
}

/// Search document text for the first recognizable date.
pub fn extract_date_from_text(text: &str) -> Option<NaiveDate> {
    for caps in NUMERIC_MONTH_FIRST.captures_iter(text) {
        if let Some(date) =
            ymd(&caps[3], &caps[1], &caps[2]).or_else(|| ymd(&caps[3], &caps[2], &caps[1]))
        {
            return Some(date);
        }
    }

    for caps in NUMERIC_YEAR_FIRST.captures_iter(text) {
        if let Some(date) = ymd(&caps[1], &caps[2], &caps[3]) {
            return Some(date);
        }
    }

    for caps in MONTH_DAY_YEAR.captures_iter(text) {
        if let Some(month) = month_number(&caps[1])
            && let Some(date) = ymd_with_month(&caps[3], month, &caps[2])
        {
            return Some(date);
        }
    }

    for caps in DAY_MONTH_YEAR.captures_iter(text) {
        if let Some(month) = month_number(&caps[2])
            && let Some(date) = ymd_with_month(&caps[3], month, &caps[1])
        {
            return Some(date);
        }
    }

    month_year(text)
}

/// Dates embedded in file names such as `statement_2023_03_15.pdf`.
pub fn extract_date_from_filename(file_name: &str) -> Option<NaiveDate> {
    FILENAME_DATES.iter().find_map(|pattern| {
        pattern.captures_iter(file_name).find_map(|caps| {
            let year: i32 = caps[1].parse().ok()?;
            if !(1900..=2100).contains(&year) {
                return None;
            }
            ymd(&caps[1], &caps[2], &caps[3])
        })
    })
}

/// "Company Type Month YYYY", skipping parts that are unknown.
pub fn generate_suggested_name(info: &DocumentInfo) -> String {
    let mut parts = Vec::new();

    if info.company_name != UNKNOWN_COMPANY {
        parts.push(info.company_name.clone());
    }

    if info.document_type != DEFAULT_DOCUMENT_TYPE {
        let titled: Vec<String> = info
            .document_type
            .split_whitespace()
            .map(capitalize)
            .collect();
        parts.push(titled.join(" "));
    }

    if let Some(date) = info.date {
        parts.push(date.format("%B %Y").to_string());
    }

    if parts.is_empty() {
        "Unnamed Document".to_string()
    } else {
        parts.join(" ")
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

/// "January 2023" style references resolve to the first of the month.
fn month_year(text: &str) -> Option<NaiveDate> {
    let caps = MONTH_YEAR.captures(text)?;
    let month = month_number(&caps[1])?;
    NaiveDate::from_ymd_opt(caps[2].parse().ok()?, month, 1)
}

fn month_number(name: &str) -> Option<u32> {
    let prefix: String = name.chars().take(3).collect::<String>().to_lowercase();
    let month = match prefix.as_str() {
        "jan" => 1,
        "feb" => 2,
        "mar" => 3,
        "apr" => 4,
        "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "aug" => 8,
        "sep" => 9,
        "oct" => 10,
        "nov" => 11,
        "dec" => 12,
        _ => return None,
    };
    Some(month)
}

fn ymd(year: &str, month: &str, day: &str) -> Option<NaiveDate> {
    ymd_with_month(year, month.parse().ok()?, day)
}

fn ymd_with_month(year: &str, month: u32, day: &str) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year.parse().ok()?, month, day.parse().ok()?)
}
