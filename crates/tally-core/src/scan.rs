//! # Scan Guesses
//!
//! What the OCR service thinks a label says.
//!
//! ```text
//! ┌──────────────────────────────┐
//! │  FRESH FARM WHOLE MILK 1L    │ ──► name         "FRESH FARM WHOLE MILK 1L"
//! │  8901234567890               │ ──► code         "8901234567890"
//! │  EXP: 01/02/2024             │ ──► expiry_date  2024-02-01
//! └──────────────────────────────┘
//! ```
//!
//! Every field is optional. A guess with none of them cannot be resolved.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Date layouts seen on printed labels, tried in order.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y", "%d.%m.%Y"];

const MIN_CODE_LEN: usize = 6;
const MAX_CODE_LEN: usize = 20;
const MIN_NAME_LETTERS: usize = 3;

/// Partial recognition of a product label.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ScanGuess {
    pub code: Option<String>,
    pub name: Option<String>,
    #[ts(as = "Option<String>")]
    pub expiry_date: Option<NaiveDate>,
}

impl ScanGuess {
    pub fn new(code: Option<String>, name: Option<String>, expiry_date: Option<NaiveDate>) -> Self {
        ScanGuess {
            code,
            name,
            expiry_date,
        }
        .normalized()
    }

    /// Trims fields and drops blank ones. Names get inner whitespace collapsed.
    pub fn normalized(self) -> Self {
        ScanGuess {
            code: self
                .code
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty()),
            name: self.name.map(|n| collapse_whitespace(&n)).filter(|n| !n.is_empty()),
            expiry_date: self.expiry_date,
        }
    }

    /// True when there is neither a code nor a name to look up.
    pub fn is_empty(&self) -> bool {
        self.code.is_none() && self.name.is_none()
    }

    /// Builds a guess from raw recognised text lines.
    ///
    /// - expiry: first parseable date on any line
    /// - code: first 6-20 char token of digits, or of uppercase letters,
    ///   digits and `-` with at least one digit
    /// - name: longest line left over with at least three letters
    pub fn from_text_lines<S: AsRef<str>>(lines: &[S]) -> Self {
        let lines: Vec<String> = lines
            .iter()
            .map(|l| collapse_whitespace(l.as_ref()))
            .filter(|l| !l.is_empty())
            .collect();

        let mut expiry_date = None;
        let mut date_line = None;
        for (i, line) in lines.iter().enumerate() {
            if let Some(date) = tokens(line).find_map(parse_label_date) {
                expiry_date = Some(date);
                date_line = Some(i);
                break;
            }
        }

        let mut code = None;
        let mut code_line = None;
        for (i, line) in lines.iter().enumerate() {
            if let Some(token) = tokens(line).find(|t| looks_like_code(t)) {
                code = Some(token.to_string());
                code_line = Some(i);
                break;
            }
        }

        let name = lines
            .iter()
            .enumerate()
            .filter(|(i, _)| Some(*i) != date_line)
            .filter(|(i, line)| {
                // A line holding only the code is not a name
                !(Some(*i) == code_line && code.as_deref() == Some(line.as_str()))
            })
            .map(|(_, line)| line)
            .filter(|line| line.chars().filter(|c| c.is_alphabetic()).count() >= MIN_NAME_LETTERS)
            .fold(None::<&String>, |best, line| match best {
                Some(b) if b.chars().count() >= line.chars().count() => Some(b),
                _ => Some(line),
            })
            .cloned();

        ScanGuess {
            code,
            name,
            expiry_date,
        }
    }
}

/// Parses a label date in any of the supported layouts.
///
/// ```rust
/// use chrono::NaiveDate;
/// use tally_core::scan::parse_label_date;
///
/// let expected = NaiveDate::from_ymd_opt(2024, 2, 1);
/// assert_eq!(parse_label_date("2024-02-01"), expected);
/// assert_eq!(parse_label_date("01/02/2024"), expected);
/// assert_eq!(parse_label_date("banana"), None);
/// ```
pub fn parse_label_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
}

fn tokens(line: &str) -> impl Iterator<Item = &str> {
    line.split(|c: char| c.is_whitespace() || c == ':' || c == ',')
        .map(|t| t.trim_matches(|c: char| matches!(c, '(' | ')' | '[' | ']' | ';')))
        .filter(|t| !t.is_empty())
}

fn looks_like_code(token: &str) -> bool {
    let len = token.chars().count();
    if !(MIN_CODE_LEN..=MAX_CODE_LEN).contains(&len) {
        return false;
    }
    if parse_label_date(token).is_some() {
        return false;
    }
    let all_digits = token.chars().all(|c| c.is_ascii_digit());
    let label_code = token
        .chars()
        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '-')
        && token.chars().any(|c| c.is_ascii_digit());
    all_digits || label_code
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
