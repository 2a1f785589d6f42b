//! Smart-collection filter language
//!
//! A filter is one or more clauses joined by `AND`:
//!
//! ```text
//! type = episode AND show = "Star Trek" AND duration < 30m
//! title ~ christmas AND year >= 1990
//! ```
//!
//! Fields: `title`, `type`, `show`, `season`, `duration`, `year`.
//! Operators: `=`, `!=`, `~` (contains), `<`, `>`, `<=`, `>=`.
//! Durations are milliseconds, or carry an `s`, `m` or `h` suffix.

use std::sync::LazyLock;

use chrono::{DateTime, Datelike};
use regex::Regex;

use crate::models::{ContentProgram, ProgramKind, HOUR_MS, MINUTE_MS, SECOND_MS};
use crate::scheduler::error::{SchedulerError, SchedulerResult};

static CLAUSE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*([A-Za-z_]+)\s*(!=|<=|>=|=|~|<|>)\s*(.+?)\s*$").expect("clause pattern")
});

static AND_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\s+AND\s+").expect("conjunction pattern"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Title,
    Type,
    Show,
    Season,
    Duration,
    Year,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Eq,
    Ne,
    Contains,
    Lt,
    Gt,
    Le,
    Ge,
}

#[derive(Debug, Clone, PartialEq)]
enum Value {
    Text(String),
    Kind(ProgramKind),
    Number(i64),
}

#[derive(Debug, Clone, PartialEq)]
struct Clause {
    field: Field,
    op: Op,
    value: Value,
}

/// Parsed smart-collection filter
#[derive(Debug, Clone, PartialEq)]
pub struct SmartFilter {
    clauses: Vec<Clause>,
}

impl SmartFilter {
    /// Parse a filter expression
    pub fn parse(input: &str) -> SchedulerResult<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(SchedulerError::unparseable_filter(input, "empty filter"));
        }

        let clauses = AND_REGEX
            .split(trimmed)
            .map(|part| parse_clause(input, part))
            .collect::<SchedulerResult<Vec<_>>>()?;

        Ok(Self { clauses })
    }

    /// Whether a program satisfies every clause
    pub fn matches(&self, program: &ContentProgram) -> bool {
        self.clauses.iter().all(|c| c.matches(program))
    }

    /// Keep only matching programs, preserving order
    pub fn apply<'a>(&self, programs: impl IntoIterator<Item = &'a ContentProgram>) -> Vec<ContentProgram> {
        programs
            .into_iter()
            .filter(|p| self.matches(p))
            .cloned()
            .collect()
    }
}

fn parse_clause(filter: &str, part: &str) -> SchedulerResult<Clause> {
    let caps = CLAUSE_REGEX
        .captures(part)
        .ok_or_else(|| SchedulerError::unparseable_filter(filter, format!("malformed clause '{part}'")))?;

    let field = match caps[1].to_lowercase().as_str() {
        "title" => Field::Title,
        "type" => Field::Type,
        "show" => Field::Show,
        "season" => Field::Season,
        "duration" => Field::Duration,
        "year" => Field::Year,
        other => {
            return Err(SchedulerError::unparseable_filter(
                filter,
                format!("unknown field '{other}'"),
            ))
        }
    };

    let op = match &caps[2] {
        "=" => Op::Eq,
        "!=" => Op::Ne,
        "~" => Op::Contains,
        "<" => Op::Lt,
        ">" => Op::Gt,
        "<=" => Op::Le,
        _ => Op::Ge,
    };

    let raw = unquote(&caps[3]);
    let value = match field {
        Field::Title | Field::Show => Value::Text(raw.to_lowercase()),
        Field::Type => ProgramKind::from_str_opt(raw).map(Value::Kind).ok_or_else(|| {
            SchedulerError::unparseable_filter(filter, format!("unknown program type '{raw}'"))
        })?,
        Field::Season | Field::Year => raw.parse().map(Value::Number).map_err(|_| {
            SchedulerError::unparseable_filter(filter, format!("'{raw}' is not a number"))
        })?,
        Field::Duration => parse_duration(raw).map(Value::Number).ok_or_else(|| {
            SchedulerError::unparseable_filter(filter, format!("'{raw}' is not a duration"))
        })?,
    };

    let numeric = matches!(field, Field::Season | Field::Duration | Field::Year);
    let allowed = match op {
        Op::Eq | Op::Ne => true,
        Op::Contains => matches!(field, Field::Title | Field::Show),
        Op::Lt | Op::Gt | Op::Le | Op::Ge => numeric,
    };
    if !allowed {
        return Err(SchedulerError::unparseable_filter(
            filter,
            format!("operator '{}' not supported for '{}'", &caps[2], &caps[1]),
        ));
    }

    Ok(Clause { field, op, value })
}

fn unquote(raw: &str) -> &str {
    let bytes = raw.as_bytes();
    if bytes.len() >= 2
        && ((bytes[0] == b'"' && bytes[bytes.len() - 1] == b'"')
            || (bytes[0] == b'\'' && bytes[bytes.len() - 1] == b'\''))
    {
        &raw[1..raw.len() - 1]
    } else {
        raw
    }
}

/// `1500`, `90s`, `25m`, `2h`
fn parse_duration(raw: &str) -> Option<i64> {
    let raw = raw.trim().to_lowercase();
    let (digits, unit) = match raw.char_indices().find(|(_, c)| !c.is_ascii_digit()) {
        Some((idx, _)) => raw.split_at(idx),
        None => (raw.as_str(), ""),
    };
    let amount: i64 = digits.parse().ok()?;
    let scale = match unit.trim() {
        "" | "ms" => 1,
        "s" => SECOND_MS,
        "m" => MINUTE_MS,
        "h" => HOUR_MS,
        _ => return None,
    };
    amount.checked_mul(scale)
}

impl Clause {
    fn matches(&self, program: &ContentProgram) -> bool {
        match (&self.value, self.field) {
            (Value::Text(expected), Field::Title) => {
                compare_text(self.op, &program.title.to_lowercase(), expected)
            }
            (Value::Text(expected), Field::Show) => match &program.show_id {
                Some(show) => compare_text(self.op, &show.to_lowercase(), expected),
                None => self.op == Op::Ne,
            },
            (Value::Kind(kind), _) => match self.op {
                Op::Eq => program.kind == *kind,
                Op::Ne => program.kind != *kind,
                _ => false,
            },
            (Value::Number(expected), Field::Season) => program
                .season
                .map(|s| compare_number(self.op, i64::from(s), *expected))
                .unwrap_or(false),
            (Value::Number(expected), Field::Duration) => {
                compare_number(self.op, program.duration_ms, *expected)
            }
            (Value::Number(expected), Field::Year) => program
                .release_date_ms
                .and_then(DateTime::from_timestamp_millis)
                .map(|d| compare_number(self.op, i64::from(d.year()), *expected))
                .unwrap_or(false),
            _ => false,
        }
    }
}

fn compare_text(op: Op, actual: &str, expected: &str) -> bool {
    match op {
        Op::Eq => actual == expected,
        Op::Ne => actual != expected,
        Op::Contains => actual.contains(expected),
        _ => false,
    }
}

fn compare_number(op: Op, actual: i64, expected: i64) -> bool {
    match op {
        Op::Eq => actual == expected,
        Op::Ne => actual != expected,
        Op::Lt => actual < expected,
        Op::Gt => actual > expected,
        Op::Le => actual <= expected,
        Op::Ge => actual >= expected,
        Op::Contains => false,
    }
}
