use std::fmt::{Display, Formatter};

use chrono::{DateTime, Datelike, Duration, Local, Months, NaiveDate, NaiveDateTime};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const UNTAGGED_SUBJECT: &str = "No Tag";
pub const SESSION_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
pub const DEFAULT_TIMER_MINUTES: u32 = 45;

const NAIVE_TIMESTAMP_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// One study session as returned by `GET /sessions`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SessionRecord {
    #[serde(default)]
    pub session_end: Option<String>,
    pub duration: u32,
    #[serde(default)]
    pub subject_name: Option<String>,
}

impl SessionRecord {
    #[cfg(test)]
    pub fn new(session_end: Option<&str>, duration: u32, subject_name: Option<&str>) -> Self {
        Self {
            session_end: session_end.map(str::to_string),
            duration,
            subject_name: subject_name.map(str::to_string),
        }
    }

    /// Local wall-clock end of the session, or `None` when the timestamp is
    /// absent or cannot be parsed.
    pub fn ended_at(&self) -> Option<NaiveDateTime> {
        let raw = self.session_end.as_deref()?;
        let parsed = parse_session_timestamp(raw);
        if parsed.is_none() {
            debug!(session_end = raw, "ignoring session with unparseable end time");
        }
        parsed
    }

    pub fn subject_label(&self) -> &str {
        match self.subject_name.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ => UNTAGGED_SUBJECT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TimeWindow {
    Day,
    Week,
    Month,
    Year,
}

impl TimeWindow {
    pub const ALL: [TimeWindow; 4] = [
        TimeWindow::Day,
        TimeWindow::Week,
        TimeWindow::Month,
        TimeWindow::Year,
    ];

    pub fn contains(self, ended_at: NaiveDateTime, reference: NaiveDateTime) -> bool {
        match self {
            TimeWindow::Day => ended_at.date() == reference.date(),
            TimeWindow::Week => {
                let (first, last) = week_bounds(reference.date());
                (first..=last).contains(&ended_at.date())
            }
            // Rolling month, unlike the calendar-aligned windows.
            TimeWindow::Month => {
                let after_start = reference
                    .checked_sub_months(Months::new(1))
                    .is_none_or(|start| ended_at >= start);
                after_start && ended_at <= reference
            }
            TimeWindow::Year => ended_at.year() == reference.year(),
        }
    }
}

impl Display for TimeWindow {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            TimeWindow::Day => "Day",
            TimeWindow::Week => "Week",
            TimeWindow::Month => "Month",
            TimeWindow::Year => "Year",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectGroup {
    pub subject_name: String,
    pub total_duration: u64,
}

/// Filters `sessions` to `window` around `reference` and sums durations per
/// subject, keeping the order in which subjects first appear.
pub fn aggregate(
    sessions: &[SessionRecord],
    window: TimeWindow,
    reference: NaiveDateTime,
) -> Vec<SubjectGroup> {
    let mut groups: Vec<SubjectGroup> = Vec::new();

    for session in sessions {
        let Some(ended_at) = session.ended_at() else {
            continue;
        };
        if !window.contains(ended_at, reference) {
            continue;
        }

        let subject_name = session.subject_label();
        match groups
            .iter_mut()
            .find(|group| group.subject_name == subject_name)
        {
            Some(group) => group.total_duration += u64::from(session.duration),
            None => groups.push(SubjectGroup {
                subject_name: subject_name.to_string(),
                total_duration: u64::from(session.duration),
            }),
        }
    }

    groups
}

pub fn total_duration(groups: &[SubjectGroup]) -> u64 {
    groups.iter().map(|group| group.total_duration).sum()
}

/// Sunday through Saturday of the week containing `day`.
pub fn week_bounds(day: NaiveDate) -> (NaiveDate, NaiveDate) {
    let days_from_sunday = i64::from(day.weekday().num_days_from_sunday());
    let first = day - Duration::days(days_from_sunday);
    (first, first + Duration::days(6))
}

pub fn parse_session_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(raw) {
        return Some(timestamp.with_timezone(&Local).naive_local());
    }

    NAIVE_TIMESTAMP_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
}

pub fn format_session_timestamp(timestamp: NaiveDateTime) -> String {
    timestamp.format(SESSION_TIMESTAMP_FORMAT).to_string()
}

pub fn format_minutes(minutes: u64) -> String {
    format!("{minutes}m")
}

/// A subject tag owned by the user.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Subject {
    pub subject_id: i64,
    pub subject_name: String,
}

/// A user-defined default timer length.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Preset {
    pub session_id: i64,
    pub session_length_minutes: u32,
}

/// A completed session as posted to `POST /sessions`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSession {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject_name: Option<String>,
    pub session_start: String,
    pub session_end: String,
    pub session_duration: u32,
}

impl NewSession {
    pub fn completed(subject: Option<&Subject>, minutes: u32, ended_at: NaiveDateTime) -> Self {
        let started_at = ended_at - Duration::minutes(i64::from(minutes));
        Self {
            subject_id: subject.map(|subject| subject.subject_id),
            subject_name: subject.map(|subject| subject.subject_name.clone()),
            session_start: format_session_timestamp(started_at),
            session_end: format_session_timestamp(ended_at),
            session_duration: minutes,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
}
