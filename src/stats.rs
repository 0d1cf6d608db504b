use chrono::NaiveDateTime;
use tracing::debug;

use crate::api::{ApiError, SessionSource};
use crate::chart::{Chart, ChartStyle};
use crate::domain::{SessionRecord, SubjectGroup, TimeWindow, aggregate, total_duration};

/// Study statistics over one fetched snapshot of the user's sessions.
///
/// The snapshot is fetched once by [`StudyStats::load`]; switching windows
/// regroups it without touching the network.
#[derive(Debug, Clone)]
pub struct StudyStats {
    sessions: Vec<SessionRecord>,
    window: TimeWindow,
    groups: Vec<SubjectGroup>,
}

impl StudyStats {
    pub fn load(
        source: &impl SessionSource,
        token: &str,
        window: TimeWindow,
        reference: NaiveDateTime,
    ) -> Result<Self, ApiError> {
        let sessions = source.fetch_all_sessions(token)?;
        Ok(Self::from_sessions(sessions, window, reference))
    }

    pub fn from_sessions(
        sessions: Vec<SessionRecord>,
        window: TimeWindow,
        reference: NaiveDateTime,
    ) -> Self {
        let groups = aggregate(&sessions, window, reference);
        Self {
            sessions,
            window,
            groups,
        }
    }

    pub fn select(&mut self, window: TimeWindow, reference: NaiveDateTime) {
        self.window = window;
        self.groups = aggregate(&self.sessions, window, reference);
        debug!(%window, groups = self.groups.len(), "regrouped sessions");
    }

    pub fn window(&self) -> TimeWindow {
        self.window
    }

    pub fn groups(&self) -> &[SubjectGroup] {
        &self.groups
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn total_minutes(&self) -> u64 {
        total_duration(&self.groups)
    }

    pub fn chart(&self, style: &ChartStyle) -> Option<Chart> {
        Chart::from_groups(&self.groups, style)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use chrono::NaiveDateTime;

    use crate::api::{ApiError, SessionSource};
    use crate::chart::ChartStyle;
    use crate::domain::{SessionRecord, TimeWindow};

    use super::StudyStats;

    struct CountingSource {
        sessions: Vec<SessionRecord>,
        expired: bool,
        calls: Cell<u32>,
    }

    impl SessionSource for CountingSource {
        fn fetch_page(&self, _token: &str, page: u32) -> Result<Vec<SessionRecord>, ApiError> {
            self.calls.set(self.calls.get() + 1);
            if self.expired {
                return Err(ApiError::SessionExpired);
            }
            Ok(if page == 1 {
                self.sessions.clone()
            } else {
                Vec::new()
            })
        }
    }

    fn reference() -> NaiveDateTime {
        NaiveDateTime::parse_from_str("2024-06-12 10:00:00", "%Y-%m-%d %H:%M:%S").expect("valid timestamp")
    }

    fn source(expired: bool) -> CountingSource {
        CountingSource {
            sessions: vec![
                SessionRecord::new(Some("2024-06-12 08:00:00"), 20, Some("Maths")),
                SessionRecord::new(Some("2024-06-10 08:00:00"), 30, Some("Maths")),
                SessionRecord::new(Some("2024-02-01 08:00:00"), 60, None),
                SessionRecord::new(None, 90, Some("Art")),
            ],
            expired,
            calls: Cell::new(0),
        }
    }

    #[test]
    fn switching_windows_reuses_the_snapshot() {
        let source = source(false);
        let mut stats = StudyStats::load(&source, "token", TimeWindow::Day, reference()).expect("load");
        let calls_after_load = source.calls.get();
        assert_eq!(stats.session_count(), 4);
        assert_eq!(stats.total_minutes(), 20);

        stats.select(TimeWindow::Week, reference());
        assert_eq!(stats.window(), TimeWindow::Week);
        assert_eq!(stats.total_minutes(), 50);

        stats.select(TimeWindow::Year, reference());
        assert_eq!(stats.groups().len(), 2);
        assert_eq!(stats.groups()[1].subject_name, "No Tag");
        assert_eq!(stats.total_minutes(), 110);

        assert_eq!(source.calls.get(), calls_after_load);
    }

    #[test]
    fn load_surfaces_expired_sessions() {
        let err = StudyStats::load(&source(true), "token", TimeWindow::Day, reference())
            .expect_err("load should fail");
        assert!(matches!(err, ApiError::SessionExpired));
    }

    #[test]
    fn empty_window_has_no_chart() {
        let stats = StudyStats::from_sessions(Vec::new(), TimeWindow::Month, reference());
        assert!(stats.groups().is_empty());
        assert_eq!(stats.chart(&ChartStyle::default()), None);
    }
}
