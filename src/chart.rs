use serde::{Deserialize, Serialize};

use crate::domain::{SubjectGroup, format_minutes, total_duration};

pub const EMPTY_STATE: [&str; 2] = ["No study sessions recorded yet.", "Ready to make a start?"];

/// Bar geometry, in chart width units. Passed explicitly to every rendering
/// call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChartStyle {
    pub max_width: f64,
    pub min_width: f64,
    /// Width units represented by one printed bar cell.
    pub cell_width: f64,
}

impl ChartStyle {
    /// Describes the first field that cannot produce a sensible bar, if any.
    pub fn problem(&self) -> Option<String> {
        let fields = [
            ("max_width", self.max_width),
            ("min_width", self.min_width),
            ("cell_width", self.cell_width),
        ];
        if let Some((name, value)) = fields.iter().find(|(_, value)| !value.is_finite()) {
            return Some(format!("{name} must be a finite number, got {value}"));
        }
        if self.min_width < 0.0 {
            return Some(format!("min_width must not be negative, got {}", self.min_width));
        }
        if self.min_width > self.max_width {
            return Some(format!(
                "min_width ({}) is larger than max_width ({})",
                self.min_width, self.max_width
            ));
        }
        None
    }
}

impl Default for ChartStyle {
    fn default() -> Self {
        Self {
            max_width: 210.0,
            min_width: 50.0,
            cell_width: 10.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChartBar {
    pub subject_name: String,
    pub total_duration: u64,
    pub width: f64,
    pub percent: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Chart {
    pub total_duration: u64,
    pub bars: Vec<ChartBar>,
}

impl Chart {
    /// Builds one bar per group. Returns `None` when there is nothing to
    /// draw, including when every group totals zero minutes.
    pub fn from_groups(groups: &[SubjectGroup], style: &ChartStyle) -> Option<Chart> {
        let total = total_duration(groups);
        if total == 0 {
            return None;
        }

        let bars = groups
            .iter()
            .map(|group| ChartBar {
                subject_name: group.subject_name.clone(),
                total_duration: group.total_duration,
                width: bar_width(group.total_duration, total, style),
                percent: percent_of(group.total_duration, total),
            })
            .collect();

        Some(Chart {
            total_duration: total,
            bars,
        })
    }

    pub fn render_lines(&self, style: &ChartStyle) -> Vec<String> {
        let label_width = self
            .bars
            .iter()
            .map(|bar| bar.subject_name.chars().count())
            .max()
            .unwrap_or(0);

        self.bars
            .iter()
            .map(|bar| {
                format!(
                    "{:<label_width$} {:>6} {:>4}% {}",
                    bar.subject_name,
                    format_minutes(bar.total_duration),
                    bar.percent,
                    "=".repeat(bar_cells(bar.width, style)),
                )
            })
            .collect()
    }
}

/// Scales the share of `total` to `max_width`, never narrower than
/// `min_width`. An inverted style yields `min_width` rather than panicking.
pub fn bar_width(duration: u64, total: u64, style: &ChartStyle) -> f64 {
    let share = duration as f64 / total as f64;
    (share * style.max_width).min(style.max_width).max(style.min_width)
}

pub fn percent_of(duration: u64, total: u64) -> u64 {
    ((duration as f64 / total as f64) * 100.0).round() as u64
}

fn bar_cells(width: f64, style: &ChartStyle) -> usize {
    if style.cell_width <= 0.0 {
        return 1;
    }
    ((width / style.cell_width).round() as usize).max(1)
}

#[cfg(test)]
mod tests {
    use crate::domain::SubjectGroup;

    use super::{Chart, ChartStyle, bar_width, percent_of};

    fn group(name: &str, minutes: u64) -> SubjectGroup {
        SubjectGroup {
            subject_name: name.to_string(),
            total_duration: minutes,
        }
    }

    #[test]
    fn bar_width_is_clamped_to_style_bounds() {
        let style = ChartStyle::default();
        assert_eq!(bar_width(100, 100, &style), 210.0);
        assert_eq!(bar_width(1, 100, &style), 50.0);
        assert_eq!(bar_width(50, 100, &style), 105.0);
    }

    #[test]
    fn inverted_style_is_reported_and_does_not_panic() {
        let style = ChartStyle {
            min_width: 300.0,
            ..ChartStyle::default()
        };
        assert!(style.problem().is_some_and(|problem| problem.contains("min_width")));

        let chart = Chart::from_groups(&[group("Maths", 10)], &style).expect("chart should exist");
        assert_eq!(chart.bars[0].width, 300.0);
    }

    #[test]
    fn non_finite_style_is_reported() {
        let style = ChartStyle {
            cell_width: f64::NAN,
            ..ChartStyle::default()
        };
        assert!(style.problem().is_some_and(|problem| problem.starts_with("cell_width")));
        assert_eq!(ChartStyle::default().problem(), None);
    }

    #[test]
    fn percentages_round_to_nearest() {
        assert_eq!(percent_of(1, 3), 33);
        assert_eq!(percent_of(2, 3), 67);
        assert_eq!(percent_of(1, 8), 13);
    }

    #[test]
    fn no_chart_when_total_is_zero() {
        let style = ChartStyle::default();
        assert_eq!(Chart::from_groups(&[], &style), None);
        assert_eq!(Chart::from_groups(&[group("Maths", 0)], &style), None);
    }

    #[test]
    fn renders_one_line_per_group() {
        let style = ChartStyle::default();
        let chart = Chart::from_groups(&[group("Maths", 75), group("No Tag", 25)], &style)
            .expect("chart should exist");
        assert_eq!(chart.total_duration, 100);
        assert_eq!(chart.bars[0].percent, 75);
        assert_eq!(chart.bars[1].width, 52.5);

        let lines = chart.render_lines(&style);
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("Maths "));
        assert!(lines[0].ends_with(&"=".repeat(16)));
        assert!(lines[1].contains("25m"));
    }
}
