use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::core::{Previous, Report};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CountChange {
    pub previous: u64,
    pub current: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DiffResult {
    pub new_alerts: BTreeSet<String>,
    pub resolved_alerts: BTreeSet<String>,
    pub changed_counts: BTreeMap<String, CountChange>,
}

impl DiffResult {
    pub fn is_empty(&self) -> bool {
        self.new_alerts.is_empty() && self.resolved_alerts.is_empty() && self.changed_counts.is_empty()
    }
}

/// Compares `current` against the previous run and records on
/// `current.updated` whether anything changed. Alerts correspond only by rule
/// id; their position, name and risk level play no part.
pub fn diff(current: &mut Report, previous: &Previous) -> DiffResult {
    let result = match previous {
        Previous::Absent => DiffResult {
            new_alerts: current.rule_ids().map(str::to_string).collect(),
            ..DiffResult::default()
        },
        Previous::Present(prev) => diff_counts(&current.site.counts_by_rule(), &prev.site.counts_by_rule()),
    };

    current.updated = match previous {
        Previous::Absent => true,
        Previous::Present(_) => !result.is_empty(),
    };
    result
}

fn diff_counts(current: &BTreeMap<&str, u64>, previous: &BTreeMap<&str, u64>) -> DiffResult {
    let mut result = DiffResult::default();

    for (rule_id, &count) in current {
        match previous.get(rule_id) {
            None => {
                result.new_alerts.insert(rule_id.to_string());
            }
            Some(&prev) if prev != count => {
                result.changed_counts.insert(
                    rule_id.to_string(),
                    CountChange {
                        previous: prev,
                        current: count,
                    },
                );
            }
            Some(_) => {}
        }
    }

    for rule_id in previous.keys() {
        if !current.contains_key(rule_id) {
            result.resolved_alerts.insert(rule_id.to_string());
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Alert, RiskLevel, Site};

    fn report(alerts: &[(&str, u64)]) -> Report {
        Report::new(Site::new(
            "https://example.com",
            alerts
                .iter()
                .map(|(id, count)| {
                    let mut a = Alert::new(*id, format!("alert {id}"), RiskLevel::Medium, vec![]);
                    a.count = *count;
                    a
                })
                .collect(),
        ))
    }

    fn set(ids: &[&str]) -> BTreeSet<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn no_previous_marks_everything_new() {
        let mut current = report(&[("SQLI", 1), ("XSS", 2)]);
        let d = diff(&mut current, &Previous::Absent);
        assert_eq!(d.new_alerts, set(&["SQLI", "XSS"]));
        assert!(d.resolved_alerts.is_empty());
        assert!(d.changed_counts.is_empty());
        assert!(current.updated);
    }

    #[test]
    fn no_previous_with_empty_report_is_still_updated() {
        let mut current = report(&[]);
        let d = diff(&mut current, &Previous::Absent);
        assert!(d.is_empty());
        assert!(current.updated);
    }

    #[test]
    fn resolved_alert_is_detected() {
        let mut current = report(&[("SQLI", 1)]);
        let previous = Previous::Present(report(&[("SQLI", 1), ("XSS", 1)]));
        let d = diff(&mut current, &previous);
        assert_eq!(d.resolved_alerts, set(&["XSS"]));
        assert!(d.new_alerts.is_empty());
        assert!(current.updated);
    }

    #[test]
    fn identical_reports_are_not_updated() {
        let mut current = report(&[("SQLI", 3)]);
        let previous = Previous::Present(report(&[("SQLI", 3)]));
        let d = diff(&mut current, &previous);
        assert!(d.is_empty());
        assert!(!current.updated);
    }

    #[test]
    fn count_drift_is_recorded() {
        let mut current = report(&[("SQLI", 5), ("XSS", 1)]);
        let previous = Previous::Present(report(&[("SQLI", 2), ("XSS", 1)]));
        let d = diff(&mut current, &previous);
        assert_eq!(
            d.changed_counts.get("SQLI"),
            Some(&CountChange {
                previous: 2,
                current: 5
            })
        );
        assert_eq!(d.changed_counts.len(), 1);
        assert!(current.updated);
    }

    #[test]
    fn repeated_rule_id_is_compared_by_summed_count() {
        let mut current = report(&[("SQLI", 2), ("XSS", 1), ("SQLI", 3)]);
        let previous = Previous::Present(report(&[("SQLI", 5), ("XSS", 1)]));
        let d = diff(&mut current, &previous);
        assert!(d.is_empty(), "{d:?}");
        assert!(!current.updated);

        let previous = Previous::Present(report(&[("SQLI", 4), ("XSS", 1)]));
        let d = diff(&mut current, &previous);
        assert_eq!(
            d.changed_counts.get("SQLI"),
            Some(&CountChange {
                previous: 4,
                current: 5
            })
        );
        assert!(current.updated);
    }

    #[test]
    fn renamed_alert_with_same_rule_id_is_not_a_change() {
        let mut current = report(&[("10038", 1)]);
        current.site.alerts[0].name = "CSP Header Not Set (renamed)".to_string();
        current.site.alerts[0].risk_level = RiskLevel::High;
        let previous = Previous::Present(report(&[("10038", 1)]));
        assert!(diff(&mut current, &previous).is_empty());
        assert!(!current.updated);
    }
}
