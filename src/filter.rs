use std::collections::HashSet;

use crate::core::Report;

/// Drops every alert whose rule id is on the ignore list. Order and all other
/// fields are left untouched.
pub fn filter(report: &Report, ignored: &[String]) -> Report {
    let mut out = report.clone();
    filter_in_place(&mut out, ignored);
    out
}

pub fn filter_in_place(report: &mut Report, ignored: &[String]) {
    if ignored.is_empty() {
        return;
    }
    let ignored: HashSet<&str> = ignored.iter().map(|s| s.trim()).collect();
    report
        .site
        .alerts
        .retain(|alert| !ignored.contains(alert.rule_id.as_str()));
}

/// Reads a ZAP rules file (`<id>\t<IGNORE|WARN|FAIL>\t<comment>`) and returns
/// the ids marked `IGNORE`, in file order without duplicates.
pub fn parse_rules_file(text: &str) -> Vec<String> {
    let mut ids = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut cols = line.split('\t').map(str::trim);
        let (Some(id), Some(action)) = (cols.next(), cols.next()) else {
            continue;
        };
        if id.is_empty() || !action.eq_ignore_ascii_case("IGNORE") {
            continue;
        }
        ids.push(id.to_string());
    }
    dedup_preserving_order(ids)
}

/// Splits comma separated values, trims them and drops empties.
pub fn split_ids(values: &[String]) -> Vec<String> {
    values
        .iter()
        .flat_map(|v| v.split(','))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

pub fn dedup_preserving_order(ids: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    ids.into_iter()
        .filter(|id| seen.insert(id.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Alert, RiskLevel, Site};

    fn report(ids: &[&str]) -> Report {
        Report::new(Site::new(
            "https://example.com",
            ids.iter()
                .map(|id| Alert::new(*id, format!("alert {id}"), RiskLevel::Low, vec![]))
                .collect(),
        ))
    }

    #[test]
    fn removes_ignored_rule_and_keeps_order() {
        let r = report(&["10038", "RULE-9001", "40012", "10021"]);
        let out = filter(&r, &["RULE-9001".to_string()]);
        let ids: Vec<&str> = out.rule_ids().collect();
        assert_eq!(ids, vec!["10038", "40012", "10021"]);
    }

    #[test]
    fn empty_ignore_list_is_noop() {
        let r = report(&["1", "2"]);
        assert_eq!(filter(&r, &[]), r);
    }

    #[test]
    fn rules_file_collects_ignore_entries() {
        let text = "# zap rules\n10038\tIGNORE\t(CSP)\n10021\tWARN\t(X-Content-Type)\n\n40012\tignore\n10038\tIGNORE\tdup\nbroken-line\n";
        assert_eq!(parse_rules_file(text), vec!["10038".to_string(), "40012".to_string()]);
    }

    #[test]
    fn split_ids_handles_commas_and_blanks() {
        let ids = split_ids(&["10038, 40012".to_string(), " ".to_string(), "1".to_string()]);
        assert_eq!(ids, vec!["10038", "40012", "1"]);
    }
}
