use std::fmt::Write as _;

use crate::core::{Alert, Site};
use crate::diff::DiffResult;

pub const CLOSE_COMMENT: &str = "All the alerts have been resolved during the last ZAP Scan!";

#[derive(Debug, Clone, Copy)]
pub enum Content<'a> {
    Site(&'a Site),
    Diff {
        diff: &'a DiffResult,
        current: &'a Site,
        previous: &'a Site,
    },
}

pub fn compose(content: Content<'_>, context_line: &str, link_line: &str) -> String {
    let mut out = String::new();

    match content {
        Content::Site(site) => {
            write_site_header(&mut out, site);
            let _ = writeln!(out);
            let _ = writeln!(out, "**Alerts ({})**", site.alerts.len());
            let _ = writeln!(out);
            for alert in &site.alerts {
                write_alert_line(&mut out, alert, alert.count);
            }
        }
        Content::Diff {
            diff,
            current,
            previous,
        } => {
            write_site_header(&mut out, current);

            if !diff.new_alerts.is_empty() {
                let _ = writeln!(out);
                let _ = writeln!(out, "**New Alerts ({})**", diff.new_alerts.len());
                let _ = writeln!(out);
                for rule_id in &diff.new_alerts {
                    write_rule(&mut out, current, rule_id);
                }
            }

            if !diff.resolved_alerts.is_empty() {
                let _ = writeln!(out);
                let _ = writeln!(out, "**Resolved Alerts ({})**", diff.resolved_alerts.len());
                let _ = writeln!(out);
                for rule_id in &diff.resolved_alerts {
                    write_rule(&mut out, previous, rule_id);
                }
            }

            if !diff.changed_counts.is_empty() {
                let _ = writeln!(out);
                let _ = writeln!(out, "**Changed Alerts ({})**", diff.changed_counts.len());
                let _ = writeln!(out);
                for (rule_id, change) in &diff.changed_counts {
                    match current.alert(rule_id) {
                        Some(alert) => {
                            let _ = writeln!(
                                out,
                                "- **{}** [{}] risk: {} instances: {} -> {}",
                                alert.display_name(),
                                alert.rule_id,
                                alert.risk_level,
                                change.previous,
                                change.current
                            );
                        }
                        None => {
                            let _ = writeln!(
                                out,
                                "- [{rule_id}] instances: {} -> {}",
                                change.previous, change.current
                            );
                        }
                    }
                }
            }
        }
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "{context_line}");
    let _ = writeln!(out);
    let _ = writeln!(out, "{link_line}");
    out
}

pub fn link_line(server_url: &str, owner: &str, repo: &str, run_id: &str) -> String {
    format!(
        "View the [following link]({}/{owner}/{repo}/actions/runs/{run_id}) to download the report.",
        server_url.trim_end_matches('/')
    )
}

fn write_site_header(out: &mut String, site: &Site) {
    if site.name.is_empty() {
        let _ = writeln!(out, "### ZAP Scan");
    } else {
        let _ = writeln!(out, "### Site: [{0}]({0})", site.name);
    }
}

fn write_alert_line(out: &mut String, alert: &Alert, count: u64) {
    let _ = writeln!(
        out,
        "- **{}** [{}] risk: {} instances: {count}",
        alert.display_name(),
        alert.rule_id,
        alert.risk_level,
    );
}

/// Name and risk come from the first alert of the rule; the count covers all
/// of them.
fn write_rule(out: &mut String, site: &Site, rule_id: &str) {
    match site.alert(rule_id) {
        Some(alert) => write_alert_line(out, alert, site.rule_count(rule_id)),
        None => {
            let _ = writeln!(out, "- [{rule_id}]");
        }
    }
}
