use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::core::Alert;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Site {
    #[serde(rename = "@name", default)]
    pub name: String,
    #[serde(default)]
    pub alerts: Vec<Alert>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Site {
    pub fn new(name: impl Into<String>, alerts: Vec<Alert>) -> Self {
        Self {
            name: name.into(),
            alerts,
            extra: Map::new(),
        }
    }

    pub fn alert(&self, rule_id: &str) -> Option<&Alert> {
        self.alerts.iter().find(|a| a.rule_id == rule_id)
    }

    /// Instance counts per rule id; alerts sharing a rule id are summed.
    pub fn counts_by_rule(&self) -> BTreeMap<&str, u64> {
        let mut counts = BTreeMap::new();
        for alert in &self.alerts {
            let entry = counts.entry(alert.rule_id.as_str()).or_insert(0u64);
            *entry = entry.saturating_add(alert.count);
        }
        counts
    }

    pub fn rule_count(&self, rule_id: &str) -> u64 {
        self.alerts
            .iter()
            .filter(|a| a.rule_id == rule_id)
            .fold(0u64, |acc, a| acc.saturating_add(a.count))
    }
}

/// A ZAP traditional JSON report restricted to a single scanned site.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    #[serde(rename = "@version", default, skip_serializing_if = "String::is_empty")]
    pub version: String,
    #[serde(rename = "@generated", default, skip_serializing_if = "String::is_empty")]
    pub generated: String,
    #[serde(
        default,
        deserialize_with = "deserialize_site",
        serialize_with = "serialize_site"
    )]
    pub site: Site,
    /// Set by [`crate::diff::diff`]; never persisted.
    #[serde(skip)]
    pub updated: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Report {
    pub fn new(site: Site) -> Self {
        Self {
            site,
            ..Self::default()
        }
    }

    pub fn from_json(s: &str) -> Result<Self> {
        let mut report: Report =
            serde_json::from_str(s).context("failed to parse ZAP JSON report")?;
        report.normalize();
        Ok(report)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let mut report: Report =
            serde_json::from_slice(bytes).context("failed to parse ZAP JSON report")?;
        report.normalize();
        Ok(report)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let s = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read report: {}", path.display()))?;
        Self::from_json(&s).with_context(|| format!("report: {}", path.display()))
    }

    /// Replaces the file at `path` with this report.
    pub fn save(&self, path: &Path) -> Result<()> {
        let buf = serde_json::to_vec(self).context("failed to serialize report")?;
        if path.exists() {
            std::fs::remove_file(path)
                .with_context(|| format!("failed to remove report: {}", path.display()))?;
        }
        std::fs::write(path, buf)
            .with_context(|| format!("failed to write report: {}", path.display()))
    }

    pub fn normalize(&mut self) {
        self.extra.remove("updated");
        for alert in &mut self.site.alerts {
            alert.normalize();
        }
    }

    pub fn has_alerts(&self) -> bool {
        !self.site.alerts.is_empty()
    }

    pub fn rule_ids(&self) -> impl Iterator<Item = &str> {
        self.site.alerts.iter().map(|a| a.rule_id.as_str())
    }
}

/// The previous run's report, when one could be located and fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Previous {
    Present(Report),
    Absent,
}

impl Previous {
    pub fn is_available(&self) -> bool {
        matches!(self, Previous::Present(_))
    }

    pub fn report(&self) -> Option<&Report> {
        match self {
            Previous::Present(report) => Some(report),
            Previous::Absent => None,
        }
    }
}

impl From<Option<Report>> for Previous {
    fn from(value: Option<Report>) -> Self {
        match value {
            Some(report) => Previous::Present(report),
            None => Previous::Absent,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawSite {
    Many(Vec<Site>),
    One(Site),
}

fn deserialize_site<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Site, D::Error> {
    match RawSite::deserialize(deserializer)? {
        RawSite::One(site) => Ok(site),
        RawSite::Many(mut sites) => match sites.len() {
            0 => Ok(Site::default()),
            1 => Ok(sites.remove(0)),
            n => Err(serde::de::Error::custom(format!(
                "report contains {n} sites; only single-site reports are supported"
            ))),
        },
    }
}

fn serialize_site<S: Serializer>(site: &Site, serializer: S) -> Result<S::Ok, S::Error> {
    use serde::ser::SerializeSeq;

    let mut seq = serializer.serialize_seq(Some(1))?;
    seq.serialize_element(site)?;
    seq.end()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::RiskLevel;

    const ZAP_REPORT: &str = r#"{
        "@version": "2.14.0",
        "@generated": "Mon, 1 Jan 2024 00:00:00",
        "site": [{
            "@name": "https://example.com",
            "@host": "example.com",
            "@port": "443",
            "alerts": [
                {
                    "pluginid": "10038",
                    "alertRef": "10038-1",
                    "alert": "Content Security Policy (CSP) Header Not Set",
                    "name": "Content Security Policy (CSP) Header Not Set",
                    "riskcode": "2",
                    "confidence": "3",
                    "riskdesc": "Medium (High)",
                    "instances": [
                        {"uri": "https://example.com/", "method": "GET", "param": "", "attack": "", "evidence": ""},
                        {"uri": "https://example.com/robots.txt", "method": "GET", "param": "", "attack": "", "evidence": ""}
                    ],
                    "count": "2"
                }
            ]
        }]
    }"#;

    #[test]
    fn parses_zap_traditional_json() {
        let report = Report::from_json(ZAP_REPORT).expect("parse report");
        assert_eq!(report.version, "2.14.0");
        assert_eq!(report.site.name, "https://example.com");
        assert_eq!(report.site.alerts.len(), 1);
        let alert = &report.site.alerts[0];
        assert_eq!(alert.rule_id, "10038");
        assert_eq!(alert.risk_level, RiskLevel::Medium);
        assert_eq!(alert.count, 2);
        assert_eq!(alert.instances[0].evidence.as_deref(), Some(""));
        assert!(!report.updated);
    }

    #[test]
    fn serializes_site_back_as_array() {
        let report = Report::from_json(ZAP_REPORT).expect("parse report");
        let v = serde_json::to_value(&report).expect("serialize");
        let sites = v.get("site").and_then(|s| s.as_array()).expect("site array");
        assert_eq!(sites.len(), 1);
        assert_eq!(sites[0].get("@host").and_then(|h| h.as_str()), Some("example.com"));
        assert!(v.get("updated").is_none());
    }

    #[test]
    fn accepts_single_site_object_and_empty_array() {
        let one = Report::from_json(r#"{"site": {"@name": "x", "alerts": []}}"#).expect("object");
        assert_eq!(one.site.name, "x");
        let none = Report::from_json(r#"{"site": []}"#).expect("empty");
        assert!(!none.has_alerts());
        let missing = Report::from_json("{}").expect("missing site");
        assert!(!missing.has_alerts());
    }

    #[test]
    fn rejects_multi_site_reports() {
        let err = Report::from_json(r#"{"site": [{"@name": "a"}, {"@name": "b"}]}"#)
            .expect_err("multi site");
        let chain = format!("{err:#}");
        assert!(chain.contains("2 sites"), "{chain}");
    }

    #[test]
    fn stray_updated_key_is_not_written_back() {
        let mut report =
            Report::from_json(r#"{"updated": true, "@version": "2.14.0", "site": []}"#).expect("parse");
        assert!(!report.extra.contains_key("updated"));
        report.updated = true;
        let v = serde_json::to_value(&report).expect("serialize");
        assert!(v.get("updated").is_none());
        assert_eq!(v.get("@version").and_then(|s| s.as_str()), Some("2.14.0"));
    }

    #[test]
    fn repeated_rule_ids_are_summed() {
        let mut first = Alert::new("10038", "CSP", RiskLevel::Medium, vec![]);
        first.count = 2;
        let mut second = first.clone();
        second.count = 3;
        let other = Alert::new("40018", "SQL Injection", RiskLevel::High, vec![]);
        let site = Site::new("https://example.com", vec![first, other, second]);

        assert_eq!(site.rule_count("10038"), 5);
        assert_eq!(site.rule_count("missing"), 0);
        let counts = site.counts_by_rule();
        assert_eq!(counts.get("10038"), Some(&5));
        assert_eq!(counts.get("40018"), Some(&0));
    }

    #[test]
    fn previous_from_option() {
        assert!(!Previous::from(None).is_available());
        assert!(Previous::from(Some(Report::default())).is_available());
    }
}
