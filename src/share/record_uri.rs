use std::fmt;

use serde_json::Value;

use super::{decode_base64, encode_base64};
use crate::config::dns::{DnsModeRow, DnsTableRow};
use crate::config::hydrate::Hydrate;
use crate::config::rule::RuleModeRow;
use crate::config::subscription::SubscriptionRow;
use crate::error::ShareError;
use crate::share::fingerprint::Fingerprint;

/// Record families exchanged as `doay<Kind>://` lines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Rule,
    Dns,
    PublicDns,
    Sub,
}

impl RecordKind {
    pub fn prefix(&self) -> &'static str {
        match self {
            RecordKind::Rule => "doayRule://",
            RecordKind::Dns => "doayDns://",
            RecordKind::PublicDns => "doayPublicDns://",
            RecordKind::Sub => "doaySub://",
        }
    }

    /// Parse the CLI spelling: rule / dns / public-dns / sub
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "rule" => Some(RecordKind::Rule),
            "dns" => Some(RecordKind::Dns),
            "public-dns" | "publicdns" => Some(RecordKind::PublicDns),
            "sub" | "subscription" => Some(RecordKind::Sub),
            _ => None,
        }
    }
}

/// A record that can be shared as a `doay<Kind>://` line
pub trait ShareRecord: Hydrate + Fingerprint {
    const SHARE_KIND: RecordKind;

    fn display_name(&self) -> &str;
}

impl ShareRecord for RuleModeRow {
    const SHARE_KIND: RecordKind = RecordKind::Rule;

    fn display_name(&self) -> &str {
        &self.name
    }
}

impl ShareRecord for DnsModeRow {
    const SHARE_KIND: RecordKind = RecordKind::Dns;

    fn display_name(&self) -> &str {
        &self.name
    }
}

impl ShareRecord for DnsTableRow {
    const SHARE_KIND: RecordKind = RecordKind::PublicDns;

    fn display_name(&self) -> &str {
        &self.name
    }
}

impl ShareRecord for SubscriptionRow {
    const SHARE_KIND: RecordKind = RecordKind::Sub;

    fn display_name(&self) -> &str {
        &self.name
    }
}

/// Outcome counts of a line-by-line import
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub imported: usize,
    pub existing: usize,
    pub failed: usize,
}

impl fmt::Display for ImportSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} imported, {} existing, {} failed",
            self.imported, self.existing, self.failed
        )
    }
}

/// `doay<Kind>://<base64(json)>#<name>`
pub fn export_record<T: ShareRecord>(row: &T) -> String {
    let json = match serde_json::to_string(row) {
        Ok(json) => json,
        Err(e) => {
            log::error!("Failed to serialize {}: {}", T::KIND, e);
            String::from("{}")
        }
    };
    format!(
        "{}{}#{}",
        T::SHARE_KIND.prefix(),
        encode_base64(&json),
        row.display_name()
    )
}

/// One line per record
pub fn export_records<T: ShareRecord>(rows: &[T]) -> String {
    rows.iter().map(export_record).collect::<Vec<_>>().join("\n")
}

/// Decode a single trimmed, non-empty share line
pub fn decode_record<T: ShareRecord>(line: &str) -> Result<T, ShareError> {
    let prefix = T::SHARE_KIND.prefix();
    let body = line
        .strip_prefix(prefix)
        .ok_or_else(|| ShareError::BadPrefix(prefix.to_string()))?;

    // the display name after '#' is informational only
    let body = body.split('#').next().unwrap_or_default();

    let value: Value = serde_json::from_str(&decode_base64(body)?)?;
    if value.get("hash").is_none() {
        return Err(ShareError::MissingHash);
    }

    let row = T::hydrate(value)?;
    if !row.is_hash_current() {
        log::debug!("Imported {} {:?} carries a stale hash", T::KIND, row.display_name());
    }
    Ok(row)
}

/// Result of importing share lines into an existing list
#[derive(Debug, Clone)]
pub struct RecordImport<T> {
    /// Existing rows followed by the newly imported ones
    pub rows: Vec<T>,
    pub summary: ImportSummary,
}

/// Import every line of `input`.
///
/// Lines are independent: a bad line is counted and skipped. A record whose
/// hash already appears in `existing`, or earlier in the same input, is counted
/// as existing.
pub fn import_records<T: ShareRecord>(input: &str, existing: &[T]) -> RecordImport<T> {
    let mut rows = existing.to_vec();
    let mut summary = ImportSummary::default();

    for line in input.lines().map(str::trim).filter(|l| !l.is_empty()) {
        match decode_record::<T>(line) {
            Ok(row) => {
                if rows.iter().any(|r| r.hash() == row.hash()) {
                    summary.existing += 1;
                } else {
                    rows.push(row);
                    summary.imported += 1;
                }
            }
            Err(e) => {
                log::warn!("Skipping {} line: {}", T::KIND, e);
                summary.failed += 1;
            }
        }
    }

    log::info!("{} import: {}", T::KIND, summary);
    RecordImport { rows, summary }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::rule::RuleRow;

    fn rule_mode(name: &str, domain: &str) -> RuleModeRow {
        let mut row = RuleModeRow {
            name: name.to_string(),
            ..Default::default()
        };
        row.set_rules(vec![RuleRow {
            domain: domain.to_string(),
            ..Default::default()
        }]);
        row
    }

    #[test]
    fn test_export_line_shape() {
        let line = export_record(&rule_mode("Ads", "geosite:category-ads"));
        assert!(line.starts_with("doayRule://"));
        assert!(line.ends_with("#Ads"));
    }

    #[test]
    fn test_import_counts_each_outcome() {
        let kept = rule_mode("kept", "a.com");
        let fresh = rule_mode("fresh", "b.com");
        let input = format!(
            "{}\n\n  {}  \n{}\ndoayDns://e30=\ndoayRule://!!!",
            export_record(&kept),
            export_record(&fresh),
            export_record(&fresh),
        );

        let result = import_records(&input, &[kept.clone()]);
        assert_eq!(
            result.summary,
            ImportSummary {
                imported: 1,
                existing: 2,
                failed: 2
            }
        );
        assert_eq!(result.rows.len(), 2);
        assert_eq!(result.rows[1].name, "fresh");
        assert_eq!(result.summary.to_string(), "1 imported, 2 existing, 2 failed");
    }

    #[test]
    fn test_record_without_hash_is_rejected() {
        let line = format!("doayPublicDns://{}#x", encode_base64(r#"{"name":"x"}"#));
        assert!(matches!(
            decode_record::<DnsTableRow>(&line),
            Err(ShareError::MissingHash)
        ));
    }

    #[test]
    fn test_unpadded_payload_is_accepted() {
        let mut sub = SubscriptionRow {
            name: "mine".to_string(),
            url: "https://example.com/sub".to_string(),
            ..Default::default()
        };
        sub.refresh_hash();
        let line = export_record(&sub);
        let (body, name) = line.split_once('#').unwrap();
        let unpadded = format!("{}#{}", body.trim_end_matches('='), name);

        let decoded: SubscriptionRow = decode_record(&unpadded).unwrap();
        assert_eq!(decoded, sub);
    }

    #[test]
    fn test_kind_from_str() {
        assert_eq!(RecordKind::from_str("public-dns"), Some(RecordKind::PublicDns));
        assert_eq!(RecordKind::from_str("server"), None);
    }
}
