//! Dashboard analytics: grouped counts and a monthly revenue series.
//!
//! `compute_analytics` is pure and total. Missing or malformed fields fall
//! into default buckets ("Open", "Other", "Unknown") or are left out of the
//! revenue series; each such default is counted in [`DataQuality`] so schema
//! drift in the backend stays visible.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use crate::record::Record;

const STATUS_FIELDS: &[&str] = &["status", "Status"];
const INDUSTRY_FIELDS: &[&str] = &["industry", "Industry"];
const STAGE_FIELDS: &[&str] = &["stageName", "StageName", "stage"];
const AMOUNT_FIELDS: &[&str] = &["amount", "Amount"];
const CLOSE_DATE_FIELDS: &[&str] = &["closeDate", "CloseDate"];

const OTHER_INDUSTRY: &str = "Other";
const UNKNOWN_STAGE: &str = "Unknown";

/// Lead status buckets, in series order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeadStatus {
    Open,
    Working,
    Closed,
    Converted,
}

impl LeadStatus {
    const SERIES_ORDER: [LeadStatus; 4] = [
        LeadStatus::Open,
        LeadStatus::Working,
        LeadStatus::Closed,
        LeadStatus::Converted,
    ];

    pub fn label(self) -> &'static str {
        match self {
            LeadStatus::Open => "Open",
            LeadStatus::Working => "Working",
            LeadStatus::Closed => "Closed",
            LeadStatus::Converted => "Converted",
        }
    }

    /// Classify normalized (trimmed, lowercased) status text.
    ///
    /// Returns the bucket and whether it was the fallback.
    pub fn classify(status: &str) -> (LeadStatus, bool) {
        if status.contains("open") {
            (LeadStatus::Open, false)
        } else if status.contains("working") {
            (LeadStatus::Working, false)
        } else if status.contains("closed") && status.contains("converted") {
            (LeadStatus::Converted, false)
        } else if status.contains("closed") {
            (LeadStatus::Closed, false)
        } else {
            (LeadStatus::Open, true)
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NamedCount {
    pub name: String,
    pub value: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageCount {
    pub stage: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RevenuePoint {
    /// Sort key, `YYYY-MM`.
    pub key: String,
    /// Display label, e.g. `Jan 2024`.
    pub month: String,
    pub amount: f64,
}

/// Count of fields that were missing or unusable and got a default.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DataQuality {
    pub lead_status_defaulted: usize,
    pub industry_defaulted: usize,
    pub stage_defaulted: usize,
    /// Opportunities left out of the revenue series.
    pub revenue_excluded: usize,
}

impl DataQuality {
    pub fn total(&self) -> usize {
        self.lead_status_defaulted
            + self.industry_defaulted
            + self.stage_defaulted
            + self.revenue_excluded
    }
}

/// Everything the dashboard charts need, recomputed on every fetch cycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsSnapshot {
    pub total_leads: usize,
    /// Leads in the Working bucket.
    pub total_warm_leads: usize,
    /// Leads in the Converted bucket.
    pub total_hot_leads: usize,
    pub total_accounts: usize,
    pub total_opportunities: usize,
    /// Tasks that are neither completed nor deferred.
    pub total_tasks: usize,
    pub total_notes: usize,
    pub lead_status_data: Vec<NamedCount>,
    pub accounts_by_industry: Vec<NamedCount>,
    pub pipeline_by_stage: Vec<StageCount>,
    pub revenue_timeline: Vec<RevenuePoint>,
    pub data_quality: DataQuality,
}

/// Counter that emits groups in first-seen order.
#[derive(Default)]
struct OrderedCounter {
    index: HashMap<String, usize>,
    groups: Vec<(String, usize)>,
}

impl OrderedCounter {
    fn add(&mut self, key: String) {
        match self.index.get(&key) {
            Some(&i) => self.groups[i].1 += 1,
            None => {
                self.index.insert(key.clone(), self.groups.len());
                self.groups.push((key, 1));
            }
        }
    }

    fn into_groups(self) -> Vec<(String, usize)> {
        self.groups
    }
}

pub fn compute_analytics(
    leads: &[Record],
    accounts: &[Record],
    opportunities: &[Record],
    tasks: &[Record],
    notes: &[Record],
) -> AnalyticsSnapshot {
    let mut quality = DataQuality::default();

    // Leads by status
    let mut status_counts = [0usize; 4];
    for lead in leads {
        let (bucket, defaulted) = LeadStatus::classify(&lead.normalized_text(STATUS_FIELDS));
        status_counts[bucket.index()] += 1;
        if defaulted {
            quality.lead_status_defaulted += 1;
        }
    }
    let lead_status_data = LeadStatus::SERIES_ORDER
        .iter()
        .filter(|s| status_counts[s.index()] > 0)
        .map(|s| NamedCount {
            name: s.label().to_string(),
            value: status_counts[s.index()],
        })
        .collect();

    // Accounts by industry
    let mut industries = OrderedCounter::default();
    for account in accounts {
        let industry = account.non_empty_text(INDUSTRY_FIELDS).unwrap_or_else(|| {
            quality.industry_defaulted += 1;
            OTHER_INDUSTRY.to_string()
        });
        industries.add(industry);
    }
    let accounts_by_industry = industries
        .into_groups()
        .into_iter()
        .map(|(name, value)| NamedCount { name, value })
        .collect();

    // Pipeline by stage and revenue by close month
    let mut stages = OrderedCounter::default();
    let mut revenue: BTreeMap<String, RevenuePoint> = BTreeMap::new();
    for opp in opportunities {
        let stage = opp.non_empty_text(STAGE_FIELDS).unwrap_or_else(|| {
            quality.stage_defaulted += 1;
            UNKNOWN_STAGE.to_string()
        });
        stages.add(stage);

        let amount = opp.number(AMOUNT_FIELDS).unwrap_or(0.0);
        match opp.date(CLOSE_DATE_FIELDS) {
            Some(close) if amount > 0.0 => {
                let key = close.format("%Y-%m").to_string();
                revenue
                    .entry(key.clone())
                    .or_insert_with(|| RevenuePoint {
                        key,
                        month: close.format("%b %Y").to_string(),
                        amount: 0.0,
                    })
                    .amount += amount;
            }
            _ => quality.revenue_excluded += 1,
        }
    }
    let pipeline_by_stage = stages
        .into_groups()
        .into_iter()
        .map(|(stage, count)| StageCount { stage, count })
        .collect();
    let revenue_timeline = revenue.into_values().collect();

    let total_tasks = tasks.iter().filter(|t| is_pending(t)).count();

    if quality.total() > 0 {
        log::debug!("Analytics defaulted fields: {:?}", quality);
    }

    AnalyticsSnapshot {
        total_leads: leads.len(),
        total_warm_leads: status_counts[LeadStatus::Working.index()],
        total_hot_leads: status_counts[LeadStatus::Converted.index()],
        total_accounts: accounts.len(),
        total_opportunities: opportunities.len(),
        total_tasks,
        total_notes: notes.len(),
        lead_status_data,
        accounts_by_industry,
        pipeline_by_stage,
        revenue_timeline,
        data_quality: quality,
    }
}

/// A task is pending unless its status mentions "completed" or "deferred".
pub fn is_pending(task: &Record) -> bool {
    let status = task.normalized_text(STATUS_FIELDS);
    !(status.contains("completed") || status.contains("deferred"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::normalize;
    use serde_json::{json, Value};

    fn records(value: Value) -> Vec<Record> {
        normalize(&value)
    }

    fn named(name: &str, value: usize) -> NamedCount {
        NamedCount {
            name: name.to_string(),
            value,
        }
    }

    #[test]
    fn test_empty_inputs() {
        let snap = compute_analytics(&[], &[], &[], &[], &[]);
        assert_eq!(snap.total_leads, 0);
        assert_eq!(snap.total_accounts, 0);
        assert_eq!(snap.total_opportunities, 0);
        assert_eq!(snap.total_tasks, 0);
        assert_eq!(snap.total_notes, 0);
        assert!(snap.lead_status_data.is_empty());
        assert!(snap.accounts_by_industry.is_empty());
        assert!(snap.pipeline_by_stage.is_empty());
        assert!(snap.revenue_timeline.is_empty());
        assert_eq!(snap.data_quality, DataQuality::default());
    }

    #[test]
    fn test_lead_status_buckets() {
        let leads = records(json!([
            { "Status": "Open - Not Contacted" },
            { "Status": "Working - Contacted" },
            { "Status": "Closed - Converted" },
            { "Status": "Closed - Lost" },
            { "Status": "Unknown" },
        ]));
        let snap = compute_analytics(&leads, &[], &[], &[], &[]);
        assert_eq!(
            snap.lead_status_data,
            vec![
                named("Open", 2),
                named("Working", 1),
                named("Closed", 1),
                named("Converted", 1),
            ]
        );
        assert_eq!(snap.total_warm_leads, 1);
        assert_eq!(snap.total_hot_leads, 1);
        assert_eq!(snap.data_quality.lead_status_defaulted, 1);
    }

    #[test]
    fn test_zero_buckets_omitted() {
        let leads = records(json!([{ "status": "  WORKING " }, { "status": "working" }]));
        let snap = compute_analytics(&leads, &[], &[], &[], &[]);
        assert_eq!(snap.lead_status_data, vec![named("Working", 2)]);
    }

    #[test]
    fn test_revenue_timeline() {
        let opps = records(json!([
            { "amount": 100, "closeDate": "2024-01-15" },
            { "amount": 50, "closeDate": "2024-01-20" },
            { "amount": 0, "closeDate": "2024-02-01" },
            { "amount": 75, "closeDate": null },
        ]));
        let snap = compute_analytics(&[], &[], &opps, &[], &[]);
        assert_eq!(
            snap.revenue_timeline,
            vec![RevenuePoint {
                key: "2024-01".into(),
                month: "Jan 2024".into(),
                amount: 150.0,
            }]
        );
        assert_eq!(snap.data_quality.revenue_excluded, 2);
    }

    #[test]
    fn test_revenue_sorted_by_month_key() {
        let opps = records(json!([
            { "Amount": "300", "CloseDate": "2025-03-02" },
            { "Amount": 20, "CloseDate": "2024-11-30" },
            { "Amount": -5, "CloseDate": "2024-10-01" },
            { "Amount": "n/a", "CloseDate": "2024-09-01" },
        ]));
        let snap = compute_analytics(&[], &[], &opps, &[], &[]);
        let keys: Vec<&str> = snap.revenue_timeline.iter().map(|p| p.key.as_str()).collect();
        assert_eq!(keys, vec!["2024-11", "2025-03"]);
        assert_eq!(snap.revenue_timeline[1].month, "Mar 2025");
        assert_eq!(snap.revenue_timeline[1].amount, 300.0);
    }

    #[test]
    fn test_industry_first_seen_order() {
        let accounts = records(json!([
            { "Name": "A", "Industry": "Tech" },
            { "Name": "B", "industry": "Finance" },
            { "Name": "C", "Industry": "Tech" },
            { "Name": "D", "Industry": "" },
        ]));
        let snap = compute_analytics(&[], &accounts, &[], &[], &[]);
        assert_eq!(
            snap.accounts_by_industry,
            vec![named("Tech", 2), named("Finance", 1), named("Other", 1)]
        );
        assert_eq!(snap.total_accounts, 4);
    }

    #[test]
    fn test_pipeline_by_stage() {
        let opps = records(json!([
            { "StageName": "Prospecting" },
            { "stage": "Closed Won" },
            { "stageName": "Prospecting" },
            {},
        ]));
        let snap = compute_analytics(&[], &[], &opps, &[], &[]);
        let stages: Vec<(&str, usize)> = snap
            .pipeline_by_stage
            .iter()
            .map(|s| (s.stage.as_str(), s.count))
            .collect();
        assert_eq!(
            stages,
            vec![("Prospecting", 2), ("Closed Won", 1), ("Unknown", 1)]
        );
        assert_eq!(snap.data_quality.stage_defaulted, 1);
    }

    #[test]
    fn test_pending_tasks() {
        let tasks = records(json!([
            { "status": "Completed" },
            { "Status": "  DEFERRED  " },
            { "status": "Not Started" },
            { "status": "In Progress" },
            { "status": "something new" },
            {},
        ]));
        let snap = compute_analytics(&[], &[], &[], &tasks, &[]);
        assert_eq!(snap.total_tasks, 4);
    }

    #[test]
    fn test_inputs_untouched() {
        let leads = records(json!([{ "status": "Open" }]));
        let before = leads.clone();
        let _ = compute_analytics(&leads, &[], &[], &[], &leads);
        assert_eq!(leads, before);
    }

    #[test]
    fn test_snapshot_serializes_camel_case() {
        let snap = compute_analytics(&[], &[], &[], &[], &[]);
        let json = serde_json::to_value(&snap).unwrap();
        assert!(json.get("totalLeads").is_some());
        assert!(json.get("revenueTimeline").is_some());
        assert!(json["dataQuality"].get("revenueExcluded").is_some());
    }
}
