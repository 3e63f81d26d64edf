//! CRM records as returned by the backend.
//!
//! The backend serves two schemas side by side: records mapped from the
//! external CRM object model (PascalCase fields, `Id`/`sfId` identifiers) and
//! records from the local store (camelCase fields, `_id`). Nothing here
//! enforces a schema. Every field is optional and every accessor degrades to
//! `None` instead of failing.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Identifier keys in preference order.
const EXTERNAL_PRIMARY_ID: &str = "Id";
const EXTERNAL_SECONDARY_ID: &str = "sfId";
const LOCAL_ID: &str = "_id";

/// Metadata key the external CRM attaches to every object.
const ATTRIBUTES_KEY: &str = "attributes";

/// Which system minted a record identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdSource {
    External,
    Local,
}

/// Canonical record identifier, resolved once when a record is ingested.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordId {
    pub source: IdSource,
    pub value: String,
}

impl RecordId {
    /// Resolve the identifier of a raw field map: `Id`, then `sfId`, then `_id`.
    pub fn resolve(fields: &Map<String, Value>) -> Option<Self> {
        [
            (EXTERNAL_PRIMARY_ID, IdSource::External),
            (EXTERNAL_SECONDARY_ID, IdSource::External),
            (LOCAL_ID, IdSource::Local),
        ]
        .into_iter()
        .find_map(|(key, source)| {
            id_text(fields.get(key)?).map(|value| RecordId { source, value })
        })
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.value)
    }
}

fn id_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// The five record kinds the CRM exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    Lead,
    Account,
    Opportunity,
    Task,
    Note,
}

impl RecordKind {
    pub const ALL: [RecordKind; 5] = [
        RecordKind::Lead,
        RecordKind::Account,
        RecordKind::Opportunity,
        RecordKind::Task,
        RecordKind::Note,
    ];

    /// Collection name used in REST paths and view modes.
    pub fn plural(self) -> &'static str {
        match self {
            RecordKind::Lead => "leads",
            RecordKind::Account => "accounts",
            RecordKind::Opportunity => "opportunities",
            RecordKind::Task => "tasks",
            RecordKind::Note => "notes",
        }
    }

    pub fn singular(self) -> &'static str {
        match self {
            RecordKind::Lead => "lead",
            RecordKind::Account => "account",
            RecordKind::Opportunity => "opportunity",
            RecordKind::Task => "task",
            RecordKind::Note => "note",
        }
    }
}

impl std::str::FromStr for RecordKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        RecordKind::ALL
            .into_iter()
            .find(|k| k.plural() == wanted || k.singular() == wanted)
            .ok_or_else(|| format!("Unknown record kind: {}", s))
    }
}

/// One backend record: its raw fields plus the identifier resolved at ingestion.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    #[serde(rename = "recordId")]
    pub id: Option<RecordId>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Record {
    pub fn new(fields: Map<String, Value>) -> Self {
        let id = RecordId::resolve(&fields);
        Self { id, fields }
    }

    /// Build a record from a JSON value. Non-objects yield `None`.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(fields) => Some(Self::new(fields)),
            _ => None,
        }
    }

    pub fn id_str(&self) -> Option<&str> {
        self.id.as_ref().map(RecordId::as_str)
    }

    /// First alias whose value is present and not null.
    pub fn field(&self, aliases: &[&str]) -> Option<&Value> {
        resolve(&self.fields, aliases)
    }

    /// Field rendered as text. Strings as-is, numbers and booleans stringified.
    pub fn text(&self, aliases: &[&str]) -> Option<String> {
        match self.field(aliases)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    /// Text of the first alias with a non-blank value. Blank values fall
    /// through to the next alias.
    pub fn non_empty_text(&self, aliases: &[&str]) -> Option<String> {
        aliases
            .iter()
            .find_map(|alias| self.text(&[*alias]).filter(|s| !s.trim().is_empty()))
    }

    /// Trimmed, lowercased field text. Absent fields yield an empty string.
    pub fn normalized_text(&self, aliases: &[&str]) -> String {
        self.text(aliases)
            .map(|s| s.trim().to_lowercase())
            .unwrap_or_default()
    }

    pub fn number(&self, aliases: &[&str]) -> Option<f64> {
        coerce_number(self.field(aliases))
    }

    /// Calendar date of a date-like field.
    pub fn date(&self, aliases: &[&str]) -> Option<NaiveDate> {
        parse_date(&self.text(aliases)?)
    }

    /// Fields worth showing in a detail view, in backend order.
    pub fn display_fields(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.fields.iter().filter(|(k, _)| k.as_str() != ATTRIBUTES_KEY)
    }
}

/// Normalize a backend response into records.
///
/// Accepts a bare array or an envelope `{ "data": [...] }`. Any other shape
/// yields an empty list; malformed responses never raise.
pub fn normalize(response: &Value) -> Vec<Record> {
    let items = match response {
        Value::Array(items) => items,
        Value::Object(envelope) => match envelope.get("data") {
            Some(Value::Array(items)) => items,
            _ => {
                log::debug!("normalize: envelope without a data list, treating as empty");
                return Vec::new();
            }
        },
        _ => return Vec::new(),
    };

    let records: Vec<Record> = items
        .iter()
        .filter_map(|item| Record::from_value(item.clone()))
        .collect();
    if records.len() != items.len() {
        log::debug!(
            "normalize: dropped {} non-object entries",
            items.len() - records.len()
        );
    }
    records
}

/// Return the first alias whose value is present and not null.
pub fn resolve<'a>(fields: &'a Map<String, Value>, aliases: &[&str]) -> Option<&'a Value> {
    aliases
        .iter()
        .filter_map(|alias| fields.get(*alias))
        .find(|v| !v.is_null())
}

/// Numeric coercion that never produces NaN.
///
/// Numbers pass through, numeric strings are parsed, and empty, absent or
/// unparseable values yield `None`.
pub fn coerce_number(value: Option<&Value>) -> Option<f64> {
    let n = match value? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return None;
            }
            trimmed.parse::<f64>().ok()?
        }
        _ => return None,
    };
    n.is_finite().then_some(n)
}

pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if let Ok(d) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(d);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.date_naive());
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f"))
        .ok()
        .map(|dt| dt.date())
}

/// Instant of a date-like value. Bare dates are midnight UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f"))
    {
        return Some(dt.and_utc());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}
