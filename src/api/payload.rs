//! Create payloads, mapped field-by-field onto what the backend accepts.
//!
//! Drafts carry raw user input (everything is text, as typed into a form).
//! `into_body` validates required fields, turns blank strings into nulls and
//! coerces numeric fields, storing null instead of NaN or zero.

use serde::Deserialize;
use serde_json::{json, Value};

use super::ApiError;
use crate::record::{coerce_number, RecordKind};

fn opt(value: Option<String>) -> Value {
    match value {
        Some(s) if !s.trim().is_empty() => Value::String(s),
        _ => Value::Null,
    }
}

fn num(value: Option<String>) -> Value {
    coerce_number(value.map(Value::String).as_ref())
        .map(Value::from)
        .unwrap_or(Value::Null)
}

fn required(kind: RecordKind, field: &str, value: Option<String>) -> Result<String, ApiError> {
    match value {
        Some(s) if !s.trim().is_empty() => Ok(s),
        _ => Err(ApiError::Validation {
            kind: kind.singular(),
            message: format!("{} is required", field),
        }),
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadDraft {
    pub salutation: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub company: Option<String>,
    pub status: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub mobile_phone: Option<String>,
    pub website: Option<String>,
    pub industry: Option<String>,
    pub lead_source: Option<String>,
    pub rating: Option<String>,
    pub annual_revenue: Option<String>,
    pub number_of_employees: Option<String>,
}

impl LeadDraft {
    pub fn into_body(self) -> Result<Value, ApiError> {
        let kind = RecordKind::Lead;
        Ok(json!({
            "salutation": opt(self.salutation),
            "firstName": opt(self.first_name),
            "lastName": required(kind, "lastName", self.last_name)?,
            "company": required(kind, "company", self.company)?,
            "status": required(kind, "status", self.status)?,
            "email": opt(self.email),
            "phone": opt(self.phone),
            "mobilePhone": opt(self.mobile_phone),
            "website": opt(self.website),
            "industry": opt(self.industry),
            "leadSource": opt(self.lead_source),
            "rating": opt(self.rating),
            "annualRevenue": num(self.annual_revenue),
            "numberOfEmployees": num(self.number_of_employees),
        }))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountDraft {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    #[serde(rename = "type")]
    pub account_type: Option<String>,
    pub ownership: Option<String>,
    pub industry: Option<String>,
    pub number_of_employees: Option<String>,
    pub annual_revenue: Option<String>,
    pub rating: Option<String>,
    pub sic: Option<String>,
    pub last_interaction_date: Option<String>,
}

impl AccountDraft {
    pub fn into_body(self) -> Result<Value, ApiError> {
        Ok(json!({
            "name": required(RecordKind::Account, "name", self.name)?,
            "phone": opt(self.phone),
            "website": opt(self.website),
            "type": opt(self.account_type),
            "ownership": opt(self.ownership),
            "industry": opt(self.industry),
            "numberOfEmployees": num(self.number_of_employees),
            "annualRevenue": num(self.annual_revenue),
            "rating": opt(self.rating),
            "sic": opt(self.sic),
            "lastInteractionDate": opt(self.last_interaction_date),
        }))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpportunityDraft {
    pub name: Option<String>,
    /// Stage as picked in the form; sent as `stageName`.
    #[serde(alias = "stageName")]
    pub stage: Option<String>,
    pub close_date: Option<String>,
    pub amount: Option<String>,
    pub lead_source: Option<String>,
    #[serde(rename = "type")]
    pub opportunity_type: Option<String>,
    pub next_step: Option<String>,
    pub region: Option<String>,
}

impl OpportunityDraft {
    pub fn into_body(self) -> Result<Value, ApiError> {
        let kind = RecordKind::Opportunity;
        Ok(json!({
            "name": required(kind, "name", self.name)?,
            "stageName": required(kind, "stageName", self.stage)?,
            "closeDate": required(kind, "closeDate", self.close_date)?,
            "amount": num(self.amount),
            "leadSource": opt(self.lead_source),
            "type": opt(self.opportunity_type),
            "nextStep": opt(self.next_step),
            "region": opt(self.region),
        }))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDraft {
    pub subject: Option<String>,
    pub status: Option<String>,
    pub priority: Option<String>,
    pub due_date: Option<String>,
    pub description: Option<String>,
}

impl TaskDraft {
    pub fn into_body(self) -> Result<Value, ApiError> {
        let kind = RecordKind::Task;
        Ok(json!({
            "subject": required(kind, "subject", self.subject)?,
            "status": required(kind, "status", self.status)?,
            "priority": opt(self.priority),
            "dueDate": opt(self.due_date),
            "description": opt(self.description),
        }))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteDraft {
    pub title: Option<String>,
    pub content: Option<String>,
    /// Identifier of the account the note hangs off.
    pub related_sf_id: Option<String>,
}

impl NoteDraft {
    pub fn into_body(self) -> Result<Value, ApiError> {
        Ok(json!({
            "title": opt(self.title),
            "content": opt(self.content),
            "relatedSfId": required(RecordKind::Note, "relatedSfId", self.related_sf_id)?,
        }))
    }
}

/// Map raw draft JSON for `kind` onto its create body.
///
/// Numbers and booleans in the draft are accepted and read as their text.
pub fn create_body(kind: RecordKind, draft: Value) -> Result<Value, ApiError> {
    let draft = match draft {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| {
                    let v = match v {
                        Value::Number(n) => Value::String(n.to_string()),
                        Value::Bool(b) => Value::String(b.to_string()),
                        other => other,
                    };
                    (k, v)
                })
                .collect(),
        ),
        other => other,
    };
    match kind {
        RecordKind::Lead => serde_json::from_value::<LeadDraft>(draft)?.into_body(),
        RecordKind::Account => serde_json::from_value::<AccountDraft>(draft)?.into_body(),
        RecordKind::Opportunity => serde_json::from_value::<OpportunityDraft>(draft)?.into_body(),
        RecordKind::Task => serde_json::from_value::<TaskDraft>(draft)?.into_body(),
        RecordKind::Note => serde_json::from_value::<NoteDraft>(draft)?.into_body(),
    }
}
