//! Client-side record search for pickers (e.g. choosing a note's account).

use crate::record::Record;

const LABEL_FIELDS: &[&str] = &["name", "Name", "label"];

/// Display label of a record, "Record" when it has none.
pub fn label_for(record: &Record) -> String {
    record
        .non_empty_text(LABEL_FIELDS)
        .unwrap_or_else(|| "Record".to_string())
}

/// Records whose label contains `query`, case-insensitively.
/// An empty query matches nothing.
pub fn filter_by_name<'a>(records: &'a [Record], query: &str) -> Vec<&'a Record> {
    let query = query.to_lowercase();
    if query.is_empty() {
        return Vec::new();
    }
    records
        .iter()
        .filter(|r| {
            r.text(LABEL_FIELDS)
                .is_some_and(|name| name.to_lowercase().contains(&query))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::normalize;
    use serde_json::json;

    #[test]
    fn test_filter_by_name() {
        let records = normalize(&json!([
            { "Name": "Acme Corp", "sfId": "1" },
            { "name": "Globex", "_id": "2" },
            { "label": "ACME Labs" },
            { "Industry": "Tech" },
        ]));
        let hits: Vec<String> = filter_by_name(&records, "acme")
            .into_iter()
            .map(label_for)
            .collect();
        assert_eq!(hits, vec!["Acme Corp", "ACME Labs"]);
        assert!(filter_by_name(&records, "").is_empty());
    }

    #[test]
    fn test_label_fallback() {
        let records = normalize(&json!([{ "Industry": "Tech" }]));
        assert_eq!(label_for(&records[0]), "Record");
    }
}
