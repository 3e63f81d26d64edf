//! Notes aggregation.
//!
//! The backend only serves notes per parent record, so the notes list is
//! assembled by fanning out one lookup per account. A parent without notes
//! answers with an error status; that and any other per-account failure
//! counts as zero notes for that account.
//!
//! One request per account is fine at current record counts. A batched
//! "notes for these parents" endpoint would remove the fan-out.

use futures_util::stream::{FuturesUnordered, StreamExt};

use crate::api::CrmBackend;
use crate::record::{Record, RecordKind};

/// Collect the notes of every account, in account order.
///
/// Accounts without a resolvable identifier are skipped. Lookups run
/// concurrently and every one of them is awaited; a failure never aborts the
/// others.
pub async fn aggregate_notes(backend: &dyn CrmBackend, accounts: &[Record]) -> Vec<Record> {
    let parents: Vec<&str> = accounts.iter().filter_map(Record::id_str).collect();

    let mut lookups = FuturesUnordered::new();
    for (idx, parent_id) in parents.iter().copied().enumerate() {
        lookups.push(async move {
            let notes = match backend.notes_for_parent(parent_id).await {
                Ok(notes) => notes,
                Err(e) => {
                    log::debug!("No notes for account {}: {}", parent_id, e);
                    Vec::new()
                }
            };
            (idx, notes)
        });
    }

    // Lookups finish in any order; slot by index to keep account order.
    let mut slots: Vec<Vec<Record>> = (0..parents.len()).map(|_| Vec::new()).collect();
    while let Some((idx, notes)) = lookups.next().await {
        slots[idx] = notes;
    }
    slots.into_iter().flatten().collect()
}

/// Fetch the account list and aggregate notes across it.
///
/// Never fails: if the account list itself cannot be fetched the result is
/// empty, so the notes view shows no data instead of an error.
pub async fn fetch_all_notes(backend: &dyn CrmBackend) -> Vec<Record> {
    let accounts = match backend.list(RecordKind::Account).await {
        Ok(accounts) => accounts,
        Err(e) => {
            log::warn!("Error aggregating notes, account list unavailable: {}", e);
            return Vec::new();
        }
    };

    if accounts.is_empty() {
        return Vec::new();
    }

    let notes = aggregate_notes(backend, &accounts).await;
    log::debug!(
        "Aggregated {} notes across {} accounts",
        notes.len(),
        accounts.len()
    );
    notes
}
