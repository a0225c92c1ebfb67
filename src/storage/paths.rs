//! File-name contract of the write-ahead log.
//!
//! The durability layer is an external collaborator; only its naming
//! convention is fixed here so recovery tooling and the engine agree on
//! how to find the transaction high-water mark of each log file.

use chrono::{DateTime, SecondsFormat, Utc};
use tracing::warn;

use crate::storage::store::TransactionId;

/// Name of a finished WAL file: `<iso8601>__max_transaction_<id>`; the log
/// currently being written has no maximum yet: `<iso8601>__current`.
pub fn wal_filename(at: DateTime<Utc>, max_transaction_id: Option<TransactionId>) -> String {
    let timestamp = at.to_rfc3339_opts(SecondsFormat::Micros, true);
    match max_transaction_id {
        Some(id) => format!("{timestamp}__max_transaction_{id}"),
        None => format!("{timestamp}__current"),
    }
}

/// Extracts the maximum transaction id from a WAL file name.
///
/// The "current" file maps to `TransactionId::MAX` so recovery never
/// discards it regardless of the snapshot it starts from. Unparseable
/// names yield `None`.
pub fn transaction_id_from_wal_filename(name: &str) -> Option<TransactionId> {
    let (_, suffix) = match name.rsplit_once("__") {
        Some(parts) => parts,
        None => {
            warn!(name, "unable to parse WAL file name");
            return None;
        }
    };
    if suffix == "current" {
        return Some(TransactionId::MAX);
    }
    let id_str = match suffix.rsplit_once('_') {
        Some((_, id_str)) => id_str,
        None => {
            warn!(name, "unable to parse WAL file name");
            return None;
        }
    };
    match id_str.parse::<TransactionId>() {
        Ok(id) => Some(id),
        Err(_) => {
            warn!(name, tx_id = id_str, "unable to parse WAL file name tx id");
            None
        }
    }
}
