use std::collections::HashSet;

use csv::{ReaderBuilder, WriterBuilder};

use crate::error::{AppError, Result};
use crate::models::{Bit, Entity, Setlist, SetlistItem, Show, Snapshot};

use super::record::{BackupRow, Decoded, COLUMNS};

/// Serializes all four collections into one CSV document: bits, setlists,
/// setlist items, then shows. The header is written even when there are no rows.
pub fn encode(snapshot: &Snapshot) -> Result<String> {
    let mut writer = WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    writer.write_record(COLUMNS)?;

    let rows = snapshot
        .bits
        .iter()
        .map(BackupRow::from_bit)
        .chain(snapshot.setlists.iter().map(BackupRow::from_setlist))
        .chain(snapshot.setlist_items.iter().map(BackupRow::from_setlist_item))
        .chain(snapshot.shows.iter().map(BackupRow::from_show));
    for row in rows {
        writer.serialize(row)?;
    }

    let bytes = writer.into_inner().map_err(|e| e.into_error())?;
    Ok(String::from_utf8(bytes).map_err(anyhow::Error::from)?)
}

/// Parses a backup document. Fails on the first malformed row, so nothing is
/// returned unless every row decoded.
pub fn decode(input: &str) -> Result<Snapshot> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .from_reader(input.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| AppError::parse(0, e.to_string()))?;
    if !headers.iter().any(|h| h == "type") {
        return Err(AppError::parse(0, "header has no `type` column"));
    }

    let mut snapshot = Snapshot::default();
    let mut seen: HashSet<(&'static str, i64)> = HashSet::new();

    for (index, row) in reader.deserialize::<BackupRow>().enumerate() {
        let record = index as u64 + 1;
        let row = row.map_err(|e| AppError::parse(record, e.to_string()))?;

        let key = match row.decode(record)? {
            Decoded::Bit(bit) => {
                let key = (Bit::KIND, bit.id);
                snapshot.bits.push(bit);
                key
            }
            Decoded::Setlist(setlist) => {
                let key = (Setlist::KIND, setlist.id);
                snapshot.setlists.push(setlist);
                key
            }
            Decoded::SetlistItem(item) => {
                let key = (SetlistItem::KIND, item.id);
                snapshot.setlist_items.push(item);
                key
            }
            Decoded::Show(show) => {
                let key = (Show::KIND, show.id);
                snapshot.shows.push(show);
                key
            }
        };
        if !seen.insert(key) {
            return Err(AppError::parse(
                record,
                format!("duplicate {} id {}", key.0, key.1),
            ));
        }
    }

    warn_on_dangling_items(&snapshot);
    Ok(snapshot)
}

fn warn_on_dangling_items(snapshot: &Snapshot) {
    let setlists: HashSet<i64> = snapshot.setlists.iter().map(|s| s.id).collect();
    let bits: HashSet<i64> = snapshot.bits.iter().map(|b| b.id).collect();

    for item in &snapshot.setlist_items {
        if !setlists.contains(&item.setlist_id) {
            tracing::warn!(
                "Setlist item {} points at missing setlist {}",
                item.id,
                item.setlist_id
            );
        }
        if let Some(bit_id) = item.bit_id() {
            if !bits.contains(&bit_id) {
                tracing::warn!("Setlist item {} points at missing bit {}", item.id, bit_id);
            }
        }
    }
}
