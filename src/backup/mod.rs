//! CSV backup and restore.
//!
//! All four collections share one table: the union of their columns plus a
//! `type` discriminator (`bit`, `setlist`, `setlistItem`, `show`).

mod codec;
mod record;

pub use codec::{decode, encode};
pub use record::COLUMNS;

use crate::db::{KeyValueStore, Repository};
use crate::error::Result;

impl<S: KeyValueStore> Repository<S> {
    pub async fn export_data_to_csv(&self) -> Result<String> {
        let snapshot = self.snapshot().await?;
        let csv = encode(&snapshot)?;
        tracing::info!("Exported {} records to CSV", snapshot.len());
        Ok(csv)
    }

    /// Replaces everything with the backup's contents. The whole document is
    /// parsed before the first write, so a malformed file changes nothing.
    pub async fn restore_data_from_csv(&self, csv: &str) -> Result<()> {
        let snapshot = decode(csv)?;
        tracing::info!(
            "Restoring {} bits, {} setlists, {} setlist items, {} shows",
            snapshot.bits.len(),
            snapshot.setlists.len(),
            snapshot.setlist_items.len(),
            snapshot.shows.len()
        );
        self.replace_all(snapshot).await.inspect_err(|e| {
            if e.is_store_io() {
                tracing::error!("Restore stopped partway, collections may be mixed: {}", e);
            }
        })
    }
}
