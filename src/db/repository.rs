use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{Mutex, MutexGuard};

use crate::error::{AppError, Result};
use crate::models::{Audit, Audited, Bit, Entity, Setlist, SetlistEntry, SetlistItem, Show, Snapshot};

use super::listeners::{RefreshListener, RefreshListeners};
use super::store::KeyValueStore;
use super::table::Table;

pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// The four persisted collections, each one JSON array under its key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    Bits,
    Setlists,
    SetlistItems,
    Shows,
}

impl Collection {
    pub fn key(self) -> &'static str {
        match self {
            Collection::Bits => "bits",
            Collection::Setlists => "setlists",
            Collection::SetlistItems => "setlistItems",
            Collection::Shows => "shows",
        }
    }
}

trait Stored: Entity + Serialize + DeserializeOwned {
    const COLLECTION: Collection;
}

impl Stored for Bit {
    const COLLECTION: Collection = Collection::Bits;
}

impl Stored for Setlist {
    const COLLECTION: Collection = Collection::Setlists;
}

impl Stored for SetlistItem {
    const COLLECTION: Collection = Collection::SetlistItems;
}

impl Stored for Show {
    const COLLECTION: Collection = Collection::Shows;
}

/// One writer per collection. Multi-collection writers lock bits, setlists,
/// setlist items, shows, in that order.
#[derive(Default)]
struct WriteLocks {
    bits: Mutex<()>,
    setlists: Mutex<()>,
    setlist_items: Mutex<()>,
    shows: Mutex<()>,
}

/// Sole mutator of bits, setlists, setlist items and shows.
///
/// Every mutation is a whole-collection read-modify-write against the store,
/// serialized per collection so concurrent callers cannot lose each other's
/// writes.
pub struct Repository<S> {
    store: S,
    locks: WriteLocks,
    listeners: RefreshListeners,
    clock: Clock,
}

impl<S: KeyValueStore> Repository<S> {
    pub fn new(store: S) -> Self {
        Self::with_clock(store, Arc::new(Utc::now))
    }

    pub fn with_clock(store: S, clock: Clock) -> Self {
        Self {
            store,
            locks: WriteLocks::default(),
            listeners: RefreshListeners::default(),
            clock,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    async fn lock(&self, collection: Collection) -> MutexGuard<'_, ()> {
        match collection {
            Collection::Bits => self.locks.bits.lock().await,
            Collection::Setlists => self.locks.setlists.lock().await,
            Collection::SetlistItems => self.locks.setlist_items.lock().await,
            Collection::Shows => self.locks.shows.lock().await,
        }
    }

    async fn load<T: Stored>(&self) -> Result<Vec<T>> {
        match self.store.get(T::COLLECTION.key()).await? {
            Some(Value::Null) | None => Ok(Vec::new()),
            Some(value) => Ok(serde_json::from_value(value)?),
        }
    }

    async fn load_table<T: Stored>(&self) -> Result<Table<T>> {
        Ok(Table::from_rows(self.load::<T>().await?))
    }

    async fn save<T: Stored>(&self, rows: &[T]) -> Result<()> {
        let value = serde_json::to_value(rows)?;
        self.store.set(T::COLLECTION.key(), value).await
    }

    // Reads

    pub async fn get_bits(&self) -> Result<Vec<Bit>> {
        self.load().await
    }

    pub async fn get_setlists(&self) -> Result<Vec<Setlist>> {
        self.load().await
    }

    pub async fn get_setlist_items(&self) -> Result<Vec<SetlistItem>> {
        self.load().await
    }

    pub async fn get_shows(&self) -> Result<Vec<Show>> {
        self.load().await
    }

    /// Looks a bit up opportunistically; absence is not an error.
    pub async fn get_bit(&self, id: i64) -> Result<Option<Bit>> {
        if id == 0 {
            return Ok(None);
        }
        Ok(self.get_bits().await?.into_iter().find(|b| b.id == id))
    }

    pub async fn get_setlist(&self, id: i64) -> Result<Setlist> {
        self.get_setlists()
            .await?
            .into_iter()
            .find(|s| s.id == id)
            .ok_or_else(|| AppError::not_found(Setlist::KIND, id))
    }

    pub async fn get_show(&self, id: i64) -> Result<Option<Show>> {
        Ok(self.get_shows().await?.into_iter().find(|s| s.id == id))
    }

    /// Bits matching a case-insensitive search over title, content and notes.
    /// An empty search matches everything; archived bits only show up when asked for.
    pub async fn get_bits_filtered(&self, include_archived: bool, search: &str) -> Result<Vec<Bit>> {
        let needle = search.trim().to_lowercase();
        Ok(self
            .get_bits()
            .await?
            .into_iter()
            .filter(|bit| include_archived || !bit.audit.archive)
            .filter(|bit| bit.matches(&needle))
            .collect())
    }

    pub async fn get_shows_filtered(&self, include_archived: bool) -> Result<Vec<Show>> {
        Ok(self
            .get_shows()
            .await?
            .into_iter()
            .filter(|show| include_archived || !show.audit.archive)
            .collect())
    }

    /// Bits that can still be added to a setlist: not archived and not
    /// already referenced by one of its items.
    pub async fn available_bits(&self, setlist_id: i64) -> Result<Vec<Bit>> {
        let (items, bits) = futures::try_join!(self.get_setlist_items(), self.get_bits())?;
        let used: HashSet<i64> = items
            .iter()
            .filter(|item| item.setlist_id == setlist_id)
            .filter_map(|item| item.bit_id())
            .collect();
        Ok(bits
            .into_iter()
            .filter(|bit| !bit.audit.archive && !used.contains(&bit.id))
            .collect())
    }

    /// Items of one setlist in play order.
    pub async fn items_for_setlist(&self, setlist_id: i64) -> Result<Vec<SetlistItem>> {
        let mut items: Vec<SetlistItem> = self
            .get_setlist_items()
            .await?
            .into_iter()
            .filter(|item| item.setlist_id == setlist_id)
            .collect();
        items.sort_by_key(|item| item.order);
        Ok(items)
    }

    /// Order value for appending to a setlist.
    pub async fn next_item_order(&self, setlist_id: i64) -> Result<u32> {
        let max = self
            .get_setlist_items()
            .await?
            .iter()
            .filter(|item| item.setlist_id == setlist_id)
            .map(|item| item.order)
            .max()
            .unwrap_or(0);
        Ok(max + 1)
    }

    /// Total running time of a setlist's bits, in seconds.
    pub async fn setlist_length(&self, setlist_id: i64) -> Result<u32> {
        let (setlist_items, bits) = futures::try_join!(self.get_setlist_items(), self.get_bits())?;
        let snapshot = Snapshot {
            bits,
            setlist_items,
            ..Snapshot::default()
        };
        Ok(snapshot.setlist_length(setlist_id))
    }

    pub async fn snapshot(&self) -> Result<Snapshot> {
        let (bits, setlists, setlist_items, shows) = futures::try_join!(
            self.get_bits(),
            self.get_setlists(),
            self.get_setlist_items(),
            self.get_shows()
        )?;
        Ok(Snapshot {
            bits,
            setlists,
            setlist_items,
            shows,
        })
    }

    // Bits, setlists and shows

    async fn add_audited<T: Stored + Audited>(&self, mut entity: T) -> Result<()> {
        entity.validate()?;
        let _guard = self.lock(T::COLLECTION).await;
        let mut table = self.load_table::<T>().await?;

        let audit = match table.get(entity.id()) {
            Some(existing) => {
                tracing::debug!("Replacing {} {}", T::KIND, entity.id());
                Audit {
                    archive: entity.audit().archive,
                    ..existing.audit().clone()
                }
            }
            None => {
                tracing::debug!("Inserting {} {}", T::KIND, entity.id());
                Audit::created_at(self.now())
            }
        };
        *entity.audit_mut() = audit;

        table.upsert(entity);
        self.save(table.rows()).await
    }

    async fn edit_audited<T: Stored + Audited>(&self, mut entity: T) -> Result<()> {
        entity.validate()?;
        let _guard = self.lock(T::COLLECTION).await;
        let mut table = self.load_table::<T>().await?;

        let stored = table
            .get(entity.id())
            .map(|existing| existing.audit().clone())
            .ok_or_else(|| AppError::not_found(T::KIND, entity.id()))?;

        let revision = stored.revision + 1;
        tracing::debug!("Editing {} {} (revision {})", T::KIND, entity.id(), revision);
        let audit = entity.audit_mut();
        audit.created = stored.created;
        audit.modified = self.now();
        audit.revision = revision;

        table.upsert(entity);
        self.save(table.rows()).await
    }

    async fn remove_entity<T: Stored>(&self, id: i64) -> Result<usize> {
        let _guard = self.lock(T::COLLECTION).await;
        let mut table = self.load_table::<T>().await?;
        let removed = table.retain(|row| row.id() != id);
        if removed > 0 {
            self.save(table.rows()).await?;
        }
        Ok(removed)
    }

    pub async fn add_bit(&self, bit: Bit) -> Result<()> {
        self.add_audited(bit).await
    }

    pub async fn add_setlist(&self, setlist: Setlist) -> Result<()> {
        self.add_audited(setlist).await
    }

    pub async fn add_show(&self, show: Show) -> Result<()> {
        self.add_audited(show).await
    }

    pub async fn edit_bit(&self, bit: Bit) -> Result<()> {
        self.edit_audited(bit).await
    }

    pub async fn edit_setlist(&self, setlist: Setlist) -> Result<()> {
        self.edit_audited(setlist).await
    }

    pub async fn edit_show(&self, show: Show) -> Result<()> {
        self.edit_audited(show).await
    }

    /// Deletes a bit and every setlist slot that points at it. Surviving slots
    /// keep their order values; use `renumber_setlist` to close the gaps.
    pub async fn remove_bit(&self, id: i64) -> Result<()> {
        let _bits = self.lock(Collection::Bits).await;
        let _items = self.lock(Collection::SetlistItems).await;

        let mut bits = self.load_table::<Bit>().await?;
        if bits.retain(|bit| bit.id != id) > 0 {
            self.save(bits.rows()).await?;
        }

        let mut items = self.load_table::<SetlistItem>().await?;
        let dropped = items.retain(|item| item.bit_id() != Some(id));
        if dropped > 0 {
            self.save(items.rows()).await?;
        }
        tracing::debug!("Removed bit {} and {} setlist items", id, dropped);
        Ok(())
    }

    /// Deletes a setlist and its items. Shows pointing at it are left alone.
    pub async fn remove_setlist(&self, id: i64) -> Result<()> {
        let _setlists = self.lock(Collection::Setlists).await;
        let _items = self.lock(Collection::SetlistItems).await;

        let mut setlists = self.load_table::<Setlist>().await?;
        if setlists.retain(|setlist| setlist.id != id) > 0 {
            self.save(setlists.rows()).await?;
        }

        let mut items = self.load_table::<SetlistItem>().await?;
        let dropped = items.retain(|item| item.setlist_id != id);
        if dropped > 0 {
            self.save(items.rows()).await?;
        }
        tracing::debug!("Removed setlist {} and {} setlist items", id, dropped);
        Ok(())
    }

    pub async fn remove_show(&self, id: i64) -> Result<()> {
        self.remove_entity::<Show>(id).await?;
        Ok(())
    }

    // Setlist items

    async fn check_item_references(
        &self,
        item: &SetlistItem,
        setlists: &Table<Setlist>,
    ) -> Result<()> {
        if !setlists.contains(item.setlist_id) {
            return Err(AppError::DanglingReference {
                entity: SetlistItem::KIND,
                id: item.id,
                target: Setlist::KIND,
                target_id: item.setlist_id,
            });
        }
        if let SetlistEntry::Bit(bit_id) = item.entry {
            if self.get_bit(bit_id).await?.is_none() {
                return Err(AppError::DanglingReference {
                    entity: SetlistItem::KIND,
                    id: item.id,
                    target: Bit::KIND,
                    target_id: bit_id,
                });
            }
        }
        Ok(())
    }

    /// Inserts or replaces a slot and returns its id. Unknown ids get
    /// `max(id) + 1`. Order values are taken as given.
    pub async fn add_setlist_item(&self, mut item: SetlistItem) -> Result<i64> {
        let _guard = self.lock(Collection::SetlistItems).await;
        let setlists = self.load_table::<Setlist>().await?;
        self.check_item_references(&item, &setlists).await?;

        let mut items = self.load_table::<SetlistItem>().await?;
        if !items.contains(item.id) {
            item.id = match items.max_id() {
                None => 1,
                Some(max) => max.checked_add(1).ok_or_else(|| {
                    AppError::invalid(SetlistItem::KIND, "no setlist item ids left to assign")
                })?,
            };
            tracing::debug!("Assigned setlist item id {}", item.id);
        }

        let id = item.id;
        items.upsert(item);
        self.save(items.rows()).await?;
        Ok(id)
    }

    pub async fn edit_setlist_item(&self, item: SetlistItem) -> Result<()> {
        let _guard = self.lock(Collection::SetlistItems).await;
        let mut items = self.load_table::<SetlistItem>().await?;
        if !items.contains(item.id) {
            return Err(AppError::not_found(SetlistItem::KIND, item.id));
        }
        let setlists = self.load_table::<Setlist>().await?;
        self.check_item_references(&item, &setlists).await?;

        items.upsert(item);
        self.save(items.rows()).await
    }

    pub async fn remove_setlist_item(&self, id: i64) -> Result<()> {
        self.remove_entity::<SetlistItem>(id).await?;
        Ok(())
    }

    /// Sets one slot's order verbatim. Siblings are not touched; a drag
    /// handler issues one call per moved slot.
    pub async fn update_setlist_item_order(&self, item_id: i64, order: u32) -> Result<()> {
        let _guard = self.lock(Collection::SetlistItems).await;
        let mut items = self.load_table::<SetlistItem>().await?;
        let item = items
            .get_mut(item_id)
            .ok_or_else(|| AppError::not_found(SetlistItem::KIND, item_id))?;
        item.order = order;
        self.save(items.rows()).await
    }

    /// Rewrites a setlist's orders to 1..n, keeping their relative order.
    pub async fn renumber_setlist(&self, setlist_id: i64) -> Result<()> {
        let _guard = self.lock(Collection::SetlistItems).await;
        let mut items = self.load_table::<SetlistItem>().await?;

        let mut slots: Vec<(u32, usize)> = items
            .rows()
            .iter()
            .enumerate()
            .filter(|(_, item)| item.setlist_id == setlist_id)
            .map(|(pos, item)| (item.order, pos))
            .collect();
        slots.sort_unstable();

        let new_orders: HashMap<usize, u32> = slots
            .iter()
            .enumerate()
            .map(|(n, &(_, pos))| (pos, n as u32 + 1))
            .collect();
        for (pos, item) in items.rows_mut().enumerate() {
            if let Some(&order) = new_orders.get(&pos) {
                item.order = order;
            }
        }

        self.save(items.rows()).await
    }

    /// Applies a whole drag-reorder in one write: `item_ids[i]` gets order `i + 1`.
    pub async fn reorder_setlist(&self, setlist_id: i64, item_ids: &[i64]) -> Result<()> {
        let _guard = self.lock(Collection::SetlistItems).await;
        let mut items = self.load_table::<SetlistItem>().await?;

        let mut current: Vec<i64> = items
            .rows()
            .iter()
            .filter(|item| item.setlist_id == setlist_id)
            .map(|item| item.id)
            .collect();
        let mut requested = item_ids.to_vec();
        current.sort_unstable();
        requested.sort_unstable();
        if current != requested {
            return Err(AppError::invalid(
                Setlist::KIND,
                format!("reorder must list each item of setlist {} exactly once", setlist_id),
            ));
        }

        for (n, id) in item_ids.iter().enumerate() {
            if let Some(item) = items.get_mut(*id) {
                item.order = n as u32 + 1;
            }
        }
        self.save(items.rows()).await
    }

    // Bulk operations

    /// Overwrites all four collections.
    pub async fn replace_all(&self, snapshot: Snapshot) -> Result<()> {
        let _bits = self.lock(Collection::Bits).await;
        let _setlists = self.lock(Collection::Setlists).await;
        let _items = self.lock(Collection::SetlistItems).await;
        let _shows = self.lock(Collection::Shows).await;

        self.save(&snapshot.bits).await?;
        self.save(&snapshot.setlists).await?;
        self.save(&snapshot.setlist_items).await?;
        self.save(&snapshot.shows).await?;
        tracing::info!("Replaced all collections ({} records)", snapshot.len());
        Ok(())
    }

    pub async fn delete_all(&self) -> Result<()> {
        self.replace_all(Snapshot::default()).await
    }

    // Change notification

    pub fn add_refresh_listener(&self, listener: RefreshListener) {
        self.listeners.add(listener);
    }

    pub fn remove_refresh_listener(&self, listener: &RefreshListener) {
        self.listeners.remove(listener);
    }

    pub fn refresh(&self) {
        if self.listeners.is_empty() {
            tracing::debug!("Refresh with no listeners registered");
            return;
        }
        self.listeners.notify();
    }
}
