use std::collections::HashMap;

use crate::models::Entity;

/// A loaded collection: rows in storage order plus an id index.
///
/// When stored data holds a duplicate id, lookups resolve to the first row.
pub(crate) struct Table<T> {
    rows: Vec<T>,
    index: HashMap<i64, usize>,
}

impl<T: Entity> Table<T> {
    pub fn from_rows(rows: Vec<T>) -> Self {
        let mut table = Self {
            rows,
            index: HashMap::new(),
        };
        table.reindex();
        table
    }

    fn reindex(&mut self) {
        self.index.clear();
        for (pos, row) in self.rows.iter().enumerate() {
            self.index.entry(row.id()).or_insert(pos);
        }
    }

    pub fn get(&self, id: i64) -> Option<&T> {
        self.index.get(&id).map(|&pos| &self.rows[pos])
    }

    pub fn get_mut(&mut self, id: i64) -> Option<&mut T> {
        match self.index.get(&id) {
            Some(&pos) => Some(&mut self.rows[pos]),
            None => None,
        }
    }

    pub fn contains(&self, id: i64) -> bool {
        self.index.contains_key(&id)
    }

    /// Replaces the row with the same id in place, or appends.
    pub fn upsert(&mut self, row: T) -> Option<T> {
        if let Some(&pos) = self.index.get(&row.id()) {
            return Some(std::mem::replace(&mut self.rows[pos], row));
        }
        self.index.insert(row.id(), self.rows.len());
        self.rows.push(row);
        None
    }

    /// Keeps rows matching `keep`; returns how many were dropped.
    pub fn retain(&mut self, keep: impl FnMut(&T) -> bool) -> usize {
        let before = self.rows.len();
        self.rows.retain(keep);
        let removed = before - self.rows.len();
        if removed > 0 {
            self.reindex();
        }
        removed
    }

    pub fn max_id(&self) -> Option<i64> {
        self.index.keys().copied().max()
    }

    pub fn rows(&self) -> &[T] {
        &self.rows
    }

    pub fn rows_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.rows.iter_mut()
    }
}
