mod audit;
mod bit;
mod setlist;
mod show;

pub use audit::{epoch, Audit};
pub use bit::{format_length, Bit};
pub(crate) use setlist::FlatSetlistItem;
pub use setlist::{Setlist, SetlistEntry, SetlistItem};
pub use show::Show;

use std::collections::HashMap;

use crate::error::Result;

pub const MAX_RATING: u8 = 5;

/// Anything stored in an id-keyed collection.
pub trait Entity {
    const KIND: &'static str;

    fn id(&self) -> i64;
}

/// Entities that carry audit metadata and follow the add/edit lifecycle.
pub trait Audited: Entity {
    fn audit(&self) -> &Audit;

    fn audit_mut(&mut self) -> &mut Audit;

    fn validate(&self) -> Result<()> {
        Ok(())
    }
}

/// All four collections at once, as exported and restored.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub bits: Vec<Bit>,
    pub setlists: Vec<Setlist>,
    pub setlist_items: Vec<SetlistItem>,
    pub shows: Vec<Show>,
}

impl Snapshot {
    pub fn len(&self) -> usize {
        self.bits.len() + self.setlists.len() + self.setlist_items.len() + self.shows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Seconds of material in a setlist. Plaintext slots and missing bits
    /// count as zero.
    pub fn setlist_length(&self, setlist_id: i64) -> u32 {
        let mut lengths = HashMap::with_capacity(self.bits.len());
        for bit in &self.bits {
            lengths.entry(bit.id).or_insert(bit.length);
        }
        self.setlist_items
            .iter()
            .filter(|item| item.setlist_id == setlist_id)
            .filter_map(|item| item.bit_id())
            .filter_map(|bit_id| lengths.get(&bit_id))
            .sum()
    }
}
