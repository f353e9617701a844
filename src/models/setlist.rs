use serde::{Deserialize, Serialize};

use super::{Audit, Audited, Entity};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Setlist {
    pub id: i64,
    #[serde(default)]
    pub title: String,
    /// Target duration in minutes.
    #[serde(
        rename = "goalLength",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub goal_length: Option<u32>,
    #[serde(flatten)]
    pub audit: Audit,
}

impl Setlist {
    pub fn new(id: i64, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            goal_length: None,
            audit: Audit::default(),
        }
    }
}

impl Entity for Setlist {
    const KIND: &'static str = "Setlist";

    fn id(&self) -> i64 {
        self.id
    }
}

impl Audited for Setlist {
    fn audit(&self) -> &Audit {
        &self.audit
    }

    fn audit_mut(&mut self) -> &mut Audit {
        &mut self.audit
    }
}

/// What occupies a setlist slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetlistEntry {
    Plaintext(String),
    Bit(i64),
}

/// One ordered slot in a setlist. Owned by its setlist: no audit fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "FlatSetlistItem", into = "FlatSetlistItem")]
pub struct SetlistItem {
    pub id: i64,
    /// 1-based position within the setlist.
    pub order: u32,
    pub setlist_id: i64,
    pub entry: SetlistEntry,
}

impl SetlistItem {
    /// A new bit slot; id 0 lets the repository assign one.
    pub fn bit(setlist_id: i64, order: u32, bit_id: i64) -> Self {
        Self {
            id: 0,
            order,
            setlist_id,
            entry: SetlistEntry::Bit(bit_id),
        }
    }

    pub fn plaintext(setlist_id: i64, order: u32, text: impl Into<String>) -> Self {
        Self {
            id: 0,
            order,
            setlist_id,
            entry: SetlistEntry::Plaintext(text.into()),
        }
    }

    pub fn bit_id(&self) -> Option<i64> {
        match self.entry {
            SetlistEntry::Bit(id) => Some(id),
            SetlistEntry::Plaintext(_) => None,
        }
    }

    pub fn is_plaintext(&self) -> bool {
        matches!(self.entry, SetlistEntry::Plaintext(_))
    }
}

impl Entity for SetlistItem {
    const KIND: &'static str = "SetlistItem";

    fn id(&self) -> i64 {
        self.id
    }
}

/// Stored shape of a setlist item: one flag plus two optional payloads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct FlatSetlistItem {
    pub id: i64,
    #[serde(default)]
    pub order: u32,
    #[serde(rename = "setlistID")]
    pub setlist_id: i64,
    #[serde(rename = "isPlaintext", alias = "isPlainText", default)]
    pub is_plaintext: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plaintext: Option<String>,
    #[serde(
        rename = "bitID",
        alias = "bitId",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub bit_id: Option<i64>,
}

impl TryFrom<FlatSetlistItem> for SetlistItem {
    type Error = String;

    fn try_from(flat: FlatSetlistItem) -> std::result::Result<Self, Self::Error> {
        let entry = if flat.is_plaintext {
            SetlistEntry::Plaintext(flat.plaintext.unwrap_or_default())
        } else {
            let bit_id = flat
                .bit_id
                .ok_or_else(|| format!("setlist item {} has neither text nor bit", flat.id))?;
            SetlistEntry::Bit(bit_id)
        };
        Ok(Self {
            id: flat.id,
            order: flat.order,
            setlist_id: flat.setlist_id,
            entry,
        })
    }
}

impl From<SetlistItem> for FlatSetlistItem {
    fn from(item: SetlistItem) -> Self {
        let (is_plaintext, plaintext, bit_id) = match item.entry {
            SetlistEntry::Plaintext(text) => (true, Some(text), None),
            SetlistEntry::Bit(id) => (false, None, Some(id)),
        };
        Self {
            id: item.id,
            order: item.order,
            setlist_id: item.setlist_id,
            is_plaintext,
            plaintext,
            bit_id,
        }
    }
}
