use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Audit metadata shared by bits, setlists and shows.
///
/// The repository owns `created`, `modified` and `revision`; whatever a caller
/// puts there is overwritten on insert and edit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Audit {
    #[serde(default)]
    pub archive: bool,
    #[serde(default = "epoch")]
    pub created: DateTime<Utc>,
    #[serde(default = "epoch")]
    pub modified: DateTime<Utc>,
    #[serde(default)]
    pub revision: u32,
}

impl Audit {
    pub fn created_at(now: DateTime<Utc>) -> Self {
        Self {
            archive: false,
            created: now,
            modified: now,
            revision: 0,
        }
    }
}

impl Default for Audit {
    fn default() -> Self {
        Self::created_at(epoch())
    }
}

/// Timestamp used for records written before audit fields existed.
pub fn epoch() -> DateTime<Utc> {
    DateTime::<Utc>::UNIX_EPOCH
}

/// Reads a foreign key where `0` and `null` both mean "no reference".
pub(crate) fn soft_reference<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<i64>::deserialize(deserializer)?.filter(|id| *id != 0))
}
