use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{AppError, Result};
use crate::models::{epoch, Audit, Audited, Bit, FlatSetlistItem, Setlist, SetlistItem, Show};

/// Header of every backup file. Must list `BackupRow`'s fields in declaration order.
pub const COLUMNS: [&str; 23] = [
    "id",
    "title",
    "content",
    "notes",
    "length",
    "rating",
    "archive",
    "created",
    "modified",
    "revision",
    "type",
    "order",
    "bitID",
    "plaintext",
    "setlistID",
    "isPlaintext",
    "goalLength",
    "venue",
    "showdate",
    "setlength",
    "compensation",
    "mediaurl",
    "showtype",
];

pub const BIT: &str = "bit";
pub const SETLIST: &str = "setlist";
pub const SETLIST_ITEM: &str = "setlistItem";
pub const SHOW: &str = "show";

/// One CSV row: the union of every entity's columns plus the `type`
/// discriminator. Columns that do not apply to a row's type stay empty.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct BackupRow {
    id: Option<i64>,
    title: Option<String>,
    content: Option<String>,
    notes: Option<String>,
    length: Option<u32>,
    rating: Option<u8>,
    #[serde(deserialize_with = "loose_bool")]
    archive: Option<bool>,
    created: Option<String>,
    modified: Option<String>,
    revision: Option<u32>,
    #[serde(rename = "type")]
    kind: Option<String>,
    order: Option<u32>,
    #[serde(rename = "bitID")]
    bit_id: Option<i64>,
    plaintext: Option<String>,
    #[serde(rename = "setlistID")]
    setlist_id: Option<i64>,
    #[serde(rename = "isPlaintext", deserialize_with = "loose_bool")]
    is_plaintext: Option<bool>,
    #[serde(rename = "goalLength")]
    goal_length: Option<u32>,
    venue: Option<String>,
    showdate: Option<String>,
    setlength: Option<u32>,
    compensation: Option<f64>,
    mediaurl: Option<String>,
    /// A show's own `type`, which would otherwise collide with the discriminator.
    showtype: Option<String>,
}

/// A decoded row, ready to be filed into its collection.
pub(crate) enum Decoded {
    Bit(Bit),
    Setlist(Setlist),
    SetlistItem(SetlistItem),
    Show(Show),
}

/// Accepts `true`/`false` in any letter case, as spreadsheets rewrite them.
fn loose_bool<'de, D>(deserializer: D) -> std::result::Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(text) = Option::<String>::deserialize(deserializer)? else {
        return Ok(None);
    };
    match text.trim() {
        "" => Ok(None),
        t if t.eq_ignore_ascii_case("true") => Ok(Some(true)),
        t if t.eq_ignore_ascii_case("false") => Ok(Some(false)),
        other => Err(serde::de::Error::custom(format!(
            "expected true or false, found {:?}",
            other
        ))),
    }
}

pub(crate) fn format_timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

pub(crate) fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    // RFC 3339 first (e.g., "2026-01-11T12:34:56.5Z")
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    // Spreadsheet-style fallback (e.g., "2026-01-11 12:34:56")
    if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    None
}

impl BackupRow {
    fn with_audit(mut self, audit: &Audit) -> Self {
        self.archive = Some(audit.archive);
        self.created = Some(format_timestamp(&audit.created));
        self.modified = Some(format_timestamp(&audit.modified));
        self.revision = Some(audit.revision);
        self
    }

    pub fn from_bit(bit: &Bit) -> Self {
        Self {
            kind: Some(BIT.to_string()),
            id: Some(bit.id),
            title: Some(bit.title.clone()),
            content: Some(bit.content.clone()),
            notes: Some(bit.notes.clone()),
            length: Some(bit.length),
            rating: Some(bit.rating),
            ..Self::default()
        }
        .with_audit(&bit.audit)
    }

    pub fn from_setlist(setlist: &Setlist) -> Self {
        Self {
            kind: Some(SETLIST.to_string()),
            id: Some(setlist.id),
            title: Some(setlist.title.clone()),
            goal_length: setlist.goal_length,
            ..Self::default()
        }
        .with_audit(&setlist.audit)
    }

    pub fn from_setlist_item(item: &SetlistItem) -> Self {
        let flat = FlatSetlistItem::from(item.clone());
        Self {
            kind: Some(SETLIST_ITEM.to_string()),
            id: Some(flat.id),
            order: Some(flat.order),
            setlist_id: Some(flat.setlist_id),
            is_plaintext: Some(flat.is_plaintext),
            plaintext: flat.plaintext,
            bit_id: flat.bit_id,
            ..Self::default()
        }
    }

    pub fn from_show(show: &Show) -> Self {
        Self {
            kind: Some(SHOW.to_string()),
            id: Some(show.id),
            title: Some(show.title.clone()),
            venue: Some(show.venue.clone()),
            notes: Some(show.notes.clone()),
            mediaurl: Some(show.mediaurl.clone()),
            showtype: Some(show.kind.clone()),
            showdate: Some(format_timestamp(&show.showdate)),
            setlength: Some(show.setlength),
            compensation: Some(show.compensation),
            setlist_id: show.setlist_id,
            rating: Some(show.rating),
            ..Self::default()
        }
        .with_audit(&show.audit)
    }

    fn timestamp(record: u64, column: &str, value: Option<&str>) -> Result<Option<DateTime<Utc>>> {
        match value {
            None => Ok(None),
            Some(text) => parse_timestamp(text).map(Some).ok_or_else(|| {
                AppError::parse(record, format!("`{}` is not a timestamp: {:?}", column, text))
            }),
        }
    }

    fn audit(&self, record: u64) -> Result<Audit> {
        let created = Self::timestamp(record, "created", self.created.as_deref())?.unwrap_or_else(epoch);
        let modified =
            Self::timestamp(record, "modified", self.modified.as_deref())?.unwrap_or(created);
        Ok(Audit {
            archive: self.archive.unwrap_or(false),
            created,
            modified,
            revision: self.revision.unwrap_or(0),
        })
    }

    fn required<T>(record: u64, column: &str, value: Option<T>) -> Result<T> {
        value.ok_or_else(|| AppError::parse(record, format!("missing `{}`", column)))
    }

    /// Applies the same checks as `add_*`, so nothing unwritable reaches the store.
    fn validated<T: Audited>(record: u64, entity: T) -> Result<T> {
        entity
            .validate()
            .map_err(|e| AppError::parse(record, e.to_string()))?;
        Ok(entity)
    }

    /// Rebuilds the entity this row describes. `record` is the 1-based data row
    /// number used in error messages.
    pub fn decode(self, record: u64) -> Result<Decoded> {
        let kind = Self::required(record, "type", self.kind.clone())?;
        let id = Self::required(record, "id", self.id)?;

        match kind.as_str() {
            BIT => {
                let bit = Bit {
                    id,
                    audit: self.audit(record)?,
                    title: self.title.unwrap_or_default(),
                    content: self.content.unwrap_or_default(),
                    notes: self.notes.unwrap_or_default(),
                    length: self.length.unwrap_or(0),
                    rating: self.rating.unwrap_or(0),
                };
                Ok(Decoded::Bit(Self::validated(record, bit)?))
            }
            SETLIST => {
                let setlist = Setlist {
                    id,
                    audit: self.audit(record)?,
                    title: self.title.unwrap_or_default(),
                    goal_length: self.goal_length,
                };
                Ok(Decoded::Setlist(Self::validated(record, setlist)?))
            }
            SETLIST_ITEM => {
                let flat = FlatSetlistItem {
                    id,
                    order: self.order.unwrap_or(0),
                    setlist_id: Self::required(record, "setlistID", self.setlist_id)?,
                    is_plaintext: self.is_plaintext.unwrap_or(false),
                    plaintext: self.plaintext,
                    bit_id: self.bit_id,
                };
                let item = SetlistItem::try_from(flat).map_err(|msg| AppError::parse(record, msg))?;
                Ok(Decoded::SetlistItem(item))
            }
            SHOW => {
                let showdate = Self::timestamp(record, "showdate", self.showdate.as_deref())?;
                let show = Show {
                    id,
                    audit: self.audit(record)?,
                    showdate: Self::required(record, "showdate", showdate)?,
                    title: self.title.unwrap_or_default(),
                    venue: self.venue.unwrap_or_default(),
                    notes: self.notes.unwrap_or_default(),
                    mediaurl: self.mediaurl.unwrap_or_default(),
                    kind: self.showtype.unwrap_or_default(),
                    setlength: self.setlength.unwrap_or(0),
                    compensation: self.compensation.unwrap_or(0.0),
                    setlist_id: self.setlist_id.filter(|id| *id != 0),
                    rating: self.rating.unwrap_or(0),
                };
                Ok(Decoded::Show(Self::validated(record, show)?))
            }
            other => Err(AppError::parse(record, format!("unknown row type {:?}", other))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamps_keep_sub_second_precision() {
        let at = DateTime::parse_from_rfc3339("2026-05-04T21:15:30.123456789Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(parse_timestamp(&format_timestamp(&at)), Some(at));
        assert!(parse_timestamp("2026-05-04 21:15:30").is_some());
        assert!(parse_timestamp("last tuesday").is_none());
    }

    #[test]
    fn plaintext_item_flattens_without_bit() {
        let row = BackupRow::from_setlist_item(&SetlistItem::plaintext(3, 1, "hello"));
        assert_eq!(row.is_plaintext, Some(true));
        assert_eq!(row.bit_id, None);
        assert_eq!(row.created, None);
    }

    #[test]
    fn rows_without_type_are_rejected() {
        let row = BackupRow {
            id: Some(1),
            ..BackupRow::default()
        };
        assert!(matches!(row.decode(4), Err(AppError::Parse { record: 4, .. })));
    }

    #[test]
    fn out_of_range_values_are_parse_errors() {
        let bit = BackupRow {
            kind: Some(BIT.to_string()),
            id: Some(1),
            rating: Some(9),
            ..BackupRow::default()
        };
        assert!(matches!(bit.decode(3), Err(AppError::Parse { record: 3, .. })));

        let show = BackupRow {
            kind: Some(SHOW.to_string()),
            id: Some(7),
            showdate: Some("2026-03-06T22:30:00Z".to_string()),
            compensation: Some(f64::INFINITY),
            ..BackupRow::default()
        };
        assert!(matches!(show.decode(5), Err(AppError::Parse { record: 5, .. })));
    }

    #[test]
    fn bit_item_without_bit_is_rejected() {
        let row = BackupRow {
            kind: Some(SETLIST_ITEM.to_string()),
            id: Some(1),
            setlist_id: Some(2),
            is_plaintext: Some(false),
            ..BackupRow::default()
        };
        assert!(matches!(row.decode(1), Err(AppError::Parse { .. })));
    }
}
