use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::audit::soft_reference;
use super::{Audit, Audited, Entity, MAX_RATING};
use crate::error::{AppError, Result};

/// A scheduled or past performance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Show {
    pub id: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub venue: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub mediaurl: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    pub showdate: DateTime<Utc>,
    /// Set length in minutes.
    #[serde(default)]
    pub setlength: u32,
    #[serde(default)]
    pub compensation: f64,
    /// Soft reference: may outlive the setlist it points at.
    #[serde(
        rename = "setlistID",
        alias = "setlist",
        default,
        deserialize_with = "soft_reference",
        skip_serializing_if = "Option::is_none"
    )]
    pub setlist_id: Option<i64>,
    #[serde(default)]
    pub rating: u8,
    #[serde(flatten)]
    pub audit: Audit,
}

impl Show {
    pub fn new(id: i64, title: impl Into<String>, showdate: DateTime<Utc>) -> Self {
        Self {
            id,
            title: title.into(),
            venue: String::new(),
            notes: String::new(),
            mediaurl: String::new(),
            kind: String::new(),
            showdate,
            setlength: 0,
            compensation: 0.0,
            setlist_id: None,
            rating: 0,
            audit: Audit::default(),
        }
    }
}

impl Entity for Show {
    const KIND: &'static str = "Show";

    fn id(&self) -> i64 {
        self.id
    }
}

impl Audited for Show {
    fn audit(&self) -> &Audit {
        &self.audit
    }

    fn audit_mut(&mut self) -> &mut Audit {
        &mut self.audit
    }

    fn validate(&self) -> Result<()> {
        if self.rating > MAX_RATING {
            return Err(AppError::invalid(
                Self::KIND,
                format!("rating {} is above {}", self.rating, MAX_RATING),
            ));
        }
        if !self.compensation.is_finite() {
            return Err(AppError::invalid(Self::KIND, "compensation must be a number"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn zero_setlist_means_none() {
        let show: Show = serde_json::from_value(json!({
            "id": 1,
            "title": "Tuesday open mic",
            "showdate": "2026-03-01T20:00:00Z",
            "setlistID": 0
        }))
        .unwrap();
        assert_eq!(show.setlist_id, None);

        let show: Show = serde_json::from_value(json!({
            "id": 2,
            "showdate": "2026-03-01T20:00:00Z",
            "setlist": 12
        }))
        .unwrap();
        assert_eq!(show.setlist_id, Some(12));
    }

    #[test]
    fn show_type_is_stored_as_type() {
        let mut show = Show::new(5, "Club night", DateTime::<Utc>::UNIX_EPOCH);
        show.kind = "paid".to_string();
        let value = serde_json::to_value(&show).unwrap();
        assert_eq!(value["type"], "paid");
        assert!(value.get("setlistID").is_none());
    }
}
