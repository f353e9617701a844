use serde::{Deserialize, Serialize};

use super::{Audit, Audited, Entity, MAX_RATING};
use crate::error::{AppError, Result};

/// A single reusable piece of material.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bit {
    pub id: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub notes: String,
    /// Running time in seconds.
    #[serde(default)]
    pub length: u32,
    #[serde(default)]
    pub rating: u8,
    #[serde(flatten)]
    pub audit: Audit,
}

impl Bit {
    pub fn new(id: i64, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            content: String::new(),
            notes: String::new(),
            length: 0,
            rating: 0,
            audit: Audit::default(),
        }
    }

    /// Substring match against title, content and notes. `needle` must
    /// already be lowercase; an empty needle matches every bit.
    pub fn matches(&self, needle: &str) -> bool {
        [&self.title, &self.content, &self.notes]
            .iter()
            .any(|field| field.to_lowercase().contains(needle))
    }
}

impl Entity for Bit {
    const KIND: &'static str = "Bit";

    fn id(&self) -> i64 {
        self.id
    }
}

impl Audited for Bit {
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
        Ok(())
    }
}

/// Formats a running time as `M:SS`.
pub fn format_length(seconds: u32) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}
