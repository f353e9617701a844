use std::fmt;
use std::path::Path;

use crate::config::Config;
use crate::db::{KeyValueStore, Repository, SqliteStore};
use crate::error::Result;
use crate::models::format_length;

/// One line per setlist in the library summary.
#[derive(Debug, Clone, PartialEq)]
pub struct SetlistSummary {
    pub id: i64,
    pub title: String,
    pub items: usize,
    /// Seconds.
    pub length: u32,
    /// Minutes.
    pub goal_length: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LibrarySummary {
    pub bits: usize,
    pub archived_bits: usize,
    pub shows: usize,
    pub setlists: Vec<SetlistSummary>,
}

impl fmt::Display for LibrarySummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Bits:     {} ({} archived)", self.bits, self.archived_bits)?;
        writeln!(f, "Shows:    {}", self.shows)?;
        writeln!(f, "Setlists: {}", self.setlists.len())?;
        for setlist in &self.setlists {
            write!(
                f,
                "  {} ({} items, {})",
                setlist.title,
                setlist.items,
                format_length(setlist.length)
            )?;
            if let Some(goal) = setlist.goal_length {
                write!(f, " / goal {}:00", goal)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

pub struct App<S> {
    pub repository: Repository<S>,
}

impl App<SqliteStore> {
    pub async fn new(config: &Config) -> Result<Self> {
        let store = SqliteStore::open(&config.db_path).await?;
        Ok(Self::with_store(store))
    }
}

impl<S: KeyValueStore> App<S> {
    pub fn with_store(store: S) -> Self {
        Self {
            repository: Repository::new(store),
        }
    }

    pub async fn summary(&self) -> Result<LibrarySummary> {
        let snapshot = self.repository.snapshot().await?;

        let setlists = snapshot
            .setlists
            .iter()
            .map(|setlist| SetlistSummary {
                id: setlist.id,
                title: setlist.title.clone(),
                items: snapshot
                    .setlist_items
                    .iter()
                    .filter(|item| item.setlist_id == setlist.id)
                    .count(),
                length: snapshot.setlist_length(setlist.id),
                goal_length: setlist.goal_length,
            })
            .collect();

        Ok(LibrarySummary {
            bits: snapshot.bits.len(),
            archived_bits: snapshot.bits.iter().filter(|b| b.audit.archive).count(),
            shows: snapshot.shows.len(),
            setlists,
        })
    }

    pub async fn export_backup(&self, path: &Path) -> Result<()> {
        let csv = self.repository.export_data_to_csv().await?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, csv)?;
        tracing::info!("Wrote backup to {:?}", path);
        Ok(())
    }

    pub async fn import_backup(&self, path: &Path) -> Result<()> {
        let csv = std::fs::read_to_string(path)?;
        self.repository.restore_data_from_csv(&csv).await?;
        self.repository.refresh();
        Ok(())
    }

    pub async fn reset(&self) -> Result<()> {
        self.repository.delete_all().await?;
        self.repository.refresh();
        Ok(())
    }
}
