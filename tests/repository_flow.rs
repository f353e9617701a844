use chrono::{DateTime, Utc};
use punnote::models::{Bit, Setlist, SetlistEntry, SetlistItem, Show};
use punnote::{AppError, KeyValueStore, Repository, SqliteStore};
use serde_json::Value;
use tempfile::TempDir;
use tokio_test::assert_ok;

async fn open_repo() -> (TempDir, Repository<SqliteStore>) {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteStore::open(dir.path().join("punnote.db")).await.unwrap();
    (dir, Repository::new(store))
}

fn at(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
}

async fn seed(repo: &Repository<SqliteStore>) {
    let mut bit = Bit::new(1, "Knock knock");
    bit.length = 30;
    repo.add_bit(bit).await.unwrap();
    let mut airport = Bit::new(2, "Airport");
    airport.length = 120;
    airport.rating = 5;
    airport.notes = "slow down on the tag".to_string();
    repo.add_bit(airport).await.unwrap();

    let mut open_mic = Setlist::new(10, "Open Mic");
    open_mic.goal_length = Some(5);
    repo.add_setlist(open_mic).await.unwrap();

    repo.add_setlist_item(SetlistItem::bit(10, 1, 1)).await.unwrap();
    repo.add_setlist_item(SetlistItem::plaintext(10, 2, "crowd work"))
        .await
        .unwrap();
    repo.add_setlist_item(SetlistItem::bit(10, 3, 2)).await.unwrap();

    let mut show = Show::new(3, "Friday late", at("2026-03-06T22:30:00Z"));
    show.venue = "The Basement".to_string();
    show.kind = "paid".to_string();
    show.compensation = 40.0;
    show.setlist_id = Some(10);
    repo.add_show(show).await.unwrap();
}

#[tokio::test]
async fn knock_knock_scenario() {
    let (_dir, repo) = open_repo().await;

    let mut bit = Bit::new(1, "Knock knock");
    bit.length = 30;
    repo.add_bit(bit).await.unwrap();
    let stored = repo.get_bit(1).await.unwrap().unwrap();
    assert!(!stored.audit.archive);
    assert_eq!(stored.audit.revision, 0);
    assert_eq!(stored.length, 30);

    repo.add_setlist(Setlist::new(10, "Open Mic")).await.unwrap();
    let id = repo
        .add_setlist_item(SetlistItem {
            id: 0,
            order: 1,
            setlist_id: 10,
            entry: SetlistEntry::Bit(1),
        })
        .await
        .unwrap();
    assert_eq!(id, 1);
    assert_eq!(repo.get_setlist_items().await.unwrap()[0].order, 1);

    let before = repo.get_setlist_items().await.unwrap();
    assert_ok!(repo.update_setlist_item_order(1, 1).await);
    assert_eq!(repo.get_setlist_items().await.unwrap(), before);

    repo.remove_bit(1).await.unwrap();
    assert!(repo.items_for_setlist(10).await.unwrap().is_empty());
}

#[tokio::test]
async fn collections_are_stored_as_json_arrays() {
    let (_dir, repo) = open_repo().await;
    seed(&repo).await;

    let items = repo.store().get("setlistItems").await.unwrap().unwrap();
    let items = items.as_array().unwrap();
    assert_eq!(items.len(), 3);
    assert_eq!(items[1]["isPlaintext"], Value::Bool(true));
    assert_eq!(items[1]["plaintext"], "crowd work");
    assert_eq!(items[2]["bitID"], 2);

    let shows = repo.store().get("shows").await.unwrap().unwrap();
    assert_eq!(shows[0]["setlistID"], 10);
    assert_eq!(shows[0]["type"], "paid");
}

#[tokio::test]
async fn export_then_restore_reproduces_state() {
    let (_dir, repo) = open_repo().await;
    seed(&repo).await;
    repo.edit_bit(repo.get_bit(2).await.unwrap().unwrap())
        .await
        .unwrap();
    let before = repo.snapshot().await.unwrap();

    let csv = repo.export_data_to_csv().await.unwrap();
    repo.delete_all().await.unwrap();
    assert!(repo.snapshot().await.unwrap().is_empty());

    repo.restore_data_from_csv(&csv).await.unwrap();
    assert_eq!(repo.snapshot().await.unwrap(), before);
    assert_eq!(repo.get_bit(2).await.unwrap().unwrap().audit.revision, 1);
}

#[tokio::test]
async fn export_has_one_row_per_entity() {
    let (_dir, repo) = open_repo().await;
    repo.add_bit(Bit::new(1, "Knock knock")).await.unwrap();
    repo.add_setlist(Setlist::new(10, "Open Mic")).await.unwrap();

    let csv = repo.export_data_to_csv().await.unwrap();
    let mut reader = csv::Reader::from_reader(csv.as_bytes());
    let headers = reader.headers().unwrap().clone();
    assert!(headers.iter().any(|h| h == "type"));
    let records: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
    assert_eq!(records.len(), 2);
}

#[tokio::test]
async fn failed_restore_changes_nothing() {
    let (_dir, repo) = open_repo().await;
    seed(&repo).await;
    let before = repo.snapshot().await.unwrap();

    let mut csv = repo.export_data_to_csv().await.unwrap();
    let mut valid = vec![""; punnote::backup::COLUMNS.len()];
    valid[0] = "99";
    valid[10] = "bit";
    let mut broken = vec![""; punnote::backup::COLUMNS.len()];
    broken[0] = "100";
    broken[10] = "show";
    broken[18] = "not-a-date";
    for row in [valid, broken] {
        csv.push_str(&row.join(","));
        csv.push('\n');
    }

    let err = repo.restore_data_from_csv(&csv).await.unwrap_err();
    assert!(matches!(err, AppError::Parse { .. }));
    assert_eq!(repo.snapshot().await.unwrap(), before);
}

#[tokio::test]
async fn restore_rejects_values_that_would_break_reads() {
    let (_dir, repo) = open_repo().await;
    seed(&repo).await;
    let before = repo.snapshot().await.unwrap();

    let nan_show = "id,title,type,showdate,compensation\n\
                    7,Friday,show,2026-03-06T22:30:00Z,NaN\n";
    let err = repo.restore_data_from_csv(nan_show).await.unwrap_err();
    assert!(matches!(err, AppError::Parse { record: 1, .. }));

    let loud_bit = "id,title,type,rating\n1,Knock,bit,9\n";
    let err = repo.restore_data_from_csv(loud_bit).await.unwrap_err();
    assert!(matches!(err, AppError::Parse { record: 1, .. }));

    assert_eq!(repo.snapshot().await.unwrap(), before);
    assert_ok!(repo.export_data_to_csv().await);
}

#[tokio::test]
async fn restore_overwrites_instead_of_merging() {
    let (_dir, repo) = open_repo().await;
    repo.add_bit(Bit::new(1, "Keep me")).await.unwrap();
    let csv = repo.export_data_to_csv().await.unwrap();

    repo.add_bit(Bit::new(2, "Added after backup")).await.unwrap();
    repo.add_setlist(Setlist::new(5, "Also new")).await.unwrap();

    repo.restore_data_from_csv(&csv).await.unwrap();
    let bits = repo.get_bits().await.unwrap();
    assert_eq!(bits.len(), 1);
    assert_eq!(bits[0].title, "Keep me");
    assert!(repo.get_setlists().await.unwrap().is_empty());
}

#[tokio::test]
async fn data_survives_reopening_the_database() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("punnote.db");
    {
        let repo = Repository::new(SqliteStore::open(&path).await.unwrap());
        seed(&repo).await;
    }

    let repo = Repository::new(SqliteStore::open(&path).await.unwrap());
    assert_eq!(repo.get_bits().await.unwrap().len(), 2);
    assert_eq!(repo.setlist_length(10).await.unwrap(), 150);
    let orders: Vec<u32> = repo
        .items_for_setlist(10)
        .await
        .unwrap()
        .into_iter()
        .map(|item| item.order)
        .collect();
    assert_eq!(orders, [1, 2, 3]);
}
