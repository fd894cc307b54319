//! scenario_store_survives_restart
//!
//! The document is the single source of truth across process restarts:
//! everything written before a shutdown must be visible after reopening the
//! same path, and a corrupt document must refuse to open at all.

use mbl_schemas::{AlarmCondition, AlarmDraft, Direction, OwnerId};
use mbl_store::{AlarmStore, StoreError};

fn draft(owner: &str, symbol: &str, target: f64) -> AlarmDraft {
    AlarmDraft {
        owner: OwnerId::new(owner),
        instrument: symbol.to_string(),
        condition: AlarmCondition::Price {
            direction: Direction::Below,
            target_value: target,
        },
    }
}

#[tokio::test]
async fn state_reloads_after_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");
    let owner = OwnerId::new("u1");

    let kept_id;
    {
        let store = AlarmStore::open(&path).unwrap();
        let kept = store.create(draft("u1", "TRY=X", 40.0)).await.unwrap();
        kept_id = kept.id;
        let cancelled = store.create(draft("u1", "GC=F", 2000.0)).await.unwrap();
        store.cancel(cancelled.id, &owner).await.unwrap();
        store
            .upsert_holding(owner.clone(), "ALTIN", 540.0, "gram")
            .await
            .unwrap();
    } // simulated shutdown

    let store = AlarmStore::open(&path).unwrap();

    let active = store.list_active(None).await;
    assert_eq!(active.len(), 1, "cancelled alarm must stay excluded");
    assert_eq!(active[0].id, kept_id);

    let holdings = store.holdings(&owner).await;
    assert_eq!(holdings.len(), 1);
    assert_eq!(holdings[0].instrument, "ALTIN");
    assert_eq!(holdings[0].quantity, 540.0);
}

#[tokio::test]
async fn corrupt_document_refuses_to_open() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");
    std::fs::write(&path, "{ not json").unwrap();

    let err = AlarmStore::open(&path).unwrap_err();
    match err {
        StoreError::Corrupt { path: p, .. } => assert_eq!(p, path),
        other => panic!("expected Corrupt, got {other}"),
    }
}

#[tokio::test]
async fn missing_file_starts_empty() {
    let dir = tempfile::tempdir().unwrap();
    let store = AlarmStore::open(dir.path().join("fresh.json")).unwrap();
    assert!(store.list_active(None).await.is_empty());
    assert!(store.owners_with_watches().await.is_empty());
}
