use std::sync::Arc;

use tempfile::tempdir;

use coop_treasury::{
    FileSnapshotStore, InMemoryValueLedger, ManualClock, MemorySnapshotStore, ParticipantId,
    ProposalStatus, SharedTreasury, SnapshotStore, StorageError, Treasury, TreasuryConfig,
    TreasuryEngine, TreasuryError, TreasuryEvent, ValueLedger, VoteChoice,
};

fn p(name: &str) -> ParticipantId {
    ParticipantId::from(name)
}

fn setup_test() -> (SharedTreasury, Arc<InMemoryValueLedger>, ManualClock) {
    let config = TreasuryConfig::default();
    let token = Arc::new(InMemoryValueLedger::new(config.custody_account.clone()));
    let clock = ManualClock::new(1_700_000_000);
    for name in ["alice", "bob"] {
        token.mint(&p(name), 1_000).unwrap();
        token.approve(&p(name), 1_000);
    }
    let engine = TreasuryEngine::new(&config, token.clone(), Arc::new(clock.clone()));
    (SharedTreasury::new(engine, 16), token, clock)
}

#[tokio::test]
async fn test_subscribers_see_committed_events_only() {
    let (treasury, _token, _clock) = setup_test();
    let mut events = treasury.subscribe();

    treasury.deposit(&p("bob"), 200).await.unwrap();
    assert!(treasury.deposit(&p("bob"), 0).await.is_err());
    let id = treasury.create_proposal(&p("bob"), "Add AAVE").await.unwrap();
    treasury.vote(id, &p("bob"), VoteChoice::Yes).await.unwrap();

    let mut received = Vec::new();
    while let Ok(entry) = events.try_recv() {
        received.push(entry);
    }

    let sequences: Vec<u64> = received.iter().map(|e| e.sequence).collect();
    assert_eq!(sequences, vec![0, 1, 2, 3]);
    assert!(matches!(received[0].event, TreasuryEvent::Deposited { amount: 200, .. }));
    assert!(matches!(received[1].event, TreasuryEvent::ProposalCreated { .. }));
    assert!(matches!(received[2].event, TreasuryEvent::VoteCast { weight: 200, .. }));
    assert!(matches!(
        received[3].event,
        TreasuryEvent::ProposalResolved { status: ProposalStatus::Approved, .. }
    ));
}

#[tokio::test]
async fn test_subscribers_see_events_the_journal_no_longer_keeps() {
    let config = TreasuryConfig { event_retention: 1, ..Default::default() };
    let token = Arc::new(InMemoryValueLedger::new(config.custody_account.clone()));
    token.mint(&p("bob"), 1_000).unwrap();
    token.approve(&p("bob"), 1_000);
    let engine = TreasuryEngine::new(&config, token, Arc::new(ManualClock::new(1_700_000_000)));
    let treasury = SharedTreasury::new(engine, 16);
    let mut events = treasury.subscribe();

    treasury.deposit(&p("bob"), 200).await.unwrap();
    let id = treasury.create_proposal(&p("bob"), "Add AAVE").await.unwrap();
    // Casts the vote and resolves the proposal in one operation
    treasury.vote(id, &p("bob"), VoteChoice::Yes).await.unwrap();

    let mut received = Vec::new();
    while let Ok(entry) = events.try_recv() {
        received.push(entry);
    }

    let sequences: Vec<u64> = received.iter().map(|e| e.sequence).collect();
    assert_eq!(sequences, vec![0, 1, 2, 3]);
    assert!(matches!(received[2].event, TreasuryEvent::VoteCast { weight: 200, .. }));
    assert!(matches!(
        received[3].event,
        TreasuryEvent::ProposalResolved { status: ProposalStatus::Approved, .. }
    ));
}

#[tokio::test]
async fn test_concurrent_deposits_are_serialized() {
    let (treasury, token, _clock) = setup_test();

    let mut handles = Vec::new();
    for name in ["alice", "bob"] {
        for _ in 0..10 {
            let treasury = treasury.clone();
            handles.push(tokio::spawn(async move {
                treasury.deposit(&p(name), 10).await
            }));
        }
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(treasury.total_shares().await, 200);
    assert_eq!(treasury.share_balance_of(&p("alice")).await, 100);
    assert_eq!(treasury.custody_balance().await, 200);
    assert_eq!(token.balance_of(&p("bob")), 900);
    treasury.verify_invariants().await.unwrap();
}

#[tokio::test]
async fn test_memory_store_round_trip() {
    let (treasury, token, clock) = setup_test();
    treasury.deposit(&p("alice"), 300).await.unwrap();
    treasury.deposit(&p("bob"), 200).await.unwrap();
    let id = treasury.create_proposal(&p("bob"), "Add AAVE").await.unwrap();
    treasury.vote(id, &p("alice"), VoteChoice::No).await.unwrap();

    let store = MemorySnapshotStore::new();
    assert!(store.load().await.unwrap().is_none());
    treasury.persist(&store).await.unwrap();

    let restored = SharedTreasury::restore_from(&store, &TreasuryConfig::default(), token, Arc::new(clock))
        .await
        .unwrap();

    assert_eq!(restored.total_shares().await, 500);
    assert_eq!(restored.next_proposal_id().await, treasury.next_proposal_id().await);
    assert_eq!(restored.get_proposal(id).await.unwrap(), treasury.get_proposal(id).await.unwrap());

    // The restored treasury keeps enforcing the double-vote rule
    let err = restored.vote(id, &p("alice"), VoteChoice::Yes).await.unwrap_err();
    assert!(matches!(err, TreasuryError::AlreadyVoted { .. }));
}

#[tokio::test]
async fn test_file_store_round_trip() {
    let temp_dir = tempdir().unwrap();
    let path = temp_dir.path().join("state").join("treasury.json");
    let store = FileSnapshotStore::new(&path);

    let (treasury, _token, _clock) = setup_test();
    treasury.deposit(&p("alice"), 150).await.unwrap();
    treasury.create_proposal(&p("alice"), "Add Compound").await.unwrap();
    treasury.persist(&store).await.unwrap();

    assert!(path.exists());
    let loaded = store.load().await.unwrap().unwrap();
    assert_eq!(loaded, treasury.snapshot().await);
}

#[tokio::test]
async fn test_file_store_missing_snapshot() {
    let temp_dir = tempdir().unwrap();
    let store = FileSnapshotStore::new(temp_dir.path().join("absent.json"));

    assert!(store.load().await.unwrap().is_none());
    assert!(matches!(store.load_required().await, Err(StorageError::NotFound(_))));
}

#[tokio::test]
async fn test_file_store_rejects_garbage() {
    let temp_dir = tempdir().unwrap();
    let path = temp_dir.path().join("treasury.json");
    tokio::fs::write(&path, b"{ not json").await.unwrap();

    let store = FileSnapshotStore::new(&path);
    assert!(matches!(store.load().await, Err(StorageError::Serialization(_))));
}
