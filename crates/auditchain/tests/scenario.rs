//! End-to-end behaviour of the service on a SQLite store.

use std::sync::Arc;

use serde_json::{json, Map, Value};
use tempfile::tempdir;

use auditchain::core::{AnchorOutcome, EventChain, Keypair, LogInfo, NetworkId};
use auditchain::ledger::MemoryLedger;
use auditchain::store::{ChainStore, SqliteStore};
use auditchain::{AuditService, EventChainStore, ServiceError, ServiceOptions};
use auditchain_testkit::TestUser;

fn login(n: u64) -> LogInfo {
    serde_json::from_value(json!({
        "logType": "LOGIN",
        "userId": "user123",
        "metadata": {"status": "success", "attempt": n},
        "timestamp": "2024-12-29T12:00:00Z"
    }))
    .unwrap()
}

#[tokio::test]
async fn append_read_anchor_incrementally() {
    let dir = tempdir().unwrap();
    let store = Arc::new(SqliteStore::open(dir.path().join("audit.db")).unwrap());
    let ledger = Arc::new(MemoryLedger::new());
    let service = AuditService::new(
        store.clone(),
        ledger.clone(),
        Keypair::from_seed(&[1; 32]),
        ServiceOptions {
            anchor_after_append: false,
        },
    );
    let user = TestUser::from_seed(NetworkId::TESTNET, [2; 32]);
    let s = user.address();

    for n in 0..3 {
        service.log_event(&user.identity, login(n)).await.unwrap();
    }

    let events = service.logs(s).await.unwrap();
    assert_eq!(events.len(), 3);
    for (n, event) in events.iter().enumerate() {
        assert_eq!(event.payload["metadata"]["attempt"], json!(n));
    }
    assert_eq!(events[0].previous_hash, EventChain::seed(s));

    let first = service.anchor(s).await.unwrap();
    assert_eq!(first.anchored_len(), 3);

    assert_eq!(service.anchor(s).await.unwrap(), AnchorOutcome::Empty);

    service.log_event(&user.identity, login(3)).await.unwrap();
    let AnchorOutcome::Anchored(batch) = service.anchor(s).await.unwrap() else {
        panic!("expected the new suffix to be anchored");
    };
    assert_eq!(batch.len(), 1);
    assert_eq!(batch.entries[0].value, events[2].content_hash);

    let report = service.verify_anchors(s).await.unwrap();
    assert_eq!(report.entries.len(), 4);
    assert!(report.all_committed());
    assert_eq!(ledger.submissions().len(), 2);
}

#[tokio::test]
async fn state_survives_restart() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("audit.db");
    let user = TestUser::from_seed(NetworkId::MAINNET, [3; 32]);
    let ledger = Arc::new(MemoryLedger::new());

    {
        let service = AuditService::new(
            Arc::new(SqliteStore::open(&path).unwrap()),
            ledger.clone(),
            Keypair::from_seed(&[1; 32]),
            ServiceOptions::default(),
        );
        service.log_event(&user.identity, login(0)).await.unwrap();
        service.log_event(&user.identity, login(1)).await.unwrap();
    }

    let service = AuditService::new(
        Arc::new(SqliteStore::open(&path).unwrap()),
        ledger.clone(),
        Keypair::from_seed(&[1; 32]),
        ServiceOptions::default(),
    );
    assert_eq!(service.logs(user.address()).await.unwrap().len(), 2);
    assert!(service.anchor(user.address()).await.unwrap().is_empty());

    let logged = service.log_event(&user.identity, login(2)).await.unwrap();
    assert_eq!(logged.position, 2);
    assert_eq!(ledger.committed_len(), 3);
}

#[tokio::test]
async fn two_instances_never_fork_a_chain() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("audit.db");
    let user = TestUser::from_seed(NetworkId::TESTNET, [4; 32]);
    let signer = Keypair::from_seed(&[1; 32]);

    // Two handles on one database, each with its own in-process locks.
    let a = Arc::new(EventChainStore::new(Arc::new(SqliteStore::open(&path).unwrap()), signer.clone()));
    let b = Arc::new(EventChainStore::new(Arc::new(SqliteStore::open(&path).unwrap()), signer));

    let mut tasks = Vec::new();
    for i in 0..20u64 {
        let chains = if i % 2 == 0 { a.clone() } else { b.clone() };
        let subject = user.address().clone();
        tasks.push(tokio::spawn(async move {
            let mut payload = Map::new();
            payload.insert("i".into(), Value::from(i));
            // Retry lost races from a fresh read.
            loop {
                match chains.append(&subject, payload.clone()).await {
                    Ok(appended) => return appended,
                    Err(ServiceError::Conflict(_)) => tokio::task::yield_now().await,
                    Err(e) => panic!("append failed: {e}"),
                }
            }
        }));
    }

    let mut positions = Vec::new();
    for t in tasks {
        positions.push(t.await.unwrap().position);
    }
    positions.sort_unstable();
    assert_eq!(positions, (0..20).collect::<Vec<_>>());

    let store = SqliteStore::open(&path).unwrap();
    let stored = store.load_chain(user.address()).await.unwrap().unwrap();
    assert_eq!(stored.chain.len(), 20);
    stored.chain.verify().unwrap();
}
