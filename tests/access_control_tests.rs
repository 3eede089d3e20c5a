use chrono::Duration;
use cropledger::ledger::model;
use cropledger::ledger::{
    AccessError, ActivityLogEditInput, ActivityLogInput, BatchInput, Identity, Ledger, LedgerError,
    LedgerSettings, LogDateTime, NullSink, Operation, SustainabilityLogEditInput,
    SustainabilityLogInput,
};
use cropledger::storage::memory::MemoryStorage;
use std::sync::Arc;

fn batch_input(id: &str) -> BatchInput {
    let start = model::now() - Duration::days(1);
    BatchInput {
        batch_id: id.to_string(),
        crop_name: "Wheat".to_string(),
        start,
        end: start + Duration::days(120),
        farmer: "B".to_string(),
        expected_yield: 500,
        land: "North field".to_string(),
        status: "Active".to_string(),
    }
}

async fn open_with_operator() -> (Arc<MemoryStorage>, Ledger) {
    let storage = Arc::new(MemoryStorage::new());
    let mut settings = LedgerSettings::new("alice");
    settings.operators = vec![Identity::from("bob")];
    let ledger = Ledger::open(storage.clone(), settings, Arc::new(NullSink))
        .await
        .unwrap();
    (storage, ledger)
}

#[tokio::test]
async fn test_non_owner_cannot_mutate_records() {
    let (storage, ledger) = open_with_operator().await;
    let commits = storage.commit_count();

    for caller in ["bob", "mallory"] {
        let err = ledger
            .create_batch(&Identity::from(caller), batch_input("B1"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Access(AccessError::Unauthorized {
                operation: Operation::CreateBatch,
                ..
            })
        ));
    }

    assert_eq!(storage.commit_count(), commits);
    assert!(!ledger.batch_exists("B1").await.unwrap());
}

#[tokio::test]
async fn test_operator_can_pause_and_unpause() {
    let (_storage, ledger) = open_with_operator().await;
    let alice = Identity::from("alice");
    let bob = Identity::from("bob");

    ledger.pause(&bob).await.unwrap();
    assert!(ledger.is_paused().await);

    let err = ledger.create_batch(&alice, batch_input("B1")).await.unwrap_err();
    assert!(matches!(
        err,
        LedgerError::Access(AccessError::Paused(Operation::CreateBatch))
    ));

    // Pausing twice is accepted
    ledger.pause(&alice).await.unwrap();
    assert!(ledger.is_paused().await);

    ledger.unpause(&bob).await.unwrap();
    assert!(!ledger.is_paused().await);
    ledger.create_batch(&alice, batch_input("B1")).await.unwrap();
}

#[tokio::test]
async fn test_default_pause_blocks_only_batch_creation() {
    let (_storage, ledger) = open_with_operator().await;
    let alice = Identity::from("alice");
    let day = model::now() - Duration::days(1);
    ledger.create_batch(&alice, batch_input("B1")).await.unwrap();
    ledger.create_batch(&alice, batch_input("B2")).await.unwrap();

    ledger.pause(&Identity::from("bob")).await.unwrap();
    assert!(ledger.create_batch(&alice, batch_input("B3")).await.is_err());

    let mut edit = batch_input("B1");
    edit.expected_yield = 650;
    ledger.edit_batch(&alice, edit).await.unwrap();
    ledger.deactivate_batch(&alice, "B2").await.unwrap();

    let activity_id = ledger
        .create_activity_log(
            &alice,
            ActivityLogInput {
                batch_id: "B1".to_string(),
                activity_name: "Fertilizing".to_string(),
                start: LogDateTime::new(day, 7, 0),
                end: LogDateTime::new(day, 8, 0),
                area_covered: 12,
            },
        )
        .await
        .unwrap();
    ledger
        .edit_activity_log(
            &alice,
            ActivityLogEditInput {
                id: activity_id,
                activity_name: "Fertilizing".to_string(),
                start: LogDateTime::new(day, 7, 0),
                end: LogDateTime::new(day, 9, 0),
                area_covered: 15,
            },
        )
        .await
        .unwrap();

    let practice_id = ledger
        .create_sustainability_log(
            &alice,
            SustainabilityLogInput {
                batch_id: "B1".to_string(),
                practice_name: "Crop rotation".to_string(),
                implementation_date: day,
                impact_description: "Breaks pest cycles".to_string(),
                area_covered: 30,
            },
        )
        .await
        .unwrap();
    ledger
        .edit_sustainability_log(
            &alice,
            SustainabilityLogEditInput {
                id: practice_id,
                practice_name: "Crop rotation".to_string(),
                implementation_date: day,
                impact_description: "Breaks pest cycles".to_string(),
                area_covered: 35,
            },
        )
        .await
        .unwrap();

    assert!(ledger.is_paused().await);
    assert_eq!(ledger.get_batch("B1").await.unwrap().unwrap().expected_yield, 650);
    assert!(ledger.get_batch("B2").await.unwrap().unwrap().is_cancelled());
    assert!(!ledger.batch_exists("B3").await.unwrap());
    assert_eq!(ledger.get_activity_log_history(activity_id).await.unwrap().len(), 1);
    assert_eq!(ledger.get_sustainability_log_history(practice_id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_outsider_cannot_pause() {
    let (_storage, ledger) = open_with_operator().await;
    let err = ledger.pause(&Identity::from("mallory")).await.unwrap_err();
    assert!(matches!(
        err,
        LedgerError::Access(AccessError::Unauthorized {
            operation: Operation::Pause,
            ..
        })
    ));
    assert!(!ledger.is_paused().await);
}

#[tokio::test]
async fn test_unauthorized_reported_before_paused() {
    let (_storage, ledger) = open_with_operator().await;
    ledger.pause(&Identity::from("alice")).await.unwrap();

    let err = ledger
        .create_batch(&Identity::from("mallory"), batch_input("B1"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        LedgerError::Access(AccessError::Unauthorized { .. })
    ));
}

#[tokio::test]
async fn test_operator_management() {
    let (_storage, ledger) = open_with_operator().await;
    let alice = Identity::from("alice");
    let bob = Identity::from("bob");
    let carol = Identity::from("carol");

    assert!(ledger.is_operator(&bob).await);
    assert!(!ledger.is_operator(&carol).await);

    ledger.set_operator(&alice, carol.clone(), true).await.unwrap();
    ledger.set_operator(&alice, bob.clone(), false).await.unwrap();
    assert!(ledger.is_operator(&carol).await);
    assert!(!ledger.is_operator(&bob).await);

    // Operators cannot manage operators
    let err = ledger.set_operator(&carol, bob.clone(), true).await.unwrap_err();
    assert!(matches!(err, LedgerError::Access(AccessError::Unauthorized { .. })));

    let err = ledger
        .set_operator(&alice, Identity::from(""), true)
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Access(AccessError::EmptyIdentity)));
}

#[tokio::test]
async fn test_transfer_ownership() {
    let (_storage, ledger) = open_with_operator().await;
    let alice = Identity::from("alice");
    let dave = Identity::from("dave");

    ledger.transfer_ownership(&alice, dave.clone()).await.unwrap();
    assert_eq!(ledger.owner().await, dave);

    let err = ledger.create_batch(&alice, batch_input("B1")).await.unwrap_err();
    assert!(matches!(err, LedgerError::Access(AccessError::Unauthorized { .. })));
    ledger.create_batch(&dave, batch_input("B1")).await.unwrap();

    let err = ledger
        .transfer_ownership(&dave, Identity::from("  "))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Access(AccessError::EmptyIdentity)));
    assert_eq!(ledger.owner().await, dave);
}
