#![allow(non_snake_case)]

use raffle_client::errors::RaffleAbort;
use raffle_client::event_feed;
use raffle_client::events::{ProcessedEvents, RaffleEvent};
use raffle_client::finalize::verify_transaction;
use raffle_client::ledger::{
    ObjectChange, TransactionDetail, TransactionReceipt, TxDigest,
};
use raffle_client::test_helpers::{
    FakeRaffle, TestContext, abort_failure_detail, test_object_id,
};
use serde_json::json;
use std::time::Duration;

#[tokio::test]
async fn verify_transaction__trusts_clean_receipt_when_detail_never_arrives() {
    let ctx = TestContext::new();
    let ledger = ctx.ledger();
    // given: the indexer never catches up within the retry budget
    ledger.fail_detail_fetches(3);
    let receipt = TransactionReceipt {
        digest: TxDigest::new("NoDetail"),
        raw: json!({ "digest": "NoDetail" }),
    };

    // when / then: a clean immediate receipt counts as success
    verify_transaction(&receipt, &ledger, "join raffle")
        .await
        .unwrap();
}

#[tokio::test]
async fn verify_transaction__fast_path_catches_receipt_failure_markers() {
    let ctx = TestContext::new();
    let ledger = ctx.ledger();
    // given: failure indicators already in the immediate receipt
    let receipt = TransactionReceipt {
        digest: TxDigest::new("Immediate"),
        raw: json!({
            "digest": "Immediate",
            "effects": "MoveAbort(MoveLocation { function: 2 }, 1) in command 0",
        }),
    };

    // when
    let outcome = verify_transaction(&receipt, &ledger, "join raffle").await;

    // then: classified without any detail fetch
    assert_eq!(
        outcome.unwrap_err().to_string(),
        RaffleAbort::InsufficientPayment.to_string()
    );
}

#[tokio::test]
async fn verify_transaction__classifies_failure_found_only_in_detail() {
    let ctx = TestContext::new();
    let ledger = ctx.ledger();
    // given: a clean receipt whose indexed record reports an abort
    ledger.set_detail("Late", abort_failure_detail(0));
    let receipt = TransactionReceipt {
        digest: TxDigest::new("Late"),
        raw: json!({ "digest": "Late" }),
    };

    // when
    let outcome = verify_transaction(&receipt, &ledger, "pick winner").await;

    // then
    assert_eq!(
        outcome.unwrap_err().to_string(),
        RaffleAbort::RaffleNotOpen.to_string()
    );
}

#[tokio::test]
async fn poll_once__merges_all_three_event_streams() {
    let ctx = TestContext::new();
    let ledger = ctx.ledger();
    let raffle = ledger.add_raffle(FakeRaffle::open(ctx.owner_address()));
    // given
    ledger.push_created_event(Some(raffle), ctx.owner_address(), "D1");
    ledger.push_joined_event(raffle, ctx.alice_address(), 1, "D2");
    ledger.push_winner_event(raffle, ctx.alice_address(), 2_000_000_000, "D3");

    // when
    let records = event_feed::poll_once(&ledger, &ctx.package()).await;

    // then
    assert_eq!(records.len(), 3);
}

#[tokio::test]
async fn poll_once__failed_stream_yields_empty_not_abort() {
    let ctx = TestContext::new();
    let ledger = ctx.ledger();
    let raffle = ledger.add_raffle(FakeRaffle::open(ctx.owner_address()));
    // given: the joined stream is down
    ledger.fail_event_query("PlayerJoined");
    ledger.push_created_event(Some(raffle), ctx.owner_address(), "D1");
    ledger.push_joined_event(raffle, ctx.alice_address(), 1, "D2");
    ledger.push_winner_event(raffle, ctx.alice_address(), 1_000_000_000, "D3");

    // when
    let records = event_feed::poll_once(&ledger, &ctx.package()).await;

    // then: the other two streams still come through
    assert_eq!(records.len(), 2);
    assert!(
        records
            .iter()
            .all(|record| !matches!(record.event, RaffleEvent::Joined(_)))
    );
}

#[tokio::test]
async fn subscription__delivers_batches_until_stopped() {
    let ctx = TestContext::new();
    let ledger = ctx.ledger();
    let raffle = ledger.add_raffle(FakeRaffle::open(ctx.owner_address()));
    ledger.push_created_event(Some(raffle), ctx.owner_address(), "D1");
    let feed = ctx.feed(Duration::from_millis(50));

    // when
    let mut subscription = feed.subscribe();
    let batch = subscription.next_batch().await.unwrap();

    // then
    assert_eq!(batch.len(), 1);

    subscription.stop();
    // the aborted task eventually closes the channel
    while subscription.next_batch().await.is_some() {}
}

#[tokio::test]
async fn winner_notification__fires_once_for_redelivered_events() {
    let ctx = TestContext::new();
    let ledger = ctx.ledger();
    let raffle = ledger.add_raffle(FakeRaffle::open(ctx.owner_address()));
    // given: the same on-chain event observed on two consecutive polls
    ledger.push_winner_event(raffle, ctx.alice_address(), 2_000_000_000, "WDIG");
    let first = event_feed::poll_once(&ledger, &ctx.package()).await;
    let second = event_feed::poll_once(&ledger, &ctx.package()).await;

    // when
    let mut processed = ProcessedEvents::new();
    let notifications = first
        .iter()
        .chain(second.iter())
        .filter(|record| {
            matches!(record.event, RaffleEvent::WinnerPicked(_)) && processed.mark(record)
        })
        .count();

    // then
    assert_eq!(notifications, 1);
}

#[tokio::test]
async fn list__resolves_ids_from_payload_and_object_changes() {
    let ctx = TestContext::new();
    let ledger = ctx.ledger();
    let raffle_a = ledger.add_raffle(FakeRaffle::open(ctx.owner_address()));
    let raffle_b = ledger.add_raffle(FakeRaffle::open(ctx.owner_address()));
    // given: one event carries the id, the other style omits it
    ledger.push_created_event(Some(raffle_a), ctx.owner_address(), "DIG_A");
    ledger.push_created_event(None, ctx.owner_address(), "DIG_B");
    let fallback_detail = TransactionDetail {
        object_changes: vec![ObjectChange {
            change_type: "created".to_string(),
            object_type: format!("{}::simple_raffle::Raffle", ctx.package()),
            object_id: Some(raffle_b),
        }],
        ..TransactionDetail::default()
    };
    ledger.set_detail("DIG_B", fallback_detail);

    // when
    let listed = ctx.directory().list().await.unwrap();

    // then: newest creation first, both ids resolved
    let ids: Vec<_> = listed.iter().map(|snapshot| snapshot.id).collect();
    assert_eq!(ids, vec![raffle_b, raffle_a]);
}

#[tokio::test]
async fn list__drops_raffles_whose_projection_fails() {
    let ctx = TestContext::new();
    let ledger = ctx.ledger();
    let healthy = ledger.add_raffle(FakeRaffle::open(ctx.owner_address()));
    let broken = ledger.add_raffle(FakeRaffle::open(ctx.owner_address()));
    ledger.fail_inspection(broken);
    ledger.push_created_event(Some(healthy), ctx.owner_address(), "D1");
    ledger.push_created_event(Some(broken), ctx.owner_address(), "D2");

    // when
    let listed = ctx.directory().list().await.unwrap();

    // then: the list degrades instead of failing wholesale
    let ids: Vec<_> = listed.iter().map(|snapshot| snapshot.id).collect();
    assert_eq!(ids, vec![healthy]);
}

#[tokio::test]
async fn fetch__vanished_object_is_none_not_an_error() {
    let ctx = TestContext::new();
    let ghost = test_object_id(404);

    let snapshot = ctx.reader().fetch(&ghost).await.unwrap();
    assert!(snapshot.is_none());
}

#[tokio::test]
async fn fetch__broken_view_defaults_that_field_only() {
    let ctx = TestContext::new();
    let ledger = ctx.ledger();
    // given: a live raffle whose pool value comes back undecodable
    let id = ledger.add_raffle(FakeRaffle {
        owner: ctx.owner_address(),
        pool_value: 3_000_000_000,
        entrant_count: 3,
        entrants: Vec::new(),
        is_open: true,
        has_winner: false,
        winner: None,
    });
    ledger.break_view(id, "get_pool_value");

    // when
    let snapshot = ctx.reader().fetch(&id).await.unwrap().unwrap();

    // then
    assert_eq!(snapshot.pool_value, 0);
    assert_eq!(snapshot.entrant_count, 3);
    assert!(snapshot.is_open);
    assert_eq!(snapshot.owner, ctx.owner_address());
}

#[tokio::test]
async fn entrants__decodes_list_and_degrades_to_empty() {
    let ctx = TestContext::new();
    let ledger = ctx.ledger();
    let id = ledger.add_raffle(FakeRaffle {
        owner: ctx.owner_address(),
        pool_value: 0,
        entrant_count: 2,
        entrants: vec![ctx.alice_address(), ctx.owner_address()],
        is_open: true,
        has_winner: false,
        winner: None,
    });

    let entrants = ctx.reader().entrants(&id).await.unwrap();
    assert_eq!(entrants, vec![ctx.alice_address(), ctx.owner_address()]);

    ledger.break_view(id, "get_entrants");
    let entrants = ctx.reader().entrants(&id).await.unwrap();
    assert!(entrants.is_empty());
}

#[tokio::test]
async fn refresh_paced__skips_missing_objects_and_keeps_the_rest() {
    let ctx = TestContext::new();
    let ledger = ctx.ledger();
    let first = ledger.add_raffle(FakeRaffle::open(ctx.owner_address()));
    let second = ledger.add_raffle(FakeRaffle::open(ctx.owner_address()));
    let ghost = test_object_id(404);

    let snapshots = ctx
        .directory()
        .refresh_paced(&[first, ghost, second])
        .await;

    let ids: Vec<_> = snapshots.iter().map(|snapshot| snapshot.id).collect();
    assert_eq!(ids, vec![first, second]);
}
