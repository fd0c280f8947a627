#![allow(non_snake_case)]

use raffle_client::errors::WALLET_REJECTED_MESSAGE;
use raffle_client::test_helpers::TestContext;

#[tokio::test]
async fn create_raffle__round_trip_projects_fresh_state() {
    let ctx = TestContext::new();
    let actions = ctx.alice_actions();

    // when
    actions.create_raffle().await.unwrap();

    // then: the new raffle projects as empty, open, and winnerless
    let id = ctx.ledger().latest_raffle_id().unwrap();
    let snapshot = ctx.reader().fetch(&id).await.unwrap().unwrap();
    assert_eq!(snapshot.entrant_count, 0);
    assert_eq!(snapshot.pool_value, 0);
    assert!(snapshot.is_open);
    assert!(!snapshot.has_winner);
    assert_eq!(snapshot.winner, None);
    assert_eq!(snapshot.owner, ctx.alice_address());
}

#[tokio::test]
async fn create_raffle__appears_in_the_directory_listing() {
    let ctx = TestContext::new();
    let actions = ctx.alice_actions();

    // when
    actions.create_raffle().await.unwrap();

    // then: the creation event is enough to list it
    let id = ctx.ledger().latest_raffle_id().unwrap();
    let listed = ctx.directory().list().await.unwrap();
    assert!(listed.iter().any(|snapshot| snapshot.id == id));
}

#[tokio::test]
async fn create_raffle__builds_a_single_argumentless_entry_call() {
    let ctx = TestContext::new();
    let actions = ctx.alice_actions();

    actions.create_raffle().await.unwrap();

    let plans = ctx.ledger().executed_plans();
    assert_eq!(plans.len(), 1);
    assert_eq!(plans[0].commands.len(), 1);
    match &plans[0].commands[0] {
        raffle_client::ledger::Command::MoveCall {
            module,
            function,
            arguments,
            ..
        } => {
            assert_eq!(module, "simple_raffle");
            assert_eq!(function, "create_raffle");
            assert!(arguments.is_empty());
        }
        other => panic!("unexpected command: {other:?}"),
    }
}

#[tokio::test]
async fn create_raffle__surfaces_one_classified_message_on_rejection() {
    let ctx = TestContext::new();
    let actions = ctx.alice_actions();
    // given: the wallet/provider refuses the submission
    ctx.ledger().fail_next_execution("User rejected the request");

    // when
    let outcome = actions.create_raffle().await;

    // then
    assert_eq!(outcome.unwrap_err().to_string(), WALLET_REJECTED_MESSAGE);
}
