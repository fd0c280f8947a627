#![allow(non_snake_case)]

use raffle_client::config::{ENTRY_FEE, JOIN_GAS_BUDGET};
use raffle_client::errors::{INSUFFICIENT_BALANCE_MESSAGE, RaffleAbort};
use raffle_client::ledger::{CallArg, Command};
use raffle_client::test_helpers::{FakeRaffle, TestContext, abort_failure_detail};

#[tokio::test]
async fn join_raffle__increments_count_and_pool_by_exactly_the_fee() {
    let ctx = TestContext::new();
    let ledger = ctx.ledger();
    // given: a raffle with one paid entrant
    let id = ledger.add_raffle(FakeRaffle {
        owner: ctx.owner_address(),
        pool_value: ENTRY_FEE,
        entrant_count: 1,
        entrants: vec![ctx.owner_address()],
        is_open: true,
        has_winner: false,
        winner: None,
    });

    // when
    ctx.alice_actions().join_raffle(&id).await.unwrap();

    // then
    let snapshot = ctx.reader().fetch(&id).await.unwrap().unwrap();
    assert_eq!(snapshot.entrant_count, 2);
    assert_eq!(snapshot.pool_value, 2 * ENTRY_FEE);
    assert!(snapshot.is_open);
}

#[tokio::test]
async fn join_raffle__splits_the_fee_and_returns_the_remainder() {
    let ctx = TestContext::new();
    let ledger = ctx.ledger();
    let id = ledger.add_raffle(FakeRaffle::open(ctx.owner_address()));

    // when
    ctx.alice_actions().join_raffle(&id).await.unwrap();

    // then: split, join(raffle, coin), transfer-back, explicit gas budget
    let plans = ledger.executed_plans();
    assert_eq!(plans.len(), 1);
    let plan = &plans[0];
    assert_eq!(plan.gas_budget, Some(JOIN_GAS_BUDGET));

    let payment = match &plan.commands[0] {
        Command::SplitFromGas { amount } => {
            assert_eq!(*amount, ENTRY_FEE);
            0usize
        }
        other => panic!("expected fee split first, got {other:?}"),
    };
    match &plan.commands[1] {
        Command::MoveCall {
            function,
            arguments,
            ..
        } => {
            assert_eq!(function, "join");
            assert_eq!(
                arguments,
                &vec![
                    CallArg::Object { id },
                    CallArg::Result { index: payment },
                ]
            );
        }
        other => panic!("expected join call, got {other:?}"),
    }
    assert!(matches!(
        plan.commands[2],
        Command::TransferToSender { source } if source == payment
    ));
}

#[tokio::test]
async fn join_raffle__classifies_an_on_chain_already_joined_abort() {
    let ctx = TestContext::new();
    let ledger = ctx.ledger();
    let id = ledger.add_raffle(FakeRaffle::open(ctx.owner_address()));
    // given: the transaction lands but aborts during finalization
    ledger.set_next_execution_detail(abort_failure_detail(3));

    // when
    let outcome = ctx.alice_actions().join_raffle(&id).await;

    // then
    assert_eq!(
        outcome.unwrap_err().to_string(),
        RaffleAbort::AlreadyJoined.to_string()
    );
}

#[tokio::test]
async fn join_raffle__balance_failure_beats_embedded_codes() {
    let ctx = TestContext::new();
    let ledger = ctx.ledger();
    let id = ledger.add_raffle(FakeRaffle::open(ctx.owner_address()));
    // given: a funding failure whose text also contains a small integer
    ledger.fail_next_execution("InsufficientCoinBalance in command 2");

    // when
    let outcome = ctx.alice_actions().join_raffle(&id).await;

    // then: priority ordering keeps the funding message
    assert_eq!(
        outcome.unwrap_err().to_string(),
        INSUFFICIENT_BALANCE_MESSAGE
    );
}
