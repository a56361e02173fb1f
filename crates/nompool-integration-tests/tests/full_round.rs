//! Integration test: two complete staking rounds.
//!
//! 1. Two nominators deposit while idle
//! 2. Stake is sent and confirmed; a third nominator joins mid-round and a
//!    second one asks to leave
//! 3. The stake comes back with a reward: operator share, pro-rata income,
//!    pending deposit promoted, queued withdrawal paid out
//! 4. The operator withdraws its accrued funds
//! 5. A second round comes back short and the loss is socialised
//! 6. The booking journal reproduces every nominator balance

use nompool_integration_tests::{nominator, Harness, ELECTOR, HELD_FOR, OPERATOR, POOL};
use nompool_lifecycle::effects::{Effect, TransferReason};
use nompool_lifecycle::{Operation, Outcome};
use nompool_types::booking::{Booking, BookingKind};
use nompool_types::state::PoolState;
use nompool_types::ErrorKind;

/// Collect the bookings of a committed outcome.
fn keep(outcome: Outcome, journal: &mut Vec<Booking>) -> Outcome {
    journal.extend(outcome.bookings().cloned());
    outcome
}

#[test]
fn two_rounds_reward_then_loss() {
    let mut h = Harness::new();
    let mut journal: Vec<Booking> = Vec::new();

    // =========================================================
    // Round 1 setup
    // =========================================================
    keep(h.deposit(1, 3_000), &mut journal);
    keep(h.deposit(2, 1_000), &mut journal);
    assert_eq!(h.data().liquid_balance, 4_000);

    let staked = keep(h.commit(OPERATOR, 0, Operation::Stake), &mut journal);
    assert!(staked.effects().contains(&Effect::SendStake { amount: 4_000 }));
    assert_eq!(h.data().state, PoolState::StakeSent);
    assert_eq!(h.data().liquid_balance, 0);
    assert_eq!(h.pool.counterparty().stakes.len(), 1);
    assert_eq!(h.pool.counterparty().stakes[0].0, POOL);

    keep(
        h.commit(
            ELECTOR,
            0,
            Operation::StakeConfirmed {
                validator_set_hash: [1; 32],
            },
        ),
        &mut journal,
    );
    assert_eq!(h.data().state, PoolState::Staked);
    assert_eq!(h.data().validator_set_changes_count, 1);

    // Mid-round: a new nominator joins, nominator 2 leaves.
    keep(h.deposit(3, 500), &mut journal);
    let entry = h.data().ledger.get(&nominator(3)).copied().expect("entry");
    assert_eq!(entry.deposit, 0);
    assert_eq!(entry.pending_deposit, 500);

    let queued = keep(h.commit(nominator(2), 0, Operation::Withdraw), &mut journal);
    assert!(queued.effects().is_empty());
    assert!(h.data().withdrawals.contains(&nominator(2)));

    // Same validator set does not move the lock; a new one does.
    let change_time = h.data().validator_set_change_time;
    keep(
        h.commit(
            ELECTOR,
            0,
            Operation::ValidatorSetChanged {
                validator_set_hash: [1; 32],
            },
        ),
        &mut journal,
    );
    assert_eq!(h.data().validator_set_change_time, change_time);
    keep(
        h.commit(
            ELECTOR,
            0,
            Operation::ValidatorSetChanged {
                validator_set_hash: [2; 32],
            },
        ),
        &mut journal,
    );
    assert_eq!(h.data().validator_set_changes_count, 2);
    let unlock = h.data().unlock_time();
    assert!(unlock > change_time + HELD_FOR);

    // Still locked.
    let locked = h.send(OPERATOR, 0, Operation::RecoverStake);
    assert_eq!(locked.error_kind(), Some(ErrorKind::InvalidState));

    h.now = unlock;
    keep(h.commit(OPERATOR, 0, Operation::RecoverStake), &mut journal);
    assert_eq!(h.data().state, PoolState::Recovering);
    assert_eq!(h.pool.counterparty().recoveries.len(), 1);

    // =========================================================
    // Round 1 settlement: 400 reward
    // =========================================================
    let settled = keep(h.commit(ELECTOR, 4_400, Operation::StakeReturned), &mut journal);
    assert!(settled.effects().contains(&Effect::Transfer {
        to: nominator(2),
        amount: 1_090,
        reason: TransferReason::Withdrawal,
    }));

    let data = h.data();
    assert_eq!(data.state, PoolState::Idle);
    assert_eq!(data.stake_amount_sent, 0);
    assert_eq!(data.validator_amount, 40);
    assert_eq!(data.ledger.deposit_of(&nominator(1)), 3_270);
    assert_eq!(data.ledger.deposit_of(&nominator(3)), 500);
    assert!(!data.ledger.contains(&nominator(2)));
    assert!(data.withdrawals.is_empty());
    assert_eq!(data.liquid_balance, 3_810);
    data.check_conservation().expect("balanced after round 1");

    // =========================================================
    // Operator takes its share
    // =========================================================
    let paid = keep(h.commit(OPERATOR, 0, Operation::WithdrawValidatorFunds), &mut journal);
    assert!(paid.effects().contains(&Effect::Transfer {
        to: OPERATOR,
        amount: 40,
        reason: TransferReason::ValidatorFunds,
    }));
    assert_eq!(h.data().validator_amount, 0);
    let nothing = h.send(OPERATOR, 0, Operation::WithdrawValidatorFunds);
    assert!(!nothing.is_committed());

    // =========================================================
    // Round 2: the counterparty returns 10% less
    // =========================================================
    let before = journal.len();
    h.commit(OPERATOR, 0, Operation::Stake);
    assert_eq!(h.data().stake_amount_sent, 3_770);
    h.commit(
        ELECTOR,
        0,
        Operation::StakeConfirmed {
            validator_set_hash: [3; 32],
        },
    );
    h.advance(HELD_FOR);
    h.commit(OPERATOR, 0, Operation::RecoverStake);
    let short = h.commit(ELECTOR, 3_393, Operation::StakeReturned);
    assert!(short.effects().iter().any(|e| matches!(
        e,
        Effect::Anomaly {
            kind: ErrorKind::NegativeReward,
            ..
        }
    )));
    let losses: Vec<_> = short
        .bookings()
        .filter(|b| b.kind == BookingKind::NominatorLoss)
        .map(|b| (b.address, b.debit))
        .collect();
    assert_eq!(losses, vec![(nominator(1), 327), (nominator(3), 50)]);
    journal.extend(short.bookings().cloned());
    assert!(journal.len() > before);

    let data = h.data();
    assert_eq!(data.ledger.deposit_of(&nominator(1)), 2_943);
    assert_eq!(data.ledger.deposit_of(&nominator(3)), 450);
    assert_eq!(data.validator_amount, 0);
    data.check_conservation().expect("balanced after round 2");

    // =========================================================
    // Journal reproduces the ledger
    // =========================================================
    let mut conn = nompool_db::open_memory().expect("open journal");
    let inserted =
        nompool_db::queries::bookings::insert_bookings(&mut conn, &journal).expect("insert");
    assert_eq!(inserted, journal.len());

    for n in [1, 3] {
        let net = nompool_db::queries::bookings::nominator_net(&conn, &nominator(n)).expect("net");
        assert_eq!(net, i128::from(h.data().ledger.deposit_of(&nominator(n))));
    }
    let gone = nompool_db::queries::bookings::nominator_net(&conn, &nominator(2)).expect("net");
    assert_eq!(gone, 0);
}

#[test]
fn deposit_fee_goes_to_operator() {
    let mut settings = nompool_integration_tests::test_settings();
    settings.deposit_fee = 10;
    let mut h = Harness::with(nompool_integration_tests::test_config(), settings);

    let outcome = h.deposit(1, 1_010);
    let kinds: Vec<_> = outcome.bookings().map(|b| (b.kind, b.address, b.credit)).collect();
    assert_eq!(
        kinds,
        vec![
            (BookingKind::NominatorDeposit, nominator(1), 1_000),
            (BookingKind::DepositFee, OPERATOR, 10),
        ]
    );
    assert_eq!(h.data().ledger.deposit_of(&nominator(1)), 1_000);
    assert_eq!(h.data().validator_amount, 10);
    assert_eq!(h.data().liquid_balance, 1_010);

    // Exactly the fee is not enough.
    let refused = h.send(nominator(2), 10, Operation::Deposit);
    assert_eq!(refused.error_kind(), Some(ErrorKind::InsufficientStake));
}

#[test]
fn pending_withdrawal_cancelled_by_new_deposit() {
    let mut h = Harness::new();
    h.deposit(1, 2_000);
    h.run_round([9; 32], |sent| sent);
    h.commit(OPERATOR, 0, Operation::Stake);
    h.commit(nominator(1), 0, Operation::Withdraw);
    assert!(h.data().withdrawals.contains(&nominator(1)));

    h.deposit(1, 300);
    assert!(h.data().withdrawals.is_empty());
    let entry = h.data().ledger.get(&nominator(1)).copied().expect("entry");
    assert_eq!(entry.deposit, 2_000);
    assert_eq!(entry.pending_deposit, 300);
}

#[test]
fn operator_settles_withdrawals_explicitly() {
    let mut h = Harness::new();
    h.deposit(1, 1_000);
    h.deposit(2, 1_000);

    let refused = h.send(nominator(1), 0, Operation::ProcessWithdrawals);
    assert_eq!(refused.error_kind(), Some(ErrorKind::Unauthorized));

    // Nothing queued: a no-op commit.
    let outcome = h.commit(OPERATOR, 0, Operation::ProcessWithdrawals);
    assert!(outcome.effects().is_empty());

    // Immediate settlement while idle.
    let out = h.commit(nominator(2), 0, Operation::Withdraw);
    assert!(out.effects().contains(&Effect::Transfer {
        to: nominator(2),
        amount: 1_000,
        reason: TransferReason::Withdrawal,
    }));
    assert_eq!(h.data().liquid_balance, 1_000);
}

#[test]
fn full_loss_clears_wiped_nominators() {
    let mut h = Harness::new();
    h.deposit(1, 600);
    h.deposit(2, 600);
    h.commit(OPERATOR, 0, Operation::Stake);
    h.commit(
        ELECTOR,
        0,
        Operation::StakeConfirmed {
            validator_set_hash: [5; 32],
        },
    );
    h.commit(nominator(1), 0, Operation::Withdraw);
    assert_eq!(h.data().nominators_count(), 2);

    h.advance(HELD_FOR);
    h.commit(OPERATOR, 0, Operation::RecoverStake);
    let wiped = h.commit(ELECTOR, 0, Operation::StakeReturned);

    assert!(!wiped.effects().iter().any(|e| matches!(
        e,
        Effect::Transfer {
            reason: TransferReason::Withdrawal,
            ..
        }
    )));
    assert!(!wiped
        .bookings()
        .any(|b| b.kind == BookingKind::NominatorWithdrawal));
    let data = h.data();
    assert_eq!(data.nominators_count(), 0);
    assert!(data.withdrawals.is_empty());
    data.check_conservation().expect("balanced after full loss");

    // The seats are free again and a wiped nominator can rejoin.
    h.deposit(2, 1_000);
    assert_eq!(h.data().ledger.deposit_of(&nominator(2)), 1_000);
    let gone = h.send(nominator(1), 0, Operation::Withdraw);
    assert_eq!(gone.error_kind(), Some(ErrorKind::NotANominator));
}
