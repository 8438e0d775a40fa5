//! Concurrency tests for contended bookings and pack consensus.
//!
//! These verify that under concurrent load exactly one writer wins each
//! contended decision and every loser gets a typed error with its partial
//! effects rolled back.
//!
//! Run with: `cargo test --test concurrency_test`

#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)] // Test code can panic

use chrono::{Duration, Utc};
use packfit_core::availability::AvailabilityLedger;
use packfit_core::error::SchedulingError;
use packfit_core::notify::NotificationKind;
use packfit_core::packs::PackConsensus;
use packfit_core::purchase::PurchaseOrchestrator;
use packfit_core::sessions::SessionLifecycle;
use packfit_core::store::DocumentStore;
use packfit_core::types::{
    ClientId, MeetingStatus, Money, PackageStatus, TemplateId, TemplateSnapshot, TrainerId, UserId,
};
use packfit_testing::TestHarness;

const CONTENDERS: usize = 16;

fn snapshot(total_sessions: u32) -> TemplateSnapshot {
    TemplateSnapshot {
        template_id: TemplateId::new(),
        name: "Endurance Block".to_string(),
        total_sessions,
        session_price: Money::from_cents(3000),
    }
}

#[tokio::test]
async fn concurrent_confirms_of_one_meeting_have_a_single_winner() {
    let harness = TestHarness::new();
    let availability = AvailabilityLedger::new(harness.env.clone());
    let purchase = PurchaseOrchestrator::new(harness.env.clone());
    let sessions = SessionLifecycle::new(harness.env.clone());

    let trainer = TrainerId::new();
    let user = UserId::new();
    let starts_at = Utc::now() + Duration::days(1);
    let slot = availability
        .publish_slot(trainer, starts_at, starts_at + Duration::hours(1))
        .await
        .expect("publish");
    let package = purchase
        .purchase(ClientId::User(user), snapshot(10), trainer)
        .await
        .expect("purchase");
    let meeting_id = sessions
        .propose(trainer, ClientId::User(user), slot, package, String::new())
        .await
        .expect("propose");

    let handles: Vec<_> = (0..CONTENDERS)
        .map(|_| {
            let sessions = sessions.clone();
            tokio::spawn(async move { sessions.confirm(meeting_id).await })
        })
        .collect();

    let mut wins = 0;
    for handle in handles {
        match handle.await.expect("task panicked") {
            Ok(()) => wins += 1,
            Err(
                SchedulingError::SlotAlreadyBooked { .. }
                | SchedulingError::BookingConflict { .. },
            ) => {}
            Err(other) => panic!("unexpected loser error: {other}"),
        }
    }
    assert_eq!(wins, 1, "exactly one confirmation may win");

    let package = harness.packages.get(package).await.unwrap().unwrap().document;
    assert_eq!(package.remaining(), 9, "session consumed exactly once");
    let slot = harness.slots.get(slot).await.unwrap().unwrap().document;
    assert!(slot.booked);
    assert_eq!(slot.meeting_id, Some(meeting_id));
    let meeting = harness.meetings.get(meeting_id).await.unwrap().unwrap().document;
    assert_eq!(meeting.status, MeetingStatus::Scheduled);
}

#[tokio::test]
async fn two_meetings_racing_for_one_slot_leave_the_loser_untouched() {
    let harness = TestHarness::new();
    let availability = AvailabilityLedger::new(harness.env.clone());
    let purchase = PurchaseOrchestrator::new(harness.env.clone());
    let sessions = SessionLifecycle::new(harness.env.clone());

    let trainer = TrainerId::new();
    let user_a = UserId::new();
    let user_b = UserId::new();
    let starts_at = Utc::now() + Duration::days(1);
    let slot = availability
        .publish_slot(trainer, starts_at, starts_at + Duration::hours(1))
        .await
        .expect("publish");
    let package_a = purchase
        .purchase(ClientId::User(user_a), snapshot(5), trainer)
        .await
        .expect("purchase a");
    let package_b = purchase
        .purchase(ClientId::User(user_b), snapshot(5), trainer)
        .await
        .expect("purchase b");
    let meeting_a = sessions
        .propose(trainer, ClientId::User(user_a), slot, package_a, String::new())
        .await
        .expect("propose a");
    let meeting_b = sessions
        .propose(trainer, ClientId::User(user_b), slot, package_b, String::new())
        .await
        .expect("propose b");

    let task_a = {
        let sessions = sessions.clone();
        tokio::spawn(async move { sessions.confirm(meeting_a).await })
    };
    let task_b = {
        let sessions = sessions.clone();
        tokio::spawn(async move { sessions.confirm(meeting_b).await })
    };
    let outcome_a = task_a.await.expect("task a panicked");
    let outcome_b = task_b.await.expect("task b panicked");

    assert_eq!(
        usize::from(outcome_a.is_ok()) + usize::from(outcome_b.is_ok()),
        1,
        "exactly one booking may win the slot"
    );

    let (loser_meeting, loser_package) = if outcome_a.is_ok() {
        (meeting_b, package_b)
    } else {
        (meeting_a, package_a)
    };
    let meeting = harness
        .meetings
        .get(loser_meeting)
        .await
        .unwrap()
        .unwrap()
        .document;
    assert_eq!(meeting.status, MeetingStatus::Proposed, "loser stays proposed");
    let package = harness
        .packages
        .get(loser_package)
        .await
        .unwrap()
        .unwrap()
        .document;
    assert_eq!(package.remaining(), 5, "loser's package must be untouched");
}

#[tokio::test]
async fn last_session_race_rolls_back_the_losing_reservation() {
    let harness = TestHarness::new();
    let availability = AvailabilityLedger::new(harness.env.clone());
    let purchase = PurchaseOrchestrator::new(harness.env.clone());
    let sessions = SessionLifecycle::new(harness.env.clone());

    let trainer = TrainerId::new();
    let user = UserId::new();
    let starts_at = Utc::now() + Duration::days(1);
    let slot_a = availability
        .publish_slot(trainer, starts_at, starts_at + Duration::hours(1))
        .await
        .expect("publish a");
    let slot_b = availability
        .publish_slot(
            trainer,
            starts_at + Duration::hours(2),
            starts_at + Duration::hours(3),
        )
        .await
        .expect("publish b");
    let package = purchase
        .purchase(ClientId::User(user), snapshot(1), trainer)
        .await
        .expect("purchase");
    let meeting_a = sessions
        .propose(trainer, ClientId::User(user), slot_a, package, String::new())
        .await
        .expect("propose a");
    let meeting_b = sessions
        .propose(trainer, ClientId::User(user), slot_b, package, String::new())
        .await
        .expect("propose b");

    let task_a = {
        let sessions = sessions.clone();
        tokio::spawn(async move { sessions.confirm(meeting_a).await })
    };
    let task_b = {
        let sessions = sessions.clone();
        tokio::spawn(async move { sessions.confirm(meeting_b).await })
    };
    let outcome_a = task_a.await.expect("task a panicked");
    let outcome_b = task_b.await.expect("task b panicked");

    assert_eq!(
        usize::from(outcome_a.is_ok()) + usize::from(outcome_b.is_ok()),
        1,
        "the last session goes to exactly one meeting"
    );

    let stored = harness.packages.get(package).await.unwrap().unwrap().document;
    assert_eq!(stored.remaining(), 0);
    assert_eq!(stored.status, PackageStatus::Complete);
    assert_eq!(stored.consumed.len(), 1, "never double-consumed");

    // The loser reserved its slot first and must have released it again.
    let loser_slot = if outcome_a.is_ok() { slot_b } else { slot_a };
    let slot = harness.slots.get(loser_slot).await.unwrap().unwrap().document;
    assert!(!slot.booked, "losing reservation must be rolled back");
    assert_eq!(slot.meeting_id, None);
}

#[tokio::test]
async fn concurrent_cancel_and_confirm_converge_to_a_clean_cancellation() {
    let harness = TestHarness::new();
    let availability = AvailabilityLedger::new(harness.env.clone());
    let purchase = PurchaseOrchestrator::new(harness.env.clone());
    let sessions = SessionLifecycle::new(harness.env.clone());

    let trainer = TrainerId::new();
    let user = UserId::new();
    let starts_at = Utc::now() + Duration::days(1);
    let slot = availability
        .publish_slot(trainer, starts_at, starts_at + Duration::hours(1))
        .await
        .expect("publish");
    let package = purchase
        .purchase(ClientId::User(user), snapshot(5), trainer)
        .await
        .expect("purchase");
    let meeting_id = sessions
        .propose(trainer, ClientId::User(user), slot, package, String::new())
        .await
        .expect("propose");

    let confirm_task = {
        let sessions = sessions.clone();
        tokio::spawn(async move { sessions.confirm(meeting_id).await })
    };
    let cancel_task = {
        let sessions = sessions.clone();
        tokio::spawn(async move { sessions.cancel(meeting_id).await })
    };
    let confirm_outcome = confirm_task.await.expect("confirm task panicked");
    let cancel_outcome = cancel_task.await.expect("cancel task panicked");

    // The cancellation always lands; the confirmation either beat it or
    // lost with a typed conflict.
    cancel_outcome.expect("cancel must succeed");
    if let Err(error) = confirm_outcome {
        assert!(
            matches!(
                error,
                SchedulingError::BookingConflict { .. } | SchedulingError::InvalidTransition { .. }
            ),
            "unexpected confirm error: {error}"
        );
    }

    let meeting = harness.meetings.get(meeting_id).await.unwrap().unwrap().document;
    assert_eq!(meeting.status, MeetingStatus::Cancelled);
    let slot = harness.slots.get(slot).await.unwrap().unwrap().document;
    assert!(!slot.booked, "cancelled booking must free the slot");
    let package = harness.packages.get(package).await.unwrap().unwrap().document;
    assert_eq!(package.remaining(), 5, "cancelled booking must refund the session");
}

#[tokio::test]
async fn concurrent_final_accepts_fire_the_live_fan_out_once() {
    let harness = TestHarness::new();
    let packs = PackConsensus::new(harness.env.clone());

    let owner = UserId::new();
    let invitee_a = UserId::new();
    let invitee_b = UserId::new();
    let pack_id = packs
        .create_pack(owner, vec![invitee_a, invitee_b])
        .await
        .expect("create pack");
    harness.dispatcher.clear();

    let task_a = {
        let packs = packs.clone();
        tokio::spawn(async move { packs.accept(pack_id, invitee_a).await })
    };
    let task_b = {
        let packs = packs.clone();
        tokio::spawn(async move { packs.accept(pack_id, invitee_b).await })
    };
    let became_live_a = task_a.await.expect("task a panicked").expect("accept a");
    let became_live_b = task_b.await.expect("task b panicked").expect("accept b");

    assert!(
        became_live_a ^ became_live_b,
        "exactly one acceptor observes the pack going live"
    );

    let pack = harness.packs.get(pack_id).await.unwrap().unwrap().document;
    assert!(pack.is_live);
    assert_eq!(pack.members.len(), 3);
    assert!(pack.pending_invites.is_empty());

    // The owner hears pack-live exactly once, regardless of who won.
    let live_to_owner = harness
        .dispatcher
        .sent_to(packfit_core::notify::Recipient::User(owner))
        .into_iter()
        .filter(|n| matches!(n.kind, NotificationKind::PackLive { .. }))
        .count();
    assert_eq!(live_to_owner, 1);
}
