//! Purchase orchestration tests: package creation, roster enrolment and
//! confirmation fan-out.
//!
//! Run with: `cargo test --test purchase_test`

#![allow(clippy::expect_used, clippy::unwrap_used)] // Test code can use unwrap/expect

use packfit_core::error::SchedulingError;
use packfit_core::notify::{NotificationKind, Recipient};
use packfit_core::packs::PackConsensus;
use packfit_core::purchase::PurchaseOrchestrator;
use packfit_core::store::{DocumentStore, TrainerRoster};
use packfit_core::types::{
    ClientId, Money, PackId, PackageStatus, TemplateId, TemplateSnapshot, TrainerId, UserId,
};
use packfit_testing::mocks::FailingDispatcher;
use packfit_testing::TestHarness;
use std::sync::Arc;

fn snapshot() -> TemplateSnapshot {
    TemplateSnapshot {
        template_id: TemplateId::new(),
        name: "Mobility Block".to_string(),
        total_sessions: 8,
        session_price: Money::from_cents(5500),
    }
}

#[tokio::test]
async fn purchase_creates_the_package_from_the_snapshot() {
    let harness = TestHarness::new();
    let purchase = PurchaseOrchestrator::new(harness.env.clone());
    let trainer = TrainerId::new();
    let user = UserId::new();

    let template = snapshot();
    let package_id = purchase
        .purchase(ClientId::User(user), template.clone(), trainer)
        .await
        .expect("purchase");

    let package = harness.packages.get(package_id).await.unwrap().unwrap().document;
    assert_eq!(package.template_id, template.template_id);
    assert_eq!(package.name, template.name);
    assert_eq!(package.total_sessions, 8);
    assert_eq!(package.session_price, Money::from_cents(5500));
    assert_eq!(package.client, ClientId::User(user));
    assert_eq!(package.trainer_id, trainer);
    assert_eq!(package.status, PackageStatus::Incomplete);
    assert!(package.consumed.is_empty());
}

#[tokio::test]
async fn purchase_enrols_the_buyer_with_the_trainer() {
    let harness = TestHarness::new();
    let purchase = PurchaseOrchestrator::new(harness.env.clone());
    let trainer = TrainerId::new();
    let user = UserId::new();

    purchase
        .purchase(ClientId::User(user), snapshot(), trainer)
        .await
        .expect("purchase");
    assert_eq!(harness.roster.clients_of(trainer).await.unwrap(), vec![user]);

    // A repeat purchase does not duplicate the roster entry.
    purchase
        .purchase(ClientId::User(user), snapshot(), trainer)
        .await
        .expect("second purchase");
    assert_eq!(harness.roster.clients_of(trainer).await.unwrap(), vec![user]);
}

#[tokio::test]
async fn pack_purchase_enrols_every_member_and_notifies_them() {
    let harness = TestHarness::new();
    let packs = PackConsensus::new(harness.env.clone());
    let purchase = PurchaseOrchestrator::new(harness.env.clone());
    let trainer = TrainerId::new();
    let owner = UserId::new();
    let buddy = UserId::new();

    let pack_id = packs.create_pack(owner, vec![buddy]).await.expect("create");
    packs.accept(pack_id, buddy).await.expect("accept");
    harness.dispatcher.clear();

    let package_id = purchase
        .purchase(ClientId::Pack(pack_id), snapshot(), trainer)
        .await
        .expect("purchase");

    let pack = harness.packs.get(pack_id).await.unwrap().unwrap().document;
    assert_eq!(pack.package_id, Some(package_id), "pack points at its package");

    let mut roster = harness.roster.clients_of(trainer).await.unwrap();
    roster.sort();
    let mut expected = vec![owner, buddy];
    expected.sort();
    assert_eq!(roster, expected);

    for member in [owner, buddy] {
        let purchased = harness
            .dispatcher
            .sent_to(Recipient::User(member))
            .into_iter()
            .filter(|n| {
                matches!(
                    n.kind,
                    NotificationKind::PackagePurchased { package_id: id, .. } if id == package_id
                )
            })
            .count();
        assert_eq!(purchased, 1);
    }
    let to_trainer = harness
        .dispatcher
        .sent_to(Recipient::Trainer(trainer))
        .into_iter()
        .filter(|n| matches!(n.kind, NotificationKind::PackagePurchased { .. }))
        .count();
    assert_eq!(to_trainer, 1);
}

#[tokio::test]
async fn purchase_for_an_unknown_pack_writes_nothing() {
    let harness = TestHarness::new();
    let purchase = PurchaseOrchestrator::new(harness.env.clone());

    let result = purchase
        .purchase(ClientId::Pack(PackId::new()), snapshot(), TrainerId::new())
        .await;
    assert!(matches!(result, Err(SchedulingError::PackNotFound(_))));
    assert!(harness.packages.is_empty().await, "no orphaned package");
}

#[tokio::test]
async fn purchase_survives_a_dead_notification_transport() {
    let harness = TestHarness::with_dispatcher_override(Arc::new(FailingDispatcher));
    let purchase = PurchaseOrchestrator::new(harness.env.clone());
    let trainer = TrainerId::new();
    let user = UserId::new();

    let package_id = purchase
        .purchase(ClientId::User(user), snapshot(), trainer)
        .await
        .expect("purchase");
    assert!(harness.packages.get(package_id).await.unwrap().is_some());
    assert_eq!(harness.roster.clients_of(trainer).await.unwrap(), vec![user]);
}
