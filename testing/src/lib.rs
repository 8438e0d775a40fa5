//! # Packfit Testing
//!
//! Testing utilities and mocks for the packfit scheduling core:
//!
//! - [`mocks::FixedClock`]: deterministic time
//! - [`mocks::RecordingDispatcher`]: captures dispatched notifications
//! - [`mocks::FailingDispatcher`]: always-failing sink, for asserting that
//!   dispatch failures never fail a transition
//! - [`mocks::InMemoryRoster`]: trainer roster side table
//! - [`harness::TestHarness`]: a fully wired [`SchedulingEnvironment`] over
//!   fresh in-memory stores, with handles to every mock for inspection

use packfit_core::environment::SchedulingEnvironment;

/// Mock implementations of environment traits.
pub mod mocks {
    use chrono::{DateTime, Utc};
    use packfit_core::environment::Clock;
    use packfit_core::notify::{DispatchError, Notification, NotificationDispatcher, Recipient};
    use packfit_core::store::{StoreError, TrainerRoster};
    use packfit_core::types::{TrainerId, UserId};
    use std::collections::HashMap;
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::Mutex;

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// This function will panic if the hardcoded timestamp fails to parse,
    /// which should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }

    /// Notification sink that records everything it is handed.
    #[derive(Default)]
    pub struct RecordingDispatcher {
        sent: Mutex<Vec<Notification>>,
    }

    impl RecordingDispatcher {
        /// Creates an empty recorder
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Every notification dispatched so far, in order
        ///
        /// # Panics
        ///
        /// Panics if the internal lock was poisoned by a panicking test.
        #[must_use]
        #[allow(clippy::unwrap_used)]
        pub fn sent(&self) -> Vec<Notification> {
            self.sent.lock().unwrap().clone()
        }

        /// Notifications addressed to one receiver
        #[must_use]
        pub fn sent_to(&self, receiver: Recipient) -> Vec<Notification> {
            self.sent()
                .into_iter()
                .filter(|notification| notification.receiver == receiver)
                .collect()
        }

        /// Drop everything recorded so far
        ///
        /// # Panics
        ///
        /// Panics if the internal lock was poisoned by a panicking test.
        #[allow(clippy::unwrap_used)]
        pub fn clear(&self) {
            self.sent.lock().unwrap().clear();
        }
    }

    impl NotificationDispatcher for RecordingDispatcher {
        fn send(
            &self,
            notification: Notification,
        ) -> Pin<Box<dyn Future<Output = Result<(), DispatchError>> + Send + '_>> {
            Box::pin(async move {
                #[allow(clippy::unwrap_used)]
                self.sent.lock().unwrap().push(notification);
                Ok(())
            })
        }
    }

    /// Notification sink that rejects every send.
    ///
    /// For asserting that a failed dispatch never converts a committed
    /// transition into a reported failure.
    #[derive(Debug, Default, Clone, Copy)]
    pub struct FailingDispatcher;

    impl NotificationDispatcher for FailingDispatcher {
        fn send(
            &self,
            notification: Notification,
        ) -> Pin<Box<dyn Future<Output = Result<(), DispatchError>> + Send + '_>> {
            Box::pin(async move {
                Err(DispatchError::SendFailed {
                    receiver: notification.receiver,
                    reason: "transport unavailable".to_string(),
                })
            })
        }
    }

    /// In-memory trainer roster side table.
    #[derive(Default)]
    pub struct InMemoryRoster {
        clients: Mutex<HashMap<TrainerId, Vec<UserId>>>,
    }

    impl InMemoryRoster {
        /// Creates an empty roster
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }
    }

    impl TrainerRoster for InMemoryRoster {
        fn add_client(
            &self,
            trainer_id: TrainerId,
            client_id: UserId,
        ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>> {
            Box::pin(async move {
                #[allow(clippy::unwrap_used)]
                let mut guard = self.clients.lock().unwrap();
                let roster = guard.entry(trainer_id).or_default();
                if !roster.contains(&client_id) {
                    roster.push(client_id);
                }
                Ok(())
            })
        }

        fn clients_of(
            &self,
            trainer_id: TrainerId,
        ) -> Pin<Box<dyn Future<Output = Result<Vec<UserId>, StoreError>> + Send + '_>> {
            Box::pin(async move {
                #[allow(clippy::unwrap_used)]
                let guard = self.clients.lock().unwrap();
                Ok(guard.get(&trainer_id).cloned().unwrap_or_default())
            })
        }
    }
}

/// Pre-wired environments for integration tests.
pub mod harness {
    use super::mocks::{test_clock, InMemoryRoster, RecordingDispatcher};
    use super::SchedulingEnvironment;
    use packfit_core::notify::NotificationDispatcher;
    use packfit_core::types::{AvailabilitySlot, Pack, PurchasedPackage, ScheduledMeeting};
    use packfit_memstore::InMemoryStore;
    use std::sync::Arc;

    /// A fully wired environment over fresh in-memory stores, with handles
    /// to the concrete mocks for inspection.
    pub struct TestHarness {
        /// The wired environment to hand to components
        pub env: SchedulingEnvironment,
        /// Slot store handle
        pub slots: Arc<InMemoryStore<AvailabilitySlot>>,
        /// Package store handle
        pub packages: Arc<InMemoryStore<PurchasedPackage>>,
        /// Meeting store handle
        pub meetings: Arc<InMemoryStore<ScheduledMeeting>>,
        /// Pack store handle
        pub packs: Arc<InMemoryStore<Pack>>,
        /// Roster handle
        pub roster: Arc<InMemoryRoster>,
        /// Recording notification sink handle
        pub dispatcher: Arc<RecordingDispatcher>,
    }

    impl TestHarness {
        /// Wire a fresh harness with the default fixed clock and a
        /// recording dispatcher.
        #[must_use]
        pub fn new() -> Self {
            Self::with_dispatcher(Arc::new(RecordingDispatcher::new()))
        }

        /// Wire a fresh harness whose environment uses the given dispatcher
        /// instead of the recorder.
        ///
        /// The `dispatcher` handle on the returned harness points at an
        /// inert recorder that records nothing, since the environment no
        /// longer routes through it; inspect the override through your own
        /// handle.
        #[must_use]
        pub fn with_dispatcher_override(dispatcher: Arc<dyn NotificationDispatcher>) -> Self {
            let mut harness = Self::new();
            harness.env.dispatcher = dispatcher;
            harness
        }

        fn with_dispatcher(dispatcher: Arc<RecordingDispatcher>) -> Self {
            let slots = Arc::new(InMemoryStore::new());
            let packages = Arc::new(InMemoryStore::new());
            let meetings = Arc::new(InMemoryStore::new());
            let packs = Arc::new(InMemoryStore::new());
            let roster = Arc::new(InMemoryRoster::new());

            let env = SchedulingEnvironment::new(
                Arc::new(test_clock()),
                slots.clone(),
                packages.clone(),
                meetings.clone(),
                packs.clone(),
                roster.clone(),
                dispatcher.clone(),
            );

            Self {
                env,
                slots,
                packages,
                meetings,
                packs,
                roster,
                dispatcher,
            }
        }
    }

    impl Default for TestHarness {
        fn default() -> Self {
            Self::new()
        }
    }
}

/// Install a fmt subscriber writing to the test harness output.
///
/// Safe to call from every test; only the first call installs, later calls
/// are no-ops. Controlled through `RUST_LOG` as usual.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// Re-export commonly used items
pub use harness::TestHarness;
pub use mocks::{test_clock, FixedClock, RecordingDispatcher};
