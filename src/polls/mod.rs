use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::db::store::PollStore;

pub mod admission;
pub mod lifecycle;
pub mod tally;
pub mod validate;
pub mod view;

pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Entry point for every poll and vote operation.
///
/// All writes to the store go through here: poll mutations through the lifecycle methods,
/// ballots through [`PollService::cast`]. The caller's identity is always passed in
/// explicitly.
pub struct PollService {
    store: Arc<dyn PollStore>,
    clock: Clock,
}

impl PollService {
    pub fn new(store: Arc<dyn PollStore>) -> Self {
        Self {
            store,
            clock: Arc::new(Utc::now),
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn store(&self) -> &dyn PollStore {
        self.store.as_ref()
    }

    fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use std::sync::{Arc, Mutex};

    use chrono::{DateTime, Duration, Utc};

    use super::{Clock, PollService};
    use crate::db::memory::MemoryStore;
    use crate::db::schema::SelectionType;
    use crate::polls::lifecycle::CreatePoll;

    /// A clock tests can move forward.
    #[derive(Clone)]
    pub struct TestClock(Arc<Mutex<DateTime<Utc>>>);

    impl TestClock {
        pub fn new() -> Self {
            Self(Arc::new(Mutex::new(Utc::now())))
        }

        pub fn advance(&self, by: Duration) {
            let mut now = self.0.lock().unwrap();
            *now = *now + by;
        }

        pub fn now(&self) -> DateTime<Utc> {
            *self.0.lock().unwrap()
        }

        pub fn as_clock(&self) -> Clock {
            let inner = self.0.clone();
            Arc::new(move || *inner.lock().unwrap())
        }
    }

    pub fn service() -> (PollService, Arc<MemoryStore>, TestClock) {
        let store = Arc::new(MemoryStore::new());
        let clock = TestClock::new();
        let service = PollService::new(store.clone()).with_clock(clock.as_clock());

        (service, store, clock)
    }

    pub fn texts(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    pub fn lunch(clock: &TestClock, allowed: i64, selection_type: SelectionType) -> CreatePoll {
        CreatePoll {
            question: "Lunch?".to_owned(),
            options: texts(&["Pizza", "Sushi", "Tacos"]),
            allowed_selections: allowed,
            selection_type,
            time_end: clock.now() + Duration::hours(1),
        }
    }
}
