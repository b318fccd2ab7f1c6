#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bobbin_core::impls::InMemoryDocumentStore;
use bobbin_core::ports::Clock;
use bobbin_core::typed::{Handler, JobFailure, Task, TypedJob, TypedRegistry};
use bobbin_core::{JobStorage, StorageBuilder, StorageConnection, StorageOptions};
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Clock that only moves when told to.
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(at: DateTime<Utc>) -> Self {
        Self { now: Mutex::new(at) }
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut now = self.now.lock().unwrap();
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Greet {
    pub name: String,
}

impl Task for Greet {
    const TYPE: &'static str = "test.greet.v1";
}

/// Records every name it greets; fails for "nobody".
#[derive(Clone, Default)]
pub struct GreetHandler {
    pub greeted: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl Handler<Greet> for GreetHandler {
    async fn handle(&self, task: Greet) -> Result<(), JobFailure> {
        if task.name == "nobody" {
            return Err(JobFailure::new("cannot greet nobody"));
        }
        self.greeted.lock().unwrap().push(task.name);
        Ok(())
    }
}

pub struct Harness {
    pub store: Arc<InMemoryDocumentStore>,
    pub clock: Arc<ManualClock>,
    pub greeter: GreetHandler,
    pub storage: JobStorage<TypedRegistry>,
}

impl Harness {
    pub fn new(options: StorageOptions) -> Self {
        let store = Arc::new(InMemoryDocumentStore::new());
        let clock = Arc::new(ManualClock::new(start()));
        let greeter = GreetHandler::default();
        let registry = TypedRegistry::new().with::<Greet, _>(greeter.clone()).unwrap();

        let storage = StorageBuilder::new(store.clone(), registry)
            .options(options)
            .clock(clock.clone())
            .build()
            .unwrap();

        Self {
            store,
            clock,
            greeter,
            storage,
        }
    }

    pub fn connection(&self) -> StorageConnection<TypedRegistry> {
        self.storage.connection()
    }
}

pub fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap()
}

pub fn greet(name: &str) -> TypedJob {
    TypedJob::new(&Greet { name: name.to_string() }).unwrap()
}

/// Create a job greeting `name` and put it on `queue`; returns its id.
pub async fn enqueue_greeting(
    connection: &StorageConnection<TypedRegistry>,
    queue: &str,
    name: &str,
    created_at: DateTime<Utc>,
) -> String {
    let id = connection
        .create_expired_job(&greet(name), HashMap::new(), created_at, chrono::Duration::days(1))
        .await
        .unwrap()
        .to_string();
    assert!(connection.enqueue(&id, queue).await.unwrap());
    id
}
