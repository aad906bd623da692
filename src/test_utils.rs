//! Shared test fixtures, a fake task executor, and proptest generators.

use std::collections::BTreeSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use proptest::prelude::*;
use tokio::sync::mpsc;

use crate::store::{self, MemoryStore, ObjectStore, StoreError, Watch};
use crate::types::{
    Cluster, ClusterMember, ClusterSpec, Kind, Object, ObjectKey, Task, TaskResult, TaskSpec,
};
use crate::worker::{Trigger, WorkerMessage};

pub const TOKEN: &str = "j04n3m.octy8zely83cy2ts";
pub const HASH: &str = "sha256:84938d2a22203a8e56a787ec0c6ddad7bc7dbd52ebabc62fd5f4dbea72b14d1f";

/// Tail of a real `kubeadm init` run.
pub fn init_output() -> String {
    format!(
        "Your Kubernetes master has initialized successfully!\n\
         \n\
         You can now join any number of machines by running the following on each node\n\
         as root:\n\
         \n\
         \x20 kubeadm join 192.168.0.200:6443 --token {TOKEN} --discovery-token-ca-cert-hash {HASH}\n\
         \n"
    )
}

pub fn cluster_key() -> ObjectKey {
    ObjectKey::new("infra", "prod")
}

pub fn cluster_spec(controllers: &[(&str, &str)], workers: &[(&str, &str)]) -> ClusterSpec {
    fn members(list: &[(&str, &str)]) -> Vec<ClusterMember> {
        list.iter()
            .map(|(name, ip)| ClusterMember::new(*name, *ip))
            .collect()
    }
    ClusterSpec {
        controllers: members(controllers),
        workers: members(workers),
        default_ssh_key_secret: "ssh-key".to_string(),
        version: "v1.13.1".to_string(),
    }
}

/// One controller `c1`, no workers.
pub fn single_controller_spec() -> ClusterSpec {
    cluster_spec(&[("c1", "192.168.0.200")], &[])
}

pub async fn create_cluster<S: ObjectStore>(
    store: &S,
    key: &ObjectKey,
    spec: ClusterSpec,
) -> Cluster {
    store
        .create(Object::from(Cluster::new(key, spec)))
        .await
        .unwrap()
        .into_cluster()
        .unwrap()
}

pub async fn read_cluster<S: ObjectStore>(store: &S, key: &ObjectKey) -> Cluster {
    store::get_cluster(store, key).await.unwrap().unwrap()
}

/// Every task in the store, in kind then key order.
pub async fn all_tasks<S: ObjectStore>(store: &S) -> Vec<Task> {
    let mut tasks = Vec::new();
    for kind in Kind::TASKS {
        for object in store.list(kind).await.unwrap() {
            tasks.push(object.into_task().unwrap());
        }
    }
    tasks
}

/// Plays the executor: records a completed result on a task.
pub async fn complete_task<S: ObjectStore>(store: &S, kind: Kind, key: &ObjectKey, output: &str) {
    let mut task = store::get_task(store, kind, key).await.unwrap().unwrap();
    assert!(task.record_result(TaskResult::done(output)));
    store.update(Object::from(task)).await.unwrap();
}

/// Plays the executor for a whole bootstrap: completes the init command with
/// [`init_output`] and every FactFile with `content of <path>`.
pub async fn complete_bootstrap<S: ObjectStore>(store: &S) {
    for task in all_tasks(store).await {
        match &task.spec {
            TaskSpec::Command(command) if command.command.starts_with("kubeadm init") => {
                complete_task(store, Kind::Command, &task.key(), &init_output()).await;
            }
            TaskSpec::FactFile(file) => {
                let content = format!("content of {}", file.path);
                complete_task(store, Kind::FactFile, &task.key(), &content).await;
            }
            _ => {}
        }
    }
}

/// Identities of tasks, for comparing store contents across passes.
pub fn task_ids(tasks: &[Task]) -> BTreeSet<(Kind, String)> {
    tasks
        .iter()
        .map(|task| (task.kind(), task.name().to_string()))
        .collect()
}

pub fn arb_ipv4() -> impl Strategy<Value = String> {
    (any::<u8>(), any::<u8>(), any::<u8>(), 1u8..255)
        .prop_map(|(a, b, c, d)| format!("{a}.{b}.{c}.{d}"))
}

/// A cluster spec with 1-3 controllers and 0-3 workers, member names unique.
pub fn arb_cluster_spec() -> impl Strategy<Value = ClusterSpec> {
    (
        prop::collection::btree_set("[a-z][a-z0-9]{0,8}", 1..7),
        prop::collection::vec(arb_ipv4(), 7),
        1usize..4,
        "v1\\.1[0-9]\\.[0-9]",
    )
        .prop_map(|(names, ips, controllers, version)| {
            let mut members: Vec<ClusterMember> = names
                .into_iter()
                .zip(ips)
                .map(|(name, ip)| ClusterMember::new(name, ip))
                .collect();
            let workers = members.split_off(controllers.min(members.len()));
            ClusterSpec {
                controllers: members,
                workers,
                default_ssh_key_secret: "ssh-key".to_string(),
                version,
            }
        })
}

/// Arbitrary captured file content.
pub fn arb_fact_content() -> impl Strategy<Value = String> {
    "[A-Za-z0-9+/=\n-]{1,64}"
}

/// A [`MemoryStore`] with scripted faults.
///
/// Every knob starts disabled, so a fresh `FaultyStore` behaves exactly like
/// the store it wraps.
#[derive(Default)]
pub struct FaultyStore {
    pub inner: MemoryStore,

    /// Cluster reads left that report the cluster as missing.
    pub hidden_cluster_reads: AtomicUsize,

    /// Receives a trigger each time a cluster read is hidden, as a watch
    /// would for a cluster recreated right after that read.
    pub on_hidden_read: Mutex<Option<mpsc::Sender<WorkerMessage>>>,

    /// Task creates left that fail with an IO error.
    pub failing_creates: AtomicUsize,

    /// Task reads report nothing while task creates report `AlreadyExists`,
    /// as if another writer always got there first.
    pub racing_creates: AtomicBool,

    /// Task creates attempted, including failed ones.
    pub create_attempts: AtomicUsize,
}

impl FaultyStore {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Decrements `counter` if it is positive. True if it was.
fn take_one(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

impl ObjectStore for FaultyStore {
    async fn get(&self, kind: Kind, key: &ObjectKey) -> store::Result<Option<Object>> {
        if kind == Kind::Cluster && take_one(&self.hidden_cluster_reads) {
            if let Some(tx) = self.on_hidden_read.lock().unwrap().as_ref() {
                let _ = tx.try_send(WorkerMessage::Reconcile(Trigger::ClusterChanged));
            }
            return Ok(None);
        }
        if kind.is_task() && self.racing_creates.load(Ordering::SeqCst) {
            return Ok(None);
        }
        self.inner.get(kind, key).await
    }

    async fn list(&self, kind: Kind) -> store::Result<Vec<Object>> {
        self.inner.list(kind).await
    }

    async fn create(&self, object: Object) -> store::Result<Object> {
        if object.kind().is_task() {
            self.create_attempts.fetch_add(1, Ordering::SeqCst);
            if take_one(&self.failing_creates) {
                return Err(StoreError::Io(std::io::Error::other("injected create failure")));
            }
            if self.racing_creates.load(Ordering::SeqCst) {
                return Err(StoreError::AlreadyExists {
                    kind: object.kind(),
                    key: object.key(),
                });
            }
        }
        self.inner.create(object).await
    }

    async fn update(&self, object: Object) -> store::Result<Object> {
        self.inner.update(object).await
    }

    async fn delete(&self, kind: Kind, key: &ObjectKey) -> store::Result<bool> {
        self.inner.delete(kind, key).await
    }

    fn watch(&self, kinds: &[Kind]) -> Watch {
        self.inner.watch(kinds)
    }
}
