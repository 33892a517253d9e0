//! Shared fakes for ecsrun integration tests.
//!
//! - [`ScriptedLogStore`] serves a queue of pages (or errors) and records
//!   the cursor of every call. Once the queue is empty it answers with
//!   empty pages that echo the cursor back, like CloudWatch does at the
//!   tail of a stream.
//! - [`ManualScheduler`] holds per-task running/stopped gates that the
//!   test opens (or fails) explicitly, and returns a scripted `RunTask`
//!   output.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use anyhow::{Result, anyhow, bail};
use async_trait::async_trait;
use tokio::sync::watch;

use ecsrun_core::logs::{LogPage, LogRecord, LogStore, LogTarget};
use ecsrun_core::scheduler::{LaunchedTask, RunTaskOutput, RunTaskRequest, Scheduler, TaskCondition};

// ---------------------------------------------------------------------------
// Log store
// ---------------------------------------------------------------------------

enum Scripted {
    Page(LogPage),
    Error(String),
}

/// One recorded `get_events` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedPoll {
    pub target: LogTarget,
    pub cursor: Option<String>,
}

/// Log store that replays scripted responses. Build it with
/// [`ScriptedLogStore::new`].
pub struct ScriptedLogStore {
    script: Mutex<VecDeque<Scripted>>,
    per_stream: Mutex<HashMap<String, VecDeque<Scripted>>>,
    polls: Mutex<Vec<RecordedPoll>>,
    poll_count: watch::Sender<usize>,
}

impl ScriptedLogStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(VecDeque::new()),
            per_stream: Mutex::new(HashMap::new()),
            polls: Mutex::new(Vec::new()),
            poll_count: watch::channel(0).0,
        })
    }

    /// Queue a page of `(timestamp, message)` records for any stream.
    pub fn push_page(&self, records: &[(i64, &str)], next_cursor: Option<&str>) {
        self.script
            .lock()
            .unwrap()
            .push_back(Scripted::Page(page(records, next_cursor)));
    }

    /// Queue a page served only to `log_stream_name`. Per-stream pages are
    /// served before the shared queue.
    pub fn push_page_for(
        &self,
        log_stream_name: &str,
        records: &[(i64, &str)],
        next_cursor: Option<&str>,
    ) {
        self.per_stream
            .lock()
            .unwrap()
            .entry(log_stream_name.to_string())
            .or_default()
            .push_back(Scripted::Page(page(records, next_cursor)));
    }

    /// Queue a failing call.
    pub fn push_error(&self, message: &str) {
        self.script
            .lock()
            .unwrap()
            .push_back(Scripted::Error(message.to_string()));
    }

    /// Every call so far, in order.
    pub fn polls(&self) -> Vec<RecordedPoll> {
        self.polls.lock().unwrap().clone()
    }

    /// The cursor of every call so far, in order.
    pub fn cursors(&self) -> Vec<Option<String>> {
        self.polls().into_iter().map(|p| p.cursor).collect()
    }

    pub fn poll_count(&self) -> usize {
        self.polls.lock().unwrap().len()
    }

    /// Suspend until at least `n` calls have been made.
    pub async fn wait_for_polls(&self, n: usize) {
        let mut rx = self.poll_count.subscribe();
        let _ = rx.wait_for(|c| *c >= n).await;
    }
}

fn page(records: &[(i64, &str)], next_cursor: Option<&str>) -> LogPage {
    LogPage {
        records: records
            .iter()
            .map(|(timestamp, message)| LogRecord::new(*timestamp, *message))
            .collect(),
        next_cursor: next_cursor.map(str::to_string),
    }
}

#[async_trait]
impl LogStore for ScriptedLogStore {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn get_events(&self, target: &LogTarget, cursor: Option<&str>) -> Result<LogPage> {
        let next = self
            .per_stream
            .lock()
            .unwrap()
            .get_mut(&target.log_stream_name)
            .and_then(VecDeque::pop_front)
            .or_else(|| self.script.lock().unwrap().pop_front());
        let calls = {
            let mut polls = self.polls.lock().unwrap();
            polls.push(RecordedPoll {
                target: target.clone(),
                cursor: cursor.map(str::to_string),
            });
            polls.len()
        };
        self.poll_count.send_replace(calls);

        match next {
            Some(Scripted::Page(page)) => Ok(page),
            Some(Scripted::Error(message)) => Err(anyhow!(message)),
            None => Ok(LogPage {
                records: vec![],
                next_cursor: cursor.map(str::to_string),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
enum GateState {
    Pending,
    Open,
    Failed(String),
}

struct TaskGates {
    running: watch::Sender<GateState>,
    stopped: watch::Sender<GateState>,
}

impl TaskGates {
    fn new() -> Self {
        Self {
            running: watch::channel(GateState::Pending).0,
            stopped: watch::channel(GateState::Pending).0,
        }
    }

    fn get(&self, condition: TaskCondition) -> &watch::Sender<GateState> {
        match condition {
            TaskCondition::Running => &self.running,
            TaskCondition::Stopped => &self.stopped,
        }
    }
}

/// Scheduler whose waits resolve only when the test says so.
#[derive(Default)]
pub struct ManualScheduler {
    gates: Mutex<HashMap<String, TaskGates>>,
    outputs: Mutex<VecDeque<RunTaskOutput>>,
    requests: Mutex<Vec<RunTaskRequest>>,
    waits: Mutex<Vec<(TaskCondition, String)>>,
}

impl ManualScheduler {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queue a successful run response for `arn`.
    pub fn push_task_arn(&self, arn: &str) {
        self.push_output(RunTaskOutput {
            tasks: vec![LaunchedTask {
                task_arn: Some(arn.to_string()),
                last_status: Some("PROVISIONING".to_string()),
            }],
            failures: vec![],
        });
    }

    pub fn push_output(&self, output: RunTaskOutput) {
        self.outputs.lock().unwrap().push_back(output);
    }

    /// Run requests received so far.
    pub fn requests(&self) -> Vec<RunTaskRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// `(condition, task_id)` of every wait started so far.
    pub fn waits(&self) -> Vec<(TaskCondition, String)> {
        self.waits.lock().unwrap().clone()
    }

    pub fn release(&self, condition: TaskCondition, task_id: &str) {
        self.set(condition, task_id, GateState::Open);
    }

    pub fn fail(&self, condition: TaskCondition, task_id: &str, message: &str) {
        self.set(condition, task_id, GateState::Failed(message.to_string()));
    }

    pub fn release_running(&self, task_id: &str) {
        self.release(TaskCondition::Running, task_id);
    }

    pub fn release_stopped(&self, task_id: &str) {
        self.release(TaskCondition::Stopped, task_id);
    }

    fn set(&self, condition: TaskCondition, task_id: &str, state: GateState) {
        let mut gates = self.gates.lock().unwrap();
        gates
            .entry(task_id.to_string())
            .or_insert_with(TaskGates::new)
            .get(condition)
            .send_replace(state);
    }

    fn subscribe(&self, condition: TaskCondition, task_id: &str) -> watch::Receiver<GateState> {
        let mut gates = self.gates.lock().unwrap();
        gates
            .entry(task_id.to_string())
            .or_insert_with(TaskGates::new)
            .get(condition)
            .subscribe()
    }
}

#[async_trait]
impl Scheduler for ManualScheduler {
    fn name(&self) -> &str {
        "manual"
    }

    async fn run_task(&self, request: &RunTaskRequest) -> Result<RunTaskOutput> {
        self.requests.lock().unwrap().push(request.clone());
        match self.outputs.lock().unwrap().pop_front() {
            Some(output) => Ok(output),
            None => bail!("no scripted run task output left"),
        }
    }

    async fn wait_for(&self, condition: TaskCondition, _cluster: &str, task_id: &str) -> Result<()> {
        self.waits
            .lock()
            .unwrap()
            .push((condition, task_id.to_string()));

        let mut rx = self.subscribe(condition, task_id);
        let state = rx
            .wait_for(|s| *s != GateState::Pending)
            .await
            .map_err(|_| anyhow!("gate for {task_id} dropped"))?
            .clone();

        match state {
            GateState::Failed(message) => Err(anyhow!(message)),
            _ => Ok(()),
        }
    }
}
