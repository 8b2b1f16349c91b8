//! Test harness for running the workflow end to end without a network.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tempfile::TempDir;

use easyscan::config::Config;
use easyscan::lookup::{LookupError, TitleSource};
use easyscan::notify::{EmailMessage, Mailer, NotifyError};
use easyscan::session::{MemorySessionStore, SessionState, SessionStore};
use easyscan::transfer::{
    Dispatcher, HandoffFailure, RemoteHandoff, TransferSession, TransferStaging, Transport,
};
use easyscan::workflow::{RequestContext, Response, Workflow, WorkflowServices};
use easyscan::Database;

use super::builders::{AssertionHeaders, ConfigBuilder};

pub const REMOTE_DATA_DIR: &str = "/remote/data";
pub const REMOTE_COUNT_DIR: &str = "/remote/count";
pub const HOST: &str = "library.inst.edu";

/// One file received by the fake remote side.
#[derive(Debug, Clone)]
pub struct RemotePut {
    pub file_name: String,
    pub remote_dir: String,
    pub content: String,
}

#[derive(Default)]
struct TransportState {
    fail_open: bool,
    fail_put_at: Option<usize>,
    remove_local_after_put: bool,
    puts: Vec<RemotePut>,
    put_attempts: usize,
    sessions_opened: usize,
    sessions_closed: usize,
}

/// Fake remote side that records every put and can be told to fail.
#[derive(Clone, Default)]
pub struct RecordingTransport {
    state: Arc<Mutex<TransportState>>,
}

impl RecordingTransport {
    pub fn fail_open(&self, fail: bool) {
        self.state.lock().unwrap().fail_open = fail;
    }

    /// Fails the put with this zero-based index (counted over all sessions).
    pub fn fail_put_at(&self, index: Option<usize>) {
        self.state.lock().unwrap().fail_put_at = index;
    }

    /// Deletes each local file once the remote side has it, so the
    /// following release finds nothing to remove.
    pub fn remove_local_after_put(&self, remove: bool) {
        self.state.lock().unwrap().remove_local_after_put = remove;
    }

    pub fn puts(&self) -> Vec<RemotePut> {
        self.state.lock().unwrap().puts.clone()
    }

    pub fn sessions(&self) -> (usize, usize) {
        let state = self.state.lock().unwrap();
        (state.sessions_opened, state.sessions_closed)
    }
}

#[async_trait::async_trait]
impl Transport for RecordingTransport {
    async fn open(&self) -> Result<Box<dyn TransferSession>, HandoffFailure> {
        let mut state = self.state.lock().unwrap();
        if state.fail_open {
            return Err(HandoffFailure::Connect("connection refused".to_string()));
        }
        state.sessions_opened += 1;
        Ok(Box::new(RecordingSession {
            state: self.state.clone(),
        }))
    }
}

struct RecordingSession {
    state: Arc<Mutex<TransportState>>,
}

#[async_trait::async_trait]
impl TransferSession for RecordingSession {
    async fn put(&mut self, local: &Path, remote_dir: &str) -> Result<(), HandoffFailure> {
        let file_name = local
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mut state = self.state.lock().unwrap();
        let index = state.put_attempts;
        state.put_attempts += 1;
        if state.fail_put_at == Some(index) {
            return Err(HandoffFailure::Transfer {
                file: file_name,
                message: "remote disk full".to_string(),
            });
        }

        let content = std::fs::read_to_string(local).map_err(|e| HandoffFailure::Transfer {
            file: file_name.clone(),
            message: e.to_string(),
        })?;
        state.puts.push(RemotePut {
            file_name,
            remote_dir: remote_dir.to_string(),
            content,
        });
        if state.remove_local_after_put {
            let _ = std::fs::remove_file(local);
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<(), HandoffFailure> {
        self.state.lock().unwrap().sessions_closed += 1;
        Ok(())
    }
}

/// Mailer that keeps messages in memory.
#[derive(Clone, Default)]
pub struct RecordingMailer {
    sent: Arc<Mutex<Vec<EmailMessage>>>,
    fail: Arc<Mutex<bool>>,
}

impl RecordingMailer {
    pub fn fail(&self, fail: bool) {
        *self.fail.lock().unwrap() = fail;
    }

    pub fn sent(&self) -> Vec<EmailMessage> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, message: &EmailMessage) -> Result<(), NotifyError> {
        if *self.fail.lock().unwrap() {
            return Err(NotifyError::Exit {
                status: 75,
                stderr: "temporary failure".to_string(),
            });
        }
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }
}

/// Catalog stand-in: known ids resolve, anything else is a 404.
#[derive(Clone, Default)]
pub struct StaticTitles {
    titles: Arc<Mutex<HashMap<String, String>>>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl StaticTitles {
    pub fn insert(&self, bibnum: &str, title: &str) {
        self.titles
            .lock()
            .unwrap()
            .insert(bibnum.to_string(), title.to_string());
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl TitleSource for StaticTitles {
    async fn title(&self, bibnum: &str) -> Result<String, LookupError> {
        self.calls.lock().unwrap().push(bibnum.to_string());
        self.titles
            .lock()
            .unwrap()
            .get(bibnum)
            .cloned()
            .ok_or(LookupError::Status(404))
    }
}

pub fn list_dir(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}

/// Isolated workflow with fakes for every external collaborator.
pub struct TestHarness {
    temp_dir: TempDir,
    pub staging_dir: PathBuf,
    pub config: Config,
    pub db: Database,
    pub sessions: Arc<MemorySessionStore>,
    pub transport: RecordingTransport,
    pub mailer: RecordingMailer,
    pub titles: StaticTitles,
    pub workflow: Workflow,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_config(|builder| builder)
    }

    /// Harness with extra configuration applied on top of the defaults.
    pub fn with_config(customize: impl FnOnce(ConfigBuilder) -> ConfigBuilder) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let staging_dir = temp_dir.path().join("staging");
        std::fs::create_dir_all(&staging_dir).expect("Failed to create staging dir");

        let config = customize(
            ConfigBuilder::new().staging_directory(&staging_dir.display().to_string()),
        )
        .build();

        let db = Database::open_in_memory().expect("Failed to open database");
        let sessions = Arc::new(MemorySessionStore::from_config(&config.session));
        let transport = RecordingTransport::default();
        let mailer = RecordingMailer::default();
        let titles = StaticTitles::default();

        let dispatcher = Dispatcher::new(
            TransferStaging::new(&staging_dir),
            RemoteHandoff::new(
                Arc::new(transport.clone()),
                REMOTE_DATA_DIR,
                REMOTE_COUNT_DIR,
            ),
            db.clone(),
        );
        let services = WorkflowServices {
            sessions: sessions.clone(),
            titles: Arc::new(titles.clone()),
            db: db.clone(),
            dispatcher: Arc::new(dispatcher),
            mailer: Arc::new(mailer.clone()),
        };
        let workflow = Workflow::new(&config, services).expect("Failed to build workflow");

        Self {
            temp_dir,
            staging_dir,
            config,
            db,
            sessions,
            transport,
            mailer,
            titles,
            workflow,
        }
    }

    pub fn temp_path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Secure request context on the public host.
    pub fn ctx(&self, session_id: &str) -> RequestContext {
        RequestContext::new(session_id, HOST)
            .with_secure(true)
            .with_full_path("/easyscan/request/")
    }

    pub fn session(&self, session_id: &str) -> Option<SessionState> {
        self.sessions.load(session_id)
    }

    pub fn staged_files(&self) -> Vec<String> {
        list_dir(&self.staging_dir)
    }

    /// Arrives at the request page for `barcode` and signs in as the
    /// default valid patron.
    pub async fn sign_in_with_item(&self, session_id: &str, barcode: &str) -> Response {
        let arrival = self
            .ctx(session_id)
            .with_query("barcode", barcode)
            .with_query("title", "Foo");
        self.workflow.request_get(&arrival).await;
        let mut ctx = self.ctx(session_id);
        ctx.headers = AssertionHeaders::valid().build();
        self.workflow.login_callback(&ctx);
        self.workflow.request_get(&self.ctx(session_id)).await
    }
}
