//! Stub engine for tests: counts calls, records arguments, and can be told to fail or panic.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier, Mutex, MutexGuard};

use crate::engine::{Engine, EngineError, EngineResult};
use crate::operation::Method;

pub const STUB_PORT: i64 = 9999;
pub const STUB_PEER_ID: &str = "12D3KooWStubPeer";
pub const STUB_CID: &str = "QmStubAdded";
pub const STUB_FILE_CONTENT: &str = "hello from the stub";
pub const STUB_TASK_ID: &str = "task_1700000000";
pub const STUB_LISTING: &str =
    r#"[{"name":"a.txt","cid":"QmA","type":"file","size":3},{"name":"docs","cid":"QmD","type":"directory","size":0}]"#;
pub const STUB_PROGRESS: &str = r#"{"totalBytes":100,"bytesRetrieved":40,"speedBps":20.0,"elapsedTimeSec":2.0,"isCompleted":false,"hasError":false,"errorMessage":""}"#;
pub const STUB_NODE_INFO: &str =
    r#"{"cid":"QmA","type":"file","size":3,"entries":null,"error":""}"#;
pub const STUB_HTTP_STATUS: &str =
    r#"{"success":true,"apiAddr":"/ip4/0.0.0.0/tcp/5001","gatewayAddr":"/ip4/0.0.0.0/tcp/5002"}"#;

/// How every stub entry point behaves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    Succeed,
    Fail(String),
    Panic(String),
}

/// One recorded engine call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recorded {
    pub method: Method,
    pub args: Vec<String>,
}

#[derive(Debug)]
pub struct StubEngine {
    calls: AtomicUsize,
    mode: Mutex<Mode>,
    listing: Mutex<String>,
    last_call: Mutex<Option<Recorded>>,
    gate: Mutex<Option<Arc<Barrier>>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl Default for StubEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl StubEngine {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            mode: Mutex::new(Mode::Succeed),
            listing: Mutex::new(STUB_LISTING.to_string()),
            last_call: Mutex::new(None),
            gate: Mutex::new(None),
        }
    }

    pub fn failing(message: impl Into<String>) -> Self {
        let stub = Self::new();
        stub.set_mode(Mode::Fail(message.into()));
        stub
    }

    pub fn panicking(message: impl Into<String>) -> Self {
        let stub = Self::new();
        stub.set_mode(Mode::Panic(message.into()));
        stub
    }

    pub fn set_mode(&self, mode: Mode) {
        *lock(&self.mode) = mode;
    }

    /// Replace the JSON text returned by `list_directory_from_ipfs`.
    pub fn set_listing(&self, json: impl Into<String>) {
        *lock(&self.listing) = json.into();
    }

    /// Make every call wait on `barrier` before answering.
    pub fn set_gate(&self, barrier: Arc<Barrier>) {
        *lock(&self.gate) = Some(barrier);
    }

    /// Number of engine entry points invoked so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_call(&self) -> Option<Recorded> {
        lock(&self.last_call).clone()
    }

    fn enter<T>(&self, method: Method, args: &[&str], ok: impl FnOnce() -> T) -> EngineResult<T> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *lock(&self.last_call) = Some(Recorded {
            method,
            args: args.iter().map(|a| a.to_string()).collect(),
        });
        let gate = lock(&self.gate).clone();
        if let Some(barrier) = gate {
            barrier.wait();
        }
        let mode = lock(&self.mode).clone();
        match mode {
            Mode::Succeed => Ok(ok()),
            Mode::Fail(message) => Err(EngineError::Failed(message)),
            Mode::Panic(message) => panic!("{message}"),
        }
    }
}

impl Engine for StubEngine {
    fn start(&self, cfg: &str) -> EngineResult<i64> {
        self.enter(Method::Start, &[cfg], || STUB_PORT)
    }

    fn stop(&self) {
        let _ = self.enter(Method::Stop, &[], || ());
    }

    fn init_ipfs(&self, repo_path: &str) -> EngineResult<bool> {
        self.enter(Method::InitIpfs, &[repo_path], || true)
    }

    fn start_ipfs(&self, repo_path: &str) -> EngineResult<String> {
        self.enter(Method::StartIpfs, &[repo_path], || STUB_PEER_ID.to_string())
    }

    fn stop_ipfs(&self) -> EngineResult<()> {
        self.enter(Method::StopIpfs, &[], || ())
    }

    fn add_file_to_ipfs(&self, content: &str) -> EngineResult<String> {
        self.enter(Method::AddFileToIpfs, &[content], || STUB_CID.to_string())
    }

    fn get_file_from_ipfs(&self, cid: &str) -> EngineResult<String> {
        self.enter(Method::GetFileFromIpfs, &[cid], || {
            STUB_FILE_CONTENT.to_string()
        })
    }

    fn ipfs_peer_id(&self) -> EngineResult<String> {
        self.enter(Method::GetIpfsPeerId, &[], || STUB_PEER_ID.to_string())
    }

    fn list_directory_from_ipfs(&self, cid: &str) -> EngineResult<String> {
        let listing = lock(&self.listing).clone();
        self.enter(Method::ListDirectoryFromIpfs, &[cid], || listing)
    }

    fn start_download_selected(
        &self,
        top_cid: &str,
        local_base_path: &str,
        selected_paths_json: &str,
    ) -> EngineResult<String> {
        self.enter(
            Method::StartDownloadSelected,
            &[top_cid, local_base_path, selected_paths_json],
            || STUB_TASK_ID.to_string(),
        )
    }

    fn query_download_progress(&self, download_id: &str) -> EngineResult<String> {
        self.enter(Method::QueryDownloadProgress, &[download_id], || {
            STUB_PROGRESS.to_string()
        })
    }

    fn download_and_save_file(
        &self,
        cid: &str,
        local_file_path: &str,
        download_id: &str,
    ) -> EngineResult<()> {
        self.enter(
            Method::DownloadAndSaveFile,
            &[cid, local_file_path, download_id],
            || (),
        )
    }

    fn ipfs_node_info(&self, cid: &str) -> EngineResult<String> {
        self.enter(Method::GetIpfsNodeInfo, &[cid], || STUB_NODE_INFO.to_string())
    }

    fn start_http_services(&self, api_port: i64, gateway_port: i64) -> EngineResult<String> {
        let (api, gateway) = (api_port.to_string(), gateway_port.to_string());
        self.enter(Method::StartHttpServices, &[api.as_str(), gateway.as_str()], || {
            STUB_HTTP_STATUS.to_string()
        })
    }

    fn stop_http_services(&self) -> EngineResult<()> {
        self.enter(Method::StopHttpServices, &[], || ())
    }
}
