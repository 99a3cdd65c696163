//! The native engine as an injected capability.
//!
//! One method per channel operation. Structured results are JSON text produced by
//! the engine; the bridge forwards them without decoding. Engines are shared across
//! worker threads and must do their own locking.

/// A failed engine call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    /// The engine reported a failure with this message (may be empty).
    #[error("{0}")]
    Failed(String),
    /// The engine panicked during the call.
    #[error("engine panicked: {0}")]
    Panicked(String),
    /// The engine returned text that is not valid UTF-8.
    #[error("engine returned invalid UTF-8")]
    InvalidUtf8,
}

impl EngineError {
    pub fn failed(message: impl Into<String>) -> Self {
        EngineError::Failed(message.into())
    }

    /// Human-readable message, `None` when the engine gave none.
    pub fn message(&self) -> Option<String> {
        match self {
            EngineError::Failed(m) if m.trim().is_empty() => None,
            other => Some(other.to_string()),
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

/// Entry points of the download / content-addressed storage engine.
pub trait Engine: Send + Sync + 'static {
    /// Start the download service with a JSON config; returns the REST port.
    fn start(&self, cfg: &str) -> EngineResult<i64>;

    fn stop(&self);

    /// Initialize (or reuse) a node repository at `repo_path`.
    fn init_ipfs(&self, repo_path: &str) -> EngineResult<bool>;

    /// Start the node; returns its peer ID.
    fn start_ipfs(&self, repo_path: &str) -> EngineResult<String>;

    fn stop_ipfs(&self) -> EngineResult<()>;

    /// Add `content` as a file; returns its content identifier.
    fn add_file_to_ipfs(&self, content: &str) -> EngineResult<String>;

    fn get_file_from_ipfs(&self, cid: &str) -> EngineResult<String>;

    fn ipfs_peer_id(&self) -> EngineResult<String>;

    /// JSON array of directory entries.
    fn list_directory_from_ipfs(&self, cid: &str) -> EngineResult<String>;

    /// `selected_paths_json` is a JSON array of relative paths. Returns a task ID.
    fn start_download_selected(
        &self,
        top_cid: &str,
        local_base_path: &str,
        selected_paths_json: &str,
    ) -> EngineResult<String>;

    /// JSON progress record for a download ID.
    fn query_download_progress(&self, download_id: &str) -> EngineResult<String>;

    fn download_and_save_file(
        &self,
        cid: &str,
        local_file_path: &str,
        download_id: &str,
    ) -> EngineResult<()>;

    /// JSON node-info record. Engines normally embed their own failures in the
    /// record; an `Err` here is wrapped into one by the dispatcher.
    fn ipfs_node_info(&self, cid: &str) -> EngineResult<String>;

    /// JSON service-status record.
    fn start_http_services(&self, api_port: i64, gateway_port: i64) -> EngineResult<String>;

    fn stop_http_services(&self) -> EngineResult<()>;
}

impl<E: Engine + ?Sized> Engine for std::sync::Arc<E> {
    fn start(&self, cfg: &str) -> EngineResult<i64> {
        (**self).start(cfg)
    }
    fn stop(&self) {
        (**self).stop()
    }
    fn init_ipfs(&self, repo_path: &str) -> EngineResult<bool> {
        (**self).init_ipfs(repo_path)
    }
    fn start_ipfs(&self, repo_path: &str) -> EngineResult<String> {
        (**self).start_ipfs(repo_path)
    }
    fn stop_ipfs(&self) -> EngineResult<()> {
        (**self).stop_ipfs()
    }
    fn add_file_to_ipfs(&self, content: &str) -> EngineResult<String> {
        (**self).add_file_to_ipfs(content)
    }
    fn get_file_from_ipfs(&self, cid: &str) -> EngineResult<String> {
        (**self).get_file_from_ipfs(cid)
    }
    fn ipfs_peer_id(&self) -> EngineResult<String> {
        (**self).ipfs_peer_id()
    }
    fn list_directory_from_ipfs(&self, cid: &str) -> EngineResult<String> {
        (**self).list_directory_from_ipfs(cid)
    }
    fn start_download_selected(
        &self,
        top_cid: &str,
        local_base_path: &str,
        selected_paths_json: &str,
    ) -> EngineResult<String> {
        (**self).start_download_selected(top_cid, local_base_path, selected_paths_json)
    }
    fn query_download_progress(&self, download_id: &str) -> EngineResult<String> {
        (**self).query_download_progress(download_id)
    }
    fn download_and_save_file(
        &self,
        cid: &str,
        local_file_path: &str,
        download_id: &str,
    ) -> EngineResult<()> {
        (**self).download_and_save_file(cid, local_file_path, download_id)
    }
    fn ipfs_node_info(&self, cid: &str) -> EngineResult<String> {
        (**self).ipfs_node_info(cid)
    }
    fn start_http_services(&self, api_port: i64, gateway_port: i64) -> EngineResult<String> {
        (**self).start_http_services(api_port, gateway_port)
    }
    fn stop_http_services(&self) -> EngineResult<()> {
        (**self).stop_http_services()
    }
}
