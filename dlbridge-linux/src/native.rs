//! Load the native engine from a shared library exporting an `EngineVTable` getter.

use std::path::{Path, PathBuf};

use dlbridge_core::{Engine, EngineResult, EngineVTable, VTableEngine};
use libloading::{Library, Symbol};

/// Signature of the exported getter, e.g. `dlbridge_engine_vtable`.
type VTableGetter = unsafe extern "C" fn() -> *const EngineVTable;

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: libloading::Error,
    },
    #[error("symbol {symbol}: {source}")]
    Symbol {
        symbol: String,
        #[source]
        source: libloading::Error,
    },
    #[error("{symbol} returned a null vtable")]
    NullVTable { symbol: String },
}

/// Engine backed by a loaded library. The library stays mapped while this lives.
pub struct NativeEngine {
    // Declared before the library so it drops first.
    engine: VTableEngine,
    _library: Library,
}

/// Open `path` and fetch the engine table through `symbol`.
pub fn load(path: &Path, symbol: &str) -> Result<NativeEngine, LoadError> {
    let library = unsafe { Library::new(path) }.map_err(|source| LoadError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let vtable = unsafe {
        let getter: Symbol<VTableGetter> =
            library
                .get(symbol.as_bytes())
                .map_err(|source| LoadError::Symbol {
                    symbol: symbol.to_string(),
                    source,
                })?;
        getter()
    };
    let engine = unsafe { VTableEngine::from_raw(vtable) }.ok_or_else(|| LoadError::NullVTable {
        symbol: symbol.to_string(),
    })?;
    tracing::info!(path = %path.display(), symbol, "native engine loaded");
    Ok(NativeEngine {
        engine,
        _library: library,
    })
}

impl Engine for NativeEngine {
    fn start(&self, cfg: &str) -> EngineResult<i64> {
        self.engine.start(cfg)
    }

    fn stop(&self) {
        self.engine.stop()
    }

    fn init_ipfs(&self, repo_path: &str) -> EngineResult<bool> {
        self.engine.init_ipfs(repo_path)
    }

    fn start_ipfs(&self, repo_path: &str) -> EngineResult<String> {
        self.engine.start_ipfs(repo_path)
    }

    fn stop_ipfs(&self) -> EngineResult<()> {
        self.engine.stop_ipfs()
    }

    fn add_file_to_ipfs(&self, content: &str) -> EngineResult<String> {
        self.engine.add_file_to_ipfs(content)
    }

    fn get_file_from_ipfs(&self, cid: &str) -> EngineResult<String> {
        self.engine.get_file_from_ipfs(cid)
    }

    fn ipfs_peer_id(&self) -> EngineResult<String> {
        self.engine.ipfs_peer_id()
    }

    fn list_directory_from_ipfs(&self, cid: &str) -> EngineResult<String> {
        self.engine.list_directory_from_ipfs(cid)
    }

    fn start_download_selected(
        &self,
        top_cid: &str,
        local_base_path: &str,
        selected_paths_json: &str,
    ) -> EngineResult<String> {
        self.engine
            .start_download_selected(top_cid, local_base_path, selected_paths_json)
    }

    fn query_download_progress(&self, download_id: &str) -> EngineResult<String> {
        self.engine.query_download_progress(download_id)
    }

    fn download_and_save_file(
        &self,
        cid: &str,
        local_file_path: &str,
        download_id: &str,
    ) -> EngineResult<()> {
        self.engine
            .download_and_save_file(cid, local_file_path, download_id)
    }

    fn ipfs_node_info(&self, cid: &str) -> EngineResult<String> {
        self.engine.ipfs_node_info(cid)
    }

    fn start_http_services(&self, api_port: i64, gateway_port: i64) -> EngineResult<String> {
        self.engine.start_http_services(api_port, gateway_port)
    }

    fn stop_http_services(&self) -> EngineResult<()> {
        self.engine.stop_http_services()
    }
}
