//! Dispatcher: validated operation in, engine call, channel reply out.
//!
//! One catch-and-translate boundary per call. Returned failures and panics both become
//! the operation's error code; nothing is retried. getIpfsNodeInfo is the exception and
//! always answers with a node-info record, embedding the failure in its `error` field.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use crate::engine::{Engine, EngineError, EngineResult};
use crate::operation::{ErrorCode, Method, Operation, ParseError};
use crate::protocol::Reply;
use crate::records::NodeInfo;
use crate::value::{Arguments, Value};

/// Routes operations to an engine. Holds no state of its own between calls.
pub struct Dispatcher<E> {
    engine: E,
}

impl<E: Engine> Dispatcher<E> {
    pub fn new(engine: E) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Parse and dispatch one call. Unknown methods are not implemented; bad arguments
    /// are rejected with `INVALID_ARGS` before the engine sees anything.
    pub fn handle(&self, method: &str, args: &Arguments) -> Reply {
        match Operation::parse(method, args) {
            Ok(op) => self.dispatch(op),
            Err(ParseError::UnknownMethod(name)) => {
                tracing::debug!(method = %name, "method not implemented");
                Reply::NotImplemented
            }
            Err(err @ ParseError::InvalidArgs { .. }) => {
                tracing::warn!(error = %err, "rejected call with invalid arguments");
                error_reply(ErrorCode::InvalidArgs, err.to_string(), None)
            }
        }
    }

    /// Invoke the engine for an already validated operation.
    pub fn dispatch(&self, op: Operation) -> Reply {
        let method = op.method();
        tracing::debug!(%method, "dispatching to engine");
        match guarded(|| self.invoke(&op)) {
            Ok(value) => Reply::Success(value),
            Err(err) => match &op {
                Operation::GetIpfsNodeInfo { cid } => {
                    tracing::warn!(%method, error = %err, "node info failed, embedding error");
                    let message = err
                        .message()
                        .unwrap_or_else(|| method.fallback_message().to_string());
                    Reply::Success(Value::String(NodeInfo::failed(cid, message).to_json()))
                }
                _ => failure(method, &err),
            },
        }
    }

    fn invoke(&self, op: &Operation) -> EngineResult<Value> {
        let engine = &self.engine;
        Ok(match op {
            Operation::Start { cfg } => Value::Int(engine.start(cfg)?),
            Operation::Stop => {
                engine.stop();
                Value::Null
            }
            Operation::InitIpfs { repo_path } => Value::Bool(engine.init_ipfs(repo_path)?),
            Operation::StartIpfs { repo_path } => Value::String(engine.start_ipfs(repo_path)?),
            Operation::StopIpfs => {
                engine.stop_ipfs()?;
                Value::Null
            }
            Operation::AddFileToIpfs { content } => {
                Value::String(engine.add_file_to_ipfs(content)?)
            }
            Operation::GetFileFromIpfs { cid } => Value::String(engine.get_file_from_ipfs(cid)?),
            Operation::GetIpfsPeerId => Value::String(engine.ipfs_peer_id()?),
            Operation::ListDirectoryFromIpfs { cid } => {
                Value::String(engine.list_directory_from_ipfs(cid)?)
            }
            Operation::StartDownloadSelected {
                top_cid,
                local_base_path,
                selected_paths,
            } => {
                let paths_json = serde_json::to_string(selected_paths)
                    .map_err(|e| EngineError::failed(e.to_string()))?;
                Value::String(engine.start_download_selected(
                    top_cid,
                    local_base_path,
                    &paths_json,
                )?)
            }
            Operation::QueryDownloadProgress { download_id } => {
                Value::String(engine.query_download_progress(download_id)?)
            }
            Operation::DownloadAndSaveFile {
                cid,
                local_file_path,
                download_id,
            } => {
                engine.download_and_save_file(cid, local_file_path, download_id)?;
                Value::Null
            }
            Operation::GetIpfsNodeInfo { cid } => Value::String(engine.ipfs_node_info(cid)?),
            Operation::StartHttpServices {
                api_port,
                gateway_port,
            } => Value::String(engine.start_http_services(*api_port, *gateway_port)?),
            Operation::StopHttpServices => {
                engine.stop_http_services()?;
                Value::Null
            }
        })
    }
}

/// Run an engine call, turning a panic into [`EngineError::Panicked`].
fn guarded<T>(f: impl FnOnce() -> EngineResult<T>) -> EngineResult<T> {
    panic::catch_unwind(AssertUnwindSafe(f))
        .unwrap_or_else(|payload| Err(EngineError::Panicked(panic_message(payload.as_ref()))))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        String::from("unknown panic payload")
    }
}

fn failure(method: Method, err: &EngineError) -> Reply {
    let code = method.failure_code().unwrap_or(ErrorCode::Error);
    tracing::warn!(%method, %code, error = %err, "engine call failed");
    let message = err
        .message()
        .unwrap_or_else(|| method.fallback_message().to_string());
    error_reply(code, message, Some(format!("{err:?}")))
}

fn error_reply(code: ErrorCode, message: String, details: Option<String>) -> Reply {
    Reply::Error {
        code: code.as_str().to_string(),
        message,
        details,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{self, EntryType};
    use crate::testing::{self, Mode, StubEngine};

    fn dispatcher() -> Dispatcher<StubEngine> {
        Dispatcher::new(StubEngine::new())
    }

    /// Arguments that satisfy every required argument of `method`.
    fn full_args(method: Method) -> Arguments {
        method
            .required_args()
            .iter()
            .map(|name| {
                if *name == "selectedPaths" {
                    (*name, Value::from(vec!["a/b", "c"]))
                } else {
                    (*name, Value::from(format!("{name}-value")))
                }
            })
            .collect()
    }

    #[test]
    fn missing_args_never_reach_engine() {
        let d = dispatcher();
        for m in Method::ALL {
            for missing in m.required_args() {
                let mut args = Arguments::new();
                for name in m.required_args().iter().filter(|n| *n != missing) {
                    let full = full_args(m);
                    if let Some(v) = full.get(name) {
                        args.insert(*name, v.clone());
                    }
                }
                let reply = d.handle(m.as_str(), &args);
                assert_eq!(reply.error_code(), Some("INVALID_ARGS"), "{m} without {missing}");
            }
        }
        assert_eq!(d.engine().calls(), 0);
    }

    #[test]
    fn wrong_shape_is_invalid_args() {
        let d = dispatcher();
        let reply = d.handle(
            "startDownloadSelected",
            &Arguments::new()
                .with("topCid", "QmTop")
                .with("localBasePath", "/data")
                .with("selectedPaths", "a/b"),
        );
        assert_eq!(reply.error_code(), Some("INVALID_ARGS"));
        let reply = d.handle("startHTTPServices", &Arguments::new().with("apiPort", "5001"));
        assert_eq!(reply.error_code(), Some("INVALID_ARGS"));
        assert_eq!(d.engine().calls(), 0);
    }

    #[test]
    fn engine_failure_maps_to_operation_code() {
        let d = Dispatcher::new(StubEngine::failing("node exploded"));
        for m in Method::ALL {
            if m == Method::GetIpfsNodeInfo || m == Method::Stop {
                continue;
            }
            let reply = d.handle(m.as_str(), &full_args(m));
            let expected = m.failure_code().unwrap();
            assert_eq!(reply.error_code(), Some(expected.as_str()), "{m}");
            assert_eq!(reply.error_message(), Some("node exploded"), "{m}");
        }
    }

    #[test]
    fn failure_carries_debug_details() {
        let d = Dispatcher::new(StubEngine::failing("repo locked"));
        let reply = d.handle("initIPFS", &Arguments::new().with("repoPath", "/repo"));
        match reply {
            Reply::Error { code, details, .. } => {
                assert_eq!(code, "IPFS_INIT_ERROR");
                assert_eq!(details.as_deref(), Some(r#"Failed("repo locked")"#));
            }
            other => panic!("expected error, got {other:?}"),
        }
    }

    #[test]
    fn empty_failure_uses_fallback_message() {
        let d = Dispatcher::new(StubEngine::failing(""));
        let reply = d.handle("stopIPFS", &Arguments::new());
        assert_eq!(reply.error_code(), Some("IPFS_STOP_ERROR"));
        assert_eq!(reply.error_message(), Some("failed to stop IPFS node"));
    }

    #[test]
    fn panic_is_translated_like_failure() {
        let d = Dispatcher::new(StubEngine::panicking("cgo crashed"));
        let reply = d.handle("addFileToIPFS", &Arguments::new().with("content", "hi"));
        assert_eq!(reply.error_code(), Some("IPFS_ADD_ERROR"));
        assert_eq!(reply.error_message(), Some("engine panicked: cgo crashed"));
        let reply = d.handle("stop", &Arguments::new());
        assert_eq!(reply.error_code(), Some("ERROR"));
    }

    #[test]
    fn stop_failure_is_not_raised() {
        let d = Dispatcher::new(StubEngine::failing("ignored"));
        assert_eq!(d.handle("stop", &Arguments::new()), Reply::Success(Value::Null));
        assert_eq!(d.engine().calls(), 1);
    }

    #[test]
    fn node_info_never_errors() {
        for mode in [
            Mode::Succeed,
            Mode::Fail("IPFS node is not running".into()),
            Mode::Fail(String::new()),
            Mode::Panic("boom".into()),
        ] {
            let d = dispatcher();
            d.engine().set_mode(mode.clone());
            let reply = d.handle("getIpfsNodeInfo", &Arguments::new().with("cid", "QmA"));
            let json = reply
                .value()
                .and_then(Value::as_str)
                .unwrap_or_else(|| panic!("{mode:?}: expected JSON payload, got {reply:?}"));
            let info: records::NodeInfo = serde_json::from_str(json).unwrap();
            assert_eq!(info.cid, "QmA");
            match mode {
                Mode::Succeed => assert!(info.error.is_empty()),
                Mode::Fail(ref m) if !m.is_empty() => {
                    assert_eq!(info.kind, EntryType::Unknown);
                    assert_eq!(info.error, *m);
                }
                Mode::Fail(_) => assert_eq!(info.error, "failed to get IPFS node info"),
                Mode::Panic(_) => assert_eq!(info.error, "engine panicked: boom"),
            }
        }
    }

    #[test]
    fn unknown_method_not_implemented() {
        let d = dispatcher();
        for name in ["", "Start", "deleteEverything", "getIPFSNodeInfo", "start "] {
            assert!(d.handle(name, &Arguments::new()).is_not_implemented(), "{name:?}");
        }
        assert_eq!(d.engine().calls(), 0);
    }

    #[test]
    fn listing_forwarded_verbatim() {
        let d = dispatcher();
        let odd = "[ {\"name\" : \"x\", \"cid\":\"QmX\",\"type\":\"file\",\"size\":1} ]";
        d.engine().set_listing(odd);
        let reply = d.handle("listDirectoryFromIPFS", &Arguments::new().with("cid", "QmDir"));
        assert_eq!(reply, Reply::Success(Value::String(odd.to_string())));
    }

    #[test]
    fn selected_paths_serialized_as_json() {
        let d = dispatcher();
        let reply = d.handle(
            "startDownloadSelected",
            &Arguments::new()
                .with("topCid", "QmTop")
                .with("localBasePath", "/data")
                .with("selectedPaths", vec!["a/b", "c"]),
        );
        assert_eq!(reply, Reply::success(testing::STUB_TASK_ID));
        let call = d.engine().last_call().unwrap();
        assert_eq!(call.method, Method::StartDownloadSelected);
        assert_eq!(call.args, vec!["QmTop", "/data", r#"["a/b","c"]"#]);
    }

    #[test]
    fn success_payload_types() {
        let d = dispatcher();
        assert_eq!(
            d.handle("start", &Arguments::new().with("cfg", "{}")),
            Reply::Success(Value::Int(testing::STUB_PORT))
        );
        assert_eq!(
            d.handle("initIPFS", &Arguments::new().with("repoPath", "/repo")),
            Reply::Success(Value::Bool(true))
        );
        assert_eq!(
            d.handle("getIPFSPeerID", &Arguments::new()),
            Reply::success(testing::STUB_PEER_ID)
        );
        assert_eq!(
            d.handle(
                "downloadAndSaveFile",
                &Arguments::new()
                    .with("cid", "QmA")
                    .with("localFilePath", "/tmp/a")
                    .with("downloadID", "d1"),
            ),
            Reply::Success(Value::Null)
        );
        assert_eq!(
            d.handle("queryDownloadProgress", &Arguments::new().with("downloadID", "d1")),
            Reply::success(testing::STUB_PROGRESS)
        );
    }

    #[test]
    fn http_ports_forwarded() {
        let d = dispatcher();
        let reply = d.handle(
            "startHTTPServices",
            &Arguments::new().with("gatewayPort", 8080i64),
        );
        assert_eq!(reply, Reply::success(testing::STUB_HTTP_STATUS));
        assert_eq!(d.engine().last_call().unwrap().args, vec!["0", "8080"]);
    }
}
