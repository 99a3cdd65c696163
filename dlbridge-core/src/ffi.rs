//! C ABI for linking dlbridge-core as a static library from Android (NDK), iOS or other C/C++ hosts.
//! The host supplies the engine as an `EngineVTable` and feeds channel frames through
//! `dlbridge_handle_frame` from its own background queue.

use std::ffi::{c_char, c_void, CStr, CString};
use std::os::raw::c_int;
use std::ptr;
use std::slice;

use crate::dispatch::Dispatcher;
use crate::engine::{Engine, EngineError, EngineResult};
use crate::protocol::{Reply, Response, DEFAULT_CHANNEL, PROTOCOL_VERSION};
use crate::wire;

/// Engine entry points exported by the native engine.
///
/// Status-returning entries give 0 on success. On failure they return non-zero and may set
/// `*err` to a message. Every string written to `out`/`err` (and returned by
/// `ipfs_node_info`) is allocated by the engine and released through `free_string`.
///
/// File content travels as `(ptr, len)` byte buffers so it may contain NUL bytes; buffers
/// written by `get_file_from_ipfs` are released through `free_bytes`.
///
/// The bridge owns `ctx` from a successful `dlbridge_create` (or `VTableEngine::new`)
/// until it calls `release`, exactly once, when the engine is dropped. Tables without a
/// `release` entry leave `ctx` with the host.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct EngineVTable {
    /// Opaque engine state passed back on every call.
    pub ctx: *mut c_void,
    pub start: unsafe extern "C" fn(
        ctx: *mut c_void,
        cfg: *const c_char,
        out_port: *mut i64,
        err: *mut *mut c_char,
    ) -> c_int,
    pub stop: unsafe extern "C" fn(ctx: *mut c_void),
    pub init_ipfs: unsafe extern "C" fn(
        ctx: *mut c_void,
        repo_path: *const c_char,
        out_ok: *mut bool,
        err: *mut *mut c_char,
    ) -> c_int,
    pub start_ipfs: unsafe extern "C" fn(
        ctx: *mut c_void,
        repo_path: *const c_char,
        out_peer_id: *mut *mut c_char,
        err: *mut *mut c_char,
    ) -> c_int,
    pub stop_ipfs: unsafe extern "C" fn(ctx: *mut c_void, err: *mut *mut c_char) -> c_int,
    pub add_file_to_ipfs: unsafe extern "C" fn(
        ctx: *mut c_void,
        content: *const u8,
        content_len: usize,
        out_cid: *mut *mut c_char,
        err: *mut *mut c_char,
    ) -> c_int,
    pub get_file_from_ipfs: unsafe extern "C" fn(
        ctx: *mut c_void,
        cid: *const c_char,
        out_content: *mut *mut u8,
        out_content_len: *mut usize,
        err: *mut *mut c_char,
    ) -> c_int,
    pub ipfs_peer_id: unsafe extern "C" fn(
        ctx: *mut c_void,
        out_peer_id: *mut *mut c_char,
        err: *mut *mut c_char,
    ) -> c_int,
    pub list_directory_from_ipfs: unsafe extern "C" fn(
        ctx: *mut c_void,
        cid: *const c_char,
        out_json: *mut *mut c_char,
        err: *mut *mut c_char,
    ) -> c_int,
    pub start_download_selected: unsafe extern "C" fn(
        ctx: *mut c_void,
        top_cid: *const c_char,
        local_base_path: *const c_char,
        selected_paths_json: *const c_char,
        out_task_id: *mut *mut c_char,
        err: *mut *mut c_char,
    ) -> c_int,
    pub query_download_progress: unsafe extern "C" fn(
        ctx: *mut c_void,
        download_id: *const c_char,
        out_json: *mut *mut c_char,
        err: *mut *mut c_char,
    ) -> c_int,
    pub download_and_save_file: unsafe extern "C" fn(
        ctx: *mut c_void,
        cid: *const c_char,
        local_file_path: *const c_char,
        download_id: *const c_char,
        err: *mut *mut c_char,
    ) -> c_int,
    /// Never fails by contract; failures are embedded in the returned JSON. Null means
    /// the engine could not produce a record at all.
    pub ipfs_node_info: unsafe extern "C" fn(ctx: *mut c_void, cid: *const c_char) -> *mut c_char,
    pub start_http_services: unsafe extern "C" fn(
        ctx: *mut c_void,
        api_port: i64,
        gateway_port: i64,
        out_json: *mut *mut c_char,
        err: *mut *mut c_char,
    ) -> c_int,
    pub stop_http_services: unsafe extern "C" fn(ctx: *mut c_void, err: *mut *mut c_char) -> c_int,
    pub free_string: unsafe extern "C" fn(ctx: *mut c_void, s: *mut c_char),
    pub free_bytes: unsafe extern "C" fn(ctx: *mut c_void, p: *mut u8, len: usize),
    /// Called once when the bridge drops the engine. May be null.
    pub release: Option<unsafe extern "C" fn(ctx: *mut c_void)>,
}

/// [`Engine`] backed by a host-supplied [`EngineVTable`].
pub struct VTableEngine {
    vtable: EngineVTable,
}

// The engine behind the table is called from worker threads; making those calls safe is
// the engine's job.
unsafe impl Send for VTableEngine {}
unsafe impl Sync for VTableEngine {}

impl VTableEngine {
    /// # Safety
    /// Every function pointer must be valid for the lifetime of the returned engine and
    /// `ctx` must stay valid until it is dropped. The engine takes over `ctx`: its
    /// `release` entry, if any, runs on drop.
    pub unsafe fn new(vtable: EngineVTable) -> Self {
        Self { vtable }
    }

    /// Copy the table behind `vtable`. `None` if null.
    ///
    /// # Safety
    /// Same as [`VTableEngine::new`]; `vtable` must point to an initialized table.
    pub unsafe fn from_raw(vtable: *const EngineVTable) -> Option<Self> {
        if vtable.is_null() {
            return None;
        }
        Some(Self::new(*vtable))
    }

    fn free(&self, s: *mut c_char) {
        if !s.is_null() {
            unsafe { (self.vtable.free_string)(self.vtable.ctx, s) };
        }
    }

    fn free_bytes(&self, p: *mut u8, len: usize) {
        if !p.is_null() {
            unsafe { (self.vtable.free_bytes)(self.vtable.ctx, p, len) };
        }
    }

    /// Copy an engine byte buffer holding UTF-8 text and release it. Null reads as empty.
    fn take_bytes(&self, p: *mut u8, len: usize) -> EngineResult<String> {
        if p.is_null() {
            return Ok(String::new());
        }
        let copied = unsafe { slice::from_raw_parts(p, len) }.to_vec();
        self.free_bytes(p, len);
        String::from_utf8(copied).map_err(|_| EngineError::InvalidUtf8)
    }

    /// Copy an engine string and release it. Null reads as empty.
    fn take(&self, s: *mut c_char) -> EngineResult<String> {
        if s.is_null() {
            return Ok(String::new());
        }
        let copied = unsafe { CStr::from_ptr(s) }
            .to_str()
            .map(str::to_string)
            .map_err(|_| EngineError::InvalidUtf8);
        self.free(s);
        copied
    }

    fn status(&self, rc: c_int, err: *mut c_char) -> EngineResult<()> {
        if rc == 0 {
            self.free(err);
            return Ok(());
        }
        let message = self.take(err).unwrap_or_default();
        Err(EngineError::Failed(message))
    }

    /// Run an entry point that writes one output string.
    fn call_out(
        &self,
        f: impl FnOnce(*mut *mut c_char, *mut *mut c_char) -> c_int,
    ) -> EngineResult<String> {
        let mut out: *mut c_char = ptr::null_mut();
        let mut err: *mut c_char = ptr::null_mut();
        let rc = f(&mut out, &mut err);
        match self.status(rc, err) {
            Ok(()) => self.take(out),
            Err(e) => {
                self.free(out);
                Err(e)
            }
        }
    }

    /// Run an entry point that writes nothing but a status.
    fn call_status(&self, f: impl FnOnce(*mut *mut c_char) -> c_int) -> EngineResult<()> {
        let mut err: *mut c_char = ptr::null_mut();
        let rc = f(&mut err);
        self.status(rc, err)
    }
}

impl Drop for VTableEngine {
    fn drop(&mut self) {
        if let Some(release) = self.vtable.release {
            unsafe { release(self.vtable.ctx) }
        }
    }
}

fn c_arg(s: &str) -> EngineResult<CString> {
    CString::new(s).map_err(|_| EngineError::failed("argument contains a NUL byte"))
}

impl Engine for VTableEngine {
    fn start(&self, cfg: &str) -> EngineResult<i64> {
        let cfg = c_arg(cfg)?;
        let mut port = 0i64;
        self.call_status(|err| unsafe {
            (self.vtable.start)(self.vtable.ctx, cfg.as_ptr(), &mut port, err)
        })?;
        Ok(port)
    }

    fn stop(&self) {
        unsafe { (self.vtable.stop)(self.vtable.ctx) }
    }

    fn init_ipfs(&self, repo_path: &str) -> EngineResult<bool> {
        let repo_path = c_arg(repo_path)?;
        let mut ok = false;
        self.call_status(|err| unsafe {
            (self.vtable.init_ipfs)(self.vtable.ctx, repo_path.as_ptr(), &mut ok, err)
        })?;
        Ok(ok)
    }

    fn start_ipfs(&self, repo_path: &str) -> EngineResult<String> {
        let repo_path = c_arg(repo_path)?;
        self.call_out(|out, err| unsafe {
            (self.vtable.start_ipfs)(self.vtable.ctx, repo_path.as_ptr(), out, err)
        })
    }

    fn stop_ipfs(&self) -> EngineResult<()> {
        self.call_status(|err| unsafe { (self.vtable.stop_ipfs)(self.vtable.ctx, err) })
    }

    fn add_file_to_ipfs(&self, content: &str) -> EngineResult<String> {
        self.call_out(|out, err| unsafe {
            (self.vtable.add_file_to_ipfs)(
                self.vtable.ctx,
                content.as_ptr(),
                content.len(),
                out,
                err,
            )
        })
    }

    fn get_file_from_ipfs(&self, cid: &str) -> EngineResult<String> {
        let cid = c_arg(cid)?;
        let mut out: *mut u8 = ptr::null_mut();
        let mut out_len = 0usize;
        let mut err: *mut c_char = ptr::null_mut();
        let rc = unsafe {
            (self.vtable.get_file_from_ipfs)(
                self.vtable.ctx,
                cid.as_ptr(),
                &mut out,
                &mut out_len,
                &mut err,
            )
        };
        match self.status(rc, err) {
            Ok(()) => self.take_bytes(out, out_len),
            Err(e) => {
                self.free_bytes(out, out_len);
                Err(e)
            }
        }
    }

    fn ipfs_peer_id(&self) -> EngineResult<String> {
        self.call_out(|out, err| unsafe { (self.vtable.ipfs_peer_id)(self.vtable.ctx, out, err) })
    }

    fn list_directory_from_ipfs(&self, cid: &str) -> EngineResult<String> {
        let cid = c_arg(cid)?;
        self.call_out(|out, err| unsafe {
            (self.vtable.list_directory_from_ipfs)(self.vtable.ctx, cid.as_ptr(), out, err)
        })
    }

    fn start_download_selected(
        &self,
        top_cid: &str,
        local_base_path: &str,
        selected_paths_json: &str,
    ) -> EngineResult<String> {
        let top_cid = c_arg(top_cid)?;
        let local_base_path = c_arg(local_base_path)?;
        let selected = c_arg(selected_paths_json)?;
        self.call_out(|out, err| unsafe {
            (self.vtable.start_download_selected)(
                self.vtable.ctx,
                top_cid.as_ptr(),
                local_base_path.as_ptr(),
                selected.as_ptr(),
                out,
                err,
            )
        })
    }

    fn query_download_progress(&self, download_id: &str) -> EngineResult<String> {
        let download_id = c_arg(download_id)?;
        self.call_out(|out, err| unsafe {
            (self.vtable.query_download_progress)(self.vtable.ctx, download_id.as_ptr(), out, err)
        })
    }

    fn download_and_save_file(
        &self,
        cid: &str,
        local_file_path: &str,
        download_id: &str,
    ) -> EngineResult<()> {
        let cid = c_arg(cid)?;
        let local_file_path = c_arg(local_file_path)?;
        let download_id = c_arg(download_id)?;
        self.call_status(|err| unsafe {
            (self.vtable.download_and_save_file)(
                self.vtable.ctx,
                cid.as_ptr(),
                local_file_path.as_ptr(),
                download_id.as_ptr(),
                err,
            )
        })
    }

    fn ipfs_node_info(&self, cid: &str) -> EngineResult<String> {
        let cid = c_arg(cid)?;
        let json = unsafe { (self.vtable.ipfs_node_info)(self.vtable.ctx, cid.as_ptr()) };
        if json.is_null() {
            return Err(EngineError::failed("engine returned no node info"));
        }
        self.take(json)
    }

    fn start_http_services(&self, api_port: i64, gateway_port: i64) -> EngineResult<String> {
        self.call_out(|out, err| unsafe {
            (self.vtable.start_http_services)(self.vtable.ctx, api_port, gateway_port, out, err)
        })
    }

    fn stop_http_services(&self) -> EngineResult<()> {
        self.call_status(|err| unsafe { (self.vtable.stop_http_services)(self.vtable.ctx, err) })
    }
}

/// Handle behind the `*mut c_void` given to C hosts.
struct Bridge {
    channel: String,
    dispatcher: Dispatcher<VTableEngine>,
}

/// Returns the current protocol version. Used so the staticlib exports a C symbol and is linkable.
#[no_mangle]
pub extern "C" fn dlbridge_version() -> u8 {
    PROTOCOL_VERSION
}

/// Create a bridge for `channel` (UTF-8, null for the default channel) over `vtable`.
/// The table is copied. Returns opaque handle or null on failure; on null the host keeps
/// `ctx` and `release` is not called.
#[no_mangle]
pub extern "C" fn dlbridge_create(
    channel: *const c_char,
    vtable: *const EngineVTable,
) -> *mut c_void {
    let channel = if channel.is_null() {
        DEFAULT_CHANNEL.to_string()
    } else {
        match unsafe { CStr::from_ptr(channel) }.to_str() {
            Ok(s) => s.to_string(),
            Err(_) => return ptr::null_mut(),
        }
    };
    let Some(engine) = (unsafe { VTableEngine::from_raw(vtable) }) else {
        return ptr::null_mut();
    };
    let bridge = Bridge {
        channel,
        dispatcher: Dispatcher::new(engine),
    };
    Box::into_raw(Box::new(bridge)) as *mut c_void
}

/// Destroy bridge, calling the engine's `release`. No-op if h is null.
#[no_mangle]
pub extern "C" fn dlbridge_destroy(h: *mut c_void) {
    if h.is_null() {
        return;
    }
    let _ = unsafe { Box::from_raw(h as *mut Bridge) };
}

/// Answer one request frame synchronously. Writes the response frame to out_buf.
/// Returns bytes written, or -1 on error (null pointers, bad frame, out_buf too small).
#[no_mangle]
pub extern "C" fn dlbridge_handle_frame(
    h: *mut c_void,
    frame: *const u8,
    frame_len: usize,
    out_buf: *mut u8,
    out_buf_len: usize,
) -> c_int {
    if h.is_null() || frame.is_null() || out_buf.is_null() {
        return -1;
    }
    let bridge = unsafe { &*(h as *const Bridge) };
    let bytes = unsafe { slice::from_raw_parts(frame, frame_len) };
    let (call, _) = match wire::decode_call(bytes) {
        Ok(x) => x,
        Err(_) => return -1,
    };
    let reply = if call.channel == bridge.channel {
        bridge.dispatcher.handle(&call.method, &call.args)
    } else {
        Reply::NotImplemented
    };
    let out = match wire::encode_response(&Response { id: call.id, reply }) {
        Ok(f) => f,
        Err(_) => return -1,
    };
    if out.len() > out_buf_len || out.len() > c_int::MAX as usize {
        return -1;
    }
    unsafe {
        out_buf.copy_from_nonoverlapping(out.as_ptr(), out.len());
    }
    out.len() as c_int
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use crate::protocol::MethodCall;
    use crate::records::NodeInfo;
    use crate::value::{Arguments, Value};

    const LISTING: &str = r#"[{"name":"a","cid":"QmA","type":"file","size":1}]"#;
    const NOT_UTF8: &[u8] = &[0xff, 0xfe, b'x'];

    /// Host-side engine state behind `ctx`.
    #[derive(Default)]
    struct HostEngine {
        fail: bool,
        /// Hand back bytes that are not UTF-8 from file and node-info reads.
        garbled: bool,
        allocated: AtomicUsize,
        freed: AtomicUsize,
        released: AtomicUsize,
        last_arg: Mutex<String>,
        stored: Mutex<Vec<u8>>,
    }

    impl HostEngine {
        fn balanced(&self) -> bool {
            self.allocated.load(Ordering::SeqCst) == self.freed.load(Ordering::SeqCst)
        }
    }

    unsafe fn host<'a>(ctx: *mut c_void) -> &'a HostEngine {
        &*(ctx as *const HostEngine)
    }

    unsafe fn record(ctx: *mut c_void, arg: *const c_char) {
        let h = host(ctx);
        *h.last_arg.lock().unwrap() = CStr::from_ptr(arg).to_str().unwrap().to_string();
    }

    unsafe fn alloc(ctx: *mut c_void, s: &str) -> *mut c_char {
        host(ctx).allocated.fetch_add(1, Ordering::SeqCst);
        CString::new(s).unwrap().into_raw()
    }

    unsafe fn alloc_bytes(ctx: *mut c_void, bytes: &[u8], len: *mut usize) -> *mut u8 {
        host(ctx).allocated.fetch_add(1, Ordering::SeqCst);
        *len = bytes.len();
        Box::into_raw(bytes.to_vec().into_boxed_slice()) as *mut u8
    }

    /// Write `value` to `out`, or fail with a message in `err`.
    unsafe fn answer(
        ctx: *mut c_void,
        value: &str,
        out: *mut *mut c_char,
        err: *mut *mut c_char,
    ) -> c_int {
        if host(ctx).fail {
            *err = alloc(ctx, "engine says no");
            return 1;
        }
        if !out.is_null() {
            *out = alloc(ctx, value);
        }
        0
    }

    unsafe extern "C" fn start(
        ctx: *mut c_void,
        cfg: *const c_char,
        out_port: *mut i64,
        err: *mut *mut c_char,
    ) -> c_int {
        record(ctx, cfg);
        *out_port = 9999;
        answer(ctx, "", ptr::null_mut(), err)
    }
    unsafe extern "C" fn stop(_ctx: *mut c_void) {}
    unsafe extern "C" fn init_ipfs(
        ctx: *mut c_void,
        repo_path: *const c_char,
        out_ok: *mut bool,
        err: *mut *mut c_char,
    ) -> c_int {
        record(ctx, repo_path);
        *out_ok = true;
        answer(ctx, "", ptr::null_mut(), err)
    }
    unsafe extern "C" fn start_ipfs(
        ctx: *mut c_void,
        repo_path: *const c_char,
        out: *mut *mut c_char,
        err: *mut *mut c_char,
    ) -> c_int {
        record(ctx, repo_path);
        answer(ctx, "12D3KooWHost", out, err)
    }
    unsafe extern "C" fn status_only(ctx: *mut c_void, err: *mut *mut c_char) -> c_int {
        answer(ctx, "", ptr::null_mut(), err)
    }
    unsafe extern "C" fn add_file_to_ipfs(
        ctx: *mut c_void,
        content: *const u8,
        content_len: usize,
        out: *mut *mut c_char,
        err: *mut *mut c_char,
    ) -> c_int {
        *host(ctx).stored.lock().unwrap() = slice::from_raw_parts(content, content_len).to_vec();
        answer(ctx, "QmStored", out, err)
    }
    unsafe extern "C" fn get_file_from_ipfs(
        ctx: *mut c_void,
        cid: *const c_char,
        out: *mut *mut u8,
        out_len: *mut usize,
        err: *mut *mut c_char,
    ) -> c_int {
        record(ctx, cid);
        let h = host(ctx);
        if h.fail {
            *err = alloc(ctx, "engine says no");
            return 1;
        }
        let bytes = if h.garbled {
            NOT_UTF8.to_vec()
        } else {
            h.stored.lock().unwrap().clone()
        };
        *out = alloc_bytes(ctx, &bytes, out_len);
        0
    }
    unsafe extern "C" fn one_arg(
        ctx: *mut c_void,
        arg: *const c_char,
        out: *mut *mut c_char,
        err: *mut *mut c_char,
    ) -> c_int {
        record(ctx, arg);
        answer(ctx, LISTING, out, err)
    }
    unsafe extern "C" fn no_arg(
        ctx: *mut c_void,
        out: *mut *mut c_char,
        err: *mut *mut c_char,
    ) -> c_int {
        answer(ctx, "12D3KooWHost", out, err)
    }
    unsafe extern "C" fn start_download_selected(
        ctx: *mut c_void,
        _top_cid: *const c_char,
        _local_base_path: *const c_char,
        selected_paths_json: *const c_char,
        out: *mut *mut c_char,
        err: *mut *mut c_char,
    ) -> c_int {
        record(ctx, selected_paths_json);
        answer(ctx, "task_1", out, err)
    }
    unsafe extern "C" fn download_and_save_file(
        ctx: *mut c_void,
        _cid: *const c_char,
        local_file_path: *const c_char,
        _download_id: *const c_char,
        err: *mut *mut c_char,
    ) -> c_int {
        record(ctx, local_file_path);
        answer(ctx, "", ptr::null_mut(), err)
    }
    unsafe extern "C" fn ipfs_node_info(ctx: *mut c_void, cid: *const c_char) -> *mut c_char {
        record(ctx, cid);
        let h = host(ctx);
        if h.fail {
            return ptr::null_mut();
        }
        if h.garbled {
            h.allocated.fetch_add(1, Ordering::SeqCst);
            return CString::new(NOT_UTF8).unwrap().into_raw();
        }
        alloc(ctx, r#"{"cid":"QmA","type":"file","size":1,"entries":null,"error":""}"#)
    }
    unsafe extern "C" fn start_http_services(
        ctx: *mut c_void,
        _api_port: i64,
        _gateway_port: i64,
        out: *mut *mut c_char,
        err: *mut *mut c_char,
    ) -> c_int {
        answer(ctx, r#"{"success":true,"apiAddr":"","gatewayAddr":""}"#, out, err)
    }
    unsafe extern "C" fn free_string(ctx: *mut c_void, s: *mut c_char) {
        host(ctx).freed.fetch_add(1, Ordering::SeqCst);
        drop(CString::from_raw(s));
    }
    unsafe extern "C" fn free_bytes(ctx: *mut c_void, p: *mut u8, len: usize) {
        host(ctx).freed.fetch_add(1, Ordering::SeqCst);
        drop(Box::from_raw(ptr::slice_from_raw_parts_mut(p, len)));
    }
    unsafe extern "C" fn release(ctx: *mut c_void) {
        host(ctx).released.fetch_add(1, Ordering::SeqCst);
    }

    fn vtable(engine: &HostEngine) -> EngineVTable {
        EngineVTable {
            ctx: engine as *const HostEngine as *mut c_void,
            start,
            stop,
            init_ipfs,
            start_ipfs,
            stop_ipfs: status_only,
            add_file_to_ipfs,
            get_file_from_ipfs,
            ipfs_peer_id: no_arg,
            list_directory_from_ipfs: one_arg,
            start_download_selected,
            query_download_progress: one_arg,
            download_and_save_file,
            ipfs_node_info,
            start_http_services,
            stop_http_services: status_only,
            free_string,
            free_bytes,
            release: Some(release),
        }
    }

    fn roundtrip(h: *mut c_void, call: &MethodCall) -> Response {
        let frame = wire::encode_call(call).unwrap();
        let mut out = vec![0u8; 64 * 1024];
        let n = dlbridge_handle_frame(h, frame.as_ptr(), frame.len(), out.as_mut_ptr(), out.len());
        assert!(n > 0, "handle_frame failed");
        wire::decode_response(&out[..n as usize]).unwrap().0
    }

    fn call(method: &str, args: Arguments) -> MethodCall {
        MethodCall::new(5, DEFAULT_CHANNEL, method, args)
    }

    #[test]
    fn null_inputs_rejected() {
        assert!(dlbridge_create(ptr::null(), ptr::null()).is_null());
        dlbridge_destroy(ptr::null_mut());
        let mut out = [0u8; 16];
        assert_eq!(
            dlbridge_handle_frame(ptr::null_mut(), out.as_ptr(), 0, out.as_mut_ptr(), out.len()),
            -1
        );
    }

    #[test]
    fn non_utf8_channel_name_rejected() {
        let engine = HostEngine::default();
        let table = vtable(&engine);
        let name = CString::new(vec![b'a', 0xff, b'b']).unwrap();
        assert!(dlbridge_create(name.as_ptr(), &table).is_null());
        assert_eq!(engine.released.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn destroy_releases_engine_context() {
        let engine = HostEngine::default();
        let table = vtable(&engine);
        let h = dlbridge_create(ptr::null(), &table);
        assert!(!h.is_null());
        assert_eq!(engine.released.load(Ordering::SeqCst), 0);
        dlbridge_destroy(h);
        assert_eq!(engine.released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn listing_passes_through_vtable() {
        let engine = HostEngine::default();
        let table = vtable(&engine);
        let h = dlbridge_create(ptr::null(), &table);
        assert!(!h.is_null());
        let response = roundtrip(
            h,
            &call("listDirectoryFromIPFS", Arguments::new().with("cid", "QmDir")),
        );
        assert_eq!(response.id, 5);
        assert_eq!(response.reply, Reply::success(LISTING));
        assert_eq!(*engine.last_arg.lock().unwrap(), "QmDir");
        dlbridge_destroy(h);
        assert!(engine.balanced());
    }

    #[test]
    fn file_content_with_nul_survives_round_trip() {
        let engine = HostEngine::default();
        let table = vtable(&engine);
        let h = dlbridge_create(ptr::null(), &table);
        let content = "head\0tail";
        let response = roundtrip(h, &call("addFileToIPFS", Arguments::new().with("content", content)));
        assert_eq!(response.reply, Reply::success("QmStored"));
        assert_eq!(*engine.stored.lock().unwrap(), content.as_bytes());

        let response = roundtrip(h, &call("getFileFromIPFS", Arguments::new().with("cid", "QmStored")));
        assert_eq!(response.reply, Reply::success(content));
        dlbridge_destroy(h);
        assert!(engine.balanced());
    }

    #[test]
    fn nul_in_c_string_argument_never_reaches_engine() {
        let engine = HostEngine::default();
        let table = vtable(&engine);
        let h = dlbridge_create(ptr::null(), &table);
        let response = roundtrip(h, &call("getFileFromIPFS", Arguments::new().with("cid", "Qm\0x")));
        assert_eq!(response.reply.error_code(), Some("IPFS_GET_ERROR"));
        assert_eq!(response.reply.error_message(), Some("argument contains a NUL byte"));
        assert!(engine.last_arg.lock().unwrap().is_empty());
        dlbridge_destroy(h);
    }

    #[test]
    fn non_utf8_engine_output_is_an_engine_error() {
        let engine = HostEngine {
            garbled: true,
            ..Default::default()
        };
        let table = vtable(&engine);
        let h = dlbridge_create(ptr::null(), &table);
        let response = roundtrip(h, &call("getFileFromIPFS", Arguments::new().with("cid", "QmA")));
        assert_eq!(response.reply.error_code(), Some("IPFS_GET_ERROR"));
        assert_eq!(
            response.reply.error_message(),
            Some("engine returned invalid UTF-8")
        );

        let response = roundtrip(h, &call("getIpfsNodeInfo", Arguments::new().with("cid", "QmA")));
        assert!(response.reply.is_success());
        let json = response.reply.value().and_then(Value::as_str).unwrap();
        let info: NodeInfo = serde_json::from_str(json).unwrap();
        assert_eq!(info.cid, "QmA");
        assert_eq!(info.error, "engine returned invalid UTF-8");
        dlbridge_destroy(h);
        assert!(engine.balanced());
    }

    #[test]
    fn selected_paths_reach_engine_as_json() {
        let engine = HostEngine::default();
        let table = vtable(&engine);
        let h = dlbridge_create(ptr::null(), &table);
        let response = roundtrip(
            h,
            &call(
                "startDownloadSelected",
                Arguments::new()
                    .with("topCid", "QmTop")
                    .with("localBasePath", "/data")
                    .with("selectedPaths", vec!["a/b", "c"]),
            ),
        );
        assert_eq!(response.reply, Reply::success("task_1"));
        assert_eq!(*engine.last_arg.lock().unwrap(), r#"["a/b","c"]"#);
        dlbridge_destroy(h);
    }

    #[test]
    fn engine_error_string_becomes_message() {
        let engine = HostEngine {
            fail: true,
            ..Default::default()
        };
        let table = vtable(&engine);
        let h = dlbridge_create(ptr::null(), &table);
        let response = roundtrip(h, &call("startIPFS", Arguments::new().with("repoPath", "/r")));
        assert_eq!(response.reply.error_code(), Some("IPFS_START_ERROR"));
        assert_eq!(response.reply.error_message(), Some("engine says no"));

        let response = roundtrip(h, &call("getFileFromIPFS", Arguments::new().with("cid", "QmA")));
        assert_eq!(response.reply.error_code(), Some("IPFS_GET_ERROR"));
        assert_eq!(response.reply.error_message(), Some("engine says no"));

        let response = roundtrip(h, &call("getIpfsNodeInfo", Arguments::new().with("cid", "QmA")));
        let json = response.reply.value().and_then(Value::as_str).unwrap();
        assert!(json.contains("engine returned no node info"));
        dlbridge_destroy(h);
        assert!(engine.balanced());
    }

    #[test]
    fn scalar_outputs() {
        let engine = HostEngine::default();
        let table = vtable(&engine);
        let h = dlbridge_create(ptr::null(), &table);
        let response = roundtrip(h, &call("start", Arguments::new().with("cfg", "{}")));
        assert_eq!(response.reply, Reply::Success(Value::Int(9999)));
        let response = roundtrip(h, &call("initIPFS", Arguments::new().with("repoPath", "/r")));
        assert_eq!(response.reply, Reply::Success(Value::Bool(true)));
        let response = roundtrip(h, &call("stopHTTPServices", Arguments::new()));
        assert_eq!(response.reply, Reply::Success(Value::Null));
        dlbridge_destroy(h);
    }

    #[test]
    fn other_channel_and_small_buffer() {
        let engine = HostEngine::default();
        let table = vtable(&engine);
        let name = CString::new("my.app/engine").unwrap();
        let h = dlbridge_create(name.as_ptr(), &table);
        let response = roundtrip(h, &call("getIPFSPeerID", Arguments::new()));
        assert!(response.reply.is_not_implemented());

        let frame = wire::encode_call(&MethodCall::new(
            1,
            "my.app/engine",
            "getIPFSPeerID",
            Arguments::new(),
        ))
        .unwrap();
        let mut out = [0u8; 4];
        assert_eq!(
            dlbridge_handle_frame(h, frame.as_ptr(), frame.len(), out.as_mut_ptr(), out.len()),
            -1
        );
        dlbridge_destroy(h);
    }
}
