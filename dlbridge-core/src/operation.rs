//! Operations the channel understands, parsed from a method name plus arguments.

use std::fmt;
use std::str::FromStr;

use crate::value::{ArgError, Arguments};

/// Wire method names, one per supported operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Start,
    Stop,
    InitIpfs,
    StartIpfs,
    StopIpfs,
    AddFileToIpfs,
    GetFileFromIpfs,
    GetIpfsPeerId,
    ListDirectoryFromIpfs,
    StartDownloadSelected,
    QueryDownloadProgress,
    DownloadAndSaveFile,
    GetIpfsNodeInfo,
    StartHttpServices,
    StopHttpServices,
}

impl Method {
    pub const ALL: [Method; 15] = [
        Method::Start,
        Method::Stop,
        Method::InitIpfs,
        Method::StartIpfs,
        Method::StopIpfs,
        Method::AddFileToIpfs,
        Method::GetFileFromIpfs,
        Method::GetIpfsPeerId,
        Method::ListDirectoryFromIpfs,
        Method::StartDownloadSelected,
        Method::QueryDownloadProgress,
        Method::DownloadAndSaveFile,
        Method::GetIpfsNodeInfo,
        Method::StartHttpServices,
        Method::StopHttpServices,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Method::Start => "start",
            Method::Stop => "stop",
            Method::InitIpfs => "initIPFS",
            Method::StartIpfs => "startIPFS",
            Method::StopIpfs => "stopIPFS",
            Method::AddFileToIpfs => "addFileToIPFS",
            Method::GetFileFromIpfs => "getFileFromIPFS",
            Method::GetIpfsPeerId => "getIPFSPeerID",
            Method::ListDirectoryFromIpfs => "listDirectoryFromIPFS",
            Method::StartDownloadSelected => "startDownloadSelected",
            Method::QueryDownloadProgress => "queryDownloadProgress",
            Method::DownloadAndSaveFile => "downloadAndSaveFile",
            Method::GetIpfsNodeInfo => "getIpfsNodeInfo",
            Method::StartHttpServices => "startHTTPServices",
            Method::StopHttpServices => "stopHTTPServices",
        }
    }

    /// Arguments that must be present for this method.
    pub fn required_args(self) -> &'static [&'static str] {
        match self {
            Method::Start => &["cfg"],
            Method::InitIpfs | Method::StartIpfs => &["repoPath"],
            Method::AddFileToIpfs => &["content"],
            Method::GetFileFromIpfs | Method::ListDirectoryFromIpfs | Method::GetIpfsNodeInfo => {
                &["cid"]
            }
            Method::StartDownloadSelected => &["topCid", "localBasePath", "selectedPaths"],
            Method::QueryDownloadProgress => &["downloadID"],
            Method::DownloadAndSaveFile => &["cid", "localFilePath", "downloadID"],
            Method::Stop
            | Method::StopIpfs
            | Method::GetIpfsPeerId
            | Method::StartHttpServices
            | Method::StopHttpServices => &[],
        }
    }

    /// Code reported when the engine call fails. `None` for getIpfsNodeInfo, which
    /// always answers with a record.
    pub fn failure_code(self) -> Option<ErrorCode> {
        match self {
            Method::Start | Method::Stop => Some(ErrorCode::Error),
            Method::InitIpfs => Some(ErrorCode::IpfsInitError),
            Method::StartIpfs => Some(ErrorCode::IpfsStartError),
            Method::StopIpfs => Some(ErrorCode::IpfsStopError),
            Method::AddFileToIpfs => Some(ErrorCode::IpfsAddError),
            Method::GetFileFromIpfs => Some(ErrorCode::IpfsGetError),
            Method::GetIpfsPeerId => Some(ErrorCode::IpfsPeerIdError),
            Method::ListDirectoryFromIpfs => Some(ErrorCode::IpfsListError),
            Method::StartDownloadSelected => Some(ErrorCode::IpfsDownloadStartError),
            Method::QueryDownloadProgress => Some(ErrorCode::IpfsQueryProgressError),
            Method::DownloadAndSaveFile => Some(ErrorCode::IpfsDownloadSaveError),
            Method::GetIpfsNodeInfo => None,
            Method::StartHttpServices => Some(ErrorCode::HttpServicesStartError),
            Method::StopHttpServices => Some(ErrorCode::HttpServicesStopError),
        }
    }

    /// Message used when the engine fails without saying why.
    pub fn fallback_message(self) -> &'static str {
        match self {
            Method::Start => "failed to start download service",
            Method::Stop => "failed to stop download service",
            Method::InitIpfs => "failed to initialize IPFS repository",
            Method::StartIpfs => "failed to start IPFS node",
            Method::StopIpfs => "failed to stop IPFS node",
            Method::AddFileToIpfs => "failed to add file to IPFS",
            Method::GetFileFromIpfs => "failed to get file from IPFS",
            Method::GetIpfsPeerId => "failed to get IPFS peer ID",
            Method::ListDirectoryFromIpfs => "failed to list directory",
            Method::StartDownloadSelected => "failed to start download task",
            Method::QueryDownloadProgress => "failed to query download progress",
            Method::DownloadAndSaveFile => "failed to download and save file",
            Method::GetIpfsNodeInfo => "failed to get IPFS node info",
            Method::StartHttpServices => "failed to start HTTP services",
            Method::StopHttpServices => "failed to stop HTTP services",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Method::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| ParseError::UnknownMethod(s.to_string()))
    }
}

/// Flat error taxonomy reported to the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    InvalidArgs,
    Error,
    IpfsInitError,
    IpfsStartError,
    IpfsStopError,
    IpfsAddError,
    IpfsGetError,
    IpfsPeerIdError,
    IpfsListError,
    IpfsDownloadStartError,
    IpfsQueryProgressError,
    IpfsDownloadSaveError,
    HttpServicesStartError,
    HttpServicesStopError,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::InvalidArgs => "INVALID_ARGS",
            ErrorCode::Error => "ERROR",
            ErrorCode::IpfsInitError => "IPFS_INIT_ERROR",
            ErrorCode::IpfsStartError => "IPFS_START_ERROR",
            ErrorCode::IpfsStopError => "IPFS_STOP_ERROR",
            ErrorCode::IpfsAddError => "IPFS_ADD_ERROR",
            ErrorCode::IpfsGetError => "IPFS_GET_ERROR",
            ErrorCode::IpfsPeerIdError => "IPFS_PEERID_ERROR",
            ErrorCode::IpfsListError => "IPFS_LIST_ERROR",
            ErrorCode::IpfsDownloadStartError => "IPFS_DOWNLOAD_START_ERROR",
            ErrorCode::IpfsQueryProgressError => "IPFS_QUERY_PROGRESS_ERROR",
            ErrorCode::IpfsDownloadSaveError => "IPFS_DOWNLOAD_SAVE_ERROR",
            ErrorCode::HttpServicesStartError => "HTTP_SERVICES_START_ERROR",
            ErrorCode::HttpServicesStopError => "HTTP_SERVICES_STOP_ERROR",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated operation with its typed arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Start {
        cfg: String,
    },
    Stop,
    InitIpfs {
        repo_path: String,
    },
    StartIpfs {
        repo_path: String,
    },
    StopIpfs,
    AddFileToIpfs {
        content: String,
    },
    GetFileFromIpfs {
        cid: String,
    },
    GetIpfsPeerId,
    ListDirectoryFromIpfs {
        cid: String,
    },
    StartDownloadSelected {
        top_cid: String,
        local_base_path: String,
        selected_paths: Vec<String>,
    },
    QueryDownloadProgress {
        download_id: String,
    },
    DownloadAndSaveFile {
        cid: String,
        local_file_path: String,
        download_id: String,
    },
    GetIpfsNodeInfo {
        cid: String,
    },
    StartHttpServices {
        api_port: i64,
        gateway_port: i64,
    },
    StopHttpServices,
}

/// Why a call could not be turned into an [`Operation`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("method `{0}` is not implemented")]
    UnknownMethod(String),
    #[error("{method}: {source}")]
    InvalidArgs {
        method: Method,
        #[source]
        source: ArgError,
    },
}

impl Operation {
    /// Parse a method name and its arguments. Every required argument is checked
    /// before anything is returned, so an `Operation` is always complete.
    pub fn parse(method: &str, args: &Arguments) -> Result<Operation, ParseError> {
        let method: Method = method.parse()?;
        Self::from_method(method, args).map_err(|source| ParseError::InvalidArgs { method, source })
    }

    fn from_method(method: Method, args: &Arguments) -> Result<Operation, ArgError> {
        let s = |name: &str| args.string(name).map(str::to_string);
        Ok(match method {
            Method::Start => Operation::Start { cfg: s("cfg")? },
            Method::Stop => Operation::Stop,
            Method::InitIpfs => Operation::InitIpfs {
                repo_path: s("repoPath")?,
            },
            Method::StartIpfs => Operation::StartIpfs {
                repo_path: s("repoPath")?,
            },
            Method::StopIpfs => Operation::StopIpfs,
            Method::AddFileToIpfs => Operation::AddFileToIpfs {
                content: s("content")?,
            },
            Method::GetFileFromIpfs => Operation::GetFileFromIpfs { cid: s("cid")? },
            Method::GetIpfsPeerId => Operation::GetIpfsPeerId,
            Method::ListDirectoryFromIpfs => Operation::ListDirectoryFromIpfs { cid: s("cid")? },
            Method::StartDownloadSelected => Operation::StartDownloadSelected {
                top_cid: s("topCid")?,
                local_base_path: s("localBasePath")?,
                selected_paths: args.string_list("selectedPaths")?,
            },
            Method::QueryDownloadProgress => Operation::QueryDownloadProgress {
                download_id: s("downloadID")?,
            },
            Method::DownloadAndSaveFile => Operation::DownloadAndSaveFile {
                cid: s("cid")?,
                local_file_path: s("localFilePath")?,
                download_id: s("downloadID")?,
            },
            Method::GetIpfsNodeInfo => Operation::GetIpfsNodeInfo { cid: s("cid")? },
            Method::StartHttpServices => Operation::StartHttpServices {
                api_port: args.optional_int("apiPort", 0)?,
                gateway_port: args.optional_int("gatewayPort", 0)?,
            },
            Method::StopHttpServices => Operation::StopHttpServices,
        })
    }

    pub fn method(&self) -> Method {
        match self {
            Operation::Start { .. } => Method::Start,
            Operation::Stop => Method::Stop,
            Operation::InitIpfs { .. } => Method::InitIpfs,
            Operation::StartIpfs { .. } => Method::StartIpfs,
            Operation::StopIpfs => Method::StopIpfs,
            Operation::AddFileToIpfs { .. } => Method::AddFileToIpfs,
            Operation::GetFileFromIpfs { .. } => Method::GetFileFromIpfs,
            Operation::GetIpfsPeerId => Method::GetIpfsPeerId,
            Operation::ListDirectoryFromIpfs { .. } => Method::ListDirectoryFromIpfs,
            Operation::StartDownloadSelected { .. } => Method::StartDownloadSelected,
            Operation::QueryDownloadProgress { .. } => Method::QueryDownloadProgress,
            Operation::DownloadAndSaveFile { .. } => Method::DownloadAndSaveFile,
            Operation::GetIpfsNodeInfo { .. } => Method::GetIpfsNodeInfo,
            Operation::StartHttpServices { .. } => Method::StartHttpServices,
            Operation::StopHttpServices => Method::StopHttpServices,
        }
    }
}
