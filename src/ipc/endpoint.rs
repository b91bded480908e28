//! Discovery of the IPC endpoint exposed by the running Discord client

use log::{debug, trace};
use std::path::{Path, PathBuf};

use crate::error::{DiscordIpcError, Result};
use crate::ipc::protocol::{constants, IpcConfig};

/// Which endpoint a client should connect to
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PipeConfig {
    /// Scan the usual locations and take the first live endpoint
    #[default]
    Auto,
    /// Scan the usual locations, accepting only `discord-ipc-<n>`
    Index(u8),
    /// Connect to this exact socket or pipe path, without scanning
    CustomPath(String),
}

/// Transport family of an endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointKind {
    UnixSocket,
    WindowsPipe,
}

/// A resolved IPC endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub kind: EndpointKind,
    pub path: PathBuf,
    pub pipe_index: Option<u8>,
}

impl Endpoint {
    /// An endpoint of the platform's native kind
    pub fn native(path: impl Into<PathBuf>, pipe_index: Option<u8>) -> Self {
        let kind = if cfg!(windows) {
            EndpointKind::WindowsPipe
        } else {
            EndpointKind::UnixSocket
        };
        Self {
            kind,
            path: path.into(),
            pipe_index,
        }
    }
}

#[cfg(unix)]
const SUBFOLDERS: &[&str] = &[
    "",
    "snap.discord",
    "app/com.discordapp.Discord",
    "app/com.discordapp.DiscordCanary",
];

/// Ordered directories to scan, read from the process environment
pub fn candidate_directories() -> Vec<PathBuf> {
    #[cfg(unix)]
    {
        // SAFETY: getuid has no preconditions and cannot fail
        let uid = unsafe { libc::getuid() };
        candidate_directories_with(|key| std::env::var(key).ok(), Some(uid))
    }

    #[cfg(windows)]
    {
        vec![PathBuf::from(r"\\.\pipe\")]
    }
}

/// Ordered directories to scan, with the environment supplied by the caller
///
/// The runtime directory is `XDG_RUNTIME_DIR`, else `/run/user/<uid>` when
/// it exists, else the temp directory. Each is tried flat and under the
/// snap and Flatpak subfolders.
#[cfg(unix)]
pub fn candidate_directories_with<F>(lookup: F, uid: Option<u32>) -> Vec<PathBuf>
where
    F: Fn(&str) -> Option<String>,
{
    let non_empty = |key: &str| lookup(key).filter(|value| !value.is_empty());

    let runtime_dir = non_empty("XDG_RUNTIME_DIR")
        .map(PathBuf::from)
        .or_else(|| {
            uid.map(|uid| PathBuf::from(format!("/run/user/{}", uid)))
                .filter(|dir| dir.is_dir())
        })
        .unwrap_or_else(|| {
            ["TMPDIR", "TMP", "TEMP"]
                .iter()
                .find_map(|key| non_empty(key))
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("/tmp"))
        });

    SUBFOLDERS
        .iter()
        .map(|sub| {
            if sub.is_empty() {
                runtime_dir.clone()
            } else {
                runtime_dir.join(sub)
            }
        })
        .collect()
}

/// Resolve the endpoint described by `config`
pub fn resolve(config: &IpcConfig) -> Result<Endpoint> {
    match &config.pipe {
        PipeConfig::CustomPath(path) => {
            debug!("Using custom IPC path {}", path);
            Ok(Endpoint::native(path, None))
        }
        PipeConfig::Auto => resolve_in(&candidate_directories(), None, config.max_sockets),
        PipeConfig::Index(index) => {
            resolve_in(&candidate_directories(), Some(*index), config.max_sockets)
        }
    }
}

/// Scan `dirs` in order for a live `discord-ipc-<n>` endpoint
///
/// Entries are probed in ascending index order; the first that accepts a
/// connection wins. Stale socket files fail the probe and are skipped.
pub fn resolve_in(dirs: &[PathBuf], index: Option<u8>, max_sockets: u8) -> Result<Endpoint> {
    for dir in dirs {
        for (slot, path) in matching_entries(dir, index, max_sockets) {
            let endpoint = Endpoint::native(path, Some(slot));
            if probe(&endpoint) {
                debug!("Found live Discord IPC endpoint {}", endpoint.path.display());
                return Ok(endpoint);
            }
            trace!("Skipping stale endpoint {}", endpoint.path.display());
        }
    }

    debug!("No live Discord IPC endpoint in {} candidate directories", dirs.len());
    Err(DiscordIpcError::EndpointNotFound)
}

fn matching_entries(dir: &Path, index: Option<u8>, max_sockets: u8) -> Vec<(u8, PathBuf)> {
    let wanted = |slot: u8| slot < max_sockets && index.map_or(true, |index| index == slot);

    let listing = match std::fs::read_dir(dir) {
        Ok(listing) => listing,
        Err(err) => {
            trace!("Cannot list {}: {}", dir.display(), err);
            return fallback_entries(dir, &wanted);
        }
    };

    let mut entries: Vec<(u8, PathBuf)> = listing
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| {
            let slot = parse_slot(&entry.file_name().to_string_lossy())?;
            Some((slot, entry_path(dir, slot, entry.path())))
        })
        .filter(|(slot, _)| wanted(*slot))
        .collect();
    entries.sort_by_key(|(slot, _)| *slot);
    entries
}

fn parse_slot(name: &str) -> Option<u8> {
    name.strip_prefix(constants::IPC_SOCKET_PREFIX)?.parse().ok()
}

#[cfg(unix)]
fn entry_path(_dir: &Path, _slot: u8, listed: PathBuf) -> PathBuf {
    listed
}

#[cfg(windows)]
fn entry_path(_dir: &Path, slot: u8, _listed: PathBuf) -> PathBuf {
    PathBuf::from(format!(
        r"\\?\pipe\{}{}",
        constants::IPC_SOCKET_PREFIX,
        slot
    ))
}

#[cfg(unix)]
fn fallback_entries(_dir: &Path, _wanted: &dyn Fn(u8) -> bool) -> Vec<(u8, PathBuf)> {
    Vec::new()
}

// Listing the pipe namespace is not always permitted; try the slots directly.
#[cfg(windows)]
fn fallback_entries(dir: &Path, wanted: &dyn Fn(u8) -> bool) -> Vec<(u8, PathBuf)> {
    (0..constants::MAX_IPC_SOCKETS)
        .filter(|slot| wanted(*slot))
        .map(|slot| (slot, entry_path(dir, slot, PathBuf::new())))
        .collect()
}

/// Connect to `endpoint` and immediately close the connection
pub fn probe(endpoint: &Endpoint) -> bool {
    #[cfg(unix)]
    {
        std::os::unix::net::UnixStream::connect(&endpoint.path).is_ok()
    }

    #[cfg(windows)]
    {
        std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .open(&endpoint.path)
            .is_ok()
    }
}
