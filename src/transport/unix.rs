use std::ffi::OsString;
use std::io;
use std::os::unix::fs::FileTypeExt;
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};

use tokio::net::{UnixListener, UnixStream};

/// Connect to a Unix socket endpoint.
pub async fn connect(path: &Path) -> io::Result<UnixStream> {
    UnixStream::connect(path).await
}

/// Sibling lock file guarding the socket at `path`: `<path>.lock`.
pub fn lock_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".lock");
    PathBuf::from(name)
}

/// Exclusive advisory lock on [`lock_path`] for a socket path.
///
/// Every receiver holds one from before bind until its socket file is
/// removed, so a socket file whose lock can be taken has no live receiver.
/// The lock file itself is left in place; only the lock is released.
#[derive(Debug)]
pub struct SocketLock {
    _file: tokio::fs::File,
    path: PathBuf,
}

impl SocketLock {
    /// The lock file path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Take the lock for the socket at `path` without blocking.
///
/// Fails with `AddrInUse` while another receiver holds it.
pub async fn lock(path: &Path) -> io::Result<SocketLock> {
    let lock_path = lock_path(path);
    let file = tokio::fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(false)
        .open(&lock_path)
        .await?;

    // SAFETY: the descriptor is owned by `file`, which outlives the call.
    let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
    if rc != 0 {
        let err = io::Error::last_os_error();
        if err.kind() == io::ErrorKind::WouldBlock {
            return Err(io::Error::new(
                io::ErrorKind::AddrInUse,
                format!("{} is held by another receiver", path.display()),
            ));
        }
        return Err(err);
    }

    tracing::debug!(path = %lock_path.display(), "socket lock acquired");
    Ok(SocketLock {
        _file: file,
        path: lock_path,
    })
}

/// Bind a Unix listener at `path` under a held [`SocketLock`].
///
/// Fails with `AddrInUse` if anything already exists at `path`. On success the
/// returned listener owns the socket file and the lock, removes the file when
/// dropped, then releases the lock.
pub fn listen(path: &Path, lock: SocketLock) -> io::Result<SocketListener> {
    let listener = UnixListener::bind(path)?;
    tracing::debug!(path = %path.display(), "socket bound");
    Ok(SocketListener {
        listener,
        path: path.to_path_buf(),
        _lock: lock,
    })
}

/// Remove a leftover socket file at `path`.
///
/// Holding `_lock` proves no live receiver owns the path, so the file is
/// removed without connecting to it. Returns `Ok(true)` if a socket file was
/// removed. Anything that is not a socket is left alone and returns `Ok(false)`.
pub async fn reclaim_stale(path: &Path, _lock: &SocketLock) -> io::Result<bool> {
    match tokio::fs::symlink_metadata(path).await {
        Ok(meta) if meta.file_type().is_socket() => {}
        // Absent, or not a socket: never ours to remove.
        _ => return Ok(false),
    }
    match tokio::fs::remove_file(path).await {
        Ok(()) => {
            tracing::info!(path = %path.display(), "removed stale socket");
            Ok(true)
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// A bound Unix listener that removes its socket file on drop.
#[derive(Debug)]
pub struct SocketListener {
    listener: UnixListener,
    path: PathBuf,
    // Dropped after the socket file is removed.
    _lock: SocketLock,
}

impl SocketListener {
    /// Accept a single connection.
    pub async fn accept(&self) -> io::Result<UnixStream> {
        let (stream, _addr) = self.listener.accept().await?;
        tracing::debug!(path = %self.path.display(), "accepted connection");
        Ok(stream)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for SocketListener {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!(path = %self.path.display(), "socket removed"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(
                path = %self.path.display(),
                error = %e,
                "failed to remove socket"
            ),
        }
    }
}
