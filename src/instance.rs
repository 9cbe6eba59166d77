//! Keeps one running instance per user. A second launch hands its start-up
//! message to the first one and exits.

use anyhow::Result;
use std::path::Path;
#[cfg(unix)]
use std::path::PathBuf;
use tracing::{debug, warn};

pub const APP_IS_RUNNING: &str = "app_is_running";

pub enum Acquire {
    Primary(InstanceListener),
    AlreadyRunning,
}

pub struct InstanceListener {
    #[cfg(unix)]
    inner: Option<(std::os::unix::net::UnixListener, PathBuf)>,
}

#[cfg(unix)]
pub fn acquire(socket_path: &Path) -> Result<Acquire> {
    use std::io::Write;
    use std::os::unix::net::{UnixListener, UnixStream};

    if let Ok(mut stream) = UnixStream::connect(socket_path) {
        stream.write_all(APP_IS_RUNNING.as_bytes())?;
        return Ok(Acquire::AlreadyRunning);
    }

    // Nobody answered: whatever is left at the path is stale.
    if socket_path.exists() {
        std::fs::remove_file(socket_path)?;
    }
    if let Some(parent) = socket_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let listener = UnixListener::bind(socket_path)?;
    listener.set_nonblocking(true)?;
    debug!(path = %socket_path.display(), "listening for other instances");

    Ok(Acquire::Primary(InstanceListener {
        inner: Some((listener, socket_path.to_path_buf())),
    }))
}

#[cfg(not(unix))]
pub fn acquire(_socket_path: &Path) -> Result<Acquire> {
    Ok(Acquire::Primary(InstanceListener {}))
}

impl InstanceListener {
    /// Messages sent by other instances since the last call.
    #[cfg(unix)]
    pub fn poll_messages(&self) -> Vec<String> {
        use std::io::{ErrorKind, Read};
        use std::time::Duration;

        let Some((listener, _)) = self.inner.as_ref() else {
            return Vec::new();
        };

        let mut messages = Vec::new();
        loop {
            match listener.accept() {
                Ok((mut stream, _)) => {
                    let mut message = String::new();
                    let read = stream
                        .set_nonblocking(false)
                        .and_then(|_| stream.set_read_timeout(Some(Duration::from_millis(200))))
                        .and_then(|_| stream.read_to_string(&mut message));
                    match read {
                        Ok(_) => messages.push(message.trim().to_string()),
                        Err(e) => warn!(error = %e, "could not read instance message"),
                    }
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) => {
                    warn!(error = %e, "instance socket accept failed");
                    break;
                }
            }
        }
        messages
    }

    #[cfg(not(unix))]
    pub fn poll_messages(&self) -> Vec<String> {
        Vec::new()
    }

    pub fn release(&mut self) {
        #[cfg(unix)]
        if let Some((listener, path)) = self.inner.take() {
            drop(listener);
            if let Err(e) = std::fs::remove_file(&path) {
                warn!(error = %e, path = %path.display(), "could not remove instance socket");
            }
        }
    }
}

impl Drop for InstanceListener {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn second_instance_reaches_the_first() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tui-rss.sock");

        let Acquire::Primary(mut listener) = acquire(&path).unwrap() else {
            panic!("first instance must become primary");
        };
        assert!(listener.poll_messages().is_empty());

        assert!(matches!(acquire(&path).unwrap(), Acquire::AlreadyRunning));
        assert_eq!(listener.poll_messages(), vec![APP_IS_RUNNING.to_string()]);

        listener.release();
        assert!(!path.exists());
    }

    #[test]
    fn stale_socket_is_replaced() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tui-rss.sock");
        std::fs::write(&path, b"").unwrap();

        assert!(matches!(acquire(&path).unwrap(), Acquire::Primary(_)));
    }
}
