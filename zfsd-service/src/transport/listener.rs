// SPDX-License-Identifier: GPL-3.0-only

use std::fs::{self, Permissions};
use std::net::SocketAddr;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use anyhow::{Context, Result, bail};
use axum::Router;
use tokio::net::{TcpListener, UnixListener};
use tokio::signal::unix::{SignalKind, signal};
use tracing::{debug, error, info, warn};

use crate::config::ListenAddress;

/// Serve `router` until SIGINT or SIGTERM
pub async fn serve(router: Router, address: &ListenAddress, socket_mode: u32) -> Result<()> {
    match address {
        ListenAddress::Tcp(addr) => {
            let listener = TcpListener::bind(addr)
                .await
                .with_context(|| format!("Failed to bind {addr}"))?;
            info!("Listening on http://{}", listener.local_addr()?);

            axum::serve(
                listener,
                router.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        }
        ListenAddress::Unix(path) => {
            let listener = bind_unix(path, socket_mode)?;
            info!("Listening on unix socket {}", path.display());

            let served = axum::serve(listener, router)
                .with_graceful_shutdown(shutdown_signal())
                .await;
            remove_socket(path);
            served?;
        }
    }

    Ok(())
}

/// Bind a unix socket, replacing a stale socket file left by a previous run
pub fn bind_unix(path: &Path, mode: u32) -> Result<UnixListener> {
    if std::os::unix::net::UnixStream::connect(path).is_ok() {
        bail!("Another daemon is already listening on {}", path.display());
    }

    if path.exists() {
        fs::remove_file(path)
            .with_context(|| format!("Failed to remove stale socket {}", path.display()))?;
        debug!("Removed stale socket {}", path.display());
    }

    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let listener = UnixListener::bind(path)
        .with_context(|| format!("Failed to bind {}", path.display()))?;
    fs::set_permissions(path, Permissions::from_mode(mode))
        .with_context(|| format!("Failed to set permissions on {}", path.display()))?;

    Ok(listener)
}

fn remove_socket(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => debug!("Removed socket {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove socket {}: {e}", path.display()),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    let terminate = async {
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, draining connections...");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use zfsd_contracts::RequestId;

    fn socket_path() -> PathBuf {
        std::env::temp_dir()
            .join(format!("zfsd-test-{}", RequestId::new()))
            .join("zfsd.sock")
    }

    #[tokio::test]
    async fn bind_applies_mode_and_replaces_stale_file() {
        let path = socket_path();
        let parent = path.parent().expect("parent").to_path_buf();
        fs::create_dir_all(&parent).expect("create dir");
        fs::write(&path, b"stale").expect("stale file");

        let listener = bind_unix(&path, 0o600).expect("bind");
        let mode = fs::metadata(&path).expect("metadata").permissions().mode();
        assert_eq!(mode & 0o777, 0o600);

        drop(listener);
        remove_socket(&path);
        assert!(!path.exists());
        let _ = fs::remove_dir_all(parent);
    }

    #[tokio::test]
    async fn bind_refuses_socket_in_use() {
        let path = socket_path();
        let listener = bind_unix(&path, 0o700).expect("first bind");

        assert!(bind_unix(&path, 0o700).is_err());
        assert!(path.exists());

        drop(listener);
        remove_socket(&path);
        if let Some(parent) = path.parent() {
            let _ = fs::remove_dir_all(parent);
        }
    }
}
