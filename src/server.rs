//! Web server

use crate::cli;
use crate::error::UsageError;

use std::{net::SocketAddr, path::PathBuf, str::FromStr, time::Duration};

use axum::ServiceExt;
use axum_server::{tls_rustls::RustlsConfig, Handle};
use expanduser::expanduser;
use tokio::signal;
use tracing::{event, Level};

/// Serve the usage statistics service
///
/// Returns once the server has shut down.
///
/// # Arguments
///
/// * `args`: Command line arguments
/// * `service`: The [crate::app::Service] to serve
pub async fn serve(
    args: &cli::CommandLineArgs,
    service: crate::app::Service,
) -> Result<(), UsageError> {
    let address = format!("{}:{}", args.host, args.port);
    let addr = SocketAddr::from_str(&address)
        .map_err(|source| UsageError::ListenAddress { address, source })?;

    // Catch ctrl+c and try to shutdown gracefully
    let handle = Handle::new();
    tokio::spawn(shutdown_signal(
        handle.clone(),
        args.graceful_shutdown_timeout,
    ));

    if args.https {
        let cert_file = resolve_tls_file(&args.cert_file)?;
        let key_file = resolve_tls_file(&args.key_file)?;
        let tls_config = RustlsConfig::from_pem_file(&cert_file, &key_file)
            .await
            .map_err(|source| UsageError::Tls {
                path: cert_file.display().to_string(),
                source,
            })?;
        event!(Level::INFO, "listening on https://{}", addr);
        axum_server::bind_rustls(addr, tls_config)
            .handle(handle)
            .serve(service.into_make_service())
            .await
            .map_err(UsageError::Server)
    } else {
        event!(Level::INFO, "listening on http://{}", addr);
        axum_server::bind(addr)
            .handle(handle)
            .serve(service.into_make_service())
            .await
            .map_err(UsageError::Server)
    }
}

/// Expand `~` in a TLS file path and check that the file exists.
fn resolve_tls_file(path: &str) -> Result<PathBuf, UsageError> {
    let tls_error = |source| UsageError::Tls {
        path: path.to_string(),
        source,
    };
    expanduser(path)
        .map_err(tls_error)?
        .canonicalize()
        .map_err(tls_error)
}

/// Graceful shutdown handler
///
/// Installs signal handlers to catch Ctrl-C or SIGTERM and trigger a graceful shutdown.
async fn shutdown_signal(handle: Handle, timeout: u64) {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            event!(Level::ERROR, "failed to install Ctrl+C handler: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                event!(Level::ERROR, "failed to install SIGTERM handler: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    event!(Level::INFO, "signal received, starting graceful shutdown");
    // Force shutdown if graceful shutdown takes longer than the timeout
    handle.graceful_shutdown(Some(Duration::from_secs(timeout)));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_missing_tls_file() {
        let error = resolve_tls_file("/does/not/exist/cert.pem").unwrap_err();
        assert_eq!(
            "failed to load TLS file /does/not/exist/cert.pem",
            error.to_string()
        );
    }
}
