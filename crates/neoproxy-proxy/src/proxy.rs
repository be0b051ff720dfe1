//! MITM proxy server.
//!
//! Binds the listen address up front, then runs hudsucker with a
//! [`FlowHandler`] over one shared [`Interceptor`].

use std::net::SocketAddr;
use std::sync::Arc;

use hudsucker::certificate_authority::RcgenAuthority;
use hudsucker::rustls::crypto::aws_lc_rs::default_provider;
use hudsucker::Proxy;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::task::{JoinError, JoinHandle};

use neoproxy_core::{InterceptConfig, Interceptor};

use crate::ca::CaManager;
use crate::error::{ProxyError, Result};
use crate::handler::FlowHandler;
use crate::DEFAULT_PROXY_PORT;

/// Proxy server configuration.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// Address to bind the proxy to.
    pub addr: SocketAddr,
    /// The CA manager for certificate generation.
    pub ca_manager: CaManager,
    /// Interception settings.
    pub intercept: InterceptConfig,
}

impl ProxyConfig {
    /// Creates a configuration listening on `127.0.0.1:8080` with default
    /// interception settings.
    pub fn new(ca_manager: CaManager) -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], DEFAULT_PROXY_PORT)),
            ca_manager,
            intercept: InterceptConfig::default(),
        }
    }

    /// Sets the listen address.
    pub fn with_addr(mut self, addr: SocketAddr) -> Self {
        self.addr = addr;
        self
    }

    /// Sets the interception settings.
    pub fn with_intercept(mut self, intercept: InterceptConfig) -> Self {
        self.intercept = intercept;
        self
    }
}

/// MITM proxy server running the interception pipeline.
pub struct ProxyServer {
    config: ProxyConfig,
    authority: RcgenAuthority,
    interceptor: Arc<Interceptor>,
}

impl ProxyServer {
    /// Creates a new proxy server, generating the root CA if it is missing.
    pub fn new(config: ProxyConfig) -> Result<Self> {
        let authority = config.ca_manager.ensure_ca()?;
        let interceptor = Arc::new(Interceptor::new(config.intercept.clone()));

        Ok(Self {
            config,
            authority,
            interceptor,
        })
    }

    /// Returns the CA certificate path for user installation.
    pub fn ca_cert_path(&self) -> std::path::PathBuf {
        self.config.ca_manager.cert_path()
    }

    /// Returns the shared interceptor, for reporting.
    pub fn interceptor(&self) -> Arc<Interceptor> {
        Arc::clone(&self.interceptor)
    }

    /// Binds the listen address and starts the proxy in the background.
    ///
    /// Bind and build failures are returned here rather than from the
    /// background task.
    pub async fn start(self) -> Result<ProxyHandle> {
        let requested = self.config.addr;
        let listener = TcpListener::bind(requested)
            .await
            .map_err(|source| ProxyError::Bind {
                addr: requested,
                source,
            })?;
        let addr = listener.local_addr().map_err(|source| ProxyError::Bind {
            addr: requested,
            source,
        })?;

        let handler = FlowHandler::new(Arc::clone(&self.interceptor));
        let proxy = Proxy::builder()
            .with_listener(listener)
            .with_ca(self.authority)
            .with_rustls_connector(default_provider())
            .with_http_handler(handler)
            .build()
            .map_err(|e| ProxyError::Proxy(e.to_string()))?;

        tracing::info!("Starting MITM proxy on {}", addr);
        tracing::info!("CA certificate: {:?}", self.config.ca_manager.cert_path());

        let (shutdown_tx, _) = broadcast::channel::<()>(1);
        let mut shutdown_rx = shutdown_tx.subscribe();

        let handle = tokio::spawn(async move {
            tokio::select! {
                result = proxy.start() => {
                    result.map_err(|e| {
                        tracing::error!("Proxy error: {}", e);
                        ProxyError::Proxy(e.to_string())
                    })
                }
                _ = shutdown_rx.recv() => {
                    tracing::info!("Proxy shutdown signal received");
                    Ok(())
                }
            }
        });

        Ok(ProxyHandle {
            shutdown_tx,
            addr,
            handle,
            interceptor: self.interceptor,
        })
    }
}

fn join_result(joined: std::result::Result<Result<()>, JoinError>) -> Result<()> {
    joined.map_err(|e| ProxyError::Proxy(format!("proxy task failed: {}", e)))?
}

/// Handle for controlling a running proxy server.
pub struct ProxyHandle {
    shutdown_tx: broadcast::Sender<()>,
    addr: SocketAddr,
    handle: JoinHandle<Result<()>>,
    interceptor: Arc<Interceptor>,
}

impl ProxyHandle {
    /// Returns the address the proxy is listening on.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Returns the shared interceptor.
    pub fn interceptor(&self) -> Arc<Interceptor> {
        Arc::clone(&self.interceptor)
    }

    /// Signals the proxy to shut down.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Resolves when the proxy task ends, with the reason it ended.
    ///
    /// The handle must not be waited on again afterwards.
    pub async fn exited(&mut self) -> Result<()> {
        join_result((&mut self.handle).await)
    }

    /// Waits for the proxy to finish.
    pub async fn wait(self) -> Result<()> {
        join_result(self.handle.await)
    }

    /// Shuts down the proxy and waits for it to finish.
    pub async fn stop(self) -> Result<()> {
        self.shutdown();
        self.wait().await
    }
}
