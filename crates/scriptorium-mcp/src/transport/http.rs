//! Streamable HTTP listener.
//!
//! One path serves MCP with stateful sessions. Every request first passes
//! the bearer gate. `localhost` binds both loopback interfaces; anything
//! else must be a literal IP address.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, TcpListener};
use std::sync::Arc;
use std::time::Duration;

use axum::{Router, middleware};
use rmcp::transport::streamable_http_server::{
    StreamableHttpServerConfig, StreamableHttpService, session::local::LocalSessionManager,
};
use scriptorium_editor::EditorHandle;
use tokio_util::sync::CancellationToken;
use url::{Host, Url};

use super::tls::{TlsError, TlsMaterial};
use crate::EditorMcp;
use crate::auth::{AuthGate, require_bearer};
use crate::config::HttpConfig;

/// How long in-flight requests get once shutdown starts.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    #[error("Invalid URL '{url}': {source}")]
    Url {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("Unsupported scheme '{0}', expected http or https")]
    Scheme(String),
    #[error("URL '{0}' has no host")]
    NoHost(String),
    #[error("Host '{0}' is neither a loopback name nor an IP address")]
    Host(String),
    #[error("URL '{0}' has no port")]
    NoPort(String),
    #[error(transparent)]
    Tls(#[from] TlsError),
    #[error("Server error: {0}")]
    Serve(#[from] std::io::Error),
}

/// Where and how to listen, derived from the configured URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BindTarget {
    pub addr: SocketAddr,
    pub tls: bool,
    /// Also listen on `[::1]` at the same port, best effort.
    pub ipv6_loopback: bool,
}

impl BindTarget {
    /// Loopback binds keep rmcp's Host header allow-list. Anything else is
    /// reached under names we cannot predict, so only the bearer gate applies.
    pub fn restricts_host_header(&self) -> bool {
        self.addr.ip().is_loopback()
    }

    /// Bind the listening sockets. The IPv4 socket is required; the extra
    /// IPv6 loopback socket is skipped with a warning when unavailable.
    pub fn bind(&self) -> Result<Vec<TcpListener>, HttpError> {
        let primary = bind_nonblocking(self.addr)?;
        let port = primary.local_addr()?.port();
        let mut listeners = vec![primary];

        if self.ipv6_loopback {
            let addr = SocketAddr::from((Ipv6Addr::LOCALHOST, port));
            match bind_nonblocking(addr) {
                Ok(listener) => listeners.push(listener),
                Err(e) => tracing::warn!(%addr, "IPv6 loopback unavailable, serving IPv4 only: {e}"),
            }
        }
        Ok(listeners)
    }
}

fn bind_nonblocking(addr: SocketAddr) -> std::io::Result<TcpListener> {
    let listener = TcpListener::bind(addr)?;
    listener.set_nonblocking(true)?;
    Ok(listener)
}

/// Resolve the bind address for `url`.
///
/// `localhost` binds `127.0.0.1` plus `[::1]`, and loopback literals bind
/// just themselves. Any other host
/// must parse as an IP literal, which is bound as given (`0.0.0.0` and `::`
/// mean every interface).
pub fn resolve_bind(url: &str) -> Result<BindTarget, HttpError> {
    let parsed = Url::parse(url).map_err(|source| HttpError::Url {
        url: url.to_string(),
        source,
    })?;

    let tls = match parsed.scheme() {
        "https" => true,
        "http" => false,
        other => return Err(HttpError::Scheme(other.to_string())),
    };

    let mut ipv6_loopback = false;
    let ip = match parsed.host() {
        Some(Host::Domain(name)) if name.eq_ignore_ascii_case("localhost") => {
            ipv6_loopback = true;
            IpAddr::V4(Ipv4Addr::LOCALHOST)
        }
        Some(Host::Domain(name)) => match name.parse::<IpAddr>() {
            Ok(ip) => ip,
            Err(_) => return Err(HttpError::Host(name.to_string())),
        },
        Some(Host::Ipv4(ip)) => IpAddr::V4(ip),
        Some(Host::Ipv6(ip)) => IpAddr::V6(ip),
        None => return Err(HttpError::NoHost(url.to_string())),
    };

    let port = parsed
        .port_or_known_default()
        .ok_or_else(|| HttpError::NoPort(url.to_string()))?;

    Ok(BindTarget {
        addr: SocketAddr::new(ip, port),
        tls,
        ipv6_loopback,
    })
}

/// Build the axum app: the MCP service on exactly one path, behind the
/// bearer gate. Any other path is a 404 once authenticated.
pub fn router(editor: EditorHandle, config: &HttpConfig, target: &BindTarget) -> Router {
    let mut sessions = LocalSessionManager::default();
    sessions.session_config.keep_alive = Some(config.idle_timeout());

    let mut server_config = StreamableHttpServerConfig::default();
    server_config.stateful_mode = true;
    if !target.restricts_host_header() {
        server_config = server_config.disable_allowed_hosts();
    }

    let service = StreamableHttpService::new(
        move || Ok(EditorMcp::new(editor.clone())),
        Arc::new(sessions),
        server_config,
    );

    Router::new()
        .route_service(&config.normalized_path(), service)
        .layer(middleware::from_fn_with_state(
            AuthGate::new(&config.api_key),
            require_bearer,
        ))
}

/// Streamable HTTP(S) listener.
#[derive(Debug, Clone)]
pub struct HttpListener {
    config: HttpConfig,
}

impl HttpListener {
    pub fn new(config: HttpConfig) -> Self {
        Self { config }
    }

    /// Serve until `shutdown` fires or the server fails.
    pub async fn serve(self, editor: EditorHandle, shutdown: CancellationToken) -> Result<(), HttpError> {
        let target = resolve_bind(&self.config.url)?;
        let path = self.config.normalized_path();

        if self.config.api_key.is_empty() {
            tracing::warn!(
                "No API key configured, HTTP transport accepts unauthenticated requests. Set {} or http.api_key.",
                crate::config::API_KEY_ENV
            );
        }

        let tls = if target.tls {
            Some(
                TlsMaterial::resolve(self.config.certificate.as_ref())?
                    .into_rustls()
                    .await?,
            )
        } else {
            None
        };

        let listeners = target.bind()?;
        let app = router(editor, &self.config, &target);

        let handle = axum_server::Handle::new();
        let watcher = {
            let handle = handle.clone();
            tokio::spawn(async move {
                shutdown.cancelled().await;
                tracing::info!("Stopping HTTP listener");
                handle.graceful_shutdown(Some(SHUTDOWN_GRACE));
            })
        };

        let scheme = if target.tls { "https" } else { "http" };
        let servers = listeners.into_iter().map(|listener| {
            if let Ok(addr) = listener.local_addr() {
                tracing::info!(%addr, "MCP server listening on {scheme}://{addr}{path}");
            }
            let app = app.clone();
            let handle = handle.clone();
            let tls = tls.clone();
            async move {
                match tls {
                    Some(rustls) => {
                        axum_server::from_tcp_rustls(listener, rustls)
                            .handle(handle)
                            .serve(app.into_make_service())
                            .await
                    }
                    None => {
                        axum_server::from_tcp(listener)
                            .handle(handle)
                            .serve(app.into_make_service())
                            .await
                    }
                }
            }
        });
        let served = futures::future::try_join_all(servers).await;

        watcher.abort();
        served?;
        tracing::info!("HTTP listener stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, Response, StatusCode, header};
    use http_body_util::BodyExt;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    const SESSION_HEADER: &str = "mcp-session-id";

    async fn app_for(url: &str, idle_timeout_secs: u64) -> (Router, scriptorium_dispatch::OwnerHandle) {
        let (editor, owner, ready) = scriptorium_editor::spawn_editor(None).unwrap();
        ready.wait_async().await.unwrap();
        let config = HttpConfig {
            url: url.into(),
            api_key: "k".into(),
            idle_timeout_secs,
            ..HttpConfig::default()
        };
        let target = resolve_bind(url).unwrap();
        (router(editor, &config, &target), owner)
    }

    fn mcp_post(host: &str, session: Option<&str>, body: Value) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/mcp")
            .header(header::HOST, host)
            .header(header::AUTHORIZATION, "Bearer k")
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::ACCEPT, "application/json, text/event-stream");
        if let Some(id) = session {
            builder = builder.header(SESSION_HEADER, id);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    fn initialize() -> Value {
        json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "initialize",
            "params": {
                "protocolVersion": "2025-03-26",
                "capabilities": {},
                "clientInfo": {"name": "http-test", "version": "0.0.0"}
            }
        })
    }

    /// Initialize a session and acknowledge it, returning the session id.
    async fn open_session(app: &Router, host: &str) -> String {
        let response = app.clone().oneshot(mcp_post(host, None, initialize())).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let id = response.headers()[SESSION_HEADER].to_str().unwrap().to_string();

        let initialized = json!({"jsonrpc": "2.0", "method": "notifications/initialized"});
        let response = app
            .clone()
            .oneshot(mcp_post(host, Some(&id), initialized))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        id
    }

    fn insert_hello() -> Value {
        json!({
            "jsonrpc": "2.0",
            "id": 2,
            "method": "tools/call",
            "params": {"name": "editor_insert_text", "arguments": {"text": "hello", "position": 0}}
        })
    }

    async fn body_text(response: Response<Body>) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8_lossy(&bytes).into_owned()
    }

    #[test]
    fn test_localhost_binds_loopback() {
        let target = resolve_bind("https://localhost:5000").unwrap();
        assert_eq!(target.addr, SocketAddr::from((Ipv4Addr::LOCALHOST, 5000)));
        assert!(target.tls);
        assert!(target.ipv6_loopback);

        let target = resolve_bind("http://LOCALHOST:8080/").unwrap();
        assert_eq!(target.addr.ip(), IpAddr::V4(Ipv4Addr::LOCALHOST));
        assert!(!target.tls);
    }

    #[test]
    fn test_loopback_literals() {
        let v4 = resolve_bind("http://127.0.0.1:9000").unwrap();
        assert_eq!(v4.addr, SocketAddr::from((Ipv4Addr::LOCALHOST, 9000)));
        assert!(!v4.ipv6_loopback);

        let v6 = resolve_bind("http://[::1]:9000").unwrap();
        assert_eq!(v6.addr, SocketAddr::from((Ipv6Addr::LOCALHOST, 9000)));
        assert!(!v6.ipv6_loopback);
    }

    #[test]
    fn test_localhost_shares_port_across_loopbacks() {
        let listeners = resolve_bind("http://localhost:0").unwrap().bind().unwrap();
        let addrs: Vec<_> = listeners.iter().map(|l| l.local_addr().unwrap()).collect();

        assert_eq!(addrs[0].ip(), IpAddr::V4(Ipv4Addr::LOCALHOST));
        assert_ne!(addrs[0].port(), 0);
        // Hosts without IPv6 serve the IPv4 socket alone.
        if let Some(v6) = addrs.get(1) {
            assert_eq!(v6.ip(), IpAddr::V6(Ipv6Addr::LOCALHOST));
            assert_eq!(v6.port(), addrs[0].port());
        }
        assert!(addrs.len() <= 2);
    }

    #[test]
    fn test_literal_binds_single_socket() {
        let listeners = resolve_bind("http://127.0.0.1:0").unwrap().bind().unwrap();
        assert_eq!(listeners.len(), 1);
    }

    #[test]
    fn test_host_header_policy_follows_bind() {
        assert!(resolve_bind("http://localhost:5000").unwrap().restricts_host_header());
        assert!(resolve_bind("http://[::1]:5000").unwrap().restricts_host_header());
        assert!(!resolve_bind("http://0.0.0.0:5000").unwrap().restricts_host_header());
        assert!(!resolve_bind("http://192.168.1.20:5000").unwrap().restricts_host_header());
    }

    #[test]
    fn test_any_address_literal() {
        let target = resolve_bind("http://0.0.0.0:7000").unwrap();
        assert!(target.addr.ip().is_unspecified());
        assert_eq!(target.addr.port(), 7000);
    }

    #[test]
    fn test_default_ports() {
        assert_eq!(resolve_bind("http://localhost").unwrap().addr.port(), 80);
        assert_eq!(resolve_bind("https://localhost").unwrap().addr.port(), 443);
    }

    #[test]
    fn test_rejects_hostnames_and_schemes() {
        assert!(matches!(resolve_bind("http://example.com:80"), Err(HttpError::Host(_))));
        assert!(matches!(resolve_bind("ftp://localhost:21"), Err(HttpError::Scheme(_))));
        assert!(matches!(resolve_bind("not a url"), Err(HttpError::Url { .. })));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_router_requires_token_before_mcp() {
        let (editor, owner, ready) = scriptorium_editor::spawn_editor(None).unwrap();
        ready.wait_async().await.unwrap();

        let config = HttpConfig {
            api_key: "s3cret".into(),
            ..HttpConfig::default()
        };
        let target = resolve_bind(&config.url).unwrap();
        let app = router(editor, &config, &target);

        let request = Request::builder()
            .method("POST")
            .uri("/mcp")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"jsonrpc":"2.0","id":1,"method":"tools/list"}"#))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let request = Request::builder()
            .method("POST")
            .uri("/mcp/extra")
            .header(header::AUTHORIZATION, "Bearer s3cret")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        owner.shutdown();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_tool_call_over_http_session() {
        let (app, owner) = app_for("http://localhost:5000", 60).await;
        let session = open_session(&app, "localhost:5000").await;

        let response = app
            .clone()
            .oneshot(mcp_post("localhost:5000", Some(&session), insert_hello()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains("Inserted 5 chars at position 0."));

        owner.shutdown();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_any_address_bind_accepts_remote_host_header() {
        let (app, owner) = app_for("http://0.0.0.0:5000", 60).await;
        let session = open_session(&app, "192.168.1.20:5000").await;

        let response = app
            .oneshot(mcp_post("192.168.1.20:5000", Some(&session), insert_hello()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains("Inserted 5 chars at position 0."));

        owner.shutdown();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_loopback_bind_rejects_foreign_host_header() {
        let (app, owner) = app_for("http://localhost:5000", 60).await;
        let response = app
            .oneshot(mcp_post("evil.example:5000", None, initialize()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        owner.shutdown();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_idle_session_expires() {
        let (app, owner) = app_for("http://localhost:5000", 1).await;
        let session = open_session(&app, "localhost:5000").await;

        tokio::time::sleep(Duration::from_millis(2500)).await;

        let response = app
            .oneshot(mcp_post("localhost:5000", Some(&session), insert_hello()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        owner.shutdown();
    }
}
