//! Minimal HTTP scrape endpoint.
//!
//! One request per connection, answered with `Connection: close`. Only the
//! metrics path and an index page are served.

use miette::{IntoDiagnostic, Result, WrapErr};
use prometheus::Registry;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

/// Longest request head accepted before the connection is dropped.
const MAX_HEAD_BYTES: usize = 8 * 1024;

/// Time a client gets to send its request head.
const READ_TIMEOUT: Duration = Duration::from_secs(10);

/// What a request resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Metrics,
    Index,
    NotFound,
    MethodNotAllowed,
}

/// Request routing plus the registry behind the metrics path.
#[derive(Clone)]
pub struct Routes {
    metrics_path: String,
    registry: Registry,
}

impl Routes {
    pub fn new(metrics_path: String, registry: Registry) -> Self {
        let metrics_path = if metrics_path.starts_with('/') {
            metrics_path
        } else {
            format!("/{metrics_path}")
        };
        Self {
            metrics_path,
            registry,
        }
    }

    /// Resolve a request line's method and target.
    pub fn route(&self, method: &str, target: &str) -> Route {
        let path = target.split_once('?').map_or(target, |(path, _)| path);
        let route = if path == self.metrics_path {
            Route::Metrics
        } else if path == "/" {
            Route::Index
        } else {
            Route::NotFound
        };

        match (method, route) {
            ("GET" | "HEAD", route) => route,
            (_, Route::NotFound) => Route::NotFound,
            _ => Route::MethodNotAllowed,
        }
    }

    fn index_page(&self) -> String {
        format!(
            "<html>\n<head><title>SLURM Queue Exporter</title></head>\n<body>\n\
             <h1>SLURM Queue Exporter</h1>\n<p><a href=\"{}\">Metrics</a></p>\n</body>\n</html>\n",
            self.metrics_path
        )
    }
}

struct Response {
    status: &'static str,
    content_type: String,
    body: String,
}

impl Response {
    fn text(status: &'static str, body: &str) -> Self {
        Self {
            status,
            content_type: "text/plain; charset=utf-8".to_string(),
            body: format!("{body}\n"),
        }
    }
}

/// Bind `addr` and serve scrapes until Ctrl-C.
pub async fn serve(addr: SocketAddr, routes: Routes) -> Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .into_diagnostic()
        .wrap_err_with(|| format!("Failed to bind {addr}"))?;

    tracing::info!("Listening on http://{}{}", addr, routes.metrics_path);

    run(listener, routes, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for shutdown signal: {}", e);
            std::future::pending::<()>().await;
        }
    })
    .await;

    tracing::info!("Shutting down");
    Ok(())
}

/// Accept loop; returns once `shutdown` completes.
pub async fn run<F>(listener: TcpListener, routes: Routes, shutdown: F)
where
    F: Future<Output = ()>,
{
    let routes = Arc::new(routes);
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    let routes = Arc::clone(&routes);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, &routes).await {
                            tracing::debug!(%peer, "Connection error: {}", e);
                        }
                    });
                }
                Err(e) => tracing::warn!("Failed to accept connection: {}", e),
            },
            _ = &mut shutdown => return,
        }
    }
}

async fn handle_connection(mut stream: TcpStream, routes: &Routes) -> std::io::Result<()> {
    let Some((method, target)) = read_request_line(&mut stream).await? else {
        return Ok(());
    };

    let route = routes.route(&method, &target);
    tracing::debug!(%method, %target, ?route, "request");

    let response = match route {
        Route::Metrics => {
            let registry = routes.registry.clone();
            match tokio::task::spawn_blocking(move || slurmq_metrics::encode_text(&registry)).await
            {
                Ok(Ok(body)) => Response {
                    status: "200 OK",
                    content_type: slurmq_metrics::text_content_type(),
                    body,
                },
                Ok(Err(e)) => {
                    tracing::error!("Failed to render metrics: {}", e);
                    Response::text("500 Internal Server Error", "failed to render metrics")
                }
                Err(e) => {
                    tracing::error!("Metrics task failed: {}", e);
                    Response::text("500 Internal Server Error", "failed to render metrics")
                }
            }
        }
        Route::Index => Response {
            status: "200 OK",
            content_type: "text/html; charset=utf-8".to_string(),
            body: routes.index_page(),
        },
        Route::NotFound => Response::text("404 Not Found", "not found"),
        Route::MethodNotAllowed => Response::text("405 Method Not Allowed", "method not allowed"),
    };

    let head = format!(
        "HTTP/1.1 {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        response.status,
        response.content_type,
        response.body.len()
    );
    stream.write_all(head.as_bytes()).await?;
    if method != "HEAD" {
        stream.write_all(response.body.as_bytes()).await?;
    }
    stream.shutdown().await
}

/// Read the request head and return its method and target.
///
/// Returns None for an empty or malformed head, or one that is too large or
/// too slow to arrive.
async fn read_request_line(stream: &mut TcpStream) -> std::io::Result<Option<(String, String)>> {
    let mut reader = BufReader::new(stream);
    let request_line = match tokio::time::timeout(READ_TIMEOUT, read_head(&mut reader)).await {
        Ok(Ok(Some(line))) => line,
        Ok(Ok(None)) | Err(_) => return Ok(None),
        Ok(Err(e)) => return Err(e),
    };

    let mut parts = request_line.split_whitespace();
    match (parts.next(), parts.next()) {
        (Some(method), Some(target)) => Ok(Some((method.to_string(), target.to_string()))),
        _ => Ok(None),
    }
}

/// Consume header lines up to the blank line, returning the request line.
async fn read_head<R>(reader: &mut R) -> std::io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    let mut request_line = String::new();
    let mut line = String::new();
    let mut total = 0usize;

    loop {
        line.clear();
        let n = reader.read_line(&mut line).await?;
        total += n;
        if n == 0 || total > MAX_HEAD_BYTES {
            return Ok(None);
        }

        let trimmed = line.trim_end();
        if request_line.is_empty() {
            // tolerate stray CRLF before the request line
            request_line = trimmed.to_string();
        } else if trimmed.is_empty() {
            return Ok(Some(request_line));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slurmq_metrics::QueueCollector;
    use slurmq_slurm::{CommandError, QueueSource};
    use tokio::io::AsyncReadExt;
    use tokio::runtime::Handle;
    use tokio::sync::oneshot;

    struct TwoPartitions;

    impl QueueSource for TwoPartitions {
        async fn list_partitions(&self) -> Result<Vec<String>, CommandError> {
            Ok(vec!["batch".to_string(), "gpu".to_string()])
        }

        async fn sample_queue(&self) -> Result<Vec<u8>, CommandError> {
            Ok(b"1,RUNNING,None,gpu\n2,PENDING,Dependency,batch\n".to_vec())
        }
    }

    fn routes() -> Routes {
        Routes::new("/metrics".to_string(), Registry::new())
    }

    #[test]
    fn test_route() {
        let routes = routes();
        assert_eq!(routes.route("GET", "/metrics"), Route::Metrics);
        assert_eq!(routes.route("GET", "/metrics?x=1"), Route::Metrics);
        assert_eq!(routes.route("HEAD", "/metrics"), Route::Metrics);
        assert_eq!(routes.route("GET", "/"), Route::Index);
        assert_eq!(routes.route("GET", "/metricsx"), Route::NotFound);
        assert_eq!(routes.route("POST", "/metrics"), Route::MethodNotAllowed);
        assert_eq!(routes.route("POST", "/other"), Route::NotFound);
    }

    #[test]
    fn test_metrics_path_normalized() {
        let routes = Routes::new("queue".to_string(), Registry::new());
        assert_eq!(routes.route("GET", "/queue"), Route::Metrics);
        assert!(routes.index_page().contains("href=\"/queue\""));
    }

    #[tokio::test]
    async fn test_read_head() {
        let mut raw: &[u8] = b"\r\nGET /metrics HTTP/1.1\r\nHost: node01\r\nAccept: */*\r\n\r\n";
        let line = read_head(&mut raw).await.unwrap();
        assert_eq!(line.as_deref(), Some("GET /metrics HTTP/1.1"));
    }

    #[tokio::test]
    async fn test_read_head_truncated() {
        let mut raw: &[u8] = b"GET /metrics HTTP/1.1\r\nHost: node01\r\n";
        assert_eq!(read_head(&mut raw).await.unwrap(), None);
    }

    async fn request(addr: SocketAddr, raw: &str) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(raw.as_bytes()).await.unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        response
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_scrape_over_http() {
        let registry = Registry::new();
        let collector = QueueCollector::new(TwoPartitions, Handle::current()).unwrap();
        slurmq_metrics::register(&registry, collector).unwrap();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel::<()>();
        let server = tokio::spawn(run(
            listener,
            Routes::new("/metrics".to_string(), registry),
            async move {
                let _ = rx.await;
            },
        ));

        let response = request(addr, "GET /metrics HTTP/1.1\r\nHost: localhost\r\n\r\n").await;
        assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(response.contains("Content-Type: text/plain; version=0.0.4"));
        assert!(response.contains("slurm_queue_running{partition=\"gpu\"} 1"));
        assert!(response.contains("slurm_queue_pending_dependency{partition=\"batch\"} 1"));
        assert!(response.contains("slurm_queue_running{partition=\"batch\"} 0"));

        let response = request(addr, "GET /nope HTTP/1.1\r\n\r\n").await;
        assert!(response.starts_with("HTTP/1.1 404 Not Found\r\n"));

        let response = request(addr, "DELETE /metrics HTTP/1.1\r\n\r\n").await;
        assert!(response.starts_with("HTTP/1.1 405 Method Not Allowed\r\n"));

        tx.send(()).unwrap();
        server.await.unwrap();
    }
}
