// HTTP health probe

use crate::{classify_status, ProbeError, ProbeResult};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Probe timeout used when the caller has no opinion.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(30);

/// Issues single GET requests against a subsystem's advertised URL.
///
/// The underlying client is built once and reused, so repeated probes share
/// its connection pool.
#[derive(Debug, Clone)]
pub struct HttpProber {
    client: reqwest::Client,
}

impl HttpProber {
    pub fn new() -> ProbeResult<Self> {
        // Probe targets are local children; an ambient proxy must not intercept them.
        let client = reqwest::Client::builder()
            .no_proxy()
            .pool_max_idle_per_host(1)
            .build()
            .map_err(|e| ProbeError::Client {
                reason: e.to_string(),
            })?;
        Ok(Self { client })
    }

    /// GET `url` and accept any 2xx response.
    ///
    /// The request is abandoned when `timeout` elapses or `cancel` fires,
    /// whichever comes first. The response body is never read.
    pub async fn probe(
        &self,
        url: &str,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> ProbeResult<u16> {
        let parsed = reqwest::Url::parse(url).map_err(|e| ProbeError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        let started = Instant::now();
        let request = self.client.get(parsed).timeout(timeout).send();

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(url = %url, "Health probe cancelled");
                return Err(ProbeError::Cancelled);
            }
            result = request => result.map_err(|e| {
                if e.is_timeout() {
                    ProbeError::Timeout { timeout }
                } else {
                    ProbeError::Request { reason: e.to_string() }
                }
            })?,
        };

        let status = response.status().as_u16();
        debug!(
            url = %url,
            status,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Health probe response"
        );

        classify_status(status)?;
        Ok(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::Full;
    use hyper::body::Bytes;
    use hyper::server::conn::http1;
    use hyper::service::service_fn;
    use hyper::{Request, Response};
    use hyper_util::rt::TokioIo;
    use std::convert::Infallible;
    use tokio::net::TcpListener;

    /// Serve `status` after `delay` on an ephemeral local port.
    async fn serve(status: u16, delay: Duration) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(async move {
                    let service = service_fn(move |_req: Request<hyper::body::Incoming>| async move {
                        tokio::time::sleep(delay).await;
                        Ok::<_, Infallible>(
                            Response::builder()
                                .status(status)
                                .body(Full::new(Bytes::from_static(b"ok")))
                                .unwrap(),
                        )
                    });
                    let _ = http1::Builder::new()
                        .serve_connection(TokioIo::new(stream), service)
                        .await;
                });
            }
        });

        format!("http://{addr}")
    }

    #[tokio::test]
    async fn test_success_statuses() {
        let prober = HttpProber::new().unwrap();
        let cancel = CancellationToken::new();

        for status in [200, 204] {
            let url = serve(status, Duration::ZERO).await;
            let got = prober.probe(&url, Duration::from_secs(5), &cancel).await;
            assert_eq!(got, Ok(status));
        }
    }

    #[tokio::test]
    async fn test_failure_statuses() {
        let prober = HttpProber::new().unwrap();
        let cancel = CancellationToken::new();

        for status in [404, 500] {
            let url = serve(status, Duration::ZERO).await;
            let err = prober
                .probe(&url, Duration::from_secs(5), &cancel)
                .await
                .unwrap_err();
            assert_eq!(err, ProbeError::Status { status });
        }
    }

    #[tokio::test]
    async fn test_connection_refused() {
        // Bind then drop to get a port nothing listens on.
        let addr = TcpListener::bind("127.0.0.1:0")
            .await
            .unwrap()
            .local_addr()
            .unwrap();
        let prober = HttpProber::new().unwrap();
        let err = prober
            .probe(&format!("http://{addr}"), Duration::from_secs(5), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ProbeError::Request { .. }), "got {err:?}");
        assert_eq!(err.status(), None);
    }

    #[tokio::test]
    async fn test_timeout_bounds_probe() {
        let url = serve(200, Duration::from_secs(10)).await;
        let prober = HttpProber::new().unwrap();

        let started = Instant::now();
        let err = prober
            .probe(&url, Duration::from_millis(200), &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ProbeError::Timeout {
                timeout: Duration::from_millis(200)
            }
        );
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_cancellation_abandons_probe() {
        let url = serve(200, Duration::from_secs(10)).await;
        let prober = HttpProber::new().unwrap();
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let err = prober
            .probe(&url, Duration::from_secs(30), &cancel)
            .await
            .unwrap_err();
        assert_eq!(err, ProbeError::Cancelled);
    }

    #[tokio::test]
    async fn test_invalid_url() {
        let prober = HttpProber::new().unwrap();
        let err = prober
            .probe("not a url", DEFAULT_PROBE_TIMEOUT, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ProbeError::InvalidUrl { .. }));
    }
}
