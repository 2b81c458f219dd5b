//! Shared fixtures for controller integration tests.
//!
//! Child fixtures are shell scripts written once per test binary. Each test
//! gets its own install root; the scripts run from there and read their
//! per-test knobs from files in it:
//!
//! - `url`: endpoint announced in the readiness line
//! - `delay`: seconds to wait before announcing readiness
//!
//! and leave evidence behind (`launches`, `launch_args`, `runs`).

#![allow(dead_code)]

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use subsys_control::{ServerSubsystem, Subsystem, SubsystemConfig, SUBSYSTEM_KIND};
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::time::Instant;

/// Well-behaved server: announces readiness, exits 0 on SIGTERM.
pub const SERVE: &str = "serve";
/// Announces readiness but ignores SIGTERM.
pub const STUBBORN: &str = "stubborn";
/// Never announces readiness.
pub const SILENT: &str = "silent";
/// Exits with code 3 without announcing readiness.
pub const BROKEN: &str = "broken";
/// First run crashes with code 1 shortly after readiness; later runs behave.
pub const FLAKY: &str = "flaky";
/// First run leaves a worker behind that announces a stale endpoint 0.8s
/// after launch, then crashes. Later runs announce after 1.5s.
pub const ORPHANING: &str = "orphaning";

/// Endpoint the orphaned worker announces.
pub const STALE_URL: &str = "http://127.0.0.1:9";

const ANNOUNCE: &str = r#"url=$(cat url 2>/dev/null || echo "http://127.0.0.1:1")
printf 'serving {"url": "%s"}\n' "$url"
"#;

fn script(name: &str) -> String {
    match name {
        SERVE => format!(
            "#!/bin/sh\n\
             echo launched >> launches\n\
             echo \"$1 $2 $(pwd)\" > launch_args\n\
             echo 'booting' >&2\n\
             [ -f delay ] && sleep \"$(cat delay)\"\n\
             {ANNOUNCE}\
             trap 'exit 0' TERM\n\
             while true; do sleep 0.1; done\n"
        ),
        STUBBORN => format!(
            "#!/bin/sh\n\
             trap '' TERM\n\
             {ANNOUNCE}\
             while true; do sleep 0.1; done\n"
        ),
        SILENT => "#!/bin/sh\n\
                   trap 'exit 0' TERM\n\
                   echo 'warming up'\n\
                   while true; do sleep 0.1; done\n"
            .to_string(),
        BROKEN => "#!/bin/sh\n\
                   echo 'fatal: bad config' >&2\n\
                   exit 3\n"
            .to_string(),
        FLAKY => format!(
            "#!/bin/sh\n\
             n=$(cat runs 2>/dev/null || echo 0)\n\
             n=$((n + 1))\n\
             echo $n > runs\n\
             {ANNOUNCE}\
             if [ \"$n\" -eq 1 ]; then sleep 0.3; exit 1; fi\n\
             trap 'exit 0' TERM\n\
             while true; do sleep 0.1; done\n"
        ),
        ORPHANING => format!(
            "#!/bin/sh\n\
             n=$(cat runs 2>/dev/null || echo 0)\n\
             n=$((n + 1))\n\
             echo $n > runs\n\
             if [ \"$n\" -eq 1 ]; then\n\
             (sleep 0.8; printf 'serving {{\"url\": \"{STALE_URL}\"}}\\n') &\n\
             {ANNOUNCE}\
             sleep 0.2\n\
             exit 1\n\
             fi\n\
             sleep 1.5\n\
             {ANNOUNCE}\
             trap 'exit 0' TERM\n\
             while true; do sleep 0.1; done\n"
        ),
        other => panic!("unknown fixture {other}"),
    }
}

/// Directory holding every fixture script.
///
/// Written once, before any test of this binary spawns a child, so no
/// script is ever open for writing while another one is being executed.
pub fn fixtures_dir() -> &'static Path {
    static DIR: OnceLock<TempDir> = OnceLock::new();
    DIR.get_or_init(|| {
        let dir = tempfile::tempdir().unwrap();
        for name in [SERVE, STUBBORN, SILENT, BROKEN, FLAKY, ORPHANING] {
            let path = dir.path().join(name);
            std::fs::write(&path, script(name)).unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        }
        dir
    })
    .path()
}

/// One controller running a fixture from a private install root.
pub struct Harness {
    pub root: TempDir,
    pub config: SubsystemConfig,
}

impl Harness {
    pub fn new(fixture: &str) -> Self {
        let bin_dir = fixtures_dir().to_path_buf();
        let root = tempfile::tempdir().unwrap();

        let mut config = SubsystemConfig::new(
            "app-server",
            SUBSYSTEM_KIND,
            root.path(),
            root.path().join("config.json"),
        );
        config.bin_dir = Some(bin_dir);
        config.executable = Some(fixture.to_string());
        config.start_timeout = Duration::from_secs(5);
        config.stop_timeout = Duration::from_secs(2);
        config.health_check_timeout = Duration::from_secs(2);
        config.stop_poll_interval = Duration::from_millis(50);

        Self { root, config }
    }

    pub fn with(mut self, edit: impl FnOnce(&mut SubsystemConfig)) -> Self {
        edit(&mut self.config);
        self
    }

    /// Write a knob file into the install root.
    pub fn set(&self, file: &str, contents: &str) -> &Self {
        std::fs::write(self.root.path().join(file), contents).unwrap();
        self
    }

    pub fn read(&self, file: &str) -> Option<String> {
        std::fs::read_to_string(self.root.path().join(file))
            .ok()
            .map(|s| s.trim().to_string())
    }

    pub fn path(&self) -> PathBuf {
        self.root.path().to_path_buf()
    }

    pub fn server(&self) -> ServerSubsystem {
        ServerSubsystem::new(self.config.clone()).unwrap()
    }
}

/// Poll `cond` until it holds or `timeout` passes.
pub async fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    cond()
}

/// Wait for the reaper to record the child's exit.
pub async fn wait_for_exit(subsystem: &dyn Subsystem, timeout: Duration) -> bool {
    wait_until(timeout, || !subsystem.status().running).await
}

/// Local HTTP endpoint answering every request with a settable status.
pub struct MockEndpoint {
    pub url: String,
    status: Arc<AtomicU16>,
}

impl MockEndpoint {
    pub async fn start(status: u16) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let status = Arc::new(AtomicU16::new(status));

        let shared = Arc::clone(&status);
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let status = Arc::clone(&shared);
                tokio::spawn(async move {
                    let service = service_fn(move |_req: Request<hyper::body::Incoming>| {
                        let code = status.load(Ordering::SeqCst);
                        async move {
                            Ok::<_, Infallible>(
                                Response::builder()
                                    .status(code)
                                    .body(Full::new(Bytes::from_static(b"{}")))
                                    .unwrap(),
                            )
                        }
                    });
                    let _ = http1::Builder::new()
                        .serve_connection(TokioIo::new(stream), service)
                        .await;
                });
            }
        });

        Self { url, status }
    }

    pub fn set_status(&self, status: u16) {
        self.status.store(status, Ordering::SeqCst);
    }
}

/// A URL nothing listens on.
pub async fn refused_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}
