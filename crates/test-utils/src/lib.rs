//! Shared fixtures for the `sitegraph` integration tests: site trees on
//! disk, a scripted executor and helpers for awaiting runtime progress.

pub mod builders;
pub mod fake_executor;

use std::future::Future;
use std::sync::{Arc, Once};
use std::time::Duration;

use sitegraph::logging::LOG_ENV;
use sitegraph::session::FrozenState;
use tokio::sync::watch;
use tracing_subscriber::{fmt, EnvFilter};

static INIT: Once = Once::new();

/// Upper bound for any single wait in a test. Debounce windows in tests are
/// tens of milliseconds, so this only trips on a hang.
pub const TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Initialise tracing once per test binary.
///
/// Output goes through the test writer, so it only shows for failing tests
/// (or with `--nocapture`). Uses the same `SITEGRAPH_LOG` directive as the
/// binary and defaults to the engine at `debug` with dependencies at `warn`.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_env(LOG_ENV)
            .unwrap_or_else(|_| EnvFilter::new("warn,sitegraph=debug"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .init();
    });
}

/// Run a future, failing the test after [`TEST_TIMEOUT`].
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: Future<Output = T>,
{
    tokio::time::timeout(TEST_TIMEOUT, f)
        .await
        .expect("test timed out")
}

/// Wait until a session has published commit `generation` (or a later one)
/// and return that frozen view.
pub async fn wait_for_generation(
    rx: &mut watch::Receiver<Arc<FrozenState>>,
    generation: u64,
) -> Arc<FrozenState> {
    let frozen = with_timeout(rx.wait_for(|f| f.generation >= generation))
        .await
        .expect("session dropped before publishing");
    Arc::clone(&*frozen)
}
