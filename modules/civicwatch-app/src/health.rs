use std::time::Duration;

use tracing::{info, warn};

use crate::backend::Backend;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readiness {
    /// The health check answered in time.
    Ready,
    /// The timer won; the backend is assumed to be up.
    AssumedReady,
    /// The health check failed. The app still starts.
    Degraded(String),
}

impl Readiness {
    pub fn is_confirmed(&self) -> bool {
        matches!(self, Readiness::Ready)
    }
}

/// Race the backend health check against `timeout`. Whichever finishes first
/// decides; a slow backend never blocks startup.
pub async fn startup_readiness(backend: &dyn Backend, timeout: Duration) -> Readiness {
    tokio::select! {
        result = backend.health_check() => match result {
            Ok(()) => {
                info!("Backend healthy");
                Readiness::Ready
            }
            Err(e) => {
                warn!(error = %e, "Backend health check failed, starting anyway");
                Readiness::Degraded(e.to_string())
            }
        },
        _ = tokio::time::sleep(timeout) => {
            warn!(timeout_ms = timeout.as_millis() as u64, "Health check timed out, assuming ready");
            Readiness::AssumedReady
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockBackend;

    #[tokio::test(start_paused = true)]
    async fn fast_backend_is_ready() {
        let backend = MockBackend::new().with_health_delay(Duration::from_millis(100));
        assert_eq!(
            startup_readiness(&backend, Duration::from_secs(2)).await,
            Readiness::Ready
        );
    }

    #[tokio::test(start_paused = true)]
    async fn slow_backend_is_assumed_ready() {
        let backend = MockBackend::new().with_health_delay(Duration::from_secs(30));
        let start = tokio::time::Instant::now();
        let readiness = startup_readiness(&backend, Duration::from_secs(2)).await;
        assert_eq!(readiness, Readiness::AssumedReady);
        assert!(start.elapsed() < Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn failing_backend_degrades() {
        let backend = MockBackend::new();
        backend.fail_health(true);
        let readiness = startup_readiness(&backend, Duration::from_secs(2)).await;
        assert!(matches!(readiness, Readiness::Degraded(ref m) if m.contains("health")));
        assert!(!readiness.is_confirmed());
    }
}
