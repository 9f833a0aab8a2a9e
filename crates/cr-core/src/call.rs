//! Bounded backend calls. An elapsed timeout takes the same failure path
//! as an explicit error response.

use std::future::Future;
use std::time::Duration;

use crate::error::{AppError, Result};

pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(10);

pub async fn bounded<T, E, F>(limit: Duration, fut: F) -> Result<T>
where
    F: Future<Output = std::result::Result<T, E>>,
    E: Into<AppError>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result.map_err(Into::into),
        Err(_) => Err(AppError::Timeout(limit.as_millis() as u64)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn passes_results_through() {
        let ok: Result<u8> = bounded(Duration::from_secs(1), async { Ok::<_, anyhow::Error>(7) }).await;
        assert_eq!(ok.unwrap(), 7);

        let err: Result<u8> =
            bounded(Duration::from_secs(1), async { Err(anyhow::anyhow!("constraint violated")) }).await;
        assert!(matches!(err, Err(AppError::Backend(msg)) if msg.contains("constraint")));
    }

    #[tokio::test(start_paused = true)]
    async fn elapsed_calls_become_timeouts() {
        let slow = async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok::<_, anyhow::Error>(())
        };
        let res = bounded(Duration::from_millis(250), slow).await;
        assert!(matches!(res, Err(AppError::Timeout(250))));
    }
}
