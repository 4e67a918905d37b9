use std::{future::Future, time::Duration};

use tokio::time::{sleep, timeout};
use tracing::warn;

use crate::{errors::StorageError, settings::StorageSettings};

/// Timeout and bounded exponential backoff applied to every storage call.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub timeout: Duration,
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_settings(&StorageSettings::default())
    }
}

impl RetryPolicy {
    pub fn from_settings(settings: &StorageSettings) -> Self {
        Self {
            timeout: settings.timeout(),
            max_retries: settings.max_retries,
            base_delay: settings.retry_base_delay(),
        }
    }

    /// Single attempt under the timeout, no retries.
    pub fn once(&self) -> Self {
        Self { max_retries: 0, ..self.clone() }
    }

    /// Runs `op`, retrying transient failures. Timeouts count as transient.
    pub async fn run<T, F, Fut>(&self, op: &'static str, key: &str, mut f: F) -> Result<T, StorageError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StorageError>>,
    {
        let mut attempt = 0;
        let mut wait = self.base_delay;

        loop {
            let result = match timeout(self.timeout, f()).await {
                Ok(result) => result,
                Err(_) => Err(StorageError::Transient(format!(
                    "{op} of {key} timed out after {:?}",
                    self.timeout
                ))),
            };

            match result {
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    attempt += 1;
                    warn!(
                        op, key, attempt, max_retries = self.max_retries, error = %e,
                        "Storage call failed, retrying in {:?}", wait
                    );

                    sleep(wait).await;
                    wait *= 2;
                }
                other => return other,
            }
        }
    }
}
