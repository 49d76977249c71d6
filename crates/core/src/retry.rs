//! Retry classification with exponential backoff
//!
//! `classify` is a pure function of the error; the backoff loop wraps one
//! import attempt and honours cancellation at its sleep points.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{ImportError, Result};

/// Whether an error is worth retrying
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryClass {
    /// Retrying cannot help (bad input, policy rejection)
    Permanent,
    /// The condition may clear on its own (file still copying, next tick)
    Transient,
}

/// Pure classification of import errors.
///
/// `FileTooSmall` is transient: the file may still be growing while the
/// download client flushes it. Anything unknown is assumed transient so a
/// flaky collaborator gets another chance.
pub fn classify(error: &ImportError) -> RetryClass {
    match error {
        ImportError::FileNotFound { .. }
        | ImportError::InvalidExtension { .. }
        | ImportError::SampleFile { .. }
        | ImportError::NoMatch { .. }
        | ImportError::MatchConflict { .. }
        | ImportError::PathTooLong { .. }
        | ImportError::FileAlreadyInLibrary { .. }
        | ImportError::NotAnUpgrade { .. }
        | ImportError::InvalidPattern { .. }
        | ImportError::InvalidToken { .. }
        | ImportError::SlotSelectionRequired
        | ImportError::NoRootFolder
        | ImportError::Cancelled { .. } => RetryClass::Permanent,

        ImportError::FileTooSmall { .. } | ImportError::AlreadyImporting { .. } => {
            RetryClass::Transient
        }

        _ => RetryClass::Transient,
    }
}

/// Backoff parameters for the import retry loop
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Base delay; attempt n sleeps `base * 2^n`
    pub base_delay: Duration,
    /// Upper bound on any single delay
    pub max_delay: Duration,
    /// Total attempts including the initial one
    pub max_attempts: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(5),
            max_delay: Duration::from_secs(300),
            max_attempts: 4,
        }
    }
}

impl RetryConfig {
    /// Delay before retrying after `attempt` failures (0-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(attempt));
        exp.min(self.max_delay)
    }
}

/// Run `operation` until it succeeds, fails permanently, exhausts attempts,
/// or is cancelled. Sleeps are interruptible by `cancel`.
pub async fn retry_import<F, Fut, T>(
    config: &RetryConfig,
    cancel: &CancellationToken,
    operation_name: &str,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt: u32 = 0;

    loop {
        match operation().await {
            Ok(value) => {
                if attempt > 0 {
                    debug!("{} succeeded on attempt {}", operation_name, attempt + 1);
                }
                return Ok(value);
            }
            Err(err) => {
                if classify(&err) == RetryClass::Permanent {
                    debug!("{} failed permanently: {}", operation_name, err);
                    return Err(err);
                }

                attempt += 1;
                if attempt >= config.max_attempts {
                    warn!(
                        "{} failed after {} attempts: {}",
                        operation_name, config.max_attempts, err
                    );
                    return Err(ImportError::ImportFailed {
                        operation: operation_name.to_string(),
                        attempts: config.max_attempts,
                        last_error: Box::new(err),
                    });
                }

                let delay = config.delay_for(attempt - 1);
                warn!(
                    "{} failed on attempt {}/{}: {}. Retrying in {:?}",
                    operation_name, attempt, config.max_attempts, err, delay
                );

                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = cancel.cancelled() => {
                        return Err(ImportError::Cancelled {
                            operation: operation_name.to_string(),
                        });
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_classify_is_pure_and_exhaustive_for_core_kinds() {
        let permanent = [
            ImportError::FileNotFound {
                path: "x".to_string(),
            },
            ImportError::InvalidExtension {
                path: "x".to_string(),
            },
            ImportError::SampleFile {
                path: "x".to_string(),
            },
            ImportError::NoMatch {
                path: "x".to_string(),
            },
            ImportError::MatchConflict {
                message: "x".to_string(),
            },
            ImportError::PathTooLong {
                path: "x".to_string(),
                length: 300,
                max: 260,
            },
            ImportError::FileAlreadyInLibrary {
                path: "x".to_string(),
            },
            ImportError::NotAnUpgrade {
                reason: "x".to_string(),
            },
        ];
        for err in &permanent {
            assert_eq!(classify(err), RetryClass::Permanent, "{}", err);
            // Same error, same answer
            assert_eq!(classify(err), classify(err));
        }

        assert_eq!(
            classify(&ImportError::FileTooSmall {
                path: "x".to_string(),
                size: 1,
                min: 2
            }),
            RetryClass::Transient
        );
        assert_eq!(
            classify(&ImportError::AlreadyImporting {
                path: "x".to_string()
            }),
            RetryClass::Transient
        );
        // Unclassified errors default to transient
        assert_eq!(
            classify(&ImportError::DatabaseError {
                message: "x".to_string()
            }),
            RetryClass::Transient
        );
    }

    #[test]
    fn test_delay_schedule() {
        let config = RetryConfig::default();
        assert_eq!(config.delay_for(0), Duration::from_secs(5));
        assert_eq!(config.delay_for(1), Duration::from_secs(10));
        assert_eq!(config.delay_for(2), Duration::from_secs(20));
        // Capped at five minutes
        assert_eq!(config.delay_for(10), Duration::from_secs(300));
    }

    #[tokio::test]
    async fn test_retry_succeeds_on_second_attempt() {
        let attempts = Arc::new(AtomicU32::new(0));
        let config = RetryConfig {
            base_delay: Duration::from_millis(1),
            ..Default::default()
        };
        let cancel = CancellationToken::new();

        let counter = attempts.clone();
        let result = retry_import(&config, &cancel, "test_op", move || {
            let counter = counter.clone();
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(ImportError::FileTooSmall {
                        path: "x".to_string(),
                        size: 1,
                        min: 2,
                    })
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_permanent_error_does_not_retry() {
        let attempts = Arc::new(AtomicU32::new(0));
        let config = RetryConfig {
            base_delay: Duration::from_millis(1),
            ..Default::default()
        };
        let cancel = CancellationToken::new();

        let counter = attempts.clone();
        let result: Result<()> = retry_import(&config, &cancel, "test_op", move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(ImportError::SampleFile {
                    path: "x".to_string(),
                })
            }
        })
        .await;

        assert!(matches!(result, Err(ImportError::SampleFile { .. })));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retries_exhausted() {
        let config = RetryConfig {
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
            max_attempts: 3,
        };
        let cancel = CancellationToken::new();

        let result: Result<()> = retry_import(&config, &cancel, "test_op", || async {
            Err(ImportError::FileTooSmall {
                path: "x".to_string(),
                size: 1,
                min: 2,
            })
        })
        .await;

        match result {
            Err(ImportError::ImportFailed { attempts, .. }) => assert_eq!(attempts, 3),
            other => panic!("expected ImportFailed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_cancellation_interrupts_sleep() {
        let config = RetryConfig {
            base_delay: Duration::from_secs(60),
            ..Default::default()
        };
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result: Result<()> = retry_import(&config, &cancel, "test_op", || async {
            Err(ImportError::FileTooSmall {
                path: "x".to_string(),
                size: 1,
                min: 2,
            })
        })
        .await;

        assert!(matches!(result, Err(ImportError::Cancelled { .. })));
    }
}
