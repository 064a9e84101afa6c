//! Shrink guard applied before a sync commits.
//!
//! Aborts the commit when the new catalog's quest count dropped by more than
//! `max_drop_percent` compared to the committed catalog.

use crate::error::{AppError, Result};
use crate::models::{Catalog, SyncConfig};

/// Circuit breaker for catalog commits.
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    config: SyncConfig,
}

/// Result of circuit breaker check.
#[derive(Debug, Clone, PartialEq)]
pub enum CircuitBreakerResult {
    /// Safe to commit
    Safe {
        current_count: usize,
        previous_count: usize,
    },
    /// No previous catalog, or one below the baseline
    ColdStart { current_count: usize },
    /// Drop check switched off in configuration
    Disabled { current_count: usize },
    /// Quest count dropped past the threshold
    Triggered {
        current_count: usize,
        previous_count: usize,
        drop_percent: f64,
    },
    /// New catalog is empty while the previous one was not
    EmptyResult { previous_count: usize },
}

impl CircuitBreakerResult {
    pub fn is_safe(&self) -> bool {
        !matches!(self, Self::Triggered { .. } | Self::EmptyResult { .. })
    }
}

impl CircuitBreaker {
    pub fn new(config: SyncConfig) -> Self {
        Self { config }
    }

    /// Compare quest counts of the new and the committed catalog.
    pub fn check(&self, current: &Catalog, previous: Option<&Catalog>) -> CircuitBreakerResult {
        let current_count = current.quest_count();
        let previous_count = previous.map_or(0, Catalog::quest_count);

        if current_count == 0 && previous_count > 0 {
            return CircuitBreakerResult::EmptyResult { previous_count };
        }
        if !self.config.circuit_breaker {
            return CircuitBreakerResult::Disabled { current_count };
        }
        if previous_count < self.config.min_baseline.max(1) {
            return CircuitBreakerResult::ColdStart { current_count };
        }

        if current_count < previous_count {
            let drop = previous_count - current_count;
            let drop_percent = (drop as f64 / previous_count as f64) * 100.0;
            if drop_percent > self.config.max_drop_percent as f64 {
                return CircuitBreakerResult::Triggered {
                    current_count,
                    previous_count,
                    drop_percent,
                };
            }
        }

        CircuitBreakerResult::Safe {
            current_count,
            previous_count,
        }
    }

    /// `Ok` when the new catalog may be committed.
    pub fn validate(&self, current: &Catalog, previous: Option<&Catalog>) -> Result<()> {
        match self.check(current, previous) {
            CircuitBreakerResult::Safe {
                current_count,
                previous_count,
            } => {
                log::info!(
                    "Circuit breaker: SAFE ({} quests, was {})",
                    current_count,
                    previous_count
                );
                Ok(())
            }
            CircuitBreakerResult::ColdStart { current_count } => {
                log::info!(
                    "Circuit breaker: COLD START ({} quests, no usable baseline)",
                    current_count
                );
                Ok(())
            }
            CircuitBreakerResult::Disabled { current_count } => {
                log::info!("Circuit breaker: DISABLED ({} quests)", current_count);
                Ok(())
            }
            CircuitBreakerResult::Triggered {
                current_count,
                previous_count,
                drop_percent,
            } => {
                log::error!(
                    "Circuit breaker: TRIGGERED! {} → {} quests ({:.1}% drop > {}% threshold)",
                    previous_count,
                    current_count,
                    drop_percent,
                    self.config.max_drop_percent
                );
                Err(AppError::CatalogShrink {
                    current_count,
                    previous_count,
                    drop_percent,
                    threshold_percent: self.config.max_drop_percent,
                })
            }
            CircuitBreakerResult::EmptyResult { previous_count } => {
                log::error!("Circuit breaker: EMPTY RESULT - refusing to commit");
                Err(AppError::CatalogShrink {
                    current_count: 0,
                    previous_count,
                    drop_percent: 100.0,
                    threshold_percent: self.config.max_drop_percent,
                })
            }
        }
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(SyncConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Campaign, QuestKind, QuestRecord};
    use chrono::Utc;

    fn make_catalog(count: usize) -> Catalog {
        let now = Utc::now();
        let records = (0..count)
            .map(|i| {
                QuestRecord::new(
                    Campaign::Prophecies,
                    format!("Quest {i}"),
                    "Ascalon",
                    QuestKind::SideQuest,
                    format!("https://wiki.example/wiki/Quest_{i}"),
                    now,
                )
            })
            .collect();
        Catalog::from_records(1, now, records).unwrap()
    }

    fn breaker() -> CircuitBreaker {
        CircuitBreaker::new(SyncConfig {
            circuit_breaker: true,
            max_drop_percent: 20,
            min_baseline: 10,
        })
    }

    #[test]
    fn test_safe_small_drop() {
        let previous = make_catalog(100);
        assert!(matches!(
            breaker().check(&make_catalog(85), Some(&previous)),
            CircuitBreakerResult::Safe { .. }
        ));
    }

    #[test]
    fn test_triggered_large_drop() {
        let previous = make_catalog(100);
        let result = breaker().validate(&make_catalog(70), Some(&previous));
        assert!(matches!(
            result,
            Err(AppError::CatalogShrink {
                current_count: 70,
                previous_count: 100,
                ..
            })
        ));
    }

    #[test]
    fn test_cold_start() {
        assert!(matches!(
            breaker().check(&make_catalog(50), None),
            CircuitBreakerResult::ColdStart { .. }
        ));
        let small = make_catalog(5);
        assert!(matches!(
            breaker().check(&make_catalog(1), Some(&small)),
            CircuitBreakerResult::ColdStart { .. }
        ));
    }

    #[test]
    fn test_increase_is_safe() {
        let previous = make_catalog(100);
        assert!(breaker().check(&make_catalog(150), Some(&previous)).is_safe());
    }

    #[test]
    fn test_empty_result_trips_even_when_disabled() {
        let previous = make_catalog(3);
        let disabled = CircuitBreaker::new(SyncConfig {
            circuit_breaker: false,
            ..SyncConfig::default()
        });
        assert!(matches!(
            disabled.check(&make_catalog(0), Some(&previous)),
            CircuitBreakerResult::EmptyResult { previous_count: 3 }
        ));
        assert!(matches!(
            disabled.check(&make_catalog(10), Some(&make_catalog(100))),
            CircuitBreakerResult::Disabled { .. }
        ));
    }
}
