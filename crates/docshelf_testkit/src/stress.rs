//! Stress runs for docshelf.
//!
//! These exercise an engine under load and under concurrent access
//! through an `Arc<Engine>`.

use crate::fixtures::scenarios::user;
use docshelf_codec::Value;
use docshelf_core::{Engine, Key, PageOptions, QueryFilter};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Result of a stress test run.
#[derive(Debug, Clone)]
pub struct StressTestResult {
    /// Total operations performed.
    pub total_ops: usize,
    /// Successful operations.
    pub successful_ops: usize,
    /// Failed operations.
    pub failed_ops: usize,
    /// Total duration.
    pub duration: Duration,
    /// Operations per second.
    pub ops_per_second: f64,
}

impl StressTestResult {
    /// Creates a new result.
    #[allow(clippy::cast_precision_loss)]
    pub fn new(successful: usize, failed: usize, duration: Duration) -> Self {
        let total = successful + failed;
        let ops_per_second = if duration.as_secs_f64() > 0.0 {
            total as f64 / duration.as_secs_f64()
        } else {
            0.0
        };

        Self {
            total_ops: total,
            successful_ops: successful,
            failed_ops: failed,
            duration,
            ops_per_second,
        }
    }

    /// Prints a summary of the test.
    pub fn print_summary(&self, name: &str) {
        println!("\n=== {name} ===");
        println!("Total operations: {}", self.total_ops);
        println!("Successful: {}", self.successful_ops);
        println!("Failed: {}", self.failed_ops);
        println!("Duration: {:?}", self.duration);
        println!("Throughput: {:.2} ops/sec", self.ops_per_second);
    }
}

/// Configuration for stress tests.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Number of operations to perform.
    pub operations: usize,
    /// Number of concurrent threads (for concurrent tests).
    pub threads: usize,
    /// Number of distinct records.
    pub record_count: usize,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            operations: 10_000,
            threads: 4,
            record_count: 1_000,
        }
    }
}

fn stress_user(i: usize) -> Value {
    let age = i64::try_from(i % 90).unwrap_or(0);
    user(
        &format!("u{i:06}"),
        &format!("User {i}"),
        &format!("user{i}@example.com"),
        age,
    )
}

/// Fills the `users` store with `config.record_count` users.
pub fn populate_users(engine: &Engine, config: &StressConfig) {
    for i in 0..config.record_count {
        engine
            .put("users", stress_user(i))
            .expect("Failed to populate users");
    }
}

/// Run a sequential write stress test over the `users` store.
pub fn stress_sequential_writes(engine: &Engine, config: &StressConfig) -> StressTestResult {
    let start = Instant::now();
    let mut successful = 0usize;
    let mut failed = 0usize;

    for i in 0..config.operations {
        match engine.put("users", stress_user(i % config.record_count)) {
            Ok(_) => successful += 1,
            Err(_) => failed += 1,
        }
    }

    StressTestResult::new(successful, failed, start.elapsed())
}

/// Run a mixed put/get/query/delete stress test.
pub fn stress_mixed_operations(engine: &Engine, config: &StressConfig) -> StressTestResult {
    let start = Instant::now();
    let mut successful = 0usize;
    let mut failed = 0usize;

    for i in 0..config.operations {
        let idx = i % config.record_count;
        let outcome = match i % 4 {
            0 => engine.put("users", stress_user(idx)).map(|_| ()),
            1 => engine
                .get("users", &Key::from(format!("u{idx:06}")))
                .map(|_| ()),
            2 => engine
                .query(
                    "users",
                    QueryFilter::Gte(Value::Integer(40)),
                    Some("age"),
                    Some(PageOptions::new(1, 10)),
                )
                .map(|_| ()),
            _ => engine.delete("users", &Key::from(format!("u{idx:06}"))),
        };
        match outcome {
            Ok(()) => successful += 1,
            Err(_) => failed += 1,
        }
    }

    StressTestResult::new(successful, failed, start.elapsed())
}

/// Run readers and writers concurrently over one shared engine.
///
/// Writers replace existing users; readers run gets and searches. Every
/// search result must be a whole record.
pub fn stress_concurrent_access(engine: Arc<Engine>, config: &StressConfig) -> StressTestResult {
    populate_users(&engine, config);

    let successful = Arc::new(AtomicUsize::new(0));
    let failed = Arc::new(AtomicUsize::new(0));
    let ops_per_thread = config.operations / config.threads.max(1);

    let start = Instant::now();

    let handles: Vec<_> = (0..config.threads)
        .map(|t| {
            let engine = Arc::clone(&engine);
            let successful = Arc::clone(&successful);
            let failed = Arc::clone(&failed);
            let record_count = config.record_count;

            thread::spawn(move || {
                for i in 0..ops_per_thread {
                    let idx = (t * ops_per_thread + i) % record_count;
                    let ok = if t % 2 == 0 {
                        engine.put("users", stress_user(idx)).is_ok()
                    } else if i % 2 == 0 {
                        engine
                            .get("users", &Key::from(format!("u{idx:06}")))
                            .is_ok_and(|r| r.is_some())
                    } else {
                        engine
                            .search("users", "user 1", Some(1), Some(5))
                            .is_ok_and(|hits| hits.iter().all(|r| r.get("id").is_some()))
                    };
                    if ok {
                        successful.fetch_add(1, Ordering::Relaxed);
                    } else {
                        failed.fetch_add(1, Ordering::Relaxed);
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("Thread panicked");
    }

    StressTestResult::new(
        successful.load(Ordering::Relaxed),
        failed.load(Ordering::Relaxed),
        start.elapsed(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::scenarios::users_schema;

    fn create_test_engine() -> Engine {
        Engine::open_in_memory(users_schema()).expect("Failed to open engine")
    }

    #[test]
    fn test_sequential_writes() {
        let engine = create_test_engine();
        let config = StressConfig {
            operations: 500,
            record_count: 100,
            ..Default::default()
        };

        let result = stress_sequential_writes(&engine, &config);
        assert_eq!(result.failed_ops, 0);
        assert_eq!(engine.count("users").unwrap(), 100);
    }

    #[test]
    fn test_mixed_operations() {
        let engine = create_test_engine();
        let config = StressConfig {
            operations: 1_000,
            record_count: 100,
            ..Default::default()
        };

        let result = stress_mixed_operations(&engine, &config);
        assert_eq!(result.failed_ops, 0);
        assert!(engine.verify().unwrap().is_ok());
    }

    #[test]
    fn test_concurrent_access() {
        let engine = Arc::new(create_test_engine());
        let config = StressConfig {
            operations: 1_000,
            threads: 4,
            record_count: 100,
        };

        let result = stress_concurrent_access(Arc::clone(&engine), &config);
        assert_eq!(result.failed_ops, 0);
        assert_eq!(engine.count("users").unwrap(), 100);
        assert!(engine.verify().unwrap().is_ok());
    }
}
