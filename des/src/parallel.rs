//! Run independent [`EventLoop`] scenarios concurrently
//!
//! Each scenario is built from its `scenario_id` by a builder closure, run to
//! the requested horizon on a rayon worker, and reduced to the stats of its
//! agents. Results come back in `scenario_id` order regardless of which
//! thread finished first.
//!
//! # Example
//!
//! ```rust
//! use des::parallel::ParallelRunner;
//! # use des::{Agent, EventLoop};
//! # struct Idle;
//! # impl Agent<u8, u8> for Idle {
//! #     fn stats(&self) -> u8 { 1 }
//! # }
//!
//! let results = ParallelRunner::new(20, |_scenario_id| {
//!     let agents: Vec<Box<dyn Agent<u8, u8>>> = vec![Box::new(Idle)];
//!     EventLoop::new(vec![(0, 0)], agents)
//! })
//! .num_threads(2)
//! .run(100);
//!
//! assert_eq!(results.len(), 20);
//! ```
//!
//! # Determinism
//!
//! Scenarios share nothing. As long as the builder derives every seed from
//! `scenario_id`, a batch gives identical results for any thread count.
//!
//! # Failures
//!
//! A panic inside one scenario is caught and reported as `Err(message)` for
//! that scenario only.

use crate::EventLoop;
use rayon::prelude::*;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

type ProgressFn = Arc<dyn Fn(usize, usize) + Send + Sync>;

pub struct ParallelRunner<T, S, F>
where
    F: Fn(usize) -> EventLoop<T, S> + Send + Sync,
    S: Send,
{
    num_scenarios: usize,
    builder: F,
    num_threads: Option<usize>,
    progress_callback: Option<ProgressFn>,
    _marker: PhantomData<fn() -> (T, S)>,
}

impl<T, S, F> ParallelRunner<T, S, F>
where
    F: Fn(usize) -> EventLoop<T, S> + Send + Sync,
    S: Send,
{
    pub fn new(num_scenarios: usize, builder: F) -> Self {
        ParallelRunner {
            num_scenarios,
            builder,
            num_threads: None,
            progress_callback: None,
            _marker: PhantomData,
        }
    }

    /// Use a dedicated pool of `n` threads instead of rayon's global pool
    pub fn num_threads(mut self, n: usize) -> Self {
        self.num_threads = Some(n);
        self
    }

    /// Called with `(completed, total)` each time a scenario finishes
    pub fn progress<P>(mut self, callback: P) -> Self
    where
        P: Fn(usize, usize) + Send + Sync + 'static,
    {
        self.progress_callback = Some(Arc::new(callback));
        self
    }

    /// Run every scenario up to `run_until` and collect agent stats
    pub fn run(self, run_until: usize) -> Vec<Result<Vec<S>, String>> {
        let completed = AtomicUsize::new(0);

        let execute = || {
            (0..self.num_scenarios)
                .into_par_iter()
                .map(|scenario_id| {
                    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                        let mut event_loop = (self.builder)(scenario_id);
                        event_loop.run(run_until);
                        event_loop.stats()
                    }));

                    let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                    if let Some(callback) = &self.progress_callback {
                        callback(done, self.num_scenarios);
                    }

                    result.map_err(|panic| panic_message(panic.as_ref()))
                })
                .collect()
        };

        let pool = self.num_threads.and_then(|n| {
            match rayon::ThreadPoolBuilder::new().num_threads(n).build() {
                Ok(pool) => Some(pool),
                Err(e) => {
                    tracing::warn!(threads = n, error = %e, "falling back to global rayon pool");
                    None
                }
            }
        });

        match pool {
            Some(pool) => pool.install(execute),
            None => execute(),
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Run `num_scenarios` scenarios on the global pool
pub fn run_parallel<T, S, F>(
    num_scenarios: usize,
    builder: F,
    run_until: usize,
) -> Vec<Result<Vec<S>, String>>
where
    F: Fn(usize) -> EventLoop<T, S> + Send + Sync,
    S: Send,
{
    ParallelRunner::new(num_scenarios, builder).run(run_until)
}

/// Progress callback that logs every `interval` completions and the last one
pub fn progress_logger(interval: usize) -> impl Fn(usize, usize) + Send + Sync {
    let interval = interval.max(1);
    move |completed, total| {
        if completed % interval == 0 || completed == total {
            tracing::info!(completed, total, "scenarios finished");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Agent, Response};

    struct Counter {
        id: usize,
        count: usize,
    }

    #[derive(Debug, Clone, PartialEq)]
    struct CounterStats {
        id: usize,
        count: usize,
    }

    impl Agent<(), CounterStats> for Counter {
        fn act(&mut self, current_t: usize, _data: &()) -> Response<(), CounterStats> {
            self.count += 1;
            Response::event(current_t + 1, ())
        }

        fn stats(&self) -> CounterStats {
            CounterStats {
                id: self.id,
                count: self.count,
            }
        }
    }

    fn build(scenario_id: usize) -> EventLoop<(), CounterStats> {
        let agents: Vec<Box<dyn Agent<(), CounterStats>>> = vec![Box::new(Counter {
            id: scenario_id,
            count: 0,
        })];
        EventLoop::new(vec![(0, ())], agents)
    }

    #[test]
    fn results_keep_scenario_order() {
        let results = run_parallel(50, build, 9);

        assert_eq!(results.len(), 50);
        for (i, result) in results.iter().enumerate() {
            let stats = result.as_ref().unwrap();
            assert_eq!(stats[0].id, i);
            assert_eq!(stats[0].count, 10);
        }
    }

    #[test]
    fn repeated_batches_match() {
        let run1 = run_parallel(20, build, 5);
        let run2 = ParallelRunner::new(20, build).num_threads(3).run(5);
        assert_eq!(run1, run2);
    }

    #[test]
    fn panics_are_isolated() {
        let results = run_parallel(
            6,
            |scenario_id| {
                if scenario_id == 2 {
                    panic!("bad scenario");
                }
                build(scenario_id)
            },
            3,
        );

        assert_eq!(results[2], Err("bad scenario".to_string()));
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 5);
    }

    #[test]
    fn progress_sees_every_scenario() {
        use std::sync::Mutex;
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();

        ParallelRunner::new(7, build)
            .progress(move |completed, total| {
                sink.lock().unwrap().push((completed, total));
            })
            .run(1);

        let mut seen = seen.lock().unwrap().clone();
        seen.sort();
        assert_eq!(seen.len(), 7);
        assert_eq!(seen.last(), Some(&(7, 7)));
    }

    #[test]
    fn empty_batch() {
        let results = run_parallel(0, build, 10);
        assert!(results.is_empty());
    }
}
