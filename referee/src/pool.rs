//! Bounded worker pool for per-candidate external work.
//!
//! A fixed number of scoped worker threads pull item indices from one shared
//! counter, so queued items start in submission order as slots free up.
//! Results come back in input order regardless of completion order.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;

use anyhow::{Result, anyhow};
use tracing::{debug, warn};

/// Run `task` over `items` with at most `limit` in flight.
///
/// The first failure stops workers from picking up new items; items already
/// running finish. The error of the earliest failed item is returned.
pub fn map_bounded<T, R, F>(items: &[T], limit: usize, task: F) -> Result<Vec<R>>
where
    T: Sync,
    R: Send,
    F: Fn(usize, &T) -> Result<R> + Sync,
{
    if items.is_empty() {
        return Ok(Vec::new());
    }
    let workers = limit.clamp(1, items.len());
    debug!(items = items.len(), workers, "starting worker pool");

    let next = AtomicUsize::new(0);
    let stop = AtomicBool::new(false);
    let slots: Mutex<Vec<Option<Result<R>>>> =
        Mutex::new(items.iter().map(|_| None).collect());

    thread::scope(|scope| {
        for _ in 0..workers {
            scope.spawn(|| {
                loop {
                    if stop.load(Ordering::Acquire) {
                        break;
                    }
                    let index = next.fetch_add(1, Ordering::AcqRel);
                    let Some(item) = items.get(index) else {
                        break;
                    };
                    let outcome = task(index, item);
                    if outcome.is_err() {
                        warn!(index, "pool task failed; no new tasks will start");
                        stop.store(true, Ordering::Release);
                    }
                    if let Ok(mut slots) = slots.lock() {
                        slots[index] = Some(outcome);
                    }
                }
            });
        }
    });

    let slots = slots
        .into_inner()
        .map_err(|_| anyhow!("worker pool result lock poisoned"))?;
    // Indices are claimed in order, so every unstarted slot follows the first failure.
    let mut results = Vec::with_capacity(slots.len());
    for (index, slot) in slots.into_iter().enumerate() {
        match slot {
            Some(Ok(value)) => results.push(value),
            Some(Err(err)) => return Err(err),
            None => return Err(anyhow!("pool task {index} never ran")),
        }
    }
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn empty_input_spawns_nothing() {
        let results: Vec<u32> = map_bounded(&[] as &[u32], 4, |_, item| Ok(*item)).expect("map");
        assert!(results.is_empty());
    }

    #[test]
    fn results_keep_input_order() {
        let items = vec![30u64, 5, 20, 1];
        let results = map_bounded(&items, 4, |index, delay| {
            thread::sleep(Duration::from_millis(*delay));
            Ok(format!("{index}:{delay}"))
        })
        .expect("map");
        assert_eq!(results, vec!["0:30", "1:5", "2:20", "3:1"]);
    }

    #[test]
    fn never_exceeds_limit() {
        let active = AtomicUsize::new(0);
        let peak = AtomicUsize::new(0);
        let items: Vec<usize> = (0..8).collect();
        map_bounded(&items, 2, |_, _| {
            let now = active.fetch_add(1, Ordering::AcqRel) + 1;
            peak.fetch_max(now, Ordering::AcqRel);
            thread::sleep(Duration::from_millis(20));
            active.fetch_sub(1, Ordering::AcqRel);
            Ok(())
        })
        .expect("map");
        assert!(peak.load(Ordering::Acquire) <= 2);
        assert!(peak.load(Ordering::Acquire) >= 1);
    }

    #[test]
    fn zero_limit_still_makes_progress() {
        let results = map_bounded(&[1, 2, 3], 0, |_, item| Ok(item * 2)).expect("map");
        assert_eq!(results, vec![2, 4, 6]);
    }

    #[test]
    fn failure_stops_queue_and_surfaces_error() {
        let started = AtomicUsize::new(0);
        let items: Vec<usize> = (0..6).collect();
        let err = map_bounded(&items, 1, |index, _| {
            started.fetch_add(1, Ordering::AcqRel);
            if index == 1 {
                return Err(anyhow!("candidate {index} failed"));
            }
            Ok(index)
        })
        .expect_err("second item fails");
        assert_eq!(err.to_string(), "candidate 1 failed");
        assert_eq!(started.load(Ordering::Acquire), 2);
    }
}
