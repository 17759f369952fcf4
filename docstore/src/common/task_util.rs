use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use std::thread;
use std::thread::available_parallelism;

/// Returns the number of available CPU cores, or 1 if it cannot be detected.
pub fn get_cpu_count() -> usize {
    available_parallelism()
        .map(|p| p.get())
        .unwrap_or_else(|err| {
            log::warn!("Failed to detect available parallelism: {}. Defaulting to single thread.", err);
            1
        })
}

/// Runs `work` over every task on at most `workers` scoped threads.
///
/// Tasks may borrow from the caller. Results come back in task order.
/// A single task, or a single worker, runs on the calling thread.
pub fn run_bounded<T, R, F>(tasks: Vec<T>, workers: usize, work: F) -> Vec<R>
where
    T: Send,
    R: Send,
    F: Fn(T) -> R + Sync,
{
    let count = tasks.len();
    let workers = workers.max(1).min(count);
    if workers <= 1 {
        return tasks.into_iter().map(work).collect();
    }

    let (task_tx, task_rx) = bounded::<(usize, T)>(count);
    let (result_tx, result_rx) = unbounded::<(usize, R)>();
    for task in tasks.into_iter().enumerate() {
        // capacity equals the task count, so this never blocks
        let _ = task_tx.send(task);
    }
    drop(task_tx);

    thread::scope(|scope| {
        for _ in 0..workers {
            let task_rx = task_rx.clone();
            let result_tx = result_tx.clone();
            let work = &work;
            scope.spawn(move || {
                for (index, task) in task_rx.iter() {
                    let _ = result_tx.send((index, work(task)));
                }
            });
        }
    });
    drop(result_tx);

    let mut slots: Vec<Option<R>> = (0..count).map(|_| None).collect();
    for (index, result) in result_rx.try_iter() {
        slots[index] = Some(result);
    }
    slots.into_iter().flatten().collect()
}

/// A fixed number of permits shared by every thread that holds a clone.
///
/// Bounds the work in flight across several [run_bounded] calls that run
/// side by side.
#[derive(Clone)]
pub struct Permits {
    release: Sender<()>,
    take: Receiver<()>,
}

impl Permits {
    pub fn new(count: usize) -> Self {
        let count = count.max(1);
        let (release, take) = bounded(count);
        for _ in 0..count {
            // capacity equals the permit count
            let _ = release.send(());
        }
        Permits { release, take }
    }

    /// Blocks until a permit is free. The permit returns on drop.
    pub fn acquire(&self) -> Permit<'_> {
        // both channel ends live in self, so recv cannot disconnect
        let _ = self.take.recv();
        Permit { permits: self }
    }
}

/// A permit taken from [Permits].
pub struct Permit<'p> {
    permits: &'p Permits,
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        let _ = self.permits.release.send(());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn test_get_cpu_count_positive() {
        assert!(get_cpu_count() > 0);
    }

    #[test]
    fn test_results_keep_task_order() {
        let results = run_bounded((0..20).collect(), 4, |i: i32| {
            std::thread::sleep(Duration::from_millis((20 - i) as u64));
            i * 2
        });
        assert_eq!(results, (0..20).map(|i| i * 2).collect::<Vec<_>>());
    }

    #[test]
    fn test_concurrency_is_bounded() {
        let active = AtomicUsize::new(0);
        let peak = AtomicUsize::new(0);
        run_bounded((0..16).collect::<Vec<i32>>(), 3, |_| {
            let now = active.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(5));
            active.fetch_sub(1, Ordering::SeqCst);
        });
        assert!(peak.load(Ordering::SeqCst) <= 3);
    }

    #[test]
    fn test_tasks_may_borrow_mutably() {
        let mut values = vec![1, 2, 3];
        let tasks: Vec<&mut i32> = values.iter_mut().collect();
        run_bounded(tasks, 2, |v| *v += 10);
        assert_eq!(values, vec![11, 12, 13]);
    }

    #[test]
    fn test_permits_bound_side_by_side_pools() {
        let permits = Permits::new(2);
        let active = AtomicUsize::new(0);
        let peak = AtomicUsize::new(0);
        let work = |_: i32| {
            let _permit = permits.acquire();
            let now = active.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(5));
            active.fetch_sub(1, Ordering::SeqCst);
        };
        std::thread::scope(|scope| {
            scope.spawn(|| run_bounded((0..8).collect(), 2, work));
            scope.spawn(|| run_bounded((0..8).collect(), 2, work));
        });
        assert!(peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(active.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_empty_task_list() {
        let results: Vec<i32> = run_bounded(Vec::<i32>::new(), 4, |i| i);
        assert!(results.is_empty());
    }
}
