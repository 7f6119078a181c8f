use crossbeam_channel::{bounded, unbounded};

/// Number of workers used when none is configured.
pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Runs `f` over `items` on a fixed set of scoped workers.
///
/// Results come back in completion order; callers sort them afterwards.
pub fn map_unordered<T, R, F>(items: Vec<T>, workers: usize, f: F) -> Vec<R>
where
    T: Send,
    R: Send,
    F: Fn(T) -> R + Sync,
{
    if items.is_empty() {
        return Vec::new();
    }
    let workers = workers.clamp(1, items.len());

    // Bounded job queue keeps at most a couple of pending items per worker.
    let (job_tx, job_rx) = bounded::<T>(workers * 2);
    let (out_tx, out_rx) = unbounded::<R>();
    let f = &f;

    std::thread::scope(|scope| {
        for _ in 0..workers {
            let job_rx = job_rx.clone();
            let out_tx = out_tx.clone();
            scope.spawn(move || {
                for item in job_rx.iter() {
                    if out_tx.send(f(item)).is_err() {
                        break;
                    }
                }
            });
        }
        drop(job_rx);
        drop(out_tx);

        for item in items {
            if job_tx.send(item).is_err() {
                break;
            }
        }
        drop(job_tx);

        out_rx.iter().collect()
    })
}
