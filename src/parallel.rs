//! Fork-join helpers over scoped threads
//!
//! Work is split into contiguous chunks before dispatch and joined before
//! returning, so callers never observe partially finished stages.

use std::thread;

/// Resolve a configured thread count; `0` means one per available core.
pub fn resolve_threads(requested: usize) -> usize {
    if requested > 0 {
        return requested;
    }
    thread::available_parallelism().map(|n| n.get()).unwrap_or(4)
}

/// Run `f(i)` for every `i in 0..count` on up to `threads` workers.
/// Results come back in index order.
pub fn parallel_for<T, F>(count: usize, threads: usize, f: F) -> Vec<T>
where
    T: Send,
    F: Fn(usize) -> T + Sync,
{
    let threads = threads.max(1).min(count.max(1));
    if threads == 1 {
        return (0..count).map(&f).collect();
    }

    let chunk = count.div_ceil(threads);
    let f = &f;
    thread::scope(|scope| {
        let handles: Vec<_> = (0..threads)
            .map(|t| {
                let start = (t * chunk).min(count);
                let end = ((t + 1) * chunk).min(count);
                scope.spawn(move || (start..end).map(f).collect::<Vec<T>>())
            })
            .collect();

        let mut out = Vec::with_capacity(count);
        for handle in handles {
            match handle.join() {
                Ok(part) => out.extend(part),
                Err(panic) => std::panic::resume_unwind(panic),
            }
        }
        out
    })
}

/// Hand each item to its own worker and wait for all of them.
/// Used for disjoint mutable regions such as frame buffer bands.
pub fn parallel_each<I, F, R>(items: Vec<I>, f: F) -> Vec<R>
where
    I: Send,
    R: Send,
    F: Fn(I) -> R + Sync,
{
    if items.len() <= 1 {
        return items.into_iter().map(&f).collect();
    }

    let f = &f;
    thread::scope(|scope| {
        let handles: Vec<_> = items
            .into_iter()
            .map(|item| scope.spawn(move || f(item)))
            .collect();

        handles
            .into_iter()
            .map(|handle| match handle.join() {
                Ok(r) => r,
                Err(panic) => std::panic::resume_unwind(panic),
            })
            .collect()
    })
}
