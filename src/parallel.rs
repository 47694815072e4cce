//! Worker-pool plumbing shared by generation and verification.
//!
//! With the `parallel` feature (default) work items run on Rayon; without it
//! every helper degrades to a plain sequential loop with identical results.
//! Output order always matches input order, so reports are deterministic
//! regardless of which worker finished first.

/// Apply `f` to every item, possibly concurrently, collecting in input order.
pub fn map_ordered<T, R, F>(items: &[T], f: F) -> Vec<R>
where
    T: Sync,
    R: Send,
    F: Fn(&T) -> R + Sync + Send,
{
    #[cfg(feature = "parallel")]
    {
        use rayon::prelude::*;
        items.par_iter().map(f).collect()
    }

    #[cfg(not(feature = "parallel"))]
    {
        items.iter().map(f).collect()
    }
}

/// Run `op` on a pool of `jobs` worker threads.  `0` means the global pool
/// (one thread per CPU).  Nested [`map_ordered`] calls inside `op` share the
/// same pool, so `jobs` bounds the whole run.
pub fn with_jobs<R, OP>(jobs: usize, op: OP) -> R
where
    R: Send,
    OP: FnOnce() -> R + Send,
{
    #[cfg(feature = "parallel")]
    {
        if jobs > 0 {
            match rayon::ThreadPoolBuilder::new().num_threads(jobs).build() {
                Ok(pool) => return pool.install(op),
                Err(e) => tracing::warn!(jobs, error = %e, "could not build worker pool, using the global pool"),
            }
        }
        op()
    }

    #[cfg(not(feature = "parallel"))]
    {
        let _ = jobs;
        op()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_input_order() {
        let items: Vec<u32> = (0..500).collect();
        let out = map_ordered(&items, |x| x * 2);
        assert_eq!(out, items.iter().map(|x| x * 2).collect::<Vec<_>>());
    }

    #[test]
    fn bounded_pool_runs_work() {
        let items = vec!["a", "bb", "ccc"];
        let lens = with_jobs(2, || map_ordered(&items, |s| s.len()));
        assert_eq!(lens, vec![1, 2, 3]);
    }
}
