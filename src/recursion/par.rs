use faer::Parallelism;

#[inline]
fn is_parallel(parallelism: Parallelism, n_tasks: usize) -> bool {
    if n_tasks <= 1 {
        return false;
    }
    match parallelism {
        Parallelism::None => false,
        Parallelism::Rayon(n_threads) => n_threads != 1,
        #[allow(unreachable_patterns)]
        _ => false,
    }
}

/// Runs `op` on every task, possibly in parallel, and returns once all of them are done.
pub(crate) fn for_each<T: Send>(
    tasks: Vec<T>,
    parallelism: Parallelism,
    op: impl Send + Sync + Fn(T),
) {
    if is_parallel(parallelism, tasks.len()) {
        use rayon::prelude::*;
        tasks.into_par_iter().for_each(op)
    } else {
        tasks.into_iter().for_each(op)
    }
}

/// Maps `op` over the tasks, possibly in parallel. The outputs keep the order of the tasks.
pub(crate) fn map<T: Send, R: Send>(
    tasks: Vec<T>,
    parallelism: Parallelism,
    op: impl Send + Sync + Fn(T) -> R,
) -> Vec<R> {
    if is_parallel(parallelism, tasks.len()) {
        use rayon::prelude::*;
        tasks.into_par_iter().map(op).collect()
    } else {
        tasks.into_iter().map(op).collect()
    }
}
