//! Task execution abstraction. `Executor::Serial` runs everything on the
//! calling thread (useful for tests and for reproducing a run
//! deterministically); `Executor::WorkerPool` fans individual-granularity
//! work out across a [`ThreadPool`] per §5 ("Parallel fan-out is at
//! individual granularity").

use super::thread_pool::{ThreadPool, WaitGroup};

pub enum Executor {
    Serial,
    WorkerPool(ThreadPool),
}

impl Executor {
    pub fn serial() -> Self {
        Executor::Serial
    }

    pub fn worker_pool(num_workers: usize) -> Self {
        Executor::WorkerPool(ThreadPool::new(num_workers))
    }

    pub fn num_workers(&self) -> usize {
        match self {
            Executor::Serial => 1,
            Executor::WorkerPool(pool) => pool.num_workers(),
        }
    }

    pub fn execute<F, R>(&self, f: F) -> R
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        match self {
            Executor::Serial => f(),
            Executor::WorkerPool(pool) => pool.submit_with_result(f).result(),
        }
    }

    /// Runs every job to completion and returns results in submission order.
    /// This is the `for_each_index` task-graph node from §9: evaluation,
    /// offspring production and reinsertion are each one call to this method.
    pub fn execute_batch<F, R>(&self, f: Vec<F>) -> Vec<R>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        match self {
            Executor::Serial => f.into_iter().map(|func| func()).collect(),
            Executor::WorkerPool(pool) => {
                let wg = WaitGroup::new();
                let mut results = Vec::with_capacity(f.len());
                for job in f {
                    let wg_clone = wg.guard();
                    let result = pool.submit_with_result(move || {
                        let res = job();
                        drop(wg_clone);
                        res
                    });
                    results.push(result);
                }

                wg.wait();

                results.into_iter().map(|r| r.result()).collect()
            }
        }
    }

    pub fn submit<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        match self {
            Executor::Serial => f(),
            Executor::WorkerPool(pool) => pool.submit(f),
        }
    }

    pub fn submit_batch<F>(&self, f: Vec<F>)
    where
        F: FnOnce() + Send + 'static,
    {
        match self {
            Executor::Serial => {
                for func in f {
                    func();
                }
            }
            Executor::WorkerPool(pool) => {
                let wg = WaitGroup::new();
                for job in f {
                    let wg_clone = wg.guard();
                    pool.submit(move || {
                        job();
                        drop(wg_clone);
                    });
                }
                wg.wait();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serial_executor_preserves_order() {
        let exec = Executor::serial();
        let jobs: Vec<_> = (0..5).map(|i| move || i * i).collect();
        let results = exec.execute_batch(jobs);
        assert_eq!(results, vec![0, 1, 4, 9, 16]);
    }

    #[test]
    fn worker_pool_preserves_order() {
        let exec = Executor::worker_pool(4);
        let jobs: Vec<_> = (0..20).map(|i| move || i * 2).collect();
        let results = exec.execute_batch(jobs);
        assert_eq!(results, (0..20).map(|i| i * 2).collect::<Vec<_>>());
    }
}
