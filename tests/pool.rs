//! End-to-end pool behavior: submission, backpressure, deadlines, fault
//! containment, scaling, and both shutdown disciplines.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use taskpool::{Config, Pool, PoolBuilder, PoolError, PoolPhase, Task, TaskError};

fn config(min: usize, max: usize) -> Config {
    let mut cfg = Config::default();
    cfg.min_workers = min;
    cfg.max_workers = max;
    // Unbounded unless a test opts into a deadline.
    cfg.task_timeout = Duration::ZERO;
    cfg
}

/// A task that parks until released, signalling once a worker picked it up.
fn blocker(
    started: oneshot::Sender<()>,
    release: oneshot::Receiver<()>,
) -> Task<u32> {
    Task::new(move |_ctx: CancellationToken| async move {
        let _ = started.send(());
        let _ = release.await;
        Ok(1)
    })
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn squares_come_back_complete() {
    let mut cfg = config(2, 2);
    cfg.queue_capacity = 10;
    cfg.task_timeout = Duration::from_secs(1);
    let pool: Pool<u64> = Pool::new(cfg);
    pool.start().unwrap();

    for i in 1..=5u64 {
        pool.submit(Task::new(move |_ctx: CancellationToken| async move {
            Ok(i * i)
        }))
        .unwrap();
    }

    pool.stop_and_wait().await;

    let mut results = pool.results().unwrap();
    let mut values = Vec::new();
    while let Some(result) = results.recv().await {
        values.push(result.outcome.unwrap());
    }
    values.sort_unstable();
    assert_eq!(values, vec![1, 4, 9, 16, 25]);

    let stats = pool.stats();
    assert_eq!(stats.submitted, 5);
    assert_eq!(stats.completed, 5);
    assert_eq!(stats.failed, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn queue_full_rejects_instead_of_blocking() {
    let mut cfg = config(1, 1);
    cfg.queue_capacity = 1;
    let pool: Pool<u32> = Pool::new(cfg);
    pool.start().unwrap();

    let (started_tx, started_rx) = oneshot::channel();
    let (release_tx, release_rx) = oneshot::channel();
    pool.submit(blocker(started_tx, release_rx)).unwrap();
    started_rx.await.unwrap();

    // The worker is busy, so this one occupies the only queue slot.
    pool.submit(Task::new(|_ctx: CancellationToken| async move { Ok(2) }))
        .unwrap();
    let third = pool.submit(Task::new(|_ctx: CancellationToken| async move { Ok(3) }));
    assert!(matches!(third, Err(PoolError::QueueFull)));

    release_tx.send(()).unwrap();
    pool.stop_and_wait().await;
    assert_eq!(pool.stats().completed, 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn deadline_cuts_off_a_slow_task() {
    let mut cfg = config(1, 1);
    cfg.task_timeout = Duration::from_millis(50);
    let pool: Pool<u32> = Pool::new(cfg);
    pool.start().unwrap();

    let result = pool
        .submit_and_wait(Task::new(|ctx: CancellationToken| async move {
            ctx.cancelled().await;
            Err(TaskError::Canceled)
        }))
        .await
        .unwrap();

    assert!(matches!(
        result.outcome,
        Err(TaskError::Timeout { timeout }) if timeout == Duration::from_millis(50)
    ));
    assert!(result.duration >= Duration::from_millis(50));
    assert!(result.duration < Duration::from_millis(200));
    assert_eq!(pool.stats().failed, 1);

    pool.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn a_panicking_task_does_not_kill_the_worker() {
    let faults = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&faults);
    let pool: Pool<u32> = PoolBuilder::new(config(1, 1))
        .with_fault_handler(move |_payload| {
            seen.fetch_add(1, Ordering::Relaxed);
        })
        .build();
    pool.start().unwrap();

    let crashed = pool
        .submit_and_wait(Task::new(|_ctx: CancellationToken| async move {
            panic!("kaboom")
        }))
        .await
        .unwrap();
    assert!(matches!(
        &crashed.outcome,
        Err(TaskError::Aborted { reason }) if reason == "kaboom"
    ));

    // The same worker keeps serving tasks.
    let fine = pool
        .submit_and_wait(Task::new(|_ctx: CancellationToken| async move { Ok(7) }))
        .await
        .unwrap();
    assert_eq!(fine.outcome.unwrap(), 7);

    assert_eq!(faults.load(Ordering::Relaxed), 1);
    let stats = pool.stats();
    assert_eq!(stats.completed, 2);
    assert_eq!(stats.failed, 1);
    pool.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn autoscaler_grows_on_backlog() {
    let mut cfg = config(1, 8);
    cfg.autoscale = true;
    cfg.scale_interval = Duration::from_millis(50);
    cfg.queue_capacity = 1000;
    let pool: Pool<()> = Pool::new(cfg);
    pool.start().unwrap();

    for _ in 0..200 {
        pool.submit(Task::new(|ctx: CancellationToken| async move {
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_millis(200)) => Ok(()),
                _ = ctx.cancelled() => Err(TaskError::Canceled),
            }
        }))
        .unwrap();
    }

    let mut grew = false;
    for _ in 0..100 {
        if pool.size() >= 2 {
            grew = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert!(grew, "autoscaler never added workers");
    assert!(pool.size() <= 8);

    pool.stop().await;
    assert_eq!(pool.size(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn autoscaler_shrinks_back_to_the_floor() {
    let mut cfg = config(1, 4);
    cfg.autoscale = true;
    cfg.scale_interval = Duration::from_millis(30);
    cfg.queue_capacity = 500;
    let pool: Pool<()> = Pool::new(cfg);
    pool.start().unwrap();

    for _ in 0..100 {
        pool.submit(Task::new(|ctx: CancellationToken| async move {
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_millis(20)) => Ok(()),
                _ = ctx.cancelled() => Err(TaskError::Canceled),
            }
        }))
        .unwrap();
    }

    let mut grew = false;
    for _ in 0..100 {
        if pool.size() >= 2 {
            grew = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(30)).await;
    }
    assert!(grew, "autoscaler never added workers");

    // Backlog drains, then idle ticks hand out stop tokens until only the
    // floor remains.
    let mut shrunk = false;
    for _ in 0..200 {
        if pool.stats().completed == 100 && pool.size() == 1 {
            shrunk = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(30)).await;
    }
    assert!(shrunk, "autoscaler never released surplus workers");

    pool.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn stop_and_wait_lets_the_queue_finish() {
    let pool: Pool<u32> = Pool::new(config(2, 2));
    pool.start().unwrap();

    for n in 0..20u32 {
        pool.submit(Task::new(move |_ctx: CancellationToken| async move {
            Ok(n)
        }))
        .unwrap();
    }

    pool.stop_and_wait().await;

    let mut results = pool.results().unwrap();
    let mut seen = 0;
    while let Some(result) = results.recv().await {
        assert!(result.is_success());
        seen += 1;
    }
    assert_eq!(seen, 20);

    let rejected = pool.submit(Task::new(|_ctx: CancellationToken| async move { Ok(0) }));
    assert!(matches!(rejected, Err(PoolError::NotRunning)));
    assert_eq!(pool.phase(), PoolPhase::Stopped);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn bounded_stop_gives_up_on_a_stuck_queue() {
    let mut cfg = config(1, 1);
    cfg.queue_capacity = 8;
    let pool: Pool<u32> = Pool::new(cfg);
    pool.start().unwrap();

    let (started_tx, started_rx) = oneshot::channel();
    pool.submit(Task::new(move |ctx: CancellationToken| async move {
        let _ = started_tx.send(());
        ctx.cancelled().await;
        Err(TaskError::Canceled)
    }))
    .unwrap();
    started_rx.await.unwrap();

    for n in 0..3u32 {
        pool.submit(Task::new(move |_ctx: CancellationToken| async move {
            Ok(n)
        }))
        .unwrap();
    }

    let outcome = pool
        .stop_and_wait_timeout(Duration::from_millis(200))
        .await;
    assert!(matches!(outcome, Err(PoolError::DrainTimeout { .. })));
    assert_eq!(pool.phase(), PoolPhase::Stopped);
    assert_eq!(pool.size(), 0);
    // Only the in-flight task produced an outcome.
    assert_eq!(pool.stats().completed, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_waiters_get_their_own_results() {
    let mut cfg = config(4, 4);
    cfg.queue_capacity = 64;
    let pool: Pool<u64> = Pool::new(cfg);
    pool.start().unwrap();

    let mut handles = Vec::new();
    for n in 1..=16u64 {
        let pool = pool.clone();
        handles.push(tokio::spawn(async move {
            let result = pool
                .submit_and_wait(Task::new(move |_ctx: CancellationToken| async move {
                    Ok(n * 10)
                }))
                .await
                .unwrap();
            (n, result.outcome.unwrap())
        }));
    }
    for handle in handles {
        let (n, value) = handle.await.unwrap();
        assert_eq!(value, n * 10);
    }

    // Waited results were delivered privately, never onto the shared stream.
    let mut results = pool.results().unwrap();
    pool.stop().await;
    assert!(results.recv().await.is_none());
    pool.wait().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn pause_gates_submissions_but_not_execution() {
    let pool: Pool<u32> = Pool::new(config(1, 1));
    pool.start().unwrap();

    let (started_tx, started_rx) = oneshot::channel();
    let (release_tx, release_rx) = oneshot::channel();
    pool.submit(blocker(started_tx, release_rx)).unwrap();
    started_rx.await.unwrap();
    pool.submit(Task::new(|_ctx: CancellationToken| async move { Ok(2) }))
        .unwrap();

    pool.pause().unwrap();
    assert_eq!(pool.phase(), PoolPhase::Paused);
    let rejected = pool.submit(Task::new(|_ctx: CancellationToken| async move { Ok(9) }));
    assert!(matches!(rejected, Err(PoolError::NotRunning)));
    assert!(matches!(pool.pause(), Err(PoolError::NotRunning)));

    // Queued work keeps flowing while paused.
    release_tx.send(()).unwrap();
    let mut results = pool.results().unwrap();
    assert_eq!(results.recv().await.unwrap().outcome.unwrap(), 1);
    assert_eq!(results.recv().await.unwrap().outcome.unwrap(), 2);

    pool.resume().unwrap();
    assert!(matches!(pool.resume(), Err(PoolError::NotPaused)));
    pool.submit(Task::new(|_ctx: CancellationToken| async move { Ok(3) }))
        .unwrap();
    assert_eq!(results.recv().await.unwrap().outcome.unwrap(), 3);

    pool.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn resize_raises_the_floor_immediately() {
    let pool: Pool<()> = Pool::new(config(1, 1));
    pool.start().unwrap();
    assert_eq!(pool.size(), 1);

    pool.resize(3, 5).unwrap();
    assert_eq!(pool.size(), 3);
    let stats = pool.stats();
    assert_eq!(stats.min_workers, 3);
    assert_eq!(stats.max_workers, 5);

    // Bounds are clamped, but running workers are not interrupted.
    pool.resize(0, 0).unwrap();
    let stats = pool.stats();
    assert_eq!(stats.min_workers, 1);
    assert_eq!(stats.max_workers, 1);
    assert_eq!(pool.size(), 3);

    pool.stop().await;
    assert!(matches!(pool.resize(2, 2), Err(PoolError::NotRunning)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn drain_discards_queued_tasks() {
    let mut cfg = config(1, 1);
    cfg.queue_capacity = 16;
    let pool: Pool<u32> = Pool::new(cfg);
    pool.start().unwrap();

    let (started_tx, started_rx) = oneshot::channel();
    let (release_tx, release_rx) = oneshot::channel();
    pool.submit(blocker(started_tx, release_rx)).unwrap();
    started_rx.await.unwrap();

    for n in 0..3u32 {
        pool.submit(Task::new(move |_ctx: CancellationToken| async move {
            Ok(n)
        }))
        .unwrap();
    }
    assert_eq!(pool.drain(), 3);
    assert_eq!(pool.stats().queue_size, 0);

    release_tx.send(()).unwrap();
    pool.stop_and_wait().await;

    let stats = pool.stats();
    assert_eq!(stats.submitted, 4);
    assert_eq!(stats.completed, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn stop_twice_is_a_single_stop() {
    let pool: Pool<u32> = Pool::new(config(2, 2));
    pool.start().unwrap();
    pool.submit(Task::new(|_ctx: CancellationToken| async move { Ok(1) }))
        .unwrap();

    pool.stop().await;
    assert_eq!(pool.phase(), PoolPhase::Stopped);
    pool.stop().await;
    assert_eq!(pool.phase(), PoolPhase::Stopped);

    assert!(matches!(
        pool.submit(Task::new(|_ctx: CancellationToken| async move { Ok(2) })),
        Err(PoolError::NotRunning)
    ));
    assert!(matches!(pool.start(), Err(PoolError::AlreadyStarted)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn lifecycle_gates_before_start() {
    let pool: Pool<u32> = Pool::new(config(1, 1));
    assert_eq!(pool.phase(), PoolPhase::Created);
    assert!(matches!(
        pool.submit(Task::new(|_ctx: CancellationToken| async move { Ok(1) })),
        Err(PoolError::NotRunning)
    ));
    assert!(matches!(pool.pause(), Err(PoolError::NotRunning)));
    assert!(matches!(pool.resume(), Err(PoolError::NotPaused)));
    assert!(matches!(pool.resize(2, 2), Err(PoolError::NotRunning)));

    // The result stream is handed out exactly once.
    assert!(pool.results().is_some());
    assert!(pool.results().is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn parallelism_never_exceeds_the_worker_cap() {
    let mut cfg = config(3, 3);
    cfg.queue_capacity = 100;
    let pool: Pool<()> = Pool::new(cfg);
    pool.start().unwrap();

    let gauge = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    for _ in 0..30 {
        let gauge = Arc::clone(&gauge);
        let peak = Arc::clone(&peak);
        pool.submit(Task::new(move |_ctx: CancellationToken| async move {
            let now = gauge.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            gauge.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        }))
        .unwrap();
    }

    pool.stop_and_wait().await;
    assert!(peak.load(Ordering::SeqCst) <= 3);
    assert_eq!(pool.stats().completed, 30);
    assert_eq!(pool.stats().failed, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn per_task_timeout_overrides_the_default() {
    let mut cfg = config(1, 1);
    cfg.task_timeout = Duration::from_secs(30);
    let pool: Pool<u32> = Pool::new(cfg);
    pool.start().unwrap();

    let result = pool
        .submit_and_wait(
            Task::new(|ctx: CancellationToken| async move {
                ctx.cancelled().await;
                Err(TaskError::Canceled)
            })
            .with_timeout(Duration::from_millis(40)),
        )
        .await
        .unwrap();

    assert!(matches!(
        result.outcome,
        Err(TaskError::Timeout { timeout }) if timeout == Duration::from_millis(40)
    ));
    pool.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn explicit_ids_flow_through_to_results() {
    let pool: Pool<u32> = Pool::new(config(1, 1));
    pool.start().unwrap();

    let result = pool
        .submit_and_wait(
            Task::new(|_ctx: CancellationToken| async move { Ok(5) }).with_id("lookup-42"),
        )
        .await
        .unwrap();
    assert_eq!(result.task_id, "lookup-42");

    pool.stop_and_wait().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn generated_ids_are_sequential_task_numbers() {
    let pool: Pool<u32> = Pool::new(config(1, 1));
    pool.start().unwrap();

    let first = pool
        .submit_and_wait(Task::new(|_ctx: CancellationToken| async move { Ok(0) }))
        .await
        .unwrap();
    assert_eq!(first.task_id, "task-1");
    let second = pool
        .submit_and_wait(Task::new(|_ctx: CancellationToken| async move { Ok(0) }))
        .await
        .unwrap();
    assert_eq!(second.task_id, "task-2");

    pool.stop().await;
}
