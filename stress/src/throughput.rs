use num_format::{Locale, ToFormattedString};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

const SLIDING_WINDOW_SIZE: u64 = 2; // In seconds
const BATCH_SIZE: u64 = 1000;

static STOP: AtomicBool = AtomicBool::new(false);

#[repr(C)]
#[derive(Default)]
struct WorkerStats {
    count: AtomicU64,
    /// Padding to avoid false sharing
    padding: [u64; 15],
}

/// Runs `func` in a tight loop on every physical core but one and reports
/// calls per second until Ctrl-C.
///
/// `background`, when given, runs on the remaining thread every `interval`
/// to contend with the workers.
pub fn test_throughput<F, B>(func: F, background: Option<(Duration, B)>)
where
    F: Fn() + Sync + Send + 'static,
    B: Fn() + Send + 'static,
{
    ctrlc::set_handler(move || {
        STOP.store(true, Ordering::SeqCst);
    })
    .expect("Error setting Ctrl-C handler");

    let num_threads = num_cpus::get_physical().max(2);
    println!("Number of threads: {}\n", num_threads);
    let func_arc = Arc::new(func);
    let worker_stats_shared: Arc<Vec<WorkerStats>> =
        Arc::new((0..num_threads).map(|_| WorkerStats::default()).collect());
    let worker_stats_shared_monitor = Arc::clone(&worker_stats_shared);

    let mut handles = Vec::with_capacity(num_threads + 1);

    handles.push(thread::spawn(move || {
        let mut last_collect = Instant::now();
        let mut start_time = Instant::now();
        let mut end_time = start_time;
        let mut total_count_old: u64 = 0;
        loop {
            let elapsed = end_time.duration_since(start_time).as_secs();
            if elapsed >= SLIDING_WINDOW_SIZE {
                let total_count_u64: u64 = worker_stats_shared_monitor
                    .iter()
                    .map(|worker_stat| worker_stat.count.load(Ordering::Relaxed))
                    .sum();
                let current_count = total_count_u64 - total_count_old;
                total_count_old = total_count_u64;
                let throughput = current_count / elapsed;
                println!(
                    "Throughput: {} iterations/sec",
                    throughput.to_formatted_string(&Locale::en)
                );
                start_time = Instant::now();
            }

            if let Some((interval, background)) = &background {
                if last_collect.elapsed() >= *interval {
                    background();
                    last_collect = Instant::now();
                }
            }

            if STOP.load(Ordering::SeqCst) {
                break;
            }

            end_time = Instant::now();
            thread::sleep(Duration::from_millis(50));
        }
    }));

    for thread_index in 0..num_threads - 1 {
        let worker_stats_shared = Arc::clone(&worker_stats_shared);
        let func_arc_clone = Arc::clone(&func_arc);
        handles.push(thread::spawn(move || loop {
            for _ in 0..BATCH_SIZE {
                func_arc_clone();
            }
            worker_stats_shared[thread_index]
                .count
                .fetch_add(BATCH_SIZE, Ordering::Relaxed);
            if STOP.load(Ordering::SeqCst) {
                break;
            }
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }
}
