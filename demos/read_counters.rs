use log::info;
use perf_handle::{clock, CounterHandle};

fn fibonacci(n: u32) -> u32 {
    match n {
        0 => 1,
        1 => 1,
        _ => fibonacci(n - 1) + fibonacci(n - 2),
    }
}

fn main() -> perf_handle::Result<()> {
    env_logger::init();
    clock::check()?;

    // Setup counters
    let handle: CounterHandle = CounterHandle::create()?;

    for run in 0..2 {
        let start_ns = clock::now()?;
        let start = handle.read()?;

        // Workload
        info!("Starting workload. Run {}.", run);
        let fib = fibonacci(25);

        let end = handle.read()?;
        let elapsed_ns = clock::now()? - start_ns;

        let delta = end - start;
        info!("Run {} -> fib={} in {}ns", run, fib, elapsed_ns);
        println!("{}", delta);
        if let (Some(ipc), Some(miss)) = (delta.ipc(), delta.branch_miss_ratio()) {
            println!("ipc={:.3} branch_miss_ratio={:.4}", ipc, miss);
        }
    }

    handle.destroy();
    Ok(())
}
