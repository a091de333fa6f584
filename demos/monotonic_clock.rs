use log::info;
use perf_handle::clock;
use std::time::Duration;

fn main() -> perf_handle::Result<()> {
    env_logger::init();

    // A missing clock source is a configuration error; give up right away.
    clock::check()?;

    let ns = clock::now()?;
    println!("system time: {}", ns);

    let ticks = clock::ticks();
    let frequency = clock::tick_frequency(Duration::from_millis(50));
    info!("ticks={} frequency={}", ticks, frequency);

    Ok(())
}
