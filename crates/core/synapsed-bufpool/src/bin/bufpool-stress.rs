//! Stress driver: random get/release traffic from several threads against one
//! pool, then a metrics report.
//!
//! Usage: `bufpool-stress [pool.toml]`
//!
//! Pool settings come from the optional TOML file, then `BUFPOOL_*`
//! overrides. Traffic shape comes from `BUFPOOL_STRESS_THREADS`,
//! `BUFPOOL_STRESS_ITERATIONS` and `BUFPOOL_STRESS_HOLD`.
//! `BUFPOOL_LOG_FORMAT=json` switches log output to JSON and
//! `BUFPOOL_REPORT=json` prints the report as JSON.

use anyhow::{bail, Context};
use rand::seq::SliceRandom;
use rand::Rng;
use synapsed_bufpool::config::DEFAULT_ENV_PREFIX;
use synapsed_bufpool::logging::{init_logging, LogFormat};
use synapsed_bufpool::{BufferPool, BufferView, PoolConfig};
use tracing::info;

const SIZES: [usize; 7] = [31, 60, 63, 121, 250, 501, 1001];

#[derive(Debug, Clone, Copy)]
struct StressSettings {
    threads: usize,
    iterations: usize,
    /// Maximum buffers a worker holds at once
    hold: usize,
}

impl StressSettings {
    fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            threads: env_or("BUFPOOL_STRESS_THREADS", 4)?,
            iterations: env_or("BUFPOOL_STRESS_ITERATIONS", 10_000)?,
            hold: env_or("BUFPOOL_STRESS_HOLD", 16)?,
        })
    }
}

fn env_or(name: &str, default: usize) -> anyhow::Result<usize> {
    match std::env::var(name) {
        Ok(raw) => raw.trim().parse().with_context(|| format!("invalid {name}: {raw}")),
        Err(_) => Ok(default),
    }
}

fn load_config() -> anyhow::Result<PoolConfig> {
    let config = match std::env::args().nth(1) {
        Some(path) => PoolConfig::from_file(&path).with_context(|| format!("loading {path}"))?,
        None => PoolConfig::default(),
    };
    Ok(config.apply_env_overrides(DEFAULT_ENV_PREFIX)?)
}

/// One worker's traffic. Every held buffer carries the worker's tag byte;
/// seeing any other byte means two views aliased.
fn run_worker(pool: &BufferPool, worker: usize, settings: StressSettings) -> anyhow::Result<()> {
    let mut rng = rand::thread_rng();
    let tag = u8::try_from(worker % 255 + 1)?;
    let mut held: Vec<BufferView<'_>> = Vec::with_capacity(settings.hold);

    for _ in 0..settings.iterations {
        let release = !held.is_empty() && (held.len() >= settings.hold || rng.gen_bool(0.5));
        if release {
            let view = held.swap_remove(rng.gen_range(0..held.len()));
            let intact = pool.with_bytes(&view, |bytes| bytes.iter().all(|&b| b == tag))?;
            if !intact {
                bail!("worker {worker}: buffer at offset {} was overwritten", view.offset());
            }
            pool.release_buffer(view)?;
        } else {
            let size = *SIZES.choose(&mut rng).unwrap_or(&SIZES[0]);
            let mut view = pool.get_buffer(size)?;
            pool.with_bytes_mut(&mut view, |bytes| bytes.fill(tag))?;
            held.push(view);
        }
    }

    for view in held {
        pool.release_buffer(view)?;
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let format = std::env::var("BUFPOOL_LOG_FORMAT")
        .ok()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(LogFormat::Text);
    init_logging(format, "info");

    let config = load_config()?;
    let settings = StressSettings::from_env()?;
    let pool = BufferPool::with_config(config)?;

    info!(
        threads = settings.threads,
        iterations = settings.iterations,
        hold = settings.hold,
        "Starting buffer pool stress run"
    );

    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..settings.threads)
            .map(|worker| {
                let pool = &pool;
                scope.spawn(move || run_worker(pool, worker, settings))
            })
            .collect();

        handles.into_iter().try_for_each(|handle| match handle.join() {
            Ok(result) => result,
            Err(_) => bail!("stress worker panicked"),
        })
    })?;

    let snapshot = pool.metrics_snapshot();
    if std::env::var("BUFPOOL_REPORT").is_ok_and(|v| v.eq_ignore_ascii_case("json")) {
        println!("{}", snapshot.to_json()?);
    } else {
        println!("{snapshot}");
    }
    Ok(())
}
