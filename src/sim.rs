//! Deterministic simulation of a slow sink fed with and without Carousel.
//!
//! Both sinks hold at most `memory_size` queued keys and record one of them
//! every `interval` ticks. The naive sink receives every event; the other
//! one only what the Carousel forwards. Comparing the distinct keys each has
//! recorded shows how well the key space is covered.

use crate::carousel::{Carousel, CarouselConfig, CarouselStats, Sink};
use crate::clock::{Clock, SimulationClock, WallClock};
use crate::drain::spawn_drain;
use crate::error::{CarouselError, Result};
use derive_builder::Builder;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::collections::{HashSet, VecDeque};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Bounded queue drained one key per `interval` ticks.
#[derive(Debug, Clone)]
pub struct SimSink {
    capacity: usize,
    interval: u64,
    queue: VecDeque<String>,
    recorded: HashSet<String>,
    last_drain: u64,
}

impl SimSink {
    pub fn new(capacity: usize, interval: u64) -> Self {
        Self {
            capacity,
            interval,
            queue: VecDeque::with_capacity(capacity),
            recorded: HashSet::new(),
            last_drain: 0,
        }
    }

    /// Record the oldest queued key if a full interval has passed since the
    /// previous one.
    pub fn process(&mut self, now: u64) {
        if self.queue.is_empty()
            || now.saturating_sub(self.last_drain) < self.interval
        {
            return;
        }
        if let Some(key) = self.queue.pop_front() {
            self.recorded.insert(key);
            self.last_drain = now;
        }
    }

    pub fn recorded_keys(&self) -> usize {
        self.recorded.len()
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }
}

impl Sink for SimSink {
    fn forward(&mut self, key: &str, _entry: &str) {
        if self.queue.len() < self.capacity {
            self.queue.push_back(key.to_owned());
        }
    }
}

/// Supplies the keys fed into a simulation.
pub trait KeySource {
    /// Next key, or `None` once the source is exhausted.
    fn next_key(&mut self) -> Result<Option<String>>;
}

/// Uniformly random keys `"0"..key_range`, reproducible from a seed.
pub struct RandomKeys {
    keys: Vec<String>,
    rng: StdRng,
}

impl RandomKeys {
    pub fn new(key_range: usize, seed: u64) -> Result<Self> {
        if key_range == 0 {
            return Err(CarouselError::InvalidConfig(
                "Key range must be > 0".into(),
            ));
        }
        Ok(Self {
            keys: (0..key_range).map(|i| i.to_string()).collect(),
            rng: StdRng::seed_from_u64(seed),
        })
    }
}

impl KeySource for RandomKeys {
    fn next_key(&mut self) -> Result<Option<String>> {
        let idx = self.rng.random_range(0..self.keys.len());
        Ok(Some(self.keys[idx].clone()))
    }
}

/// Keys read from a whitespace separated dataset: the third field of each
/// line is the key. Lines with fewer fields are skipped.
///
/// Lines are read as raw bytes; bytes that are not valid UTF-8 are replaced
/// with U+FFFD instead of failing the read.
pub struct DatasetKeys<R> {
    reader: R,
    buf: Vec<u8>,
}

impl<R: BufRead> DatasetKeys<R> {
    /// Wrap `reader`, discarding the first `skip` lines (headers).
    pub fn new(reader: R, skip: usize) -> Result<Self> {
        let mut keys = Self {
            reader,
            buf: Vec::new(),
        };
        for _ in 0..skip {
            if !keys.read_line()? {
                break;
            }
        }
        Ok(keys)
    }

    fn read_line(&mut self) -> Result<bool> {
        self.buf.clear();
        Ok(self.reader.read_until(b'\n', &mut self.buf)? > 0)
    }
}

impl DatasetKeys<BufReader<File>> {
    pub fn open(path: impl AsRef<Path>, skip: usize) -> Result<Self> {
        let file = File::open(path)?;
        Self::new(BufReader::new(file), skip)
    }
}

impl<R: BufRead> KeySource for DatasetKeys<R> {
    fn next_key(&mut self) -> Result<Option<String>> {
        while self.read_line()? {
            let line = String::from_utf8_lossy(&self.buf);
            if let Some(key) = line.split_whitespace().nth(2) {
                return Ok(Some(key.to_owned()));
            }
        }
        Ok(None)
    }
}

#[derive(Clone, Debug, Builder)]
#[builder(pattern = "owned")]
pub struct SimulationConfig {
    /// Queue size of both sinks, also the Carousel target size
    #[builder(default = "5")]
    pub memory_size: usize,

    /// Ticks between two recorded keys
    #[builder(default = "50")]
    pub interval: u64,

    /// Events generated per tick
    #[builder(default = "10")]
    pub events_per_tick: usize,

    /// Ticks between two samples
    #[builder(default = "200")]
    pub report_every: u64,

    /// Total ticks to simulate
    #[builder(default = "10_000")]
    pub iterations: u64,

    /// Carousel settings; `target_size` is overridden by `memory_size`
    #[builder(default)]
    pub carousel: CarouselConfig,
}

impl SimulationConfig {
    pub fn validate(&self) -> Result<()> {
        if self.memory_size == 0 {
            return Err(CarouselError::InvalidConfig(
                "Memory size must be > 0".into(),
            ));
        }
        if self.report_every == 0 {
            return Err(CarouselError::InvalidConfig(
                "Report interval must be > 0".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SimSample {
    pub iteration: u64,
    pub naive_keys: usize,
    pub carousel_keys: usize,
    pub depth: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct SimReport {
    pub last: SimSample,
    pub ticks: u64,
    pub carousel: CarouselStats,
}

/// Run the naive and the Carousel-fronted sink side by side.
///
/// `on_sample` receives a sample every `report_every` ticks. Stops early
/// when `source` runs dry.
pub fn run_simulation<K, F>(
    config: &SimulationConfig,
    source: &mut K,
    mut on_sample: F,
) -> Result<SimReport>
where
    K: KeySource + ?Sized,
    F: FnMut(&SimSample),
{
    config.validate()?;

    let clock = SimulationClock::new();
    let carousel_config = CarouselConfig {
        target_size: config.memory_size,
        ..config.carousel.clone()
    };
    let mut carousel = Carousel::new(
        carousel_config,
        clock.clone(),
        config.interval,
        SimSink::new(config.memory_size, config.interval),
    )?;
    let mut naive = SimSink::new(config.memory_size, config.interval);

    let sample = |iteration: u64,
                  naive: &SimSink,
                  carousel: &Carousel<SimulationClock, SimSink>| {
        SimSample {
            iteration,
            naive_keys: naive.recorded_keys(),
            carousel_keys: carousel.sink().recorded_keys(),
            depth: carousel.depth(),
        }
    };

    let mut last = sample(0, &naive, &carousel);
    let mut ticks = 0;

    'ticks: for iteration in 0..config.iterations {
        clock.tick();
        ticks += 1;

        for _ in 0..config.events_per_tick {
            let Some(key) = source.next_key()? else {
                info!(iteration, "key source exhausted");
                break 'ticks;
            };
            carousel.log(&key, &key);
            naive.forward(&key, &key);
        }

        let now = clock.now();
        carousel.sink_mut().process(now);
        naive.process(now);

        last = sample(iteration, &naive, &carousel);
        if iteration % config.report_every == 0 {
            on_sample(&last);
        }
    }

    Ok(SimReport {
        last,
        ticks,
        carousel: carousel.stats(),
    })
}

/// Same comparison as [`run_simulation`], on wall-clock time.
///
/// Each iteration lasts `tick` and `config.interval` is counted in ticks.
/// Both sinks are background [`spawn_drain`] workers recording one entry
/// per interval, so samples show what each worker had recorded so far.
/// The final sample is taken after both workers have emptied their queues.
pub fn run_realtime<K, F>(
    config: &SimulationConfig,
    tick: Duration,
    source: &mut K,
    mut on_sample: F,
) -> Result<SimReport>
where
    K: KeySource + ?Sized,
    F: FnMut(&SimSample),
{
    config.validate()?;
    if tick.is_zero() {
        return Err(CarouselError::InvalidConfig("Tick must be > 0".into()));
    }

    let interval =
        tick.saturating_mul(u32::try_from(config.interval).unwrap_or(u32::MAX));
    let (carousel_sink, carousel_worker) =
        spawn_drain(config.memory_size, interval)?;
    let (naive, naive_worker) = spawn_drain(config.memory_size, interval)?;

    let carousel_config = CarouselConfig {
        target_size: config.memory_size,
        ..config.carousel.clone()
    };
    let mut carousel = Carousel::new(
        carousel_config,
        WallClock::new(),
        interval,
        carousel_sink,
    )?;

    let mut ticks = 0;
    let mut deadline = Instant::now();

    'ticks: for iteration in 0..config.iterations {
        ticks += 1;

        for _ in 0..config.events_per_tick {
            let Some(key) = source.next_key()? else {
                info!(iteration, "key source exhausted");
                break 'ticks;
            };
            carousel.log(&key, &key);
            naive.enqueue(&key, &key);
        }

        if iteration % config.report_every == 0 {
            on_sample(&SimSample {
                iteration,
                naive_keys: naive_worker.recorded_keys(),
                carousel_keys: carousel_worker.recorded_keys(),
                depth: carousel.depth(),
            });
        }

        deadline += tick;
        thread::sleep(deadline.saturating_duration_since(Instant::now()));
    }

    let stats = carousel.stats();
    drop(carousel.into_sink());
    drop(naive);

    let carousel_report = carousel_worker.join()?;
    let naive_report = naive_worker.join()?;
    debug!(
        naive_rejected = naive_report.rejected,
        carousel_rejected = carousel_report.rejected,
        "realtime run finished"
    );

    Ok(SimReport {
        last: SimSample {
            iteration: ticks,
            naive_keys: naive_report.recorded_keys.len(),
            carousel_keys: carousel_report.recorded_keys.len(),
            depth: stats.depth,
        },
        ticks,
        carousel: stats,
    })
}
