#![doc = include_str!("../README.md")]

mod inout;
use inout::gen_data;

mod stats;
use stats::{BenchmarkResult, BuildStats, SearchStats};

use std::{hint::black_box, process::ExitCode, time::Instant};

use clap::Parser;
use dyn_size_of::GetSize;
use fks::{BuildConf, BuildError, PerfectHashTable, stats::{AccessCounters, BuildCounters, BuildStatsCollector, BuildStatsPrinter}};
use rand::{rngs::StdRng, SeedableRng};
use rand_pcg::Pcg64Mcg;
use tracing::{error, info};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
/// Benchmark of the FKS static perfect hash table.
pub struct Conf {
    /// The number of random keys to build the table for
    #[arg(short='n', long, default_value_t = 1_000_000)]
    pub keys_num: usize,

    /// Number of foreign keys (not included in the table) used to measure lookups of absent keys
    #[arg(short='f', long, default_value_t = 0)]
    pub foreign_keys_num: usize,

    /// Number of buckets, by default equal to the number of keys
    #[arg(short='b', long)]
    pub table_size: Option<usize>,

    /// Prime modulus of the hash family, by default the smallest prime greater than the largest key
    #[arg(short='m', long)]
    pub modulus: Option<u64>,

    /// Keys are drawn from the range [0, UNIVERSE)
    #[arg(short='u', long, default_value_t = 1<<32)]
    pub universe: u64,

    /// Maximum number of construction attempts
    #[arg(short='a', long, default_value_t = BuildConf::DEFAULT_MAX_ATTEMPTS, value_parser = clap::value_parser!(u32).range(1..))]
    pub max_attempts: u32,

    /// Time (in seconds) of measuring and warming up the CPU cache before measuring lookups
    #[arg(short='t', long, default_value_t = 1)]
    pub time: u16,

    /// Whether to check the validity of the built table
    #[arg(short='v', long, default_value_t = false)]
    pub verify: bool,

    /// Whether to print the construction events
    #[arg(short='p', long, default_value_t = false)]
    pub print_stats: bool,

    /// Whether to draw the hash functions from a generator seeded with SEED instead of the thread-local one
    #[arg(short='d', long, default_value_t = false)]
    pub deterministic: bool,

    /// Seed for random number generators
    #[arg(short='s', long, default_value_t = 1234)]
    pub seed: u64,
}

impl Conf {
    fn build_conf(&self) -> BuildConf {
        BuildConf {
            modulus: self.modulus,
            max_attempts: self.max_attempts,
            ..BuildConf::size(self.table_size.unwrap_or(self.keys_num.max(1)))
        }
    }

    /// Builds the table for `keys` and measures the time of building.
    fn build<BS: BuildStatsCollector>(&self, keys: &[u64], stats: &mut BS) -> Result<(PerfectHashTable, f64), BuildError> {
        let start_moment = Instant::now();
        let built = if self.deterministic {
            PerfectHashTable::try_with_conf_rng_stats(keys, self.build_conf(), &mut StdRng::seed_from_u64(self.seed), stats)
        } else {
            PerfectHashTable::try_with_conf_stats(keys, self.build_conf(), stats)
        };
        let elapsed = start_moment.elapsed().as_secs_f64();
        Ok((built?, elapsed))
    }

    #[inline(always)] fn measure<R, F>(&self, mut f: F) -> f64
     where F: FnMut() -> R
    {
        let mut iters = 1;
        if self.time > 0 {
            let time = Instant::now();
            loop {
                black_box(f());
                if time.elapsed().as_secs() >= self.time as u64 { break; }
                iters += 1;
            }
        }
        let start_moment = Instant::now();
        for _ in 0..iters { black_box(f()); }
        start_moment.elapsed().as_secs_f64() / iters as f64
    }

    /// Measures average lookup time of `keys` and returns it along with the proportion of keys found.
    fn lookups(&self, table: &PerfectHashTable, keys: &[u64]) -> SearchStats {
        if keys.is_empty() { return SearchStats::nan(); }
        let mut counters = AccessCounters::default();
        for key in keys { table.find_stats(*key, &mut counters); }
        let time = self.measure(|| keys.iter().filter(|key| table.find(**key).is_some()).count());
        SearchStats {
            avg_lookup_time: time / keys.len() as f64,
            found: counters.found as f64 / keys.len() as f64
        }
    }
}

fn verify(table: &PerfectHashTable, keys: &[u64], foreign: &[u64]) -> bool {
    let mut valid = true;
    if let Some(key) = keys.iter().find(|key| table.find(**key) != Some(**key)) {
        println!("FAIL: key {} is not found", key);
        valid = false;
    }
    if let Some(key) = foreign.iter().find(|key| table.contains(**key)) {
        println!("FAIL: key {} is found, but it is absent", key);
        valid = false;
    }
    if table.total_size() > fks::SPACE_FACTOR * table.table_size() {
        println!("FAIL: total size {} exceeds {} buckets", table.total_size(), fks::SPACE_FACTOR * table.table_size());
        valid = false;
    }
    if valid { println!("DONE"); }
    valid
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let conf: Conf = Conf::parse();
    let universe = conf.modulus.map_or(conf.universe, |m| m.min(conf.universe));
    if ((conf.keys_num + conf.foreign_keys_num) as u64) > universe {
        error!(universe, "the universe is too small for {} keys and {} foreign keys", conf.keys_num, conf.foreign_keys_num);
        return ExitCode::FAILURE;
    }
    let (keys, foreign) = gen_data(conf.keys_num, conf.foreign_keys_num, universe, &mut Pcg64Mcg::seed_from_u64(conf.seed));
    info!(keys = keys.len(), foreign = foreign.len(), universe, "keys generated");

    let mut counters = BuildCounters::default();
    let built = if conf.print_stats {
        let mut printer = BuildStatsPrinter::stdout();
        conf.build(&keys, &mut (&mut counters, &mut printer))
    } else {
        conf.build(&keys, &mut counters)
    };
    let (table, build_time) = match built {
        Ok(built) => built,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    if conf.verify && !verify(&table, &keys, &foreign) { return ExitCode::FAILURE; }

    let size_bytes = table.size_bytes();
    let result = BenchmarkResult {
        included: conf.lookups(&table, &keys),
        absent: conf.lookups(&table, &foreign),
        size_bytes,
        bits_per_key: if keys.is_empty() { f64::NAN } else { (size_bytes * 8) as f64 / keys.len() as f64 },
        relative_total_size: table.total_size() as f64 / table.table_size() as f64,
        build: BuildStats { time: build_time, counters }
    };
    println!("{}", result);
    ExitCode::SUCCESS
}
