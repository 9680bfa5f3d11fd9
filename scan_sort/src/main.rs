use clap::{Args, Parser, Subcommand, ValueEnum};
use itertools::Itertools;
use rand::{Rng, SeedableRng};
use rand_hc::Hc128Rng;
use scan_sort::{
    device::{decode_le, encode_le},
    sequential_scan, sequential_sort, Device, DispatchOrder, HierarchicalScan, HostConfig,
    HostDevice, LookbackScan, RadixSort, ScanStrategy, SortConfig,
};
use std::{error::Error, fs, path::PathBuf, time::Instant};

const SEED: &[u8; 32] = b"LVXn6sWNasjDReRS2OZ9a0eY1aprVNYX";

/// Runs a parallel scan or radix sort and checks it against the host.
#[derive(Parser, Debug)]
#[command(name = "scan_sort", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Blocks the host emulator runs at the same time, at most 16
    #[arg(long, global = true)]
    resident_blocks: Option<usize>,

    /// Order in which the host emulator dispatches blocks
    #[arg(long, value_enum, global = true, default_value_t = Order::Ascending)]
    dispatch: Order,

    /// Seed of the shuffled dispatch order
    #[arg(long, global = true, default_value_t = 0)]
    dispatch_seed: u64,

    /// Run on the CUDA device instead of the host emulator
    #[cfg(feature = "cuda")]
    #[arg(long, global = true)]
    cuda: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Inclusive prefix sum
    Scan {
        #[command(flatten)]
        input: InputArgs,

        #[arg(long, value_enum, default_value_t = Strategy::Auto)]
        strategy: Strategy,
    },
    /// Stable radix sort on the low bits of every key
    Sort {
        #[command(flatten)]
        input: InputArgs,

        /// Number of key bits to sort on
        #[arg(long, default_value_t = scan_sort_gpu::radix::DEFAULT_BITS)]
        bits: u32,
    },
}

#[derive(Args, Debug)]
struct InputArgs {
    /// Number of random elements to generate
    #[arg(long)]
    len: Option<usize>,

    /// Random elements are drawn from 0..max_value
    #[arg(long)]
    max_value: Option<i32>,

    /// Seed of the random input. A fixed seed is used when omitted.
    #[arg(long)]
    seed: Option<u64>,

    /// Read the input as raw little-endian i32s instead of generating it
    #[arg(long)]
    input: Option<PathBuf>,

    /// Write the result as raw little-endian i32s
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Strategy {
    Lookback,
    Hierarchical,
    Auto,
}

impl From<Strategy> for ScanStrategy {
    fn from(strategy: Strategy) -> Self {
        match strategy {
            Strategy::Lookback => ScanStrategy::Lookback,
            Strategy::Hierarchical => ScanStrategy::Hierarchical,
            Strategy::Auto => ScanStrategy::Auto,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Order {
    Ascending,
    Descending,
    Shuffled,
}

impl InputArgs {
    /// Loads the input file or generates `len` random values.
    fn load(&self, default_len: usize, default_max: i32) -> Result<Vec<i32>, Box<dyn Error>> {
        if let Some(path) = &self.input {
            return Ok(decode_le(&fs::read(path)?)?);
        }

        let mut rng = match self.seed {
            Some(seed) => Hc128Rng::seed_from_u64(seed),
            None => Hc128Rng::from_seed(*SEED),
        };
        let max_value = self.max_value.unwrap_or(default_max).max(1);
        Ok((0..self.len.unwrap_or(default_len))
            .map(|_| rng.gen_range(0..max_value))
            .collect())
    }

    fn store(&self, ys: &[i32]) -> Result<(), Box<dyn Error>> {
        if let Some(path) = &self.output {
            fs::write(path, encode_le(ys))?;
        }
        Ok(())
    }
}

fn count_mismatches(expected: &[i32], actual: &[i32]) -> usize {
    expected
        .iter()
        .zip_eq(actual)
        .filter(|(x, y)| x != y)
        .count()
}

fn run_scan<D: Device>(
    device: &D,
    xs: &[i32],
    strategy: ScanStrategy,
) -> Result<Vec<i32>, Box<dyn Error>> {
    let strategy = strategy.resolve(device);
    println!("scan:\t{} elements, {:?}", xs.len(), strategy);

    let now = Instant::now();
    let input = device.upload(xs)?;
    let output = device.alloc_zeroed(xs.len())?;
    println!("\thost -> device:\t{:.2?}", now.elapsed());

    let now = Instant::now();
    let result = match strategy {
        ScanStrategy::Lookback => {
            LookbackScan::new(device, xs.len())?.run(&input, &output)?;
            &output
        }
        _ => {
            HierarchicalScan::new(device, xs.len())?.run(&input)?;
            &input
        }
    };
    println!("\trunning kernels:\t{:.2?}", now.elapsed());

    let now = Instant::now();
    let ys = device.read_back(result)?;
    println!("\tdevice -> host:\t{:.2?}", now.elapsed());
    Ok(ys)
}

fn run_sort<D: Device>(
    device: &D,
    xs: &[i32],
    config: SortConfig,
) -> Result<Vec<i32>, Box<dyn Error>> {
    println!("sort:\t{} keys, {} bits", xs.len(), config.bits());

    let now = Instant::now();
    let mut sort = RadixSort::new(device, xs.len(), config)?;
    sort.load(xs)?;
    println!("\thost -> device:\t{:.2?}", now.elapsed());

    let now = Instant::now();
    for bit in 0..config.bits() {
        sort.run_pass(bit)?;
    }
    println!("\trunning kernels:\t{:.2?}", now.elapsed());

    let now = Instant::now();
    let ys = device.read_back(sort.front())?;
    println!("\tdevice -> host:\t{:.2?}", now.elapsed());
    Ok(ys)
}

fn run<D: Device>(device: &D, command: &Command) -> Result<(), Box<dyn Error>> {
    match command {
        Command::Scan { input, strategy } => {
            let xs = input.load(65536, 100)?;
            let ys = run_scan(device, &xs, (*strategy).into())?;

            let now = Instant::now();
            let expected = sequential_scan(&xs);
            println!("\tsequential:\t{:.2?}", now.elapsed());
            println!("mismatches:\t{}", count_mismatches(&expected, &ys));
            input.store(&ys)
        }
        Command::Sort { input, bits } => {
            let config = SortConfig::new(*bits)?;
            let xs = input.load(64 * 64 * 64, 10000)?;
            let ys = run_sort(device, &xs, config)?;

            let now = Instant::now();
            let expected = sequential_sort(&xs, config.bits());
            println!("\tsequential:\t{:.2?}", now.elapsed());
            println!("mismatches:\t{}", count_mismatches(&expected, &ys));
            input.store(&ys)
        }
    }
}

pub fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let cli = Cli::parse();

    #[cfg(feature = "cuda")]
    if cli.cuda {
        let device = scan_sort::CudaDevice::new()?;
        return run(&device, &cli.command);
    }

    let mut config = HostConfig::default().with_dispatch_order(match cli.dispatch {
        Order::Ascending => DispatchOrder::Ascending,
        Order::Descending => DispatchOrder::Descending,
        Order::Shuffled => DispatchOrder::Shuffled(cli.dispatch_seed),
    });
    if let Some(resident_blocks) = cli.resident_blocks {
        config = config.with_resident_blocks(resident_blocks);
    }
    run(&HostDevice::new(config), &cli.command)
}
