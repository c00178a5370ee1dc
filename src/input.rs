//! Provides a means to read, parse and hold configuration options for sweeps.
use clap::{Parser, Subcommand};
use serde_derive::Deserialize;
use std::fs;
use std::net::Ipv4Addr;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "pingsweep",
    version = env!("CARGO_PKG_VERSION"),
    max_term_width = 120,
    help_template = "{bin} {version}\n{about}\n\nUSAGE:\n    {usage}\n\nOPTIONS:\n{options}",
)]
/// Exhaustive, resumable reachability survey of the IPv4 address space.
/// Probes every address in the configured range once, records the outcome
/// in a uniquely-keyed collection, and resumes from the highest recorded
/// address after an interruption. Requires root or CAP_NET_RAW for the
/// ICMP socket.
pub struct Opts {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Path to the SQLite collection holding probe records.
    #[arg(short, long, global = true)]
    pub collection: Option<PathBuf>,

    /// Number of concurrent batch workers.
    #[arg(short, long, default_value = "100")]
    pub pool_size: usize,

    /// Addresses per batch. Each batch is committed with a single bulk
    /// write once every address in it has been probed.
    #[arg(short, long, default_value = "500")]
    pub batch_size: u32,

    /// Extra batches kept queued beyond the worker count so a freed worker
    /// slot never waits for the partitioner.
    #[arg(long, default_value = "10")]
    pub over_feed: usize,

    /// The timeout in milliseconds before an address is recorded as timed
    /// out.
    #[arg(short, long, default_value = "2000")]
    pub timeout: u32,

    /// First address to probe. When omitted the sweep resumes one past the
    /// highest address already in the collection.
    #[arg(long)]
    pub start: Option<Ipv4Addr>,

    /// Last address to probe. Defaults to 255.255.255.255.
    #[arg(long)]
    pub end: Option<Ipv4Addr>,

    /// Whether to ignore the configuration file or not.
    #[arg(short, long)]
    pub no_config: bool,

    /// Custom path to config file
    #[arg(long, value_parser)]
    pub config_path: Option<PathBuf>,

    /// Greppable mode. No progress bar, plain output. Useful for grep or
    /// outputting to a file.
    #[arg(short, long)]
    pub greppable: bool,

    /// Accessible mode. Turns off features which negatively affect screen
    /// readers.
    #[arg(long)]
    pub accessible: bool,
}

/// Actions other than the default sweep.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Bulk-import historical CSV scan exports into the collection.
    Import {
        /// CSV files with ip,error,timeout,unknown_host,response_time rows.
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

#[cfg(not(tarpaulin_include))]
impl Opts {
    pub fn read() -> Self {
        Opts::parse()
    }

    /// Reads the command line arguments into an Opts struct and merge
    /// values found within the user configuration file.
    pub fn merge(&mut self, config: &Config) {
        if !self.no_config {
            self.merge_required(config);
            self.merge_optional(config);
        }
    }

    fn merge_required(&mut self, config: &Config) {
        macro_rules! merge_required {
            ($($field: ident),+) => {
                $(
                    if let Some(e) = &config.$field {
                        self.$field = e.clone();
                    }
                )+
            }
        }

        merge_required!(pool_size, batch_size, over_feed, timeout, greppable, accessible);
    }

    fn merge_optional(&mut self, config: &Config) {
        macro_rules! merge_optional {
            ($($field: ident),+) => {
                $(
                    if config.$field.is_some() {
                        self.$field = config.$field.clone();
                    }
                )+
            }
        }

        merge_optional!(collection, start, end);
    }
}

impl Default for Opts {
    fn default() -> Self {
        Self {
            command: None,
            collection: None,
            pool_size: 0,
            batch_size: 0,
            over_feed: 0,
            timeout: 0,
            start: None,
            end: None,
            no_config: true,
            config_path: None,
            greppable: true,
            accessible: false,
        }
    }
}

/// Struct used to deserialize the options specified within our config file.
/// These will be further merged with our command line arguments in order to
/// generate the final Opts struct.
#[cfg(not(tarpaulin_include))]
#[derive(Debug, Deserialize)]
pub struct Config {
    collection: Option<PathBuf>,
    pool_size: Option<usize>,
    batch_size: Option<u32>,
    over_feed: Option<usize>,
    timeout: Option<u32>,
    start: Option<Ipv4Addr>,
    end: Option<Ipv4Addr>,
    greppable: Option<bool>,
    accessible: Option<bool>,
}

#[cfg(not(tarpaulin_include))]
impl Config {
    /// Reads the configuration file with TOML format and parses it into a
    /// Config struct.
    ///
    /// # Format
    ///
    /// collection = "/var/lib/pingsweep/probes.db"
    /// pool_size = 100
    /// batch_size = 500
    /// over_feed = 10
    /// timeout = 2000
    /// greppable = true
    ///
    pub fn read(custom_config_path: Option<PathBuf>) -> Self {
        let mut content = String::new();
        let config_path = custom_config_path.unwrap_or_else(default_config_path);
        if config_path.exists() {
            content = match fs::read_to_string(config_path) {
                Ok(content) => content,
                Err(_) => String::new(),
            }
        }

        let config: Config = match toml::from_str(&content) {
            Ok(config) => config,
            Err(e) => {
                println!("Found {e} in configuration file.\nAborting sweep.\n");
                std::process::exit(1);
            }
        };

        config
    }
}

/// Constructs default path to config toml
pub fn default_config_path() -> PathBuf {
    let Some(mut config_path) = dirs::home_dir() else {
        panic!("Could not infer config file path.");
    };
    config_path.push(".pingsweep.toml");
    config_path
}

/// Constructs the default path to the probe collection.
pub fn default_collection_path() -> PathBuf {
    let Some(mut path) = dirs::home_dir() else {
        panic!("Could not infer collection path.");
    };
    path.push(".pingsweep");
    path.push("probes.db");
    path
}
