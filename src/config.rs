use crate::models::ConfigReport;
use anyhow::Result;
use clap::{ArgAction, Parser, ValueEnum};
use std::net::{IpAddr, SocketAddr};

/// Environment variables read by BLAS/OpenMP style numeric libraries to size
/// their internal thread pools.
pub const NUMERIC_THREAD_VARS: [&str; 5] = [
    "OMP_NUM_THREADS",
    "MKL_NUM_THREADS",
    "OPENBLAS_NUM_THREADS",
    "VECLIB_MAXIMUM_THREADS",
    "NUMEXPR_NUM_THREADS",
];

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum CacheKeyScope {
    /// Hash only the first 1000 characters of the frame payload.
    Prefix,
    /// Hash the whole frame payload.
    Full,
}

#[derive(Parser, Clone, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: IpAddr,

    #[arg(long, env = "PORT", default_value = "7860")]
    pub port: u16,

    #[arg(
        long,
        env = "DEBUG",
        default_value = "false",
        action = ArgAction::Set,
        value_parser = parse_debug_flag
    )]
    pub debug: bool,

    #[arg(long, env = "DEPLOYMENT", default_value = "huggingface-spaces")]
    pub deployment: String,

    #[arg(long, env = "ANALYZER_URL", default_value = "http://127.0.0.1:5005/analyze")]
    pub analyzer_url: String,

    #[arg(
        long,
        env = "MAX_IMAGE_SIZE",
        default_value = "1024",
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub max_image_size: u32,

    // Reported by /config and /health, never applied to detections.
    #[arg(long, env = "CONFIDENCE_THRESHOLD", default_value = "0.3")]
    pub confidence_threshold: f64,

    #[arg(long, env = "MAX_FACES", default_value = "10")]
    pub max_faces: usize,

    // Reported only; the analyzer call is not bounded by it.
    #[arg(long, env = "TIMEOUT_SECS", default_value = "30")]
    pub timeout_secs: u64,

    #[arg(long, env = "CACHE_SIZE", default_value = "100")]
    pub cache_size: usize,

    #[arg(long, env = "CACHE_KEY_SCOPE", value_enum, default_value = "prefix")]
    pub cache_key_scope: CacheKeyScope,

    #[arg(long, env = "NUMERIC_THREADS", default_value = "2")]
    pub numeric_threads: usize,

    #[arg(long, env = "MAX_BODY_BYTES", default_value = "16777216")]
    pub max_body_bytes: u64,
}

fn parse_debug_flag(value: &str) -> Result<bool, String> {
    Ok(value.trim().eq_ignore_ascii_case("true"))
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self::parse())
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    // Must run before any other thread is spawned.
    pub fn pin_numeric_threads(&self) {
        let threads = self.numeric_threads.to_string();
        for var in NUMERIC_THREAD_VARS {
            std::env::set_var(var, &threads);
        }
    }

    pub fn report(&self) -> ConfigReport {
        ConfigReport {
            max_image_size: self.max_image_size,
            confidence_threshold: self.confidence_threshold,
            max_faces: self.max_faces,
            timeout: self.timeout_secs,
            cache_size: self.cache_size,
        }
    }
}
