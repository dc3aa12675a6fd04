use std::path::PathBuf;

use clap::Parser;
use imgfs::config::DEFAULT_BLOCK_SIZE;

/// Format an imgfs image and optionally pack a host directory into it
#[derive(Parser)]
pub struct Cli {
    /// Output image
    #[arg(long, short)]
    pub out: PathBuf,

    /// Image size in bytes
    #[arg(long, default_value_t = 16 << 20)]
    pub size: u64,

    /// Block size in bytes, a power of two
    #[arg(long, short, default_value_t = DEFAULT_BLOCK_SIZE)]
    pub block_size: u32,

    /// Host directory whose contents are copied into the image
    #[arg(long, short)]
    pub source: Option<PathBuf>,

    /// Directory inside the image receiving the copy
    #[arg(long, short, default_value = "/")]
    pub dest: String,

    /// Owner of the copied files
    #[arg(long, default_value_t = 0)]
    pub uid: u32,

    /// Group of the copied files
    #[arg(long, default_value_t = 0)]
    pub gid: u32,
}
