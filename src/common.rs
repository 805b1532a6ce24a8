//! Helpers shared by the subcommands.

use anyhow::{Context, Result};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

/// Read an entire file into a string. The path `-` reads stdin.
pub fn read_to_string(path: &Path) -> Result<String> {
    let mut buffer = String::new();
    if path == Path::new("-") {
        io::stdin()
            .lock()
            .read_to_string(&mut buffer)
            .context("failed to read stdin to string")?;
    } else {
        let mut file =
            File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
        file.read_to_string(&mut buffer)
            .with_context(|| format!("failed to read {} to string", path.display()))?;
    }
    Ok(buffer)
}

/// Set up logging. `RUST_LOG` decides what is printed unless `debug` forces debug output.
pub fn init_logging(debug: bool) {
    let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
    if debug {
        builder.filter_level(log::LevelFilter::Debug);
    }
    // A test harness may have installed a logger already.
    let _ = builder.format_timestamp(None).try_init();
}
