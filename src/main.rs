//! # filesieve CLI
//!
//! ```bash
//! filesieve ~/media --alternate /tmp/sieve/dups
//! filesieve ~/media --mode exact --no-cache
//! ```

mod cli;

use filesieve::Result;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("filesieve=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    cli::run()
}
