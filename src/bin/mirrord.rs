//! `mirrord`: runs the mirror scheduler in the foreground.
//!
//! The configuration path comes from `MIRRORD_CONFIG` (default `mirror.json`).
//! Log filtering comes from `MIRRORD_LOG` or `RUST_LOG` (default `info`).
//! A `.env` file in the working directory is loaded first.

use mirror_scheduler::config::config_path;
use mirror_scheduler::core::AppResult;
use mirror_scheduler::runtime::run_daemon;
use mirror_scheduler::util::init_tracing;

fn main() -> AppResult<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let path = config_path();
    tracing::info!(config = %path, "starting mirrord");
    run_daemon(&path)
}
