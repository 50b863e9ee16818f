//! OS-facing adapters: process launching, system probes, and in-memory doubles.

pub mod child;
pub mod memory;
pub mod rsync;
pub mod sysinfo;

pub use child::ChildProcess;
pub use memory::{InMemoryLauncher, InMemoryProcess, StaticProbe};
pub use rsync::{find_transfer_tool, RsyncLauncher};
pub use sysinfo::ProcProbe;
