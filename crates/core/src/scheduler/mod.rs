//! Scheduler: the program runner that drives the queues, plus pause handling,
//! load regulation and periodic maintenance tasks.

mod pause;
mod regulation;
mod runner;
mod tasks;
mod types;

pub use pause::{parse_utc_offset, PauseController, PauseKind, PauseState, PauseWindow};
pub use regulation::{LoadRegulator, LoadSample, LoadSampler, SysinfoSampler};
pub use runner::{ProgramRunner, CONNECTIVITY_REASON};
pub use tasks::{
    check_drift, format_size, load_library_size, update_library_size, LibrarySizeCache,
    SourcePoller,
};
pub use types::{RunnerStatus, SchedulerError, Task};
