//! Capability layer: version control, hosting API, stacked-branch tool,
//! subprocess execution, and time.
//!
//! Each capability is a trait with four concrete variants:
//!
//! - **Real** — executes actual subprocesses (`git`, `gh`, `gt`)
//! - **DryRun** — wraps Real; reads pass through, writes record intent and
//!   return plausible results without mutating anything
//! - **Printing** — wraps any implementation; emits one-line command traces
//!   on stderr
//! - **Fake** — in-memory implementation for tests, with constructor-only
//!   initial state and read-only mutation trackers
//!
//! Business logic receives trait objects and cannot tell the variants
//! apart; `--dry-run` is a wiring decision made once at context
//! construction, not a boolean threaded through call sites.

mod clock;
mod dry_run;
mod fake;
mod git;
mod host;
mod printing;
pub mod runner;
mod stack;

pub use clock::{Clock, FakeClock, SystemClock, retry_with_backoff};
pub use dry_run::{DryRunGit, DryRunHost, DryRunStack, RecordedIntents};
pub use fake::{FakeGit, FakeGitBuilder, FakeHost, FakeHostBuilder, FakeStack};
pub use git::{FileStatus, Git, RealGit, WorktreeInfo};
pub use host::{
    GhHost, Host, Issue, IssueComment, IssueRef, IssueState, PullRequest, WorkflowRun,
};
pub use printing::{PrintingGit, PrintingHost, PrintingStack};
pub use stack::{GraphiteStack, Stack};
