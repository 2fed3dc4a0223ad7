//! The plan pipeline: metadata blocks, the host-backed plan store, the
//! on-disk plan folder, and the end-to-end flows (save, enrich, clone,
//! implement, submit, dispatch).

pub mod blocks;
pub mod folder;
pub mod pipeline;
pub mod store;

pub use blocks::{PLAN_LABEL, PlanHeader};
pub use folder::{PlanFolder, Progress};
pub use pipeline::PlanPipeline;
pub use store::{PlanRecord, PlanStore};
