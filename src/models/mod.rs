pub mod event;
pub mod identity;
pub mod instance;
pub mod record;

pub use event::UploadEvent;
pub use identity::{ImageId, KeyError, KeyPrefix, ObjectKey};
pub use instance::{BranchSlot, MergedResults, PipelineContext, PipelineInstance, PipelineState};
pub use record::{ImageRecord, ImageRefs};
