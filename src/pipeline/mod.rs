//! Export orchestration: session state, the static / animated-image / video decision,
//! graceful degradation, and the user-visible status line.

pub mod artifact;
pub mod orchestrator;
pub mod session;
pub mod status;

pub use artifact::{ArtifactKind, ExportArtifact, FileNamer};
pub use orchestrator::{CollagePipeline, ExportFormat, PipelineState, SchedulerFactory};
pub use session::{OutputSummary, Session};
pub use status::StatusBoard;
