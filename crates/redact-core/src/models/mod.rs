//! Values exchanged with the redaction service.

mod job_args;
mod labels;
mod status;
mod types;

pub use job_args::{AreaOfInterest, JobArguments, JobArgumentsBuilder};
pub use labels::{CustomLabels, FrameLabels, JobLabels, Label, LabelType};
pub use status::{JobPostResponse, JobResult, JobState, JobStatus};
pub use types::{InputType, OutputType, Region, ServiceType};
