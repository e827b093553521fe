pub mod events;
pub mod model;
pub mod store;

pub use events::{JobEvent, JobEventBroadcaster};
pub use model::{ConversionJob, JobFailure, JobState};
pub use store::{JobStore, TransitionError};
