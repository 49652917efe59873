pub mod exercise;
pub mod job;
pub mod keyframe;
pub mod payload;
pub mod routine;
pub mod segment;
pub mod transcript;

pub use exercise::{Exercise, ExerciseFilter, NewExercise};
pub use job::{CreatedClip, ErrorEnvelope, ItemReport, ItemStatus, Job, JobResult, JobState};
pub use keyframe::{Keyframe, KeyframeMeta};
pub use payload::ExercisePayload;
pub use routine::{NewRoutine, Routine};
pub use segment::{Candidate, RawCandidate};
pub use transcript::{meets_quality_gate, transcript_text, TranscriptSegment};
