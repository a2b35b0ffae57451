//! Feedback loop: recommendation history, outcomes and learned context patterns.

mod patterns;
mod recorder;
mod types;

pub use patterns::{decode_list, encode_list, PatternDecodeError, RawPatternRow};
pub(crate) use patterns::{find_raw, recent_successful};
pub use recorder::{FeedbackRecorder, MANUAL_ACTIVATION_REASON};
pub use types::{ContextPattern, FeedbackOutcome, FeedbackStats, RecommendationRecord};
