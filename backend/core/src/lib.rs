pub mod error;
pub mod prompt;
pub mod traits;
pub mod types;

pub use error::{EstimateError, NO_IMAGES_MESSAGE};
pub use prompt::SURVEY_INSTRUCTION;
pub use traits::{
    Content, EstimationClient, GenerationConfig, InlineData, Part, RequestPayload,
    DEFAULT_BASE_URL, DEFAULT_MODEL,
};
pub use types::{
    ErrorKind, ErrorState, EstimationOutcome, ImageFile, ImageId, PendingImage, Phase,
    SessionState, MAX_IMAGES,
};
