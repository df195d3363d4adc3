pub mod gemini;
pub mod request;

pub use gemini::GeminiClient;
pub use request::{build_request, build_request_with};
