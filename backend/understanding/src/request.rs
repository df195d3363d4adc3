//! Request assembler: pending images plus instruction into one payload.

use kaitai_core::{
    Content, EstimateError, GenerationConfig, InlineData, Part, PendingImage, RequestPayload,
};
use kaitai_media::data_url_payload;

/// Build the multimodal payload for a set of images.
///
/// The instruction is the first part, followed by one inline-data part per
/// image in collection order. Pure: equal inputs give equal payloads.
pub fn build_request(
    instruction: &str,
    images: &[PendingImage],
) -> Result<RequestPayload, EstimateError> {
    build_request_with(instruction, images, None)
}

/// Like [`build_request`], attaching generation settings when non-empty.
pub fn build_request_with(
    instruction: &str,
    images: &[PendingImage],
    generation: Option<GenerationConfig>,
) -> Result<RequestPayload, EstimateError> {
    if images.is_empty() {
        return Err(EstimateError::no_images());
    }

    let mut parts = Vec::with_capacity(images.len() + 1);
    parts.push(Part::Text {
        text: instruction.to_string(),
    });
    parts.extend(images.iter().map(image_part));

    Ok(RequestPayload {
        contents: vec![Content {
            role: "user".to_string(),
            parts,
        }],
        generation_config: generation.filter(|g| !g.is_empty()),
    })
}

fn image_part(image: &PendingImage) -> Part {
    Part::InlineData {
        inline_data: InlineData {
            mime_type: image.mime_type().to_string(),
            data: data_url_payload(image.preview_data()).to_string(),
        },
    }
}
