use image::{DynamicImage, Rgb, RgbImage};
use sha2::{Digest, Sha256};
use thumbpro_contracts::{EditorError, ImageRef};

use super::{EditGateway, EditRequest, EditResult, SuggestionRequest, FALLBACK_SUGGESTIONS};
use crate::transform::{encode, ExportFormat, BASE_HEIGHT, BASE_WIDTH};

/// Offline gateway that paints a flat frame colored by the request.
pub struct DryrunGateway;

impl EditGateway for DryrunGateway {
    fn name(&self) -> &str {
        "dryrun"
    }

    fn edit_or_generate(&self, request: &EditRequest) -> Result<EditResult, EditorError> {
        let (r, g, b) = color_from_request(request);
        let mut frame = RgbImage::new(BASE_WIDTH, BASE_HEIGHT);
        for pixel in frame.pixels_mut() {
            *pixel = Rgb([r, g, b]);
        }
        let png = encode(&DynamicImage::ImageRgb8(frame), ExportFormat::Png)?;
        Ok(EditResult {
            image: ImageRef::from_bytes("image/png", &png),
            caption: format!("Dryrun render for \"{}\".", request.prompt.trim()),
        })
    }

    fn suggest_next_edits(&self, request: &SuggestionRequest) -> anyhow::Result<Vec<String>> {
        let last = request
            .last_prompt
            .as_deref()
            .map(|value| value.trim().to_ascii_lowercase())
            .unwrap_or_default();
        Ok(FALLBACK_SUGGESTIONS
            .iter()
            .filter(|value| value.to_ascii_lowercase() != last)
            .map(|value| value.to_string())
            .collect())
    }
}

fn color_from_request(request: &EditRequest) -> (u8, u8, u8) {
    let mut hasher = Sha256::new();
    hasher.update(request.prompt.as_bytes());
    if let Some(source) = request.source_image.as_ref() {
        hasher.update(source.as_str().as_bytes());
    }
    let digest = hasher.finalize();
    (digest[0], digest[1], digest[2])
}
