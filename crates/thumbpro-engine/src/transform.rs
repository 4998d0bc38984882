use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use thumbpro_contracts::{EditorError, ImageRef};

/// 16:9 base resolution every upload is normalized to.
pub const BASE_WIDTH: u32 = 1280;
pub const BASE_HEIGHT: u32 = 720;

pub const DEFAULT_JPEG_QUALITY: u8 = 90;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportTier {
    Standard,
    Hd,
    UltraHd,
}

impl ExportTier {
    pub fn dims(self) -> (u32, u32) {
        match self {
            Self::Standard => (BASE_WIDTH, BASE_HEIGHT),
            Self::Hd => (1920, 1080),
            Self::UltraHd => (3840, 2160),
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "" | "standard" | "sd" | "720p" => Some(Self::Standard),
            "hd" | "fhd" | "1080p" => Some(Self::Hd),
            "4k" | "uhd" | "ultra" | "2160p" => Some(Self::UltraHd),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Png,
    Jpeg { quality: u8 },
}

impl ExportFormat {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "" | "png" => Some(Self::Png),
            "jpg" | "jpeg" => Some(Self::Jpeg {
                quality: DEFAULT_JPEG_QUALITY,
            }),
            _ => None,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg { .. } => "jpg",
        }
    }

    pub fn mime(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg { .. } => "image/jpeg",
        }
    }
}

/// Largest centered region of `src` with the target aspect ratio.
///
/// Integer math throughout; a source already at the target aspect keeps its full frame.
pub fn crop_bounds(src_w: u32, src_h: u32, target_w: u32, target_h: u32) -> CropRect {
    let full = CropRect {
        x: 0,
        y: 0,
        width: src_w,
        height: src_h,
    };
    if src_w == 0 || src_h == 0 || target_w == 0 || target_h == 0 {
        return full;
    }

    let (sw, sh, tw, th) = (
        u64::from(src_w),
        u64::from(src_h),
        u64::from(target_w),
        u64::from(target_h),
    );
    let src_scaled = sw * th;
    let target_scaled = sh * tw;

    if src_scaled > target_scaled {
        let width = ((sh * tw + th / 2) / th).clamp(1, sw) as u32;
        CropRect {
            x: (src_w - width) / 2,
            y: 0,
            width,
            height: src_h,
        }
    } else if src_scaled < target_scaled {
        let height = ((sw * th + tw / 2) / tw).clamp(1, sh) as u32;
        CropRect {
            x: 0,
            y: (src_h - height) / 2,
            width: src_w,
            height,
        }
    } else {
        full
    }
}

/// Center-crops to the target aspect and scales to exactly `target_w x target_h`.
pub fn crop_to_aspect(image: &DynamicImage, target_w: u32, target_h: u32) -> DynamicImage {
    let rect = crop_bounds(image.width(), image.height(), target_w, target_h);
    let cropped = image.crop_imm(rect.x, rect.y, rect.width, rect.height);
    if cropped.width() == target_w && cropped.height() == target_h {
        return cropped;
    }
    cropped.resize_exact(target_w, target_h, FilterType::Triangle)
}

/// Scales to `width x height` and re-encodes.
pub fn resize(
    image: &DynamicImage,
    width: u32,
    height: u32,
    format: ExportFormat,
) -> Result<Vec<u8>, EditorError> {
    let scaled = if image.width() == width && image.height() == height {
        image.clone()
    } else {
        image.resize_exact(width, height, FilterType::Triangle)
    };
    encode(&scaled, format)
}

pub fn encode(image: &DynamicImage, format: ExportFormat) -> Result<Vec<u8>, EditorError> {
    let mut bytes = Vec::new();
    match format {
        ExportFormat::Png => {
            image
                .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
                .map_err(|err| EditorError::TransformFailed(format!("png encode failed: {err}")))?;
        }
        ExportFormat::Jpeg { quality } => {
            let flattened = flatten_onto_white(image);
            let mut encoder = JpegEncoder::new_with_quality(&mut bytes, quality.clamp(1, 100));
            encoder
                .encode_image(&DynamicImage::ImageRgb8(flattened))
                .map_err(|err| EditorError::TransformFailed(format!("jpeg encode failed: {err}")))?;
        }
    }
    Ok(bytes)
}

pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage, EditorError> {
    image::load_from_memory(bytes)
        .map_err(|err| EditorError::TransformFailed(format!("image decode failed: {err}")))
}

pub fn decode_image_ref(image: &ImageRef) -> Result<DynamicImage, EditorError> {
    decode_image(&image.decode()?)
}

/// Turns an arbitrary uploaded file into a 16:9 PNG ready for history.
pub fn normalize_upload(bytes: &[u8]) -> Result<ImageRef, EditorError> {
    let decoded = decode_image(bytes)?;
    let framed = crop_to_aspect(&decoded, BASE_WIDTH, BASE_HEIGHT);
    let png = encode(&framed, ExportFormat::Png)?;
    Ok(ImageRef::from_bytes("image/png", &png))
}

/// Holds a gateway frame to 16:9. Frames already at the ratio pass through untouched.
pub fn normalize_result(image: &ImageRef) -> Result<ImageRef, EditorError> {
    let decoded = decode_image_ref(image)?;
    let rect = crop_bounds(decoded.width(), decoded.height(), BASE_WIDTH, BASE_HEIGHT);
    if rect.width == decoded.width() && rect.height == decoded.height() {
        return Ok(image.clone());
    }
    let framed = crop_to_aspect(&decoded, BASE_WIDTH, BASE_HEIGHT);
    let png = encode(&framed, ExportFormat::Png)?;
    Ok(ImageRef::from_bytes("image/png", &png))
}

fn flatten_onto_white(image: &DynamicImage) -> RgbImage {
    let rgba = image.to_rgba8();
    let mut flattened = RgbImage::new(rgba.width(), rgba.height());
    for (x, y, pixel) in rgba.enumerate_pixels() {
        let alpha = u16::from(pixel[3]);
        let blend = |channel: u8| -> u8 {
            (((u16::from(channel) * alpha) + (255 * (255 - alpha))) / 255) as u8
        };
        flattened.put_pixel(x, y, Rgb([blend(pixel[0]), blend(pixel[1]), blend(pixel[2])]));
    }
    flattened
}
