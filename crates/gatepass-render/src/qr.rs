//! QR symbol generation.
//!
//! Tokens are encoded as byte-mode QR at error-correction level M with the
//! standard 4-module quiet zone, then centred on a white square of exactly
//! the requested size so the layout never depends on the token length.
//!
//! Every module gets at least [`MIN_MODULE_PX`] pixels. A token whose symbol
//! would need more room than the square offers is an encode error, never a
//! downscaled code that a reader cannot resolve.

use image::imageops;
use image::{GrayImage, Luma};
use qrcode::{EcLevel, QrCode};

use crate::error::{RenderError, RenderResult};

/// Smallest edge, in pixels, of one QR module.
pub const MIN_MODULE_PX: u32 = 2;

/// Quiet zone modules on each side.
const QUIET_ZONE: u32 = 4;

/// Renders `data` as a `size`×`size` greyscale QR image.
///
/// ## Errors
/// [`RenderError::Encode`] when the data exceeds the capacity of a
/// version-40 symbol at level M, or when the symbol would get fewer than
/// [`MIN_MODULE_PX`] pixels per module at `size`.
pub fn encode(data: &str, size: u32) -> RenderResult<GrayImage> {
    let encode_error = |reason: String| RenderError::Encode {
        token: data.to_string(),
        reason,
    };

    let code = QrCode::with_error_correction_level(data.as_bytes(), EcLevel::M)
        .map_err(|e| encode_error(e.to_string()))?;

    let modules = code.width() as u32 + 2 * QUIET_ZONE;
    let needed = modules * MIN_MODULE_PX;
    if needed > size {
        return Err(encode_error(format!(
            "symbol of {modules} modules needs {needed}px, code size is {size}px"
        )));
    }

    let symbol = code
        .render::<Luma<u8>>()
        .quiet_zone(true)
        .max_dimensions(size, size)
        .build();

    let mut square = GrayImage::from_pixel(size, size, Luma([255]));
    let x = (size - symbol.width().min(size)) / 2;
    let y = (size - symbol.height().min(size)) / 2;
    imageops::replace(&mut square, &symbol, i64::from(x), i64::from(y));
    Ok(square)
}
