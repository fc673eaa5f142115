//! # Credential Renderer
//!
//! Bytes in, bytes out: an [`AttendeeRecord`] plus an optional background
//! image become one PNG ticket.
//!
//! ```text
//! background bytes ──► decode ──► resize_to_fill(W, H) ──► Backdrop (shared)
//!                                                             │
//! record.token ──► qr::encode ─────────────┐                  ▼
//! record.name  ──► layout::layout ──► band + name + code ──► PNG bytes
//! ```
//!
//! A [`Backdrop`] is prepared once per batch and reused for every ticket.
//! Names are set in DejaVu Sans, which ships with the crate; a configured
//! font file replaces it.

use std::fmt;
use std::io::Cursor;
use std::path::Path;

use ab_glyph::{FontArc, PxScale};
use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use tracing::debug;

use crate::error::{RenderError, RenderResult};
use crate::layout::{self, FontMeasure, LayoutParams, TicketLayout};
use crate::qr;
use gatepass_core::AttendeeRecord;

const BAND_COLOR: Rgba<u8> = Rgba([0, 0, 0, 128]);
const NAME_COLOR: Rgba<u8> = Rgba([255, 255, 255, 255]);
const CANVAS_FILL: Rgba<u8> = Rgba([0, 0, 0, 255]);

static BUNDLED_FONT: &[u8] = include_bytes!("../assets/DejaVuSans.ttf");

// =============================================================================
// Options
// =============================================================================

/// Ticket geometry and batch concurrency.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderOptions {
    /// Canvas width in pixels. Default: 400
    pub width: u32,
    /// Canvas height in pixels. Default: 600
    pub height: u32,
    /// QR square size in pixels. Default: 160
    pub code_size: u32,
    /// Starting name size. Default: 28
    pub base_font_px: f32,
    /// Smallest name size before wrapping. Default: 12
    pub min_font_px: f32,
    /// Maximum renders in flight in a batch. Default: 4
    pub concurrency: usize,
}

impl Default for RenderOptions {
    fn default() -> Self {
        RenderOptions {
            width: 400,
            height: 600,
            code_size: 160,
            base_font_px: 28.0,
            min_font_px: 12.0,
            concurrency: 4,
        }
    }
}

impl RenderOptions {
    fn layout_params(&self) -> LayoutParams {
        LayoutParams {
            canvas_width: self.width,
            canvas_height: self.height,
            code_size: self.code_size,
            base_font_px: self.base_font_px,
            min_font_px: self.min_font_px,
        }
    }
}

// =============================================================================
// Blobs
// =============================================================================

/// Encoded image bytes (PNG for rendered tickets).
#[derive(Clone, PartialEq, Eq)]
pub struct ImageBlob(Vec<u8>);

impl ImageBlob {
    pub fn new(bytes: Vec<u8>) -> Self {
        ImageBlob(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for ImageBlob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ImageBlob({} bytes)", self.0.len())
    }
}

/// A decoded, canvas-sized background shared across a batch.
#[derive(Debug, Clone)]
pub struct Backdrop(RgbaImage);

// =============================================================================
// Renderer
// =============================================================================

/// The font used when none is configured.
pub fn bundled_font() -> RenderResult<FontArc> {
    FontArc::try_from_slice(BUNDLED_FONT).map_err(|e| RenderError::Font {
        path: "<bundled DejaVuSans.ttf>".to_string(),
        reason: e.to_string(),
    })
}

/// Loads a TrueType/OpenType font for attendee names.
pub fn load_font(path: &Path) -> RenderResult<FontArc> {
    let font_error = |reason: String| RenderError::Font {
        path: path.display().to_string(),
        reason,
    };
    let bytes = std::fs::read(path).map_err(|e| font_error(e.to_string()))?;
    FontArc::try_from_vec(bytes).map_err(|e| font_error(e.to_string()))
}

/// Renders ticket images.
#[derive(Clone)]
pub struct CredentialRenderer {
    options: RenderOptions,
    font: FontArc,
}

impl fmt::Debug for CredentialRenderer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialRenderer")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl CredentialRenderer {
    /// Creates a renderer that sets names in the bundled font.
    pub fn new(options: RenderOptions) -> RenderResult<Self> {
        Ok(CredentialRenderer {
            options,
            font: bundled_font()?,
        })
    }

    /// Draws attendee names with `font` instead.
    pub fn with_font(mut self, font: FontArc) -> Self {
        self.font = font;
        self
    }

    pub fn options(&self) -> &RenderOptions {
        &self.options
    }

    /// Decodes `background` and scales it to cover the canvas, cropping the
    /// overflow. Without a background the canvas is plain black.
    pub fn prepare_backdrop(&self, background: Option<&ImageBlob>) -> image::ImageResult<Backdrop> {
        let (w, h) = (self.options.width, self.options.height);
        let mut canvas = RgbaImage::from_pixel(w, h, CANVAS_FILL);

        if let Some(blob) = background {
            let scaled = image::load_from_memory(blob.as_bytes())?
                .resize_to_fill(w, h, FilterType::Triangle)
                .to_rgba8();
            imageops::overlay(&mut canvas, &scaled, 0, 0);
        }

        Ok(Backdrop(canvas))
    }

    /// Geometry for a ticket bearing `name`.
    pub fn layout_for(&self, name: &str) -> Result<TicketLayout, String> {
        let params = self.options.layout_params();
        layout::layout(name, &FontMeasure::new(&self.font), &params)
    }

    /// Renders one ticket.
    ///
    /// ## Errors
    /// - [`RenderError::Encode`] if the token cannot be encoded
    /// - [`RenderError::Composite`] if the background is undecodable or the
    ///   name cannot be placed
    pub fn render(
        &self,
        record: &AttendeeRecord,
        background: Option<&ImageBlob>,
    ) -> RenderResult<ImageBlob> {
        let backdrop = self
            .prepare_backdrop(background)
            .map_err(|e| RenderError::composite(&record.name, format!("background: {e}")))?;
        self.render_on(record, &backdrop)
    }

    /// Renders one ticket over an already prepared backdrop.
    pub fn render_on(&self, record: &AttendeeRecord, backdrop: &Backdrop) -> RenderResult<ImageBlob> {
        let code = qr::encode(record.token.as_str(), self.options.code_size)?;
        let geometry = self
            .layout_for(&record.name)
            .map_err(|reason| RenderError::composite(&record.name, reason))?;

        let mut canvas = backdrop.0.clone();

        let band = RgbaImage::from_pixel(geometry.band.width, geometry.band.height, BAND_COLOR);
        imageops::overlay(
            &mut canvas,
            &band,
            i64::from(geometry.band.x),
            i64::from(geometry.band.y),
        );

        self.draw_name(&mut canvas, &geometry);

        let code = DynamicImage::ImageLuma8(code).to_rgba8();
        imageops::replace(
            &mut canvas,
            &code,
            i64::from(geometry.code.x),
            i64::from(geometry.code.y),
        );

        let mut bytes = Vec::new();
        canvas
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .map_err(|e| RenderError::composite(&record.name, format!("png: {e}")))?;

        debug!(
            name = %record.name,
            token = %record.token,
            lines = geometry.name.lines.len(),
            font_px = geometry.name.px,
            bytes = bytes.len(),
            "Rendered ticket"
        );
        Ok(ImageBlob(bytes))
    }

    fn draw_name(&self, canvas: &mut RgbaImage, geometry: &TicketLayout) {
        let scale = PxScale::from(geometry.name.px);
        let center = geometry.band.x as f32 + geometry.band.width as f32 / 2.0;

        for (i, line) in geometry.name.lines.iter().enumerate() {
            let x = (center - line.width / 2.0).round() as i32;
            let y = (geometry.text_top + geometry.line_height * i as u32) as i32;
            imageproc::drawing::draw_text_mut(canvas, NAME_COLOR, x, y, scale, &self.font, &line.text);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatepass_core::Token;

    fn record(name: &str, token: &str) -> AttendeeRecord {
        AttendeeRecord {
            name: name.to_string(),
            token: Token::parse(token).unwrap(),
        }
    }

    fn decode_code(png: &ImageBlob, geometry: &TicketLayout) -> String {
        let img = image::load_from_memory(png.as_bytes()).unwrap().to_luma8();
        let code = imageops::crop_imm(
            &img,
            geometry.code.x,
            geometry.code.y,
            geometry.code.width,
            geometry.code.height,
        )
        .to_image();

        let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(
            code.width() as usize,
            code.height() as usize,
            |x, y| code.get_pixel(x as u32, y as u32).0[0],
        );
        let grids = prepared.detect_grids();
        let (_, content) = grids[0].decode().unwrap();
        content
    }

    fn solid_png(w: u32, h: u32, color: Rgba<u8>) -> ImageBlob {
        let mut bytes = Vec::new();
        RgbaImage::from_pixel(w, h, color)
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        ImageBlob::new(bytes)
    }

    #[test]
    fn test_render_produces_canvas_sized_png() {
        let renderer = CredentialRenderer::new(RenderOptions::default()).unwrap();
        let png = renderer.render(&record("Alice", "tok-alice"), None).unwrap();

        let img = image::load_from_memory(png.as_bytes()).unwrap();
        assert_eq!((img.width(), img.height()), (400, 600));
        // Untouched canvas is black
        assert_eq!(img.to_rgba8().get_pixel(5, 5), &CANVAS_FILL);
    }

    #[test]
    fn test_code_round_trips_to_token() {
        let renderer = CredentialRenderer::new(RenderOptions::default()).unwrap();
        let alice = record("Alice", "3f2b9c1e-5d7a-4c1b-9e2f-8a6b4c3d2e1f");

        let png = renderer.render(&alice, None).unwrap();
        let geometry = renderer.layout_for(&alice.name).unwrap();
        assert_eq!(decode_code(&png, &geometry), alice.token.as_str());
    }

    #[test]
    fn test_background_covers_canvas() {
        let renderer = CredentialRenderer::new(RenderOptions::default()).unwrap();
        let red = Rgba([200, 0, 0, 255]);
        let background = solid_png(100, 80, red);

        let png = renderer
            .render(&record("Alice", "tok"), Some(&background))
            .unwrap();
        let img = image::load_from_memory(png.as_bytes()).unwrap().to_rgba8();
        assert_eq!(img.dimensions(), (400, 600));
        for (x, y) in [(0, 0), (399, 0), (200, 100)] {
            let px = img.get_pixel(x, y).0;
            assert!(px[0] > 190 && px[1] < 10 && px[2] < 10, "got {px:?} at {x},{y}");
        }
    }

    #[test]
    fn test_band_darkens_background() {
        let renderer = CredentialRenderer::new(RenderOptions::default()).unwrap();
        let white = Rgba([255, 255, 255, 255]);
        let background = solid_png(400, 600, white);

        let png = renderer
            .render(&record("Alice", "tok"), Some(&background))
            .unwrap();
        let img = image::load_from_memory(png.as_bytes()).unwrap().to_rgba8();
        let geometry = renderer.layout_for("Alice").unwrap();

        // Inside the band padding, left of the code
        let px = img.get_pixel(geometry.band.x + 2, geometry.band.y + 2);
        assert!(px.0[0] > 100 && px.0[0] < 160, "got {px:?}");
    }

    #[test]
    fn test_undecodable_background_is_composite_error() {
        let renderer = CredentialRenderer::new(RenderOptions::default()).unwrap();
        let junk = ImageBlob::new(b"not an image".to_vec());

        match renderer.render(&record("Alice", "tok"), Some(&junk)) {
            Err(RenderError::Composite { name, .. }) => assert_eq!(name, "Alice"),
            other => panic!("expected composite error, got {other:?}"),
        }
    }

    /// White pixels inside the band on the rows of name line `line`.
    fn lit_pixels_on_line(png: &ImageBlob, geometry: &TicketLayout, line: usize) -> usize {
        let img = image::load_from_memory(png.as_bytes()).unwrap().to_rgba8();
        let top = geometry.text_top + geometry.line_height * line as u32;
        let bottom = (top + geometry.line_height).min(geometry.code.y);
        let band = geometry.band;

        (top..bottom)
            .flat_map(|y| (band.x..band.x + band.width).map(move |x| (x, y)))
            .filter(|&(x, y)| img.get_pixel(x, y).0[0] > 200)
            .count()
    }

    #[test]
    fn test_name_is_drawn_with_bundled_font() {
        let renderer = CredentialRenderer::new(RenderOptions::default()).unwrap();
        let alice = record("Alice", "3f2b9c1e-5d7a-4c1b-9e2f-8a6b4c3d2e1f");

        let png = renderer.render(&alice, None).unwrap();
        let geometry = renderer.layout_for(&alice.name).unwrap();

        assert_eq!(geometry.name.lines.len(), 1);
        assert_eq!(geometry.name.px, 28.0);
        assert!(lit_pixels_on_line(&png, &geometry, 0) > 20);
    }

    #[test]
    fn test_long_name_wraps_and_every_line_is_drawn() {
        let renderer = CredentialRenderer::new(RenderOptions::default()).unwrap();
        let name = "Maximilian Alexander Konstantin von Hohenzollern-Sigmaringen the Third";

        let png = renderer.render(&record(name, "tok"), None).unwrap();
        let geometry = renderer.layout_for(name).unwrap();

        assert_eq!(geometry.name.px, 12.0);
        assert!(geometry.name.lines.len() > 1);
        for line in 0..geometry.name.lines.len() {
            assert!(
                lit_pixels_on_line(&png, &geometry, line) > 0,
                "line {line} ({:?}) is blank",
                geometry.name.lines[line].text
            );
        }
        let joined: Vec<&str> = geometry.name.lines.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(joined.join(" "), name);
    }

    #[test]
    fn test_font_file_replaces_bundled_font() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("assets/DejaVuSans.ttf");
        let renderer = CredentialRenderer::new(RenderOptions::default())
            .unwrap()
            .with_font(load_font(&path).unwrap());

        let png = renderer.render(&record("Bob", "tok-bob"), None).unwrap();
        let geometry = renderer.layout_for("Bob").unwrap();
        assert!(lit_pixels_on_line(&png, &geometry, 0) > 0);
    }

    #[test]
    fn test_missing_font_file_is_font_error() {
        let err = load_font(Path::new("/nonexistent/font.ttf")).unwrap_err();
        assert!(matches!(err, RenderError::Font { .. }));
    }
}
