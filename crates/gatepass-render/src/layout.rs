//! # Ticket Layout
//!
//! Deterministic geometry for one ticket, computed before any pixel is
//! touched.
//!
//! ```text
//!  ┌──────────────────────────────┐  ▲
//!  │                              │  │
//!  │        background            │  │
//!  │     (scaled to cover)        │  │
//!  │                              │  │ canvas height
//!  │     ┌──────────────────┐     │  │
//!  │     │  Alice Example   │◄─── name lines, white, centred
//!  │     │   ┌──────────┐   │     │  │
//!  │     │   │ ▓▓  ▓ ▓▓ │   │◄─── QR code, fixed square
//!  │     │   │ ▓ ▓▓  ▓▓ │   │     │  │
//!  │     │   └──────────┘   │     │  │
//!  │     └──────────────────┘◄─── band: 50 % black, 10 px padding
//!  │              ▲ 20 px         │  │
//!  └──────────────────────────────┘  ▼
//! ```
//!
//! ## Name Policy
//! Names are never truncated:
//! 1. Try the base size, shrinking one pixel at a time down to the floor
//! 2. Still too wide at the floor: wrap at whitespace, or between
//!    characters inside a word that alone is too wide
//! 3. The band grows upward by one line height per extra line
//!
//! Measuring is behind [`TextMeasure`] so the policy is testable without a
//! font file.

use ab_glyph::{FontArc, PxScale};

/// Gap between the band and the canvas bottom edge.
pub const BAND_BOTTOM_MARGIN: u32 = 20;

/// Inner padding of the band.
pub const BAND_PADDING: u32 = 10;

/// Minimum horizontal distance between the band and the canvas edges.
pub const SIDE_MARGIN: u32 = 20;

/// Gap between the last name line and the code.
pub const NAME_GAP: u32 = 5;

/// Measures rendered text width.
pub trait TextMeasure {
    /// Width in pixels of `text` on one line at `px`.
    fn width(&self, text: &str, px: f32) -> f32;

    /// Line advance at `px`.
    fn line_height(&self, px: f32) -> u32 {
        (px * 1.2).ceil() as u32
    }
}

/// Exact widths from a loaded font.
#[derive(Debug, Clone, Copy)]
pub struct FontMeasure<'a> {
    font: &'a FontArc,
}

impl<'a> FontMeasure<'a> {
    pub fn new(font: &'a FontArc) -> Self {
        FontMeasure { font }
    }
}

impl TextMeasure for FontMeasure<'_> {
    fn width(&self, text: &str, px: f32) -> f32 {
        imageproc::drawing::text_size(PxScale::from(px), self.font, text).0 as f32
    }
}

/// Canvas and typography knobs the layout depends on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutParams {
    pub canvas_width: u32,
    pub canvas_height: u32,
    pub code_size: u32,
    pub base_font_px: f32,
    pub min_font_px: f32,
}

/// Axis-aligned pixel rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// One line of the name with its measured width.
#[derive(Debug, Clone, PartialEq)]
pub struct NameLine {
    pub text: String,
    pub width: f32,
}

/// The fitted name: font size and lines.
#[derive(Debug, Clone, PartialEq)]
pub struct FittedName {
    pub px: f32,
    pub lines: Vec<NameLine>,
}

impl FittedName {
    /// Width of the widest line.
    pub fn max_width(&self) -> f32 {
        self.lines.iter().map(|l| l.width).fold(0.0, f32::max)
    }
}

/// Final geometry for one ticket.
#[derive(Debug, Clone, PartialEq)]
pub struct TicketLayout {
    pub band: Rect,
    pub code: Rect,
    pub name: FittedName,
    pub line_height: u32,
    /// Y of the first name line's top.
    pub text_top: u32,
}

/// Fits `name` into `max_width` per the name policy.
pub fn fit_name(
    name: &str,
    measure: &dyn TextMeasure,
    max_width: f32,
    base_px: f32,
    min_px: f32,
) -> FittedName {
    let mut px = base_px.max(min_px);
    loop {
        let width = measure.width(name, px);
        if width <= max_width {
            let lines = if name.is_empty() {
                Vec::new()
            } else {
                vec![NameLine {
                    text: name.to_string(),
                    width,
                }]
            };
            return FittedName { px, lines };
        }
        if px <= min_px {
            break;
        }
        px = (px - 1.0).max(min_px);
    }

    let lines = wrap(name, measure, min_px, max_width)
        .into_iter()
        .map(|text| NameLine {
            width: measure.width(&text, min_px),
            text,
        })
        .collect();
    FittedName { px: min_px, lines }
}

fn wrap(name: &str, measure: &dyn TextMeasure, px: f32, max_width: f32) -> Vec<String> {
    let fits = |s: &str| measure.width(s, px) <= max_width;
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in name.split_whitespace() {
        let candidate = if current.is_empty() {
            word.to_string()
        } else {
            format!("{current} {word}")
        };
        if fits(&candidate) {
            current = candidate;
            continue;
        }
        if !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }
        if fits(word) {
            current = word.to_string();
            continue;
        }

        for ch in word.chars() {
            let mut candidate = current.clone();
            candidate.push(ch);
            // A single glyph always gets a line, even if it overflows.
            if current.is_empty() || fits(&candidate) {
                current = candidate;
            } else {
                lines.push(std::mem::replace(&mut current, ch.to_string()));
            }
        }
    }

    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

/// Computes the ticket geometry for `name`.
///
/// ## Errors
/// Returns a reason string when the band would not fit on the canvas.
pub fn layout(
    name: &str,
    measure: &dyn TextMeasure,
    params: &LayoutParams,
) -> Result<TicketLayout, String> {
    let max_inner = params
        .canvas_width
        .saturating_sub(2 * SIDE_MARGIN + 2 * BAND_PADDING)
        .max(params.code_size);

    let name = fit_name(
        name,
        measure,
        max_inner as f32,
        params.base_font_px,
        params.min_font_px,
    );
    let line_height = measure.line_height(name.px);

    let text_height = line_height * name.lines.len() as u32;
    let gap = if name.lines.is_empty() { 0 } else { NAME_GAP };
    let inner_width = (name.max_width().ceil() as u32).max(params.code_size);

    let band_width = (inner_width + 2 * BAND_PADDING).min(params.canvas_width);
    let band_height = BAND_PADDING + text_height + gap + params.code_size + BAND_PADDING;

    if band_height + BAND_BOTTOM_MARGIN > params.canvas_height {
        return Err(format!(
            "name needs {} lines at {}px, band of {}px exceeds canvas height {}px",
            name.lines.len(),
            name.px,
            band_height,
            params.canvas_height
        ));
    }

    let band = Rect {
        x: (params.canvas_width - band_width) / 2,
        y: params.canvas_height - BAND_BOTTOM_MARGIN - band_height,
        width: band_width,
        height: band_height,
    };
    let code = Rect {
        x: (params.canvas_width - params.code_size) / 2,
        y: band.y + band.height - BAND_PADDING - params.code_size,
        width: params.code_size,
        height: params.code_size,
    };

    Ok(TicketLayout {
        band,
        code,
        text_top: band.y + BAND_PADDING,
        line_height,
        name,
    })
}
