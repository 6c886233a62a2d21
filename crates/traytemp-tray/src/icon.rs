//! Tray icon rendering.
//!
//! The icon is the rounded temperature in white on a transparent square,
//! drawn with the embedded DejaVu Sans Mono Bold face.

use ab_glyph::{Font, FontRef, InvalidFont, PxScale, ScaleFont};
use image::{ImageFormat, Rgba, RgbaImage};
use imageproc::drawing::{draw_text_mut, text_size};
use std::io::Cursor;

pub const ICON_SIZE: u32 = 32;

/// Clear columns kept on each side of the label
const MARGIN: u32 = 2;

const FOREGROUND: Rgba<u8> = Rgba([255, 255, 255, 255]);

static FONT_DATA: &[u8] = include_bytes!("../assets/DejaVuSansMono-Bold.ttf");

/// The face used for the icon and chart text.
pub fn font() -> Result<FontRef<'static>, InvalidFont> {
    FontRef::try_from_slice(FONT_DATA)
}

/// Text shown on the icon: the temperature rounded to a whole degree.
pub fn temperature_label(temperature: f64) -> String {
    let rounded = temperature.round() as i64;
    rounded.to_string()
}

/// Render the icon for `temperature`.
pub fn render_icon(temperature: f64) -> Result<RgbaImage, InvalidFont> {
    render_text(&temperature_label(temperature))
}

/// Render `text` centred on a transparent icon, as large as fits.
pub fn render_text(text: &str) -> Result<RgbaImage, InvalidFont> {
    let font = font()?;
    let mut image = RgbaImage::new(ICON_SIZE, ICON_SIZE);
    if text.is_empty() {
        return Ok(image);
    }

    let available = ICON_SIZE - 2 * MARGIN;
    let full = ICON_SIZE as f32;
    let (full_width, _) = text_size(PxScale::from(full), &font, text);
    let px = if full_width > available {
        full * available as f32 / full_width as f32
    } else {
        full
    };
    let scale = PxScale::from(px);
    let (width, height) = text_size(scale, &font, text);

    // Glyphs are placed with their baseline `ascent` below `y`; digits sit on
    // the baseline, so centring their ink means shifting by the ascent
    let ascent = font.as_scaled(scale).ascent();
    let x = ICON_SIZE.saturating_sub(width) / 2;
    let top = ICON_SIZE.saturating_sub(height) as f32 / 2.0;
    let y = (top + height as f32 - ascent).round() as i32;

    draw_text_mut(&mut image, FOREGROUND, x as i32, y, scale, &font, text);
    Ok(image)
}

/// PNG bytes for `image`.
pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>, image::ImageError> {
    let mut bytes = Vec::new();
    image.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
    Ok(bytes)
}
