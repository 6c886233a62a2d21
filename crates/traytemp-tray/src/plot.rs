//! Rasterises a [`ChartView`] for the popup.
//!
//! Only the visible day is drawn, with its weekday name and the marker
//! temperatures. Tick labels are left to the host.

use ab_glyph::{Font, FontRef, InvalidFont, PxScale, ScaleFont};
use image::{Rgba, RgbaImage};
use imageproc::drawing::{
    draw_filled_circle_mut, draw_filled_rect_mut, draw_line_segment_mut, draw_text_mut, text_size,
};
use imageproc::rect::Rect;

use crate::chart::{ChartView, Label, Point, Y_MAX, Y_MIN};
use crate::icon;

const BACKGROUND: Rgba<u8> = Rgba([255, 255, 255, 255]);
// Region and freezing-line colours pre-blended onto the white background
const DAY_FILL: Rgba<u8> = Rgba([205, 230, 230, 255]);
const NIGHT_FILL: Rgba<u8> = Rgba([205, 205, 205, 255]);
const FREEZING: Rgba<u8> = Rgba([204, 204, 255, 255]);
const SEPARATOR: Rgba<u8> = Rgba([0, 0, 0, 255]);
const TEMPERATURE: Rgba<u8> = Rgba([255, 0, 0, 255]);
const PRECIPITATION: Rgba<u8> = Rgba([40, 90, 220, 255]);
const CURRENT: Rgba<u8> = Rgba([0, 0, 0, 255]);
const READOUT: Rgba<u8> = Rgba([50, 50, 50, 255]);
const TEXT: Rgba<u8> = Rgba([0, 0, 0, 255]);

/// Lines are drawn this many pixels either side of the true segment
const LINE_HALF_WIDTH: i32 = 1;
const MARKER_RADIUS: i32 = 4;
const LABEL_PX: f32 = 14.0;

/// Maps chart coordinates to pixels for one visible range.
struct Viewport {
    x_min: f64,
    x_max: f64,
    width: u32,
    height: u32,
}

impl Viewport {
    fn to_pixel(&self, p: Point) -> (f32, f32) {
        let sx = (p.x - self.x_min) / (self.x_max - self.x_min) * f64::from(self.width - 1);
        let sy = (Y_MAX - p.y) / (Y_MAX - Y_MIN) * f64::from(self.height - 1);
        (sx as f32, sy as f32)
    }

    fn to_grid(&self, p: Point) -> (i32, i32) {
        let (x, y) = self.to_pixel(p);
        (x.round() as i32, y.round() as i32)
    }

    fn contains_x(&self, x: f64) -> bool {
        x >= self.x_min && x <= self.x_max
    }
}

/// Draw the visible part of `chart` at `width` x `height`.
pub fn render_chart(chart: &ChartView, width: u32, height: u32) -> Result<RgbaImage, InvalidFont> {
    let font = icon::font()?;
    let width = width.max(2);
    let height = height.max(2);
    let (x_min, x_max) = chart.visible_range();
    let view = Viewport {
        x_min,
        x_max,
        width,
        height,
    };

    let mut image = RgbaImage::from_pixel(width, height, BACKGROUND);

    for region in chart.daylight_regions() {
        if region.end <= x_min || region.start >= x_max {
            continue;
        }
        let (left, _) = view.to_grid(Point {
            x: region.start.max(x_min),
            y: Y_MAX,
        });
        let (right, _) = view.to_grid(Point {
            x: region.end.min(x_max),
            y: Y_MAX,
        });
        let fill = if region.daylight { DAY_FILL } else { NIGHT_FILL };
        if let Ok(columns) = u32::try_from(right - left + 1) {
            draw_filled_rect_mut(&mut image, Rect::at(left, 0).of_size(columns, height), fill);
        }
    }

    let [a, b] = chart.freezing_line();
    draw_polyline(&mut image, &view, &[a, b], FREEZING);

    for x in chart.day_separators() {
        if view.contains_x(x) {
            draw_polyline(
                &mut image,
                &view,
                &[Point { x, y: Y_MIN }, Point { x, y: Y_MAX }],
                SEPARATOR,
            );
        }
    }

    for line in chart.precipitation_lines() {
        draw_polyline(&mut image, &view, &line, PRECIPITATION);
    }
    draw_polyline(&mut image, &view, &chart.temperature_line(), TEMPERATURE);

    if let Some(label) = chart.day_labels().get(chart.day()) {
        draw_label(&mut image, &view, &font, label, TEXT);
    }
    if let Some(marker) = chart.current_marker() {
        draw_filled_circle_mut(&mut image, view.to_grid(marker.point), MARKER_RADIUS, CURRENT);
        draw_label(&mut image, &view, &font, &marker.label, CURRENT);
    }
    if let Some(marker) = chart.readout() {
        draw_filled_circle_mut(&mut image, view.to_grid(marker.point), MARKER_RADIUS, READOUT);
        draw_label(&mut image, &view, &font, &marker.label, READOUT);
    }

    Ok(image)
}

fn draw_polyline(image: &mut RgbaImage, view: &Viewport, points: &[Point], color: Rgba<u8>) {
    for pair in points.windows(2) {
        let (x0, y0) = view.to_pixel(pair[0]);
        let (x1, y1) = view.to_pixel(pair[1]);
        for d in -LINE_HALF_WIDTH..=LINE_HALF_WIDTH {
            let d = d as f32;
            draw_line_segment_mut(image, (x0 + d, y0), (x1 + d, y1), color);
            draw_line_segment_mut(image, (x0, y0 + d), (x1, y1 + d), color);
        }
    }
}

/// Text centred on the label's x with its baseline on the label's y.
fn draw_label(
    image: &mut RgbaImage,
    view: &Viewport,
    font: &FontRef<'_>,
    label: &Label,
    color: Rgba<u8>,
) {
    let scale = PxScale::from(LABEL_PX);
    let (text_width, _) = text_size(scale, font, &label.text);
    let ascent = font.as_scaled(scale).ascent();
    let (x, y) = view.to_pixel(Point {
        x: label.x,
        y: label.y,
    });

    let left = (x - text_width as f32 / 2.0).round() as i32;
    let top = (y - ascent).round() as i32;
    draw_text_mut(image, color, left, top, scale, font, &label.text);
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;
    use crate::service::Snapshot;
    use chrono::NaiveDate;
    use std::sync::Arc;
    use traytemp_weather::{weekday_labels, HourSample, TimeSeriesStore};

    fn chart_with(precipitation: impl Fn(i64) -> Option<f64>) -> ChartView {
        let date = NaiveDate::from_ymd_opt(2026, 10, 16).unwrap();
        let samples: Vec<HourSample> = (0..48)
            .map(|h| HourSample {
                hour_index: h,
                temperature: 50.0,
                is_daylight: (7..19).contains(&(h % 24)),
                precipitation_probability: precipitation(h),
            })
            .collect();
        let snapshot = Snapshot {
            series: TimeSeriesStore::from_samples(&samples).unwrap(),
            weekdays: weekday_labels(date),
            date,
            fetched_at: None,
        };
        ChartView::new(Arc::new(snapshot), date.and_hms_opt(12, 0, 0).unwrap())
    }

    fn chart() -> ChartView {
        chart_with(|_| None)
    }

    fn is_dark(p: &Rgba<u8>) -> bool {
        p.0[..3].iter().all(|c| *c < 150)
    }

    #[test]
    fn test_render_has_requested_size() {
        let image = render_chart(&chart(), 640, 320).unwrap();
        assert_eq!(image.dimensions(), (640, 320));
    }

    #[test]
    fn test_render_draws_temperature_line() {
        let image = render_chart(&chart(), 240, 101).unwrap();
        // 50 degrees is the middle row
        assert_eq!(*image.get_pixel(60, 50), TEMPERATURE);
        assert_eq!(*image.get_pixel(60, 51), TEMPERATURE);
        // Top-left is the 00:00 night region
        assert_eq!(*image.get_pixel(2, 2), NIGHT_FILL);
    }

    #[test]
    fn test_render_shades_daylight() {
        let image = render_chart(&chart(), 240, 101).unwrap();
        // Morning, well above the temperature line and clear of the day name
        assert_eq!(*image.get_pixel(90, 5), DAY_FILL);
    }

    #[test]
    fn test_precipitation_is_not_drawn_across_missing_hours() {
        // 20% on hours 0..=3 and 9.., nothing from 4 to 8
        let chart = chart_with(|h| (!(4..=8).contains(&h)).then_some(20.0));
        let image = render_chart(&chart, 240, 101).unwrap();

        // 20% is row 80; hour 2 is column 20, hour 6 column 60
        assert_eq!(*image.get_pixel(20, 80), PRECIPITATION);
        assert_eq!(*image.get_pixel(60, 80), NIGHT_FILL);
    }

    #[test]
    fn test_render_writes_day_name() {
        let image = render_chart(&chart(), 240, 101).unwrap();
        // "Fri" is centred on noon at 90 degrees, its baseline on row 10
        let dark = (0..10)
            .flat_map(|y| (100..140).map(move |x| (x, y)))
            .filter(|(x, y)| is_dark(image.get_pixel(*x, *y)))
            .count();
        assert!(dark > 0);
    }

    #[test]
    fn test_readout_is_drawn() {
        let mut chart = chart();
        let before = render_chart(&chart, 240, 101).unwrap();
        chart.click(3.0).unwrap();
        let after = render_chart(&chart, 240, 101).unwrap();

        // Dot on the temperature line at 3am
        assert_eq!(*after.get_pixel(30, 50), READOUT);
        assert_eq!(*after.get_pixel(32, 50), READOUT);
        assert_ne!(before, after);
    }

    #[test]
    fn test_tiny_sizes_do_not_panic() {
        let image = render_chart(&chart(), 0, 1).unwrap();
        assert_eq!(image.dimensions(), (2, 2));
    }
}
