//! Deterministic index chart rendering.
//!
//! Lays out a matplotlib-style figure with plain pixel work: the data
//! grid at 1:1 scale, a framed plot area with tick marks and numeric
//! labels, a vertical colorbar with value ticks, a title, and COLUMN/ROW
//! axis labels, all on a white canvas. No randomness, no timestamps:
//! the same plane renders to the same bytes every time.

use image::{Rgba, RgbaImage};
use tracing::debug;

use super::colormap::ColorRamp;
use super::font;
use crate::raster::BandPlane;

const MARGIN_LEFT: u32 = 56;
const MARGIN_TOP: u32 = 28;
const MARGIN_BOTTOM: u32 = 46;
const COLORBAR_GAP: u32 = 14;
const COLORBAR_WIDTH: u32 = 16;
const COLORBAR_LABEL_SPACE: u32 = 52;
const TICK_LEN: u32 = 4;
const TICK_COUNT: u32 = 5;

const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);

/// Render one index plane as an annotated chart.
///
/// Pixels equal to 0 or NaN are nodata and left on the white background;
/// everything else is clamped to `[vmin, vmax]` and mapped through the
/// ramp.
pub fn render_index_chart(
    plane: &BandPlane,
    ramp: &ColorRamp,
    vmin: f32,
    vmax: f32,
    title: &str,
) -> RgbaImage {
    let plot_w = plane.width.max(1);
    let plot_h = plane.height.max(1);
    let canvas_w = MARGIN_LEFT + plot_w + COLORBAR_GAP + COLORBAR_WIDTH + COLORBAR_LABEL_SPACE;
    let canvas_h = MARGIN_TOP + plot_h + MARGIN_BOTTOM;

    let mut img = RgbaImage::from_pixel(canvas_w, canvas_h, WHITE);
    let span = vmax - vmin;

    // Data grid.
    for row in 0..plane.height {
        for col in 0..plane.width {
            let v = plane.get(col, row);
            if v == 0.0 || v.is_nan() {
                continue;
            }
            let t = (v.clamp(vmin, vmax) - vmin) / span;
            let [r, g, b] = ramp.sample(t);
            img.put_pixel(MARGIN_LEFT + col, MARGIN_TOP + row, Rgba([r, g, b, 255]));
        }
    }

    draw_frame(&mut img, MARGIN_LEFT, MARGIN_TOP, plot_w, plot_h);
    draw_axis_ticks(&mut img, plot_w, plot_h);
    draw_colorbar(&mut img, plot_w, plot_h, ramp, vmin, vmax);

    // Title centered over the plot area.
    let title_x = MARGIN_LEFT + (plot_w.saturating_sub(font::text_width(title))) / 2;
    font::draw_text(&mut img, title_x, (MARGIN_TOP - font::GLYPH_HEIGHT) / 2, title, BLACK);

    // Axis labels: COLUMN below the tick labels, ROW stacked on the left.
    let column_label = "COLUMN";
    let col_x = MARGIN_LEFT + (plot_w.saturating_sub(font::text_width(column_label))) / 2;
    font::draw_text(
        &mut img,
        col_x,
        MARGIN_TOP + plot_h + TICK_LEN + font::GLYPH_HEIGHT + 10,
        column_label,
        BLACK,
    );
    let row_label = "ROW";
    let row_label_h = 3 * font::LINE_ADVANCE;
    font::draw_text_vertical(
        &mut img,
        4,
        MARGIN_TOP + (plot_h.saturating_sub(row_label_h)) / 2,
        row_label,
        BLACK,
    );

    debug!(
        title,
        ramp = ramp.name(),
        width = plane.width,
        height = plane.height,
        "index chart rendered"
    );

    img
}

fn draw_frame(img: &mut RgbaImage, x: u32, y: u32, w: u32, h: u32) {
    // Frame sits just outside the data so it never covers samples.
    let left = x.saturating_sub(1);
    let top = y.saturating_sub(1);
    let right = x + w;
    let bottom = y + h;
    hline(img, left, right, top, BLACK);
    hline(img, left, right, bottom, BLACK);
    vline(img, left, top, bottom, BLACK);
    vline(img, right, top, bottom, BLACK);
}

fn draw_axis_ticks(img: &mut RgbaImage, plot_w: u32, plot_h: u32) {
    for i in 0..TICK_COUNT {
        // Column ticks along the bottom edge.
        let col = (i * (plot_w - 1)) / (TICK_COUNT - 1).max(1);
        let x = MARGIN_LEFT + col;
        let y0 = MARGIN_TOP + plot_h + 1;
        vline(img, x, y0, y0 + TICK_LEN, BLACK);
        let label = col.to_string();
        let label_x = x.saturating_sub(font::text_width(&label) / 2);
        font::draw_text(img, label_x, y0 + TICK_LEN + 2, &label, BLACK);

        // Row ticks along the left edge.
        let row = (i * (plot_h - 1)) / (TICK_COUNT - 1).max(1);
        let y = MARGIN_TOP + row;
        let x1 = MARGIN_LEFT.saturating_sub(2);
        hline(img, x1.saturating_sub(TICK_LEN), x1, y, BLACK);
        let label = row.to_string();
        let label_x = x1
            .saturating_sub(TICK_LEN + 3)
            .saturating_sub(font::text_width(&label));
        font::draw_text(
            img,
            label_x,
            y.saturating_sub(font::GLYPH_HEIGHT / 2),
            &label,
            BLACK,
        );
    }
}

fn draw_colorbar(
    img: &mut RgbaImage,
    plot_w: u32,
    plot_h: u32,
    ramp: &ColorRamp,
    vmin: f32,
    vmax: f32,
) {
    let bar_x = MARGIN_LEFT + plot_w + COLORBAR_GAP;
    let bar_h = plot_h.max(2);

    // Gradient: top is vmax, bottom is vmin.
    for row in 0..bar_h {
        let t = 1.0 - (row as f32) / ((bar_h - 1) as f32);
        let [r, g, b] = ramp.sample(t);
        for dx in 0..COLORBAR_WIDTH {
            img.put_pixel(bar_x + dx, MARGIN_TOP + row, Rgba([r, g, b, 255]));
        }
    }
    draw_frame(img, bar_x, MARGIN_TOP, COLORBAR_WIDTH, bar_h);

    // Value ticks from vmax down to vmin.
    for i in 0..TICK_COUNT {
        let row = (i * (bar_h - 1)) / (TICK_COUNT - 1).max(1);
        let frac = 1.0 - (row as f32) / ((bar_h - 1) as f32);
        let value = vmin + frac * (vmax - vmin);
        let y = MARGIN_TOP + row;
        hline(img, bar_x + COLORBAR_WIDTH + 1, bar_x + COLORBAR_WIDTH + 1 + TICK_LEN, y, BLACK);
        font::draw_text(
            img,
            bar_x + COLORBAR_WIDTH + TICK_LEN + 4,
            y.saturating_sub(font::GLYPH_HEIGHT / 2),
            &format_tick(value),
            BLACK,
        );
    }
}

fn format_tick(value: f32) -> String {
    // Avoid the "-0.00" artifact at the zero crossing.
    let rounded = (value * 100.0).round() / 100.0;
    let rounded = if rounded == 0.0 { 0.0 } else { rounded };
    format!("{:.2}", rounded)
}

fn hline(img: &mut RgbaImage, x0: u32, x1: u32, y: u32, color: Rgba<u8>) {
    if y >= img.height() {
        return;
    }
    for x in x0..=x1.min(img.width() - 1) {
        img.put_pixel(x, y, color);
    }
}

fn vline(img: &mut RgbaImage, x: u32, y0: u32, y1: u32, color: Rgba<u8>) {
    if x >= img.width() {
        return;
    }
    for y in y0..=y1.min(img.height() - 1) {
        img.put_pixel(x, y, color);
    }
}
