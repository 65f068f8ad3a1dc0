use crate::config::StaticMapConfig;
use crate::types::{Region, StoreLocation};
use anyhow::{anyhow, Context, Result};
use geo::{BoundingRect, Coord, MultiPolygon, Rect};
use image::imageops::{self, FilterType};
use image::{ImageBuffer, Rgba, RgbaImage};
use std::path::Path;
use std::process::Command;
use tracing::{info, warn};

// Axes occupy the figure minus these fractional margins, like a default plot.
const MARGIN_LEFT: f64 = 0.125;
const MARGIN_RIGHT: f64 = 0.1;
const MARGIN_TOP: f64 = 0.12;
const MARGIN_BOTTOM: f64 = 0.11;
const DATA_PADDING: f64 = 0.05;
const GRID_LINES: u32 = 8;
const POINTS_PER_INCH: f64 = 72.0;

const REGION_ALPHA: f64 = 0.5;
const MARKER_ALPHA: f64 = 0.8;
const MARKER_SIZE_PT2: f64 = 15.0;
const EDGE_WIDTH_PT: f64 = 1.0;
const LEGEND_POSITION: (f64, f64) = (0.91, 0.05);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderSummary {
    pub regions_drawn: usize,
    pub markers_drawn: usize,
}

/// Maps lon/lat into canvas pixels with equal ground scale on both axes.
struct Projection {
    origin: Coord<f64>,
    scale_x: f64,
    scale_y: f64,
    offset_x: f64,
    offset_y: f64,
    axes: (f64, f64, f64, f64), // left, top, right, bottom in pixels
}

impl Projection {
    fn fit(extent: Rect<f64>, width: u32, height: u32) -> Self {
        let w = width as f64;
        let h = height as f64;
        let left = w * MARGIN_LEFT;
        let right = w * (1.0 - MARGIN_RIGHT);
        let top = h * MARGIN_TOP;
        let bottom = h * (1.0 - MARGIN_BOTTOM);

        let dx = extent.width().max(f64::EPSILON) * (1.0 + 2.0 * DATA_PADDING);
        let dy = extent.height().max(f64::EPSILON) * (1.0 + 2.0 * DATA_PADDING);
        let mid_lat = extent.center().y.to_radians();
        let aspect = 1.0 / mid_lat.cos().abs().max(0.01);

        let axes_w = right - left;
        let axes_h = bottom - top;
        let unit = (axes_w / dx).min(axes_h / (dy * aspect));
        let scale_x = unit;
        let scale_y = unit * aspect;

        let origin = Coord {
            x: extent.center().x,
            y: extent.center().y,
        };

        Self {
            origin,
            scale_x,
            scale_y,
            offset_x: left + axes_w / 2.0,
            offset_y: top + axes_h / 2.0,
            axes: (left, top, right, bottom),
        }
    }

    fn to_pixel(&self, c: Coord<f64>) -> (f64, f64) {
        (
            self.offset_x + (c.x - self.origin.x) * self.scale_x,
            self.offset_y - (c.y - self.origin.y) * self.scale_y,
        )
    }

    fn axes_fraction(&self, fx: f64, fy: f64) -> (f64, f64) {
        let (left, top, right, bottom) = self.axes;
        (left + fx * (right - left), bottom - fy * (bottom - top))
    }
}

pub fn render_static_map(
    regions: &[Region],
    stores: &[StoreLocation],
    icon_path: Option<&Path>,
    settings: &StaticMapConfig,
    output: &Path,
) -> Result<RenderSummary> {
    let width = (settings.width_in * settings.dpi as f64).round() as u32;
    let height = (settings.height_in * settings.dpi as f64).round() as u32;
    if width == 0 || height == 0 {
        return Err(anyhow!("Static map has zero size: {}x{}", width, height));
    }
    let px_per_pt = settings.dpi as f64 / POINTS_PER_INCH;

    info!("Rendering {}x{} static map with {} regions and {} stores", width, height, regions.len(), stores.len());

    let extent = data_extent(regions, stores)
        .ok_or_else(|| anyhow!("Nothing to draw: no regions and no store locations"))?;
    let projection = Projection::fit(extent, width, height);

    let mut canvas: RgbaImage = ImageBuffer::from_pixel(width, height, Rgba([255, 255, 255, 255]));
    draw_grid(&mut canvas, &projection);

    let fill = color_to_rgba("lightgray");
    let edge = color_to_rgba("black");
    let edge_width = (EDGE_WIDTH_PT * px_per_pt).max(1.0);
    for region in regions {
        fill_multipolygon(&mut canvas, &projection, &region.geometry, fill, REGION_ALPHA);
        stroke_multipolygon(&mut canvas, &projection, &region.geometry, edge, REGION_ALPHA, edge_width);
    }

    let marker = color_to_rgba("red");
    let radius = MARKER_SIZE_PT2.sqrt() / 2.0 * px_per_pt;
    for store in stores {
        let (x, y) = projection.to_pixel(store.point.0);
        fill_disc(&mut canvas, x, y, radius, marker, MARKER_ALPHA);
    }

    if let Some(path) = icon_path {
        match image::open(path) {
            Ok(icon) => {
                let icon = icon.to_rgba8();
                let marker_icon = scale_icon(&icon, settings.icon_zoom * px_per_pt);
                for store in stores {
                    let (x, y) = projection.to_pixel(store.point.0);
                    stamp_centered(&mut canvas, &marker_icon, x, y);
                }
                let legend_icon = scale_icon(&icon, 2.0 * settings.icon_zoom * px_per_pt);
                let (lx, ly) = projection.axes_fraction(LEGEND_POSITION.0, LEGEND_POSITION.1);
                stamp_centered(&mut canvas, &legend_icon, lx, ly);
            }
            Err(e) => warn!("Could not load icon {:?}, drawing plain markers: {}", path, e),
        }
    }

    draw_axes_frame(&mut canvas, &projection);

    canvas.save(output)
        .with_context(|| format!("Failed to save static map: {:?}", output))?;
    info!("Static map saved as {:?}", output);

    Ok(RenderSummary {
        regions_drawn: regions.len(),
        markers_drawn: stores.len(),
    })
}

/// Opens the image in `viewer`, or the platform default, and waits for that
/// process to exit. `open -W` and `start /WAIT` wait for the window; on Linux
/// `xdg-open` hands the file off and returns at once, so set a viewer program
/// that stays in the foreground to block there. Launch failures are logged,
/// never returned: the image is already on disk.
pub fn display_image(path: &Path, viewer: Option<&str>) {
    let mut command = if let Some(program) = viewer {
        let mut c = Command::new(program);
        c.arg(path);
        c
    } else if cfg!(target_os = "macos") {
        let mut c = Command::new("open");
        c.arg("-W").arg(path);
        c
    } else if cfg!(target_os = "windows") {
        let mut c = Command::new("cmd");
        c.args(["/C", "start", "/WAIT", ""]).arg(path);
        c
    } else {
        let mut c = Command::new("xdg-open");
        c.arg(path);
        c
    };

    match command.status() {
        Ok(status) if !status.success() => warn!("Image viewer exited with {}", status),
        Ok(_) => {}
        Err(e) => warn!("Could not launch an image viewer for {:?}: {}", path, e),
    }
}

fn data_extent(regions: &[Region], stores: &[StoreLocation]) -> Option<Rect<f64>> {
    let region_rects = regions.iter().filter_map(|r| r.geometry.bounding_rect());
    let store_rects = stores.iter().map(|s| Rect::new(s.point.0, s.point.0));

    region_rects.chain(store_rects).reduce(|a, b| {
        Rect::new(
            Coord { x: a.min().x.min(b.min().x), y: a.min().y.min(b.min().y) },
            Coord { x: a.max().x.max(b.max().x), y: a.max().y.max(b.max().y) },
        )
    })
}

pub(crate) fn color_to_rgba(color: &str) -> Rgba<u8> {
    match color.to_lowercase().as_str() {
        "black" => Rgba([0, 0, 0, 255]),
        "white" => Rgba([255, 255, 255, 255]),
        "red" => Rgba([255, 0, 0, 255]),
        "green" => Rgba([0, 128, 0, 255]),
        "blue" => Rgba([0, 0, 255, 255]),
        "gray" | "grey" => Rgba([128, 128, 128, 255]),
        "lightgray" | "lightgrey" => Rgba([211, 211, 211, 255]),
        other => hex_to_rgba(other),
    }
}

fn hex_to_rgba(hex: &str) -> Rgba<u8> {
    let hex = hex.trim_start_matches('#');
    if hex.len() < 6 || !hex.is_ascii() {
        return Rgba([0, 0, 0, 255]);
    }
    let r = u8::from_str_radix(&hex[0..2], 16).unwrap_or(0);
    let g = u8::from_str_radix(&hex[2..4], 16).unwrap_or(0);
    let b = u8::from_str_radix(&hex[4..6], 16).unwrap_or(0);
    Rgba([r, g, b, 255])
}

fn blend(canvas: &mut RgbaImage, x: i64, y: i64, color: Rgba<u8>, alpha: f64) {
    if x < 0 || y < 0 || x >= canvas.width() as i64 || y >= canvas.height() as i64 {
        return;
    }
    let px = canvas.get_pixel_mut(x as u32, y as u32);
    for c in 0..3 {
        let under = px.0[c] as f64;
        px.0[c] = (color.0[c] as f64 * alpha + under * (1.0 - alpha)).round() as u8;
    }
    px.0[3] = 255;
}

fn draw_grid(canvas: &mut RgbaImage, projection: &Projection) {
    let (left, top, right, bottom) = projection.axes;
    let grid = Rgba([176, 176, 176, 255]);
    for i in 0..=GRID_LINES {
        let f = i as f64 / GRID_LINES as f64;
        let x = left + f * (right - left);
        let y = top + f * (bottom - top);
        draw_segment(canvas, (x, top), (x, bottom), grid, 0.5, 1.0);
        draw_segment(canvas, (left, y), (right, y), grid, 0.5, 1.0);
    }
}

fn draw_axes_frame(canvas: &mut RgbaImage, projection: &Projection) {
    let (left, top, right, bottom) = projection.axes;
    let black = Rgba([0, 0, 0, 255]);
    draw_segment(canvas, (left, top), (right, top), black, 1.0, 3.0);
    draw_segment(canvas, (right, top), (right, bottom), black, 1.0, 3.0);
    draw_segment(canvas, (right, bottom), (left, bottom), black, 1.0, 3.0);
    draw_segment(canvas, (left, bottom), (left, top), black, 1.0, 3.0);
}

/// Even-odd scanline fill over every ring of the multipolygon.
fn fill_multipolygon(
    canvas: &mut RgbaImage,
    projection: &Projection,
    geometry: &MultiPolygon<f64>,
    color: Rgba<u8>,
    alpha: f64,
) {
    let mut edges: Vec<((f64, f64), (f64, f64))> = Vec::new();
    for polygon in &geometry.0 {
        for ring in std::iter::once(polygon.exterior()).chain(polygon.interiors()) {
            for line in ring.lines() {
                edges.push((projection.to_pixel(line.start), projection.to_pixel(line.end)));
            }
        }
    }
    if edges.is_empty() {
        return;
    }

    let min_y = edges.iter().map(|(a, b)| a.1.min(b.1)).fold(f64::INFINITY, f64::min);
    let max_y = edges.iter().map(|(a, b)| a.1.max(b.1)).fold(f64::NEG_INFINITY, f64::max);
    let y_start = min_y.floor().max(0.0) as i64;
    let y_end = max_y.ceil().min(canvas.height() as f64) as i64;

    let mut crossings = Vec::new();
    for y in y_start..y_end {
        let scan = y as f64 + 0.5;
        crossings.clear();
        for &((x0, y0), (x1, y1)) in &edges {
            if (y0 <= scan && y1 > scan) || (y1 <= scan && y0 > scan) {
                crossings.push(x0 + (scan - y0) / (y1 - y0) * (x1 - x0));
            }
        }
        crossings.sort_by(|a, b| a.total_cmp(b));
        for pair in crossings.chunks_exact(2) {
            let x_start = (pair[0] - 0.5).ceil().max(0.0) as i64;
            let x_end = (pair[1] - 0.5).floor().min(canvas.width() as f64 - 1.0) as i64;
            for x in x_start..=x_end {
                blend(canvas, x, y, color, alpha);
            }
        }
    }
}

fn stroke_multipolygon(
    canvas: &mut RgbaImage,
    projection: &Projection,
    geometry: &MultiPolygon<f64>,
    color: Rgba<u8>,
    alpha: f64,
    width: f64,
) {
    for polygon in &geometry.0 {
        for ring in std::iter::once(polygon.exterior()).chain(polygon.interiors()) {
            for line in ring.lines() {
                let a = projection.to_pixel(line.start);
                let b = projection.to_pixel(line.end);
                draw_segment(canvas, a, b, color, alpha, width);
            }
        }
    }
}

// Steps along the segment one pixel at a time, painting a square brush.
// The brush overlaps itself, so each pixel is blended at most once per step.
fn draw_segment(
    canvas: &mut RgbaImage,
    a: (f64, f64),
    b: (f64, f64),
    color: Rgba<u8>,
    alpha: f64,
    width: f64,
) {
    let half = (width / 2.0).floor() as i64;
    let steps = (b.0 - a.0).abs().max((b.1 - a.1).abs()).ceil().max(1.0) as i64;
    let mut last: Option<(i64, i64)> = None;
    for i in 0..=steps {
        let t = i as f64 / steps as f64;
        let x = (a.0 + (b.0 - a.0) * t).round() as i64;
        let y = (a.1 + (b.1 - a.1) * t).round() as i64;
        if last == Some((x, y)) {
            continue;
        }
        for dy in -half..=half {
            for dx in -half..=half {
                let (px, py) = (x + dx, y + dy);
                let covered = last
                    .map(|(lx, ly)| (px - lx).abs() <= half && (py - ly).abs() <= half)
                    .unwrap_or(false);
                if !covered {
                    blend(canvas, px, py, color, alpha);
                }
            }
        }
        last = Some((x, y));
    }
}

fn fill_disc(canvas: &mut RgbaImage, cx: f64, cy: f64, radius: f64, color: Rgba<u8>, alpha: f64) {
    let r = radius.max(0.5);
    let x0 = (cx - r).floor() as i64;
    let x1 = (cx + r).ceil() as i64;
    let y0 = (cy - r).floor() as i64;
    let y1 = (cy + r).ceil() as i64;
    for y in y0..=y1 {
        for x in x0..=x1 {
            let dx = x as f64 + 0.5 - cx;
            let dy = y as f64 + 0.5 - cy;
            if dx * dx + dy * dy <= r * r {
                blend(canvas, x, y, color, alpha);
            }
        }
    }
}

fn scale_icon(icon: &RgbaImage, factor: f64) -> RgbaImage {
    let w = ((icon.width() as f64 * factor).round() as u32).max(1);
    let h = ((icon.height() as f64 * factor).round() as u32).max(1);
    imageops::resize(icon, w, h, FilterType::Triangle)
}

fn stamp_centered(canvas: &mut RgbaImage, icon: &RgbaImage, cx: f64, cy: f64) {
    let x = (cx - icon.width() as f64 / 2.0).round() as i64;
    let y = (cy - icon.height() as f64 / 2.0).round() as i64;
    imageops::overlay(canvas, icon, x, y);
}
