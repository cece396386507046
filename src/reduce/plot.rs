//! FLOPs vs. accuracy scatter plots, one series per stack count.

use std::path::{Path, PathBuf};

use plotters::coord::Shift;
use plotters::prelude::*;

use super::table::ResultsTable;
use crate::error::Error;

const SIZE: (u32, u32) = (800, 600);
const ORANGE: RGBColor = RGBColor(255, 165, 0);
const DARK_GREEN: RGBColor = RGBColor(0, 128, 0);

/// Points sharing a stack count.
#[derive(Debug, Clone, PartialEq)]
pub struct StackSeries {
    pub stacks: u8,
    pub color: RGBColor,
    /// `(flops, val_acc)` pairs.
    pub points: Vec<(f64, f64)>,
}

fn stack_color(stacks: u8) -> RGBColor {
    match stacks {
        1 => BLUE,
        2 => ORANGE,
        _ => DARK_GREEN,
    }
}

/// Group the table into series drawn deepest first (3, 2, 1). Stack counts
/// with no points are left out.
pub fn stack_series(table: &ResultsTable) -> Vec<StackSeries> {
    (1..=3u8)
        .rev()
        .filter_map(|stacks| {
            let points: Vec<(f64, f64)> = table
                .rows()
                .filter(|r| r.stacks == stacks)
                .map(|r| (r.flops as f64, r.val_acc))
                .collect();
            (!points.is_empty()).then(|| StackSeries {
                stacks,
                color: stack_color(stacks),
                points,
            })
        })
        .collect()
}

fn bounds(values: impl Iterator<Item = f64>) -> (f64, f64) {
    let (lo, hi) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    if !lo.is_finite() {
        return (0.0, 1.0);
    }
    let pad = if hi > lo { (hi - lo) * 0.05 } else { lo.abs().max(1.0) * 0.05 };
    (lo - pad, hi + pad)
}

macro_rules! draw_scatter {
    ($root:expr, $series:expr, $x_spec:expr, $y_range:expr) => {{
        let mut chart = ChartBuilder::on($root)
            .margin(10)
            .set_label_area_size(LabelAreaPosition::Left, 60)
            .set_label_area_size(LabelAreaPosition::Bottom, 50)
            .build_cartesian_2d($x_spec, $y_range)
            .map_err(|e| format!("chart build error: {e}"))?;
        chart
            .configure_mesh()
            .x_desc("FLOPs")
            .y_desc("Test accuracy")
            .draw()
            .map_err(|e| format!("mesh error: {e}"))?;
        chart
            .draw_series(std::iter::empty::<Circle<(f64, f64), i32>>())
            .map_err(|e| format!("draw error: {e}"))?
            .label("Stacks");
        for s in $series {
            let color = s.color;
            chart
                .draw_series(
                    s.points
                        .iter()
                        .map(|&(x, y)| Circle::new((x, y), 4, color.filled())),
                )
                .map_err(|e| format!("draw error: {e}"))?
                .label(s.stacks.to_string())
                .legend(move |(x, y)| Circle::new((x + 10, y), 4, color.filled()));
        }
        chart
            .configure_series_labels()
            .position(SeriesLabelPosition::LowerRight)
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()
            .map_err(|e| format!("legend error: {e}"))?;
    }};
}

fn draw<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    series: &[StackSeries],
    log_x: bool,
) -> Result<(), String> {
    root.fill(&WHITE)
        .map_err(|e| format!("backend error: {e}"))?;
    let (x0, x1) = bounds(series.iter().flat_map(|s| s.points.iter().map(|p| p.0)));
    let (y0, y1) = bounds(series.iter().flat_map(|s| s.points.iter().map(|p| p.1)));
    if log_x {
        let (x0, x1) = (x0.max(1.0), x1.max(10.0));
        draw_scatter!(root, series, (x0..x1).log_scale(), y0..y1);
    } else {
        draw_scatter!(root, series, x0..x1, y0..y1);
    }
    root.present().map_err(|e| format!("render error: {e}"))
}

fn render(path: &Path, series: &[StackSeries], log_x: bool) -> Result<(), Error> {
    let plot_error = |message: String| Error::Plot {
        path: path.to_path_buf(),
        message,
    };
    let result = match path.extension().and_then(|e| e.to_str()) {
        Some("svg") => draw(&SVGBackend::new(path, SIZE).into_drawing_area(), series, log_x),
        _ => draw(&BitMapBackend::new(path, SIZE).into_drawing_area(), series, log_x),
    };
    result.map_err(plot_error)
}

/// Write `flops_val_acc` and `flops_val_acc_logx` as PNG and SVG into
/// `out_dir`, returning the written paths.
pub fn plot_results(table: &ResultsTable, out_dir: &Path) -> Result<Vec<PathBuf>, Error> {
    let series = stack_series(table);
    let mut written = Vec::new();
    for (stem, log_x) in [("flops_val_acc", false), ("flops_val_acc_logx", true)] {
        for ext in ["png", "svg"] {
            let path = out_dir.join(format!("{stem}.{ext}"));
            render(&path, &series, log_x)?;
            written.push(path);
        }
    }
    Ok(written)
}
