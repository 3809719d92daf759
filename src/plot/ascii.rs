//! ASCII plotting for terminal output.
//!
//! This is intentionally "dumb" (fixed-size grid), optimized for:
//! - quick visual sanity checks in a terminal
//! - deterministic output (helpful for golden tests)
//!
//! Plot elements:
//! - measured points: `o`, or `E` inside the detected exponential window
//! - simulated trajectories: lines drawn with `X` (biomass), `S` (substrate)
//!   and `1`, `2`, ... for products in product-set order

use crate::domain::{ExponentialPhaseResult, Measurements, SimulationResult};

/// How a series is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeriesStyle {
    Points,
    Line,
}

/// One named series on a shared time axis.
#[derive(Debug, Clone)]
pub struct Series {
    pub label: String,
    pub symbol: char,
    pub style: SeriesStyle,
    pub points: Vec<(f64, f64)>,
}

/// Plot measured biomass, highlighting the detected exponential window.
pub fn render_measurement_plot(
    data: &Measurements,
    phase: &ExponentialPhaseResult,
    width: usize,
    height: usize,
) -> String {
    let (inside, outside): (Vec<(f64, f64)>, Vec<(f64, f64)>) = data
        .time
        .iter()
        .zip(&data.biomass)
        .map(|(&t, &x)| (t, x))
        .partition(|&(t, _)| phase.contains(t));

    let series = [
        Series {
            label: "biomass".to_string(),
            symbol: 'o',
            style: SeriesStyle::Points,
            points: outside,
        },
        Series {
            label: "exponential phase".to_string(),
            symbol: 'E',
            style: SeriesStyle::Points,
            points: inside,
        },
    ];
    render_plot(&series, width, height)
}

/// Plot a simulated trajectory: biomass, substrate and every product.
pub fn render_trajectory_plot(result: &SimulationResult, width: usize, height: usize) -> String {
    let line = |label: &str, symbol: char, values: &[f64]| Series {
        label: label.to_string(),
        symbol,
        style: SeriesStyle::Line,
        points: result.time.iter().copied().zip(values.iter().copied()).collect(),
    };

    let mut series = vec![
        line("substrate", 'S', &result.substrate),
        line("biomass", 'X', &result.biomass),
    ];
    for (i, p) in result.products.iter().enumerate() {
        let symbol = char::from_digit(((i + 1) % 10) as u32, 10).unwrap_or('P');
        series.push(line(&p.key, symbol, &p.values));
    }
    render_plot(&series, width, height)
}

/// Render series onto a shared grid. Later series overlay earlier ones.
pub fn render_plot(series: &[Series], width: usize, height: usize) -> String {
    let width = width.max(10);
    let height = height.max(5);

    let (t_min, t_max) =
        axis_range(series.iter().flat_map(|s| s.points.iter().map(|p| p.0))).unwrap_or((0.0, 1.0));
    let (y_min, y_max) =
        axis_range(series.iter().flat_map(|s| s.points.iter().map(|p| p.1))).unwrap_or((0.0, 1.0));
    let (y_min, y_max) = pad_range(y_min, y_max, 0.05);

    let mut grid = vec![vec![' '; width]; height];

    for s in series {
        match s.style {
            SeriesStyle::Line => {
                draw_curve(&mut grid, &s.points, s.symbol, t_min, t_max, y_min, y_max)
            }
            SeriesStyle::Points => {
                for &(t, y) in &s.points {
                    if t.is_finite() && y.is_finite() {
                        let x = map_x(t, t_min, t_max, width);
                        let yy = map_y(y, y_min, y_max, height);
                        grid[yy][x] = s.symbol;
                    }
                }
            }
        }
    }

    // Small header with ranges and a legend of non-empty series.
    let mut out = String::new();
    out.push_str(&format!(
        "Plot: t=[{t_min:.2}, {t_max:.2}] | y=[{y_min:.3}, {y_max:.3}]\n"
    ));
    let legend: Vec<String> = series
        .iter()
        .filter(|s| !s.points.is_empty())
        .map(|s| format!("{}={}", s.symbol, s.label))
        .collect();
    if !legend.is_empty() {
        out.push_str(&format!("Legend: {}\n", legend.join(" ")));
    }

    for row in grid {
        out.push_str(&row.into_iter().collect::<String>());
        out.push('\n');
    }

    out
}

fn axis_range(values: impl Iterator<Item = f64>) -> Option<(f64, f64)> {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for v in values.filter(|v| v.is_finite()) {
        min = min.min(v);
        max = max.max(v);
    }
    if !(min.is_finite() && max.is_finite()) {
        return None;
    }
    if max > min {
        Some((min, max))
    } else {
        Some((min - 0.5, max + 0.5))
    }
}

fn pad_range(min: f64, max: f64, frac: f64) -> (f64, f64) {
    let span = (max - min).abs();
    let pad = (span * frac).max(1e-12);
    (min - pad, max + pad)
}

fn map_x(t: f64, t_min: f64, t_max: f64, width: usize) -> usize {
    let width = width.max(2);
    let u = ((t - t_min) / (t_max - t_min)).clamp(0.0, 1.0);
    (u * (width as f64 - 1.0)).round() as usize
}

fn map_y(y: f64, y_min: f64, y_max: f64, height: usize) -> usize {
    let height = height.max(2);
    let u = ((y - y_min) / (y_max - y_min)).clamp(0.0, 1.0);
    // Row 0 is the top of the plot.
    (height as f64 - 1.0 - (u * (height as f64 - 1.0))).round() as usize
}

fn draw_curve(
    grid: &mut [Vec<char>],
    curve: &[(f64, f64)],
    ch: char,
    t_min: f64,
    t_max: f64,
    y_min: f64,
    y_max: f64,
) {
    let height = grid.len();
    let width = grid[0].len();

    let mut prev = None;
    for &(t, y) in curve.iter().filter(|(t, y)| t.is_finite() && y.is_finite()) {
        let x = map_x(t, t_min, t_max, width);
        let yy = map_y(y, y_min, y_max, height);
        match prev {
            Some((x0, y0)) if (x0, y0) != (x, yy) => draw_line(grid, x0, y0, x, yy, ch),
            Some(_) => {}
            None => grid[yy][x] = ch,
        }
        prev = Some((x, yy));
    }
}

/// Integer line drawing (Bresenham).
fn draw_line(grid: &mut [Vec<char>], x0: usize, y0: usize, x1: usize, y1: usize, ch: char) {
    let mut x0 = x0 as isize;
    let mut y0 = y0 as isize;
    let x1 = x1 as isize;
    let y1 = y1 as isize;

    let dx = (x1 - x0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let dy = -(y1 - y0).abs();
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        if y0 >= 0 && (y0 as usize) < grid.len() && x0 >= 0 && (x0 as usize) < grid[0].len() {
            grid[y0 as usize][x0 as usize] = ch;
        }

        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}
