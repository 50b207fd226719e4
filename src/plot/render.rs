//! PNG rendering of [`Figure`]s and exploration reports with plotters.
//!
//! Log-scaled figures are drawn on linear axes over `log10` coordinates with
//! decade tick labels; straight data-space edges are subdivided first so
//! they bend correctly on the log plane.

use std::error::Error as StdError;
use std::path::Path;

use plotters::prelude::*;

use super::regions::{Figure, Shade};
use crate::design::ExplorationReport;
use crate::error::{Error, Result};

const EDGE_STEPS: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderOptions {
    pub width: u32,
    pub height: u32,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            width: 1200,
            height: 800,
        }
    }
}

fn shade_color(shade: Shade) -> RGBColor {
    match shade {
        Shade::Off => RGBColor(120, 120, 120),
        Shade::Linear => BLUE,
        Shade::Saturation => RGBColor(0, 150, 60),
        Shade::Contract => RGBColor(200, 90, 20),
        Shade::Nominal => BLACK,
    }
}

pub fn render_figure(path: &Path, figure: &Figure, options: RenderOptions) -> Result<()> {
    if figure.log_axes && !figure.limits.is_positive() {
        return Err(Error::Plot(format!(
            "{}: log axes need positive limits",
            figure.title
        )));
    }
    draw_figure(path, figure, options).map_err(|e| Error::Plot(format!("{}: {e}", path.display())))
}

fn draw_figure(
    path: &Path,
    figure: &Figure,
    options: RenderOptions,
) -> std::result::Result<(), Box<dyn StdError>> {
    let log = figure.log_axes;
    let to_plot = |(x, y): (f64, f64)| {
        if log { (x.log10(), y.log10()) } else { (x, y) }
    };
    let l = figure.limits;
    let (x0, y0) = to_plot((l.x_min, l.y_min));
    let (x1, y1) = to_plot((l.x_max, l.y_max));

    let root = BitMapBackend::new(path, (options.width, options.height)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(&figure.title, ("sans-serif", 20))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(70)
        .build_cartesian_2d(x0..x1, y0..y1)?;

    let decade = |v: &f64| format!("{:.0e}", 10f64.powf(*v));
    let plain = |v: &f64| format!("{v:.3}");
    let x_fmt: &dyn Fn(&f64) -> String = if log { &decade } else { &plain };
    let y_fmt: &dyn Fn(&f64) -> String = if log { &decade } else { &plain };
    chart
        .configure_mesh()
        .x_desc(figure.x_label.as_str())
        .y_desc(figure.y_label.as_str())
        .x_label_formatter(x_fmt)
        .y_label_formatter(y_fmt)
        .draw()?;

    for region in &figure.regions {
        let color = shade_color(region.shade);
        let vertices: Vec<(f64, f64)> = densify(&region.vertices, log, true)
            .into_iter()
            .map(to_plot)
            .collect();
        let series = chart.draw_series(std::iter::once(Polygon::new(
            vertices,
            color.mix(0.25).filled(),
        )))?;
        if let Some(label) = &region.label {
            series
                .label(label.as_str())
                .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 20, y + 5)], color.mix(0.25).filled()));
        }
    }

    for segment in &figure.segments {
        let color = shade_color(segment.shade);
        let points: Vec<(f64, f64)> = densify(&segment.points, log, false)
            .into_iter()
            .map(to_plot)
            .collect();
        let series = chart.draw_series(LineSeries::new(points, color.stroke_width(2)))?;
        if let Some(label) = &segment.label {
            series
                .label(label.as_str())
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color));
        }
    }

    for &gx in &figure.guides {
        if gx <= 0.0 && log {
            continue;
        }
        let (px, _) = to_plot((gx, l.y_min));
        chart.draw_series(std::iter::once(PathElement::new(
            vec![(px, y0), (px, y1)],
            BLACK.mix(0.3),
        )))?;
    }

    let labelled = figure.regions.iter().any(|r| r.label.is_some())
        || figure.segments.iter().any(|s| s.label.is_some());
    if labelled {
        chart
            .configure_series_labels()
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()?;
    }

    root.present()?;
    Ok(())
}

/// Subdivide straight edges when drawing on log axes.
fn densify(points: &[(f64, f64)], log: bool, closed: bool) -> Vec<(f64, f64)> {
    if !log || points.len() < 2 {
        return points.to_vec();
    }
    let n = points.len();
    let edges = if closed { n } else { n - 1 };
    let mut out = Vec::with_capacity(edges * EDGE_STEPS + 1);
    for i in 0..edges {
        let (a, b) = (points[i], points[(i + 1) % n]);
        for step in 0..EDGE_STEPS {
            let t = step as f64 / EDGE_STEPS as f64;
            out.push((a.0 + t * (b.0 - a.0), a.1 + t * (b.1 - a.1)));
        }
    }
    if !closed {
        out.push(points[n - 1]);
    }
    out
}

/// Cumulative time and outcome counts over the design index.
pub fn render_exploration(
    path: &Path,
    report: &ExplorationReport,
    options: RenderOptions,
) -> Result<()> {
    if report.outcomes.is_empty() {
        return Err(Error::Plot("no designs to plot".to_string()));
    }
    draw_exploration(path, report, options)
        .map_err(|e| Error::Plot(format!("{}: {e}", path.display())))
}

fn draw_exploration(
    path: &Path,
    report: &ExplorationReport,
    options: RenderOptions,
) -> std::result::Result<(), Box<dyn StdError>> {
    let mut elapsed_ms = 0.0f64;
    let mut successes = 0u32;
    let mut failures = 0u32;
    let mut time_points = Vec::with_capacity(report.outcomes.len());
    let mut success_points = Vec::with_capacity(report.outcomes.len());
    let mut failure_points = Vec::with_capacity(report.outcomes.len());
    for (i, outcome) in report.outcomes.iter().enumerate() {
        let n = (i + 1) as f64;
        elapsed_ms += outcome.elapsed.as_secs_f64() * 1e3;
        if outcome.is_success() {
            successes += 1;
        } else {
            failures += 1;
        }
        time_points.push((n, elapsed_ms));
        success_points.push((n, successes as f64));
        failure_points.push((n, failures as f64));
    }
    let n_max = report.outcomes.len() as f64;
    let t_max = elapsed_ms.max(1e-3) * 1.1;
    let c_max = successes.max(failures).max(1) as f64 * 1.1;

    let root = BitMapBackend::new(path, (options.width, options.height)).into_drawing_area();
    root.fill(&WHITE)?;
    let panels = root.split_evenly((2, 1));

    let mut chart_t = ChartBuilder::on(&panels[0])
        .caption("Cumulative composition time", ("sans-serif", 20))
        .margin(10)
        .x_label_area_size(30)
        .y_label_area_size(60)
        .build_cartesian_2d(0.0..n_max, 0.0..t_max)?;
    chart_t
        .configure_mesh()
        .x_desc("designs")
        .y_desc("time (ms)")
        .draw()?;
    chart_t.draw_series(LineSeries::new(time_points, &BLACK))?;

    let mut chart_c = ChartBuilder::on(&panels[1])
        .caption(
            format!(
                "Outcomes ({} succeeded, {} failed)",
                report.successes, report.failures
            ),
            ("sans-serif", 20),
        )
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(0.0..n_max, 0.0..c_max)?;
    chart_c
        .configure_mesh()
        .x_desc("designs")
        .y_desc("count")
        .draw()?;
    chart_c
        .draw_series(LineSeries::new(success_points, &BLUE))?
        .label("successes")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], BLUE));
    chart_c
        .draw_series(LineSeries::new(failure_points, &RED))?
        .label("failures")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], RED));
    chart_c
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;

    root.present()?;
    Ok(())
}
