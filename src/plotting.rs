use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use log::warn;
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};

use crate::analysis::{PowerLawFit, RmsdCurve};
use crate::ensemble::TrajectoryEnsemble;
use crate::output::OutputArtifacts;

const CANVAS_SIZE: (u32, u32) = (680, 540);
const TRAJECTORY_CANVAS: (u32, u32) = (620, 620);

// Slope 1/2 guide through ln r = 0.5 ln t - 0.5.
const GUIDE_EXPONENT: f64 = 0.5;
const GUIDE_LOG_INTERCEPT: f64 = -0.5;

pub fn render_tracks(artifacts: &OutputArtifacts, ensemble: &TrajectoryEnsemble) -> Result<()> {
    if ensemble.time_steps() == 0 || ensemble.track_count() == 0 {
        return Err(anyhow!("No tracks available for plotting"));
    }

    if artifacts.toggles.png {
        ensure_parent(&artifacts.tracks_png)?;
        let backend = BitMapBackend::new(&artifacts.tracks_png, TRAJECTORY_CANVAS);
        draw_tracks(backend.into_drawing_area(), ensemble)?;
    }

    if artifacts.toggles.svg {
        ensure_parent(&artifacts.tracks_svg)?;
        let backend = SVGBackend::new(&artifacts.tracks_svg, TRAJECTORY_CANVAS);
        draw_tracks(backend.into_drawing_area(), ensemble)?;
    }

    Ok(())
}

pub fn render_rmsd(
    artifacts: &OutputArtifacts,
    time: &[f64],
    rmsd: &RmsdCurve,
    fit: Option<&PowerLawFit>,
) -> Result<()> {
    if time.len() != rmsd.len() {
        return Err(anyhow!(
            "Mismatched lengths for RMSD plot: {} vs {}",
            time.len(),
            rmsd.len()
        ));
    }

    let points: Vec<(f64, f64)> = time
        .iter()
        .zip(rmsd.values.iter())
        .skip(1)
        .filter(|&(&t, &r)| t > 0.0 && r > 0.0)
        .map(|(&t, &r)| (t, r))
        .collect();

    if rmsd.is_empty() || points.is_empty() {
        warn!("[plot] no positive RMSD samples beyond lag 0; skipping log-log chart");
        return Ok(());
    }

    if artifacts.toggles.png {
        ensure_parent(&artifacts.rmsd_png)?;
        let backend = BitMapBackend::new(&artifacts.rmsd_png, CANVAS_SIZE);
        draw_rmsd_chart(backend.into_drawing_area(), &points, fit)?;
    }

    if artifacts.toggles.svg {
        ensure_parent(&artifacts.rmsd_svg)?;
        let backend = SVGBackend::new(&artifacts.rmsd_svg, CANVAS_SIZE);
        draw_rmsd_chart(backend.into_drawing_area(), &points, fit)?;
    }

    Ok(())
}

fn draw_title<DB: DrawingBackend>(area: &DrawingArea<DB, Shift>, title: &str) -> Result<()>
where
    DB::ErrorType: 'static,
{
    let title_style_base = ("sans-serif", 28).into_text_style(area);
    let title_style = title_style_base.pos(Pos::new(HPos::Center, VPos::Center));
    let title_dims = area.dim_in_pixel();
    area.draw_text(
        title,
        &title_style,
        (title_dims.0 as i32 / 2, title_dims.1 as i32 / 2),
    )?;
    Ok(())
}

fn draw_tracks<DB: DrawingBackend>(
    drawing_area: DrawingArea<DB, Shift>,
    ensemble: &TrajectoryEnsemble,
) -> Result<()>
where
    DB::ErrorType: 'static,
{
    let root = drawing_area;
    root.fill(&WHITE)?;

    let (title_area, chart_area) = root.split_vertically(36);
    let title = if ensemble.track_count() == 1 {
        "Brownian particle track".to_string()
    } else {
        format!("Brownian tracks ({})", ensemble.track_count())
    };
    draw_title(&title_area, &title)?;

    let (x_min, x_max) = min_max(ensemble.xs().iter().copied());
    let (y_min, y_max) = min_max(ensemble.ys().iter().copied());
    let ((x_lower, x_upper), (y_lower, y_upper)) =
        square_bounds((x_min, x_max), (y_min, y_max));

    let mut chart = ChartBuilder::on(&chart_area)
        .margin_left(52)
        .margin_right(18)
        .margin_bottom(45)
        .margin_top(6)
        .set_label_area_size(LabelAreaPosition::Left, 58)
        .set_label_area_size(LabelAreaPosition::Bottom, 50)
        .build_cartesian_2d(x_lower..x_upper, y_lower..y_upper)?;

    chart
        .configure_mesh()
        .disable_mesh()
        .x_desc("x")
        .y_desc("y")
        .x_label_formatter(&|value| format_decimal_tick(*value))
        .y_label_formatter(&|value| format_decimal_tick(*value))
        .label_style(("sans-serif", 18))
        .axis_desc_style(("sans-serif", 20))
        .draw()?;

    let xs = ensemble.xs();
    let ys = ensemble.ys();
    for track in 0..ensemble.track_count() {
        chart.draw_series(LineSeries::new(
            xs.column(track)
                .iter()
                .zip(ys.column(track).iter())
                .map(|(&x, &y)| (x, y)),
            Palette99::pick(track).stroke_width(1),
        ))?;
    }

    chart.draw_series(PointSeries::of_element(
        vec![(xs[[0, 0]], ys[[0, 0]])],
        5,
        ShapeStyle::from(&BLACK).filled(),
        &|coord, size, style| {
            EmptyElement::at(coord)
                + Circle::new((0, 0), size, style)
                + Text::new("start", (10, -10), ("sans-serif", 18).into_font())
        },
    ))?;

    chart.draw_series(std::iter::once(PathElement::new(
        vec![
            (x_lower, y_lower),
            (x_upper, y_lower),
            (x_upper, y_upper),
            (x_lower, y_upper),
            (x_lower, y_lower),
        ],
        &BLACK,
    )))?;

    chart_area
        .present()
        .map_err(|e| anyhow!("Failed to render track chart: {:?}", e))?;
    Ok(())
}

fn draw_rmsd_chart<DB: DrawingBackend>(
    drawing_area: DrawingArea<DB, Shift>,
    points: &[(f64, f64)],
    fit: Option<&PowerLawFit>,
) -> Result<()>
where
    DB::ErrorType: 'static,
{
    let (t_min, t_max) = positive_bounds(points.iter().map(|p| p.0));
    let t_floor = floor_power_of_ten(t_min);
    let t_ceiling = ceil_power_of_ten(t_max);
    let guide = |t: f64| (GUIDE_LOG_INTERCEPT + GUIDE_EXPONENT * t.ln()).exp();

    let mut extra = vec![guide(t_floor), guide(t_ceiling)];
    if let Some(fit) = fit {
        extra.push(fit.evaluate(t_min));
        extra.push(fit.evaluate(t_max));
    }
    let (r_min, r_max) = positive_bounds(
        points
            .iter()
            .map(|p| p.1)
            .chain(extra.into_iter().filter(|v| v.is_finite())),
    );

    let r_floor = floor_power_of_ten(r_min);
    let r_ceiling = ceil_power_of_ten(r_max);

    let root = drawing_area;
    root.fill(&WHITE)?;

    let (title_area, chart_area) = root.split_vertically(36);
    let title = if fit.is_some() {
        "RMSD versus lag time with power law fit"
    } else {
        "RMSD versus lag time"
    };
    draw_title(&title_area, title)?;

    let mut chart = ChartBuilder::on(&chart_area)
        .margin_left(52)
        .margin_right(18)
        .margin_bottom(40)
        .margin_top(6)
        .set_label_area_size(LabelAreaPosition::Left, 58)
        .set_label_area_size(LabelAreaPosition::Bottom, 45)
        .build_cartesian_2d(
            (t_floor..t_ceiling).log_scale(),
            (r_floor..r_ceiling).log_scale(),
        )?;

    chart
        .configure_mesh()
        .disable_mesh()
        .x_desc("lag time t")
        .y_desc("r(t)")
        .x_label_formatter(&|value| format_log_tick(*value))
        .y_label_formatter(&|value| format_log_tick(*value))
        .label_style(("sans-serif", 18))
        .axis_desc_style(("sans-serif", 20))
        .draw()?;

    chart.draw_series(LineSeries::new(points.iter().copied(), &BLUE))?;

    chart.draw_series(LineSeries::new(
        vec![(t_floor, guide(t_floor)), (t_ceiling, guide(t_ceiling))],
        &BLACK,
    ))?;

    if let Some(fit) = fit {
        chart.draw_series(LineSeries::new(
            vec![(t_min, fit.evaluate(t_min)), (t_max, fit.evaluate(t_max))],
            Palette99::pick(1).stroke_width(3),
        ))?;

        let annotation = format!(
            "r ∝ t^{:.3} ({} pts)",
            fit.exponent, fit.point_count
        );
        chart_area.draw(&Text::new(
            annotation,
            (80, 20),
            ("sans-serif", 20).into_font(),
        ))?;
    }

    chart.draw_series(std::iter::once(PathElement::new(
        vec![
            (t_floor, r_floor),
            (t_ceiling, r_floor),
            (t_ceiling, r_ceiling),
            (t_floor, r_ceiling),
            (t_floor, r_floor),
        ],
        &BLACK,
    )))?;

    chart_area
        .present()
        .map_err(|e| anyhow!("Failed to render RMSD chart: {:?}", e))?;
    Ok(())
}

/// Expands both ranges to the larger span so x and y share a scale.
fn square_bounds(x: (f64, f64), y: (f64, f64)) -> ((f64, f64), (f64, f64)) {
    let half_span = ((x.1 - x.0).max(y.1 - y.0) * 0.5) * 1.08;
    let x_center = 0.5 * (x.0 + x.1);
    let y_center = 0.5 * (y.0 + y.1);
    (
        (x_center - half_span, x_center + half_span),
        (y_center - half_span, y_center + half_span),
    )
}

fn positive_bounds<I>(values: I) -> (f64, f64)
where
    I: Iterator<Item = f64>,
{
    let mut min_positive = f64::INFINITY;
    let mut max_value: f64 = 0.0;
    for value in values {
        if value > 0.0 && value < min_positive {
            min_positive = value;
        }
        if value > max_value {
            max_value = value;
        }
    }

    if !min_positive.is_finite() {
        min_positive = 1e-12;
    }
    if max_value <= min_positive {
        max_value = min_positive * 10.0;
    }
    (min_positive, max_value)
}

fn floor_power_of_ten(value: f64) -> f64 {
    10f64.powi(value.log10().floor() as i32)
}

fn ceil_power_of_ten(value: f64) -> f64 {
    let ceiling = 10f64.powi(value.log10().ceil() as i32);
    if ceiling <= value { ceiling * 10.0 } else { ceiling }
}

fn min_max<I>(values: I) -> (f64, f64)
where
    I: Iterator<Item = f64>,
{
    let mut iter = values.peekable();
    if iter.peek().is_none() {
        return (0.0, 1.0);
    }

    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;

    for val in iter {
        if val < min {
            min = val;
        }
        if val > max {
            max = val;
        }
    }

    if (max - min).abs() < f64::EPSILON {
        let epsilon = if min.abs() < 1.0 {
            1.0
        } else {
            min.abs() * 0.05
        };
        (min - epsilon, max + epsilon)
    } else {
        (min, max)
    }
}

fn format_log_tick(value: f64) -> String {
    if !value.is_finite() || value <= 0.0 {
        return "0".into();
    }

    let log10 = value.log10();
    let exponent = log10.round();
    if (log10 - exponent).abs() < 5e-4 {
        format!("1e{}", exponent as i32)
    } else {
        format!("{:.1e}", value)
    }
}

fn format_decimal_tick(value: f64) -> String {
    if value.abs() >= 1e4 || (value != 0.0 && value.abs() < 1e-3) {
        format!("{:.1e}", value)
    } else {
        format!("{:.3}", value)
            .trim_end_matches('0')
            .trim_end_matches('.')
            .to_string()
    }
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.exists() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create plot directory {}", parent.display()))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn square_bounds_share_span() {
        let ((x0, x1), (y0, y1)) = square_bounds((-1.0, 3.0), (0.0, 1.0));
        assert!(((x1 - x0) - (y1 - y0)).abs() < 1e-12);
        assert!(x0 < -1.0 && x1 > 3.0);
        assert!(y0 < 0.0 && y1 > 1.0);
    }

    #[test]
    fn power_of_ten_bounds_enclose_value() {
        assert!((floor_power_of_ten(0.35) - 0.1).abs() < 1e-15);
        assert_eq!(ceil_power_of_ten(0.35), 1.0);
        assert_eq!(ceil_power_of_ten(10.0), 100.0);
    }

    #[test]
    fn positive_bounds_ignore_non_positive_values() {
        let (lo, hi) = positive_bounds([0.0, -2.0, 0.5, 4.0].into_iter());
        assert_eq!(lo, 0.5);
        assert_eq!(hi, 4.0);
    }

    #[test]
    fn tick_formatting() {
        assert_eq!(format_log_tick(100.0), "1e2");
        assert_eq!(format_decimal_tick(0.0), "0");
        assert_eq!(format_decimal_tick(2.5), "2.5");
    }
}
