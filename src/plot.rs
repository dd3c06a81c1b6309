use std::path::Path;

use plotters::prelude::PathElement;
use plotters::prelude::*;

use crate::utils::DynError;

pub use plotters::prelude::{RGBColor, BLACK, BLUE, GREEN, RED};

const PLOT_FONT_SCALE: f64 = 1.2;

fn scaled_font_size(base: i32) -> i32 {
    ((base as f64) * PLOT_FONT_SCALE).round() as i32
}

fn scaled_area_size(base: i32) -> i32 {
    ((base as f64) * PLOT_FONT_SCALE).round() as i32
}

fn check_series(x_vals: &[f64], series: &[(&[f64], &RGBColor, &str)]) -> Result<(), DynError> {
    if series.is_empty() {
        return Err("No series provided to plot".into());
    }
    if x_vals.is_empty() {
        return Err("No data points to plot".into());
    }
    for (data_series, _, label) in series.iter() {
        if data_series.len() != x_vals.len() {
            return Err(format!("X-value vector length does not match data length for {label}").into());
        }
    }
    Ok(())
}

fn finite_range(values: impl Iterator<Item = f64>) -> Option<(f64, f64)> {
    let (lo, hi) = values
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });
    (lo <= hi).then_some((lo, hi))
}

fn positive(x: f64, y: f64) -> bool {
    x > 0.0 && y > 0.0 && x.is_finite() && y.is_finite()
}

/// Expands a degenerate range so the axis can still be drawn.
fn widen(lo: f64, hi: f64, log: bool) -> (f64, f64) {
    if lo < hi {
        (lo, hi)
    } else if log {
        (lo * 0.5, hi * 2.0)
    } else if lo == 0.0 {
        (-1.0, 1.0)
    } else {
        let pad = 0.5 * lo.abs();
        (lo - pad, hi + pad)
    }
}

/// Log-log line plot. Points with a non-positive coordinate are left out.
pub fn plot_loglog_series(
    x_vals: &[f64],
    series: &[(&[f64], &RGBColor, &str)],
    title: &str,
    filename: &Path,
    x_label: &str,
    y_label: &str,
) -> Result<(), DynError> {
    check_series(x_vals, series)?;

    let (x_min, x_max) = finite_range(x_vals.iter().copied().filter(|x| *x > 0.0))
        .ok_or("No positive frequencies to plot on a log axis")?;
    let (y_min, y_max) = finite_range(series.iter().flat_map(|(data, _, _)| {
        x_vals
            .iter()
            .zip(data.iter())
            .filter(|(x, y)| positive(**x, **y))
            .map(|(_, y)| *y)
    }))
    .ok_or("No positive values to plot on a log axis")?;
    let (x_min, x_max) = widen(x_min, x_max, true);
    let (y_min, y_max) = widen(y_min, y_max, true);

    let root = BitMapBackend::new(filename, (1280, 720)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", scaled_font_size(28)).into_font())
        .margin(10)
        .x_label_area_size(scaled_area_size(40))
        .y_label_area_size(scaled_area_size(80))
        .build_cartesian_2d((x_min..x_max).log_scale(), (y_min..y_max).log_scale())?;

    chart
        .configure_mesh()
        .x_desc(x_label)
        .y_desc(y_label)
        .x_label_formatter(&|v| format!("{v:.0e}"))
        .y_label_formatter(&|v| format!("{v:.0e}"))
        .label_style(("sans-serif", scaled_font_size(20)).into_font())
        .axis_desc_style(("sans-serif", scaled_font_size(24)).into_font())
        .light_line_style(WHITE.mix(0.0))
        .draw()?;

    for (data_series, color, label) in series.iter() {
        chart
            .draw_series(LineSeries::new(
                x_vals
                    .iter()
                    .zip(data_series.iter())
                    .filter(|(x, y)| positive(**x, **y))
                    .map(|(x, y)| (*x, *y)),
                *color,
            ))?
            .label(*label)
            .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 10, y)], *color));
    }

    chart
        .configure_series_labels()
        .border_style(BLACK)
        .background_style(&WHITE.mix(0.8))
        .label_font(("sans-serif", scaled_font_size(20)).into_font())
        .draw()?;

    root.present()?;
    Ok(())
}

/// Log-x, linear-y line plot for signed quantities such as the real and
/// imaginary parts of a cross spectrum.
pub fn plot_logx_series(
    x_vals: &[f64],
    series: &[(&[f64], &RGBColor, &str)],
    title: &str,
    filename: &Path,
    x_label: &str,
    y_label: &str,
) -> Result<(), DynError> {
    check_series(x_vals, series)?;

    let (x_min, x_max) = finite_range(x_vals.iter().copied().filter(|x| *x > 0.0))
        .ok_or("No positive frequencies to plot on a log axis")?;
    let (y_min, y_max) = finite_range(series.iter().flat_map(|(data, _, _)| {
        x_vals
            .iter()
            .zip(data.iter())
            .filter(|(x, _)| **x > 0.0)
            .map(|(_, y)| *y)
    }))
    .ok_or("No finite values to plot")?;
    let (x_min, x_max) = widen(x_min, x_max, true);
    let (y_min, y_max) = widen(y_min, y_max, false);

    let root = BitMapBackend::new(filename, (1280, 720)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", scaled_font_size(28)).into_font())
        .margin(10)
        .x_label_area_size(scaled_area_size(40))
        .y_label_area_size(scaled_area_size(80))
        .build_cartesian_2d((x_min..x_max).log_scale(), y_min..y_max)?;

    chart
        .configure_mesh()
        .x_desc(x_label)
        .y_desc(y_label)
        .x_label_formatter(&|v| format!("{v:.0e}"))
        .y_label_formatter(&|v| format!("{v:.1e}"))
        .label_style(("sans-serif", scaled_font_size(20)).into_font())
        .axis_desc_style(("sans-serif", scaled_font_size(24)).into_font())
        .light_line_style(WHITE.mix(0.0))
        .draw()?;

    for (data_series, color, label) in series.iter() {
        chart
            .draw_series(LineSeries::new(
                x_vals
                    .iter()
                    .zip(data_series.iter())
                    .filter(|(x, y)| **x > 0.0 && y.is_finite())
                    .map(|(x, y)| (*x, *y)),
                *color,
            ))?
            .label(*label)
            .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 10, y)], *color));
    }

    chart
        .configure_series_labels()
        .border_style(BLACK)
        .background_style(&WHITE.mix(0.8))
        .label_font(("sans-serif", scaled_font_size(20)).into_font())
        .draw()?;

    root.present()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn degenerate_ranges_are_widened() {
        assert_eq!(widen(1.0, 1.0, true), (0.5, 2.0));
        assert_eq!(widen(0.0, 0.0, false), (-1.0, 1.0));
        assert_eq!(widen(-2.0, -2.0, false), (-3.0, -1.0));
        assert_eq!(widen(1.0, 3.0, false), (1.0, 3.0));
    }

    #[test]
    fn range_skips_non_finite_values() {
        let values = [f64::NAN, 2.0, f64::INFINITY, -1.0];
        assert_eq!(finite_range(values.iter().copied()), Some((-1.0, 2.0)));
        assert_eq!(finite_range(std::iter::empty()), None);
    }

    #[test]
    fn mismatched_series_are_rejected() {
        let x = [1.0, 2.0];
        let y = [1.0];
        assert!(check_series(&x, &[(&y[..], &BLUE, "a")]).is_err());
        assert!(check_series(&x, &[]).is_err());
    }
}
