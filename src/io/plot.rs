use crate::types::{CloudGridError, CloudGridResult, FractionGrid};
use plotters::prelude::*;
use std::path::Path;

/// Appearance of the rendered cloud fraction map
#[derive(Debug, Clone)]
pub struct PlotStyle {
    pub title: String,
    /// Image size in pixels (width, height)
    pub size: (u32, u32),
    /// Number of discrete filled levels between 0 and 1
    pub levels: usize,
}

impl Default for PlotStyle {
    fn default() -> Self {
        Self {
            title: "Level 3 Cloud Fraction Aggregation For One Month".to_string(),
            size: (1400, 700),
            levels: 100,
        }
    }
}

/// Snap a fraction onto one of `levels` bands and return the band's colour.
/// NaN (unobserved) yields `None` and stays blank.
pub fn level_color(value: f64, levels: usize) -> Option<RGBColor> {
    if !value.is_finite() {
        return None;
    }
    let levels = levels.max(1);
    let band = ((value.clamp(0.0, 1.0) * levels as f64).floor() as usize).min(levels - 1);
    let t = if levels == 1 {
        0.5
    } else {
        band as f64 / (levels - 1) as f64
    };
    let c = colorous::TURBO.eval_continuous(t);
    Some(RGBColor(c.r, c.g, c.b))
}

fn plot_err<E: std::fmt::Display>(e: E) -> CloudGridError {
    CloudGridError::Plot(e.to_string())
}

/// Render the fraction grid as a filled map over [-180,180] x [-90,90]
/// with a colour bar and save it as PNG.
pub fn render_fraction_map<P: AsRef<Path>>(
    fraction: &FractionGrid,
    output_path: P,
    style: &PlotStyle,
) -> CloudGridResult<()> {
    let path = output_path.as_ref();
    log::info!("Rendering cloud fraction map: {}", path.display());

    let root = BitMapBackend::new(path, style.size).into_drawing_area();
    root.fill(&WHITE).map_err(plot_err)?;
    let bar_width = (style.size.0 / 10).max(80);
    let (map_area, bar_area) = root.split_horizontally(style.size.0 - bar_width);

    let mut chart = ChartBuilder::on(&map_area)
        .caption(&style.title, ("sans-serif", 24))
        .margin(10)
        .x_label_area_size(50)
        .y_label_area_size(60)
        .build_cartesian_2d(-180.0f64..180.0f64, -90.0f64..90.0f64)
        .map_err(plot_err)?;

    chart
        .configure_mesh()
        .disable_mesh()
        .x_desc("Longitude")
        .y_desc("Latitude")
        .x_labels(13)
        .y_labels(7)
        .label_style(("sans-serif", 16))
        .axis_desc_style(("sans-serif", 20))
        .draw()
        .map_err(plot_err)?;

    let levels = style.levels;
    chart
        .draw_series(fraction.indexed_iter().filter_map(|((row, col), &value)| {
            let color = level_color(value, levels)?;
            let lon = col as f64 - 180.0;
            let lat = row as f64 - 90.0;
            Some(Rectangle::new([(lon, lat), (lon + 1.0, lat + 1.0)], color.filled()))
        }))
        .map_err(plot_err)?;

    let mut bar = ChartBuilder::on(&bar_area)
        .margin_top(50)
        .margin_bottom(60)
        .margin_right(10)
        .y_label_area_size(45)
        .build_cartesian_2d(0.0f64..1.0f64, 0.0f64..1.0f64)
        .map_err(plot_err)?;

    bar.configure_mesh()
        .disable_mesh()
        .disable_x_axis()
        .y_labels(11)
        .y_label_formatter(&|v| format!("{:.1}", v))
        .label_style(("sans-serif", 14))
        .draw()
        .map_err(plot_err)?;

    let step = 1.0 / levels.max(1) as f64;
    bar.draw_series((0..levels.max(1)).filter_map(|i| {
        let lower = i as f64 * step;
        let color = level_color(lower + step / 2.0, levels)?;
        Some(Rectangle::new([(0.0, lower), (1.0, lower + step)], color.filled()))
    }))
    .map_err(plot_err)?;

    root.present().map_err(plot_err)?;
    log::info!("Cloud fraction map saved");
    Ok(())
}
