use std::io::Cursor;

use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb};
use plotters::prelude::*;

use crate::drivers::buffer::ProbeTrace;
use crate::drivers::error::ScopeError;

#[derive(Clone, Debug)]
pub struct PlotStyle {
    pub width: u32,
    pub height: u32,
    pub background: RGBColor,
    pub palette: Vec<RGBColor>,
}

impl Default for PlotStyle {
    fn default() -> Self {
        Self {
            width: 900,
            height: 400,
            background: RGBColor(10, 10, 10),
            palette: vec![BLUE, RED, GREEN, CYAN, MAGENTA, YELLOW, WHITE],
        }
    }
}

/// Draws every probe's history as one line, colour by probe index. The x
/// axis spans the synthetic `(0, 0.5]` history coordinates.
///
/// No text is drawn, so no font backend is needed.
pub fn render_history_png(traces: &[ProbeTrace], style: &PlotStyle) -> Result<Vec<u8>, ScopeError> {
    if traces.iter().all(|t| t.points.is_empty()) {
        return Err(ScopeError::Plot("probe histories are empty".into()));
    }
    if style.palette.is_empty() {
        return Err(ScopeError::Plot("plot palette is empty".into()));
    }
    let (y_min, y_max) = y_bounds(traces);
    let mut buffer = vec![0u8; (style.width * style.height * 3) as usize];
    {
        let root = BitMapBackend::with_buffer(&mut buffer, (style.width, style.height))
            .into_drawing_area();
        root.fill(&style.background)?;
        let mut chart = ChartBuilder::on(&root)
            .margin(10)
            .build_cartesian_2d(0f64..0.5f64, y_min..y_max)?;
        for trace in traces {
            let color = style.palette[trace.probe % style.palette.len()];
            chart.draw_series(LineSeries::new(trace.points.iter().copied(), &color))?;
        }
        root.present()?;
    }
    encode_png(&buffer, style.width, style.height)
}

fn y_bounds(traces: &[ProbeTrace]) -> (f64, f64) {
    let values = traces
        .iter()
        .flat_map(|t| t.points.iter().map(|&(_, y)| y))
        .filter(|y| y.is_finite());
    let (min, max) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    if !min.is_finite() || !max.is_finite() {
        return (-1.0, 1.0);
    }
    let pad = ((max - min) * 0.1).max(1e-3);
    (min - pad, max + pad)
}

fn encode_png(buffer: &[u8], width: u32, height: u32) -> Result<Vec<u8>, ScopeError> {
    let image = ImageBuffer::<Rgb<u8>, _>::from_raw(width, height, buffer.to_vec())
        .ok_or_else(|| ScopeError::Plot("failed to allocate image buffer".into()))?;
    let mut output = Vec::new();
    let dynamic = DynamicImage::ImageRgb8(image);
    dynamic.write_to(&mut Cursor::new(&mut output), ImageFormat::Png)?;
    Ok(output)
}
