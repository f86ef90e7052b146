use crate::error::AppError;
use crate::series::TimeSeries;

/// Rendering collaborator for diagnostic charts. The core only depends on
/// this trait; nothing downstream consumes a renderer's output.
pub trait SeriesRenderer {
    /// Render labelled series as overlaid lines.
    fn render_series(&mut self, title: &str, series: &[(&str, &TimeSeries)])
        -> Result<(), AppError>;

    /// Render a plain value sequence as a line over its index.
    fn render_values(&mut self, title: &str, values: &[f64]) -> Result<(), AppError>;

    /// Render a value sequence as stems (used for ACF charts).
    fn render_stems(&mut self, title: &str, values: &[f64]) -> Result<(), AppError>;
}

/// Renderer that discards every chart. Useful for headless runs.
#[derive(Debug, Default)]
pub struct NullRenderer;

impl SeriesRenderer for NullRenderer {
    fn render_series(
        &mut self,
        _title: &str,
        _series: &[(&str, &TimeSeries)],
    ) -> Result<(), AppError> {
        Ok(())
    }

    fn render_values(&mut self, _title: &str, _values: &[f64]) -> Result<(), AppError> {
        Ok(())
    }

    fn render_stems(&mut self, _title: &str, _values: &[f64]) -> Result<(), AppError> {
        Ok(())
    }
}

#[cfg(feature = "charts")]
pub use png::PngRenderer;

#[cfg(feature = "charts")]
mod png {
    use std::path::PathBuf;

    use plotters::prelude::*;

    use super::SeriesRenderer;
    use crate::error::AppError;
    use crate::series::TimeSeries;

    /// Writes one PNG per chart into an output directory, named after a
    /// slug of the chart title.
    pub struct PngRenderer {
        out_dir: PathBuf,
        size: (u32, u32),
    }

    impl PngRenderer {
        pub fn new(out_dir: impl Into<PathBuf>) -> Self {
            Self {
                out_dir: out_dir.into(),
                size: (1000, 400),
            }
        }

        fn chart_path(&self, title: &str) -> Result<PathBuf, AppError> {
            std::fs::create_dir_all(&self.out_dir)?;
            let slug: String = title
                .chars()
                .map(|c| {
                    if c.is_ascii_alphanumeric() {
                        c.to_ascii_lowercase()
                    } else {
                        '-'
                    }
                })
                .collect();
            Ok(self.out_dir.join(format!("{slug}.png")))
        }

        fn draw_lines(
            &self,
            title: &str,
            lines: &[(&str, Vec<(f64, f64)>)],
            stems: bool,
        ) -> Result<(), AppError> {
            let path = self.chart_path(title)?;
            let chart_err = |e: &dyn std::fmt::Display| AppError::Chart(format!("{title}: {e}"));

            let (mut x_max, mut y_min, mut y_max) = (1.0f64, f64::MAX, f64::MIN);
            for (_, points) in lines {
                for &(x, y) in points {
                    x_max = x_max.max(x);
                    y_min = y_min.min(y);
                    y_max = y_max.max(y);
                }
            }
            if y_min > y_max {
                (y_min, y_max) = (0.0, 1.0);
            }
            let pad = ((y_max - y_min).abs()).max(1e-9) * 0.05;

            let root = BitMapBackend::new(&path, self.size).into_drawing_area();
            root.fill(&WHITE).map_err(|e| chart_err(&e))?;
            let mut chart = ChartBuilder::on(&root)
                .caption(title, ("sans-serif", 20))
                .margin(10)
                .x_label_area_size(30)
                .y_label_area_size(50)
                .build_cartesian_2d(0.0..x_max, (y_min - pad)..(y_max + pad))
                .map_err(|e| chart_err(&e))?;
            chart
                .configure_mesh()
                .draw()
                .map_err(|e| chart_err(&e))?;

            for (idx, (label, points)) in lines.iter().enumerate() {
                let color = Palette99::pick(idx).to_rgba();
                if stems {
                    chart
                        .draw_series(points.iter().map(|&(x, y)| {
                            PathElement::new(vec![(x, 0.0), (x, y)], color.clone())
                        }))
                        .map_err(|e| chart_err(&e))?;
                } else {
                    chart
                        .draw_series(LineSeries::new(points.iter().copied(), color.clone()))
                        .map_err(|e| chart_err(&e))?
                        .label(label.to_string())
                        .legend(move |(x, y)| {
                            PathElement::new(vec![(x, y), (x + 16, y)], color.clone())
                        });
                }
            }
            if !stems && lines.len() > 1 {
                chart
                    .configure_series_labels()
                    .border_style(BLACK)
                    .draw()
                    .map_err(|e| chart_err(&e))?;
            }
            root.present().map_err(|e| chart_err(&e))?;
            Ok(())
        }
    }

    impl SeriesRenderer for PngRenderer {
        fn render_series(
            &mut self,
            title: &str,
            series: &[(&str, &TimeSeries)],
        ) -> Result<(), AppError> {
            let lines: Vec<(&str, Vec<(f64, f64)>)> = series
                .iter()
                .map(|(label, s)| {
                    (
                        *label,
                        s.values()
                            .enumerate()
                            .map(|(i, v)| (i as f64, v))
                            .collect(),
                    )
                })
                .collect();
            self.draw_lines(title, &lines, false)
        }

        fn render_values(&mut self, title: &str, values: &[f64]) -> Result<(), AppError> {
            let points: Vec<(f64, f64)> = values
                .iter()
                .enumerate()
                .map(|(i, &v)| (i as f64, v))
                .collect();
            self.draw_lines(title, &[("values", points)], false)
        }

        fn render_stems(&mut self, title: &str, values: &[f64]) -> Result<(), AppError> {
            let points: Vec<(f64, f64)> = values
                .iter()
                .enumerate()
                .map(|(i, &v)| (i as f64, v))
                .collect();
            self.draw_lines(title, &[("acf", points)], true)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn null_renderer_accepts_everything() {
        let mut renderer = NullRenderer;
        let s = TimeSeries::from_pairs(vec![(
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            1.0,
        )])
        .unwrap();
        assert!(renderer.render_series("t", &[("a", &s)]).is_ok());
        assert!(renderer.render_values("t", &[1.0, 2.0]).is_ok());
        assert!(renderer.render_stems("t", &[1.0, 0.5]).is_ok());
    }
}
