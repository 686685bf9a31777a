//! Confidence-over-time chart.
//!
//! [`ChartRenderer`] owns the live chart. Drawing a new one always destroys
//! the previous instance first, so repeated predictions never stack charts.

use std::io::Write;

use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Rect},
    style::{Color, Style},
    symbols::Marker,
    widgets::{Axis, Chart, Dataset, GraphType, Widget},
};

use crate::models::FrameResult;
use crate::view::time_label;

pub const DATASET_LABEL: &str = "Confidence Level (%)";
pub const X_AXIS_TITLE: &str = "Time (s)";
pub const Y_AXIS_TITLE: &str = "Confidence (%)";

const Y_MAX: f64 = 100.0;
const CHART_WIDTH: u16 = 72;
const CHART_HEIGHT: u16 = 16;
// Past this many points only the first, middle and last ticks are labelled.
const MAX_X_LABELS: usize = 6;

/// One point of the line: x label and confidence percentage.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartPoint {
    pub label: String,
    pub value: f64,
}

/// A drawn line chart of confidence keyed by timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfidenceChart {
    id: u64,
    points: Vec<ChartPoint>,
}

impl ConfidenceChart {
    fn from_details(id: u64, details: &[FrameResult]) -> Self {
        let points = details
            .iter()
            .map(|frame| ChartPoint {
                label: time_label(frame.timestamp),
                value: frame.confidence,
            })
            .collect();
        Self { id, points }
    }

    /// Identity of this instance; a fresh id per draw.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn points(&self) -> &[ChartPoint] {
        &self.points
    }

    /// Points in plot space: x is the position in the series, y the
    /// confidence held to the 0..=100 axis.
    fn series(&self) -> Vec<(f64, f64)> {
        self.points
            .iter()
            .enumerate()
            .map(|(i, p)| (i as f64, p.value.clamp(0.0, Y_MAX)))
            .collect()
    }

    fn x_labels(&self) -> Vec<String> {
        let labels: Vec<String> = self.points.iter().map(|p| p.label.clone()).collect();
        if labels.len() <= MAX_X_LABELS {
            return labels;
        }
        let last = labels.len() - 1;
        vec![
            labels[0].clone(),
            labels[last / 2].clone(),
            labels[last].clone(),
        ]
    }

    /// Renders the chart widget into an off-screen buffer of `width` x `height`.
    pub fn render(&self, width: u16, height: u16) -> Buffer {
        let data = self.series();
        let x_max = data.len().saturating_sub(1).max(1) as f64;

        let dataset = Dataset::default()
            .name(DATASET_LABEL)
            .marker(Marker::Braille)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(Color::Cyan))
            .data(&data);

        let chart = Chart::new(vec![dataset])
            .x_axis(
                Axis::default()
                    .title(X_AXIS_TITLE)
                    .bounds([0.0, x_max])
                    .labels(self.x_labels()),
            )
            .y_axis(
                Axis::default()
                    .title(Y_AXIS_TITLE)
                    .bounds([0.0, Y_MAX])
                    .labels(vec!["0", "50", "100"]),
            )
            .hidden_legend_constraints((Constraint::Ratio(1, 2), Constraint::Ratio(1, 2)));

        let area = Rect::new(0, 0, width, height);
        let mut buf = Buffer::empty(area);
        chart.render(area, &mut buf);
        buf
    }
}

/// Plain text rows of a rendered buffer, trailing blanks trimmed.
fn buffer_lines(buf: &Buffer) -> Vec<String> {
    let area = buf.area;
    (area.top()..area.bottom())
        .map(|y| {
            let row: String = (area.left()..area.right())
                .map(|x| buf[(x, y)].symbol())
                .collect();
            row.trim_end().to_string()
        })
        .collect()
}

/// Where charts are drawn.
pub trait ChartSurface {
    fn draw(&mut self, chart: &ConfidenceChart);

    fn destroy(&mut self, chart: &ConfidenceChart);
}

/// Prints each chart to a writer. A terminal cannot erase what it printed, so
/// destroying only drops the instance.
pub struct TerminalSurface<W: Write> {
    out: W,
    width: u16,
    height: u16,
}

impl<W: Write> TerminalSurface<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            width: CHART_WIDTH,
            height: CHART_HEIGHT,
        }
    }
}

impl<W: Write> ChartSurface for TerminalSurface<W> {
    fn draw(&mut self, chart: &ConfidenceChart) {
        let buf = chart.render(self.width, self.height);
        for line in buffer_lines(&buf) {
            if let Err(err) = writeln!(self.out, "{line}") {
                log::warn!("Failed to draw chart: {err}");
                return;
            }
        }
        let _ = self.out.flush();
    }

    fn destroy(&mut self, chart: &ConfidenceChart) {
        log::debug!("Destroying chart #{}", chart.id());
    }
}

/// Owner of the single live chart.
pub struct ChartRenderer<S: ChartSurface> {
    surface: S,
    current: Option<ConfidenceChart>,
    next_id: u64,
}

impl<S: ChartSurface> ChartRenderer<S> {
    pub fn new(surface: S) -> Self {
        Self {
            surface,
            current: None,
            next_id: 1,
        }
    }

    /// Draws `details` as a new chart, replacing the current one.
    ///
    /// Empty input is a no-op and keeps any existing chart. Returns whether a
    /// chart was drawn.
    pub fn plot(&mut self, details: &[FrameResult]) -> bool {
        if details.is_empty() {
            return false;
        }

        if let Some(previous) = self.current.take() {
            self.surface.destroy(&previous);
        }

        let chart = ConfidenceChart::from_details(self.next_id, details);
        self.next_id += 1;
        self.surface.draw(&chart);
        self.current = Some(chart);
        true
    }

    pub fn current(&self) -> Option<&ConfidenceChart> {
        self.current.as_ref()
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }
}
