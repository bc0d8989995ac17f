//! Reporting of information-plane results to a plotting sink
//!
//! The sink is a narrow seam: it receives named bar, box and line plots and says
//! whether a window already exists. [`MemorySink`] keeps every event for
//! inspection; [`JsonLinesSink`] streams them as JSON lines for an external viewer.

use super::quantize::Symbols;
use super::InformationPoint;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::io::Write;

/// Window title of the information-plane plot
pub const INFORMATION_PLANE_TITLE: &str = "Mutual information plane";

/// Window title of the dispersion box plot
pub const DISPERSION_WINDOW: &str = "MI hist";

/// Labels attached to a plot
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PlotOptions {
    /// Plot title
    pub title: String,
    /// X axis label
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub xlabel: Option<String>,
    /// Y axis label
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ylabel: Option<String>,
    /// One entry per series
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub legend: Vec<String>,
}

impl PlotOptions {
    /// Options with a title only
    pub fn titled(title: &str) -> Self {
        Self {
            title: title.to_string(),
            ..Self::default()
        }
    }

    /// Set the x axis label
    pub fn with_xlabel(mut self, label: &str) -> Self {
        self.xlabel = Some(label.to_string());
        self
    }

    /// Set the y axis label
    pub fn with_ylabel(mut self, label: &str) -> Self {
        self.ylabel = Some(label.to_string());
        self
    }

    /// Set the legend
    pub fn with_legend(mut self, legend: Vec<String>) -> Self {
        self.legend = legend;
        self
    }
}

/// A single plotting call
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PlotEvent {
    /// Bar chart of `y` over `x`
    Bar {
        win: String,
        x: Vec<f64>,
        y: Vec<f64>,
        opts: PlotOptions,
    },
    /// One box per column
    Boxplot {
        win: String,
        columns: Vec<Vec<f64>>,
        opts: PlotOptions,
    },
    /// One point per series: series `i` gets `(x[i], y[i])`
    Line {
        win: String,
        x: Vec<f64>,
        y: Vec<f64>,
        opts: PlotOptions,
        append: bool,
    },
}

impl PlotEvent {
    /// Window the event targets
    pub fn win(&self) -> &str {
        match self {
            PlotEvent::Bar { win, .. }
            | PlotEvent::Boxplot { win, .. }
            | PlotEvent::Line { win, .. } => win,
        }
    }
}

/// Destination for plots
pub trait PlotSink {
    /// Deliver one plotting call
    fn record(&mut self, event: PlotEvent) -> Result<()>;

    /// Whether a window with this title has been drawn before
    fn win_exists(&self, win: &str) -> bool;

    /// Bar chart
    fn bar(&mut self, win: &str, x: Vec<f64>, y: Vec<f64>, opts: PlotOptions) -> Result<()> {
        self.record(PlotEvent::Bar {
            win: win.to_string(),
            x,
            y,
            opts,
        })
    }

    /// Box plot with one box per column
    fn boxplot(&mut self, win: &str, columns: Vec<Vec<f64>>, opts: PlotOptions) -> Result<()> {
        self.record(PlotEvent::Boxplot {
            win: win.to_string(),
            columns,
            opts,
        })
    }

    /// Line plot; `append` extends an existing window instead of replacing it
    fn line(
        &mut self,
        win: &str,
        x: Vec<f64>,
        y: Vec<f64>,
        opts: PlotOptions,
        append: bool,
    ) -> Result<()> {
        self.record(PlotEvent::Line {
            win: win.to_string(),
            x,
            y,
            opts,
            append,
        })
    }
}

/// Sink that keeps every event in memory
#[derive(Clone, Debug, Default)]
pub struct MemorySink {
    events: Vec<PlotEvent>,
    windows: HashSet<String>,
}

impl MemorySink {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded events in order
    pub fn events(&self) -> &[PlotEvent] {
        &self.events
    }

    /// Events targeting `win`
    pub fn events_for<'a>(&'a self, win: &'a str) -> impl Iterator<Item = &'a PlotEvent> + 'a {
        self.events.iter().filter(move |e| e.win() == win)
    }

    /// Forget all events and windows
    pub fn clear(&mut self) {
        self.events.clear();
        self.windows.clear();
    }
}

impl PlotSink for MemorySink {
    fn record(&mut self, event: PlotEvent) -> Result<()> {
        self.windows.insert(event.win().to_string());
        self.events.push(event);
        Ok(())
    }

    fn win_exists(&self, win: &str) -> bool {
        self.windows.contains(win)
    }
}

/// Sink writing one JSON object per event
#[derive(Debug)]
pub struct JsonLinesSink<W: Write> {
    writer: W,
    windows: HashSet<String>,
}

impl<W: Write> JsonLinesSink<W> {
    /// Wrap a writer
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            windows: HashSet::new(),
        }
    }

    /// Flush and return the writer
    pub fn into_inner(mut self) -> Result<W> {
        self.writer.flush()?;
        Ok(self.writer)
    }
}

impl<W: Write> PlotSink for JsonLinesSink<W> {
    fn record(&mut self, event: PlotEvent) -> Result<()> {
        serde_json::to_writer(&mut self.writer, &event)?;
        self.writer.write_all(b"\n")?;
        self.windows.insert(event.win().to_string());
        Ok(())
    }

    fn win_exists(&self, win: &str) -> bool {
        self.windows.contains(win)
    }
}

/// Plot one point per layer in the (I(X;T), I(T;Y)) plane
pub fn plot_information_plane(
    sink: &mut dyn PlotSink,
    information: &BTreeMap<String, InformationPoint>,
) -> Result<()> {
    if information.is_empty() {
        return Ok(());
    }
    let legend: Vec<String> = information.keys().cloned().collect();
    let x: Vec<f64> = information.values().map(|p| p.info_x).collect();
    let y: Vec<f64> = information.values().map(|p| p.info_y).collect();
    let opts = PlotOptions::titled(INFORMATION_PLANE_TITLE)
        .with_xlabel("I(X, T), bits")
        .with_ylabel("I(T, Y), bits")
        .with_legend(legend);
    let append = sink.win_exists(INFORMATION_PLANE_TITLE);
    sink.line(INFORMATION_PLANE_TITLE, x, y, opts, append)
}

/// Bar chart of bin occupancy per layer, most populated bin first
pub fn plot_quantized_hist(
    sink: &mut dyn PlotSink,
    quantized: &BTreeMap<String, Symbols>,
) -> Result<()> {
    for (name, symbols) in quantized {
        let mut counts = symbols.counts();
        counts.sort_unstable_by(|a, b| b.cmp(a));
        let x = (0..counts.len()).map(|i| i as f64).collect();
        let y = counts.into_iter().map(|c| c as f64).collect();
        let opts = PlotOptions::titled(&format!("{} MI quantized histogram", name))
            .with_xlabel("bin ID")
            .with_ylabel("# items");
        sink.bar(&format!("{} MI hist", name), x, y, opts)?;
    }
    Ok(())
}

/// Box plot describing how evenly samples spread over bins
///
/// Skipped when any layer reports zero bins (continuous passthrough). When every
/// layer shares one bin count the boxes show items per bin; otherwise they show
/// the distribution of symbol ids.
pub fn plot_quantized_dispersion(
    sink: &mut dyn PlotSink,
    quantized: &BTreeMap<String, Symbols>,
    n_bins: &BTreeMap<String, usize>,
) -> Result<()> {
    if quantized.is_empty() {
        return Ok(());
    }
    let bins: Vec<usize> = quantized
        .keys()
        .map(|name| n_bins.get(name).copied().unwrap_or(0))
        .collect();
    if bins.contains(&0) {
        return Ok(());
    }
    let legend: Vec<String> = quantized
        .keys()
        .zip(&bins)
        .map(|(name, n)| format!("{} ({} bins)", name, n))
        .collect();

    let distinct: BTreeSet<usize> = bins.iter().copied().collect();
    if distinct.len() == 1 {
        let per_layer: Vec<Vec<usize>> = quantized.values().map(Symbols::counts).collect();
        let width = per_layer
            .iter()
            .map(Vec::len)
            .max()
            .unwrap_or(0)
            .max(bins[0]);
        let columns = per_layer
            .into_iter()
            .map(|counts| {
                let mut column: Vec<f64> = counts.into_iter().map(|c| c as f64).collect();
                column.resize(width, 0.0);
                column
            })
            .collect();
        let opts = PlotOptions::titled("MI quantized dispersion (smaller is better)")
            .with_ylabel("# items in one bin")
            .with_legend(legend);
        sink.boxplot(DISPERSION_WINDOW, columns, opts)
    } else {
        let columns = quantized
            .values()
            .filter_map(Symbols::as_discrete)
            .map(|s| s.iter().map(|&v| v as f64).collect())
            .collect();
        let opts = PlotOptions::titled("MI inverse quantized dispersion (smaller is worse)")
            .with_ylabel("bin ID dispersion")
            .with_legend(legend);
        sink.boxplot(DISPERSION_WINDOW, columns, opts)
    }
}
