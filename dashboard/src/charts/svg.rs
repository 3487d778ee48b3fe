use std::fmt::Write;

use maud::{Markup, html};

use super::BinnedDataPoint;

const WIDTH: f64 = 600.0;
const HEIGHT: f64 = 200.0;
const MARGIN_LEFT: f64 = 60.0;
const MARGIN_RIGHT: f64 = 20.0;
const MARGIN_TOP: f64 = 20.0;
const MARGIN_BOTTOM: f64 = 30.0;

const TEXT_STYLE: &str = "fill: var(--foreground); font-family: inherit";
const SVG_CONTAINER_STYLE: &str = "width:100%;height:auto";
const SEPARATOR_STYLE: &str = "stroke: var(--muted); stroke-dasharray: 4 3";

fn format_value(v: f64) -> String {
    if v == v.floor() && v.abs() < 1_000_000.0 {
        format!("{v:.0}")
    } else {
        format!("{v:.1}")
    }
}

fn chart_w() -> f64 {
    WIDTH - MARGIN_LEFT - MARGIN_RIGHT
}

fn chart_h() -> f64 {
    HEIGHT - MARGIN_TOP - MARGIN_BOTTOM
}

/// `(min, max)` over bins that have data, widened so the range is never empty.
fn value_bounds(points: &[BinnedDataPoint], include_zero: bool) -> (f64, f64) {
    let mut values = points.iter().filter(|p| p.count > 0).map(|p| p.value);
    let Some(first) = values.next() else {
        return (0.0, 1.0);
    };
    let (mut min, mut max) = values.fold((first, first), |(lo, hi), v| (lo.min(v), hi.max(v)));
    if include_zero {
        min = min.min(0.0);
        max = max.max(0.0);
    }
    if (max - min).abs() < f64::EPSILON {
        max = min + 1.0;
    }
    (min, max)
}

pub fn render_bar_chart(points: &[BinnedDataPoint], separators: &[usize], label: &str) -> Markup {
    if points.iter().all(|p| p.count == 0) {
        return empty_chart(label);
    }

    let (min_val, max_val) = value_bounds(points, true);
    let range = max_val - min_val;
    let chart_h = chart_h();
    let bar_w = chart_w() / points.len() as f64;
    let zero_y = MARGIN_TOP + chart_h - ((0.0 - min_val) / range) * chart_h;

    html! {
        svg viewBox=(format!("0 0 {WIDTH} {HEIGHT}")) xmlns="http://www.w3.org/2000/svg" style=(SVG_CONTAINER_STYLE) {
            rect width=(WIDTH) height=(HEIGHT) style="fill: var(--background)" {}
            text x=(MARGIN_LEFT) y="14" font-size="12" style=(TEXT_STYLE) { (label) }
            (write_y_axis(min_val, max_val))
            @for point in points.iter().filter(|p| p.count > 0) {
                @let y = MARGIN_TOP + chart_h - ((point.value - min_val) / range) * chart_h;
                @let x = MARGIN_LEFT + point.bin_index as f64 * bar_w;
                rect x=(x) y=(y.min(zero_y)) width=((bar_w - 1.0).max(0.5)) height=((zero_y - y).abs()) opacity="0.7" style="fill: var(--foreground)" {
                    title { (point.label) ": " (format_value(point.value)) " (" (point.count) " readings)" }
                }
            }
            (write_separators(separators, bar_w))
            (write_x_axis(points))
        }
    }
}

/// Line chart over bin centres. Bins without readings break the line rather
/// than dropping it to zero.
pub fn render_line_chart(points: &[BinnedDataPoint], separators: &[usize], label: &str) -> Markup {
    if points.iter().all(|p| p.count == 0) {
        return empty_chart(label);
    }

    let (min_val, max_val) = value_bounds(points, false);
    let range = max_val - min_val;
    let chart_h = chart_h();
    let step = chart_w() / points.len() as f64;
    let position = |p: &BinnedDataPoint| {
        let x = MARGIN_LEFT + (p.bin_index as f64 + 0.5) * step;
        let y = MARGIN_TOP + chart_h - ((p.value - min_val) / range) * chart_h;
        (x, y)
    };

    let mut segments: Vec<String> = Vec::new();
    let mut current = String::new();
    for point in points {
        if point.count == 0 {
            if !current.is_empty() {
                segments.push(std::mem::take(&mut current));
            }
            continue;
        }
        let (x, y) = position(point);
        if !current.is_empty() {
            current.push(' ');
        }
        let _ = write!(current, "{x},{y}");
    }
    if !current.is_empty() {
        segments.push(current);
    }

    html! {
        svg viewBox=(format!("0 0 {WIDTH} {HEIGHT}")) xmlns="http://www.w3.org/2000/svg" style=(SVG_CONTAINER_STYLE) {
            rect width=(WIDTH) height=(HEIGHT) style="fill: var(--background)" {}
            text x=(MARGIN_LEFT) y="14" font-size="12" style=(TEXT_STYLE) { (label) }
            (write_y_axis(min_val, max_val))
            (write_separators(separators, step))
            @for segment in &segments {
                polyline points=(segment) fill="none" stroke-width="2" style="stroke: var(--foreground)" {}
            }
            @for point in points.iter().filter(|p| p.count > 0) {
                @let centre = position(point);
                circle cx=(centre.0) cy=(centre.1) r="3" style="fill: var(--foreground)" {
                    title { (point.label) ": " (format_value(point.value)) " (" (point.count) " readings)" }
                }
            }
            (write_x_axis(points))
        }
    }
}

fn write_y_axis(min_val: f64, max_val: f64) -> Markup {
    html! {
        text x=(MARGIN_LEFT - 5.0) y=(MARGIN_TOP + 10.0) font-size="10" text-anchor="end" style=(TEXT_STYLE) {
            (format_value(max_val))
        }
        text x=(MARGIN_LEFT - 5.0) y=(MARGIN_TOP + chart_h()) font-size="10" text-anchor="end" style=(TEXT_STYLE) {
            (format_value(min_val))
        }
    }
}

fn write_separators(separators: &[usize], bin_w: f64) -> Markup {
    html! {
        @for &idx in separators {
            @let x = MARGIN_LEFT + idx as f64 * bin_w;
            line x1=(x) y1=(MARGIN_TOP) x2=(x) y2=(MARGIN_TOP + chart_h()) style=(SEPARATOR_STYLE) {}
        }
    }
}

fn write_x_axis(points: &[BinnedDataPoint]) -> Markup {
    let label_y = HEIGHT - 5.0;
    let chart_w = chart_w();
    html! {
        @if let Some(first) = points.first() {
            text x=(MARGIN_LEFT) y=(label_y) font-size="11" text-anchor="start" style=(TEXT_STYLE) {
                (first.label)
            }
        }
        @if points.len() > 2 {
            @let mid = points.len() / 2;
            @let mid_x = MARGIN_LEFT + chart_w / 2.0;
            text x=(mid_x) y=(label_y) font-size="11" text-anchor="middle" style=(TEXT_STYLE) {
                (points[mid].label)
            }
        }
        @if let Some(last) = points.last() {
            @let end_x = MARGIN_LEFT + chart_w;
            text x=(end_x) y=(label_y) font-size="11" text-anchor="end" style=(TEXT_STYLE) {
                (last.label)
            }
        }
    }
}

fn empty_chart(label: &str) -> Markup {
    html! {
        svg viewBox=(format!("0 0 {WIDTH} {HEIGHT}")) xmlns="http://www.w3.org/2000/svg" style=(SVG_CONTAINER_STYLE) {
            rect width=(WIDTH) height=(HEIGHT) style="fill: var(--background)" {}
            text x=(WIDTH / 2.0) y=(HEIGHT / 2.0) font-size="14" text-anchor="middle" style=(TEXT_STYLE) {
                (label) " - no data"
            }
        }
    }
}
