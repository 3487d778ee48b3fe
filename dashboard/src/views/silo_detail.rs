use std::sync::Arc;

use axum::extract::{Path, Query, State};
use maud::{Markup, html};

use crate::charts::{
    EntityId, EntityReading, TimeBin, aggregate_into_bins, day_separator_positions, svg,
};
use crate::config::DAY_CHOICES;
use crate::dashboard_config::{ChartConfig, ChartType};
use crate::readings::RawReading;
use crate::routes::{bins_for_request, request_window};
use crate::state::AppState;
use crate::styles::{Charts as ChartClass, Global};

use super::{DaysQuery, page_shell};

fn days_label(days: u32) -> String {
    match days {
        1 => "24h".to_owned(),
        d => format!("{d}d"),
    }
}

pub async fn silo_detail(
    Path(id): Path<EntityId>,
    Query(query): Query<DaysQuery>,
    State(state): State<Arc<AppState>>,
) -> Markup {
    let stored = state.readings.read().unwrap().reading_count(id);

    let content = html! {
        h2 { "> silo " (id) }
        div.(Global::META) { (stored) " readings stored" }

        div #charts-container {
            (render_charts(id, &query, &state))
        }
    };
    page_shell(&format!("Silo {id} | Dashboard"), content)
}

pub async fn fragment_silo_charts(
    Path(id): Path<EntityId>,
    Query(query): Query<DaysQuery>,
    State(state): State<Arc<AppState>>,
) -> Markup {
    render_charts(id, &query, &state)
}

/// Fragment URL for `days`, pinned to the resolved end time when the page
/// was opened with one.
fn charts_url(id: EntityId, days: u32, pinned_end: Option<i64>) -> String {
    match pinned_end {
        Some(millis) => format!("/fragments/silo/{id}/charts?days={days}&end={millis}"),
        None => format!("/fragments/silo/{id}/charts?days={days}"),
    }
}

pub fn render_charts(id: EntityId, query: &DaysQuery, state: &AppState) -> Markup {
    let settings = state.settings.snapshot();
    let (days, bins) = bins_for_request(query.days, query.end.as_deref(), &settings);
    let separators = day_separator_positions(&bins, days);
    let (start, end) = request_window(&bins);
    let pinned_end = query.end.as_ref().map(|_| end.timestamp_millis());

    let chart_markup: Vec<Markup> = {
        let store = state.readings.read().unwrap();
        let readings = store.query_window(&[id], start, end);
        state
            .layout
            .charts
            .iter()
            .map(|chart_cfg| render_metric_chart(chart_cfg, &readings, &bins, &separators))
            .collect()
    };

    html! {
        (render_day_selector(id, days, pinned_end))

        // Refresh in place with the same range.
        div
            hx-get=(charts_url(id, days, pinned_end))
            hx-trigger="every 60s"
            hx-target="#charts-container"
            hx-swap="innerHTML"
        {}

        @if chart_markup.is_empty() {
            p.(Global::META) { "No charts configured." }
        }
        @for chart in &chart_markup {
            (chart)
        }
    }
}

fn render_day_selector(id: EntityId, active_days: u32, pinned_end: Option<i64>) -> Markup {
    html! {
        div.(ChartClass::DAY_SELECTOR) {
            @for &days in DAY_CHOICES {
                button
                    .(ChartClass::DAY_BTN)
                    .(if days == active_days { ChartClass::DAY_ACTIVE } else { "" })
                    hx-get=(charts_url(id, days, pinned_end))
                    hx-target="#charts-container"
                    hx-swap="innerHTML"
                {
                    (days_label(days))
                }
            }
        }
    }
}

fn render_metric_chart(
    chart_cfg: &ChartConfig,
    readings: &[&RawReading],
    bins: &[TimeBin],
    separators: &[usize],
) -> Markup {
    let points = aggregate_into_bins(
        readings,
        bins,
        |r| r.metric(&chart_cfg.metric),
        chart_cfg.aggregation,
    );
    let populated = points.iter().filter(|p| p.count > 0).count();
    let label = format!("{} ({})", chart_cfg.metric, chart_cfg.aggregation);

    let chart_html = match chart_cfg.chart_type {
        ChartType::Bar => svg::render_bar_chart(&points, separators, &label),
        ChartType::Line => svg::render_line_chart(&points, separators, &label),
    };

    html! {
        div.(ChartClass::CHART_CONTAINER) {
            div.(ChartClass::CHART_HEADER) {
                span { (chart_cfg.metric) " - " (chart_cfg.chart_type.display_name()) }
                span.(Global::META) { (populated) "/" (points.len()) " bins with data" }
            }
            (chart_html)
        }
    }
}
