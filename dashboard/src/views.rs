pub mod silo_detail;

use std::sync::Arc;

use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use maud::{DOCTYPE, Markup, html};
use serde::Deserialize;

use crate::state::AppState;
use crate::styles::{self, Global, SiloList};

#[derive(Deserialize, Default)]
pub struct DaysQuery {
    pub days: Option<f64>,
    pub end: Option<String>,
}

pub fn page_shell(title: &str, content: Markup) -> Markup {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="utf-8";
                meta name="viewport" content="width=device-width, initial-scale=1";
                title { (title) }
                link rel="stylesheet" href="/styles.css";
                script src="https://unpkg.com/htmx.org@2.0.4" {}
            }
            body {
                h1 { a href="/" { "> silos" } }
                (content)
            }
        }
    }
}

pub async fn index(State(state): State<Arc<AppState>>) -> Markup {
    let silos: Vec<(u32, usize)> = {
        let readings = state.readings.read().unwrap();
        readings
            .entity_ids()
            .into_iter()
            .map(|id| (id, readings.reading_count(id)))
            .collect()
    };

    let content = html! {
        @if silos.is_empty() {
            p.(Global::META) { "No readings received yet." }
        } @else {
            div.(SiloList::SILO_GRID) {
                @for (id, count) in &silos {
                    a.(SiloList::SILO_CARD) href=(format!("/silo/{id}")) {
                        div { "silo " (id) }
                        div.(Global::META) { (count) " readings" }
                    }
                }
            }
        }
    };
    page_shell("Silos | Dashboard", content)
}

pub async fn styles() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/css")], styles::ALL.as_str())
}
