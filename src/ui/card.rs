/// Report card: request header, sortable table and per-card actions

use yew::prelude::*;
use patternfly_yew::prelude::*;
use chrono::Local;
use wasm_bindgen::JsValue;
use web_sys::Element;
use crate::dates::last_modified_label;
use crate::request_context::{breadcrumbs, node_label, parse_request_context};
use crate::table::{DATE_COLUMN, TableGeometry, viewport_height};
use crate::ui::components::{BreadcrumbTrail, ColumnChips, QueryChips};
use crate::workspace::{CardPhase, CardState};

/// Short name of the viewer's zone such as `PST`, empty when unknown.
pub fn viewer_zone_label() -> String {
    let options = js_sys::Object::new();
    if js_sys::Reflect::set(&options, &JsValue::from_str("timeZoneName"), &JsValue::from_str("short")).is_err() {
        return String::new();
    }
    let locales = js_sys::Array::of1(&JsValue::from_str("en-US"));
    let format = js_sys::Intl::DateTimeFormat::new(&locales, &options);

    format
        .format_to_parts(&js_sys::Date::new_0())
        .iter()
        .find_map(|part| {
            let kind = js_sys::Reflect::get(&part, &JsValue::from_str("type")).ok()?.as_string()?;
            if kind != "timeZoneName" {
                return None;
            }
            js_sys::Reflect::get(&part, &JsValue::from_str("value")).ok()?.as_string()
        })
        .unwrap_or_default()
}

fn date_header_tooltip(zone_label: &str) -> String {
    let zone = if zone_label.is_empty() { "local time" } else { zone_label };
    format!("{} ({}, converted from PST)", DATE_COLUMN, zone)
}

/// Rendered heights of the table parts that exist.
fn measure_table(table: &Element) -> TableGeometry {
    let height = |selector: &str| {
        table
            .query_selector(selector)
            .ok()
            .flatten()
            .map(|element| element.get_bounding_client_rect().height())
            .filter(|height| *height > 0.0)
    };

    TableGeometry {
        header_height: height("thead"),
        row_height: height("tbody tr"),
        footer_height: height("tfoot"),
    }
}

#[derive(Properties, PartialEq)]
pub struct ReportCardProps {
    pub card: CardState,
    pub row_cap: usize,
    pub zone_label: String,
    #[prop_or(false)]
    pub disabled: bool,
    pub on_rerun: Callback<String>,
    /// (card id, endpoint URL, source request URL)
    pub on_path_node: Callback<(String, String, String)>,
    pub on_download_csv: Callback<String>,
    pub on_close_table: Callback<String>,
    pub on_close_card: Callback<String>,
    /// (card id, column, shift held)
    pub on_header_click: Callback<(String, String, bool)>,
}

#[function_component(ReportCard)]
pub fn report_card(props: &ReportCardProps) -> Html {
    let card = &props.card;
    let table_ref = use_node_ref();
    let max_height = use_state(|| None::<u32>);

    // Cap the scroll area at the visible row limit once the table is laid out
    {
        let table_ref = table_ref.clone();
        let max_height = max_height.clone();
        let total_rows = card.rows.len();
        let row_cap = props.row_cap;
        use_effect_with((total_rows, card.layout.clone()), move |_| {
            if let Some(table) = table_ref.cast::<Element>() {
                max_height.set(Some(viewport_height(total_rows, measure_table(&table), row_cap)));
            }
            || ()
        });
    }

    let display_url = card.display_url().to_string();
    let context = parse_request_context(&display_url);
    let crumbs = breadcrumbs(&display_url, &card.endpoint_url);
    let card_id = card.card_id.clone();

    // Path link handler
    let on_path_select = {
        let on_path_node = props.on_path_node.clone();
        let card_id = card_id.clone();
        let request_url = card.request_url.clone();
        Callback::from(move |endpoint_url: String| {
            on_path_node.emit((card_id.clone(), endpoint_url, request_url.clone()));
        })
    };

    let on_rerun = {
        let card_id = card_id.clone();
        props.on_rerun.reform(move |e: MouseEvent| {
            e.prevent_default();
            card_id.clone()
        })
    };

    let on_close_card = {
        let card_id = card_id.clone();
        props.on_close_card.reform(move |_| card_id.clone())
    };

    let body = match (&card.phase, &card.layout) {
        (CardPhase::Populated, Some(layout)) => {
            let headers = layout.headers();
            let label = last_modified_label(card.last_modified.as_deref(), &Local, &props.zone_label);
            let style = (*max_height).map(|height| format!("max-height: {}px;", height));

            let on_download_csv = {
                let card_id = card_id.clone();
                props.on_download_csv.reform(move |_| card_id.clone())
            };
            let on_close_table = {
                let card_id = card_id.clone();
                props.on_close_table.reform(move |_| card_id.clone())
            };

            html! {
                <div class="card-table-wrap" {style}>
                    <table ref={table_ref} class="esm-table">
                        <thead>
                            <tr>
                                {for headers.iter().map(|header| {
                                    let onclick = {
                                        let card_id = card_id.clone();
                                        let column = header.clone();
                                        props.on_header_click.reform(move |e: MouseEvent| {
                                            (card_id.clone(), column.clone(), e.shift_key())
                                        })
                                    };
                                    let title = (header == DATE_COLUMN).then(|| date_header_tooltip(&props.zone_label));
                                    let indicator = card.sort_stack.indicator(header).unwrap_or_default();
                                    html! {
                                        <th class="sortable" {title} {onclick}>
                                            {header}
                                            <span class="sort-indicator">{indicator}</span>
                                        </th>
                                    }
                                })}
                            </tr>
                        </thead>
                        <tbody>
                            {for card.rows.iter().map(|row| html! {
                                <tr>
                                    {for layout.row_cells(row, &Local, &props.zone_label).into_iter().map(|cell| html! {
                                        <td>{cell}</td>
                                    })}
                                </tr>
                            })}
                        </tbody>
                        <tfoot>
                            <tr>
                                <td colspan={headers.len().to_string()}>
                                    <div class="card-table-footer">
                                        <span class="last-modified" title={label.source_tooltip}>
                                            {label.text}
                                        </span>
                                        <div class="card-table-actions">
                                            <Button
                                                onclick={on_download_csv}
                                                disabled={props.disabled}
                                                variant={ButtonVariant::Secondary}
                                            >
                                                {"CSV"}
                                            </Button>
                                            <Button
                                                onclick={on_close_table}
                                                variant={ButtonVariant::Plain}
                                            >
                                                {"Close table"}
                                            </Button>
                                        </div>
                                    </div>
                                </td>
                            </tr>
                        </tfoot>
                    </table>
                </div>
            }
        }
        (CardPhase::Loading, _) => html! {
            <div class="card-message">
                <Spinner />
                <p class="loading-text">{"Loading report..."}</p>
            </div>
        },
        (CardPhase::Error(message), _) => html! {
            <Alert r#type={AlertType::Danger} title={message.clone()} inline={true} />
        },
        (phase, _) => {
            let text = phase.message().map(|(text, _)| text).unwrap_or("No data");
            html! { <p class="card-message">{text}</p> }
        }
    };

    html! {
        <section class="report-card" data-card-id={card_id.clone()}>
            <header class="report-card-header">
                <div class="report-card-title">
                    <a
                        href="#"
                        class="card-node-link"
                        title={display_url.clone()}
                        onclick={on_rerun.clone()}
                    >
                        {node_label(&display_url)}
                    </a>
                    <p class="card-subtitle">{card.subtitle()}</p>
                </div>
                <div class="report-card-actions">
                    <Button
                        onclick={on_rerun}
                        disabled={props.disabled || card.running}
                        variant={ButtonVariant::Secondary}
                    >
                        {"Re-run"}
                    </Button>
                    <Button onclick={on_close_card} variant={ButtonVariant::Plain}>
                        {"✕"}
                    </Button>
                </div>
            </header>

            <BreadcrumbTrail crumbs={crumbs} disabled={props.disabled} on_select={on_path_select} />
            <QueryChips pairs={context.query_pairs} />
            <ColumnChips columns={card.columns.clone()} />

            {body}
        </section>
    }
}
