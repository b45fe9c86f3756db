/// Small workspace widgets shared by the page and the report cards

use yew::prelude::*;
use crate::request_context::{Breadcrumb, QueryPair};
use crate::workspace::{StatusKind, StatusLine};

#[derive(Properties, PartialEq)]
pub struct StatusBarProps {
    pub status: StatusLine,
}

#[function_component(StatusBar)]
pub fn status_bar(props: &StatusBarProps) -> Html {
    if props.status.message.is_empty() {
        return html! {};
    }

    let class = match props.status.kind {
        StatusKind::Info => "workspace-status",
        StatusKind::Error => "workspace-status workspace-status-error",
    };

    html! {
        <p class={class} role="status">{&props.status.message}</p>
    }
}

#[derive(Properties, PartialEq)]
pub struct BreadcrumbTrailProps {
    pub crumbs: Vec<Breadcrumb>,
    #[prop_or(false)]
    pub disabled: bool,
    /// Emits the endpoint URL of the clicked segment.
    pub on_select: Callback<String>,
}

#[function_component(BreadcrumbTrail)]
pub fn breadcrumb_trail(props: &BreadcrumbTrailProps) -> Html {
    if props.crumbs.is_empty() {
        return html! {
            <nav class="card-path">
                <span class="card-path-segment">{"media-company"}</span>
            </nav>
        };
    }

    html! {
        <nav class="card-path">
            {for props.crumbs.iter().enumerate().map(|(index, crumb)| {
                let separator = if index > 0 {
                    html! { <span class="card-path-separator">{"/"}</span> }
                } else {
                    html! {}
                };

                let segment = match (&crumb.endpoint_url, crumb.terminal || props.disabled) {
                    (Some(endpoint_url), false) => {
                        let endpoint_url = endpoint_url.clone();
                        let onclick = props.on_select.reform(move |e: MouseEvent| {
                            e.prevent_default();
                            endpoint_url.clone()
                        });
                        html! {
                            <a href="#" class="card-path-link" title={crumb.label.clone()} {onclick}>
                                {&crumb.label}
                            </a>
                        }
                    }
                    _ => html! {
                        <span class="card-path-segment card-path-terminal">{&crumb.label}</span>
                    },
                };

                html! {
                    <>
                        {separator}
                        {segment}
                    </>
                }
            })}
        </nav>
    }
}

#[derive(Properties, PartialEq)]
pub struct QueryChipsProps {
    pub pairs: Vec<QueryPair>,
}

#[function_component(QueryChips)]
pub fn query_chips(props: &QueryChipsProps) -> Html {
    html! {
        <div class="card-query-chips">
            if props.pairs.is_empty() {
                <span class="chip chip-muted">{"no-query"}</span>
            } else {
                {for props.pairs.iter().map(|pair| {
                    let text = if pair.has_value {
                        format!("{}={}", pair.key, pair.value)
                    } else {
                        pair.key.clone()
                    };
                    html! { <span class="chip" title={text.clone()}>{text}</span> }
                })}
            }
        </div>
    }
}

#[derive(Properties, PartialEq)]
pub struct ColumnChipsProps {
    pub columns: Vec<String>,
}

#[function_component(ColumnChips)]
pub fn column_chips(props: &ColumnChipsProps) -> Html {
    if props.columns.is_empty() {
        return html! {};
    }

    html! {
        <div class="card-column-chips">
            {for props.columns.iter().map(|column| html! {
                <span class="chip chip-column">{column}</span>
            })}
        </div>
    }
}
