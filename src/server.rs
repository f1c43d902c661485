//! HTTP request dispatcher.
//!
//! Read path: `GET /{device}/{kind}/{item}` returns the cached reading as
//! plain text, formatted per kind. Write path: `POST /{device}/swts/{item}`
//! with a body of exactly `true` or `false` drives the switch through the
//! device's exclusive exchange scope. Unknown keys and malformed bodies are
//! 400; exchange failures on the write path are 500. Internal error kinds
//! never reach clients.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use log::error;

use crate::cache::ItemValue;
use crate::gateway::Gateway;
use crate::registry::{ItemKey, ItemKind};
use crate::supervisor;

pub fn router(gateway: Arc<Gateway>) -> Router {
    Router::new()
        .route("/:device/:kind/:item", get(read_item).post(change_item))
        .with_state(gateway)
}

async fn read_item(
    State(gateway): State<Arc<Gateway>>,
    Path((device_id, kind, item_id)): Path<(String, String, String)>,
) -> (StatusCode, String) {
    let Some(kind) = ItemKind::from_path_segment(&kind) else {
        return bad_request();
    };
    let Some(device) = gateway.registry().device(&device_id) else {
        return bad_request();
    };
    let known = match kind {
        ItemKind::Analog => device.analog(&item_id).is_some(),
        ItemKind::Temperature => device.temperature(&item_id).is_some(),
        ItemKind::Switch => device.switch(&item_id).is_some(),
    };
    if !known {
        return bad_request();
    }
    let key = ItemKey::new(&device_id, kind, &item_id);
    let value = gateway.cache().get(&key);
    (StatusCode::OK, format_reading(kind, value))
}

async fn change_item(
    State(gateway): State<Arc<Gateway>>,
    Path((device_id, kind, item_id)): Path<(String, String, String)>,
    body: String,
) -> StatusCode {
    if ItemKind::from_path_segment(&kind) != Some(ItemKind::Switch) {
        return StatusCode::BAD_REQUEST;
    }
    let Some(device) = gateway.registry().device(&device_id) else {
        return StatusCode::BAD_REQUEST;
    };
    let Some(item) = device.switch(&item_id) else {
        return StatusCode::BAD_REQUEST;
    };
    let state = match body.as_str() {
        "true" => true,
        "false" => false,
        _ => return StatusCode::BAD_REQUEST,
    };
    let Some(link) = gateway.link(&device_id) else {
        return StatusCode::BAD_REQUEST;
    };
    match supervisor::set_switch(link, item, state).await {
        Ok(()) => StatusCode::OK,
        Err(err) => {
            error!("[{device_id}] set '{item_id}' failed: {err}");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// Format a cached reading the way the wire protocol expects: analogs with
/// two decimals, temperatures with one, switches as `true`/`false`. Items
/// never polled yet read as their zero value.
fn format_reading(kind: ItemKind, value: Option<ItemValue>) -> String {
    match kind {
        ItemKind::Analog => {
            let v = match value {
                Some(ItemValue::Analog(v)) => v,
                _ => 0.0,
            };
            format!("{v:.2}\n")
        }
        ItemKind::Temperature => {
            let v = match value {
                Some(ItemValue::Temperature(v)) => v,
                _ => 0.0,
            };
            format!("{v:.1}\n")
        }
        ItemKind::Switch => {
            let on = matches!(value, Some(ItemValue::Switch(true)));
            format!("{on}\n")
        }
    }
}

fn bad_request() -> (StatusCode, String) {
    (StatusCode::BAD_REQUEST, String::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_analog_with_two_decimals() {
        let body = format_reading(ItemKind::Analog, Some(ItemValue::Analog(4.98046875)));
        assert_eq!(body, "4.98\n");
        assert_eq!(format_reading(ItemKind::Analog, None), "0.00\n");
    }

    #[test]
    fn formats_temperature_with_one_decimal() {
        let body = format_reading(
            ItemKind::Temperature,
            Some(ItemValue::Temperature(25.0625)),
        );
        assert_eq!(body, "25.1\n");
        let body = format_reading(
            ItemKind::Temperature,
            Some(ItemValue::Temperature(-10.125)),
        );
        assert_eq!(body, "-10.1\n");
    }

    #[test]
    fn formats_switch_as_literal_text() {
        assert_eq!(
            format_reading(ItemKind::Switch, Some(ItemValue::Switch(true))),
            "true\n"
        );
        assert_eq!(format_reading(ItemKind::Switch, None), "false\n");
    }
}
