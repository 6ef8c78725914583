//! Browser bindings: Leaflet widget, mutation-observer feed and the exported
//! `mount` entry point.

mod leaflet;
mod logging;
mod observer;

use std::cell::RefCell;
use std::rc::Rc;

use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{CustomEvent, Element, Window};

use trainmap_shared::popup::escape_html;

use crate::config::TrainMapConfig;
use crate::feed::{detail_field, ChangeEvent};
use crate::readiness::{wait_until_ready, Readiness};
use crate::train_map::TrainMap;

pub use leaflet::{leaflet_available, LeafletWidget};
pub use observer::MutationFeed;

pub type LiveMap = TrainMap<MutationFeed, LeafletWidget>;

const UPDATE_TRAIN_EVENT: &str = "phx:update-train";
const REFRESH_TRAINS_EVENT: &str = "phx:refresh-all-trains";

type EventCallback = Closure<dyn FnMut(web_sys::Event)>;

fn read_config(host: &Element) -> TrainMapConfig {
    match host.get_attribute("data-config") {
        Some(json) => TrainMapConfig::from_json(&json).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Invalid data-config, using defaults");
            TrainMapConfig::default()
        }),
        None => TrainMapConfig::default(),
    }
}

fn show_failure(host: &Element, message: &str) {
    host.set_inner_html(&format!(
        r#"<div class="p-4 text-red-600">Error loading map: {}</div>"#,
        escape_html(message)
    ));
}

/// Payload carried in field `key` of a page event's `detail`.
fn page_event(event: &web_sys::Event, key: &str) -> Option<String> {
    let detail = event.dyn_ref::<CustomEvent>()?.detail();
    let json = js_sys::JSON::stringify(&detail).ok()?.as_string()?;
    match detail_field(&json, key) {
        Ok(payload) => Some(payload),
        Err(e) => {
            tracing::warn!(error = %e, "Dropping page event");
            None
        }
    }
}

fn listen(
    window: &Window,
    name: &'static str,
    map: &Rc<RefCell<LiveMap>>,
    to_event: fn(&web_sys::Event) -> Option<ChangeEvent>,
) -> Result<EventCallback, JsValue> {
    let weak = Rc::downgrade(map);
    let callback: EventCallback = Closure::new(move |event: web_sys::Event| {
        let Some(change) = to_event(&event) else {
            return;
        };
        let Some(map) = weak.upgrade() else {
            return;
        };
        let Ok(mut map) = map.try_borrow_mut() else {
            tracing::warn!(event = name, "Train map busy, dropping page event");
            return;
        };
        map.handle(change);
    });
    window.add_event_listener_with_callback(name, callback.as_ref().unchecked_ref())?;
    Ok(callback)
}

/// A mounted train map. Call `destroy` when the host element goes away.
#[wasm_bindgen]
pub struct MountedMap {
    map: Rc<RefCell<LiveMap>>,
    listeners: Vec<(&'static str, EventCallback)>,
}

#[wasm_bindgen]
impl MountedMap {
    /// Tear down the map: page listeners, readiness wait, observer, markers.
    pub fn destroy(&mut self) {
        if let Some(window) = web_sys::window() {
            for (name, callback) in self.listeners.drain(..) {
                let _ = window
                    .remove_event_listener_with_callback(name, callback.as_ref().unchecked_ref());
            }
        }
        self.map.borrow_mut().teardown();
    }

    /// Number of markers currently on the map.
    #[wasm_bindgen(js_name = markerCount)]
    pub fn marker_count(&self) -> usize {
        self.map.borrow().reconciler().map_or(0, |r| r.len())
    }
}

/// Attach a live train map to the element with id `element_id`.
#[wasm_bindgen]
pub fn mount(element_id: &str) -> Result<MountedMap, JsValue> {
    let window = web_sys::window().ok_or_else(|| JsValue::from_str("no window"))?;
    let document = window
        .document()
        .ok_or_else(|| JsValue::from_str("no document"))?;
    let host = document
        .get_element_by_id(element_id)
        .ok_or_else(|| JsValue::from_str(&format!("element #{element_id} not found")))?;

    let config = read_config(&host);
    logging::init(&config.log_level);
    tracing::info!(element_id, "Mounting train map");

    let container = document.get_element_by_id(&config.trains_container_id);
    let prefix = config.element_id_prefix.clone();
    let map = Rc::new_cyclic(|weak| {
        RefCell::new(TrainMap::new(
            MutationFeed::new(container, weak.clone(), prefix),
            config,
        ))
    });

    let (cancel, interval) = {
        let m = map.borrow();
        (m.cancel_token(), m.config().ready_poll_interval())
    };
    let pending = Rc::clone(&map);
    wasm_bindgen_futures::spawn_local(async move {
        let readiness = wait_until_ready(leaflet_available, interval, &cancel, |d| {
            gloo_timers::future::TimeoutFuture::new(d.as_millis() as u32)
        })
        .await;
        if readiness == Readiness::Cancelled {
            return;
        }
        let mut map = pending.borrow_mut();
        if let Err(e) = map.attach(|cfg| LeafletWidget::create(&host, cfg)) {
            show_failure(&host, &e.to_string());
        }
    });

    let listeners = vec![
        (
            UPDATE_TRAIN_EVENT,
            listen(&window, UPDATE_TRAIN_EVENT, &map, |e| {
                page_event(e, "train").map(|payload| ChangeEvent::Updated { payload })
            })?,
        ),
        (
            REFRESH_TRAINS_EVENT,
            listen(&window, REFRESH_TRAINS_EVENT, &map, |e| {
                page_event(e, "trains").map(|payload| ChangeEvent::Refresh { payload })
            })?,
        ),
    ];

    Ok(MountedMap { map, listeners })
}
