use std::cell::RefCell;
use std::rc::Weak;

use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{Element, MutationObserver, MutationObserverInit, MutationRecord, NodeList};

use super::LiveMap;
use crate::feed::{parse_element_id, ChangeEvent, ChangeSource};

const TRAIN_ATTRIBUTE: &str = "data-train";

type MutationCallback = Closure<dyn FnMut(js_sys::Array, MutationObserver)>;

/// [`ChangeSource`] that watches the trains container with a `MutationObserver`.
pub struct MutationFeed {
    container: Option<Element>,
    observer: Option<MutationObserver>,
    _callback: Option<MutationCallback>,
}

impl MutationFeed {
    /// Events are forwarded to `map`; the feed holds only a weak reference so
    /// the map owns its source and not the other way round.
    pub fn new(container: Option<Element>, map: Weak<RefCell<LiveMap>>, id_prefix: String) -> Self {
        if container.is_none() {
            tracing::warn!("Trains container not found");
        }
        let callback: MutationCallback = Closure::new(move |records: js_sys::Array, _: MutationObserver| {
            let events = events_from_records(&records, &id_prefix);
            if events.is_empty() {
                return;
            }
            let Some(map) = map.upgrade() else {
                return;
            };
            let Ok(mut map) = map.try_borrow_mut() else {
                tracing::warn!("Train map busy, dropping mutation batch");
                return;
            };
            let count = events.len();
            for event in events {
                map.handle(event);
            }
            tracing::debug!(events = count, "Stream updated, markers updated");
        });

        let observer = match MutationObserver::new(callback.as_ref().unchecked_ref()) {
            Ok(observer) => Some(observer),
            Err(e) => {
                tracing::error!(error = ?e, "Could not create mutation observer");
                None
            }
        };

        Self {
            container,
            observer,
            _callback: Some(callback),
        }
    }
}

fn elements(list: &NodeList) -> impl Iterator<Item = Element> + '_ {
    (0..list.length())
        .filter_map(move |i| list.item(i))
        .filter_map(|node| node.dyn_into::<Element>().ok())
}

fn events_from_records(records: &js_sys::Array, id_prefix: &str) -> Vec<ChangeEvent> {
    let mut events = Vec::new();
    for record in records.iter() {
        let record: MutationRecord = record.unchecked_into();
        match record.type_().as_str() {
            "childList" => {
                let added = record.added_nodes();
                for el in elements(&added) {
                    if let Some(payload) = el.get_attribute(TRAIN_ATTRIBUTE) {
                        events.push(ChangeEvent::Added { payload });
                    }
                }
                let removed = record.removed_nodes();
                for el in elements(&removed) {
                    let element_id = el.id();
                    if element_id.is_empty() {
                        continue;
                    }
                    match parse_element_id(&element_id, id_prefix) {
                        Ok(id) => events.push(ChangeEvent::Removed { id }),
                        Err(e) => tracing::debug!(error = %e, "Ignoring removed node"),
                    }
                }
            }
            "attributes" if record.attribute_name().as_deref() == Some(TRAIN_ATTRIBUTE) => {
                let payload = record
                    .target()
                    .and_then(|node| node.dyn_into::<Element>().ok())
                    .and_then(|el| el.get_attribute(TRAIN_ATTRIBUTE));
                if let Some(payload) = payload {
                    events.push(ChangeEvent::Updated { payload });
                }
            }
            _ => {}
        }
    }
    events
}

impl ChangeSource for MutationFeed {
    fn list_current_entities(&self) -> Vec<String> {
        let Some(container) = &self.container else {
            return Vec::new();
        };
        match container.query_selector_all("[data-train]") {
            Ok(list) => elements(&list)
                .filter_map(|el| el.get_attribute(TRAIN_ATTRIBUTE))
                .collect(),
            Err(e) => {
                tracing::warn!(error = ?e, "Could not list train elements");
                Vec::new()
            }
        }
    }

    fn subscribe(&mut self) {
        let (Some(container), Some(observer)) = (&self.container, &self.observer) else {
            return;
        };
        let init = MutationObserverInit::new();
        init.set_child_list(true);
        init.set_subtree(true);
        init.set_attributes(true);
        init.set_attribute_filter(&js_sys::Array::of1(&JsValue::from_str(TRAIN_ATTRIBUTE)));
        if let Err(e) = observer.observe_with_options(container, &init) {
            tracing::error!(error = ?e, "Could not observe trains container");
        }
    }

    fn unsubscribe(&mut self) {
        if let Some(observer) = &self.observer {
            observer.disconnect();
        }
    }
}
