use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;

use trainmap_shared::icon::ICON_SIZE_PX;
use trainmap_shared::models::LatLon;

use crate::config::TrainMapConfig;
use crate::widget::{MapWidget, MarkerStyle, WidgetError};

// Thin shims over the Leaflet global `L`; all state stays on the Rust side.
#[wasm_bindgen(inline_js = r#"
export function leaflet_loaded() {
  return typeof L !== "undefined";
}
export function create_map(el, lat, lon, zoom, tileUrl, attribution) {
  const map = L.map(el).setView([lat, lon], zoom);
  L.tileLayer(tileUrl, { attribution }).addTo(map);
  setTimeout(() => map.invalidateSize(), 100);
  return map;
}
export function add_marker(map, lat, lon, iconHtml, size, popup) {
  const icon = L.divIcon({
    className: "train-marker",
    html: iconHtml,
    iconSize: [size, size],
    iconAnchor: [size / 2, size / 2],
  });
  const marker = L.marker([lat, lon], { icon }).addTo(map);
  marker.bindPopup(popup);
  return marker;
}
export function set_marker_position(marker, lat, lon) {
  marker.setLatLng([lat, lon]);
}
export function marker_lat(marker) {
  return marker.getLatLng().lat;
}
export function marker_lon(marker) {
  return marker.getLatLng().lng;
}
export function set_marker_popup(marker, html) {
  marker.setPopupContent(html);
}
export function remove_layer(map, layer) {
  map.removeLayer(layer);
}
"#)]
extern "C" {
    fn leaflet_loaded() -> bool;
    #[wasm_bindgen(catch)]
    fn create_map(
        el: &web_sys::Element,
        lat: f64,
        lon: f64,
        zoom: u8,
        tile_url: &str,
        attribution: &str,
    ) -> Result<JsValue, JsValue>;
    fn add_marker(map: &JsValue, lat: f64, lon: f64, icon_html: &str, size: u32, popup: &str)
        -> JsValue;
    fn set_marker_position(marker: &JsValue, lat: f64, lon: f64);
    fn marker_lat(marker: &JsValue) -> f64;
    fn marker_lon(marker: &JsValue) -> f64;
    fn set_marker_popup(marker: &JsValue, html: &str);
    fn remove_layer(map: &JsValue, layer: &JsValue);
}

const MAP_ELEMENT_ID: &str = "leaflet-map";

/// Whether the Leaflet script has finished loading.
pub fn leaflet_available() -> bool {
    leaflet_loaded()
}

fn js_error_message(err: &JsValue) -> String {
    if let Some(e) = err.dyn_ref::<js_sys::Error>() {
        return String::from(e.message());
    }
    err.as_string().unwrap_or_else(|| format!("{err:?}"))
}

/// [`MapWidget`] backed by a Leaflet map.
pub struct LeafletWidget {
    map: JsValue,
}

impl LeafletWidget {
    /// Replace the host element's content with a Leaflet map.
    pub fn create(host: &web_sys::Element, config: &TrainMapConfig) -> Result<Self, WidgetError> {
        let document = host
            .owner_document()
            .ok_or_else(|| WidgetError::Unavailable("host element has no document".to_string()))?;
        let container = document
            .create_element("div")
            .map_err(|e| WidgetError::Unavailable(js_error_message(&e)))?;
        container.set_id(MAP_ELEMENT_ID);
        container
            .set_attribute(
                "style",
                "width: 100%; height: 100%; position: absolute; top: 0; left: 0; z-index: 1;",
            )
            .map_err(|e| WidgetError::Unavailable(js_error_message(&e)))?;

        host.set_inner_html("");
        host.append_child(&container)
            .map_err(|e| WidgetError::Unavailable(js_error_message(&e)))?;

        let map = create_map(
            &container,
            config.center.lat,
            config.center.lon,
            config.zoom,
            &config.tile_url,
            &config.attribution,
        )
        .map_err(|e| WidgetError::Unavailable(js_error_message(&e)))?;

        tracing::info!("Map initialized");
        Ok(Self { map })
    }
}

impl MapWidget for LeafletWidget {
    type Handle = JsValue;

    fn create_marker(&mut self, position: LatLon, style: &MarkerStyle, popup: &str) -> JsValue {
        add_marker(
            &self.map,
            position.lat,
            position.lon,
            &style.icon_html(),
            ICON_SIZE_PX,
            popup,
        )
    }

    fn move_marker(&mut self, handle: &JsValue, position: LatLon) {
        set_marker_position(handle, position.lat, position.lon);
    }

    fn marker_position(&self, handle: &JsValue) -> LatLon {
        LatLon::new(marker_lat(handle), marker_lon(handle))
    }

    fn set_popup(&mut self, handle: &JsValue, content: &str) {
        set_marker_popup(handle, content);
    }

    fn remove_marker(&mut self, handle: JsValue) {
        remove_layer(&self.map, &handle);
    }
}
