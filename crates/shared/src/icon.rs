use crate::classify::TrainCategory;

/// Marker diameter in pixels; the anchor sits at the center.
pub const ICON_SIZE_PX: u32 = 12;

/// Normalize a heading into [0, 360).
pub fn normalize_bearing(bearing: f64) -> f64 {
    bearing.rem_euclid(360.0)
}

/// Build the marker icon markup: a colored dot, plus a heading arrow when a bearing is known.
pub fn icon_html(category: TrainCategory, bearing: Option<f64>) -> String {
    let color = category.color();
    let mut html = String::with_capacity(512);
    html.push_str(&format!(
        r#"<div style="background-color: {color}; width: {ICON_SIZE_PX}px; height: {ICON_SIZE_PX}px; border-radius: 50%; border: 2px solid white; box-shadow: 0 0 4px rgba(0,0,0,0.3); position: relative;">"#
    ));
    if let Some(b) = bearing.filter(|b| b.is_finite()) {
        let deg = normalize_bearing(b);
        html.push_str(&format!(
            r#"<div style="position: absolute; top: -6px; left: 50%; transform: translateX(-50%) rotate({deg}deg); width: 0; height: 0; border-left: 3px solid transparent; border-right: 3px solid transparent; border-bottom: 6px solid {color};"></div>"#
        ));
    }
    html.push_str("</div>");
    html
}
