use crate::models::TrainSnapshot;

/// Human-readable delay: "On time", "+2min" (late) or "-2min" (early).
///
/// Minutes are floored, so 65 seconds early reads as "-2min".
pub fn format_delay(delay_seconds: Option<i64>) -> String {
    match delay_seconds {
        None | Some(0) => "On time".to_string(),
        Some(s) if s > 0 => format!("+{}min", s.div_euclid(60)),
        Some(s) => format!("{}min", s.div_euclid(60)),
    }
}

/// Escape text for interpolation into popup markup.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Build the popup HTML fragment for a train.
pub fn popup_content(train: &TrainSnapshot) -> String {
    let mut html = String::with_capacity(512);
    html.push_str(r#"<div class="train-popup">"#);
    html.push_str(&format!(
        r#"<h3 style="margin: 0 0 8px 0; font-weight: bold;">{}</h3>"#,
        escape_html(&train.train_number)
    ));
    html.push_str(r#"<div style="font-size: 12px; line-height: 1.4;">"#);
    html.push_str(&format!(
        "<div><strong>Operator:</strong> {}</div>",
        escape_html(train.operator.as_deref().unwrap_or("Unknown"))
    ));
    if let Some(route) = train.route_short_name.as_deref().filter(|r| !r.is_empty()) {
        html.push_str(&format!(
            "<div><strong>Route:</strong> {}</div>",
            escape_html(route)
        ));
    }
    // Stationary trains report 0; the line is hidden rather than showing "0 km/h".
    if let Some(speed) = train.speed_kmh.filter(|s| *s > 0.0) {
        html.push_str(&format!(
            "<div><strong>Speed:</strong> {} km/h</div>",
            speed.round()
        ));
    }
    html.push_str(&format!(
        "<div><strong>Status:</strong> {}</div>",
        format_delay(train.delay_seconds)
    ));
    html.push_str("</div></div>");
    html
}
