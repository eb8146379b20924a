//! Prometheus text exposition format.
//!
//! Renders a gauge snapshot into the text format scraped by a Prometheus
//! server or compatible agent.

use crate::registry::GaugeSnapshot;

pub const METRIC_NAME: &str = "circleci_custom_workflow_insight_success_rate";
pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Render the success-rate gauge with one `name` label per workflow.
///
/// The HELP and TYPE lines are always present, so an empty snapshot still
/// declares the metric family.
pub fn render_prometheus(snapshot: &GaugeSnapshot) -> String {
    let mut out = String::new();

    out.push_str(&format!("# HELP {METRIC_NAME} success rate of workflow\n"));
    out.push_str(&format!("# TYPE {METRIC_NAME} gauge\n"));
    for (name, value) in snapshot.iter() {
        out.push_str(&format!(
            "{METRIC_NAME}{{name=\"{}\"}} {}\n",
            escape_label(name),
            format_value(value)
        ));
    }

    out
}

fn escape_label(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            c => escaped.push(c),
        }
    }
    escaped
}

fn format_value(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value.is_infinite() {
        let inf = if value > 0.0 { "+Inf" } else { "-Inf" };
        inf.to_string()
    } else {
        value.to_string()
    }
}
