//! Translation of a meter snapshot into Prometheus exposition format.

use std::io::Write;

use crate::record::TelemetryRecord;
use crate::store::SharedStore;

/// Static definition of one exported series: name, help text, label set
/// and where its labels and value come from in a record.
pub struct Descriptor {
    /// The full Prometheus metric name.
    pub name: String,
    /// Help text for the `# HELP` comment.
    pub help: &'static str,
    /// Label names, in emission order.
    pub label_names: &'static [&'static str],
    label_values: fn(&TelemetryRecord) -> Vec<String>,
    value: fn(&TelemetryRecord) -> f64,
}

const SERIAL_ONLY: &[&str] = &["meter_serial_number"];
const INFO_LABELS: &[&str] = &[
    "meter_serial_number",
    "active_register_tier_delivered",
    "current_tarif",
    "mot_d_etat",
];

fn serial_label(record: &TelemetryRecord) -> Vec<String> {
    vec![record.meter_serial_number.clone()]
}

fn info_labels(record: &TelemetryRecord) -> Vec<String> {
    vec![
        record.meter_serial_number.clone(),
        record.active_register_tier_delivered.clone(),
        record.current_tarif.clone(),
        record.mot_d_etat.clone(),
    ]
}

// Presence value for the info-pattern series: 1 once a reading has
// identified the meter, 0 on the initial empty record.
fn presence(record: &TelemetryRecord) -> f64 {
    if record.meter_serial_number.is_empty() {
        0.0
    } else {
        1.0
    }
}

/// Renders meter snapshots as a fixed set of Prometheus gauge series.
///
/// The descriptor table is built once at construction and never changes;
/// every render emits exactly one sample per descriptor, all taken from a
/// single store snapshot so the nine series are mutually consistent.
pub struct MetricCollector {
    store: SharedStore,
    descriptors: Vec<Descriptor>,
}

impl MetricCollector {
    /// Create a collector reading from `store`, with metric names
    /// prefixed by `prefix`.
    pub fn new(store: SharedStore, prefix: &str) -> Self {
        let name = |suffix: &str| {
            if prefix.is_empty() {
                suffix.to_string()
            } else {
                format!("{}_{}", prefix, suffix)
            }
        };

        let descriptors = vec![
            Descriptor {
                name: name("info"),
                help: "Lixee info.",
                label_names: INFO_LABELS,
                label_values: info_labels,
                value: presence,
            },
            Descriptor {
                name: name("apparent_power"),
                help: "Apparent power (W)",
                label_names: SERIAL_ONLY,
                label_values: serial_label,
                value: |r| r.apparent_power as f64,
            },
            Descriptor {
                name: name("available_power"),
                help: "Available power (W)",
                label_names: SERIAL_ONLY,
                label_values: serial_label,
                value: |r| r.available_power as f64,
            },
            Descriptor {
                name: name("current_summ_delivered"),
                help: "Current sum delivered (kWh)",
                label_names: SERIAL_ONLY,
                label_values: serial_label,
                value: |r| r.current_summ_delivered as f64,
            },
            Descriptor {
                name: name("link_quality"),
                help: "Link quality",
                label_names: SERIAL_ONLY,
                label_values: serial_label,
                value: |r| r.linkquality as f64,
            },
            Descriptor {
                name: name("meter_serial_number"),
                help: "Meter serial number",
                label_names: SERIAL_ONLY,
                label_values: serial_label,
                value: presence,
            },
            Descriptor {
                name: name("rms_current"),
                help: "RMS current (A)",
                label_names: SERIAL_ONLY,
                label_values: serial_label,
                value: |r| r.rms_current as f64,
            },
            Descriptor {
                name: name("rms_current_max"),
                help: "Max RMS current (A)",
                label_names: SERIAL_ONLY,
                label_values: serial_label,
                value: |r| r.rms_current_max as f64,
            },
            Descriptor {
                name: name("warn_dps"),
                help: "Warning DPS status",
                label_names: SERIAL_ONLY,
                label_values: serial_label,
                value: |r| r.warn_dps as f64,
            },
        ];

        Self { store, descriptors }
    }

    /// The static descriptor table, independent of any stored state.
    pub fn descriptors(&self) -> &[Descriptor] {
        &self.descriptors
    }

    /// Render all series in Prometheus exposition format.
    ///
    /// Takes exactly one snapshot; formatting happens outside the store's
    /// critical section.
    pub fn render(&self) -> String {
        let record = self.store.snapshot();
        let mut output = Vec::with_capacity(self.descriptors.len() * 100);

        for descriptor in &self.descriptors {
            writeln!(output, "# HELP {} {}", descriptor.name, descriptor.help).ok();
            writeln!(output, "# TYPE {} gauge", descriptor.name).ok();

            let values = (descriptor.label_values)(&record);
            let labels: Vec<(&str, String)> = descriptor
                .label_names
                .iter()
                .copied()
                .zip(values)
                .collect();

            writeln!(
                output,
                "{}{} {}",
                descriptor.name,
                format_labels(&labels),
                format_value((descriptor.value)(&record))
            )
            .ok();
        }

        String::from_utf8(output).unwrap_or_default()
    }
}

/// Escape special characters in label values.
fn escape_label_value(value: &str) -> String {
    let mut result = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => result.push_str("\\\\"),
            '"' => result.push_str("\\\""),
            '\n' => result.push_str("\\n"),
            _ => result.push(c),
        }
    }
    result
}

/// Format a floating point value for Prometheus.
fn format_value(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value.is_infinite() {
        if value.is_sign_positive() {
            "+Inf".to_string()
        } else {
            "-Inf".to_string()
        }
    } else if value.fract() == 0.0 {
        format!("{:.0}", value)
    } else {
        format!("{}", value)
    }
}

/// Format labels for Prometheus exposition format.
fn format_labels(labels: &[(&str, String)]) -> String {
    if labels.is_empty() {
        return String::new();
    }

    let parts: Vec<String> = labels
        .iter()
        .map(|(k, v)| format!("{}=\"{}\"", k, escape_label_value(v)))
        .collect();

    format!("{{{}}}", parts.join(","))
}
