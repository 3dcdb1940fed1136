use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use crate::core::error::{Error, ErrorKind, Result};

/// Format of `default_time_string`, e.g. `08/18/2023 12:50:00 PM`.
pub const DATE_FORMAT: &str = "%m/%d/%Y %I:%M:%S %p";

/// Column order of the `;`-separated source rows and of the canonical payload.
pub const FIELD_NAMES: [&str; 24] = [
    "default_time_string",
    "traffic_control_device",
    "weather_condition",
    "lighting_condition",
    "first_crash_type",
    "trafficway_type",
    "alignment",
    "roadway_surface_cond",
    "road_defect",
    "crash_type",
    "intersection_related_i",
    "damage",
    "prim_contributory_cause",
    "num_units",
    "most_severe_injury",
    "injuries_total",
    "injuries_fatal",
    "injuries_incapacitating",
    "injuries_non_incapacitating",
    "injuries_reported_not_evident",
    "injuries_no_indication",
    "crash_hour",
    "crash_day_of_week",
    "crash_month",
];

const MULTI_SEPARATOR: char = ',';

/// Typed view of one record field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    List(Vec<String>),
    Integer(i64),
    Number(f64),
}

impl FieldValue {
    /// Keys this value contributes to an inverted index. Scalars yield at most
    /// one key, lists one per non-empty element.
    pub fn index_keys(&self) -> Vec<String> {
        match self {
            FieldValue::Text(text) => {
                let text = text.trim();
                if text.is_empty() {
                    Vec::new()
                } else {
                    vec![text.to_string()]
                }
            }
            FieldValue::List(items) => items
                .iter()
                .map(|item| item.trim())
                .filter(|item| !item.is_empty())
                .map(str::to_string)
                .collect(),
            FieldValue::Integer(value) => vec![value.to_string()],
            FieldValue::Number(value) => vec![format_number(*value)],
        }
    }
}

/// Canonical decimal rendering of a fractional count: shortest form that
/// round-trips, no trailing `.0`, so `1.0` and `1` share a key.
pub fn format_number(value: f64) -> String {
    if value == 0.0 {
        // folds -0.0 into 0
        return "0".to_string();
    }
    format!("{}", value)
}

/// Normalizes a user-supplied numeric key to the form `format_number` produces.
/// Text that does not parse as a finite number is returned trimmed.
pub fn normalize_number_key(raw: &str) -> String {
    let raw = raw.trim();
    match raw.parse::<f64>() {
        Ok(value) if value.is_finite() => format_number(value),
        _ => raw.to_string(),
    }
}

/// Splits a raw multi-valued cell: on `,` when present, otherwise on `/`.
/// Elements are trimmed and empty ones dropped.
pub fn split_multi(raw: &str) -> Vec<String> {
    let separator = if raw.contains(',') { ',' } else { '/' };
    raw.split(separator)
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

/// One traffic accident.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
    pub default_time_string: String,
    pub traffic_control_device: String,
    pub weather_condition: String,
    pub lighting_condition: Vec<String>,
    pub first_crash_type: String,
    pub trafficway_type: String,
    pub alignment: String,
    pub roadway_surface_cond: String,
    pub road_defect: String,
    pub crash_type: Vec<String>,
    pub intersection_related_i: String,
    pub damage: String,
    pub prim_contributory_cause: String,
    pub num_units: i64,
    pub most_severe_injury: Vec<String>,
    pub injuries_total: f64,
    pub injuries_fatal: f64,
    pub injuries_incapacitating: f64,
    pub injuries_non_incapacitating: f64,
    pub injuries_reported_not_evident: f64,
    pub injuries_no_indication: f64,
    pub crash_hour: i64,
    pub crash_day_of_week: i64,
    pub crash_month: i64,
}

impl Record {
    /// Looks a field up by its column name.
    pub fn field(&self, name: &str) -> Option<FieldValue> {
        let text = |s: &String| FieldValue::Text(s.clone());
        let list = |l: &Vec<String>| FieldValue::List(l.clone());

        let value = match name {
            "default_time_string" => text(&self.default_time_string),
            "traffic_control_device" => text(&self.traffic_control_device),
            "weather_condition" => text(&self.weather_condition),
            "lighting_condition" => list(&self.lighting_condition),
            "first_crash_type" => text(&self.first_crash_type),
            "trafficway_type" => text(&self.trafficway_type),
            "alignment" => text(&self.alignment),
            "roadway_surface_cond" => text(&self.roadway_surface_cond),
            "road_defect" => text(&self.road_defect),
            "crash_type" => list(&self.crash_type),
            "intersection_related_i" => text(&self.intersection_related_i),
            "damage" => text(&self.damage),
            "prim_contributory_cause" => text(&self.prim_contributory_cause),
            "num_units" => FieldValue::Integer(self.num_units),
            "most_severe_injury" => list(&self.most_severe_injury),
            "injuries_total" => FieldValue::Number(self.injuries_total),
            "injuries_fatal" => FieldValue::Number(self.injuries_fatal),
            "injuries_incapacitating" => FieldValue::Number(self.injuries_incapacitating),
            "injuries_non_incapacitating" => FieldValue::Number(self.injuries_non_incapacitating),
            "injuries_reported_not_evident" => FieldValue::Number(self.injuries_reported_not_evident),
            "injuries_no_indication" => FieldValue::Number(self.injuries_no_indication),
            "crash_hour" => FieldValue::Integer(self.crash_hour),
            "crash_day_of_week" => FieldValue::Integer(self.crash_day_of_week),
            "crash_month" => FieldValue::Integer(self.crash_month),
            _ => return None,
        };
        Some(value)
    }

    /// All fields in column order.
    pub fn fields(&self) -> Vec<(&'static str, FieldValue)> {
        FIELD_NAMES
            .iter()
            .filter_map(|name| self.field(name).map(|value| (*name, value)))
            .collect()
    }

    pub fn crash_date(&self) -> Option<NaiveDateTime> {
        NaiveDateTime::parse_from_str(&self.default_time_string, DATE_FORMAT).ok()
    }

    /// Checks the model invariants. Nothing is written for a record that fails.
    pub fn validate(&self) -> Result<()> {
        if !self.default_time_string.is_empty() && self.crash_date().is_none() {
            return Err(Error::invariant(format!(
                "default_time_string {:?} does not match {}",
                self.default_time_string, DATE_FORMAT
            )));
        }

        for (name, value) in self.fields() {
            match value {
                FieldValue::List(items) => {
                    for item in &items {
                        if item.is_empty() || item.trim() != item {
                            return Err(Error::invariant(format!(
                                "{} has an empty or untrimmed element {:?}", name, item
                            )));
                        }
                        if item.contains(',') || item.contains('/') {
                            return Err(Error::invariant(format!(
                                "{} element {:?} contains a separator", name, item
                            )));
                        }
                    }
                }
                FieldValue::Integer(v) if v < 0 => {
                    return Err(Error::invariant(format!("{} is negative ({})", name, v)));
                }
                FieldValue::Number(v) if !v.is_finite() || v < 0.0 => {
                    return Err(Error::invariant(format!(
                        "{} must be finite and non-negative, got {}", name, v
                    )));
                }
                _ => {}
            }
        }

        Ok(())
    }

    /// Canonical payload bytes: JSON object in column order, multi-valued
    /// fields joined with `,`.
    pub fn to_payload(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(&RecordPayload::from(self))?)
    }

    pub fn from_payload(bytes: &[u8]) -> Result<Self> {
        let payload: RecordPayload = serde_json::from_slice(bytes)?;
        Ok(payload.into())
    }

    /// Parses one `;`-separated source row of 24 columns. Numeric cells that
    /// do not parse fall back to zero.
    pub fn from_csv_row(row: &str) -> Result<Self> {
        let parts: Vec<&str> = row.trim().split(';').map(str::trim).collect();
        if parts.len() != FIELD_NAMES.len() {
            return Err(Error::new(
                ErrorKind::Parse,
                format!("expected {} columns, got {}", FIELD_NAMES.len(), parts.len()),
            ));
        }

        let int = |cell: &str| cell.parse::<i64>().unwrap_or(0);
        let float = |cell: &str| cell.parse::<f64>().unwrap_or(0.0);

        Ok(Record {
            default_time_string: parts[0].to_string(),
            traffic_control_device: parts[1].to_string(),
            weather_condition: parts[2].to_string(),
            lighting_condition: split_multi(parts[3]),
            first_crash_type: parts[4].to_string(),
            trafficway_type: parts[5].to_string(),
            alignment: parts[6].to_string(),
            roadway_surface_cond: parts[7].to_string(),
            road_defect: parts[8].to_string(),
            crash_type: split_multi(parts[9]),
            intersection_related_i: parts[10].to_string(),
            damage: parts[11].to_string(),
            prim_contributory_cause: parts[12].to_string(),
            num_units: int(parts[13]),
            most_severe_injury: split_multi(parts[14]),
            injuries_total: float(parts[15]),
            injuries_fatal: float(parts[16]),
            injuries_incapacitating: float(parts[17]),
            injuries_non_incapacitating: float(parts[18]),
            injuries_reported_not_evident: float(parts[19]),
            injuries_no_indication: float(parts[20]),
            crash_hour: int(parts[21]),
            crash_day_of_week: int(parts[22]),
            crash_month: int(parts[23]),
        })
    }

    pub fn to_csv_row(&self) -> String {
        self.fields()
            .into_iter()
            .map(|(_, value)| match value {
                FieldValue::Text(text) => text,
                FieldValue::List(items) => join_multi(&items),
                FieldValue::Integer(v) => v.to_string(),
                FieldValue::Number(v) => format_number(v),
            })
            .collect::<Vec<_>>()
            .join(";")
    }
}

fn join_multi(items: &[String]) -> String {
    items.join(&MULTI_SEPARATOR.to_string())
}

/// On-disk shape of a record. Field order here fixes the serialization order.
#[derive(Serialize, Deserialize)]
struct RecordPayload {
    default_time_string: String,
    traffic_control_device: String,
    weather_condition: String,
    lighting_condition: String,
    first_crash_type: String,
    trafficway_type: String,
    alignment: String,
    roadway_surface_cond: String,
    road_defect: String,
    crash_type: String,
    intersection_related_i: String,
    damage: String,
    prim_contributory_cause: String,
    num_units: i64,
    most_severe_injury: String,
    injuries_total: f64,
    injuries_fatal: f64,
    injuries_incapacitating: f64,
    injuries_non_incapacitating: f64,
    injuries_reported_not_evident: f64,
    injuries_no_indication: f64,
    crash_hour: i64,
    crash_day_of_week: i64,
    crash_month: i64,
}

impl From<&Record> for RecordPayload {
    fn from(r: &Record) -> Self {
        RecordPayload {
            default_time_string: r.default_time_string.clone(),
            traffic_control_device: r.traffic_control_device.clone(),
            weather_condition: r.weather_condition.clone(),
            lighting_condition: join_multi(&r.lighting_condition),
            first_crash_type: r.first_crash_type.clone(),
            trafficway_type: r.trafficway_type.clone(),
            alignment: r.alignment.clone(),
            roadway_surface_cond: r.roadway_surface_cond.clone(),
            road_defect: r.road_defect.clone(),
            crash_type: join_multi(&r.crash_type),
            intersection_related_i: r.intersection_related_i.clone(),
            damage: r.damage.clone(),
            prim_contributory_cause: r.prim_contributory_cause.clone(),
            num_units: r.num_units,
            most_severe_injury: join_multi(&r.most_severe_injury),
            injuries_total: r.injuries_total,
            injuries_fatal: r.injuries_fatal,
            injuries_incapacitating: r.injuries_incapacitating,
            injuries_non_incapacitating: r.injuries_non_incapacitating,
            injuries_reported_not_evident: r.injuries_reported_not_evident,
            injuries_no_indication: r.injuries_no_indication,
            crash_hour: r.crash_hour,
            crash_day_of_week: r.crash_day_of_week,
            crash_month: r.crash_month,
        }
    }
}

impl From<RecordPayload> for Record {
    fn from(p: RecordPayload) -> Self {
        Record {
            default_time_string: p.default_time_string,
            traffic_control_device: p.traffic_control_device,
            weather_condition: p.weather_condition,
            lighting_condition: split_multi(&p.lighting_condition),
            first_crash_type: p.first_crash_type,
            trafficway_type: p.trafficway_type,
            alignment: p.alignment,
            roadway_surface_cond: p.roadway_surface_cond,
            road_defect: p.road_defect,
            crash_type: split_multi(&p.crash_type),
            intersection_related_i: p.intersection_related_i,
            damage: p.damage,
            prim_contributory_cause: p.prim_contributory_cause,
            num_units: p.num_units,
            most_severe_injury: split_multi(&p.most_severe_injury),
            injuries_total: p.injuries_total,
            injuries_fatal: p.injuries_fatal,
            injuries_incapacitating: p.injuries_incapacitating,
            injuries_non_incapacitating: p.injuries_non_incapacitating,
            injuries_reported_not_evident: p.injuries_reported_not_evident,
            injuries_no_indication: p.injuries_no_indication,
            crash_hour: p.crash_hour,
            crash_day_of_week: p.crash_day_of_week,
            crash_month: p.crash_month,
        }
    }
}
