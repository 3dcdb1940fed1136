#![allow(dead_code)]

use std::fs::OpenOptions;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use crashlog::core::record::split_multi;
use crashlog::{Config, Record, RecordManager};

pub fn open(dir: &Path) -> RecordManager {
    RecordManager::open(Config::under_dir(dir)).unwrap()
}

pub fn accident(crash_type: &str, lighting: &str, damage: &str) -> Record {
    Record {
        default_time_string: "07/29/2023 01:00:00 PM".to_string(),
        traffic_control_device: "TRAFFIC SIGNAL".to_string(),
        weather_condition: "CLEAR".to_string(),
        lighting_condition: split_multi(lighting),
        first_crash_type: "TURNING".to_string(),
        trafficway_type: "NOT DIVIDED".to_string(),
        alignment: "STRAIGHT AND LEVEL".to_string(),
        roadway_surface_cond: "DRY".to_string(),
        road_defect: "NO DEFECTS".to_string(),
        crash_type: split_multi(crash_type),
        intersection_related_i: "Y".to_string(),
        damage: damage.to_string(),
        prim_contributory_cause: "UNABLE TO DETERMINE".to_string(),
        num_units: 2,
        most_severe_injury: split_multi("NO INDICATION OF INJURY"),
        injuries_total: 1.0,
        injuries_no_indication: 3.0,
        crash_hour: 13,
        crash_day_of_week: 7,
        crash_month: 7,
        ..Record::default()
    }
}

pub fn read_byte(path: &Path, offset: u64) -> u8 {
    let mut file = OpenOptions::new().read(true).open(path).unwrap();
    file.seek(SeekFrom::Start(offset)).unwrap();
    let mut byte = [0u8; 1];
    file.read_exact(&mut byte).unwrap();
    byte[0]
}

/// XORs one byte of `path` in place.
pub fn flip_byte(path: &Path, offset: u64, mask: u8) {
    let byte = read_byte(path, offset);
    let mut file = OpenOptions::new().write(true).open(path).unwrap();
    file.seek(SeekFrom::Start(offset)).unwrap();
    file.write_all(&[byte ^ mask]).unwrap();
}

pub fn append_bytes(path: &Path, bytes: &[u8]) {
    let mut file = OpenOptions::new().append(true).open(path).unwrap();
    file.write_all(bytes).unwrap();
}
