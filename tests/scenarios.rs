mod common;

use std::collections::BTreeSet;
use crashlog::storage::frame::HEADER_SIZE;
use crashlog::{Config, IndexedAttribute, RecordId};
use common::{accident, flip_byte, open, read_byte};

const VALID_BYTE: u64 = 4;

#[test]
fn add_then_get_starts_at_zero() {
    let dir = tempfile::tempdir().unwrap();
    let mut manager = open(dir.path());

    let r1 = accident("REAR END / VEHICLE", "DAYLIGHT", "SEVERE");
    assert_eq!(manager.add(&r1).unwrap(), RecordId(0));
    assert_eq!(manager.get(RecordId(0)).unwrap(), Some(r1));
    assert_eq!(manager.lookup_by(IndexedAttribute::Text, "REAR END"), vec![RecordId(0)]);
    assert_eq!(manager.lookup_by(IndexedAttribute::Text, "VEHICLE"), vec![RecordId(0)]);
}

#[test]
fn shrinking_update_stays_in_place() {
    let dir = tempfile::tempdir().unwrap();
    let mut manager = open(dir.path());
    let r1 = accident("REAR END / VEHICLE", "DAYLIGHT", "SEVERE");
    manager.add(&r1).unwrap();
    let offset = manager.offset_of(RecordId(0));

    let mut shrunk = r1.clone();
    shrunk.damage = "NONE".to_string();
    assert!(manager.update(RecordId(0), &shrunk).unwrap());
    manager.close().unwrap();

    let mut manager = open(dir.path());
    assert_eq!(manager.offset_of(RecordId(0)), offset);
    let stored = manager.get(RecordId(0)).unwrap().unwrap();
    assert_eq!(stored.damage, "NONE");
    assert_eq!(stored, shrunk);
}

#[test]
fn growing_update_relocates_to_end_of_log() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::under_dir(dir.path());
    let mut manager = open(dir.path());
    let r1 = accident("REAR END / VEHICLE", "DAYLIGHT", "SEVERE");
    manager.add(&r1).unwrap();
    let original = manager.offset_of(RecordId(0)).unwrap();
    let end = manager.end_of_log();

    let mut grown = r1.clone();
    grown.prim_contributory_cause.push_str(&"X".repeat(500));
    assert!(manager.update(RecordId(0), &grown).unwrap());
    manager.close().unwrap();

    let mut manager = open(dir.path());
    assert_eq!(manager.offset_of(RecordId(0)), Some(end));
    assert_eq!(manager.get(RecordId(0)).unwrap(), Some(grown));
    assert_eq!(read_byte(&config.log_path, original + VALID_BYTE), 0);
}

#[test]
fn delete_cleans_inverted_postings() {
    let dir = tempfile::tempdir().unwrap();
    let mut manager = open(dir.path());
    manager.add(&accident("REAR END / VEHICLE", "DAYLIGHT", "SEVERE")).unwrap();
    let r2 = manager.add(&accident("ANGLE", "DARK", "$500 OR LESS")).unwrap();
    assert_eq!(r2, RecordId(1));

    assert_eq!(manager.lookup_by(IndexedAttribute::Lighting, "DARK"), vec![RecordId(1)]);
    assert!(manager.delete(RecordId(1)).unwrap());
    assert!(manager.lookup_by(IndexedAttribute::Lighting, "DARK").is_empty());
    assert_eq!(manager.get(RecordId(1)).unwrap(), None);
    assert!(
        !manager
            .inverted()
            .keys(IndexedAttribute::Lighting)
            .contains(&"DARK".to_string())
    );
}

#[test]
fn multi_valued_text_attribute_files_each_value() {
    let dir = tempfile::tempdir().unwrap();
    let mut manager = open(dir.path());
    manager.add(&accident("REAR END / VEHICLE", "DAYLIGHT", "SEVERE")).unwrap();
    manager.add(&accident("ANGLE", "DARK", "SEVERE")).unwrap();
    let r3 = manager.add(&accident("PEDESTRIAN, BICYCLE", "DUSK", "SEVERE")).unwrap();
    assert_eq!(r3, RecordId(2));

    let inverted = manager.inverted();
    for key in ["PEDESTRIAN", "BICYCLE"] {
        let postings = inverted.postings(IndexedAttribute::Text, key).unwrap();
        assert_eq!(postings.ids, vec![RecordId(2)]);
    }
    assert_eq!(
        manager.search_text_attribute(["PED"]).unwrap(),
        BTreeSet::from([RecordId(2)])
    );
}

#[test]
fn corrupt_record_is_hidden_and_purged_on_delete() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::under_dir(dir.path());
    let mut manager = open(dir.path());
    manager.add(&accident("REAR END / VEHICLE", "DAYLIGHT", "SEVERE")).unwrap();
    manager.add(&accident("ANGLE", "DARK", "SEVERE")).unwrap();
    manager.add(&accident("PEDESTRIAN, BICYCLE", "DUSK", "SEVERE")).unwrap();
    let offset = manager.offset_of(RecordId(2)).unwrap();
    manager.close().unwrap();

    flip_byte(&config.log_path, offset + HEADER_SIZE as u64 + 10, 0x01);

    let mut manager = open(dir.path());
    assert_eq!(manager.get(RecordId(2)).unwrap(), None);
    assert!(!manager.inverted().keys_referencing(RecordId(2)).is_empty());
    assert!(manager.delete(RecordId(2)).unwrap());
    assert!(manager.inverted().keys_referencing(RecordId(2)).is_empty());
    manager.close().unwrap();

    let mut manager = open(dir.path());
    assert!(manager.inverted().keys_referencing(RecordId(2)).is_empty());
    assert!(manager.lookup_by(IndexedAttribute::Lighting, "DUSK").is_empty());
    assert_eq!(manager.get(RecordId(2)).unwrap(), None);
    // neighbours are untouched
    assert!(manager.get(RecordId(1)).unwrap().is_some());
    assert_eq!(manager.lookup_by(IndexedAttribute::Lighting, "DARK"), vec![RecordId(1)]);
}
