//! Property-based tests over the codec, the manager and the scanner.

use std::collections::{BTreeMap, BTreeSet};
use crashlog::core::record::format_number;
use crashlog::index::inverted::InvertedIndex;
use crashlog::search::aho_corasick::AhoCorasick;
use crashlog::search::scanner::MultiPatternScanner;
use crashlog::storage::frame::{self, FrameStatus, HEADER_SIZE};
use crashlog::{Config, IndexedAttribute, IndexedAttributes, Record, RecordId, RecordManager};
use proptest::prelude::*;

fn arb_value() -> impl Strategy<Value = String> {
    prop::sample::select(vec![
        "ANGLE",
        "REAR END",
        "TURNING",
        "HEAD ON",
        "PEDESTRIAN",
        "PEDALCYCLIST",
        "DARKNESS",
        "DAYLIGHT",
        "ÔNIBUS",
    ])
    .prop_map(str::to_string)
}

fn arb_multi() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec(arb_value(), 0..3)
}

fn arb_count() -> impl Strategy<Value = f64> {
    (0u32..40).prop_map(|n| n as f64 / 4.0)
}

fn arb_record() -> impl Strategy<Value = Record> {
    (
        prop_oneof![Just(String::new()), Just("07/29/2023 01:00:00 PM".to_string())],
        prop::collection::vec("[ -~]{0,12}", 10),
        (arb_multi(), arb_multi(), arb_multi()),
        prop::collection::vec(0i64..50, 4),
        prop::collection::vec(arb_count(), 6),
    )
        .prop_map(|(date, text, (lighting, crash_type, severity), ints, counts)| Record {
            default_time_string: date,
            traffic_control_device: text[0].clone(),
            weather_condition: text[1].clone(),
            lighting_condition: lighting,
            first_crash_type: text[2].clone(),
            trafficway_type: text[3].clone(),
            alignment: text[4].clone(),
            roadway_surface_cond: text[5].clone(),
            road_defect: text[6].clone(),
            crash_type,
            intersection_related_i: text[7].clone(),
            damage: text[8].clone(),
            prim_contributory_cause: text[9].clone(),
            num_units: ints[0],
            most_severe_injury: severity,
            injuries_total: counts[0],
            injuries_fatal: counts[1],
            injuries_incapacitating: counts[2],
            injuries_non_incapacitating: counts[3],
            injuries_reported_not_evident: counts[4],
            injuries_no_indication: counts[5],
            crash_hour: ints[1],
            crash_day_of_week: ints[2],
            crash_month: ints[3],
        })
}

#[derive(Debug, Clone)]
enum Op {
    Add(Record),
    Update(usize, Record),
    Delete(usize),
}

fn arb_ops() -> impl Strategy<Value = Vec<Op>> {
    let op = prop_oneof![
        3 => arb_record().prop_map(Op::Add),
        2 => (any::<usize>(), arb_record()).prop_map(|(i, r)| Op::Update(i, r)),
        1 => any::<usize>().prop_map(Op::Delete),
    ];
    prop::collection::vec(op, 1..16)
}

fn keys_of(record: &Record, attribute: IndexedAttribute) -> Vec<String> {
    match attribute {
        IndexedAttribute::Text => record.crash_type.clone(),
        IndexedAttribute::Count => vec![format_number(record.injuries_total)],
        IndexedAttribute::Lighting => record.lighting_condition.clone(),
        IndexedAttribute::Severity => record.most_severe_injury.clone(),
    }
}

/// `key -> ids` as the inverted index should hold it for `live` records.
fn expected_postings(
    live: &BTreeMap<RecordId, Option<Record>>,
    attribute: IndexedAttribute,
) -> BTreeMap<String, Vec<RecordId>> {
    let mut expected: BTreeMap<String, BTreeSet<RecordId>> = BTreeMap::new();
    for (id, record) in live {
        if let Some(record) = record {
            for key in keys_of(record, attribute) {
                expected.entry(key).or_default().insert(*id);
            }
        }
    }
    expected
        .into_iter()
        .map(|(key, ids)| (key, ids.into_iter().collect()))
        .collect()
}

fn naive_matches(text: &str, patterns: &[String]) -> BTreeSet<(usize, String)> {
    let chars: Vec<char> = text.chars().collect();
    let mut found = BTreeSet::new();
    for pattern in patterns {
        let needle: Vec<char> = pattern.chars().collect();
        if needle.is_empty() || needle.len() > chars.len() {
            continue;
        }
        for start in 0..=chars.len() - needle.len() {
            if chars[start..start + needle.len()] == needle[..] {
                found.insert((start + needle.len() - 1, pattern.clone()));
            }
        }
    }
    found
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 48,
        failure_persistence: None,
        .. ProptestConfig::default()
    })]

    #[test]
    fn encode_then_decode_returns_the_record(id in any::<u32>(), record in arb_record()) {
        let bytes = frame::encode(RecordId(id), &record, true).unwrap();
        let decoded = frame::decode(&bytes).unwrap();

        prop_assert_eq!(decoded.record_id, RecordId(id));
        prop_assert_eq!(decoded.status, FrameStatus::Valid);
        prop_assert_eq!(decoded.consumed, bytes.len());
        prop_assert_eq!(decoded.record, Some(record));
    }

    #[test]
    fn any_flipped_payload_bit_reads_as_corrupt(
        record in arb_record(),
        position in any::<prop::sample::Index>(),
        bit in 0u8..8,
    ) {
        let mut bytes = frame::encode(RecordId(7), &record, true).unwrap();
        let payload_len = bytes.len() - HEADER_SIZE;
        bytes[HEADER_SIZE + position.index(payload_len)] ^= 1 << bit;

        let decoded = frame::decode(&bytes).unwrap();
        prop_assert_eq!(decoded.status, FrameStatus::Corrupt);
        prop_assert!(!decoded.is_valid());
        prop_assert_eq!(decoded.record_id, RecordId(7));
    }

    #[test]
    fn automaton_reports_exactly_the_naive_matches(
        patterns in prop::collection::vec("[abn]{1,3}", 1..5),
        text in "[abnç]{0,24}",
    ) {
        let automaton = AhoCorasick::new(&patterns).unwrap();
        let found: BTreeSet<(usize, String)> = automaton
            .search(&text)
            .into_iter()
            .map(|(end, pattern)| (end, pattern.to_string()))
            .collect();
        prop_assert_eq!(found, naive_matches(&text, &patterns));
    }

    #[test]
    fn pattern_scan_equals_brute_force_union(
        texts in prop::collection::vec(prop::collection::vec("[A-D]{1,5}", 0..3), 0..12),
        patterns in prop::collection::vec("[A-D]{1,2}", 1..4),
    ) {
        let mut index = InvertedIndex::in_memory(IndexedAttributes::default());
        for (id, crash_type) in texts.iter().enumerate() {
            let record = Record { crash_type: crash_type.clone(), ..Record::default() };
            index.add(&record, RecordId(id as u32)).unwrap();
        }

        let scanned = MultiPatternScanner::new(&patterns).unwrap().run_over_text_index(&index);

        let mut brute = BTreeSet::new();
        for key in index.keys(IndexedAttribute::Text) {
            if patterns.iter().any(|p| key.contains(p.as_str())) {
                brute.extend(index.postings(IndexedAttribute::Text, &key).unwrap().ids);
            }
        }
        prop_assert_eq!(scanned, brute);
    }
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 24,
        failure_persistence: None,
        .. ProptestConfig::default()
    })]

    // Ids are monotonic, updates land where the location policy says,
    // postings match the live records and everything survives a reopen.
    #[test]
    fn manager_agrees_with_a_model(ops in arb_ops()) {
        let tmp = tempfile::tempdir().unwrap();
        let mut manager = RecordManager::open(Config::under_dir(tmp.path())).unwrap();

        let mut model: BTreeMap<RecordId, Option<Record>> = BTreeMap::new();
        let mut footprints: BTreeMap<RecordId, u64> = BTreeMap::new();

        for op in ops {
            match op {
                Op::Add(record) => {
                    let id = manager.add(&record).unwrap();
                    prop_assert_eq!(id, RecordId(model.len() as u32));
                    let len = frame::encode(id, &record, true).unwrap().len() as u64;
                    footprints.insert(id, len);
                    model.insert(id, Some(record));
                }
                Op::Update(i, record) => {
                    if model.is_empty() {
                        continue;
                    }
                    let id = RecordId((i % model.len()) as u32);
                    let live = model[&id].is_some();
                    let offset_before = manager.offset_of(id);
                    let end_before = manager.end_of_log();

                    prop_assert_eq!(manager.update(id, &record).unwrap(), live);
                    if live {
                        let new_len = frame::encode(id, &record, true).unwrap().len() as u64;
                        if new_len <= footprints[&id] {
                            prop_assert_eq!(manager.offset_of(id), offset_before);
                        } else {
                            prop_assert_eq!(manager.offset_of(id), Some(end_before));
                        }
                        // the header written last bounds the next comparison
                        footprints.insert(id, new_len);
                        model.insert(id, Some(record));
                    }
                }
                Op::Delete(i) => {
                    if model.is_empty() {
                        continue;
                    }
                    let id = RecordId((i % model.len()) as u32);
                    let live = model[&id].is_some();
                    prop_assert_eq!(manager.delete(id).unwrap(), live);
                    model.insert(id, None);
                }
            }
        }

        for attribute in IndexedAttribute::ALL {
            let expected = expected_postings(&model, attribute);
            let stored_keys: BTreeSet<String> =
                manager.inverted().keys(attribute).into_iter().collect();
            let expected_keys: BTreeSet<String> = expected.keys().cloned().collect();
            prop_assert_eq!(&stored_keys, &expected_keys);
            for (key, ids) in &expected {
                prop_assert_eq!(&manager.lookup_by(attribute, key), ids);
            }
        }

        let ped: BTreeSet<RecordId> = model
            .iter()
            .filter(|(_, r)| r.as_ref().is_some_and(|r| r.crash_type.iter().any(|v| v.contains("PED"))))
            .map(|(id, _)| *id)
            .collect();
        prop_assert_eq!(manager.search_text_attribute(["PED"]).unwrap(), ped);

        manager.close().unwrap();
        let mut manager = RecordManager::open(Config::under_dir(tmp.path())).unwrap();
        for (id, record) in &model {
            prop_assert_eq!(&manager.get(*id).unwrap(), record);
        }
        let valid: Vec<RecordId> = manager.iter_valid_ids().collect();
        let expected_valid: Vec<RecordId> =
            model.iter().filter(|(_, r)| r.is_some()).map(|(id, _)| *id).collect();
        prop_assert_eq!(valid, expected_valid);
        prop_assert_eq!(
            manager.add(&Record::default()).unwrap(),
            RecordId(model.len() as u32)
        );
    }
}

#[test]
fn overlapping_occurrences_in_ananas() {
    let automaton = AhoCorasick::new(["ana", "nas"]).unwrap();
    let found = automaton.search("ananas");
    assert!(found.contains(&(2, "ana")));
    assert!(found.contains(&(5, "nas")));
}
