/// Accident log walkthrough
///
/// Imports a few CSV rows, then exercises lookups, pattern search,
/// update, delete and statistics against a data directory.
///
/// Run with `RUST_LOG=crashlog=debug` to see the storage decisions.

use std::io::Cursor;
use crashlog::{Config, IndexedAttribute, RecordId, RecordManager};
use tracing_subscriber::EnvFilter;

const ROWS: &str = "\
07/29/2023 01:00:00 PM;TRAFFIC SIGNAL;CLEAR;DAYLIGHT;TURNING;NOT DIVIDED;STRAIGHT AND LEVEL;DRY;NO DEFECTS;NO INJURY / DRIVE AWAY;Y;$501 - $1,500;UNABLE TO DETERMINE;2;NO INDICATION OF INJURY;0.0;0.0;0.0;0.0;0.0;3.0;13;7;7
08/13/2023 12:11:00 AM;NO CONTROLS;RAIN;DARKNESS, LIGHTED ROAD;PEDESTRIAN;FOUR WAY;STRAIGHT AND LEVEL;WET;NO DEFECTS;INJURY AND / OR TOW DUE TO CRASH;N;OVER $1,500;FAILING TO YIELD;1;INCAPACITATING INJURY;1.0;0.0;1.0;0.0;0.0;1.0;0;1;8
12/09/2021 10:55:00 AM;STOP SIGN/FLASHER;SNOW;DAYLIGHT;ANGLE;ONE-WAY;CURVE ON GRADE;SNOW OR SLUSH;NO DEFECTS;PEDESTRIAN, BICYCLE;Y;OVER $1,500;WEATHER;2;NONINCAPACITATING INJURY;2.0;0.0;0.0;2.0;0.0;0.0;10;5;12
";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let dir = std::env::args().nth(1).unwrap_or_else(|| "./demo_data".to_string());
    println!("\n=== crashlog demo ({}) ===\n", dir);

    let mut manager = RecordManager::open(Config::under_dir(&dir))?;

    // Step 1: import
    let summary = manager.import_csv(Cursor::new(ROWS), false)?;
    println!("Imported {} rows, skipped {:?}", summary.added.len(), summary.skipped);
    let Some(&first) = summary.added.first() else {
        return Ok(());
    };

    // Step 2: lookups
    for (attribute, value) in [
        (IndexedAttribute::Lighting, "DAYLIGHT"),
        (IndexedAttribute::Count, "2"),
        (IndexedAttribute::Severity, "INCAPACITATING INJURY"),
    ] {
        println!("  {} = {:?}: {:?}", attribute, value, manager.lookup_by(attribute, value));
    }

    // Step 3: pattern search over crash types
    let hits = manager.search_text_attribute(["PED", "TOW"])?;
    println!("  crash type contains PED or TOW: {:?}", hits);

    // Step 4: update
    if let Some(mut record) = manager.get(first)? {
        let before = manager.offset_of(first);
        record.damage = "$500 OR LESS".to_string();
        manager.update(first, &record)?;
        println!(
            "\nUpdated {}: offset {:?} -> {:?}",
            first,
            before,
            manager.offset_of(first)
        );
    }

    // Step 5: delete
    let last = summary.added.last().copied().unwrap_or(RecordId(0));
    println!("Deleted {}: {}", last, manager.delete(last)?);

    // Step 6: list and stats
    println!("\nValid records:");
    for (id, record) in manager.iter_valid_records()? {
        println!("  [{}] {} | {}", id, record.default_time_string, record.crash_type.join(", "));
    }

    let stats = manager.stats()?;
    println!("\n{}", serde_json::to_string_pretty(&stats)?);

    manager.close()?;
    Ok(())
}
