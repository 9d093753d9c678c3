use std::fs::File;
use std::path::Path;

use avrosink_avro::read_container;
use avrosink_engine::{SinkConfig, SinkSettings, open_storage};
use serde_json::{Value, json};

fn config(dir: &Path, rotation: &str) -> SinkConfig {
    SinkConfig::parse(&format!(
        r#"
        [output]
        path = "{}"
        instance_id = "bolt-1"
        unique_per_start = false

        [schema]
        inline = '{{"type":"record","name":"myrecord","fields":[{{"name":"foo1","type":"string"}},{{"name":"int1","type":"int"}}]}}'

        [rotation]
        {rotation}

        [sync]
        count = 1
        "#,
        dir.display()
    ))
    .unwrap()
}

fn record(n: u32) -> Value {
    json!({"foo1": format!("bar{n}"), "int1": n})
}

fn non_empty_files(dir: &Path) -> Vec<std::path::PathBuf> {
    let mut files: Vec<_> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap())
        .filter(|e| e.metadata().unwrap().len() > 0)
        .map(|e| e.path())
        .collect();
    files.sort();
    files
}

#[test]
fn one_megabyte_threshold_writes_one_file() {
    let tmp = tempfile::tempdir().unwrap();
    let settings = config(tmp.path(), "size = 1.0\nunit = \"mb\"").validate().unwrap();
    let storage = open_storage(&settings.storage);
    let mut engine = settings.build_engine(storage);

    for n in 1..=4 {
        engine.on_record(&record(n)).unwrap();
    }

    // An independent reader sees every synced record before shutdown.
    let path = tmp.path().join("bolt-1-0.avro");
    let records = read_container(File::open(&path).unwrap()).unwrap();
    assert_eq!(records.len(), 4);

    engine.shutdown().unwrap();
    assert_eq!(non_empty_files(tmp.path()), vec![path]);
}

#[test]
fn tiny_threshold_writes_one_file_per_record() {
    let tmp = tempfile::tempdir().unwrap();
    let settings =
        SinkSettings::from_config(&config(tmp.path(), "size = 0.000001\nunit = \"mb\"")).unwrap();
    let storage = open_storage(&settings.storage);
    let mut engine = settings.build_engine(storage);

    for n in 1..=4 {
        engine.on_record(&record(n)).unwrap();
    }
    engine.shutdown().unwrap();

    let files = non_empty_files(tmp.path());
    assert_eq!(files.len(), 4);
    for (n, path) in (1..=4).zip(&files) {
        let records = read_container(File::open(path).unwrap()).unwrap();
        assert_eq!(records, vec![record(n)]);
    }
}

#[test]
fn finalized_files_move_to_done_directory() {
    let tmp = tempfile::tempdir().unwrap();
    let out = tmp.path().join("out");
    let done = tmp.path().join("done");
    let settings = SinkSettings::from_config(&config(
        &out,
        &format!("size = 12.0\nunit = \"bytes\"\nmove_to = \"{}\"", done.display()),
    ))
    .unwrap();
    let storage = open_storage(&settings.storage);
    let mut engine = settings.build_engine(storage);

    for n in 0..4 {
        engine.on_record(&record(n)).unwrap();
    }
    engine.shutdown().unwrap();

    assert!(non_empty_files(&out).is_empty());
    assert_eq!(non_empty_files(&done).len(), 2);
}
