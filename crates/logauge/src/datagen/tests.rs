use super::*;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

fn template(dir: &TempDir, contents: &str) -> PathBuf {
    let path = dir.path().join("template.log");
    std::fs::write(&path, contents).unwrap();
    path
}

fn config(dir: &TempDir, contents: &str) -> GeneratorConfig {
    GeneratorConfig {
        input_path: template(dir, contents),
        output_path: dir.path().join("out.log"),
        ..GeneratorConfig::default()
    }
}

fn lines(path: &Path) -> Vec<String> {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}

fn fixed_time() -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000, 0).unwrap()
}

#[test]
fn fifty_events_continue_the_sequence() {
    let dir = tempfile::tempdir().unwrap();
    let config = GeneratorConfig {
        max_events: 50,
        ..config(&dir, "a @FIELD@ @TIME@\nb @FIELD@ @TIME@\nc @FIELD@ @TIME@\n")
    };
    let generation = DataGenerator::new(config.clone()).generate().unwrap();

    assert_eq!(generation.events, 50);
    assert_eq!(generation.last_event, 50);
    assert_eq!(generation.next_event, 51);
    assert_eq!(generation.files, vec![config.output_path.clone()]);

    let written = lines(&config.output_path);
    assert_eq!(written.len(), 50);
    for (i, line) in written.iter().enumerate() {
        let event = i as u64 + 1;
        assert!(line.contains(&format!("eventnum={event} ")), "{line}");
        assert!(!line.contains("@FIELD@") && !line.contains("@TIME@"));
    }
    assert!(written[0].starts_with("a eventnum=1 "));
    assert!(written[3].starts_with("a eventnum=4 "));
}

#[test]
fn token_is_replaced_once_or_prepended() {
    let config = GeneratorConfig {
        timestamp_format: "%H:%M:%S".to_string(),
        ..GeneratorConfig::default()
    };
    let at = fixed_time();

    let replaced = render_line("x @FIELD@ y @FIELD@ @TIME@", 7, at, &config);
    assert_eq!(
        replaced,
        format!("x {} y @FIELD@ 22:13:20\n", marker(7))
    );

    let prepended = render_line("plain line", 7, at, &config);
    assert_eq!(prepended, format!("22:13:20 {} plain line\n", marker(7)));
}

#[test]
fn disabled_tokens_always_prepend() {
    let config = GeneratorConfig {
        timestamp_token: None,
        field_token: None,
        timestamp_format: "%Y".to_string(),
        ..GeneratorConfig::default()
    };
    let line = render_line("@TIME@ @FIELD@", 1, fixed_time(), &config);
    assert_eq!(line, format!("2023 {} @TIME@ @FIELD@\n", marker(1)));
}

#[test]
fn size_budget_is_never_reached() {
    let dir = tempfile::tempdir().unwrap();
    let config = GeneratorConfig {
        max_file_bytes: 4096,
        ..config(&dir, "@TIME@ host app[1]: @FIELD@ message\n")
    };
    let generation = DataGenerator::new(config.clone()).generate().unwrap();

    let size = std::fs::metadata(&config.output_path).unwrap().len();
    assert!(size < 4096);
    assert_eq!(size, generation.bytes);
    // one more line would have reached the budget
    let longest = lines(&config.output_path)
        .iter()
        .map(|l| l.len() as u64 + 1)
        .max()
        .unwrap();
    assert!(size + 2 * longest > 4096);
}

#[test]
fn rotation_keeps_most_recent_files() {
    let dir = tempfile::tempdir().unwrap();
    let config = GeneratorConfig {
        max_events: 10,
        num_files: 3,
        files_to_keep: 1,
        ..config(&dir, "@TIME@ line @FIELD@\n")
    };
    let generation = DataGenerator::new(config).generate().unwrap();

    let last = dir.path().join("out_3.log");
    assert_eq!(generation.files, vec![last.clone()]);
    assert!(!dir.path().join("out_1.log").exists());
    assert!(!dir.path().join("out_2.log").exists());
    assert_eq!(generation.events, 30);

    // the sequence runs on across files
    let written = lines(&last);
    assert!(written[0].contains(" line eventnum=21 "));
    assert!(written[9].contains(" line eventnum=30 "));
}

#[test]
fn zero_retention_keeps_every_file() {
    let dir = tempfile::tempdir().unwrap();
    let config = GeneratorConfig {
        max_events: 2,
        num_files: 4,
        files_to_keep: 0,
        ..config(&dir, "x\n")
    };
    let generation = DataGenerator::new(config).generate().unwrap();
    assert_eq!(generation.files.len(), 4);
    assert!(generation.files.iter().all(|f| f.exists()));
}

#[test]
fn append_mode_extends_existing_output() {
    let dir = tempfile::tempdir().unwrap();
    let config = GeneratorConfig {
        max_events: 5,
        overwrite: false,
        ..config(&dir, "x\n")
    };
    std::fs::write(&config.output_path, "existing\n").unwrap();

    let first = DataGenerator::new(config.clone()).generate().unwrap();
    let second = DataGenerator::new(GeneratorConfig {
        start_event: first.next_event,
        ..config.clone()
    })
    .generate()
    .unwrap();

    assert_eq!(second.next_event, 11);
    let written = lines(&config.output_path);
    assert_eq!(written.len(), 11);
    assert_eq!(written[0], "existing");
    assert!(written[10].contains("eventnum=10 "));
}

#[test]
fn overwrite_truncates_existing_output() {
    let dir = tempfile::tempdir().unwrap();
    let config = GeneratorConfig {
        max_events: 3,
        ..config(&dir, "x\n")
    };
    std::fs::write(&config.output_path, "stale\nstale\nstale\nstale\n").unwrap();
    DataGenerator::new(config.clone()).generate().unwrap();
    let written = lines(&config.output_path);
    assert_eq!(written.len(), 3);
    assert!(written.iter().all(|l| l != "stale"));
}

#[test]
fn last_event_follows_the_start_event() {
    let dir = tempfile::tempdir().unwrap();
    let config = GeneratorConfig {
        max_events: 10,
        start_event: 101,
        ..config(&dir, "x @FIELD@\n")
    };
    let generation = DataGenerator::new(config.clone()).generate().unwrap();

    assert_eq!(generation.last_event, 110);
    assert_eq!(generation.next_event, 111);
    let written = lines(&config.output_path);
    assert!(written[9].starts_with("x eventnum=110 "), "{}", written[9]);
}

#[test]
#[should_panic]
fn render_line_panics_on_an_unchecked_format() {
    let config = GeneratorConfig {
        timestamp_format: "%Y-%".to_string(),
        ..GeneratorConfig::default()
    };
    let _ = render_line("@TIME@ line", 1, fixed_time(), &config);
}

#[test]
fn empty_template_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let config = GeneratorConfig {
        max_events: 5,
        ..config(&dir, "")
    };
    let err = DataGenerator::new(config).generate().unwrap_err();
    assert!(matches!(err, Error::EmptyTemplate { .. }));
}

#[test]
fn missing_template_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let config = GeneratorConfig {
        input_path: dir.path().join("missing.log"),
        output_path: dir.path().join("out.log"),
        max_events: 5,
        ..GeneratorConfig::default()
    };
    let err = DataGenerator::new(config).generate().unwrap_err();
    assert!(matches!(err, Error::Io { ref path, .. } if path.ends_with("missing.log")));
}

#[test]
fn crlf_template_lines_are_normalised() {
    let dir = tempfile::tempdir().unwrap();
    let config = GeneratorConfig {
        max_events: 4,
        ..config(&dir, "a\r\nb")
    };
    DataGenerator::new(config.clone()).generate().unwrap();
    let raw = std::fs::read_to_string(&config.output_path).unwrap();
    assert!(!raw.contains('\r'));
    assert_eq!(raw.matches('\n').count(), 4);
    assert!(raw.ends_with(" b\n"));
}

#[test]
fn synthetic_timestamps_start_at_midnight() {
    let dir = tempfile::tempdir().unwrap();
    let config = GeneratorConfig {
        max_events: 12,
        timestamp_format: "%H:%M:%S".to_string(),
        ..config(&dir, "@TIME@\n")
    };
    DataGenerator::new(config.clone()).generate().unwrap();
    let written = lines(&config.output_path);
    // no field token in the template, so the marker is prepended
    assert!(written[0].starts_with("eventnum=1 "));
    assert!(written[..10].iter().all(|l| l.ends_with(" 00:00:00")));
    assert!(written[10].ends_with(" 00:00:01"));
}

#[test]
fn runtime_budget_stops_throttled_generation() {
    let dir = tempfile::tempdir().unwrap();
    let config = GeneratorConfig {
        // 360 bytes per second
        max_bytes_per_hour: 1_296_000,
        max_runtime: Duration::from_millis(1500),
        num_files: 0,
        files_to_keep: 0,
        ..config(&dir, "@TIME@ a fairly ordinary log line @FIELD@\n")
    };
    let started = Instant::now();
    let generation = DataGenerator::new(config).generate().unwrap();
    let elapsed = started.elapsed();

    assert!(elapsed >= Duration::from_millis(1500));
    assert!(elapsed < Duration::from_secs(5));
    assert!(generation.events > 0);
    // at most two full windows plus the line that tipped each of them over
    assert!(generation.bytes < 3 * 360 + 600, "{}", generation.bytes);
    assert_eq!(generation.files.len(), 1);
}

#[test]
fn progress_reports_budget_percentages() {
    let dir = tempfile::tempdir().unwrap();
    let config = GeneratorConfig {
        max_events: 20,
        progress_interval: Duration::ZERO,
        ..config(&dir, "x\n")
    };
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    DataGenerator::new(config)
        .with_progress(move |p| sink.lock().unwrap().push(p.clone()))
        .generate()
        .unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 20);
    assert_eq!(seen[9].by_events, Some(50.0));
    assert_eq!(seen[9].by_size, None);
    assert_eq!(seen[19].by_events, Some(100.0));
}

#[test]
fn invalid_timestamp_format_fails_before_writing() {
    let dir = tempfile::tempdir().unwrap();
    let config = GeneratorConfig {
        max_events: 1,
        timestamp_format: "%Y-%".to_string(),
        ..config(&dir, "x\n")
    };
    let err = DataGenerator::new(config.clone()).generate().unwrap_err();
    assert!(matches!(err, Error::TimestampFormat { .. }));
    assert!(!config.output_path.exists());
}
