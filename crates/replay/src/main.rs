use std::io::{BufRead, BufReader};

use trainmap_frontend::{
    ChangeEvent, ChangeSource, ReconcileReport, RecordingWidget, TrainMap, TrainMapConfig,
    WidgetCall,
};

const USAGE: &str = "Usage: trainmap-replay [--tolerance <degrees>] [<events.jsonl>]";

/// The replayed log carries its own seed as a leading `refresh` event, so the
/// page listing is empty.
struct LogSource;

impl ChangeSource for LogSource {
    fn list_current_entities(&self) -> Vec<String> {
        Vec::new()
    }

    fn subscribe(&mut self) {}

    fn unsubscribe(&mut self) {}
}

#[derive(Debug, Default)]
struct ReplaySummary {
    lines: usize,
    applied: usize,
    dropped: usize,
    totals: ReconcileReport,
    live_markers: usize,
    released: usize,
    output: Vec<String>,
}

fn format_call(call: &WidgetCall) -> String {
    match call {
        WidgetCall::Create {
            marker,
            position,
            category,
        } => format!(
            "create #{marker} at ({}, {}) [{category}]",
            position.lat, position.lon
        ),
        WidgetCall::Move { marker, position } => {
            format!("move   #{marker} to ({}, {})", position.lat, position.lon)
        }
        WidgetCall::SetPopup { marker } => format!("popup  #{marker}"),
        WidgetCall::Remove { marker } => format!("remove #{marker}"),
    }
}

fn replay<R: BufRead>(reader: R, config: TrainMapConfig) -> std::io::Result<ReplaySummary> {
    let mut summary = ReplaySummary::default();
    let mut map: TrainMap<LogSource, RecordingWidget> = TrainMap::new(LogSource, config);
    map.attach(|_| Ok(RecordingWidget::new()))
        .map_err(|e| std::io::Error::other(e.to_string()))?;

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let line_no = index + 1;
        summary.lines += 1;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let event: ChangeEvent = match serde_json::from_str(trimmed) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(line = line_no, error = %e, "Skipping unreadable event");
                summary.dropped += 1;
                continue;
            }
        };

        match map.handle(event) {
            Some(report) => {
                summary.applied += 1;
                summary.totals.merge(report);
            }
            None => summary.dropped += 1,
        }

        if let Some(reconciler) = map.reconciler_mut() {
            for call in reconciler.widget_mut().take_calls() {
                summary
                    .output
                    .push(format!("line {line_no}: {}", format_call(&call)));
            }
        }
    }

    summary.live_markers = map.reconciler().map_or(0, |r| r.len());
    summary.released = map.teardown();
    Ok(summary)
}

fn format_summary(summary: &ReplaySummary) -> String {
    let mut out = String::new();
    out.push_str("=== Replay Summary ===\n");
    out.push_str(&format!("  Lines read:     {}\n", summary.lines));
    out.push_str(&format!("  Events applied: {}\n", summary.applied));
    out.push_str(&format!("  Events dropped: {}\n", summary.dropped));
    out.push_str(&format!("  Markers created: {}\n", summary.totals.created));
    out.push_str(&format!("  Markers moved:   {}\n", summary.totals.moved));
    out.push_str(&format!("  Popup updates:   {}\n", summary.totals.popups));
    out.push_str(&format!("  Markers removed: {}\n", summary.totals.removed));
    out.push_str(&format!("  Trains skipped:  {}\n", summary.totals.skipped));
    out.push_str(&format!("  Live at end:     {}\n", summary.live_markers));
    out
}

#[derive(Debug, Default, PartialEq)]
struct CliArgs {
    tolerance: Option<f64>,
    path: Option<String>,
}

/// Parse the arguments after the program name.
fn parse_args(args: &[String]) -> Result<CliArgs, String> {
    let mut parsed = CliArgs::default();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--tolerance" => {
                let raw = iter
                    .next()
                    .ok_or_else(|| "--tolerance expects a value".to_string())?;
                let value = raw
                    .parse()
                    .map_err(|_| format!("--tolerance expects a number, got {raw:?}"))?;
                parsed.tolerance = Some(value);
            }
            flag if flag.starts_with("--") => return Err(format!("unknown flag {flag:?}")),
            path if parsed.path.is_none() => parsed.path = Some(path.to_string()),
            extra => return Err(format!("unexpected argument {extra:?}")),
        }
    }
    Ok(parsed)
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let argv: Vec<String> = std::env::args().skip(1).collect();
    let args = parse_args(&argv).unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        eprintln!("{USAGE}");
        std::process::exit(1);
    });

    let mut config = TrainMapConfig::default();
    if let Some(tolerance) = args.tolerance {
        config.move_tolerance = tolerance;
    }

    let result = match args.path {
        Some(path) => {
            eprintln!("Replaying events from {path}...");
            match std::fs::File::open(&path) {
                Ok(file) => replay(BufReader::new(file), config),
                Err(e) => {
                    eprintln!("Failed to open {path}: {e}");
                    std::process::exit(1);
                }
            }
        }
        None => replay(std::io::stdin().lock(), config),
    };

    let summary = result.unwrap_or_else(|e| {
        eprintln!("Failed to read events: {e}");
        std::process::exit(1);
    });

    for line in &summary.output {
        println!("{line}");
    }
    println!();
    print!("{}", format_summary(&summary));
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOG: &str = r#"# seed
{"kind": "refresh", "payload": "[{\"id\": 1, \"latitude\": 48.8, \"longitude\": 2.3, \"train_number\": \"TGV101\"}, {\"id\": 2, \"latitude\": 45.7, \"longitude\": 4.8, \"train_number\": \"TER200\"}]"}
{"kind": "updated", "payload": "{\"id\": 1, \"latitude\": 48.80005, \"longitude\": 2.3, \"train_number\": \"TGV101\"}"}
{"kind": "updated", "payload": "{\"id\": 2, \"latitude\": 45.71, \"longitude\": 4.8, \"train_number\": \"TER200\"}"}
not an event
{"kind": "removed", "id": 1}
"#;

    fn run(log: &str) -> ReplaySummary {
        replay(log.as_bytes(), TrainMapConfig::default()).unwrap()
    }

    #[test]
    fn test_replay_counts() {
        let s = run(LOG);
        assert_eq!(s.lines, 6);
        assert_eq!(s.applied, 4);
        assert_eq!(s.dropped, 1);
        assert_eq!(s.totals.created, 2);
        assert_eq!(s.totals.moved, 1);
        assert_eq!(s.totals.popups, 2);
        assert_eq!(s.totals.removed, 1);
        assert_eq!(s.live_markers, 1);
        assert_eq!(s.released, 1);
    }

    #[test]
    fn test_replay_output_lines() {
        let s = run(LOG);
        assert_eq!(s.output[0], "line 2: create #0 at (48.8, 2.3) [high-speed]");
        assert_eq!(s.output[1], "line 2: create #1 at (45.7, 4.8) [regional]");
        assert_eq!(s.output[2], "line 3: popup  #0");
        assert_eq!(s.output[3], "line 4: move   #1 to (45.71, 4.8)");
        assert_eq!(s.output[4], "line 4: popup  #1");
        assert_eq!(s.output[5], "line 6: remove #0");
        assert_eq!(s.output.len(), 6);
    }

    #[test]
    fn test_replay_tolerance_override() {
        let config = TrainMapConfig {
            move_tolerance: 0.1,
            ..TrainMapConfig::default()
        };
        let s = replay(LOG.as_bytes(), config).unwrap();
        assert_eq!(s.totals.moved, 0);
    }

    #[test]
    fn test_replay_empty_input() {
        let s = run("");
        assert_eq!(s.lines, 0);
        assert_eq!(s.live_markers, 0);
    }

    fn args(list: &[&str]) -> Result<CliArgs, String> {
        let owned: Vec<String> = list.iter().map(|a| a.to_string()).collect();
        parse_args(&owned)
    }

    #[test]
    fn test_parse_args_tolerance_and_path() {
        let parsed = args(&["--tolerance", "0.01", "events.jsonl"]).unwrap();
        assert_eq!(parsed.tolerance, Some(0.01));
        assert_eq!(parsed.path.as_deref(), Some("events.jsonl"));

        let parsed = args(&["events.jsonl"]).unwrap();
        assert_eq!(parsed.tolerance, None);
        assert_eq!(parsed.path.as_deref(), Some("events.jsonl"));

        assert_eq!(args(&[]).unwrap(), CliArgs::default());
    }

    #[test]
    fn test_parse_args_rejects_unknown_flag() {
        // The file name must not be swallowed as the flag's value.
        let err = args(&["--verbose", "events.jsonl"]).unwrap_err();
        assert!(err.contains("--verbose"));
    }

    #[test]
    fn test_parse_args_rejects_bad_tolerance() {
        assert!(args(&["--tolerance", "wide"]).is_err());
        assert!(args(&["--tolerance"]).is_err());
        assert!(args(&["a.jsonl", "b.jsonl"]).is_err());
    }

    #[test]
    fn test_format_summary() {
        let s = run(LOG);
        let text = format_summary(&s);
        assert!(text.contains("Events applied: 4"));
        assert!(text.contains("Live at end:     1"));
    }
}
