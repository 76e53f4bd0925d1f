use std::path::PathBuf;
use std::process::Command;

use serde_json::Value;

fn cli() -> Command {
    Command::new(env!("CARGO_BIN_EXE_vocal_range_cli"))
}

fn temp_file(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("vocal_range_cli_{}_{}", std::process::id(), name))
}

#[test]
fn notes_lists_naturals_in_range() {
    let output = cli()
        .args(["notes", "--low", "60", "--high", "64"])
        .output()
        .expect("failed to run vocal_range_cli notes");
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).expect("stdout UTF-8");
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].contains("C4") && lines[0].contains("261.63"));
    assert!(lines[2].contains("E4"));
}

#[test]
fn notes_rejects_inverted_range() {
    let output = cli()
        .args(["notes", "--low", "72", "--high", "60"])
        .output()
        .expect("failed to run vocal_range_cli notes");
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn simulate_reports_scripted_tessitura() {
    let output = cli()
        .args(["simulate", "--strong-low", "55", "--strong-high", "67"])
        .output()
        .expect("failed to run vocal_range_cli simulate");
    assert!(
        output.status.success(),
        "CLI exited with {:?}",
        output.status.code()
    );

    let stdout = String::from_utf8(output.stdout).expect("stdout UTF-8");
    let report: Value = serde_json::from_str(stdout.trim()).expect("session report JSON");
    assert_eq!(report["results"].as_array().map(Vec::len), Some(15));
    assert_eq!(report["summary"]["midi_min"], 55);
    assert_eq!(report["summary"]["midi_max"], 67);
    assert_eq!(report["tessitura"]["low"]["name"], "G3");
    assert_eq!(report["tessitura"]["high"]["name"], "G4");
}

#[test]
fn simulate_silent_note_and_output_file() {
    let path = temp_file("report.json");
    let output = cli()
        .args(["simulate", "--sine", "--silent", "60", "--output"])
        .arg(&path)
        .output()
        .expect("failed to run vocal_range_cli simulate");
    assert!(output.status.success());

    let written = std::fs::read_to_string(&path).expect("report written");
    let _ = std::fs::remove_file(&path);
    let report: Value = serde_json::from_str(&written).expect("session report JSON");

    let c4 = report["results"]
        .as_array()
        .and_then(|results| results.iter().find(|r| r["note"]["midi"] == 60))
        .expect("C4 result");
    assert_eq!(c4["grade"], "fail");
    assert_eq!(c4["frame_count"], 0);
}

#[test]
fn estimate_reads_wav_blocks() {
    let path = temp_file("a4.wav");
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 44_100,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(&path, spec).expect("create wav");
    for n in 0..4096 {
        let t = n as f32 / 44_100.0;
        let sample = (2.0 * std::f32::consts::PI * 440.0 * t).sin() * 0.5;
        writer
            .write_sample((sample * i16::MAX as f32) as i16)
            .expect("write sample");
    }
    writer.finalize().expect("finalize wav");

    let output = cli()
        .args(["estimate", "--block", "2048", "--wav"])
        .arg(&path)
        .output()
        .expect("failed to run vocal_range_cli estimate");
    let _ = std::fs::remove_file(&path);
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).expect("stdout UTF-8");
    let blocks: Vec<Value> = stdout
        .lines()
        .map(|line| serde_json::from_str(line).expect("block JSON"))
        .collect();
    assert_eq!(blocks.len(), 2);
    for block in &blocks {
        assert_eq!(block["note"], "A4");
        let hz = block["frequency_hz"].as_f64().unwrap_or_default();
        assert!((hz - 440.0).abs() < 5.0, "estimated {hz}");
    }
}

#[cfg(unix)]
#[test]
fn realtime_simulate_aborts_on_interrupt() {
    use std::process::Stdio;
    use std::thread;
    use std::time::{Duration, Instant};

    let mut child = cli()
        .args(["simulate", "--realtime"])
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("failed to spawn vocal_range_cli simulate");

    // Lands in the first note's reference wait
    thread::sleep(Duration::from_millis(1500));
    let sent = Command::new("kill")
        .args(["-INT", &child.id().to_string()])
        .status()
        .expect("failed to run kill");
    assert!(sent.success());

    let started = Instant::now();
    let status = loop {
        if let Some(status) = child.try_wait().expect("wait on CLI") {
            break status;
        }
        if started.elapsed() > Duration::from_secs(10) {
            let _ = child.kill();
            panic!("CLI did not stop after SIGINT");
        }
        thread::sleep(Duration::from_millis(50));
    };
    assert_eq!(status.code(), Some(2));

    let output = child.wait_with_output().expect("collect output");
    assert!(output.stdout.is_empty(), "aborted run must not print a report");
}
