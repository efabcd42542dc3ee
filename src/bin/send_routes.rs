//! Forwards the newest persisted route batch to the bus display over a
//! serial link. One-shot by default; `--watch` stays resident and re-sends
//! whenever the backend writes a new batch file.

use clap::Parser;
use notify::{Event, EventKind, RecursiveMode, Watcher};
use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "send_routes")]
struct Args {
    /// Serial device the display is attached to (e.g. /dev/ttyACM0 or COM10)
    #[arg(long)]
    port: String,
    /// Baud rate; must match the display firmware's Serial.begin
    #[arg(long, default_value_t = 115_200)]
    baud: u32,
    /// Directory the backend writes route batches into
    #[arg(long, default_value = "routes")]
    dir: PathBuf,
    /// Stay resident and re-send whenever a new batch file appears
    #[arg(long)]
    watch: bool,
}

// device chatter we never want in the log
const NOISE: [&str; 4] = ["start measure", "GET DATA", "sensor", "grove adc"];

// opening the port pulses DTR, which resets the board; bytes written before
// the firmware is back up land in the bootloader and vanish
const BOOT_DELAY: Duration = Duration::from_secs(2);
// one-shot mode lingers this long after sending so the device's echoed
// status lines still reach the log
const DRAIN_DELAY: Duration = Duration::from_secs(1);

fn main() {
    env_logger::init();
    let args = Args::parse();
    if let Err(err) = run(&args) {
        log::error!("{err}");
        std::process::exit(1);
    }
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let mut port = serialport::new(&args.port, args.baud)
        .timeout(Duration::from_millis(500))
        .open()?;
    log::info!("opened {} at {} baud", args.port, args.baud);

    let reader = port.try_clone()?;
    std::thread::spawn(move || echo_device_lines(reader));

    std::thread::sleep(BOOT_DELAY);

    if !args.watch {
        send_latest(&args.dir, &mut *port)?;
        std::thread::sleep(DRAIN_DELAY);
        return Ok(());
    }

    if let Err(err) = send_latest(&args.dir, &mut *port) {
        log::warn!("initial send failed: {err}");
    }

    let (tx, rx) = mpsc::channel();
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
        if let Ok(event) = res {
            if matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_))
                && event.paths.iter().any(|p| is_batch_file(p))
            {
                let _ = tx.send(());
            }
        }
    })?;
    watcher.watch(&args.dir, RecursiveMode::NonRecursive)?;
    log::info!("watching {} for new route batches", args.dir.display());

    loop {
        rx.recv()?;
        // settle delay so a file is never read mid-write
        std::thread::sleep(Duration::from_millis(500));
        while rx.try_recv().is_ok() {}
        if let Err(err) = send_latest(&args.dir, &mut *port) {
            log::warn!("re-send failed: {err}");
        }
    }
}

fn is_batch_file(path: &Path) -> bool {
    match path.file_name().and_then(|n| n.to_str()) {
        Some(name) => name.starts_with("routes_") && name.ends_with(".json"),
        None => false,
    }
}

fn latest_batch_file(dir: &Path) -> std::io::Result<Option<PathBuf>> {
    let mut newest: Option<(std::time::SystemTime, PathBuf)> = None;
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if !is_batch_file(&path) {
            continue;
        }
        let modified = entry.metadata()?.modified()?;
        if newest.as_ref().map_or(true, |(t, _)| modified > *t) {
            newest = Some((modified, path));
        }
    }
    Ok(newest.map(|(_, path)| path))
}

fn send_latest(
    dir: &Path,
    port: &mut dyn serialport::SerialPort,
) -> Result<(), Box<dyn std::error::Error>> {
    let Some(path) = latest_batch_file(dir)? else {
        return Err(format!("no routes_*.json files found in {}", dir.display()).into());
    };
    log::info!("reading routes from {}", path.display());

    let raw = fs::read_to_string(&path)?;
    let mut out = &mut *port;
    let sent = write_batch_line(&mut out, &raw)?;
    log::info!("sent {sent} bytes to display");
    Ok(())
}

// re-serialize compact so the whole batch fits on one newline-terminated line
fn write_batch_line(out: &mut dyn Write, raw: &str) -> Result<usize, Box<dyn std::error::Error>> {
    let batch: serde_json::Value = serde_json::from_str(raw)?;
    let line = serde_json::to_string(&batch)?;
    out.write_all(line.as_bytes())?;
    out.write_all(b"\n")?;
    out.flush()?;
    Ok(line.len() + 1)
}

fn echo_device_lines(port: Box<dyn serialport::SerialPort>) {
    read_device_lines(BufReader::new(port), |msg| log::info!("display: {msg}"));
}

fn read_device_lines<R: BufRead>(mut reader: R, mut on_line: impl FnMut(&str)) {
    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line) {
            Ok(0) => return,
            Ok(_) => {
                let msg = line.trim();
                if !msg.is_empty() && !NOISE.iter().any(|n| msg.contains(n)) {
                    on_line(msg);
                }
            }
            // timeouts are routine, and the device spews garbled bytes while
            // it resets; neither ends the echo loop
            Err(err)
                if matches!(
                    err.kind(),
                    std::io::ErrorKind::TimedOut | std::io::ErrorKind::InvalidData
                ) =>
            {
                continue
            }
            Err(_) => return,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn batch_line_is_compact_and_newline_terminated() {
        let raw = "{\n  \"count\": 1,\n  \"routes\": [\n    { \"busNumber\": \"52\" }\n  ]\n}";
        let mut out: Vec<u8> = Vec::new();
        let sent = write_batch_line(&mut out, raw).unwrap();
        assert_eq!(out, b"{\"count\":1,\"routes\":[{\"busNumber\":\"52\"}]}\n");
        assert_eq!(sent, out.len());
    }

    #[test]
    fn rejects_malformed_batch_file() {
        let mut out: Vec<u8> = Vec::new();
        assert!(write_batch_line(&mut out, "not json").is_err());
        assert!(out.is_empty());
    }

    #[test]
    fn garbled_bytes_do_not_stop_the_echo_loop() {
        let bytes: &[u8] = b"ready\n\xff\xfe\xfd\nroutes shown\nstart measure 42\n";
        let mut seen: Vec<String> = Vec::new();
        read_device_lines(Cursor::new(bytes), |msg| seen.push(msg.to_owned()));
        assert_eq!(seen, vec!["ready".to_owned(), "routes shown".to_owned()]);
    }

    #[test]
    fn filters_batch_file_names() {
        assert!(is_batch_file(Path::new("routes/routes_20260830_070000_000.json")));
        assert!(is_batch_file(Path::new("routes_20260830_070000_000_1.json")));
        assert!(!is_batch_file(Path::new("routes/batch.json")));
        assert!(!is_batch_file(Path::new("routes/routes_1.txt")));
    }
}
