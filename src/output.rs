use std::io::{self, Write};

use serde::Serialize;

use crate::app::{ProgressEvent, ProgressSink};
use crate::manifest::Manifest;

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_manifest(manifest: &Manifest) -> io::Result<()> {
        Self::print_json(manifest)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

/// Forwards progress events to the log at debug level.
pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn event(&self, event: ProgressEvent) {
        match event.elapsed {
            Some(elapsed) => {
                tracing::debug!(elapsed_ms = elapsed.as_millis() as u64, "{}", event.message)
            }
            None => tracing::debug!("{}", event.message),
        }
    }
}

pub fn print_summary(manifest: &Manifest) {
    let green = "\x1b[32m";
    let yellow = "\x1b[33m";
    let cyan = "\x1b[36m";
    let red = "\x1b[31m";
    let reset = "\x1b[0m";

    let counts = &manifest.queries;
    println!("{cyan}📊 KIRA-SR summary{reset}");
    println!(
        "{cyan}🧬 Graph: {} triples (source {}){reset}",
        manifest.triple_count.working, manifest.triple_count.source
    );
    if let Some(compat) = &manifest.compat {
        let state = if compat.applied { "applied" } else { "skipped" };
        println!(
            "{cyan}🔧 Compat {}: {state} ({}), +{} triples{reset}",
            compat.mode, compat.reason, compat.added_triples
        );
    }
    println!("{green}✅ Succeeded: {}{reset}", counts.succeeded);
    let failed_color = if counts.failed > 0 { red } else { yellow };
    println!("{failed_color}❌ Failed: {}{reset}", counts.failed);
    if counts.skipped > 0 {
        println!("{yellow}⏭️ Skipped (fail-fast): {}{reset}", counts.skipped);
    }

    for record in &manifest.records {
        let (icon, color) = if record.ok { ("✔", green) } else { ("✖", red) };
        println!(
            "{color}{icon} {} [{}] {} ms, rows={} cols={}{reset}",
            record.query_name, record.query_type, record.duration_ms, record.rows, record.cols
        );
        if let Some(error) = &record.error {
            println!("{color}   ⚠️ {error}{reset}");
        }
    }

    if manifest.options.dry_run {
        println!("{yellow}📝 Dry run: nothing written{reset}");
    } else {
        println!("{cyan}📁 Output: {}{reset}", manifest.sources.out);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use super::*;

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn log_progress_reaches_the_log() {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            LogProgress.event(ProgressEvent {
                message: "phase=Load; 12 triples".to_string(),
                elapsed: Some(Duration::from_millis(7)),
            });
        });

        let logged = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        assert!(logged.contains("phase=Load; 12 triples"), "{logged}");
        assert!(logged.contains("elapsed_ms=7"), "{logged}");
    }
}
