//! Custom tracing layer for JSONL output.
//!
//! The same layer feeds stderr (in `jsonl` mode) and the per-day update log,
//! so both carry identical records.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{Local, NaiveDate, Utc};
use tracing::span::{Attributes, Id};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::Layer;

use super::events::Level;

/// Correlation fields lifted to the top level of every record.
#[derive(Debug, Clone, Default)]
struct Correlation {
    run_id: Option<String>,
    host_id: Option<String>,
    stage: Option<String>,
    instance_id: Option<String>,
}

impl Correlation {
    fn set(&mut self, name: &str, value: String) -> bool {
        let slot = match name {
            "run_id" => &mut self.run_id,
            "host_id" => &mut self.host_id,
            "stage" => &mut self.stage,
            "instance_id" => &mut self.instance_id,
            _ => return false,
        };
        // "-" marks an absent instance in log_event! call sites.
        if value != "-" {
            *slot = Some(value);
        }
        true
    }

    fn fill_from(&mut self, other: &Correlation) {
        if self.run_id.is_none() {
            self.run_id.clone_from(&other.run_id);
        }
        if self.host_id.is_none() {
            self.host_id.clone_from(&other.host_id);
        }
        if self.stage.is_none() {
            self.stage.clone_from(&other.stage);
        }
        if self.instance_id.is_none() {
            self.instance_id.clone_from(&other.instance_id);
        }
    }
}

/// A visitor that extracts field values from tracing events.
struct JsonFieldVisitor {
    correlation: Correlation,
    fields: serde_json::Map<String, serde_json::Value>,
    message: Option<String>,
}

impl JsonFieldVisitor {
    fn new() -> Self {
        JsonFieldVisitor {
            correlation: Correlation::default(),
            fields: serde_json::Map::new(),
            message: None,
        }
    }

    fn record_string(&mut self, name: &str, value: String) {
        if name == "message" {
            self.message = Some(value);
        } else if !self.correlation.set(name, value.clone()) {
            self.fields
                .insert(name.to_string(), serde_json::Value::String(value));
        }
    }
}

impl tracing::field::Visit for JsonFieldVisitor {
    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        self.record_string(field.name(), value.to_string());
    }

    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        self.record_string(field.name(), format!("{:?}", value));
    }

    fn record_i64(&mut self, field: &tracing::field::Field, value: i64) {
        self.fields.insert(
            field.name().to_string(),
            serde_json::Value::Number(value.into()),
        );
    }

    fn record_u64(&mut self, field: &tracing::field::Field, value: u64) {
        self.fields.insert(
            field.name().to_string(),
            serde_json::Value::Number(value.into()),
        );
    }

    fn record_f64(&mut self, field: &tracing::field::Field, value: f64) {
        if let Some(n) = serde_json::Number::from_f64(value) {
            self.fields
                .insert(field.name().to_string(), serde_json::Value::Number(n));
        }
    }

    fn record_bool(&mut self, field: &tracing::field::Field, value: bool) {
        self.fields
            .insert(field.name().to_string(), serde_json::Value::Bool(value));
    }
}

/// JSONL tracing layer.
pub struct JsonlLayer<W = io::Stderr> {
    writer: Mutex<W>,
}

impl JsonlLayer<io::Stderr> {
    /// Create a new JSONL layer writing to stderr.
    pub fn stderr() -> Self {
        JsonlLayer {
            writer: Mutex::new(io::stderr()),
        }
    }
}

impl<W: Write> JsonlLayer<W> {
    /// Create a new JSONL layer with a custom writer.
    pub fn new(writer: W) -> Self {
        JsonlLayer {
            writer: Mutex::new(writer),
        }
    }
}

impl<S, W> Layer<S> for JsonlLayer<W>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: Write + 'static,
{
    fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
        let mut visitor = JsonFieldVisitor::new();
        attrs.record(&mut visitor);

        if let Some(span) = ctx.span(id) {
            span.extensions_mut().insert(visitor.correlation);
        }
    }

    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let ts = Utc::now();

        let mut visitor = JsonFieldVisitor::new();
        event.record(&mut visitor);

        // Event fields win; enclosing spans fill the gaps.
        let mut correlation = visitor.correlation;
        if let Some(scope) = ctx.event_scope(event) {
            for span in scope {
                if let Some(span_ctx) = span.extensions().get::<Correlation>() {
                    correlation.fill_from(span_ctx);
                }
            }
        }

        let level: Level = (*event.metadata().level()).into();
        let mut obj = serde_json::Map::new();

        obj.insert("ts".to_string(), serde_json::json!(ts.to_rfc3339()));
        obj.insert("level".to_string(), serde_json::json!(level));
        obj.insert(
            "event".to_string(),
            serde_json::json!(event.metadata().target()),
        );
        if let Some(id) = correlation.run_id {
            obj.insert("run_id".to_string(), serde_json::json!(id));
        }
        if let Some(id) = correlation.host_id {
            obj.insert("host_id".to_string(), serde_json::json!(id));
        }
        if let Some(s) = correlation.stage {
            obj.insert("stage".to_string(), serde_json::json!(s));
        }
        if let Some(id) = correlation.instance_id {
            obj.insert("instance_id".to_string(), serde_json::json!(id));
        }
        if let Some(msg) = visitor.message {
            obj.insert("message".to_string(), serde_json::json!(msg));
        }
        if !visitor.fields.is_empty() {
            obj.insert(
                "fields".to_string(),
                serde_json::Value::Object(visitor.fields),
            );
        }

        let json = serde_json::to_string(&serde_json::Value::Object(obj)).unwrap_or_default();
        if let Ok(mut writer) = self.writer.lock() {
            let _ = writeln!(writer, "{}", json);
        }
    }
}

/// Appends to `update-YYYYMMDD.jsonl` in a directory, switching files when
/// the local date changes.
pub struct DailyLogFile {
    dir: PathBuf,
    current: Option<(NaiveDate, File)>,
}

impl DailyLogFile {
    /// Create the directory if needed. Files are opened on first write.
    pub fn new(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(DailyLogFile { dir, current: None })
    }

    /// Path of the file that receives records written on `date`.
    pub fn path_for(dir: &Path, date: NaiveDate) -> PathBuf {
        dir.join(format!("update-{}.jsonl", date.format("%Y%m%d")))
    }

    fn file_for_today(&mut self) -> io::Result<&mut File> {
        let today = Local::now().date_naive();
        let stale = !matches!(&self.current, Some((date, _)) if *date == today);
        if stale {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(Self::path_for(&self.dir, today))?;
            self.current = Some((today, file));
        }
        match self.current.as_mut() {
            Some((_, file)) => Ok(file),
            None => Err(io::Error::new(io::ErrorKind::Other, "log file not open")),
        }
    }
}

impl Write for DailyLogFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file_for_today()?.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.current.as_mut() {
            Some((_, file)) => file.flush(),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tracing_subscriber::layer::SubscriberExt;

    struct BufWriter(Arc<Mutex<Vec<u8>>>);

    impl Write for BufWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().write(buf)
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn capture(f: impl FnOnce()) -> serde_json::Value {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let layer = JsonlLayer::new(BufWriter(buffer.clone()));
        let subscriber = tracing_subscriber::registry().with(layer);
        tracing::subscriber::with_default(subscriber, f);

        let output = buffer.lock().unwrap();
        let line = String::from_utf8_lossy(&output);
        serde_json::from_str(line.trim()).unwrap()
    }

    #[test]
    fn test_jsonl_layer_output() {
        let parsed = capture(|| {
            tracing::warn!(target: "verify.mismatch", message = "version differs");
        });
        assert_eq!(parsed["level"], "warn");
        assert_eq!(parsed["event"], "verify.mismatch");
        assert_eq!(parsed["message"], "version differs");
        assert!(parsed["ts"].is_string());
    }

    #[test]
    fn test_correlation_lifted_from_event_fields() {
        let parsed = capture(|| {
            tracing::info!(
                target: "backup.renamed",
                run_id = "run-1",
                host_id = "host-1",
                stage = "backup",
                instance_id = "007",
                renamed = 2u64,
                message = "moved aside"
            );
        });
        assert_eq!(parsed["run_id"], "run-1");
        assert_eq!(parsed["stage"], "backup");
        assert_eq!(parsed["instance_id"], "007");
        assert_eq!(parsed["fields"]["renamed"], 2);
        assert!(parsed["fields"].get("run_id").is_none());
    }

    #[test]
    fn test_absent_instance_marker_dropped() {
        let parsed = capture(|| {
            tracing::info!(target: "run.started", instance_id = "-", message = "go");
        });
        assert!(parsed.get("instance_id").is_none());
    }

    #[test]
    fn test_span_fills_missing_correlation() {
        let parsed = capture(|| {
            let span = tracing::info_span!("rollout", run_id = "run-span", stage = "install");
            let _guard = span.enter();
            tracing::info!(target: "install.copied", stage = "verify", message = "inner");
        });
        assert_eq!(parsed["run_id"], "run-span");
        assert_eq!(parsed["stage"], "verify");
    }

    #[test]
    fn test_daily_file_appends() {
        let temp = tempfile::TempDir::new().unwrap();
        let dir = temp.path().join("updateLog");
        let mut file = DailyLogFile::new(&dir).unwrap();
        writeln!(file, "{{\"a\":1}}").unwrap();
        writeln!(file, "{{\"a\":2}}").unwrap();
        file.flush().unwrap();

        let path = DailyLogFile::path_for(&dir, Local::now().date_naive());
        let content = fs::read_to_string(path).unwrap();
        assert_eq!(content.lines().count(), 2);
    }
}
