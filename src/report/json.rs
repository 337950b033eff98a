use std::io::{self, Write};
use std::sync::{Mutex, PoisonError};

use super::{OutputSink, SinkError};
use crate::health::AggregatedResult;

/// Writes one JSON document per result, newline-terminated.
pub struct JsonSink {
    out: Mutex<Box<dyn Write + Send>>,
    pretty: bool,
}

impl JsonSink {
    pub fn new(out: Box<dyn Write + Send>, pretty: bool) -> Self {
        Self {
            out: Mutex::new(out),
            pretty,
        }
    }

    pub fn stdout() -> Self {
        Self::new(Box::new(io::stdout()), true)
    }
}

impl OutputSink for JsonSink {
    fn emit(&self, result: &AggregatedResult) -> Result<(), SinkError> {
        let body = if self.pretty {
            serde_json::to_string_pretty(result)?
        } else {
            serde_json::to_string(result)?
        };
        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        writeln!(out, "{}", body)?;
        out.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::{CollectorResult, UNAVAILABLE};
    use crate::health::{HealthLevel, InstanceInfo};
    use std::sync::Arc;
    use std::time::Duration;

    #[derive(Clone, Default)]
    struct Buffer(Arc<Mutex<Vec<u8>>>);

    impl Write for Buffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn output_parses_back() {
        let mut agg = AggregatedResult::new(InstanceInfo {
            host: "db1".into(),
            port: 3307,
            version: None,
        });
        let mut r = CollectorResult::ok("buffer_pool");
        r.set("hit_rate", UNAVAILABLE);
        r.raise(HealthLevel::Critical, "broken");
        agg.push(r);
        agg.finish(Duration::from_millis(1500));

        let buf = Buffer::default();
        let sink = JsonSink::new(Box::new(buf.clone()), false);
        sink.emit(&agg).unwrap();

        let written = String::from_utf8(buf.0.lock().unwrap().clone()).unwrap();
        let v: serde_json::Value = serde_json::from_str(written.trim()).unwrap();
        assert_eq!(v["overall"], "CRITICAL");
        assert_eq!(v["instance"]["port"], 3307);
        assert_eq!(v["elapsed_ms"], 1500);
        assert_eq!(v["partial"], false);
        assert_eq!(v["counts"]["critical"], 1);
        assert_eq!(v["details"][0]["name"], "buffer_pool");
        assert_eq!(v["details"][0]["metrics"]["hit_rate"], -1.0);
    }
}
