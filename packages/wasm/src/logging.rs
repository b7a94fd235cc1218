//! Logging bootstrap.
//!
//! The engine logs through `tracing` macros. `init_logging` installs a fmt
//! subscriber whose writer forwards each formatted line to the browser
//! console on wasm32 (stderr elsewhere). Calling it more than once is a
//! no-op, and it never panics.

use std::io::{self, Write};
use std::sync::OnceLock;

use tracing::Level;
use tracing_subscriber::fmt::MakeWriter;

static INSTALLED_LEVEL: OnceLock<Level> = OnceLock::new();

/// Parse a level name (`trace`, `debug`, `info`, `warn`, `error`).
pub fn parse_level(level: &str) -> Option<Level> {
    match level.trim().to_ascii_lowercase().as_str() {
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "info" => Some(Level::INFO),
        "warn" | "warning" => Some(Level::WARN),
        "error" => Some(Level::ERROR),
        _ => None,
    }
}

/// Install the global subscriber at `level`.
///
/// Returns the level that is actually active: the first successful call
/// wins, later calls (or a host that already installed its own subscriber)
/// leave the existing one in place.
pub fn init_logging(level: Level) -> Level {
    *INSTALLED_LEVEL.get_or_init(|| {
        let installed = tracing_subscriber::fmt()
            .with_max_level(level)
            .with_target(false)
            .without_time()
            .with_writer(ConsoleMakeWriter)
            .try_init();
        if installed.is_err() {
            tracing::debug!("tracing subscriber already set by the host");
        }
        level
    })
}

/// Produces one [`ConsoleWriter`] per event.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleMakeWriter;

impl<'a> MakeWriter<'a> for ConsoleMakeWriter {
    type Writer = ConsoleWriter;

    fn make_writer(&'a self) -> Self::Writer {
        ConsoleWriter::new(None)
    }

    fn make_writer_for(&'a self, meta: &tracing::Metadata<'_>) -> Self::Writer {
        ConsoleWriter::new(Some(*meta.level()))
    }
}

/// Buffers one formatted event and emits it on drop.
pub struct ConsoleWriter {
    level: Option<Level>,
    buf: Vec<u8>,
}

impl ConsoleWriter {
    fn new(level: Option<Level>) -> Self {
        Self {
            level,
            buf: Vec::with_capacity(128),
        }
    }

    fn emit(&mut self) {
        if self.buf.is_empty() {
            return;
        }
        let line = String::from_utf8_lossy(&self.buf);
        let line = line.trim_end();
        emit_line(self.level, line);
        self.buf.clear();
    }
}

impl Write for ConsoleWriter {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.emit();
        Ok(())
    }
}

impl Drop for ConsoleWriter {
    fn drop(&mut self) {
        self.emit();
    }
}

#[cfg(target_arch = "wasm32")]
fn emit_line(level: Option<Level>, line: &str) {
    use wasm_bindgen::JsValue;
    use web_sys::console;

    let value = JsValue::from_str(line);
    match level {
        Some(Level::ERROR) => console::error_1(&value),
        Some(Level::WARN) => console::warn_1(&value),
        Some(Level::DEBUG) | Some(Level::TRACE) => console::debug_1(&value),
        _ => console::log_1(&value),
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn emit_line(_level: Option<Level>, line: &str) {
    let _ = writeln!(io::stderr(), "{line}");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("warn"), Some(Level::WARN));
        assert_eq!(parse_level(" DEBUG "), Some(Level::DEBUG));
        assert_eq!(parse_level("verbose"), None);
    }

    #[test]
    fn test_init_is_idempotent() {
        let first = init_logging(Level::WARN);
        let second = init_logging(Level::TRACE);
        assert_eq!(first, second);
        tracing::warn!(test = "logging", "subscriber smoke test");
    }

    #[test]
    fn test_writer_buffers_until_flush() {
        let mut writer = ConsoleWriter::new(Some(Level::INFO));
        writer.write_all(b"partial ").unwrap();
        writer.write_all(b"line\n").unwrap();
        assert_eq!(writer.buf, b"partial line\n");
        writer.flush().unwrap();
        assert!(writer.buf.is_empty());
    }
}
