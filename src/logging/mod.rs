//! `log` backend writing to the browser console.
//!
//! Debug builds log at `Debug`; release builds log nothing.

use log::{Level, LevelFilter, Log, Metadata, Record};
use wasm_bindgen::JsValue;

struct ConsoleLogger;

static LOGGER: ConsoleLogger = ConsoleLogger;

impl Log for ConsoleLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = JsValue::from_str(&format_record(record));
        match record.level() {
            Level::Error => web_sys::console::error_1(&line),
            Level::Warn => web_sys::console::warn_1(&line),
            Level::Info => web_sys::console::info_1(&line),
            Level::Debug | Level::Trace => web_sys::console::debug_1(&line),
        }
    }

    fn flush(&self) {}
}

fn format_record(record: &Record) -> String {
    format!("[{}] {}: {}", record.level(), record.target(), record.args())
}

pub(crate) fn default_level() -> LevelFilter {
    if cfg!(debug_assertions) {
        LevelFilter::Debug
    } else {
        LevelFilter::Off
    }
}

/// Install the console logger. Calling it twice is harmless.
pub fn init() {
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(default_level());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_level_in_debug_builds() {
        if cfg!(debug_assertions) {
            assert_eq!(default_level(), LevelFilter::Debug);
        } else {
            assert_eq!(default_level(), LevelFilter::Off);
        }
    }

    #[test]
    fn test_format_record() {
        let line = format_record(
            &Record::builder()
                .level(Level::Warn)
                .target("blocknote_app::sync")
                .args(format_args!("save failed"))
                .build(),
        );
        assert_eq!(line, "[WARN] blocknote_app::sync: save failed");
    }
}
