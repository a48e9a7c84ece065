//! Structured logging with timestamps, source locations, and ANSI colour support.
//!
//! Provides the [`tlog!`] macro for consistent log output in the format:
//!
//! ```text
//! 20261017T21:33:12.000 - src/server/handlers/contacts.rs:42 - contact: c-12 accepted by pr-7
//! ```
//!
//! When writing to a terminal, profile and contact IDs get a stable colour
//! derived from their value and the timestamp/location prefix is dimmed.
//!
//! Output goes to stderr unless [`set_writer`] installs another destination.

use std::io::{self, IsTerminal, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{LazyLock, Mutex};
use std::time::SystemTime;

static COLOUR_ENABLED: AtomicBool = AtomicBool::new(false);

static LOG_WRITER: LazyLock<Mutex<Box<dyn Write + Send>>> =
    LazyLock::new(|| Mutex::new(Box::new(io::stderr())));

/// Initialize the logging system. Call once at startup before any logging.
pub fn init() {
    COLOUR_ENABLED.store(io::stderr().is_terminal(), Ordering::Relaxed);
}

/// Replace the log writer and disable colour codes.
pub fn set_writer(w: Box<dyn Write + Send>) {
    COLOUR_ENABLED.store(false, Ordering::Relaxed);
    if let Ok(mut writer) = LOG_WRITER.lock() {
        *writer = w;
    }
}

pub fn colour_enabled() -> bool {
    COLOUR_ENABLED.load(Ordering::Relaxed)
}

const RESET: &str = "\x1b[0m";
const DIM: &str = "\x1b[2m";

const ID_COLOURS: &[&str] = &[
    "\x1b[91m", "\x1b[92m", "\x1b[93m", "\x1b[94m", "\x1b[95m", "\x1b[96m", "\x1b[31m",
    "\x1b[32m", "\x1b[33m", "\x1b[34m", "\x1b[35m", "\x1b[36m",
];

fn hash_colour(id: i64) -> &'static str {
    let hash = id
        .to_le_bytes()
        .iter()
        .fold(0u32, |acc, b| acc.wrapping_mul(31).wrapping_add(*b as u32));
    ID_COLOURS[(hash as usize) % ID_COLOURS.len()]
}

fn tagged(prefix: &str, id: i64) -> String {
    if colour_enabled() {
        format!("{}{prefix}-{id}{RESET}", hash_colour(id))
    } else {
        format!("{prefix}-{id}")
    }
}

/// Format a profile ID, e.g. `pr-7`.
pub fn profile_id(id: i64) -> String {
    tagged("pr", id)
}

/// Format a contact ID, e.g. `c-12`.
pub fn contact_id(id: i64) -> String {
    tagged("c", id)
}

/// Format the current wall-clock time as `YYYYMMDDTHH:MM:SS.mmm` (UTC).
pub fn format_timestamp() -> String {
    let duration = SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    let secs = duration.as_secs();
    let millis = duration.subsec_millis();

    let time_secs = secs % 86400;
    let hours = time_secs / 3600;
    let minutes = (time_secs % 3600) / 60;
    let seconds = time_secs % 60;

    // Civil date from days since epoch (Howard Hinnant's algorithm).
    let days = (secs / 86400) as i64;
    let z = days + 719_468;
    let era = if z >= 0 { z } else { z - 146_096 } / 146_097;
    let doe = (z - era * 146_097) as u64;
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146_096) / 365;
    let y = yoe as i64 + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = doy - (153 * mp + 2) / 5 + 1;
    let m = if mp < 10 { mp + 3 } else { mp - 9 };
    let y = if m <= 2 { y + 1 } else { y };

    format!(
        "{:04}{:02}{:02}T{:02}:{:02}:{:02}.{:03}",
        y, m, d, hours, minutes, seconds, millis
    )
}

/// Write a single log line. Called by [`tlog!`].
pub fn emit(file: &str, line: u32, msg: &str) {
    let ts = format_timestamp();
    let formatted = if colour_enabled() {
        format!("{DIM}{ts}{RESET} {DIM}{file}:{line}{RESET} {msg}")
    } else {
        format!("{ts} - {file}:{line} - {msg}")
    };
    if let Ok(mut writer) = LOG_WRITER.lock() {
        let _ = writeln!(*writer, "{formatted}");
    }
}

/// Emit a log line with timestamp and source location.
///
/// ```ignore
/// tlog!("contact: {} accepted", logging::contact_id(id));
/// ```
#[macro_export]
macro_rules! tlog {
    ($($arg:tt)*) => {{
        $crate::logging::emit(file!(), line!(), &format!($($arg)*));
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_shape() {
        let ts = format_timestamp();
        assert_eq!(ts.len(), 21);
        assert_eq!(&ts[8..9], "T");
    }

    #[test]
    fn test_plain_id_formatting() {
        COLOUR_ENABLED.store(false, Ordering::Relaxed);
        assert_eq!(profile_id(7), "pr-7");
        assert_eq!(contact_id(12), "c-12");
    }

    #[derive(Clone, Default)]
    struct Capture(std::sync::Arc<Mutex<Vec<u8>>>);

    impl Write for Capture {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if let Ok(mut inner) = self.0.lock() {
                inner.extend_from_slice(buf);
            }
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_tlog_writes_location_and_message() {
        let capture = Capture::default();
        set_writer(Box::new(capture.clone()));
        crate::tlog!("contact {} accepted", contact_id(3));

        let output = String::from_utf8(capture.0.lock().unwrap().clone()).unwrap();
        let line = output
            .lines()
            .find(|l| l.ends_with("contact c-3 accepted"))
            .expect("log line");
        assert!(line.contains(" - src/logging.rs:"));
    }
}
