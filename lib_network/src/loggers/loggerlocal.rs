//! # Local Logger
//!
//! `LoggerLocal` is the logging collaborator used by the network and imaging
//! layers. Callers pass an explicit category tag instead of relying on
//! call-site capture; the logger's own category is used when none is given.
//!
//! Every accepted message is forwarded to `tracing` (split into chunks when it
//! exceeds the configured truncation length), optionally echoed to the TTY in
//! color, and optionally appended to a log file. A disabled or filtered logger
//! simply returns `None`; nothing else in the crate depends on its output.

use chrono::Local;
use colored::*;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// Severity of a log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogLevel {
    /// A failed operation.
    Error,
    /// Something unusual that did not stop the operation.
    Warning,
    /// Normal progress.
    Info,
    /// Detail useful only while diagnosing.
    Debug,
}

impl LogLevel {
    /// Fixed-width label written to the TTY and log file.
    pub fn label(self) -> &'static str {
        match self {
            LogLevel::Error => "ERROR",
            LogLevel::Warning => "WARN ",
            LogLevel::Info => "INFO ",
            LogLevel::Debug => "DEBUG",
        }
    }
}

/// # Logger Local Options
///
/// Controls truncation, filtering and the extra outputs of a `LoggerLocal`.
#[derive(Debug, Clone)]
pub struct LoggerLocalOptions {
    /// Maximum length of one emitted chunk, separator included.
    pub truncation_length: usize,
    /// Marker placed where a long message was split.
    pub separator: String,
    /// Echo every accepted line to stdout with level colors.
    pub use_tty: bool,
    /// Append every accepted line to this file.
    pub log_file: Option<PathBuf>,
    /// When set, only categories containing one of these fragments are logged.
    pub include: Option<Vec<String>>,
    /// Categories containing one of these fragments are never logged.
    pub exclude: Option<Vec<String>>,
}

impl Default for LoggerLocalOptions {
    fn default() -> Self {
        Self {
            truncation_length: 1023,
            separator: "[...]".to_string(),
            use_tty: false,
            log_file: None,
            include: None,
            exclude: None,
        }
    }
}

/// Leveled, category-tagged logger.
#[derive(Debug)]
pub struct LoggerLocal {
    /// Category used when a call does not supply its own tag.
    category: String,
    /// Output and filtering configuration.
    options: LoggerLocalOptions,
    /// Global on/off switch.
    enabled: AtomicBool,
    /// Serializes appends so concurrent lines do not interleave.
    file_mutex: Mutex<()>,
}

impl LoggerLocal {
    /// Creates a logger for `category`. `None` options means tracing-only
    /// output with the default truncation settings.
    pub fn new(category: &str, options: Option<LoggerLocalOptions>) -> Self {
        Self {
            category: category.to_string(),
            options: options.unwrap_or_default(),
            enabled: AtomicBool::new(true),
            file_mutex: Mutex::new(()),
        }
    }

    /// A logger that accepts nothing. Stands in where no logger was supplied.
    pub fn disabled() -> Self {
        let logger = Self::new("disabled", None);
        logger.set_enabled(false);
        logger
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    /// Logs `message` at `level`.
    ///
    /// # Returns
    /// The formatted line, or `None` when the logger is disabled or the
    /// category is filtered out.
    pub fn log(&self, level: LogLevel, message: &str, category: Option<&str>) -> Option<String> {
        if !self.is_enabled() {
            return None;
        }
        let category = category.unwrap_or(&self.category);
        if !self.accepts(category) {
            return None;
        }

        let chunk_length = self
            .options
            .truncation_length
            .saturating_sub(self.options.separator.chars().count());
        for chunk in split_message(message, chunk_length, &self.options.separator) {
            match level {
                LogLevel::Error => tracing::error!(category = %category, "{}", chunk),
                LogLevel::Warning => tracing::warn!(category = %category, "{}", chunk),
                LogLevel::Info => tracing::info!(category = %category, "{}", chunk),
                LogLevel::Debug => tracing::debug!(category = %category, "{}", chunk),
            }
        }

        let ts = Local::now().format("%d/%m/%Y %H:%M").to_string();
        let line = format!("{} {} [{}] {}", ts, level.label(), category, message);

        if self.options.use_tty {
            let colored_level = match level {
                LogLevel::Error => level.label().bright_red(),
                LogLevel::Warning => level.label().bright_yellow(),
                LogLevel::Info => level.label().bright_green(),
                LogLevel::Debug => level.label().bright_cyan(),
            };
            println!(
                "{} {} {} {}",
                ts.truecolor(128, 128, 128),
                colored_level,
                format!("[{}]", category).truecolor(128, 128, 128),
                message
            );
        }

        if let Some(path) = &self.options.log_file {
            let _guard = self.file_mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            let written = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .and_then(|mut file| writeln!(file, "{}", line));
            if let Err(e) = written {
                eprintln!("Error writing log file {}: {}", path.display(), e);
            }
        }

        Some(line)
    }

    pub fn error(&self, message: &str, category: Option<&str>) -> Option<String> {
        self.log(LogLevel::Error, message, category)
    }

    pub fn warning(&self, message: &str, category: Option<&str>) -> Option<String> {
        self.log(LogLevel::Warning, message, category)
    }

    pub fn info(&self, message: &str, category: Option<&str>) -> Option<String> {
        self.log(LogLevel::Info, message, category)
    }

    pub fn debug(&self, message: &str, category: Option<&str>) -> Option<String> {
        self.log(LogLevel::Debug, message, category)
    }

    fn accepts(&self, category: &str) -> bool {
        let excluded = self
            .options
            .exclude
            .as_ref()
            .is_some_and(|fragments| fragments.iter().any(|f| category.contains(f.as_str())));
        let included = self
            .options
            .include
            .as_ref()
            .map_or(true, |fragments| fragments.iter().any(|f| category.contains(f.as_str())));
        included && !excluded
    }
}

/// Splits `message` into chunks of at most `length` characters. When more
/// than one chunk results, `separator` trails the first chunk, leads the last
/// one and wraps every chunk in between.
pub fn split_message(message: &str, length: usize, separator: &str) -> Vec<String> {
    if length == 0 || message.is_empty() {
        return vec![message.to_string()];
    }

    let chars: Vec<char> = message.chars().collect();
    let mut chunks: Vec<String> = chars.chunks(length).map(|c| c.iter().collect()).collect();
    if chunks.len() < 2 || separator.is_empty() {
        return chunks;
    }

    let last = chunks.len() - 1;
    for (index, chunk) in chunks.iter_mut().enumerate() {
        if index > 0 {
            chunk.insert_str(0, separator);
        }
        if index < last {
            chunk.push_str(separator);
        }
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_message_is_a_single_chunk() {
        assert_eq!(split_message("hello", 10, "[...]"), vec!["hello"]);
    }

    #[test]
    fn long_message_gets_separators_between_chunks() {
        let chunks = split_message("aaabbbccc", 3, "~");
        assert_eq!(chunks, vec!["aaa~", "~bbb~", "~ccc"]);
    }

    #[test]
    fn two_chunks_have_no_middle() {
        let chunks = split_message("abcd", 2, "|");
        assert_eq!(chunks, vec!["ab|", "|cd"]);
    }

    #[test]
    fn disabled_logger_returns_nothing() {
        let logger = LoggerLocal::disabled();
        assert!(logger.error("boom", None).is_none());
    }

    #[test]
    fn category_override_appears_in_line() {
        let logger = LoggerLocal::new("Network", None);
        let line = logger.info("fetched", Some("Images")).unwrap();
        assert!(line.contains("[Images] fetched"));
        assert!(line.contains("INFO"));
    }

    #[test]
    fn exclude_and_include_filters_apply_to_categories() {
        let options = LoggerLocalOptions {
            include: Some(vec!["Net".to_string()]),
            exclude: Some(vec!["Noisy".to_string()]),
            ..LoggerLocalOptions::default()
        };
        let logger = LoggerLocal::new("Network", Some(options));
        assert!(logger.debug("kept", None).is_some());
        assert!(logger.debug("dropped", Some("Images")).is_none());
        assert!(logger.debug("dropped", Some("NetNoisy")).is_none());
    }

    #[test]
    fn lines_are_appended_to_the_log_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.txt");
        let options = LoggerLocalOptions {
            log_file: Some(path.clone()),
            ..LoggerLocalOptions::default()
        };
        let logger = LoggerLocal::new("Network", Some(options));
        logger.warning("first", None);
        logger.error("second", None);

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("[Network] first"));
        assert!(lines[1].contains("ERROR"));
    }
}
