//! Tracing subscriber setup and the custom line formats.

use tracing_subscriber::EnvFilter;

/// Environment variable overriding the diagnostic log filter.
pub const LOG_ENV: &str = "JUNOS_FACTS_LOG";
pub const DEFAULT_FILTER: &str = "warn";

// Custom time formatter for logs: "YYYY-MM-DD HH:MM:SS" (local time)
pub struct LocalTimeFormatter;

impl tracing_subscriber::fmt::time::FormatTime for LocalTimeFormatter {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", chrono::Local::now().format("%Y-%m-%d %H:%M:%S"))
    }
}

// Diagnostic line: "YYYY-MM-DD HH:MM:SS [LEVEL] message"
pub struct CustomEventFormat;

impl<S, N> tracing_subscriber::fmt::FormatEvent<S, N> for CustomEventFormat
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
    N: for<'a> tracing_subscriber::fmt::FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &tracing_subscriber::fmt::FmtContext<'_, S, N>,
        mut writer: tracing_subscriber::fmt::format::Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> std::fmt::Result {
        use tracing_subscriber::fmt::time::FormatTime;

        LocalTimeFormatter.format_time(&mut writer)?;
        write!(writer, " ")?;

        // Color only when stderr is a terminal
        let level = event.metadata().level();
        if writer.has_ansi_escapes() {
            let level_color = match *level {
                tracing::Level::TRACE => "\x1b[2m",  // Dim/gray
                tracing::Level::DEBUG => "\x1b[34m", // Blue
                tracing::Level::INFO => "\x1b[32m",  // Green
                tracing::Level::WARN => "\x1b[33m",  // Yellow
                tracing::Level::ERROR => "\x1b[31m", // Red
            };
            write!(writer, "{}[{}]\x1b[0m ", level_color, level)?;
        } else {
            write!(writer, "[{}] ", level)?;
        }

        ctx.field_format().format_fields(writer.by_ref(), event)?;

        writeln!(writer)
    }
}

/// Console event log line: "YYYY-MM-DD HH:MM:SS,mmm:<logger>:<message>".
/// The logger name is fixed per log so it is carried by the formatter.
pub struct EventLogFormat {
    pub logger: String,
}

impl<S, N> tracing_subscriber::fmt::FormatEvent<S, N> for EventLogFormat
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
    N: for<'a> tracing_subscriber::fmt::FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &tracing_subscriber::fmt::FmtContext<'_, S, N>,
        mut writer: tracing_subscriber::fmt::format::Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> std::fmt::Result {
        write!(
            writer,
            "{}:{}:",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S,%3f"),
            self.logger
        )?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// Resolve the diagnostic filter: explicit level, then the environment, then the default.
pub fn resolve_filter(level: Option<&str>) -> String {
    level
        .map(|l| l.trim().to_lowercase())
        .filter(|l| !l.is_empty())
        .or_else(|| std::env::var(LOG_ENV).ok().filter(|v| !v.trim().is_empty()))
        .unwrap_or_else(|| DEFAULT_FILTER.to_string())
}

/// Initialize the diagnostic subscriber. Writes to stderr; stdout carries the result.
pub fn init_tracing(filter: &str) {
    use std::io::IsTerminal;
    use tracing_subscriber::prelude::*;

    let env_filter = EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(std::io::stderr().is_terminal())
                .with_timer(LocalTimeFormatter)
                .with_target(false)
                .with_level(true)
                .fmt_fields(tracing_subscriber::fmt::format::DefaultFields::new())
                .event_format(CustomEventFormat),
        )
        .init();
}
