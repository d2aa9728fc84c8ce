/// Initialize tracing/logging for the application.
///
/// `level` selects the maximum level, `format` picks between human-readable
/// text output and JSON lines.
pub fn init(level: &str, format: &str) {
    let lvl = match level.to_lowercase().as_str() {
        "error" => tracing::Level::ERROR,
        "warn" | "warning" => tracing::Level::WARN,
        "debug" => tracing::Level::DEBUG,
        "trace" => tracing::Level::TRACE,
        _ => tracing::Level::INFO,
    };

    // Use try_init so tests and libraries can call this multiple times without panicking
    if format.eq_ignore_ascii_case("json") {
        let _ = tracing_subscriber::fmt()
            .json()
            .with_max_level(lvl)
            .with_target(false)
            .try_init();
    } else {
        let _ = tracing_subscriber::fmt()
            .with_max_level(lvl)
            .with_target(false)
            .try_init();
    }
}
