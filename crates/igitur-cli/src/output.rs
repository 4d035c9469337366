use igitur_core::domain::report::SyncReport;

/// Output format selector
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutputFormat {
    Human,
    Json,
}

/// Trait for formatting CLI output
pub trait OutputFormatter {
    fn success(&self, message: &str);
    fn error(&self, message: &str);
    fn warn(&self, message: &str);
    fn info(&self, message: &str);
    fn print_json(&self, value: &serde_json::Value);
}

/// Human-readable output formatter with checkmarks and indentation
pub struct HumanFormatter {
    quiet: bool,
}

impl OutputFormatter for HumanFormatter {
    fn success(&self, message: &str) {
        println!("\u{2713} {}", message);
    }
    fn error(&self, message: &str) {
        eprintln!("\u{2717} Error: {}", message);
    }
    fn warn(&self, message: &str) {
        eprintln!("\u{26a0} Warning: {}", message);
    }
    fn info(&self, message: &str) {
        if !self.quiet {
            println!("  {}", message);
        }
    }
    fn print_json(&self, _value: &serde_json::Value) {
        // Human formatter doesn't print JSON
    }
}

/// JSON output formatter
pub struct JsonFormatter;

impl OutputFormatter for JsonFormatter {
    fn success(&self, message: &str) {
        println!(
            "{}",
            serde_json::json!({"success": true, "message": message})
        );
    }
    fn error(&self, message: &str) {
        eprintln!(
            "{}",
            serde_json::json!({"success": false, "error": message})
        );
    }
    fn warn(&self, message: &str) {
        eprintln!(
            "{}",
            serde_json::json!({"level": "warning", "message": message})
        );
    }
    fn info(&self, _message: &str) {}
    fn print_json(&self, value: &serde_json::Value) {
        println!(
            "{}",
            serde_json::to_string_pretty(value).unwrap_or_default()
        );
    }
}

pub fn get_formatter(format: OutputFormat, quiet: bool) -> Box<dyn OutputFormatter> {
    match format {
        OutputFormat::Json => Box::new(JsonFormatter),
        OutputFormat::Human => Box::new(HumanFormatter { quiet }),
    }
}

fn plural(n: u32) -> &'static str {
    if n == 1 {
        ""
    } else {
        "s"
    }
}

fn format_duration(ms: u64) -> String {
    if ms >= 1000 {
        format!("{:.1}s", ms as f64 / 1000.0)
    } else {
        format!("{}ms", ms)
    }
}

/// JSON form of a report
pub fn report_json(report: &SyncReport) -> serde_json::Value {
    serde_json::json!({
        "status": report.status().to_string(),
        "transferred": report.transferred,
        "skipped": report.skipped,
        "excluded": report.excluded,
        "failed": report.failed,
        "folders_created": report.folders_created,
        "failures": report.failures,
        "duration_ms": report.duration_ms,
    })
}

/// Prints the summary line and every failure of a human-format report
pub fn print_report(fmt: &dyn OutputFormatter, label: &str, report: &SyncReport) {
    if report.transferred == 0 && report.failed == 0 {
        fmt.success(&format!("{label}: already up to date"));
    } else {
        fmt.success(&format!(
            "{label} finished in {}",
            format_duration(report.duration_ms)
        ));
    }
    fmt.info(&report.summary());
    if report.folders_created > 0 {
        fmt.info(&format!(
            "{} folder{} created",
            report.folders_created,
            plural(report.folders_created)
        ));
    }

    for failure in &report.failures {
        fmt.warn(&failure.to_string());
    }
}
