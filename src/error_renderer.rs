//! Error rendering using ariadne
//!
//! Diagnostics carry a byte span and a line. Trees built without spans
//! (span `0..0`) are rendered against the whole source line instead.

use crate::{Diagnostic, Error, Severity};
use ariadne::{ColorGenerator, Label, Report, ReportKind, Source};
use std::io::Write;
use std::ops::Range;

/// Render an error with formatting to stderr
///
/// # Example
/// ```no_run
/// use bumpalo::Bump;
/// use cinder::{AstBuilder, CompilationOptions, compile, render_error};
///
/// let arena = Bump::new();
/// let b = AstBuilder::new(&arena);
/// let program = b.program(&[b.ident("x")]);
///
/// if let Err(e) = compile(program, &CompilationOptions::default()).into_result() {
///     render_error(&e, "<main>", "x");
/// }
/// ```
pub fn render_error(error: &Error, source_name: &str, source: &str) {
    render_error_to_writer(error, source_name, source, &mut std::io::stderr(), true).ok();
}

/// Render an error to a specific writer
pub fn render_error_to(
    error: &Error,
    source_name: &str,
    source: &str,
    writer: &mut dyn Write,
) -> std::io::Result<()> {
    render_error_to_writer(error, source_name, source, writer, true)
}

/// Render an error to a String (useful for tools and web UIs)
pub fn render_error_to_string(error: &Error, source_name: &str, source: &str) -> String {
    let mut buf = Vec::new();
    render_error_to_writer(error, source_name, source, &mut buf, true).ok();
    String::from_utf8_lossy(&buf).to_string()
}

/// Render an error to a String without color codes (useful for tests)
pub fn render_error_to_string_no_color(error: &Error, source_name: &str, source: &str) -> String {
    let mut buf = Vec::new();
    render_error_to_writer(error, source_name, source, &mut buf, false).ok();
    String::from_utf8_lossy(&buf).to_string()
}

fn render_error_to_writer(
    error: &Error,
    source_name: &str,
    source: &str,
    writer: &mut dyn Write,
    use_color: bool,
) -> std::io::Result<()> {
    match error {
        Error::Compilation { diagnostics } => {
            render_diagnostics(source_name, source, diagnostics, writer, use_color)
        }
        Error::Decode(err) => writeln!(writer, "Invalid bytecode: {}", err),
        Error::Serialization(err) => writeln!(writer, "Serialization error: {}", err),
    }
}

fn render_diagnostics(
    source_name: &str,
    source: &str,
    diagnostics: &[Diagnostic],
    writer: &mut dyn Write,
    use_color: bool,
) -> std::io::Result<()> {
    for diag in diagnostics {
        let mut colors = ColorGenerator::new();
        colors.next(); // Skip the first color.

        let kind = match diag.severity {
            Severity::Error => ReportKind::Error,
            Severity::Warning => ReportKind::Warning,
        };
        let span = label_span(source, diag);

        let mut report = Report::build(kind, (source_name, span.clone()))
            .with_message(&diag.message)
            .with_config(ariadne::Config::default().with_color(use_color));

        if let Some(code) = &diag.code {
            report = report.with_code(code);
        }

        let color = colors.next();
        report = report.with_label(
            Label::new((source_name, span))
                .with_message(&diag.message)
                .with_color(color),
        );

        if let Some(help) = &diag.help {
            report = report.with_help(help);
        }

        report
            .finish()
            .write((source_name, Source::from(source)), &mut *writer)?;
    }

    Ok(())
}

/// The diagnostic's span, or its line when the span is empty.
fn label_span(source: &str, diag: &Diagnostic) -> Range<usize> {
    if !diag.span.0.is_empty() && diag.span.0.end <= source.len() {
        return diag.span.0.clone();
    }
    line_range(source, diag.line).unwrap_or(0..source.len())
}

/// Byte range of the 1-based `line`, without its terminator.
fn line_range(source: &str, line: u32) -> Option<Range<usize>> {
    let index = (line as usize).checked_sub(1)?;
    let mut start = 0;
    for (i, text) in source.split('\n').enumerate() {
        let end = start + text.len();
        if i == index {
            return Some(start..end);
        }
        start = end + 1;
    }
    None
}
