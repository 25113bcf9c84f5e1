use anyhow::{Context, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::fs;
use std::io::{self, Write};
use std::path::Path;

use crate::chat::ChatResponse;

/// Decodes the response's chart into `chart_out`. Returns whether a file was
/// written.
pub(crate) fn write_chart(response: &ChatResponse, chart_out: Option<&Path>) -> Result<bool> {
    let (Some(encoded), Some(path)) = (response.chart_base64.as_deref(), chart_out) else {
        return Ok(false);
    };

    let png = STANDARD
        .decode(encoded)
        .context("Failed to decode chart image")?;
    fs::write(path, png)
        .with_context(|| format!("Failed to write chart to {}", path.display()))?;
    Ok(true)
}

pub(crate) fn print_response(
    out: &mut impl Write,
    response: &ChatResponse,
    chart_out: Option<&Path>,
    chart_written: bool,
) -> io::Result<()> {
    writeln!(out, "{}", response.answer)?;
    if let Some(kind) = response.chart_type {
        match chart_out {
            Some(path) if chart_written => {
                writeln!(out, "[chart {kind} written to {}]", path.display())?
            }
            _ => writeln!(out, "[chart {kind} produced; pass --chart-out FILE to save it]")?,
        }
    }
    if let Some(error) = response.error {
        writeln!(out, "[error: {}]", error.code())?;
    }
    Ok(())
}
