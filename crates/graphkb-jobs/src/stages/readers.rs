//! Text readers for the formats ingestion accepts.
//!
//! Plain text is decoded in-process. PDF goes through `pdftotext`
//! (poppler-utils) and DOCX through `pandoc`; every converter call is
//! bounded by the context's converter timeout and killed when it expires.

use std::fmt;
use std::path::Path;
use std::time::Duration;

use tokio::process::Command;
use tracing::debug;

use graphkb_core::{Error, Result};

/// How a supported file is turned into text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    PlainText,
    Pdf,
    Docx,
}

impl DocumentFormat {
    /// Format for `path` by extension (case-insensitive).
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        match ext.as_str() {
            "txt" | "md" | "markdown" => Some(Self::PlainText),
            "pdf" => Some(Self::Pdf),
            "docx" => Some(Self::Docx),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::PlainText => "text",
            Self::Pdf => "pdf",
            Self::Docx => "docx",
        }
    }

    /// External program the format depends on, if any.
    pub fn converter(self) -> Option<&'static str> {
        match self {
            Self::PlainText => None,
            Self::Pdf => Some("pdftotext"),
            Self::Docx => Some("pandoc"),
        }
    }
}

impl fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decode text bytes: UTF-8 and UTF-16 with a BOM, BOM-less UTF-8, and
/// Latin-1 for anything that isn't valid UTF-8.
pub fn decode_text(bytes: &[u8]) -> String {
    if let Some(rest) = bytes.strip_prefix(b"\xEF\xBB\xBF") {
        return String::from_utf8_lossy(rest).into_owned();
    }
    if let Some(rest) = bytes.strip_prefix(b"\xFF\xFE") {
        return decode_utf16(rest, u16::from_le_bytes);
    }
    if let Some(rest) = bytes.strip_prefix(b"\xFE\xFF") {
        return decode_utf16(rest, u16::from_be_bytes);
    }
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    }
}

fn decode_utf16(bytes: &[u8], unit: fn([u8; 2]) -> u16) -> String {
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| unit([pair[0], pair[1]]))
        .collect();
    String::from_utf16_lossy(&units)
}

/// Run a converter, returning its stdout.
async fn run_converter(cmd: &mut Command, timeout: Duration) -> Result<String> {
    let program = cmd.as_std().get_program().to_string_lossy().into_owned();
    cmd.kill_on_drop(true);

    let output = tokio::time::timeout(timeout, cmd.output())
        .await
        .map_err(|_| {
            Error::Internal(format!(
                "{} timed out after {}s",
                program,
                timeout.as_secs_f32()
            ))
        })?
        .map_err(|e| Error::Internal(format!("Failed to execute {}: {}", program, e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::Internal(format!(
            "{} failed ({}): {}",
            program,
            output.status,
            stderr.trim()
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Text content of a file whose raw `bytes` were already read from `path`.
pub async fn extract_text(
    path: &Path,
    bytes: &[u8],
    format: DocumentFormat,
    timeout: Duration,
) -> Result<String> {
    match format {
        DocumentFormat::PlainText => Ok(decode_text(bytes)),
        DocumentFormat::Pdf => {
            if !bytes.starts_with(b"%PDF") {
                return Err(Error::Validation(format!(
                    "{} is not a valid PDF (missing %PDF header)",
                    path.display()
                )));
            }
            debug!(path = %path.display(), "Extracting PDF text");
            run_converter(
                Command::new("pdftotext")
                    .arg("-enc")
                    .arg("UTF-8")
                    .arg(path)
                    .arg("-"),
                timeout,
            )
            .await
        }
        DocumentFormat::Docx => {
            if !bytes.starts_with(b"PK\x03\x04") {
                return Err(Error::Validation(format!(
                    "{} is not a valid DOCX (missing zip header)",
                    path.display()
                )));
            }
            debug!(path = %path.display(), "Converting DOCX with pandoc");
            run_converter(
                Command::new("pandoc")
                    .arg("-f")
                    .arg("docx")
                    .arg("-t")
                    .arg("plain")
                    .arg("--wrap=none")
                    .arg(path),
                timeout,
            )
            .await
        }
    }
}

/// Whether the converter for `format` is installed.
pub async fn converter_available(format: DocumentFormat) -> bool {
    let Some(program) = format.converter() else {
        return true;
    };
    let flag = if program == "pdftotext" { "-v" } else { "--version" };
    match Command::new(program).arg(flag).output().await {
        // pdftotext -v exits with 0 or 99 depending on the poppler version.
        Ok(output) => output.status.success() || output.status.code() == Some(99),
        Err(_) => false,
    }
}
