//! External HTML to PDF program (`wkhtmltopdf` by default).

use crate::error::{ConvertError, Result};
use crate::html::{FilingHeader, main_document};
use crate::source::{SourceInfo, SourceKind, read_lossy};
use crate::text::Utf8Decoder;
use hobart_data::atomic::AtomicFile;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tempfile::NamedTempFile;
use tokio::process::Command;
use tracing::{debug, warn};

/// Default external program.
pub const DEFAULT_PROGRAM: &str = "wkhtmltopdf";

/// Default budget for the `--version` capability probe.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

const RENDER_ARGS: &[&str] = &[
    "--quiet",
    "--page-size",
    "A4",
    "--margin-top",
    "20mm",
    "--margin-right",
    "20mm",
    "--margin-bottom",
    "20mm",
    "--margin-left",
    "20mm",
    "--encoding",
    "UTF-8",
    "--print-media-type",
    "--disable-smart-shrinking",
    "--enable-local-file-access",
    "--load-error-handling",
    "ignore",
    "--load-media-error-handling",
    "ignore",
];

/// Runs an external renderer as a child process.
#[derive(Debug, Clone)]
pub struct ExternalRenderer {
    program: String,
    probe_timeout: Duration,
}

impl ExternalRenderer {
    /// Renderer invoking `program`.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }

    /// Set the capability probe budget.
    pub const fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    /// Program name or path.
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Whether the program is installed and answers `--version`.
    pub async fn probe(&self) -> bool {
        let status = Command::new(&self.program)
            .arg("--version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .status();

        match tokio::time::timeout(self.probe_timeout, status).await {
            Ok(Ok(status)) if status.success() => true,
            Ok(Ok(status)) => {
                debug!(program = %self.program, %status, "renderer probe failed");
                false
            }
            Ok(Err(e)) => {
                debug!(program = %self.program, error = %e, "renderer not found");
                false
            }
            Err(_) => {
                warn!(program = %self.program, "renderer probe timed out");
                false
            }
        }
    }

    /// Render `source` to `target`.
    ///
    /// The program writes to a temporary file next to `target`, which is
    /// renamed into place only if it holds a PDF.
    pub async fn render(&self, source: &SourceInfo, target: &Path) -> Result<PathBuf> {
        let info = source.clone();
        let input = tokio::task::spawn_blocking(move || prepare_input(&info)).await??;
        let input_path = input
            .as_ref()
            .map_or_else(|| source.path.clone(), |tmp| tmp.path().to_path_buf());

        let output = AtomicFile::create(target)?;
        debug!(program = %self.program, input = %input_path.display(), "running external renderer");

        let result = Command::new(&self.program)
            .args(RENDER_ARGS)
            .arg(&input_path)
            .arg(output.temp_path())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await?;
        drop(input);

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(ConvertError::Render(format!(
                "{} exited with {}: {}",
                self.program,
                result.status,
                stderr.lines().last().unwrap_or_default().trim()
            )));
        }
        if !is_pdf(output.temp_path())? {
            return Err(ConvertError::Render(format!(
                "{} produced no PDF output",
                self.program
            )));
        }
        Ok(output.commit()?)
    }
}

impl Default for ExternalRenderer {
    fn default() -> Self {
        Self::new(DEFAULT_PROGRAM)
    }
}

fn is_pdf(path: &Path) -> Result<bool> {
    let mut magic = [0u8; 5];
    let mut file = File::open(path)?;
    let read = file.read(&mut magic)?;
    Ok(read == magic.len() && &magic == b"%PDF-")
}

/// HTML input for the program, or `None` when the source can be used as is.
fn prepare_input(source: &SourceInfo) -> Result<Option<NamedTempFile>> {
    match source.kind {
        SourceKind::Html | SourceKind::InlineXbrl => Ok(None),
        SourceKind::Text => wrap_text(source).map(Some),
        SourceKind::Sgml => {
            let content = read_lossy(&source.path)?;
            let header = FilingHeader::from_sgml(&content);
            let main = main_document(&content, &header);
            let mut tmp = html_temp_file()?;
            if main.contains('<') {
                tmp.write_all(main.as_bytes())?;
            } else {
                write_pre_document(&mut tmp, &source.display_name(), main.as_bytes())?;
            }
            tmp.flush()?;
            Ok(Some(tmp))
        }
    }
}

fn html_temp_file() -> Result<NamedTempFile> {
    Ok(tempfile::Builder::new()
        .prefix("hobart-render-")
        .suffix(".html")
        .tempfile()?)
}

/// Stream a text source into a `<pre>` HTML document.
fn wrap_text(source: &SourceInfo) -> Result<NamedTempFile> {
    let mut tmp = html_temp_file()?;
    {
        let mut writer = BufWriter::new(tmp.as_file_mut());
        let reader = BufReader::new(File::open(&source.path)?);
        write_pre_document(&mut writer, &source.display_name(), reader)?;
        writer.flush()?;
    }
    Ok(tmp)
}

fn write_pre_document<W: Write, R: Read>(out: &mut W, title: &str, mut body: R) -> Result<()> {
    let mut escaped_title = String::new();
    escape_into(title, &mut escaped_title);
    write!(
        out,
        "<!DOCTYPE html>\n<html><head><meta charset=\"UTF-8\"><title>{escaped_title}</title>\
         <style>body {{ font-family: 'Courier New', monospace; font-size: 10px; }} \
         pre {{ white-space: pre-wrap; word-wrap: break-word; }}</style></head>\n<body><pre>"
    )?;

    let mut decoder = Utf8Decoder::new();
    let mut buf = vec![0u8; 64 * 1024];
    let mut escaped = String::new();
    loop {
        let n = body.read(&mut buf)?;
        let text = if n == 0 {
            decoder.finish()
        } else {
            decoder.push(&buf[..n])
        };
        escaped.clear();
        escape_into(&text, &mut escaped);
        out.write_all(escaped.as_bytes())?;
        if n == 0 {
            break;
        }
    }
    out.write_all(b"</pre></body></html>\n")?;
    Ok(())
}

fn escape_into(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            c => out.push(c),
        }
    }
}
