//! Streaming renderer that never fails because of input size.
//!
//! The source is read `chunk_size` bytes at a time. Each chunk is decoded,
//! stripped of markup and laid out in a monospace font starting on a fresh
//! page, so memory use is bounded by the chunk size plus the encoded pages.

use crate::error::{ConvertError, Result};
use crate::pdf::{Align, Font, PdfBuilder, TextLine};
use crate::source::SourceInfo;
use crate::text::{MarkupStripper, Utf8Decoder};
use hobart_data::CancelFlag;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Default chunk size (1 MiB).
pub const DEFAULT_CHUNK_SIZE: usize = 1024 * 1024;

/// Render `source` to `target` in chunks of `chunk_size` bytes.
pub fn render_chunked(
    source: &SourceInfo,
    target: &Path,
    chunk_size: usize,
    abort: &CancelFlag,
) -> Result<PathBuf> {
    if chunk_size == 0 {
        return Err(ConvertError::InvalidConfig(
            "chunk size must be positive".to_string(),
        ));
    }

    let mut file = File::open(&source.path)?;
    let mut decoder = Utf8Decoder::new();
    let mut stripper = MarkupStripper::with_markup(source.kind.has_markup());
    let mut builder = PdfBuilder::new();
    let mut buf = vec![0u8; chunk_size];
    let mut carry = String::new();
    let mut chunks = 0usize;

    builder.push_line(
        &TextLine::new(source.display_name(), Font::Bold, 12).aligned(Align::Center),
    )?;
    builder.space(12)?;

    loop {
        if abort.is_cancelled() {
            return Err(ConvertError::Render("attempt abandoned".to_string()));
        }
        let n = read_full(&mut file, &mut buf)?;
        let eof = n == 0;

        let mut text = std::mem::take(&mut carry);
        if eof {
            let tail = decoder.finish();
            stripper.feed(&tail, &mut text);
            stripper.finish(&mut text);
        } else {
            let decoded = decoder.push(&buf[..n]);
            stripper.feed(&decoded, &mut text);
            // Keep the unfinished last line for the next chunk.
            if let Some(pos) = text.rfind('\n') {
                carry = text.split_off(pos + 1);
            }
        }

        for line in text.lines() {
            builder.push_line(&TextLine::mono(line))?;
        }
        builder.page_break()?;
        chunks += 1;
        debug!(path = %source.path.display(), chunk = chunks, pages = builder.page_count(), "rendered chunk");

        if eof {
            break;
        }
    }

    debug!(path = %source.path.display(), chunks, pages = builder.page_count(), "chunked render finished");
    builder.save_unless_aborted(target, abort)
}

/// Fill `buf` as far as the reader allows; returns the number of bytes read.
fn read_full(reader: &mut impl Read, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
