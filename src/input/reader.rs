//! Line-oriented URL reader.
//!
//! Input is one URL per line. Blank lines and `#` comments are ignored, and
//! lines that are not `http://` or `https://` URLs are skipped with a
//! warning.

use anyhow::{Context, Result};
use std::path::Path;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Boxed line source: a file or stdin.
pub type UrlSource = Box<dyn AsyncBufRead + Unpin + Send>;

/// Counters for one feeding pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeedStats {
    /// URLs handed to the aggregator.
    pub submitted: u64,
    /// Non-empty, non-comment lines that were not usable URLs.
    pub skipped: u64,
}

/// What a single input line contains.
#[derive(Debug, PartialEq, Eq)]
pub enum InputLine<'a> {
    /// A fetchable URL.
    Url(&'a str),
    /// Blank line or comment.
    Ignored,
    /// Something that is not an HTTP(S) URL.
    Invalid(&'a str),
}

/// Classify one line of input.
pub fn parse_line(line: &str) -> InputLine<'_> {
    let trimmed = line.trim();

    if trimmed.is_empty() || trimmed.starts_with('#') {
        return InputLine::Ignored;
    }

    let lower = trimmed.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        InputLine::Url(trimmed)
    } else {
        InputLine::Invalid(trimmed)
    }
}

/// Open `path` for reading, with `-` meaning stdin.
pub async fn open_source(path: &Path) -> Result<UrlSource> {
    if path == Path::new("-") {
        debug!("Reading URLs from stdin");
        return Ok(Box::new(BufReader::new(tokio::io::stdin())));
    }

    let file = tokio::fs::File::open(path)
        .await
        .with_context(|| format!("Failed to open URL list: {}", path.display()))?;
    debug!("Reading URLs from {}", path.display());
    Ok(Box::new(BufReader::new(file)))
}

/// Forward every URL from `source` into `urls`.
///
/// Stops at end of input, when `cancel` fires, or when the receiving side
/// has gone away. Lines that are not valid UTF-8 are counted as skipped.
/// Dropping `urls` on return closes the stream.
pub async fn feed_urls<R>(
    mut source: R,
    urls: mpsc::Sender<String>,
    cancel: CancellationToken,
) -> Result<FeedStats>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    let mut stats = FeedStats::default();
    let mut line_no = 0u64;

    loop {
        buf.clear();
        let read = tokio::select! {
            biased;

            _ = cancel.cancelled() => break,
            read = source.read_until(b'\n', &mut buf) => read.context("Failed to read URL list")?,
        };
        if read == 0 {
            break;
        }
        line_no += 1;

        let line = match std::str::from_utf8(&buf) {
            Ok(line) => line,
            Err(_) => {
                warn!("Line {}: skipping line that is not valid UTF-8", line_no);
                stats.skipped += 1;
                continue;
            }
        };

        match parse_line(line) {
            InputLine::Ignored => {}
            InputLine::Invalid(text) => {
                warn!("Line {}: skipping non-HTTP entry '{}'", line_no, text);
                stats.skipped += 1;
            }
            InputLine::Url(url) => {
                let sent = tokio::select! {
                    biased;

                    _ = cancel.cancelled() => break,
                    sent = urls.send(url.to_string()) => sent,
                };
                if sent.is_err() {
                    debug!("Aggregator stopped reading, ending input early");
                    break;
                }
                stats.submitted += 1;
            }
        }
    }

    debug!(
        "Input finished: {} submitted, {} skipped",
        stats.submitted, stats.skipped
    );
    Ok(stats)
}
