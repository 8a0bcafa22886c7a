//! Delimited text reader with encoding and delimiter auto-detection.
//!
//! Field teams export from whatever tool they have at hand, so CSV uploads
//! arrive as UTF-8, Latin-1 or Windows-1252 with `,` `;` `TAB` or `|`
//! separators. The content is decoded first, then handed to the `csv` crate.

use encoding_rs::{Encoding, UTF_8, WINDOWS_1252};

use crate::error::WorkbookResult;
use crate::models::Cell;

use super::Worksheet;

/// Pick a decoder for raw bytes. Valid UTF-8 always wins; otherwise the
/// chardet guess is used, falling back to Windows-1252.
pub fn detect_encoding(bytes: &[u8]) -> &'static Encoding {
    if std::str::from_utf8(bytes).is_ok() {
        return UTF_8;
    }
    let (charset, _confidence, _language) = chardet::detect(bytes);
    Encoding::for_label(chardet::charset2encoding(&charset).as_bytes())
        .filter(|encoding| *encoding != UTF_8)
        .unwrap_or(WINDOWS_1252)
}

/// Decode to text. A byte order mark overrides `encoding` and is dropped.
pub fn decode_content(bytes: &[u8], encoding: &'static Encoding) -> String {
    let (text, _, _) = encoding.decode(bytes);
    text.into_owned()
}

const DELIMITERS: [u8; 4] = [b',', b';', b'\t', b'|'];

/// Most frequent delimiter on the header line; `,` on a tie or when none
/// occurs.
pub fn detect_delimiter(content: &str) -> u8 {
    let header = content.lines().next().unwrap_or_default();
    DELIMITERS
        .iter()
        .map(|&sep| (sep, header.bytes().filter(|b| *b == sep).count()))
        .fold((b',', 0), |best, candidate| if candidate.1 > best.1 { candidate } else { best })
        .0
}

/// Read CSV bytes into a single worksheet named `name`.
///
/// Empty input is not an error: it yields a worksheet with no headers, which
/// the validation media phase reports as an empty file.
pub fn read_csv(name: &str, bytes: &[u8]) -> WorkbookResult<Worksheet> {
    let content = decode_content(bytes, detect_encoding(bytes));
    let delimiter = detect_delimiter(&content);
    read_csv_str(name, &content, delimiter)
}

/// Parse already-decoded CSV text with an explicit delimiter.
pub fn read_csv_str(name: &str, content: &str, delimiter: u8) -> WorkbookResult<Worksheet> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(|value| Cell::text(value.trim())).collect());
    }

    Ok(Worksheet::new(name, headers, rows))
}
