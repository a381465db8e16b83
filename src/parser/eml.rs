//! Loading individual `.eml` files (RFC 5322 messages without MBOX framing).

use std::io::Read;
use std::path::Path;

use tracing::debug;

use crate::error::{Error, Result};
use crate::model::document::EmailDocument;

/// Read the raw bytes of an email. The path `-` reads standard input.
pub fn read_eml(path: impl AsRef<Path>) -> Result<Vec<u8>> {
    let path = path.as_ref();
    let data = read_input(path)?;
    debug!(
        path = %path.display(),
        size = %humansize::format_size(data.len(), humansize::BINARY),
        "Read email"
    );
    Ok(data)
}

/// Read a whole input file, or standard input for `-`.
pub fn read_input(path: impl AsRef<Path>) -> Result<Vec<u8>> {
    let path = path.as_ref();

    if path == Path::new("-") {
        let mut data = Vec::new();
        std::io::stdin()
            .read_to_end(&mut data)
            .map_err(|e| Error::io(path, e))?;
        return Ok(data);
    }

    std::fs::read(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::FileNotFound(path.to_path_buf())
        } else {
            Error::io(path, e)
        }
    })
}

/// Read and parse a single `.eml` file.
pub fn parse_eml(path: impl AsRef<Path>) -> Result<EmailDocument> {
    EmailDocument::parse(read_eml(path)?)
}
