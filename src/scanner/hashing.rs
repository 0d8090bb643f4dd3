use std::fs::File;
use std::io::{self, BufReader};
use std::path::Path;

use crate::error::Result;

/// Blake3 digest of the file's content, hex encoded.
///
/// The file is streamed so large files never sit in memory whole.
pub fn calculate_file_hash<P: AsRef<Path>>(file_path: P) -> Result<String> {
    let file = File::open(file_path.as_ref())?;
    let mut reader = BufReader::new(file);
    let mut hasher = blake3::Hasher::new();
    io::copy(&mut reader, &mut hasher)?;
    Ok(hasher.finalize().to_hex().to_string())
}
