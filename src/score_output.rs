// Raw score output: one signed byte per (query, reference) pair in
// query-major order, no header or delimiters.

use crate::error::Result;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

pub fn write_scores(path: &Path, scores: &[i8]) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    for &score in scores {
        writer.write_all(&[score as u8])?;
    }
    writer.flush()?;
    log::debug!("wrote {} score bytes to {}", scores.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_raw_bytes_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scores.bin");
        write_scores(&path, &[0, 3, 32, 1]).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), vec![0u8, 3, 32, 1]);
    }
}
