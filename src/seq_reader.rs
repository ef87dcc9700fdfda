// Sequence-line file reader.
//
// One sequence per line, A/T/G/C only, up to 32 symbols. A short line is a
// shorter sequence and an empty line is a length-0 sequence, not an error.
// Files ending in .gz are decompressed transparently.

use crate::codec::PackedSequence;
use crate::error::Result;
use flate2::read::GzDecoder;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

/// Read every sequence line in a file into packed form.
///
/// Fails on the first line with an invalid symbol or over-capacity length;
/// the offending line number is logged for the caller.
pub fn read_sequences(path: &Path) -> Result<Vec<PackedSequence>> {
    let file = File::open(path)?;

    // Detect gzip by file extension
    let reader: Box<dyn Read> = if path.to_string_lossy().ends_with(".gz") {
        Box::new(GzDecoder::new(file))
    } else {
        Box::new(file)
    };
    let reader = BufReader::new(reader);

    let mut seqs = Vec::new();
    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        // Tolerate CRLF line endings
        let text = line.strip_suffix('\r').unwrap_or(&line);
        match PackedSequence::pack(text.as_bytes()) {
            Ok(seq) => seqs.push(seq),
            Err(e) => {
                log::error!("{}:{}: {e}", path.display(), line_no + 1);
                return Err(e);
            }
        }
    }

    log::debug!("read {} sequences from {}", seqs.len(), path.display());
    Ok(seqs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn reads_plain_sequence_lines() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "ACGT").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "TTGGCCAA").unwrap();
        file.flush().unwrap();

        let seqs = read_sequences(file.path()).unwrap();
        assert_eq!(seqs.len(), 3);
        assert_eq!(seqs[0].unpack(), "ACGT");
        assert!(seqs[1].is_empty());
        assert_eq!(seqs[2].unpack(), "TTGGCCAA");
    }

    #[test]
    fn reads_gzipped_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seqs.txt.gz");
        let file = File::create(&path).unwrap();
        let mut gz = flate2::write::GzEncoder::new(file, flate2::Compression::default());
        gz.write_all(b"ACGT\nGGCC\n").unwrap();
        gz.finish().unwrap();

        let seqs = read_sequences(&path).unwrap();
        assert_eq!(seqs.len(), 2);
        assert_eq!(seqs[1].unpack(), "GGCC");
    }

    #[test]
    fn rejects_bad_lines() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "ACGT").unwrap();
        writeln!(file, "ACGX").unwrap();
        file.flush().unwrap();

        assert!(read_sequences(file.path()).is_err());
    }
}
