use std::error::Error;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};

use bio::io::fasta;
use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::clip::Primer;

fn maybe_gz<R: BufRead + 'static>(mut br: R) -> Result<Box<dyn Read>, Box<dyn Error>> {
    // gzip is detected from the magic bytes, not the file name
    let buf = br.fill_buf()?;
    let is_gz = buf.len() >= 2 && buf[0] == 0x1f && buf[1] == 0x8b;
    if is_gz {
        Ok(Box::new(MultiGzDecoder::new(br)))
    } else {
        Ok(Box::new(br))
    }
}

pub fn open_input(path: &str) -> Result<Box<dyn Read>, Box<dyn Error>> {
    if path == "-" {
        maybe_gz(BufReader::new(io::stdin()))
    } else {
        maybe_gz(BufReader::new(File::open(path)?))
    }
}

/// Create the output file; `.gz` and `.zst` extensions select the compression.
pub fn open_output(path: &str) -> Result<Box<dyn Write>, Box<dyn Error>> {
    let bw = BufWriter::new(File::create(path)?);
    if path.ends_with(".gz") {
        Ok(Box::new(GzEncoder::new(bw, Compression::default())))
    } else if path.ends_with(".zst") {
        Ok(Box::new(zstd::stream::write::Encoder::new(bw, 0)?.auto_finish()))
    } else {
        Ok(Box::new(bw))
    }
}

/// Load primers from a FASTA file, preserving file order and uppercasing the
/// sequences. A primer-less file aborts the run.
pub fn read_primers(path: &str) -> Result<Vec<Primer>, Box<dyn Error>> {
    let reader = fasta::Reader::new(BufReader::new(File::open(path)?));
    let mut primers = Vec::new();
    for result in reader.records() {
        let rec = result?;
        if rec.seq().is_empty() {
            return Err(format!("primer \"{}\" has an empty sequence", rec.id()).into());
        }
        primers.push(Primer {
            id: rec.id().to_string(),
            seq: rec.seq().to_ascii_uppercase(),
        });
    }
    if primers.is_empty() {
        return Err(format!("no primers found in \"{}\"", path).into());
    }
    Ok(primers)
}
