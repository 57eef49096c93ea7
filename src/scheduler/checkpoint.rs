//! Gzip-compressed JSON snapshots of a halted run.

use std::fs::File;
use std::io::{self, ErrorKind};
use std::path::Path;

use chrono::Local;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use serde::{Deserialize, Serialize};

use crate::polycube::Pos;

/// Everything needed to pick a halted run back up: the target size, the
/// split depth, the counts gathered so far, and the jobs that were
/// never evaluated (each as its list of packed cube positions).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub n: usize,
    pub spawn_n: usize,
    pub counts: Vec<u64>,
    pub total_elapsed_sec: f64,
    pub unevaluated_polycubes: Vec<Vec<Pos>>,
}

impl Checkpoint {
    pub fn read(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = File::open(path)?;
        let checkpoint: Checkpoint = serde_json::from_reader(GzDecoder::new(file))
            .map_err(|e| io::Error::new(ErrorKind::InvalidData, e))?;

        if checkpoint.counts.len() != checkpoint.n + 1 {
            return Err(io::Error::new(
                ErrorKind::InvalidData,
                "checkpoint counts length does not match its n",
            ));
        }

        Ok(checkpoint)
    }

    pub fn write(&self, path: impl AsRef<Path>) -> io::Result<()> {
        let file = File::create(path)?;
        let mut writer = GzEncoder::new(file, flate2::Compression::default());
        serde_json::to_writer(&mut writer, self)
            .map_err(|e| io::Error::new(ErrorKind::Other, e))?;
        writer.finish()?;
        Ok(())
    }

    /// `halt-n<N>-<YYYYMMDDTHHMMSS>.json.gz`
    pub fn file_name(&self) -> String {
        format!(
            "halt-n{}-{}.json.gz",
            self.n,
            Local::now().format("%Y%m%dT%H%M%S")
        )
    }
}
