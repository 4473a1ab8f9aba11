use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::{Path, PathBuf};

use tracing::debug;
use zip::ZipArchive;

use crate::error::{Error, Result};

/// Conventional name of the main document inside a KMZ archive.
const MAIN_ENTRY: &str = "doc.kml";

/// Reads the KML payload from a KMZ archive on disk.
pub struct KmzHandler {
    path: PathBuf,
}

impl KmzHandler {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn read_kml(&self) -> Result<Vec<u8>> {
        let file = File::open(&self.path)?;
        read_kml(BufReader::new(file))
    }
}

/// True for paths with a `.kmz` extension.
pub fn is_kmz(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("kmz"))
}

/// Extracts the main KML document from a KMZ archive.
///
/// `doc.kml` at the archive root wins; otherwise the first `.kml` entry in
/// archive order is used.
pub fn read_kml<R: Read + Seek>(reader: R) -> Result<Vec<u8>> {
    let mut archive = ZipArchive::new(reader)?;

    let mut candidate = None;
    for i in 0..archive.len() {
        let entry = archive.by_index(i)?;
        if !entry.is_file() {
            continue;
        }
        let name = entry.name();
        if name == MAIN_ENTRY {
            candidate = Some(i);
            break;
        }
        if candidate.is_none() && name.to_ascii_lowercase().ends_with(".kml") {
            candidate = Some(i);
        }
    }

    let index = candidate.ok_or(Error::NoKmlInArchive)?;
    let mut entry = archive.by_index(index)?;
    debug!("Reading {} from KMZ archive", entry.name());

    let mut buf = Vec::new();
    entry.read_to_end(&mut buf)?;
    Ok(buf)
}
