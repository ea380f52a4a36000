//! Raw volume files.
//!
//! A volume is two files:
//! - `<stem><ext>`: element values in traversal order, little-endian,
//!   no padding;
//! - `<stem><ext>.json`: header sidecar `{"shape": [..], "dtype": "f32"}`.
//!
//! Reading and writing are forward-only streams: each position is touched
//! exactly once, in order, and a request for any other position is an error.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use vx_core::{Error, Grid, ImageSource, OutputVolume, Position, Result};

use crate::volume::Volume;

/// Element type of a raw volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    /// 32-bit float.
    #[default]
    F32,
    /// 64-bit float.
    F64,
}

impl DataType {
    /// Bytes per element.
    pub fn size(self) -> usize {
        match self {
            DataType::F32 => 4,
            DataType::F64 => 8,
        }
    }
}

/// Header sidecar of a raw volume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeHeader {
    /// Per-axis extents.
    pub shape: Vec<usize>,
    /// Element type.
    pub dtype: DataType,
}

impl VolumeHeader {
    /// Path of the sidecar belonging to a data file.
    pub fn sidecar_path(data_path: &Path) -> PathBuf {
        let mut s = data_path.as_os_str().to_owned();
        s.push(".json");
        PathBuf::from(s)
    }

    /// Load the sidecar of `data_path`.
    pub fn read(data_path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(Self::sidecar_path(data_path))?;
        Ok(serde_json::from_str(&json)?)
    }

    /// Write the sidecar of `data_path`.
    pub fn write(&self, data_path: &Path) -> Result<()> {
        std::fs::write(Self::sidecar_path(data_path), serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Grid described by the header.
    pub fn grid(&self) -> Result<Grid> {
        Grid::new(self.shape.clone())
    }
}

/// Forward-only reader over a raw volume.
#[derive(Debug)]
pub struct RawVolumeReader {
    path: PathBuf,
    grid: Grid,
    dtype: DataType,
    reader: BufReader<File>,
    next: usize,
}

impl RawVolumeReader {
    /// Open `path` and validate its size against the header.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let header = VolumeHeader::read(&path)?;
        let grid = header.grid()?;
        let file = File::open(&path)?;
        let expected = grid
            .n_positions()
            .checked_mul(header.dtype.size())
            .map(|n| n as u64)
            .ok_or_else(|| {
                Error::Configuration(format!(
                    "{}: header {:?}/{:?} is too large",
                    path.display(),
                    header.shape,
                    header.dtype
                ))
            })?;
        let actual = file.metadata()?.len();
        if actual != expected {
            return Err(Error::Configuration(format!(
                "{}: {} bytes on disk, header {:?}/{:?} needs {}",
                path.display(),
                actual,
                header.shape,
                header.dtype,
                expected
            )));
        }
        Ok(Self { path, grid, dtype: header.dtype, reader: BufReader::new(file), next: 0 })
    }
}

impl ImageSource for RawVolumeReader {
    fn grid(&self) -> &Grid {
        &self.grid
    }

    fn value_at(&mut self, position: Position) -> Result<f64> {
        if position.index() != self.next {
            return Err(Error::Computation(format!(
                "{}: read out of sync (expected position {}, got {})",
                self.path.display(),
                self.next,
                position.index()
            )));
        }
        let value = match self.dtype {
            DataType::F32 => {
                let mut buf = [0u8; 4];
                self.reader.read_exact(&mut buf)?;
                f32::from_le_bytes(buf) as f64
            }
            DataType::F64 => {
                let mut buf = [0u8; 8];
                self.reader.read_exact(&mut buf)?;
                f64::from_le_bytes(buf)
            }
        };
        self.next += 1;
        Ok(value)
    }
}

/// Forward-only writer producing a raw volume.
#[derive(Debug)]
pub struct RawVolumeWriter {
    path: PathBuf,
    grid: Grid,
    dtype: DataType,
    writer: BufWriter<File>,
    next: usize,
}

impl RawVolumeWriter {
    /// Create `path` with the geometry of `grid`.
    ///
    /// An existing `path` is an [`Error::Configuration`] unless `clobber`.
    pub fn create(
        path: impl AsRef<Path>,
        grid: &Grid,
        dtype: DataType,
        clobber: bool,
    ) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        check_target(&path, clobber)?;
        let header = VolumeHeader { shape: grid.shape().to_vec(), dtype };
        let file = File::create(&path)?;
        header.write(&path)?;
        Ok(Self { path, grid: grid.clone(), dtype, writer: BufWriter::new(file), next: 0 })
    }
}

impl OutputVolume for RawVolumeWriter {
    fn grid(&self) -> &Grid {
        &self.grid
    }

    fn write_at(&mut self, position: Position, value: f64) -> Result<()> {
        if position.index() != self.next {
            return Err(Error::Computation(format!(
                "{}: write out of sync (expected position {}, got {})",
                self.path.display(),
                self.next,
                position.index()
            )));
        }
        match self.dtype {
            DataType::F32 => self.writer.write_all(&(value as f32).to_le_bytes())?,
            DataType::F64 => self.writer.write_all(&value.to_le_bytes())?,
        }
        self.next += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.writer.flush()?;
        if self.next != self.grid.n_positions() {
            return Err(Error::Computation(format!(
                "{}: wrote {} of {} positions",
                self.path.display(),
                self.next,
                self.grid.n_positions()
            )));
        }
        Ok(())
    }
}

/// Fail if the data file or its header sidecar exists and overwriting is
/// not allowed.
pub fn check_target(path: &Path, clobber: bool) -> Result<()> {
    if clobber {
        return Ok(());
    }
    for target in [path.to_path_buf(), VolumeHeader::sidecar_path(path)] {
        if target.exists() {
            return Err(Error::Configuration(format!(
                "output {} exists (set clobber to overwrite)",
                target.display()
            )));
        }
    }
    Ok(())
}

/// Read a whole raw volume into memory.
pub fn read_volume(path: impl AsRef<Path>) -> Result<Volume> {
    let mut reader = RawVolumeReader::open(path)?;
    let grid = reader.grid().clone();
    let data = grid.positions().map(|p| reader.value_at(p)).collect::<Result<Vec<f64>>>()?;
    Volume::new(grid, data)
}

/// Write an in-memory volume to `path`.
pub fn write_volume(
    path: impl AsRef<Path>,
    volume: &Volume,
    dtype: DataType,
    clobber: bool,
) -> Result<()> {
    let grid = ImageSource::grid(volume);
    let mut writer = RawVolumeWriter::create(path, grid, dtype, clobber)?;
    for (p, &v) in grid.positions().zip(volume.data()) {
        writer.write_at(p, v)?;
    }
    writer.finish()
}
