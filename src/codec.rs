//! Little-endian seekable binary artifact format (C2), extension `.pyesg`.
//!
//! Layout:
//! ```text
//! [0..8)   u64        finalisation timestamp (unix seconds, written last)
//! [8..12)  u32        number_of_simulations S
//! [12..16) u32        number_of_outputs O
//! [16..20) u32        number_of_time_steps T+1
//! ..       O strings  output ids, each u32 length + UTF-8 bytes
//! ..       (T+1) u64  step dates (unix seconds)
//! ..       O blocks    each S * (T+1) f32, simulation-major / step-minor
//! ```

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use chrono::{DateTime, Utc};
use ndarray::{Array2, Array3};

use crate::error::IoError;

/// Either a user-declared output id or a zero-based index into the artifact's
/// output list.
pub enum OutputKey<'a> {
    Id(&'a str),
    Index(usize),
}

impl<'a> From<&'a str> for OutputKey<'a> {
    fn from(id: &'a str) -> Self {
        OutputKey::Id(id)
    }
}

impl From<usize> for OutputKey<'static> {
    fn from(index: usize) -> Self {
        OutputKey::Index(index)
    }
}

fn resolve_index(ids: &[String], key: OutputKey<'_>) -> Result<usize, IoError> {
    match key {
        OutputKey::Index(i) => {
            if i >= ids.len() {
                Err(IoError::OutputIndexOutOfRange {
                    index: i,
                    count: ids.len(),
                })
            } else {
                Ok(i)
            }
        }
        OutputKey::Id(id) => ids
            .iter()
            .position(|candidate| candidate == id)
            .ok_or_else(|| IoError::UnknownOutputId(id.to_string())),
    }
}

/// Writes the simulation artifact. The file remains unfinalised (its 8-byte
/// timestamp prefix is zero) until [`Writer::finalise`] runs.
pub struct Writer {
    file: BufWriter<File>,
    header_end: u64,
    number_of_simulations: u32,
    number_of_outputs: u32,
    number_of_time_steps: u32,
}

impl Writer {
    /// Creates the artifact and writes its header. `step_dates` must have
    /// `number_of_time_steps` entries (T+1, step 0 included).
    pub fn create(
        path: impl AsRef<Path>,
        number_of_simulations: u32,
        output_ids: &[String],
        step_dates: &[DateTime<Utc>],
    ) -> Result<Self, IoError> {
        let file = File::create(path)?;
        let mut file = BufWriter::new(file);

        // placeholder timestamp prefix, overwritten by `finalise`
        file.write_u64::<LittleEndian>(0)?;
        file.write_u32::<LittleEndian>(number_of_simulations)?;
        file.write_u32::<LittleEndian>(output_ids.len() as u32)?;
        file.write_u32::<LittleEndian>(step_dates.len() as u32)?;
        for id in output_ids {
            let bytes = id.as_bytes();
            file.write_u32::<LittleEndian>(bytes.len() as u32)?;
            file.write_all(bytes)?;
        }
        for date in step_dates {
            file.write_u64::<LittleEndian>(date.timestamp() as u64)?;
        }
        let header_end = file.stream_position()?;

        Ok(Self {
            file,
            header_end,
            number_of_simulations,
            number_of_outputs: output_ids.len() as u32,
            number_of_time_steps: step_dates.len() as u32,
        })
    }

    fn output_block_size(&self, total_batches: u32) -> u64 {
        total_batches as u64
            * self.batch_size(total_batches) as u64
            * self.number_of_time_steps as u64
            * 4
    }

    fn batch_size(&self, total_batches: u32) -> u32 {
        self.number_of_simulations / total_batches
    }

    /// Writes one batch: `tensor` has shape `(O, T+1, batch_size)`.
    /// `batch_index` is zero-based, `total_batches` is B.
    pub fn write_batch(
        &mut self,
        batch_index: u32,
        total_batches: u32,
        tensor: &Array3<f32>,
    ) -> Result<(), IoError> {
        let batch_size = self.batch_size(total_batches);
        let block_size = self.output_block_size(total_batches);
        for output in 0..self.number_of_outputs {
            let offset = self.header_end
                + output as u64 * block_size
                + batch_index as u64 * batch_size as u64 * self.number_of_time_steps as u64 * 4;
            self.file.seek(SeekFrom::Start(offset))?;
            // on-disk rows are simulation-major, step-minor: transpose (T+1, batch_size) -> (batch_size, T+1)
            let slice = tensor.index_axis(ndarray::Axis(0), output as usize);
            for sim in 0..batch_size as usize {
                for step in 0..self.number_of_time_steps as usize {
                    self.file.write_f32::<LittleEndian>(slice[[step, sim]])?;
                }
            }
        }
        Ok(())
    }

    /// Rewrites the 8-byte timestamp prefix with the current unix time and
    /// closes the file. A file that never reaches this point is invalid.
    pub fn finalise(mut self) -> Result<(), IoError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system clock before unix epoch")
            .as_secs();
        self.file.seek(SeekFrom::Start(0))?;
        self.file.write_u64::<LittleEndian>(now)?;
        self.file.flush()?;
        Ok(())
    }
}

/// Reads a finalised simulation artifact.
pub struct Reader {
    file: BufReader<File>,
    header_end: u64,
    finalised_at: u64,
    number_of_simulations: u32,
    output_ids: Vec<String>,
    step_dates: Vec<DateTime<Utc>>,
}

impl Reader {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, IoError> {
        let mut file = BufReader::new(File::open(path)?);

        let finalised_at = file.read_u64::<LittleEndian>()?;
        if finalised_at == 0 {
            return Err(IoError::NotFinalised);
        }
        let number_of_simulations = file.read_u32::<LittleEndian>()?;
        let number_of_outputs = file.read_u32::<LittleEndian>()?;
        let number_of_time_steps = file.read_u32::<LittleEndian>()?;

        let mut output_ids = Vec::with_capacity(number_of_outputs as usize);
        for _ in 0..number_of_outputs {
            let len = file.read_u32::<LittleEndian>()? as usize;
            let mut bytes = vec![0u8; len];
            file.read_exact(&mut bytes)?;
            output_ids.push(String::from_utf8(bytes).map_err(|e| {
                IoError::CorruptHeader(format!("output id is not valid UTF-8: {e}"))
            })?);
        }

        let mut step_dates = Vec::with_capacity(number_of_time_steps as usize);
        for _ in 0..number_of_time_steps {
            let secs = file.read_u64::<LittleEndian>()? as i64;
            let date = DateTime::from_timestamp(secs, 0)
                .ok_or_else(|| IoError::CorruptHeader("step date out of range".into()))?;
            step_dates.push(date);
        }

        let header_end = file.stream_position()?;

        Ok(Self {
            file,
            header_end,
            finalised_at,
            number_of_simulations,
            output_ids,
            step_dates,
        })
    }

    pub fn finalised_at(&self) -> u64 {
        self.finalised_at
    }

    pub fn number_of_simulations(&self) -> u32 {
        self.number_of_simulations
    }

    pub fn number_of_outputs(&self) -> usize {
        self.output_ids.len()
    }

    pub fn number_of_time_steps(&self) -> usize {
        self.step_dates.len()
    }

    pub fn output_ids(&self) -> &[String] {
        &self.output_ids
    }

    pub fn step_dates(&self) -> &[DateTime<Utc>] {
        &self.step_dates
    }

    fn output_offset(&self, index: usize) -> u64 {
        self.header_end
            + index as u64 * self.number_of_simulations as u64 * self.step_dates.len() as u64 * 4
    }

    /// Full (S, T+1) matrix for one output.
    pub fn paths_for_output<'a>(&mut self, key: impl Into<OutputKey<'a>>) -> Result<Array2<f32>, IoError> {
        let index = resolve_index(&self.output_ids, key.into())?;
        let t = self.step_dates.len();
        let s = self.number_of_simulations as usize;
        self.file.seek(SeekFrom::Start(self.output_offset(index)))?;
        let mut out = Array2::<f32>::zeros((s, t));
        for sim in 0..s {
            for step in 0..t {
                out[[sim, step]] = self.file.read_f32::<LittleEndian>()?;
            }
        }
        Ok(out)
    }

    /// Vector of length S: all paths' value at a single step.
    pub fn paths_for_step<'a>(
        &mut self,
        key: impl Into<OutputKey<'a>>,
        step: usize,
    ) -> Result<Vec<f32>, IoError> {
        let index = resolve_index(&self.output_ids, key.into())?;
        let t = self.step_dates.len();
        if step >= t {
            return Err(IoError::StepOutOfRange { step, count: t });
        }
        let s = self.number_of_simulations as usize;
        let base = self.output_offset(index) + step as u64 * 4;
        let mut out = Vec::with_capacity(s);
        for sim in 0..s {
            self.file
                .seek(SeekFrom::Start(base + sim as u64 * t as u64 * 4))?;
            out.push(self.file.read_f32::<LittleEndian>()?);
        }
        Ok(out)
    }

    /// Vector of length T+1: one simulation's full path.
    pub fn path<'a>(&mut self, key: impl Into<OutputKey<'a>>, sim: usize) -> Result<Vec<f32>, IoError> {
        let index = resolve_index(&self.output_ids, key.into())?;
        let s = self.number_of_simulations as usize;
        if sim >= s {
            return Err(IoError::SimulationIndexOutOfRange { sim, count: s });
        }
        let t = self.step_dates.len();
        let base = self.output_offset(index) + sim as u64 * t as u64 * 4;
        self.file.seek(SeekFrom::Start(base))?;
        let mut out = Vec::with_capacity(t);
        for _ in 0..t {
            out.push(self.file.read_f32::<LittleEndian>()?);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    fn dates(n: usize) -> Vec<DateTime<Utc>> {
        (0..n)
            .map(|i| DateTime::from_timestamp(1_000_000 + i as i64 * 86_400, 0).unwrap())
            .collect()
    }

    #[test]
    fn header_round_trips_byte_for_byte() {
        let dir = tempdir();
        let path = dir.join("header.pyesg");
        let ids = vec!["a".to_string(), "b".to_string()];
        let step_dates = dates(4);
        let writer = Writer::create(&path, 10, &ids, &step_dates).unwrap();
        writer.finalise().unwrap();

        let reader = Reader::open(&path).unwrap();
        assert_eq!(reader.number_of_simulations(), 10);
        assert_eq!(reader.output_ids(), ids.as_slice());
        assert_eq!(reader.step_dates(), step_dates.as_slice());
        assert_ne!(reader.finalised_at(), 0);
    }

    #[test]
    fn unfinalised_file_is_rejected() {
        let dir = tempdir();
        let path = dir.join("unfinalised.pyesg");
        let ids = vec!["a".to_string()];
        let _writer = Writer::create(&path, 2, &ids, &dates(2)).unwrap();
        // dropped without calling `finalise`
        assert!(matches!(Reader::open(&path), Err(IoError::NotFinalised)));
    }

    #[test]
    fn paths_for_step_matches_paths_for_output_column() {
        let dir = tempdir();
        let path = dir.join("strided.pyesg");
        let ids = vec!["x".to_string()];
        let step_dates = dates(3);
        let batch_size = 4u32;
        let mut writer = Writer::create(&path, batch_size, &ids, &step_dates).unwrap();

        let mut tensor = Array3::<f32>::zeros((1, 3, batch_size as usize));
        for step in 0..3 {
            for sim in 0..batch_size as usize {
                tensor[[0, step, sim]] = (step * 10 + sim) as f32;
            }
        }
        writer.write_batch(0, 1, &tensor).unwrap();
        writer.finalise().unwrap();

        let mut reader = Reader::open(&path).unwrap();
        let full = reader.paths_for_output("x").unwrap();
        for step in 0..3 {
            let strided = reader.paths_for_step("x", step).unwrap();
            let column: Vec<f32> = full.column(step).to_vec();
            assert_eq!(strided, column);
        }
    }

    #[test]
    fn batches_occupy_disjoint_simulation_ranges() {
        let dir = tempdir();
        let path = dir.join("batched.pyesg");
        let ids = vec!["a".to_string(), "b".to_string()];
        let step_dates = dates(2);
        let total_batches = 2u32;
        let batch_size = 3u32;
        let s = total_batches * batch_size;
        let mut writer = Writer::create(&path, s, &ids, &step_dates).unwrap();

        for batch in 0..total_batches {
            let mut tensor = Array3::<f32>::zeros((2, 2, batch_size as usize));
            tensor.fill(batch as f32 + 1.0);
            writer.write_batch(batch, total_batches, &tensor).unwrap();
        }
        writer.finalise().unwrap();

        let mut reader = Reader::open(&path).unwrap();
        let first_output = reader.paths_for_output(0).unwrap();
        // batch 0 occupies sims [0, batch_size), batch 1 occupies [batch_size, s)
        for sim in 0..batch_size as usize {
            assert_eq!(first_output[[sim, 0]], 1.0);
        }
        for sim in batch_size as usize..s as usize {
            assert_eq!(first_output[[sim, 0]], 2.0);
        }
    }

    fn tempdir() -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "pyesg_codec_test_{}_{}",
            std::process::id(),
            rand_suffix()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn rand_suffix() -> u64 {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};
        use std::time::Instant;
        let mut hasher = DefaultHasher::new();
        Instant::now().hash(&mut hasher);
        hasher.finish()
    }
}
