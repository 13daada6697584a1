//! Bundled array database: one packed-record file per tier.
//!
//! Format: 16-byte header (magic, version, position count) followed by one
//! little-endian `u16` record per position. A record stores the value in
//! bits 12..15 and the remoteness in bits 0..12, so a zeroed table reads as
//! `Undecided` everywhere. Reads go through zero-copy memory maps; the
//! solving tier lives in RAM as atomics until it is flushed.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::{Arc, RwLock};

use memmap2::Mmap;

use crate::db::{Database, DbProbe, TierStatus};
use crate::error::DbError;
use crate::types::{Position, Remoteness, Tier, TierPosition, Value};

/// File magic: "TSDB" as little-endian bytes.
const MAGIC: u32 = 0x4244_5354;
const VERSION: u32 = 1;
const HEADER_SIZE: usize = 16;

const VALUE_SHIFT: u32 = 12;
const REMOTENESS_MASK: u16 = 0x0FFF;

fn pack(value: Value, remoteness: Remoteness) -> u16 {
    ((value as u16) << VALUE_SHIFT) | (remoteness as u16 & REMOTENESS_MASK)
}

fn unpack_value(record: u16) -> Value {
    Value::from_u8((record >> VALUE_SHIFT) as u8)
}

fn unpack_remoteness(record: u16) -> Remoteness {
    (record & REMOTENESS_MASK) as Remoteness
}

type NameFn = dyn Fn(Tier) -> String + Send + Sync;

fn default_name(tier: Tier) -> String {
    tier.to_string()
}

struct SolvingTier {
    tier: Tier,
    records: Vec<AtomicU16>,
}

/// Directory-backed [`Database`] with one file per tier.
pub struct ArrayDb {
    dir: PathBuf,
    ref_dir: Option<PathBuf>,
    name_fn: Arc<NameFn>,
    solving: RwLock<Option<SolvingTier>>,
    loaded: RwLock<HashMap<Tier, Vec<u16>>>,
}

impl ArrayDb {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            ref_dir: None,
            name_fn: Arc::new(default_name),
            solving: RwLock::new(None),
            loaded: RwLock::new(HashMap::new()),
        }
    }

    /// Enables compare mode against a second database directory.
    pub fn with_reference(mut self, ref_dir: impl Into<PathBuf>) -> Self {
        self.ref_dir = Some(ref_dir.into());
        self
    }

    /// Names tier files after the game's tier names instead of raw tier ids.
    pub fn with_tier_names(
        mut self,
        name_fn: impl Fn(Tier) -> String + Send + Sync + 'static,
    ) -> Self {
        self.name_fn = Arc::new(name_fn);
        self
    }

    fn tier_path(dir: &Path, name_fn: &NameFn, tier: Tier) -> PathBuf {
        dir.join(format!("{}.tsdb", name_fn(tier)))
    }

    fn open_tier(dir: &Path, name_fn: &NameFn, tier: Tier) -> Result<(Mmap, i64), DbError> {
        let path = Self::tier_path(dir, name_fn, tier);
        let file = match File::open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(DbError::Missing(tier))
            }
            Err(e) => return Err(DbError::Io(e)),
        };
        let mmap = unsafe { Mmap::map(&file)? };
        if mmap.len() < HEADER_SIZE {
            return Err(DbError::Corrupt {
                tier,
                reason: format!("file too small ({} bytes)", mmap.len()),
            });
        }
        let magic = u32::from_le_bytes(mmap[0..4].try_into().unwrap());
        let version = u32::from_le_bytes(mmap[4..8].try_into().unwrap());
        if magic != MAGIC || version != VERSION {
            return Err(DbError::Corrupt {
                tier,
                reason: format!("bad header (magic=0x{magic:08x} version={version})"),
            });
        }
        let num_positions = i64::from_le_bytes(mmap[8..16].try_into().unwrap());
        let expected = HEADER_SIZE as u64 + 2 * num_positions as u64;
        if num_positions < 0 || mmap.len() as u64 != expected {
            return Err(DbError::Corrupt {
                tier,
                reason: format!("size mismatch: expected {expected}, got {}", mmap.len()),
            });
        }
        Ok((mmap, num_positions))
    }

    fn read_record(mmap: &Mmap, num_positions: i64, tp: TierPosition) -> Result<u16, DbError> {
        if tp.position < 0 || tp.position >= num_positions {
            return Err(DbError::Corrupt {
                tier: tp.tier,
                reason: format!("position {} out of range [0, {num_positions})", tp.position),
            });
        }
        let offset = HEADER_SIZE + 2 * tp.position as usize;
        Ok(u16::from_le_bytes(mmap[offset..offset + 2].try_into().unwrap()))
    }
}

impl Database for ArrayDb {
    type Probe = ArrayProbe;

    fn probe(&self) -> Result<ArrayProbe, DbError> {
        Ok(ArrayProbe {
            dir: self.dir.clone(),
            name_fn: Arc::clone(&self.name_fn),
            cached: None,
        })
    }

    fn reference_probe(&self) -> Result<ArrayProbe, DbError> {
        let ref_dir = self
            .ref_dir
            .as_ref()
            .ok_or(DbError::Unsupported("reference database"))?;
        Ok(ArrayProbe {
            dir: ref_dir.clone(),
            name_fn: Arc::clone(&self.name_fn),
            cached: None,
        })
    }

    fn tier_status(&self, tier: Tier) -> TierStatus {
        match Self::open_tier(&self.dir, &*self.name_fn, tier) {
            Ok(_) => TierStatus::Solved,
            Err(DbError::Missing(_)) => TierStatus::Missing,
            Err(DbError::Corrupt { .. }) => TierStatus::Corrupted,
            Err(_) => TierStatus::CheckError,
        }
    }

    fn create_solving_tier(&self, tier: Tier, size: i64) -> Result<(), DbError> {
        let records = (0..size).map(|_| AtomicU16::new(0)).collect();
        *self.solving.write().unwrap() = Some(SolvingTier { tier, records });
        Ok(())
    }

    fn set_value(&self, position: Position, value: Value) {
        let guard = self.solving.read().unwrap();
        let solving = guard.as_ref().expect("no solving tier");
        let cell = &solving.records[position as usize];
        let old = cell.load(Ordering::Relaxed);
        cell.store(
            (old & REMOTENESS_MASK) | ((value as u16) << VALUE_SHIFT),
            Ordering::Relaxed,
        );
    }

    fn set_remoteness(&self, position: Position, remoteness: Remoteness) {
        let guard = self.solving.read().unwrap();
        let solving = guard.as_ref().expect("no solving tier");
        let cell = &solving.records[position as usize];
        let old = cell.load(Ordering::Relaxed);
        cell.store(
            (old & !REMOTENESS_MASK) | (remoteness as u16 & REMOTENESS_MASK),
            Ordering::Relaxed,
        );
    }

    fn value(&self, position: Position) -> Value {
        let guard = self.solving.read().unwrap();
        let solving = guard.as_ref().expect("no solving tier");
        unpack_value(solving.records[position as usize].load(Ordering::Relaxed))
    }

    fn remoteness(&self, position: Position) -> Remoteness {
        let guard = self.solving.read().unwrap();
        let solving = guard.as_ref().expect("no solving tier");
        unpack_remoteness(solving.records[position as usize].load(Ordering::Relaxed))
    }

    fn flush_solving_tier(&self) -> Result<(), DbError> {
        let guard = self.solving.read().unwrap();
        let solving = guard.as_ref().expect("no solving tier");
        fs::create_dir_all(&self.dir)?;
        let path = Self::tier_path(&self.dir, &*self.name_fn, solving.tier);
        let mut out = BufWriter::new(File::create(&path)?);
        out.write_all(&MAGIC.to_le_bytes())?;
        out.write_all(&VERSION.to_le_bytes())?;
        out.write_all(&(solving.records.len() as i64).to_le_bytes())?;
        for record in &solving.records {
            out.write_all(&record.load(Ordering::Relaxed).to_le_bytes())?;
        }
        out.flush()?;
        Ok(())
    }

    fn free_solving_tier(&self) {
        *self.solving.write().unwrap() = None;
    }

    fn load_tier(&self, tier: Tier, size: i64) -> Result<(), DbError> {
        let (mmap, num_positions) = Self::open_tier(&self.dir, &*self.name_fn, tier)?;
        if num_positions != size {
            return Err(DbError::Corrupt {
                tier,
                reason: format!("expected {size} positions, file has {num_positions}"),
            });
        }
        let mut records = Vec::with_capacity(num_positions as usize);
        for i in 0..num_positions as usize {
            let offset = HEADER_SIZE + 2 * i;
            records.push(u16::from_le_bytes(mmap[offset..offset + 2].try_into().unwrap()));
        }
        self.loaded.write().unwrap().insert(tier, records);
        Ok(())
    }

    fn is_tier_loaded(&self, tier: Tier) -> bool {
        self.loaded.read().unwrap().contains_key(&tier)
    }

    fn unload_tier(&self, tier: Tier) {
        self.loaded.write().unwrap().remove(&tier);
    }

    fn loaded_value(&self, tier: Tier, position: Position) -> Value {
        let loaded = self.loaded.read().unwrap();
        let records = loaded.get(&tier).expect("tier not loaded");
        unpack_value(records[position as usize])
    }

    fn loaded_remoteness(&self, tier: Tier, position: Position) -> Remoteness {
        let loaded = self.loaded.read().unwrap();
        let records = loaded.get(&tier).expect("tier not loaded");
        unpack_remoteness(records[position as usize])
    }
}

/// Probe over an [`ArrayDb`] directory. Caches the most recently touched
/// tier's map, which makes linear scans of one tier cheap.
pub struct ArrayProbe {
    dir: PathBuf,
    name_fn: Arc<NameFn>,
    cached: Option<(Tier, Mmap, i64)>,
}

impl ArrayProbe {
    fn record(&mut self, tp: TierPosition) -> Result<u16, DbError> {
        let hit = matches!(&self.cached, Some((tier, _, _)) if *tier == tp.tier);
        if !hit {
            let (mmap, num_positions) = ArrayDb::open_tier(&self.dir, &*self.name_fn, tp.tier)?;
            self.cached = Some((tp.tier, mmap, num_positions));
        }
        let (_, mmap, num_positions) = self.cached.as_ref().unwrap();
        ArrayDb::read_record(mmap, *num_positions, tp)
    }
}

impl DbProbe for ArrayProbe {
    fn value(&mut self, tier_position: TierPosition) -> Result<Value, DbError> {
        Ok(unpack_value(self.record(tier_position)?))
    }

    fn remoteness(&mut self, tier_position: TierPosition) -> Result<Remoteness, DbError> {
        Ok(unpack_remoteness(self.record(tier_position)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("tiersolve_arraydb_{name}"));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn pack_round_trip() {
        for value in [Value::Undecided, Value::Win, Value::Lose, Value::Tie, Value::Draw] {
            for remoteness in [0, 1, 17, crate::types::REMOTENESS_MAX] {
                let record = pack(value, remoteness);
                assert_eq!(unpack_value(record), value);
                assert_eq!(unpack_remoteness(record), remoteness);
            }
        }
    }

    #[test]
    fn solve_flush_probe_round_trip() {
        let dir = test_dir("round_trip");
        let db = ArrayDb::new(&dir);

        db.create_solving_tier(3, 5).unwrap();
        db.set_value(0, Value::Win);
        db.set_remoteness(0, 4);
        db.set_value(2, Value::Lose);
        db.set_remoteness(2, 3);
        db.set_value(4, Value::Draw);
        assert_eq!(db.value(0), Value::Win);
        assert_eq!(db.remoteness(2), 3);
        db.flush_solving_tier().unwrap();
        db.free_solving_tier();

        assert_eq!(db.tier_status(3), TierStatus::Solved);
        let mut probe = db.probe().unwrap();
        assert_eq!(probe.value(TierPosition::new(3, 0)).unwrap(), Value::Win);
        assert_eq!(probe.remoteness(TierPosition::new(3, 0)).unwrap(), 4);
        assert_eq!(probe.value(TierPosition::new(3, 1)).unwrap(), Value::Undecided);
        assert_eq!(probe.value(TierPosition::new(3, 2)).unwrap(), Value::Lose);
        assert_eq!(probe.value(TierPosition::new(3, 4)).unwrap(), Value::Draw);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn load_tier_reads_back_records() {
        let dir = test_dir("load");
        let db = ArrayDb::new(&dir);
        db.create_solving_tier(9, 4).unwrap();
        db.set_value(1, Value::Tie);
        db.set_remoteness(1, 2);
        db.flush_solving_tier().unwrap();
        db.free_solving_tier();

        db.load_tier(9, 4).unwrap();
        assert!(db.is_tier_loaded(9));
        assert_eq!(db.loaded_value(9, 1), Value::Tie);
        assert_eq!(db.loaded_remoteness(9, 1), 2);
        assert_eq!(db.loaded_value(9, 0), Value::Undecided);
        db.unload_tier(9);
        assert!(!db.is_tier_loaded(9));

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn status_detects_missing_and_corrupted() {
        let dir = test_dir("status");
        let db = ArrayDb::new(&dir);
        assert_eq!(db.tier_status(1), TierStatus::Missing);

        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("2.tsdb"), b"garbage").unwrap();
        assert_eq!(db.tier_status(2), TierStatus::Corrupted);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn tier_name_function_controls_file_names() {
        let dir = test_dir("names");
        let db = ArrayDb::new(&dir).with_tier_names(|t| format!("pieces_{t}"));
        db.create_solving_tier(7, 1).unwrap();
        db.flush_solving_tier().unwrap();
        db.free_solving_tier();
        assert!(dir.join("pieces_7.tsdb").exists());

        let _ = fs::remove_dir_all(&dir);
    }
}
