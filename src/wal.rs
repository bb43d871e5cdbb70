use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use crate::model::{Event, SCHEMA_VERSION};

/// Replay failure. Schema mismatch is reported distinctly so startup can
/// refuse an incompatible log instead of silently misreading it.
#[derive(Debug)]
pub enum ReplayError {
    Io(io::Error),
    SchemaMismatch { found: u32 },
    MissingSchema,
}

impl std::fmt::Display for ReplayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReplayError::Io(e) => write!(f, "log read error: {e}"),
            ReplayError::SchemaMismatch { found } => write!(
                f,
                "log schema version {found} is not supported (expected {SCHEMA_VERSION})"
            ),
            ReplayError::MissingSchema => write!(f, "log has no schema record"),
        }
    }
}

impl std::error::Error for ReplayError {}

impl From<io::Error> for ReplayError {
    fn from(e: io::Error) -> Self {
        ReplayError::Io(e)
    }
}

/// Encode a single event to `[len][bincode][crc32]` format.
fn encode_event(writer: &mut impl Write, event: &Event) -> io::Result<()> {
    let payload =
        bincode::serialize(event).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    let len = payload.len() as u32;
    let crc = crc32fast::hash(&payload);
    writer.write_all(&len.to_le_bytes())?;
    writer.write_all(&payload)?;
    writer.write_all(&crc.to_le_bytes())?;
    Ok(())
}

/// Append-only event log backing all persisted state.
///
/// Format per entry: `[u32: len][bincode: Event][u32: crc32]`.
/// - A fresh log starts with a `Schema` record carrying [`SCHEMA_VERSION`].
/// - A truncated last entry (crash) is safely discarded on replay via the
///   length prefix + CRC check.
pub struct Wal {
    writer: BufWriter<File>,
    path: PathBuf,
    appends_since_compact: u64,
}

impl Wal {
    /// Open (or create) the log at `path`. A newly created log gets its
    /// schema record written and synced immediately.
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let fresh = file.metadata()?.len() == 0;
        let mut wal = Self {
            writer: BufWriter::new(file),
            path: path.to_path_buf(),
            appends_since_compact: 0,
        };
        if fresh {
            encode_event(&mut wal.writer, &Event::Schema { version: SCHEMA_VERSION })?;
            wal.flush_sync()?;
        }
        Ok(wal)
    }

    /// Buffer a single event without flushing or syncing. Call
    /// [`Wal::flush_sync`] after the batch to durably commit it.
    pub fn append_buffered(&mut self, event: &Event) -> io::Result<()> {
        encode_event(&mut self.writer, event)?;
        self.appends_since_compact += 1;
        Ok(())
    }

    /// Flush the buffer and fsync the underlying file.
    pub fn flush_sync(&mut self) -> io::Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_all()
    }

    /// Append a single event and fsync. Test convenience — production code
    /// goes through `append_buffered` + `flush_sync` for group commit.
    #[cfg(test)]
    pub fn append(&mut self, event: &Event) -> io::Result<()> {
        self.append_buffered(event)?;
        self.flush_sync()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn appends_since_compact(&self) -> u64 {
        self.appends_since_compact
    }

    /// Write compacted events (schema record first) to a temp file and
    /// fsync. This is the slow I/O phase — run it before the swap.
    pub fn write_compact_file(path: &Path, events: &[Event]) -> io::Result<()> {
        let tmp_path = path.with_extension("wal.tmp");
        let file = File::create(&tmp_path)?;
        let mut writer = BufWriter::new(file);
        encode_event(&mut writer, &Event::Schema { version: SCHEMA_VERSION })?;
        for event in events {
            encode_event(&mut writer, event)?;
        }
        writer.flush()?;
        writer.get_ref().sync_all()?;
        Ok(())
    }

    /// Atomic swap: rename the temp file over the log and reopen.
    pub fn swap_compact_file(&mut self) -> io::Result<()> {
        let tmp_path = self.path.with_extension("wal.tmp");
        fs::rename(&tmp_path, &self.path)?;
        let file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        self.writer = BufWriter::new(file);
        self.appends_since_compact = 0;
        Ok(())
    }

    /// Both compaction phases in one call. Used by tests.
    #[cfg(test)]
    pub fn compact(&mut self, events: &[Event]) -> io::Result<()> {
        Self::write_compact_file(&self.path, events)?;
        self.swap_compact_file()
    }

    /// Replay the log from disk, returning all valid events after the
    /// schema record. A missing file is an empty log. Truncated or corrupt
    /// trailing entries are discarded; an unsupported schema is refused.
    pub fn replay(path: &Path) -> Result<Vec<Event>, ReplayError> {
        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut reader = BufReader::new(file);
        let mut events = Vec::new();
        let mut first = true;

        loop {
            let mut len_buf = [0u8; 4];
            match reader.read_exact(&mut len_buf) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(e.into()),
            }
            let len = u32::from_le_bytes(len_buf) as usize;

            let mut payload = vec![0u8; len];
            match reader.read_exact(&mut payload) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break, // truncated
                Err(e) => return Err(e.into()),
            }

            let mut crc_buf = [0u8; 4];
            match reader.read_exact(&mut crc_buf) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break, // truncated
                Err(e) => return Err(e.into()),
            }
            if u32::from_le_bytes(crc_buf) != crc32fast::hash(&payload) {
                break; // corrupt entry — stop replaying
            }

            let event = match bincode::deserialize::<Event>(&payload) {
                Ok(event) => event,
                Err(_) => break, // corrupt payload
            };

            if first {
                first = false;
                match event {
                    Event::Schema { version } if version == SCHEMA_VERSION => continue,
                    Event::Schema { version } => {
                        return Err(ReplayError::SchemaMismatch { found: version });
                    }
                    _ => return Err(ReplayError::MissingSchema),
                }
            }
            // A compacted log can only carry its schema record first; any
            // later one would be a writer bug, so just skip it.
            if matches!(event, Event::Schema { .. }) {
                continue;
            }
            events.push(event);
        }

        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{PayerProfile, SlotId};

    fn tmp_path(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("parkmate_test_wal");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        let _ = fs::remove_file(&path);
        path
    }

    fn occupied(lot: u32, slot: &str) -> Event {
        Event::SlotOccupied {
            lot,
            floor: "G".into(),
            slot: SlotId::from(slot),
        }
    }

    fn profile(name: &str) -> Event {
        Event::ProfileSaved(PayerProfile {
            name: name.into(),
            phone: "12345".into(),
            vehicle_number: "KA01X1".into(),
            email: None,
        })
    }

    #[test]
    fn append_and_replay() {
        let path = tmp_path("append_and_replay.wal");
        let events = vec![occupied(1, "G1-C"), profile("Asha")];

        {
            let mut wal = Wal::open(&path).unwrap();
            for e in &events {
                wal.append(e).unwrap();
            }
        }

        let replayed = Wal::replay(&path).unwrap();
        assert_eq!(replayed, events);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn fresh_log_carries_schema_record_only() {
        let path = tmp_path("fresh_schema.wal");
        drop(Wal::open(&path).unwrap());
        assert!(fs::metadata(&path).unwrap().len() > 0);
        assert!(Wal::replay(&path).unwrap().is_empty());
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn replay_nonexistent_file() {
        let path = tmp_path("nonexistent.wal");
        assert!(Wal::replay(&path).unwrap().is_empty());
    }

    #[test]
    fn replay_handles_truncation() {
        let path = tmp_path("truncation.wal");
        let event = occupied(1, "G2-C");
        {
            let mut wal = Wal::open(&path).unwrap();
            wal.append(&event).unwrap();
        }
        // Append garbage to simulate a truncated trailing entry.
        {
            let mut f = OpenOptions::new().append(true).open(&path).unwrap();
            f.write_all(&[0u8; 6]).unwrap();
        }

        let replayed = Wal::replay(&path).unwrap();
        assert_eq!(replayed, vec![event]);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn replay_stops_at_corrupt_crc() {
        let path = tmp_path("corrupt_crc.wal");
        let good = occupied(1, "G1-C");
        {
            let mut wal = Wal::open(&path).unwrap();
            wal.append(&good).unwrap();
        }
        // Manually write an entry with a bad CRC after the good one.
        {
            let payload = bincode::serialize(&occupied(1, "G2-C")).unwrap();
            let mut f = OpenOptions::new().append(true).open(&path).unwrap();
            f.write_all(&(payload.len() as u32).to_le_bytes()).unwrap();
            f.write_all(&payload).unwrap();
            f.write_all(&0xDEADBEEFu32.to_le_bytes()).unwrap();
        }

        let replayed = Wal::replay(&path).unwrap();
        assert_eq!(replayed, vec![good]);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn unsupported_schema_refused() {
        let path = tmp_path("bad_schema.wal");
        {
            let payload =
                bincode::serialize(&Event::Schema { version: SCHEMA_VERSION + 1 }).unwrap();
            let mut f = File::create(&path).unwrap();
            f.write_all(&(payload.len() as u32).to_le_bytes()).unwrap();
            f.write_all(&payload).unwrap();
            f.write_all(&crc32fast::hash(&payload).to_le_bytes()).unwrap();
        }
        match Wal::replay(&path) {
            Err(ReplayError::SchemaMismatch { found }) => {
                assert_eq!(found, SCHEMA_VERSION + 1)
            }
            other => panic!("expected schema mismatch, got {other:?}"),
        }
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn log_without_schema_record_refused() {
        let path = tmp_path("no_schema.wal");
        {
            let payload = bincode::serialize(&occupied(1, "G1-C")).unwrap();
            let mut f = File::create(&path).unwrap();
            f.write_all(&(payload.len() as u32).to_le_bytes()).unwrap();
            f.write_all(&payload).unwrap();
            f.write_all(&crc32fast::hash(&payload).to_le_bytes()).unwrap();
        }
        assert!(matches!(Wal::replay(&path), Err(ReplayError::MissingSchema)));
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn compact_reduces_log_and_survives_replay() {
        let path = tmp_path("compact_reduce.wal");
        {
            let mut wal = Wal::open(&path).unwrap();
            for _ in 0..10 {
                wal.append(&profile("Churn")).unwrap();
            }
        }
        let before = fs::metadata(&path).unwrap().len();

        // Final state only needs the last profile write.
        let compacted = vec![profile("Churn")];
        {
            let mut wal = Wal::open(&path).unwrap();
            wal.compact(&compacted).unwrap();
        }

        let after = fs::metadata(&path).unwrap().len();
        assert!(after < before, "compacted log should shrink: {after} < {before}");
        assert_eq!(Wal::replay(&path).unwrap(), compacted);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn compact_then_append() {
        let path = tmp_path("compact_append.wal");
        let seed = profile("Seed");
        let extra = occupied(2, "P1-1C");
        {
            let mut wal = Wal::open(&path).unwrap();
            wal.append(&seed).unwrap();
            wal.compact(std::slice::from_ref(&seed)).unwrap();
            assert_eq!(wal.appends_since_compact(), 0);
            wal.append(&extra).unwrap();
            assert_eq!(wal.appends_since_compact(), 1);
        }

        assert_eq!(Wal::replay(&path).unwrap(), vec![seed, extra]);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn append_buffered_then_flush_sync() {
        let path = tmp_path("buffered_flush.wal");
        let events: Vec<Event> = (0..5).map(|i| occupied(1, &format!("S{i}-C"))).collect();
        {
            let mut wal = Wal::open(&path).unwrap();
            for e in &events {
                wal.append_buffered(e).unwrap();
            }
            assert_eq!(wal.appends_since_compact(), 5);
            wal.flush_sync().unwrap();
        }
        assert_eq!(Wal::replay(&path).unwrap(), events);
        let _ = fs::remove_file(&path);
    }
}
