//! Local durable tier: the last-resort fallback of the read path.
//!
//! Every artifact goes through a write-temp-then-rename sequence with a
//! unique temp name in the destination directory, so a reader only ever
//! observes either the old complete file or the new complete file.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;
use uuid::Uuid;

use crate::domain::{Metadata, RawTable};
use crate::error::Result;
use crate::storage::csv;

/// CSV artifacts are written UTF-8 with BOM, matching what spreadsheet
/// tooling expects of the published files.
const UTF8_BOM: &str = "\u{feff}";

pub struct LocalStore {
    dir: PathBuf,
}

impl LocalStore {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    fn write_atomic(&self, name: &str, contents: &[u8]) -> Result<()> {
        let dest = self.path(name);
        // Unique temp name per writer keeps interleaved runs safe; the last
        // rename wins.
        let tmp = self.dir.join(format!(".{}.{}.tmp", name, Uuid::new_v4()));
        fs::write(&tmp, contents)?;
        fs::rename(&tmp, &dest)?;
        debug!("wrote {} ({} bytes)", dest.display(), contents.len());
        Ok(())
    }

    pub fn write_table(&self, name: &str, table: &RawTable) -> Result<()> {
        let mut text = String::from(UTF8_BOM);
        text.push_str(&csv::encode_table(table));
        self.write_atomic(name, text.as_bytes())
    }

    pub fn read_table(&self, name: &str) -> Result<Option<RawTable>> {
        let path = self.path(name);
        if !path.exists() {
            return Ok(None);
        }
        let text = fs::read_to_string(path)?;
        Ok(csv::decode_table(text.trim_start_matches(UTF8_BOM)))
    }

    pub fn write_metadata(&self, name: &str, meta: &Metadata) -> Result<()> {
        let json = serde_json::to_string_pretty(meta)?;
        self.write_atomic(name, json.as_bytes())
    }

    pub fn read_metadata(&self, name: &str) -> Result<Option<Metadata>> {
        let path = self.path(name);
        if !path.exists() {
            return Ok(None);
        }
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text).ok())
    }

    /// Size of an artifact if present; used by the status report.
    pub fn file_size(&self, name: &str) -> Option<u64> {
        fs::metadata(self.path(name)).ok().map(|m| m.len())
    }

    /// Leftover temp files (e.g. after a crash mid-write) that never made it
    /// through the rename. Harmless, but reported for observability.
    pub fn stale_temp_files(&self) -> Vec<PathBuf> {
        let Ok(entries) = fs::read_dir(&self.dir) else { return Vec::new() };
        entries
            .flatten()
            .map(|e| e.path())
            .filter(|p| is_temp(p))
            .collect()
    }
}

fn is_temp(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with('.') && n.ends_with(".tmp"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ScrapeStatus;
    use tempfile::tempdir;

    fn sample_table() -> RawTable {
        RawTable::new(
            vec!["Papel".into(), "Liq.2meses".into()],
            vec![vec!["PETR4".into(), "1.234.567,00".into()]],
        )
    }

    #[test]
    fn table_round_trips_with_bom() {
        let dir = tempdir().unwrap();
        let store = LocalStore::new(dir.path()).unwrap();
        store.write_table("acoes_raw.csv", &sample_table()).unwrap();

        let bytes = fs::read(store.path("acoes_raw.csv")).unwrap();
        assert_eq!(&bytes[..3], &[0xEF, 0xBB, 0xBF]);

        let back = store.read_table("acoes_raw.csv").unwrap().unwrap();
        assert_eq!(back, sample_table());
    }

    #[test]
    fn metadata_round_trips_pretty_printed() {
        let dir = tempdir().unwrap();
        let store = LocalStore::new(dir.path()).unwrap();
        let meta = Metadata {
            status: ScrapeStatus::Success,
            rows_filtered: Some(22),
            ..Default::default()
        };
        store.write_metadata("metadata.json", &meta).unwrap();

        let text = fs::read_to_string(store.path("metadata.json")).unwrap();
        assert!(text.contains('\n'), "metadata should be human readable");

        let back = store.read_metadata("metadata.json").unwrap().unwrap();
        assert_eq!(back.status, ScrapeStatus::Success);
        assert_eq!(back.rows_filtered, Some(22));
    }

    #[test]
    fn missing_files_read_as_none() {
        let dir = tempdir().unwrap();
        let store = LocalStore::new(dir.path()).unwrap();
        assert!(store.read_table("acoes_raw.csv").unwrap().is_none());
        assert!(store.read_metadata("metadata.json").unwrap().is_none());
    }

    #[test]
    fn interrupted_write_leaves_destination_intact() {
        let dir = tempdir().unwrap();
        let store = LocalStore::new(dir.path()).unwrap();
        store.write_table("acoes_raw.csv", &sample_table()).unwrap();

        // Simulate a writer that died after writing its temp file but
        // before the rename: the destination must still read complete.
        let orphan = dir.path().join(".acoes_raw.csv.deadbeef.tmp");
        fs::write(&orphan, b"partial garb").unwrap();

        let back = store.read_table("acoes_raw.csv").unwrap().unwrap();
        assert_eq!(back, sample_table());
        assert_eq!(store.stale_temp_files(), vec![orphan]);
    }

    #[test]
    fn rewrites_replace_content_wholesale() {
        let dir = tempdir().unwrap();
        let store = LocalStore::new(dir.path()).unwrap();
        store.write_table("acoes_raw.csv", &sample_table()).unwrap();

        let newer = RawTable::new(
            vec!["Papel".into(), "Liq.2meses".into()],
            vec![vec!["VALE3".into(), "9.000.000,00".into()]],
        );
        store.write_table("acoes_raw.csv", &newer).unwrap();
        assert_eq!(store.read_table("acoes_raw.csv").unwrap().unwrap(), newer);
        // No temp residue after successful writes.
        assert!(store.stale_temp_files().is_empty());
    }
}
