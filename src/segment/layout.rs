//! Data directory layout.
//!
//! Every path the pipeline reads or writes is derived here, so the
//! filesystem contract lives in one place:
//!
//! ```text
//! <root>/wat.paths.gz                      cached path listing
//! <root>/tmp/wat/                          downloaded WAT files
//! <root>/tmp/<segment>/link/NNNNN.txt.gz   per-WAT link intermediates
//! <root>/tmp/<segment>/page/NNNNN.txt.gz   per-WAT page intermediates
//! <root>/links/sort_<segID>.txt.gz         sorted segment stream
//! <root>/links/compact_<segID>.txt.gz      final output
//! <root>/pages/sort_<segID>.txt.gz         sorted page records
//! ```

use regex::Regex;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Extension shared by every pipeline artifact.
pub const EXT_TXT_GZ: &str = ".txt.gz";

fn intermediate_name_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d{5}\.txt\.gz$").expect("static regex"))
}

/// `<name>.tmp` next to the final path. Everything the pipeline
/// materializes is written there first and renamed into place, so a partial
/// artifact never exists under its final name.
pub fn tmp_sibling(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Root of the data directory tree.
#[derive(Debug, Clone)]
pub struct DataLayout {
    root: PathBuf,
}

impl DataLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn tmp_dir(&self) -> PathBuf {
        self.root.join("tmp")
    }

    pub fn links_dir(&self) -> PathBuf {
        self.root.join("links")
    }

    pub fn pages_dir(&self) -> PathBuf {
        self.root.join("pages")
    }

    /// Download area for WAT files, shared by all segments.
    pub fn wat_dir(&self) -> PathBuf {
        self.tmp_dir().join("wat")
    }

    /// Cached copy of the archive's path listing.
    pub fn wat_paths_file(&self) -> PathBuf {
        self.root.join("wat.paths.gz")
    }

    /// Create the directory skeleton. Segment subdirectories are created
    /// lazily when a segment is first touched.
    pub fn ensure_base_dirs(&self) -> io::Result<()> {
        for dir in [
            self.root.clone(),
            self.tmp_dir(),
            self.wat_dir(),
            self.links_dir(),
            self.pages_dir(),
        ] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }

    pub fn segment_tmp_dir(&self, segment: &str) -> PathBuf {
        self.tmp_dir().join(segment)
    }

    pub fn segment_link_dir(&self, segment: &str) -> PathBuf {
        self.segment_tmp_dir(segment).join("link")
    }

    pub fn segment_page_dir(&self, segment: &str) -> PathBuf {
        self.segment_tmp_dir(segment).join("page")
    }

    pub fn link_intermediate(&self, segment: &str, number: &str) -> PathBuf {
        self.segment_link_dir(segment)
            .join(format!("{}{}", number, EXT_TXT_GZ))
    }

    pub fn page_intermediate(&self, segment: &str, number: &str) -> PathBuf {
        self.segment_page_dir(segment)
            .join(format!("{}{}", number, EXT_TXT_GZ))
    }

    /// Local download target for a remote WAT path.
    pub fn wat_download_path(&self, wat_path: &str) -> PathBuf {
        let base = wat_path.rsplit('/').next().unwrap_or(wat_path);
        self.wat_dir().join(base)
    }

    pub fn sort_file(&self, segment_id: u32) -> PathBuf {
        self.links_dir()
            .join(format!("sort_{}{}", segment_id, EXT_TXT_GZ))
    }

    pub fn compact_file(&self, segment_id: u32) -> PathBuf {
        self.links_dir()
            .join(format!("compact_{}{}", segment_id, EXT_TXT_GZ))
    }

    pub fn page_sort_file(&self, segment_id: u32) -> PathBuf {
        self.pages_dir()
            .join(format!("sort_{}{}", segment_id, EXT_TXT_GZ))
    }

    /// The finished `NNNNN.txt.gz` intermediates under `dir`, sorted by
    /// name. Temp files and strays are excluded.
    pub fn list_intermediates(dir: &Path) -> io::Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        if !dir.exists() {
            return Ok(files);
        }
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if intermediate_name_re().is_match(&name) {
                files.push(entry.path());
            }
        }
        files.sort();
        Ok(files)
    }

    /// Remove `dir` when it contains nothing. Returns whether it was
    /// removed.
    pub fn remove_dir_if_empty(dir: &Path) -> io::Result<bool> {
        if !dir.exists() {
            return Ok(false);
        }
        if std::fs::read_dir(dir)?.next().is_some() {
            return Ok(false);
        }
        std::fs::remove_dir(dir)?;
        Ok(true)
    }
}
