//! Repository discovery and store layout.

use std::path::{Path, PathBuf};
use std::time::Duration;

use hg_utils::lockfile::RepoLock;

use crate::pathencode::encode_filename;
use crate::{Changelog, FileLog, ManifestLog, RepoError};

/// Store-affecting requirements this implementation understands.
const SUPPORTED_REQUIREMENTS: &[&str] = &[
    "revlogv1",
    "store",
    "generaldelta",
    "fncache",
    "dotencode",
];

/// Requirements written into freshly initialized repositories.
const DEFAULT_REQUIREMENTS: &[&str] = &["revlogv1", "store", "generaldelta"];

/// An opened repository: the `.hg` control directory and its store.
#[derive(Debug)]
pub struct HgRepository {
    root: PathBuf,
    hg_dir: PathBuf,
    store_dir: PathBuf,
    requirements: Vec<String>,
}

impl HgRepository {
    /// Open the repository containing `dir`, searching upward for the
    /// `.hg` control directory.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, RepoError> {
        let start = dir.as_ref();
        let mut current = Some(start);
        while let Some(candidate) = current {
            let hg_dir = candidate.join(".hg");
            if hg_dir.is_dir() {
                return Self::open_at(candidate.to_path_buf(), hg_dir);
            }
            current = candidate.parent();
        }
        Err(RepoError::NotFound(start.to_path_buf()))
    }

    fn open_at(root: PathBuf, hg_dir: PathBuf) -> Result<Self, RepoError> {
        let requirements = read_requirements(&hg_dir.join("requires"))?;
        for requirement in &requirements {
            if !SUPPORTED_REQUIREMENTS.contains(&requirement.as_str()) {
                return Err(RepoError::UnsupportedRequirement(requirement.clone()));
            }
        }
        // Without the "store" requirement revlogs live directly under
        // `.hg`, an ancient layout that predates filename encoding.
        let store_dir = if requirements.iter().any(|r| r == "store") {
            hg_dir.join("store")
        } else {
            hg_dir.clone()
        };
        Ok(Self {
            root,
            hg_dir,
            store_dir,
            requirements,
        })
    }

    /// Create an empty repository at `dir` and open it.
    pub fn init(dir: impl AsRef<Path>) -> Result<Self, RepoError> {
        let root = dir.as_ref().to_path_buf();
        let hg_dir = root.join(".hg");
        if hg_dir.exists() {
            return Err(RepoError::AlreadyExists(root));
        }
        std::fs::create_dir_all(hg_dir.join("store").join("data"))?;
        std::fs::write(
            hg_dir.join("requires"),
            DEFAULT_REQUIREMENTS.join("\n") + "\n",
        )?;
        Self::open(&root)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn hg_dir(&self) -> &Path {
        &self.hg_dir
    }

    pub fn store_dir(&self) -> &Path {
        &self.store_dir
    }

    pub fn requirements(&self) -> &[String] {
        &self.requirements
    }

    /// Open the changelog (`store/00changelog.i`).
    pub fn changelog(&self) -> Result<Changelog, RepoError> {
        Changelog::open(self.store_dir.join("00changelog.i"))
    }

    /// Open the manifest log (`store/00manifest.i`).
    pub fn manifestlog(&self) -> Result<ManifestLog, RepoError> {
        ManifestLog::open(self.store_dir.join("00manifest.i"))
    }

    /// Open the history of one tracked file.
    pub fn filelog(&self, tracked_path: &[u8]) -> Result<FileLog, RepoError> {
        FileLog::open(self.filelog_index_path(tracked_path), tracked_path)
    }

    /// Where a tracked path's revlog index lives in the store.
    pub fn filelog_index_path(&self, tracked_path: &[u8]) -> PathBuf {
        let mut encoded = encode_filename(tracked_path);
        encoded.extend_from_slice(b".i");
        // The encoding never produces non-UTF-8 output: high bytes are
        // hex-escaped.
        self.store_dir
            .join("data")
            .join(String::from_utf8_lossy(&encoded).as_ref())
    }

    /// Take the advisory writer lock. Readers never call this.
    pub fn lock(&self, timeout: Duration) -> Result<RepoLock, RepoError> {
        Ok(RepoLock::acquire(self.store_dir.join("lock"), timeout)?)
    }
}

fn read_requirements(path: &Path) -> Result<Vec<String>, RepoError> {
    match std::fs::read_to_string(path) {
        Ok(text) => Ok(text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect()),
        // A repository without a requires file is a pre-requirements
        // one; treat it as the oldest supported layout.
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_then_open() {
        let dir = tempfile::tempdir().unwrap();
        let repo = HgRepository::init(dir.path()).unwrap();
        assert_eq!(repo.root(), dir.path());
        assert!(repo.store_dir().ends_with(".hg/store"));
        assert!(repo.requirements().contains(&"store".to_string()));

        let reopened = HgRepository::open(dir.path()).unwrap();
        assert_eq!(reopened.store_dir(), repo.store_dir());
    }

    #[test]
    fn open_discovers_upward() {
        let dir = tempfile::tempdir().unwrap();
        HgRepository::init(dir.path()).unwrap();
        let nested = dir.path().join("deep/inner");
        std::fs::create_dir_all(&nested).unwrap();
        let repo = HgRepository::open(&nested).unwrap();
        assert_eq!(repo.root(), dir.path());
    }

    #[test]
    fn missing_repository() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            HgRepository::open(dir.path().join("nowhere")),
            Err(RepoError::NotFound(_))
        ));
    }

    #[test]
    fn double_init_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        HgRepository::init(dir.path()).unwrap();
        assert!(matches!(
            HgRepository::init(dir.path()),
            Err(RepoError::AlreadyExists(_))
        ));
    }

    #[test]
    fn unknown_requirement_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        HgRepository::init(dir.path()).unwrap();
        std::fs::write(
            dir.path().join(".hg/requires"),
            "revlogv1\nstore\nexotic-future-format\n",
        )
        .unwrap();
        match HgRepository::open(dir.path()) {
            Err(RepoError::UnsupportedRequirement(r)) => {
                assert_eq!(r, "exotic-future-format");
            }
            other => panic!("unexpected result: {:?}", other.err()),
        }
    }

    #[test]
    fn filelog_paths_are_encoded() {
        let dir = tempfile::tempdir().unwrap();
        let repo = HgRepository::init(dir.path()).unwrap();
        let path = repo.filelog_index_path(b"src/Main_File.rs");
        assert!(path.ends_with("store/data/src/_main___file.rs.i"));
    }

    #[test]
    fn lock_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let repo = HgRepository::init(dir.path()).unwrap();
        let lock = repo.lock(Duration::from_millis(50)).unwrap();
        assert!(repo.store_dir().join("lock").exists());
        drop(lock);
        assert!(!repo.store_dir().join("lock").exists());
    }
}
