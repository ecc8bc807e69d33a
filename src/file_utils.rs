use anyhow::Result;
use chrono::Local;
use std::fs;
use std::path::{Path, PathBuf};

// @module: Output directory layout and file utilities

// @struct: File operations utility
pub struct FileManager;

impl FileManager {
    // @checks: File existence
    pub fn file_exists<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref().exists() && path.as_ref().is_file()
    }

    // @checks: Directory existence
    pub fn dir_exists<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref().exists() && path.as_ref().is_dir()
    }

    // @creates: Directory and parents if needed
    pub fn ensure_dir<P: AsRef<Path>>(path: P) -> Result<()> {
        let path = path.as_ref();
        if !path.exists() {
            fs::create_dir_all(path)?;
        }
        Ok(())
    }

    // @generates: Timestamped run directory under a base output directory
    pub fn timestamped_run_dir<P: AsRef<Path>>(base: P) -> PathBuf {
        let stamp = Local::now().format("%Y%m%d_%H%M%S");
        base.as_ref().join(stamp.to_string())
    }
}

/// Pre-reserved artifact layout for one run.
///
/// Every job writes to a unique path derived from its kind and sequence
/// index, so concurrent writers never collide and no locking beyond path
/// allocation is needed.
#[derive(Debug, Clone)]
pub struct BundleLayout {
    root: PathBuf,
}

impl BundleLayout {
    /// Create the run directory tree and return the layout
    pub fn prepare<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        FileManager::ensure_dir(root.join("audio"))?;
        FileManager::ensure_dir(root.join("images"))?;
        FileManager::ensure_dir(root.join("bgm"))?;
        FileManager::ensure_dir(root.join("stock"))?;
        Ok(Self { root })
    }

    /// The run directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Narration file for one utterance
    pub fn audio_path(&self, sequence_index: usize, speaker_id: &str) -> PathBuf {
        self.root.join("audio").join(format!("line_{:03}_{}.wav", sequence_index, speaker_id))
    }

    /// Image file for one scene
    pub fn image_path(&self, scene_index: usize) -> PathBuf {
        self.root.join("images").join(format!("scene_{:03}.png", scene_index))
    }

    /// The single background-music track
    pub fn bgm_path(&self) -> PathBuf {
        self.root.join("bgm").join("bgm.mp3")
    }

    /// Stock clip for one scene
    pub fn stock_path(&self, scene_index: usize) -> PathBuf {
        self.root.join("stock").join(format!("stock_{:03}.mp4", scene_index))
    }

    /// The editing-bundle timeline table
    pub fn timeline_path(&self) -> PathBuf {
        self.root.join("timeline.csv")
    }

    /// The render-mode hand-off manifest
    pub fn manifest_path(&self) -> PathBuf {
        self.root.join("render_manifest.json")
    }
}
