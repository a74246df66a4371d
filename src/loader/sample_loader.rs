use std::path::{Path, PathBuf};
use std::thread;

use anyhow::Context;
use crossbeam_channel::Receiver;

use crate::audio::{SampleBuffer, SampleId};
use crate::pipeline::pitch::Pitch;

pub type LoadedSample = (Pitch, SampleId, SampleBuffer);
pub type LoadResult = anyhow::Result<Vec<LoadedSample>>;

/// `<Pitch>.wav` files in `dir`, sorted by pitch. Other files are skipped.
pub fn index_dir(dir: &Path) -> anyhow::Result<Vec<(Pitch, PathBuf)>> {
    let entries = std::fs::read_dir(dir).with_context(|| format!("reading sample dir {}", dir.display()))?;
    let mut found = Vec::new();
    for entry in entries {
        let path = entry?.path();
        let is_wav = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("wav"));
        if !is_wav {
            continue;
        }
        let Some(pitch) = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .and_then(|stem| stem.parse::<Pitch>().ok())
        else {
            log::debug!("skipping {}: name is not a pitch", path.display());
            continue;
        };
        found.push((pitch, path));
    }
    found.sort_by_key(|(pitch, _)| *pitch);
    Ok(found)
}

// Load a WAV from disk, prepare for registration with the engine
pub fn load(path: &Path, target_rate: u32) -> anyhow::Result<(SampleId, SampleBuffer)> {
    let id = SampleId::next();
    let buffer = SampleBuffer::load_wav(path, target_rate)?;
    Ok((id, buffer))
}

/// Decode a whole directory.
pub fn load_dir(dir: &Path, target_rate: u32) -> LoadResult {
    let files = index_dir(dir)?;
    anyhow::ensure!(!files.is_empty(), "no <pitch>.wav samples in {}", dir.display());
    files
        .into_iter()
        .map(|(pitch, path)| {
            let (id, buffer) = load(&path, target_rate)?;
            Ok((pitch, id, buffer))
        })
        .collect()
}

/// Same as `load_dir`, on a worker thread. The receiver yields exactly one result.
pub fn spawn_load(dir: PathBuf, target_rate: u32) -> Receiver<LoadResult> {
    let (tx, rx) = crossbeam_channel::bounded(1);
    thread::spawn(move || {
        let result = load_dir(&dir, target_rate);
        let _ = tx.send(result); // receiver may already be gone
    });
    rx
}
