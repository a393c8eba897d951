use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

pub fn default_lock_path() -> PathBuf {
    std::env::temp_dir().join("jamtune_audio.lock")
}

/// Exclusive claim on the audio device, held for the life of the value.
#[derive(Debug)]
pub struct AudioLock {
    file: File,
    path: PathBuf,
}

impl AudioLock {
    /// Returns `Ok(None)` when another process already holds the lock.
    pub fn try_acquire(path: &Path) -> io::Result<Option<Self>> {
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(path)?;

        if let Err(e) = file.try_lock_exclusive() {
            if e.raw_os_error() == fs2::lock_contended_error().raw_os_error() {
                debug!(path = %path.display(), "audio lock held elsewhere");
                return Ok(None);
            }
            return Err(e);
        }

        file.set_len(0)?;
        write!(file, "{}", std::process::id())?;
        Ok(Some(Self {
            file,
            path: path.to_path_buf(),
        }))
    }
}

impl Drop for AudioLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
        let _ = std::fs::remove_file(&self.path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_acquire_is_refused_until_release() {
        let path = std::env::temp_dir().join(format!("jamtune-lock-{}", std::process::id()));
        let first = AudioLock::try_acquire(&path).unwrap();
        assert!(first.is_some());
        assert!(AudioLock::try_acquire(&path).unwrap().is_none());

        drop(first);
        let again = AudioLock::try_acquire(&path).unwrap();
        assert!(again.is_some());
    }
}
