use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::errors::RecResult;

pub fn model_path(dir: &Path, model_name: &str) -> PathBuf {
    dir.join(format!("als_{model_name}.gz"))
}

/// Hidden sibling of the model file, unique per process and call.
fn tmp_path(dir: &Path, model_name: &str) -> PathBuf {
    dir.join(format!(
        ".als_{model_name}.gz.{}.{:08x}.tmp",
        std::process::id(),
        rand::random::<u32>()
    ))
}

/// Writes to a sibling temp file then renames it over the target, so readers
/// see either the old model or the new one.
pub fn save_model<T: Serialize>(model: &T, dir: &Path, model_name: &str) -> RecResult<PathBuf> {
    fs::create_dir_all(dir)?;
    let model_path = model_path(dir, model_name);
    let tmp_path = tmp_path(dir, model_name);
    let model_bytes: Vec<u8> = bincode::serialize(model)?;
    {
        let file = File::create(&tmp_path)?;
        let mut encoder = GzEncoder::new(BufWriter::new(file), Compression::new(1));
        encoder.write_all(&model_bytes)?;
        let mut writer = encoder.finish()?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
    }
    if let Err(e) = fs::rename(&tmp_path, &model_path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(e.into());
    }
    log::info!("Save `{model_name}` model to `{}`", model_path.display());
    Ok(model_path)
}

/// `Ok(None)` when no model has been saved under `model_name`.
pub fn load_model<T: DeserializeOwned>(dir: &Path, model_name: &str) -> RecResult<Option<T>> {
    let model_path = model_path(dir, model_name);
    let file = match File::open(&model_path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let mut decoder = GzDecoder::new(BufReader::new(file));
    let mut model_bytes: Vec<u8> = Vec::new();
    decoder.read_to_end(&mut model_bytes)?;
    let model: T = bincode::deserialize(&model_bytes)?;
    log::info!("Load `{model_name}` model from `{}`", model_path.display());
    Ok(Some(model))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::RecError;

    #[test]
    fn test_save_and_load() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let model = vec![(String::from("a"), 1.5f32), (String::from("b"), -2.0)];
        let path = save_model(&model, dir.path(), "dishes")?;
        assert!(path.ends_with("als_dishes.gz"));
        let loaded: Option<Vec<(String, f32)>> = load_model(dir.path(), "dishes")?;
        assert_eq!(loaded, Some(model));
        let files: Vec<_> = fs::read_dir(dir.path())?
            .map(|e| e.map(|e| e.file_name()))
            .collect::<Result<_, _>>()?;
        assert_eq!(files, vec![std::ffi::OsString::from("als_dishes.gz")]);
        Ok(())
    }

    #[test]
    fn test_concurrent_saves() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        assert_ne!(tmp_path(dir.path(), "dishes"), tmp_path(dir.path(), "dishes"));
        std::thread::scope(|s| {
            let handles: Vec<_> = (0..4u32)
                .map(|i| {
                    let dir = dir.path();
                    s.spawn(move || save_model(&vec![i; 1000], dir, "dishes"))
                })
                .collect();
            for h in handles {
                assert!(h.join().unwrap().is_ok());
            }
        });
        let loaded: Option<Vec<u32>> = load_model(dir.path(), "dishes")?;
        let loaded = loaded.ok_or("model not saved")?;
        assert_eq!(loaded.len(), 1000);
        assert!(loaded.iter().all(|&v| v == loaded[0]));
        assert_eq!(fs::read_dir(dir.path())?.count(), 1);
        Ok(())
    }

    #[test]
    fn test_overwrite_replaces_model() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        save_model(&vec![1u32, 2, 3, 4, 5, 6, 7, 8], dir.path(), "restaurants")?;
        save_model(&vec![9u32], dir.path(), "restaurants")?;
        let loaded: Option<Vec<u32>> = load_model(dir.path(), "restaurants")?;
        assert_eq!(loaded, Some(vec![9]));
        Ok(())
    }

    #[test]
    fn test_missing_and_corrupt() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let missing: Option<Vec<u32>> = load_model(dir.path(), "dishes")?;
        assert!(missing.is_none());

        fs::write(model_path(dir.path(), "dishes"), b"not gzip at all")?;
        let corrupt: RecResult<Option<Vec<u32>>> = load_model(dir.path(), "dishes");
        assert!(matches!(corrupt, Err(RecError::Io(_))));
        Ok(())
    }
}
