use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use image::codecs::jpeg::JpegEncoder;
use image::{ExtendedColorType, ImageEncoder};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::decode::RasterImage;
use crate::errors::{AppError, AppResult, CleanupWarning};

pub const DEFAULT_STAGING_DIR: &str = "temp";
pub const STAGED_JPEG_QUALITY: u8 = 95;

/// Writes face crops under a dedicated directory for the external verifier.
#[derive(Debug, Clone)]
pub struct Stager {
    dir: PathBuf,
    quality: u8,
}

impl Stager {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            quality: STAGED_JPEG_QUALITY,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn stage(&self, image: &RasterImage) -> AppResult<StagedFile> {
        fs::create_dir_all(&self.dir).map_err(|source| AppError::StageWrite {
            path: self.dir.clone(),
            source,
        })?;

        // The guard exists before the first byte is written so a failed
        // write never leaves a partial file behind.
        let staged = StagedFile::claim(self.dir.join(staged_file_name()));
        write_jpeg(staged.path(), image, self.quality)?;
        debug!(path = %staged.path().display(), "staged face crop");
        Ok(staged)
    }
}

impl Default for Stager {
    fn default() -> Self {
        Self::new(DEFAULT_STAGING_DIR)
    }
}

fn staged_file_name() -> String {
    format!("temp_{}_{}.jpg", Utc::now().timestamp(), Uuid::new_v4())
}

fn write_jpeg(path: &Path, image: &RasterImage, quality: u8) -> AppResult<()> {
    let file = File::create(path).map_err(|source| AppError::StageWrite {
        path: path.to_path_buf(),
        source,
    })?;
    let mut writer = BufWriter::new(file);
    let rgb = image.as_rgb();
    JpegEncoder::new_with_quality(&mut writer, quality)
        .write_image(rgb.as_raw(), rgb.width(), rgb.height(), ExtendedColorType::Rgb8)
        .map_err(|source| AppError::StageEncode {
            path: path.to_path_buf(),
            source,
        })?;
    writer.flush().map_err(|source| AppError::StageWrite {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(())
}

/// Exclusive owner of one staged file. The file is removed by [`release`]
/// or, failing that, when the guard is dropped.
///
/// [`release`]: StagedFile::release
#[derive(Debug)]
pub struct StagedFile {
    path: PathBuf,
    released: bool,
}

impl StagedFile {
    fn claim(path: PathBuf) -> Self {
        Self {
            path,
            released: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Delete the file if present. A failure is logged and handed back as a
    /// warning; it never becomes the call's error.
    pub fn release(mut self) -> Result<(), CleanupWarning> {
        self.released = true;
        remove_staged(&self.path)
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        if !self.released {
            self.released = true;
            let _ = remove_staged(&self.path);
        }
    }
}

fn remove_staged(path: &Path) -> Result<(), CleanupWarning> {
    match fs::remove_file(path) {
        Ok(()) => {
            debug!(path = %path.display(), "deleted staged file");
            Ok(())
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(source) => {
            let warning = CleanupWarning {
                path: path.to_path_buf(),
                source,
            };
            warn!(kind = %warning.kind(), "{warning}");
            Err(warning)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use std::collections::HashSet;
    use tempfile::TempDir;

    fn raster() -> RasterImage {
        RasterImage::from_rgb(RgbImage::from_pixel(16, 16, Rgb([120, 80, 40]))).unwrap()
    }

    fn entries(dir: &Path) -> usize {
        fs::read_dir(dir).map(|iter| iter.count()).unwrap_or(0)
    }

    #[test]
    fn stage_creates_directory_and_jpeg() {
        let tmp = TempDir::new().unwrap();
        let stager = Stager::new(tmp.path().join("nested/temp"));
        let staged = stager.stage(&raster()).unwrap();

        let bytes = fs::read(staged.path()).unwrap();
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
        let name = staged.path().file_name().unwrap().to_string_lossy();
        assert!(name.starts_with("temp_") && name.ends_with(".jpg"));

        staged.release().unwrap();
        assert_eq!(entries(stager.dir()), 0);
    }

    #[test]
    fn drop_removes_unreleased_file() {
        let tmp = TempDir::new().unwrap();
        let stager = Stager::new(tmp.path());
        let path = {
            let staged = stager.stage(&raster()).unwrap();
            staged.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[test]
    fn release_tolerates_missing_file() {
        let tmp = TempDir::new().unwrap();
        let stager = Stager::new(tmp.path());
        let staged = stager.stage(&raster()).unwrap();
        fs::remove_file(staged.path()).unwrap();
        assert!(staged.release().is_ok());
    }

    #[test]
    fn release_failure_is_a_warning() {
        let tmp = TempDir::new().unwrap();
        let stager = Stager::new(tmp.path());
        let staged = stager.stage(&raster()).unwrap();
        let path = staged.path().to_path_buf();
        // A directory in place of the file makes remove_file fail.
        fs::remove_file(&path).unwrap();
        fs::create_dir(&path).unwrap();

        let warning = staged.release().unwrap_err();
        assert_eq!(warning.path, path);
    }

    #[test]
    fn names_are_unique() {
        let names: HashSet<String> = (0..256).map(|_| staged_file_name()).collect();
        assert_eq!(names.len(), 256);
    }

    #[test]
    fn unwritable_directory_is_a_staging_error() {
        let tmp = TempDir::new().unwrap();
        let blocker = tmp.path().join("blocker");
        fs::write(&blocker, b"file, not a directory").unwrap();
        let stager = Stager::new(&blocker);

        let err = stager.stage(&raster()).unwrap_err();
        assert!(matches!(err, AppError::StageWrite { .. }));
    }
}
