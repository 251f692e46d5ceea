//! Interactive solver: shows the captcha to an operator and reads the answer.
//!
//! Only for attended runs. The stdin read happens on a blocking thread; the
//! fetcher bounds it with the solver timeout.

use crate::error::{FetchError, Result};
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct ManualSolver {
    prompt_dir: PathBuf,
}

impl ManualSolver {
    /// Captcha images are written as PNG files under `prompt_dir`.
    pub fn new(prompt_dir: impl Into<PathBuf>) -> Self {
        Self {
            prompt_dir: prompt_dir.into(),
        }
    }

    pub fn prompt_dir(&self) -> &Path {
        &self.prompt_dir
    }

    /// Decode the challenge image and save it where the operator can open it.
    fn write_prompt_image(&self, image: &[u8]) -> Result<PathBuf> {
        let decoded = image::load_from_memory(image).map_err(|e| {
            FetchError::SolverUnavailable(format!("Failed to decode captcha image: {}", e))
        })?;

        std::fs::create_dir_all(&self.prompt_dir)?;
        let path = self.prompt_dir.join(format!(
            "captcha-{}.png",
            chrono::Utc::now().timestamp_millis()
        ));
        decoded.save(&path).map_err(|e| {
            FetchError::SolverUnavailable(format!("Failed to write captcha image: {}", e))
        })?;
        Ok(path)
    }

    pub async fn solve(&self, image: &[u8]) -> Result<String> {
        let path = self.write_prompt_image(image)?;
        tracing::warn!("Captcha requires manual input, image saved to {:?}", path);

        let answer = tokio::task::spawn_blocking(move || -> std::io::Result<String> {
            let mut stderr = std::io::stderr();
            write!(stderr, "captcha saved to {}\nplease input code: ", path.display())?;
            stderr.flush()?;

            let mut line = String::new();
            std::io::stdin().read_line(&mut line)?;
            Ok(line)
        })
        .await
        .map_err(|e| FetchError::SolverUnavailable(format!("Input thread failed: {}", e)))??;

        Ok(answer.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, ImageFormat, Rgb};
    use std::io::Cursor;

    fn png_bytes() -> Vec<u8> {
        let img = ImageBuffer::from_pixel(8, 4, Rgb([200u8, 10, 10]));
        let mut out = Cursor::new(Vec::new());
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut out, ImageFormat::Png)
            .unwrap();
        out.into_inner()
    }

    #[test]
    fn test_prompt_image_is_written() {
        let dir = tempfile::tempdir().unwrap();
        let solver = ManualSolver::new(dir.path().join("prompts"));
        let path = solver.write_prompt_image(&png_bytes()).unwrap();

        assert!(path.starts_with(solver.prompt_dir()));
        let reloaded = image::open(&path).unwrap();
        assert_eq!((reloaded.width(), reloaded.height()), (8, 4));
    }

    #[test]
    fn test_undecodable_image_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let solver = ManualSolver::new(dir.path());
        let err = solver.write_prompt_image(b"definitely not an image").unwrap_err();
        assert!(matches!(err, FetchError::SolverUnavailable(_)));
    }
}
