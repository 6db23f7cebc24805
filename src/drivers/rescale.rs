// External image rescaler.
//
// ImageMagick keeps 16-bit greyscale intact where most in-process
// libraries would quantise to 8 bits. Each call gets its own scratch
// directory, so concurrent workers never share a file.

use std::path::PathBuf;
use std::process::Command;

use crate::error::{Error, Result};

pub trait Rescaler: Send + Sync {
    /// Scale a PNG to `percent`% of its size and return the new PNG.
    fn rescale(&self, png: &[u8], percent: u32) -> Result<Vec<u8>>;
}

#[derive(Debug, Clone)]
pub struct ImageMagick {
    program: String,
    scratch_dir: Option<PathBuf>,
}

impl ImageMagick {
    pub fn new(program: impl Into<String>, scratch_dir: Option<PathBuf>) -> Self {
        Self {
            program: program.into(),
            scratch_dir,
        }
    }

    fn scratch(&self) -> Result<tempfile::TempDir> {
        let builder = {
            let mut b = tempfile::Builder::new();
            b.prefix("stackview-");
            b
        };
        let dir = match &self.scratch_dir {
            Some(dir) => builder.tempdir_in(dir),
            None => builder.tempdir(),
        };
        dir.map_err(|e| Error::ExternalTool(format!("no scratch directory: {e}")))
    }
}

impl Rescaler for ImageMagick {
    fn rescale(&self, png: &[u8], percent: u32) -> Result<Vec<u8>> {
        let scratch = self.scratch()?;
        let input = scratch.path().join("in.png");
        let output = scratch.path().join("out.png");
        std::fs::write(&input, png)?;

        let result = Command::new(&self.program)
            .arg(&input)
            .arg("-scale")
            .arg(format!("{percent}%"))
            .arg(&output)
            .output()
            .map_err(|e| Error::ExternalTool(format!("cannot run {}: {e}", self.program)))?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(Error::ExternalTool(format!(
                "{} exited with {}: {}",
                self.program,
                result.status,
                stderr.trim()
            )));
        }

        let scaled = std::fs::read(&output).map_err(|e| {
            Error::ExternalTool(format!("{} wrote no output: {e}", self.program))
        })?;
        log::debug!(
            "downscale: {} {}% {} -> {} bytes",
            self.program,
            percent,
            png.len(),
            scaled.len()
        );
        Ok(scaled)
    }
}
