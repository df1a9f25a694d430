use async_trait::async_trait;
use std::fmt;
use std::path::Path;

#[derive(Debug)]
pub enum TranscodeError {
    /// The transcoder process could not be started at all.
    Spawn(std::io::Error),
    /// The process ran and exited unsuccessfully.
    Failed { code: Option<i32>, output: String },
}

impl fmt::Display for TranscodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TranscodeError::Spawn(e) => write!(f, "failed to spawn transcoder: {}", e),
            TranscodeError::Failed { code, output } => match code {
                Some(code) => write!(f, "transcoder exited with {}: {}", code, output),
                None => write!(f, "transcoder killed by signal: {}", output),
            },
        }
    }
}

impl std::error::Error for TranscodeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TranscodeError::Spawn(e) => Some(e),
            TranscodeError::Failed { .. } => None,
        }
    }
}

/// External media transcoder. `transcode` must leave a DASH manifest named
/// `manifest.mpd` plus its segment files in `workdir`; `thumbnail` adds
/// `thumbnail.jpg`. Implementations own the argument set; callers only rely
/// on the produced filenames.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transcoder: Send + Sync {
    async fn transcode(&self, input: &Path, workdir: &Path) -> Result<(), TranscodeError>;

    async fn thumbnail(&self, input: &Path, workdir: &Path) -> Result<(), TranscodeError>;
}
