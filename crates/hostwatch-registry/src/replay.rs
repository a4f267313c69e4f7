//! Recorded sweeps replayed from a JSON-lines file.
//!
//! Each line holds one sweep as an array of observations:
//!
//! ```text
//! [{"ip": "192.168.1.20", "mac": "00:11:22:33:44:55"}]
//! []
//! ```
//!
//! A blank line is an empty sweep.

use std::path::Path;

use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader, Lines};

use crate::error::{RegistryError, Result};
use crate::scheduler::{Observation, ObservationSource};

pub struct ReplaySource {
    lines: Lines<BufReader<File>>,
    line: usize,
}

impl ReplaySource {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path.as_ref()).await?;
        tracing::info!(path = %path.as_ref().display(), "Replaying recorded sweeps");
        Ok(Self {
            lines: BufReader::new(file).lines(),
            line: 0,
        })
    }
}

impl ObservationSource for ReplaySource {
    async fn next_sweep(&mut self) -> Result<Option<Vec<Observation>>> {
        let Some(raw) = self.lines.next_line().await? else {
            return Ok(None);
        };
        self.line += 1;

        if raw.trim().is_empty() {
            return Ok(Some(Vec::new()));
        }

        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|source| RegistryError::Replay {
                line: self.line,
                source,
            })
    }
}
