//! Merge progress reported through `-progress pipe:2`.

/// Snapshot of one `-progress` block.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FfmpegProgress {
    /// Output position in milliseconds
    pub out_time_ms: i64,
    /// Set once FFmpeg reports `progress=end`
    pub is_complete: bool,
}

impl FfmpegProgress {
    /// Percent of `total_duration_ms` encoded so far, capped at 100.
    pub fn percentage(&self, total_duration_ms: i64) -> f64 {
        if self.is_complete {
            return 100.0;
        }
        if total_duration_ms <= 0 {
            return 0.0;
        }
        ((self.out_time_ms.max(0) as f64 / total_duration_ms as f64) * 100.0).min(100.0)
    }

    /// Fold one `key=value` line into the snapshot.
    ///
    /// Returns the finished snapshot when the line closes a block.
    pub(crate) fn apply_line(&mut self, line: &str) -> Option<FfmpegProgress> {
        let (key, value) = line.trim().split_once('=')?;
        match key {
            // Both keys carry microseconds in current FFmpeg builds
            "out_time_us" | "out_time_ms" => {
                if let Ok(us) = value.parse::<i64>() {
                    self.out_time_ms = us / 1000;
                }
                None
            }
            "progress" => {
                self.is_complete = value == "end";
                Some(*self)
            }
            _ => None,
        }
    }
}
