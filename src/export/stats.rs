use std::fmt;

/// Statistics from a completed export
///
/// Counts are accumulated on the designated rank of each scope; on other
/// ranks only `observations` is meaningful.
#[derive(Debug, Clone, Default)]
pub struct ExportStats {
    /// Number of observations exported
    pub observations: usize,
    /// Number of frame files written
    pub files_written: usize,
    /// Number of Scan (data) frames written
    pub frames_written: usize,
    /// Total size of the written files in bytes
    pub bytes_written: u64,
}

impl fmt::Display for ExportStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "exported {} observation(s): {} file(s), {} data frame(s), {} bytes",
            self.observations, self.files_written, self.frames_written, self.bytes_written
        )
    }
}
