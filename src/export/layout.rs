//! Frame-file layout planning.
//!
//! Pure functions deciding how an observation's frames are grouped into
//! files. No I/O and no collectives happen here; the group's designated
//! rank computes the plan once and broadcasts it, so the result must be
//! fully determined by the arguments.

use serde::{Deserialize, Serialize};

/// Estimated serialized size of one sample, in bytes.
///
/// `n_streams` counts the detector-keyed value streams being exported: the
/// primary signal plus each extra flavor.
pub fn bytes_per_sample(n_det: usize, n_streams: usize) -> usize {
    // Per sample:
    //   - 1 x 8 bytes timestamp
    //   - 1 x 1 byte common flags
    //   - 4 x 8 bytes boresight RA/DEC quats
    //   - 4 x 8 bytes boresight Az/El quats
    //   - 2 x 8 bytes boresight Az/El angles
    //   - 3 x 8 bytes telescope position
    //   - 3 x 8 bytes telescope velocity
    //   - 8 bytes x detectors x streams
    8 + 1 + 32 + 48 + 24 + 24 + 8 * n_det * n_streams
}

/// File and frame offsets for one observation's output files.
///
/// `file_sample_offs` and `file_frame_offs` have one entry per output file;
/// `frame_sample_offs` has one entry per frame, independent of the file
/// grouping. All three are strictly increasing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileLayout {
    /// Starting sample index of each file
    pub file_sample_offs: Vec<usize>,
    /// Index into the frame-size sequence of each file's first frame
    pub file_frame_offs: Vec<usize>,
    /// Starting sample index of every frame
    pub frame_sample_offs: Vec<usize>,
}

impl FileLayout {
    /// Number of output files
    pub fn n_files(&self) -> usize {
        self.file_frame_offs.len()
    }

    /// Number of frames assigned to file `ifile`
    ///
    /// `total_frames` is the length of the frame-size sequence; the last
    /// file takes every frame after its offset.
    pub fn frames_in_file(&self, ifile: usize, total_frames: usize) -> usize {
        if ifile + 1 == self.file_frame_offs.len() {
            total_frames - self.file_frame_offs[ifile]
        } else {
            self.file_frame_offs[ifile + 1] - self.file_frame_offs[ifile]
        }
    }
}

/// Group frames into files not exceeding `target_file_size` bytes.
///
/// Greedy accumulation: frames are taken in order and a new file starts
/// whenever adding the next frame would push the current file past the
/// target and the file already holds at least one frame. A frame whose own
/// estimate exceeds the target therefore lands alone in its own file; it is
/// never dropped or split. The small observation and calibration frames at
/// the head of each file are ignored by the estimate.
pub fn compute_file_frames(
    sample_bytes: usize,
    frame_sizes: &[usize],
    target_file_size: usize,
) -> FileLayout {
    let mut file_sample_offs = Vec::new();
    let mut file_frame_offs = Vec::new();
    let mut frame_sample_offs = Vec::with_capacity(frame_sizes.len());

    let mut offset = 0usize;
    let mut file_bytes = 0usize;
    for (iframe, &nsamp) in frame_sizes.iter().enumerate() {
        frame_sample_offs.push(offset);
        let frame_bytes = nsamp * sample_bytes;
        if file_frame_offs.is_empty() || (file_bytes > 0 && file_bytes + frame_bytes > target_file_size)
        {
            file_sample_offs.push(offset);
            file_frame_offs.push(iframe);
            file_bytes = 0;
        }
        file_bytes += frame_bytes;
        offset += nsamp;
    }

    // A zero-frame observation still gets a single (header-only) file.
    if file_frame_offs.is_empty() {
        file_sample_offs.push(0);
        file_frame_offs.push(0);
    }

    FileLayout {
        file_sample_offs,
        file_frame_offs,
        frame_sample_offs,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_bytes_per_sample_structure() {
        // fixed overhead only
        assert_eq!(bytes_per_sample(0, 1), 137);
        // one stream for two detectors adds 16 bytes
        assert_eq!(bytes_per_sample(2, 1), 153);
        assert_eq!(bytes_per_sample(2, 3), 185);
    }

    #[test]
    fn test_single_file_when_target_is_large() {
        let layout = compute_file_frames(100, &[400, 400, 200], usize::MAX);
        assert_eq!(layout.file_sample_offs, vec![0]);
        assert_eq!(layout.file_frame_offs, vec![0]);
        assert_eq!(layout.frame_sample_offs, vec![0, 400, 800]);
        assert_eq!(layout.frames_in_file(0, 3), 3);
    }

    #[test]
    fn test_greedy_grouping_against_byte_budget() {
        // frames of 40_000 / 40_000 / 20_000 bytes against a 90_000 target:
        // the first two share a file, the third starts a new one
        let layout = compute_file_frames(100, &[400, 400, 200], 90_000);
        assert_eq!(layout.file_frame_offs, vec![0, 2]);
        assert_eq!(layout.file_sample_offs, vec![0, 800]);
        assert_eq!(layout.frames_in_file(0, 3), 2);
        assert_eq!(layout.frames_in_file(1, 3), 1);
    }

    #[test]
    fn test_oversized_frame_gets_its_own_file() {
        // middle frame alone exceeds the target; neighbours are not pulled in
        let layout = compute_file_frames(10, &[5, 1000, 5], 100);
        assert_eq!(layout.file_frame_offs, vec![0, 1, 2]);
        assert_eq!(layout.file_sample_offs, vec![0, 5, 1005]);
    }

    #[test]
    fn test_zero_frames_yields_one_empty_file() {
        let layout = compute_file_frames(100, &[], 1000);
        assert_eq!(layout.file_sample_offs, vec![0]);
        assert_eq!(layout.file_frame_offs, vec![0]);
        assert!(layout.frame_sample_offs.is_empty());
        assert_eq!(layout.frames_in_file(0, 0), 0);
    }

    proptest! {
        // Every frame lands in exactly one file and offsets stay consistent,
        // for arbitrary frame sizes and targets.
        #[test]
        fn prop_every_frame_covered_once(
            frame_sizes in prop::collection::vec(0usize..5000, 1..40),
            sample_bytes in 1usize..500,
            target in 1usize..1_000_000,
        ) {
            let layout = compute_file_frames(sample_bytes, &frame_sizes, target);
            let total_frames = frame_sizes.len();

            prop_assert_eq!(layout.frame_sample_offs.len(), total_frames);
            prop_assert_eq!(layout.file_sample_offs.len(), layout.file_frame_offs.len());
            prop_assert!(!layout.file_frame_offs.is_empty());
            prop_assert_eq!(layout.file_frame_offs[0], 0);

            // file frame offsets strictly increase and stay in range
            for pair in layout.file_frame_offs.windows(2) {
                prop_assert!(pair[0] < pair[1]);
            }
            prop_assert!(*layout.file_frame_offs.last().unwrap() < total_frames);

            // per-file frame counts cover the sequence exactly once
            let covered: usize = (0..layout.n_files())
                .map(|i| layout.frames_in_file(i, total_frames))
                .sum();
            prop_assert_eq!(covered, total_frames);

            // frame sample offsets are the running sum of frame sizes
            let mut expect = 0usize;
            for (i, &nsamp) in frame_sizes.iter().enumerate() {
                prop_assert_eq!(layout.frame_sample_offs[i], expect);
                expect += nsamp;
            }

            // each file starts at the sample offset of its first frame
            for (ifile, &iframe) in layout.file_frame_offs.iter().enumerate() {
                prop_assert_eq!(layout.file_sample_offs[ifile], layout.frame_sample_offs[iframe]);
            }
        }

        // No file exceeds the target unless it holds a single oversized frame.
        #[test]
        fn prop_files_respect_target_or_hold_one_frame(
            frame_sizes in prop::collection::vec(1usize..5000, 1..40),
            sample_bytes in 1usize..500,
            target in 1usize..1_000_000,
        ) {
            let layout = compute_file_frames(sample_bytes, &frame_sizes, target);
            let total_frames = frame_sizes.len();
            for ifile in 0..layout.n_files() {
                let first = layout.file_frame_offs[ifile];
                let count = layout.frames_in_file(ifile, total_frames);
                let bytes: usize = frame_sizes[first..first + count]
                    .iter()
                    .map(|&n| n * sample_bytes)
                    .sum();
                prop_assert!(bytes <= target || count == 1);
            }
        }
    }
}
