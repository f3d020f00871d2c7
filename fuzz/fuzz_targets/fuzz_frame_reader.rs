#![no_main]

use libfuzzer_sys::fuzz_target;
use std::io::Cursor;

fuzz_target!(|data: &[u8]| {
    // Try to parse arbitrary bytes as a frame file - this should either
    // succeed or fail gracefully, but NEVER panic or blow up allocation.
    if let Ok(mut reader) = todg3::frame::FrameFileReader::new(Cursor::new(data)) {
        // Read up to 100 frames to catch errors during payload decoding
        for _ in 0..100 {
            match reader.read_frame() {
                Ok(Some(_frame)) => {
                    // Successfully parsed a frame - continue
                }
                Ok(None) => {
                    // End of file - normal termination
                    break;
                }
                Err(_) => {
                    // Error parsing - acceptable, just break
                    break;
                }
            }
        }
    }
});
