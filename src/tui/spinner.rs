use crate::app::SPINNER_FRAME_COUNT;

const BRAILLE_FRAMES: [char; SPINNER_FRAME_COUNT] =
    ['⠋', '⠙', '⠹', '⠸', '⠼', '⠴', '⠦', '⠧', '⠇', '⠏'];

/// Loading indicator frame for `idx`; wraps past the last frame.
pub fn frame(idx: usize) -> char {
    BRAILLE_FRAMES[idx % SPINNER_FRAME_COUNT]
}
