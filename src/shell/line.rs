//! Line accumulator for the serial console
//!
//! Collects bytes until a carriage return or line feed. Handles the editing
//! keys a terminal emulator sends for backspace.

use crate::config::shell::MAX_LINE_LEN;
use heapless::Vec;

const BACKSPACE: u8 = 0x08;
const DELETE: u8 = 0x7F;

/// Accumulates console input and extracts complete lines.
///
/// A line longer than [`MAX_LINE_LEN`] is dropped in full: everything up to
/// the next terminator is discarded.
pub struct LineAccumulator {
    buffer: Vec<u8, MAX_LINE_LEN>,
    overflowed: bool,
}

impl LineAccumulator {
    pub fn new() -> Self {
        Self {
            buffer: Vec::new(),
            overflowed: false,
        }
    }

    /// Push a byte into the accumulator.
    ///
    /// Returns `Some(line)` when a terminator completes a non-empty line.
    pub fn push(&mut self, byte: u8) -> Option<Vec<u8, MAX_LINE_LEN>> {
        match byte {
            b'\r' | b'\n' => {
                if core::mem::take(&mut self.overflowed) {
                    log::warn!("Shell: line too long, discarded");
                    self.buffer.clear();
                    return None;
                }
                if self.buffer.is_empty() {
                    // Blank line, or the \n of a \r\n pair
                    return None;
                }
                Some(core::mem::take(&mut self.buffer))
            }
            BACKSPACE | DELETE => {
                self.buffer.pop();
                None
            }
            _ => {
                if self.overflowed {
                    return None;
                }
                if self.buffer.push(byte).is_err() {
                    self.buffer.clear();
                    self.overflowed = true;
                }
                None
            }
        }
    }

    /// Discard any partial line.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.overflowed = false;
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }
}

impl Default for LineAccumulator {
    fn default() -> Self {
        Self::new()
    }
}
