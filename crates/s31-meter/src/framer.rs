use crate::frame::{RawFrame, CHECKSUM_END, CHECKSUM_START, FRAME_LEN, HEADER_FLAGS_MIN, HEADER_OK, SYNC};

/// A 24 byte frame takes ~55ms at 4800 bps. Anything slower is a broken frame.
pub const SYNC_INTERVAL_MS: u32 = 1_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramerState {
    AwaitHeader,
    AwaitSync,
    Accumulate,
}

/// Resynchronising byte-stream framer.
pub struct Framer {
    state: FramerState,
    buf: [u8; FRAME_LEN],
    index: usize,
    sum: u8,
    last_byte_ms: Option<u32>,
}

impl Default for Framer {
    fn default() -> Self {
        Self::new()
    }
}

impl Framer {
    pub fn new() -> Self {
        Self {
            state: FramerState::AwaitHeader,
            buf: [0; FRAME_LEN],
            index: 0,
            sum: 0,
            last_byte_ms: None,
        }
    }

    pub fn state(&self) -> FramerState {
        self.state
    }

    pub fn reset(&mut self) {
        self.state = FramerState::AwaitHeader;
        self.index = 0;
        self.sum = 0;
    }

    /// Feed one byte received at `now_ms`. Returns a frame once 24 bytes are in.
    pub fn push(&mut self, byte: u8, now_ms: u32) -> Option<RawFrame> {
        if let Some(last) = self.last_byte_ms {
            if now_ms.wrapping_sub(last) > SYNC_INTERVAL_MS && self.state != FramerState::AwaitHeader {
                log::debug!("meter: dropping stale partial frame ({} bytes)", self.index);
                self.reset();
            }
        }
        self.last_byte_ms = Some(now_ms);

        match self.state {
            FramerState::AwaitHeader => {
                if byte != HEADER_OK && byte < HEADER_FLAGS_MIN {
                    return None;
                }
                self.buf[0] = byte;
                self.index = 1;
                self.state = FramerState::AwaitSync;
                None
            }
            FramerState::AwaitSync => {
                if byte != SYNC {
                    self.reset();
                    return None;
                }
                self.buf[1] = byte;
                self.index = 2;
                self.sum = 0;
                self.state = FramerState::Accumulate;
                None
            }
            FramerState::Accumulate => {
                if (CHECKSUM_START..=CHECKSUM_END).contains(&self.index) {
                    self.sum = self.sum.wrapping_add(byte);
                }
                self.buf[self.index] = byte;
                self.index += 1;
                if self.index < FRAME_LEN {
                    return None;
                }
                let frame = RawFrame { bytes: self.buf, sum: self.sum };
                self.reset();
                Some(frame)
            }
        }
    }
}
