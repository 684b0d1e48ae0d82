//! PMS7003 serial frames.
//!
//! Host-side codec for the sensor's UART protocol: the two passive-mode
//! commands the node sends, and a byte-at-a-time decoder for the 32-byte
//! data frame.  The ESP-IDF driver feeds UART bytes through
//! [`FrameDecoder`]; nothing here touches hardware.
//!
//! ```text
//!  0x42 0x4D  len(2)=28  data: 13 × u16 BE  checksum(2)
//!  └─ start ─┘            [3..=5] = PM1.0 / PM2.5 / PM10 atmospheric
//! ```

use super::PmFrame;

const START: [u8; 2] = [0x42, 0x4D];
const FRAME_LEN: usize = 32;
/// Value of the length field: data words plus checksum.
const PAYLOAD_LEN: u16 = 28;

/// Switch the sensor to passive mode (answer only when asked).
pub const CMD_PASSIVE_MODE: [u8; 7] = command(0xE1, 0x00);

/// Ask for one data frame in passive mode.
pub const CMD_REQUEST_READ: [u8; 7] = command(0xE2, 0x00);

const fn command(cmd: u8, data: u16) -> [u8; 7] {
    let [hi, lo] = data.to_be_bytes();
    let sum = START[0] as u16 + START[1] as u16 + cmd as u16 + hi as u16 + lo as u16;
    let [sum_hi, sum_lo] = sum.to_be_bytes();
    [START[0], START[1], cmd, hi, lo, sum_hi, sum_lo]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    /// Length field was not 28.
    BadLength(u16),
    /// Checksum mismatch; the frame was dropped.
    Checksum,
}

/// Resynchronising decoder.  Bytes before a start marker are skipped.
#[derive(Debug, Clone)]
pub struct FrameDecoder {
    buf: [u8; FRAME_LEN],
    len: usize,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self {
            buf: [0; FRAME_LEN],
            len: 0,
        }
    }

    pub fn reset(&mut self) {
        self.len = 0;
    }

    /// Feed one byte.  Returns a result once a whole frame has arrived.
    pub fn push(&mut self, byte: u8) -> Option<Result<PmFrame, FrameError>> {
        match self.len {
            0 if byte != START[0] => return None,
            1 if byte != START[1] => {
                // A repeated 0x42 may still be the start of a frame.
                self.len = usize::from(byte == START[0]);
                return None;
            }
            _ => {}
        }
        self.buf[self.len] = byte;
        self.len += 1;

        if self.len == 4 {
            let declared = u16::from_be_bytes([self.buf[2], self.buf[3]]);
            if declared != PAYLOAD_LEN {
                self.len = 0;
                return Some(Err(FrameError::BadLength(declared)));
            }
        }
        if self.len < FRAME_LEN {
            return None;
        }
        self.len = 0;
        Some(decode(&self.buf))
    }
}

fn decode(frame: &[u8; FRAME_LEN]) -> Result<PmFrame, FrameError> {
    let sum: u16 = frame[..FRAME_LEN - 2]
        .iter()
        .fold(0u16, |acc, &b| acc.wrapping_add(u16::from(b)));
    if sum != u16::from_be_bytes([frame[30], frame[31]]) {
        return Err(FrameError::Checksum);
    }
    let word = |i: usize| u16::from_be_bytes([frame[4 + 2 * i], frame[5 + 2 * i]]);
    Ok(PmFrame {
        pm1_0: word(3),
        pm2_5: word(4),
        pm10_0: word(5),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A well-formed frame with the given atmospheric values.
    fn frame(pm1_0: u16, pm2_5: u16, pm10_0: u16) -> [u8; FRAME_LEN] {
        let mut f = [0u8; FRAME_LEN];
        f[..4].copy_from_slice(&[0x42, 0x4D, 0x00, 0x1C]);
        // Standard-particle words differ from the atmospheric ones so a
        // wrong offset shows up.
        for (i, v) in [11u16, 12, 13, pm1_0, pm2_5, pm10_0].iter().enumerate() {
            f[4 + 2 * i..6 + 2 * i].copy_from_slice(&v.to_be_bytes());
        }
        let sum: u16 = f[..30].iter().map(|&b| u16::from(b)).sum();
        f[30..].copy_from_slice(&sum.to_be_bytes());
        f
    }

    fn feed(dec: &mut FrameDecoder, bytes: &[u8]) -> Vec<Result<PmFrame, FrameError>> {
        bytes.iter().filter_map(|&b| dec.push(b)).collect()
    }

    #[test]
    fn commands_match_datasheet() {
        assert_eq!(CMD_PASSIVE_MODE, [0x42, 0x4D, 0xE1, 0x00, 0x00, 0x01, 0x70]);
        assert_eq!(CMD_REQUEST_READ, [0x42, 0x4D, 0xE2, 0x00, 0x00, 0x01, 0x71]);
    }

    #[test]
    fn decodes_atmospheric_values() {
        let mut dec = FrameDecoder::new();
        let out = feed(&mut dec, &frame(3, 5, 8));
        assert_eq!(
            out,
            vec![Ok(PmFrame {
                pm1_0: 3,
                pm2_5: 5,
                pm10_0: 8
            })]
        );
    }

    #[test]
    fn skips_noise_before_start_marker() {
        let mut dec = FrameDecoder::new();
        let mut bytes = vec![0x00, 0x42, 0x42, 0x17];
        bytes.extend_from_slice(&[0x42]);
        bytes.extend_from_slice(&frame(1, 2, 3));
        let out = feed(&mut dec, &bytes);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].map(|f| f.pm10_0), Ok(3));
    }

    #[test]
    fn corrupted_frame_is_rejected() {
        let mut dec = FrameDecoder::new();
        let mut f = frame(3, 5, 8);
        f[12] ^= 0x01;
        assert_eq!(feed(&mut dec, &f), vec![Err(FrameError::Checksum)]);
        // The decoder recovers for the next frame.
        assert_eq!(feed(&mut dec, &frame(4, 4, 4)).len(), 1);
    }

    #[test]
    fn bad_length_field_rejected_early() {
        let mut dec = FrameDecoder::new();
        let out = feed(&mut dec, &[0x42, 0x4D, 0x00, 0x14]);
        assert_eq!(out, vec![Err(FrameError::BadLength(20))]);
    }
}
