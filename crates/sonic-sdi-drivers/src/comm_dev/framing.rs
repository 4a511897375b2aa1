//! Mailbox message framing.
//!
//! A message is a 4-byte header followed by a NUL terminated payload.
//! The header holds a 16-bit checksum and a 16-bit size, both little
//! endian. `size` counts the payload including its terminator. The
//! checksum is the two's complement of the 16-bit sum of the payload
//! bytes plus both bytes of `size`, so that summing everything (header
//! checksum included) yields zero.
//!
//! Everything here is pure; the bus side lives in [`super::mailbox`].

use sonic_sdi::{SdiError, SdiResult};

pub const HEADER_SIZE: usize = 4;
pub const MAX_PAYLOAD: usize = 4096;
pub const MAILBOX_SIZE: usize = HEADER_SIZE + MAX_PAYLOAD;

/// Checksum over `payload` and the declared `size`.
pub fn checksum(payload: &[u8], size: u16) -> u16 {
    let sum = payload
        .iter()
        .fold(0u16, |acc, b| acc.wrapping_add(u16::from(*b)));
    let sum = sum.wrapping_add(size & 0xff).wrapping_add(size >> 8);
    (!sum).wrapping_add(1)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MailboxHeader {
    pub checksum: u16,
    pub size: u16,
}

impl MailboxHeader {
    /// Header for an already terminated payload.
    ///
    /// # Errors
    ///
    /// `InvalidMessage` for an empty payload or one larger than the mailbox.
    pub fn for_payload(payload: &[u8]) -> SdiResult<Self> {
        if payload.is_empty() || payload.len() > MAX_PAYLOAD {
            return Err(SdiError::invalid_message(format!(
                "payload of {} bytes does not fit a {} byte mailbox",
                payload.len(),
                MAX_PAYLOAD
            )));
        }
        let size = payload.len() as u16;
        Ok(Self {
            checksum: checksum(payload, size),
            size,
        })
    }

    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let c = self.checksum.to_le_bytes();
        let s = self.size.to_le_bytes();
        [c[0], c[1], s[0], s[1]]
    }

    pub fn decode(bytes: [u8; HEADER_SIZE]) -> Self {
        Self {
            checksum: u16::from_le_bytes([bytes[0], bytes[1]]),
            size: u16::from_le_bytes([bytes[2], bytes[3]]),
        }
    }

    /// Payload length to read for this header.
    ///
    /// # Errors
    ///
    /// `InvalidMessage` when the declared size is zero or larger than the
    /// mailbox can hold. Must be checked before any payload read.
    pub fn payload_len(&self) -> SdiResult<usize> {
        let size = usize::from(self.size);
        if size == 0 || size > MAX_PAYLOAD {
            return Err(SdiError::invalid_message(format!(
                "declared size {} outside 1..={}",
                size, MAX_PAYLOAD
            )));
        }
        Ok(size)
    }

    /// True when `payload` matches the declared size and checksum.
    pub fn verify(&self, payload: &[u8]) -> bool {
        payload.len() == usize::from(self.size) && checksum(payload, self.size) == self.checksum
    }
}

/// Appends the terminator to `message`.
///
/// # Errors
///
/// `InvalidMessage` when the message contains a NUL byte (the receiver
/// would truncate it) or does not fit the mailbox once terminated.
pub fn terminate(message: &[u8]) -> SdiResult<Vec<u8>> {
    if let Some(pos) = message.iter().position(|b| *b == 0) {
        return Err(SdiError::invalid_message(format!(
            "message contains a NUL byte at {}",
            pos
        )));
    }
    if message.len() + 1 > MAX_PAYLOAD {
        return Err(SdiError::invalid_message(format!(
            "message of {} bytes exceeds {} byte payload",
            message.len(),
            MAX_PAYLOAD - 1
        )));
    }
    let mut payload = Vec::with_capacity(message.len() + 1);
    payload.extend_from_slice(message);
    payload.push(0);
    Ok(payload)
}

/// Message text of a verified payload: everything before the first NUL.
pub fn strip_terminator(mut payload: Vec<u8>) -> Vec<u8> {
    if let Some(pos) = payload.iter().position(|b| *b == 0) {
        payload.truncate(pos);
    }
    payload
}

/// One bus transaction of a segmented write, relative to the write start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    pub start: usize,
    pub len: usize,
}

impl Segment {
    pub fn range(&self) -> std::ops::Range<usize> {
        self.start..self.start + self.len
    }
}

/// Largest chunk a bus with the given block maximum accepts.
pub fn chunk_size(block_max: usize) -> usize {
    (block_max / 2).max(1)
}

/// Splits `len` bytes into consecutive chunks of at most `chunk` bytes.
pub fn segments(len: usize, chunk: usize) -> impl Iterator<Item = Segment> {
    let chunk = chunk.max(1);
    (0..len).step_by(chunk).map(move |start| Segment {
        start,
        len: chunk.min(len - start),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn frame(message: &[u8]) -> (MailboxHeader, Vec<u8>) {
        let payload = terminate(message).unwrap();
        (MailboxHeader::for_payload(&payload).unwrap(), payload)
    }

    #[test]
    fn test_hello_header() {
        let (header, payload) = frame(b"HELLO");
        assert_eq!(header.size, 6);
        let sum: u32 = b"HELLO\0".iter().map(|b| u32::from(*b)).sum::<u32>() + 6;
        let expected = ((!sum).wrapping_add(1) & 0xffff) as u16;
        assert_eq!(header.checksum, expected);
        assert!(header.verify(&payload));
        assert_eq!(strip_terminator(payload), b"HELLO".to_vec());
    }

    #[test]
    fn test_checksum_sums_to_zero() {
        let payload = b"service-tag-ABC1234\0";
        let header = MailboxHeader::for_payload(payload).unwrap();
        let total = payload
            .iter()
            .fold(header.checksum, |acc, b| acc.wrapping_add(u16::from(*b)))
            .wrapping_add(header.size & 0xff)
            .wrapping_add(header.size >> 8);
        assert_eq!(total, 0);
    }

    #[test]
    fn test_round_trip_and_single_bit_corruption() {
        let samples: Vec<Vec<u8>> = vec![
            b"x".to_vec(),
            b"firmware package 1.2.3".to_vec(),
            (1..=255u8).cycle().take(MAX_PAYLOAD - 1).collect(),
            vec![0xff; 700],
        ];
        for message in samples {
            let (header, payload) = frame(&message);
            let decoded = MailboxHeader::decode(header.encode());
            assert_eq!(decoded, header);
            assert!(decoded.verify(&payload));

            for bit in 0..16 {
                let corrupted = MailboxHeader {
                    checksum: header.checksum ^ (1 << bit),
                    ..header
                };
                assert!(!corrupted.verify(&payload), "bit {} undetected", bit);
            }
        }
    }

    #[test]
    fn test_size_is_part_of_checksum() {
        let (header, payload) = frame(b"abc");
        let truncated = MailboxHeader {
            size: header.size - 1,
            ..header
        };
        assert!(!truncated.verify(&payload[..payload.len() - 1]));
    }

    #[test]
    fn test_header_layout_is_little_endian() {
        let header = MailboxHeader {
            checksum: 0xa1b2,
            size: 0x0102,
        };
        assert_eq!(header.encode(), [0xb2, 0xa1, 0x02, 0x01]);
    }

    #[test]
    fn test_payload_len_limits() {
        let ok = MailboxHeader { checksum: 0, size: 4096 };
        assert_eq!(ok.payload_len().unwrap(), 4096);
        let big = MailboxHeader { checksum: 0, size: 5000 };
        assert!(matches!(big.payload_len(), Err(SdiError::InvalidMessage { .. })));
        let empty = MailboxHeader { checksum: 0, size: 0 };
        assert!(empty.payload_len().is_err());
    }

    #[test]
    fn test_terminate_rejects_bad_messages() {
        assert!(terminate(b"a\0b").is_err());
        assert!(terminate(&vec![b'a'; MAX_PAYLOAD]).is_err());
        assert_eq!(terminate(&vec![b'a'; MAX_PAYLOAD - 1]).unwrap().len(), MAX_PAYLOAD);
        assert_eq!(terminate(b"").unwrap(), vec![0]);
    }

    #[test]
    fn test_segments_tile_without_gaps() {
        for len in [0usize, 1, 15, 16, 17, 31, 32, 33, 4100, 9000] {
            for block_max in [2usize, 8, 32] {
                let chunk = chunk_size(block_max);
                let segs: Vec<_> = segments(len, chunk).collect();
                let mut next = 0;
                for s in &segs {
                    assert_eq!(s.start, next);
                    assert!(s.len >= 1 && s.len <= chunk);
                    next += s.len;
                }
                assert_eq!(next, len);
                assert_eq!(segs.len(), len.div_ceil(chunk));
            }
        }
    }

    #[test]
    fn test_nine_thousand_bytes_in_sixteen_byte_chunks() {
        let segs: Vec<_> = segments(9000, chunk_size(32)).collect();
        assert_eq!(segs.len(), 563);
        assert!(segs.iter().all(|s| s.len <= 16));
        assert_eq!(segs.last().unwrap().range(), 8992..9000);
    }
}
