//! Stream format extraction
//!
//! The decode session is bound to a format descriptor built from the two
//! out-of-band parameter blocks carried in the first segment's payload:
//! the sequence and picture parameter sets, each announced by a fixed
//! 4-byte start code followed by a type marker byte.

use crate::error::{Error, ParameterSetKind, Result};
use bytes::Bytes;

/// Fixed start-code marker preceding each parameter block
const START_CODE: [u8; 4] = [0x00, 0x00, 0x00, 0x01];
/// Type marker for a sequence parameter set (low five bits)
const SEQUENCE_PARAMETER_SET: u8 = 7;
/// Type marker for a picture parameter set (low five bits)
const PICTURE_PARAMETER_SET: u8 = 8;

/// Stream format descriptor: the two parameter blocks the decoder needs
/// before it can accept submissions.
#[derive(Debug, Clone, PartialEq)]
pub struct FormatDescriptor {
    pub sequence_parameter_set: Bytes,
    pub picture_parameter_set: Bytes,
}

impl FormatDescriptor {
    /// Locate both parameter blocks in a raw segment payload.
    ///
    /// Either block missing is a hard failure for the whole item load;
    /// there is no partial playback without a complete descriptor.
    pub fn from_payload(payload: &[u8]) -> Result<Self> {
        let mut sps: Option<Bytes> = None;
        let mut pps: Option<Bytes> = None;

        for (start, end) in ParameterBlockScan::new(payload) {
            let block = &payload[start..end];
            let Some(&marker) = block.first() else {
                continue;
            };
            match marker & 0x1F {
                SEQUENCE_PARAMETER_SET => sps = Some(Bytes::copy_from_slice(block)),
                PICTURE_PARAMETER_SET => pps = Some(Bytes::copy_from_slice(block)),
                _ => {}
            }
        }

        let sequence_parameter_set = sps.ok_or(Error::MissingParameterSet {
            kind: ParameterSetKind::Sequence,
        })?;
        let picture_parameter_set = pps.ok_or(Error::MissingParameterSet {
            kind: ParameterSetKind::Picture,
        })?;

        Ok(Self {
            sequence_parameter_set,
            picture_parameter_set,
        })
    }
}

/// Iterator over `(start, end)` byte ranges of blocks delimited by the
/// 4-byte start code.
struct ParameterBlockScan<'a> {
    payload: &'a [u8],
    pos: usize,
}

impl<'a> ParameterBlockScan<'a> {
    fn new(payload: &'a [u8]) -> Self {
        Self { payload, pos: 0 }
    }

    fn find_start_code(&self, from: usize) -> Option<usize> {
        self.payload[from..]
            .windows(START_CODE.len())
            .position(|w| w == START_CODE)
            .map(|offset| from + offset)
    }
}

impl<'a> Iterator for ParameterBlockScan<'a> {
    type Item = (usize, usize);

    fn next(&mut self) -> Option<(usize, usize)> {
        let code = self.find_start_code(self.pos)?;
        let start = code + START_CODE.len();
        let end = self
            .find_start_code(start)
            .unwrap_or(self.payload.len());
        self.pos = end;
        if start >= self.payload.len() {
            return None;
        }
        Some((start, end))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Payload with an SPS (marker 0x67), a PPS (marker 0x68), and a slice.
    pub fn annex_b_sample() -> Vec<u8> {
        let mut payload = Vec::new();
        payload.extend_from_slice(&START_CODE);
        payload.extend_from_slice(&[0x67, 0x42, 0x00, 0x1e]);
        payload.extend_from_slice(&START_CODE);
        payload.extend_from_slice(&[0x68, 0xce, 0x38, 0x80]);
        payload.extend_from_slice(&START_CODE);
        payload.extend_from_slice(&[0x65, 0x88, 0x84, 0x00]);
        payload
    }

    #[test]
    fn test_extracts_both_parameter_sets() {
        let format = FormatDescriptor::from_payload(&annex_b_sample()).unwrap();
        assert_eq!(&format.sequence_parameter_set[..], &[0x67, 0x42, 0x00, 0x1e]);
        assert_eq!(&format.picture_parameter_set[..], &[0x68, 0xce, 0x38, 0x80]);
    }

    #[test]
    fn test_missing_sequence_parameter_set() {
        let mut payload = Vec::new();
        payload.extend_from_slice(&START_CODE);
        payload.extend_from_slice(&[0x68, 0xce, 0x38, 0x80]);

        let err = FormatDescriptor::from_payload(&payload).unwrap_err();
        assert!(matches!(
            err,
            Error::MissingParameterSet {
                kind: ParameterSetKind::Sequence
            }
        ));
    }

    #[test]
    fn test_missing_picture_parameter_set() {
        let mut payload = Vec::new();
        payload.extend_from_slice(&START_CODE);
        payload.extend_from_slice(&[0x67, 0x42, 0x00, 0x1e]);

        let err = FormatDescriptor::from_payload(&payload).unwrap_err();
        assert!(matches!(
            err,
            Error::MissingParameterSet {
                kind: ParameterSetKind::Picture
            }
        ));
    }

    #[test]
    fn test_empty_payload() {
        assert!(FormatDescriptor::from_payload(&[]).is_err());
    }

    #[test]
    fn test_later_block_wins() {
        let mut payload = annex_b_sample();
        payload.extend_from_slice(&START_CODE);
        payload.extend_from_slice(&[0x67, 0x64, 0x00, 0x28]);

        let format = FormatDescriptor::from_payload(&payload).unwrap();
        assert_eq!(&format.sequence_parameter_set[..], &[0x67, 0x64, 0x00, 0x28]);
    }
}
