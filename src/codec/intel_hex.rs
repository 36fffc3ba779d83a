use log::trace;

use super::{HexCodec, ParseError};
use crate::{Region, RegionSet};

const RECORD_DATA: u8 = 0x00;
const RECORD_EOF: u8 = 0x01;
const RECORD_EXTENDED_SEGMENT: u8 = 0x02;
const RECORD_START_SEGMENT: u8 = 0x03;
const RECORD_EXTENDED_LINEAR: u8 = 0x04;
const RECORD_START_LINEAR: u8 = 0x05;

const BANK_SIZE: usize = 0x1_0000;

/// Intel HEX codec.
///
/// Output always uses extended linear address records, one per 64 KiB bank
/// touched, with `bytes_per_line` data bytes per record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntelHex {
    pub bytes_per_line: u8,
}

impl Default for IntelHex {
    fn default() -> Self {
        Self { bytes_per_line: 16 }
    }
}

impl IntelHex {
    pub fn new(bytes_per_line: u8) -> Self {
        Self { bytes_per_line }
    }
}

impl HexCodec for IntelHex {
    fn decode(&self, input: &[u8]) -> Result<RegionSet, ParseError> {
        let text = std::str::from_utf8(input).map_err(|e| ParseError::InvalidRecord {
            line: 1,
            message: format!("invalid UTF-8: {e}"),
        })?;

        let mut regions = RegionSet::new();
        let mut pending: Option<Region> = None;
        let mut base: u32 = 0;
        let mut eof_seen = false;

        for (index, line) in text.lines().enumerate() {
            let line_num = index + 1;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if eof_seen {
                return Err(ParseError::InvalidRecord {
                    line: line_num,
                    message: "data after EOF record".to_string(),
                });
            }

            let record = Record::parse(line, line_num)?;
            match record.kind {
                RECORD_DATA => {
                    if record.data.is_empty() {
                        continue;
                    }
                    let address = base
                        .checked_add(record.offset as u32)
                        .ok_or(ParseError::AddressOverflow { line: line_num })?;
                    address
                        .checked_add(record.data.len() as u32 - 1)
                        .ok_or(ParseError::AddressOverflow { line: line_num })?;

                    match &mut pending {
                        Some(region) if region.end_address().checked_add(1) == Some(address) => {
                            region.data.extend_from_slice(&record.data);
                        }
                        Some(region) => {
                            regions.insert(std::mem::replace(
                                region,
                                Region::new(address, record.data),
                            ));
                        }
                        None => pending = Some(Region::new(address, record.data)),
                    }
                }
                RECORD_EOF => eof_seen = true,
                RECORD_EXTENDED_SEGMENT => {
                    base = (record.word(line_num)? as u32) << 4;
                }
                RECORD_EXTENDED_LINEAR => {
                    base = (record.word(line_num)? as u32) << 16;
                }
                RECORD_START_SEGMENT | RECORD_START_LINEAR => {}
                record_type => {
                    return Err(ParseError::UnsupportedRecordType {
                        line: line_num,
                        record_type,
                    });
                }
            }
        }

        if !eof_seen {
            return Err(ParseError::UnexpectedEof);
        }
        if let Some(done) = pending {
            regions.insert(done);
        }

        Ok(regions.normalized()?)
    }

    fn encode(&self, regions: &RegionSet) -> Vec<u8> {
        let width = match self.bytes_per_line {
            0 => 16,
            n => n as usize,
        };

        let mut sorted: Vec<&Region> = regions.regions().iter().collect();
        sorted.sort_by_key(|r| r.address);

        let mut output = Vec::new();
        let mut bank: Option<u16> = None;

        for region in sorted {
            let mut address = region.address;
            let mut rest = region.data.as_slice();

            while !rest.is_empty() {
                let upper = (address >> 16) as u16;
                if bank != Some(upper) {
                    trace!("extended linear address {upper:#06X}");
                    push_record(&mut output, RECORD_EXTENDED_LINEAR, 0, &upper.to_be_bytes());
                    bank = Some(upper);
                }

                let offset = (address & 0xFFFF) as u16;
                let room = BANK_SIZE - offset as usize;
                let (chunk, tail) = rest.split_at(width.min(room).min(rest.len()));
                push_record(&mut output, RECORD_DATA, offset, chunk);

                address = address.wrapping_add(chunk.len() as u32);
                rest = tail;
            }
        }

        push_record(&mut output, RECORD_EOF, 0, &[]);
        output
    }
}

/// One decoded `:LLAAAATT<data>CC` line.
struct Record {
    kind: u8,
    offset: u16,
    data: Vec<u8>,
}

impl Record {
    fn parse(line: &str, line_num: usize) -> Result<Self, ParseError> {
        let Some(digits) = line.strip_prefix(':') else {
            return Err(ParseError::InvalidRecord {
                line: line_num,
                message: "line does not start with ':'".to_string(),
            });
        };
        if digits.len() < 10 {
            return Err(ParseError::InvalidRecord {
                line: line_num,
                message: "record too short".to_string(),
            });
        }

        let bytes = decode_hex(digits, line_num)?;
        let (body, actual) = (&bytes[..bytes.len() - 1], bytes[bytes.len() - 1]);
        let expected = checksum(body);
        if expected != actual {
            return Err(ParseError::ChecksumMismatch {
                line: line_num,
                expected,
                actual,
            });
        }

        let count = body[0] as usize;
        if body.len() - 4 != count {
            return Err(ParseError::InvalidRecord {
                line: line_num,
                message: format!(
                    "byte count mismatch: header says {count}, got {}",
                    body.len() - 4
                ),
            });
        }

        Ok(Self {
            kind: body[3],
            offset: u16::from_be_bytes([body[1], body[2]]),
            data: body[4..].to_vec(),
        })
    }

    /// The 16-bit payload of an address record.
    fn word(&self, line_num: usize) -> Result<u16, ParseError> {
        match self.data.as_slice() {
            &[hi, lo] => Ok(u16::from_be_bytes([hi, lo])),
            _ => Err(ParseError::InvalidRecord {
                line: line_num,
                message: format!("address record type {:02X} must have 2 data bytes", self.kind),
            }),
        }
    }
}

/// Two's complement of the byte sum, as stored in the last byte of a record.
fn checksum(bytes: &[u8]) -> u8 {
    bytes
        .iter()
        .fold(0u8, |acc, &b| acc.wrapping_add(b))
        .wrapping_neg()
}

fn push_record(output: &mut Vec<u8>, kind: u8, offset: u16, data: &[u8]) {
    const HEX: &[u8; 16] = b"0123456789ABCDEF";

    let mut body = Vec::with_capacity(data.len() + 4);
    body.push(data.len() as u8);
    body.extend_from_slice(&offset.to_be_bytes());
    body.push(kind);
    body.extend_from_slice(data);
    body.push(checksum(&body));

    output.push(b':');
    for b in body {
        output.push(HEX[(b >> 4) as usize]);
        output.push(HEX[(b & 0x0F) as usize]);
    }
    output.push(b'\n');
}

fn decode_hex(digits: &str, line_num: usize) -> Result<Vec<u8>, ParseError> {
    let digits = digits.as_bytes();
    if !digits.len().is_multiple_of(2) {
        return Err(ParseError::InvalidRecord {
            line: line_num,
            message: "odd number of hex digits".to_string(),
        });
    }

    digits
        .chunks_exact(2)
        .map(|pair| -> Result<u8, ParseError> {
            Ok((nibble(pair[0], line_num)? << 4) | nibble(pair[1], line_num)?)
        })
        .collect()
}

fn nibble(b: u8, line_num: usize) -> Result<u8, ParseError> {
    match b {
        b'0'..=b'9' => Ok(b - b'0'),
        b'A'..=b'F' => Ok(b - b'A' + 10),
        b'a'..=b'f' => Ok(b - b'a' + 10),
        _ => Err(ParseError::InvalidHexDigit {
            line: line_num,
            char: b as char,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::region::RegionError;

    fn decode(input: &[u8]) -> Result<RegionSet, ParseError> {
        IntelHex::default().decode(input)
    }

    #[test]
    fn test_decode_merges_consecutive_records() {
        let input = b":10010000214601360121470136007EFE09D2190140\n\
                      :100110002146017E17C20001FF5F16002148011928\n\
                      :00000001FF\n";
        let set = decode(input).unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(set.regions()[0].address, 0x0100);
        assert_eq!(set.regions()[0].len(), 32);
    }

    #[test]
    fn test_decode_extended_linear() {
        let input = b":020000040800F2\n\
                      :10000000FFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFF00\n\
                      :00000001FF\n";
        let set = decode(input).unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(set.regions()[0].address, 0x0800_0000);
    }

    #[test]
    fn test_decode_extended_segment() {
        let input = b":020000021000EC\n\
                      :10000000FFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFF00\n\
                      :00000001FF\n";
        let set = decode(input).unwrap();
        assert_eq!(set.regions()[0].address, 0x0001_0000);
    }

    #[test]
    fn test_decode_gap_yields_two_regions() {
        let input = b":0100000001FE\n:0100100002ED\n:00000001FF\n";
        let set = decode(input).unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.regions()[1].address, 0x10);
    }

    #[test]
    fn test_decode_overlapping_records() {
        let input = b":0100000001FE\n:0100000002FD\n:00000001FF\n";
        assert!(matches!(
            decode(input),
            Err(ParseError::Overlap(RegionError::Overlapping { address: 0, .. }))
        ));
    }

    #[test]
    fn test_decode_checksum_error() {
        let input = b":10010000214601360121470136007EFE09D2190141\n:00000001FF\n";
        assert!(matches!(
            decode(input),
            Err(ParseError::ChecksumMismatch {
                line: 1,
                expected: 0x40,
                actual: 0x41
            })
        ));
    }

    #[test]
    fn test_decode_missing_eof() {
        let input = b":10010000214601360121470136007EFE09D2190140\n";
        assert!(matches!(decode(input), Err(ParseError::UnexpectedEof)));
        assert!(matches!(decode(b""), Err(ParseError::UnexpectedEof)));
    }

    #[test]
    fn test_decode_data_after_eof() {
        let input = b":00000001FF\n:0100000001FE\n";
        assert!(matches!(
            decode(input),
            Err(ParseError::InvalidRecord { line: 2, .. })
        ));
    }

    #[test]
    fn test_decode_not_hex() {
        assert!(matches!(
            decode(b"hello world\n"),
            Err(ParseError::InvalidRecord { line: 1, .. })
        ));
        assert!(matches!(
            decode(b":0100000001FG\n"),
            Err(ParseError::InvalidHexDigit { line: 1, char: 'G' })
        ));
    }

    #[test]
    fn test_encode_simple() {
        let set = RegionSet::with_regions(vec![Region::new(0x40000, vec![0x00, 0x01, 0x02, 0x03])]);
        let text = String::from_utf8(IntelHex::default().encode(&set)).unwrap();
        assert_eq!(
            text,
            ":020000040004F6\n:0400000000010203F6\n:00000001FF\n"
        );
    }

    #[test]
    fn test_encode_splits_at_bank_boundary() {
        let set = RegionSet::with_regions(vec![Region::new(0x1FFFE, vec![1, 2, 3, 4])]);
        let output = IntelHex::default().encode(&set);
        let text = String::from_utf8(output.clone()).unwrap();
        assert_eq!(
            text,
            ":020000040001F9\n:02FFFE000102FE\n:020000040002F8\n:020000000304F7\n:00000001FF\n"
        );

        let back = decode(&output).unwrap();
        assert_eq!(back, set);
    }

    #[test]
    fn test_encode_line_width() {
        let set = RegionSet::with_regions(vec![Region::new(0, vec![0xAA; 40])]);
        let output = IntelHex::new(32).encode(&set);
        let text = String::from_utf8(output.clone()).unwrap();
        let data_lines: Vec<_> = text.lines().filter(|l| &l[7..9] == "00").collect();
        assert_eq!(data_lines.len(), 2);
        assert!(data_lines[0].starts_with(":20000000"));
        assert!(data_lines[1].starts_with(":08002000"));
        assert_eq!(decode(&output).unwrap(), set);
    }

    #[test]
    fn test_encode_empty_set() {
        let output = IntelHex::default().encode(&RegionSet::new());
        assert_eq!(output, b":00000001FF\n");
    }
}
