// Copyright 2025 KohakuHub Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! pkt-line framing and side-band 64k multiplexing (C6, spec §4.6).
//!
//! Every pkt-line is a 4-byte lowercase-hex length prefix (including the
//! prefix itself) followed by the payload; `0000` is the flush packet and
//! `0001` the delimiter packet used by protocol v2.

use kohakuhub_core::error::{KohakuError, Result};

pub const FLUSH_PKT: &[u8] = b"0000";
pub const DELIM_PKT: &[u8] = b"0001";

const MAX_PKT_PAYLOAD: usize = 65516; // 65520 - 4 byte length header

/// Encodes `data` as a single pkt-line. Panics (via error) if longer than
/// the maximum a 4-hex-digit length can express.
pub fn encode_pkt_line(data: &[u8]) -> Result<Vec<u8>> {
    if data.len() > MAX_PKT_PAYLOAD {
        return Err(KohakuError::internal(format!(
            "pkt-line payload too large: {} bytes",
            data.len()
        )));
    }
    let total_len = data.len() + 4;
    let mut out = format!("{total_len:04x}").into_bytes();
    out.extend_from_slice(data);
    Ok(out)
}

/// Convenience for a text line: appends `\n` before framing, as Git's own
/// ref-advertisement and command lines do.
pub fn encode_pkt_line_str(line: &str) -> Result<Vec<u8>> {
    let mut data = line.as_bytes().to_vec();
    data.push(b'\n');
    encode_pkt_line(&data)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PktLine {
    Flush,
    Delim,
    Data(Vec<u8>),
}

/// Reads pkt-lines out of `input`, returning `(lines, bytes_consumed)`.
/// Stops (without erroring) at the first incomplete trailing line so
/// callers can feed a streaming body incrementally.
pub fn decode_pkt_lines(input: &[u8]) -> Result<(Vec<PktLine>, usize)> {
    let mut lines = Vec::new();
    let mut offset = 0;
    while offset + 4 <= input.len() {
        let len_hex = std::str::from_utf8(&input[offset..offset + 4])
            .map_err(|_| KohakuError::validation("pkt-line length is not valid UTF-8"))?;
        let len = usize::from_str_radix(len_hex, 16)
            .map_err(|_| KohakuError::validation(format!("pkt-line length is not hex: {len_hex}")))?;
        match len {
            0 => {
                lines.push(PktLine::Flush);
                offset += 4;
            }
            1 => {
                lines.push(PktLine::Delim);
                offset += 4;
            }
            2..=3 => {
                return Err(KohakuError::validation(format!("invalid pkt-line length: {len}")));
            }
            _ => {
                if offset + len > input.len() {
                    break; // incomplete trailing line, wait for more bytes
                }
                lines.push(PktLine::Data(input[offset + 4..offset + len].to_vec()));
                offset += len;
            }
        }
    }
    Ok((lines, offset))
}

/// side-band 64k channel, spec §4.6: 1 = pack data, 2 = progress text,
/// 3 = fatal error. Each frame is itself a pkt-line whose payload begins
/// with the channel byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SideBandChannel {
    Data = 1,
    Progress = 2,
    Error = 3,
}

const SIDE_BAND_MAX_CHUNK: usize = MAX_PKT_PAYLOAD - 1;

/// Splits `payload` into as many side-band frames as needed so each
/// encoded pkt-line stays within the 65520-byte ceiling.
pub fn encode_side_band(channel: SideBandChannel, payload: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    if payload.is_empty() {
        let framed = vec![channel as u8];
        out.extend(encode_pkt_line(&framed)?);
        return Ok(out);
    }
    for chunk in payload.chunks(SIDE_BAND_MAX_CHUNK) {
        let mut framed = Vec::with_capacity(chunk.len() + 1);
        framed.push(channel as u8);
        framed.extend_from_slice(chunk);
        out.extend(encode_pkt_line(&framed)?);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_flush_and_data() {
        assert_eq!(encode_pkt_line(b"").unwrap(), b"0004");
        assert_eq!(encode_pkt_line_str("hello").unwrap(), b"000ahello\n");
    }

    #[test]
    fn decodes_round_trip() {
        let mut buf = Vec::new();
        buf.extend(encode_pkt_line_str("first").unwrap());
        buf.extend(encode_pkt_line_str("second").unwrap());
        buf.extend_from_slice(FLUSH_PKT);
        let (lines, consumed) = decode_pkt_lines(&buf).unwrap();
        assert_eq!(consumed, buf.len());
        assert_eq!(
            lines,
            vec![
                PktLine::Data(b"first\n".to_vec()),
                PktLine::Data(b"second\n".to_vec()),
                PktLine::Flush,
            ]
        );
    }

    #[test]
    fn stops_at_incomplete_trailing_line() {
        let mut buf = encode_pkt_line_str("complete").unwrap();
        buf.extend_from_slice(b"0010incomp"); // claims 16 bytes, only has 10
        let (lines, consumed) = decode_pkt_lines(&buf).unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(consumed, 14); // only the complete line consumed
    }

    #[test]
    fn rejects_reserved_length_values() {
        assert!(decode_pkt_lines(b"0002").is_err());
        assert!(decode_pkt_lines(b"0003x").is_err());
    }

    #[test]
    fn side_band_frame_carries_channel_byte() {
        let framed = encode_side_band(SideBandChannel::Progress, b"50% done").unwrap();
        let (lines, _) = decode_pkt_lines(&framed).unwrap();
        match &lines[0] {
            PktLine::Data(data) => {
                assert_eq!(data[0], SideBandChannel::Progress as u8);
                assert_eq!(&data[1..], b"50% done");
            }
            other => panic!("expected data line, got {other:?}"),
        }
    }

    #[test]
    fn side_band_splits_large_payload_into_multiple_frames() {
        let payload = vec![7u8; SIDE_BAND_MAX_CHUNK * 2 + 10];
        let framed = encode_side_band(SideBandChannel::Data, &payload).unwrap();
        let (lines, _) = decode_pkt_lines(&framed).unwrap();
        assert_eq!(lines.len(), 3);
    }
}
