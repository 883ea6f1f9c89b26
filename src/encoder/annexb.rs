//! Annex-B H.264 elementary stream parsing

use super::{EncodedStream, Packet};

const NAL_SLICE: u8 = 1;
const NAL_IDR_SLICE: u8 = 5;
const NAL_SPS: u8 = 7;
const NAL_PPS: u8 = 8;
const NAL_AUD: u8 = 9;

/// Split an Annex-B byte stream into NAL units (start codes removed)
pub fn split_nal_units(data: &[u8]) -> Vec<&[u8]> {
    let mut units = Vec::new();
    let mut start = match find_start_code(data, 0) {
        Some((pos, len)) => pos + len,
        None => return units,
    };

    loop {
        let (end, next) = match find_start_code(data, start) {
            Some((pos, len)) => (pos, Some(pos + len)),
            None => (data.len(), None),
        };

        let nal = trim_trailing_zeros(&data[start..end]);
        if !nal.is_empty() {
            units.push(nal);
        }

        match next {
            Some(next) => start = next,
            None => break,
        }
    }

    units
}

/// Group NAL units into access units and pull out the parameter sets
///
/// Assumes one slice per picture, which is what the encoder is configured for:
/// every VCL NAL unit closes the access unit that precedes it.
pub fn parse_stream(data: &[u8]) -> EncodedStream {
    let mut stream = EncodedStream::default();
    let mut pending = Vec::new();
    let mut keyframe = false;

    for nal in split_nal_units(data) {
        let nal_type = nal[0] & 0x1F;
        match nal_type {
            NAL_SPS => {
                stream.sps.get_or_insert_with(|| nal.to_vec());
            }
            NAL_PPS => {
                stream.pps.get_or_insert_with(|| nal.to_vec());
            }
            NAL_AUD => {}
            NAL_SLICE | NAL_IDR_SLICE => {
                push_length_prefixed(&mut pending, nal);
                keyframe |= nal_type == NAL_IDR_SLICE;
                stream.packets.push(Packet {
                    data: std::mem::take(&mut pending),
                    is_keyframe: keyframe,
                });
                keyframe = false;
            }
            _ => push_length_prefixed(&mut pending, nal),
        }
    }

    stream
}

fn push_length_prefixed(out: &mut Vec<u8>, nal: &[u8]) {
    out.extend_from_slice(&(nal.len() as u32).to_be_bytes());
    out.extend_from_slice(nal);
}

/// Position and length of the next `00 00 01` / `00 00 00 01` start code
fn find_start_code(data: &[u8], from: usize) -> Option<(usize, usize)> {
    let rel = data.get(from..)?.windows(3).position(|w| w == [0, 0, 1])?;
    let pos = from + rel;
    if pos > from && data[pos - 1] == 0 {
        Some((pos - 1, 4))
    } else {
        Some((pos, 3))
    }
}

fn trim_trailing_zeros(nal: &[u8]) -> &[u8] {
    let end = nal.iter().rposition(|b| *b != 0).map_or(0, |i| i + 1);
    &nal[..end]
}
