//! Annex B NAL unit inspection.
//!
//! OpenH264 emits H.264 as an Annex B byte stream: NAL units separated by
//! `00 00 01` or `00 00 00 01` start codes. The writer only needs to know
//! whether an access unit is a keyframe and whether it carries the
//! parameter sets a decoder needs before the first picture.

use bytes::Bytes;

/// NAL unit types relevant for keyframe detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum NalUnitType {
    /// Non-IDR slice (P frame).
    NonIdrSlice = 1,
    /// IDR slice (keyframe).
    IdrSlice = 5,
    /// Supplemental Enhancement Information.
    Sei = 6,
    /// Sequence Parameter Set.
    Sps = 7,
    /// Picture Parameter Set.
    Pps = 8,
    /// Access Unit Delimiter.
    Aud = 9,
    /// Other/unknown NAL type.
    Other = 0,
}

impl From<u8> for NalUnitType {
    fn from(header: u8) -> Self {
        match header & 0x1F {
            1 => Self::NonIdrSlice,
            5 => Self::IdrSlice,
            6 => Self::Sei,
            7 => Self::Sps,
            8 => Self::Pps,
            9 => Self::Aud,
            _ => Self::Other,
        }
    }
}

/// A single NAL unit extracted from an Annex B stream.
#[derive(Debug, Clone)]
pub struct NalUnit {
    /// The NAL unit type.
    pub nal_type: NalUnitType,
    /// NAL payload including the header byte, without the start code.
    pub data: Bytes,
}

/// Returns the length of the start code at `pos`, if there is one.
fn start_code_at(data: &[u8], pos: usize) -> Option<usize> {
    match data.get(pos..) {
        Some([0, 0, 1, ..]) => Some(3),
        Some([0, 0, 0, 1, ..]) => Some(4),
        _ => None,
    }
}

/// Parse an Annex B byte stream into NAL units.
pub fn parse_annex_b(data: &[u8]) -> Vec<NalUnit> {
    // Offsets of every start code and the NAL that follows it.
    let mut starts = Vec::new();
    let mut i = 0;
    while i + 3 <= data.len() {
        match start_code_at(data, i) {
            Some(len) => {
                starts.push((i, i + len));
                i += len;
            }
            None => i += 1,
        }
    }

    let mut nals = Vec::with_capacity(starts.len());
    for (idx, &(_, payload_start)) in starts.iter().enumerate() {
        let payload_end = starts
            .get(idx + 1)
            .map_or(data.len(), |&(next_code, _)| next_code);

        if payload_start < payload_end {
            let payload = &data[payload_start..payload_end];
            nals.push(NalUnit {
                nal_type: NalUnitType::from(payload[0]),
                data: Bytes::copy_from_slice(payload),
            });
        }
    }

    nals
}

/// Returns true if the access unit contains an IDR slice.
pub fn contains_idr(data: &[u8]) -> bool {
    parse_annex_b(data)
        .iter()
        .any(|nal| nal.nal_type == NalUnitType::IdrSlice)
}

/// Returns true if the access unit carries both SPS and PPS.
pub fn has_parameter_sets(data: &[u8]) -> bool {
    let nals = parse_annex_b(data);
    let has = |t| nals.iter().any(|nal| nal.nal_type == t);
    has(NalUnitType::Sps) && has(NalUnitType::Pps)
}
