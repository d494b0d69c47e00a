//! Annex-B bitstream parsing.
//!
//! H.264 and HEVC encoders emit access units as Annex-B byte streams:
//! NAL units delimited by 4-byte (`00 00 00 01`) or 3-byte (`00 00 01`)
//! start codes. Both forms appear in practice, sometimes mixed within a
//! single access unit, so the scanner tracks the length of each start
//! code to compute NAL boundaries correctly.

/// Split an Annex-B byte stream into NAL units (start codes stripped).
pub fn split_nal_units(data: &[u8]) -> Vec<Vec<u8>> {
    let mut nal_units = Vec::new();
    let mut i = 0usize;

    // (nal_data_start_index, start_code_length)
    let mut start_entries: Vec<(usize, usize)> = Vec::new();

    while i < data.len() {
        if i + 3 < data.len() && data[i..i + 4] == [0, 0, 0, 1] {
            start_entries.push((i + 4, 4));
            i += 4;
        } else if i + 2 < data.len() && data[i..i + 3] == [0, 0, 1] {
            start_entries.push((i + 3, 3));
            i += 3;
        } else {
            i += 1;
        }
    }

    for (idx, &(start, _)) in start_entries.iter().enumerate() {
        let end = if idx + 1 < start_entries.len() {
            let (next_start, next_sc_len) = start_entries[idx + 1];
            next_start - next_sc_len
        } else {
            data.len()
        };

        if start < end {
            nal_units.push(data[start..end].to_vec());
        }
    }

    nal_units
}

/// H.264 NAL unit type (low 5 bits of the first header byte).
pub fn h264_nal_type(nal: &[u8]) -> u8 {
    nal.first().map_or(0, |b| b & 0x1f)
}

/// HEVC NAL unit type (bits 1..6 of the first header byte).
pub fn hevc_nal_type(nal: &[u8]) -> u8 {
    nal.first().map_or(0, |b| (b >> 1) & 0x3f)
}

pub const H264_NAL_SPS: u8 = 7;
pub const H264_NAL_PPS: u8 = 8;
pub const HEVC_NAL_VPS: u8 = 32;
pub const HEVC_NAL_SPS: u8 = 33;
pub const HEVC_NAL_PPS: u8 = 34;
