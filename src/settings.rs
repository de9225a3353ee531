//! SETTINGS parameters (RFC 7540 Section 6.5).
//!
//! A SETTINGS frame carries a flat list of (identifier, value) pairs. The
//! server must see exactly the parameters the peer sent, so decoding keeps
//! the raw pairs rather than folding them into a defaults-filled struct;
//! value validation happens when the serve loop applies each setting.

use crate::error::Error;

// Setting identifiers (RFC 7540 Section 6.5.2).
pub const SETTINGS_HEADER_TABLE_SIZE: u16 = 0x1;
pub const SETTINGS_ENABLE_PUSH: u16 = 0x2;
pub const SETTINGS_MAX_CONCURRENT_STREAMS: u16 = 0x3;
pub const SETTINGS_INITIAL_WINDOW_SIZE: u16 = 0x4;
pub const SETTINGS_MAX_FRAME_SIZE: u16 = 0x5;
pub const SETTINGS_MAX_HEADER_LIST_SIZE: u16 = 0x6;

/// One setting as it appears on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Setting {
    pub id: u16,
    pub value: u32,
}

impl Setting {
    pub fn new(id: u16, value: u32) -> Self {
        Self { id, value }
    }

    /// Human-readable name for logging.
    pub fn name(&self) -> &'static str {
        match self.id {
            SETTINGS_HEADER_TABLE_SIZE => "HEADER_TABLE_SIZE",
            SETTINGS_ENABLE_PUSH => "ENABLE_PUSH",
            SETTINGS_MAX_CONCURRENT_STREAMS => "MAX_CONCURRENT_STREAMS",
            SETTINGS_INITIAL_WINDOW_SIZE => "INITIAL_WINDOW_SIZE",
            SETTINGS_MAX_FRAME_SIZE => "MAX_FRAME_SIZE",
            SETTINGS_MAX_HEADER_LIST_SIZE => "MAX_HEADER_LIST_SIZE",
            _ => "UNKNOWN",
        }
    }
}

/// Decode a SETTINGS payload into its wire pairs.
///
/// Only the shape is checked here (a multiple of 6 bytes); per-parameter
/// value validation is the serve loop's job.
pub fn decode_settings(payload: &[u8]) -> Result<Vec<Setting>, Error> {
    if payload.len() % 6 != 0 {
        return Err(Error::FrameSize);
    }
    let mut settings = Vec::with_capacity(payload.len() / 6);
    for chunk in payload.chunks_exact(6) {
        let id = u16::from(chunk[0]) << 8 | u16::from(chunk[1]);
        let value = (u32::from(chunk[2]) << 24)
            | (u32::from(chunk[3]) << 16)
            | (u32::from(chunk[4]) << 8)
            | u32::from(chunk[5]);
        settings.push(Setting { id, value });
    }
    Ok(settings)
}

/// Encode settings as a sequence of 6-byte pairs.
pub fn encode_settings(settings: &[Setting], buf: &mut Vec<u8>) {
    for s in settings {
        buf.push((s.id >> 8) as u8);
        buf.push(s.id as u8);
        buf.push((s.value >> 24) as u8);
        buf.push((s.value >> 16) as u8);
        buf.push((s.value >> 8) as u8);
        buf.push(s.value as u8);
    }
}
