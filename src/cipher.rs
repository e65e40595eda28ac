//! TP-Link Smart Home protocol framing.
//!
//! Messages are XOR autokey encrypted with a starting key of 171. The running
//! key is always the ciphertext byte just produced (encode) or consumed
//! (decode), so both directions chain on the same bytes.
//!
//! Frames carry a 4 byte header `[0, 0, 0, len]`. Only the low byte of the
//! payload length fits in the header, so payloads of 256 bytes or more get a
//! truncated length. Receivers ignore the header length, which keeps this
//! harmless for the realtime command and reply.

use crate::error::Hs110Error;

/// Starting key of the autokey stream.
pub const INITIAL_KEY: u8 = 171;

/// Zero prefix plus one length byte.
pub const HEADER_LEN: usize = 4;

/// Encrypts `plaintext` into a complete frame ready to send to the device.
///
/// Characters outside Latin-1 are replaced with `?`, one byte per character.
pub fn encode(plaintext: &str) -> Result<Vec<u8>, Hs110Error> {
    if plaintext.is_empty() {
        return Err(Hs110Error::InvalidInput(
            "cannot encode an empty payload".to_string(),
        ));
    }

    let payload: Vec<u8> = plaintext.chars().map(latin1_byte).collect();

    let mut frame = Vec::with_capacity(HEADER_LEN + payload.len());
    frame.extend_from_slice(&[0, 0, 0, (payload.len() % 256) as u8]);

    let mut key = INITIAL_KEY;
    for byte in payload {
        key ^= byte;
        frame.push(key);
    }
    Ok(frame)
}

/// Decrypts a frame received from the device back into text.
pub fn decode(frame: &[u8]) -> Result<String, Hs110Error> {
    if frame.len() <= HEADER_LEN {
        return Err(Hs110Error::InvalidInput(format!(
            "frame of {} bytes is too short, need at least {}",
            frame.len(),
            HEADER_LEN + 1
        )));
    }
    if frame[..3] != [0, 0, 0] {
        return Err(Hs110Error::InvalidInput(
            "frame header must start with three zero bytes".to_string(),
        ));
    }

    let mut key = INITIAL_KEY;
    let text = frame[HEADER_LEN..]
        .iter()
        .map(|&cipher_byte| {
            let plain = key ^ cipher_byte;
            key = cipher_byte;
            plain as char
        })
        .collect();
    Ok(text)
}

fn latin1_byte(c: char) -> u8 {
    u8::try_from(u32::from(c)).unwrap_or(b'?')
}
