//! Literal/dictionary LZ decoder used inside compressed blocks.
//!
//! Each step starts with a codeword byte:
//!
//! - `0x00..=0x1F`: literal run, copy `codeword + 1` bytes from the input.
//! - `0x20..=0xFF`: back-reference. The high 3 bits are a base length
//!   (7 means "add the next byte"), the low 5 bits and the following byte
//!   form a 13-bit distance. The copy is `base + 2` bytes long and starts
//!   `distance + 1` bytes behind the write position.

use crate::error::{CacheError, Result};

/// Largest codeword that encodes a literal run.
pub const MAX_LITERAL_CODEWORD: u8 = 0x1F;

/// Base length value that pulls in an extension byte.
const EXTENDED_LENGTH: usize = 7;

/// Minimum back-reference length added to every encoded length.
const MIN_MATCH: usize = 2;

/// Decode `input` into a buffer of exactly `expected_len` bytes.
pub fn decompress(input: &[u8], expected_len: usize) -> Result<Vec<u8>> {
    let mut output = vec![0u8; expected_len];
    let written = decompress_into(input, &mut output)?;
    if written != expected_len {
        return Err(CacheError::LengthMismatch {
            expected: expected_len as u64,
            actual: written as u64,
        });
    }
    Ok(output)
}

/// Decode `input` into `output`, returning the number of bytes written.
///
/// Stops when the input is exhausted. Never writes past `output`.
pub fn decompress_into(input: &[u8], output: &mut [u8]) -> Result<usize> {
    let mut ip = 0usize;
    let mut op = 0usize;

    while ip < input.len() {
        let codeword = input[ip];
        ip += 1;

        if codeword <= MAX_LITERAL_CODEWORD {
            let run = codeword as usize + 1;
            if op + run > output.len() {
                return Err(bounds("literal overruns output buffer", ip));
            }
            if ip + run > input.len() {
                return Err(bounds("literal overruns input buffer", ip));
            }
            output[op..op + run].copy_from_slice(&input[ip..ip + run]);
            ip += run;
            op += run;
            continue;
        }

        let mut len = (codeword >> 5) as usize;
        if len == EXTENDED_LENGTH {
            let ext = *input
                .get(ip)
                .ok_or_else(|| bounds("missing length extension byte", ip))?;
            len += ext as usize;
            ip += 1;
        }
        let low = *input
            .get(ip)
            .ok_or_else(|| bounds("missing distance byte", ip))?;
        ip += 1;
        let distance = (((codeword & 0x1F) as usize) << 8) | low as usize;
        len += MIN_MATCH;

        if op + len > output.len() {
            return Err(bounds("back-reference overruns output buffer", ip));
        }
        let start = op
            .checked_sub(distance + 1)
            .ok_or_else(|| bounds("back-reference starts before output buffer", ip))?;

        // Source and destination may overlap; bytes written earlier in this
        // copy are read again later in it.
        for i in 0..len {
            output[op + i] = output[start + i];
        }
        op += len;
    }

    Ok(op)
}

fn bounds(reason: &'static str, position: usize) -> CacheError {
    CacheError::Bounds { reason, position }
}
