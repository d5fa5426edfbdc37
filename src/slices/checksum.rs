//! CRC32 line checksums for the slice log

use crc32fast::Hasher;

/// CRC32 (IEEE) of a record's JSON text
pub fn compute_checksum(data: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(data);
    hasher.finalize()
}

/// Renders one log line: `crc32-hex SP json`
pub fn encode_line(json: &str) -> String {
    format!("{:08x} {}", compute_checksum(json.as_bytes()), json)
}

/// Splits and verifies a log line, returning the JSON part
pub fn decode_line(line: &str) -> Result<&str, String> {
    let (crc_hex, json) = line
        .split_once(' ')
        .ok_or_else(|| "missing checksum separator".to_string())?;
    if crc_hex.len() != 8 {
        return Err(format!("malformed checksum '{}'", crc_hex));
    }
    let expected =
        u32::from_str_radix(crc_hex, 16).map_err(|_| format!("malformed checksum '{}'", crc_hex))?;
    let actual = compute_checksum(json.as_bytes());
    if actual != expected {
        return Err(format!(
            "checksum mismatch: stored {:08x}, computed {:08x}",
            expected, actual
        ));
    }
    Ok(json)
}
