//! Control API token generation

/// Generate a random token for authenticating sync trigger requests.
///
/// The token is hex-encoded and safe to embed in `config.toml`.
pub fn generate_control_token() -> String {
    let mut bytes = [0u8; 32];
    if getrandom::getrandom(&mut bytes).is_ok() {
        return hex_encode(&bytes);
    }

    // OS RNG unavailable: mix clock and pid, then widen to the usual length.
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let mixed = nanos ^ (std::process::id() as u128).rotate_left(17);
    let half = mixed.to_le_bytes();
    let mut widened = [0u8; 32];
    widened[..16].copy_from_slice(&half);
    widened[16..].copy_from_slice(&mixed.rotate_left(64).to_be_bytes());
    hex_encode(&widened)
}

fn hex_encode(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(bytes.len() * 2);
    for &b in bytes {
        out.push(HEX[(b >> 4) as usize] as char);
        out.push(HEX[(b & 0x0f) as usize] as char);
    }
    out
}
