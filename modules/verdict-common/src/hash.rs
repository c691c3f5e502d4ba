/// Fingerprint of a `(title, source_url)` pair for exact-duplicate lookup.
///
/// 32-bit polynomial rolling hash (multiplier 31, wrapping) over
/// `lowercase(title).trim() + "|" + source_url`, rendered in base 36.
/// Stable across processes and toolchains, unlike `DefaultHasher`.
pub fn content_hash(title: &str, source_url: &str) -> String {
    let normalized = format!("{}|{}", title.to_lowercase().trim(), source_url);
    let mut hash: i32 = 0;
    for unit in normalized.encode_utf16() {
        hash = hash.wrapping_mul(31).wrapping_add(unit as i32);
    }
    to_base36(hash.unsigned_abs())
}

fn to_base36(mut n: u32) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}
