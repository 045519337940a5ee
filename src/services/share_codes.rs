use rand::Rng;

const ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
pub(crate) const SHARE_CODE_LEN: usize = 10;

/// Random code for viewing an exam record without signing in. Ambiguous
/// glyphs (0/O, 1/I) are left out of the alphabet.
pub(crate) fn generate_share_code() -> String {
    let mut rng = rand::thread_rng();
    let mut output = String::with_capacity(SHARE_CODE_LEN);
    for _ in 0..SHARE_CODE_LEN {
        let index = rng.gen_range(0..ALPHABET.len());
        output.push(ALPHABET[index] as char);
    }
    output
}

/// Accepts codes typed in lower case or with surrounding spaces.
pub(crate) fn normalize_share_code(raw: &str) -> Option<String> {
    let code = raw.trim().to_ascii_uppercase();
    let valid = code.len() == SHARE_CODE_LEN && code.bytes().all(|byte| ALPHABET.contains(&byte));
    valid.then_some(code)
}
