//! Alternating-character XOR obfuscation.

/// Key applied to every odd character position.
const KEY: u32 = 2;

/// XORs the code point of every odd-indexed character with [`KEY`].
///
/// Self-inverse: applying it twice yields the input. Flipping bit 1 never
/// moves a scalar value into or out of the surrogate range, so the
/// conversion back to `char` cannot fail in practice; the original character
/// is kept if it ever did.
pub(crate) fn xor_alternate(s: &str) -> String {
    s.chars()
        .enumerate()
        .map(|(i, c)| {
            if i % 2 == 1 {
                char::from_u32(c as u32 ^ KEY).unwrap_or(c)
            } else {
                c
            }
        })
        .collect()
}
