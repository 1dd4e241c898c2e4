//! Short room codes
//!
//! Codes are 6 characters drawn from `A-Z0-9`, giving 36^6 (about 2.18e9)
//! possible values. Clients may type them in any case.

use rand::Rng;

/// Characters a room code may contain
pub const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Length of every room code
pub const CODE_LEN: usize = 6;

/// Number of distinct codes (36^6)
pub const CODE_SPACE: u64 = 2_176_782_336;

/// Draw a uniformly random code
pub fn generate_code<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..CODE_LEN)
        .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

/// Canonical form of a user-typed code (trimmed, uppercase)
pub fn normalize(input: &str) -> String {
    input.trim().to_ascii_uppercase()
}

/// True when `code` is already canonical and well-formed
pub fn is_valid(code: &str) -> bool {
    code.len() == CODE_LEN && code.bytes().all(|b| CODE_ALPHABET.contains(&b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_code_space_matches_alphabet() {
        assert_eq!(CODE_SPACE, (CODE_ALPHABET.len() as u64).pow(CODE_LEN as u32));
    }

    #[test]
    fn test_generated_codes_are_valid() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..1000 {
            let code = generate_code(&mut rng);
            assert!(is_valid(&code), "bad code {code}");
        }
    }

    #[test]
    fn test_normalize_uppercases_and_trims() {
        assert_eq!(normalize("  ab12cd "), "AB12CD");
        assert!(is_valid(&normalize("zzzzzz")));
    }

    #[test]
    fn test_is_valid_rejects_bad_shapes() {
        assert!(!is_valid("ABC"));
        assert!(!is_valid("abcdef"));
        assert!(!is_valid("ABC-EF"));
        assert!(!is_valid("ABCDEFG"));
    }
}
