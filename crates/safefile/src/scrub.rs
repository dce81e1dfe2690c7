//! String encoding sanitation.
//!
//! A pure transform with no filesystem effect: invalid UTF-8 sequences are
//! replaced with a caller-supplied string, yielding valid UTF-8 output.

/// Replace every invalid UTF-8 sequence in `input` with `replacement`.
///
/// Each maximal run of bytes rejected by the decoder is substituted once.
/// The output is always valid UTF-8, so the transform is idempotent:
/// scrubbing already-scrubbed text is the identity.
#[must_use]
pub fn scrub(input: &[u8], replacement: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for chunk in input.utf8_chunks() {
        out.push_str(chunk.valid());
        if !chunk.invalid().is_empty() {
            out.push_str(replacement);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn valid_input_passes_through() {
        assert_eq!(scrub(b"hello", "?"), "hello");
        assert_eq!(scrub("héllo".as_bytes(), "?"), "héllo");
        assert_eq!(scrub(b"", "?"), "");
    }

    #[test]
    fn invalid_sequence_is_replaced() {
        assert_eq!(scrub(b"a\xffb", "?"), "a?b");
        assert_eq!(scrub(b"a\xffb", ""), "ab");
        assert_eq!(scrub(b"\xff\xfe", "!"), "!!");
    }

    #[test]
    fn truncated_multibyte_is_replaced() {
        // First two bytes of a three-byte sequence.
        assert_eq!(scrub(b"ok\xe2\x82", "_"), "ok_");
    }

    proptest! {
        #[test]
        fn scrub_is_idempotent(input in proptest::collection::vec(any::<u8>(), 0..256),
                               replacement in "[a-z?\u{FFFD}]{0,3}") {
            let once = scrub(&input, &replacement);
            let twice = scrub(once.as_bytes(), &replacement);
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn output_is_valid_utf8_superset_of_valid_parts(input in proptest::collection::vec(any::<u8>(), 0..256)) {
            let out = scrub(&input, "");
            prop_assert!(std::str::from_utf8(out.as_bytes()).is_ok());
        }
    }
}
