//! Invariants of the logged body text

use base64::{engine::general_purpose::STANDARD, Engine as _};
use peephole::proxy::body::{normalize_with_cap, BodyEncoding};
use proptest::prelude::*;

proptest! {
    #[test]
    fn truncation_flag_matches_length(body in prop::collection::vec(any::<u8>(), 0..256), cap in 1usize..128) {
        let normalized = normalize_with_cap(&body, cap);
        prop_assert_eq!(normalized.truncated, body.len() > cap);
    }

    #[test]
    fn utf8_text_is_a_prefix_of_the_body(text in "\\PC{0,64}", cap in 4usize..128) {
        let normalized = normalize_with_cap(text.as_bytes(), cap);
        prop_assert_eq!(normalized.encoding, BodyEncoding::Utf8);
        prop_assert!(text.starts_with(&normalized.text));
        prop_assert!(normalized.text.len() <= cap);
        // Only whole characters are dropped, never more than one
        prop_assert!(cap.min(text.len()) - normalized.text.len() <= 3);
    }

    #[test]
    fn base64_decodes_to_the_kept_prefix(body in prop::collection::vec(any::<u8>(), 0..256), cap in 1usize..128) {
        let normalized = normalize_with_cap(&body, cap);
        if normalized.encoding == BodyEncoding::Base64 {
            let decoded = STANDARD.decode(&normalized.text).unwrap();
            prop_assert_eq!(&decoded[..], &body[..body.len().min(cap)]);
        } else {
            prop_assert!(body.starts_with(normalized.text.as_bytes()));
        }
    }
}
