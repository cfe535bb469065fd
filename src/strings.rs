//! String normalization helpers used by command and argument parsing.
//!
//! Stateless pure functions: case-insensitive comparison, hex/decimal
//! character filtering, and membership testing against a delimiter-packed
//! token list.

use memchr::memchr_iter;

/// Delimiter byte separating tokens in a packed list.
pub const LIST_DELIMITER: u8 = 0x01;

/// Upper bound on the packed-list length accepted by [`list_contains`],
/// enforced before the list is scanned.
pub const MAX_PACKED_LIST_LEN: usize = 65536;

/// True iff `a` and `b` are equal ignoring ASCII case.
pub fn case_insensitive_equal(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

/// Rewrites `string` in place: uppercases it, then keeps only hexadecimal
/// digits, preserving order.
pub fn format_hex_inplace(string: &mut String) {
    string.make_ascii_uppercase();
    string.retain(|c| c.is_ascii_hexdigit());
}

/// Rewrites `string` in place: uppercases it, then keeps only decimal
/// digits, preserving order.
pub fn format_decimal_inplace(string: &mut String) {
    string.make_ascii_uppercase();
    string.retain(|c| c.is_ascii_digit());
}

/// Tests whether `needle` case-insensitively equals one of the tokens in
/// `packed_list`, a sequence of tokens separated by [`LIST_DELIMITER`].
///
/// The whole packed string is compared first (covers a single-token list),
/// then each delimiter-separated segment. Empty arguments and lists at or
/// above [`MAX_PACKED_LIST_LEN`] are rejected before any scan.
pub fn list_contains(packed_list: &str, needle: &str) -> bool {
    if packed_list.is_empty() || needle.is_empty() {
        return false;
    }
    if packed_list.len() >= MAX_PACKED_LIST_LEN {
        return false;
    }
    if packed_list.eq_ignore_ascii_case(needle) {
        return true;
    }

    let bytes = packed_list.as_bytes();
    let mut start = 0usize;
    for pos in memchr_iter(LIST_DELIMITER, bytes) {
        if packed_list[start..pos].eq_ignore_ascii_case(needle) {
            return true;
        }
        start = pos + 1;
    }
    packed_list[start..].eq_ignore_ascii_case(needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_insensitive_equal() {
        assert!(case_insensitive_equal("StepOver", "stepover"));
        assert!(!case_insensitive_equal("step", "stepover"));
    }

    #[test]
    fn test_format_hex_filters_and_uppercases() {
        let mut s = String::from("1A-2b-ZZ-3c");
        format_hex_inplace(&mut s);
        assert_eq!(s, "1A2B3C");
    }

    #[test]
    fn test_format_hex_empty_result() {
        let mut s = String::from("xyz---");
        format_hex_inplace(&mut s);
        assert_eq!(s, "");
    }

    #[test]
    fn test_format_decimal_filters() {
        let mut s = String::from("0x1234abc-99");
        format_decimal_inplace(&mut s);
        assert_eq!(s, "0123499");
    }

    #[test]
    fn test_list_contains_middle_token_case_insensitive() {
        assert!(list_contains("cmd1\x01cmd2\x01cmd3", "CMD2"));
    }

    #[test]
    fn test_list_contains_first_and_last_tokens() {
        assert!(list_contains("cmd1\x01cmd2\x01cmd3", "cmd1"));
        assert!(list_contains("cmd1\x01cmd2\x01cmd3", "cmd3"));
    }

    #[test]
    fn test_list_contains_single_token_list() {
        assert!(list_contains("cmd1", "cmd1"));
        assert!(!list_contains("cmd1", "cmd12"));
    }

    #[test]
    fn test_list_contains_no_partial_match() {
        assert!(!list_contains("cmd1\x01cmd2", "cmd"));
        assert!(!list_contains("cmd1\x01cmd2", "md2"));
    }

    #[test]
    fn test_list_contains_rejects_empty_arguments() {
        assert!(!list_contains("", "cmd"));
        assert!(!list_contains("cmd", ""));
    }

    #[test]
    fn test_list_contains_rejects_oversized_list() {
        let huge = "a".repeat(MAX_PACKED_LIST_LEN);
        assert!(!list_contains(&huge, "a"));
    }
}
