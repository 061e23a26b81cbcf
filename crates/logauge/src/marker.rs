//! Density markers embedded in every generated line.
//!
//! A density term of width `w` is the event number modulo `10^w`, zero padded
//! to `w` digits and prefixed with a lead character taken from a 36 symbol
//! alphabet. The value of a width-`w` term repeats once every `10^w` events, so
//! searching for one term samples the stream at a known density: width 1 hits
//! every 10th event, width 10 every 10 billionth. The lead character changes
//! quickly with the event number and spreads the terms lexically better than
//! a bare zero-padded number would.
//!
//! Every line carries the literal event number, the ten terms from widest to
//! narrowest, the `every1` tag and one `everyN` tag per decade the event
//! number is a multiple of.

use core::fmt::Write;

/// Lead characters, indexed by `id % 36`.
pub const ALPHABET: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Number of density terms carried by each marker (widths `1..=10`).
pub const MARKER_FIELDS: u32 = 10;

/// Decade tags, checked independently of each other.
pub const DECADE_TAGS: [(u64, &str); 10] = [
    (10, "every10"),
    (100, "every100"),
    (1_000, "every1K"),
    (10_000, "every10K"),
    (100_000, "every100K"),
    (1_000_000, "every1M"),
    (10_000_000, "every10M"),
    (100_000_000, "every100M"),
    (1_000_000_000, "every1B"),
    (10_000_000_000, "every10B"),
];

/// Returns the density term of `width` digits for `event`.
///
/// The result is always `width + 1` characters long.
///
/// ```
/// use logauge::next_term;
///
/// assert_eq!(next_term(12_345, 3), "L345");
/// assert_eq!(next_term(7, 1), "77");
/// ```
pub fn next_term(event: u64, width: u32) -> String {
    let mut term = String::with_capacity(width as usize + 1);
    push_term(&mut term, event, width);
    term
}

/// Appends the density term of `width` digits for `event` to `buf`.
///
/// Widths beyond 19 exceed `u64` densities; every event is then its own id.
///
/// # Panics
///
/// Panics when `width` is 0.
pub fn push_term(buf: &mut String, event: u64, width: u32) {
    assert!(width > 0, "density terms need at least one digit");
    let id = 10_u64
        .checked_pow(width)
        .map_or(event, |density| event % density);
    buf.push(char::from(ALPHABET[(id % 36) as usize]));
    // Writing into a `String` cannot fail.
    let _ = write!(buf, "{id:0width$}", width = width as usize);
}

/// Iterates over the decade tags that apply to `event`.
pub fn decade_tags(event: u64) -> impl Iterator<Item = &'static str> {
    DECADE_TAGS
        .iter()
        .filter(move |(decade, _)| event % decade == 0)
        .map(|(_, tag)| *tag)
}

/// Builds the full marker for `event`.
///
/// ```
/// use logauge::marker;
///
/// let m = marker(1_000);
/// assert!(m.starts_with("eventnum=1000 S0000001000 "));
/// assert!(m.ends_with("every1 every10 every100 every1K"));
/// ```
pub fn marker(event: u64) -> String {
    let mut buf = String::with_capacity(160);
    let _ = write!(buf, "eventnum={event}");
    for width in (1..=MARKER_FIELDS).rev() {
        buf.push(' ');
        push_term(&mut buf, event, width);
    }
    buf.push_str(" every1");
    for tag in decade_tags(event) {
        buf.push(' ');
        buf.push_str(tag);
    }
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn term_has_lead_char_and_padded_body() {
        assert_eq!(next_term(1, 10), "10000000001");
        assert_eq!(next_term(36, 2), "036");
        // 12_345 % 1000 = 345, 345 % 36 = 21 -> 'L'
        assert_eq!(next_term(12_345, 3), "L345");
    }

    #[test]
    #[should_panic(expected = "at least one digit")]
    fn zero_width_is_rejected() {
        next_term(5, 0);
    }

    #[test]
    fn term_wraps_at_density() {
        assert_eq!(next_term(10, 1), "00");
        assert_eq!(next_term(17, 1), next_term(7, 1));
        assert_eq!(next_term(1_234_567, 4), next_term(4_567, 4));
    }

    #[test]
    fn term_length_is_width_plus_one() {
        for width in 1..=MARKER_FIELDS {
            for event in [0, 1, 35, 36, 999, 123_456_789_012, u64::MAX] {
                assert_eq!(next_term(event, width).len(), width as usize + 1);
            }
        }
    }

    #[test]
    fn term_beyond_u64_density_uses_whole_event() {
        let term = next_term(u64::MAX, 20);
        assert_eq!(term.len(), 21);
        assert!(term.ends_with(&u64::MAX.to_string()));
        assert_eq!(
            term.as_bytes()[0],
            ALPHABET[(u64::MAX % 36) as usize],
            "lead char follows the event number"
        );
    }

    #[test]
    fn lead_char_is_id_mod_36() {
        for event in 0..500_u64 {
            let term = next_term(event, 2);
            let id = event % 100;
            assert_eq!(term.as_bytes()[0], ALPHABET[(id % 36) as usize]);
        }
    }

    #[test]
    fn decade_tags_are_independent() {
        assert_eq!(decade_tags(7).count(), 0);
        assert_eq!(decade_tags(20).collect::<Vec<_>>(), ["every10"]);
        assert_eq!(
            decade_tags(1_000).collect::<Vec<_>>(),
            ["every10", "every100", "every1K"]
        );
        assert_eq!(decade_tags(10_000_000_000).count(), 10);
    }

    #[test]
    fn decade_tag_present_iff_multiple() {
        for event in 1..=12_000_u64 {
            let tags: Vec<_> = decade_tags(event).collect();
            for (decade, tag) in DECADE_TAGS {
                assert_eq!(tags.contains(&tag), event % decade == 0, "event={event}");
            }
        }
    }

    #[test]
    fn marker_lists_terms_widest_first() {
        let m = marker(42);
        let fields: Vec<_> = m.split(' ').collect();
        assert_eq!(fields[0], "eventnum=42");
        assert_eq!(fields[1], next_term(42, 10));
        assert_eq!(fields[10], next_term(42, 1));
        assert_eq!(fields[11], "every1");
        assert_eq!(fields.len(), 12);
    }
}
