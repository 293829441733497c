//! Number-aware ordering of member paths.
//!
//! Runs of ASCII digits compare by numeric value, everything else compares
//! character by character, so `page2.jpg` sorts before `page10.jpg`.

use std::cmp::Ordering;

#[derive(Debug, PartialEq, Eq)]
enum Segment<'a> {
    Digits(&'a str),
    Text(&'a str),
}

fn segments(s: &str) -> Vec<Segment<'_>> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut in_digits: Option<bool> = None;

    for (i, c) in s.char_indices() {
        let is_digit = c.is_ascii_digit();
        match in_digits {
            Some(current) if current != is_digit => {
                out.push(make_segment(&s[start..i], current));
                start = i;
                in_digits = Some(is_digit);
            }
            None => in_digits = Some(is_digit),
            _ => {}
        }
    }

    if let Some(current) = in_digits {
        out.push(make_segment(&s[start..], current));
    }

    out
}

fn make_segment(s: &str, digits: bool) -> Segment<'_> {
    if digits {
        Segment::Digits(s)
    } else {
        Segment::Text(s)
    }
}

fn compare_digits(a: &str, b: &str) -> Ordering {
    let a_trimmed = a.trim_start_matches('0');
    let b_trimmed = b.trim_start_matches('0');

    // Longer run of significant digits is the larger number
    a_trimmed
        .len()
        .cmp(&b_trimmed.len())
        .then_with(|| a_trimmed.cmp(b_trimmed))
        // "01" after "1"
        .then_with(|| a.len().cmp(&b.len()))
}

/// Compare two strings in natural order
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let left = segments(a);
    let right = segments(b);

    for (l, r) in left.iter().zip(right.iter()) {
        let ordering = match (l, r) {
            (Segment::Digits(x), Segment::Digits(y)) => compare_digits(x, y),
            (Segment::Text(x), Segment::Text(y)) => x.cmp(y),
            (Segment::Digits(_), Segment::Text(_)) => Ordering::Less,
            (Segment::Text(_), Segment::Digits(_)) => Ordering::Greater,
        };

        if ordering != Ordering::Equal {
            return ordering;
        }
    }

    left.len().cmp(&right.len()).then_with(|| a.cmp(b))
}

/// Positions of `names` sorted by natural order of the names
pub fn natural_order<S: AsRef<str>>(names: &[S]) -> Vec<usize> {
    let mut positions: Vec<usize> = (0..names.len()).collect();
    positions.sort_by(|&x, &y| natural_cmp(names[x].as_ref(), names[y].as_ref()));
    positions
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numbers_compare_by_value() {
        assert_eq!(natural_cmp("page2.jpg", "page10.jpg"), Ordering::Less);
        assert_eq!(natural_cmp("page10.jpg", "page2.jpg"), Ordering::Greater);
        assert_eq!(natural_cmp("page02.jpg", "page10.jpg"), Ordering::Less);
        assert_eq!(natural_cmp("a.jpg", "a.jpg"), Ordering::Equal);
    }

    #[test]
    fn test_leading_zeros_are_stable() {
        assert_eq!(natural_cmp("1.png", "01.png"), Ordering::Less);
        assert_eq!(natural_cmp("001.png", "2.png"), Ordering::Less);
    }

    #[test]
    fn test_directories_sort_before_pages_inside() {
        let names = ["ch10/p1.jpg", "ch2/p10.jpg", "ch2/p9.jpg", "ch1/p1.jpg"];
        let order = natural_order(&names);
        let sorted: Vec<&str> = order.iter().map(|&i| names[i]).collect();

        assert_eq!(
            sorted,
            vec!["ch1/p1.jpg", "ch2/p9.jpg", "ch2/p10.jpg", "ch10/p1.jpg"]
        );
    }

    #[test]
    fn test_natural_order_returns_original_positions() {
        let names = ["page10.jpg", "page2.jpg", "page1.jpg"];
        assert_eq!(natural_order(&names), vec![2, 1, 0]);
    }

    #[test]
    fn test_very_long_numbers() {
        let a = "scan_99999999999999999999999.png";
        let b = "scan_100000000000000000000000.png";
        assert_eq!(natural_cmp(a, b), Ordering::Less);
    }
}
