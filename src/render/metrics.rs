//! Helvetica-Bold advance widths (Adobe AFM), used to centre text.

/// Width used for characters missing from the table.
pub const DEFAULT_WIDTH: u16 = 556;

/// Advance widths for ASCII 0x20..=0x7E in 1/1000 em.
const HELVETICA_BOLD_WIDTHS: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278, // ' '..'/'
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611, // '0'..'?'
    975, 722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778, // '@'..'O'
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 333, 278, 333, 584, 556, // 'P'..'_'
    333, 556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611, // '`'..'o'
    611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, 389, 280, 389, 584, // 'p'..'~'
];

/// Advance width of one character in 1/1000 em.
pub fn char_width(ch: char) -> u16 {
    match ch {
        ' '..='~' => HELVETICA_BOLD_WIDTHS[ch as usize - 0x20],
        _ => DEFAULT_WIDTH,
    }
}

/// Width of `text` at `font_size`, in the same units as the size.
pub fn measure_text_width(text: &str, font_size: f64) -> f64 {
    let units: u32 = text.chars().map(|c| u32::from(char_width(c))).sum();
    f64::from(units) * font_size / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_widths() {
        assert_eq!(char_width(' '), 278);
        assert_eq!(char_width('@'), 975);
        assert_eq!(char_width('W'), 944);
        assert_eq!(char_width('i'), 278);
        assert_eq!(char_width('z'), 500);
        assert_eq!(char_width('|'), 280);
        assert_eq!(char_width('~'), 584);
    }

    #[test]
    fn test_unknown_character() {
        assert_eq!(char_width('é'), DEFAULT_WIDTH);
        assert_eq!(char_width('\n'), DEFAULT_WIDTH);
    }

    #[test]
    fn test_measure() {
        // j=278 1=556 0=556 0=556
        assert!((measure_text_width("j100", 10.0) - 19.46).abs() < 1e-9);
        assert_eq!(measure_text_width("", 12.0), 0.0);
    }
}
