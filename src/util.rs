use std::time::Duration;

/// Token accepted by every prompt to leave the current mode.
pub const QUIT_TOKEN: &str = "q";

/// Parse a byte written in hexadecimal, with or without a `0x` prefix.
pub fn parse_hex_byte(text: &str) -> Option<u8> {
    let text = text.trim();
    let digits = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .unwrap_or(text);

    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }

    // Leading zeroes are fine, anything past 0xFF is not
    u32::from_str_radix(digits, 16)
        .ok()
        .and_then(|value| u8::try_from(value).ok())
}

/// Get the upper four bits of a byte.
pub const fn high_nibble(value: u8) -> u8 {
    value >> 4
}

/// Format a duration as `MM:SS`, minutes are not capped at 60.
pub fn format_minutes(duration: Duration) -> String {
    let secs = duration.as_secs();
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

/// Printable representation of a byte on the memory mapped screen.
pub const fn display_char(value: u8) -> char {
    if value >= 0x20 && value < 0x7F {
        value as char
    } else {
        '.'
    }
}
