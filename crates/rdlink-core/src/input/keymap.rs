//! Symbolic key name to keysym mapping.
//!
//! Keysym values follow the X11 assignments the remote framebuffer protocol
//! inherited. Names are the portable symbolic names a frontend reports for
//! non-character keys.

/// Keysym sent when a key cannot be mapped at all.
pub const KEYSYM_VOID: u32 = 0x00ff_ffff;

/// Unicode code points outside Latin-1 map into the X11 Unicode keysym range.
const UNICODE_KEYSYM_OFFSET: u32 = 0x0100_0000;

/// Symbolic name table for non-character keys.
static KEYSYM_TABLE: &[(&str, u32)] = &[
    ("BackSpace", 0xff08),
    ("Tab", 0xff09),
    ("Return", 0xff0d),
    ("Pause", 0xff13),
    ("ScrollLock", 0xff14),
    ("Escape", 0xff1b),
    ("Home", 0xff50),
    ("Left", 0xff51),
    ("Up", 0xff52),
    ("Right", 0xff53),
    ("Down", 0xff54),
    ("PageUp", 0xff55),
    ("PageDown", 0xff56),
    ("End", 0xff57),
    ("Print", 0xff61),
    ("Insert", 0xff63),
    ("Menu", 0xff67),
    ("NumLock", 0xff7f),
    ("F1", 0xffbe),
    ("F2", 0xffbf),
    ("F3", 0xffc0),
    ("F4", 0xffc1),
    ("F5", 0xffc2),
    ("F6", 0xffc3),
    ("F7", 0xffc4),
    ("F8", 0xffc5),
    ("F9", 0xffc6),
    ("F10", 0xffc7),
    ("F11", 0xffc8),
    ("F12", 0xffc9),
    ("Shift", 0xffe1),
    ("Control", 0xffe3),
    ("CapsLock", 0xffe5),
    ("Alt", 0xffe9),
    ("Super", 0xffeb),
    ("Delete", 0xffff),
];

/// Resolve a symbolic key name or character to a keysym.
///
/// Named keys use the lookup table; single characters map to their Latin-1
/// value or the X11 Unicode keysym range; anything else becomes
/// [`KEYSYM_VOID`] so one odd key never breaks the stream.
pub fn lookup_keysym(key: &str) -> u32 {
    if let Some(&(_, keysym)) = KEYSYM_TABLE.iter().find(|(name, _)| *name == key) {
        return keysym;
    }

    let mut chars = key.chars();
    if let Some(c) = chars.next() {
        if chars.next().is_none() {
            let scalar = c as u32;
            return if scalar <= 0xff {
                scalar
            } else {
                UNICODE_KEYSYM_OFFSET + scalar
            };
        }
    }

    KEYSYM_VOID
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_keys_resolve() {
        assert_eq!(lookup_keysym("Return"), 0xff0d);
        assert_eq!(lookup_keysym("Escape"), 0xff1b);
        assert_eq!(lookup_keysym("F11"), 0xffc8);
        assert_eq!(lookup_keysym("Control"), 0xffe3);
        assert_eq!(lookup_keysym("Delete"), 0xffff);
    }

    #[test]
    fn latin1_chars_map_directly() {
        assert_eq!(lookup_keysym("a"), 'a' as u32);
        assert_eq!(lookup_keysym("Z"), 'Z' as u32);
        assert_eq!(lookup_keysym(" "), 0x20);
        assert_eq!(lookup_keysym("+"), '+' as u32);
        assert_eq!(lookup_keysym("é"), 'é' as u32);
    }

    #[test]
    fn unicode_chars_use_offset_range() {
        assert_eq!(lookup_keysym("€"), 0x0100_0000 + '€' as u32);
        assert_eq!(lookup_keysym("日"), 0x0100_0000 + '日' as u32);
    }

    #[test]
    fn unknown_names_fall_back_to_void() {
        assert_eq!(lookup_keysym("NoSuchKey"), KEYSYM_VOID);
        assert_eq!(lookup_keysym(""), KEYSYM_VOID);
    }

    #[test]
    fn table_has_no_duplicate_names() {
        for (i, (name, _)) in KEYSYM_TABLE.iter().enumerate() {
            assert!(
                !KEYSYM_TABLE[i + 1..].iter().any(|(n, _)| n == name),
                "duplicate key name {name}"
            );
        }
    }
}
