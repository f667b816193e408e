//! Character sets for entry names and comments.
//!
//! ZIP stores names as raw bytes. General-purpose bit 11 marks them as
//! UTF-8; without it readers traditionally assume IBM code page 437.
//! Archives produced by localized tools often use a regional code page
//! instead, which is covered by [`Charset::Encoding`].

use std::borrow::Cow;

/// Character set used to decode and encode names and comments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Charset {
    /// UTF-8. Names that are not pure ASCII get the UTF-8 flag on write.
    #[default]
    Utf8,
    /// IBM PC code page 437.
    Cp437,
    /// Any encoding known to `encoding_rs` (Shift_JIS, GBK, windows-1251, ...).
    Encoding(&'static encoding_rs::Encoding),
}

impl Charset {
    /// Looks up a charset by WHATWG label (`"utf-8"`, `"cp437"`, `"shift_jis"`).
    pub fn for_label(label: &str) -> Option<Self> {
        let lower = label.trim().to_ascii_lowercase();
        match lower.as_str() {
            "utf-8" | "utf8" => Some(Charset::Utf8),
            "cp437" | "ibm437" | "437" => Some(Charset::Cp437),
            _ => encoding_rs::Encoding::for_label(lower.as_bytes()).map(Charset::Encoding),
        }
    }

    /// Decodes raw header bytes.
    ///
    /// When `utf8_flag` is set the bytes are UTF-8 regardless of this
    /// charset. Invalid sequences are replaced, never rejected.
    pub fn decode(self, bytes: &[u8], utf8_flag: bool) -> String {
        if utf8_flag {
            return String::from_utf8_lossy(bytes).into_owned();
        }
        match self {
            Charset::Utf8 => match std::str::from_utf8(bytes) {
                Ok(s) => s.to_string(),
                Err(_) => decode_cp437(bytes),
            },
            Charset::Cp437 => decode_cp437(bytes),
            Charset::Encoding(encoding) => {
                let (text, _) = encoding.decode_without_bom_handling(bytes);
                text.into_owned()
            }
        }
    }

    /// Encodes text for a header, returning the bytes and whether the
    /// UTF-8 flag must be set.
    pub fn encode(self, text: &str) -> (Vec<u8>, bool) {
        if text.is_ascii() {
            return (text.as_bytes().to_vec(), false);
        }
        match self {
            Charset::Utf8 => (text.as_bytes().to_vec(), true),
            Charset::Cp437 => match encode_cp437(text) {
                Some(bytes) => (bytes, false),
                None => (text.as_bytes().to_vec(), true),
            },
            Charset::Encoding(encoding) => {
                let (bytes, _, had_errors) = encoding.encode(text);
                if had_errors || encoding == encoding_rs::UTF_8 {
                    (text.as_bytes().to_vec(), true)
                } else {
                    (bytes.into_owned(), false)
                }
            }
        }
    }
}

const CP437_HIGH: [char; 128] = [
    'Ç', 'ü', 'é', 'â', 'ä', 'à', 'å', 'ç', 'ê', 'ë', 'è', 'ï', 'î', 'ì', 'Ä', 'Å', //
    'É', 'æ', 'Æ', 'ô', 'ö', 'ò', 'û', 'ù', 'ÿ', 'Ö', 'Ü', '¢', '£', '¥', '₧', 'ƒ', //
    'á', 'í', 'ó', 'ú', 'ñ', 'Ñ', 'ª', 'º', '¿', '⌐', '¬', '½', '¼', '¡', '«', '»', //
    '░', '▒', '▓', '│', '┤', '╡', '╢', '╖', '╕', '╣', '║', '╗', '╝', '╜', '╛', '┐', //
    '└', '┴', '┬', '├', '─', '┼', '╞', '╟', '╚', '╔', '╩', '╦', '╠', '═', '╬', '╧', //
    '╨', '╤', '╥', '╙', '╘', '╒', '╓', '╫', '╪', '┘', '┌', '█', '▄', '▌', '▐', '▀', //
    'α', 'ß', 'Γ', 'π', 'Σ', 'σ', 'µ', 'τ', 'Φ', 'Θ', 'Ω', 'δ', '∞', 'φ', 'ε', '∩', //
    '≡', '±', '≥', '≤', '⌠', '⌡', '÷', '≈', '°', '∙', '·', '√', 'ⁿ', '²', '■', '\u{a0}',
];

fn decode_cp437(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|&b| {
            if b < 0x80 {
                b as char
            } else {
                CP437_HIGH[(b - 0x80) as usize]
            }
        })
        .collect()
}

fn encode_cp437(text: &str) -> Option<Vec<u8>> {
    text.chars()
        .map(|c| {
            if c.is_ascii() {
                Some(c as u8)
            } else {
                CP437_HIGH
                    .iter()
                    .position(|&h| h == c)
                    .map(|i| 0x80 + i as u8)
            }
        })
        .collect()
}

/// Decodes a comment or name with the fallback chain used for archive-level
/// text, where no per-record UTF-8 flag exists.
pub(crate) fn decode_archive_comment(charset: Charset, bytes: &[u8]) -> Cow<'_, str> {
    match std::str::from_utf8(bytes) {
        Ok(s) => Cow::Borrowed(s),
        Err(_) => Cow::Owned(charset.decode(bytes, false)),
    }
}
