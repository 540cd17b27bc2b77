// ABOUTME: GSM 03.38 default alphabet, extension table and 7-bit septet packing
// ABOUTME: Used by message segmentation to choose data_coding 0 and to size segments in septets

/// Escape septet introducing an extension-table character
pub const ESCAPE: u8 = 0x1B;

/// Basic character set, indexed by septet value. Index 0x1B is the escape
/// code and never matches an input character.
const BASIC: [char; 128] = [
    '@', '£', '$', '¥', 'è', 'é', 'ù', 'ì', 'ò', 'Ç', '\n', 'Ø', 'ø', '\r', 'Å', 'å', //
    'Δ', '_', 'Φ', 'Γ', 'Λ', 'Ω', 'Π', 'Ψ', 'Σ', 'Θ', 'Ξ', '\u{1B}', 'Æ', 'æ', 'ß', 'É', //
    ' ', '!', '"', '#', '¤', '%', '&', '\'', '(', ')', '*', '+', ',', '-', '.', '/', //
    '0', '1', '2', '3', '4', '5', '6', '7', '8', '9', ':', ';', '<', '=', '>', '?', //
    '¡', 'A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'I', 'J', 'K', 'L', 'M', 'N', 'O', //
    'P', 'Q', 'R', 'S', 'T', 'U', 'V', 'W', 'X', 'Y', 'Z', 'Ä', 'Ö', 'Ñ', 'Ü', '§', //
    '¿', 'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'i', 'j', 'k', 'l', 'm', 'n', 'o', //
    'p', 'q', 'r', 's', 't', 'u', 'v', 'w', 'x', 'y', 'z', 'ä', 'ö', 'ñ', 'ü', 'à', //
];

/// Extension table: (septet after ESC, character)
const EXTENSION: [(u8, char); 10] = [
    (0x0A, '\u{0C}'),
    (0x14, '^'),
    (0x28, '{'),
    (0x29, '}'),
    (0x2F, '\\'),
    (0x3C, '['),
    (0x3D, '~'),
    (0x3E, ']'),
    (0x40, '|'),
    (0x65, '€'),
];

/// Septets encoding `c`: one for the basic set, two (ESC + code) for the
/// extension table, None if the character is not representable.
pub fn char_to_septets(c: char) -> Option<([u8; 2], usize)> {
    if c != '\u{1B}' {
        if let Some(index) = BASIC.iter().position(|&b| b == c) {
            return Some(([index as u8, 0], 1));
        }
    }
    EXTENSION
        .iter()
        .find(|&&(_, ext)| ext == c)
        .map(|&(code, _)| ([ESCAPE, code], 2))
}

/// True when every character of `text` maps into the default alphabet or
/// its extension table.
pub fn is_gsm7(text: &str) -> bool {
    text.chars().all(|c| char_to_septets(c).is_some())
}

/// Encode text to unpacked septets (one per byte); None if any character is
/// outside the alphabet.
pub fn encode(text: &str) -> Option<Vec<u8>> {
    let mut septets = Vec::with_capacity(text.len());
    for c in text.chars() {
        let (codes, len) = char_to_septets(c)?;
        septets.extend_from_slice(&codes[..len]);
    }
    Some(septets)
}

/// Decode unpacked septets. Unknown escape sequences decode as a space, as
/// handsets do.
pub fn decode(septets: &[u8]) -> String {
    let mut text = String::with_capacity(septets.len());
    let mut iter = septets.iter();
    while let Some(&septet) = iter.next() {
        if septet == ESCAPE {
            let ext = iter.next().and_then(|&code| {
                EXTENSION
                    .iter()
                    .find(|&&(ext_code, _)| ext_code == code)
                    .map(|&(_, c)| c)
            });
            text.push(ext.unwrap_or(' '));
        } else {
            text.push(BASIC[(septet & 0x7F) as usize]);
        }
    }
    text
}

/// Pack septets LSB-first into octets, leaving `fill_bits` zero bits at the
/// start so the septets following a UDH stay aligned.
pub fn pack(septets: &[u8], fill_bits: usize) -> Vec<u8> {
    let total_bits = fill_bits + septets.len() * 7;
    let mut out = vec![0u8; total_bits.div_ceil(8)];

    for (i, &septet) in septets.iter().enumerate() {
        let septet = septet & 0x7F;
        let bit = fill_bits + i * 7;
        let (byte, shift) = (bit / 8, bit % 8);
        out[byte] |= septet << shift;
        if shift > 1 {
            out[byte + 1] |= septet >> (8 - shift);
        }
    }
    out
}

/// Inverse of [`pack`]; None if `octets` is too short to hold `count` septets.
pub fn unpack(octets: &[u8], count: usize, fill_bits: usize) -> Option<Vec<u8>> {
    if (fill_bits + count * 7).div_ceil(8) > octets.len() {
        return None;
    }

    let mut septets = Vec::with_capacity(count);
    for i in 0..count {
        let bit = fill_bits + i * 7;
        let (byte, shift) = (bit / 8, bit % 8);
        let mut value = u16::from(octets[byte]) >> shift;
        if shift > 1 {
            value |= u16::from(octets[byte + 1]) << (8 - shift);
        }
        septets.push((value & 0x7F) as u8);
    }
    Some(septets)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_and_extension_characters() {
        assert_eq!(char_to_septets('@'), Some(([0x00, 0], 1)));
        assert_eq!(char_to_septets('A'), Some(([0x41, 0], 1)));
        assert_eq!(char_to_septets('€'), Some(([0x1B, 0x65], 2)));
        assert_eq!(char_to_septets('['), Some(([0x1B, 0x3C], 2)));
        assert_eq!(char_to_septets('ж'), None);
        assert_eq!(char_to_septets('\u{1B}'), None);
    }

    #[test]
    fn alphabet_detection() {
        assert!(is_gsm7("Hello World! {price} 5€"));
        assert!(!is_gsm7("Привет"));
        assert!(!is_gsm7("smile 😀"));
    }

    #[test]
    fn pack_known_vector() {
        // "hellohello" from GSM 03.38 worked examples
        let septets = encode("hellohello").unwrap();
        assert_eq!(
            pack(&septets, 0),
            vec![0xE8, 0x32, 0x9B, 0xFD, 0x46, 0x97, 0xD9, 0xEC, 0x37]
        );
    }

    #[test]
    fn unpack_reverses_pack_with_fill_bits() {
        let septets = encode("Concatenated [part] €").unwrap();
        let packed = pack(&septets, 1);
        assert_eq!(unpack(&packed, septets.len(), 1), Some(septets.clone()));
        assert_eq!(decode(&septets), "Concatenated [part] €");
    }

    #[test]
    fn unpack_detects_short_input() {
        assert_eq!(unpack(&[0xE8], 2, 0), None);
    }

    #[test]
    fn eight_septets_fill_seven_octets() {
        let packed = pack(&[0x7F; 8], 0);
        assert_eq!(packed, vec![0xFF; 7]);
    }
}
