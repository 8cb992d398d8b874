use crate::error::Error;

/// Number of bytes reserved in `/Contents` for the DER signature object.
/// The CMS blob for a single RSA-2048 signer is around 2 KB; the rest of
/// the window stays zero padded.
pub(crate) const SIGNATURE_RESERVED_BYTES: usize = 8192;

/// Placeholder value serialized into `/ByteRange` before the offsets are
/// known. Ten digits wide so the real offsets always fit when patched.
pub(crate) const BYTE_RANGE_PLACEHOLDER: i64 = 9_999_999_999;

/// The two byte spans of a PDF covered by a signature:
/// everything before the `/Contents` hex string and everything after it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub offset1: i64,
    pub length1: i64,
    pub offset2: i64,
    pub length2: i64,
}

impl ByteRange {
    /// Range for a file of `file_len` bytes whose `/Contents` string
    /// (including the `<` and `>` delimiters) spans
    /// `contents_start..contents_end`.
    pub fn around_contents(contents_start: usize, contents_end: usize, file_len: usize) -> Self {
        ByteRange {
            offset1: 0,
            length1: contents_start as i64,
            offset2: contents_end as i64,
            length2: (file_len - contents_end) as i64,
        }
    }

    pub fn from_array(values: &[i64]) -> Result<Self, Error> {
        if values.len() != 4 {
            return Err(Error::VerificationStructural(format!(
                "ByteRange must have 4 entries, found {}",
                values.len()
            )));
        }
        Ok(ByteRange {
            offset1: values[0],
            length1: values[1],
            offset2: values[2],
            length2: values[3],
        })
    }

    /// Concatenate the two covered spans.
    pub fn signed_bytes(&self, data: &[u8]) -> Result<Vec<u8>, Error> {
        let (o1, l1) = (self.offset1, self.length1);
        let (o2, l2) = (self.offset2, self.length2);
        if o1 < 0 || l1 < 0 || o2 < 0 || l2 < 0 {
            return Err(Error::VerificationStructural(
                "ByteRange entries must be non-negative".to_owned(),
            ));
        }
        let end1 = (o1 + l1) as usize;
        let end2 = (o2 + l2) as usize;
        if end1 > data.len() || end2 > data.len() || end1 > o2 as usize {
            return Err(Error::VerificationStructural(
                "ByteRange exceeds document bounds".to_owned(),
            ));
        }

        let mut signed = Vec::with_capacity((l1 + l2) as usize);
        signed.extend_from_slice(&data[o1 as usize..end1]);
        signed.extend_from_slice(&data[o2 as usize..end2]);
        Ok(signed)
    }
}

/// Locate the reserved `/Contents` window (the last run of
/// `<00...00>` with `hex_digits` zeros) in a serialized document.
/// Returns the span including both delimiters.
pub(crate) fn find_contents_window(
    data: &[u8],
    hex_digits: usize,
) -> Result<(usize, usize), Error> {
    let mut marker = Vec::with_capacity(hex_digits + 2);
    marker.push(b'<');
    marker.resize(hex_digits + 1, b'0');
    marker.push(b'>');

    let start = rfind(data, &marker).ok_or_else(|| {
        Error::Signing("reserved signature window not found in serialized document".to_owned())
    })?;
    Ok((start, start + marker.len()))
}

/// Patch the `/ByteRange` placeholder array in place. The replacement is
/// space padded to the width of the serialized placeholder, so offsets of
/// everything else in the file are preserved.
pub(crate) fn patch_byte_range(data: &mut [u8], byte_range: &ByteRange) -> Result<(), Error> {
    let key_at = rfind(data, b"/ByteRange")
        .ok_or_else(|| Error::Signing("ByteRange entry not found".to_owned()))?;
    let open = find_from(data, key_at, b'[')
        .ok_or_else(|| Error::Signing("ByteRange array start not found".to_owned()))?;
    let close = find_from(data, open, b']')
        .ok_or_else(|| Error::Signing("ByteRange array end not found".to_owned()))?;

    let replacement = format!(
        "{} {} {} {}",
        byte_range.offset1, byte_range.length1, byte_range.offset2, byte_range.length2
    );
    let window = close - open - 1;
    if replacement.len() > window {
        return Err(Error::Signing(
            "ByteRange values exceed the reserved width".to_owned(),
        ));
    }

    let target = &mut data[open + 1..close];
    target.fill(b' ');
    target[..replacement.len()].copy_from_slice(replacement.as_bytes());
    Ok(())
}

/// Hex-encode the signature into the `/Contents` window. Anything after the
/// signature keeps its zero padding, which DER readers ignore.
pub(crate) fn write_signature(
    data: &mut [u8],
    contents_start: usize,
    signature_der: &[u8],
) -> Result<(), Error> {
    let window = SIGNATURE_RESERVED_BYTES * 2;
    if signature_der.len() * 2 > window {
        return Err(Error::Signing(format!(
            "signature of {} bytes exceeds the reserved {} bytes",
            signature_der.len(),
            SIGNATURE_RESERVED_BYTES
        )));
    }

    let hex = to_hex(signature_der);
    let target = &mut data[contents_start + 1..contents_start + 1 + hex.len()];
    target.copy_from_slice(hex.as_bytes());
    Ok(())
}

/// Uppercase hex, two digits per byte.
pub(crate) fn to_hex(bytes: &[u8]) -> String {
    const HEX: &[u8] = b"0123456789ABCDEF";
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push(HEX[(byte >> 4) as usize] as char);
        out.push(HEX[(byte & 0x0f) as usize] as char);
    }
    out
}

fn rfind(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    (0..=haystack.len() - needle.len())
        .rev()
        .find(|&idx| &haystack[idx..idx + needle.len()] == needle)
}

fn find_from(haystack: &[u8], from: usize, needle: u8) -> Option<usize> {
    haystack[from..]
        .iter()
        .position(|&byte| byte == needle)
        .map(|pos| from + pos)
}
