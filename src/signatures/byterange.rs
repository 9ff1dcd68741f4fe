//! ByteRange calculation for PDF signatures.
//!
//! A signature covers the whole revision except the `/Contents` hex string
//! that holds its own container. The byte range names the two covered spans:
//! `[0 a b c]` where `a` is the offset of `<`, `b` the offset just past `>`,
//! and `c` the length of the tail.
//!
//! Both the range and the contents are written as fixed-width placeholders
//! first, so filling them in never moves a byte of the revision.

use crate::error::{Error, Result};

/// Width of the `/ByteRange` array text, brackets included.
pub const BYTE_RANGE_WIDTH: usize = 64;

/// Placeholder arithmetic for one signature.
#[derive(Debug, Clone, Copy)]
pub struct ByteRangeCalculator {
    /// Length of `<hex>`, angle brackets included
    placeholder_size: usize,
}

impl ByteRangeCalculator {
    /// Reserve room for a container of `reserved_bytes` DER bytes.
    pub fn new(reserved_bytes: usize) -> Self {
        Self {
            placeholder_size: reserved_bytes * 2 + 2,
        }
    }

    pub fn placeholder_size(&self) -> usize {
        self.placeholder_size
    }

    /// Container bytes that fit in the placeholder.
    pub fn capacity(&self) -> usize {
        (self.placeholder_size - 2) / 2
    }

    /// `<000…0>` of the reserved width.
    pub fn contents_placeholder(&self) -> String {
        format!("<{}>", "0".repeat(self.placeholder_size - 2))
    }

    /// The initial `/ByteRange` text: `[0 0 0 0]` padded to the fixed width.
    pub fn byte_range_placeholder() -> String {
        Self::format_byte_range(&[0, 0, 0, 0])
    }

    /// Range for a revision of `file_size` bytes whose `/Contents` value
    /// begins at `contents_offset`.
    pub fn calculate_byte_range(&self, file_size: usize, contents_offset: usize) -> [i64; 4] {
        let after = contents_offset + self.placeholder_size;
        [0, contents_offset as i64, after as i64, file_size as i64 - after as i64]
    }

    /// Range as PDF array text, right-padded with spaces to [`BYTE_RANGE_WIDTH`].
    pub fn format_byte_range(byte_range: &[i64; 4]) -> String {
        let text = format!("[{} {} {} {}]", byte_range[0], byte_range[1], byte_range[2], byte_range[3]);
        format!("{:<width$}", text, width = BYTE_RANGE_WIDTH)
    }

    /// The two covered spans of `pdf_data`.
    pub fn signed_parts<'a>(pdf_data: &'a [u8], byte_range: &[i64]) -> Result<[&'a [u8]; 2]> {
        let [o1, l1, o2, l2] = match byte_range {
            [a, b, c, d] => [*a, *b, *c, *d],
            _ => {
                return Err(Error::InvalidPdf(format!(
                    "ByteRange must have 4 entries, got {}",
                    byte_range.len()
                )))
            },
        };
        let span = |offset: i64, len: i64| -> Result<&'a [u8]> {
            let start = usize::try_from(offset).ok();
            let len = usize::try_from(len).ok();
            match (start, len) {
                (Some(start), Some(len)) if start.checked_add(len).is_some_and(|end| end <= pdf_data.len()) => {
                    Ok(&pdf_data[start..start + len])
                },
                _ => Err(Error::InvalidPdf(format!(
                    "ByteRange span {} +{} exceeds file size {}",
                    offset,
                    len.unwrap_or_default(),
                    pdf_data.len()
                ))),
            }
        };
        Ok([span(o1, l1)?, span(o2, l2)?])
    }

    /// Check the range is well formed for `pdf_data`.
    ///
    /// It must start at 0, its gap must be exactly one `<hex>` string, and it
    /// must end at a `%%EOF` marker (a revision end) inside the file.
    pub fn validate_byte_range(byte_range: &[i64], pdf_data: &[u8]) -> Result<()> {
        let [first, second] = Self::signed_parts(pdf_data, byte_range)?;
        if byte_range[0] != 0 {
            return Err(Error::InvalidPdf(format!("ByteRange must start at 0, got {}", byte_range[0])));
        }
        let gap_start = first.len();
        let gap_end = byte_range[2] as usize;
        if gap_end <= gap_start {
            return Err(Error::InvalidPdf(format!(
                "ByteRange first range ({}) overlaps with second range start ({})",
                gap_start, gap_end
            )));
        }
        let gap = &pdf_data[gap_start..gap_end];
        let is_hex_string = gap.len() >= 2
            && gap[0] == b'<'
            && gap[gap.len() - 1] == b'>'
            && gap[1..gap.len() - 1].iter().all(u8::is_ascii_hexdigit);
        if !is_hex_string {
            return Err(Error::InvalidPdf("ByteRange gap is not the /Contents hex string".to_string()));
        }

        let end = gap_end + second.len();
        let tail = pdf_data[..end].trim_ascii_end();
        if !tail.ends_with(b"%%EOF") {
            return Err(Error::InvalidPdf(format!("ByteRange ends at {}, not at a revision end", end)));
        }
        Ok(())
    }

    /// Overwrite the `/ByteRange` placeholder at `offset` in place.
    pub fn patch_byte_range(pdf_data: &mut [u8], offset: usize, byte_range: &[i64; 4]) -> Result<()> {
        let text = Self::format_byte_range(byte_range);
        if text.len() != BYTE_RANGE_WIDTH || offset + BYTE_RANGE_WIDTH > pdf_data.len() {
            return Err(Error::SignatureConstruction(format!(
                "ByteRange {:?} does not fit its placeholder",
                byte_range
            )));
        }
        pdf_data[offset..offset + BYTE_RANGE_WIDTH].copy_from_slice(text.as_bytes());
        Ok(())
    }

    /// Hex-encode `container` into the placeholder at `contents_offset`, padding
    /// with `0`.
    pub fn insert_signature(&self, pdf_data: &mut [u8], contents_offset: usize, container: &[u8]) -> Result<()> {
        if container.len() > self.capacity() {
            return Err(Error::SignatureConstruction(format!(
                "Signature container ({} bytes) exceeds reserved space ({} bytes)",
                container.len(),
                self.capacity()
            )));
        }
        if contents_offset + self.placeholder_size > pdf_data.len() {
            return Err(Error::SignatureConstruction(
                "Signature insertion would exceed file bounds".to_string(),
            ));
        }

        let mut value = String::with_capacity(self.placeholder_size);
        value.push('<');
        for byte in container {
            value.push_str(&format!("{:02X}", byte));
        }
        while value.len() < self.placeholder_size - 1 {
            value.push('0');
        }
        value.push('>');
        pdf_data[contents_offset..contents_offset + self.placeholder_size].copy_from_slice(value.as_bytes());
        Ok(())
    }
}

impl Default for ByteRangeCalculator {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_SIGNATURE_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_placeholder_size() {
        let calc = ByteRangeCalculator::new(100);
        assert_eq!(calc.placeholder_size(), 202);
        assert_eq!(calc.capacity(), 100);
        let placeholder = calc.contents_placeholder();
        assert_eq!(placeholder.len(), 202);
        assert!(placeholder.starts_with('<') && placeholder.ends_with('>'));
    }

    #[test]
    fn test_calculate_byte_range() {
        let calc = ByteRangeCalculator::new(100);
        assert_eq!(calc.calculate_byte_range(1000, 500), [0, 500, 702, 298]);
    }

    #[test]
    fn test_format_is_fixed_width() {
        let text = ByteRangeCalculator::format_byte_range(&[0, 1234, 5678, 90]);
        assert_eq!(text.len(), BYTE_RANGE_WIDTH);
        assert!(text.starts_with("[0 1234 5678 90]"));
        assert_eq!(ByteRangeCalculator::byte_range_placeholder().len(), BYTE_RANGE_WIDTH);
    }

    fn sample() -> (Vec<u8>, [i64; 4]) {
        let calc = ByteRangeCalculator::new(4);
        let mut data = b"head /Contents ".to_vec();
        let offset = data.len();
        data.extend_from_slice(calc.contents_placeholder().as_bytes());
        data.extend_from_slice(b" tail\n%%EOF\n");
        let range = calc.calculate_byte_range(data.len(), offset);
        (data, range)
    }

    #[test]
    fn test_signed_parts_and_validate() {
        let (data, range) = sample();
        let [a, b] = ByteRangeCalculator::signed_parts(&data, &range).unwrap();
        assert_eq!(a, b"head /Contents ");
        assert_eq!(b, b" tail\n%%EOF\n");
        assert!(ByteRangeCalculator::validate_byte_range(&range, &data).is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_ranges() {
        let (data, range) = sample();
        let mut shifted = range;
        shifted[0] = 1;
        shifted[1] -= 1;
        assert!(ByteRangeCalculator::validate_byte_range(&shifted, &data).is_err());

        let mut short = range;
        short[3] -= 3;
        assert!(ByteRangeCalculator::validate_byte_range(&short, &data).is_err());

        let mut wide = range;
        wide[1] -= 1;
        assert!(ByteRangeCalculator::validate_byte_range(&wide, &data).is_err());

        assert!(ByteRangeCalculator::validate_byte_range(&[0, 10], &data).is_err());
        assert!(ByteRangeCalculator::signed_parts(&data, &[0, 10, 20, 10_000]).is_err());
        assert!(ByteRangeCalculator::signed_parts(&data, &[-1, 10, 20, 1]).is_err());
    }

    #[test]
    fn test_insert_signature() {
        let calc = ByteRangeCalculator::new(4);
        let (mut data, range) = sample();
        calc.insert_signature(&mut data, range[1] as usize, &[0xAB, 0x01]).unwrap();
        let start = range[1] as usize;
        assert_eq!(&data[start..start + 10], b"<AB010000>");
    }

    #[test]
    fn test_insert_signature_too_large() {
        let calc = ByteRangeCalculator::new(4);
        let (mut data, range) = sample();
        assert!(matches!(
            calc.insert_signature(&mut data, range[1] as usize, &[0u8; 5]),
            Err(Error::SignatureConstruction(_))
        ));
    }

    #[test]
    fn test_patch_byte_range() {
        let mut data = format!("/ByteRange {}", ByteRangeCalculator::byte_range_placeholder()).into_bytes();
        let before = data.len();
        ByteRangeCalculator::patch_byte_range(&mut data, 11, &[0, 10, 20, 30]).unwrap();
        assert_eq!(data.len(), before);
        assert!(data.starts_with(b"/ByteRange [0 10 20 30] "));
    }

    proptest! {
        #[test]
        fn prop_range_excludes_exactly_placeholder(reserved in 1usize..64, head in 0usize..200, tail in 0usize..200) {
            let calc = ByteRangeCalculator::new(reserved);
            let total = head + calc.placeholder_size() + tail;
            let range = calc.calculate_byte_range(total, head);
            prop_assert_eq!(range[0], 0);
            prop_assert_eq!(range[1] as usize, head);
            prop_assert_eq!((range[2] - range[1]) as usize, calc.placeholder_size());
            prop_assert_eq!((range[2] + range[3]) as usize, total);
        }
    }
}
