//! Visible signature appearance.
//!
//! The widget shows the signer name in the left half and a description in
//! the right half, both in Helvetica with WinAnsi encoding, sized to fit.
//!
//! Two layouts exist. The simplified one emits a background layer `n0` and a
//! text layer `n2`. The layered one also carries the legacy validity layers
//! `n1` (status unknown) and `n3` (blank) and composes all four inside an
//! `/FRM` form, as older viewers expect.

use crate::geometry::Rect;
use crate::object::{Dict, Object, ObjectRef};
use crate::writer::{IncrementalWriter, ObjectSerializer};
use chrono::{DateTime, FixedOffset};

/// Helvetica advance widths for ASCII 32..=126, in 1/1000 em.
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // ' '../
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556, // 0..?
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778, // @..O
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556, // P.._
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556, // `..o
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584, // p..~
];

/// Width used for Latin-1 characters outside the ASCII table.
const DEFAULT_WIDTH: u16 = 556;

/// Inner margin of each half, in points.
const MARGIN: f32 = 2.0;

/// Line height as a multiple of the font size.
const LEADING: f32 = 1.2;

const MIN_FONT_SIZE: f32 = 4.0;
const MAX_FONT_SIZE: f32 = 24.0;

/// Text and layout choices for one visible signature.
#[derive(Debug, Clone)]
pub struct SignatureAppearance {
    /// Common name of the signer
    pub signer_name: String,
    /// Signing time shown in the description
    pub signing_time: DateTime<FixedOffset>,
    pub reason: String,
    pub location: String,
    pub custom_text: String,
    /// Emit the legacy `n1`/`n3` layers under `/FRM`
    pub layered: bool,
}

impl SignatureAppearance {
    /// Lines of the right-hand description.
    pub fn description_lines(&self) -> Vec<String> {
        let mut lines = vec![
            format!("Digitally signed by {}", self.signer_name),
            format!("Date: {}", display_date(&self.signing_time)),
        ];
        if !self.reason.is_empty() {
            lines.push(format!("Reason: {}", self.reason));
        }
        if !self.location.is_empty() {
            lines.push(format!("Location: {}", self.location));
        }
        if !self.custom_text.is_empty() {
            lines.push(self.custom_text.clone());
        }
        lines
    }

    /// Write the appearance forms for a widget of size `rect` and return the
    /// normal appearance (`/AP /N`).
    pub fn write(&self, writer: &mut IncrementalWriter, rect: &Rect) -> ObjectRef {
        let (width, height) = (rect.width, rect.height);
        let half = width / 2.0;

        let name_box = Rect::new(MARGIN, MARGIN, half - 2.0 * MARGIN, height - 2.0 * MARGIN);
        let description_box = Rect::new(half + MARGIN, MARGIN, half - 2.0 * MARGIN, height - 2.0 * MARGIN);
        let mut text = b"q\n0 g\n".to_vec();
        text.extend_from_slice(&text_block(std::slice::from_ref(&self.signer_name), &name_box));
        text.extend_from_slice(&text_block(&self.description_lines(), &description_box));
        text.extend_from_slice(b"Q\n");

        let mut font = Dict::new();
        font.insert("Type".to_string(), Object::name("Font"));
        font.insert("Subtype".to_string(), Object::name("Type1"));
        font.insert("BaseFont".to_string(), Object::name("Helvetica"));
        font.insert("Encoding".to_string(), Object::name("WinAnsiEncoding"));
        let text_resources = ObjectSerializer::dict(vec![(
            "Font",
            ObjectSerializer::dict(vec![("F1", Object::Dictionary(font))]),
        )]);

        let n0 = write_form(writer, width, height, b"% DSBlank\n".to_vec(), None);
        let n2 = write_form(writer, width, height, text, Some(text_resources.clone()));

        let layers = if self.layered {
            let n1 = write_form(
                writer,
                width,
                height,
                unknown_status_mark(width, height),
                Some(text_resources.clone()),
            );
            let n3 = write_form(writer, width, height, b"% DSBlank\n".to_vec(), None);
            vec![("n0", n0), ("n1", n1), ("n2", n2), ("n3", n3)]
        } else {
            vec![("n0", n0), ("n2", n2)]
        };

        let stacked = stack_layers(writer, width, height, &layers);
        let normal = if self.layered {
            stack_layers(writer, width, height, &[("FRM", stacked)])
        } else {
            stacked
        };
        log::debug!(
            "Appearance {} x {} with {} layers at {}",
            width,
            height,
            layers.len(),
            normal
        );
        normal
    }
}

/// `yyyy.MM.dd HH:mm:ss ±zz'zz`
pub fn display_date(time: &DateTime<FixedOffset>) -> String {
    let offset = time.offset().local_minus_utc();
    let sign = if offset < 0 { '-' } else { '+' };
    let minutes = offset.abs() / 60;
    format!(
        "{} {}{:02}'{:02}",
        time.format("%Y.%m.%d %H:%M:%S"),
        sign,
        minutes / 60,
        minutes % 60
    )
}

/// Width of `text` in Helvetica at `size` points.
pub fn text_width(text: &str, size: f32) -> f32 {
    let units: u32 = text
        .chars()
        .map(|c| match c as u32 {
            code @ 32..=126 => HELVETICA_WIDTHS[(code - 32) as usize] as u32,
            _ => DEFAULT_WIDTH as u32,
        })
        .sum();
    units as f32 * size / 1000.0
}

/// Largest font size at which every line fits a `width` x `height` box.
pub fn fit_font_size(lines: &[String], width: f32, height: f32) -> f32 {
    if lines.is_empty() || width <= 0.0 || height <= 0.0 {
        return MIN_FONT_SIZE;
    }
    let by_height = height / (lines.len() as f32 * LEADING);
    let by_width = lines
        .iter()
        .map(|line| text_width(line, 1.0))
        .filter(|w| *w > 0.0)
        .map(|w| width / w)
        .fold(f32::INFINITY, f32::min);
    by_height.min(by_width).clamp(MIN_FONT_SIZE, MAX_FONT_SIZE)
}

/// WinAnsi bytes of `text`; characters outside Latin-1 become `?`.
fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c as u32 {
            code @ (32..=126 | 0xA0..=0xFF) => code as u8,
            _ => b'?',
        })
        .collect()
}

fn literal(text: &str) -> Vec<u8> {
    let mut out = vec![b'('];
    for byte in encode_win_ansi(text) {
        if matches!(byte, b'(' | b')' | b'\\') {
            out.push(b'\\');
        }
        out.push(byte);
    }
    out.push(b')');
    out
}

fn num(value: f32) -> String {
    let formatted = format!("{:.2}", value);
    formatted
        .trim_end_matches('0')
        .trim_end_matches('.')
        .to_string()
}

/// `BT … ET` for `lines`, top-aligned in `area`.
fn text_block(lines: &[String], area: &Rect) -> Vec<u8> {
    let size = fit_font_size(lines, area.width, area.height);
    let mut out = format!(
        "BT\n/F1 {} Tf\n{} TL\n1 0 0 1 {} {} Tm\n",
        num(size),
        num(size * LEADING),
        num(area.left()),
        num(area.top() - size)
    )
    .into_bytes();
    for (i, line) in lines.iter().enumerate() {
        if i > 0 {
            out.extend_from_slice(b"T*\n");
        }
        out.extend_from_slice(&literal(line));
        out.extend_from_slice(b" Tj\n");
    }
    out.extend_from_slice(b"ET\n");
    out
}

/// Question mark in the upper-left corner marking an unverified signature.
fn unknown_status_mark(width: f32, height: f32) -> Vec<u8> {
    let size = (height.min(width) / 4.0).max(MIN_FONT_SIZE);
    format!(
        "% DSUnknown\nq\n1 0.8 0 rg\nBT\n/F1 {} Tf\n2 {} Td\n(?) Tj\nET\nQ\n",
        num(size),
        num(height - size)
    )
    .into_bytes()
}

fn write_form(
    writer: &mut IncrementalWriter,
    width: f32,
    height: f32,
    content: Vec<u8>,
    resources: Option<Object>,
) -> ObjectRef {
    let mut dict = Dict::new();
    dict.insert("Type".to_string(), Object::name("XObject"));
    dict.insert("Subtype".to_string(), Object::name("Form"));
    dict.insert("FormType".to_string(), Object::Integer(1));
    dict.insert(
        "BBox".to_string(),
        Object::Array(vec![
            Object::Integer(0),
            Object::Integer(0),
            Object::Real(width as f64),
            Object::Real(height as f64),
        ]),
    );
    if let Some(resources) = resources {
        dict.insert("Resources".to_string(), resources);
    }
    let form = writer.allocate();
    writer.write_object(
        form,
        &Object::Stream {
            dict,
            data: bytes::Bytes::from(content),
        },
    );
    form
}

/// A form drawing each named layer at the origin, in order.
fn stack_layers(
    writer: &mut IncrementalWriter,
    width: f32,
    height: f32,
    layers: &[(&str, ObjectRef)],
) -> ObjectRef {
    let mut content = String::new();
    let mut xobjects = Dict::new();
    for (name, form) in layers {
        content.push_str(&format!("q 1 0 0 1 0 0 cm /{} Do Q\n", name));
        xobjects.insert(name.to_string(), Object::Reference(*form));
    }
    let resources = ObjectSerializer::dict(vec![("XObject", Object::Dictionary(xobjects))]);
    write_form(writer, width, height, content.into_bytes(), Some(resources))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xref::parse_xref;
    use chrono::TimeZone;

    fn appearance(layered: bool) -> SignatureAppearance {
        SignatureAppearance {
            signer_name: "Alice Example".into(),
            signing_time: FixedOffset::east_opt(2 * 3600)
                .unwrap()
                .with_ymd_and_hms(2024, 3, 5, 14, 7, 9)
                .unwrap(),
            reason: "Approval".into(),
            location: String::new(),
            custom_text: "Ref 42".into(),
            layered,
        }
    }

    fn base_pdf() -> Vec<u8> {
        let mut pdf = b"%PDF-1.4\n".to_vec();
        let offset = pdf.len();
        pdf.extend_from_slice(b"1 0 obj\n<< /Type /Catalog >>\nendobj\n");
        let xref = pdf.len();
        pdf.extend_from_slice(
            format!(
                "xref\n0 2\n0000000000 65535 f\r\n{:010} 00000 n\r\ntrailer\n<< /Size 2 /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
                offset, xref
            )
            .as_bytes(),
        );
        pdf
    }

    #[test]
    fn test_description_lines() {
        let lines = appearance(false).description_lines();
        assert_eq!(
            lines,
            vec![
                "Digitally signed by Alice Example".to_string(),
                "Date: 2024.03.05 14:07:09 +02'00".to_string(),
                "Reason: Approval".to_string(),
                "Ref 42".to_string(),
            ]
        );
    }

    #[test]
    fn test_negative_offset_date() {
        let time = FixedOffset::west_opt(5 * 3600 + 30 * 60)
            .unwrap()
            .with_ymd_and_hms(2023, 12, 31, 23, 59, 59)
            .unwrap();
        assert_eq!(display_date(&time), "2023.12.31 23:59:59 -05'30");
    }

    #[test]
    fn test_text_width() {
        assert_eq!(text_width("", 12.0), 0.0);
        // "Hi" = 722 + 222
        assert!((text_width("Hi", 10.0) - 9.44).abs() < 1e-4);
        assert!((text_width("é", 1.0) - 0.556).abs() < 1e-6);
    }

    #[test]
    fn test_fit_font_size() {
        let lines = vec!["Digitally signed by Alice".to_string()];
        let size = fit_font_size(&lines, 100.0, 50.0);
        assert!(text_width(&lines[0], size) <= 100.0 + 1e-3);
        assert!(size >= MIN_FONT_SIZE && size <= MAX_FONT_SIZE);

        let many: Vec<String> = (0..10).map(|i| format!("line {}", i)).collect();
        assert_eq!(fit_font_size(&many, 1000.0, 12.0), MIN_FONT_SIZE);
        assert_eq!(fit_font_size(&["x".to_string()], 1000.0, 1000.0), MAX_FONT_SIZE);
    }

    #[test]
    fn test_literal_escapes_and_encoding() {
        assert_eq!(literal("a(b)\\"), b"(a\\(b\\)\\\\)".to_vec());
        assert_eq!(encode_win_ansi("é€"), vec![0xE9, b'?']);
    }

    #[test]
    fn test_simplified_layers() {
        let base = base_pdf();
        let xref = parse_xref(&base).unwrap();
        let mut writer = IncrementalWriter::new(base, &xref, 2);
        let normal = appearance(false).write(&mut writer, &Rect::new(0.0, 0.0, 200.0, 60.0));
        let out = String::from_utf8_lossy(&writer.finish().unwrap()).to_string();
        assert_eq!(normal, ObjectRef::new(4, 0));
        assert!(out.contains("/n0 Do"));
        assert!(out.contains("/n2 Do"));
        assert!(!out.contains("/n1 Do"));
        assert!(!out.contains("/FRM"));
        assert!(out.contains("(Alice Example) Tj"));
        assert!(out.contains("/BaseFont /Helvetica"));
    }

    #[test]
    fn test_layered_appearance() {
        let base = base_pdf();
        let xref = parse_xref(&base).unwrap();
        let mut writer = IncrementalWriter::new(base, &xref, 2);
        let normal = appearance(true).write(&mut writer, &Rect::new(0.0, 0.0, 200.0, 60.0));
        let out = String::from_utf8_lossy(&writer.finish().unwrap()).to_string();
        // n0 n2 n1 n3, FRM, N
        assert_eq!(normal, ObjectRef::new(7, 0));
        assert!(out.contains("/FRM Do"));
        assert!(out.contains("/n1 Do"));
        assert!(out.contains("/n3 Do"));
        assert!(out.contains("% DSUnknown"));
    }
}
