//! A4 layout of a [`ReportDocument`] written with `lopdf`.
//!
//! Only the PDF base-14 fonts are used (Helvetica, Helvetica-Bold and
//! ZapfDingbats for the tick/cross glyphs), so no font files are embedded.
//! Text is encoded as WinAnsi, which covers every character of the en/fr/de
//! tables. Hungarian ő/ű have no WinAnsi code point, so the text fonts carry
//! a `/Differences` array mapping four unused WinAnsi slots to the
//! `*hungarumlaut` glyphs of the standard Latin set.

use super::{Accent, Cell, ReportDocument, Section, SectionBody};
use crate::error::BeawareError;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream, StringFormat};

const PAGE_WIDTH: f32 = 595.28;
const PAGE_HEIGHT: f32 = 841.89;
const MARGIN: f32 = 56.7;
const CM: f32 = 28.35;

const TITLE_SIZE: f32 = 18.0;
const HEADING_SIZE: f32 = 14.0;
const BODY_SIZE: f32 = 11.0;
const GLYPH_SIZE: f32 = 14.0;
const ROW_HEIGHT: f32 = 20.0;

/// WinAnsi slots left undefined by CP1252, reused for the double-acute vowels.
const HUNGARUMLAUT_SLOTS: [(char, u8, &str); 4] = [
    ('Ő', 0x81, "Ohungarumlaut"),
    ('ő', 0x8d, "ohungarumlaut"),
    ('Ű', 0x8f, "Uhungarumlaut"),
    ('ű', 0x90, "uhungarumlaut"),
];

const REGULAR: &str = "F1";
const BOLD: &str = "F2";
const DINGBATS: &str = "F3";

type Rgb = (f32, f32, f32);

const BLACK: Rgb = (0.0, 0.0, 0.0);
const WHITE: Rgb = (1.0, 1.0, 1.0);
const GREY: Rgb = (0.5, 0.5, 0.5);
const GREEN: Rgb = (0.0, 0.5, 0.0);
const RED: Rgb = (1.0, 0.0, 0.0);
const LIGHT_BLUE: Rgb = (0.678, 0.847, 0.902);
const LIGHT_GREEN: Rgb = (0.565, 0.933, 0.565);

/// Serialise `doc` to PDF bytes.
pub fn write_pdf(doc: &ReportDocument) -> Result<Vec<u8>, BeawareError> {
    let mut layout = Layout::new();
    layout.title(&doc.title);
    for section in &doc.sections {
        layout.section(section);
    }
    assemble(&doc.title, layout.finish())
}

// ── Layout ───────────────────────────────────────────────────────────────

/// Top-down cursor over a growing list of pages.
struct Layout {
    pages: Vec<Vec<Operation>>,
    ops: Vec<Operation>,
    y: f32,
}

impl Layout {
    fn new() -> Self {
        Self {
            pages: Vec::new(),
            ops: Vec::new(),
            y: PAGE_HEIGHT - MARGIN,
        }
    }

    fn finish(mut self) -> Vec<Vec<Operation>> {
        self.pages.push(self.ops);
        self.pages
    }

    /// Start a new page if fewer than `height` points remain.
    fn reserve(&mut self, height: f32) {
        if self.y - height < MARGIN {
            let done = std::mem::take(&mut self.ops);
            self.pages.push(done);
            self.y = PAGE_HEIGHT - MARGIN;
        }
    }

    fn title(&mut self, title: &str) {
        self.y -= TITLE_SIZE;
        let x = (PAGE_WIDTH - approx_width(title, TITLE_SIZE)) / 2.0;
        self.text(x.max(MARGIN), self.y, BOLD, TITLE_SIZE, BLACK, encode_win_ansi(title));
        self.y -= 0.4 * CM + TITLE_SIZE;
    }

    fn section(&mut self, section: &Section) {
        self.reserve(HEADING_SIZE * 2.0 + ROW_HEIGHT * 2.0);
        self.y -= HEADING_SIZE;
        self.text(MARGIN, self.y, BOLD, HEADING_SIZE, BLACK, encode_win_ansi(&section.heading));
        self.y -= HEADING_SIZE * 0.8;

        match &section.body {
            SectionBody::Note(note) => {
                self.y -= BODY_SIZE;
                self.text(MARGIN, self.y, REGULAR, BODY_SIZE, BLACK, encode_win_ansi(note));
            }
            SectionBody::Table {
                header,
                rows,
                accent,
            } => self.table(header, rows, *accent),
        }
        self.y -= 0.6 * CM + BODY_SIZE;
    }

    fn table(&mut self, header: &[String; 2], rows: &[[Cell; 2]], accent: Accent) {
        let widths = match accent {
            Accent::Blue => [8.0 * CM, 3.0 * CM],
            Accent::Green => [8.0 * CM, 4.0 * CM],
        };
        let (fill, header_text) = match accent {
            Accent::Blue => (LIGHT_BLUE, WHITE),
            Accent::Green => (LIGHT_GREEN, BLACK),
        };
        let left = (PAGE_WIDTH - widths[0] - widths[1]) / 2.0;

        self.reserve(ROW_HEIGHT * 2.0);
        self.header_row(left, widths, header, fill, header_text);
        for row in rows {
            if self.y - ROW_HEIGHT < MARGIN {
                self.reserve(ROW_HEIGHT * 2.0);
                self.header_row(left, widths, header, fill, header_text);
            }
            self.body_row(left, widths, row);
        }
    }

    fn header_row(&mut self, left: f32, widths: [f32; 2], header: &[String; 2], fill: Rgb, color: Rgb) {
        let bottom = self.y - ROW_HEIGHT;
        self.fill_rect(left, bottom, widths[0] + widths[1], ROW_HEIGHT, fill);
        let mut x = left;
        for (label, width) in header.iter().zip(widths) {
            self.centered_text(x, width, bottom, BOLD, BODY_SIZE, color, label);
            self.stroke_rect(x, bottom, width, ROW_HEIGHT);
            x += width;
        }
        self.y = bottom;
    }

    fn body_row(&mut self, left: f32, widths: [f32; 2], row: &[Cell; 2]) {
        let bottom = self.y - ROW_HEIGHT;
        let mut x = left;
        for (cell, width) in row.iter().zip(widths) {
            match cell {
                Cell::Text(s) => {
                    let s = fit(s, width - 8.0, BODY_SIZE);
                    self.centered_text(x, width, bottom, REGULAR, BODY_SIZE, BLACK, &s);
                }
                Cell::Presence(present) => {
                    // ZapfDingbats: '4' is a check mark, '8' a heavy cross.
                    let (glyph, color) = if *present { (b'4', GREEN) } else { (b'8', RED) };
                    let gx = x + (width - 0.76 * GLYPH_SIZE) / 2.0;
                    let gy = bottom + (ROW_HEIGHT - GLYPH_SIZE * 0.7) / 2.0;
                    self.text(gx, gy, DINGBATS, GLYPH_SIZE, color, vec![glyph]);
                }
            }
            self.stroke_rect(x, bottom, width, ROW_HEIGHT);
            x += width;
        }
        self.y = bottom;
    }

    #[allow(clippy::too_many_arguments)]
    fn centered_text(&mut self, x: f32, width: f32, bottom: f32, font: &str, size: f32, color: Rgb, s: &str) {
        let tx = x + ((width - approx_width(s, size)) / 2.0).max(4.0);
        let ty = bottom + (ROW_HEIGHT - size * 0.7) / 2.0;
        self.text(tx, ty, font, size, color, encode_win_ansi(s));
    }

    fn text(&mut self, x: f32, y: f32, font: &str, size: f32, color: Rgb, bytes: Vec<u8>) {
        self.ops.extend([
            Operation::new("BT", vec![]),
            Operation::new("rg", vec![real(color.0), real(color.1), real(color.2)]),
            Operation::new("Tf", vec![font.into(), real(size)]),
            Operation::new("Td", vec![real(x), real(y)]),
            Operation::new("Tj", vec![Object::String(bytes, StringFormat::Literal)]),
            Operation::new("ET", vec![]),
        ]);
    }

    fn fill_rect(&mut self, x: f32, y: f32, w: f32, h: f32, color: Rgb) {
        self.ops.extend([
            Operation::new("rg", vec![real(color.0), real(color.1), real(color.2)]),
            Operation::new("re", vec![real(x), real(y), real(w), real(h)]),
            Operation::new("f", vec![]),
        ]);
    }

    fn stroke_rect(&mut self, x: f32, y: f32, w: f32, h: f32) {
        self.ops.extend([
            Operation::new("w", vec![real(0.5)]),
            Operation::new("RG", vec![real(GREY.0), real(GREY.1), real(GREY.2)]),
            Operation::new("re", vec![real(x), real(y), real(w), real(h)]),
            Operation::new("S", vec![]),
        ]);
    }
}

fn real(v: f32) -> Object {
    Object::Real(v.into())
}

/// Rough Helvetica advance width; good enough for centring.
fn approx_width(s: &str, size: f32) -> f32 {
    s.chars().count() as f32 * size * 0.52
}

/// Shorten `s` with an ellipsis so it fits in `width` points.
fn fit(s: &str, width: f32, size: f32) -> String {
    if approx_width(s, size) <= width {
        return s.to_string();
    }
    let keep = ((width / (size * 0.52)) as usize).saturating_sub(3);
    let mut out: String = s.chars().take(keep).collect();
    out.push_str("...");
    out
}

/// Encode text as WinAnsi (CP1252) plus the ő/ű/Ő/Ű slots of
/// `HUNGARUMLAUT_SLOTS`. Unmappable characters become `?`.
pub fn encode_win_ansi(s: &str) -> Vec<u8> {
    s.chars()
        .map(|c| match c {
            '\u{20}'..='\u{7e}' | '\u{a0}'..='\u{ff}' => c as u8,
            '€' => 0x80,
            '‚' => 0x82,
            '„' => 0x84,
            '…' => 0x85,
            'Œ' => 0x8c,
            '‘' => 0x91,
            '’' => 0x92,
            '“' => 0x93,
            '”' => 0x94,
            '•' => 0x95,
            '–' => 0x96,
            '—' => 0x97,
            'œ' => 0x9c,
            'Ÿ' => 0x9f,
            _ => HUNGARUMLAUT_SLOTS
                .iter()
                .find(|(ch, _, _)| *ch == c)
                .map_or(b'?', |(_, code, _)| *code),
        })
        .collect()
}

// ── Assembly ─────────────────────────────────────────────────────────────

fn font(base: &str, win_ansi: bool) -> lopdf::Dictionary {
    let mut dict = dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => base,
    };
    if win_ansi {
        let mut differences = Vec::with_capacity(HUNGARUMLAUT_SLOTS.len() * 2);
        for (_, code, glyph) in HUNGARUMLAUT_SLOTS {
            differences.push(Object::Integer(i64::from(code)));
            differences.push(Object::Name(glyph.as_bytes().to_vec()));
        }
        dict.set(
            "Encoding",
            dictionary! {
                "Type" => "Encoding",
                "BaseEncoding" => "WinAnsiEncoding",
                "Differences" => Object::Array(differences),
            },
        );
    }
    dict
}

fn assemble(title: &str, pages: Vec<Vec<Operation>>) -> Result<Vec<u8>, BeawareError> {
    let mut pdf = Document::with_version("1.5");
    let pages_id = pdf.new_object_id();

    let regular = pdf.add_object(font("Helvetica", true));
    let bold = pdf.add_object(font("Helvetica-Bold", true));
    let dingbats = pdf.add_object(font("ZapfDingbats", false));
    let resources_id = pdf.add_object(dictionary! {
        "Font" => dictionary! {
            REGULAR => regular,
            BOLD => bold,
            DINGBATS => dingbats,
        },
    });

    let mut kids: Vec<Object> = Vec::with_capacity(pages.len());
    for operations in pages {
        let encoded = Content { operations }
            .encode()
            .map_err(|e| BeawareError::ReportFailed(e.to_string()))?;
        let content_id = pdf.add_object(Stream::new(dictionary! {}, encoded));
        let page_id = pdf.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    pdf.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "Resources" => resources_id,
            "MediaBox" => vec![real(0.0), real(0.0), real(PAGE_WIDTH), real(PAGE_HEIGHT)],
        }),
    );

    let catalog_id = pdf.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    let info_id = pdf.add_object(dictionary! {
        "Title" => Object::String(encode_win_ansi(title), StringFormat::Literal),
        "Producer" => Object::string_literal("beaware"),
    });
    pdf.trailer.set("Root", catalog_id);
    pdf.trailer.set("Info", info_id);

    let mut out = Vec::new();
    pdf.save_to(&mut out)
        .map_err(|e| BeawareError::ReportFailed(e.to_string()))?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{build_document, ReportRequest};
    use serde_json::json;

    fn page_count(bytes: &[u8]) -> usize {
        lopdf::Document::load_mem(bytes).unwrap().get_pages().len()
    }

    #[test]
    fn win_ansi_covers_report_alphabets() {
        assert_eq!(encode_win_ansi("Œuf"), vec![0x8c, b'u', b'f']);
        assert_eq!(encode_win_ansi("Nährwerte"), b"N\xe4hrwerte".to_vec());
        assert_eq!(encode_win_ansi("Fehérje"), b"Feh\xe9rje".to_vec());
        assert_eq!(encode_win_ansi("elérhető"), b"el\xe9rhet\x8d".to_vec());
        assert_eq!(encode_win_ansi("űŐŰ"), vec![0x90, 0x81, 0x8f]);
        assert_eq!(encode_win_ansi("日"), vec![b'?']);
    }

    #[test]
    fn text_fonts_map_double_acute_slots() {
        let dict = font("Helvetica", true);
        let encoding = dict.get(b"Encoding").unwrap().as_dict().unwrap();
        assert!(matches!(encoding.get(b"BaseEncoding").unwrap(), Object::Name(n) if n == b"WinAnsiEncoding"));
        let differences = encoding.get(b"Differences").unwrap().as_array().unwrap();
        let pos = differences
            .iter()
            .position(|o| matches!(o, Object::Name(n) if n == b"ohungarumlaut"))
            .unwrap();
        assert!(matches!(differences[pos - 1], Object::Integer(0x8d)));

        assert!(font("ZapfDingbats", false).get(b"Encoding").is_err());
    }

    #[test]
    fn fit_adds_ellipsis_only_when_needed() {
        assert_eq!(fit("250 kcal", 100.0, 11.0), "250 kcal");
        let long = "x".repeat(200);
        let out = fit(&long, 100.0, 11.0);
        assert!(out.ends_with("..."));
        assert!(out.len() < long.len());
    }

    #[test]
    fn report_is_a_loadable_single_page_pdf() {
        let doc = build_document(&ReportRequest::from_value(&json!({
            "language": "hu",
            "allergens": {"milk": true, "gluten": false},
            "nutritional_values": {"energy": "1046 kJ"}
        })));
        let bytes = write_pdf(&doc).unwrap();
        assert!(bytes.starts_with(b"%PDF-1.5"));
        assert_eq!(page_count(&bytes), 1);
    }

    #[test]
    fn long_allergen_lists_spill_onto_more_pages() {
        let allergens: serde_json::Map<String, serde_json::Value> =
            (0..80).map(|i| (format!("extra_{i:02}"), json!(i % 2 == 0))).collect();
        let doc = build_document(&ReportRequest::from_value(&json!({ "allergens": allergens })));
        let bytes = write_pdf(&doc).unwrap();
        assert!(page_count(&bytes) >= 2);
    }
}
