//! Positioned page text.
//!
//! Walks a page's content stream tracking the text and transformation
//! matrices, places every glyph at its device-space x/y, and renders the page
//! as lines of text where horizontal distance becomes spaces. Cells drawn with
//! separate `Td`/`Tm` moves therefore come out as columns separated by runs of
//! spaces, the same shape a space-padded statement produces.

use std::collections::BTreeMap;

use lopdf::content::Operation;
use lopdf::{Dictionary, Document, Encoding, Object, ObjectId};

/// Glyph advance (in text space, per unit font size) when the font carries no widths.
const FIXED_PITCH_WIDTH: f32 = 0.6;
const PROPORTIONAL_WIDTH: f32 = 0.5;
/// Gaps wider than this many character units always split cells.
const CELL_GAP_UNITS: f32 = 1.5;
/// Gaps wider than this many character units are at least a word space.
const WORD_GAP_UNITS: f32 = 0.3;
/// Baseline gap, in font sizes, treated as a paragraph break.
const PARAGRAPH_GAP: f32 = 2.5;

/// `[a b c d e f]` affine matrix, PDF convention.
type Matrix = [f32; 6];

const IDENTITY: Matrix = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];

fn multiply(m1: &Matrix, m2: &Matrix) -> Matrix {
    [
        m1[0] * m2[0] + m1[1] * m2[2],
        m1[0] * m2[1] + m1[1] * m2[3],
        m1[2] * m2[0] + m1[3] * m2[2],
        m1[2] * m2[1] + m1[3] * m2[3],
        m1[4] * m2[0] + m1[5] * m2[2] + m2[4],
        m1[4] * m2[1] + m1[5] * m2[3] + m2[5],
    ]
}

fn translate(tx: f32, ty: f32) -> Matrix {
    [1.0, 0.0, 0.0, 1.0, tx, ty]
}

fn origin(m: &Matrix) -> (f32, f32) {
    (m[4], m[5])
}

/// One decoded character with its horizontal extent and baseline.
#[derive(Debug, Clone, PartialEq)]
pub struct Glyph {
    pub ch: char,
    pub x0: f32,
    pub x1: f32,
    pub y: f32,
    pub size: f32,
}

struct FontInfo<'a> {
    encoding: Option<Encoding<'a>>,
    first_char: i64,
    widths: Vec<f32>,
    default_width: f32,
}

impl<'a> FontInfo<'a> {
    fn load(doc: &'a Document, font: &'a Dictionary) -> Self {
        let encoding = match font.get_font_encoding(doc) {
            Ok(enc) => Some(enc),
            Err(e) => {
                tracing::debug!(error = %e, "font encoding unavailable, decoding as Latin-1");
                None
            }
        };
        let first_char = font
            .get(b"FirstChar")
            .and_then(Object::as_i64)
            .unwrap_or(0);
        let widths = font
            .get_deref(b"Widths", doc)
            .and_then(Object::as_array)
            .map(|arr| {
                arr.iter()
                    .map(|w| w.as_float().unwrap_or(0.0) / 1000.0)
                    .collect()
            })
            .unwrap_or_default();
        let fixed_pitch = font
            .get(b"BaseFont")
            .and_then(Object::as_name_str)
            .is_ok_and(|name| name.contains("Courier") || name.contains("Mono"));

        Self {
            encoding,
            first_char,
            widths,
            default_width: if fixed_pitch {
                FIXED_PITCH_WIDTH
            } else {
                PROPORTIONAL_WIDTH
            },
        }
    }

    fn one_byte(&self) -> bool {
        matches!(self.encoding, None | Some(Encoding::OneByteEncoding(_)))
    }

    fn width_of_code(&self, code: u8) -> f32 {
        let idx = i64::from(code) - self.first_char;
        usize::try_from(idx)
            .ok()
            .and_then(|i| self.widths.get(i))
            .copied()
            .filter(|w| *w > 0.0)
            .unwrap_or(self.default_width)
    }

    /// Decoded characters with their advance widths (text space, unit size)
    /// and whether the code is the single-byte space that word spacing applies to.
    fn decode(&self, bytes: &[u8]) -> Vec<(char, f32, bool)> {
        if self.one_byte() {
            return bytes
                .iter()
                .flat_map(|&b| {
                    let text = match &self.encoding {
                        Some(enc) => Document::decode_text(enc, &[b]).unwrap_or_default(),
                        None => latin1(b),
                    };
                    let w = self.width_of_code(b);
                    let mut chars: Vec<(char, f32, bool)> = Vec::new();
                    for (i, ch) in text.chars().enumerate() {
                        chars.push((ch, if i == 0 { w } else { 0.0 }, b == b' '));
                    }
                    chars
                })
                .collect();
        }

        let text = match &self.encoding {
            Some(enc) => Document::decode_text(enc, bytes).unwrap_or_default(),
            None => String::new(),
        };
        text.chars().map(|ch| (ch, self.default_width, false)).collect()
    }
}

fn latin1(b: u8) -> String {
    if b.is_ascii_graphic() || b == b' ' {
        (b as char).to_string()
    } else {
        String::new()
    }
}

struct TextState {
    ctm: Matrix,
    ctm_stack: Vec<Matrix>,
    tm: Matrix,
    tlm: Matrix,
    font: Option<Vec<u8>>,
    size: f32,
    leading: f32,
    char_spacing: f32,
    word_spacing: f32,
    h_scale: f32,
    rise: f32,
}

impl TextState {
    fn new() -> Self {
        Self {
            ctm: IDENTITY,
            ctm_stack: Vec::new(),
            tm: IDENTITY,
            tlm: IDENTITY,
            font: None,
            size: 0.0,
            leading: 0.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            h_scale: 1.0,
            rise: 0.0,
        }
    }

    fn move_line(&mut self, tx: f32, ty: f32) {
        self.tlm = multiply(&translate(tx, ty), &self.tlm);
        self.tm = self.tlm;
    }

    fn next_line(&mut self) {
        let leading = self.leading;
        self.move_line(0.0, -leading);
    }

    fn show(&mut self, bytes: &[u8], fonts: &BTreeMap<Vec<u8>, FontInfo<'_>>, out: &mut Vec<Glyph>) {
        let Some(font) = self.font.as_ref().and_then(|name| fonts.get(name)) else {
            return;
        };
        for (ch, w0, is_space) in font.decode(bytes) {
            let render = [
                self.size * self.h_scale,
                0.0,
                0.0,
                self.size,
                0.0,
                self.rise,
            ];
            let start = multiply(&multiply(&render, &self.tm), &self.ctm);
            let (x0, y) = origin(&start);
            let device_size = (start[3].powi(2) + start[2].powi(2)).sqrt();

            let mut tx = w0 * self.size + self.char_spacing;
            if is_space {
                tx += self.word_spacing;
            }
            self.tm = multiply(&translate(tx * self.h_scale, 0.0), &self.tm);
            let end = multiply(&multiply(&render, &self.tm), &self.ctm);
            let (x1, _) = origin(&end);

            if !ch.is_control() {
                out.push(Glyph {
                    ch,
                    x0: x0.min(x1),
                    x1: x0.max(x1),
                    y,
                    size: device_size,
                });
            }
        }
    }

    /// `TJ` numbers move the pen left by thousandths of the font size.
    fn adjust(&mut self, thousandths: f32) {
        let tx = -thousandths / 1000.0 * self.size * self.h_scale;
        self.tm = multiply(&translate(tx, 0.0), &self.tm);
    }
}

fn number(ops: &[Object], i: usize) -> f32 {
    ops.get(i).and_then(|o| o.as_float().ok()).unwrap_or(0.0)
}

fn matrix(ops: &[Object]) -> Option<Matrix> {
    if ops.len() < 6 {
        return None;
    }
    Some([
        number(ops, 0),
        number(ops, 1),
        number(ops, 2),
        number(ops, 3),
        number(ops, 4),
        number(ops, 5),
    ])
}

/// Every glyph on the page, in content-stream order.
pub fn page_glyphs(doc: &Document, page_id: ObjectId) -> lopdf::Result<Vec<Glyph>> {
    let fonts: BTreeMap<Vec<u8>, FontInfo<'_>> = doc
        .get_page_fonts(page_id)?
        .into_iter()
        .map(|(name, font)| (name, FontInfo::load(doc, font)))
        .collect();
    let content = doc.get_and_decode_page_content(page_id)?;

    let mut state = TextState::new();
    let mut glyphs = Vec::new();
    for op in &content.operations {
        apply(&mut state, op, &fonts, &mut glyphs);
    }
    Ok(glyphs)
}

fn apply(
    state: &mut TextState,
    op: &Operation,
    fonts: &BTreeMap<Vec<u8>, FontInfo<'_>>,
    glyphs: &mut Vec<Glyph>,
) {
    let ops = &op.operands;
    match op.operator.as_str() {
        "q" => state.ctm_stack.push(state.ctm),
        "Q" => {
            if let Some(m) = state.ctm_stack.pop() {
                state.ctm = m;
            }
        }
        "cm" => {
            if let Some(m) = matrix(ops) {
                state.ctm = multiply(&m, &state.ctm);
            }
        }
        "BT" => {
            state.tm = IDENTITY;
            state.tlm = IDENTITY;
        }
        "Tf" => {
            state.font = ops.first().and_then(|o| o.as_name().ok()).map(<[u8]>::to_vec);
            state.size = number(ops, 1);
        }
        "TL" => state.leading = number(ops, 0),
        "Tc" => state.char_spacing = number(ops, 0),
        "Tw" => state.word_spacing = number(ops, 0),
        "Tz" => state.h_scale = number(ops, 0) / 100.0,
        "Ts" => state.rise = number(ops, 0),
        "Td" => state.move_line(number(ops, 0), number(ops, 1)),
        "TD" => {
            state.leading = -number(ops, 1);
            state.move_line(number(ops, 0), number(ops, 1));
        }
        "Tm" => {
            if let Some(m) = matrix(ops) {
                state.tm = m;
                state.tlm = m;
            }
        }
        "T*" => state.next_line(),
        "Tj" => {
            if let Some(Object::String(bytes, _)) = ops.first() {
                state.show(bytes, fonts, glyphs);
            }
        }
        "'" => {
            state.next_line();
            if let Some(Object::String(bytes, _)) = ops.first() {
                state.show(bytes, fonts, glyphs);
            }
        }
        "\"" => {
            state.word_spacing = number(ops, 0);
            state.char_spacing = number(ops, 1);
            state.next_line();
            if let Some(Object::String(bytes, _)) = ops.get(2) {
                state.show(bytes, fonts, glyphs);
            }
        }
        "TJ" => {
            if let Some(Object::Array(items)) = ops.first() {
                for item in items {
                    match item {
                        Object::String(bytes, _) => state.show(bytes, fonts, glyphs),
                        other => {
                            if let Ok(n) = other.as_float() {
                                state.adjust(n);
                            }
                        }
                    }
                }
            }
        }
        _ => {}
    }
}

/// Render glyphs as text lines, top of the page first.
///
/// Glyphs sharing a baseline form one line. Each glyph lands at the column its
/// x position maps to, so cells under the same header start at the same
/// offset; wide gaps always leave at least two spaces.
pub fn render_lines(glyphs: &[Glyph]) -> String {
    let visible: Vec<&Glyph> = glyphs.iter().filter(|g| !g.ch.is_whitespace()).collect();
    if visible.is_empty() {
        return String::new();
    }

    let unit = median(visible.iter().map(|g| g.x1 - g.x0).filter(|w| *w > 0.0)).unwrap_or(5.0);
    let left = visible.iter().map(|g| g.x0).fold(f32::INFINITY, f32::min);

    let mut sorted: Vec<&Glyph> = visible;
    sorted.sort_by(|a, b| b.y.total_cmp(&a.y).then(a.x0.total_cmp(&b.x0)));

    let mut lines: Vec<(f32, f32, Vec<&Glyph>)> = Vec::new();
    for g in sorted {
        let tolerance = (g.size * 0.3).max(1.0);
        match lines.last_mut() {
            Some((y, _, members)) if (*y - g.y).abs() <= tolerance => members.push(g),
            _ => lines.push((g.y, g.size, vec![g])),
        }
    }

    let mut out = String::new();
    let mut previous: Option<(f32, f32)> = None;
    for (y, size, mut members) in lines {
        if let Some((prev_y, prev_size)) = previous {
            if prev_y - y > PARAGRAPH_GAP * prev_size.max(size) {
                out.push('\n');
            }
        }
        previous = Some((y, size));

        members.sort_by(|a, b| a.x0.total_cmp(&b.x0));
        out.push_str(&render_line(&members, left, unit));
        out.push('\n');
    }
    out
}

fn render_line(members: &[&Glyph], left: f32, unit: f32) -> String {
    let mut line = String::new();
    let mut col = 0usize;
    let mut prev_x1: Option<f32> = None;

    for g in members {
        let target = ((g.x0 - left) / unit).round().max(0.0) as usize;
        let min_spaces = match prev_x1 {
            None => 0,
            Some(x1) => {
                let gap = g.x0 - x1;
                if gap > CELL_GAP_UNITS * unit {
                    2
                } else if gap > WORD_GAP_UNITS * unit {
                    1
                } else {
                    0
                }
            }
        };
        let pad = target.saturating_sub(col).max(min_spaces);
        line.extend(std::iter::repeat_n(' ', pad));
        line.push(g.ch);
        col += pad + 1;
        prev_x1 = Some(g.x1);
    }
    line
}

fn median(values: impl Iterator<Item = f32>) -> Option<f32> {
    let mut v: Vec<f32> = values.collect();
    if v.is_empty() {
        return None;
    }
    v.sort_by(f32::total_cmp);
    Some(v[v.len() / 2])
}
