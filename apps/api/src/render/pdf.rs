//! Stream Renderer — lays a Composed Document out as absolutely-positioned
//! PDF pages using `lopdf`.
//!
//! # Layout model
//! A single vertical cursor (distance from the top edge, in points) walks down
//! the page. Every block measures its own height with the static Helvetica
//! metrics and advances the cursor by that amount; only the table header row
//! has a fixed height. Content that does not fit below the cursor starts a new
//! page. Page footers are stamped once the page count is known.

use std::io::Write;

use flate2::write::ZlibEncoder;
use flate2::Compression;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream, StringFormat};
use tracing::{debug, warn};

use crate::assets::ImageAsset;
use crate::compose::document::{
    Field, FieldColumn, HeaderBlock, ItemsTableBlock, NotesBlock, SignatureBlock,
};
use crate::compose::labels::Labels;
use crate::compose::theme::{Rgb, Theme};
use crate::compose::{ComposedDocument, ContentBlock};
use crate::render::metrics::{get_metrics, Face};
use crate::render::{
    fit_within, DocumentRenderer, RenderError, ITEM_COLUMN_RATIOS, LOGO_MAX, SIGNATURE_MAX,
};

// ────────────────────────────────────────────────────────────────────────────
// Page geometry (US Letter, points)
// ────────────────────────────────────────────────────────────────────────────

const PAGE_WIDTH: f32 = 612.0;
const PAGE_HEIGHT: f32 = 792.0;
const MARGIN: f32 = 50.0;
const FOOTER_HEIGHT: f32 = 20.0;
const CONTENT_WIDTH: f32 = PAGE_WIDTH - 2.0 * MARGIN;
const CONTENT_BOTTOM: f32 = PAGE_HEIGHT - MARGIN - FOOTER_HEIGHT;
/// Usable height of a fresh page.
const CONTENT_HEIGHT: f32 = CONTENT_BOTTOM - MARGIN;

const BODY_SIZE: f32 = 10.0;
const HEADING_SIZE: f32 = 12.0;
const TOTAL_SIZE: f32 = 13.0;
/// Line height as a multiple of font size.
const LEADING: f32 = 1.35;
const BLOCK_GAP: f32 = 16.0;
const FIELD_GAP: f32 = 3.0;
const HEADING_HEIGHT: f32 = 24.0;
const COLUMN_GAP: f32 = 24.0;
const TABLE_HEADER_HEIGHT: f32 = 22.0;
const CELL_PAD: f32 = 5.0;
const ROW_TINTS: [Rgb; 2] = [Rgb::new(0xF5, 0xF7, 0xFA), Rgb::WHITE];

fn line_height(size: f32) -> f32 {
    size * LEADING
}

fn stream_err<E: std::fmt::Display>(e: E) -> RenderError {
    RenderError::Stream(e.to_string())
}

/// Encodes text for the standard fonts' WinAnsiEncoding. Latin-1 maps
/// directly; a few common typographic characters map to their WinAnsi slots.
fn to_win_ansi(s: &str) -> Vec<u8> {
    s.chars()
        .map(|c| match c {
            '€' => 0x80,
            '…' => 0x85,
            '‘' => 0x91,
            '’' => 0x92,
            '“' => 0x93,
            '”' => 0x94,
            '•' => 0x95,
            '–' => 0x96,
            '—' => 0x97,
            c if (c as u32) < 0x80 || (0xA0..=0xFF).contains(&(c as u32)) => c as u8,
            _ => b'?',
        })
        .collect()
}

fn deflate(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    encoder.finish()
}

// ────────────────────────────────────────────────────────────────────────────
// Page canvas
// ────────────────────────────────────────────────────────────────────────────

/// Owns the `lopdf` document being built, the finished pages' operations and
/// the cursor on the current page.
struct PageCanvas {
    document: Document,
    finished_pages: Vec<Vec<Operation>>,
    ops: Vec<Operation>,
    cursor: f32,
    images: Vec<(String, ObjectId)>,
}

impl PageCanvas {
    fn new() -> Self {
        Self {
            document: Document::with_version("1.5"),
            finished_pages: Vec::new(),
            ops: Vec::new(),
            cursor: MARGIN,
            images: Vec::new(),
        }
    }

    fn op(&mut self, operator: &str, operands: Vec<Object>) {
        self.ops.push(Operation::new(operator, operands));
    }

    fn new_page(&mut self) {
        self.finished_pages.push(std::mem::take(&mut self.ops));
        self.cursor = MARGIN;
    }

    /// Starts a new page when `height` does not fit below the cursor.
    /// Returns true if a page break happened. A fresh page never breaks again,
    /// so oversized content overflows instead of looping.
    fn ensure_space(&mut self, height: f32) -> bool {
        if self.cursor + height > CONTENT_BOTTOM && self.cursor > MARGIN {
            self.new_page();
            true
        } else {
            false
        }
    }

    fn advance(&mut self, dy: f32) {
        self.cursor += dy;
    }

    fn set_fill(&mut self, color: Rgb) {
        let [r, g, b] = color.unit();
        self.op("rg", vec![r.into(), g.into(), b.into()]);
    }

    /// Draws one line of text whose line box starts at `top`.
    fn text(&mut self, x: f32, top: f32, face: Face, size: f32, color: Rgb, s: &str) {
        if s.is_empty() {
            return;
        }
        let baseline = PAGE_HEIGHT - (top + size);
        self.op("BT", vec![]);
        self.op(
            "Tf",
            vec![
                Object::Name(face.resource_name().as_bytes().to_vec()),
                size.into(),
            ],
        );
        self.set_fill(color);
        self.op("Td", vec![x.into(), baseline.into()]);
        self.op(
            "Tj",
            vec![Object::String(to_win_ansi(s), StringFormat::Literal)],
        );
        self.op("ET", vec![]);
    }

    /// Draws text so that it ends at `right`.
    fn text_right(&mut self, right: f32, top: f32, face: Face, size: f32, color: Rgb, s: &str) {
        let width = get_metrics(face).measure(s, size);
        self.text(right - width, top, face, size, color, s);
    }

    fn fill_rect(&mut self, x: f32, top: f32, width: f32, height: f32, color: Rgb) {
        self.set_fill(color);
        self.op(
            "re",
            vec![
                x.into(),
                (PAGE_HEIGHT - top - height).into(),
                width.into(),
                height.into(),
            ],
        );
        self.op("f", vec![]);
    }

    fn hline(&mut self, x1: f32, x2: f32, y: f32, color: Rgb, width: f32) {
        let [r, g, b] = color.unit();
        let pdf_y = PAGE_HEIGHT - y;
        self.op("w", vec![width.into()]);
        self.op("RG", vec![r.into(), g.into(), b.into()]);
        self.op("m", vec![x1.into(), pdf_y.into()]);
        self.op("l", vec![x2.into(), pdf_y.into()]);
        self.op("S", vec![]);
    }

    /// Embeds an image as an RGB XObject, flattening alpha onto white.
    /// Returns the resource name, or `None` if the bytes do not decode.
    fn register_image(&mut self, asset: &ImageAsset) -> Option<String> {
        if asset.width == 0 || asset.height == 0 {
            warn!("Image has no pixels, skipping");
            return None;
        }
        let decoded = match asset.decode() {
            Ok(img) => img.to_rgba8(),
            Err(e) => {
                warn!("Image could not be decoded for PDF embedding, skipping: {e}");
                return None;
            }
        };
        let (width, height) = decoded.dimensions();

        let mut rgb = Vec::with_capacity(width as usize * height as usize * 3);
        for pixel in decoded.pixels() {
            let [r, g, b, a] = pixel.0;
            let alpha = u16::from(a);
            let blend = |c: u8| ((u16::from(c) * alpha + 255 * (255 - alpha)) / 255) as u8;
            rgb.extend_from_slice(&[blend(r), blend(g), blend(b)]);
        }

        let compressed = match deflate(&rgb) {
            Ok(data) => data,
            Err(e) => {
                warn!("Image could not be compressed, skipping: {e}");
                return None;
            }
        };

        let stream = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width as i64,
                "Height" => height as i64,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
                "Filter" => "FlateDecode",
            },
            compressed,
        );
        let id = self.document.add_object(stream);
        let name = format!("Im{}", self.images.len() + 1);
        self.images.push((name.clone(), id));
        Some(name)
    }

    fn draw_image(&mut self, name: &str, x: f32, top: f32, width: f32, height: f32) {
        let bottom = PAGE_HEIGHT - top - height;
        self.op("q", vec![]);
        self.op(
            "cm",
            vec![
                width.into(),
                0.0_f32.into(),
                0.0_f32.into(),
                height.into(),
                x.into(),
                bottom.into(),
            ],
        );
        self.op("Do", vec![Object::Name(name.as_bytes().to_vec())]);
        self.op("Q", vec![]);
    }

    /// Stamps the footers and serializes the document.
    fn finish(mut self, labels: &Labels, theme: &Theme, title: &str) -> Result<Vec<u8>, RenderError> {
        if !self.ops.is_empty() || self.finished_pages.is_empty() {
            self.finished_pages.push(std::mem::take(&mut self.ops));
        }
        let mut pages = std::mem::take(&mut self.finished_pages);
        let page_count = pages.len();

        for (index, page_ops) in pages.iter_mut().enumerate() {
            let footer = format!("{} {} {} {}", labels.page, index + 1, labels.of, page_count);
            let width = get_metrics(Face::Regular).measure(&footer, 8.0);
            self.ops = std::mem::take(page_ops);
            self.text(
                (PAGE_WIDTH - width) / 2.0,
                PAGE_HEIGHT - MARGIN + 8.0,
                Face::Regular,
                8.0,
                theme.secondary,
                &footer,
            );
            *page_ops = std::mem::take(&mut self.ops);
        }

        let mut document = self.document;
        let pages_id = document.new_object_id();

        let mut fonts = Dictionary::new();
        for face in [Face::Regular, Face::Bold] {
            let font_id = document.add_object(dictionary! {
                "Type" => "Font",
                "Subtype" => "Type1",
                "BaseFont" => face.base_font(),
                "Encoding" => "WinAnsiEncoding",
            });
            fonts.set(face.resource_name(), font_id);
        }
        let mut xobjects = Dictionary::new();
        for (name, id) in &self.images {
            xobjects.set(name.as_str(), *id);
        }
        let resources_id = document.add_object(dictionary! {
            "Font" => fonts,
            "XObject" => xobjects,
        });

        let mut page_ids = Vec::with_capacity(page_count);
        for operations in pages {
            let encoded = Content { operations }.encode().map_err(stream_err)?;
            let compressed = deflate(&encoded).map_err(stream_err)?;
            let content_id = document.add_object(Stream::new(
                dictionary! { "Filter" => "FlateDecode" },
                compressed,
            ));
            let page_id = document.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![0.into(), 0.into(), PAGE_WIDTH.into(), PAGE_HEIGHT.into()],
                "Contents" => content_id,
                "Resources" => resources_id,
            });
            page_ids.push(page_id);
        }

        let kids: Vec<Object> = page_ids.iter().map(|id| Object::from(*id)).collect();
        document.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => page_count as i64,
            }),
        );
        let catalog_id = document.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        let info_id = document.add_object(dictionary! {
            "Title" => Object::String(to_win_ansi(title), StringFormat::Literal),
            "Producer" => Object::string_literal("estimate-api"),
        });
        document.trailer.set("Root", catalog_id);
        document.trailer.set("Info", info_id);

        let mut out = Vec::new();
        document.save_to(&mut out).map_err(stream_err)?;
        debug!(pages = page_count, bytes = out.len(), "PDF serialized");
        Ok(out)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Field layout (shared by single- and two-column blocks)
// ────────────────────────────────────────────────────────────────────────────

struct FieldLayout {
    label: String,
    value_x: f32,
    value_top: f32,
    value_lines: Vec<String>,
    height: f32,
}

/// Label in bold, value wrapped beside it with a hanging indent. Labels wider
/// than 40% of the column push the value onto its own lines.
fn layout_field(field: &Field, width: f32) -> FieldLayout {
    let lh = line_height(BODY_SIZE);
    let label = format!("{}:", field.label);
    let label_w = get_metrics(Face::Bold).measure(&label, BODY_SIZE) + 4.0;

    let (value_x, value_top) = if label_w > width * 0.4 {
        (0.0, lh)
    } else {
        (label_w, 0.0)
    };
    let mut value_lines = get_metrics(Face::Regular).wrap(&field.value, BODY_SIZE, width - value_x);
    if value_lines.is_empty() {
        value_lines.push(String::new());
    }
    let height = value_top + value_lines.len() as f32 * lh;
    FieldLayout {
        label,
        value_x,
        value_top,
        value_lines,
        height,
    }
}

fn draw_field(canvas: &mut PageCanvas, layout: &FieldLayout, x: f32, top: f32, theme: &Theme) {
    let lh = line_height(BODY_SIZE);
    canvas.text(x, top, Face::Bold, BODY_SIZE, theme.text, &layout.label);
    for (i, line) in layout.value_lines.iter().enumerate() {
        canvas.text(
            x + layout.value_x,
            top + layout.value_top + i as f32 * lh,
            Face::Regular,
            BODY_SIZE,
            theme.text,
            line,
        );
    }
}

fn draw_heading(canvas: &mut PageCanvas, x: f32, top: f32, width: f32, title: &str, theme: &Theme) {
    canvas.text(x, top, Face::Bold, HEADING_SIZE, theme.primary, title);
    canvas.hline(x, x + width, top + HEADING_SIZE + 5.0, theme.border, 0.75);
}

/// Height of a titled column drawn without page breaks.
fn measure_column(column: &FieldColumn, width: f32) -> f32 {
    HEADING_HEIGHT
        + column
            .fields
            .iter()
            .map(|f| layout_field(f, width).height + FIELD_GAP)
            .sum::<f32>()
}

fn draw_column_at(canvas: &mut PageCanvas, column: &FieldColumn, x: f32, top: f32, width: f32, theme: &Theme) {
    draw_heading(canvas, x, top, width, &column.title, theme);
    let mut y = top + HEADING_HEIGHT;
    for field in &column.fields {
        let layout = layout_field(field, width);
        draw_field(canvas, &layout, x, y, theme);
        y += layout.height + FIELD_GAP;
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Block renderers
// ────────────────────────────────────────────────────────────────────────────

fn render_header(canvas: &mut PageCanvas, header: &HeaderBlock, theme: &Theme) {
    let top = canvas.cursor;
    let right_edge = MARGIN + CONTENT_WIDTH;
    let right_width = 200.0;

    let mut logo_w = 0.0;
    let mut logo_h = 0.0;
    if let Some(asset) = &header.logo {
        if let Some(name) = canvas.register_image(asset) {
            let (w, h) = fit_within(asset.width, asset.height, LOGO_MAX.0, LOGO_MAX.1);
            canvas.draw_image(&name, MARGIN, top, w, h);
            logo_w = w + 12.0;
            logo_h = h;
        }
    }

    let left_x = MARGIN + logo_w;
    let left_width = (CONTENT_WIDTH - logo_w - right_width).max(60.0);
    let mut left_y = top;
    if let Some(company) = &header.company_name {
        for line in get_metrics(Face::Bold).wrap(company, 18.0, left_width) {
            canvas.text(left_x, left_y, Face::Bold, 18.0, theme.primary, &line);
            left_y += line_height(18.0);
        }
    }
    if let Some(tagline) = &header.tagline {
        for line in get_metrics(Face::Regular).wrap(tagline, BODY_SIZE, left_width) {
            canvas.text(left_x, left_y, Face::Regular, BODY_SIZE, theme.secondary, &line);
            left_y += line_height(BODY_SIZE);
        }
    }

    let mut right_y = top;
    canvas.text_right(right_edge, right_y, Face::Bold, 20.0, theme.primary, &header.title);
    right_y += line_height(20.0);
    for line in [&header.estimate_number, &header.date].into_iter().flatten() {
        canvas.text_right(right_edge, right_y, Face::Regular, BODY_SIZE, theme.text, line);
        right_y += line_height(BODY_SIZE);
    }

    let height = logo_h.max(left_y - top).max(right_y - top);
    canvas.advance(height + 8.0);
    let rule_y = canvas.cursor;
    canvas.hline(MARGIN, right_edge, rule_y, theme.primary, 1.5);
    canvas.advance(BLOCK_GAP);
}

/// One line-height row of a field: `(x offset, face, text)` runs.
fn field_rows(layout: &FieldLayout) -> Vec<Vec<(f32, Face, &str)>> {
    let mut rows: Vec<Vec<(f32, Face, &str)>> = vec![vec![(0.0, Face::Bold, layout.label.as_str())]];
    if layout.value_top > 0.0 {
        rows.push(Vec::new());
    }
    let first_value_row = rows.len() - 1;
    for (i, line) in layout.value_lines.iter().enumerate() {
        let run = (layout.value_x, Face::Regular, line.as_str());
        match rows.get_mut(first_value_row + i) {
            Some(row) => row.push(run),
            None => rows.push(vec![run]),
        }
    }
    rows
}

/// Draws side-by-side fields one row at a time, breaking pages between rows.
/// Used for fields too tall to keep together on one page.
fn flow_rows(canvas: &mut PageCanvas, columns: &[(f32, &FieldLayout)], theme: &Theme) {
    let lh = line_height(BODY_SIZE);
    let rows: Vec<_> = columns.iter().map(|(x, layout)| (*x, field_rows(layout))).collect();
    let count = rows.iter().map(|(_, r)| r.len()).max().unwrap_or(0);
    for index in 0..count {
        canvas.ensure_space(lh);
        let top = canvas.cursor;
        for (x, column_rows) in &rows {
            for (offset, face, text) in column_rows.get(index).into_iter().flatten() {
                canvas.text(x + offset, top, *face, BODY_SIZE, theme.text, text);
            }
        }
        canvas.advance(lh);
    }
}

fn render_field_section(canvas: &mut PageCanvas, column: &FieldColumn, theme: &Theme) {
    canvas.ensure_space(HEADING_HEIGHT + line_height(BODY_SIZE));
    let top = canvas.cursor;
    draw_heading(canvas, MARGIN, top, CONTENT_WIDTH, &column.title, theme);
    canvas.advance(HEADING_HEIGHT);

    for field in &column.fields {
        let layout = layout_field(field, CONTENT_WIDTH);
        if layout.height > CONTENT_HEIGHT {
            flow_rows(canvas, &[(MARGIN, &layout)], theme);
            canvas.advance(FIELD_GAP);
            continue;
        }
        canvas.ensure_space(layout.height);
        let y = canvas.cursor;
        draw_field(canvas, &layout, MARGIN, y, theme);
        canvas.advance(layout.height + FIELD_GAP);
    }
    canvas.advance(BLOCK_GAP);
}

/// Both columns share one top edge; the cursor then advances past the taller.
/// A block taller than a page is laid out as paired rows instead, so it can
/// break between fields.
fn render_two_column(canvas: &mut PageCanvas, left: &FieldColumn, right: &FieldColumn, theme: &Theme) {
    let column_width = (CONTENT_WIDTH - COLUMN_GAP) / 2.0;
    let right_x = MARGIN + column_width + COLUMN_GAP;
    let height = measure_column(left, column_width).max(measure_column(right, column_width));

    if height <= CONTENT_HEIGHT {
        canvas.ensure_space(height);
        let top = canvas.cursor;
        draw_column_at(canvas, left, MARGIN, top, column_width, theme);
        draw_column_at(canvas, right, right_x, top, column_width, theme);
        canvas.advance(height + BLOCK_GAP);
        return;
    }

    canvas.ensure_space(HEADING_HEIGHT + line_height(BODY_SIZE));
    let top = canvas.cursor;
    draw_heading(canvas, MARGIN, top, column_width, &left.title, theme);
    draw_heading(canvas, right_x, top, column_width, &right.title, theme);
    canvas.advance(HEADING_HEIGHT);

    let pairs = left.fields.len().max(right.fields.len());
    for index in 0..pairs {
        let sides: Vec<(f32, FieldLayout)> = [(MARGIN, left.fields.get(index)), (right_x, right.fields.get(index))]
            .into_iter()
            .filter_map(|(x, field)| field.map(|f| (x, layout_field(f, column_width))))
            .collect();
        let row_height = sides.iter().map(|(_, l)| l.height).fold(0.0, f32::max);

        if row_height > CONTENT_HEIGHT {
            let columns: Vec<(f32, &FieldLayout)> = sides.iter().map(|(x, l)| (*x, l)).collect();
            flow_rows(canvas, &columns, theme);
        } else {
            canvas.ensure_space(row_height);
            let y = canvas.cursor;
            for (x, layout) in &sides {
                draw_field(canvas, layout, *x, y, theme);
            }
            canvas.advance(row_height);
        }
        canvas.advance(FIELD_GAP);
    }
    canvas.advance(BLOCK_GAP);
}

fn column_bounds() -> [(f32, f32); 4] {
    let mut bounds = [(0.0, 0.0); 4];
    let mut x = MARGIN;
    for (slot, ratio) in bounds.iter_mut().zip(ITEM_COLUMN_RATIOS) {
        let width = CONTENT_WIDTH * ratio;
        *slot = (x, width);
        x += width;
    }
    bounds
}

fn draw_table_header(canvas: &mut PageCanvas, columns: &[String; 4], theme: &Theme) {
    let top = canvas.cursor;
    let bounds = column_bounds();
    canvas.fill_rect(MARGIN, top, CONTENT_WIDTH, TABLE_HEADER_HEIGHT, theme.primary);
    let text_top = top + (TABLE_HEADER_HEIGHT - BODY_SIZE) / 2.0 - 1.0;
    canvas.text(bounds[0].0 + CELL_PAD, text_top, Face::Bold, BODY_SIZE, Rgb::WHITE, &columns[0]);
    for (i, (x, width)) in bounds.iter().enumerate().skip(1) {
        canvas.text_right(x + width - CELL_PAD, text_top, Face::Bold, BODY_SIZE, Rgb::WHITE, &columns[i]);
    }
    canvas.advance(TABLE_HEADER_HEIGHT);
}

fn render_items_table(canvas: &mut PageCanvas, table: &ItemsTableBlock, theme: &Theme) {
    let lh = line_height(BODY_SIZE);
    let bounds = column_bounds();
    let regular = get_metrics(Face::Regular);

    canvas.ensure_space(HEADING_HEIGHT + TABLE_HEADER_HEIGHT + lh + 2.0 * CELL_PAD);
    let top = canvas.cursor;
    draw_heading(canvas, MARGIN, top, CONTENT_WIDTH, &table.title, theme);
    canvas.advance(HEADING_HEIGHT);
    draw_table_header(canvas, &table.columns, theme);

    if table.rows.is_empty() {
        let row_h = lh + 2.0 * CELL_PAD;
        let top = canvas.cursor;
        canvas.fill_rect(MARGIN, top, CONTENT_WIDTH, row_h, ROW_TINTS[0]);
        canvas.text(MARGIN + CELL_PAD, top + CELL_PAD, Face::Regular, BODY_SIZE, theme.secondary, &table.empty_label);
        canvas.advance(row_h);
    }

    for (index, row) in table.rows.iter().enumerate() {
        let cells = [&row.description, &row.quantity, &row.unit_price, &row.line_total];
        let wrapped: Vec<Vec<String>> = cells
            .iter()
            .zip(bounds)
            .map(|(text, (_, width))| regular.wrap(text, BODY_SIZE, width - 2.0 * CELL_PAD))
            .collect();
        let lines = wrapped.iter().map(Vec::len).max().unwrap_or(0).max(1);
        let row_h = lines as f32 * lh + 2.0 * CELL_PAD;

        if canvas.ensure_space(row_h) {
            draw_table_header(canvas, &table.columns, theme);
        }
        let top = canvas.cursor;
        canvas.fill_rect(MARGIN, top, CONTENT_WIDTH, row_h, ROW_TINTS[index % 2]);

        for (column, (lines, (x, width))) in wrapped.iter().zip(bounds).enumerate() {
            for (i, line) in lines.iter().enumerate() {
                let line_top = top + CELL_PAD + i as f32 * lh;
                if column == 0 {
                    canvas.text(x + CELL_PAD, line_top, Face::Regular, BODY_SIZE, theme.text, line);
                } else {
                    canvas.text_right(x + width - CELL_PAD, line_top, Face::Regular, BODY_SIZE, theme.text, line);
                }
            }
        }
        canvas.hline(MARGIN, MARGIN + CONTENT_WIDTH, top + row_h, theme.border, 0.5);
        canvas.advance(row_h);
    }

    // Totals sit directly under the table.
    canvas.advance(8.0);
    let right_edge = MARGIN + CONTENT_WIDTH - CELL_PAD;
    let label_x = MARGIN + CONTENT_WIDTH * 0.55;
    for line in &table.totals {
        if line.is_emphasized() {
            let lh_total = line_height(TOTAL_SIZE);
            canvas.ensure_space(lh_total + 6.0);
            let rule_y = canvas.cursor;
            canvas.hline(label_x, right_edge, rule_y, theme.border, 0.75);
            canvas.advance(6.0);

            let bold = get_metrics(Face::Bold);
            let label_w = bold.measure(&line.label, TOTAL_SIZE);
            let value_w = bold.measure(&line.amount, TOTAL_SIZE);
            // Right-aligned, but never closer to the label than 12pt.
            let value_x = (label_x + label_w + 12.0).max(right_edge - value_w);
            let top = canvas.cursor;
            canvas.text(label_x, top, Face::Bold, TOTAL_SIZE, theme.primary, &line.label);
            canvas.text(value_x, top, Face::Bold, TOTAL_SIZE, theme.primary, &line.amount);
            canvas.advance(lh_total);
        } else {
            canvas.ensure_space(lh);
            let top = canvas.cursor;
            canvas.text(label_x, top, Face::Regular, BODY_SIZE, theme.text, &line.label);
            canvas.text_right(right_edge, top, Face::Regular, BODY_SIZE, theme.text, &line.amount);
            canvas.advance(lh);
        }
    }
    canvas.advance(BLOCK_GAP);
}

fn render_notes(canvas: &mut PageCanvas, notes: &NotesBlock, theme: &Theme) {
    let lh = line_height(BODY_SIZE);
    canvas.ensure_space(HEADING_HEIGHT + lh);
    let top = canvas.cursor;
    draw_heading(canvas, MARGIN, top, CONTENT_WIDTH, &notes.title, theme);
    canvas.advance(HEADING_HEIGHT);

    let regular = get_metrics(Face::Regular);
    for paragraph in &notes.paragraphs {
        for line in regular.wrap(paragraph, BODY_SIZE, CONTENT_WIDTH) {
            canvas.ensure_space(lh);
            let y = canvas.cursor;
            canvas.text(MARGIN, y, Face::Regular, BODY_SIZE, theme.text, &line);
            canvas.advance(lh);
        }
        canvas.advance(4.0);
    }
    canvas.advance(BLOCK_GAP);
}

fn render_signature(canvas: &mut PageCanvas, signature: &SignatureBlock, theme: &Theme) {
    let lh = line_height(BODY_SIZE);
    let text_lines = [&signature.name, &signature.signer_title, &signature.date]
        .into_iter()
        .flatten()
        .count() as f32;

    // Register first so a decode failure leaves the layout as if no image existed.
    let placed = signature.image.as_ref().and_then(|asset| {
        canvas.register_image(asset).map(|name| {
            let (w, h) = fit_within(asset.width, asset.height, SIGNATURE_MAX.0, SIGNATURE_MAX.1);
            (name, w, h)
        })
    });
    let image_h = placed.as_ref().map(|(_, _, h)| *h + 4.0).unwrap_or(24.0);

    canvas.ensure_space(HEADING_HEIGHT + image_h + 6.0 + text_lines * lh);
    let top = canvas.cursor;
    draw_heading(canvas, MARGIN, top, CONTENT_WIDTH, &signature.title, theme);
    canvas.advance(HEADING_HEIGHT);

    if let Some((name, w, h)) = &placed {
        let y = canvas.cursor;
        canvas.draw_image(name, MARGIN, y, *w, *h);
    }
    canvas.advance(image_h);
    let line_y = canvas.cursor;
    canvas.hline(MARGIN, MARGIN + SIGNATURE_MAX.0 + 40.0, line_y, theme.text, 0.75);
    canvas.advance(6.0);

    if let Some(name) = &signature.name {
        let y = canvas.cursor;
        canvas.text(MARGIN, y, Face::Bold, BODY_SIZE, theme.text, name);
        canvas.advance(lh);
    }
    for line in [&signature.signer_title, &signature.date].into_iter().flatten() {
        let y = canvas.cursor;
        canvas.text(MARGIN, y, Face::Regular, BODY_SIZE, theme.text, line);
        canvas.advance(lh);
    }
    canvas.advance(BLOCK_GAP);
}

// ────────────────────────────────────────────────────────────────────────────
// Renderer
// ────────────────────────────────────────────────────────────────────────────

/// Fixed page-size PDF renderer.
#[derive(Debug, Clone, Copy, Default)]
pub struct StreamRenderer;

impl DocumentRenderer for StreamRenderer {
    fn render(&self, doc: &ComposedDocument) -> Result<Vec<u8>, RenderError> {
        let theme = &doc.theme;
        let mut canvas = PageCanvas::new();

        for block in &doc.blocks {
            match block {
                ContentBlock::Header(header) => render_header(&mut canvas, header, theme),
                ContentBlock::JobSummary(column)
                | ContentBlock::ProjectInfo(column)
                | ContentBlock::PaymentOnly(column)
                | ContentBlock::ContactOnly(column) => {
                    render_field_section(&mut canvas, column, theme)
                }
                ContentBlock::ItemsTable(table) => render_items_table(&mut canvas, table, theme),
                ContentBlock::TwoColumn { left, right } => {
                    render_two_column(&mut canvas, left, right, theme)
                }
                ContentBlock::Notes(notes) => render_notes(&mut canvas, notes, theme),
                ContentBlock::Signature(signature) => {
                    render_signature(&mut canvas, signature, theme)
                }
            }
        }

        let title = format!("{} {}", doc.labels.document_title, doc.estimate_id);
        canvas.finish(doc.labels, theme, title.trim())
    }
}

/// Decodes every `Tj` string, grouped per page, in drawing order.
#[cfg(test)]
pub(crate) fn extract_pages(bytes: &[u8]) -> Vec<Vec<String>> {
    let document = Document::load_mem(bytes).expect("valid pdf");
    let mut pages = Vec::new();
    for (_, page_id) in document.get_pages() {
        let data = document.get_page_content(page_id).expect("page content");
        let content = Content::decode(&data).expect("decodable content");
        let strings = content
            .operations
            .iter()
            .filter(|op| op.operator == "Tj")
            .filter_map(|op| match op.operands.first() {
                Some(Object::String(raw, _)) => Some(raw.iter().map(|&b| b as char).collect()),
                _ => None,
            })
            .collect();
        pages.push(strings);
    }
    pages
}

#[cfg(test)]
pub(crate) fn extract_text(bytes: &[u8]) -> Vec<String> {
    extract_pages(bytes).concat()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::raster::fixtures::png_bytes;
    use crate::compose::document::{build, ResolvedAssets};
    use crate::compose::Lang;
    use crate::models::template::{ContactInfoConfig, HeaderConfig, PaymentMethodConfig};
    use crate::models::{EstimateRecord, LineItem, SectionDescriptor, SectionId, TemplateConfig};

    fn sample_estimate(items: usize) -> EstimateRecord {
        EstimateRecord {
            id: "est-9".to_string(),
            line_items: (0..items)
                .map(|i| LineItem {
                    description: Some(format!("Line item number {i} with a fairly long description")),
                    quantity: 2.0,
                    unit: Some("ea".to_string()),
                    unit_cost: 10.0,
                    subtotal: 20.0,
                    tax: 0.0,
                })
                .collect(),
            labor_cost: 40.0,
            ..Default::default()
        }
    }

    fn render_doc(estimate: &EstimateRecord, config: &TemplateConfig, assets: ResolvedAssets) -> Vec<u8> {
        let doc = build(estimate, config, assets, Lang::En);
        StreamRenderer.render(&doc).unwrap()
    }

    fn page_count(bytes: &[u8]) -> usize {
        Document::load_mem(bytes).unwrap().get_pages().len()
    }

    #[test]
    fn test_win_ansi_encoding() {
        assert_eq!(to_win_ansi("Año"), vec![b'A', 0xF1, b'o']);
        assert_eq!(to_win_ansi("a–b"), vec![b'a', 0x96, b'b']);
        assert_eq!(to_win_ansi("✓"), vec![b'?']);
    }

    #[test]
    fn test_render_produces_loadable_pdf() {
        let bytes = render_doc(&sample_estimate(3), &TemplateConfig::default(), ResolvedAssets::default());
        assert!(bytes.starts_with(b"%PDF-1.5"));
        assert_eq!(page_count(&bytes), 1);

        let text = extract_text(&bytes);
        assert!(text.iter().any(|t| t == "ESTIMATE"));
        assert!(text.iter().any(|t| t == "Labor Cost"));
        assert!(text.iter().any(|t| t == "$100.00"));
        assert!(text.iter().any(|t| t == "Page 1 of 1"));
    }

    #[test]
    fn test_totals_follow_table_in_order() {
        let bytes = render_doc(&sample_estimate(2), &TemplateConfig::default(), ResolvedAssets::default());
        let text = extract_text(&bytes);
        let position = |needle: &str| text.iter().rposition(|t| t == needle).unwrap();

        let last_row = text.iter().rposition(|t| t.starts_with("Line item number 1")).unwrap();
        assert!(last_row < position("Subtotal"));
        assert!(position("Subtotal") < position("Labor Cost"));
        assert!(position("Labor Cost") < position("$80.00"));
        assert!(!text.iter().any(|t| t == "Tax"));
    }

    #[test]
    fn test_long_tables_overflow_onto_new_pages_with_repeated_header() {
        let config = TemplateConfig {
            sections: vec![SectionDescriptor::new(SectionId::ItemsTable, true, 1)],
            ..Default::default()
        };
        let bytes = render_doc(&sample_estimate(80), &config, ResolvedAssets::default());
        let pages = extract_pages(&bytes);
        assert!(pages.len() > 1, "expected overflow, got {} page(s)", pages.len());

        // Every page carrying item rows opens with the column header row.
        for page in &pages {
            if let Some(first_row) = page.iter().position(|t| t.starts_with("Line item number")) {
                let header = page.iter().position(|t| t == "Unit Price");
                assert!(matches!(header, Some(h) if h < first_row));
            }
        }
        let last = pages.len();
        assert!(pages[last - 1].iter().any(|t| *t == format!("Page {last} of {last}")));
    }

    #[test]
    fn test_empty_table_prints_placeholder_row() {
        let bytes = render_doc(&EstimateRecord::default(), &TemplateConfig::default(), ResolvedAssets::default());
        let text = extract_text(&bytes);
        assert!(text.iter().any(|t| t == "No line items"));
        assert!(text.iter().any(|t| t == "$0.00"));
    }

    #[test]
    fn test_logo_is_embedded_as_xobject() {
        let config = TemplateConfig {
            header: HeaderConfig {
                company_name: Some("Acme".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        let assets = ResolvedAssets {
            logo: ImageAsset::from_bytes(png_bytes(40, 20)),
            signature: None,
        };
        let bytes = render_doc(&sample_estimate(1), &config, assets);
        let document = Document::load_mem(&bytes).unwrap();
        let has_image = document.objects.values().any(|object| {
            object
                .as_stream()
                .ok()
                .and_then(|s| s.dict.get(b"Subtype").ok())
                .and_then(|o| o.as_name().ok())
                == Some(&b"Image"[..])
        });
        assert!(has_image);
    }

    #[test]
    fn test_undecodable_logo_is_skipped() {
        let broken = ImageAsset {
            bytes: b"garbage".to_vec(),
            format: crate::assets::AssetFormat::Png,
            width: 10,
            height: 10,
        };
        let assets = ResolvedAssets {
            logo: Some(broken),
            signature: None,
        };
        let bytes = render_doc(&sample_estimate(1), &TemplateConfig::default(), assets);
        assert_eq!(page_count(&bytes), 1);
    }

    #[test]
    fn test_two_column_headings_share_a_row() {
        let config = TemplateConfig {
            sections: vec![
                SectionDescriptor::new(SectionId::PaymentMethod, true, 1),
                SectionDescriptor::new(SectionId::ContactInfo, true, 2),
            ],
            payment_method: PaymentMethodConfig {
                bank_name: Some("First National".to_string()),
                ..Default::default()
            },
            contact_info: ContactInfoConfig {
                email: Some("office@acme.test".to_string()),
                phone: Some("555-0100".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        let doc = build(&EstimateRecord::default(), &config, ResolvedAssets::default(), Lang::En);
        let bytes = StreamRenderer.render(&doc).unwrap();

        let document = Document::load_mem(&bytes).unwrap();
        let (_, page_id) = document.get_pages().into_iter().next().unwrap();
        let content = Content::decode(&document.get_page_content(page_id).unwrap()).unwrap();

        // The Td preceding each heading's Tj gives its baseline.
        let baseline_of = |needle: &str| {
            let mut last_y = None;
            for op in &content.operations {
                if op.operator == "Td" {
                    last_y = op.operands.get(1).and_then(|o| o.as_float().ok());
                }
                if op.operator == "Tj" {
                    if let Some(Object::String(raw, _)) = op.operands.first() {
                        if raw == needle.as_bytes() {
                            return last_y;
                        }
                    }
                }
            }
            None
        };
        let payment_y = baseline_of("Payment Method").unwrap();
        let contact_y = baseline_of("Contact Information").unwrap();
        assert!((payment_y - contact_y).abs() < 1e-3);
    }

    /// `(baseline, text)` for every string drawn, per page.
    fn positioned_text(bytes: &[u8]) -> Vec<Vec<(f32, String)>> {
        let document = Document::load_mem(bytes).unwrap();
        document
            .get_pages()
            .into_values()
            .map(|page_id| {
                let content = Content::decode(&document.get_page_content(page_id).unwrap()).unwrap();
                let mut y = 0.0;
                let mut drawn = Vec::new();
                for op in &content.operations {
                    match op.operator.as_str() {
                        "Td" => y = op.operands[1].as_float().unwrap(),
                        "Tj" => {
                            if let Some(Object::String(raw, _)) = op.operands.first() {
                                drawn.push((y, String::from_utf8_lossy(raw).into_owned()));
                            }
                        }
                        _ => {}
                    }
                }
                drawn
            })
            .collect()
    }

    fn assert_body_text_above_footer(bytes: &[u8]) {
        let lowest = PAGE_HEIGHT - CONTENT_BOTTOM - 1e-3;
        for page in positioned_text(bytes) {
            for (y, text) in page.iter().filter(|(_, t)| !t.starts_with("Page ")) {
                assert!(*y >= lowest, "{text:?} drawn at {y}, below the content area");
            }
        }
    }

    fn long_instructions() -> String {
        "Wire the deposit before work begins. ".repeat(700)
    }

    #[test]
    fn test_tall_two_column_block_breaks_across_pages() {
        let config = TemplateConfig {
            sections: vec![
                SectionDescriptor::new(SectionId::PaymentMethod, true, 1),
                SectionDescriptor::new(SectionId::ContactInfo, true, 2),
            ],
            payment_method: PaymentMethodConfig {
                bank_name: Some("First National".to_string()),
                instructions: Some(long_instructions()),
                ..Default::default()
            },
            contact_info: ContactInfoConfig {
                email: Some("office@acme.test".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        let bytes = render_doc(&EstimateRecord::default(), &config, ResolvedAssets::default());

        assert!(page_count(&bytes) > 1);
        assert_body_text_above_footer(&bytes);
        let first_page = &positioned_text(&bytes)[0];
        let heading_y = |title: &str| first_page.iter().find(|(_, t)| t == title).map(|(y, _)| *y);
        assert_eq!(heading_y("Payment Method"), heading_y("Contact Information"));
    }

    #[test]
    fn test_field_taller_than_page_continues_on_next_page() {
        let config = TemplateConfig {
            sections: vec![SectionDescriptor::new(SectionId::PaymentMethod, true, 1)],
            payment_method: PaymentMethodConfig {
                instructions: Some(long_instructions()),
                ..Default::default()
            },
            ..Default::default()
        };
        let bytes = render_doc(&EstimateRecord::default(), &config, ResolvedAssets::default());

        assert!(page_count(&bytes) > 1);
        assert_body_text_above_footer(&bytes);
    }
}
