//! Package Renderer — writes a Composed Document as a flow-layout DOCX
//! package (`zip` container, XML parts written with `quick-xml`).
//!
//! Word does the line breaking and pagination here, so this renderer only
//! emits structure: paragraphs, tables with fixed grids, and inline images.

use std::io::{Cursor, Write};

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use tracing::{debug, warn};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::assets::{AssetFormat, ImageAsset};
use crate::compose::document::{
    Field, FieldColumn, HeaderBlock, ItemsTableBlock, NotesBlock, SignatureBlock,
};
use crate::compose::theme::{Rgb, Theme};
use crate::compose::{ComposedDocument, ContentBlock};
use crate::render::{
    fit_within, DocumentRenderer, RenderError, ITEM_COLUMN_RATIOS, LOGO_MAX, SIGNATURE_MAX,
};

// Page geometry in twentieths of a point (US Letter, 50pt margins).
const PAGE_TWIPS: (u32, u32) = (12240, 15840);
const MARGIN_TWIPS: u32 = 1000;
const CONTENT_TWIPS: u32 = PAGE_TWIPS.0 - 2 * MARGIN_TWIPS;
const EMU_PER_PT: f32 = 12700.0;

// Run sizes in half-points.
const BODY_SIZE: u32 = 20;
const HEADING_SIZE: u32 = 24;
const TOTAL_SIZE: u32 = 26;

const ROW_TINTS: [Rgb; 2] = [Rgb::new(0xF5, 0xF7, 0xFA), Rgb::WHITE];
const HEADING_STYLE: &str = "SectionHeading";
const FIRST_MEDIA_REL: usize = 10;

const NS_W: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";
const NS_R: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const NS_WP: &str = "http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing";
const NS_A: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";
const NS_PIC: &str = "http://schemas.openxmlformats.org/drawingml/2006/picture";
const NS_PKG_RELS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";
const REL_OFFICE_DOCUMENT: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument";
const REL_CORE_PROPS: &str =
    "http://schemas.openxmlformats.org/package/2006/relationships/metadata/core-properties";
const REL_STYLES: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles";
const REL_FOOTER: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/footer";
const REL_IMAGE: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/image";

type XmlResult = Result<(), RenderError>;

fn package_err<E: std::fmt::Display>(e: E) -> RenderError {
    RenderError::Package(e.to_string())
}

// ────────────────────────────────────────────────────────────────────────────
// XML writer
// ────────────────────────────────────────────────────────────────────────────

struct Xml {
    writer: Writer<Vec<u8>>,
}

impl Xml {
    fn new() -> Result<Self, RenderError> {
        let mut writer = Writer::new(Vec::new());
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))
            .map_err(package_err)?;
        Ok(Self { writer })
    }

    fn open(&mut self, name: &str, attrs: &[(&str, &str)]) -> XmlResult {
        let start = BytesStart::new(name).with_attributes(attrs.iter().copied());
        self.writer.write_event(Event::Start(start)).map_err(package_err)
    }

    fn close(&mut self, name: &str) -> XmlResult {
        self.writer
            .write_event(Event::End(BytesEnd::new(name)))
            .map_err(package_err)
    }

    fn empty(&mut self, name: &str, attrs: &[(&str, &str)]) -> XmlResult {
        let start = BytesStart::new(name).with_attributes(attrs.iter().copied());
        self.writer.write_event(Event::Empty(start)).map_err(package_err)
    }

    fn text(&mut self, text: &str) -> XmlResult {
        self.writer
            .write_event(Event::Text(BytesText::new(text)))
            .map_err(package_err)
    }

    fn element(
        &mut self,
        name: &str,
        attrs: &[(&str, &str)],
        body: impl FnOnce(&mut Self) -> XmlResult,
    ) -> XmlResult {
        self.open(name, attrs)?;
        body(self)?;
        self.close(name)
    }

    fn text_element(&mut self, name: &str, attrs: &[(&str, &str)], text: &str) -> XmlResult {
        self.element(name, attrs, |x| x.text(text))
    }

    fn into_bytes(self) -> Vec<u8> {
        self.writer.into_inner()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Run and paragraph styling
// ────────────────────────────────────────────────────────────────────────────

#[derive(Clone, Copy)]
struct RunStyle {
    bold: bool,
    size: u32,
    color: Rgb,
}

impl RunStyle {
    fn body(theme: &Theme) -> Self {
        Self {
            bold: false,
            size: BODY_SIZE,
            color: theme.text,
        }
    }

    fn strong(theme: &Theme) -> Self {
        Self {
            bold: true,
            ..Self::body(theme)
        }
    }

    fn with(self, size: u32, color: Rgb) -> Self {
        Self { size, color, ..self }
    }
}

#[derive(Clone, Copy, Default)]
struct Para<'s> {
    style: Option<&'s str>,
    align: Option<&'s str>,
    after: u32,
    bottom_border: Option<(Rgb, u32)>,
    right_indent: Option<u32>,
}

struct MediaPart {
    rel_id: String,
    path: String,
    bytes: Vec<u8>,
}

// ────────────────────────────────────────────────────────────────────────────
// document.xml body
// ────────────────────────────────────────────────────────────────────────────

struct BodyWriter<'t> {
    xml: Xml,
    theme: &'t Theme,
    media: Vec<MediaPart>,
}

impl<'t> BodyWriter<'t> {
    fn run(&mut self, text: &str, style: RunStyle) -> XmlResult {
        let size = style.size.to_string();
        let color = style.color.hex();
        self.xml.element("w:r", &[], |x| {
            x.element("w:rPr", &[], |x| {
                if style.bold {
                    x.empty("w:b", &[])?;
                }
                x.empty("w:color", &[("w:val", &color)])?;
                x.empty("w:sz", &[("w:val", &size)])?;
                x.empty("w:szCs", &[("w:val", &size)])
            })?;
            x.text_element("w:t", &[("xml:space", "preserve")], text)
        })
    }

    fn paragraph_props(&mut self, para: Para) -> XmlResult {
        let after = para.after.to_string();
        self.xml.element("w:pPr", &[], |x| {
            if let Some(style) = para.style {
                x.empty("w:pStyle", &[("w:val", style)])?;
            }
            if let Some((color, size)) = para.bottom_border {
                let color = color.hex();
                let size = size.to_string();
                x.element("w:pBdr", &[], |x| {
                    x.empty(
                        "w:bottom",
                        &[("w:val", "single"), ("w:sz", &size), ("w:space", "1"), ("w:color", &color)],
                    )
                })?;
            }
            x.empty("w:spacing", &[("w:before", "0"), ("w:after", &after)])?;
            if let Some(right) = para.right_indent {
                x.empty("w:ind", &[("w:right", &right.to_string())])?;
            }
            if let Some(align) = para.align {
                x.empty("w:jc", &[("w:val", align)])?;
            }
            Ok(())
        })
    }

    fn paragraph(&mut self, para: Para, runs: &[(&str, RunStyle)]) -> XmlResult {
        self.xml.open("w:p", &[])?;
        self.paragraph_props(para)?;
        for (text, style) in runs {
            if !text.is_empty() {
                self.run(text, *style)?;
            }
        }
        self.xml.close("w:p")
    }

    fn blank_paragraph(&mut self) -> XmlResult {
        self.paragraph(Para::default(), &[])
    }

    fn heading(&mut self, title: &str) -> XmlResult {
        let theme = self.theme;
        self.paragraph(
            Para {
                style: Some(HEADING_STYLE),
                after: 120,
                bottom_border: Some((theme.border, 6)),
                ..Default::default()
            },
            &[(title, RunStyle::strong(theme).with(HEADING_SIZE, theme.primary))],
        )
    }

    fn field(&mut self, field: &Field) -> XmlResult {
        let theme = self.theme;
        let label = format!("{}: ", field.label);
        self.paragraph(
            Para {
                after: 60,
                ..Default::default()
            },
            &[
                (&label, RunStyle::strong(theme)),
                (&field.value, RunStyle::body(theme)),
            ],
        )
    }

    /// Embeds an image paragraph. Returns false, writing nothing, when the
    /// bytes do not decode.
    fn image(&mut self, asset: &ImageAsset, max: (f32, f32), align: Option<&str>) -> Result<bool, RenderError> {
        if !asset.is_decodable() {
            warn!("Image could not be decoded for DOCX embedding, skipping");
            return Ok(false);
        }
        let index = self.media.len() + 1;
        let rel_id = format!("rId{}", FIRST_MEDIA_REL + index - 1);
        let file_name = format!("image{index}.{}", asset.format.extension());
        self.media.push(MediaPart {
            rel_id: rel_id.clone(),
            path: format!("word/media/{file_name}"),
            bytes: asset.bytes.clone(),
        });

        let (w, h) = fit_within(asset.width, asset.height, max.0, max.1);
        let cx = ((w * EMU_PER_PT).round() as u64).to_string();
        let cy = ((h * EMU_PER_PT).round() as u64).to_string();
        let id = index.to_string();
        let name = format!("Picture {index}");

        self.xml.open("w:p", &[])?;
        self.paragraph_props(Para {
            align,
            after: 60,
            ..Default::default()
        })?;
        self.xml.element("w:r", &[], |x| {
            x.element("w:drawing", &[], |x| {
                x.element(
                    "wp:inline",
                    &[("distT", "0"), ("distB", "0"), ("distL", "0"), ("distR", "0")],
                    |x| {
                        x.empty("wp:extent", &[("cx", &cx), ("cy", &cy)])?;
                        x.empty("wp:docPr", &[("id", &id), ("name", &name)])?;
                        x.element("a:graphic", &[("xmlns:a", NS_A)], |x| {
                            x.element("a:graphicData", &[("uri", NS_PIC)], |x| {
                                x.element("pic:pic", &[("xmlns:pic", NS_PIC)], |x| {
                                    x.element("pic:nvPicPr", &[], |x| {
                                        x.empty("pic:cNvPr", &[("id", &id), ("name", &file_name)])?;
                                        x.empty("pic:cNvPicPr", &[])
                                    })?;
                                    x.element("pic:blipFill", &[], |x| {
                                        x.empty("a:blip", &[("r:embed", &rel_id)])?;
                                        x.element("a:stretch", &[], |x| x.empty("a:fillRect", &[]))
                                    })?;
                                    x.element("pic:spPr", &[], |x| {
                                        x.element("a:xfrm", &[], |x| {
                                            x.empty("a:off", &[("x", "0"), ("y", "0")])?;
                                            x.empty("a:ext", &[("cx", &cx), ("cy", &cy)])
                                        })?;
                                        x.element("a:prstGeom", &[("prst", "rect")], |x| {
                                            x.empty("a:avLst", &[])
                                        })
                                    })
                                })
                            })
                        })
                    },
                )
            })
        })?;
        self.xml.close("w:p")?;
        Ok(true)
    }

    // ── Tables ──────────────────────────────────────────────────────────────

    fn open_table(&mut self, widths: &[u32], bordered: bool) -> XmlResult {
        let border = self.theme.border.hex();
        self.xml.open("w:tbl", &[])?;
        self.xml.element("w:tblPr", &[], |x| {
            x.empty("w:tblW", &[("w:w", &CONTENT_TWIPS.to_string()), ("w:type", "dxa")])?;
            x.empty("w:tblLayout", &[("w:type", "fixed")])?;
            let (val, size) = if bordered { ("single", "4") } else { ("nil", "0") };
            x.element("w:tblBorders", &[], |x| {
                for side in ["w:top", "w:left", "w:bottom", "w:right", "w:insideH", "w:insideV"] {
                    x.empty(side, &[("w:val", val), ("w:sz", size), ("w:space", "0"), ("w:color", &border)])?;
                }
                Ok(())
            })?;
            x.element("w:tblCellMar", &[], |x| {
                x.empty("w:left", &[("w:w", "80"), ("w:type", "dxa")])?;
                x.empty("w:right", &[("w:w", "80"), ("w:type", "dxa")])
            })
        })?;
        self.xml.element("w:tblGrid", &[], |x| {
            for width in widths {
                x.empty("w:gridCol", &[("w:w", &width.to_string())])?;
            }
            Ok(())
        })
    }

    fn close_table(&mut self) -> XmlResult {
        self.xml.close("w:tbl")?;
        // Word merges adjacent tables without a paragraph between them.
        self.paragraph(Para { after: 120, ..Default::default() }, &[])
    }

    fn cell(
        &mut self,
        width: u32,
        span: u32,
        shade: Option<Rgb>,
        top_border: Option<Rgb>,
        body: impl FnOnce(&mut Self) -> XmlResult,
    ) -> XmlResult {
        self.xml.open("w:tc", &[])?;
        self.xml.element("w:tcPr", &[], |x| {
            x.empty("w:tcW", &[("w:w", &width.to_string()), ("w:type", "dxa")])?;
            if span > 1 {
                x.empty("w:gridSpan", &[("w:val", &span.to_string())])?;
            }
            if let Some(color) = top_border {
                let color = color.hex();
                x.element("w:tcBorders", &[], |x| {
                    x.empty("w:top", &[("w:val", "single"), ("w:sz", "6"), ("w:space", "0"), ("w:color", &color)])
                })?;
            }
            if let Some(fill) = shade {
                x.empty("w:shd", &[("w:val", "clear"), ("w:color", "auto"), ("w:fill", &fill.hex())])?;
            }
            Ok(())
        })?;
        body(self)?;
        self.xml.close("w:tc")
    }

    fn text_cell(&mut self, width: u32, shade: Option<Rgb>, align: Option<&str>, text: &str, style: RunStyle) -> XmlResult {
        self.cell(width, 1, shade, None, |b| {
            b.paragraph(Para { align, ..Default::default() }, &[(text, style)])
        })
    }

    // ── Blocks ──────────────────────────────────────────────────────────────

    fn header(&mut self, header: &HeaderBlock) -> XmlResult {
        let theme = self.theme;
        let widths = [CONTENT_TWIPS - 4000, 4000];
        self.open_table(&widths, false)?;
        self.xml.open("w:tr", &[])?;

        self.cell(widths[0], 1, None, None, |b| {
            let mut wrote = false;
            if let Some(logo) = &header.logo {
                wrote |= b.image(logo, LOGO_MAX, None)?;
            }
            if let Some(company) = &header.company_name {
                b.paragraph(Para::default(), &[(company, RunStyle::strong(theme).with(36, theme.primary))])?;
                wrote = true;
            }
            if let Some(tagline) = &header.tagline {
                b.paragraph(Para::default(), &[(tagline, RunStyle::body(theme).with(BODY_SIZE, theme.secondary))])?;
                wrote = true;
            }
            // A table cell must hold at least one paragraph.
            if !wrote {
                b.blank_paragraph()?;
            }
            Ok(())
        })?;

        self.cell(widths[1], 1, None, None, |b| {
            let right = Para { align: Some("right"), ..Default::default() };
            b.paragraph(right, &[(&header.title, RunStyle::strong(theme).with(40, theme.primary))])?;
            for line in [&header.estimate_number, &header.date].into_iter().flatten() {
                b.paragraph(right, &[(line, RunStyle::body(theme))])?;
            }
            Ok(())
        })?;

        self.xml.close("w:tr")?;
        self.xml.close("w:tbl")?;
        self.paragraph(
            Para {
                after: 240,
                bottom_border: Some((theme.primary, 12)),
                ..Default::default()
            },
            &[],
        )
    }

    fn field_section(&mut self, column: &FieldColumn) -> XmlResult {
        self.heading(&column.title)?;
        for field in &column.fields {
            self.field(field)?;
        }
        self.paragraph(Para { after: 120, ..Default::default() }, &[])
    }

    /// Fixed two-column table: a heading row, then one row per field with the
    /// shorter side padded by blank cells.
    fn two_column(&mut self, left: &FieldColumn, right: &FieldColumn) -> XmlResult {
        let half = CONTENT_TWIPS / 2;
        let widths = [half, half];
        self.open_table(&widths, false)?;

        self.xml.open("w:tr", &[])?;
        for column in [left, right] {
            self.cell(half, 1, None, None, |b| b.heading(&column.title))?;
        }
        self.xml.close("w:tr")?;

        let rows = left.fields.len().max(right.fields.len());
        for index in 0..rows {
            self.xml.open("w:tr", &[])?;
            for column in [left, right] {
                self.cell(half, 1, None, None, |b| match column.fields.get(index) {
                    Some(field) => b.field(field),
                    None => b.blank_paragraph(),
                })?;
            }
            self.xml.close("w:tr")?;
        }
        self.close_table()
    }

    fn items_table(&mut self, table: &ItemsTableBlock) -> XmlResult {
        let theme = self.theme;
        let widths = ITEM_COLUMN_RATIOS.map(|r| (CONTENT_TWIPS as f32 * r).round() as u32);
        let header_style = RunStyle::strong(theme).with(BODY_SIZE, Rgb::WHITE);
        let align_for = |column: usize| (column > 0).then_some("right");

        self.heading(&table.title)?;
        self.open_table(&widths, true)?;

        // Header row repeats on every page Word breaks the table across.
        self.xml.open("w:tr", &[])?;
        self.xml.element("w:trPr", &[], |x| x.empty("w:tblHeader", &[]))?;
        for (column, label) in table.columns.iter().enumerate() {
            self.text_cell(widths[column], Some(theme.primary), align_for(column), label, header_style)?;
        }
        self.xml.close("w:tr")?;

        if table.rows.is_empty() {
            self.xml.open("w:tr", &[])?;
            self.cell(CONTENT_TWIPS, 4, Some(ROW_TINTS[0]), None, |b| {
                b.paragraph(
                    Para::default(),
                    &[(&table.empty_label, RunStyle::body(theme).with(BODY_SIZE, theme.secondary))],
                )
            })?;
            self.xml.close("w:tr")?;
        }

        for (index, row) in table.rows.iter().enumerate() {
            let tint = ROW_TINTS[index % 2];
            let cells = [&row.description, &row.quantity, &row.unit_price, &row.line_total];
            self.xml.open("w:tr", &[])?;
            for (column, text) in cells.into_iter().enumerate() {
                self.text_cell(widths[column], Some(tint), align_for(column), text, RunStyle::body(theme))?;
            }
            self.xml.close("w:tr")?;
        }
        self.xml.close("w:tbl")?;
        self.paragraph(Para { after: 60, ..Default::default() }, &[])?;

        // Totals: spacer, label, right-aligned amount.
        let label_w = (CONTENT_TWIPS as f32 * 0.25).round() as u32;
        let value_w = (CONTENT_TWIPS as f32 * 0.20).round() as u32;
        let spacer_w = CONTENT_TWIPS - label_w - value_w;
        self.open_table(&[spacer_w, label_w, value_w], false)?;
        for line in &table.totals {
            let (style, rule) = if line.is_emphasized() {
                (RunStyle::strong(theme).with(TOTAL_SIZE, theme.primary), Some(theme.border))
            } else {
                (RunStyle::body(theme), None)
            };
            self.xml.open("w:tr", &[])?;
            self.cell(spacer_w, 1, None, None, |b| b.blank_paragraph())?;
            self.cell(label_w, 1, None, rule, |b| {
                b.paragraph(Para::default(), &[(&line.label, style)])
            })?;
            self.cell(value_w, 1, None, rule, |b| {
                b.paragraph(Para { align: Some("right"), ..Default::default() }, &[(&line.amount, style)])
            })?;
            self.xml.close("w:tr")?;
        }
        self.close_table()
    }

    fn notes(&mut self, notes: &NotesBlock) -> XmlResult {
        let theme = self.theme;
        self.heading(&notes.title)?;
        for paragraph in &notes.paragraphs {
            self.paragraph(Para { after: 80, ..Default::default() }, &[(paragraph, RunStyle::body(theme))])?;
        }
        self.paragraph(Para { after: 120, ..Default::default() }, &[])
    }

    fn signature(&mut self, signature: &SignatureBlock) -> XmlResult {
        let theme = self.theme;
        self.heading(&signature.title)?;
        let embedded = match &signature.image {
            Some(asset) => self.image(asset, SIGNATURE_MAX, None)?,
            None => false,
        };
        if !embedded {
            self.paragraph(Para { after: 240, ..Default::default() }, &[])?;
        }
        // Signature line spanning roughly the image box width.
        let line_twips = ((SIGNATURE_MAX.0 + 40.0) * 20.0) as u32;
        self.paragraph(
            Para {
                after: 80,
                bottom_border: Some((theme.text, 6)),
                right_indent: Some(CONTENT_TWIPS - line_twips),
                ..Default::default()
            },
            &[],
        )?;
        if let Some(name) = &signature.name {
            self.paragraph(Para::default(), &[(name, RunStyle::strong(theme))])?;
        }
        for line in [&signature.signer_title, &signature.date].into_iter().flatten() {
            self.paragraph(Para::default(), &[(line, RunStyle::body(theme))])?;
        }
        Ok(())
    }

    fn section_properties(&mut self) -> XmlResult {
        let (w, h) = (PAGE_TWIPS.0.to_string(), PAGE_TWIPS.1.to_string());
        let margin = MARGIN_TWIPS.to_string();
        self.xml.element("w:sectPr", &[], |x| {
            x.empty("w:footerReference", &[("w:type", "default"), ("r:id", "rId2")])?;
            x.empty("w:pgSz", &[("w:w", &w), ("w:h", &h)])?;
            x.empty(
                "w:pgMar",
                &[
                    ("w:top", &margin),
                    ("w:right", &margin),
                    ("w:bottom", &margin),
                    ("w:left", &margin),
                    ("w:header", "500"),
                    ("w:footer", "500"),
                    ("w:gutter", "0"),
                ],
            )
        })
    }
}

fn document_part(doc: &ComposedDocument) -> Result<(Vec<u8>, Vec<MediaPart>), RenderError> {
    let mut xml = Xml::new()?;
    xml.open(
        "w:document",
        &[
            ("xmlns:w", NS_W),
            ("xmlns:r", NS_R),
            ("xmlns:wp", NS_WP),
            ("xmlns:a", NS_A),
            ("xmlns:pic", NS_PIC),
        ],
    )?;
    xml.open("w:body", &[])?;

    let mut body = BodyWriter {
        xml,
        theme: &doc.theme,
        media: Vec::new(),
    };
    for block in &doc.blocks {
        match block {
            ContentBlock::Header(header) => body.header(header)?,
            ContentBlock::JobSummary(column)
            | ContentBlock::ProjectInfo(column)
            | ContentBlock::PaymentOnly(column)
            | ContentBlock::ContactOnly(column) => body.field_section(column)?,
            ContentBlock::ItemsTable(table) => body.items_table(table)?,
            ContentBlock::TwoColumn { left, right } => body.two_column(left, right)?,
            ContentBlock::Notes(notes) => body.notes(notes)?,
            ContentBlock::Signature(signature) => body.signature(signature)?,
        }
    }
    body.section_properties()?;

    let BodyWriter { mut xml, media, .. } = body;
    xml.close("w:body")?;
    xml.close("w:document")?;
    Ok((xml.into_bytes(), media))
}

// ────────────────────────────────────────────────────────────────────────────
// Package parts
// ────────────────────────────────────────────────────────────────────────────

fn content_types_part() -> Result<Vec<u8>, RenderError> {
    let mut xml = Xml::new()?;
    xml.element(
        "Types",
        &[("xmlns", "http://schemas.openxmlformats.org/package/2006/content-types")],
        |x| {
            x.empty("Default", &[("Extension", "rels"), ("ContentType", "application/vnd.openxmlformats-package.relationships+xml")])?;
            x.empty("Default", &[("Extension", "xml"), ("ContentType", "application/xml")])?;
            for format in [AssetFormat::Png, AssetFormat::Jpeg, AssetFormat::Gif] {
                x.empty("Default", &[("Extension", format.extension()), ("ContentType", format.mime())])?;
            }
            x.empty(
                "Override",
                &[
                    ("PartName", "/word/document.xml"),
                    ("ContentType", "application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"),
                ],
            )?;
            x.empty(
                "Override",
                &[
                    ("PartName", "/word/styles.xml"),
                    ("ContentType", "application/vnd.openxmlformats-officedocument.wordprocessingml.styles+xml"),
                ],
            )?;
            x.empty(
                "Override",
                &[
                    ("PartName", "/word/footer1.xml"),
                    ("ContentType", "application/vnd.openxmlformats-officedocument.wordprocessingml.footer+xml"),
                ],
            )?;
            x.empty(
                "Override",
                &[
                    ("PartName", "/docProps/core.xml"),
                    ("ContentType", "application/vnd.openxmlformats-package.core-properties+xml"),
                ],
            )
        },
    )?;
    Ok(xml.into_bytes())
}

fn package_rels_part() -> Result<Vec<u8>, RenderError> {
    let mut xml = Xml::new()?;
    xml.element("Relationships", &[("xmlns", NS_PKG_RELS)], |x| {
        x.empty("Relationship", &[("Id", "rId1"), ("Type", REL_OFFICE_DOCUMENT), ("Target", "word/document.xml")])?;
        x.empty("Relationship", &[("Id", "rId2"), ("Type", REL_CORE_PROPS), ("Target", "docProps/core.xml")])
    })?;
    Ok(xml.into_bytes())
}

fn document_rels_part(media: &[MediaPart]) -> Result<Vec<u8>, RenderError> {
    let mut xml = Xml::new()?;
    xml.element("Relationships", &[("xmlns", NS_PKG_RELS)], |x| {
        x.empty("Relationship", &[("Id", "rId1"), ("Type", REL_STYLES), ("Target", "styles.xml")])?;
        x.empty("Relationship", &[("Id", "rId2"), ("Type", REL_FOOTER), ("Target", "footer1.xml")])?;
        for part in media {
            let target = part.path.trim_start_matches("word/");
            x.empty("Relationship", &[("Id", &part.rel_id), ("Type", REL_IMAGE), ("Target", target)])?;
        }
        Ok(())
    })?;
    Ok(xml.into_bytes())
}

fn core_props_part(doc: &ComposedDocument) -> Result<Vec<u8>, RenderError> {
    let title = format!("{} {}", doc.labels.document_title, doc.estimate_id);
    let created = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string();
    let language = match doc.lang {
        crate::compose::Lang::En => "en-US",
        crate::compose::Lang::Es => "es-ES",
    };
    let mut xml = Xml::new()?;
    xml.element(
        "cp:coreProperties",
        &[
            ("xmlns:cp", "http://schemas.openxmlformats.org/package/2006/metadata/core-properties"),
            ("xmlns:dc", "http://purl.org/dc/elements/1.1/"),
            ("xmlns:dcterms", "http://purl.org/dc/terms/"),
            ("xmlns:xsi", "http://www.w3.org/2001/XMLSchema-instance"),
        ],
        |x| {
            x.text_element("dc:title", &[], title.trim())?;
            x.text_element("dc:creator", &[], "estimate-api")?;
            x.text_element("dc:language", &[], language)?;
            x.text_element("dcterms:created", &[("xsi:type", "dcterms:W3CDTF")], &created)
        },
    )?;
    Ok(xml.into_bytes())
}

fn styles_part(theme: &Theme) -> Result<Vec<u8>, RenderError> {
    let text = theme.text.hex();
    let body_size = BODY_SIZE.to_string();
    let mut xml = Xml::new()?;
    xml.element("w:styles", &[("xmlns:w", NS_W)], |x| {
        x.element("w:docDefaults", &[], |x| {
            x.element("w:rPrDefault", &[], |x| {
                x.element("w:rPr", &[], |x| {
                    x.empty("w:rFonts", &[("w:ascii", "Helvetica"), ("w:hAnsi", "Helvetica"), ("w:cs", "Arial")])?;
                    x.empty("w:color", &[("w:val", &text)])?;
                    x.empty("w:sz", &[("w:val", &body_size)])?;
                    x.empty("w:szCs", &[("w:val", &body_size)])
                })
            })?;
            x.element("w:pPrDefault", &[], |x| {
                x.element("w:pPr", &[], |x| x.empty("w:spacing", &[("w:after", "0"), ("w:line", "259"), ("w:lineRule", "auto")]))
            })
        })?;
        x.element("w:style", &[("w:type", "paragraph"), ("w:default", "1"), ("w:styleId", "Normal")], |x| {
            x.empty("w:name", &[("w:val", "Normal")])?;
            x.empty("w:qFormat", &[])
        })?;
        x.element("w:style", &[("w:type", "paragraph"), ("w:styleId", HEADING_STYLE)], |x| {
            x.empty("w:name", &[("w:val", "Section Heading")])?;
            x.empty("w:basedOn", &[("w:val", "Normal")])?;
            x.empty("w:next", &[("w:val", "Normal")])?;
            x.empty("w:qFormat", &[])?;
            x.element("w:pPr", &[], |x| {
                x.empty("w:keepNext", &[])?;
                x.empty("w:spacing", &[("w:before", "120")])
            })?;
            x.element("w:rPr", &[], |x| x.empty("w:b", &[]))
        })
    })?;
    Ok(xml.into_bytes())
}

fn field_run(x: &mut Xml, instruction: &str) -> XmlResult {
    x.element("w:fldSimple", &[("w:instr", instruction)], |x| {
        x.element("w:r", &[], |x| x.text_element("w:t", &[], "1"))
    })
}

fn footer_part(doc: &ComposedDocument) -> Result<Vec<u8>, RenderError> {
    let color = doc.theme.secondary.hex();
    let page = format!("{} ", doc.labels.page);
    let of = format!(" {} ", doc.labels.of);
    let plain = |x: &mut Xml, text: &str| {
        x.element("w:r", &[], |x| {
            x.element("w:rPr", &[], |x| {
                x.empty("w:color", &[("w:val", &color)])?;
                x.empty("w:sz", &[("w:val", "16")])
            })?;
            x.text_element("w:t", &[("xml:space", "preserve")], text)
        })
    };
    let mut xml = Xml::new()?;
    xml.element("w:ftr", &[("xmlns:w", NS_W), ("xmlns:r", NS_R)], |x| {
        x.element("w:p", &[], |x| {
            x.element("w:pPr", &[], |x| x.empty("w:jc", &[("w:val", "center")]))?;
            plain(x, &page)?;
            field_run(x, " PAGE ")?;
            plain(x, &of)?;
            field_run(x, " NUMPAGES ")
        })
    })?;
    Ok(xml.into_bytes())
}

// ────────────────────────────────────────────────────────────────────────────
// Renderer
// ────────────────────────────────────────────────────────────────────────────

/// Flow-layout DOCX renderer.
#[derive(Debug, Clone, Copy, Default)]
pub struct PackageRenderer;

impl DocumentRenderer for PackageRenderer {
    fn render(&self, doc: &ComposedDocument) -> Result<Vec<u8>, RenderError> {
        let (document, media) = document_part(doc)?;

        let mut parts: Vec<(String, Vec<u8>)> = vec![
            ("[Content_Types].xml".to_string(), content_types_part()?),
            ("_rels/.rels".to_string(), package_rels_part()?),
            ("docProps/core.xml".to_string(), core_props_part(doc)?),
            ("word/document.xml".to_string(), document),
            ("word/styles.xml".to_string(), styles_part(&doc.theme)?),
            ("word/footer1.xml".to_string(), footer_part(doc)?),
            ("word/_rels/document.xml.rels".to_string(), document_rels_part(&media)?),
        ];
        parts.extend(media.into_iter().map(|part| (part.path, part.bytes)));

        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, bytes) in &parts {
            zip.start_file(name.as_str(), options).map_err(package_err)?;
            zip.write_all(bytes).map_err(package_err)?;
        }
        let out = zip.finish().map_err(package_err)?.into_inner();
        debug!(parts = parts.len(), bytes = out.len(), "DOCX packaged");
        Ok(out)
    }
}

#[cfg(test)]
pub(crate) fn read_part_bytes(bytes: &[u8], name: &str) -> Option<Vec<u8>> {
    use std::io::Read;
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).ok()?;
    let mut file = archive.by_name(name).ok()?;
    let mut contents = Vec::new();
    file.read_to_end(&mut contents).ok()?;
    Some(contents)
}

#[cfg(test)]
pub(crate) fn read_part(bytes: &[u8], name: &str) -> Option<String> {
    read_part_bytes(bytes, name).and_then(|raw| String::from_utf8(raw).ok())
}

/// Texts of `w:t` runs in document order. With `headings_only`, only runs in
/// section-heading paragraphs are returned, one string per paragraph.
#[cfg(test)]
pub(crate) fn extract_text(document_xml: &str, headings_only: bool) -> Vec<String> {
    use quick_xml::Reader;

    let mut reader = Reader::from_str(document_xml);
    let mut out = Vec::new();
    let mut current = String::new();
    let mut in_text = false;
    let mut is_heading = false;
    loop {
        match reader.read_event().expect("well-formed xml") {
            Event::Start(e) if e.name().as_ref() == b"w:p" => {
                current.clear();
                is_heading = false;
            }
            Event::Start(e) if e.name().as_ref() == b"w:t" => in_text = true,
            Event::End(e) if e.name().as_ref() == b"w:t" => {
                in_text = false;
                if !headings_only {
                    out.push(std::mem::take(&mut current));
                }
            }
            Event::Empty(e) if e.name().as_ref() == b"w:pStyle" => {
                is_heading = e
                    .try_get_attribute("w:val")
                    .ok()
                    .flatten()
                    .is_some_and(|a| a.value.as_ref() == HEADING_STYLE.as_bytes());
            }
            Event::Text(t) if in_text => current.push_str(&t.unescape().expect("text")),
            Event::End(e) if e.name().as_ref() == b"w:p" => {
                if headings_only && is_heading {
                    out.push(std::mem::take(&mut current));
                }
                is_heading = false;
            }
            Event::Eof => break,
            _ => {}
        }
    }
    out
}
