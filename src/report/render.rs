//! Report output. Renderers only lay out what the compiler decided; they
//! never re-flag values or rename parameters.

use std::io::BufWriter;
use std::path::{Path, PathBuf};

use printpdf::*;

use super::compiler::ReportDocument;
use super::identity::or_dash;
use super::ReportError;
use crate::config::AppConfig;

const PAGE_WIDTH: f32 = 210.0;
const PAGE_HEIGHT: f32 = 297.0;
const TOP: f32 = 280.0;
const BOTTOM: f32 = 20.0;
const LEFT: f32 = 20.0;

/// Turns a compiled report into bytes.
pub trait ReportRenderer {
    fn render(&self, document: &ReportDocument) -> Result<Vec<u8>, ReportError>;

    /// File extension for the output, without the dot.
    fn extension(&self) -> &'static str;
}

/// Pretty-printed JSON of the whole document.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonRenderer;

impl ReportRenderer for JsonRenderer {
    fn render(&self, document: &ReportDocument) -> Result<Vec<u8>, ReportError> {
        serde_json::to_vec_pretty(document).map_err(|e| ReportError::Render(e.to_string()))
    }

    fn extension(&self) -> &'static str {
        "json"
    }
}

/// A4 patient report.
#[derive(Debug, Clone)]
pub struct PdfRenderer {
    pub clinic_name: String,
    pub clinic_contact: String,
    pub signatory: String,
}

impl Default for PdfRenderer {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

impl PdfRenderer {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            clinic_name: config.clinic_name.clone(),
            clinic_contact: config.clinic_contact.clone(),
            signatory: config.signatory.clone(),
        }
    }
}

/// Writes lines top to bottom, starting a new page when space runs out.
struct PageCursor<'a> {
    doc: &'a PdfDocumentReference,
    layer: PdfLayerReference,
    y: Mm,
}

impl PageCursor<'_> {
    fn ensure_room(&mut self, advance: f32) {
        if (self.y - Mm(advance)).0 < BOTTOM {
            let (page, layer) = self.doc.add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
            self.layer = self.doc.get_page(page).get_layer(layer);
            self.y = Mm(TOP);
        }
    }

    fn line(&mut self, text: &str, size: f32, x: f32, font: &IndirectFontRef, advance: f32) {
        self.row(&[(text, x, font)], size, advance);
    }

    /// Several cells on one baseline, never split across pages.
    fn row(&mut self, cells: &[(&str, f32, &IndirectFontRef)], size: f32, advance: f32) {
        self.ensure_room(advance);
        for (text, x, font) in cells {
            self.layer.use_text(*text, size, Mm(*x), self.y, font);
        }
        self.y -= Mm(advance);
    }

    fn gap(&mut self, mm: f32) {
        self.y -= Mm(mm);
    }
}

impl ReportRenderer for PdfRenderer {
    fn render(&self, document: &ReportDocument) -> Result<Vec<u8>, ReportError> {
        let title = format!("{} Medical Report", self.clinic_name);
        let (doc, page1, layer1) =
            PdfDocument::new(&title, Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
        let font = doc
            .add_builtin_font(BuiltinFont::Helvetica)
            .map_err(|e| ReportError::Render(format!("PDF font error: {e}")))?;
        let bold = doc
            .add_builtin_font(BuiltinFont::HelveticaBold)
            .map_err(|e| ReportError::Render(format!("PDF font error: {e}")))?;

        {
            let mut cursor = PageCursor {
                doc: &doc,
                layer: doc.get_page(page1).get_layer(layer1),
                y: Mm(TOP),
            };
            self.write_body(&mut cursor, document, &font, &bold);
        }

        let mut buf = BufWriter::new(Vec::new());
        doc.save(&mut buf)
            .map_err(|e| ReportError::Render(format!("PDF save error: {e}")))?;
        buf.into_inner()
            .map_err(|e| ReportError::Render(format!("PDF buffer error: {e}")))
    }

    fn extension(&self) -> &'static str {
        "pdf"
    }
}

impl PdfRenderer {
    fn write_body(
        &self,
        c: &mut PageCursor<'_>,
        document: &ReportDocument,
        font: &IndirectFontRef,
        bold: &IndirectFontRef,
    ) {
        let identity = document.identity();

        // Header
        c.line(&self.clinic_name, 16.0, LEFT, bold, 6.0);
        c.line(
            &format!("Contact: {} | {}", or_dash(&identity.contact), self.clinic_contact),
            8.0,
            LEFT,
            font,
            8.0,
        );

        c.line("PATIENT MEDICAL REPORT", 13.0, LEFT, bold, 9.0);

        // Patient info
        let report_date = document.generated_at().format("%d-%m-%Y %I:%M %p").to_string();
        let report_id = document.report_id().to_string();
        let risk = document.risk_display();
        let info: [(&str, &str); 13] = [
            ("Patient ID", or_dash(&identity.patient_id)),
            ("Patient Name", or_dash(&identity.patient_name)),
            ("Contact", or_dash(&identity.contact)),
            ("Age", or_dash(&identity.age)),
            ("Gender", or_dash(&identity.gender)),
            ("Test Type", document.condition_label()),
            ("Doctor Name", or_dash(&identity.doctor_name)),
            ("Referred By", or_dash(&identity.referred_by)),
            ("Sample Collected", or_dash(&identity.sample_collected)),
            ("Report Generated By", or_dash(&identity.generated_by)),
            ("Report Date", report_date.as_str()),
            ("Report ID", report_id.as_str()),
            ("Risk", risk.as_str()),
        ];
        for (label, value) in info {
            c.row(&[(label, LEFT, bold), (value, 75.0, font)], 9.0, 5.0);
        }
        c.gap(5.0);

        // Results
        c.line("Test Results", 11.0, LEFT, bold, 6.0);
        if document.rows().is_empty() {
            c.line(
                "No numeric test parameters were provided for range checking.",
                9.0,
                LEFT,
                font,
                5.0,
            );
        } else {
            c.row(
                &[
                    ("Parameter", LEFT, bold),
                    ("Value", 85.0, bold),
                    ("Normal Range", 115.0, bold),
                    ("Status", 165.0, bold),
                ],
                9.0,
                5.5,
            );
            for row in document.rows() {
                let value = row.value.to_string();
                c.row(
                    &[
                        (row.name.as_str(), LEFT, font),
                        (value.as_str(), 85.0, font),
                        (row.range.text(), 115.0, font),
                        (row.flag.status.label(), 165.0, font),
                    ],
                    9.0,
                    5.0,
                );
            }
        }
        c.gap(5.0);

        c.line("AI Diagnosis Summary", 11.0, LEFT, bold, 6.0);
        for line in wrap_text(document.diagnosis(), 90) {
            c.line(&line, 10.0, LEFT + 5.0, font, 5.0);
        }
        c.gap(10.0);

        // Signature
        c.line(&self.signatory, 10.0, 140.0, bold, 5.0);
        c.line("________________", 10.0, 140.0, font, 4.5);
        c.line("(AI Generated Signature)", 8.0, 140.0, font, 10.0);

        for line in wrap_text(
            "Note: This report is AI generated. Consult a doctor for clinical confirmation.",
            100,
        ) {
            c.line(&line, 8.0, LEFT, font, 4.0);
        }
    }
}

/// Write rendered bytes to `dir/filename`, creating `dir` if needed.
pub fn export_to_file(bytes: &[u8], dir: &Path, filename: &str) -> Result<PathBuf, ReportError> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(filename);
    std::fs::write(&path, bytes)?;
    tracing::info!(path = %path.display(), size_bytes = bytes.len(), "Report exported");
    Ok(path)
}

/// Simple word-wrap helper for PDF text rendering.
fn wrap_text(text: &str, max_chars: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        if current.len() + word.len() + 1 > max_chars && !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}
