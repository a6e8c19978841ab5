use std::fmt::Write as _;

use time::format_description::well_known::Rfc3339;

use crate::accounts::repo_types::User;

/// A rendered file ready to attach to a mail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

pub trait DocumentExporter: Send + Sync {
    fn export(&self, user: &User) -> anyhow::Result<Document>;
}

/// Renders the account attributes as a one-page PDF.
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfExporter;

impl DocumentExporter for PdfExporter {
    fn export(&self, user: &User) -> anyhow::Result<Document> {
        let lines = vec![
            "Account data".to_string(),
            String::new(),
            format!("ID: {}", user.id),
            format!("Email: {}", user.email),
            format!("Status: {}", user.status),
            format!("Created at: {}", user.created_at.format(&Rfc3339)?),
            format!("Updated at: {}", user.updated_at.format(&Rfc3339)?),
        ];
        Ok(Document {
            filename: "user-data.pdf".into(),
            content_type: "application/pdf".into(),
            bytes: render_pdf(&lines),
        })
    }
}

fn escape_pdf_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' | '(' | ')' => {
                out.push('\\');
                out.push(c);
            }
            ' '..='~' => out.push(c),
            _ => out.push('?'),
        }
    }
    out
}

/// Minimal PDF 1.4: catalog, page tree, one page, Helvetica, one content
/// stream. Object offsets in the xref table are exact byte positions.
fn render_pdf(lines: &[String]) -> Vec<u8> {
    let mut content = String::from("BT\n/F1 12 Tf\n16 TL\n72 720 Td\n");
    for line in lines {
        let _ = writeln!(content, "({}) Tj T*", escape_pdf_text(line));
    }
    content.push_str("ET\n");

    let objects = [
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        "<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_string(),
        "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] \
         /Resources << /Font << /F1 4 0 R >> >> /Contents 5 0 R >>"
            .to_string(),
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>".to_string(),
        format!(
            "<< /Length {} >>\nstream\n{}endstream",
            content.len(),
            content
        ),
    ];

    let mut pdf = String::from("%PDF-1.4\n");
    let mut offsets = Vec::with_capacity(objects.len());
    for (i, body) in objects.iter().enumerate() {
        offsets.push(pdf.len());
        let _ = write!(pdf, "{} 0 obj\n{}\nendobj\n", i + 1, body);
    }

    let xref_at = pdf.len();
    let _ = write!(pdf, "xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1);
    for off in offsets {
        let _ = write!(pdf, "{:010} 00000 n \n", off);
    }
    let _ = write!(
        pdf,
        "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
        objects.len() + 1,
        xref_at
    );
    pdf.into_bytes()
}
