//! PDF export: the render model goes through a tera template into Typst
//! source, and the `typst` CLI turns that into PDF bytes.

use base64::{Engine as _, engine::general_purpose};
use slug::slugify;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tera::{Context, Tera, Value};
use tracing::{debug, error, info};

use crate::error::{Error, Result};
use crate::render::RenderModel;

// Embed template at compile time to ensure availability
pub const DEFAULT_TEMPLATE: &str = include_str!("../templates/invoice.typ.tera");
pub const TEMPLATE_FILE: &str = "invoice.typ.tera";
const TEMPLATE_NAME: &str = "invoice.typ";

pub trait DocumentRenderer {
    fn render(&self, model: &RenderModel) -> Result<RenderedDocument>;
}

/// Finished PDF, ready to be saved, printed or attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedDocument {
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl RenderedDocument {
    /// Filename safe to join onto a directory. `filename` itself stays as typed
    /// for mail attachments.
    pub fn local_filename(&self) -> String {
        let stem = self.filename.strip_suffix(".pdf").unwrap_or(&self.filename);
        let stem = slugify(stem);
        if stem.is_empty() {
            return "invoice.pdf".to_string();
        }
        format!("{}.pdf", stem)
    }

    /// Writes the PDF into `dir` under its slugified filename.
    pub fn save_to(&self, dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(dir)?;
        let path = dir.join(self.local_filename());
        fs::write(&path, &self.bytes)?;
        info!(path = %path.display(), "PDF saved");
        Ok(path)
    }

    pub fn to_base64(&self) -> String {
        general_purpose::STANDARD.encode(&self.bytes)
    }

    /// Hands the PDF to the system print spooler.
    pub fn print(&self) -> Result<()> {
        let path = self.save_to(&std::env::temp_dir())?;

        #[cfg(unix)]
        let mut command = {
            let mut c = Command::new(PRINT_COMMAND);
            c.arg(&path);
            c
        };

        #[cfg(windows)]
        let mut command = {
            let mut c = Command::new(PRINT_COMMAND);
            c.arg("-NoProfile")
                .arg("-Command")
                .arg(format!("Start-Process -FilePath '{}' -Verb Print", path.display()));
            c
        };

        spool(&mut command)
    }
}

#[cfg(unix)]
const PRINT_COMMAND: &str = "lp";

#[cfg(windows)]
const PRINT_COMMAND: &str = "powershell";

fn spool(command: &mut Command) -> Result<()> {
    match command.status() {
        Ok(s) if s.success() => Ok(()),
        Ok(s) => Err(Error::Print(format!("print command exited with {}", s))),
        Err(e) => {
            error!(program = ?command.get_program(), error = %e, "print command could not be started");
            Err(Error::Print(format!("print command unavailable: {}", e)))
        }
    }
}

/// Quotes a value as a Typst string literal.
pub fn typst_string_literal(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len() + 2);
    out.push('"');
    for c in raw.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => {}
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}

fn typst_str_filter(value: &Value, _args: &HashMap<String, Value>) -> tera::Result<Value> {
    let raw = match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    };
    Ok(Value::String(typst_string_literal(&raw)))
}

/// Writes the default template into `dir` unless a copy is already there.
pub fn ensure_template(dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = dir.join(TEMPLATE_FILE);
    if !path.exists() {
        info!(path = %path.display(), "initializing default template");
        fs::write(&path, DEFAULT_TEMPLATE)?;
    }
    Ok(path)
}

#[derive(Debug, Clone)]
pub struct TypstRenderer {
    typst_bin: String,
    template: String,
}

impl TypstRenderer {
    pub fn new(typst_bin: impl Into<String>) -> Self {
        TypstRenderer {
            typst_bin: typst_bin.into(),
            template: DEFAULT_TEMPLATE.to_string(),
        }
    }

    /// Uses the editable template under `template_dir`, creating it on first use.
    pub fn with_template_dir(typst_bin: impl Into<String>, template_dir: &Path) -> Result<Self> {
        let path = ensure_template(template_dir)?;
        Ok(TypstRenderer {
            typst_bin: typst_bin.into(),
            template: fs::read_to_string(path)?,
        })
    }

    /// Typst source for `model`. `logo_file` is the logo path relative to the source file.
    pub fn source(&self, model: &RenderModel, logo_file: Option<&str>) -> Result<String> {
        let mut tera = Tera::default();
        tera.register_filter("typst_str", typst_str_filter);
        tera.add_raw_template(TEMPLATE_NAME, &self.template)?;

        let mut context = Context::from_serialize(model)?;
        context.insert("logo_file", &logo_file);
        Ok(tera.render(TEMPLATE_NAME, &context)?)
    }
}

impl DocumentRenderer for TypstRenderer {
    fn render(&self, model: &RenderModel) -> Result<RenderedDocument> {
        let workdir = tempfile::tempdir()?;

        let logo_file = match &model.logo {
            Some(logo) => {
                let name = format!("logo.{}", logo.extension());
                fs::write(workdir.path().join(&name), &logo.bytes)?;
                Some(name)
            }
            None => None,
        };

        let source = self.source(model, logo_file.as_deref())?;
        let typ_path = workdir.path().join("invoice.typ");
        let pdf_path = workdir.path().join("invoice.pdf");
        fs::write(&typ_path, source)?;

        debug!(bin = %self.typst_bin, path = %typ_path.display(), "compiling PDF");
        let output = Command::new(&self.typst_bin)
            .arg("compile")
            .arg(&typ_path)
            .arg(&pdf_path)
            .output()
            .map_err(|e| {
                error!(bin = %self.typst_bin, error = %e, "typst could not be started");
                Error::Render(format!("'{}' is not installed or not runnable: {}", self.typst_bin, e))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            error!(status = %output.status, %stderr, "typst compilation failed");
            return Err(Error::Render(stderr));
        }

        Ok(RenderedDocument {
            filename: model.filename.clone(),
            bytes: fs::read(&pdf_path)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logo::encode_data_url;
    use crate::model::{InvoiceDraft, LineItem};
    use chrono::{TimeZone, Utc};

    fn model() -> RenderModel {
        let mut d = InvoiceDraft::new(Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap());
        d.brand_name = "Acme \"Rockets\"".into();
        d.client_name = "Globex".into();
        d.client_address = "1 Main St\nSpringfield".into();
        d.invoice_number = "INV-7".into();
        d.items = vec![
            LineItem { name: "Fuel".into(), description: "C:\\tanks".into(), quantity: 2.0, unit_price: 50.0 },
            LineItem { name: "Pad".into(), description: String::new(), quantity: 1.0, unit_price: 25.0 },
        ];
        d.shipping = 10.0;
        RenderModel::from_draft(&d)
    }

    #[test]
    fn string_literals_are_escaped() {
        assert_eq!(typst_string_literal("plain"), "\"plain\"");
        assert_eq!(typst_string_literal("a \"b\"\r\nc\\d"), "\"a \\\"b\\\"\\nc\\\\d\"");
        assert_eq!(typst_string_literal("#[$x]"), "\"#[$x]\"");
    }

    #[test]
    fn source_contains_escaped_values_and_visible_lines_only() {
        let source = TypstRenderer::new("typst").source(&model(), None).unwrap();

        assert!(source.contains(r#""Acme \"Rockets\"""#));
        assert!(source.contains(r#""1 Main St\nSpringfield""#));
        assert!(source.contains(r#""C:\\tanks""#));
        assert!(source.contains(r#""INV-7""#));
        assert!(source.contains(r#""Shipping:""#));
        assert!(source.contains(r#""$135.00""#));
        assert!(!source.contains("Discount:"));
        assert!(!source.contains("Tax ("));
        assert!(!source.contains("#image("));
        assert!(!source.contains("Notes:"));
        assert_eq!(source.matches("shaded: true").count(), 5);
    }

    #[test]
    fn logo_and_notes_appear_when_present() {
        let mut m = model();
        m.notes = Some("Paid by wire".into());
        let source = TypstRenderer::new("typst").source(&m, Some("logo.png")).unwrap();
        assert!(source.contains(r#"#image("logo.png""#));
        assert!(source.contains(r#""Paid by wire""#));
    }

    #[test]
    fn template_dir_is_seeded_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = ensure_template(dir.path()).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), DEFAULT_TEMPLATE);

        fs::write(&path, "custom {{ meta.invoice_number }}").unwrap();
        ensure_template(dir.path()).unwrap();
        let renderer = TypstRenderer::with_template_dir("typst", dir.path()).unwrap();
        assert_eq!(renderer.source(&model(), None).unwrap(), "custom INV-7");
    }

    #[test]
    fn missing_typst_binary_is_a_render_error() {
        let renderer = TypstRenderer::new("definitely-not-typst-binary");
        assert!(matches!(renderer.render(&model()), Err(Error::Render(_))));
    }

    #[test]
    fn document_saves_and_encodes() {
        let doc = RenderedDocument { filename: "INV-7.pdf".into(), bytes: b"%PDF-1.7".to_vec() };
        let dir = tempfile::tempdir().unwrap();
        let path = doc.save_to(&dir.path().join("output")).unwrap();
        assert_eq!(path, dir.path().join("output").join("inv-7.pdf"));
        assert_eq!(fs::read(path).unwrap(), b"%PDF-1.7");
        assert_eq!(doc.to_base64(), "JVBERi0xLjc=");
    }

    #[test]
    fn invoice_numbers_with_path_characters_stay_inside_the_output_dir() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("output");

        let slashed = RenderedDocument { filename: "INV/2024/001.pdf".into(), bytes: b"%PDF".to_vec() };
        let path = slashed.save_to(&output).unwrap();
        assert_eq!(path, output.join("inv-2024-001.pdf"));
        assert!(path.exists());
        assert_eq!(slashed.filename, "INV/2024/001.pdf");

        let escaping = RenderedDocument { filename: "../escaped.pdf".into(), bytes: b"%PDF".to_vec() };
        let path = escaping.save_to(&output).unwrap();
        assert_eq!(path.parent(), Some(output.as_path()));
        assert!(!dir.path().join("escaped.pdf").exists());

        let blank = RenderedDocument { filename: "../.pdf".into(), bytes: b"%PDF".to_vec() };
        assert_eq!(blank.local_filename(), "invoice.pdf");
    }

    #[test]
    fn spooler_failures_are_print_errors() {
        let mut missing = Command::new("definitely-not-a-print-spooler");
        assert!(matches!(spool(&mut missing), Err(Error::Print(_))));
    }

    #[cfg(unix)]
    #[test]
    fn spooler_exit_status_is_checked() {
        assert!(spool(&mut Command::new("true")).is_ok());
        assert!(matches!(spool(&mut Command::new("false")), Err(Error::Print(_))));
    }

    #[test]
    fn logo_from_model_is_decoded() {
        let mut d = InvoiceDraft::new(Utc::now());
        d.brand_logo = encode_data_url("image/png", &[1, 2, 3]);
        let m = RenderModel::from_draft(&d);
        assert_eq!(m.logo.as_ref().map(|l| l.extension()), Some("png"));
    }
}
