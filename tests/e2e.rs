//! End-to-end integration tests for enroll2pdf.
//!
//! Every test builds its own fixtures in a temporary directory: CSV inputs
//! are written on the fly, workbooks with `rust_xlsxwriter`, and PDF form
//! templates are synthesised with `lopdf`. Output PDFs are parsed back with `lopdf` to check page count,
//! page order and the text drawn on each page.
//!
//! Run with:
//!   cargo test --test e2e -- --nocapture

use encoding_rs::WINDOWS_1252;
use enroll2pdf::{
    convert, convert_to_file, inspect, ConversionConfig, ConversionProgressCallback,
    ConversionResult, ConversionState, ConvertError, LayoutKind, Rejection, RejectionReason,
    WarningKind,
};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream, StringFormat};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

// ── Test helpers ─────────────────────────────────────────────────────────────

const HEADER: &str = "Nachname;Vorname;Geburtsdatum;Kurs";

fn write_csv(dir: &Path, rows: &[&str]) -> PathBuf {
    let path = dir.join("anmeldungen.csv");
    let mut body = String::from(HEADER);
    for row in rows {
        body.push('\n');
        body.push_str(row);
    }
    body.push('\n');
    std::fs::write(&path, body).unwrap();
    path
}

/// Text strings drawn on each page, in page order.
fn page_texts(pdf: &Path) -> Vec<Vec<String>> {
    let doc = Document::load(pdf).unwrap();
    doc.get_pages()
        .values()
        .map(|id| {
            let content = doc.get_page_content(*id).unwrap();
            Content::decode(&content)
                .unwrap()
                .operations
                .into_iter()
                .filter(|op| op.operator == "Tj")
                .filter_map(|op| match op.operands.first() {
                    Some(Object::String(bytes, _)) => {
                        Some(WINDOWS_1252.decode(bytes).0.into_owned())
                    }
                    _ => None,
                })
                .collect()
        })
        .collect()
}

fn has(texts: &[String], needle: &str) -> bool {
    texts.iter().any(|t| t == needle)
}

/// A one-page PDF form with the four enrollment text fields.
fn write_template(dir: &Path, field_names: &[&str]) -> PathBuf {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let page_id = doc.new_object_id();

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Times-Roman",
    });
    let artwork = Content {
        operations: vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec![Object::Name(b"Fx".to_vec()), Object::Integer(18)]),
            Operation::new("Td", vec![Object::Integer(60), Object::Integer(780)]),
            Operation::new(
                "Tj",
                vec![Object::String(b"Schule am See".to_vec(), StringFormat::Literal)],
            ),
            Operation::new("ET", vec![]),
        ],
    };
    let content_id = doc.add_object(Stream::new(dictionary! {}, artwork.encode().unwrap()));

    let fields: Vec<Object> = field_names
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let y = 700 - 50 * i as i64;
            Object::Reference(add_text_field(&mut doc, name, page_id, y))
        })
        .collect();

    doc.objects.insert(
        page_id,
        Object::Dictionary(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![Object::Integer(0), Object::Integer(0), Object::Integer(595), Object::Integer(842)],
            "Contents" => content_id,
            "Annots" => fields.clone(),
            "Resources" => dictionary! { "Font" => dictionary! { "Fx" => font_id } },
        }),
    );
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![Object::Reference(page_id)],
            "Count" => 1,
        }),
    );
    let acroform_id = doc.add_object(dictionary! { "Fields" => fields });
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
        "AcroForm" => acroform_id,
    });
    doc.trailer.set("Root", catalog_id);

    let path = dir.join("formular.pdf");
    doc.save(&path).unwrap();
    path
}

fn add_text_field(doc: &mut Document, name: &str, page: ObjectId, y: i64) -> ObjectId {
    doc.add_object(dictionary! {
        "Type" => "Annot",
        "Subtype" => "Widget",
        "FT" => "Tx",
        "T" => Object::String(name.as_bytes().to_vec(), StringFormat::Literal),
        "Rect" => vec![Object::Integer(200), Object::Integer(y), Object::Integer(500), Object::Integer(y + 22)],
        "P" => page,
        "DA" => Object::String(b"/Helv 11 Tf 0 g".to_vec(), StringFormat::Literal),
    })
}

const ALL_FIELDS: [&str; 4] = ["Nachname", "Vorname", "Geburtsdatum", "Kurs"];

/// Records every callback in arrival order.
#[derive(Default)]
struct Recorder {
    states: Mutex<Vec<ConversionState>>,
    rendered_pages: Mutex<Vec<usize>>,
    rejected_rows: Mutex<Vec<usize>>,
    expected: Mutex<Option<Option<usize>>>,
    completed: AtomicUsize,
}

impl ConversionProgressCallback for Recorder {
    fn on_conversion_start(&self, expected_rows: Option<usize>) {
        *self.expected.lock().unwrap() = Some(expected_rows);
    }
    fn on_state_change(&self, state: ConversionState) {
        self.states.lock().unwrap().push(state);
    }
    fn on_row_rendered(&self, _row_number: usize, page_num: usize) {
        self.rendered_pages.lock().unwrap().push(page_num);
    }
    fn on_row_rejected(&self, rejection: &Rejection) {
        self.rejected_rows.lock().unwrap().push(rejection.row_number);
    }
    fn on_conversion_complete(&self, result: &ConversionResult) {
        self.completed.store(result.records_rendered, Ordering::SeqCst);
    }
}

// ── Core conversion ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_rejected_row_leaves_no_page_gap() {
    let dir = TempDir::new().unwrap();
    let input = write_csv(
        dir.path(),
        &[
            "Smith;Anna;2001-04-02;Math",
            ";Lee;2002-01-01;",
            "Jones;Tom;;Art",
        ],
    );
    let output = dir.path().join("out.pdf");

    let result = convert_to_file(&input, &output, &ConversionConfig::default())
        .await
        .expect("conversion should succeed");

    assert_eq!(result.rows_read, 3);
    assert_eq!(result.records_rendered, 2);
    assert!(result.is_partial());
    assert_eq!(
        result.rejections,
        [Rejection {
            row_number: 3,
            reason: RejectionReason::MissingLastName
        }]
    );
    assert_eq!(result.layout, LayoutKind::Synthetic);

    let pages = page_texts(&output);
    assert_eq!(pages.len(), 2);
    assert!(has(&pages[0], "Smith") && has(&pages[0], "Anna"));
    assert!(has(&pages[0], "02.04.2001"));
    assert!(has(&pages[1], "Jones") && has(&pages[1], "Tom"));
    assert!(!has(&pages[1], "Geburtsdatum:"), "absent birth date draws no line");
    assert!(!pages.iter().flatten().any(|t| t == "Lee"));
}

#[tokio::test]
async fn test_missing_course_has_no_course_line() {
    let dir = TempDir::new().unwrap();
    let input = write_csv(dir.path(), &["Smith;Anna;2001-04-02;"]);
    let output = dir.path().join("out.pdf");
    convert_to_file(&input, &output, &ConversionConfig::default())
        .await
        .unwrap();

    let pages = page_texts(&output);
    assert!(has(&pages[0], "Geburtsdatum:"));
    assert!(!pages[0].iter().any(|t| t.starts_with("Kurs")));
}

#[tokio::test]
async fn test_zero_valid_rows_fails_without_output() {
    let dir = TempDir::new().unwrap();
    let input = write_csv(dir.path(), &[";Anna;;", "Smith;;;", " ; ;2001-01-01;Math"]);
    let output = dir.path().join("out.pdf");

    let err = convert_to_file(&input, &output, &ConversionConfig::default())
        .await
        .unwrap_err();
    assert!(
        matches!(
            err,
            ConvertError::NoValidRecords {
                ref path,
                rows_read: 3,
                rejected: 3
            } if *path == input
        ),
        "got {err:?}"
    );
    assert!(!output.exists());
}

#[tokio::test]
async fn test_header_only_sheet_is_no_valid_records() {
    let dir = TempDir::new().unwrap();
    let input = write_csv(dir.path(), &[]);
    let output = dir.path().join("out.pdf");
    let err = convert_to_file(&input, &output, &ConversionConfig::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ConvertError::NoValidRecords { rows_read: 0, .. }));
    assert!(!output.exists());
}

#[tokio::test]
async fn test_reordering_rows_reorders_pages() {
    let dir = TempDir::new().unwrap();
    let rows = ["Alpha;A;;", "Beta;B;;", "Gamma;C;;"];
    let reordered = [rows[2], rows[0], rows[1]];

    let first = |pdf: &Path| -> Vec<String> {
        page_texts(pdf)
            .into_iter()
            .map(|p| {
                p.into_iter()
                    .find(|t| ["Alpha", "Beta", "Gamma"].contains(&t.as_str()))
                    .unwrap()
            })
            .collect()
    };

    let input = write_csv(dir.path(), &rows);
    let out_a = dir.path().join("a.pdf");
    convert_to_file(&input, &out_a, &ConversionConfig::default())
        .await
        .unwrap();
    assert_eq!(first(&out_a), ["Alpha", "Beta", "Gamma"]);

    let input = write_csv(dir.path(), &reordered);
    let out_b = dir.path().join("b.pdf");
    convert_to_file(&input, &out_b, &ConversionConfig::default())
        .await
        .unwrap();
    assert_eq!(first(&out_b), ["Gamma", "Alpha", "Beta"]);
}

#[tokio::test]
async fn test_concurrent_rendering_keeps_source_order() {
    let dir = TempDir::new().unwrap();
    let names: Vec<String> = (0..40).map(|i| format!("Person{i:02};Vorname{i};;Kurs {i}")).collect();
    let rows: Vec<&str> = names.iter().map(String::as_str).collect();
    let input = write_csv(dir.path(), &rows);
    let output = dir.path().join("out.pdf");

    let config = ConversionConfig::builder().concurrency(8).build().unwrap();
    let result = convert_to_file(&input, &output, &config).await.unwrap();
    assert_eq!(result.records_rendered, 40);

    let pages = page_texts(&output);
    for (i, page) in pages.iter().enumerate() {
        assert!(has(page, &format!("Person{i:02}")), "page {i} out of order");
    }
}

#[tokio::test]
async fn test_output_is_byte_identical_across_runs() {
    let dir = TempDir::new().unwrap();
    let input = write_csv(dir.path(), &["Smith;Anna;2001-04-02;Math", "Jones;Tom;;Art"]);
    let a = dir.path().join("a.pdf");
    let b = dir.path().join("b.pdf");
    convert_to_file(&input, &a, &ConversionConfig::default())
        .await
        .unwrap();
    convert_to_file(&input, &b, &ConversionConfig::default())
        .await
        .unwrap();
    assert_eq!(std::fs::read(&a).unwrap(), std::fs::read(&b).unwrap());
}

#[tokio::test]
async fn test_unparsable_birth_date_is_a_warning() {
    let dir = TempDir::new().unwrap();
    let input = write_csv(dir.path(), &["Smith;Anna;irgendwann;Math"]);
    let output = dir.path().join("out.pdf");
    let result = convert_to_file(&input, &output, &ConversionConfig::default())
        .await
        .unwrap();

    assert_eq!(result.records_rendered, 1);
    assert!(result.rejections.is_empty());
    assert_eq!(result.warnings.len(), 1);
    assert_eq!(result.warnings[0].row_number, 2);
    assert_eq!(
        result.warnings[0].kind,
        WarningKind::UnparsableBirthDate {
            raw: "irgendwann".into()
        }
    );
    assert!(!has(&page_texts(&output)[0], "Geburtsdatum:"));
}

#[tokio::test]
async fn test_windows_1252_csv_keeps_umlauts() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("export.csv");
    let (bytes, _, _) = WINDOWS_1252.encode("Nachname;Vorname\nMüller;Jürgen\n");
    std::fs::write(&path, &bytes).unwrap();
    let output = dir.path().join("out.pdf");

    convert_to_file(&path, &output, &ConversionConfig::default())
        .await
        .unwrap();
    let pages = page_texts(&output);
    assert!(has(&pages[0], "Müller"));
    assert!(has(&pages[0], "Jürgen"));
}

#[tokio::test]
async fn test_comma_separated_csv_is_sniffed() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("export.csv");
    std::fs::write(&path, "Vorname,Nachname\nAnna,Smith\n").unwrap();
    let output = dir.path().join("out.pdf");
    let result = convert_to_file(&path, &output, &ConversionConfig::default())
        .await
        .unwrap();
    assert_eq!(result.records_rendered, 1);
    assert!(has(&page_texts(&output)[0], "Smith"));
}

/// Enrollment sheet behind a notes sheet, headers out of canonical order.
fn write_workbook(dir: &Path) -> PathBuf {
    use rust_xlsxwriter::{ExcelDateTime, Format, Workbook};

    let path = dir.join("anmeldungen.xlsx");
    let mut workbook = Workbook::new();
    workbook
        .add_worksheet()
        .set_name("Notizen")
        .unwrap()
        .write_string(0, 0, "Bitte bis Freitag")
        .unwrap();

    let sheet = workbook.add_worksheet();
    sheet.set_name("Anmeldungen").unwrap();
    let rows: [[&str; 4]; 4] = [
        ["Vorname", "Kurs", "Geburtsdatum", "Nachname"],
        ["Anna", "Math", "", "Smith"],
        ["Lee", "Art", "", ""],
        ["Tom", "", "kein Datum", "Jones"],
    ];
    for (r, row) in rows.iter().enumerate() {
        for (c, value) in row.iter().enumerate() {
            if !value.is_empty() {
                sheet.write_string(r as u32, c as u16, *value).unwrap();
            }
        }
    }
    sheet
        .write_datetime_with_format(
            1,
            2,
            &ExcelDateTime::from_ymd(2001, 4, 2).unwrap(),
            &Format::new().set_num_format("dd.mm.yyyy"),
        )
        .unwrap();
    workbook.save(&path).unwrap();
    path
}

#[tokio::test]
async fn test_workbook_sheet_is_converted() {
    let dir = TempDir::new().unwrap();
    let input = write_workbook(dir.path());
    let output = dir.path().join("out.pdf");

    // The first sheet has no enrollment columns.
    let err = convert_to_file(&input, &output, &ConversionConfig::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ConvertError::MissingColumns { .. }), "got {err:?}");

    let config = ConversionConfig::builder().sheet("Anmeldungen").build().unwrap();
    let result = convert_to_file(&input, &output, &config).await.unwrap();

    assert_eq!(result.rows_read, 3);
    assert_eq!(result.records_rendered, 2);
    assert_eq!(
        result.rejections,
        [Rejection {
            row_number: 3,
            reason: RejectionReason::MissingLastName
        }]
    );
    assert_eq!(result.warnings.len(), 1);
    assert_eq!(result.warnings[0].row_number, 4);

    let pages = page_texts(&output);
    assert_eq!(pages.len(), 2);
    assert!(has(&pages[0], "Smith") && has(&pages[0], "02.04.2001"));
    assert!(has(&pages[1], "Jones") && !has(&pages[1], "Geburtsdatum:"));
}

// ── Template layout ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_template_is_filled_and_flattened() {
    let dir = TempDir::new().unwrap();
    let template = write_template(dir.path(), &ALL_FIELDS);
    let input = write_csv(dir.path(), &["Smith;Anna;2001-04-02;Math", "Jones;Tom;;"]);
    let output = dir.path().join("out.pdf");

    let config = ConversionConfig::builder()
        .template_path(&template)
        .build()
        .unwrap();
    let result = convert_to_file(&input, &output, &config).await.unwrap();
    assert_eq!(result.layout, LayoutKind::Template);

    let pages = page_texts(&output);
    assert_eq!(pages, [vec!["Smith", "Anna", "02.04.2001", "Math"], vec!["Jones", "Tom"]]);

    let doc = Document::load(&output).unwrap();
    let root = doc.trailer.get(b"Root").unwrap().as_reference().unwrap();
    assert!(doc.get_dictionary(root).unwrap().get(b"AcroForm").is_err());

    // Each page draws the template artwork through the shared XObject.
    for id in doc.get_pages().values() {
        let ops = Content::decode(&doc.get_page_content(*id).unwrap())
            .unwrap()
            .operations;
        assert!(ops.iter().any(|op| op.operator == "Do"));
    }
}

#[tokio::test]
async fn test_corrupt_template_fails_without_fallback() {
    let dir = TempDir::new().unwrap();
    let template = dir.path().join("formular.pdf");
    std::fs::write(&template, b"this is not a pdf").unwrap();
    let input = write_csv(dir.path(), &["Smith;Anna;;"]);
    let output = dir.path().join("out.pdf");

    let config = ConversionConfig::builder()
        .template_path(&template)
        .build()
        .unwrap();
    let err = convert_to_file(&input, &output, &config).await.unwrap_err();
    assert!(matches!(err, ConvertError::InvalidTemplate { .. }), "got {err:?}");
    assert!(!output.exists());
}

#[tokio::test]
async fn test_template_missing_field_is_invalid() {
    let dir = TempDir::new().unwrap();
    let template = write_template(dir.path(), &["Nachname", "Vorname", "Kurs"]);
    let input = write_csv(dir.path(), &["Smith;Anna;;"]);
    let output = dir.path().join("out.pdf");

    let config = ConversionConfig::builder()
        .template_path(&template)
        .build()
        .unwrap();
    match convert_to_file(&input, &output, &config).await {
        Err(ConvertError::InvalidTemplate { reason, .. }) => {
            assert!(reason.contains("Geburtsdatum"), "{reason}")
        }
        other => panic!("expected InvalidTemplate, got {other:?}"),
    }
}

// ── Input errors ────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_missing_required_column() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("in.csv");
    std::fs::write(&path, "Nachname;Kurs\nSmith;Math\n").unwrap();
    let err = convert_to_file(&path, dir.path().join("out.pdf"), &ConversionConfig::default())
        .await
        .unwrap_err();
    match err {
        ConvertError::MissingColumns { missing, .. } => assert_eq!(missing, ["Vorname"]),
        other => panic!("expected MissingColumns, got {other:?}"),
    }
}

#[tokio::test]
async fn test_header_names_are_case_sensitive() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("in.csv");
    std::fs::write(&path, "nachname;vorname\nSmith;Anna\n").unwrap();
    let err = convert_to_file(&path, dir.path().join("out.pdf"), &ConversionConfig::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ConvertError::MissingColumns { .. }));
}

#[tokio::test]
async fn test_nonexistent_and_unsupported_inputs() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("out.pdf");

    let err = convert_to_file(dir.path().join("missing.xlsx"), &output, &ConversionConfig::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ConvertError::UnreadableFile { .. }));

    let txt = dir.path().join("notes.txt");
    std::fs::write(&txt, "Nachname;Vorname\nSmith;Anna\n").unwrap();
    let err = convert_to_file(&txt, &output, &ConversionConfig::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ConvertError::UnreadableFile { .. }));
}

// ── Output errors ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_missing_output_directory_is_write_failed() {
    let dir = TempDir::new().unwrap();
    let input = write_csv(dir.path(), &["Smith;Anna;;"]);
    let output = dir.path().join("does/not/exist/out.pdf");
    let err = convert_to_file(&input, &output, &ConversionConfig::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ConvertError::WriteFailed { .. }), "got {err:?}");
    assert!(!dir.path().join("does").exists());
}

#[tokio::test]
async fn test_existing_output_is_replaced_atomically() {
    let dir = TempDir::new().unwrap();
    let input = write_csv(dir.path(), &["Smith;Anna;;"]);
    let output = dir.path().join("out.pdf");
    std::fs::write(&output, b"old").unwrap();

    convert_to_file(&input, &output, &ConversionConfig::default())
        .await
        .unwrap();
    assert_eq!(page_texts(&output).len(), 1);
    // Only the input and the output remain; no stray temp files.
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 2);
}

// ── Progress and cancellation ───────────────────────────────────────────────

#[tokio::test]
async fn test_progress_callbacks_follow_the_state_machine() {
    let dir = TempDir::new().unwrap();
    let input = write_csv(dir.path(), &["Smith;Anna;;", ";Lee;;", "Jones;Tom;;"]);
    let output = dir.path().join("out.pdf");
    let recorder = Arc::new(Recorder::default());

    let config = ConversionConfig::builder()
        .progress_callback(recorder.clone())
        .build()
        .unwrap();
    convert_to_file(&input, &output, &config).await.unwrap();

    assert_eq!(
        *recorder.states.lock().unwrap(),
        [
            ConversionState::Reading,
            ConversionState::Processing,
            ConversionState::Assembling,
            ConversionState::Succeeded
        ]
    );
    assert_eq!(*recorder.rendered_pages.lock().unwrap(), [1, 2]);
    assert_eq!(*recorder.rejected_rows.lock().unwrap(), [3]);
    assert!(recorder.expected.lock().unwrap().is_some());
    assert_eq!(recorder.completed.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_fatal_error_ends_in_failed_state() {
    let dir = TempDir::new().unwrap();
    let recorder = Arc::new(Recorder::default());
    let config = ConversionConfig::builder()
        .progress_callback(recorder.clone())
        .build()
        .unwrap();
    let _ = convert_to_file(dir.path().join("missing.csv"), dir.path().join("o.pdf"), &config).await;

    assert_eq!(
        *recorder.states.lock().unwrap(),
        [ConversionState::Reading, ConversionState::Failed]
    );
    assert_eq!(recorder.completed.load(Ordering::SeqCst), 0);
}

/// Raises the cancel flag as soon as the first page is rendered.
struct CancelAfterFirst(Arc<AtomicBool>);

impl ConversionProgressCallback for CancelAfterFirst {
    fn on_row_rendered(&self, _row_number: usize, _page_num: usize) {
        self.0.store(true, Ordering::SeqCst);
    }
}

#[tokio::test]
async fn test_cancellation_between_rows_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let input = write_csv(dir.path(), &["A;a;;", "B;b;;", "C;c;;"]);
    let output = dir.path().join("out.pdf");
    let flag = Arc::new(AtomicBool::new(false));

    let config = ConversionConfig::builder()
        .cancel_flag(flag.clone())
        .progress_callback(Arc::new(CancelAfterFirst(flag.clone())))
        .build()
        .unwrap();
    let err = convert_to_file(&input, &output, &config).await.unwrap_err();
    assert!(matches!(err, ConvertError::Cancelled { .. }), "got {err:?}");
    assert!(!output.exists());
}

// ── Other entry points ──────────────────────────────────────────────────────

#[test]
fn test_sync_convert_with_template() {
    let dir = TempDir::new().unwrap();
    let template = write_template(dir.path(), &ALL_FIELDS);
    let input = write_csv(dir.path(), &["Smith;Anna;;Math"]);
    let output = dir.path().join("out.pdf");

    let result = convert(&input, &output, Some(&template)).unwrap();
    assert_eq!(result.records_rendered, 1);
    assert_eq!(result.layout, LayoutKind::Template);
    assert_eq!(result.output_path, output);
}

#[tokio::test]
async fn test_inspect_summarises_workbook() {
    let dir = TempDir::new().unwrap();
    let input = write_csv(dir.path(), &["Smith;Anna;;", "", "Jones;Tom;;"]);
    let summary = inspect(&input).await.unwrap();
    assert_eq!(summary.columns, ["Nachname", "Vorname", "Geburtsdatum", "Kurs"]);
    assert_eq!(summary.total_rows, 2);
    assert!(summary.valid);
    assert!(summary.missing_required.is_empty());
    assert_eq!(summary.available_optional, ["Geburtsdatum", "Kurs"]);
}

#[tokio::test]
async fn test_result_is_json_serialisable() {
    let dir = TempDir::new().unwrap();
    let input = write_csv(dir.path(), &["Smith;Anna;;", ";Lee;;"]);
    let output = dir.path().join("out.pdf");
    let result = convert_to_file(&input, &output, &ConversionConfig::default())
        .await
        .unwrap();

    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["records_rendered"], 1);
    assert_eq!(json["rejections"][0]["row_number"], 3);
    assert_eq!(json["rejections"][0]["reason"], "MissingLastName");
}

#[test]
fn test_callback_is_send_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<Recorder>();
    assert_send_sync::<ConversionConfig>();
}
