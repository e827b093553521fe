//! Conversion pipeline behavior on the success path and on rejected
//! submissions.

mod common;

use std::io::Read;
use std::sync::Arc;

use common::{TestHarness, UppercaseConverter, WAIT};
use docshift::{
    ConvertOptions, Converter, ErrorKind, JobState, SubmitRequest, TextToPdf,
};

const STATEMENT: &str = "\
Account statement
Date  Time/Eff.Date  Descriptions  Withdrawal / Deposit  Channel  Details
01/03/2024  01/03/2024  Grocery  -42.10  Card  Store 7
02/03/2024  02/03/2024  Salary  +3,000.00  Transfer
";

fn text_pdf(harness: &TestHarness, text: &str) -> Vec<u8> {
    let source = harness.temp_path().join("source.txt");
    let pdf = harness.temp_path().join("source.pdf");
    std::fs::write(&source, text).unwrap();
    TextToPdf::new()
        .convert(&source, &pdf, &ConvertOptions::new())
        .unwrap();
    std::fs::read(&pdf).unwrap()
}

#[test]
fn test_every_registered_pair_succeeds() {
    let harness = TestHarness::new();
    let pipeline = harness.pipeline();
    let pdf = text_pdf(&harness, STATEMENT);

    for pair in harness.registry.pairs() {
        let input: Vec<u8> = match pair.input.as_str() {
            "pdf" => pdf.clone(),
            "md" => b"# Title\n\nSome *markdown* text.\n".to_vec(),
            _ => b"plain text body\nsecond line\n".to_vec(),
        };
        let request = SubmitRequest::new(format!("sample.{}", pair.input), pair.output.as_str());

        let job = pipeline
            .submit_and_wait(&input[..], request, WAIT)
            .unwrap();
        assert_eq!(job.state, JobState::Succeeded, "{}: {:?}", pair, job.failure);

        let path = pipeline.result(&job.job_id).unwrap();
        let output = std::fs::read(&path).unwrap();
        assert!(!output.is_empty(), "{} produced an empty file", pair);
        assert!(path.starts_with(&harness.output_dir));
    }

    pipeline.shutdown();
}

#[test]
fn test_identity_conversion_is_byte_for_byte() {
    let harness = TestHarness::new();
    let pipeline = harness.pipeline();

    let job = pipeline
        .submit_and_wait(&b"0123456789"[..], SubmitRequest::new("digits.txt", "txt"), WAIT)
        .unwrap();
    assert_eq!(job.state, JobState::Succeeded);
    assert_eq!(job.input_size, Some(10));

    let output = std::fs::read(pipeline.result(&job.job_id).unwrap()).unwrap();
    assert_eq!(output, b"0123456789");
}

#[test]
fn test_unregistered_pair_is_rejected_without_writing() {
    let harness = TestHarness::new();
    let pipeline = harness.pipeline();

    let err = pipeline
        .submit(&b"%PDF-1.4 ..."[..], SubmitRequest::new("report.pdf", "docx"))
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::UnsupportedFormat);
    assert!(err.kind().is_client_error());
    assert!(harness.upload_files().is_empty());
    assert!(harness.output_files().is_empty());
    assert!(pipeline.jobs().is_empty());
}

#[test]
fn test_empty_upload_rejected_before_registry_lookup() {
    let harness = TestHarness::new();
    let pipeline = harness.pipeline();

    // the pair is unsupported too, but emptiness is reported first
    let err = pipeline
        .submit(std::io::empty(), SubmitRequest::new("blank.pdf", "docx"))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);

    let err = pipeline
        .submit(std::io::empty(), SubmitRequest::new("blank.txt", "pdf"))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);

    assert!(harness.upload_files().is_empty());
    assert!(pipeline.jobs().is_empty());
}

#[test]
fn test_unsafe_names_rejected() {
    let harness = TestHarness::new();
    let pipeline = harness.pipeline();

    for name in ["../../etc/passwd.txt", "nested/dir.txt", "..", "", "a\\b.txt", "/abs.txt"] {
        let err = pipeline
            .submit(&b"data"[..], SubmitRequest::new(name, "txt"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput, "accepted '{}'", name);
    }

    assert!(harness.upload_files().is_empty());
    assert!(!harness.temp_path().join("etc").exists());
}

#[test]
fn test_concurrent_submissions_do_not_collide() {
    let harness = TestHarness::new();
    let pipeline = harness.pipeline();

    let jobs: Vec<(String, String)> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..16)
            .map(|i| {
                let pipeline = &pipeline;
                scope.spawn(move || {
                    let body = format!("document number {} {}", i, "x".repeat(i * 100));
                    // every client uses the same declared name
                    let id = pipeline
                        .submit(body.as_bytes(), SubmitRequest::new("same.txt", "txt"))
                        .unwrap();
                    (id, body)
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    for (id, body) in &jobs {
        let job = pipeline.wait(id, WAIT).unwrap();
        assert_eq!(job.state, JobState::Succeeded, "{:?}", job.failure);
        let output = std::fs::read_to_string(pipeline.result(id).unwrap()).unwrap();
        assert_eq!(&output, body);
    }

    assert_eq!(harness.upload_files().len(), 16);
    assert_eq!(harness.output_files().len(), 16);
}

#[test]
fn test_result_before_completion_and_unknown_job() {
    let harness = TestHarness::new();
    harness.register(
        "txt",
        "csv",
        common::SlowConverter::new(std::time::Duration::from_millis(500)),
    );
    let pipeline = harness.pipeline();

    let id = pipeline
        .submit(&b"a,b\n"[..], SubmitRequest::new("rows.txt", "csv"))
        .unwrap();

    let err = pipeline.result(&id).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::JobNotComplete);
    assert_eq!(pipeline.status(&id).unwrap().state, JobState::Running);

    let err = pipeline.result("no-such-job").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(
        pipeline.status("no-such-job").unwrap_err().kind(),
        ErrorKind::NotFound
    );

    let job = pipeline.wait(&id, WAIT).unwrap();
    assert_eq!(job.state, JobState::Succeeded);
    assert!(pipeline.result(&id).is_ok());
}

#[test]
fn test_discard_removes_input_and_output() {
    let harness = TestHarness::new();
    let pipeline = harness.pipeline();

    let job = pipeline
        .submit_and_wait(&b"keep me briefly"[..], SubmitRequest::new("note.txt", "pdf"), WAIT)
        .unwrap();
    let input = job.input_path.clone().unwrap();
    let output = job.output_path.clone().unwrap();
    assert!(input.exists() && output.exists());

    pipeline.discard(&job.job_id).unwrap();

    assert!(!input.exists());
    assert!(!output.exists());
    assert_eq!(
        pipeline.result(&job.job_id).unwrap_err().kind(),
        ErrorKind::NotFound
    );
    assert_eq!(
        pipeline.discard(&job.job_id).unwrap_err().kind(),
        ErrorKind::NotFound
    );
}

#[test]
fn test_open_result_streams_output() {
    let harness = TestHarness::new();
    let pipeline = harness.pipeline();

    let job = pipeline
        .submit_and_wait(
            &b"Quarterly notes\n"[..],
            SubmitRequest::new("notes.txt", "application/pdf"),
            WAIT,
        )
        .unwrap();

    let mut output = pipeline.open_result(&job.job_id).unwrap();
    assert_eq!(output.download_name, "notes.pdf");
    assert_eq!(output.media_type, "application/pdf");

    let mut bytes = Vec::new();
    output.file.read_to_end(&mut bytes).unwrap();
    assert_eq!(bytes.len() as u64, output.size);
    assert!(bytes.starts_with(b"%PDF"));
}

#[test]
fn test_output_missing_from_disk_reports_not_found() {
    let harness = TestHarness::new();
    let pipeline = harness.pipeline();

    let job = pipeline
        .submit_and_wait(&b"vanishing"[..], SubmitRequest::new("gone.txt", "txt"), WAIT)
        .unwrap();
    std::fs::remove_file(job.output_path.unwrap()).unwrap();

    assert_eq!(
        pipeline.result(&job.job_id).unwrap_err().kind(),
        ErrorKind::NotFound
    );
}

#[test]
fn test_explicit_input_format_and_options() {
    let harness = TestHarness::new();
    let converter = UppercaseConverter::default();
    let calls = Arc::clone(&converter.calls);
    harness.register("txt", "csv", converter);
    let pipeline = harness.pipeline();

    // no extension, so the format has to be given
    let request = SubmitRequest::new("export", "CSV")
        .input_format("text/plain")
        .option("suffix", "!");
    let job = pipeline.submit_and_wait(&b"a,b"[..], request, WAIT).unwrap();

    assert_eq!(job.state, JobState::Succeeded);
    assert_eq!(job.input_format.as_str(), "txt");
    assert_eq!(job.download_name(), "export.csv");
    let output = std::fs::read_to_string(pipeline.result(&job.job_id).unwrap()).unwrap();
    assert_eq!(output, "A,B!");
    assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
}

#[test]
fn test_uninferable_input_format_rejected() {
    let harness = TestHarness::new();
    let pipeline = harness.pipeline();

    let err = pipeline
        .submit(&b"data"[..], SubmitRequest::new("README", "pdf"))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
    assert!(harness.upload_files().is_empty());
}

#[test]
fn test_converter_registered_after_startup() {
    let harness = TestHarness::new();
    let pipeline = harness.pipeline();

    let err = pipeline
        .submit(&b"x"[..], SubmitRequest::new("in.txt", "csv"))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnsupportedFormat);

    pipeline
        .registry()
        .register("txt", "csv", Arc::new(UppercaseConverter::default()))
        .unwrap();

    let job = pipeline
        .submit_and_wait(&b"x"[..], SubmitRequest::new("in.txt", "csv"), WAIT)
        .unwrap();
    assert_eq!(job.state, JobState::Succeeded);
}

#[test]
fn test_jobs_listed_newest_first() {
    let harness = TestHarness::new();
    let pipeline = harness.pipeline();

    let first = pipeline
        .submit(&b"one"[..], SubmitRequest::new("one.txt", "txt"))
        .unwrap();
    std::thread::sleep(std::time::Duration::from_millis(5));
    let second = pipeline
        .submit(&b"two"[..], SubmitRequest::new("two.txt", "txt"))
        .unwrap();

    let ids: Vec<String> = pipeline.jobs().into_iter().map(|j| j.job_id).collect();
    assert_eq!(ids, vec![second, first]);
}

#[test]
fn test_statement_converted_to_csv_and_json() {
    let harness = TestHarness::new();
    let pipeline = harness.pipeline();
    let pdf = text_pdf(&harness, STATEMENT);

    let job = pipeline
        .submit_and_wait(&pdf[..], SubmitRequest::new("march.pdf", "csv"), WAIT)
        .unwrap();
    assert_eq!(job.state, JobState::Succeeded, "{:?}", job.failure);

    let output = pipeline.open_result(&job.job_id).unwrap();
    assert_eq!(output.download_name, "march.csv");
    let csv = std::fs::read_to_string(&output.path).unwrap();
    assert_eq!(
        csv,
        "Date,Description,Withdrawal,Deposit,Category,Notes\n\
         01/03/2024,Grocery - Store 7,42.10,,Card,Time/Eff.Date: 01/03/2024\n\
         02/03/2024,Salary,,3000.00,Transfer,Time/Eff.Date: 02/03/2024\n"
    );

    let job = pipeline
        .submit_and_wait(&pdf[..], SubmitRequest::new("march.pdf", "json"), WAIT)
        .unwrap();
    assert_eq!(job.state, JobState::Succeeded, "{:?}", job.failure);
    let json: serde_json::Value =
        serde_json::from_slice(&std::fs::read(pipeline.result(&job.job_id).unwrap()).unwrap())
            .unwrap();
    assert_eq!(json["rows"], 2);
    assert_eq!(json["data"][1]["Deposit"], 3000.0);
}

#[test]
fn test_statement_without_transactions_fails_and_keeps_input() {
    let harness = TestHarness::new();
    let pipeline = harness.pipeline();
    let pdf = text_pdf(&harness, "Account statement\nNo activity this period\n");

    let job = pipeline
        .submit_and_wait(&pdf[..], SubmitRequest::new("empty.pdf", "csv"), WAIT)
        .unwrap();

    assert_eq!(job.state, JobState::Failed);
    let failure = job.failure.unwrap();
    assert_eq!(failure.kind, ErrorKind::Conversion);
    assert!(failure.message.contains("no transaction table"));
    assert!(job.input_path.unwrap().exists());
    assert!(harness.output_files().is_empty());
}
