//! Integration tests for the batch driver: walk → name → encrypt/decrypt → report.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crpt_batch::{run_batch, BatchOptions, FileWalker, ProgressFn};
use crpt_core::types::{Direction, FileOutcome, FileStatus};
use crpt_crypto::{CipherContext, CorruptionPolicy};
use secrecy::SecretString;
use tempfile::TempDir;

fn context(password: &str) -> Arc<CipherContext> {
    Arc::new(CipherContext::from_password(&SecretString::from(password)))
}

fn write_tree(root: &Path) -> Vec<(PathBuf, Vec<u8>)> {
    let files = vec![
        (root.join("a.txt"), b"alpha".to_vec()),
        (root.join("b.bin"), (0..=255u8).cycle().take(5000).collect()),
        (root.join("empty"), Vec::new()),
        (root.join("nested/c.md"), b"# heading\n\nbody text\n".to_vec()),
    ];
    for (path, data) in &files {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, data).unwrap();
    }
    files
}

fn options(direction: Direction) -> BatchOptions {
    BatchOptions {
        workers: 3,
        ..BatchOptions::new(direction)
    }
}

#[tokio::test]
async fn encrypt_then_decrypt_tree() {
    let tmp = TempDir::new().unwrap();
    let files = write_tree(tmp.path());
    let ctx = context("batch-password");

    let walker = FileWalker::new([tmp.path()]).recursive(true);
    let enc_opts = BatchOptions {
        delete_source: true,
        ..options(Direction::Encrypt)
    };
    let report = run_batch(ctx.clone(), &walker, &enc_opts, None).await.unwrap();

    assert_eq!(report.processed(), 4);
    assert!(report.is_success());
    assert_eq!(report.total_bytes, 5 + 5000 + 21);
    for (path, _) in &files {
        assert!(!path.exists(), "source removed: {}", path.display());
    }

    let report = run_batch(ctx, &walker, &options(Direction::Decrypt), None)
        .await
        .unwrap();

    assert_eq!(report.processed(), 4);
    assert!(report.is_success());
    for (path, data) in &files {
        assert_eq!(&std::fs::read(path).unwrap(), data, "{}", path.display());
    }
}

#[tokio::test]
async fn hidden_names_restore_original_names() {
    let tmp = TempDir::new().unwrap();
    let files = write_tree(tmp.path());
    let ctx = context("hide");

    let walker = FileWalker::new([tmp.path()]).recursive(true);
    let enc_opts = BatchOptions {
        hide_names: true,
        delete_source: true,
        ..options(Direction::Encrypt)
    };
    let report = run_batch(ctx.clone(), &walker, &enc_opts, None).await.unwrap();
    assert!(report.is_success());

    for outcome in &report.outcomes {
        let name = outcome.output.as_ref().unwrap().file_name().unwrap().to_string_lossy().into_owned();
        assert_eq!(name.len(), 32 + ".crpt".len(), "{name}");
        assert!(name.ends_with(".crpt"));
        assert!(!name.contains("a.txt"));
    }

    let report = run_batch(ctx, &walker, &options(Direction::Decrypt), None)
        .await
        .unwrap();
    assert!(report.is_success());
    for (path, data) in &files {
        assert_eq!(&std::fs::read(path).unwrap(), data);
    }
}

#[tokio::test]
async fn existing_outputs_are_skipped_unless_overwrite() {
    let tmp = TempDir::new().unwrap();
    let src = tmp.path().join("doc.txt");
    std::fs::write(&src, b"version one").unwrap();
    let out = tmp.path().join("doc.txt.crpt");
    std::fs::write(&out, b"placeholder").unwrap();
    let ctx = context("pw");

    let walker = FileWalker::new([&src]);
    let report = run_batch(ctx.clone(), &walker, &options(Direction::Encrypt), None)
        .await
        .unwrap();
    assert_eq!(report.skipped(), 1);
    assert_eq!(report.outcomes[0].status, FileStatus::Skipped);
    assert_eq!(std::fs::read(&out).unwrap(), b"placeholder");

    let overwrite = BatchOptions {
        overwrite: true,
        ..options(Direction::Encrypt)
    };
    let report = run_batch(ctx, &walker, &overwrite, None).await.unwrap();
    assert_eq!(report.processed(), 1);
    assert_ne!(std::fs::read(&out).unwrap(), b"placeholder");
}

#[tokio::test]
async fn wrong_password_fails_every_file() {
    let tmp = TempDir::new().unwrap();
    write_tree(tmp.path());
    let walker = FileWalker::new([tmp.path()]).recursive(true);

    let enc_opts = BatchOptions {
        delete_source: true,
        ..options(Direction::Encrypt)
    };
    run_batch(context("right"), &walker, &enc_opts, None)
        .await
        .unwrap();

    let report = run_batch(context("wrong"), &walker, &options(Direction::Decrypt), None)
        .await
        .unwrap();

    assert_eq!(report.failed(), 4);
    assert!(!report.is_success());
    for outcome in &report.outcomes {
        assert!(outcome.output.is_none());
        assert!(outcome.error.as_deref().unwrap().contains("wrong password"));
        assert!(outcome.source.exists(), "failed files keep their source");
    }
    assert!(!tmp.path().join("a.txt").exists());
}

#[tokio::test]
async fn listing_errors_do_not_stop_the_batch() {
    let tmp = TempDir::new().unwrap();
    let present = tmp.path().join("present.txt");
    std::fs::write(&present, b"here").unwrap();

    let walker = FileWalker::new([tmp.path().join("missing.txt"), present.clone()]);
    let report = run_batch(context("pw"), &walker, &options(Direction::Encrypt), None)
        .await
        .unwrap();

    assert_eq!(report.outcomes.len(), 2);
    assert_eq!(report.outcomes[0].status, FileStatus::Failed);
    assert_eq!(report.outcomes[0].source, tmp.path().join("missing.txt"));
    assert_eq!(report.outcomes[1].status, FileStatus::Done);
    assert_eq!(report.outcomes[1].source, present);
}

#[tokio::test]
async fn corrupt_output_kept_or_discarded() {
    let tmp = TempDir::new().unwrap();
    let src = tmp.path().join("data.bin");
    std::fs::write(&src, vec![7u8; 64]).unwrap();
    let ctx = context("pw");

    let report = run_batch(
        ctx.clone(),
        &FileWalker::new([&src]),
        &options(Direction::Encrypt),
        None,
    )
    .await
    .unwrap();
    let enc = report.outcomes[0].output.clone().unwrap();
    std::fs::remove_file(&src).unwrap();

    let mut raw = std::fs::read(&enc).unwrap();
    let last = raw.len() - 1;
    raw[last] ^= 0x80;
    std::fs::write(&enc, &raw).unwrap();

    let walker = FileWalker::new([&enc]);
    let report = run_batch(ctx.clone(), &walker, &options(Direction::Decrypt), None)
        .await
        .unwrap();
    assert_eq!(report.failed(), 1);
    assert!(!src.exists());

    let keep = BatchOptions {
        corruption: CorruptionPolicy::Keep,
        delete_source: true,
        ..options(Direction::Decrypt)
    };
    let report = run_batch(ctx, &walker, &keep, None).await.unwrap();
    assert_eq!(report.outcomes[0].status, FileStatus::CorruptKept);
    assert_eq!(report.processed(), 1);
    assert_eq!(std::fs::read(&src).unwrap().len(), 64);
    assert!(enc.exists(), "corrupt results never delete the source");
}

#[tokio::test]
async fn outcomes_follow_input_order_and_report_progress() {
    let tmp = TempDir::new().unwrap();
    let paths: Vec<PathBuf> = (0..20)
        .map(|i| {
            let path = tmp.path().join(format!("f{i:02}.txt"));
            std::fs::write(&path, vec![i as u8; i * 100]).unwrap();
            path
        })
        .collect();

    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let progress: ProgressFn = Box::new(move |_: &FileOutcome| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let opts = BatchOptions {
        workers: 4,
        ..BatchOptions::new(Direction::Encrypt)
    };
    let report = run_batch(context("pw"), &FileWalker::new(&paths), &opts, Some(&progress))
        .await
        .unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 20);
    let sources: Vec<&PathBuf> = report.outcomes.iter().map(|o| &o.source).collect();
    assert_eq!(sources, paths.iter().collect::<Vec<_>>());
    assert_eq!(report.total_bytes, (0..20u64).map(|i| i * 100).sum::<u64>());
}
