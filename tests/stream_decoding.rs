use proptest::prelude::*;

use runwarden::exec::{ManagedOperation, RegisterOptions, TextEncoding};
use runwarden::kill::KillStrategy;
use runwarden::registry::OperationRegistry;
use runwarden_test_utils::{CompletionProbe, FakeProcess, RecordingKill, with_timeout};
use std::sync::Arc;

/// Split `bytes` at the given (unsorted, possibly repeated) cut points.
fn chunked(bytes: &[u8], cuts: &[usize]) -> Vec<Vec<u8>> {
    let mut points: Vec<usize> = cuts
        .iter()
        .map(|c| if bytes.is_empty() { 0 } else { c % (bytes.len() + 1) })
        .collect();
    points.push(0);
    points.push(bytes.len());
    points.sort_unstable();
    points.dedup();
    points.windows(2).map(|w| bytes[w[0]..w[1]].to_vec()).collect()
}

#[test]
fn multibyte_character_split_across_chunks() {
    let mut decoder = TextEncoding::utf8().decoder();
    let snowman = "☃".as_bytes();

    decoder.push(&snowman[..1]);
    assert_eq!(decoder.text(), "");
    decoder.push(&snowman[1..]);
    assert_eq!(decoder.text(), "☃");
    assert_eq!(decoder.finish(), "☃");
}

#[test]
fn push_after_finish_is_ignored() {
    let mut decoder = TextEncoding::utf8().decoder();
    decoder.push(b"done");
    assert_eq!(decoder.finish(), "done");

    decoder.push(b"late");
    assert_eq!(decoder.finish(), "");
}

#[test]
fn truncated_sequence_is_replaced_on_finish() {
    let mut decoder = TextEncoding::utf8().decoder();
    decoder.push(b"ok");
    decoder.push(&"é".as_bytes()[..1]);
    assert_eq!(decoder.finish(), "ok\u{FFFD}");
}

#[test]
fn encoding_labels_resolve_like_whatwg() {
    assert_eq!(TextEncoding::for_label("UTF8").map(|e| e.name()), Some("UTF-8"));
    assert_eq!(TextEncoding::for_label(" latin1 ").map(|e| e.name()), Some("windows-1252"));
    assert_eq!(TextEncoding::for_label("sjis").map(|e| e.name()), Some("Shift_JIS"));
    assert!(TextEncoding::for_label("klingon").is_none());
    assert_eq!(TextEncoding::for_label_or_utf8("klingon"), TextEncoding::utf8());
    assert_eq!(TextEncoding::default(), TextEncoding::utf8());
}

#[test]
fn shift_jis_is_decoded_across_chunks() {
    let (bytes, _, _) = encoding_rs::SHIFT_JIS.encode("日本語");
    let encoding = TextEncoding::for_label("shift_jis").expect("known label");
    let mut decoder = encoding.decoder();
    for byte in bytes.iter() {
        decoder.push(std::slice::from_ref(byte));
    }
    assert_eq!(decoder.finish(), "日本語");
}

proptest! {
    #[test]
    fn chunking_never_changes_decoded_text(
        bytes in proptest::collection::vec(any::<u8>(), 0..256),
        cuts in proptest::collection::vec(any::<usize>(), 0..16),
    ) {
        let mut whole = TextEncoding::utf8().decoder();
        whole.push(&bytes);
        let expected = whole.finish();

        let mut pieces = TextEncoding::utf8().decoder();
        for chunk in chunked(&bytes, &cuts) {
            pieces.push(&chunk);
        }
        prop_assert_eq!(pieces.finish(), expected);
    }

    #[test]
    fn valid_utf8_round_trips(text in any::<String>(), cuts in proptest::collection::vec(any::<usize>(), 0..16)) {
        let mut decoder = TextEncoding::utf8().decoder();
        for chunk in chunked(text.as_bytes(), &cuts) {
            decoder.push(&chunk);
        }
        prop_assert_eq!(decoder.finish(), text);
    }

    #[test]
    fn output_callbacks_preserve_arrival_order(
        chunks in proptest::collection::vec("[a-z0-9]{1,8}", 1..32),
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("test runtime");

        let delivered = runtime.block_on(async {
            let registry = Arc::new(OperationRegistry::default());
            let kill: Arc<dyn KillStrategy> = Arc::new(RecordingKill::new());
            let probe = CompletionProbe::new();
            let (handle, process) = FakeProcess::new(Some(1));

            ManagedOperation::register(
                &registry,
                &kill,
                RegisterOptions::new("ordered", handle).callbacks(probe.callbacks()),
            );
            for chunk in &chunks {
                process.stdout(chunk.as_bytes()).await.expect("operation listening");
            }
            process.exit(0).await.expect("operation listening");
            with_timeout(probe.wait_for_completion()).await;
            probe.stdout()
        });

        prop_assert_eq!(delivered, chunks.concat());
    }
}
