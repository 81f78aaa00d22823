use std::collections::BTreeMap;

use proptest::prelude::*;
use tokio::io::AsyncReadExt;

use agentpipe::config::parse_custom_env;
use agentpipe::exec::{LineReformatter, OutputCapture, relay_stdout};

// A stdout line: stream-JSON, plain text, or blank.
fn line_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        ("[a-z]{1,8}", "[ -~]{0,16}").prop_map(|(k, v)| {
            serde_json::json!({ "type": k, "text": v }).to_string()
        }),
        "[ -~é✓]{0,24}",
        Just(String::new()),
    ]
}

fn output_strategy() -> impl Strategy<Value = (Vec<u8>, Vec<usize>)> {
    (
        proptest::collection::vec(line_strategy(), 0..12),
        any::<bool>(),
        proptest::collection::vec(any::<usize>(), 0..8),
    )
        .prop_map(|(lines, trailing_newline, cuts)| {
            let mut text = lines.join("\n");
            if trailing_newline {
                text.push('\n');
            }
            (text.into_bytes(), cuts)
        })
}

/// Split `bytes` at the (sorted, bounded) cut positions.
fn chunk(bytes: &[u8], cuts: &[usize]) -> Vec<Vec<u8>> {
    let mut points: Vec<usize> = cuts
        .iter()
        .map(|c| if bytes.is_empty() { 0 } else { c % bytes.len() })
        .collect();
    points.sort_unstable();
    points.dedup();

    let mut chunks = Vec::new();
    let mut start = 0;
    for p in points {
        chunks.push(bytes[start..p].to_vec());
        start = p;
    }
    chunks.push(bytes[start..].to_vec());
    chunks
}

fn render(chunks: &[Vec<u8>]) -> String {
    let mut formatter = LineReformatter::default();
    let mut out = String::new();
    for c in chunks {
        out.push_str(&formatter.push(c));
    }
    out.push_str(&formatter.finish());
    out
}

proptest! {
    #[test]
    fn env_keys_are_trimmed_and_last_write_wins(
        pairs in proptest::collection::vec(("[ A-Z_]{0,6}", "[ -~]{0,10}"), 0..10)
    ) {
        let block: String = pairs
            .iter()
            .map(|(k, v)| format!("{k}:{v}\n"))
            .collect();

        let parsed = parse_custom_env(Some(&block));

        let mut expected = BTreeMap::new();
        for (k, v) in &pairs {
            let line = format!("{k}:{v}");
            let line = line.trim();
            if line.starts_with('#') {
                continue;
            }
            if let Some((key, value)) = line.split_once(':') {
                let key = key.trim();
                if !key.is_empty() {
                    expected.insert(key.to_string(), value.trim().to_string());
                }
            }
        }

        for key in parsed.keys() {
            prop_assert!(!key.is_empty());
            prop_assert_eq!(key.trim(), key.as_str());
        }
        prop_assert_eq!(parsed, expected);
    }

    #[test]
    fn rendering_does_not_depend_on_chunking((bytes, cuts) in output_strategy()) {
        let whole = render(&[bytes.clone()]);
        let split = render(&chunk(&bytes, &cuts));
        prop_assert_eq!(whole, split);
    }

    #[test]
    fn capture_is_byte_exact((bytes, cuts) in output_strategy()) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        let chunks = chunk(&bytes, &cuts);
        let captured = rt.block_on(async {
            // Chain the chunks into a single reader with chunk-sized reads.
            let mut reader: Box<dyn tokio::io::AsyncRead + Unpin> = Box::new(tokio::io::empty());
            for c in chunks {
                reader = Box::new(reader.chain(std::io::Cursor::new(c)));
            }

            let capture = OutputCapture::default();
            let mut console = tokio::io::sink();
            relay_stdout(reader, &mut console, &capture).await.unwrap();
            capture.snapshot()
        });

        prop_assert_eq!(captured, bytes);
    }
}
