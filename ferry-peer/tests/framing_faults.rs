//! A framed connection survives lines it cannot decode and replies it
//! cannot frame. Each fault fails at most the call it belongs to.

use std::sync::Arc;
use std::time::Duration;

use ferry_peer::{
    init_test_logging, Builtin, Function, Protocol, ProtocolConfig, RemoteProtocol, RpcError,
    Value,
};
use serde_json::{json, Value as JsonValue};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, Lines, ReadHalf, WriteHalf};

/// The far end of a framed importer, driven by hand.
struct RawPeer {
    lines: Lines<BufReader<ReadHalf<DuplexStream>>>,
    writer: WriteHalf<DuplexStream>,
}

impl RawPeer {
    async fn read(&mut self) -> JsonValue {
        let line = self.lines.next_line().await.unwrap().expect("peer closed");
        serde_json::from_str(&line).unwrap()
    }

    async fn write(&mut self, line: &str) {
        self.writer.write_all(line.as_bytes()).await.unwrap();
        self.writer.write_all(b"\n").await.unwrap();
    }
}

fn importer_with_raw_peer() -> (Arc<RemoteProtocol>, RawPeer) {
    init_test_logging();
    let (left, right) = tokio::io::duplex(64 * 1024);
    let importer = RemoteProtocol::framed(right, ProtocolConfig::default().with_name("importer"));
    let (reader, writer) = tokio::io::split(left);
    let raw = RawPeer {
        lines: BufReader::new(reader).lines(),
        writer,
    };
    (Arc::new(importer), raw)
}

fn spawn_remote_keys(
    importer: &Arc<RemoteProtocol>,
) -> tokio::task::JoinHandle<Result<Vec<String>, RpcError>> {
    let importer = Arc::clone(importer);
    tokio::spawn(async move { importer.remote_keys().await })
}

#[tokio::test]
async fn test_undecodable_line_does_not_close_connection() {
    let (importer, mut raw) = importer_with_raw_peer();
    let keys = spawn_remote_keys(&importer);

    let request = raw.read().await;
    assert_eq!(request[0], "get_export_names");
    let id = request[1].as_u64().unwrap();

    raw.write(&format!(r#"["teleport", {}]"#, id)).await;
    raw.write(&format!(r#"["finished", {}, ["tuple", ["a"]]]"#, id)).await;

    assert_eq!(keys.await.unwrap().unwrap(), vec!["a".to_string()]);
    assert!(!importer.is_closed());
    assert_eq!(importer.pending_calls(), 0);

    // The unknown request was answered with a failure naming its id.
    let answer = raw.read().await;
    assert_eq!(answer[0], "failed");
    assert_eq!(answer[1], json!(id));
}

#[tokio::test]
async fn test_undecodable_reply_fails_only_its_call() {
    let (importer, mut raw) = importer_with_raw_peer();

    let bad_replies = [
        r#"["failed", {id}, "NoSuchError", []]"#,
        r#"["finished", {id}, ["long", "340282366920938463463374607431768211456"]]"#,
        r#"["finished", {id}, ["martian", 1]]"#,
    ];
    for bad in bad_replies {
        let keys = spawn_remote_keys(&importer);
        let id = raw.read().await[1].as_u64().unwrap();
        raw.write(&bad.replace("{id}", &id.to_string())).await;

        let err = keys.await.unwrap().unwrap_err();
        assert!(err.is_a(Builtin::ProtocolError), "{}: {}", bad, err);
        assert!(!importer.is_closed());
        assert_eq!(importer.pending_calls(), 0);
    }

    // Unreadable junk names no call at all.
    raw.write("{not json").await;
    let keys = spawn_remote_keys(&importer);
    let id = raw.read().await[1].as_u64().unwrap();
    raw.write(&format!(r#"["finished", {}, ["tuple", []]]"#, id)).await;
    assert!(keys.await.unwrap().unwrap().is_empty());
}

#[tokio::test]
async fn test_oversized_result_fails_the_call() {
    init_test_logging();
    let (left, right) = tokio::io::duplex(64 * 1024);
    let exporter = RemoteProtocol::framed(left, ProtocolConfig::default().with_name("exporter"));
    let importer = RemoteProtocol::framed(right, ProtocolConfig::default().with_name("importer"));
    exporter.export(
        "big",
        Value::from(Function::sync("big", |_| Ok(Value::Str("x".repeat(2 * 1024 * 1024))))),
    );
    exporter.export(
        "small",
        Value::from(Function::sync("small", |_| Ok(Value::Str("x".into())))),
    );

    let big = importer.get_remote("big").await.unwrap();
    let err = tokio::time::timeout(Duration::from_secs(10), big.call(()))
        .await
        .expect("oversized reply left the caller waiting")
        .unwrap_err();
    assert!(err.is_a(Builtin::ProtocolError), "{}", err);
    assert_eq!(importer.pending_calls(), 0);
    assert!(!importer.is_closed());

    let small = importer.get_remote("small").await.unwrap();
    assert_eq!(small.call(()).await.unwrap(), Value::Str("x".into()));
}
