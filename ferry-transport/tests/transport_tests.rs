// Both transports behind the trait object the dispatcher uses.

use ferry_core::{CallId, Message};
use ferry_transport::{FramedTransport, MemoryTransport, Transport};
use std::collections::HashSet;
use std::sync::Arc;

fn memory_pair() -> (Arc<dyn Transport>, Arc<dyn Transport>) {
    let (a, b) = MemoryTransport::pair();
    (Arc::new(a), Arc::new(b))
}

fn framed_pair() -> (Arc<dyn Transport>, Arc<dyn Transport>) {
    let (left, right) = tokio::io::duplex(64 * 1024);
    (
        Arc::new(FramedTransport::from_stream(left, 1024 * 1024)),
        Arc::new(FramedTransport::from_stream(right, 1024 * 1024)),
    )
}

async fn concurrent_pushes_all_arrive(a: Arc<dyn Transport>, b: Arc<dyn Transport>) {
    let mut tasks = Vec::new();
    for i in 1..=50u64 {
        let a = a.clone();
        tasks.push(tokio::spawn(async move {
            a.push(Message::GetExportNames { id: CallId::new(i) }).await
        }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let mut seen = HashSet::new();
    for _ in 0..50 {
        let msg = b.pop().await.unwrap().unwrap();
        assert!(seen.insert(msg.id()));
    }
    assert_eq!(seen.len(), 50);
}

#[tokio::test]
async fn test_memory_concurrent_pushes() {
    let (a, b) = memory_pair();
    concurrent_pushes_all_arrive(a, b).await;
}

#[tokio::test]
async fn test_framed_concurrent_pushes() {
    let (a, b) = framed_pair();
    concurrent_pushes_all_arrive(a, b).await;
}

#[tokio::test]
async fn test_close_is_seen_by_peer() {
    for (a, b) in [memory_pair(), framed_pair()] {
        a.close().await.unwrap();
        assert!(b.pop().await.unwrap().is_none());
    }
}

mod framing {
    use bytes::BytesMut;
    use ferry_core::{CallId, Message};
    use ferry_transport::NewlineDelimitedCodec;
    use proptest::prelude::*;
    use tokio_util::codec::{Decoder, Encoder};

    proptest! {
        // Names with embedded newlines still make exactly one frame each.
        #[test]
        fn any_name_is_one_frame(names in prop::collection::vec(".*", 1..8)) {
            let mut codec = NewlineDelimitedCodec::new();
            let mut buf = BytesMut::new();
            for (i, name) in names.iter().enumerate() {
                let msg = Message::GetExport { id: CallId::new(i as u64 + 1), name: name.clone() };
                codec.encode(msg, &mut buf).unwrap();
            }
            prop_assert_eq!(buf.iter().filter(|&&b| b == b'\n').count(), names.len());

            for (i, name) in names.iter().enumerate() {
                match codec.decode(&mut buf).unwrap() {
                    Some(Ok(Message::GetExport { id, name: decoded })) => {
                        prop_assert_eq!(id, CallId::new(i as u64 + 1));
                        prop_assert_eq!(&decoded, name);
                    }
                    other => prop_assert!(false, "unexpected frame {:?}", other),
                }
            }
            prop_assert!(codec.decode(&mut buf).unwrap().is_none());
        }
    }
}
