//! Test fixtures for generating test data.

use bytes::Bytes;
use folio_core::DocumentId;
use folio_storage::ByteStream;
use futures::StreamExt;
use std::sync::atomic::{AtomicU64, Ordering};

static DOCUMENT_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Generate deterministic test data based on a seed.
pub fn seeded_bytes(seed: u64, len: usize) -> Bytes {
    let mut data = vec![0u8; len];
    let mut state = seed;

    for chunk in data.chunks_mut(8) {
        // Simple LCG for deterministic data
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
        let bytes = state.to_le_bytes();
        for (i, byte) in chunk.iter_mut().enumerate() {
            *byte = bytes[i % 8];
        }
    }

    Bytes::from(data)
}

/// Parse a document ID, panicking on invalid input.
#[allow(dead_code)]
pub fn doc(id: &str) -> DocumentId {
    DocumentId::new(id).expect("valid document id")
}

/// A document ID not used by any other test in this process.
#[allow(dead_code)]
pub fn unique_doc(prefix: &str) -> DocumentId {
    let n = DOCUMENT_COUNTER.fetch_add(1, Ordering::Relaxed);
    doc(&format!("{prefix}-{n}"))
}

/// Drain a content stream into memory.
#[allow(dead_code)]
pub async fn collect_stream(mut stream: ByteStream) -> Vec<u8> {
    let mut out = Vec::new();
    while let Some(chunk) = stream.next().await {
        out.extend_from_slice(&chunk.expect("stream chunk"));
    }
    out
}
