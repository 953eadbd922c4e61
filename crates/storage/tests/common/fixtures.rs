use bytes::Bytes;
use folio_core::DocumentId;
use folio_storage::ContentStore;
use futures::TryStreamExt;

/// Generate deterministic test data using a seeded pseudo-random generator
/// Same seed produces same output (reproducible tests)
#[allow(dead_code)]
pub fn seeded_bytes(seed: u64, len: usize) -> Bytes {
    let mut data = vec![0u8; len];
    let mut state = seed;

    // Simple LCG (Linear Congruential Generator)
    for chunk in data.chunks_mut(8) {
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
        let bytes = state.to_le_bytes();
        for (i, byte) in chunk.iter_mut().enumerate() {
            *byte = bytes[i % 8];
        }
    }

    Bytes::from(data)
}

#[allow(dead_code)]
pub fn doc(id: &str) -> DocumentId {
    DocumentId::new(id).unwrap()
}

/// Read a version's full content into memory.
#[allow(dead_code)]
pub async fn read_to_vec(store: &dyn ContentStore, id: &DocumentId, version: i64) -> Vec<u8> {
    let chunks: Vec<Bytes> = store
        .read(id, version)
        .await
        .unwrap()
        .try_collect()
        .await
        .unwrap();
    chunks.concat()
}
