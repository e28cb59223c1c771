//! Embedding comparison

/// Little-endian `f32` bytes, as stored in `facial_data.encoding`
pub fn encode_embedding(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|v| v.to_le_bytes()).collect()
}

pub fn decode_embedding(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Distance between two embeddings; `None` when their lengths differ
pub fn euclidean_distance(a: &[f32], b: &[f32]) -> Option<f32> {
    if a.len() != b.len() {
        return None;
    }
    let sum: f32 = a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum();
    Some(sum.sqrt())
}

/// The candidate closest to `probe`, if it is strictly under `threshold`
pub fn nearest_match<'a, K>(
    probe: &[f32],
    candidates: &'a [(K, Vec<f32>)],
    threshold: f32,
) -> Option<(&'a K, f32)> {
    candidates
        .iter()
        .filter_map(|(key, stored)| euclidean_distance(probe, stored).map(|d| (key, d)))
        .filter(|(_, distance)| *distance < threshold)
        .min_by(|a, b| a.1.total_cmp(&b.1))
}
