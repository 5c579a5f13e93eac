//! Post-processing of raw nearest-neighbor candidates.

use std::collections::HashSet;

use crate::schema::SearchHit;

/// Drop candidates scoring below `min_score`. Order is preserved.
pub fn filter_min_score(hits: Vec<SearchHit>, min_score: f32) -> Vec<SearchHit> {
    hits.into_iter()
        .filter(|h| h.similarity >= min_score)
        .collect()
}

/// Keep the first (best) hit for each distinct URL, up to `top_k` hits.
///
/// `hits` must already be ordered most similar first.
pub fn diversify(hits: Vec<SearchHit>, top_k: usize) -> Vec<SearchHit> {
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(top_k.min(hits.len()));
    for hit in hits {
        if out.len() >= top_k {
            break;
        }
        if seen.insert(hit.record.url.clone()) {
            out.push(hit);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use {super::*, crate::schema::ChunkRecord, rstest::rstest};

    fn hit(url: &str, index: usize, similarity: f32) -> SearchHit {
        SearchHit {
            record: ChunkRecord {
                id: format!("{url}_{index}"),
                parent_id: url.into(),
                url: url.into(),
                title: String::new(),
                summary: String::new(),
                content: String::new(),
                engagement_score: 1.0,
                timestamp: 0,
                chunk_index: index,
                total_chunks: 3,
            },
            similarity,
        }
    }

    fn ranked() -> Vec<SearchHit> {
        vec![
            hit("a", 0, 0.9),
            hit("a", 1, 0.8),
            hit("b", 0, 0.7),
            hit("a", 2, 0.6),
            hit("c", 0, 0.5),
            hit("b", 1, 0.4),
        ]
    }

    #[test]
    fn keeps_best_chunk_per_url() {
        let out = diversify(ranked(), 10);
        let ids: Vec<&str> = out.iter().map(|h| h.record.id.as_str()).collect();
        assert_eq!(ids, vec!["a_0", "b_0", "c_0"]);
    }

    #[rstest]
    #[case(1, 1)]
    #[case(2, 2)]
    #[case(3, 3)]
    #[case(10, 3)]
    #[case(0, 0)]
    fn count_is_min_of_top_k_and_distinct_urls(#[case] top_k: usize, #[case] expected: usize) {
        assert_eq!(diversify(ranked(), top_k).len(), expected);
    }

    #[test]
    fn min_score_drops_weak_candidates_before_dedup() {
        let filtered = filter_min_score(ranked(), 0.65);
        let out = diversify(filtered, 10);
        let urls: Vec<&str> = out.iter().map(|h| h.record.url.as_str()).collect();
        assert_eq!(urls, vec!["a", "b"]);
    }
}
