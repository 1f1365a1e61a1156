//! BM25F scoring: a field-weighted extension of BM25. Absolute score
//! values are implementation-defined; only their relative ordering and
//! stability within a run matter.

#[derive(Debug, Clone, Copy)]
pub struct Bm25Params {
    pub k1: f64,
    pub b: f64,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self { k1: 1.2, b: 0.75 }
    }
}

/// Inverse document frequency, Robertson-Spärck Jones form (floored at a
/// small positive value so a term present in every document still
/// contributes rather than zeroing out the whole score).
pub fn idf(doc_count: usize, doc_freq: usize) -> f64 {
    let n = doc_count as f64;
    let df = doc_freq as f64;
    (((n - df + 0.5) / (df + 0.5)) + 1.0).ln().max(1e-6)
}

/// Length-normalized, saturating term-frequency contribution for one
/// field, scaled by that field's weight.
pub fn field_term_score(tf: u32, field_len: u32, avg_field_len: f64, weight: f64, params: Bm25Params) -> f64 {
    if tf == 0 {
        return 0.0;
    }
    let tf = tf as f64;
    let field_len = field_len as f64;
    let avg = avg_field_len.max(1.0);
    let norm = params.k1 * (1.0 - params.b + params.b * (field_len / avg));
    weight * ((tf * (params.k1 + 1.0)) / (tf + norm))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn higher_weight_yields_higher_score_for_identical_stats() {
        let params = Bm25Params::default();
        let title = field_term_score(2, 5, 5.0, 2.0, params);
        let body = field_term_score(2, 5, 5.0, 1.0, params);
        assert!(title > body);
    }

    #[test]
    fn idf_decreases_as_document_frequency_rises() {
        let rare = idf(1000, 1);
        let common = idf(1000, 500);
        assert!(rare > common);
    }

    #[test]
    fn zero_term_frequency_contributes_nothing() {
        assert_eq!(field_term_score(0, 5, 5.0, 2.0, Bm25Params::default()), 0.0);
    }
}
