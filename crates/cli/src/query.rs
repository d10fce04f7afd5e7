//! The word-count query template in both placeholder styles.

use wharf_warehouse::{QueryParameter, ScalarType};

/// Build the word-count SQL template and its bindings.
///
/// With `named` the template uses `@corpus` / `@min_word_count`; otherwise
/// two `?` markers bound in order. The two styles are never mixed.
pub fn word_count_query(
    table: &str,
    corpus: &str,
    min_word_count: i64,
    named: bool,
) -> (String, Vec<QueryParameter>) {
    if named {
        let sql = format!(
            "SELECT word, word_count FROM `{table}` \
             WHERE corpus = @corpus AND word_count >= @min_word_count \
             ORDER BY word_count DESC"
        );
        let params = vec![
            QueryParameter::named("corpus", ScalarType::String, corpus),
            QueryParameter::named("min_word_count", ScalarType::Int64, min_word_count),
        ];
        (sql, params)
    } else {
        let sql = format!(
            "SELECT word, word_count FROM `{table}` \
             WHERE corpus = ? AND word_count >= ? \
             ORDER BY word_count DESC"
        );
        let params = vec![
            QueryParameter::positional(ScalarType::String, corpus),
            QueryParameter::positional(ScalarType::Int64, min_word_count),
        ];
        (sql, params)
    }
}
