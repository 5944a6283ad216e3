use crate::{
    error::{AppError, AppResult},
    models::{MovieId, Recommendation},
    services::{catalog::Catalog, similarity::SimilarityMatrix},
};

/// Finds the `top_n` movies most similar to `title`.
///
/// Candidates are ordered by similarity descending, then by movie id
/// ascending, so equal scores always come back in the same order. The
/// queried movie is never part of the result, nor are similarity rows that
/// have no catalog entry.
pub fn recommend(
    title: &str,
    catalog: &Catalog,
    similarity: &SimilarityMatrix,
    top_n: usize,
) -> AppResult<Vec<Recommendation>> {
    let movie_id = catalog
        .resolve_title(title)
        .ok_or_else(|| AppError::NotFound(format!("unknown title: {}", title.trim())))?;

    let row = similarity
        .row(movie_id)
        .ok_or_else(|| AppError::NotFound(format!("no similarity data: {}", title.trim())))?;

    let mut candidates: Vec<(MovieId, f64)> = row.filter(|(id, _)| *id != movie_id).collect();
    candidates.sort_by(|(id_a, score_a), (id_b, score_b)| {
        score_b.total_cmp(score_a).then_with(|| id_a.cmp(id_b))
    });

    let recommendations = candidates
        .into_iter()
        .filter_map(|(id, score)| {
            catalog.get(id).map(|movie| Recommendation {
                movie_id: id,
                title: movie.title.clone(),
                score,
            })
        })
        .take(top_n)
        .collect();

    Ok(recommendations)
}
