use std::collections::HashMap;

use crate::models::{Movie, MovieId};

/// Normalizes a title for lookup: trimmed and lowercased
pub fn title_key(title: &str) -> String {
    title.trim().to_lowercase()
}

/// Title and id lookups over the loaded movies
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    by_id: HashMap<MovieId, Movie>,
    by_title: HashMap<String, MovieId>,
}

impl Catalog {
    /// Builds the lookups. When several movies share a title, the lowest id
    /// owns it so that lookups do not depend on load order.
    pub fn new(movies: Vec<Movie>) -> Self {
        let mut by_id = HashMap::with_capacity(movies.len());
        let mut by_title: HashMap<String, MovieId> = HashMap::with_capacity(movies.len());

        for movie in movies {
            by_title
                .entry(title_key(&movie.title))
                .and_modify(|id| *id = (*id).min(movie.movie_id))
                .or_insert(movie.movie_id);
            by_id.insert(movie.movie_id, movie);
        }

        Self { by_id, by_title }
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub fn resolve_title(&self, title: &str) -> Option<MovieId> {
        self.by_title.get(&title_key(title)).copied()
    }

    pub fn get(&self, movie_id: MovieId) -> Option<&Movie> {
        self.by_id.get(&movie_id)
    }

    /// Display titles sorted case-insensitively, duplicates removed
    pub fn titles(&self) -> Vec<String> {
        let mut titles: Vec<String> = self
            .by_title
            .values()
            .filter_map(|id| self.by_id.get(id))
            .map(|movie| movie.title.clone())
            .collect();
        titles.sort_by_key(|title| title_key(title));
        titles
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_title_ignores_case_and_whitespace() {
        let catalog = Catalog::new(vec![Movie::new(1, "Toy Story (1995)")]);
        assert_eq!(catalog.resolve_title("toy story (1995)"), Some(1));
        assert_eq!(catalog.resolve_title("  TOY STORY (1995) "), Some(1));
        assert_eq!(catalog.resolve_title("Toy Story 2"), None);
    }

    #[test]
    fn test_duplicate_titles_resolve_to_lowest_id() {
        let catalog = Catalog::new(vec![
            Movie::new(670, "Chasing Amy (1997)"),
            Movie::new(246, "Chasing Amy (1997)"),
        ]);
        assert_eq!(catalog.resolve_title("Chasing Amy (1997)"), Some(246));
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.titles(), vec!["Chasing Amy (1997)".to_string()]);
    }

    #[test]
    fn test_titles_sorted() {
        let catalog = Catalog::new(vec![
            Movie::new(3, "heat (1995)"),
            Movie::new(1, "Casino (1995)"),
            Movie::new(2, "Babe (1995)"),
        ]);
        assert_eq!(
            catalog.titles(),
            vec!["Babe (1995)", "Casino (1995)", "heat (1995)"]
        );
    }
}
