use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeSet, fmt::Display, str::FromStr};

use super::MovieId;

/// Release dates are written as `DD-Mon-YYYY` (e.g. `01-Jan-1995`)
pub const RELEASE_DATE_FORMAT: &str = "%d-%b-%Y";

/// Movie genre
///
/// Variants are declared in MovieLens column order, which `Genre::ALL`
/// relies on when decoding the genre flag columns of `u.item`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Genre {
    Unknown,
    Action,
    Adventure,
    Animation,
    Children,
    Comedy,
    Crime,
    Documentary,
    Drama,
    Fantasy,
    #[serde(alias = "film-noir")]
    FilmNoir,
    Horror,
    Musical,
    Mystery,
    Romance,
    #[serde(alias = "sci-fi")]
    SciFi,
    Thriller,
    War,
    Western,
}

impl Genre {
    pub const ALL: [Genre; 19] = [
        Genre::Unknown,
        Genre::Action,
        Genre::Adventure,
        Genre::Animation,
        Genre::Children,
        Genre::Comedy,
        Genre::Crime,
        Genre::Documentary,
        Genre::Drama,
        Genre::Fantasy,
        Genre::FilmNoir,
        Genre::Horror,
        Genre::Musical,
        Genre::Mystery,
        Genre::Romance,
        Genre::SciFi,
        Genre::Thriller,
        Genre::War,
        Genre::Western,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Genre::Unknown => "unknown",
            Genre::Action => "action",
            Genre::Adventure => "adventure",
            Genre::Animation => "animation",
            Genre::Children => "children",
            Genre::Comedy => "comedy",
            Genre::Crime => "crime",
            Genre::Documentary => "documentary",
            Genre::Drama => "drama",
            Genre::Fantasy => "fantasy",
            Genre::FilmNoir => "filmnoir",
            Genre::Horror => "horror",
            Genre::Musical => "musical",
            Genre::Mystery => "mystery",
            Genre::Romance => "romance",
            Genre::SciFi => "scifi",
            Genre::Thriller => "thriller",
            Genre::War => "war",
            Genre::Western => "western",
        }
    }
}

impl Display for Genre {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Genre {
    type Err = String;

    /// Accepts display names such as "Sci-Fi", "Film-Noir" or "Children's"
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_lowercase())
            .collect();
        let key = if key == "childrens" { "children" } else { key.as_str() };

        Genre::ALL
            .iter()
            .find(|g| g.as_str() == key)
            .copied()
            .ok_or_else(|| format!("unknown genre '{}'", s))
    }
}

/// A movie in the catalog
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Movie {
    pub movie_id: MovieId,
    pub title: String,
    pub release_date: Option<NaiveDate>,
    pub genres: BTreeSet<Genre>,
}

impl Movie {
    pub fn new(movie_id: MovieId, title: impl Into<String>) -> Self {
        Self {
            movie_id,
            title: title.into(),
            release_date: None,
            genres: BTreeSet::new(),
        }
    }

    pub fn with_genre(mut self, genre: Genre) -> Self {
        self.genres.insert(genre);
        self
    }

    pub fn with_release_date(mut self, date: NaiveDate) -> Self {
        self.release_date = Some(date);
        self
    }
}

/// A movie submitted through the API, together with its first rating
#[derive(Debug, Clone, Deserialize)]
pub struct NewMovie {
    pub title: String,
    pub category: Genre,
    pub release_date: String,
    pub rating: f64,
}

impl NewMovie {
    pub fn parsed_release_date(&self) -> Result<NaiveDate, String> {
        NaiveDate::parse_from_str(self.release_date.trim(), RELEASE_DATE_FORMAT).map_err(|_| {
            format!(
                "release date '{}' must look like 01-Jan-2000",
                self.release_date
            )
        })
    }
}

/// Parses a MovieLens-style release date, treating blanks as unknown
pub fn parse_release_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    NaiveDate::parse_from_str(raw, RELEASE_DATE_FORMAT).ok()
}
