//! Detail records cached by the four detail caches
//!
//! Field names follow the TMDB JSON these records are decoded from. Where
//! the wire name is awkward the Rust name differs and `serde(rename)` keeps
//! the JSON shape, so a record encodes back to the same JSON it came from.

pub mod tmdb;

pub use tmdb::TmdbClient;

use std::collections::HashSet;

use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::cache::EntityKind;

/// A record type that belongs to exactly one detail cache
pub trait DetailRecord:
    Clone + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// The detail kind whose cache stores this record
    const KIND: EntityKind;
}

/// A genre tag
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Genre {
    pub id: i64,
    pub name: String,
}

/// A cast member of a movie, show or episode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cast {
    pub id: i64,
    pub name: String,
    pub character: Option<String>,
    pub profile_path: Option<String>,
}

/// A crew member of a movie, show or episode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Crew {
    pub id: i64,
    pub job: String,
    pub name: String,
    pub department: String,
    pub profile_path: Option<String>,
}

/// Cast and crew lists appended to a detail response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Credits {
    #[serde(default)]
    pub cast: Vec<Cast>,
    #[serde(default)]
    pub crew: Vec<Crew>,
}

/// A movie as it appears in a list of recommendations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovieSummary {
    pub id: i64,
    pub title: Option<String>,
    pub poster_path: Option<String>,
    pub backdrop_path: Option<String>,
    pub vote_average: Option<f64>,
}

/// A page of movies
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MovieSection {
    #[serde(default)]
    pub results: Vec<MovieSummary>,
}

/// Full movie detail, including credits and recommendations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovieDetail {
    pub runtime: Option<i64>,
    #[serde(rename = "vote_average")]
    pub rate_avg: f64,
    pub genres: Option<Vec<Genre>>,
    pub tagline: Option<String>,
    pub credits: Option<Credits>,
    pub recommendations: Option<MovieSection>,
}

impl DetailRecord for MovieDetail {
    const KIND: EntityKind = EntityKind::Movie;
}

/// A show as it appears in a list of recommendations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShowSummary {
    pub id: i64,
    pub name: Option<String>,
    pub poster_path: Option<String>,
    pub backdrop_path: Option<String>,
    pub vote_average: Option<f64>,
}

/// A page of shows
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShowSection {
    #[serde(default)]
    pub results: Vec<ShowSummary>,
}

/// Someone credited with creating a show
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Creator {
    pub id: i64,
    pub name: String,
    pub profile_path: Option<String>,
}

/// A season as listed on its show
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonSummary {
    pub id: i64,
    pub name: String,
    pub season_number: u32,
    pub episode_count: Option<u32>,
    pub air_date: Option<String>,
    pub overview: Option<String>,
    pub poster_path: Option<String>,
}

/// Full show detail, including credits and recommendations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShowDetail {
    pub name: String,
    pub genres: Option<Vec<Genre>>,
    #[serde(default)]
    pub episode_run_time: Vec<i64>,
    pub created_by: Option<Vec<Creator>>,
    pub number_of_seasons: Option<u32>,
    pub seasons: Option<Vec<SeasonSummary>>,
    pub credits: Option<Credits>,
    pub recommendations: Option<ShowSection>,
    #[serde(rename = "vote_average", default)]
    pub rate_avg: f64,
}

impl DetailRecord for ShowDetail {
    const KIND: EntityKind = EntityKind::Show;
}

/// One episode of a season
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Episode {
    #[serde(rename = "episode_number")]
    pub number: i64,
    pub name: String,
    #[serde(default)]
    pub crew: Vec<Crew>,
    pub air_date: Option<String>,
    #[serde(default)]
    pub overview: String,
    #[serde(rename = "still_path")]
    pub backdrop: Option<String>,
    pub guest_stars: Option<Vec<Cast>>,
}

/// Full season detail with its episodes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonDetail {
    pub id: i64,
    pub name: String,
    pub season_number: u32,
    pub air_date: Option<String>,
    pub overview: Option<String>,
    pub episodes: Option<Vec<Episode>>,
}

impl DetailRecord for SeasonDetail {
    const KIND: EntityKind = EntityKind::Season;
}

/// A movie or show a person worked on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombinedCredit {
    pub id: i64,
    /// `"movie"` or `"tv"`
    pub media_type: Option<String>,
    /// Movie title
    pub title: Option<String>,
    /// Show name
    pub name: Option<String>,
    pub character: Option<String>,
    pub job: Option<String>,
    pub poster_path: Option<String>,
    pub vote_average: Option<f64>,
}

/// Everything a person is credited on, across movies and shows
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CombinedCredits {
    #[serde(default)]
    pub cast: Vec<CombinedCredit>,
    #[serde(default)]
    pub crew: Vec<CombinedCredit>,
}

/// Full person detail plus combined credits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonDetail {
    pub id: i64,
    pub name: String,
    pub biography: Option<String>,
    pub birthday: Option<String>,
    pub deathday: Option<String>,
    #[serde(rename = "known_for_department")]
    pub known_for: Option<String>,
    pub profile_path: Option<String>,
    pub combined_credits: Option<CombinedCredits>,
}

impl DetailRecord for PersonDetail {
    const KIND: EntityKind = EntityKind::Person;
}

impl PersonDetail {
    /// Credits sorted by rating, highest first, for a "notable works" list
    pub fn notable_works(&self, limit: usize) -> Vec<&CombinedCredit> {
        let Some(credits) = &self.combined_credits else {
            return Vec::new();
        };
        let mut works: Vec<&CombinedCredit> = credits.cast.iter().chain(credits.crew.iter()).collect();
        works.sort_by(|a, b| {
            b.vote_average
                .unwrap_or(0.0)
                .total_cmp(&a.vote_average.unwrap_or(0.0))
        });
        let mut seen = HashSet::new();
        works.retain(|credit| seen.insert(credit.id));
        works.truncate(limit);
        works
    }
}
