//! Join scored or matched documents back to places.

use crate::query::{AnalyzedQuery, RetrievalMode};
use crate::vsm::{self, ScoredDoc, WeightingScheme};
use crate::{CorpusIndex, DocId, DocMeta};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashSet};
use url::Url;

const PHOTO_PLACEHOLDER: &str = "https://placehold.co/400x200/556B2F/FFFFFF";
const MAPS_SEARCH: &str = "https://www.google.com/maps/search/";
const NO_OPENING_HOURS: &str = "Info tidak tersedia";

/// One place in a result list, with display defaults filled in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceHit {
    pub name: String,
    pub location: String,
    pub avg_rating: f64,
    /// Score of the best-ranked review of this place; 0 when nothing was scored
    pub top_score: f64,
    pub photo_url: String,
    pub gmaps_link: String,
    pub price_items: Vec<String>,
    pub facilities: String,
    pub opening_hours: String,
}

impl PlaceHit {
    fn from_meta(meta: &DocMeta, top_score: f64) -> Self {
        Self {
            name: meta.place.clone(),
            location: meta.location.clone(),
            avg_rating: meta.avg_rating,
            top_score,
            photo_url: meta.photo_url.clone().unwrap_or_else(|| placeholder_photo(&meta.place)),
            gmaps_link: meta
                .gmaps_link
                .clone()
                .unwrap_or_else(|| maps_search_link(&meta.place, &meta.location)),
            price_items: meta.price_items.clone().unwrap_or_default(),
            facilities: meta.facilities.clone().unwrap_or_default(),
            opening_hours: meta.opening_hours.clone().unwrap_or_else(|| NO_OPENING_HOURS.to_string()),
        }
    }
}

fn placeholder_photo(name: &str) -> String {
    Url::parse_with_params(PHOTO_PLACEHOLDER, &[("text", name), ("font", "poppins")])
        .map(String::from)
        .unwrap_or_else(|_| PHOTO_PLACEHOLDER.to_string())
}

fn maps_search_link(name: &str, location: &str) -> String {
    let query = format!("{name} {location}");
    Url::parse_with_params(MAPS_SEARCH, &[("api", "1"), ("query", query.as_str())])
        .map(String::from)
        .unwrap_or_else(|_| MAPS_SEARCH.to_string())
}

fn in_region(meta: &DocMeta, region: Option<&str>) -> bool {
    match region {
        Some(region) => meta.location.to_lowercase().contains(&region.to_lowercase()),
        None => true,
    }
}

/// Places for ranked documents, in rank order. Only the first (best-ranked)
/// document of each place survives; documents missing from the metadata or
/// outside `region` are skipped.
pub fn assemble_ranked(index: &CorpusIndex, ranked: &[ScoredDoc], region: Option<&str>) -> Vec<PlaceHit> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut hits = Vec::new();
    for scored in ranked {
        let Some(meta) = index.doc(scored.doc_id) else {
            continue;
        };
        if !in_region(meta, region) {
            continue;
        }
        if seen.insert(meta.place.as_str()) {
            hits.push(PlaceHit::from_meta(meta, scored.score));
        }
    }
    hits
}

/// Places for an unordered Boolean match, one per place, in doc_id order.
pub fn assemble_matches(index: &CorpusIndex, ids: &BTreeSet<DocId>) -> Vec<PlaceHit> {
    let mut seen: HashSet<&str> = HashSet::new();
    ids.iter()
        .filter_map(|id| index.doc(*id))
        .filter(|meta| seen.insert(meta.place.as_str()))
        .map(|meta| PlaceHit::from_meta(meta, 0.0))
        .collect()
}

/// Every distinct place, optionally limited to `region`, best average rating
/// first.
pub fn all_places(index: &CorpusIndex, region: Option<&str>) -> Vec<PlaceHit> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut hits: Vec<PlaceHit> = index
        .docs()
        .map(|(_, meta)| meta)
        .filter(|meta| seen.insert(meta.place.as_str()))
        .filter(|meta| in_region(meta, region))
        .map(|meta| PlaceHit::from_meta(meta, 0.0))
        .collect();
    sort_by_rating(&mut hits, true);
    hits
}

fn sort_by_rating(hits: &mut [PlaceHit], descending: bool) {
    hits.sort_by(|a, b| {
        let ord = a.avg_rating.partial_cmp(&b.avg_rating).unwrap_or(Ordering::Equal);
        if descending {
            ord.reverse()
        } else {
            ord
        }
    });
}

/// Single dispatch point from an analyzed query to place results.
pub fn assemble(index: &CorpusIndex, query: &AnalyzedQuery, scheme: WeightingScheme) -> Vec<PlaceHit> {
    let region = query.region.as_deref();
    match query.mode {
        RetrievalMode::AllRegionFiltered => all_places(index, region),
        RetrievalMode::Rank => assemble_ranked(index, &vsm::score(index, &query.tokens, scheme), region),
        RetrievalMode::SortByRatingDesc | RetrievalMode::SortByRatingAsc => {
            let mut hits = assemble_ranked(index, &vsm::score(index, &query.tokens, scheme), region);
            sort_by_rating(&mut hits, query.mode == RetrievalMode::SortByRatingDesc);
            hits
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SourceDoc;

    fn index() -> CorpusIndex {
        let docs = [
            ("Curug Cilember", "Bogor, Jawa Barat", 4.0, "sejuk"),
            ("Ranca Upas", "Bandung, Jawa Barat", 5.0, "sejuk sejuk"),
            ("Curug Cilember", "Bogor, Jawa Barat", 2.0, "sejuk sejuk sejuk"),
            ("Pantai Sawarna", "Lebak, Banten", 3.5, "pantai"),
        ];
        CorpusIndex::build(docs.iter().map(|(place, location, rating, text)| SourceDoc {
            place: place.to_string(),
            location: location.to_string(),
            rating: *rating,
            tokens: text.split_whitespace().map(str::to_string).collect(),
        }))
        .unwrap()
    }

    #[test]
    fn keeps_best_ranked_review_per_place() {
        let idx = index();
        let ranked = vsm::score(&idx, &["sejuk".to_string()], WeightingScheme::RawTfIdf);
        let hits = assemble_ranked(&idx, &ranked, None);
        let names: Vec<&str> = hits.iter().map(|h| h.name.as_str()).collect();
        assert_eq!(names, vec!["Curug Cilember", "Ranca Upas"]);
        assert_eq!(hits[0].top_score, ranked[0].score);
        assert_eq!(hits[0].avg_rating, 3.0);
    }

    #[test]
    fn skips_documents_missing_from_metadata() {
        let idx = index();
        let ranked = [
            ScoredDoc { doc_id: 2, score: 3.0 },
            ScoredDoc { doc_id: 999, score: 2.5 },
            ScoredDoc { doc_id: 1, score: 2.0 },
            ScoredDoc { doc_id: 3, score: 1.0 },
        ];
        let hits = assemble_ranked(&idx, &ranked, None);
        let got: Vec<(&str, f64)> = hits.iter().map(|h| (h.name.as_str(), h.top_score)).collect();
        assert_eq!(got, vec![("Curug Cilember", 3.0), ("Ranca Upas", 2.0), ("Pantai Sawarna", 1.0)]);
    }

    #[test]
    fn boolean_matches_collapse_to_places() {
        let idx = index();
        let ids: BTreeSet<DocId> = [0, 1, 2, 999].into_iter().collect();
        let hits = assemble_matches(&idx, &ids);
        let names: Vec<&str> = hits.iter().map(|h| h.name.as_str()).collect();
        assert_eq!(names, vec!["Curug Cilember", "Ranca Upas"]);
        assert!(hits.iter().all(|h| h.top_score == 0.0));
    }

    #[test]
    fn fills_display_defaults() {
        let idx = index();
        let hit = &all_places(&idx, Some("banten"))[0];
        assert_eq!(hit.name, "Pantai Sawarna");
        assert!(hit.photo_url.starts_with(PHOTO_PLACEHOLDER));
        assert!(hit.photo_url.contains("text=Pantai+Sawarna"));
        assert!(hit.gmaps_link.starts_with(MAPS_SEARCH));
        assert!(hit.gmaps_link.contains("api=1"));
        assert!(hit.price_items.is_empty());
        assert_eq!(hit.facilities, "");
        assert_eq!(hit.opening_hours, NO_OPENING_HOURS);
    }

    #[test]
    fn all_places_sorts_by_average_rating() {
        let idx = index();
        let names: Vec<String> = all_places(&idx, None).into_iter().map(|h| h.name).collect();
        assert_eq!(names, vec!["Ranca Upas", "Pantai Sawarna", "Curug Cilember"]);
        assert_eq!(all_places(&idx, Some("jawa barat")).len(), 2);
    }

    #[test]
    fn rating_modes_reorder_ranked_places() {
        let idx = index();
        let query = AnalyzedQuery {
            tokens: vec!["sejuk".into()],
            mode: RetrievalMode::SortByRatingAsc,
            region: None,
        };
        let names: Vec<String> =
            assemble(&idx, &query, WeightingScheme::RawTfIdf).into_iter().map(|h| h.name).collect();
        assert_eq!(names, vec!["Curug Cilember", "Ranca Upas"]);

        let query = AnalyzedQuery { mode: RetrievalMode::SortByRatingDesc, ..query };
        let names: Vec<String> =
            assemble(&idx, &query, WeightingScheme::RawTfIdf).into_iter().map(|h| h.name).collect();
        assert_eq!(names, vec!["Ranca Upas", "Curug Cilember"]);
    }

    #[test]
    fn region_filter_applies_to_ranked_results() {
        let idx = index();
        let query = AnalyzedQuery {
            tokens: vec!["sejuk".into()],
            mode: RetrievalMode::Rank,
            region: Some("bandung".into()),
        };
        let hits = assemble(&idx, &query, WeightingScheme::Sublinear);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "Ranca Upas");
    }
}
