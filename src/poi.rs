use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use serde_with::{serde_as, DefaultOnError, DefaultOnNull};

pub const MIN_RATING: f64 = 1.0;
pub const MAX_RATING: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinates {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }
}

#[serde_as]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceLinks {
    #[serde(default, rename = "google_maps_url", skip_serializing_if = "Option::is_none")]
    pub maps_url: Option<String>,
    #[serde_as(deserialize_as = "DefaultOnNull")]
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub review_links: Vec<String>,
}

#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Poi {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde_as(deserialize_as = "DefaultOnNull")]
    #[serde(default)]
    pub description: String,
    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    #[serde(flatten)]
    pub coordinates: Coordinates,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde_as(deserialize_as = "DefaultOnNull")]
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub highlight_tags: Vec<String>,
    #[serde_as(deserialize_as = "DefaultOnNull")]
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub opening_hours: Vec<String>,
    #[serde(default, rename = "source", skip_serializing_if = "Option::is_none")]
    pub source_links: Option<SourceLinks>,
}

impl Poi {
    /// Drops values outside the documented ranges; returns `None` for POIs without an id.
    pub fn sanitized(mut self) -> Option<Self> {
        if self.id.trim().is_empty() {
            tracing::warn!(name = %self.name, "dropping POI without id");
            return None;
        }
        if let Some(rating) = self.rating {
            if !(MIN_RATING..=MAX_RATING).contains(&rating) {
                tracing::warn!(id = %self.id, rating, "discarding out-of-range POI rating");
                self.rating = None;
            }
        }
        let mut seen = std::collections::HashSet::new();
        self.highlight_tags
            .retain(|tag| !tag.trim().is_empty() && seen.insert(tag.to_lowercase()));
        Some(self)
    }
}

/// Decodes each POI on its own; entries that do not decode are logged and skipped.
pub fn decode_pois(context: &str, raw: Vec<Value>) -> Vec<Poi> {
    raw.into_iter()
        .enumerate()
        .filter_map(|(index, value)| match serde_json::from_value::<Poi>(value) {
            Ok(poi) => Some(poi),
            Err(err) => {
                tracing::warn!(context, index, %err, "skipping undecodable POI");
                None
            }
        })
        .collect()
}

/// `deserialize_with` helper for POI lists: `null` or missing reads as empty.
pub fn deserialize_pois_lenient<'de, D>(deserializer: D) -> Result<Vec<Poi>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Vec<Value>>::deserialize(deserializer)?;
    Ok(decode_pois("poi list", raw.unwrap_or_default()))
}

/// Recommendation card pool keyed by POI id, in first-seen order.
#[derive(Debug, Clone, Default)]
pub struct PoiPool {
    items: IndexMap<String, Poi>,
}

impl PoiPool {
    pub fn from_cards(cards: impl IntoIterator<Item = Poi>) -> Self {
        let mut pool = Self::default();
        pool.extend(cards);
        pool
    }

    /// Adds cards not already present; returns how many were new.
    pub fn extend(&mut self, cards: impl IntoIterator<Item = Poi>) -> usize {
        let mut added = 0;
        for poi in cards.into_iter().filter_map(Poi::sanitized) {
            if self.items.contains_key(&poi.id) {
                continue;
            }
            self.items.insert(poi.id.clone(), poi);
            added += 1;
        }
        added
    }

    pub fn get(&self, id: &str) -> Option<&Poi> {
        self.items.get(id)
    }

    pub fn get_index(&self, index: usize) -> Option<&Poi> {
        self.items.get_index(index).map(|(_, poi)| poi)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Poi> {
        self.items.values()
    }

    pub fn to_vec(&self) -> Vec<Poi> {
        self.items.values().cloned().collect()
    }
}

/// Ids the user accepted, in the order they were picked.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoiSelection {
    ids: Vec<String>,
}

impl PoiSelection {
    pub fn from_ids(ids: impl IntoIterator<Item = String>) -> Self {
        let mut selection = Self::default();
        for id in ids {
            selection.select(&id);
        }
        selection
    }

    /// Adds `id` if absent. Returns true when the selection changed.
    pub fn select(&mut self, id: &str) -> bool {
        if id.is_empty() || self.contains(id) {
            return false;
        }
        self.ids.push(id.to_string());
        true
    }

    /// Flips membership of `id`; returns whether it is selected afterwards.
    pub fn toggle(&mut self, id: &str) -> bool {
        if self.remove(id) {
            false
        } else {
            self.select(id)
        }
    }

    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.ids.len();
        self.ids.retain(|existing| existing != id);
        before != self.ids.len()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.iter().any(|existing| existing == id)
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn can_submit(&self, minimum: u32) -> bool {
        self.ids.len() >= minimum as usize
    }

    pub fn remaining(&self, minimum: u32) -> usize {
        (minimum as usize).saturating_sub(self.ids.len())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn poi(id: &str, lat: f64, lng: f64) -> Poi {
        Poi {
            id: id.to_string(),
            name: format!("Place {id}"),
            city: None,
            description: String::new(),
            rating: Some(4.5),
            coordinates: Coordinates::new(lat, lng),
            image_url: None,
            highlight_tags: Vec::new(),
            opening_hours: Vec::new(),
            source_links: None,
        }
    }

    #[test]
    fn deserializes_backend_card_shape() -> anyhow::Result<()> {
        let raw = r#"{
            "id": "poi_moma",
            "name": "MoMA",
            "description": null,
            "rating": 4.7,
            "lat": 40.7614,
            "lng": -73.9776,
            "highlight_tags": ["art", "Art", "design"],
            "opening_hours": null,
            "source": { "google_maps_url": "https://maps.example/moma", "review_links": null }
        }"#;
        let poi: Poi = serde_json::from_str(raw)?;
        let poi = poi.sanitized().expect("valid poi");
        assert_eq!(poi.coordinates, Coordinates::new(40.7614, -73.9776));
        assert_eq!(poi.description, "");
        assert_eq!(poi.highlight_tags, vec!["art".to_string(), "design".to_string()]);
        assert!(poi.opening_hours.is_empty());
        let links = poi.source_links.expect("links");
        assert_eq!(links.maps_url.as_deref(), Some("https://maps.example/moma"));
        assert!(links.review_links.is_empty());
        Ok(())
    }

    #[test]
    fn sanitize_drops_bad_rating_and_blank_ids() {
        let mut bad = poi("a", 0.0, 0.0);
        bad.rating = Some(7.5);
        assert_eq!(bad.sanitized().and_then(|p| p.rating), None);
        assert!(poi("  ", 0.0, 0.0).sanitized().is_none());
    }

    #[test]
    fn pool_deduplicates_by_id_in_first_seen_order() {
        let mut pool = PoiPool::from_cards(vec![poi("a", 1.0, 1.0), poi("b", 2.0, 2.0)]);
        let added = pool.extend(vec![poi("b", 9.0, 9.0), poi("c", 3.0, 3.0)]);
        assert_eq!(added, 1);
        let ids: Vec<_> = pool.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(pool.get("b").map(|p| p.coordinates.lat), Some(2.0));
    }

    #[test]
    fn selection_gate_tracks_minimum() {
        let mut selection = PoiSelection::default();
        assert!(selection.toggle("a"));
        assert!(selection.toggle("b"));
        assert!(!selection.can_submit(3));
        assert_eq!(selection.remaining(3), 1);
        assert!(!selection.toggle("a"));
        assert!(selection.select("c"));
        assert!(!selection.select("c"));
        assert_eq!(selection.ids(), &["b".to_string(), "c".to_string()]);
    }
}
