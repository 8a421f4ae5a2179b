use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use serde_with::{serde_as, DefaultOnNull};

use crate::form::{MealFlags, Transportation, TripFlags, TripForm};
use crate::poi::{decode_pois, deserialize_pois_lenient, Poi};
use crate::trip::Intensity;

/// Day-keyed rough plan exactly as `/plan` returned it; echoed verbatim to `/preview`.
pub type RoughPlan = IndexMap<String, Vec<Value>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MealOptions {
    pub include_breakfast: bool,
    pub include_lunch: bool,
    pub include_dinner: bool,
}

impl From<MealFlags> for MealOptions {
    fn from(flags: MealFlags) -> Self {
        Self {
            include_breakfast: flags.contains(MealFlags::BREAKFAST),
            include_lunch: flags.contains(MealFlags::LUNCH),
            include_dinner: flags.contains(MealFlags::DINNER),
        }
    }
}

/// Form fields in the shape `/recommend` and `/plan` expect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormPayload {
    pub from: String,
    pub to: String,
    pub start_datetime: String,
    pub end_datetime: String,
    #[serde(default)]
    pub description: String,
    pub transportation: Transportation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub travelers: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget: Option<String>,
    pub round_trip: bool,
    pub include_hotels: bool,
    pub meal_options: MealOptions,
    pub intensity: Intensity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wake_up_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_time: Option<String>,
}

impl From<&TripForm> for FormPayload {
    fn from(form: &TripForm) -> Self {
        Self {
            from: form.from.trim().to_string(),
            to: form.to.trim().to_string(),
            start_datetime: form.start_date.trim().to_string(),
            end_datetime: form.end_date.trim().to_string(),
            description: form.description.trim().to_string(),
            transportation: form.transportation,
            travelers: form.travelers,
            budget: form.budget.clone().filter(|b| !b.trim().is_empty()),
            round_trip: form.flags.contains(TripFlags::ROUND_TRIP),
            include_hotels: form.flags.contains(TripFlags::INCLUDE_HOTELS),
            meal_options: form.meals.into(),
            intensity: form.intensity,
            wake_up_time: form.wake_up_time.clone(),
            return_time: form.return_time.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RecommendResponse {
    #[serde(default, deserialize_with = "deserialize_pois_lenient")]
    pub cards: Vec<Poi>,
    #[serde(default, deserialize_with = "deserialize_pois_lenient")]
    pub all_pois: Vec<Poi>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct MoreCardsResponse {
    #[serde(default, deserialize_with = "deserialize_pois_lenient")]
    pub cards: Vec<Poi>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanRequest {
    pub accepted_pois: Vec<String>,
    pub all_pois: Vec<Poi>,
    #[serde(flatten)]
    pub form: FormPayload,
}

#[serde_as]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanResponse {
    #[serde_as(deserialize_as = "DefaultOnNull")]
    #[serde(default)]
    pub plan: RoughPlan,
    #[serde_as(deserialize_as = "DefaultOnNull")]
    #[serde(default)]
    pub options: Map<String, Value>,
}

impl PlanResponse {
    /// POIs of each rough-plan day, skipping entries that are not POIs.
    pub fn day_pois(&self) -> Vec<(String, Vec<Poi>)> {
        self.plan
            .iter()
            .map(|(day, entries)| (day.clone(), decode_pois(day, entries.clone())))
            .collect()
    }

    pub fn option_str(&self, key: &str) -> Option<&str> {
        self.options.get(key).and_then(Value::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreviewRequest {
    pub plan: RoughPlan,
    pub options: Map<String, Value>,
}

/// Raw `/preview` body: day key in whatever format the backend used → block objects.
pub type PreviewResponse = IndexMap<String, Vec<Value>>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::tests::sample_form;
    use serde_json::json;

    #[test]
    fn form_payload_matches_backend_field_names() -> anyhow::Result<()> {
        let payload = FormPayload::from(&sample_form());
        let value = serde_json::to_value(&payload)?;
        assert_eq!(value["from"], "Boston");
        assert_eq!(value["start_datetime"], "2025-04-04");
        assert_eq!(value["transportation"], "public");
        assert_eq!(value["intensity"], "normal");
        assert_eq!(value["round_trip"], true);
        assert_eq!(value["include_hotels"], false);
        assert_eq!(
            value["meal_options"],
            json!({ "include_breakfast": false, "include_lunch": true, "include_dinner": true })
        );
        assert!(value.get("budget").is_none());
        Ok(())
    }

    #[test]
    fn plan_request_flattens_form_fields() -> anyhow::Result<()> {
        let request = PlanRequest {
            accepted_pois: vec!["a".into()],
            all_pois: Vec::new(),
            form: FormPayload::from(&sample_form()),
        };
        let value = serde_json::to_value(&request)?;
        assert_eq!(value["accepted_pois"], json!(["a"]));
        assert_eq!(value["to"], "New York");
        Ok(())
    }

    #[test]
    fn missing_and_null_collections_default_to_empty() -> anyhow::Result<()> {
        let recommend: RecommendResponse = serde_json::from_str(r#"{ "cards": null }"#)?;
        assert!(recommend.cards.is_empty() && recommend.all_pois.is_empty());
        let plan: PlanResponse = serde_json::from_str(r#"{ "plan": null }"#)?;
        assert!(plan.plan.is_empty() && plan.options.is_empty());
        Ok(())
    }

    #[test]
    fn one_bad_card_does_not_empty_the_deck() -> anyhow::Result<()> {
        let recommend: RecommendResponse = serde_json::from_value(json!({
            "cards": [
                { "id": "a", "name": "A", "lat": 1.0, "lng": 2.0 },
                { "id": "b", "name": "B", "lat": null, "lng": 2.0 },
                { "id": "c", "name": "C", "lat": 1.0, "lng": 2.0, "rating": "4.5" }
            ],
            "all_pois": [{ "id": "a", "name": "A", "lat": 1.0, "lng": 2.0 }, "junk"]
        }))?;
        let ids: Vec<_> = recommend.cards.iter().map(|poi| poi.id.as_str()).collect();
        assert_eq!(ids, ["a", "c"]);
        assert_eq!(recommend.cards[1].rating, None);
        assert_eq!(recommend.all_pois.len(), 1);

        let more: MoreCardsResponse =
            serde_json::from_str(r#"{ "cards": [{ "id": "d", "lat": "x", "lng": 0 }, { "id": "e", "lat": 0, "lng": 0 }] }"#)?;
        assert_eq!(more.cards.len(), 1);
        assert_eq!(more.cards[0].id, "e");
        Ok(())
    }

    #[test]
    fn plan_day_pois_skip_bad_entries_and_keep_order() -> anyhow::Result<()> {
        let plan: PlanResponse = serde_json::from_value(json!({
            "plan": {
                "Day 2": [{ "id": "b", "name": "B", "lat": 1.0, "lng": 2.0 }],
                "Day 1": [{ "id": "a", "name": "A", "lat": 1.0, "lng": 2.0 }, { "oops": true }]
            },
            "options": { "start_datetime": "2025-04-04" }
        }))?;
        let days = plan.day_pois();
        assert_eq!(days[0].0, "Day 2");
        assert_eq!(days[1].1.len(), 1);
        assert_eq!(plan.option_str("start_datetime"), Some("2025-04-04"));
        Ok(())
    }
}
