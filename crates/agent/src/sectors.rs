//! Sector bookkeeping: what an availability response offered, and which of
//! those sectors a reservation request refers to.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::state::Params;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectorSource {
    /// Exact schedule entries for the requested slot.
    Data,
    /// Alternatives the backend proposed when no exact slot exists.
    Suggestions,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailableSector {
    pub sector_id: String,
    pub sector_name: String,
    #[serde(default)]
    pub unit_id: Option<String>,
    #[serde(default)]
    pub unit_name: Option<String>,
    pub source: SectorSource,
}

/// Collects the distinct sectors of an availability response.
///
/// The by-unit endpoint answers with flat schedule entries and is
/// deduplicated by sector id. The all-units endpoint nests `schedules` under
/// each unit and is deduplicated by `(unit_id, sector_id)`. Top-level
/// `suggestions` are only consulted when neither yields anything.
pub fn extract_available_sectors(response: &Value) -> Vec<AvailableSector> {
    let entries = response.get("data").and_then(Value::as_array).filter(|items| !items.is_empty());

    if let Some(entries) = entries {
        if entries.first().is_some_and(is_flat_schedule) {
            let flat = collect(entries, SectorSource::Data);
            if !flat.is_empty() {
                return flat;
            }
        }

        let mut seen = HashSet::new();
        let mut nested = Vec::new();
        for unit in entries.iter().filter(|unit| unit.is_object()) {
            let Some(schedules) = unit.get("schedules").and_then(Value::as_array) else {
                continue;
            };
            let unit_id = unit.get("id").filter(|id| !id.is_null()).map(scalar_text);
            let unit_name = unit.get("name").and_then(Value::as_str).map(str::to_string);

            for (sector_id, sector_name) in schedules.iter().filter_map(sector_fields) {
                let key = (unit_id.clone().unwrap_or_default(), sector_id.clone());
                if !seen.insert(key) {
                    continue;
                }
                nested.push(AvailableSector {
                    sector_id,
                    sector_name,
                    unit_id: unit_id.clone(),
                    unit_name: unit_name.clone(),
                    source: SectorSource::Data,
                });
            }
        }
        if !nested.is_empty() {
            return nested;
        }
    }

    response
        .get("suggestions")
        .and_then(Value::as_array)
        .map(|items| collect(items, SectorSource::Suggestions))
        .unwrap_or_default()
}

fn is_flat_schedule(entry: &Value) -> bool {
    entry.is_object()
        && (entry.get("sector_id").is_some() || entry.get("sectorId").is_some())
        && entry.get("hour").is_some()
}

fn collect(entries: &[Value], source: SectorSource) -> Vec<AvailableSector> {
    let mut seen = HashSet::new();
    entries
        .iter()
        .filter_map(sector_fields)
        .filter(|(sector_id, _)| seen.insert(sector_id.clone()))
        .map(|(sector_id, sector_name)| AvailableSector {
            sector_id,
            sector_name,
            unit_id: None,
            unit_name: None,
            source,
        })
        .collect()
}

fn sector_fields(entry: &Value) -> Option<(String, String)> {
    let pick = |snake: &str, camel: &str| {
        [snake, camel]
            .iter()
            .filter_map(|key| entry.get(*key))
            .map(scalar_text)
            .find(|text| !text.is_empty() && text != "0" && text != "false")
    };
    Some((pick("sector_id", "sectorId")?, pick("sector_name", "sectorName")?))
}

fn scalar_text(value: &Value) -> String {
    mesa_booking::models::scalar_to_string(value)
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SectorResolution {
    pub sector_id: Option<String>,
    /// Notes to send with the reservation, possibly backfilled with the sector name.
    pub notes: Option<String>,
}

/// Picks the sector a reservation request refers to.
///
/// An explicit `sector_id` wins. A single offered sector is adopted and, when
/// the guest left no notes, its name becomes the notes. Otherwise the notes
/// are matched against offered sector names in both directions, first match
/// in offer order. Anything else stays unresolved.
pub fn resolve_sector(params: &Params) -> SectorResolution {
    let notes = params.notes.clone();

    if let Some(sector_id) = Params::text(&params.sector_id) {
        return SectorResolution { sector_id: Some(sector_id.to_string()), notes };
    }

    let offered = params.available_sectors.as_deref().unwrap_or_default();
    let note_text = Params::text(&notes).map(str::to_lowercase);

    if let [only] = offered {
        if !only.sector_id.trim().is_empty() {
            let notes = match note_text {
                Some(_) => notes,
                None if !only.sector_name.trim().is_empty() => Some(only.sector_name.clone()),
                None => notes,
            };
            return SectorResolution { sector_id: Some(only.sector_id.clone()), notes };
        }
    }

    if let Some(wanted) = note_text {
        let matched = offered.iter().find(|sector| {
            let name = sector.sector_name.trim().to_lowercase();
            !name.is_empty()
                && !sector.sector_id.trim().is_empty()
                && (wanted.contains(&name) || name.contains(&wanted))
        });
        if let Some(sector) = matched {
            return SectorResolution { sector_id: Some(sector.sector_id.clone()), notes };
        }
    }

    SectorResolution { sector_id: None, notes }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{extract_available_sectors, resolve_sector, AvailableSector, SectorSource};
    use crate::state::Params;

    fn sector(id: &str, name: &str) -> AvailableSector {
        AvailableSector {
            sector_id: id.to_string(),
            sector_name: name.to_string(),
            unit_id: None,
            unit_name: None,
            source: SectorSource::Data,
        }
    }

    #[test]
    fn flat_schedules_are_deduplicated_by_sector() {
        let response = json!({
            "success": true,
            "data": [
                {"hour": "20:00", "people": 2, "sector_id": "J1bqDWPO", "sector_name": "Salão 01"},
                {"hour": "20:30", "people": 2, "sector_id": "J1bqDWPO", "sector_name": "Salão 01"},
                {"hour": "20:00", "people": 2, "sectorId": 7, "sectorName": "Varanda"},
                {"hour": "21:00", "people": 2, "sector_id": "", "sector_name": "Sem id"}
            ]
        });

        let sectors = extract_available_sectors(&response);
        let names: Vec<&str> = sectors.iter().map(|s| s.sector_name.as_str()).collect();

        assert_eq!(names, vec!["Salão 01", "Varanda"]);
        assert_eq!(sectors[1].sector_id, "7");
        assert!(sectors.iter().all(|s| s.source == SectorSource::Data && s.unit_id.is_none()));
    }

    #[test]
    fn nested_units_are_deduplicated_per_unit() {
        let response = json!({
            "data": [
                {"id": "VPzzDDPQ", "name": "Get In AI 1", "schedules": [
                    {"hour": "20:00", "sector_id": "S1", "sector_name": "Salão"},
                    {"hour": "20:30", "sector_id": "S1", "sector_name": "Salão"}
                ]},
                {"id": "Xk2", "name": "Get In AI 2", "schedules": [
                    {"hour": "20:00", "sector_id": "S1", "sector_name": "Salão"}
                ]}
            ]
        });

        let sectors = extract_available_sectors(&response);
        assert_eq!(sectors.len(), 2);
        assert_eq!(sectors[0].unit_id.as_deref(), Some("VPzzDDPQ"));
        assert_eq!(sectors[1].unit_name.as_deref(), Some("Get In AI 2"));
    }

    #[test]
    fn suggestions_fill_in_when_no_exact_slot_exists() {
        let response = json!({
            "data": [],
            "suggestions": [
                {"hour": "21:00", "sector_id": "S9", "sector_name": "Bar"},
                {"hour": "21:30", "sector_id": "S9", "sector_name": "Bar"}
            ]
        });

        let sectors = extract_available_sectors(&response);
        assert_eq!(sectors.len(), 1);
        assert_eq!(sectors[0].source, SectorSource::Suggestions);
    }

    #[test]
    fn unrecognized_payloads_yield_nothing() {
        assert!(extract_available_sectors(&json!({"data": "oops"})).is_empty());
        assert!(extract_available_sectors(&json!(null)).is_empty());
    }

    #[test]
    fn explicit_sector_wins() {
        let params = Params {
            sector_id: Some("X1".to_string()),
            available_sectors: Some(vec![sector("A1", "Window")]),
            ..Params::default()
        };
        assert_eq!(resolve_sector(&params).sector_id.as_deref(), Some("X1"));
    }

    #[test]
    fn single_offered_sector_is_adopted_and_backfills_notes() {
        let params =
            Params { available_sectors: Some(vec![sector("A1", "Window")]), ..Params::default() };
        let resolution = resolve_sector(&params);

        assert_eq!(resolution.sector_id.as_deref(), Some("A1"));
        assert_eq!(resolution.notes.as_deref(), Some("Window"));
    }

    #[test]
    fn single_offered_sector_keeps_existing_notes() {
        let params = Params {
            notes: Some("aniversário".to_string()),
            available_sectors: Some(vec![sector("A1", "Window")]),
            ..Params::default()
        };
        let resolution = resolve_sector(&params);
        assert_eq!(resolution.sector_id.as_deref(), Some("A1"));
        assert_eq!(resolution.notes.as_deref(), Some("aniversário"));
    }

    #[test]
    fn notes_match_sector_names_in_both_directions() {
        let offered = vec![sector("S1", "Salão Principal"), sector("S2", "Varanda")];

        let longer_notes = Params {
            notes: Some("Mesa na VARANDA, por favor".to_string()),
            available_sectors: Some(offered.clone()),
            ..Params::default()
        };
        assert_eq!(resolve_sector(&longer_notes).sector_id.as_deref(), Some("S2"));

        let shorter_notes = Params {
            notes: Some("salão".to_string()),
            available_sectors: Some(offered),
            ..Params::default()
        };
        assert_eq!(resolve_sector(&shorter_notes).sector_id.as_deref(), Some("S1"));
    }

    #[test]
    fn ambiguous_or_missing_input_stays_unresolved() {
        let params = Params {
            available_sectors: Some(vec![sector("S1", "Salão"), sector("S2", "Varanda")]),
            ..Params::default()
        };
        assert_eq!(resolve_sector(&params).sector_id, None);
        assert_eq!(resolve_sector(&Params::default()).sector_id, None);
    }
}
