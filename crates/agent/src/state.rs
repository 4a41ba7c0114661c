//! Per-conversation state threaded through the turn pipeline.
//!
//! The caller owns `AgentState` between turns and hands it back on the next
//! one. `Params::merge` is the only way extracted values enter the state, and
//! it never lets a missing value erase a known one.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::actions::ActionResult;
use crate::intent::Intent;
use crate::sectors::AvailableSector;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Params {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub party_size: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub datetime_iso: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sector_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table_people: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discount: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_fields: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub highlighted: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reservation_id: Option<String>,
    /// Sectors offered by the last successful availability check.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available_sectors: Option<Vec<AvailableSector>>,
    /// Every extraction payload seen in this conversation, oldest first.
    #[serde(deserialize_with = "one_or_many", skip_serializing_if = "Vec::is_empty")]
    pub raw: Vec<Value>,
}

macro_rules! merge_known {
    ($target:ident, $incoming:ident; $($field:ident),+ $(,)?) => {
        $(
            if $incoming.$field.is_some() {
                $target.$field = $incoming.$field;
            }
        )+
    };
}

impl Params {
    /// Folds a newer extraction into this one.
    ///
    /// A present value overwrites; an absent value never clears a known one.
    /// `raw` payloads accumulate.
    pub fn merge(&mut self, incoming: Params) {
        let target = self;
        merge_known!(
            target, incoming;
            date, time, party_size, name, phone, email, notes, datetime_iso, unit_id, sector_id,
            table_people, discount, custom_fields, highlighted, start_date, end_date, status,
            search, sort, page, reservation_id, available_sectors,
        );
        target.raw.extend(incoming.raw);
    }

    /// Text fields are considered missing when blank.
    pub fn text(value: &Option<String>) -> Option<&str> {
        value.as_deref().map(str::trim).filter(|text| !text.is_empty())
    }
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => Vec::new(),
        Value::Array(items) => items,
        single => vec![single],
    })
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentState {
    /// Correlates every turn of one conversation in the logs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<Uuid>,
    pub user_input: String,
    pub intent: Option<Intent>,
    pub params: Params,
    pub action_result: Option<ActionResult>,
    pub answer: Option<String>,
}

impl AgentState {
    /// State for a new turn: the message is replaced, everything else carries over.
    pub fn next_turn(previous: Option<AgentState>, user_input: impl Into<String>) -> Self {
        let mut state = previous.unwrap_or_default();
        state.conversation_id.get_or_insert_with(Uuid::new_v4);
        state.user_input = user_input.into();
        state.answer = None;
        state
    }
}
