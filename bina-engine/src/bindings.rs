//! The browser-facing wrapper around [`Bina`]. Times come in as milliseconds since the epoch.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use content_utils::explain::ExplainRequest;
use content_utils::{Catalog, Item};
use wasm_bindgen::prelude::*;

use crate::history::History;
use crate::notifications::{ReminderSettings, ScheduledNotification};
use crate::{
    Access, Action, AnswerOutcome, Bina, EngineConfig, FinishedSession, MasteryState, Question,
    Selection, SessionTopic, Tier,
};

fn js_error(e: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&e.to_string())
}

fn at(timestamp_ms: f64) -> Result<DateTime<Utc>, JsValue> {
    DateTime::from_timestamp_millis(timestamp_ms as i64)
        .ok_or_else(|| js_error(format!("timestamp out of range: {timestamp_ms}")))
}

#[cfg_attr(target_arch = "wasm32", wasm_bindgen)]
pub struct BinaApp {
    engine: Bina,
}

#[cfg_attr(target_arch = "wasm32", wasm_bindgen)]
impl BinaApp {
    /// `on_event` is called with every engine event, as a plain object.
    #[cfg_attr(target_arch = "wasm32", wasm_bindgen(constructor))]
    pub fn new(
        catalog_json: &str,
        config_json: Option<String>,
        state_json: Option<String>,
        seed: u64,
        on_event: js_sys::Function,
    ) -> Result<BinaApp, JsValue> {
        // used to only initialize the logger once
        #[cfg(target_arch = "wasm32")]
        #[allow(clippy::borrow_interior_mutable_const)]
        *crate::LOGGER;

        let catalog = Catalog::from_json(catalog_json)
            .inspect_err(|e| log::error!("Error loading catalog: {e}"))
            .map_err(js_error)?;
        let config = match config_json {
            Some(json) => EngineConfig::from_json(&json).map_err(js_error)?,
            None => EngineConfig::default(),
        };
        let state = match state_json {
            Some(json) => MasteryState::from_json(&json).map_err(js_error)?,
            None => MasteryState::default(),
        };

        let mut engine = Bina::with_state(Arc::new(catalog), config, state, seed);
        engine.register_listener(move |event| {
            #[cfg(target_arch = "wasm32")]
            {
                let this = JsValue::null();
                match serde_wasm_bindgen::to_value(event) {
                    Ok(event) => {
                        let _ = on_event.call1(&this, &event);
                    }
                    Err(e) => log::error!("Could not convert engine event: {e}"),
                }
            }
            #[cfg(not(target_arch = "wasm32"))]
            {
                let _ = (&on_event, event);
            }
        });
        Ok(Self { engine })
    }

    #[cfg_attr(target_arch = "wasm32", wasm_bindgen)]
    pub fn check_access(
        &mut self,
        topic: SessionTopic,
        action: Action,
        now_ms: f64,
    ) -> Result<Access, JsValue> {
        Ok(self.engine.check_access(topic, action, at(now_ms)?))
    }

    #[cfg_attr(target_arch = "wasm32", wasm_bindgen)]
    pub fn start_session(&mut self, topic: SessionTopic, now_ms: f64) -> Result<Selection, JsValue> {
        self.engine
            .start_session(topic, at(now_ms)?)
            .cloned()
            .map_err(js_error)
    }

    #[cfg_attr(target_arch = "wasm32", wasm_bindgen)]
    pub fn start_mock_exam(&mut self, now_ms: f64) -> Result<JsValue, JsValue> {
        let plan = self.engine.start_mock_exam(at(now_ms)?).map_err(js_error)?;
        serde_wasm_bindgen::to_value(&plan).map_err(js_error)
    }

    #[cfg_attr(target_arch = "wasm32", wasm_bindgen)]
    pub fn current_item(&self) -> Option<Item> {
        self.engine.current_item().cloned()
    }

    #[cfg_attr(target_arch = "wasm32", wasm_bindgen)]
    pub fn current_question(&self) -> Option<Question> {
        self.engine.current_question().cloned()
    }

    #[cfg_attr(target_arch = "wasm32", wasm_bindgen)]
    pub fn answer(
        &mut self,
        item_id: &str,
        knew_it: bool,
        now_ms: f64,
    ) -> Result<AnswerOutcome, JsValue> {
        self.engine
            .answer(item_id, knew_it, at(now_ms)?)
            .map_err(js_error)
    }

    #[cfg_attr(target_arch = "wasm32", wasm_bindgen)]
    pub fn answer_question(
        &mut self,
        item_id: &str,
        answer: &str,
        now_ms: f64,
    ) -> Result<AnswerOutcome, JsValue> {
        self.engine
            .answer_question(item_id, answer, at(now_ms)?)
            .map_err(js_error)
    }

    /// Call on every timer tick while an exam is running.
    #[cfg_attr(target_arch = "wasm32", wasm_bindgen)]
    pub fn tick(&mut self, now_ms: f64) -> Result<Option<FinishedSession>, JsValue> {
        Ok(self.engine.tick(at(now_ms)?))
    }

    #[cfg_attr(target_arch = "wasm32", wasm_bindgen)]
    pub fn finish_session(&mut self, now_ms: f64) -> Result<Option<FinishedSession>, JsValue> {
        Ok(self.engine.finish_session(at(now_ms)?))
    }

    #[cfg_attr(target_arch = "wasm32", wasm_bindgen)]
    pub fn restart_session(&mut self) -> Result<(), JsValue> {
        self.engine.restart_session().map_err(js_error)
    }

    #[cfg_attr(target_arch = "wasm32", wasm_bindgen)]
    pub fn skip_break(&mut self, now_ms: f64) -> Result<(), JsValue> {
        self.engine.skip_break(at(now_ms)?).map_err(js_error)
    }

    #[cfg_attr(target_arch = "wasm32", wasm_bindgen)]
    pub fn toggle_favorite(&mut self, item_id: &str, now_ms: f64) -> Result<bool, JsValue> {
        Ok(self.engine.toggle_favorite(item_id, at(now_ms)?))
    }

    #[cfg_attr(target_arch = "wasm32", wasm_bindgen)]
    pub fn redeem_credits(&mut self, now_ms: f64) -> Result<(), JsValue> {
        self.engine.redeem_credits(at(now_ms)?).map_err(js_error)
    }

    #[cfg_attr(target_arch = "wasm32", wasm_bindgen)]
    pub fn add_credits(&mut self, amount: u32, now_ms: f64) -> Result<(), JsValue> {
        self.engine.add_credits(amount, at(now_ms)?);
        Ok(())
    }

    /// Applies a tier the payment provider confirmed. `expiry_ms` is absent for a permanent tier.
    #[cfg_attr(target_arch = "wasm32", wasm_bindgen)]
    pub fn grant_tier(&mut self, tier: Tier, expiry_ms: Option<f64>, now_ms: f64) -> Result<(), JsValue> {
        let expiry = expiry_ms.map(at).transpose()?;
        self.engine.grant_tier(tier, expiry, at(now_ms)?);
        Ok(())
    }

    #[cfg_attr(target_arch = "wasm32", wasm_bindgen)]
    pub fn set_auto_explain(&mut self, enabled: bool, now_ms: f64) -> Result<(), JsValue> {
        self.engine
            .set_auto_explain(enabled, at(now_ms)?)
            .map_err(js_error)
    }

    #[cfg_attr(target_arch = "wasm32", wasm_bindgen)]
    pub fn set_custom_list(&mut self, items: JsValue, now_ms: f64) -> Result<(), JsValue> {
        let items: Vec<Item> = serde_wasm_bindgen::from_value(items).map_err(js_error)?;
        self.engine.set_custom_list(items, at(now_ms)?);
        Ok(())
    }

    #[cfg_attr(target_arch = "wasm32", wasm_bindgen)]
    pub fn reset(&mut self, now_ms: f64) -> Result<(), JsValue> {
        self.engine.reset(at(now_ms)?);
        Ok(())
    }

    #[cfg_attr(target_arch = "wasm32", wasm_bindgen)]
    pub fn explain_request(&self, item_id: &str) -> Option<ExplainRequest> {
        self.engine.explain_request(item_id)
    }

    /// Answers of the last finished exam, oldest first.
    #[cfg_attr(target_arch = "wasm32", wasm_bindgen)]
    pub fn review(&self) -> Result<JsValue, JsValue> {
        serde_wasm_bindgen::to_value(&self.engine.review()).map_err(js_error)
    }

    #[cfg_attr(target_arch = "wasm32", wasm_bindgen)]
    pub fn category_accuracy(&self) -> Result<JsValue, JsValue> {
        serde_wasm_bindgen::to_value(&self.engine.state().category_accuracy()).map_err(js_error)
    }

    #[cfg_attr(target_arch = "wasm32", wasm_bindgen)]
    pub fn history_entries(&self) -> Result<JsValue, JsValue> {
        serde_wasm_bindgen::to_value(&self.engine.history_entries()).map_err(js_error)
    }

    #[cfg_attr(target_arch = "wasm32", wasm_bindgen)]
    pub fn history_json(&self) -> Result<String, JsValue> {
        self.engine.history().to_json().map_err(js_error)
    }

    #[cfg_attr(target_arch = "wasm32", wasm_bindgen)]
    pub fn load_history(&mut self, json: &str) -> Result<(), JsValue> {
        let history = History::from_json(json).map_err(js_error)?;
        self.engine.load_history(history);
        Ok(())
    }

    /// `exam_date` is "YYYY-MM-DD".
    #[cfg_attr(target_arch = "wasm32", wasm_bindgen)]
    pub fn reminder(
        &self,
        settings: ReminderSettings,
        exam_date: Option<String>,
        now_ms: f64,
    ) -> Result<Option<ScheduledNotification>, JsValue> {
        let exam_date = exam_date
            .map(|date| NaiveDate::parse_from_str(&date, "%Y-%m-%d"))
            .transpose()
            .map_err(js_error)?;
        Ok(self.engine.reminder(&settings, exam_date, at(now_ms)?))
    }

    #[cfg_attr(target_arch = "wasm32", wasm_bindgen)]
    pub fn state_json(&self) -> Result<String, JsValue> {
        self.engine.state_json().map_err(js_error)
    }

    #[cfg_attr(target_arch = "wasm32", wasm_bindgen)]
    pub fn journal_json_lines(&self) -> Result<String, JsValue> {
        self.engine.journal_json_lines().map_err(js_error)
    }

    #[cfg_attr(target_arch = "wasm32", wasm_bindgen(getter))]
    pub fn xp(&self) -> f64 {
        self.engine.state().xp as f64
    }

    #[cfg_attr(target_arch = "wasm32", wasm_bindgen(getter))]
    pub fn level(&self) -> f64 {
        self.engine.state().level() as f64
    }

    #[cfg_attr(target_arch = "wasm32", wasm_bindgen(getter))]
    pub fn streak(&self) -> u32 {
        self.engine.state().streak_count()
    }

    #[cfg_attr(target_arch = "wasm32", wasm_bindgen(getter))]
    pub fn credits(&self) -> u32 {
        self.engine.state().credits
    }

    #[cfg_attr(target_arch = "wasm32", wasm_bindgen(getter))]
    pub fn tier(&self) -> Tier {
        self.engine.state().tier
    }
}
