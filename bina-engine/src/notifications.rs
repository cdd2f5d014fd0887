use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, tsify::Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    StreakReminder,
    ExamCountdown,
    WeakPointsNudge,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, tsify::Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub notification_type: NotificationType,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, tsify::Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledNotification {
    /// Milliseconds since the epoch.
    pub scheduled_at: i64,
    pub notification: Notification,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, tsify::Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
#[serde(rename_all = "camelCase", default)]
pub struct ReminderSettings {
    pub enabled: bool,
    /// Local time of day, "HH:MM".
    pub reminder_time: String,
    pub streak_reminder: bool,
    pub exam_countdown: bool,
    pub weak_points_nudge: bool,
}

impl Default for ReminderSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            reminder_time: "20:00".to_string(),
            streak_reminder: true,
            exam_countdown: true,
            weak_points_nudge: true,
        }
    }
}

impl ReminderSettings {
    pub fn time(&self) -> Option<NaiveTime> {
        NaiveTime::parse_from_str(self.reminder_time.trim(), "%H:%M")
            .inspect_err(|e| log::warn!("Bad reminder time {:?}: {e}", self.reminder_time))
            .ok()
    }
}

const EXAM_COUNTDOWN_DAYS: i64 = 60;

/// The next daily reminder after `now`: today at the reminder time if that is still ahead, else
/// tomorrow. `None` when reminders are off or the time does not parse.
pub fn next_reminder_at(
    settings: &ReminderSettings,
    now: DateTime<Utc>,
    config: &EngineConfig,
) -> Option<DateTime<Utc>> {
    if !settings.enabled {
        return None;
    }
    let time = settings.time()?;
    let offset = config.day_offset();
    let local_now = now.checked_add_signed(offset)?.naive_utc();
    let mut target = local_now.date().and_time(time);
    if target <= local_now {
        target = target.checked_add_signed(Duration::days(1))?;
    }
    target.and_utc().checked_sub_signed(offset)
}

/// The reminder text for `today`, or `None` if there is nothing the learner asked to hear about.
pub fn compose_reminder(
    settings: &ReminderSettings,
    weak_points: usize,
    exam_date: Option<NaiveDate>,
    today: NaiveDate,
) -> Option<Notification> {
    if !settings.enabled {
        return None;
    }

    let days_left = exam_date
        .filter(|_| settings.exam_countdown)
        .map(|exam| (exam - today).num_days())
        .filter(|days| (1..=EXAM_COUNTDOWN_DAYS).contains(days));
    let nudge = settings.weak_points_nudge && weak_points > 0;

    let mut notification = Notification {
        title: "Bina 📚 - זמן ללמוד!".to_string(),
        body: "שמור על הרצף שלך, 10 דקות ביום מספיקות!".to_string(),
        notification_type: NotificationType::StreakReminder,
    };
    if let Some(days) = days_left {
        notification = Notification {
            title: format!("Bina 📚 - נותרו {days} ימים לבחינה!"),
            body: "כל יום שאתה לומד מקרב אותך ל-800. בוא נתחיל!".to_string(),
            notification_type: NotificationType::ExamCountdown,
        };
    }
    if nudge {
        notification.body = format!("יש לך {weak_points} מילים שצריכות חזרה. בוא נחזק אותן!");
        if days_left.is_none() {
            notification.notification_type = NotificationType::WeakPointsNudge;
        }
    }

    if days_left.is_none() && !nudge && !settings.streak_reminder {
        return None;
    }
    Some(notification)
}

/// Composes the next reminder for the moment it will be shown. Delivery is up to the host.
pub fn schedule_reminder(
    settings: &ReminderSettings,
    weak_points: usize,
    exam_date: Option<NaiveDate>,
    now: DateTime<Utc>,
    config: &EngineConfig,
) -> Option<ScheduledNotification> {
    let at = next_reminder_at(settings, now, config)?;
    let notification = compose_reminder(settings, weak_points, exam_date, config.calendar_date(at))?;
    Some(ScheduledNotification {
        scheduled_at: at.timestamp_millis(),
        notification,
    })
}
