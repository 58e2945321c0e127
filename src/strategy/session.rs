//! Session Context Detection
//!
//! Pure function of a UTC timestamp. Session windows (UTC, end exclusive):
//!
//! | Session | Hours       | Duration |
//! |---------|-------------|----------|
//! | ASIA    | 22:00-08:00 | 600 min  |
//! | LONDON  | 08:00-16:00 | 480 min  |
//! | NY      | 13:00-21:00 | 480 min  |
//!
//! When two sessions are active the most recently opened one is primary.

use chrono::{DateTime, Datelike, Timelike, Utc, Weekday};

use crate::domain::{OverlapType, SessionContext, TradingSession};

/// Minutes at either end of a session treated as a transition period
pub const TRANSITION_MINUTES: u32 = 30;

/// Strength multiplier at the very open/close of a session
const RAMP_FLOOR: f64 = 0.6;

/// Strength multiplier applied inside thin handover overlaps
const THIN_OVERLAP_FACTOR: f64 = 0.7;

struct SessionWindow {
    session: TradingSession,
    open_hour: u32,
    duration_minutes: u32,
    base_strength: f64,
}

const WINDOWS: [SessionWindow; 3] = [
    SessionWindow {
        session: TradingSession::Asia,
        open_hour: 22,
        duration_minutes: 600,
        base_strength: 0.60,
    },
    SessionWindow {
        session: TradingSession::London,
        open_hour: 8,
        duration_minutes: 480,
        base_strength: 0.90,
    },
    SessionWindow {
        session: TradingSession::NewYork,
        open_hour: 13,
        duration_minutes: 480,
        base_strength: 0.85,
    },
];

impl SessionWindow {
    /// Minutes since this window opened, if `minute_of_day` falls inside it
    fn minutes_in(&self, minute_of_day: u32) -> Option<u32> {
        let open = self.open_hour * 60;
        let elapsed = (minute_of_day + 24 * 60 - open) % (24 * 60);
        (elapsed < self.duration_minutes).then_some(elapsed)
    }
}

/// Session duration in minutes (0 for UNKNOWN)
pub fn session_duration(session: TradingSession) -> u32 {
    WINDOWS
        .iter()
        .find(|w| w.session == session)
        .map(|w| w.duration_minutes)
        .unwrap_or(0)
}

fn overlap_at(hour: u32) -> Option<OverlapType> {
    match hour {
        13..=15 => Some(OverlapType::LondonNy),
        8 => Some(OverlapType::AsiaLondon),
        21 => Some(OverlapType::NyAsia),
        _ => None,
    }
}

/// Linear ramp 0.6 -> 1.0 over the first 30 minutes and back down over the last 30
fn edge_ramp(minutes_in: u32, duration: u32) -> f64 {
    let window = TRANSITION_MINUTES as f64;
    let from_open = minutes_in as f64;
    let to_close = duration.saturating_sub(minutes_in) as f64;
    let edge = from_open.min(to_close);
    if edge >= window {
        1.0
    } else {
        RAMP_FLOOR + (1.0 - RAMP_FLOOR) * edge / window
    }
}

/// Session context for a UTC instant
pub fn detect_session(now: DateTime<Utc>) -> SessionContext {
    if matches!(now.weekday(), Weekday::Sat | Weekday::Sun) {
        return SessionContext {
            is_weekend: true,
            ..Default::default()
        };
    }

    let minute_of_day = now.hour() * 60 + now.minute();

    // most recently opened active window = fewest minutes since open
    let primary = WINDOWS
        .iter()
        .filter_map(|w| w.minutes_in(minute_of_day).map(|m| (w, m)))
        .min_by_key(|(_, m)| *m);

    let overlap = overlap_at(now.hour());

    let (session, minutes_into_session, is_transition_period, mut strength) = match primary {
        Some((window, minutes)) => {
            let transition = minutes < TRANSITION_MINUTES
                || minutes >= window.duration_minutes.saturating_sub(TRANSITION_MINUTES);
            (window.session, minutes, transition, window.base_strength)
        }
        None => (TradingSession::Unknown, 0, false, 0.5),
    };

    match overlap {
        Some(OverlapType::LondonNy) => strength = 1.0,
        Some(o) if o.is_thin() => strength *= THIN_OVERLAP_FACTOR,
        _ => {}
    }

    if let Some((window, minutes)) = primary {
        strength *= edge_ramp(minutes, window.duration_minutes);
    }

    let session_strength = (strength.clamp(0.0, 1.0) * 1000.0).round() / 1000.0;

    SessionContext {
        session,
        is_overlap: overlap.is_some(),
        overlap,
        minutes_into_session,
        session_strength,
        is_transition_period,
        is_weekend: false,
        is_market_open: true,
    }
}

/// Session context for an optional timestamp; `None` yields the default context
pub fn detect_session_opt(now: Option<DateTime<Utc>>) -> SessionContext {
    now.map(detect_session).unwrap_or_default()
}

/// Session context for an RFC 3339 string; unparseable input yields the default context
pub fn detect_session_str(raw: &str) -> SessionContext {
    match DateTime::parse_from_rfc3339(raw.trim()) {
        Ok(ts) => detect_session(ts.with_timezone(&Utc)),
        Err(e) => {
            tracing::debug!("Unparseable session timestamp '{}': {}", raw, e);
            SessionContext::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::TimeZone;

    // 2024-03-04 is a Monday
    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 4, hour, minute, 0).unwrap()
    }

    #[test]
    fn test_london_morning() {
        let ctx = detect_session(at(10, 0));
        assert_eq!(ctx.session, TradingSession::London);
        assert!(!ctx.is_overlap);
        assert_eq!(ctx.minutes_into_session, 120);
        assert!(!ctx.is_transition_period);
        assert_relative_eq!(ctx.session_strength, 0.9);
        assert!(ctx.is_market_open);
    }

    #[test]
    fn test_london_ny_overlap_prefers_ny() {
        let ctx = detect_session(at(14, 0));
        assert_eq!(ctx.session, TradingSession::NewYork);
        assert_eq!(ctx.overlap, Some(OverlapType::LondonNy));
        assert_eq!(ctx.minutes_into_session, 60);
        assert_relative_eq!(ctx.session_strength, 1.0);
        assert_eq!(ctx.tag(), "NY+LONDON_NY");
    }

    #[test]
    fn test_asia_wraps_midnight() {
        let ctx = detect_session(at(1, 30));
        assert_eq!(ctx.session, TradingSession::Asia);
        assert_eq!(ctx.minutes_into_session, 210);
        assert_relative_eq!(ctx.session_strength, 0.6);
    }

    #[test]
    fn test_asia_london_handover() {
        let ctx = detect_session(at(8, 45));
        assert_eq!(ctx.session, TradingSession::London);
        assert_eq!(ctx.overlap, Some(OverlapType::AsiaLondon));
        assert_relative_eq!(ctx.session_strength, 0.63, epsilon = 1e-9);
    }

    #[test]
    fn test_gap_hour_is_unknown_with_overlap() {
        let ctx = detect_session(at(21, 15));
        assert_eq!(ctx.session, TradingSession::Unknown);
        assert_eq!(ctx.overlap, Some(OverlapType::NyAsia));
        assert_eq!(ctx.minutes_into_session, 0);
        assert_relative_eq!(ctx.session_strength, 0.35, epsilon = 1e-9);
    }

    #[test]
    fn test_transition_and_ramp() {
        let open = detect_session(at(8, 0));
        assert!(open.is_transition_period);
        assert_relative_eq!(open.session_strength, 0.378, epsilon = 1e-9);

        let near_close = detect_session(at(15, 45));
        // NY primary at 15:45 (165 min in), London closes at 16:00 but is not primary
        assert_eq!(near_close.session, TradingSession::NewYork);
        assert!(!near_close.is_transition_period);

        let ny_close = detect_session(at(20, 45));
        assert!(ny_close.is_transition_period);
        assert_relative_eq!(ny_close.session_strength, 0.68, epsilon = 1e-9);
    }

    #[test]
    fn test_weekend_closed() {
        let sat = Utc.with_ymd_and_hms(2024, 3, 9, 12, 0, 0).unwrap();
        let ctx = detect_session(sat);
        assert!(ctx.is_weekend);
        assert!(!ctx.is_market_open);
        assert_eq!(ctx.session, TradingSession::Unknown);
    }

    #[test]
    fn test_invalid_timestamp_defaults() {
        let ctx = detect_session_str("yesterday-ish");
        assert_eq!(ctx, SessionContext::default());
        assert_eq!(detect_session_opt(None), SessionContext::default());
    }

    #[test]
    fn test_strength_always_in_bounds() {
        for hour in 0..24 {
            for minute in [0, 15, 29, 30, 59] {
                let ctx = detect_session(at(hour, minute));
                assert!((0.0..=1.0).contains(&ctx.session_strength));
            }
        }
    }

    #[test]
    fn test_durations() {
        assert_eq!(session_duration(TradingSession::Asia), 600);
        assert_eq!(session_duration(TradingSession::London), 480);
        assert_eq!(session_duration(TradingSession::Unknown), 0);
    }
}
