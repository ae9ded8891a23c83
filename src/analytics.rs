//! Click analytics computed on demand from stored click histories
//!
//! Totals come from the per-URL counters; every breakdown (day, hour,
//! country, referer) is derived from the retained history, which holds at
//! most the latest [`MAX_CLICK_HISTORY`](crate::model::MAX_CLICK_HISTORY)
//! events per URL.

use std::collections::HashMap;

use chrono::{DateTime, Duration, NaiveDate, Timelike, Utc};
use serde::Serialize;

use crate::model::{ClickEvent, UrlRecord};

#[derive(Serialize, Debug, PartialEq, Eq)]
pub struct DayCount {
    pub date: NaiveDate,
    pub clicks: u64,
}

#[derive(Serialize, Debug, PartialEq, Eq)]
pub struct HourCount {
    pub hour: u32,
    pub clicks: u64,
}

#[derive(Serialize, Debug, PartialEq, Eq)]
pub struct LabelCount {
    pub label: String,
    pub clicks: u64,
}

#[derive(Serialize, Debug, PartialEq, Eq)]
pub struct TimeBucket {
    pub start: DateTime<Utc>,
    pub clicks: u64,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct TopUrl {
    pub id: String,
    pub short_code: String,
    pub original_url: String,
    pub title: Option<String>,
    pub clicks: u64,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct RecentClick {
    pub short_code: String,
    pub country: Option<String>,
    pub city: Option<String>,
    pub referer: Option<String>,
    pub user_agent: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Overview {
    pub total_urls: usize,
    pub total_clicks: u64,
    pub active_urls: usize,
    pub inactive_urls: usize,
    pub top_urls: Vec<TopUrl>,
    pub clicks_by_day: Vec<DayCount>,
    pub top_countries: Vec<LabelCount>,
    pub top_referers: Vec<LabelCount>,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct UrlStats {
    pub total_clicks: u64,
    pub clicks_in_period: u64,
    pub clicks_by_day: Vec<DayCount>,
    pub clicks_by_hour: Vec<HourCount>,
    pub countries: Vec<LabelCount>,
    pub referers: Vec<LabelCount>,
    pub recent_clicks: Vec<RecentClick>,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Realtime {
    pub last_hour: u64,
    pub last_24_hours: u64,
    pub hourly: Vec<TimeBucket>,
    pub recent_clicks: Vec<RecentClick>,
}

/// Daily counts for the `days` calendar days ending on `today`, zero-filled
pub fn clicks_by_day<'a>(
    events: impl IntoIterator<Item = &'a ClickEvent>,
    today: NaiveDate,
    days: i64,
) -> Vec<DayCount> {
    let first = today - Duration::days(days - 1);
    let mut counts: HashMap<NaiveDate, u64> = HashMap::new();
    for event in events {
        let date = event.timestamp.date_naive();
        if date >= first && date <= today {
            *counts.entry(date).or_default() += 1;
        }
    }

    (0..days)
        .map(|offset| {
            let date = first + Duration::days(offset);
            DayCount {
                date,
                clicks: counts.get(&date).copied().unwrap_or(0),
            }
        })
        .collect()
}

/// Counts per UTC hour of day, always 24 entries
pub fn clicks_by_hour<'a>(events: impl IntoIterator<Item = &'a ClickEvent>) -> Vec<HourCount> {
    let mut counts = [0u64; 24];
    for event in events {
        counts[event.timestamp.hour() as usize] += 1;
    }
    counts
        .iter()
        .enumerate()
        .map(|(hour, clicks)| HourCount {
            hour: hour as u32,
            clicks: *clicks,
        })
        .collect()
}

fn ranked(counts: HashMap<String, u64>, limit: usize) -> Vec<LabelCount> {
    let mut ranked: Vec<LabelCount> = counts
        .into_iter()
        .map(|(label, clicks)| LabelCount { label, clicks })
        .collect();
    ranked.sort_by(|a, b| b.clicks.cmp(&a.clicks).then_with(|| a.label.cmp(&b.label)));
    ranked.truncate(limit);
    ranked
}

pub fn top_countries<'a>(
    events: impl IntoIterator<Item = &'a ClickEvent>,
    limit: usize,
) -> Vec<LabelCount> {
    let mut counts: HashMap<String, u64> = HashMap::new();
    for event in events {
        let label = event.country.clone().unwrap_or_else(|| "Unknown".to_string());
        *counts.entry(label).or_default() += 1;
    }
    ranked(counts, limit)
}

/// Referer host without a leading `www.`; `Direct` when absent
pub fn referer_label(referer: Option<&str>) -> String {
    match referer {
        None => "Direct".to_string(),
        Some(raw) => url::Url::parse(raw)
            .ok()
            .and_then(|u| u.host_str().map(|h| h.trim_start_matches("www.").to_string()))
            .unwrap_or_else(|| raw.to_string()),
    }
}

pub fn top_referers<'a>(
    events: impl IntoIterator<Item = &'a ClickEvent>,
    limit: usize,
) -> Vec<LabelCount> {
    let mut counts: HashMap<String, u64> = HashMap::new();
    for event in events {
        *counts.entry(referer_label(event.referer.as_deref())).or_default() += 1;
    }
    ranked(counts, limit)
}

/// URLs ranked by click count, newest first on ties
pub fn top_urls(records: &[UrlRecord], limit: usize) -> Vec<TopUrl> {
    let mut sorted: Vec<&UrlRecord> = records.iter().collect();
    sorted.sort_by(|a, b| b.clicks.cmp(&a.clicks).then(b.created_at.cmp(&a.created_at)));
    sorted
        .into_iter()
        .take(limit)
        .map(|r| TopUrl {
            id: r.id.clone(),
            short_code: r.short_code.clone(),
            original_url: r.original_url.clone(),
            title: r.title.clone(),
            clicks: r.clicks,
        })
        .collect()
}

/// Most recent clicks across `records`, newest first
pub fn recent_clicks(records: &[&UrlRecord], limit: usize) -> Vec<RecentClick> {
    let mut events: Vec<(&str, &ClickEvent)> = records
        .iter()
        .flat_map(|r| r.click_history.iter().map(move |e| (r.short_code.as_str(), e)))
        .collect();
    events.sort_by(|a, b| b.1.timestamp.cmp(&a.1.timestamp));
    events
        .into_iter()
        .take(limit)
        .map(|(code, e)| RecentClick {
            short_code: code.to_string(),
            country: e.country.clone(),
            city: e.city.clone(),
            referer: e.referer.clone(),
            user_agent: e.user_agent.clone(),
            timestamp: e.timestamp,
        })
        .collect()
}

fn hour_floor(at: DateTime<Utc>) -> DateTime<Utc> {
    let ts = at.timestamp();
    DateTime::from_timestamp(ts - ts.rem_euclid(3600), 0).unwrap_or(at)
}

/// `hours` one-hour buckets ending with the current hour, oldest first
pub fn hourly_buckets<'a>(
    events: impl IntoIterator<Item = &'a ClickEvent>,
    now: DateTime<Utc>,
    hours: i64,
) -> Vec<TimeBucket> {
    let current = hour_floor(now);
    let first = current - Duration::hours(hours - 1);
    let mut counts = vec![0u64; hours.max(0) as usize];
    for event in events {
        if event.timestamp < first || event.timestamp > now {
            continue;
        }
        let index = (event.timestamp - first).num_hours() as usize;
        if let Some(slot) = counts.get_mut(index) {
            *slot += 1;
        }
    }
    counts
        .into_iter()
        .enumerate()
        .map(|(i, clicks)| TimeBucket {
            start: first + Duration::hours(i as i64),
            clicks,
        })
        .collect()
}

fn all_events(records: &[UrlRecord]) -> impl Iterator<Item = &ClickEvent> {
    records.iter().flat_map(|r| r.click_history.iter())
}

/// Dashboard summary across a user's URLs
pub fn overview(records: &[UrlRecord], now: DateTime<Utc>) -> Overview {
    let active_urls = records.iter().filter(|r| r.is_accessible(now)).count();
    Overview {
        total_urls: records.len(),
        total_clicks: records.iter().map(|r| r.clicks).sum(),
        active_urls,
        inactive_urls: records.len() - active_urls,
        top_urls: top_urls(records, 5),
        clicks_by_day: clicks_by_day(all_events(records), now.date_naive(), 7),
        top_countries: top_countries(all_events(records), 5),
        top_referers: top_referers(all_events(records), 5),
    }
}

/// Breakdown for a single URL over the last `days` days
pub fn url_stats(record: &UrlRecord, now: DateTime<Utc>, days: i64) -> UrlStats {
    let since = now - Duration::days(days);
    let in_period: Vec<&ClickEvent> = record
        .click_history
        .iter()
        .filter(|e| e.timestamp >= since)
        .collect();

    UrlStats {
        total_clicks: record.clicks,
        clicks_in_period: in_period.len() as u64,
        clicks_by_day: clicks_by_day(in_period.iter().copied(), now.date_naive(), days),
        clicks_by_hour: clicks_by_hour(in_period.iter().copied()),
        countries: top_countries(in_period.iter().copied(), 10),
        referers: top_referers(in_period.iter().copied(), 10),
        recent_clicks: recent_clicks(&[record], 10),
    }
}

/// Activity over the last 24 hours
pub fn realtime(records: &[UrlRecord], now: DateTime<Utc>) -> Realtime {
    let hour_ago = now - Duration::hours(1);
    let day_ago = now - Duration::hours(24);
    let refs: Vec<&UrlRecord> = records.iter().collect();

    Realtime {
        last_hour: all_events(records)
            .filter(|e| e.timestamp > hour_ago && e.timestamp <= now)
            .count() as u64,
        last_24_hours: all_events(records)
            .filter(|e| e.timestamp > day_ago && e.timestamp <= now)
            .count() as u64,
        hourly: hourly_buckets(all_events(records), now, 24),
        recent_clicks: recent_clicks(&refs, 20),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn event(ts: DateTime<Utc>, country: Option<&str>, referer: Option<&str>) -> ClickEvent {
        ClickEvent {
            country: country.map(String::from),
            referer: referer.map(String::from),
            timestamp: ts,
            ..ClickEvent::default()
        }
    }

    fn at(d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, d, h, 15, 0).unwrap()
    }

    #[test]
    fn day_series_is_zero_filled_and_windowed() {
        let events = vec![
            event(at(10, 1), None, None),
            event(at(10, 23), None, None),
            event(at(8, 12), None, None),
            event(at(1, 12), None, None), // outside the window
        ];
        let series = clicks_by_day(&events, at(10, 0).date_naive(), 3);
        let counts: Vec<u64> = series.iter().map(|d| d.clicks).collect();
        assert_eq!(counts, vec![1, 0, 2]);
        assert_eq!(series[0].date, at(8, 0).date_naive());
    }

    #[test]
    fn hour_of_day_has_24_slots() {
        let events = vec![event(at(1, 5), None, None), event(at(2, 5), None, None)];
        let hours = clicks_by_hour(&events);
        assert_eq!(hours.len(), 24);
        assert_eq!(hours[5].clicks, 2);
        assert_eq!(hours.iter().map(|h| h.clicks).sum::<u64>(), 2);
    }

    #[test]
    fn countries_rank_with_unknown_bucket() {
        let events = vec![
            event(at(1, 1), Some("US"), None),
            event(at(1, 1), Some("US"), None),
            event(at(1, 1), Some("DE"), None),
            event(at(1, 1), None, None),
        ];
        let top = top_countries(&events, 2);
        assert_eq!(top.len(), 2);
        assert_eq!(top[0], LabelCount { label: "US".into(), clicks: 2 });
        // DE and Unknown tie at one click; alphabetical order breaks it
        assert_eq!(top[1].label, "DE");
    }

    #[test]
    fn referers_group_by_host() {
        let events = vec![
            event(at(1, 1), None, Some("https://www.google.com/search?q=x")),
            event(at(1, 1), None, Some("https://google.com/")),
            event(at(1, 1), None, None),
        ];
        let top = top_referers(&events, 10);
        assert_eq!(top[0], LabelCount { label: "google.com".into(), clicks: 2 });
        assert_eq!(top[1], LabelCount { label: "Direct".into(), clicks: 1 });
    }

    #[test]
    fn hourly_buckets_end_at_current_hour() {
        let now = at(10, 12);
        let events = vec![
            event(at(10, 12), None, None),
            event(at(10, 11), None, None),
            event(at(9, 13), None, None),
            event(at(9, 11), None, None), // 25 hours back, dropped
        ];
        let buckets = hourly_buckets(&events, now, 24);
        assert_eq!(buckets.len(), 24);
        assert_eq!(buckets[23].clicks, 1);
        assert_eq!(buckets[22].clicks, 1);
        assert_eq!(buckets[0].clicks, 1);
        assert_eq!(buckets[23].start, Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap());
    }

    #[test]
    fn top_urls_prefers_clicks_then_recency() {
        let mut a = UrlRecord::new("https://a".into(), "a".into(), None);
        let mut b = UrlRecord::new("https://b".into(), "b".into(), None);
        let mut c = UrlRecord::new("https://c".into(), "c".into(), None);
        a.clicks = 5;
        b.clicks = 9;
        c.clicks = 5;
        c.created_at = a.created_at + Duration::seconds(1);
        let top = top_urls(&[a, b, c], 3);
        let codes: Vec<&str> = top.iter().map(|t| t.short_code.as_str()).collect();
        assert_eq!(codes, vec!["b", "c", "a"]);
    }

    #[test]
    fn overview_totals_use_counters() {
        let now = Utc::now();
        let mut live = UrlRecord::new("https://a".into(), "live".into(), None);
        live.record_click(event(now, Some("FR"), None));
        let mut dead = UrlRecord::new("https://b".into(), "dead".into(), None);
        dead.clicks = 40;
        dead.is_active = false;

        let summary = overview(&[live, dead], now);
        assert_eq!(summary.total_urls, 2);
        assert_eq!(summary.total_clicks, 41);
        assert_eq!(summary.active_urls, 1);
        assert_eq!(summary.inactive_urls, 1);
        assert_eq!(summary.clicks_by_day.len(), 7);
        assert_eq!(summary.clicks_by_day[6].clicks, 1);
        assert_eq!(summary.top_countries[0].label, "FR");
    }
}
