//! Turns a free-form utterance (typed or transcribed) into a reminder draft.
//!
//! Two independent passes run over the same words: one looks for a temporal
//! phrase and derives the due time, the other drops every stop phrase
//! (command verbs, temporal phrases, priority and politeness words) to leave
//! the title. Matching is on whole words, longest phrase first, so a stop word
//! never eats part of a longer content word.

use chrono::{DateTime, Datelike, Days, NaiveDate, NaiveTime, TimeZone, Utc, Weekday};
use shared::domain::Reminder;
use tracing::debug;

/// Phrases removed from the title. Temporal phrases from [`TEMPORAL_RULES`]
/// are removed as well.
const STOP_PHRASES: &[&str] = &[
    // tr
    "ekle",
    "görev",
    "hatırlat",
    "hatırlatma",
    "bana hatırlat",
    "acil",
    "önemli",
    "hemen",
    "düşük öncelik",
    "acele değil",
    "önemli değil",
    "lütfen",
    "not",
    // en
    "add",
    "task",
    "remind",
    "remind me",
    "reminder",
    "urgent",
    "important",
    "low priority",
    "please",
];

/// Connectives that only make sense after a removed command phrase
/// ("remind me tomorrow *to* call mom"). Dropped from the start of the title
/// when a stop phrase came before them.
const LEADING_CONNECTIVES: &[&str] = &["to", "that"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemporalRule {
    Tomorrow,
    Today,
    NextWeek,
    Weekday(Weekday),
}

/// Checked in order; the first rule with a matching phrase wins.
const TEMPORAL_RULES: &[(TemporalRule, &[&str])] = &[
    (TemporalRule::Tomorrow, &["yarın", "tomorrow"]),
    (TemporalRule::Today, &["bugün", "bu gün", "today"]),
    (
        TemporalRule::NextWeek,
        &["gelecek hafta", "önümüzdeki hafta", "next week"],
    ),
    (TemporalRule::Weekday(Weekday::Mon), &["pazartesi", "monday"]),
    (TemporalRule::Weekday(Weekday::Tue), &["salı", "tuesday"]),
    (TemporalRule::Weekday(Weekday::Wed), &["çarşamba", "wednesday"]),
    (TemporalRule::Weekday(Weekday::Thu), &["perşembe", "thursday"]),
    (TemporalRule::Weekday(Weekday::Fri), &["cuma", "friday"]),
    (TemporalRule::Weekday(Weekday::Sat), &["cumartesi", "saturday"]),
    (TemporalRule::Weekday(Weekday::Sun), &["pazar", "sunday"]),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterpreterSettings {
    /// Time of day for "tomorrow", "next week" and weekday reminders.
    pub morning: NaiveTime,
    /// Time of day for "today" reminders.
    pub evening: NaiveTime,
}

impl Default for InterpreterSettings {
    fn default() -> Self {
        Self {
            morning: NaiveTime::from_hms_opt(9, 0, 0).unwrap_or(NaiveTime::MIN),
            evening: NaiveTime::from_hms_opt(18, 0, 0).unwrap_or(NaiveTime::MIN),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CommandInterpreter {
    settings: InterpreterSettings,
    stop_phrases: Vec<Vec<&'static str>>,
}

impl Default for CommandInterpreter {
    fn default() -> Self {
        Self::new(InterpreterSettings::default())
    }
}

impl CommandInterpreter {
    pub fn new(settings: InterpreterSettings) -> Self {
        let mut stop_phrases: Vec<Vec<&'static str>> = STOP_PHRASES
            .iter()
            .chain(TEMPORAL_RULES.iter().flat_map(|(_, phrases)| phrases.iter()))
            .map(|phrase| phrase.split_whitespace().collect())
            .collect();
        // longest first so "bu gün" wins over a one-word prefix
        stop_phrases.sort_by(|a, b| b.len().cmp(&a.len()));
        Self {
            settings,
            stop_phrases,
        }
    }

    /// Interprets `raw` relative to `now`. Returns `None` when nothing is
    /// left for a title once stop phrases are removed.
    pub fn interpret<Tz: TimeZone>(&self, raw: &str, now: &DateTime<Tz>) -> Option<Reminder> {
        let words = Word::split(raw);

        let rule = detect_rule(&words);
        let due = rule.and_then(|rule| self.due_for(rule, now));
        let title = self.extract_title(&words);

        if title.is_empty() {
            debug!("interpreter: no title left after stop phrase removal input={raw:?}");
            return None;
        }

        debug!("interpreter: parsed title={title:?} rule={rule:?} due={due:?}");
        Reminder::new(title, now.with_timezone(&Utc))
            .ok()
            .map(|reminder| reminder.with_reminder_at(due))
    }

    /// The due instant for `rule`, as seen from `now`'s calendar day.
    pub fn due_for<Tz: TimeZone>(
        &self,
        rule: TemporalRule,
        now: &DateTime<Tz>,
    ) -> Option<DateTime<Utc>> {
        let today = now.date_naive();
        let morning = self.settings.morning;
        let (day, time) = match rule {
            TemporalRule::Tomorrow => (today.checked_add_days(Days::new(1))?, morning),
            TemporalRule::Today => (today, self.settings.evening),
            TemporalRule::NextWeek => (today.checked_add_days(Days::new(7))?, morning),
            TemporalRule::Weekday(weekday) => (next_weekday(today, weekday)?, morning),
        };
        local_instant(&now.timezone(), day, time)
    }

    fn extract_title(&self, words: &[Word<'_>]) -> String {
        let mut kept: Vec<&Word<'_>> = Vec::with_capacity(words.len());
        let mut removed_any = false;
        let mut index = 0;
        while index < words.len() {
            if let Some(len) = self.stop_phrase_len_at(words, index) {
                removed_any = true;
                index += len;
                continue;
            }
            let word = &words[index];
            index += 1;
            // a connective only dangles once a command phrase before it is gone
            if removed_any
                && kept.is_empty()
                && LEADING_CONNECTIVES.contains(&word.key.as_str())
            {
                continue;
            }
            kept.push(word);
        }

        let joined = kept
            .iter()
            .map(|word| word.text)
            .collect::<Vec<_>>()
            .join(" ");
        joined
            .trim_matches(|c: char| c.is_whitespace() || is_punctuation(c))
            .to_string()
    }

    fn stop_phrase_len_at(&self, words: &[Word<'_>], index: usize) -> Option<usize> {
        self.stop_phrases
            .iter()
            .find(|phrase| phrase_matches_at(words, index, phrase))
            .map(Vec::len)
    }
}

/// First temporal rule with a phrase anywhere in `words`.
pub fn detect_rule(words: &[Word<'_>]) -> Option<TemporalRule> {
    TEMPORAL_RULES.iter().find_map(|(rule, phrases)| {
        phrases
            .iter()
            .any(|phrase| {
                let parts: Vec<&str> = phrase.split_whitespace().collect();
                (0..words.len()).any(|index| phrase_matches_at(words, index, &parts))
            })
            .then_some(*rule)
    })
}

/// The next `weekday` strictly after `today`; a week ahead when today
/// already is that weekday.
pub fn next_weekday(today: NaiveDate, weekday: Weekday) -> Option<NaiveDate> {
    let current = today.weekday().num_days_from_monday() as i64;
    let target = weekday.num_days_from_monday() as i64;
    let mut ahead = (target - current).rem_euclid(7);
    if ahead == 0 {
        ahead = 7;
    }
    today.checked_add_days(Days::new(ahead as u64))
}

/// A whitespace separated chunk of the input, with its match key: lower-cased
/// and stripped of surrounding punctuation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Word<'a> {
    pub text: &'a str,
    pub key: String,
}

impl<'a> Word<'a> {
    pub fn split(raw: &'a str) -> Vec<Self> {
        raw.split_whitespace()
            .map(|text| Self {
                text,
                key: match_key(text),
            })
            .collect()
    }
}

fn match_key(text: &str) -> String {
    text.trim_matches(is_punctuation)
        .to_lowercase()
        // "İ".to_lowercase() leaves a combining dot behind
        .replace('\u{307}', "")
}

fn phrase_matches_at(words: &[Word<'_>], index: usize, phrase: &[&str]) -> bool {
    !phrase.is_empty()
        && index + phrase.len() <= words.len()
        && words[index..index + phrase.len()]
            .iter()
            .zip(phrase)
            .all(|(word, part)| word.key == *part)
}

fn is_punctuation(c: char) -> bool {
    c.is_ascii_punctuation()
        || matches!(c, '…' | '“' | '”' | '‘' | '’' | '«' | '»' | '¡' | '¿')
}

fn local_instant<Tz: TimeZone>(tz: &Tz, day: NaiveDate, time: NaiveTime) -> Option<DateTime<Utc>> {
    let local = day.and_time(time);
    tz.from_local_datetime(&local)
        .earliest()
        // skipped by a DST jump: take the first valid hour after it
        .or_else(|| tz.from_local_datetime(&(local + chrono::Duration::hours(1))).earliest())
        .map(|instant| instant.with_timezone(&Utc))
}

#[cfg(test)]
#[path = "tests/interpreter_tests.rs"]
mod tests;
