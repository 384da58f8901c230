//! Temporal Parser.
//!
//! Parses a `FrequencyInput` (free text, a structured `Timing`, or an
//! ordered sequence of either) into one or more FHIR `Timing`s, detecting
//! titration schedules and scoring its own confidence.

use std::sync::OnceLock;

use regex::Regex;

use fhir_types::{BoundsDuration, Duration, DurationUnit, Timing, TimingRepeat};

use crate::medication::FrequencyInput;

/// One phase of a parsed titration schedule.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedPhase {
    pub sequence_index: u32,
    pub description: String,
    pub frequency_phrase: String,
    pub timing: Timing,
    pub duration: Duration,
    pub is_maintenance_phase: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TemporalParseResult {
    pub timings: Vec<Timing>,
    pub is_titration: bool,
    pub phases: Option<Vec<ParsedPhase>>,
    pub confidence: f64,
    pub warnings: Vec<String>,
}

impl TemporalParseResult {
    /// The single timing for non-titration results. Panics if called on a
    /// titration result — callers must branch on `is_titration` first.
    pub fn single_timing(&self) -> &Timing {
        self.timings
            .first()
            .expect("a parse result always has at least one timing")
    }

    /// Human-readable frequency phrase for the single (non-titration)
    /// timing, e.g. "twice daily".
    pub fn frequency_phrase(&self) -> String {
        TemporalParser::describe(&self.single_timing().repeat)
    }
}

fn titration_string_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)week\s+\d+-\d+|week\s+\d+\+|day\s+\d+-\d+|day\s+\d+\+|\b(then|increase|titrate|escalate)\b")
            .unwrap()
    })
}

fn week_range_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)week\s+(\d+)\s*-\s*(\d+)").unwrap())
}

fn week_plus_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)week\s+(\d+)\s*\+").unwrap())
}

fn day_range_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)day\s+(\d+)\s*-\s*(\d+)").unwrap())
}

fn day_plus_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)day\s+(\d+)\s*\+").unwrap())
}

fn times_per_period_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)(\d+)\s*times?\s*(daily|weekly|monthly)").unwrap())
}

fn every_n_hours_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)every\s+(\d+)\s*hours?").unwrap())
}

fn split_comma_before_week_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i),\s*(?=week\s+\d)").unwrap())
}

pub struct TemporalParser;

impl TemporalParser {
    pub fn parse(input: &FrequencyInput) -> TemporalParseResult {
        match input {
            FrequencyInput::Structured(timing) => TemporalParseResult {
                timings: vec![timing.clone()],
                is_titration: false,
                phases: None,
                confidence: 1.0,
                warnings: Vec::new(),
            },
            FrequencyInput::Sequence(items) if items.len() >= 2 => Self::parse_sequence(items),
            FrequencyInput::Sequence(items) => match items.first() {
                // A one-element sequence degrades to its element.
                Some(only) => Self::parse(only),
                None => TemporalParseResult {
                    timings: vec![Timing {
                        repeat: TimingRepeat::new(1, 1.0, DurationUnit::Day),
                    }],
                    is_titration: false,
                    phases: None,
                    confidence: 0.0,
                    warnings: vec!["empty frequency sequence".to_string()],
                },
            },
            FrequencyInput::Text(text) => {
                if titration_string_re().is_match(text) {
                    Self::parse_titration_text(text)
                } else {
                    Self::parse_single_text(text)
                }
            }
        }
    }

    fn parse_single_text(text: &str) -> TemporalParseResult {
        let mut warnings = Vec::new();
        let (repeat, confidence) = Self::match_frequency(text).unwrap_or_else(|| {
            warnings.push(format!(
                "no recognised frequency pattern in '{text}'; defaulting to once daily"
            ));
            (TimingRepeat::new(1, 1.0, DurationUnit::Day), 0.6)
        });
        TemporalParseResult {
            timings: vec![Timing { repeat }],
            is_titration: false,
            phases: None,
            confidence,
            warnings,
        }
    }

    fn parse_titration_text(text: &str) -> TemporalParseResult {
        let phrases = Self::split_phases(text);
        let mut phases = Vec::new();
        let mut warnings = Vec::new();
        let mut maintenance_count = 0;

        for (index, phrase) in phrases.iter().enumerate() {
            match Self::parse_phase(phrase, index as u32) {
                Ok(phase) => {
                    if phase.is_maintenance_phase {
                        maintenance_count += 1;
                    }
                    phases.push(phase);
                }
                Err(reason) => warnings.push(reason),
            }
        }

        if maintenance_count > 1 {
            warnings.push(format!(
                "{maintenance_count} maintenance phases detected; expected exactly one"
            ));
        }

        let timings = phases.iter().map(|p| p.timing.clone()).collect();
        TemporalParseResult {
            timings,
            is_titration: true,
            confidence: if warnings.is_empty() { 0.9 } else { 0.6 },
            phases: Some(phases),
            warnings,
        }
    }

    fn parse_sequence(items: &[FrequencyInput]) -> TemporalParseResult {
        let mut phases = Vec::new();
        let mut warnings = Vec::new();
        let mut maintenance_count = 0;

        for (index, item) in items.iter().enumerate() {
            let description = match item {
                FrequencyInput::Text(t) => t.clone(),
                FrequencyInput::Structured(_) => format!("phase {index}"),
                FrequencyInput::Sequence(_) => {
                    warnings.push(format!("phase {index} is itself a sequence; flattening is not supported"));
                    continue;
                }
            };
            let phase = match item {
                FrequencyInput::Text(t) => Self::parse_phase(t, index as u32),
                FrequencyInput::Structured(timing) => Ok(ParsedPhase {
                    sequence_index: index as u32,
                    description,
                    frequency_phrase: Self::describe(&timing.repeat),
                    timing: timing.clone(),
                    duration: Duration::bounded(1.0, DurationUnit::Week),
                    is_maintenance_phase: index == items.len() - 1,
                }),
                FrequencyInput::Sequence(_) => continue,
            };
            match phase {
                Ok(p) => {
                    if p.is_maintenance_phase {
                        maintenance_count += 1;
                    }
                    phases.push(p);
                }
                Err(reason) => warnings.push(reason),
            }
        }

        if maintenance_count == 0 && !phases.is_empty() {
            if let Some(last) = phases.last_mut() {
                last.is_maintenance_phase = true;
                last.duration = Duration::Unbounded;
            }
        }

        let timings = phases.iter().map(|p| p.timing.clone()).collect();
        TemporalParseResult {
            timings,
            is_titration: true,
            confidence: if warnings.is_empty() { 0.85 } else { 0.6 },
            phases: Some(phases),
            warnings,
        }
    }

    /// Splits on `then`, `, then`, `; then`, `.`, and commas immediately
    /// preceding `week N`; discards empty parts; preserves order.
    pub fn split_phases(text: &str) -> Vec<String> {
        let comma_split = split_comma_before_week_re().replace_all(text, "|");
        let normalized = comma_split
            .replace(";then", "|")
            .replace("; then", "|")
            .replace(",then", "|")
            .replace(", then", "|")
            .replace(" then ", "|")
            .replace('.', "|");
        normalized
            .split('|')
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string())
            .collect()
    }

    fn parse_phase(phrase: &str, sequence_index: u32) -> Result<ParsedPhase, String> {
        let (duration, is_maintenance) = if let Some(caps) = week_range_re().captures(phrase) {
            let start: f64 = caps[1].parse().unwrap_or(1.0);
            let end: f64 = caps[2].parse().unwrap_or(start);
            (Duration::bounded(end - start + 1.0, DurationUnit::Week), false)
        } else if week_plus_re().is_match(phrase) {
            (Duration::Unbounded, true)
        } else if let Some(caps) = day_range_re().captures(phrase) {
            let start: f64 = caps[1].parse().unwrap_or(1.0);
            let end: f64 = caps[2].parse().unwrap_or(start);
            (Duration::bounded(end - start + 1.0, DurationUnit::Day), false)
        } else if day_plus_re().is_match(phrase) {
            (Duration::Unbounded, true)
        } else {
            (Duration::bounded(1.0, DurationUnit::Day), false)
        };

        let (mut repeat, _confidence) = Self::match_frequency(phrase).unwrap_or((
            TimingRepeat::new(1, 1.0, DurationUnit::Day),
            0.6,
        ));

        if let Some(days) = duration.as_days() {
            let count = (repeat.frequency as f64 * (days / repeat.period / repeat.period_unit.days_factor())).round() as u32;
            repeat.count = Some(count.max(repeat.frequency));
            repeat.bounds_duration = Some(BoundsDuration {
                value: duration.as_days().unwrap_or(days),
                unit: DurationUnit::Day,
            });
        }

        Ok(ParsedPhase {
            sequence_index,
            description: phrase.to_string(),
            frequency_phrase: Self::describe(&repeat),
            timing: Timing { repeat },
            duration,
            is_maintenance_phase: is_maintenance,
        })
    }

    /// Matches `text` against the canonical frequency table, returning the
    /// repeat and its confidence per §4.4.
    fn match_frequency(text: &str) -> Option<(TimingRepeat, f64)> {
        let lower = text.to_lowercase();
        let direct = [
            ("once daily", TimingRepeat::new(1, 1.0, DurationUnit::Day)),
            ("twice daily", TimingRepeat::new(2, 1.0, DurationUnit::Day)),
            ("three times daily", TimingRepeat::new(3, 1.0, DurationUnit::Day)),
            ("four times daily", TimingRepeat::new(4, 1.0, DurationUnit::Day)),
            ("once weekly", TimingRepeat::new(1, 1.0, DurationUnit::Week)),
            ("twice weekly", TimingRepeat::new(2, 1.0, DurationUnit::Week)),
            ("every other day", TimingRepeat::new(1, 2.0, DurationUnit::Day)),
        ];
        for (pattern, repeat) in direct {
            if lower.contains(pattern) {
                return Some((repeat, 0.9));
            }
        }

        if let Some(caps) = every_n_hours_re().captures(&lower) {
            let n: f64 = caps[1].parse().ok()?;
            return Some((TimingRepeat::new(1, n, DurationUnit::Hour), 0.8));
        }

        if let Some(caps) = times_per_period_re().captures(&lower) {
            let n: u32 = caps[1].parse().ok()?;
            let unit = match &caps[2] {
                "daily" => DurationUnit::Day,
                "weekly" => DurationUnit::Week,
                "monthly" => DurationUnit::Month,
                _ => return None,
            };
            return Some((TimingRepeat::new(n, 1.0, unit), 0.8));
        }

        None
    }

    /// Doses implied by `timing` over one instance of `period` (used by the
    /// days-supply engine, e.g. `period = Duration::bounded(1, Day)`).
    pub fn doses_per_period(timing: &Timing, period_days: f64) -> f64 {
        timing.repeat.doses_per_day() * period_days
    }

    /// Renders a `TimingRepeat` back to the human phrase it would have
    /// matched from in the canonical table (the inverse of
    /// `match_frequency`), falling back to a generic "N times per period"
    /// phrase for anything outside the table.
    pub fn describe(repeat: &TimingRepeat) -> String {
        match (repeat.frequency, repeat.period, repeat.period_unit) {
            (1, p, DurationUnit::Day) if p == 1.0 => "once daily".to_string(),
            (2, p, DurationUnit::Day) if p == 1.0 => "twice daily".to_string(),
            (3, p, DurationUnit::Day) if p == 1.0 => "three times daily".to_string(),
            (4, p, DurationUnit::Day) if p == 1.0 => "four times daily".to_string(),
            (1, p, DurationUnit::Week) if p == 1.0 => "once weekly".to_string(),
            (2, p, DurationUnit::Week) if p == 1.0 => "twice weekly".to_string(),
            (1, p, DurationUnit::Day) if p == 2.0 => "every other day".to_string(),
            (1, p, DurationUnit::Hour) => format!("every {} hours", p as i64),
            (f, p, unit) => format!("{f} times per {p} {}", unit.code()),
        }
    }
}
