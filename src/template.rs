//! Template Engine.
//!
//! A small named-template renderer: each template is a parametric sentence
//! skeleton invoked with a typed data bag. Pluralisation, verb selection,
//! and fractional-dose formatting all happen while the data bag is being
//! assembled — the template itself only concatenates already-final phrases,
//! so rendering is pure string interpolation and therefore deterministic.

use std::fmt;

/// The administration verb a builder selects for its dose form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Take,
    Apply,
    Inject,
    Inhale,
    Insert,
    Instill,
    Place,
    Infuse,
}

impl Verb {
    pub fn as_str(self) -> &'static str {
        match self {
            Verb::Take => "Take",
            Verb::Apply => "Apply",
            Verb::Inject => "Inject",
            Verb::Inhale => "Inhale",
            Verb::Insert => "Insert",
            Verb::Instill => "Instill",
            Verb::Place => "Place",
            Verb::Infuse => "Infuse",
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Which named template to render. Each variant corresponds to one of the
/// registry entries below; `Default` is the catch-all skeleton used when
/// no more specific one applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateName {
    OralTablet,
    LiquidDose,
    Topical,
    NasalSpray,
    Rectal,
    Injection,
    Default,
}

/// Every phrase a template needs, already rendered to its final words (unit
/// pluralisation, fraction glyphs, route text) by the builder that fills it
/// in. The template layer never inspects numbers itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataBag {
    pub verb: Verb,
    pub dose_phrase: String,
    pub route_phrase: String,
    pub frequency_phrase: String,
    /// Appended after the main sentence, before the final period (e.g. a
    /// dual-dose parenthetical, or a PRN qualifier).
    pub trailing_phrase: Option<String>,
}

impl DataBag {
    pub fn new(
        verb: Verb,
        dose_phrase: impl Into<String>,
        route_phrase: impl Into<String>,
        frequency_phrase: impl Into<String>,
    ) -> Self {
        Self {
            verb,
            dose_phrase: dose_phrase.into(),
            route_phrase: route_phrase.into(),
            frequency_phrase: frequency_phrase.into(),
            trailing_phrase: None,
        }
    }

    pub fn with_trailing(mut self, phrase: impl Into<String>) -> Self {
        self.trailing_phrase = Some(phrase.into());
        self
    }
}

pub struct TemplateEngine;

impl TemplateEngine {
    /// Renders `bag` through `name`'s skeleton. Identical inputs always
    /// produce an identical string.
    pub fn render(name: TemplateName, bag: &DataBag) -> String {
        let body = match name {
            TemplateName::OralTablet | TemplateName::Default => format!(
                "{} {} {} {}",
                bag.verb, bag.dose_phrase, bag.route_phrase, bag.frequency_phrase
            ),
            TemplateName::LiquidDose => format!(
                "{} {} {} {}",
                bag.verb, bag.dose_phrase, bag.route_phrase, bag.frequency_phrase
            ),
            TemplateName::Topical => format!(
                "{} {} {} {}",
                bag.verb, bag.dose_phrase, bag.route_phrase, bag.frequency_phrase
            ),
            TemplateName::NasalSpray => format!(
                "{} {} {} {}",
                bag.verb, bag.dose_phrase, bag.route_phrase, bag.frequency_phrase
            ),
            TemplateName::Rectal => format!(
                "{} {} {} {}",
                bag.verb, bag.dose_phrase, bag.route_phrase, bag.frequency_phrase
            ),
            TemplateName::Injection => format!(
                "{} {} {} {}",
                bag.verb, bag.dose_phrase, bag.route_phrase, bag.frequency_phrase
            ),
        };
        let mut sentence = body.split_whitespace().collect::<Vec<_>>().join(" ");
        if let Some(trailing) = &bag.trailing_phrase {
            sentence.push(' ');
            sentence.push_str(trailing);
        }
        sentence.push('.');
        sentence
    }

    /// Unicode-fraction rendering for quarter-tablet doses: whole-number
    /// part plus ¼/½/¾ for the remainder, falling back to a plain decimal
    /// for any other fraction.
    pub fn format_fraction(value: f64) -> String {
        let whole = value.trunc();
        let remainder = value - whole;
        let glyph = if (remainder - 0.25).abs() < 1e-6 {
            Some("¼")
        } else if (remainder - 0.5).abs() < 1e-6 {
            Some("½")
        } else if (remainder - 0.75).abs() < 1e-6 {
            Some("¾")
        } else {
            None
        };

        match glyph {
            Some(g) if whole == 0.0 => g.to_string(),
            Some(g) => format!("{}{}", whole as i64, g),
            None => {
                if remainder.abs() < 1e-9 {
                    format!("{}", whole as i64)
                } else {
                    format!("{value}")
                }
            }
        }
    }
}
