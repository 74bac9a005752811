//! Best-effort published date detection.
//!
//! Sources are tried from most to least explicit: publication meta tags, `<time>`
//! elements, JSON-LD `datePublished`, then a date embedded in the URL path.
use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use regex::Regex;
use scraper::{Html, Selector};
use std::sync::LazyLock;
use thiserror::Error;

/// Earliest year accepted as a publication date
const MIN_YEAR: i32 = 1995;

/// Meta tag names, matched case-insensitively against `property`, `name` and `itemprop`
const META_KEYS: &[&str] = &[
    "article:published_time",
    "og:published_time",
    "datepublished",
    "published_time",
    "publishdate",
    "publish-date",
    "pubdate",
    "parsely-pub-date",
    "sailthru.date",
    "dc.date.issued",
    "dcterms.created",
    "dc.date",
    "dcterms.date",
    "citation_publication_date",
    "date",
];

static META: LazyLock<Selector> = LazyLock::new(|| Selector::parse("meta").unwrap());
static PREFERRED_TIME: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("time[pubdate], time[itemprop=datePublished]").unwrap());
static ANY_TIME: LazyLock<Selector> = LazyLock::new(|| Selector::parse("time[datetime]").unwrap());
static JSON_LD: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"script[type="application/ld+json"]"#).unwrap());

static JSON_LD_DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""datePublished"\s*:\s*"([^"]+)""#).unwrap());
static URL_DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/(\d{4})[/-](\d{1,2})[/-](\d{1,2})(?:[/_.-]|$)").unwrap());
static ISO_DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{4})-(\d{1,2})-(\d{1,2})").unwrap());
/// `5.1.2024.` and `05. 01. 2024`
static EUROPEAN_DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{1,2})\.\s?(\d{1,2})\.\s?(\d{4})").unwrap());

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DateError {
    #[error("no published date found")]
    NotFound,
}

pub fn published_date(document: &Html, url: &str) -> Result<NaiveDate, DateError> {
    from_meta(document)
        .or_else(|| from_time_elements(document))
        .or_else(|| from_json_ld(document))
        .or_else(|| from_url(url))
        .ok_or(DateError::NotFound)
}

fn from_meta(document: &Html) -> Option<NaiveDate> {
    let mut best: Option<(usize, NaiveDate)> = None;

    for element in document.select(&META) {
        let attrs = element.value();
        let Some(content) = attrs.attr("content").or_else(|| attrs.attr("datetime")) else {
            continue;
        };
        let rank = ["property", "name", "itemprop"]
            .iter()
            .filter_map(|key| attrs.attr(key))
            .filter_map(|value| {
                let value = value.to_lowercase();
                META_KEYS.iter().position(|key| *key == value)
            })
            .min();
        let (Some(rank), Some(date)) = (rank, parse_date(content)) else {
            continue;
        };
        if best.map_or(true, |(best_rank, _)| rank < best_rank) {
            best = Some((rank, date));
        }
    }

    best.map(|(_, date)| date)
}

fn from_time_elements(document: &Html) -> Option<NaiveDate> {
    document
        .select(&PREFERRED_TIME)
        .chain(document.select(&ANY_TIME))
        .find_map(|element| {
            let value = element.value();
            value
                .attr("datetime")
                .and_then(parse_date)
                .or_else(|| parse_date(&element.text().collect::<String>()))
        })
}

fn from_json_ld(document: &Html) -> Option<NaiveDate> {
    document.select(&JSON_LD).find_map(|script| {
        let body = script.text().collect::<String>();
        JSON_LD_DATE_RE
            .captures(&body)
            .and_then(|captures| captures.get(1))
            .and_then(|value| parse_date(value.as_str()))
    })
}

fn from_url(url: &str) -> Option<NaiveDate> {
    let captures = URL_DATE_RE.captures(url)?;
    ymd(&captures[1], &captures[2], &captures[3])
}

/// Parse the common date spellings found in publication metadata
fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Some(captures) = ISO_DATE_RE.captures(raw) {
        return ymd(&captures[1], &captures[2], &captures[3]);
    }

    if let Some(captures) = EUROPEAN_DATE_RE.captures(raw) {
        return ymd(&captures[3], &captures[2], &captures[1]);
    }

    DateTime::parse_from_rfc2822(raw)
        .ok()
        .map(|datetime| datetime.date_naive())
        .filter(|date| plausible(*date))
}

fn ymd(year: &str, month: &str, day: &str) -> Option<NaiveDate> {
    let date = NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, day.parse().ok()?)?;
    plausible(date).then_some(date)
}

fn plausible(date: NaiveDate) -> bool {
    let latest = Utc::now().date_naive() + Duration::days(1);
    date.year() >= MIN_YEAR && date <= latest
}
