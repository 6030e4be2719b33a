//! Localized text resolution
//!
//! Game text files map `(language, page, id)` to template strings which may
//! embed `{page,id}` references to other entries. Templates are collected
//! from every localization file first, then resolved in a second pass so
//! forward references within and across files work.

mod lookup;

pub use lookup::TextLookup;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::collections::HashMap;

/// Maximum nesting of `{page,id}` references before resolution gives up
pub const MAX_REFERENCE_DEPTH: usize = 8;

/// Language used until the game's `lang.dat` says otherwise (English)
pub const DEFAULT_LANGUAGE: u16 = 44;

static TEXT_REFERENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\s*(\d+)\s*,\s*(\d+)\s*\}").expect("valid text reference regex"));

const FIELD_BITS: u32 = 24;
const FIELD_MASK: u64 = (1 << FIELD_BITS) - 1;

/// Identity of one text row, packed into a single integer key as
/// `[16 bits language][24 bits page][24 bits id]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextKey {
    pub language: u16,
    pub page: u32,
    pub id: u32,
}

impl TextKey {
    /// Returns `None` when page or id do not fit their 24-bit fields
    pub fn new(language: u16, page: u32, id: u32) -> Option<Self> {
        let fits = u64::from(page) <= FIELD_MASK && u64::from(id) <= FIELD_MASK;
        fits.then_some(Self { language, page, id })
    }

    pub fn pack(self) -> i64 {
        let key = (u64::from(self.language) << (2 * FIELD_BITS))
            | (u64::from(self.page) << FIELD_BITS)
            | u64::from(self.id);
        key as i64
    }

    pub fn unpack(key: i64) -> Self {
        let key = key as u64;
        Self {
            language: (key >> (2 * FIELD_BITS)) as u16,
            page: ((key >> FIELD_BITS) & FIELD_MASK) as u32,
            id: (key & FIELD_MASK) as u32,
        }
    }
}

/// Unresolved templates, per language
#[derive(Debug, Default)]
pub struct RawTexts {
    languages: HashMap<u16, HashMap<(u32, u32), String>>,
}

impl RawTexts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a template. Zero page or id entries are ignored.
    pub fn insert(&mut self, language: u16, page: u32, id: u32, value: impl Into<String>) -> bool {
        if language == 0 || page == 0 || id == 0 {
            return false;
        }
        self.languages
            .entry(language)
            .or_default()
            .insert((page, id), value.into());
        true
    }

    pub fn get(&self, language: u16, page: u32, id: u32) -> Option<&str> {
        self.languages
            .get(&language)
            .and_then(|entries| entries.get(&(page, id)))
            .map(|s| s.as_str())
    }

    /// Languages present, ascending
    pub fn languages(&self) -> Vec<u16> {
        let mut languages: Vec<u16> = self.languages.keys().copied().collect();
        languages.sort_unstable();
        languages
    }

    /// `(page, id)` pairs of one language, ascending
    pub fn keys(&self, language: u16) -> Vec<(u32, u32)> {
        let mut keys: Vec<(u32, u32)> = self
            .languages
            .get(&language)
            .map(|entries| entries.keys().copied().collect())
            .unwrap_or_default();
        keys.sort_unstable();
        keys
    }

    pub fn entry_count(&self, language: u16) -> usize {
        self.languages.get(&language).map_or(0, |e| e.len())
    }

    pub fn len(&self) -> usize {
        self.languages.values().map(|e| e.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The language with the most entries; ties go to the lowest id
    pub fn majority_language(&self) -> Option<u16> {
        self.languages()
            .into_iter()
            .max_by(|a, b| {
                self.entry_count(*a)
                    .cmp(&self.entry_count(*b))
                    .then_with(|| b.cmp(a))
            })
    }
}

/// Resolves templates of one language, memoizing every `(page, id)` it
/// visits for the lifetime of the resolver
pub struct Resolver<'a> {
    raw: &'a RawTexts,
    language: u16,
    memo: HashMap<(u32, u32), String>,
}

impl<'a> Resolver<'a> {
    pub fn new(raw: &'a RawTexts, language: u16) -> Self {
        Self {
            raw,
            language,
            memo: HashMap::new(),
        }
    }

    pub fn language(&self) -> u16 {
        self.language
    }

    /// Fully expanded and cleaned text, "" when missing
    pub fn resolve(&mut self, page: u32, id: u32) -> String {
        self.resolve_at(page, id, 0)
    }

    fn resolve_at(&mut self, page: u32, id: u32, depth: usize) -> String {
        if depth > MAX_REFERENCE_DEPTH {
            return String::new();
        }
        if let Some(cached) = self.memo.get(&(page, id)) {
            return cached.clone();
        }

        let raw = self.raw;
        let Some(template) = raw.get(self.language, page, id) else {
            self.memo.insert((page, id), String::new());
            return String::new();
        };

        let expanded = TEXT_REFERENCE.replace_all(template, |caps: &Captures| {
            let ref_page: u32 = caps[1].parse().unwrap_or(0);
            let ref_id: u32 = caps[2].parse().unwrap_or(0);
            if ref_page == 0 || ref_id == 0 {
                return String::new();
            }
            self.resolve_at(ref_page, ref_id, depth + 1)
        });

        let refined = normalize_whitespace(&remove_unescaped_parentheses(&expanded));
        self.memo.insert((page, id), refined.clone());
        refined
    }
}

/// Drop every segment enclosed in unescaped parentheses (nesting aware).
/// `\(` and `\)` survive as literal parentheses without the backslash.
pub fn remove_unescaped_parentheses(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut depth = 0usize;
    let mut prev: Option<char> = None;

    for c in input.chars() {
        let escaped = prev == Some('\\');
        prev = Some(c);

        match c {
            '(' if !escaped => depth += 1,
            ')' if !escaped => depth = depth.saturating_sub(1),
            _ if depth > 0 => {}
            '(' | ')' => {
                if out.ends_with('\\') {
                    out.pop();
                }
                out.push(c);
            }
            _ => out.push(c),
        }
    }

    out
}

/// Line breaks become spaces, whitespace runs collapse, ends are trimmed
pub fn normalize_whitespace(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}
