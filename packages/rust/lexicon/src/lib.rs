//! Static pattern library for the pearl pipeline.
//!
//! The library is plain data (`lexicon.default.toml`, embedded at compile
//! time, optionally overridden by a user file). It is deserialized into a
//! [`LexiconSpec`] and compiled once into an immutable [`Lexicon`] that every
//! stage receives by reference. A pattern that fails to compile is fatal.

pub mod spec;

use std::collections::HashMap;
use std::path::Path;

use regex::{Regex, RegexBuilder};
use tracing::{debug, instrument};

use keypearls_shared::{Category, LexiconConfig, PearlError, Result, Scenario, SemanticType};

pub use spec::{LexiconSpec, SectionsSpec, ShapeWeights};

/// The built-in library, embedded at compile time.
pub const DEFAULT_LEXICON: &str = include_str!("lexicon.default.toml");

// ---------------------------------------------------------------------------
// Compiled matchers
// ---------------------------------------------------------------------------

/// A compiled regex with its weight.
#[derive(Debug, Clone)]
pub struct WeightedPattern {
    regex: Regex,
    weight: f64,
}

impl WeightedPattern {
    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }

    pub fn weight(&self) -> f64 {
        self.weight
    }
}

/// Sum the weights of every pattern that matches `text` (each counts once).
pub fn pattern_sum(patterns: &[WeightedPattern], text: &str) -> f64 {
    patterns
        .iter()
        .filter(|p| p.is_match(text))
        .map(WeightedPattern::weight)
        .sum()
}

#[derive(Debug, Clone)]
pub struct CategoryRule {
    pub category: Category,
    patterns: Vec<WeightedPattern>,
}

/// Winning category for a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CategoryMatch {
    pub category: Category,
    /// Summed weight of the category's matching patterns.
    pub weight: u32,
    /// Byte range of the first hit of the heaviest matching pattern.
    pub anchor: (usize, usize),
}

#[derive(Debug, Clone)]
pub struct ScoringTables {
    pub actionability: Vec<WeightedPattern>,
    pub specificity: Vec<WeightedPattern>,
    pub clarity: Vec<WeightedPattern>,
    pub completeness: Vec<WeightedPattern>,
    pub decision_value: Vec<WeightedPattern>,
    pub shape: ShapeWeights,
    gotcha: Vec<Regex>,
    bare_list_marker: Regex,
    citation_only: Vec<Regex>,
}

impl ScoringTables {
    pub fn is_bare_list_marker(&self, text: &str) -> bool {
        self.bare_list_marker.is_match(text)
    }

    pub fn is_citation_only(&self, text: &str) -> bool {
        any_match(&self.citation_only, text)
    }

    pub fn is_gotcha(&self, text: &str) -> bool {
        any_match(&self.gotcha, text)
    }
}

#[derive(Debug, Clone)]
pub struct Make {
    pub name: String,
    aliases: Regex,
    models: Vec<(String, Regex)>,
}

impl Make {
    pub fn model_names(&self) -> impl Iterator<Item = &str> {
        self.models.iter().map(|(name, _)| name.as_str())
    }
}

/// A platform or generation code with its production span.
#[derive(Debug, Clone)]
pub struct Codename {
    pub code: String,
    pub make: String,
    pub model: String,
    pub start: u16,
    pub end: u16,
    regex: Regex,
}

#[derive(Debug, Clone)]
struct Tool {
    name: String,
    regex: Regex,
}

// ---------------------------------------------------------------------------
// Lexicon
// ---------------------------------------------------------------------------

/// Immutable, compiled pattern library.
#[derive(Debug, Clone)]
pub struct Lexicon {
    categories: Vec<CategoryRule>,
    table_keywords: Vec<String>,
    scoring: ScoringTables,
    semantic_types: Vec<(SemanticType, Vec<Regex>)>,
    sections: SectionsSpec,
    makes: Vec<Make>,
    year_make: Option<Regex>,
    alias_index: HashMap<String, usize>,
    codenames: Vec<Codename>,
    platforms: Vec<Regex>,
    scenarios: Vec<(Scenario, Vec<Regex>)>,
    procedure_cues: Vec<Regex>,
    background_cues: Vec<Regex>,
    tools: Vec<Tool>,
    negative_claims: Vec<Regex>,
    workarounds: Vec<Regex>,
    identifiers: Vec<Regex>,
}

impl Lexicon {
    /// Compile the embedded default library.
    pub fn builtin() -> Result<Self> {
        Self::from_toml(DEFAULT_LEXICON, "built-in lexicon")
    }

    /// Load and compile a library from a TOML file.
    #[instrument(skip_all, fields(path = %path.display()))]
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| PearlError::io(path, e))?;
        Self::from_toml(&content, &path.display().to_string())
    }

    /// The user override named in config, or the built-in library.
    pub fn resolve(config: &LexiconConfig) -> Result<Self> {
        match &config.path {
            Some(path) => Self::load(Path::new(path)),
            None => Self::builtin(),
        }
    }

    pub fn from_toml(src: &str, origin: &str) -> Result<Self> {
        let spec: LexiconSpec = toml::from_str(src)
            .map_err(|e| PearlError::Lexicon(format!("failed to parse {origin}: {e}")))?;
        Self::compile(&spec)
    }

    /// Compile every pattern in `spec`.
    pub fn compile(spec: &LexiconSpec) -> Result<Self> {
        if spec.categories.is_empty() {
            return Err(PearlError::Lexicon("no categories defined".into()));
        }

        let categories = spec
            .categories
            .iter()
            .map(|c| -> Result<CategoryRule> {
                Ok(CategoryRule {
                    category: c.category,
                    patterns: compile_weighted(&c.patterns, c.category.as_str())?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let s = &spec.scoring;
        let scoring = ScoringTables {
            actionability: compile_weighted(&s.actionability, "scoring.actionability")?,
            specificity: compile_weighted(&s.specificity, "scoring.specificity")?,
            clarity: compile_weighted(&s.clarity, "scoring.clarity")?,
            completeness: compile_weighted(&s.completeness, "scoring.completeness")?,
            decision_value: compile_weighted(&s.decision_value, "scoring.decision_value")?,
            shape: s.shape.clone(),
            gotcha: compile_all(&s.gotcha, "scoring.gotcha")?,
            bare_list_marker: compile(&s.bare_list_marker, false, "scoring.bare_list_marker")?,
            citation_only: compile_all(&s.citation_only, "scoring.citation_only")?,
        };

        let semantic_types = spec
            .semantic_types
            .iter()
            .map(|t| -> Result<(SemanticType, Vec<Regex>)> {
                Ok((t.semantic_type, compile_all(&t.keywords, t.semantic_type.as_str())?))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut makes = Vec::with_capacity(spec.makes.len());
        let mut alias_index = HashMap::new();
        for (idx, m) in spec.makes.iter().enumerate() {
            if m.aliases.is_empty() {
                return Err(PearlError::Lexicon(format!("make {} has no aliases", m.name)));
            }
            for alias in &m.aliases {
                alias_index.insert(alias.to_lowercase(), idx);
            }
            // Longest model names first so "Grand Cherokee" wins over "Cherokee".
            let mut model_names = m.models.clone();
            model_names.sort_by_key(|name| std::cmp::Reverse(name.len()));
            let models = model_names
                .into_iter()
                .map(|name| -> Result<(String, Regex)> {
                    let regex = compile(&word_alternation(&[name.as_str()]), false, &m.name)?;
                    Ok((name, regex))
                })
                .collect::<Result<Vec<_>>>()?;
            let aliases: Vec<&str> = m.aliases.iter().map(String::as_str).collect();
            makes.push(Make {
                name: m.name.clone(),
                aliases: compile(&word_alternation(&aliases), false, &m.name)?,
                models,
            });
        }

        let year_make = if alias_index.is_empty() {
            None
        } else {
            let mut aliases: Vec<&str> = alias_index.keys().map(String::as_str).collect();
            aliases.sort_by(|a, b| b.len().cmp(&a.len()).then(a.cmp(b)));
            let alternation = aliases
                .iter()
                .map(|a| regex::escape(a))
                .collect::<Vec<_>>()
                .join("|");
            let pattern = format!(
                r"\b((?:19|20)\d{{2}})(?:\s*[-–]\s*(?:(?:19|20)\d{{2}}|\d{{2}}))?\s+({alternation})\b"
            );
            Some(compile(&pattern, false, "year-make")?)
        };

        let codenames = spec
            .vehicles
            .codenames
            .iter()
            .map(|c| -> Result<Codename> {
                if !spec.makes.iter().any(|m| m.name == c.make) {
                    return Err(PearlError::Lexicon(format!(
                        "codename {} names unknown make {}",
                        c.code, c.make
                    )));
                }
                if c.start > c.end {
                    return Err(PearlError::Lexicon(format!(
                        "codename {} has start year after end year",
                        c.code
                    )));
                }
                Ok(Codename {
                    code: c.code.clone(),
                    make: c.make.clone(),
                    model: c.model.clone(),
                    start: c.start,
                    end: c.end,
                    regex: compile(&word_alternation(&[c.code.as_str()]), false, &c.code)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let p = &spec.procedures;
        let scenarios = p
            .scenarios
            .iter()
            .map(|sc| -> Result<(Scenario, Vec<Regex>)> {
                Ok((sc.scenario, compile_all(&sc.keywords, sc.scenario.as_str())?))
            })
            .collect::<Result<Vec<_>>>()?;
        let tools = p
            .tools
            .iter()
            .map(|t| -> Result<Tool> {
                Ok(Tool {
                    name: t.name.clone(),
                    regex: compile(&t.pattern, false, &t.name)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let identifiers = spec
            .repair
            .identifiers
            .iter()
            .map(|i| compile(&i.pattern, i.case_sensitive, "repair.identifiers"))
            .collect::<Result<Vec<_>>>()?;

        let lexicon = Self {
            categories,
            table_keywords: spec
                .extract
                .table_keywords
                .iter()
                .map(|k| k.to_lowercase())
                .collect(),
            scoring,
            semantic_types,
            sections: spec.sections.clone(),
            makes,
            year_make,
            alias_index,
            codenames,
            platforms: compile_all(&spec.vehicles.platforms, "vehicles.platforms")?,
            scenarios,
            procedure_cues: compile_all(&p.procedure_cues, "procedures.procedure_cues")?,
            background_cues: compile_all(&p.background_cues, "procedures.background_cues")?,
            tools,
            negative_claims: compile_all(&spec.repair.negative_claims, "repair.negative_claims")?,
            workarounds: compile_all(&spec.repair.workarounds, "repair.workarounds")?,
            identifiers,
        };

        debug!(
            categories = lexicon.categories.len(),
            makes = lexicon.makes.len(),
            codenames = lexicon.codenames.len(),
            tools = lexicon.tools.len(),
            "lexicon compiled"
        );

        Ok(lexicon)
    }

    // -- extraction ---------------------------------------------------------

    /// First category (in library order) with any matching pattern.
    pub fn categorize(&self, text: &str) -> Option<CategoryMatch> {
        self.categories.iter().find_map(|rule| {
            let mut weight = 0.0;
            let mut anchor: Option<(f64, (usize, usize))> = None;
            for pattern in &rule.patterns {
                let Some(m) = pattern.regex.find(text) else {
                    continue;
                };
                weight += pattern.weight;
                if anchor.is_none_or(|(w, _)| pattern.weight > w) {
                    anchor = Some((pattern.weight, (m.start(), m.end())));
                }
            }
            anchor.map(|(_, range)| CategoryMatch {
                category: rule.category,
                weight: weight.round().max(0.0) as u32,
                anchor: range,
            })
        })
    }

    /// Whether any header cell names a domain keyword.
    pub fn is_keyword_table(&self, header: &[String]) -> bool {
        header.iter().any(|cell| {
            let cell = cell.to_lowercase();
            self.table_keywords.iter().any(|k| cell.contains(k.as_str()))
        })
    }

    // -- scoring ------------------------------------------------------------

    pub fn scoring(&self) -> &ScoringTables {
        &self.scoring
    }

    // -- classification -----------------------------------------------------

    /// Keyword hits per semantic type, in priority order.
    pub fn semantic_hits(&self, text: &str) -> Vec<(SemanticType, usize)> {
        self.semantic_types
            .iter()
            .map(|(ty, keywords)| (*ty, keywords.iter().filter(|k| k.is_match(text)).count()))
            .collect()
    }

    pub fn section_for(&self, semantic_type: SemanticType) -> &str {
        self.sections.get(semantic_type)
    }

    /// Byte ranges of generic platform/module mentions.
    pub fn platform_spans(&self, text: &str) -> Vec<(usize, usize)> {
        let mut spans: Vec<(usize, usize)> = self
            .platforms
            .iter()
            .flat_map(|p| p.find_iter(text).map(|m| (m.start(), m.end())))
            .collect();
        spans.sort_unstable();
        spans
    }

    // -- vehicles -----------------------------------------------------------

    pub fn makes(&self) -> &[Make] {
        &self.makes
    }

    /// Canonical name for a make alias (`"chevy"` → `"Chevrolet"`).
    pub fn canonical_make(&self, alias: &str) -> Option<&str> {
        self.alias_index
            .get(&alias.to_lowercase())
            .map(|&idx| self.makes[idx].name.as_str())
    }

    /// Alias hit count per make, in library order; zero counts omitted.
    pub fn make_counts(&self, text: &str) -> Vec<(&str, usize)> {
        self.makes
            .iter()
            .filter_map(|m| {
                let count = m.aliases.find_iter(text).count();
                (count > 0).then_some((m.name.as_str(), count))
            })
            .collect()
    }

    /// The make mentioned earliest in `text`.
    pub fn first_make(&self, text: &str) -> Option<&str> {
        self.makes
            .iter()
            .filter_map(|m| m.aliases.find(text).map(|hit| (hit.start(), m.name.as_str())))
            .min_by_key(|(pos, _)| *pos)
            .map(|(_, name)| name)
    }

    /// `(make, model)` pairs for every model named in `text`, in library order.
    ///
    /// A model nested inside a longer model name of the same make is skipped.
    pub fn models_in(&self, text: &str) -> Vec<(&str, &str)> {
        let mut found = Vec::new();
        for make in &self.makes {
            let mut taken: Vec<(usize, usize)> = Vec::new();
            for (name, regex) in &make.models {
                for hit in regex.find_iter(text) {
                    if taken.iter().any(|&(s, e)| hit.start() >= s && hit.end() <= e) {
                        continue;
                    }
                    taken.push((hit.start(), hit.end()));
                    if !found.iter().any(|&(mk, md)| mk == make.name && md == name.as_str()) {
                        found.push((make.name.as_str(), name.as_str()));
                    }
                }
            }
        }
        found
    }

    /// Explicit "<year> <make>" compounds, e.g. "2020 Toyota" or "2019-2021 Honda".
    pub fn year_make_pairs(&self, text: &str) -> Vec<(u16, &str)> {
        let Some(regex) = &self.year_make else {
            return Vec::new();
        };
        let mut pairs = Vec::new();
        for caps in regex.captures_iter(text) {
            let year = caps.get(1).and_then(|m| m.as_str().parse::<u16>().ok());
            let make = caps.get(2).and_then(|m| self.canonical_make(m.as_str()));
            if let (Some(year), Some(make)) = (year, make) {
                if !pairs.contains(&(year, make)) {
                    pairs.push((year, make));
                }
            }
        }
        pairs
    }

    /// The codename mentioned earliest in `text`.
    pub fn find_codename(&self, text: &str) -> Option<&Codename> {
        self.codenames
            .iter()
            .filter_map(|c| c.regex.find(text).map(|hit| (hit.start(), c)))
            .min_by_key(|(pos, _)| *pos)
            .map(|(_, c)| c)
    }

    // -- procedures ---------------------------------------------------------

    /// First scenario (in priority order) with a keyword hit.
    pub fn scenario_for(&self, text: &str) -> Option<Scenario> {
        self.scenarios
            .iter()
            .find(|(_, keywords)| any_match(keywords, text))
            .map(|(scenario, _)| *scenario)
    }

    pub fn is_procedural_heading(&self, heading: &str) -> bool {
        any_match(&self.procedure_cues, heading)
    }

    pub fn is_background_heading(&self, heading: &str) -> bool {
        any_match(&self.background_cues, heading)
    }

    /// Names of the tools mentioned in `text`, in library order.
    pub fn tools_in(&self, text: &str) -> Vec<&str> {
        self.tools
            .iter()
            .filter(|t| t.regex.is_match(text))
            .map(|t| t.name.as_str())
            .collect()
    }

    // -- repair -------------------------------------------------------------

    pub fn is_negative_claim(&self, text: &str) -> bool {
        any_match(&self.negative_claims, text)
    }

    pub fn has_workaround(&self, text: &str) -> bool {
        any_match(&self.workarounds, text)
    }

    /// Identifier substrings (part numbers, frequencies, tool names) in
    /// order of appearance. A hit nested inside a longer hit is dropped.
    pub fn identifiers_in(&self, text: &str) -> Vec<String> {
        let mut hits: Vec<(usize, usize)> = self
            .identifiers
            .iter()
            .chain(self.tools.iter().map(|t| &t.regex))
            .flat_map(|r| r.find_iter(text).map(|m| (m.start(), m.end())))
            .collect();
        hits.sort_by(|a, b| a.0.cmp(&b.0).then(b.1.cmp(&a.1)));

        let mut out: Vec<String> = Vec::new();
        let mut covered_to = 0;
        for (start, end) in hits {
            if end <= covered_to {
                continue;
            }
            covered_to = covered_to.max(end);
            let hit = &text[start..end];
            if !out.iter().any(|h| h == hit) {
                out.push(hit.to_string());
            }
        }
        out
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn compile(pattern: &str, case_sensitive: bool, context: &str) -> Result<Regex> {
    RegexBuilder::new(pattern)
        .case_insensitive(!case_sensitive)
        .build()
        .map_err(|e| PearlError::Lexicon(format!("{context}: pattern `{pattern}` failed to compile: {e}")))
}

fn compile_all(patterns: &[String], context: &str) -> Result<Vec<Regex>> {
    patterns.iter().map(|p| compile(p, false, context)).collect()
}

fn compile_weighted(patterns: &[spec::PatternSpec], context: &str) -> Result<Vec<WeightedPattern>> {
    patterns
        .iter()
        .map(|p| -> Result<WeightedPattern> {
            Ok(WeightedPattern {
                regex: compile(&p.pattern, p.case_sensitive, context)?,
                weight: p.weight,
            })
        })
        .collect()
}

/// `\b(?:a|b)\b` over escaped literals.
fn word_alternation(words: &[&str]) -> String {
    let escaped: Vec<String> = words.iter().map(|w| regex::escape(w)).collect();
    format!(r"\b(?:{})\b", escaped.join("|"))
}

fn any_match(regexes: &[Regex], text: &str) -> bool {
    regexes.iter().any(|r| r.is_match(text))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn lexicon() -> Lexicon {
        Lexicon::builtin().expect("built-in lexicon compiles")
    }

    const MINIMAL: &str = r#"
[[categories]]
category = "procedure"
patterns = [{ pattern = '\binsert\b', weight = 3 }]

[scoring]
bare_list_marker = '^\s*\d+\.?\s*$'

[[semantic_types]]
semantic_type = "procedure"
keywords = ['\binsert\b']

[sections]
procedure = "steps"
warning = "warnings"
glossary = "glossary"
hardware = "hardware"
tool_guide = "tools"
reference = "reference"
"#;

    #[test]
    fn builtin_compiles() {
        let lex = lexicon();
        assert!(!lex.makes().is_empty());
        assert_eq!(lex.section_for(SemanticType::Hardware), "hardware_specs");
    }

    #[test]
    fn categorize_uses_priority_order() {
        let lex = lexicon();
        // Matches both pitfall and procedure patterns; pitfall is listed first.
        let m = lex
            .categorize("Do not turn the ignition off until the light stops blinking.")
            .expect("match");
        assert_eq!(m.category, Category::Pitfall);

        let m = lex
            .categorize("Insert the working key and press the start button.")
            .expect("match");
        assert_eq!(m.category, Category::Procedure);
        assert_eq!(m.anchor.0, 0);

        assert!(lex.categorize("The weather was nice that day.").is_none());
    }

    #[test]
    fn keyword_tables() {
        let lex = lexicon();
        let header = vec!["Item".to_string(), "Part".into(), "Frequency".into()];
        assert!(lex.is_keyword_table(&header));
        assert!(!lex.is_keyword_table(&["Name".to_string(), "Phone".into()]));
    }

    #[test]
    fn vehicle_lookups() {
        let lex = lexicon();
        assert_eq!(lex.canonical_make("Chevy"), Some("Chevrolet"));
        assert_eq!(lex.first_make("a Chevy, then a Ford"), Some("Chevrolet"));
        assert_eq!(lex.models_in("2015 Jeep Grand Cherokee"), vec![("Jeep", "Grand Cherokee")]);
        assert_eq!(
            lex.year_make_pairs("Fits the 2020 Toyota and 2019-2021 Honda."),
            vec![(2020, "Toyota"), (2019, "Honda")]
        );

        let code = lex.find_codename("XV70 smart key").expect("codename");
        assert_eq!((code.model.as_str(), code.start, code.end), ("Camry", 2018, 2024));
        assert!(lex.find_codename("nothing here").is_none());
    }

    #[test]
    fn make_counts_only_reports_hits() {
        let lex = lexicon();
        let counts = lex.make_counts("Toyota and Lexus share parts; Toyota keys differ.");
        assert_eq!(counts, vec![("Toyota", 2), ("Lexus", 1)]);
    }

    #[test]
    fn scenario_priority_is_specific_first() {
        let lex = lexicon();
        assert_eq!(lex.scenario_for("All Keys Lost Procedure"), Some(Scenario::Akl));
        assert_eq!(lex.scenario_for("Add Key Procedure"), Some(Scenario::AddKey));
        assert_eq!(lex.scenario_for("AKL with EEPROM backup"), Some(Scenario::Akl));
        assert_eq!(lex.scenario_for("EEPROM dump"), Some(Scenario::EepromBackup));
        assert_eq!(lex.scenario_for("Remote Specifications"), None);
    }

    #[test]
    fn heading_cues() {
        let lex = lexicon();
        assert!(lex.is_procedural_heading("All Keys Lost Procedure"));
        assert!(lex.is_procedural_heading("Step-by-step"));
        assert!(!lex.is_procedural_heading("Remote Specifications"));
        assert!(lex.is_background_heading("Smart Key System Overview"));
    }

    #[test]
    fn tools_and_identifiers() {
        let lex = lexicon();
        let text = "Connect the Autel IM608; the HYQ14FBA fob runs at 315 MHz.";
        assert_eq!(lex.tools_in(text), vec!["Autel IM608"]);
        assert_eq!(
            lex.identifiers_in(text),
            vec!["Autel IM608", "HYQ14FBA", "315 MHz"]
        );
    }

    #[test]
    fn negative_claims_and_workarounds() {
        let lex = lexicon();
        assert!(lex.is_negative_claim("Not possible."));
        assert!(!lex.has_workaround("Not possible."));
        assert!(lex.has_workaround("Dealer only, but you can read the EEPROM instead."));
    }

    #[test]
    fn platforms_are_located() {
        let lex = lexicon();
        let spans = lex.platform_spans("Remove the BCM from the Smart Key ECU bracket.");
        assert_eq!(spans.len(), 2);
    }

    #[test]
    fn minimal_library_loads_from_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("lexicon.toml");
        std::fs::write(&path, MINIMAL).expect("write");

        let lex = Lexicon::load(&path).expect("load");
        assert_eq!(lex.section_for(SemanticType::Procedure), "steps");
        assert!(lex.makes().is_empty());
        assert!(lex.year_make_pairs("2020 Toyota").is_empty());

        let config = LexiconConfig {
            path: Some(path.display().to_string()),
        };
        assert!(Lexicon::resolve(&config).is_ok());
    }

    #[test]
    fn bad_pattern_is_fatal() {
        let broken = MINIMAL.replace(r"'\binsert\b', weight", r"'(unclosed', weight");
        let err = Lexicon::from_toml(&broken, "test").unwrap_err();
        assert!(matches!(err, PearlError::Lexicon(_)));
        assert!(err.to_string().contains("failed to compile"));
    }

    #[test]
    fn malformed_toml_is_fatal() {
        let err = Lexicon::from_toml("[[categories]\n", "test").unwrap_err();
        assert!(err.to_string().contains("failed to parse test"));
    }
}
