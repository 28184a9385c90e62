//! Merge-conflict analysis and resolution.
//!
//! A file is parsed into plain text and conflict regions. Each region gets a
//! proposed [`Resolution`]; a file is only written back once every region has a
//! concrete one. Any proposal that would drop a line only one side wrote is
//! turned into `ManualReview` before it leaves this module.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::sync::LazyLock;
use thiserror::Error;

const OURS_MARKER: &str = "<<<<<<<";
const BASE_MARKER: &str = "|||||||";
const SEPARATOR_MARKER: &str = "=======";
const THEIRS_MARKER: &str = ">>>>>>>";

static ENTRY_KEY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^["']?([A-Za-z0-9_.@/\-]+)["']?\s*[:=]"#).expect("entry key pattern compiles")
});

#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ConflictError {
    #[error("Malformed conflict markers at line {line}: {reason}")]
    MalformedConflictMarkers { line: usize, reason: String },

    #[error("Unresolved conflict regions: {regions:?}")]
    UnresolvedRegions { regions: Vec<usize> },

    #[error("Conflict resolution task failed: {reason}")]
    TaskFailed { reason: String },
}

fn malformed(line: usize, reason: impl Into<String>) -> ConflictError {
    ConflictError::MalformedConflictMarkers {
        line,
        reason: reason.into(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictRegion {
    /// Zero-based position among the file's regions.
    pub index: usize,
    /// One-based line of the opening marker.
    pub start_line: usize,
    /// One-based line of the closing marker.
    pub end_line: usize,
    pub ours_label: String,
    pub theirs_label: String,
    pub ours: Vec<String>,
    /// Common ancestor, present for diff3-style regions.
    pub base: Option<Vec<String>>,
    pub theirs: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Strategy {
    #[serde(rename = "Keep-Ours")]
    KeepOurs,
    #[serde(rename = "Keep-Theirs")]
    KeepTheirs,
    Combine,
    ManualReview,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Strategy::KeepOurs => "Keep-Ours",
            Strategy::KeepTheirs => "Keep-Theirs",
            Strategy::Combine => "Combine",
            Strategy::ManualReview => "ManualReview",
        };
        f.write_str(name)
    }
}

/// A `ManualReview` resolution never carries text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub strategy: Strategy,
    pub lines: Option<Vec<String>>,
    pub rationale: String,
}

impl Resolution {
    pub fn keep_ours(region: &ConflictRegion, rationale: impl Into<String>) -> Self {
        Self {
            strategy: Strategy::KeepOurs,
            lines: Some(region.ours.clone()),
            rationale: rationale.into(),
        }
    }

    pub fn keep_theirs(region: &ConflictRegion, rationale: impl Into<String>) -> Self {
        Self {
            strategy: Strategy::KeepTheirs,
            lines: Some(region.theirs.clone()),
            rationale: rationale.into(),
        }
    }

    pub fn combine(lines: Vec<String>, rationale: impl Into<String>) -> Self {
        Self {
            strategy: Strategy::Combine,
            lines: Some(lines),
            rationale: rationale.into(),
        }
    }

    pub fn manual_review(rationale: impl Into<String>) -> Self {
        Self {
            strategy: Strategy::ManualReview,
            lines: None,
            rationale: rationale.into(),
        }
    }

    pub fn is_concrete(&self) -> bool {
        self.strategy != Strategy::ManualReview && self.lines.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineEnding {
    Lf,
    CrLf,
}

impl LineEnding {
    fn as_str(&self) -> &'static str {
        match self {
            LineEnding::Lf => "\n",
            LineEnding::CrLf => "\r\n",
        }
    }
}

#[derive(Debug, Clone)]
enum Segment {
    Text(Vec<String>),
    Conflict(ConflictRegion),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Ours,
    Base,
    Theirs,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Marker {
    Ours,
    Base,
    Separator,
    Theirs,
}

/// Exactly seven marker characters, then end of line or a space-separated label.
fn marker(line: &str) -> Option<(Marker, &str)> {
    [
        (OURS_MARKER, Marker::Ours),
        (BASE_MARKER, Marker::Base),
        (SEPARATOR_MARKER, Marker::Separator),
        (THEIRS_MARKER, Marker::Theirs),
    ]
    .into_iter()
    .find_map(|(prefix, kind)| {
        let rest = line.strip_prefix(prefix)?;
        (rest.is_empty() || rest.starts_with(' ')).then(|| (kind, rest.trim()))
    })
}

struct OpenRegion {
    start_line: usize,
    ours_label: String,
    section: Section,
    ours: Vec<String>,
    base: Option<Vec<String>>,
    theirs: Vec<String>,
}

impl OpenRegion {
    fn push(&mut self, line: &str) {
        let target = match self.section {
            Section::Ours => &mut self.ours,
            Section::Base => self.base.get_or_insert_with(Vec::new),
            Section::Theirs => &mut self.theirs,
        };
        target.push(line.to_string());
    }

    fn close(self, index: usize, end_line: usize, theirs_label: &str) -> ConflictRegion {
        ConflictRegion {
            index,
            start_line: self.start_line,
            end_line,
            ours_label: self.ours_label,
            theirs_label: theirs_label.to_string(),
            ours: self.ours,
            base: self.base,
            theirs: self.theirs,
        }
    }
}

/// A conflict-marked file split into text and regions.
#[derive(Debug, Clone)]
pub struct ConflictedFile {
    segments: Vec<Segment>,
    line_ending: LineEnding,
    trailing_newline: bool,
}

impl ConflictedFile {
    pub fn parse(text: &str) -> Result<Self, ConflictError> {
        let line_ending = if text.contains("\r\n") {
            LineEnding::CrLf
        } else {
            LineEnding::Lf
        };

        let mut segments = Vec::new();
        let mut plain: Vec<String> = Vec::new();
        let mut open: Option<OpenRegion> = None;
        let mut region_count = 0;

        for (idx, line) in text.lines().enumerate() {
            let number = idx + 1;
            let Some((kind, label)) = marker(line) else {
                match open.as_mut() {
                    Some(region) => region.push(line),
                    None => plain.push(line.to_string()),
                }
                continue;
            };

            let section = open.as_ref().map(|region| region.section);
            match (section, kind) {
                (None, Marker::Ours) => {
                    if !plain.is_empty() {
                        segments.push(Segment::Text(std::mem::take(&mut plain)));
                    }
                    open = Some(OpenRegion {
                        start_line: number,
                        ours_label: label.to_string(),
                        section: Section::Ours,
                        ours: Vec::new(),
                        base: None,
                        theirs: Vec::new(),
                    });
                }
                (None, Marker::Separator) => plain.push(line.to_string()),
                (None, Marker::Base) => {
                    return Err(malformed(number, "ancestor marker outside a conflict region"))
                }
                (None, Marker::Theirs) => {
                    return Err(malformed(number, "closing marker without an opening marker"))
                }
                (Some(_), Marker::Ours) => {
                    return Err(malformed(number, "nested opening marker"));
                }
                (Some(Section::Ours), Marker::Base) => {
                    if let Some(region) = open.as_mut() {
                        region.section = Section::Base;
                        region.base = Some(Vec::new());
                    }
                }
                (Some(Section::Ours | Section::Base), Marker::Separator) => {
                    if let Some(region) = open.as_mut() {
                        region.section = Section::Theirs;
                    }
                }
                (Some(Section::Theirs), Marker::Theirs) => {
                    if let Some(region) = open.take() {
                        segments.push(Segment::Conflict(region.close(region_count, number, label)));
                        region_count += 1;
                    }
                }
                (Some(Section::Base | Section::Theirs), Marker::Base) => {
                    return Err(malformed(number, "ancestor marker after the ancestor section"));
                }
                (Some(Section::Theirs), Marker::Separator) => {
                    return Err(malformed(number, "second separator in one region"));
                }
                (Some(Section::Ours | Section::Base), Marker::Theirs) => {
                    return Err(malformed(number, "closing marker before the separator"));
                }
            }
        }

        if let Some(region) = open {
            return Err(malformed(region.start_line, "conflict region is never closed"));
        }
        if !plain.is_empty() {
            segments.push(Segment::Text(plain));
        }

        Ok(Self {
            segments,
            line_ending,
            trailing_newline: text.ends_with('\n'),
        })
    }

    pub fn regions(&self) -> impl Iterator<Item = &ConflictRegion> {
        self.segments.iter().filter_map(|segment| match segment {
            Segment::Conflict(region) => Some(region),
            Segment::Text(_) => None,
        })
    }

    pub fn has_conflicts(&self) -> bool {
        self.regions().next().is_some()
    }

    /// Splices resolutions (indexed by region) into the file. Fails listing
    /// every region without a concrete resolution, and every region whose
    /// resolution would drop a line only one side wrote.
    pub fn apply(&self, resolutions: &[Resolution]) -> Result<ResolvedFile, ConflictError> {
        let unresolved: Vec<usize> = self
            .regions()
            .filter(|region| {
                let lines = resolutions
                    .get(region.index)
                    .filter(|resolution| resolution.is_concrete())
                    .and_then(|resolution| resolution.lines.as_deref());
                match lines {
                    None => true,
                    Some(lines) => match dropped_one_sided_line(region, lines) {
                        Some(line) => {
                            tracing::warn!(
                                "⚠️ Region {}: resolution drops '{}', which only one side wrote",
                                region.index,
                                line
                            );
                            true
                        }
                        None => false,
                    },
                }
            })
            .map(|region| region.index)
            .collect();
        if !unresolved.is_empty() {
            return Err(ConflictError::UnresolvedRegions { regions: unresolved });
        }

        let mut output: Vec<&str> = Vec::new();
        let mut spans = Vec::new();
        for segment in &self.segments {
            match segment {
                Segment::Text(lines) => output.extend(lines.iter().map(String::as_str)),
                Segment::Conflict(region) => {
                    let lines = resolutions
                        .get(region.index)
                        .and_then(|resolution| resolution.lines.as_deref())
                        .unwrap_or_default();
                    spans.push(ResolvedSpan {
                        region: region.index,
                        start_line: output.len() + 1,
                        line_count: lines.len(),
                    });
                    output.extend(lines.iter().map(String::as_str));
                }
            }
        }

        let ending = self.line_ending.as_str();
        let mut text = output.join(ending);
        if self.trailing_newline && !output.is_empty() {
            text.push_str(ending);
        }
        Ok(ResolvedFile { text, spans })
    }
}

/// Where a resolved region landed in the output, one-based.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedSpan {
    pub region: usize,
    pub start_line: usize,
    pub line_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedFile {
    pub text: String,
    pub spans: Vec<ResolvedSpan>,
}

pub fn analyze(text: &str) -> Result<Vec<ConflictRegion>, ConflictError> {
    Ok(ConflictedFile::parse(text)?.regions().cloned().collect())
}

pub fn apply(text: &str, resolutions: &[Resolution]) -> Result<ResolvedFile, ConflictError> {
    ConflictedFile::parse(text)?.apply(resolutions)
}

fn is_blank(lines: &[String]) -> bool {
    lines.iter().all(|line| line.trim().is_empty())
}

pub fn propose(region: &ConflictRegion) -> Resolution {
    let proposal = propose_unchecked(region);
    let dropped = proposal
        .lines
        .as_deref()
        .and_then(|lines| dropped_one_sided_line(region, lines));
    match dropped {
        Some(line) => {
            tracing::warn!(
                "⚠️ Region {}: {} would drop '{}', deferring to manual review",
                region.index,
                proposal.strategy,
                line
            );
            Resolution::manual_review(format!(
                "{} would drop '{}', which only one side wrote",
                proposal.strategy, line
            ))
        }
        None => proposal,
    }
}

fn propose_unchecked(region: &ConflictRegion) -> Resolution {
    if region.ours == region.theirs {
        return Resolution::keep_ours(region, "both sides made the same change");
    }

    match (is_blank(&region.ours), is_blank(&region.theirs)) {
        (true, true) => return Resolution::keep_ours(region, "both sides are blank"),
        (true, false) => {
            return Resolution::keep_theirs(region, "ours is empty, keeping the addition from theirs")
        }
        (false, true) => {
            return Resolution::keep_ours(region, "theirs is empty, keeping the addition from ours")
        }
        (false, false) => {}
    }

    match &region.base {
        Some(base) => merge_three_way(region, base),
        None => merge_two_way(region),
    }
}

/// Without an ancestor, the shared prefix and suffix stand in for it and each
/// side's middle is treated as an insertion at the same point.
fn merge_two_way(region: &ConflictRegion) -> Resolution {
    let (ours, theirs) = (&region.ours, &region.theirs);
    let prefix = ours
        .iter()
        .zip(theirs.iter())
        .take_while(|(a, b)| a == b)
        .count();
    let max_suffix = ours.len().min(theirs.len()) - prefix;
    let suffix = ours
        .iter()
        .rev()
        .zip(theirs.iter().rev())
        .take(max_suffix)
        .take_while(|(a, b)| a == b)
        .count();

    let ours_middle = &ours[prefix..ours.len() - suffix];
    let theirs_middle = &theirs[prefix..theirs.len() - suffix];

    if ours_middle.is_empty() {
        return Resolution::keep_theirs(region, "theirs only adds lines to ours");
    }
    if theirs_middle.is_empty() {
        return Resolution::keep_ours(region, "ours only adds lines to theirs");
    }

    match disjoint_entries(ours_middle, theirs_middle) {
        Ok(()) => {
            let mut lines = ours[..prefix].to_vec();
            lines.extend_from_slice(ours_middle);
            lines.extend_from_slice(theirs_middle);
            lines.extend_from_slice(&ours[ours.len() - suffix..]);
            Resolution::combine(lines, "both sides add distinct named entries, ours first")
        }
        Err(reason) => Resolution::manual_review(format!("both sides change the same lines: {}", reason)),
    }
}

/// One contiguous change against the ancestor: `base[start..end]` becomes
/// `replacement`.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Hunk {
    start: usize,
    end: usize,
    replacement: Vec<String>,
}

impl Hunk {
    fn is_insertion(&self) -> bool {
        self.start == self.end
    }

    fn overlaps(&self, other: &Hunk) -> bool {
        self.start == other.start || (self.start < other.end && other.start < self.end)
    }
}

/// LCS-based line diff from `base` to `side`.
fn diff_hunks(base: &[String], side: &[String]) -> Vec<Hunk> {
    let (n, m) = (base.len(), side.len());
    let mut lcs = vec![vec![0usize; m + 1]; n + 1];
    for i in (0..n).rev() {
        for j in (0..m).rev() {
            lcs[i][j] = if base[i] == side[j] {
                lcs[i + 1][j + 1] + 1
            } else {
                lcs[i + 1][j].max(lcs[i][j + 1])
            };
        }
    }

    let mut hunks = Vec::new();
    let mut current: Option<Hunk> = None;
    let (mut i, mut j) = (0, 0);
    while i < n || j < m {
        if i < n && j < m && base[i] == side[j] {
            hunks.extend(current.take());
            i += 1;
            j += 1;
        } else if j == m || (i < n && lcs[i + 1][j] >= lcs[i][j + 1]) {
            let hunk = current.get_or_insert_with(|| Hunk {
                start: i,
                end: i,
                replacement: Vec::new(),
            });
            hunk.end = i + 1;
            i += 1;
        } else {
            let hunk = current.get_or_insert_with(|| Hunk {
                start: i,
                end: i,
                replacement: Vec::new(),
            });
            hunk.replacement.push(side[j].clone());
            j += 1;
        }
    }
    hunks.extend(current);
    hunks
}

fn apply_hunks(base: &[String], hunks: &[Hunk]) -> Vec<String> {
    let mut lines = Vec::with_capacity(base.len());
    let mut cursor = 0;
    for hunk in hunks {
        lines.extend_from_slice(&base[cursor..hunk.start]);
        lines.extend(hunk.replacement.iter().cloned());
        cursor = hunk.end;
    }
    lines.extend_from_slice(&base[cursor..]);
    lines
}

fn merge_three_way(region: &ConflictRegion, base: &[String]) -> Resolution {
    if region.theirs.as_slice() == base {
        return Resolution::keep_ours(region, "theirs left the ancestor unchanged");
    }
    if region.ours.as_slice() == base {
        return Resolution::keep_theirs(region, "ours left the ancestor unchanged");
    }

    let ours_hunks = diff_hunks(base, &region.ours);
    let mut theirs_hunks = diff_hunks(base, &region.theirs);
    theirs_hunks.retain(|hunk| !ours_hunks.contains(hunk));

    let mut consumed = vec![false; theirs_hunks.len()];
    let mut merged = Vec::with_capacity(ours_hunks.len() + theirs_hunks.len());
    let mut structural = false;

    for ours_hunk in &ours_hunks {
        let overlapping: Vec<usize> = theirs_hunks
            .iter()
            .enumerate()
            .filter(|(_, theirs_hunk)| ours_hunk.overlaps(theirs_hunk))
            .map(|(idx, _)| idx)
            .collect();

        match overlapping.as_slice() {
            [] => merged.push(ours_hunk.clone()),
            [idx] if ours_hunk.is_insertion() && theirs_hunks[*idx].is_insertion() => {
                let theirs_hunk = &theirs_hunks[*idx];
                if let Err(reason) =
                    disjoint_entries(&ours_hunk.replacement, &theirs_hunk.replacement)
                {
                    return Resolution::manual_review(format!(
                        "both sides insert after ancestor line {}: {}",
                        ours_hunk.start, reason
                    ));
                }
                let mut replacement = ours_hunk.replacement.clone();
                replacement.extend(theirs_hunk.replacement.iter().cloned());
                merged.push(Hunk {
                    start: ours_hunk.start,
                    end: ours_hunk.end,
                    replacement,
                });
                consumed[*idx] = true;
                structural = true;
            }
            _ => {
                return Resolution::manual_review(format!(
                    "both sides change ancestor lines {}-{}",
                    ours_hunk.start + 1,
                    ours_hunk.end.max(ours_hunk.start + 1)
                ))
            }
        }
    }

    merged.extend(
        theirs_hunks
            .into_iter()
            .zip(consumed)
            .filter(|(_, used)| !used)
            .map(|(hunk, _)| hunk),
    );
    merged.sort_by_key(|hunk| (hunk.start, hunk.end));

    let rationale = if structural {
        "both sides edit disjoint ancestor lines; concurrent insertions are distinct named entries"
    } else {
        "both sides edit disjoint ancestor lines"
    };
    Resolution::combine(apply_hunks(base, &merged), rationale)
}

/// Name of a list item (`- x`, `* x`, `+ x`) or key/value pair (`key: v`, `key = v`).
fn entry_name(line: &str) -> Option<String> {
    let trimmed = line.trim();
    if let Some(item) = ["- ", "* ", "+ "]
        .iter()
        .find_map(|bullet| trimmed.strip_prefix(bullet))
    {
        let item = item.trim();
        return (!item.is_empty()).then(|| item.to_string());
    }
    ENTRY_KEY_RE
        .captures(trimmed)
        .map(|captures| captures[1].to_string())
}

fn entry_names(lines: &[String]) -> Result<BTreeSet<String>, String> {
    lines
        .iter()
        .filter(|line| !line.trim().is_empty())
        .map(|line| entry_name(line).ok_or_else(|| format!("'{}' is not a named entry", line.trim())))
        .collect()
}

fn disjoint_entries(ours: &[String], theirs: &[String]) -> Result<(), String> {
    let ours_names = entry_names(ours)?;
    let theirs_names = entry_names(theirs)?;
    match ours_names.intersection(&theirs_names).next() {
        Some(shared) => Err(format!("both sides define '{}'", shared)),
        None => Ok(()),
    }
}

/// First non-blank line written by exactly one non-empty side that `output`
/// no longer contains.
fn dropped_one_sided_line(region: &ConflictRegion, output: &[String]) -> Option<String> {
    let kept: HashSet<&str> = output.iter().map(String::as_str).collect();
    let sides = [(&region.ours, &region.theirs), (&region.theirs, &region.ours)];

    sides.into_iter().find_map(|(side, other)| {
        if is_blank(side) {
            return None;
        }
        let reference: HashSet<&str> = region
            .base
            .as_ref()
            .unwrap_or(other)
            .iter()
            .map(String::as_str)
            .collect();
        side.iter()
            .filter(|line| !line.trim().is_empty())
            .find(|line| !reference.contains(line.as_str()) && !kept.contains(line.as_str()))
            .cloned()
    })
}

/// Analysis, proposals and (when possible) the resolved text of one file.
#[derive(Debug, Clone, Serialize)]
pub struct FileResolution {
    pub regions: Vec<ConflictRegion>,
    pub resolutions: Vec<Resolution>,
    pub resolved: Option<ResolvedFile>,
    pub unresolved: Vec<usize>,
}

impl FileResolution {
    pub fn is_resolved(&self) -> bool {
        self.resolved.is_some()
    }
}

/// Regions are proposed in file order and spliced in one pass.
pub fn resolve_text(text: &str) -> Result<FileResolution, ConflictError> {
    let file = ConflictedFile::parse(text)?;
    let regions: Vec<ConflictRegion> = file.regions().cloned().collect();
    let resolutions: Vec<Resolution> = regions.iter().map(propose).collect();

    let (resolved, unresolved) = match file.apply(&resolutions) {
        Ok(resolved) => (Some(resolved), Vec::new()),
        Err(ConflictError::UnresolvedRegions { regions }) => (None, regions),
        Err(other) => return Err(other),
    };

    Ok(FileResolution {
        regions,
        resolutions,
        resolved,
        unresolved,
    })
}

/// Resolves files concurrently. A malformed file yields its own error and
/// never affects the others; output order follows input order.
pub async fn resolve_batch(
    files: Vec<(String, String)>,
) -> Vec<(String, Result<FileResolution, ConflictError>)> {
    let handles: Vec<_> = files
        .into_iter()
        .map(|(path, text)| {
            let handle = tokio::task::spawn_blocking(move || resolve_text(&text));
            (path, handle)
        })
        .collect();

    let mut outcomes = Vec::with_capacity(handles.len());
    for (path, handle) in handles {
        let outcome = handle.await.unwrap_or_else(|e| {
            Err(ConflictError::TaskFailed {
                reason: e.to_string(),
            })
        });
        match &outcome {
            Ok(resolution) => tracing::debug!(
                "🔀 {}: {} region(s), {} unresolved",
                path,
                resolution.regions.len(),
                resolution.unresolved.len()
            ),
            Err(e) => tracing::warn!("⚠️ {}: {}", path, e),
        }
        outcomes.push((path, outcome));
    }
    outcomes
}
