//! Stateful matching over one subject.
//!
//! A [`Matcher`] follows `java.util.regex.Matcher` semantics on top of the
//! engine:
//!
//! - [`find`](Matcher::find) scans for successive matches, stepping one
//!   character past empty matches.
//! - [`matches`](Matcher::matches) requires the whole region to match.
//! - [`looking_at`](Matcher::looking_at) requires a match at the region
//!   start.
//!
//! All three honour the current region. The engine knows nothing of
//! regions; they are emulated by truncating the subject at the region end,
//! starting the search at the region start and, with anchoring bounds on
//! and a region starting past 0, matching a copy of the pattern whose `^`
//! is rebound to the region start. `$` needs no rewrite: the truncated
//! subject ends at the region end, so the engine's `$` matches there, at
//! any nesting depth. Without anchoring bounds the engine is told that the
//! truncated end is not an end of line.
//!
//! After each attempt the matcher records [`hit_end`](Matcher::hit_end) and
//! [`require_end`](Matcher::require_end), approximated from the pattern
//! text.
//!
//! Subject offsets are byte offsets into the `&str` subject and always lie
//! on character boundaries.

use crate::backend;
use crate::engine::options::{
    ANCHORED, ENDANCHORED, ERROR_NOMATCH, ERROR_NOSUBSTRING, NOTEOL, NO_UTF_CHECK, UNSET,
};
use crate::error::{Error, Result, SubstringErrorKind};
use crate::limits;
use crate::pattern::{check_offset, Pattern, SubstituteOptions};
use crate::resources::{Code, MatchContext, MatchData};
use std::fmt;
use std::ops::Range;

/// What an attempt requires of the match position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MatchKind {
    /// Anywhere at or after the start offset.
    Search,
    /// Spanning the whole region.
    WholeString,
    /// Starting at the region start.
    Prefix,
}

/// Matching state for one [`Pattern`] over one subject.
///
/// Created by [`Pattern::matcher`]. A matcher owns its native match data
/// and is meant for one thread; create one per thread from a shared
/// pattern. Offsets are byte offsets into the subject.
///
/// # Example
/// ```rust,ignore
/// use pcre2_compat::Pattern;
///
/// let pattern = Pattern::compile(r"^\w+")?;
/// let mut matcher = pattern.matcher("skip: word rest")?;
///
/// // With anchoring bounds `^` matches at the region start.
/// matcher.region(6, 15)?;
/// assert!(matcher.looking_at()?);
/// assert_eq!(matcher.as_str(), Some("word"));
///
/// // Without them the region start is not a line start.
/// matcher.region(6, 15)?.use_anchoring_bounds(false);
/// assert!(!matcher.find()?);
/// ```
pub struct Matcher<'p, 's> {
    pattern: &'p Pattern,
    subject: &'s str,
    data: MatchData,
    context: Option<MatchContext>,
    ovector: Vec<usize>,
    groups: Vec<Option<(usize, usize)>>,
    region_start: usize,
    region_end: usize,
    anchoring_bounds: bool,
    /// Start of the last match, `None` after a failed attempt.
    first: Option<usize>,
    /// End of the last match; where the next `find` resumes.
    last: usize,
    hit_end: bool,
    require_end: bool,
    /// The engine has validated the subject's UTF-8 once already.
    utf_checked: bool,
}

impl<'p, 's> Matcher<'p, 's> {
    pub(crate) fn new(pattern: &'p Pattern, subject: &'s str) -> Result<Self> {
        let data = MatchData::for_code(pattern.primary_code())?;
        let context = limits::context_for(pattern.engine(), pattern.match_config())?;
        let slots = data.pair_count() as usize * 2;
        Ok(Self {
            pattern,
            subject,
            data,
            context,
            ovector: vec![UNSET; slots],
            groups: Vec::with_capacity(pattern.capture_count() + 1),
            region_start: 0,
            region_end: subject.len(),
            anchoring_bounds: true,
            first: None,
            last: 0,
            hit_end: false,
            require_end: false,
            utf_checked: false,
        })
    }

    /// The pattern this matcher runs.
    pub fn pattern(&self) -> &'p Pattern {
        self.pattern
    }

    pub fn subject(&self) -> &'s str {
        self.subject
    }

    /// Run every subsequent match with `context`, overriding the pattern's
    /// configured and the ambient limits.
    pub fn set_match_context(&mut self, context: MatchContext) -> Result<()> {
        if !backend::same_binding(context.engine(), self.pattern.engine()) {
            return Err(Error::Argument(
                "match context belongs to a different engine binding".to_string(),
            ));
        }
        self.context = Some(context);
        Ok(())
    }

    /// The context matches run with: the explicit one, else one built from
    /// the pattern's configuration or the ambient limits, if any.
    pub fn match_context(&self) -> Option<&MatchContext> {
        self.context.as_ref()
    }

    /// Native match data of the last attempt.
    pub fn match_data(&self) -> &MatchData {
        &self.data
    }

    /// Find the next match in the region.
    ///
    /// Resumes at the end of the previous match, or one character later if
    /// that match was empty.
    pub fn find(&mut self) -> Result<bool> {
        let mut next = self.last;
        if self.first == Some(next) {
            next = self.next_boundary(next);
        }
        if next < self.region_start {
            next = self.region_start;
        }
        if next > self.region_end {
            self.clear_match();
            return Ok(false);
        }
        self.run(MatchKind::Search, next)
    }

    /// Reset the matcher, then find the first match at or after `start`.
    pub fn find_at(&mut self, start: usize) -> Result<bool> {
        check_offset(self.subject, start)?;
        self.reset();
        self.run(MatchKind::Search, start)
    }

    /// True when the entire region matches.
    pub fn matches(&mut self) -> Result<bool> {
        self.run(MatchKind::WholeString, self.region_start)
    }

    /// True when a prefix of the region, starting at the region start,
    /// matches.
    pub fn looking_at(&mut self) -> Result<bool> {
        self.run(MatchKind::Prefix, self.region_start)
    }

    /// Restrict matching to `start..end` and reset the matcher.
    ///
    /// Both bounds must lie on character boundaries with `start <= end`;
    /// anything else is an [`Error::Argument`]. Anchoring bounds are left
    /// as they were.
    pub fn region(&mut self, start: usize, end: usize) -> Result<&mut Self> {
        if start > end {
            return Err(Error::Argument(format!(
                "region start {start} is after region end {end}"
            )));
        }
        check_offset(self.subject, start)?;
        check_offset(self.subject, end)?;
        self.reset();
        self.region_start = start;
        self.region_end = end;
        Ok(self)
    }

    /// Inclusive start of the region.
    pub fn region_start(&self) -> usize {
        self.region_start
    }

    /// Exclusive end of the region.
    pub fn region_end(&self) -> usize {
        self.region_end
    }

    /// With anchoring bounds (the default) `^` and `$` match at the region
    /// bounds; without them only at the subject bounds.
    pub fn use_anchoring_bounds(&mut self, enable: bool) -> &mut Self {
        self.anchoring_bounds = enable;
        self
    }

    pub fn has_anchoring_bounds(&self) -> bool {
        self.anchoring_bounds
    }

    /// Forget match state and restore the region to the whole subject.
    pub fn reset(&mut self) -> &mut Self {
        self.clear_match();
        self.first = None;
        self.last = 0;
        self.region_start = 0;
        self.region_end = self.subject.len();
        self.hit_end = false;
        self.require_end = false;
        self
    }

    /// Switch to a new subject and reset.
    pub fn reset_subject(&mut self, subject: &'s str) -> &mut Self {
        self.subject = subject;
        self.utf_checked = false;
        self.reset()
    }

    /// Start offset of the last match.
    pub fn start(&self) -> Option<usize> {
        self.group_range(0).map(|range| range.start)
    }

    /// End offset of the last match.
    pub fn end(&self) -> Option<usize> {
        self.group_range(0).map(|range| range.end)
    }

    /// Byte range of the last match.
    pub fn range(&self) -> Option<Range<usize>> {
        self.group_range(0)
    }

    /// Text of the last match.
    pub fn as_str(&self) -> Option<&'s str> {
        self.group(0)
    }

    /// Text of group `index`, `None` if there is no current match or the
    /// group did not participate.
    pub fn group(&self, index: usize) -> Option<&'s str> {
        let subject = self.subject;
        self.group_range(index).map(|range| &subject[range])
    }

    pub fn group_range(&self, index: usize) -> Option<Range<usize>> {
        self.groups
            .get(index)
            .copied()
            .flatten()
            .map(|(start, end)| start..end)
    }

    /// Text of the group called `name`. With duplicate names, the first
    /// participating group carrying the name.
    ///
    /// Fails with [`Error::State`] when there is no current match, and with
    /// [`Error::Substring`] when no group has that name.
    pub fn named_group(&self, name: &str) -> Result<Option<&'s str>> {
        if self.groups.is_empty() {
            return Err(Error::State("no match available".to_string()));
        }
        let numbers = self.pattern.group_numbers(name);
        if numbers.is_empty() {
            return Err(Error::Substring {
                kind: SubstringErrorKind::NoSuchName,
                code: ERROR_NOSUBSTRING,
                message: format!("no group named {name:?}"),
            });
        }
        Ok(numbers.into_iter().find_map(|number| self.group(number)))
    }

    /// Number of capturing groups in the pattern.
    pub fn group_count(&self) -> usize {
        self.pattern.capture_count()
    }

    /// Ranges of every group of the last match, group 0 first. Empty when
    /// there is no current match.
    pub fn captures(&self) -> Vec<Option<Range<usize>>> {
        self.groups
            .iter()
            .map(|group| group.map(|(start, end)| start..end))
            .collect()
    }

    /// True when the last attempt may have needed input beyond the region
    /// end: more input could have extended the match, or produced one.
    pub fn hit_end(&self) -> bool {
        self.hit_end
    }

    /// True when more input could turn the last match into a non-match.
    pub fn require_end(&self) -> bool {
        self.require_end
    }

    /// Reset, then replace every match in the subject.
    pub fn replace_all(&mut self, replacement: &str) -> Result<String> {
        self.reset();
        self.pattern.substitute_with(
            self.subject,
            replacement,
            SubstituteOptions::all(),
            self.context.as_ref(),
        )
    }

    /// Reset, then replace the first match in the subject.
    pub fn replace_first(&mut self, replacement: &str) -> Result<String> {
        self.reset();
        self.pattern.substitute_with(
            self.subject,
            replacement,
            SubstituteOptions::first(),
            self.context.as_ref(),
        )
    }

    fn next_boundary(&self, at: usize) -> usize {
        self.subject[at.min(self.subject.len())..]
            .chars()
            .next()
            .map_or(at + 1, |c| at + c.len_utf8())
    }

    fn clear_match(&mut self) {
        self.groups.clear();
        self.first = None;
    }

    fn run(&mut self, kind: MatchKind, from: usize) -> Result<bool> {
        let pattern = self.pattern;
        let engine = pattern.engine().clone();

        // `^` rebinding only holds for a search starting at the region
        // start; later searches use the primary code, whose `^` cannot
        // match mid-subject outside multiline mode.
        let rebind = self.anchoring_bounds
            && self.region_start > 0
            && from == self.region_start
            && pattern.has_start_anchor();

        let (code, mut options): (&Code, u32) = if rebind {
            let options = match kind {
                MatchKind::Search => 0,
                MatchKind::WholeString => ANCHORED | ENDANCHORED,
                MatchKind::Prefix => ANCHORED,
            };
            (pattern.region_variant()?, options)
        } else {
            match kind {
                MatchKind::Search => (pattern.primary_code(), 0),
                MatchKind::WholeString => (
                    pattern.full_match_variant()?,
                    if pattern.is_jit() { 0 } else { ANCHORED | ENDANCHORED },
                ),
                MatchKind::Prefix => (
                    pattern.prefix_match_variant()?,
                    if pattern.is_jit() { 0 } else { ANCHORED },
                ),
            }
        };
        if !self.anchoring_bounds && self.region_end < self.subject.len() {
            options |= NOTEOL;
        }
        if self.utf_checked {
            options |= NO_UTF_CHECK;
        }

        let subject = &self.subject.as_bytes()[..self.region_end];
        let use_jit = code.is_jit() && options & (ANCHORED | ENDANCHORED) == 0;
        let context = self.context.as_ref().map(MatchContext::handle);
        let data = self.data.handle_mut();

        let rc = if use_jit {
            engine.jit_match(code.handle(), subject, from, options, data, context)
        } else {
            engine.match_subject(code.handle(), subject, from, options, data, context)
        };

        if rc == ERROR_NOMATCH {
            self.utf_checked = true;
            self.record_failure();
            return Ok(false);
        }
        if rc < 0 {
            self.record_failure();
            return Err(limits::match_error(&*engine, rc));
        }
        self.utf_checked = true;

        self.data.read_ovector_into(&mut self.ovector);
        if kind == MatchKind::WholeString && self.ovector[1] != self.region_end {
            self.record_failure();
            return Ok(false);
        }
        self.record_match(rc);
        Ok(true)
    }

    fn record_match(&mut self, rc: i32) {
        // rc is the number of pairs set; 0 means the ovector was too small.
        let set = if rc == 0 {
            self.ovector.len() / 2
        } else {
            rc as usize
        };
        self.groups.clear();
        for group in 0..=self.pattern.capture_count() {
            let slot = self.ovector.get(2 * group..2 * group + 2);
            let range = match slot {
                Some(&[start, end]) if group < set && start != UNSET => Some((start, end)),
                _ => None,
            };
            self.groups.push(range);
        }

        let (start, end) = (self.ovector[0], self.ovector[1]);
        self.first = Some(start);
        self.last = end;
        self.hit_end = self.pattern.could_extend() && end == self.region_end;
        self.require_end = self.pattern.could_invalidate();
    }

    fn record_failure(&mut self) {
        self.clear_match();
        self.hit_end = self.pattern.could_extend();
        self.require_end = false;
    }
}

impl fmt::Debug for Matcher<'_, '_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Matcher")
            .field("pattern", &self.pattern.as_str())
            .field("region", &(self.region_start..self.region_end))
            .field("anchoring_bounds", &self.anchoring_bounds)
            .field("last_match", &self.range())
            .finish()
    }
}
