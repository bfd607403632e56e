//! Inline content walking.
//!
//! Flattens nested FB2 inline spans into normalized text plus style
//! events with rune-accurate offsets. Whitespace collapses through a
//! pending-space scheme: runs of whitespace become single spaces, nothing
//! leaks at the start or end of a paragraph, and code spans keep their
//! whitespace verbatim.

use std::collections::HashSet;

use crate::fb2::{Segment, SpanTag};

use super::style::{StyleRegistry, Usage};

/// A style span over a text entry, indexed in runes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleEventRef {
    pub offset: usize,
    pub length: usize,
    pub style: String,
    pub link_to: Option<String>,
    pub is_footnote_link: bool,
}

/// Whitespace-collapsing text sink.
#[derive(Debug, Default)]
pub struct NormalizingWriter {
    text: String,
    runes: usize,
    pending: bool,
}

impl NormalizingWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append text. Without `preserve`, whitespace runs collapse to one
    /// pending space that materializes before the next visible rune.
    pub fn write(&mut self, input: &str, preserve: bool) {
        if preserve {
            self.flush_pending();
            for ch in input.chars() {
                self.commit(ch);
            }
            return;
        }

        for ch in input.chars() {
            if ch.is_whitespace() {
                if self.runes > 0 && !self.text.ends_with('\n') {
                    self.pending = true;
                }
            } else {
                self.flush_pending();
                self.commit(ch);
            }
        }
    }

    /// Append structural text (title separators) verbatim, discarding any
    /// pending space.
    pub fn write_structural(&mut self, input: &str) {
        self.pending = false;
        for ch in input.chars() {
            self.commit(ch);
        }
    }

    fn commit(&mut self, ch: char) {
        self.text.push(ch);
        self.runes += 1;
    }

    fn flush_pending(&mut self) {
        if self.pending {
            self.pending = false;
            self.commit(' ');
        }
    }

    /// Rune position the next visible rune would land at.
    pub fn position(&self) -> usize {
        self.runes + usize::from(self.pending)
    }

    /// Committed rune count (pending space excluded).
    pub fn committed(&self) -> usize {
        self.runes
    }

    /// Flush the pending space and take the buffered text; the rune
    /// counter keeps running (used at inline-image boundaries).
    pub fn take_text(&mut self) -> String {
        self.flush_pending();
        std::mem::take(&mut self.text)
    }

    /// Drop any pending space and take the buffered text.
    pub fn finish_text(&mut self) -> String {
        self.pending = false;
        std::mem::take(&mut self.text)
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// One item of a mixed text/image content list.
#[derive(Debug, Clone, PartialEq)]
pub enum InlineItem {
    Text(String),
    Image { resource: String, alt: Option<String> },
}

/// The result of walking one paragraph (or assembled title block).
#[derive(Debug, Default)]
pub struct WalkedParagraph {
    /// Normalized text. For mixed content this is the concatenation of
    /// the interleaved text items.
    pub text: String,
    /// Raw style events; callers segment them before emission.
    pub events: Vec<StyleEventRef>,
    /// Interleaved text/image items; empty unless `has_images`.
    pub items: Vec<InlineItem>,
    pub has_images: bool,
    /// Style wrapping the entire visible content, lifted out of the
    /// events and merged into the block style by the caller.
    pub spanning_style: Option<String>,
}

/// Stateful walker: the storyline builder drives one per paragraph, or
/// one per title block when several lines join into a single entry.
#[derive(Debug, Default)]
pub struct ParagraphWalker {
    writer: NormalizingWriter,
    events: Vec<StyleEventRef>,
    items: Vec<InlineItem>,
    has_images: bool,
}

impl ParagraphWalker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn position(&self) -> usize {
        self.writer.position()
    }

    pub fn is_empty(&self) -> bool {
        self.writer.is_empty() && self.items.is_empty()
    }

    /// Structural separator between assembled lines.
    pub fn write_structural(&mut self, input: &str) {
        self.writer.write_structural(input);
    }

    /// Record an externally computed event (per-title-line styles).
    pub fn push_event(&mut self, event: StyleEventRef) {
        self.events.push(event);
    }

    /// Walk inline segments, emitting text and style events.
    ///
    /// `stack` is the ancestor inline style chain, threaded through as a
    /// scratch buffer; each styled child resolves the merged chain (e.g.
    /// `strong` inside `code` resolves "code strong").
    pub fn walk_segments(
        &mut self,
        segments: &[Segment],
        stack: &mut Vec<String>,
        preserve: bool,
        registry: &mut StyleRegistry,
        footnotes: &HashSet<String>,
    ) {
        for segment in segments {
            match segment {
                Segment::Text(text) => self.writer.write(text, preserve),
                Segment::Image(image) => {
                    let text = self.writer.take_text();
                    if !text.is_empty() {
                        self.items.push(InlineItem::Text(text));
                    }
                    self.items.push(InlineItem::Image {
                        resource: image.resource_id().to_string(),
                        alt: image.alt.clone(),
                    });
                    self.has_images = true;
                }
                Segment::Span(span) => {
                    let component = match span.tag {
                        SpanTag::Style => span
                            .class
                            .clone()
                            .unwrap_or_else(|| span.tag.style_name().to_string()),
                        tag => tag.style_name().to_string(),
                    };
                    stack.push(component);
                    let start = self.writer.position();
                    let inner_preserve = preserve || span.tag.preserves_whitespace();
                    self.walk_segments(&span.segments, stack, inner_preserve, registry, footnotes);
                    let end = self.writer.position();
                    let spec = stack.join(" ");
                    stack.pop();

                    if end > start {
                        let style = registry.resolve_style(&spec);
                        registry.mark_used(&style, Usage::Text);
                        let link_to = match (span.tag, &span.href) {
                            (SpanTag::Link, Some(href)) => {
                                Some(href.strip_prefix('#').unwrap_or(href).to_string())
                            }
                            _ => None,
                        };
                        let is_footnote_link = link_to
                            .as_deref()
                            .is_some_and(|target| footnotes.contains(target));
                        self.events.push(StyleEventRef {
                            offset: start,
                            length: end - start,
                            style,
                            link_to,
                            is_footnote_link,
                        });
                    }
                }
            }
        }
    }

    /// Close the walk: clamp event spans to the committed text, collect
    /// interleaved items, and optionally lift a whole-paragraph style.
    pub fn finish(mut self, detect_spanning: bool) -> WalkedParagraph {
        let tail = self.writer.finish_text();
        let total = self.writer.committed();

        let mut items = self.items;
        let has_images = self.has_images;
        let text = if has_images {
            if !tail.is_empty() {
                items.push(InlineItem::Text(tail));
            }
            items
                .iter()
                .filter_map(|item| match item {
                    InlineItem::Text(t) => Some(t.as_str()),
                    InlineItem::Image { .. } => None,
                })
                .collect()
        } else {
            tail
        };

        // A pending space at the end of a span never materialized; clamp
        // projected offsets back inside the committed text.
        let mut events: Vec<StyleEventRef> = self
            .events
            .into_iter()
            .filter_map(|mut event| {
                if event.offset >= total {
                    return None;
                }
                event.length = event.length.min(total - event.offset);
                (event.length > 0).then_some(event)
            })
            .collect();

        let mut spanning_style = None;
        if detect_spanning && !has_images && total > 0 {
            let full_span = |e: &StyleEventRef| {
                e.offset == 0 && e.length == total && e.link_to.is_none()
            };
            spanning_style = events
                .iter()
                .filter(|e| full_span(e))
                .max_by_key(|e| e.style.len())
                .map(|e| e.style.clone());
            if spanning_style.is_some() {
                events.retain(|e| !full_span(e));
            }
        }

        WalkedParagraph {
            text,
            events,
            items,
            has_images,
            spanning_style,
        }
    }
}

/// Walk one paragraph's segments with whole-paragraph span detection.
pub fn walk_paragraph(
    segments: &[Segment],
    registry: &mut StyleRegistry,
    footnotes: &HashSet<String>,
) -> WalkedParagraph {
    let mut walker = ParagraphWalker::new();
    let mut stack = Vec::new();
    walker.walk_segments(segments, &mut stack, false, registry, footnotes);
    walker.finish(true)
}

/// Order and deduplicate raw style events.
///
/// Duplicate `(offset, length)` pairs collapse to one event, preferring
/// the one carrying a link, then the longer style name. Events sort by
/// offset ascending and length descending (outer before inner);
/// overlapping events are preserved for the renderer to apply in order.
pub fn segment_nested_style_events(events: Vec<StyleEventRef>) -> Vec<StyleEventRef> {
    let mut sorted = events;
    sorted.sort_by(|a, b| a.offset.cmp(&b.offset).then(b.length.cmp(&a.length)));

    let mut out: Vec<StyleEventRef> = Vec::new();
    for event in sorted {
        match out.last_mut() {
            Some(last) if last.offset == event.offset && last.length == event.length => {
                let replace = if event.link_to.is_some() != last.link_to.is_some() {
                    event.link_to.is_some()
                } else {
                    event.style.len() > last.style.len()
                };
                if replace {
                    *last = event;
                }
            }
            _ => out.push(event),
        }
    }
    out
}
