//! DOM-backed `TextSurface` for a contenteditable entry.
//!
//! Caret offsets are measured in UTF-16 code units, the unit of DOM ranges and JS strings.

use crate::models::{utf16_len, EntryId};
use crate::outline::{Rect, TextSurface};
use wasm_bindgen::JsCast;

pub(crate) struct DomSurface {
    /// The contenteditable text region.
    pub text_el: web_sys::HtmlElement,
    /// The whole row (handle + text), used as the entry's own drop region.
    pub row_el: Option<web_sys::HtmlElement>,
    pub children_el: Option<web_sys::HtmlElement>,
}

fn to_rect(r: web_sys::DomRect) -> Rect {
    Rect::new(r.left(), r.top(), r.width(), r.height())
}

fn selection() -> Option<web_sys::Selection> {
    web_sys::window()?.get_selection().ok().flatten()
}

/// Finds the text node and local offset `offset` UTF-16 units into `root`.
fn locate(root: &web_sys::Node, offset: usize) -> Option<(web_sys::Node, u32)> {
    fn walk(node: &web_sys::Node, remaining: &mut usize, last: &mut Option<web_sys::Node>) -> Option<(web_sys::Node, u32)> {
        if node.node_type() == web_sys::Node::TEXT_NODE {
            let len = node.text_content().map(|t| utf16_len(&t)).unwrap_or(0);
            if *remaining <= len {
                return Some((node.clone(), *remaining as u32));
            }
            *remaining -= len;
            *last = Some(node.clone());
            return None;
        }
        let kids = node.child_nodes();
        for i in 0..kids.length() {
            if let Some(found) = kids.get(i).and_then(|k| walk(&k, remaining, last)) {
                return Some(found);
            }
        }
        None
    }

    let mut remaining = offset;
    let mut last = None;
    if let Some(found) = walk(root, &mut remaining, &mut last) {
        return Some(found);
    }
    // Past the end: clamp to the end of the last text node, or the element itself.
    match last {
        Some(node) => {
            let len = node.text_content().map(|t| utf16_len(&t)).unwrap_or(0) as u32;
            Some((node, len))
        }
        None => Some((root.clone(), root.child_nodes().length())),
    }
}

/// Reads the on-screen text of a mounted entry, found by its `data-entry-text` attribute.
pub(crate) fn live_text(id: &EntryId) -> Option<String> {
    let escaped = id.as_str().replace('\\', "\\\\").replace('"', "\\\"");
    let doc = web_sys::window()?.document()?;
    let el = doc
        .query_selector(&format!("[data-entry-text=\"{escaped}\"]"))
        .ok()
        .flatten()?;
    el.text_content()
}

impl TextSurface for DomSurface {
    fn text(&self) -> String {
        self.text_el.text_content().unwrap_or_default()
    }

    fn caret_offset(&self) -> Option<usize> {
        let sel = selection()?;
        // A ranged selection has no caret; Backspace then deletes the range.
        if sel.range_count() == 0 || !sel.is_collapsed() {
            return None;
        }
        let focus = sel.focus_node()?;
        let root: &web_sys::Node = self.text_el.as_ref();
        if !root.contains(Some(&focus)) {
            return None;
        }

        let doc = web_sys::window()?.document()?;
        let range = doc.create_range().ok()?;
        range.select_node_contents(root).ok()?;
        range.set_end(&focus, sel.focus_offset()).ok()?;
        Some(range.to_string().length() as usize)
    }

    fn set_caret_offset(&self, offset: usize) {
        let _ = self.text_el.focus();
        let root: &web_sys::Node = self.text_el.as_ref();
        let (Some(sel), Some((node, local))) = (selection(), locate(root, offset)) else {
            return;
        };
        let Some(doc) = web_sys::window().and_then(|w| w.document()) else {
            return;
        };
        let Ok(range) = doc.create_range() else {
            return;
        };
        if range.set_start(&node, local).is_err() {
            return;
        }
        range.collapse_with_to_start(true);
        let _ = sel.remove_all_ranges();
        let _ = sel.add_range(&range);
    }

    fn focus(&self) {
        let _ = self.text_el.focus();
    }

    fn own_region(&self) -> Option<Rect> {
        let el: &web_sys::Element = match self.row_el.as_ref() {
            Some(row) => row.unchecked_ref(),
            None => self.text_el.unchecked_ref(),
        };
        Some(to_rect(el.get_bounding_client_rect()))
    }

    fn children_region(&self) -> Option<Rect> {
        let el: &web_sys::Element = self.children_el.as_ref()?.unchecked_ref();
        let r = el.get_bounding_client_rect();
        (r.height() > 0.0).then(|| to_rect(r))
    }
}
