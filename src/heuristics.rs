//! Deterministic structural corrector for markup fragments.
//!
//! Two passes over a parsed fragment tree: semantic tag remapping
//! (class-token hints on generic containers become real landmark elements)
//! and skip-link synthesis (WCAG 2.4.1 Bypass Blocks). Pure, no external
//! calls; unparseable or untouched input comes back byte-for-byte.

use scraper::Html;
use ego_tree::NodeRef;
use scraper::node::Node;

const SKIP_LINK_TEXT: &str = "Skip to main content";
const SKIP_LINK_CLASS: &str = "skip-link";
const MAIN_CONTENT_ID: &str = "main-content";

/// Recognized class tokens and the landmark tag each one implies
const CLASS_TAG_MAP: &[(&str, &str)] = &[
    ("header", "header"),
    ("nav", "nav"),
    ("content", "main"),
    ("main", "main"),
    ("footer", "footer"),
    ("sidebar", "aside"),
    ("aside", "aside"),
];

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param",
    "source", "track", "wbr",
];

#[derive(Debug, Clone)]
enum MarkupNode {
    Element(ElementNode),
    Text(String),
    Comment(String),
}

#[derive(Debug, Clone)]
struct ElementNode {
    name: String,
    attrs: Vec<(String, String)>,
    children: Vec<MarkupNode>,
}

impl ElementNode {
    fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    fn set_attr(&mut self, name: &str, value: &str) {
        if let Some(entry) = self.attrs.iter_mut().find(|(k, _)| k == name) {
            entry.1 = value.to_string();
        } else {
            self.attrs.push((name.to_string(), value.to_string()));
        }
    }

    fn remove_attr(&mut self, name: &str) {
        self.attrs.retain(|(k, _)| k != name);
    }
}

pub struct HeuristicEngine;

impl Default for HeuristicEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl HeuristicEngine {
    pub fn new() -> Self {
        Self
    }

    /// Apply both structural passes to a fragment.
    ///
    /// Total: never errors. If nothing changes (including the case where the
    /// fragment yields no element nodes at all) the input string is returned
    /// verbatim, so unchanged fragments never suffer re-serialization drift.
    pub fn apply(&self, fragment: &str) -> String {
        let mut nodes = parse_fragment(fragment);
        if !nodes.iter().any(|n| matches!(n, MarkupNode::Element(_))) {
            return fragment.to_string();
        }

        let remapped = remap_semantics(&mut nodes);
        let linked = synthesize_skip_link(&mut nodes);
        if !remapped && !linked {
            return fragment.to_string();
        }
        serialize(&nodes)
    }
}

/// Tolerant parse into an owned, mutable tree
fn parse_fragment(fragment: &str) -> Vec<MarkupNode> {
    let html = Html::parse_fragment(fragment);
    let mut roots = Vec::new();
    for child in html.tree.root().children() {
        convert_into(child, &mut roots);
    }
    // The fragment parser wraps everything in a synthetic <html> element
    if roots.len() == 1
        && let MarkupNode::Element(el) = &roots[0]
        && el.name == "html"
        && el.attrs.is_empty()
    {
        if let MarkupNode::Element(el) = roots.remove(0) {
            return el.children;
        }
    }
    roots
}

fn convert_into(node: NodeRef<'_, Node>, out: &mut Vec<MarkupNode>) {
    match node.value() {
        Node::Element(el) => {
            let mut children = Vec::new();
            for child in node.children() {
                convert_into(child, &mut children);
            }
            out.push(MarkupNode::Element(ElementNode {
                name: el.name().to_string(),
                attrs: el
                    .attrs()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
                children,
            }));
        }
        Node::Text(t) => {
            let text = t.text.to_string();
            if !text.trim().is_empty() {
                out.push(MarkupNode::Text(text));
            }
        }
        // Comments carry author intent; a corrector must not eat them
        Node::Comment(c) => out.push(MarkupNode::Comment(c.comment.to_string())),
        _ => {}
    }
}

/// Rename generic containers whose class list carries a recognized landmark
/// hint. The triggering token is consumed; an emptied class attribute is
/// dropped entirely.
fn remap_semantics(nodes: &mut [MarkupNode]) -> bool {
    let mut changed = false;
    for node in nodes {
        if let MarkupNode::Element(el) = node {
            if el.name == "div"
                && let Some(class) = el.attr("class")
            {
                let tokens: Vec<String> = class.split_whitespace().map(str::to_string).collect();
                if let Some((token, tag)) = CLASS_TAG_MAP
                    .iter()
                    .find(|(t, _)| tokens.iter().any(|c| c == t))
                {
                    el.name = tag.to_string();
                    let remaining: Vec<String> =
                        tokens.into_iter().filter(|c| c != token).collect();
                    if remaining.is_empty() {
                        el.remove_attr("class");
                    } else {
                        el.set_attr("class", &remaining.join(" "));
                    }
                    changed = true;
                }
            }
            if remap_semantics(&mut el.children) {
                changed = true;
            }
        }
    }
    changed
}

/// Insert a skip link when the fragment has exactly one header and at least
/// one main. With zero or multiple headers the target is ambiguous and the
/// pass does nothing. Never duplicates an anchor that already targets the
/// main element's id.
fn synthesize_skip_link(nodes: &mut Vec<MarkupNode>) -> bool {
    if count_elements(nodes, "header") != 1 || count_elements(nodes, "main") == 0 {
        return false;
    }

    let mut changed = false;
    let target_id = {
        let main = find_first_mut(nodes, "main").expect("main counted above");
        match main.attr("id") {
            Some(id) => id.to_string(),
            None => {
                main.set_attr("id", MAIN_CONTENT_ID);
                changed = true;
                MAIN_CONTENT_ID.to_string()
            }
        }
    };

    let href = format!("#{target_id}");
    if has_anchor_to(nodes, &href) {
        return changed;
    }

    let header = find_first_mut(nodes, "header").expect("header counted above");
    header.children.insert(
        0,
        MarkupNode::Element(ElementNode {
            name: "a".to_string(),
            attrs: vec![
                ("href".to_string(), href),
                ("class".to_string(), SKIP_LINK_CLASS.to_string()),
            ],
            children: vec![MarkupNode::Text(SKIP_LINK_TEXT.to_string())],
        }),
    );
    true
}

fn count_elements(nodes: &[MarkupNode], name: &str) -> usize {
    let mut count = 0;
    for node in nodes {
        if let MarkupNode::Element(el) = node {
            if el.name == name {
                count += 1;
            }
            count += count_elements(&el.children, name);
        }
    }
    count
}

fn find_first_mut<'a>(nodes: &'a mut [MarkupNode], name: &str) -> Option<&'a mut ElementNode> {
    for node in nodes {
        if let MarkupNode::Element(el) = node {
            if el.name == name {
                return Some(el);
            }
            if let Some(found) = find_first_mut(&mut el.children, name) {
                return Some(found);
            }
        }
    }
    None
}

fn has_anchor_to(nodes: &[MarkupNode], href: &str) -> bool {
    nodes.iter().any(|node| match node {
        MarkupNode::Element(el) => {
            (el.name == "a" && el.attr("href") == Some(href)) || has_anchor_to(&el.children, href)
        }
        _ => false,
    })
}

/// Re-serialize with two-space indentation. Text-only elements stay on one
/// line; void elements are emitted without a closing tag.
fn serialize(nodes: &[MarkupNode]) -> String {
    let mut lines = Vec::new();
    for node in nodes {
        write_node(&mut lines, node, 0);
    }
    lines.join("\n")
}

fn write_node(lines: &mut Vec<String>, node: &MarkupNode, depth: usize) {
    let pad = "  ".repeat(depth);
    match node {
        MarkupNode::Text(t) => lines.push(format!("{pad}{}", escape_text(t.trim()))),
        // Comment text is reproduced as parsed, delimiters re-added
        MarkupNode::Comment(c) => lines.push(format!("{pad}<!--{c}-->")),
        MarkupNode::Element(el) => {
            let open = open_tag(el);
            if VOID_ELEMENTS.contains(&el.name.as_str()) {
                lines.push(format!("{pad}{open}"));
            } else if el.children.iter().all(|c| matches!(c, MarkupNode::Text(_))) {
                let text: String = el
                    .children
                    .iter()
                    .filter_map(|c| match c {
                        MarkupNode::Text(t) => Some(escape_text(t.trim())),
                        _ => None,
                    })
                    .collect();
                lines.push(format!("{pad}{open}{text}</{}>", el.name));
            } else {
                lines.push(format!("{pad}{open}"));
                for child in &el.children {
                    write_node(lines, child, depth + 1);
                }
                lines.push(format!("{pad}</{}>", el.name));
            }
        }
    }
}

fn open_tag(el: &ElementNode) -> String {
    let mut out = format!("<{}", el.name);
    for (k, v) in &el.attrs {
        out.push(' ');
        out.push_str(k);
        out.push_str("=\"");
        out.push_str(&escape_attr(v));
        out.push('"');
    }
    out.push('>');
    out
}

fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn escape_attr(value: &str) -> String {
    value.replace('&', "&amp;").replace('"', "&quot;")
}
