use std::collections::{HashMap, HashSet};

use super::store::ContentCache;
use super::text::find_ignore_case;
use super::{normalize_query, Article, Projection};

/// Characters of context kept on each side of a body match.
pub const SNIPPET_CONTEXT: usize = 40;

/// A string split around the first match of the search query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Highlight {
    pub before: String,
    pub matched: String,
    pub after: String,
}

impl Highlight {
    /// Plain form with the match marked, as shown in snippets.
    pub fn to_marked_string(&self) -> String {
        format!("...{}[{}]{}...", self.before, self.matched, self.after)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeNode {
    pub id: i64,
    pub name: String,
    /// Set when the query matches the name.
    pub name_match: Option<Highlight>,
    /// Set when body search is on and the cached text matches.
    pub snippet: Option<Highlight>,
    pub has_children: bool,
    pub expanded: bool,
    pub tag_match: bool,
    pub active: bool,
    pub children: Vec<TreeNode>,
}

/// One display line of a flattened tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeRow<'a> {
    pub node: &'a TreeNode,
    pub depth: usize,
}

// ============================================================================
// Build
// ============================================================================

/// Build the tree for an already filtered and sorted list.
///
/// Children are grouped by parent, keeping list order within each group.
/// A node whose parent is not in `visible` is a root. A node is expanded iff
/// it is in `projection.expanded` and has a visible child. `content` enables
/// body snippets; pass `None` when body search is off.
///
/// Pure: the same inputs always produce the same tree.
pub fn build(
    visible: &[&Article],
    projection: &Projection,
    query: &str,
    content: Option<&ContentCache>,
) -> Vec<TreeNode> {
    let query = normalize_query(query);
    let present: HashSet<i64> = visible.iter().map(|a| a.id).collect();

    let mut roots = Vec::new();
    let mut children: HashMap<i64, Vec<&Article>> = HashMap::new();
    for article in visible {
        match article.parent_id.filter(|p| present.contains(p) && *p != article.id) {
            Some(parent) => children.entry(parent).or_default().push(*article),
            None => roots.push(*article),
        }
    }

    let ctx = BuildContext {
        children: &children,
        projection,
        query: &query,
        content,
    };
    let mut placed = HashSet::new();
    let mut nodes: Vec<TreeNode> = roots
        .into_iter()
        .map(|a| ctx.node(a, &mut placed))
        .collect();

    // Members of a parent cycle never reach a root; surface them as roots
    for article in visible {
        if !placed.contains(&article.id) {
            nodes.push(ctx.node(article, &mut placed));
        }
    }
    nodes
}

struct BuildContext<'a, 'b> {
    children: &'b HashMap<i64, Vec<&'a Article>>,
    projection: &'b Projection,
    query: &'b str,
    content: Option<&'b ContentCache>,
}

impl<'a, 'b> BuildContext<'a, 'b> {
    fn node(&self, article: &Article, placed: &mut HashSet<i64>) -> TreeNode {
        placed.insert(article.id);
        let mut kids = Vec::new();
        for child in self.children.get(&article.id).into_iter().flatten() {
            if !placed.contains(&child.id) {
                kids.push(self.node(child, placed));
            }
        }
        let has_children = !kids.is_empty();

        TreeNode {
            id: article.id,
            name: article.name.clone(),
            name_match: name_highlight(&article.name, self.query),
            snippet: self.content.and_then(|c| {
                c.get(&article.id)
                    .and_then(|entry| entry.text.as_deref())
                    .and_then(|text| snippet(text, self.query))
            }),
            has_children,
            expanded: has_children && self.projection.expanded.contains(&article.id),
            tag_match: self.projection.tag_matches.contains(&article.id),
            active: article.active,
            children: kids,
        }
    }
}

fn name_highlight(name: &str, query: &str) -> Option<Highlight> {
    let range = find_ignore_case(name, query)?;
    Some(Highlight {
        before: name[..range.start].to_string(),
        matched: name[range.clone()].to_string(),
        after: name[range.end..].to_string(),
    })
}

/// Body snippet around the first match in lower-cased search `text`.
pub fn snippet(text: &str, query: &str) -> Option<Highlight> {
    if query.is_empty() {
        return None;
    }
    let start = text.find(query)?;
    let end = start + query.len();
    let before: String = {
        let chars: Vec<char> = text[..start].chars().rev().take(SNIPPET_CONTEXT).collect();
        chars.into_iter().rev().collect()
    };
    let after: String = text[end..].chars().take(SNIPPET_CONTEXT).collect();
    Some(Highlight {
        before: before.trim_start().to_string(),
        matched: text[start..end].to_string(),
        after: after.trim_end().to_string(),
    })
}

// ============================================================================
// Flatten
// ============================================================================

/// Depth-first rows, descending only into expanded nodes.
pub fn flatten(nodes: &[TreeNode]) -> Vec<TreeRow<'_>> {
    let mut rows = Vec::new();
    push_rows(nodes, 0, &mut rows);
    rows
}

fn push_rows<'a>(nodes: &'a [TreeNode], depth: usize, rows: &mut Vec<TreeRow<'a>>) {
    for node in nodes {
        rows.push(TreeRow { node, depth });
        if node.expanded {
            push_rows(&node.children, depth + 1, rows);
        }
    }
}

/// Every node id that has children, for "expand all".
pub fn parent_ids(nodes: &[TreeNode]) -> Vec<i64> {
    let mut out = Vec::new();
    let mut stack: Vec<&TreeNode> = nodes.iter().collect();
    while let Some(node) = stack.pop() {
        if node.has_children {
            out.push(node.id);
            stack.extend(node.children.iter());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::store::ContentEntry;
    use crate::knowledge::test_support::article;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn row_ids(nodes: &[TreeNode]) -> Vec<(i64, usize)> {
        flatten(nodes).iter().map(|r| (r.node.id, r.depth)).collect()
    }

    #[test]
    fn test_missing_parent_renders_as_root() {
        let a = article(1, "A", None);
        let b = article(2, "B", Some(99));
        let nodes = build(&[&a, &b], &Projection::default(), "", None);
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[1].id, 2);
        assert!(!nodes[1].has_children);
    }

    #[test]
    fn test_expanded_requires_membership_and_visible_child() {
        let root = article(1, "Root", None);
        let child = article(2, "Child", Some(1));
        let leaf = article(3, "Leaf", None);
        let mut projection = Projection::default();
        projection.expanded.extend([1, 3]);

        let nodes = build(&[&root, &child, &leaf], &projection, "", None);
        assert!(nodes[0].expanded);
        assert!(nodes[0].has_children);
        // In the expanded set but childless
        assert!(!nodes[1].expanded);
        assert_eq!(row_ids(&nodes), vec![(1, 0), (2, 1), (3, 0)]);

        projection.expanded.clear();
        let nodes = build(&[&root, &child, &leaf], &projection, "", None);
        assert!(!nodes[0].expanded);
        assert_eq!(row_ids(&nodes), vec![(1, 0), (3, 0)]);
    }

    #[test]
    fn test_children_keep_list_order() {
        let root = article(1, "Root", None);
        let z = article(2, "Zed", Some(1));
        let a = article(3, "Ann", Some(1));
        let mut projection = Projection::default();
        projection.expanded.insert(1);

        let nodes = build(&[&root, &a, &z], &projection, "", None);
        let kids: Vec<i64> = nodes[0].children.iter().map(|n| n.id).collect();
        assert_eq!(kids, vec![3, 2]);
    }

    #[test]
    fn test_name_highlight_split() {
        let a = article(1, "Release Notes", None);
        let nodes = build(&[&a], &Projection::default(), " NOTES", None);
        assert_eq!(
            nodes[0].name_match,
            Some(Highlight {
                before: "Release ".into(),
                matched: "Notes".into(),
                after: String::new(),
            })
        );
        let nodes = build(&[&a], &Projection::default(), "zzz", None);
        assert_eq!(nodes[0].name_match, None);
    }

    #[test]
    fn test_snippet_context_is_bounded() {
        let text = format!("{}needle{}", "a".repeat(100), "b".repeat(100));
        let s = snippet(&text, "needle").unwrap();
        assert_eq!(s.before, "a".repeat(SNIPPET_CONTEXT));
        assert_eq!(s.after, "b".repeat(SNIPPET_CONTEXT));
        assert_eq!(s.matched, "needle");
        assert!(s.to_marked_string().starts_with("...a"));
        assert!(s.to_marked_string().ends_with("b..."));
    }

    #[test]
    fn test_snippet_short_text_and_no_match() {
        let s = snippet("deploy the server", "the").unwrap();
        assert_eq!(s.before, "deploy ");
        assert_eq!(s.after, " server");
        assert_eq!(snippet("deploy", "zzz"), None);
        assert_eq!(snippet("deploy", ""), None);
    }

    #[test]
    fn test_snippet_only_from_extracted_text() {
        let a = article(1, "Doc", None);
        let mut cache = ContentCache::new();
        cache.insert(
            1,
            ContentEntry {
                html: Arc::from("<p>x</p>"),
                text: None,
            },
        );
        let nodes = build(&[&a], &Projection::default(), "x", Some(&cache));
        assert_eq!(nodes[0].snippet, None);

        cache.insert(1, ContentEntry::extracted("<p>find x here</p>"));
        let nodes = build(&[&a], &Projection::default(), "x", Some(&cache));
        assert_eq!(nodes[0].snippet.as_ref().map(|s| s.matched.as_str()), Some("x"));

        let nodes = build(&[&a], &Projection::default(), "x", None);
        assert_eq!(nodes[0].snippet, None);
    }

    #[test]
    fn test_cycle_members_still_rendered() {
        let a = article(1, "A", Some(2));
        let b = article(2, "B", Some(1));
        let nodes = build(&[&a, &b], &Projection::default(), "", None);
        let mut ids: Vec<i64> = flatten(&nodes).iter().map(|r| r.node.id).collect();
        // Rows of collapsed nodes: only the surfaced root is listed
        ids.sort();
        assert_eq!(ids, vec![1]);
        assert_eq!(nodes[0].children[0].id, 2);
    }

    #[test]
    fn test_build_is_pure() {
        let root = article(1, "Root", None);
        let child = article(2, "Child", Some(1));
        let mut projection = Projection::default();
        projection.expanded.insert(1);
        let first = build(&[&root, &child], &projection, "ch", None);
        let second = build(&[&root, &child], &projection, "ch", None);
        assert_eq!(first, second);
    }

    #[test]
    fn test_parent_ids() {
        let root = article(1, "Root", None);
        let child = article(2, "Child", Some(1));
        let grandchild = article(3, "Grand", Some(2));
        let nodes = build(&[&root, &child, &grandchild], &Projection::default(), "", None);
        let mut ids = parent_ids(&nodes);
        ids.sort();
        assert_eq!(ids, vec![1, 2]);
    }
}
