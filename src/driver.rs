//! Driver (§4.4): walks a partition tree top-down, dispatching each node to
//! the pass its policy names, and serializes the result back to text.
//! Grounded in `common/formatting/formatter.cc`'s top-level
//! `Formatter::Format` dispatch over `PartitionPolicyEnum`, re-expressed
//! against this crate's own wrap/layout/align modules instead of calling
//! back into verible's tree-unwrapper.

use std::collections::HashSet;
use std::ops::Range;

use crate::align::{self, CellScanner};
use crate::layout;
use crate::partition::{PartitionId, PartitionTree};
use crate::style::{AlignmentPolicy, FormatStyle};
use crate::token::{BreakDecision, TokenBuffer};
use crate::unwrapped_line::{FormattedExcerpt, PartitionPolicy, UnwrappedLine};
use crate::Result;

/// One group of sibling partitions eligible to be aligned together, plus
/// the collaborators needed to do it. Grouping by blank-line boundaries and
/// filtering out partitions an ignore-predicate rejects (§E.4) is a
/// syntax-tree-specific concern the driver delegates to its caller through
/// this trait, the same way `CellScanner` delegates per-row cell layout.
pub struct AlignmentGroupRequest<'a> {
    pub rows: Vec<PartitionId>,
    pub policy: AlignmentPolicy,
    pub scanner: &'a dyn CellScanner,
}

pub trait AlignmentGroupProvider {
    /// Partition `parent`'s children into zero or more alignable row groups.
    /// Children omitted from every group are driven individually.
    fn alignment_groups<'a>(&'a self, tree: &PartitionTree, parent: PartitionId) -> Vec<AlignmentGroupRequest<'a>>;
}

/// An `AlignmentGroupProvider` that never finds anything to align, for
/// callers that only need the wrap/layout passes.
pub struct NoAlignment;

impl AlignmentGroupProvider for NoAlignment {
    fn alignment_groups<'a>(&'a self, _tree: &PartitionTree, _parent: PartitionId) -> Vec<AlignmentGroupRequest<'a>> {
        Vec::new()
    }
}

fn commit_single_line(tokens: &mut TokenBuffer, line: &UnwrappedLine) {
    for idx in line.tokens.clone() {
        let before = &mut tokens.get_mut(idx).before;
        if before.break_decision == BreakDecision::Undecided {
            before.break_decision = BreakDecision::MustAppend;
        }
    }
}

/// Run the wrap searcher for the leaf rooted at `id`, unless
/// `style.try_wrap_long_lines` is false and the line doesn't already fit —
/// §6 "give up on lines that would need optimization and emit as-is".
fn run_wrap_search(
    tokens: &mut TokenBuffer,
    tree: &PartitionTree,
    id: PartitionId,
    style: &FormatStyle,
    max_search_states: usize,
) -> FormattedExcerpt {
    let line = tree.node(id).line.clone();
    if !style.try_wrap_long_lines && !crate::wrap_search::fits_on_line(tokens, &line, style) {
        commit_single_line(tokens, &line);
        return FormattedExcerpt::new(line.indentation_spaces, line.tokens);
    }
    crate::wrap_search::search_line_wraps(tokens, &line, style, max_search_states)
}

/// Format the subtree rooted at `id`, committing every token's spacing
/// decision, and return the diagnostics for each leaf line actually run
/// through the wrap searcher.
///
/// Errors from the layout solver are invariant violations (§7: "these are
/// implementation bugs; abort the run with a diagnostic") and propagate
/// straight out rather than being swallowed and papered over with a
/// fallback — this function has no scoped-recovery story for a corrupted
/// layout tree.
pub fn format_partition_tree(
    tokens: &mut TokenBuffer,
    tree: &mut PartitionTree,
    id: PartitionId,
    style: &FormatStyle,
    max_search_states: usize,
    alignment: &dyn AlignmentGroupProvider,
    disabled_ranges: &[Range<usize>],
) -> Result<Vec<FormattedExcerpt>> {
    let policy = tree.node(id).line.policy;
    match policy {
        PartitionPolicy::SuccessfullyAligned => Ok(Vec::new()),

        PartitionPolicy::ApplyOptimalLayout | PartitionPolicy::WrapSubPartitions => {
            layout::reshape_partition_subtree(tokens, tree, id, style)?;
            recurse_children(tokens, tree, id, style, max_search_states, alignment, disabled_ranges)
        }

        PartitionPolicy::FitOnLineElseExpand => {
            let line = tree.node(id).line.clone();
            if crate::wrap_search::fits_on_line(tokens, &line, style) {
                commit_single_line(tokens, &line);
                Ok(vec![FormattedExcerpt::new(line.indentation_spaces, line.tokens)])
            } else if tree.children(id).is_empty() {
                Ok(vec![run_wrap_search(tokens, tree, id, style, max_search_states)])
            } else {
                recurse_children(tokens, tree, id, style, max_search_states, alignment, disabled_ranges)
            }
        }

        PartitionPolicy::AlwaysExpand | PartitionPolicy::Uninitialized => {
            if tree.children(id).is_empty() {
                Ok(vec![run_wrap_search(tokens, tree, id, style, max_search_states)])
            } else {
                recurse_children(tokens, tree, id, style, max_search_states, alignment, disabled_ranges)
            }
        }
    }
}

fn recurse_children(
    tokens: &mut TokenBuffer,
    tree: &mut PartitionTree,
    id: PartitionId,
    style: &FormatStyle,
    max_search_states: usize,
    alignment: &dyn AlignmentGroupProvider,
    disabled_ranges: &[Range<usize>],
) -> Result<Vec<FormattedExcerpt>> {
    let children: Vec<PartitionId> = tree.children(id).to_vec();

    let mut aligned_rows: HashSet<PartitionId> = HashSet::new();
    for group in alignment.alignment_groups(tree, id) {
        if group.rows.len() < 2 {
            continue;
        }
        let applied = align::align_group(
            tokens,
            tree,
            &group.rows,
            group.scanner,
            group.policy,
            style,
            disabled_ranges,
        );
        if applied {
            aligned_rows.extend(group.rows);
        }
    }

    let mut results = Vec::new();
    for child in children {
        if aligned_rows.contains(&child) {
            let line = &tree.node(child).line;
            results.push(FormattedExcerpt::new(line.indentation_spaces, line.tokens.clone()));
            continue;
        }
        results.extend(format_partition_tree(
            tokens,
            tree,
            child,
            style,
            max_search_states,
            alignment,
            disabled_ranges,
        )?);
    }
    Ok(results)
}

/// Serialize every leaf line in `tree`, in token order, to text. Walks the
/// shared token buffer directly rather than re-descending the tree, since by
/// the time rendering happens every token's before-contract has already been
/// committed by `format_partition_tree` (§4.4 "Output").
pub fn render(tokens: &TokenBuffer, tree: &PartitionTree, root: PartitionId) -> String {
    let mut leaves = Vec::new();
    collect_leaves(tree, root, &mut leaves);

    let mut out = String::new();
    let mut first_token = true;
    for leaf in leaves {
        let line = &tree.node(leaf).line;
        if line.is_empty() {
            continue;
        }
        for idx in line.tokens.clone() {
            let token = tokens.get(idx);
            if first_token {
                out.push_str(&" ".repeat(line.indentation_spaces.max(0) as usize));
            } else {
                match token.before.break_decision {
                    BreakDecision::MustWrap => {
                        out.push('\n');
                        out.push_str(&" ".repeat(token.before.required_spaces as usize));
                    }
                    BreakDecision::Preserve => {
                        if let Some(span) = token.before.preserved_span {
                            out.push_str(tokens.preserved_text(span));
                        }
                    }
                    _ => out.push_str(&" ".repeat(token.before.required_spaces as usize)),
                }
            }
            out.push_str(&token.text);
            first_token = false;
        }
        out.push('\n');
        first_token = true;
    }
    out
}

fn collect_leaves(tree: &PartitionTree, id: PartitionId, out: &mut Vec<PartitionId>) {
    if tree.node(id).is_leaf() {
        out.push(id);
        return;
    }
    for &child in tree.children(id) {
        collect_leaves(tree, child, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::{FormatToken, TokenKind};

    #[test]
    fn fit_on_line_commits_must_append_when_short() {
        let mut tokens = TokenBuffer::new("");
        tokens.push(FormatToken::new("a", TokenKind(0)));
        tokens.push(FormatToken::new("b", TokenKind(0)));
        let mut tree = PartitionTree::new();
        let root = tree.insert_root(
            UnwrappedLine::new(0, 0..2).with_policy(PartitionPolicy::FitOnLineElseExpand),
        );
        let style = FormatStyle::default();
        let excerpts = format_partition_tree(&mut tokens, &mut tree, root, &style, 1000, &NoAlignment, &[]).unwrap();
        assert_eq!(excerpts.len(), 1);
        assert_eq!(tokens.get(1).before.break_decision, BreakDecision::MustAppend);
    }

    #[test]
    fn render_breaks_at_must_wrap_with_committed_indentation() {
        let mut tokens = TokenBuffer::new("");
        tokens.push(FormatToken::new("a", TokenKind(0)));
        tokens.push(FormatToken::new("b", TokenKind(0)));
        tokens.get_mut(1).before.break_decision = BreakDecision::MustWrap;
        tokens.get_mut(1).before.required_spaces = 4;
        let mut tree = PartitionTree::new();
        let root = tree.insert_root(UnwrappedLine::new(0, 0..2));
        let rendered = render(&tokens, &tree, root);
        assert_eq!(rendered, "a\n    b\n");
    }

    #[test]
    fn always_expand_leaf_runs_wrap_search() {
        let mut tokens = TokenBuffer::new("");
        tokens.push(FormatToken::new("aaaa", TokenKind(0)));
        tokens.push(FormatToken::new("bbbb", TokenKind(0)));
        let mut tree = PartitionTree::new();
        let root = tree.insert_root(
            UnwrappedLine::new(0, 0..2).with_policy(PartitionPolicy::AlwaysExpand),
        );
        let style = FormatStyle::default();
        let excerpts = format_partition_tree(&mut tokens, &mut tree, root, &style, 1000, &NoAlignment, &[]).unwrap();
        assert_eq!(excerpts.len(), 1);
        assert!(excerpts[0].completed_formatting);
    }

    #[test]
    fn format_then_reformat_is_idempotent_and_preserves_tokens() {
        let words = ["aaaa", "bbbb", "cccc", "dddd", "eeee", "ffff"];
        let mut tokens = TokenBuffer::new("");
        for w in words {
            tokens.push(FormatToken::new(w, TokenKind(0)));
        }
        let mut tree = PartitionTree::new();
        let root = tree.insert_root(
            UnwrappedLine::new(0, 0..words.len())
                .with_policy(PartitionPolicy::WrapSubPartitions),
        );
        let mut style = FormatStyle::default();
        style.column_limit = 12;

        format_partition_tree(&mut tokens, &mut tree, root, &style, 1000, &NoAlignment, &[]).unwrap();
        let first_pass = render(&tokens, &tree, root);

        for word in words {
            assert_eq!(
                first_pass.matches(word).count(),
                1,
                "token {word} must appear exactly once in the output"
            );
        }
        assert!(words.iter().fold((true, 0usize), |(ok, last), w| {
            match first_pass.find(w) {
                Some(pos) if pos >= last => (ok, pos),
                _ => (false, last),
            }
        }).0, "tokens must appear in their original order");

        let reparsed: Vec<&str> = first_pass.split_whitespace().collect();
        let mut tokens2 = TokenBuffer::new("");
        for w in &reparsed {
            tokens2.push(FormatToken::new(w, TokenKind(0)));
        }
        let mut tree2 = PartitionTree::new();
        let root2 = tree2.insert_root(
            UnwrappedLine::new(0, 0..reparsed.len())
                .with_policy(PartitionPolicy::WrapSubPartitions),
        );
        format_partition_tree(&mut tokens2, &mut tree2, root2, &style, 1000, &NoAlignment, &[]).unwrap();
        let second_pass = render(&tokens2, &tree2, root2);

        assert_eq!(first_pass, second_pass, "reformatting already-formatted output must be a no-op");
    }

    #[test]
    fn try_wrap_long_lines_false_emits_overflowing_line_as_is() {
        let mut tokens = TokenBuffer::new("");
        tokens.push(FormatToken::new("aaaaaaaaaa", TokenKind(0)));
        tokens.push(FormatToken::new("bbbbbbbbbb", TokenKind(0)));
        let mut tree = PartitionTree::new();
        let root = tree.insert_root(
            UnwrappedLine::new(0, 0..2).with_policy(PartitionPolicy::AlwaysExpand),
        );
        let mut style = FormatStyle::default();
        style.column_limit = 12;
        style.try_wrap_long_lines = false;
        let excerpts = format_partition_tree(&mut tokens, &mut tree, root, &style, 1000, &NoAlignment, &[]).unwrap();
        assert_eq!(excerpts.len(), 1);
        assert_eq!(tokens.get(1).before.break_decision, BreakDecision::MustAppend);
    }
}
