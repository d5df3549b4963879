//! Layout solver ("tree reshaper", §4.2): a piecewise-linear dynamic-
//! programming optimizer that picks how a partition subtree's children
//! compose horizontally, vertically, or wrapped, and materializes the
//! winning choice back into the partition tree.
//!
//! Grounded in `common/formatting/tree_reshaper.{h,cc}`. Knot costs are
//! kept as `f64` rather than the original's `int` so the `Wrap` DP's
//! `cpack` tiebreak (a sub-unit constant) composes exactly instead of being
//! rounded away at every recursion level; everything else follows the
//! original's structure knot-for-knot.

use std::rc::Rc;

use crate::error::{Error, Result};
use crate::partition::{PartitionId, PartitionTree};
use crate::style::FormatStyle;
use crate::token::{BreakDecision, TokenBuffer};
use crate::unwrapped_line::{PartitionPolicy, UnwrappedLine};

/// §3 "Layout Node": a tagged variant of how a subtree might render.
#[derive(Debug, Clone)]
pub enum Layout {
    Text(UnwrappedLine),
    /// Always exactly 2 children once produced by `h_plus`; the solver's
    /// fold-from-the-right combinator tolerates arbitrary arity on the way
    /// in (§4.2 "Horizontal — fold from the right"), but a materialized
    /// result is always a pairwise merge.
    Horizontal(Vec<Rc<Layout>>),
    Vertical(Vec<Rc<Layout>>),
    Choice(Vec<Rc<Layout>>),
    Wrap(Vec<Rc<Layout>>),
}

/// A breakpoint on a piecewise-linear cost-vs-starting-column curve (§3
/// "Knot and Knot Set").
#[derive(Debug, Clone)]
pub struct Knot {
    pub column: i64,
    pub span: i64,
    pub intercept: f64,
    pub gradient: f64,
    pub leading_spaces: i64,
    pub layout: Rc<Layout>,
}

impl Knot {
    fn value_at(&self, margin: i64) -> f64 {
        self.intercept + self.gradient * (margin - self.column) as f64
    }
}

/// A sorted sequence of knots describing one subtree's cost curve. An empty
/// knot set is the `rest_of_line` identity (§4.2's `WithRestOfLine` short
/// circuit) and is also what `Choice`/`Wrap` return for zero children (§7,
/// §8): zero cost at every column, distinct from a one-knot flat-zero curve.
#[derive(Debug, Clone, Default)]
pub struct KnotSet {
    knots: Vec<Knot>,
}

impl KnotSet {
    pub fn empty() -> Self {
        Self { knots: Vec::new() }
    }

    pub fn is_empty(&self) -> bool {
        self.knots.is_empty()
    }

    pub fn knots(&self) -> &[Knot] {
        &self.knots
    }

    fn plus_const(&self, value: f64) -> Self {
        Self {
            knots: self
                .knots
                .iter()
                .map(|k| Knot {
                    intercept: k.intercept + value,
                    ..k.clone()
                })
                .collect(),
        }
    }

    /// `WithRestOfLine`: compose `self` to the left of `rest_of_line`, or
    /// return `self` unchanged when there is no rest of line.
    fn with_rest_of_line(&self, rest_of_line: &KnotSet, style: &FormatStyle) -> Self {
        if rest_of_line.is_empty() {
            self.clone()
        } else {
            h_plus(self, rest_of_line, style)
        }
    }

    /// The cost of the winning layout at starting column 0, and the layout
    /// that realizes it — what the driver reads off after solving a
    /// top-level subtree (always entered at margin 0).
    pub fn first_knot(&self) -> Option<&Knot> {
        self.knots.first()
    }
}

/// An input-iterator cursor over one knot set's own array, repositionable
/// to any margin by scanning forward or back (§9 "Solver iterator
/// semantics" — never a mutating cursor over shared state).
struct KnotCursor<'a> {
    knots: &'a [Knot],
    index: usize,
}

impl<'a> KnotCursor<'a> {
    fn new(knots: &'a [Knot]) -> Self {
        Self { knots, index: 0 }
    }

    fn knot(&self) -> &Knot {
        &self.knots[self.index]
    }

    fn value_at(&self, margin: i64) -> f64 {
        self.knot().value_at(margin)
    }

    /// The column of the next knot, or `None` past the last one (the
    /// original's `std::numeric_limits<int>::max()` sentinel).
    fn next_knot(&self) -> Option<i64> {
        self.knots.get(self.index + 1).map(|k| k.column)
    }

    fn current_column(&self) -> i64 {
        self.knot().column
    }

    fn advance(&mut self) {
        self.index += 1;
    }

    fn move_to_margin(&mut self, margin: i64) {
        if self.current_column() > margin {
            while self.current_column() > margin {
                self.index -= 1;
            }
        } else {
            while let Some(next) = self.next_knot() {
                if next <= margin {
                    self.index += 1;
                } else {
                    break;
                }
            }
        }
    }
}

/// Horizontal concatenation: walk both knot sequences in lock-step,
/// advancing whichever knot is about to become stale next (§4.2 `HPlus`).
pub fn h_plus(left: &KnotSet, right: &KnotSet, style: &FormatStyle) -> KnotSet {
    let mut s1 = KnotCursor::new(&left.knots);
    let mut s2 = KnotCursor::new(&right.knots);

    let mut s1_margin: i64 = 0;
    let mut s2_margin = s1.knot().span + s2.knot().leading_spaces;
    s2.move_to_margin(s2_margin);

    let mut result = Vec::new();
    let limit = style.column_limit;
    let penalty = style.over_column_limit_penalty as f64;

    loop {
        let g1 = s1.knot().gradient;
        let g2 = s2.knot().gradient;
        let overhang = s2_margin - limit;
        let g_cur = g1 + g2 - if overhang >= 0 { penalty } else { 0.0 };
        let i_cur =
            s1.value_at(s1_margin) + s2.value_at(s2_margin) - penalty * overhang.max(0) as f64;

        result.push(Knot {
            column: s1_margin,
            span: s1.knot().span + s2.knot().span + s2.knot().leading_spaces,
            intercept: i_cur,
            gradient: g_cur,
            leading_spaces: s1.knot().leading_spaces,
            layout: Rc::new(Layout::Horizontal(vec![
                Rc::clone(&s1.knot().layout),
                Rc::clone(&s2.knot().layout),
            ])),
        });

        let kn1 = s1.next_knot();
        let kn2 = s2.next_knot();
        if kn1.is_none() && kn2.is_none() {
            break;
        }

        let d1 = kn1.map(|k| k - s1_margin);
        let d2 = kn2.map(|k| k - s2_margin);
        let advance_s1 = match (d1, d2) {
            (Some(a), Some(b)) => a <= b,
            (Some(_), None) => true,
            (None, Some(_)) => false,
            (None, None) => unreachable!(),
        };

        if advance_s1 {
            s1.advance();
            s1_margin = kn1.unwrap();
            s2_margin = s1_margin + s1.knot().span + s2.knot().leading_spaces;
            s2.move_to_margin(s2_margin);
        } else {
            s2.advance();
            s2_margin = kn2.unwrap();
            s1_margin = s2_margin - s1.knot().span - s2.knot().leading_spaces;
        }
    }

    KnotSet { knots: result }
}

/// Vertical stacking: the next knot is the smallest "next knot" across all
/// child cursors; every cursor then advances to that margin (§4.2 `VSum`).
pub fn v_sum(children: &[KnotSet], _style: &FormatStyle) -> KnotSet {
    if children.is_empty() {
        return KnotSet::empty();
    }
    let mut cursors: Vec<KnotCursor> = children.iter().map(|c| KnotCursor::new(&c.knots)).collect();
    let mut margin: i64 = 0;
    let mut result = Vec::new();

    loop {
        let mut intercept = 0.0;
        let mut gradient = 0.0;
        let mut layouts = Vec::with_capacity(cursors.len());
        for cursor in &cursors {
            intercept += cursor.value_at(margin);
            gradient += cursor.knot().gradient;
            layouts.push(Rc::clone(&cursor.knot().layout));
        }
        result.push(Knot {
            column: margin,
            span: cursors.last().unwrap().knot().span,
            intercept,
            gradient,
            leading_spaces: cursors.first().unwrap().knot().leading_spaces,
            layout: Rc::new(Layout::Vertical(layouts)),
        });

        let mut d_star: Option<i64> = None;
        for cursor in &cursors {
            if let Some(next) = cursor.next_knot() {
                if next > margin {
                    let d = next - margin;
                    d_star = Some(d_star.map_or(d, |cur| cur.min(d)));
                }
            }
        }

        match d_star {
            None => break,
            Some(d) => {
                margin += d;
                for cursor in &mut cursors {
                    cursor.move_to_margin(margin);
                }
            }
        }
    }

    KnotSet { knots: result }
}

/// Pointwise lower envelope (§4.2 `MinOver`): sweep forward from column 0,
/// tracking the current winner; when a lower-gradient competitor would
/// overtake it before the next knot boundary, emit a knot at the crossing.
pub fn min_over(children: &[KnotSet], _style: &FormatStyle) -> KnotSet {
    match children.len() {
        0 => return KnotSet::empty(),
        1 => return children[0].clone(),
        _ => {}
    }

    let mut cursors: Vec<KnotCursor> = children.iter().map(|c| KnotCursor::new(&c.knots)).collect();
    let mut result = Vec::new();
    let mut k_l: i64 = 0;
    let mut last_key: Option<(usize, usize)> = None;

    'outer: loop {
        let next_knot_bound = cursors.iter().filter_map(|c| c.next_knot()).min();
        let k_h = next_knot_bound.map(|v| v - 1);

        loop {
            let (i_min, min_value) = cursors
                .iter()
                .enumerate()
                .map(|(i, c)| (i, c.value_at(k_l)))
                .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap())
                .unwrap();
            let min_gradient = cursors[i_min].knot().gradient;
            let key = (i_min, cursors[i_min].index);

            if last_key != Some(key) {
                let winner = cursors[i_min].knot();
                result.push(Knot {
                    column: k_l,
                    span: winner.span,
                    intercept: min_value,
                    gradient: min_gradient,
                    leading_spaces: winner.leading_spaces,
                    layout: Rc::clone(&winner.layout),
                });
                last_key = Some(key);
            }

            let mut next_crossing: Option<i64> = None;
            for cursor in &cursors {
                let gradient = cursor.knot().gradient;
                if gradient >= min_gradient {
                    continue;
                }
                let value = cursor.value_at(k_l);
                let gamma = (value - min_value) / (min_gradient - gradient);
                let d = gamma.ceil() as i64;
                if d <= 0 {
                    continue;
                }
                let candidate = k_l + d;
                if let Some(h) = k_h {
                    if candidate > h {
                        continue;
                    }
                }
                next_crossing = Some(next_crossing.map_or(candidate, |cur| cur.min(candidate)));
            }

            match next_crossing {
                Some(next) => k_l = next,
                None => match k_h {
                    Some(h) => {
                        k_l = h + 1;
                        for cursor in &mut cursors {
                            cursor.move_to_margin(k_l);
                        }
                        break;
                    }
                    None => break 'outer,
                },
            }
        }
    }

    KnotSet { knots: result }
}

fn unwrapped_line_width(tokens: &TokenBuffer, line: &UnwrappedLine) -> i64 {
    let mut width = 0;
    for (i, idx) in line.tokens.clone().enumerate() {
        let token = tokens.get(idx);
        if i > 0 {
            width += token.before.required_spaces as i64;
        }
        width += token.width();
    }
    width
}

fn leaf_curve(tokens: &TokenBuffer, line: &UnwrappedLine, style: &FormatStyle, layout: Rc<Layout>) -> KnotSet {
    let span = unwrapped_line_width(tokens, line);
    let leading_spaces = if line.tokens.is_empty() {
        0
    } else {
        tokens.get(line.tokens.start).before.required_spaces as i64
    };
    let limit = style.column_limit;
    let penalty = style.over_column_limit_penalty as f64;

    let knots = if span >= limit {
        vec![Knot {
            column: 0,
            span,
            intercept: (span - limit) as f64 * penalty,
            gradient: penalty,
            leading_spaces,
            layout,
        }]
    } else {
        vec![
            Knot {
                column: 0,
                span,
                intercept: 0.0,
                gradient: 0.0,
                leading_spaces,
                layout: Rc::clone(&layout),
            },
            Knot {
                column: limit - span,
                span,
                intercept: 0.0,
                gradient: penalty,
                leading_spaces,
                layout,
            },
        ]
    };
    KnotSet { knots }
}

/// Solve a block tree for the minimum-cost curve, dispatching per layout
/// variant (§4.2 "Combinators on policies").
pub fn compute_solution(
    tokens: &TokenBuffer,
    layout: &Rc<Layout>,
    rest_of_line: &KnotSet,
    style: &FormatStyle,
) -> KnotSet {
    match layout.as_ref() {
        Layout::Text(line) => {
            if rest_of_line.is_empty() {
                leaf_curve(tokens, line, style, Rc::clone(layout))
            } else {
                let bare = leaf_curve(tokens, line, style, Rc::clone(layout));
                bare.with_rest_of_line(rest_of_line, style)
            }
        }
        Layout::Horizontal(children) => {
            let mut set = rest_of_line.clone();
            for child in children.iter().rev() {
                set = compute_solution(tokens, child, &set, style);
            }
            set
        }
        Layout::Vertical(children) => {
            if children.is_empty() {
                return KnotSet::empty();
            }
            let mut solutions = Vec::with_capacity(children.len());
            for child in &children[..children.len() - 1] {
                solutions.push(compute_solution(tokens, child, &KnotSet::empty(), style));
            }
            solutions.push(compute_solution(tokens, children.last().unwrap(), rest_of_line, style));
            let set = v_sum(&solutions, style);
            let extra = if children.len() > 1 {
                (children.len() - 1) as f64 * style.line_break_penalty as f64
            } else {
                0.0
            };
            set.plus_const(extra)
        }
        Layout::Choice(children) => {
            if children.is_empty() {
                return KnotSet::empty();
            }
            let mut solutions = Vec::with_capacity(children.len());
            for child in &children[..children.len() - 1] {
                solutions.push(compute_solution(tokens, child, &KnotSet::empty(), style));
            }
            solutions.push(compute_solution(tokens, children.last().unwrap(), rest_of_line, style));
            min_over(&solutions, style)
        }
        Layout::Wrap(children) => {
            if children.is_empty() {
                return KnotSet::empty();
            }
            let n = children.len();
            const CPACK: f64 = 1e-3;
            let elt_layouts: Vec<KnotSet> = children
                .iter()
                .map(|c| compute_solution(tokens, c, &KnotSet::empty(), style))
                .collect();
            let mut wrap_solutions: Vec<KnotSet> = vec![KnotSet::empty(); n];

            for i in (0..n).rev() {
                let mut line_layout = elt_layouts[i].clone();
                let mut candidates = Vec::new();
                for j in i..n - 1 {
                    let full = v_sum(&[line_layout.clone(), wrap_solutions[j + 1].clone()], style);
                    let bonus = style.line_break_penalty as f64 + CPACK * (n - j) as f64;
                    candidates.push(full.plus_const(bonus));
                    line_layout = line_layout.with_rest_of_line(&elt_layouts[j + 1], style);
                }
                candidates.push(line_layout.with_rest_of_line(rest_of_line, style));
                wrap_solutions[i] = min_over(&candidates, style);
            }

            wrap_solutions.into_iter().next().unwrap_or_else(KnotSet::empty)
        }
    }
}

/// One node of the materialized result tree, built bottom-up before being
/// spliced into the real arena-backed `PartitionTree`.
struct Materialized {
    line: UnwrappedLine,
    children: Vec<Materialized>,
}

fn shift_materialized_indent(node: &mut Materialized, delta: i64) {
    node.line.indentation_spaces += delta;
    for child in &mut node.children {
        shift_materialized_indent(child, delta);
    }
}

/// Convert the winning `Layout` back into a partition subtree (§4.2
/// "Materialization"). `Choice` and `Wrap` reaching here means the solver
/// left a decision unresolved — an invariant violation, not recoverable
/// input.
fn build_token_partition_tree(tokens: &TokenBuffer, layout: &Layout) -> Result<Materialized> {
    match layout {
        Layout::Text(line) => Ok(Materialized {
            line: line.clone(),
            children: Vec::new(),
        }),
        Layout::Vertical(children) => {
            if children.is_empty() {
                return Ok(Materialized {
                    line: UnwrappedLine::new(0, 0..0),
                    children: Vec::new(),
                });
            }
            if children.len() == 1 {
                return build_token_partition_tree(tokens, &children[0]);
            }

            let mut iter = children.iter();
            let first = build_token_partition_tree(tokens, iter.next().unwrap())?;
            let mut line = first.line.clone();
            line.policy = PartitionPolicy::AlwaysExpand;
            let mut flat_children = if first.children.is_empty() {
                vec![first]
            } else {
                first.children
            };

            for child_layout in iter {
                let sub = build_token_partition_tree(tokens, child_layout)?;
                line.extend_end(sub.line.tokens.end);
                if sub.children.is_empty() {
                    flat_children.push(sub);
                } else {
                    for grandchild in sub.children {
                        if !grandchild.children.is_empty() {
                            return Err(Error::InvariantViolation(
                                "vertical merge encountered a doubly-nested stack".into(),
                            ));
                        }
                        line.extend_end(grandchild.line.tokens.end);
                        flat_children.push(grandchild);
                    }
                }
            }

            Ok(Materialized {
                line,
                children: flat_children,
            })
        }
        Layout::Horizontal(children) => {
            if children.len() != 2 {
                return Err(Error::InvariantViolation(format!(
                    "horizontal merge expects exactly 2 children, got {}",
                    children.len()
                )));
            }
            let left = build_token_partition_tree(tokens, &children[0])?;
            let right = build_token_partition_tree(tokens, &children[1])?;
            merge_horizontal(tokens, left, right)
        }
        Layout::Choice(_) => Err(Error::UnresolvedLayoutNode("Choice")),
        Layout::Wrap(_) => Err(Error::UnresolvedLayoutNode("Wrap")),
    }
}

/// The three legal horizontal-merge shapes (§4.2 "Materialization"): both
/// leaves, a leaf fused with a multi-child stack, or a multi-child stack
/// fused with a leaf. A stack merged with another stack never arises
/// because `h_plus` only ever pairs a `Text` leaf against a `rest_of_line`.
fn merge_horizontal(tokens: &TokenBuffer, left: Materialized, right: Materialized) -> Result<Materialized> {
    match (left.children.is_empty(), right.children.is_empty()) {
        (true, true) => {
            let mut line = left.line;
            line.extend_end(right.line.tokens.end);
            line.policy = PartitionPolicy::AlwaysExpand;
            Ok(Materialized {
                line,
                children: Vec::new(),
            })
        }
        (true, false) => {
            let indent = unwrapped_line_width(tokens, &left.line);
            let self_indent = left.line.indentation_spaces;

            let mut right_children = right.children;
            let first_child = right_children.remove(0);

            let mut fused = left.line.clone();
            fused.extend_end(first_child.line.tokens.end);
            fused.policy = PartitionPolicy::AlwaysExpand;

            let extra_spaces = {
                let combined_width = unwrapped_line_width(tokens, &fused);
                let first_child_width = unwrapped_line_width(tokens, &first_child.line);
                if combined_width - indent - first_child_width > 0 {
                    1
                } else {
                    0
                }
            };

            let mut merged_line = left.line;
            merged_line.extend_end(right.line.tokens.end);
            merged_line.policy = PartitionPolicy::AlwaysExpand;

            let delta = indent - self_indent + extra_spaces;
            let mut new_children = Vec::with_capacity(right_children.len() + 1);
            new_children.push(Materialized {
                line: fused,
                children: Vec::new(),
            });
            for mut child in right_children {
                shift_materialized_indent(&mut child, delta);
                new_children.push(child);
            }

            Ok(Materialized {
                line: merged_line,
                children: new_children,
            })
        }
        (false, true) => {
            let mut merged = left;
            merged.line.extend_end(right.line.tokens.end);
            merged.children.last_mut().unwrap().line.extend_end(right.line.tokens.end);
            Ok(merged)
        }
        (false, false) => Err(Error::InvariantViolation(
            "horizontal merge of two multi-child subtrees is unsupported".into(),
        )),
    }
}

/// Map partition policies onto layout variants, splitting any `Text`
/// carrying an internal `MustWrap` token into a `Vertical` of pieces (§4.2
/// "Block tree").
pub fn build_layout_tree(tokens: &TokenBuffer, tree: &PartitionTree, id: PartitionId) -> Rc<Layout> {
    let node = tree.node(id);
    if !node.children.is_empty() {
        match node.line.policy {
            PartitionPolicy::ApplyOptimalLayout => {
                let children: Vec<Rc<Layout>> = tree
                    .children(id)
                    .iter()
                    .map(|&c| build_layout_tree(tokens, tree, c))
                    .collect();
                return Rc::new(Layout::Choice(children));
            }
            PartitionPolicy::WrapSubPartitions => {
                let children: Vec<Rc<Layout>> = tree
                    .children(id)
                    .iter()
                    .map(|&c| build_layout_tree(tokens, tree, c))
                    .collect();
                return Rc::new(Layout::Wrap(children));
            }
            _ => {}
        }
    }
    split_text_at_must_wrap(tokens, &node.line)
}

fn split_text_at_must_wrap(tokens: &TokenBuffer, line: &UnwrappedLine) -> Rc<Layout> {
    if line.tokens.is_empty() {
        return Rc::new(Layout::Text(line.clone()));
    }

    let mut pieces = Vec::new();
    let mut piece_start = line.tokens.start;
    for idx in line.tokens.clone() {
        if idx > line.tokens.start && tokens.get(idx).before.break_decision == BreakDecision::MustWrap {
            pieces.push(piece_start..idx);
            piece_start = idx;
        }
    }
    pieces.push(piece_start..line.tokens.end);

    if pieces.len() == 1 {
        Rc::new(Layout::Text(line.clone()))
    } else {
        let texts = pieces
            .into_iter()
            .map(|range| {
                Rc::new(Layout::Text(
                    UnwrappedLine::new(line.indentation_spaces, range).with_policy(PartitionPolicy::AlwaysExpand),
                ))
            })
            .collect();
        Rc::new(Layout::Vertical(texts))
    }
}

fn insert_subtree(tree: &mut PartitionTree, parent: PartitionId, node: Materialized) -> PartitionId {
    let id = tree.insert_detached(node.line);
    let child_ids: Vec<PartitionId> = node
        .children
        .into_iter()
        .map(|child| insert_subtree(tree, id, child))
        .collect();
    if !child_ids.is_empty() {
        tree.set_children(id, child_ids);
    }
    let _ = parent;
    id
}

/// Solve the subtree rooted at `id` (already dedented by the caller) and
/// materialize the winning layout, without touching tree indentation.
/// Split out of `reshape_partition_subtree` so that function can restore
/// indentation on every exit path, including this one's error path.
fn solve_and_materialize(
    tokens: &TokenBuffer,
    tree: &PartitionTree,
    id: PartitionId,
    dedented_style: &FormatStyle,
) -> Result<Materialized> {
    let layout_tree = build_layout_tree(tokens, tree, id);
    let solution = compute_solution(tokens, &layout_tree, &KnotSet::empty(), dedented_style);

    let winner = solution
        .first_knot()
        .ok_or_else(|| Error::InvariantViolation("layout solution produced no knots".into()))?;
    build_token_partition_tree(tokens, &winner.layout)
}

/// Top-level entry point (§4.2 "Indentation handling"): solve the subtree
/// rooted at `id` against a zero-indent column limit, materialize the
/// winner, and splice it back in with the original indentation restored.
pub fn reshape_partition_subtree(
    tokens: &TokenBuffer,
    tree: &mut PartitionTree,
    id: PartitionId,
    style: &FormatStyle,
) -> Result<()> {
    let indent = tree.node(id).line.indentation_spaces;
    tree.shift_indentation(id, -indent);

    let dedented_style = style.dedent(indent);
    let result = solve_and_materialize(tokens, tree, id, &dedented_style);

    // Restore indentation unconditionally so an `Err` here never leaves the
    // subtree under-counted relative to its parent.
    tree.shift_indentation(id, indent);
    let materialized = result?;

    let new_policy = materialized.line.policy;
    let new_line_tokens = materialized.line.tokens.clone();
    let child_ids: Vec<PartitionId> = materialized
        .children
        .into_iter()
        .map(|child| insert_subtree(tree, id, child))
        .collect();

    {
        let node = tree.node_mut(id);
        node.line.tokens = new_line_tokens;
        node.line.policy = new_policy;
    }
    tree.set_children(id, child_ids);
    tree.shift_indentation(id, indent);

    Ok(())
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn flat_knot_set(cost: f64, span: i64) -> KnotSet {
        KnotSet {
            knots: vec![Knot {
                column: 0,
                span,
                intercept: cost,
                gradient: 0.0,
                leading_spaces: 0,
                layout: Rc::new(Layout::Vertical(Vec::new())),
            }],
        }
    }

    proptest! {
        /// §8 "VSum additivity": stacking N flat (zero-gradient) curves sums
        /// their intercepts at every margin, since each child's cost is
        /// margin-independent.
        #[test]
        fn v_sum_is_additive_over_flat_curves(costs in prop::collection::vec(0.0f64..100.0, 1..6)) {
            let style = FormatStyle::default();
            let sets: Vec<KnotSet> = costs.iter().map(|&c| flat_knot_set(c, 3)).collect();
            let summed = v_sum(&sets, &style);
            let expected: f64 = costs.iter().sum();
            prop_assert_eq!(summed.knots().len(), 1);
            prop_assert!((summed.knots()[0].intercept - expected).abs() < 1e-6);
        }

        /// §8 "HPlus+VSum convexity": every curve this solver produces from
        /// convex children stays convex — consecutive knots' gradients never
        /// decrease, since a cost curve that got cheaper to extend further
        /// right than it was to extend a little would never be optimal.
        #[test]
        fn h_plus_of_convex_curves_is_convex(
            left_cost in 0i64..40,
            right_cost in 0i64..40,
            limit in 20i64..60,
        ) {
            let style = FormatStyle { column_limit: limit, over_column_limit_penalty: 100, ..FormatStyle::default() };
            let tokens = TokenBuffer::new("");
            let left_line = UnwrappedLine::new(0, 0..0);
            let right_line = UnwrappedLine::new(0, 0..0);
            let left = leaf_curve(&tokens, &left_line, &FormatStyle { column_limit: left_cost, ..style }, Rc::new(Layout::Text(left_line.clone())));
            let right = leaf_curve(&tokens, &right_line, &FormatStyle { column_limit: right_cost, ..style }, Rc::new(Layout::Text(right_line.clone())));
            let composed = h_plus(&left, &right, &style);
            for pair in composed.knots().windows(2) {
                prop_assert!(pair[0].gradient <= pair[1].gradient + 1e-9);
            }
        }
    }
}
