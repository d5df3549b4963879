//! Benchmarks knot-set composition and solving for the layout solver, the
//! same shape as the teacher's `complete_user_widths` bench: a group of
//! input sizes, one `bench_with_input` per size.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

use sv_format_core::partition::PartitionTree;
use sv_format_core::style::FormatStyle;
use sv_format_core::token::{FormatToken, TokenKind};
use sv_format_core::unwrapped_line::{PartitionPolicy, UnwrappedLine};
use sv_format_core::{layout, wrap_search};

/// A chain of `n` short tokens under a single `ApplyOptimalLayout` parent,
/// mimicking a wide binary-operator chain or argument list.
fn build_chain(n: usize) -> (sv_format_core::token::TokenBuffer, PartitionTree) {
    let mut tokens = sv_format_core::token::TokenBuffer::new("");
    let mut tree = PartitionTree::new();
    let root = tree.insert_root(
        UnwrappedLine::new(2, 0..0).with_policy(PartitionPolicy::ApplyOptimalLayout),
    );
    let mut children = Vec::with_capacity(n);
    for i in 0..n {
        let start = tokens.len();
        tokens.push(FormatToken::new(format!("operand_{i}"), TokenKind(0)));
        let line = UnwrappedLine::new(2, start..start + 1).with_policy(PartitionPolicy::AlwaysExpand);
        children.push(tree.insert_child(root, line));
    }
    tree.node_mut(root).line.tokens = 0..tokens.len();
    (tokens, tree)
}

fn bench_reshape(c: &mut Criterion) {
    let mut group = c.benchmark_group("reshape_partition_subtree");
    let style = FormatStyle::default();
    for &n in &[2usize, 4, 8, 16, 32] {
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            b.iter_batched(
                || build_chain(n),
                |(mut tokens, mut tree)| {
                    let root = tree.root().unwrap();
                    layout::reshape_partition_subtree(&mut tokens, &mut tree, root, &style).unwrap();
                },
                criterion::BatchSize::SmallInput,
            )
        });
    }
    group.finish();
}

fn bench_wrap_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("search_line_wraps");
    let style = FormatStyle::default();
    for &n in &[4usize, 8, 16, 32, 64] {
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            b.iter_batched(
                || {
                    let mut tokens = sv_format_core::token::TokenBuffer::new("");
                    for i in 0..n {
                        tokens.push(FormatToken::new(format!("tok_{i}"), TokenKind(0)));
                    }
                    let line = UnwrappedLine::new(0, 0..n);
                    (tokens, line)
                },
                |(mut tokens, line)| {
                    wrap_search::search_line_wraps(&mut tokens, &line, &style, 50_000);
                },
                criterion::BatchSize::SmallInput,
            )
        });
    }
    group.finish();
}

criterion_group!(benches, bench_reshape, bench_wrap_search);
criterion_main!(benches);
