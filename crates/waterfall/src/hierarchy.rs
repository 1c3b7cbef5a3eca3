use std::collections::VecDeque;

use spanview_core::model::span::ProcessedSpan;
use spanview_core::model::waterfall::{IssueKind, SpanIssue};

use crate::normalize::Normalized;

/// A trace as a forest. Roots and every `children` list are ordered by
/// ascending start time; ties keep document order.
#[derive(Debug, Clone, Default)]
pub struct SpanTree {
    pub roots: Vec<ProcessedSpan>,
    pub issues: Vec<SpanIssue>,
}

impl SpanTree {
    pub fn span_count(&self) -> usize {
        self.roots.iter().map(ProcessedSpan::subtree_len).sum()
    }
}

/// Links normalized spans into an owned forest.
///
/// Linking happens over an index arena first, levels are assigned afterwards
/// by breadth-first traversal from the roots, so a child never reads a parent
/// level that has not been settled yet. Spans that are unreachable from any
/// root sit on a `parentSpanId` cycle; the cycle is cut at the first span seen
/// twice while walking up, and that span becomes a root.
pub fn build_tree(normalized: Normalized) -> SpanTree {
    let Normalized {
        spans,
        index,
        mut issues,
    } = normalized;
    let n = spans.len();

    let mut parent: Vec<Option<usize>> = spans
        .iter()
        .map(|s| {
            s.parent_span_id
                .as_deref()
                .and_then(|id| index.get(id).copied())
        })
        .collect();

    let mut children: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut roots = Vec::new();
    for (i, p) in parent.iter().enumerate() {
        match p {
            Some(p) => children[*p].push(i),
            None => roots.push(i),
        }
    }

    let mut levels = vec![0usize; n];
    let mut reached = vec![false; n];
    let mut order = Vec::with_capacity(n);
    let mut queue: VecDeque<usize> = roots.iter().copied().collect();
    for &r in &roots {
        reached[r] = true;
    }
    assign_levels(&mut queue, &children, &mut levels, &mut reached, &mut order);

    let mut cursor = 0;
    while order.len() < n {
        while reached[cursor] {
            cursor += 1;
        }
        let cut = find_cycle_member(cursor, &parent);
        if let Some(p) = parent[cut].take() {
            children[p].retain(|&c| c != cut);
        }
        tracing::warn!(
            span_id = %spans[cut].span_id,
            "parent cycle detected; treating span as a root"
        );
        issues.push(SpanIssue::new(&spans[cut].span_id, IssueKind::CycleBroken));

        roots.push(cut);
        reached[cut] = true;
        queue.push_back(cut);
        assign_levels(&mut queue, &children, &mut levels, &mut reached, &mut order);
    }

    let by_start = |a: &usize, b: &usize| spans[*a].start_time.total_cmp(&spans[*b].start_time);
    roots.sort_by(by_start);
    for list in &mut children {
        list.sort_by(by_start);
    }

    // Reverse BFS order visits every child before its parent, so subtrees
    // are complete by the time they are moved into their owner.
    let mut slots: Vec<Option<ProcessedSpan>> = spans.into_iter().map(Some).collect();
    for &i in order.iter().rev() {
        let owned: Vec<ProcessedSpan> = children[i]
            .iter()
            .filter_map(|&c| slots[c].take())
            .collect();
        if let Some(span) = slots[i].as_mut() {
            span.level = levels[i];
            span.children = owned;
        }
    }

    SpanTree {
        roots: roots.iter().filter_map(|&r| slots[r].take()).collect(),
        issues,
    }
}

fn assign_levels(
    queue: &mut VecDeque<usize>,
    children: &[Vec<usize>],
    levels: &mut [usize],
    reached: &mut [bool],
    order: &mut Vec<usize>,
) {
    while let Some(i) = queue.pop_front() {
        order.push(i);
        for &c in &children[i] {
            if !reached[c] {
                reached[c] = true;
                levels[c] = levels[i] + 1;
                queue.push_back(c);
            }
        }
    }
}

/// Walks parent pointers from `start` until a span repeats. Only called for
/// unreached spans, whose ancestry never ends at a root.
fn find_cycle_member(start: usize, parent: &[Option<usize>]) -> usize {
    let mut seen = vec![false; parent.len()];
    let mut current = start;
    while !seen[current] {
        seen[current] = true;
        match parent[current] {
            Some(p) => current = p,
            None => return current,
        }
    }
    current
}
