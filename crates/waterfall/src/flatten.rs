use spanview_core::model::span::ProcessedSpan;

/// Pre-order walk of the forest: every span is followed by its whole subtree,
/// children in their stored order. Iterative, so depth is bounded by heap,
/// not stack.
pub fn flatten(roots: &[ProcessedSpan]) -> Vec<&ProcessedSpan> {
    let mut out = Vec::new();
    let mut stack: Vec<&ProcessedSpan> = roots.iter().rev().collect();
    while let Some(span) = stack.pop() {
        out.push(span);
        stack.extend(span.children.iter().rev());
    }
    out
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, HashMap};

    use super::*;

    fn node(id: &str, start: f64, level: usize, children: Vec<ProcessedSpan>) -> ProcessedSpan {
        ProcessedSpan {
            trace_id: "t".to_string(),
            span_id: id.to_string(),
            parent_span_id: None,
            name: id.to_string(),
            operation_name: id.to_string(),
            start_time: start,
            end_time: start + 1.0,
            duration: 1.0,
            attributes: BTreeMap::new(),
            status: None,
            service_name: "svc".to_string(),
            level,
            children,
        }
    }

    fn forest() -> Vec<ProcessedSpan> {
        vec![
            node(
                "a",
                0.0,
                0,
                vec![
                    node("a1", 1.0, 1, vec![node("a1x", 2.0, 2, vec![])]),
                    node("a2", 5.0, 1, vec![]),
                ],
            ),
            node("b", 3.0, 0, vec![node("b1", 4.0, 1, vec![])]),
        ]
    }

    #[test]
    fn emits_pre_order() {
        let roots = forest();
        let ids: Vec<_> = flatten(&roots)
            .iter()
            .map(|s| s.span_id.as_str())
            .collect();
        assert_eq!(ids, vec!["a", "a1", "a1x", "a2", "b", "b1"]);
    }

    #[test]
    fn subtrees_are_contiguous_after_their_root() {
        let roots = forest();
        let flat = flatten(&roots);
        let position: HashMap<&str, usize> = flat
            .iter()
            .enumerate()
            .map(|(i, s)| (s.span_id.as_str(), i))
            .collect();

        for span in &flat {
            let at = position[span.span_id.as_str()];
            let size = span.subtree_len();
            for descendant in flatten(std::slice::from_ref(*span)) {
                let d = position[descendant.span_id.as_str()];
                assert!(d >= at && d < at + size);
            }
        }
    }

    #[test]
    fn empty_forest_flattens_to_nothing() {
        assert!(flatten(&[]).is_empty());
    }
}
