//! Parallel recursion over allele trees.
//!
//! Both algorithms visit children before parents and expose each node to the
//! handler in flattened form, so handlers only ever see scalar metadata.

use super::allele::{Allele, AlleleOverrides, MetaValue};
use crate::error::{ClanTuneError, Result};
use std::collections::{BTreeMap, BTreeSet};

/// Inclusion requirement on a node's own flags. `None` accepts either value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NodeFilter {
    pub can_mutate: Option<bool>,
    pub can_crossbreed: Option<bool>,
}

impl NodeFilter {
    pub const ALL: NodeFilter = NodeFilter {
        can_mutate: None,
        can_crossbreed: None,
    };

    pub fn mutable() -> Self {
        Self {
            can_mutate: Some(true),
            can_crossbreed: None,
        }
    }

    pub fn crossbreedable() -> Self {
        Self {
            can_mutate: None,
            can_crossbreed: Some(true),
        }
    }

    pub fn admits(&self, node: &Allele) -> bool {
        self.can_mutate.map_or(true, |want| node.can_mutate() == want)
            && self
                .can_crossbreed
                .map_or(true, |want| node.can_crossbreed() == want)
    }
}

struct Frame<'a> {
    nodes: Vec<&'a Allele>,
    children: Option<std::vec::IntoIter<String>>,
}

impl<'a> Frame<'a> {
    fn new(nodes: Vec<&'a Allele>) -> Self {
        Self {
            nodes,
            children: None,
        }
    }
}

/// Lazy children-first walk over parallel trees; see [`walk_allele_trees`].
///
/// The walk stops for good after yielding an error.
pub struct Walk<'a, T, F>
where
    F: FnMut(&[Allele]) -> Result<Option<T>>,
{
    stack: Vec<Frame<'a>>,
    filter: NodeFilter,
    handler: F,
}

impl<'a, T, F> Walk<'a, T, F>
where
    F: FnMut(&[Allele]) -> Result<Option<T>>,
{
    fn fail(&mut self, err: ClanTuneError) -> Option<Result<T>> {
        self.stack.clear();
        Some(Err(err))
    }
}

impl<'a, T, F> Iterator for Walk<'a, T, F>
where
    F: FnMut(&[Allele]) -> Result<Option<T>>,
{
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let frame = self.stack.last_mut()?;

            if frame.children.is_none() {
                if let Err(err) = check_parallel(&frame.nodes) {
                    return self.fail(err);
                }
                let keys: Vec<String> = frame.nodes[0]
                    .metadata()
                    .iter()
                    .filter(|(_, entry)| entry.is_allele())
                    .map(|(key, _)| key.clone())
                    .collect();
                frame.children = Some(keys.into_iter());
            }

            let next_key = frame.children.as_mut().and_then(Iterator::next);
            if let Some(key) = next_key {
                // check_parallel guaranteed every node carries an allele at this key
                let children: Vec<&'a Allele> = frame
                    .nodes
                    .iter()
                    .copied()
                    .filter_map(|node: &'a Allele| node.meta(&key).and_then(MetaValue::as_allele))
                    .collect();
                self.stack.push(Frame::new(children));
                continue;
            }

            let frame = self.stack.pop()?;
            if !self.filter.admits(frame.nodes[0]) {
                continue;
            }
            let flattened: Vec<Allele> = frame.nodes.iter().map(|node| node.flatten()).collect();
            match (self.handler)(&flattened) {
                Ok(Some(result)) => return Some(Ok(result)),
                Ok(None) => continue,
                Err(err) => return self.fail(err),
            }
        }
    }
}

/// Walk N isomorphic trees in lock-step, children first, metadata keys in
/// lexical order. Nodes are filtered on the first tree's flags. The handler
/// receives the N flattened nodes; `None` results are dropped.
pub fn walk_allele_trees<'a, T, F>(
    trees: &[&'a Allele],
    filter: NodeFilter,
    handler: F,
) -> Result<Walk<'a, T, F>>
where
    F: FnMut(&[Allele]) -> Result<Option<T>>,
{
    if trees.is_empty() {
        return Err(ClanTuneError::ContractViolation(
            "walk requires at least one allele tree".to_string(),
        ));
    }
    Ok(Walk {
        stack: vec![Frame::new(trees.to_vec())],
        filter,
        handler,
    })
}

/// Build one tree from N sources, children first.
///
/// `template` indexes the source that supplies structure for the whole
/// recursion. Raw metadata must agree across sources; domains and flags must
/// match at every node. The handler gets the flattened structural node and
/// the flattened sources, and only the value of what it returns is kept.
pub fn synthesize_allele_trees<F>(
    sources: &[&Allele],
    template: usize,
    filter: NodeFilter,
    mut handler: F,
) -> Result<Allele>
where
    F: FnMut(&Allele, &[Allele]) -> Result<Allele>,
{
    if sources.is_empty() {
        return Err(ClanTuneError::ContractViolation(
            "synthesis requires at least one source tree".to_string(),
        ));
    }
    if template >= sources.len() {
        return Err(ClanTuneError::ContractViolation(format!(
            "template index {} out of range for {} sources",
            template,
            sources.len()
        )));
    }
    synthesize_node(sources, template, filter, &mut handler)
}

fn synthesize_node<F>(
    sources: &[&Allele],
    template: usize,
    filter: NodeFilter,
    handler: &mut F,
) -> Result<Allele>
where
    F: FnMut(&Allele, &[Allele]) -> Result<Allele>,
{
    check_types(sources)?;

    let keys: BTreeSet<&str> = sources
        .iter()
        .flat_map(|source| source.metadata().keys().map(String::as_str))
        .collect();

    let mut resolved = BTreeMap::new();
    for key in keys {
        let entries = sources
            .iter()
            .map(|source| {
                source.meta(key).ok_or_else(|| {
                    ClanTuneError::StructureMismatch(format!(
                        "metadata key '{}' is missing from a source",
                        key
                    ))
                })
            })
            .collect::<Result<Vec<&MetaValue>>>()?;

        let entry = match entries[template] {
            MetaValue::Allele(_) => {
                let children = entries
                    .iter()
                    .map(|entry| {
                        entry.as_allele().ok_or_else(|| {
                            ClanTuneError::StructureMismatch(format!(
                                "metadata key '{}' mixes alleles and raw values",
                                key
                            ))
                        })
                    })
                    .collect::<Result<Vec<&Allele>>>()?;
                MetaValue::Allele(synthesize_node(&children, template, filter, handler)?)
            }
            MetaValue::Raw(raw) => {
                if entries.iter().any(|entry| entry.as_raw() != Some(raw)) {
                    return Err(ClanTuneError::StructureMismatch(format!(
                        "raw metadata '{}' differs across sources",
                        key
                    )));
                }
                MetaValue::Raw(raw.clone())
            }
        };
        resolved.insert(key.to_string(), entry);
    }

    let structural = sources[template].unflatten(&resolved);
    check_schema(sources)?;

    if !filter.admits(&structural) {
        return Ok(structural);
    }

    let flat_template = structural.flatten();
    let flat_sources: Vec<Allele> = sources.iter().map(|source| source.flatten()).collect();
    let produced = handler(&flat_template, &flat_sources)?;
    adopt_value(&structural, &produced)
}

// Keep the structural node's domain, flags and metadata; take only the value.
fn adopt_value(structural: &Allele, produced: &Allele) -> Result<Allele> {
    if produced.allele_type() != structural.allele_type() {
        return Err(ClanTuneError::TypeMismatch {
            expected: structural.allele_type().to_string(),
            actual: produced.allele_type().to_string(),
        });
    }
    structural.with_overrides(AlleleOverrides {
        value: Some(produced.raw().clone()),
        ..AlleleOverrides::default()
    })
}

fn check_types(nodes: &[&Allele]) -> Result<()> {
    let expected = nodes[0].allele_type();
    for node in &nodes[1..] {
        if node.allele_type() != expected {
            return Err(ClanTuneError::TypeMismatch {
                expected: expected.to_string(),
                actual: node.allele_type().to_string(),
            });
        }
    }
    Ok(())
}

/// Same variant, same metadata keys, same allele/raw kind per key.
fn check_parallel(nodes: &[&Allele]) -> Result<()> {
    check_types(nodes)?;
    let first = nodes[0].metadata();
    for node in &nodes[1..] {
        let other = node.metadata();
        if first.len() != other.len() || first.keys().zip(other.keys()).any(|(a, b)| a != b) {
            return Err(ClanTuneError::StructureMismatch(format!(
                "metadata keys differ: {:?} vs {:?}",
                first.keys().collect::<Vec<_>>(),
                other.keys().collect::<Vec<_>>()
            )));
        }
        for (key, entry) in first {
            if other.get(key).map(MetaValue::is_allele) != Some(entry.is_allele()) {
                return Err(ClanTuneError::StructureMismatch(format!(
                    "metadata key '{}' mixes alleles and raw values",
                    key
                )));
            }
        }
    }
    Ok(())
}

fn check_schema(nodes: &[&Allele]) -> Result<()> {
    let first = nodes[0];
    for node in &nodes[1..] {
        if node.domain() != first.domain() {
            return Err(ClanTuneError::SchemaMismatch(format!(
                "Domain mismatch: {:?} vs {:?}",
                first.domain(),
                node.domain()
            )));
        }
        if node.can_mutate() != first.can_mutate() {
            return Err(ClanTuneError::SchemaMismatch("can_mutate mismatch".to_string()));
        }
        if node.can_crossbreed() != first.can_crossbreed() {
            return Err(ClanTuneError::SchemaMismatch(
                "can_crossbreed mismatch".to_string(),
            ));
        }
    }
    Ok(())
}

impl Allele {
    /// Walk this tree alone; see [`walk_allele_trees`].
    pub fn walk_tree<'a, T, F>(
        &'a self,
        filter: NodeFilter,
        mut handler: F,
    ) -> impl Iterator<Item = Result<T>> + 'a
    where
        T: 'a,
        F: FnMut(&Allele) -> Result<Option<T>> + 'a,
    {
        Walk {
            stack: vec![Frame::new(vec![self])],
            filter,
            handler: move |nodes: &[Allele]| handler(&nodes[0]),
        }
    }

    /// Rebuild this tree alone; see [`synthesize_allele_trees`].
    pub fn update_tree<F>(&self, filter: NodeFilter, mut handler: F) -> Result<Allele>
    where
        F: FnMut(&Allele) -> Result<Allele>,
    {
        synthesize_allele_trees(&[self], 0, filter, |node, _| handler(node))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Value;
    use std::cell::Cell;

    fn leaf(value: f64) -> Allele {
        Allele::float(value, None, None).unwrap()
    }

    fn tree(parent: f64, a: f64, b: f64) -> Allele {
        leaf(parent).with_metadata("b", leaf(b)).with_metadata("a", leaf(a))
    }

    fn values(nodes: &[Allele]) -> Result<Option<f64>> {
        Ok(nodes[0].value().as_f64())
    }

    #[test]
    fn test_walk_visits_children_first_in_key_order() {
        let root = tree(3.0, 1.0, 2.0);
        let seen: Vec<f64> = walk_allele_trees(&[&root], NodeFilter::ALL, values)
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(seen, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_walk_does_not_recurse_into_raw_metadata() {
        let root = leaf(1.0).with_metadata("note", 5.0).with_metadata("child", leaf(2.0));
        let seen: Vec<f64> = root
            .walk_tree(NodeFilter::ALL, |node| Ok(node.value().as_f64()))
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(seen, vec![2.0, 1.0]);
    }

    #[test]
    fn test_walk_handler_sees_flattened_nodes() {
        let root = leaf(1.0).with_metadata("std", leaf(0.5));
        let flags: Vec<bool> = root
            .walk_tree(NodeFilter::ALL, |node| {
                Ok(Some(node.metadata().values().all(|m| !m.is_allele())))
            })
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(flags, vec![true, true]);
    }

    #[test]
    fn test_walk_filter_skips_node_but_not_children() {
        let root = leaf(1.0).with_flags(false, true).with_metadata("a", leaf(2.0));
        let seen: Vec<f64> = root
            .walk_tree(NodeFilter::mutable(), |node| Ok(node.value().as_f64()))
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(seen, vec![2.0]);
    }

    #[test]
    fn test_walk_is_lazy() {
        let root = tree(3.0, 1.0, 2.0);
        let calls = Cell::new(0);
        let mut walk = walk_allele_trees(&[&root], NodeFilter::ALL, |nodes| {
            calls.set(calls.get() + 1);
            Ok(nodes[0].value().as_f64())
        })
        .unwrap();
        assert_eq!(calls.get(), 0);
        assert_eq!(walk.next().unwrap().unwrap(), 1.0);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_walk_parallel_trees() {
        let first = tree(3.0, 1.0, 2.0);
        let second = tree(30.0, 10.0, 20.0);
        let sums: Vec<f64> = walk_allele_trees(&[&first, &second], NodeFilter::ALL, |nodes| {
            Ok(Some(nodes.iter().filter_map(|n| n.value().as_f64()).sum()))
        })
        .unwrap()
        .collect::<Result<_>>()
        .unwrap();
        assert_eq!(sums, vec![11.0, 22.0, 33.0]);
    }

    #[test]
    fn test_walk_rejects_type_mismatch() {
        let first = leaf(1.0);
        let second = Allele::int(1.0, None, None).unwrap();
        let mut walk = walk_allele_trees(&[&first, &second], NodeFilter::ALL, values).unwrap();
        assert!(matches!(walk.next(), Some(Err(ClanTuneError::TypeMismatch { .. }))));
        assert!(walk.next().is_none());
    }

    #[test]
    fn test_walk_rejects_metadata_shape_mismatch() {
        let first = leaf(1.0).with_metadata("a", leaf(2.0));
        let second = leaf(1.0).with_metadata("b", leaf(2.0));
        let result: Result<Vec<f64>> =
            walk_allele_trees(&[&first, &second], NodeFilter::ALL, values)
                .unwrap()
                .collect();
        assert!(matches!(result, Err(ClanTuneError::StructureMismatch(_))));
    }

    #[test]
    fn test_walk_requires_trees() {
        assert!(walk_allele_trees::<f64, _>(&[], NodeFilter::ALL, values).is_err());
    }

    #[test]
    fn test_synthesis_keeps_template_shape() {
        let root = tree(3.0, 1.0, 2.0).with_metadata("mode", "random");
        // Handler tries to return a node with a different shape
        let result = root
            .update_tree(NodeFilter::ALL, |node| {
                let doubled = node.value().as_f64().unwrap_or_default() * 2.0;
                Ok(leaf(doubled).with_flags(false, false).with_metadata("extra", 1.0))
            })
            .unwrap();

        assert_eq!(result.domain(), root.domain());
        assert_eq!(result.can_mutate(), root.can_mutate());
        assert_eq!(
            result.metadata().keys().collect::<Vec<_>>(),
            root.metadata().keys().collect::<Vec<_>>()
        );
        assert_eq!(result.value(), Value::Float(6.0));
        assert_eq!(result.meta_f64("a"), Some(2.0));
        assert!(result.meta("a").unwrap().is_allele());
        assert_eq!(result.meta_str("mode"), Some("random"));
    }

    #[test]
    fn test_synthesis_uses_resolved_children_after_handler() {
        let first = leaf(1.0).with_metadata("std", leaf(0.1));
        let second = leaf(3.0).with_metadata("std", leaf(0.3));
        let seen_std = Cell::new(0.0);
        let result = synthesize_allele_trees(&[&first, &second], 0, NodeFilter::ALL, |template, sources| {
            if template.meta("std").is_some() {
                seen_std.set(template.meta_f64("std").unwrap_or_default());
            }
            let mean = sources.iter().filter_map(|s| s.value().as_f64()).sum::<f64>() / 2.0;
            template.with_value(mean)
        })
        .unwrap();

        assert!((result.value().as_f64().unwrap() - 2.0).abs() < 1e-12);
        assert!((result.meta_f64("std").unwrap() - 0.2).abs() < 1e-12);
        // The parent handler saw the already-synthesized child value
        assert!((seen_std.get() - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_synthesis_rejects_domain_mismatch() {
        let first = Allele::float(1.0, Some(0.0), Some(10.0)).unwrap();
        let second = Allele::float(1.0, Some(0.0), Some(20.0)).unwrap();
        let err = synthesize_allele_trees(&[&first, &second], 0, NodeFilter::ALL, |t, _| Ok(t.clone()))
            .unwrap_err();
        assert!(err.to_string().contains("Domain mismatch"));
    }

    #[test]
    fn test_synthesis_rejects_flag_mismatch() {
        let first = leaf(1.0);
        let second = leaf(1.0).with_flags(false, true);
        let err = synthesize_allele_trees(&[&first, &second], 0, NodeFilter::ALL, |t, _| Ok(t.clone()))
            .unwrap_err();
        assert!(err.to_string().contains("can_mutate mismatch"));
    }

    #[test]
    fn test_synthesis_rejects_raw_metadata_disagreement() {
        let first = leaf(1.0).with_metadata("mode", "random");
        let second = leaf(1.0).with_metadata("mode", "weighted");
        let err = synthesize_allele_trees(&[&first, &second], 0, NodeFilter::ALL, |t, _| Ok(t.clone()))
            .unwrap_err();
        assert!(matches!(err, ClanTuneError::StructureMismatch(_)));
    }

    #[test]
    fn test_synthesis_rejects_key_missing_from_template() {
        let first = leaf(1.0);
        let second = leaf(1.0).with_metadata("extra", leaf(2.0));
        let err = synthesize_allele_trees(&[&first, &second], 0, NodeFilter::ALL, |t, _| Ok(t.clone()))
            .unwrap_err();
        assert!(matches!(err, ClanTuneError::StructureMismatch(_)));
    }

    #[test]
    fn test_synthesis_filter_returns_structural_node() {
        let root = leaf(1.0).with_flags(false, true).with_metadata("a", leaf(2.0));
        let result = root
            .update_tree(NodeFilter::mutable(), |node| {
                node.with_value(node.value().as_f64().unwrap_or_default() + 10.0)
            })
            .unwrap();
        assert_eq!(result.value(), Value::Float(1.0));
        assert_eq!(result.meta_f64("a"), Some(12.0));
    }

    #[test]
    fn test_synthesis_rejects_handler_type_change() {
        let root = leaf(1.0);
        let err = root
            .update_tree(NodeFilter::ALL, |_| Allele::boolean(true))
            .unwrap_err();
        assert!(matches!(err, ClanTuneError::TypeMismatch { .. }));
    }

    #[test]
    fn test_synthesis_handler_value_is_clamped() {
        let root = Allele::float(5.0, Some(0.0), Some(10.0)).unwrap();
        let result = root
            .update_tree(NodeFilter::ALL, |_| Allele::float(50.0, None, None))
            .unwrap();
        assert_eq!(result.value(), Value::Float(10.0));
    }
}
