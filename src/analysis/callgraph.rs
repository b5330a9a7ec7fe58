//! Module call graph.

use std::collections::HashSet;

use crate::{
    mir::{FuncId, InstKind, Module},
    utils::graph::{
        algorithms::{is_cyclic, strongly_connected_components},
        DirectedGraph, NodeId, Successors,
    },
    Result,
};

/// Direct-call graph of a module.
///
/// Node `n` is function `FuncId(n)`. An edge `f -> g` exists if a live
/// instruction of `f` calls `g`; each pair is recorded once. Declarations and
/// deleted functions have no outgoing edges.
#[derive(Debug, Clone)]
pub struct CallGraph {
    graph: DirectedGraph<FuncId>,
    recursive: HashSet<FuncId>,
    bottom_up: Vec<FuncId>,
}

impl CallGraph {
    /// Builds the call graph of `module`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::GraphError`](crate::Error::GraphError) if a call names
    /// a function outside the module.
    pub fn build(module: &Module) -> Result<Self> {
        let mut graph = DirectedGraph::new();
        for id in module.function_ids() {
            graph.add_node(id);
        }

        for (caller, func) in module.functions() {
            if func.is_external() || func.is_deleted() {
                continue;
            }
            for block in func.live_blocks() {
                for inst in func.insts(block) {
                    if let InstKind::Call { callee, .. } = func.kind(inst) {
                        let (src, dst) = (Self::node(caller), Self::node(*callee));
                        if !graph.has_edge(src, dst) {
                            graph.add_edge(src, dst)?;
                        }
                    }
                }
            }
        }

        let mut recursive = HashSet::new();
        let mut bottom_up = Vec::with_capacity(module.function_count());
        for component in strongly_connected_components(&graph) {
            for &node in &component {
                let func = Self::func(node);
                if is_cyclic(&graph, &component, node) {
                    recursive.insert(func);
                }
                bottom_up.push(func);
            }
        }

        Ok(Self {
            graph,
            recursive,
            bottom_up,
        })
    }

    /// Functions called directly by `func`.
    pub fn callees(&self, func: FuncId) -> impl Iterator<Item = FuncId> + '_ {
        self.graph.successors(Self::node(func)).map(Self::func)
    }

    /// `true` if `func` can reach itself through calls.
    #[must_use]
    pub fn is_recursive(&self, func: FuncId) -> bool {
        self.recursive.contains(&func)
    }

    /// Every function, callees before their callers (members of one
    /// recursive cycle appear together in arbitrary order).
    #[must_use]
    pub fn bottom_up_order(&self) -> &[FuncId] {
        &self.bottom_up
    }

    fn node(func: FuncId) -> NodeId {
        NodeId::new(func.index())
    }

    fn func(node: NodeId) -> FuncId {
        FuncId::new(node.index())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mir::{BlockId, Function, TypeId};

    fn call(func: &mut Function, block: BlockId, callee: FuncId) {
        func.append(
            block,
            InstKind::Call {
                callee,
                args: vec![],
                format: None,
            },
            TypeId::VOID,
        );
    }

    #[test]
    fn test_recursion_and_order() {
        let mut module = Module::new();
        let main = module.define_function("main", TypeId::VOID, &[]).unwrap();
        let leaf = module.define_function("leaf", TypeId::VOID, &[]).unwrap();
        let even = module.define_function("even", TypeId::VOID, &[]).unwrap();
        let odd = module.define_function("odd", TypeId::VOID, &[]).unwrap();
        let fact = module.define_function("fact", TypeId::VOID, &[]).unwrap();

        for (caller, callees) in [
            (main, vec![leaf, even, fact]),
            (leaf, vec![]),
            (even, vec![odd, leaf]),
            (odd, vec![even]),
            (fact, vec![fact]),
        ] {
            let func = module.function_mut(caller);
            let entry = func.add_block("BB0");
            for callee in callees {
                call(func, entry, callee);
            }
            func.append(entry, InstKind::Return { value: None }, TypeId::VOID);
        }

        let graph = CallGraph::build(&module).unwrap();
        assert!(!graph.is_recursive(main));
        assert!(!graph.is_recursive(leaf));
        assert!(graph.is_recursive(even));
        assert!(graph.is_recursive(odd));
        assert!(graph.is_recursive(fact));

        let order = graph.bottom_up_order();
        let pos = |f: FuncId| order.iter().position(|&g| g == f).unwrap();
        assert!(pos(leaf) < pos(even));
        assert!(pos(even) < pos(main));
        assert!(pos(fact) < pos(main));
        assert_eq!(graph.callees(main).count(), 3);
    }
}
