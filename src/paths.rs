//! Enumeration of the disjoint paths (cubes) of a function.
//!
//! Every path from the root to the `1` terminal is a cube; the cubes of one
//! function are pairwise disjoint and their disjunction is the function. This
//! is how guards are turned into a sum of products for presentation.

use crate::bdd::Bdd;
use crate::reference::Ref;
use crate::types::Lit;

impl Bdd {
    /// Iterator over all paths to `1`, high branches first.
    pub fn paths(&self, f: Ref) -> BddPaths<'_> {
        BddPaths::new(self, f)
    }
}

#[derive(Debug, Clone, Copy)]
enum Branch {
    High,
    Low,
    Done,
}

#[derive(Debug)]
struct Frame {
    node: Ref,
    next: Branch,
}

pub struct BddPaths<'a> {
    bdd: &'a Bdd,
    stack: Vec<Frame>,
    /// Literals of the path leading to the top frame.
    path: Vec<Lit>,
}

impl<'a> BddPaths<'a> {
    pub fn new(bdd: &'a Bdd, f: Ref) -> Self {
        BddPaths {
            bdd,
            stack: vec![Frame {
                node: f,
                next: Branch::High,
            }],
            path: Vec::new(),
        }
    }

    fn backtrack(&mut self) {
        self.stack.pop();
        if !self.stack.is_empty() {
            self.path.pop();
        }
    }
}

impl Iterator for BddPaths<'_> {
    type Item = Vec<Lit>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let frame = self.stack.last_mut()?;
            let node = frame.node;

            if self.bdd.is_one(node) {
                let result = self.path.clone();
                self.backtrack();
                return Some(result);
            }
            if self.bdd.is_zero(node) {
                self.backtrack();
                continue;
            }

            let var = self.bdd.variable(node);
            let next = frame.next;
            match next {
                Branch::High => {
                    frame.next = Branch::Low;
                    self.path.push(var.pos());
                    let child = self.bdd.high_node(node);
                    self.stack.push(Frame {
                        node: child,
                        next: Branch::High,
                    });
                }
                Branch::Low => {
                    frame.next = Branch::Done;
                    self.path.push(var.neg());
                    let child = self.bdd.low_node(node);
                    self.stack.push(Frame {
                        node: child,
                        next: Branch::High,
                    });
                }
                Branch::Done => self.backtrack(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test]
    fn test_paths_of_constants() {
        let bdd = Bdd::default();
        assert_eq!(bdd.paths(bdd.one()).collect::<Vec<_>>(), vec![Vec::<Lit>::new()]);
        assert_eq!(bdd.paths(bdd.zero()).count(), 0);
    }

    #[test]
    fn test_paths_cover_function() {
        let bdd = Bdd::default();
        let x = bdd.allocate_variable();
        let y = bdd.allocate_variable();
        let f = bdd.apply_xor(bdd.mk_var(x), bdd.mk_var(y));

        let paths: Vec<_> = bdd.paths(f).collect();
        assert_eq!(paths, vec![vec![x.pos(), y.neg()], vec![x.neg(), y.pos()]]);

        let cover = bdd.apply_or_many(paths.into_iter().map(|p| bdd.mk_cube(p)));
        assert_eq!(cover, f);
    }
}
