//! Passes that fill in instruction annotations.
//!
//! Both passes treat the tree as a program: when the root is a block its body
//! is the top-level list, otherwise the root alone is.

use std::mem;

use crate::expr::Expr;
use crate::instr::{InstrId, Instruction, Kind};

fn bump(slot: &mut Expr, by: Expr) {
    let current = mem::replace(slot, Expr::number(0));
    *slot = current + by;
}

/// Number of iterations of `for i in (lower..upper)`.
fn trip_count(lower: &Expr, upper: &Expr) -> Expr {
    upper.clone() - lower.clone() + 1
}

struct Frame<'a> {
    ids: &'a [InstrId],
    next: usize,
    count: Expr,
    trips: Option<Expr>,
}

impl Instruction {
    fn top_level(&self) -> Vec<InstrId> {
        match &self.nodes[self.root].kind {
            Kind::Block { body } => body.clone(),
            _ => vec![self.root],
        }
    }

    /// Gives every instruction a hierarchical level label and the loop
    /// boundaries it runs under.
    ///
    /// The i-th non-`advance` instruction of a list is labelled
    /// `"<parent>,i"`. Calls get a trailing `,d`. Loops label their body
    /// `"<level>,<iterator>"` and add `L <= i <= U` to its boundaries; asyncs
    /// use `,a`, finishes `,f` and blocks `,b`. Branches are not descended
    /// into.
    #[tracing::instrument(skip_all)]
    pub fn decorate(&mut self) {
        let mut pending: Vec<(Vec<InstrId>, Option<String>, Option<String>)> =
            vec![(self.top_level(), None, None)];
        let mut labelled = 0usize;
        while let Some((ids, level, boundaries)) = pending.pop() {
            let mut position = 0usize;
            for id in ids {
                let current = match &level {
                    Some(parent) => format!("{parent},{position}"),
                    None => position.to_string(),
                };
                let node = &mut self.nodes[id];
                let mut label = current.clone();
                match &node.kind {
                    Kind::Call { .. } => label.push_str(",d"),
                    Kind::For {
                        iterator,
                        lower,
                        upper,
                        body,
                    } => {
                        let range = format!("{lower} <= {iterator} <= {upper}");
                        let inner = match &boundaries {
                            Some(outer) => format!("{outer} and {range}"),
                            None => range,
                        };
                        pending.push((
                            body.clone(),
                            Some(format!("{current},{iterator}")),
                            Some(inner),
                        ));
                    }
                    Kind::Async { body, .. } => {
                        pending.push((body.clone(), Some(format!("{current},a")), boundaries.clone()));
                    }
                    Kind::Finish { body, .. } => {
                        pending.push((body.clone(), Some(format!("{current},f")), boundaries.clone()));
                    }
                    Kind::Block { body } | Kind::Opaque { block: body, .. } => {
                        pending.push((body.clone(), Some(format!("{current},b")), boundaries.clone()));
                    }
                    Kind::Branch { .. } | Kind::Advance => {}
                }
                let advance = matches!(node.kind, Kind::Advance);
                node.annotation.level = Some(label);
                node.annotation.boundaries = boundaries.clone();
                labelled += 1;
                if !advance {
                    position += 1;
                }
            }
        }
        tracing::debug!(labelled, "decorated instructions");
    }

    /// Counts the `advance`s a list performs, loops included.
    fn count_advances(&self, ids: &[InstrId]) -> Expr {
        let mut frames = vec![Frame {
            ids,
            next: 0,
            count: Expr::number(0),
            trips: None,
        }];
        loop {
            let step = match frames.last_mut() {
                Some(frame) => {
                    let id = frame.ids.get(frame.next).copied();
                    frame.next += 1;
                    id
                }
                None => unreachable!("the outermost frame returns"),
            };
            match step {
                Some(id) => match &self.nodes[id].kind {
                    Kind::Advance => {
                        if let Some(frame) = frames.last_mut() {
                            bump(&mut frame.count, Expr::number(1));
                        }
                    }
                    Kind::For {
                        lower, upper, body, ..
                    } => frames.push(Frame {
                        ids: body,
                        next: 0,
                        count: Expr::number(0),
                        trips: Some(trip_count(lower, upper)),
                    }),
                    _ => {}
                },
                None => {
                    let Some(done) = frames.pop() else {
                        unreachable!("a frame was just inspected")
                    };
                    match frames.last_mut() {
                        Some(parent) => {
                            let total = match done.trips {
                                Some(trips) => trips * done.count,
                                None => done.count,
                            };
                            bump(&mut parent.count, total);
                        }
                        None => return done.count,
                    }
                }
            }
        }
    }

    /// Dates every instruction by the number of `advance`s performed before
    /// it, as an expression over the enclosing loop iterators.
    #[tracing::instrument(skip_all)]
    pub fn compute_dates(&mut self) {
        let mut pending: Vec<(Vec<InstrId>, Option<Expr>, Option<String>)> =
            vec![(self.top_level(), None, None)];
        let mut dated = 0usize;
        while let Some((ids, base, iterator)) = pending.pop() {
            let count = self.count_advances(&ids);
            let mut advances = Expr::number(0);
            for id in ids {
                let mut date = match &iterator {
                    Some(name) => Expr::trusted_identifier(name) * count.clone(),
                    None => Expr::number(0),
                };
                if let Some(base) = &base {
                    date = date + base.clone();
                }
                date = date + advances.clone();

                let node = &self.nodes[id];
                match &node.kind {
                    Kind::Advance => bump(&mut advances, Expr::number(1)),
                    Kind::For {
                        lower, upper, body, ..
                    } => bump(
                        &mut advances,
                        trip_count(lower, upper) * self.count_advances(body),
                    ),
                    _ => {}
                }
                match &node.kind {
                    Kind::For {
                        iterator: inner,
                        lower,
                        body,
                        ..
                    } => pending.push((
                        body.clone(),
                        Some(date.clone() - lower.clone()),
                        Some(inner.clone()),
                    )),
                    Kind::Branch {
                        then, otherwise, ..
                    } => {
                        pending.push((then.clone(), Some(date.clone()), iterator.clone()));
                        if let Some(otherwise) = otherwise {
                            pending.push((otherwise.clone(), Some(date.clone()), iterator.clone()));
                        }
                    }
                    Kind::Block { body }
                    | Kind::Async { body, .. }
                    | Kind::Finish { body, .. }
                    | Kind::Opaque { block: body, .. } => {
                        pending.push((body.clone(), Some(date.clone()), None));
                    }
                    Kind::Call { .. } | Kind::Advance => {}
                }
                self.nodes[id].annotation.date = Some(date);
                dated += 1;
            }
        }
        tracing::debug!(dated, "computed dates");
    }
}
