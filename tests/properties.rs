use noclock_ast::{
    Annotation, AsyncState, Error, Expr, IndentStyle, InstrType, Instruction, Op, PrintOptions,
    Printer,
};
use proptest::prelude::*;

const DEPTH: usize = 10_000;

fn leaf() -> impl Strategy<Value = Expr> {
    prop_oneof![
        (-3i64..4).prop_map(Expr::number),
        any::<bool>().prop_map(Expr::boolean),
        prop::sample::select(vec!["i", "j", "N"]).prop_map(|name| Expr::identifier(name).unwrap()),
    ]
}

fn expr() -> impl Strategy<Value = Expr> {
    leaf().prop_recursive(6, 64, 2, |inner| {
        prop_oneof![
            (prop::sample::select(vec![Op::Neg, Op::Not]), inner.clone())
                .prop_map(|(op, e)| Expr::unary(op, e).unwrap()),
            (
                prop::sample::select(Op::ALL.into_iter().filter(|op| op.is_binary()).collect::<Vec<_>>()),
                inner.clone(),
                inner,
            )
                .prop_map(|(op, a, b)| Expr::binary(op, a, b).unwrap()),
        ]
    })
}

proptest! {
    #[test]
    fn copies_are_equal_and_independent(e in expr()) {
        let snapshot = e.clone();
        let mut copy = e.try_clone().unwrap();
        prop_assert_eq!(&copy, &e);
        prop_assert_eq!(copy.to_string(), e.to_string());
        copy.set_identifier("mutated").unwrap();
        prop_assert_ne!(&copy, &e);
        prop_assert_eq!(&e, &snapshot);
    }

    #[test]
    fn equality_is_an_equivalence(a in expr(), b in expr(), c in expr()) {
        prop_assert!(a.view() == a.view());
        prop_assert_eq!(a == b, b == a);
        if a == b && b == c {
            prop_assert!(a == c);
        }
        if a == b {
            prop_assert_eq!(a.to_string(), b.to_string());
        }
    }

    #[test]
    fn subtrees_copy_out_equal(e in expr()) {
        if let Ok(left) = e.get_left() {
            let owned = left.to_expr();
            prop_assert!(owned == left);
            prop_assert_eq!(owned.size(), left.size());
        }
    }

    #[test]
    fn async_lifecycle_follows_the_automaton(clocked in any::<bool>(), steps in prop::collection::vec(0u8..3, 0..8)) {
        let mut a = Instruction::deferred(vec![Instruction::advance()], clocked).unwrap();
        let h = a.handle();
        let mut state = AsyncState::Created;
        for step in steps {
            let result = match step {
                0 => a.start(h, Annotation::clock("c")),
                1 => a.finish(h),
                _ => a.clocked_finish(h),
            };
            let expected = match (step, state) {
                (0, AsyncState::Created) => Some(AsyncState::Started),
                (1, AsyncState::Started) if !clocked => Some(AsyncState::Finished),
                (2, AsyncState::Started) if clocked => Some(AsyncState::Finished),
                _ => None,
            };
            match expected {
                Some(next) => {
                    prop_assert!(result.is_ok());
                    state = next;
                }
                None => prop_assert!(matches!(
                    result,
                    Err(Error::InvalidTransition { .. } | Error::WrongVariant { .. })
                ), "expected InvalidTransition or WrongVariant error"),
            }
            prop_assert_eq!(a.root().async_state().unwrap(), state);
        }
    }
}

#[test]
fn deep_expressions_are_stack_safe() {
    let mut negs = Expr::identifier("x").unwrap();
    let mut sums = Expr::number(0);
    for _ in 0..DEPTH {
        negs = Expr::unary(Op::Neg, negs).unwrap();
        sums = Expr::binary(Op::Add, sums, Expr::identifier("x").unwrap()).unwrap();
    }
    assert_eq!(negs.size(), DEPTH + 1);
    assert_eq!(sums.size(), 2 * DEPTH + 1);

    let copy = negs.clone();
    assert_eq!(copy, negs);
    let text = negs.to_string();
    assert!(text.starts_with("-(-(-"));
    assert!(text.ends_with("x)))"));

    let sum_copy = sums.try_clone().unwrap();
    assert_eq!(sum_copy, sums);
    assert_eq!(sums.to_string().matches(" + ").count(), DEPTH);
    assert_eq!(sums.get_left().unwrap().size(), 2 * DEPTH - 1);

    drop(copy);
    drop(sum_copy);

    let mut right = Expr::identifier("x").unwrap();
    for _ in 0..DEPTH {
        right = Expr::binary(Op::Sub, Expr::number(1), right).unwrap();
    }
    assert_eq!(right.size(), 2 * DEPTH + 1);
    let right_copy = right.clone();
    assert_eq!(right_copy, right);
    assert!(right.to_string().starts_with("1 - (1 - (1 - "));
    drop(right);
    assert_eq!(right_copy.get_right().unwrap().size(), 2 * DEPTH - 1);
}

#[test]
fn deep_instructions_are_stack_safe() {
    let mut tree = Instruction::block(vec![]).unwrap();
    let mut innermost = tree.handle();
    for _ in 0..DEPTH {
        innermost = tree.push(innermost, Instruction::block(vec![]).unwrap()).unwrap();
    }
    tree.push(innermost, Instruction::advance()).unwrap();
    assert_eq!(tree.size(), DEPTH + 2);

    let copy = tree.clone();
    assert_eq!(copy, tree);
    assert_eq!(tree.walk().count(), DEPTH + 2);

    let flat = Printer::new(PrintOptions {
        indent: IndentStyle::Spaces,
        indent_width: 0,
        ..PrintOptions::default()
    });
    let text = flat.instruction_to_string(&tree);
    assert_eq!(text.lines().count(), 2 * (DEPTH + 1) + 1);

    let mut dated = copy.try_clone().unwrap();
    dated.compute_dates();
    assert!(dated.walk().skip(1).all(|i| i.annotation().date == Some(Expr::number(0))));
    drop(dated);
    drop(copy);
}

#[test]
fn deep_instructions_build_bottom_up() {
    let mut tree = Instruction::advance();
    let innermost = tree.handle();
    for level in 0..DEPTH {
        tree = match level % 3 {
            0 => Instruction::for_loop("i", Expr::number(0), Expr::number(1), vec![tree]),
            1 => Instruction::finish_block(vec![Instruction::advance(), tree]),
            _ => Instruction::if_then_else(Expr::boolean(true), vec![tree], None),
        }
        .unwrap();
    }
    let finishes = (0..DEPTH).filter(|level| level % 3 == 1).count();
    assert_eq!(tree.size(), 1 + DEPTH + finishes);
    assert_eq!(tree.get(innermost).unwrap().get_type(), InstrType::Advance);

    let copy = tree.try_clone().unwrap();
    assert_eq!(copy, tree);
    assert_eq!(tree.walk().count(), tree.size());
    assert_eq!(tree.calls().count(), 0);

    let flat = Printer::new(PrintOptions {
        indent_width: 0,
        ..PrintOptions::default()
    });
    let text = flat.instruction_to_string(&tree);
    assert_eq!(text.matches("finish\n").count(), finishes);
    drop(copy);
}
